//! Derives codecs for declared products and unions.

use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

use crate::codec::DynCodec;
use crate::error::BuildError;
use crate::product::ProductCodec;
use crate::registry::{CodecFactory, Qualifiers, Registry};
use crate::shape::{Declaration, Kind, TypeRef};
use crate::union::UnionCodec;

/// Tries the product builder, then the union builder. Anything else, and
/// every qualified request, is passed on with `Ok(None)`.
pub struct DeclaredFactory;

impl CodecFactory for DeclaredFactory {
    fn create(
        &self,
        ty: TypeRef,
        qualifiers: &Qualifiers,
        registry: &Registry,
    ) -> Result<Option<Arc<dyn DynCodec>>, BuildError> {
        if !qualifiers.is_empty() {
            return Ok(None);
        }
        let decl = ty.declaration();
        match &decl.kind {
            Kind::Product(product) => Ok(Some(Arc::new(ProductCodec::build(
                &decl, product, registry,
            )?))),
            Kind::Union(union) => {
                let Some(key) = discriminator_key(ty, &decl) else {
                    return Ok(None);
                };
                Ok(Some(Arc::new(UnionCodec::build(
                    &decl, union, &key, registry,
                )?)))
            }
            _ => Ok(None),
        }
    }
}

/// The union's own key, or for an umbrella declared `nested_in` a parent,
/// the key of its nearest keyed ancestor.
fn discriminator_key(ty: TypeRef, decl: &Declaration) -> Option<String> {
    if let Some(key) = &decl.discriminator {
        return Some(key.clone());
    }
    let mut visited: HashSet<TypeId> = HashSet::from([ty.id()]);
    let mut parent = decl.nested_in;
    while let Some(current) = parent {
        if !visited.insert(current.id()) {
            return None;
        }
        let parent_decl = current.declaration();
        if let Some(key) = parent_decl.discriminator {
            return Some(key);
        }
        parent = parent_decl.nested_in;
    }
    None
}
