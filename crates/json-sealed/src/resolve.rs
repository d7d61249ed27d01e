//! Flattens a union's alternatives, including nested unions, into one label
//! space and validates it.

use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::trace;

use crate::error::BuildError;
use crate::shape::{Declaration, ErasedAlternative, Kind, TypeLabel, TypeRef, UnionDecl};

/// A terminal alternative reachable from the root union.
pub(crate) struct ResolvedLeaf {
    pub target: TypeRef,
    pub name: String,
    pub label: TypeLabel,
    /// Hops from the root down to the leaf.
    pub route: Vec<Arc<dyn ErasedAlternative>>,
}

pub(crate) struct Resolution {
    pub leaves: Vec<ResolvedLeaf>,
    /// Every primary and alternate label, mapped to its leaf index.
    pub labels: IndexMap<String, usize>,
}

pub(crate) fn resolve(
    root: &Declaration,
    union: &UnionDecl,
    key: &str,
) -> Result<Resolution, BuildError> {
    let mut resolver = Resolver {
        root: &root.name,
        key,
        leaves: Vec::new(),
        labels: IndexMap::new(),
    };
    resolver.walk(union, &[])?;
    Ok(Resolution {
        leaves: resolver.leaves,
        labels: resolver.labels,
    })
}

struct Resolver<'a> {
    root: &'a str,
    key: &'a str,
    leaves: Vec<ResolvedLeaf>,
    labels: IndexMap<String, usize>,
}

impl Resolver<'_> {
    fn walk(
        &mut self,
        union: &UnionDecl,
        route: &[Arc<dyn ErasedAlternative>],
    ) -> Result<(), BuildError> {
        for alternative in &union.alternatives {
            let decl = alternative.target.declaration();
            let mut hops = route.to_vec();
            hops.push(alternative.hop.clone());

            match &decl.kind {
                Kind::Union(inner) => match decl.discriminator.as_deref() {
                    Some(own) if own == self.key => {
                        return Err(BuildError::RedundantUnionRedeclaration {
                            type_name: decl.name.clone(),
                            key: own.to_string(),
                        });
                    }
                    // Independently keyed: one opaque leaf decoded by its own codec.
                    Some(_) => self.add_leaf(alternative.target, &decl, hops, true)?,
                    None => self.walk(inner, &hops)?,
                },
                _ => self.add_leaf(alternative.target, &decl, hops, false)?,
            }
        }
        Ok(())
    }

    fn add_leaf(
        &mut self,
        target: TypeRef,
        decl: &Declaration,
        route: Vec<Arc<dyn ErasedAlternative>>,
        keyed_union: bool,
    ) -> Result<(), BuildError> {
        let Some(label) = decl.label.clone() else {
            return Err(BuildError::MissingLabel {
                type_name: decl.name.clone(),
                union: self.root.to_string(),
            });
        };
        if !decl.generics.is_empty() {
            return Err(BuildError::GenericLeafRejected {
                type_name: decl.name.clone(),
            });
        }
        if !keyed_union && decl.discriminator.is_some() {
            return Err(BuildError::LabelledUnionKey {
                type_name: decl.name.clone(),
            });
        }
        let mut visited = HashSet::from([target.id()]);
        if let Some(type_name) = clash(decl, self.key, &mut visited) {
            return Err(BuildError::DiscriminatorFieldClash {
                type_name,
                key: self.key.to_string(),
                union: self.root.to_string(),
            });
        }

        let index = self.leaves.len();
        if let Some(&other) = self.labels.get(&label.primary) {
            return Err(BuildError::DuplicateLabel {
                label: label.primary.clone(),
                first: self.leaves[other].name.clone(),
                second: decl.name.clone(),
            });
        }
        self.labels.insert(label.primary.clone(), index);
        for alternate in &label.alternates {
            let other = match self.labels.get(alternate) {
                Some(&other) if other == index => decl.name.clone(),
                Some(&other) => self.leaves[other].name.clone(),
                None => {
                    self.labels.insert(alternate.clone(), index);
                    continue;
                }
            };
            return Err(BuildError::DuplicateAlternateLabel {
                label: alternate.clone(),
                first: other,
                second: decl.name.clone(),
            });
        }

        trace!(
            union = self.root,
            leaf = %decl.name,
            label = %label.primary,
            alternates = label.alternates.len(),
            "registered variant label"
        );
        self.leaves.push(ResolvedLeaf {
            target,
            name: decl.name.clone(),
            label,
            route,
        });
        Ok(())
    }
}

/// Finds a type written into the same object as the root's key that also
/// writes a member named `key`. An independently keyed union shares the
/// object with every leaf beneath it.
fn clash(decl: &Declaration, key: &str, visited: &mut HashSet<TypeId>) -> Option<String> {
    match &decl.kind {
        Kind::Product(product) => product
            .fields
            .iter()
            .any(|f| f.wire_name == key)
            .then(|| decl.name.clone()),
        Kind::Union(union) => {
            if decl.discriminator.as_deref() == Some(key) {
                return Some(decl.name.clone());
            }
            for alternative in &union.alternatives {
                if !visited.insert(alternative.target.id()) {
                    continue;
                }
                if let Some(found) = clash(&alternative.target.declaration(), key, visited) {
                    return Some(found);
                }
            }
            None
        }
        _ => None,
    }
}
