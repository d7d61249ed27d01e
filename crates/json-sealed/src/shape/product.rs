//! Product declarations: an ordered set of named fields plus a positional
//! constructor.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{Declaration, Declared, Kind, Meta, TypeRef};
use crate::codec::{AnyValue, Instance};
use crate::error::CodecError;
use crate::registry::Qualifiers;

/// Reads one field out of an erased owner.
pub(crate) trait ErasedAccessor: Send + Sync {
    fn get<'a>(&self, owner: &'a AnyValue) -> Option<&'a AnyValue>;
}

struct FieldAccessor<T, F> {
    get: fn(&T) -> &F,
}

impl<T, F> ErasedAccessor for FieldAccessor<T, F>
where
    T: Any + Send + Sync,
    F: Any + Send + Sync,
{
    fn get<'a>(&self, owner: &'a AnyValue) -> Option<&'a AnyValue> {
        let owner = owner.downcast_ref::<T>()?;
        Some((self.get)(owner) as &AnyValue)
    }
}

pub(crate) type Constructor =
    Arc<dyn Fn(&mut Arguments) -> Result<Instance, CodecError> + Send + Sync>;

#[derive(Clone)]
pub struct FieldDecl {
    pub source_name: String,
    pub wire_name: String,
    pub ty: TypeRef,
    pub qualifiers: Qualifiers,
    pub(crate) accessor: Arc<dyn ErasedAccessor>,
}

#[derive(Clone)]
pub struct ProductDecl {
    pub fields: Vec<FieldDecl>,
    pub(crate) constructor: Constructor,
    pub(crate) accepts: fn(&AnyValue) -> bool,
}

fn is_type<T: Any>(value: &AnyValue) -> bool {
    value.is::<T>()
}

/// One field of a product, with optional wire name and qualifiers.
pub struct Field<T, F> {
    source_name: String,
    wire_name: Option<String>,
    qualifiers: Qualifiers,
    get: fn(&T) -> &F,
}

impl<T: Declared, F: Declared> Field<T, F> {
    pub fn new(name: &str, get: fn(&T) -> &F) -> Self {
        Self {
            source_name: name.to_string(),
            wire_name: None,
            qualifiers: Qualifiers::new(),
            get,
        }
    }

    /// JSON name used instead of the source name.
    pub fn wire_name(mut self, wire_name: &str) -> Self {
        self.wire_name = Some(wire_name.to_string());
        self
    }

    /// Binds the field to the codec registered for `F` under `qualifier`.
    pub fn qualified(mut self, qualifier: &'static str) -> Self {
        self.qualifiers.insert(qualifier);
        self
    }

    fn into_decl(self) -> FieldDecl {
        FieldDecl {
            wire_name: self.wire_name.unwrap_or_else(|| self.source_name.clone()),
            source_name: self.source_name,
            ty: TypeRef::of::<F>(),
            qualifiers: self.qualifiers,
            accessor: Arc::new(FieldAccessor { get: self.get }),
        }
    }
}

/// Builder for a product [`Declaration`].
///
/// ```ignore
/// impl Declared for Success {
///     fn declaration() -> Declaration {
///         Product::<Self>::new()
///             .label("success")
///             .alternate("successful")
///             .field("value", |s| &s.value)
///             .construct(|args| Ok(Success { value: args.required(0)? }))
///     }
/// }
/// ```
pub struct Product<T> {
    meta: Meta,
    fields: Vec<FieldDecl>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Declared> Default for Product<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Declared> Product<T> {
    pub fn new() -> Self {
        Self {
            meta: Meta::named::<T>(),
            fields: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Overrides the display name used in error messages.
    pub fn named(mut self, name: &str) -> Self {
        self.meta.name = name.to_string();
        self
    }

    pub fn field<F: Declared>(self, name: &str, get: fn(&T) -> &F) -> Self {
        self.add(Field::new(name, get))
    }

    pub fn add<F: Declared>(mut self, field: Field<T, F>) -> Self {
        self.fields.push(field.into_decl());
        self
    }

    /// Primary variant label, used when this product is a union leaf.
    pub fn label(mut self, primary: &str) -> Self {
        self.meta.label = Some(primary.to_string());
        self
    }

    pub fn alternate(mut self, label: &str) -> Self {
        self.meta.alternates.push(label.to_string());
        self
    }

    pub fn discriminator(mut self, key: &str) -> Self {
        self.meta.discriminator = Some(key.to_string());
        self
    }

    /// Records a declared type parameter.
    pub fn generic(mut self, param: &str) -> Self {
        self.meta.generics.push(param.to_string());
        self
    }

    /// Finishes the declaration. `constructor` receives one argument per
    /// field, in declaration order.
    pub fn construct<C>(self, constructor: C) -> Declaration
    where
        C: Fn(&mut Arguments) -> Result<T, CodecError> + Send + Sync + 'static,
    {
        let constructor: Constructor = Arc::new(move |args: &mut Arguments| {
            constructor(args).map(|value| Box::new(value) as Instance)
        });
        self.meta.into_declaration(Kind::Product(ProductDecl {
            fields: self.fields,
            constructor,
            accepts: is_type::<T>,
        }))
    }
}

/// Decoded field values handed to a product constructor.
///
/// Slots are indexed by field position. A slot is empty when its key was
/// absent from the object or carried `null` for a non-optional type.
pub struct Arguments {
    slots: Vec<Option<Instance>>,
    fields: Arc<[String]>,
    type_name: Arc<str>,
    path: String,
}

impl Arguments {
    pub(crate) fn new(
        slots: Vec<Option<Instance>>,
        fields: Arc<[String]>,
        type_name: Arc<str>,
        path: String,
    ) -> Self {
        Self {
            slots,
            fields,
            type_name,
            path,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_present(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    /// Takes the value at `index`; fails with `MissingField` when empty.
    pub fn required<F: Any>(&mut self, index: usize) -> Result<F, CodecError> {
        match self.take::<F>(index)? {
            Some(value) => Ok(value),
            None => Err(CodecError::MissingField {
                field: self.field_name(index),
                type_name: self.type_name.to_string(),
                path: self.path.clone(),
            }),
        }
    }

    pub fn optional<F: Any>(&mut self, index: usize) -> Result<Option<F>, CodecError> {
        self.take::<F>(index)
    }

    pub fn or_default<F: Any + Default>(&mut self, index: usize) -> Result<F, CodecError> {
        Ok(self.take::<F>(index)?.unwrap_or_default())
    }

    fn take<F: Any>(&mut self, index: usize) -> Result<Option<F>, CodecError> {
        let Some(slot) = self.slots.get_mut(index) else {
            return Err(CodecError::mismatch(
                format!("a field at position {index} of {}", self.type_name),
                self.path.clone(),
            ));
        };
        match slot.take() {
            None => Ok(None),
            Some(value) => match value.downcast::<F>() {
                Ok(typed) => Ok(Some(*typed)),
                Err(_) => Err(CodecError::mismatch(
                    std::any::type_name::<F>(),
                    format!("{}.{}", self.path, self.field_name(index)),
                )),
            },
        }
    }

    fn field_name(&self, index: usize) -> String {
        self.fields
            .get(index)
            .cloned()
            .unwrap_or_else(|| index.to_string())
    }
}
