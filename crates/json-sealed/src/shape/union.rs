//! Union declarations: a closed set of alternatives selected by a
//! discriminator key.

use std::any::{type_name, Any};
use std::marker::PhantomData;
use std::sync::Arc;

use super::{Declaration, Declared, Kind, Meta, TypeRef};
use crate::codec::{Adapted, AnyValue, DynCodec, Instance, JsonAdapter};
use crate::error::CodecError;

/// One hop between a union and one of its direct alternatives.
pub(crate) trait ErasedAlternative: Send + Sync {
    /// Wraps an alternative value into the union type.
    fn inject(&self, value: Instance) -> Result<Instance, CodecError>;

    /// Finds the alternative inside a union value, if it holds one.
    fn project<'a>(&self, value: &'a AnyValue) -> Option<&'a AnyValue>;
}

struct Alternative<T, C> {
    wrap: fn(C) -> T,
    unwrap: fn(&T) -> Option<&C>,
}

impl<T, C> ErasedAlternative for Alternative<T, C>
where
    T: Any + Send + Sync,
    C: Any + Send + Sync,
{
    fn inject(&self, value: Instance) -> Result<Instance, CodecError> {
        match value.downcast::<C>() {
            Ok(alternative) => Ok(Box::new((self.wrap)(*alternative))),
            Err(_) => Err(CodecError::mismatch(
                type_name::<C>(),
                format!("alternative of {}", type_name::<T>()),
            )),
        }
    }

    fn project<'a>(&self, value: &'a AnyValue) -> Option<&'a AnyValue> {
        let union = value.downcast_ref::<T>()?;
        (self.unwrap)(union).map(|alternative| alternative as &AnyValue)
    }
}

#[derive(Clone)]
pub struct AlternativeDecl {
    pub target: TypeRef,
    pub(crate) hop: Arc<dyn ErasedAlternative>,
}

/// What a union does with a discriminator value it does not know.
#[derive(Clone)]
pub enum DefaultPolicy {
    /// Fail with `UnmatchedDiscriminator`.
    Error,
    /// Skip the object and decode to absent.
    NullDefault,
    /// Decode the whole object with this codec; also encodes values that
    /// match no alternative.
    Fallback(Arc<dyn DynCodec>),
    /// Skip the object and produce this value.
    DefaultValue(Arc<dyn Fn() -> Instance + Send + Sync>),
}

impl DefaultPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::NullDefault => "null_default",
            Self::Fallback(_) => "fallback",
            Self::DefaultValue(_) => "default_value",
        }
    }
}

#[derive(Clone)]
pub struct UnionDecl {
    pub alternatives: Vec<AlternativeDecl>,
    /// Declared default policies; empty means [`DefaultPolicy::Error`].
    pub policies: Vec<DefaultPolicy>,
}

/// Builder for a union [`Declaration`].
///
/// ```ignore
/// impl Declared for Message {
///     fn declaration() -> Declaration {
///         Union::<Self>::new()
///             .discriminator("type")
///             .alternative(Message::Success, |m| match m {
///                 Message::Success(s) => Some(s),
///                 _ => None,
///             })
///             .alternative(Message::Error, |m| match m {
///                 Message::Error(e) => Some(e),
///                 _ => None,
///             })
///             .build()
///     }
/// }
/// ```
pub struct Union<T> {
    meta: Meta,
    alternatives: Vec<AlternativeDecl>,
    policies: Vec<DefaultPolicy>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Declared> Default for Union<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Declared> Union<T> {
    pub fn new() -> Self {
        Self {
            meta: Meta::named::<T>(),
            alternatives: Vec::new(),
            policies: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.meta.name = name.to_string();
        self
    }

    pub fn discriminator(mut self, key: &str) -> Self {
        self.meta.discriminator = Some(key.to_string());
        self
    }

    /// Variant label, used when this union is itself an alternative of a
    /// union keyed differently.
    ///
    /// Ignored when the union has no key of its own: its alternatives are
    /// then flattened into the parent's label space and the union never
    /// appears on the wire.
    pub fn label(mut self, primary: &str) -> Self {
        self.meta.label = Some(primary.to_string());
        self
    }

    pub fn alternate(mut self, label: &str) -> Self {
        self.meta.alternates.push(label.to_string());
        self
    }

    pub fn generic(mut self, param: &str) -> Self {
        self.meta.generics.push(param.to_string());
        self
    }

    /// Marks this union as an intermediate umbrella inside `P`. Without its
    /// own key it inherits the nearest ancestor's key and gets a codec of
    /// its own.
    pub fn nested_in<P: Declared>(mut self) -> Self {
        self.meta.nested_in = Some(TypeRef::of::<P>());
        self
    }

    pub fn alternative<C: Declared>(
        mut self,
        wrap: fn(C) -> T,
        unwrap: fn(&T) -> Option<&C>,
    ) -> Self {
        self.alternatives.push(AlternativeDecl {
            target: TypeRef::of::<C>(),
            hop: Arc::new(Alternative { wrap, unwrap }),
        });
        self
    }

    pub fn default_null(mut self) -> Self {
        self.policies.push(DefaultPolicy::NullDefault);
        self
    }

    pub fn fallback<A: JsonAdapter<Value = T>>(mut self, adapter: A) -> Self {
        self.policies
            .push(DefaultPolicy::Fallback(Arc::new(Adapted::new(adapter))));
        self
    }

    pub fn default_value(mut self, make: fn() -> T) -> Self {
        self.policies.push(DefaultPolicy::DefaultValue(Arc::new(move || {
            Box::new(make()) as Instance
        })));
        self
    }

    pub fn build(self) -> Declaration {
        self.meta.into_declaration(Kind::Union(UnionDecl {
            alternatives: self.alternatives,
            policies: self.policies,
        }))
    }
}
