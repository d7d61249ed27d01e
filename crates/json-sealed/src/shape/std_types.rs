//! Declarations for standard library types.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use super::{short_type_name, Declaration, Declared, Kind, TypeRef};
use crate::codec::{AnyValue, Instance};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

macro_rules! declare_scalars {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Declared for $ty {
                fn declaration() -> Declaration {
                    Declaration::builtin(short_type_name::<$ty>(), Kind::Scalar(ScalarKind::$kind))
                }
            }
        )*
    };
}

declare_scalars! {
    String => String,
    bool => Bool,
    char => Char,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}

impl Declared for Value {
    fn declaration() -> Declaration {
        Declaration::builtin("Value".to_string(), Kind::Json)
    }
}

// ---------------------------------------------------------------------------
// Vec<T>

pub(crate) trait SeqOps: Send + Sync {
    fn items<'a>(&self, value: &'a AnyValue) -> Option<Vec<&'a AnyValue>>;
    fn collect(&self, items: Vec<Instance>) -> Option<Instance>;
}

struct SeqOf<T>(PhantomData<fn() -> T>);

impl<T: Declared> SeqOps for SeqOf<T> {
    fn items<'a>(&self, value: &'a AnyValue) -> Option<Vec<&'a AnyValue>> {
        let items = value.downcast_ref::<Vec<T>>()?;
        Some(items.iter().map(|item| item as &AnyValue).collect())
    }

    fn collect(&self, items: Vec<Instance>) -> Option<Instance> {
        let mut out: Vec<T> = Vec::with_capacity(items.len());
        for item in items {
            out.push(*item.downcast::<T>().ok()?);
        }
        Some(Box::new(out))
    }
}

#[derive(Clone)]
pub struct ListDecl {
    pub item: TypeRef,
    pub(crate) ops: Arc<dyn SeqOps>,
}

impl<T: Declared> Declared for Vec<T> {
    fn declaration() -> Declaration {
        Declaration::builtin(
            short_type_name::<Self>(),
            Kind::List(ListDecl {
                item: TypeRef::of::<T>(),
                ops: Arc::new(SeqOf::<T>(PhantomData)),
            }),
        )
    }
}

// ---------------------------------------------------------------------------
// Option<T>

pub(crate) trait OptionOps: Send + Sync {
    /// `None` when `value` is not an `Option<T>`.
    fn get<'a>(&self, value: &'a AnyValue) -> Option<Option<&'a AnyValue>>;
    fn none(&self) -> Instance;
    fn some(&self, inner: Instance) -> Option<Instance>;
}

struct OptionOf<T>(PhantomData<fn() -> T>);

impl<T: Declared> OptionOps for OptionOf<T> {
    fn get<'a>(&self, value: &'a AnyValue) -> Option<Option<&'a AnyValue>> {
        let option = value.downcast_ref::<Option<T>>()?;
        Some(option.as_ref().map(|inner| inner as &AnyValue))
    }

    fn none(&self) -> Instance {
        Box::new(None::<T>)
    }

    fn some(&self, inner: Instance) -> Option<Instance> {
        let inner = inner.downcast::<T>().ok()?;
        Some(Box::new(Some(*inner)))
    }
}

#[derive(Clone)]
pub struct OptionalDecl {
    pub inner: TypeRef,
    pub(crate) ops: Arc<dyn OptionOps>,
}

impl<T: Declared> Declared for Option<T> {
    fn declaration() -> Declaration {
        Declaration::builtin(
            short_type_name::<Self>(),
            Kind::Optional(OptionalDecl {
                inner: TypeRef::of::<T>(),
                ops: Arc::new(OptionOf::<T>(PhantomData)),
            }),
        )
    }
}

// ---------------------------------------------------------------------------
// String-keyed maps

pub(crate) trait MapOps: Send + Sync {
    fn entries<'a>(&self, value: &'a AnyValue) -> Option<Vec<(&'a str, &'a AnyValue)>>;
    fn collect(&self, entries: Vec<(String, Instance)>) -> Option<Instance>;
}

trait StringKeyed: Any + Send + Sync {
    type Value: Declared;

    fn entries(&self) -> Vec<(&str, &Self::Value)>;

    fn from_entries(entries: Vec<(String, Self::Value)>) -> Self;
}

impl<V: Declared> StringKeyed for BTreeMap<String, V> {
    type Value = V;

    fn entries(&self) -> Vec<(&str, &V)> {
        self.iter().map(|(k, v)| (k.as_str(), v)).collect()
    }

    fn from_entries(entries: Vec<(String, V)>) -> Self {
        entries.into_iter().collect()
    }
}

impl<V: Declared> StringKeyed for HashMap<String, V> {
    type Value = V;

    fn entries(&self) -> Vec<(&str, &V)> {
        self.iter().map(|(k, v)| (k.as_str(), v)).collect()
    }

    fn from_entries(entries: Vec<(String, V)>) -> Self {
        entries.into_iter().collect()
    }
}

impl<V: Declared> StringKeyed for IndexMap<String, V> {
    type Value = V;

    fn entries(&self) -> Vec<(&str, &V)> {
        self.iter().map(|(k, v)| (k.as_str(), v)).collect()
    }

    fn from_entries(entries: Vec<(String, V)>) -> Self {
        entries.into_iter().collect()
    }
}

struct MapOf<M>(PhantomData<fn() -> M>);

impl<M: StringKeyed> MapOps for MapOf<M> {
    fn entries<'a>(&self, value: &'a AnyValue) -> Option<Vec<(&'a str, &'a AnyValue)>> {
        let map = value.downcast_ref::<M>()?;
        Some(
            map.entries()
                .into_iter()
                .map(|(k, v)| (k, v as &AnyValue))
                .collect(),
        )
    }

    fn collect(&self, entries: Vec<(String, Instance)>) -> Option<Instance> {
        let mut typed = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            typed.push((key, *value.downcast::<M::Value>().ok()?));
        }
        Some(Box::new(M::from_entries(typed)))
    }
}

#[derive(Clone)]
pub struct MapDecl {
    pub value: TypeRef,
    pub(crate) ops: Arc<dyn MapOps>,
}

fn map_declaration<M: StringKeyed>() -> Declaration {
    Declaration::builtin(
        short_type_name::<M>(),
        Kind::Map(MapDecl {
            value: TypeRef::of::<M::Value>(),
            ops: Arc::new(MapOf::<M>(PhantomData)),
        }),
    )
}

impl<V: Declared> Declared for BTreeMap<String, V> {
    fn declaration() -> Declaration {
        map_declaration::<Self>()
    }
}

impl<V: Declared> Declared for HashMap<String, V> {
    fn declaration() -> Declaration {
        map_declaration::<Self>()
    }
}

impl<V: Declared> Declared for IndexMap<String, V> {
    fn declaration() -> Declaration {
        map_declaration::<Self>()
    }
}
