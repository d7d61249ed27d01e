//! Shape descriptors: the static metadata codecs are built from.
//!
//! Every type that crosses the wire implements [`Declared`], returning a
//! [`Declaration`] built with [`Product`] or [`Union`] (or one of the built-in
//! kinds for standard library types). Declarations are plain data; codecs are
//! derived from them once and cached by the registry.

mod product;
mod std_types;
mod union;

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

pub use product::{Arguments, Field, FieldDecl, Product, ProductDecl};
pub use std_types::{ListDecl, MapDecl, OptionalDecl, ScalarKind};
pub use union::{AlternativeDecl, DefaultPolicy, Union, UnionDecl};

pub(crate) use product::{Constructor, ErasedAccessor};
pub(crate) use std_types::{MapOps, OptionOps, SeqOps};
pub(crate) use union::ErasedAlternative;

/// A type with a declared wire shape.
pub trait Declared: Any + Send + Sync + Sized {
    fn declaration() -> Declaration;
}

/// A handle naming a declared type without instantiating it.
#[derive(Clone, Copy)]
pub struct TypeRef {
    id: TypeId,
    name: &'static str,
    declare: fn() -> Declaration,
}

impl TypeRef {
    pub fn of<T: Declared>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            declare: T::declaration,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified Rust type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn declaration(&self) -> Declaration {
        (self.declare)()
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Discriminator values bound to a union leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeLabel {
    pub primary: String,
    pub alternates: Vec<String>,
}

/// Everything the codec builders need to know about one type.
#[derive(Clone)]
pub struct Declaration {
    /// Display name used in error messages, e.g. `Success` or `GenericRecord<String>`.
    pub name: String,
    pub kind: Kind,
    pub label: Option<TypeLabel>,
    pub discriminator: Option<String>,
    /// Declared type parameter names.
    pub generics: Vec<String>,
    /// The enclosing union of an intermediate umbrella.
    pub nested_in: Option<TypeRef>,
}

#[derive(Clone)]
pub enum Kind {
    Product(ProductDecl),
    Union(UnionDecl),
    Scalar(ScalarKind),
    List(ListDecl),
    Optional(OptionalDecl),
    Map(MapDecl),
    Json,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product(_) => "product",
            Self::Union(_) => "union",
            Self::Scalar(_) => "scalar",
            Self::List(_) => "list",
            Self::Optional(_) => "optional",
            Self::Map(_) => "map",
            Self::Json => "json",
        }
    }
}

impl Declaration {
    pub(crate) fn builtin(name: String, kind: Kind) -> Self {
        Self {
            name,
            kind,
            label: None,
            discriminator: None,
            generics: Vec::new(),
            nested_in: None,
        }
    }
}

impl fmt::Debug for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Declaration")
            .field("name", &self.name)
            .field("kind", &self.kind.as_str())
            .field("label", &self.label)
            .field("discriminator", &self.discriminator)
            .field("generics", &self.generics)
            .field("nested_in", &self.nested_in)
            .finish()
    }
}

/// Metadata shared by the product and union builders.
#[derive(Clone, Default)]
pub(crate) struct Meta {
    pub name: String,
    pub label: Option<String>,
    pub alternates: Vec<String>,
    pub discriminator: Option<String>,
    pub generics: Vec<String>,
    pub nested_in: Option<TypeRef>,
}

impl Meta {
    pub fn named<T>() -> Self {
        Self {
            name: short_type_name::<T>(),
            ..Default::default()
        }
    }

    pub fn into_declaration(self, kind: Kind) -> Declaration {
        let alternates = self.alternates;
        Declaration {
            name: self.name,
            kind,
            label: self.label.map(|primary| TypeLabel {
                primary,
                alternates,
            }),
            discriminator: self.discriminator,
            generics: self.generics,
            nested_in: self.nested_in,
        }
    }
}

/// `type_name::<T>()` with every module path removed.
///
/// `app::model::GenericRecord<alloc::string::String>` becomes
/// `GenericRecord<String>`.
pub(crate) fn short_type_name<T: ?Sized>() -> String {
    let full = type_name::<T>();
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0;
    let mut chars = full.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                out.truncate(segment_start);
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';' => {
                out.push(c);
                segment_start = out.len();
            }
            _ => out.push(c),
        }
    }
    out
}
