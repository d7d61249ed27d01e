//! Declared product types and sealed unions mapped to JSON objects.
//!
//! A product is a fixed, ordered set of named fields built by one positional
//! constructor. A union is a closed set of alternatives told apart by a
//! discriminator key; alternatives may themselves be unions, either flattened
//! into the parent's label space or keyed independently.
//!
//! Types describe themselves by implementing [`Declared`]; the [`Registry`]
//! derives one immutable codec per (type, qualifiers) pair, validating the
//! declaration up front, and caches it.
//!
//! ```ignore
//! let registry = Registry::new();
//! let codec = registry.codec::<Message>()?;
//! let message = codec.from_json(r#"{"type":"success","value":"Okay!"}"#)?;
//! ```

mod builtin;
mod codec;
mod dispatch;
mod error;
mod product;
mod registry;
mod resolve;
pub mod shape;
mod union;

pub use builtin::BuiltinFactory;
pub use codec::{Adapted, AnyValue, Codec, DynCodec, Instance, JsonAdapter};
pub use dispatch::DeclaredFactory;
pub use error::{BuildError, CodecError};
pub use product::{FieldBinding, ProductCodec};
pub use registry::{qualifiers, CodecFactory, Qualifiers, Registry, RegistryBuilder, RegistryOptions};
pub use shape::{
    Arguments, Declaration, Declared, DefaultPolicy, Field, Kind, Product, TypeLabel, TypeRef,
    Union,
};
pub use union::UnionCodec;

pub use json_sealed_stream::{
    JsonReader, JsonWriter, Options, ReaderOptions, StreamError, Token, WriterOptions,
};
