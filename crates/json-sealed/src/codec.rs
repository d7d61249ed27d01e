//! Object-safe codec interface and the typed handles around it.

use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use json_sealed_stream::{JsonReader, JsonWriter, Token};

use crate::error::CodecError;
use crate::registry::RegistryOptions;

/// A borrowed value of some declared type.
pub type AnyValue = dyn Any + Send + Sync;

/// An owned value of some declared type.
pub type Instance = Box<AnyValue>;

/// Type-erased codec, as stored in the registry.
///
/// `decode` returns `None` when the JSON value is `null` and the codec's type
/// has no representation for it. `encode` receives a value of the codec's
/// type and fails with [`CodecError::TypeMismatch`] otherwise.
pub trait DynCodec: Send + Sync {
    fn decode(&self, reader: &mut JsonReader<'_>) -> Result<Option<Instance>, CodecError>;

    fn encode(&self, writer: &mut JsonWriter, value: &AnyValue) -> Result<(), CodecError>;
}

/// A hand-written codec for one concrete type.
///
/// Register it with [`crate::RegistryBuilder::adapter`] (optionally under a
/// qualifier set) or use it as a union's fallback. Adapters never see a JSON
/// `null`; the registry wraps them so that `null` decodes to absent.
pub trait JsonAdapter: Send + Sync + 'static {
    type Value: Any + Send + Sync;

    fn from_json(&self, reader: &mut JsonReader<'_>) -> Result<Self::Value, CodecError>;

    fn to_json(&self, writer: &mut JsonWriter, value: &Self::Value) -> Result<(), CodecError>;
}

/// Null-safe [`DynCodec`] over a [`JsonAdapter`].
pub struct Adapted<A> {
    adapter: A,
}

impl<A: JsonAdapter> Adapted<A> {
    pub fn new(adapter: A) -> Self {
        Self { adapter }
    }
}

impl<A: JsonAdapter> DynCodec for Adapted<A> {
    fn decode(&self, reader: &mut JsonReader<'_>) -> Result<Option<Instance>, CodecError> {
        if reader.peek()? == Token::Null {
            reader.next_null()?;
            return Ok(None);
        }
        let value = self.adapter.from_json(reader)?;
        Ok(Some(Box::new(value)))
    }

    fn encode(&self, writer: &mut JsonWriter, value: &AnyValue) -> Result<(), CodecError> {
        match value.downcast_ref::<A::Value>() {
            Some(typed) => self.adapter.to_json(writer, typed),
            None => Err(CodecError::mismatch(
                type_name::<A::Value>(),
                crate::error::ENCODING,
            )),
        }
    }
}

/// Typed handle over an erased codec.
pub struct Codec<T> {
    inner: Arc<dyn DynCodec>,
    options: RegistryOptions,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Codec<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            options: self.options.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Codec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("type", &type_name::<T>())
            .field("options", &self.options)
            .finish()
    }
}

impl<T: Any + Send + Sync> Codec<T> {
    pub(crate) fn new(inner: Arc<dyn DynCodec>, options: RegistryOptions) -> Self {
        Self {
            inner,
            options,
            _marker: PhantomData,
        }
    }

    pub fn erased(&self) -> &Arc<dyn DynCodec> {
        &self.inner
    }

    pub fn decode(&self, reader: &mut JsonReader<'_>) -> Result<Option<T>, CodecError> {
        let path = reader.path();
        match self.inner.decode(reader)? {
            None => Ok(None),
            Some(value) => value
                .downcast::<T>()
                .map(|typed| Some(*typed))
                .map_err(|_| CodecError::mismatch(type_name::<T>(), path)),
        }
    }

    pub fn encode(&self, writer: &mut JsonWriter, value: &T) -> Result<(), CodecError> {
        self.inner.encode(writer, value)
    }

    /// Decodes a complete document. `null` yields `Ok(None)`.
    pub fn from_json(&self, json: &str) -> Result<Option<T>, CodecError> {
        let mut reader = JsonReader::new(json).with_options(self.options.reader.clone());
        let value = self.decode(&mut reader)?;
        reader.end_document()?;
        Ok(value)
    }

    pub fn to_json(&self, value: &T) -> Result<String, CodecError> {
        let mut writer = JsonWriter::with_options(self.options.writer.clone());
        self.encode(&mut writer, value)?;
        Ok(writer.finish()?)
    }
}
