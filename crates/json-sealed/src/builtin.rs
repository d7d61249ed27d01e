//! Codecs for standard library types: scalars, `Vec`, `Option`,
//! string-keyed maps and `serde_json::Value`.

use std::any::{type_name, Any};
use std::collections::HashSet;
use std::sync::Arc;

use json_sealed_stream::{JsonReader, JsonWriter, StreamError, Token};
use serde_json::Value;

use crate::codec::{AnyValue, DynCodec, Instance};
use crate::error::{BuildError, CodecError, ENCODING};
use crate::registry::{CodecFactory, Qualifiers, Registry};
use crate::shape::{Kind, MapOps, OptionOps, ScalarKind, SeqOps, TypeRef};

/// Serves unqualified requests for built-in kinds.
pub struct BuiltinFactory;

impl CodecFactory for BuiltinFactory {
    fn create(
        &self,
        ty: TypeRef,
        qualifiers: &Qualifiers,
        registry: &Registry,
    ) -> Result<Option<Arc<dyn DynCodec>>, BuildError> {
        if !qualifiers.is_empty() {
            return Ok(None);
        }
        let unqualified = Qualifiers::new();
        let codec: Arc<dyn DynCodec> = match ty.declaration().kind {
            Kind::Scalar(kind) => Arc::new(ScalarCodec { kind }),
            Kind::List(list) => Arc::new(ListCodec {
                item: registry.codec_for(list.item, &unqualified)?,
                ops: list.ops,
                type_name: ty.name(),
            }),
            Kind::Optional(optional) => Arc::new(OptionCodec {
                inner: registry.codec_for(optional.inner, &unqualified)?,
                ops: optional.ops,
                type_name: ty.name(),
            }),
            Kind::Map(map) => Arc::new(MapCodec {
                value: registry.codec_for(map.value, &unqualified)?,
                ops: map.ops,
                type_name: ty.name(),
            }),
            Kind::Json => Arc::new(JsonValueCodec),
            Kind::Product(_) | Kind::Union(_) => return Ok(None),
        };
        Ok(Some(codec))
    }
}

fn downcast<'a, V: Any>(value: &'a AnyValue) -> Result<&'a V, CodecError> {
    value
        .downcast_ref::<V>()
        .ok_or_else(|| CodecError::mismatch(type_name::<V>(), ENCODING))
}

/// Consumes a `null` if one is next.
fn take_null(reader: &mut JsonReader<'_>) -> Result<bool, CodecError> {
    if reader.peek()? == Token::Null {
        reader.next_null()?;
        return Ok(true);
    }
    Ok(false)
}

// ---------------------------------------------------------------------------
// Scalars

struct ScalarCodec {
    kind: ScalarKind,
}

fn narrow<N: TryFrom<i64>>(
    reader: &mut JsonReader<'_>,
    expected: &'static str,
) -> Result<N, CodecError> {
    let path = reader.path();
    let wide = reader.next_i64()?;
    N::try_from(wide).map_err(|_| {
        CodecError::from(StreamError::Conversion {
            expected,
            found: wide.to_string(),
            path,
        })
    })
}

impl DynCodec for ScalarCodec {
    fn decode(&self, reader: &mut JsonReader<'_>) -> Result<Option<Instance>, CodecError> {
        if take_null(reader)? {
            return Ok(None);
        }
        let value: Instance = match self.kind {
            ScalarKind::String => Box::new(reader.next_string()?),
            ScalarKind::Bool => Box::new(reader.next_bool()?),
            ScalarKind::Char => {
                let path = reader.path();
                let text = reader.next_string()?;
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Box::new(c),
                    _ => {
                        return Err(StreamError::Conversion {
                            expected: "a char",
                            found: format!("\"{text}\""),
                            path,
                        }
                        .into())
                    }
                }
            }
            ScalarKind::I8 => Box::new(narrow::<i8>(reader, "a byte")?),
            ScalarKind::I16 => Box::new(narrow::<i16>(reader, "a short")?),
            ScalarKind::I32 => Box::new(narrow::<i32>(reader, "an int")?),
            ScalarKind::I64 => Box::new(reader.next_i64()?),
            ScalarKind::U8 => Box::new(narrow::<u8>(reader, "an unsigned byte")?),
            ScalarKind::U16 => Box::new(narrow::<u16>(reader, "an unsigned short")?),
            ScalarKind::U32 => Box::new(narrow::<u32>(reader, "an unsigned int")?),
            ScalarKind::U64 => Box::new(reader.next_u64()?),
            ScalarKind::F32 => Box::new(reader.next_f64()? as f32),
            ScalarKind::F64 => Box::new(reader.next_f64()?),
        };
        Ok(Some(value))
    }

    fn encode(&self, writer: &mut JsonWriter, value: &AnyValue) -> Result<(), CodecError> {
        match self.kind {
            ScalarKind::String => writer.string_value(downcast::<String>(value)?)?,
            ScalarKind::Bool => writer.bool_value(*downcast::<bool>(value)?)?,
            ScalarKind::Char => {
                let mut buf = [0u8; 4];
                writer.string_value(downcast::<char>(value)?.encode_utf8(&mut buf))?
            }
            ScalarKind::I8 => writer.i64_value(i64::from(*downcast::<i8>(value)?))?,
            ScalarKind::I16 => writer.i64_value(i64::from(*downcast::<i16>(value)?))?,
            ScalarKind::I32 => writer.i64_value(i64::from(*downcast::<i32>(value)?))?,
            ScalarKind::I64 => writer.i64_value(*downcast::<i64>(value)?)?,
            ScalarKind::U8 => writer.u64_value(u64::from(*downcast::<u8>(value)?))?,
            ScalarKind::U16 => writer.u64_value(u64::from(*downcast::<u16>(value)?))?,
            ScalarKind::U32 => writer.u64_value(u64::from(*downcast::<u32>(value)?))?,
            ScalarKind::U64 => writer.u64_value(*downcast::<u64>(value)?)?,
            ScalarKind::F32 => writer.f64_value(f64::from(*downcast::<f32>(value)?))?,
            ScalarKind::F64 => writer.f64_value(*downcast::<f64>(value)?)?,
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Vec<T>

struct ListCodec {
    item: Arc<dyn DynCodec>,
    ops: Arc<dyn SeqOps>,
    type_name: &'static str,
}

impl DynCodec for ListCodec {
    fn decode(&self, reader: &mut JsonReader<'_>) -> Result<Option<Instance>, CodecError> {
        if take_null(reader)? {
            return Ok(None);
        }
        let path = reader.path();
        let mut items = Vec::new();
        reader.begin_array()?;
        while reader.has_next()? {
            let item_path = reader.path();
            match self.item.decode(reader)? {
                Some(item) => items.push(item),
                None => return Err(CodecError::mismatch("a non-null element", item_path)),
            }
        }
        reader.end_array()?;
        let list = self
            .ops
            .collect(items)
            .ok_or_else(|| CodecError::mismatch(self.type_name, path))?;
        Ok(Some(list))
    }

    fn encode(&self, writer: &mut JsonWriter, value: &AnyValue) -> Result<(), CodecError> {
        let items = self
            .ops
            .items(value)
            .ok_or_else(|| CodecError::mismatch(self.type_name, ENCODING))?;
        writer.begin_array()?;
        for item in items {
            self.item.encode(writer, item)?;
        }
        writer.end_array()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Option<T>

struct OptionCodec {
    inner: Arc<dyn DynCodec>,
    ops: Arc<dyn OptionOps>,
    type_name: &'static str,
}

impl DynCodec for OptionCodec {
    fn decode(&self, reader: &mut JsonReader<'_>) -> Result<Option<Instance>, CodecError> {
        if take_null(reader)? {
            return Ok(Some(self.ops.none()));
        }
        let path = reader.path();
        let value = match self.inner.decode(reader)? {
            Some(inner) => self
                .ops
                .some(inner)
                .ok_or_else(|| CodecError::mismatch(self.type_name, path))?,
            None => self.ops.none(),
        };
        Ok(Some(value))
    }

    fn encode(&self, writer: &mut JsonWriter, value: &AnyValue) -> Result<(), CodecError> {
        match self.ops.get(value) {
            Some(Some(inner)) => self.inner.encode(writer, inner),
            Some(None) => Ok(writer.null_value()?),
            None => Err(CodecError::mismatch(self.type_name, ENCODING)),
        }
    }
}

// ---------------------------------------------------------------------------
// String-keyed maps

struct MapCodec {
    value: Arc<dyn DynCodec>,
    ops: Arc<dyn MapOps>,
    type_name: &'static str,
}

impl DynCodec for MapCodec {
    fn decode(&self, reader: &mut JsonReader<'_>) -> Result<Option<Instance>, CodecError> {
        if take_null(reader)? {
            return Ok(None);
        }
        let path = reader.path();
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        reader.begin_object()?;
        while reader.has_next()? {
            let key = reader.next_name()?;
            let value_path = reader.path();
            let value = self
                .value
                .decode(reader)?
                .ok_or_else(|| CodecError::mismatch("a non-null map value", value_path.clone()))?;
            if !seen.insert(key.clone()) {
                return Err(StreamError::Malformed {
                    message: format!("Map key '{key}' has multiple values"),
                    path: value_path,
                }
                .into());
            }
            entries.push((key, value));
        }
        reader.end_object()?;
        let map = self
            .ops
            .collect(entries)
            .ok_or_else(|| CodecError::mismatch(self.type_name, path))?;
        Ok(Some(map))
    }

    fn encode(&self, writer: &mut JsonWriter, value: &AnyValue) -> Result<(), CodecError> {
        let entries = self
            .ops
            .entries(value)
            .ok_or_else(|| CodecError::mismatch(self.type_name, ENCODING))?;
        writer.begin_object()?;
        for (key, item) in entries {
            writer.name(key)?;
            self.value.encode(writer, item)?;
        }
        writer.end_object()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// serde_json::Value

/// Untyped values. Numbers decode as doubles.
struct JsonValueCodec;

impl DynCodec for JsonValueCodec {
    fn decode(&self, reader: &mut JsonReader<'_>) -> Result<Option<Instance>, CodecError> {
        Ok(Some(Box::new(reader.read_json_value()?)))
    }

    fn encode(&self, writer: &mut JsonWriter, value: &AnyValue) -> Result<(), CodecError> {
        Ok(writer.json_value(downcast::<Value>(value)?)?)
    }
}
