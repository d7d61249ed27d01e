//! Product codec: JSON object ⇄ positional constructor call.

use std::collections::HashMap;
use std::sync::Arc;

use json_sealed_stream::{JsonReader, JsonWriter, Options, Token};

use crate::codec::{AnyValue, DynCodec, Instance};
use crate::error::{BuildError, CodecError, ENCODING};
use crate::registry::Registry;
use crate::shape::{Arguments, Constructor, Declaration, ErasedAccessor, ProductDecl};

/// One declared field with its resolved codec.
pub struct FieldBinding {
    pub source_name: String,
    pub wire_name: String,
    codec: Arc<dyn DynCodec>,
    accessor: Arc<dyn ErasedAccessor>,
}

pub struct ProductCodec {
    type_name: Arc<str>,
    bindings: Vec<FieldBinding>,
    names: Options,
    source_names: Arc<[String]>,
    constructor: Constructor,
    accepts: fn(&AnyValue) -> bool,
}

impl ProductCodec {
    pub fn build(
        decl: &Declaration,
        product: &ProductDecl,
        registry: &Registry,
    ) -> Result<Self, BuildError> {
        let mut seen: HashMap<&str, &str> = HashMap::new();
        for field in &product.fields {
            if let Some(first) = seen.insert(&field.wire_name, &field.source_name) {
                return Err(BuildError::DuplicateWireName {
                    type_name: decl.name.clone(),
                    wire_name: field.wire_name.clone(),
                    first: first.to_string(),
                    second: field.source_name.clone(),
                });
            }
        }

        let mut bindings = Vec::with_capacity(product.fields.len());
        for field in &product.fields {
            bindings.push(FieldBinding {
                source_name: field.source_name.clone(),
                wire_name: field.wire_name.clone(),
                codec: registry.codec_for(field.ty, &field.qualifiers)?,
                accessor: field.accessor.clone(),
            });
        }

        Ok(Self {
            type_name: Arc::from(decl.name.as_str()),
            names: Options::of(bindings.iter().map(|b| b.wire_name.clone())),
            source_names: bindings.iter().map(|b| b.source_name.clone()).collect(),
            bindings,
            constructor: product.constructor.clone(),
            accepts: product.accepts,
        })
    }

    pub fn bindings(&self) -> &[FieldBinding] {
        &self.bindings
    }
}

impl DynCodec for ProductCodec {
    fn decode(&self, reader: &mut JsonReader<'_>) -> Result<Option<Instance>, CodecError> {
        if reader.peek()? == Token::Null {
            reader.next_null()?;
            return Ok(None);
        }
        let path = reader.path();
        let mut slots: Vec<Option<Instance>> = self.bindings.iter().map(|_| None).collect();

        reader.begin_object()?;
        while reader.has_next()? {
            match reader.select_name(&self.names)? {
                Some(index) => slots[index] = self.bindings[index].codec.decode(reader)?,
                None => {
                    reader.skip_name()?;
                    reader.skip_value()?;
                }
            }
        }
        reader.end_object()?;

        let mut args = Arguments::new(
            slots,
            self.source_names.clone(),
            self.type_name.clone(),
            path,
        );
        (self.constructor)(&mut args).map(Some)
    }

    fn encode(&self, writer: &mut JsonWriter, value: &AnyValue) -> Result<(), CodecError> {
        if !(self.accepts)(value) {
            return Err(CodecError::mismatch(&*self.type_name, ENCODING));
        }
        writer.begin_object()?;
        for binding in &self.bindings {
            let field = binding
                .accessor
                .get(value)
                .ok_or_else(|| CodecError::mismatch(&*self.type_name, ENCODING))?;
            writer.name(&binding.wire_name)?;
            binding.codec.encode(writer, field)?;
        }
        writer.end_object()?;
        Ok(())
    }
}
