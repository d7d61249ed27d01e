//! Union codec: a discriminator-keyed JSON object ⇄ one of the union's
//! leaves.
//!
//! Decoding peeks ahead for the discriminator key, wherever it sits in the
//! object, then hands the whole object to the selected leaf's codec. Encoding
//! writes the key first and flattens the leaf's own object into the same
//! JSON object.

use std::sync::Arc;

use json_sealed_stream::{JsonReader, JsonWriter, Options, Token};
use tracing::debug;

use crate::codec::{AnyValue, DynCodec, Instance};
use crate::error::{BuildError, CodecError};
use crate::registry::{Qualifiers, Registry};
use crate::resolve::resolve;
use crate::shape::{Declaration, DefaultPolicy, ErasedAlternative, UnionDecl};

struct LeafBinding {
    name: String,
    primary: String,
    codec: Arc<dyn DynCodec>,
    route: Vec<Arc<dyn ErasedAlternative>>,
}

impl LeafBinding {
    /// Wraps a decoded leaf value back up to the root type.
    fn wrap(&self, mut value: Instance) -> Result<Instance, CodecError> {
        for hop in self.route.iter().rev() {
            value = hop.inject(value)?;
        }
        Ok(value)
    }

    /// Finds this leaf inside a root value.
    fn project<'a>(&self, value: &'a AnyValue) -> Option<&'a AnyValue> {
        let mut current = value;
        for hop in &self.route {
            current = hop.project(current)?;
        }
        Some(current)
    }
}

enum Lookup {
    Matched(usize),
    Unmatched(String),
}

pub struct UnionCodec {
    type_name: String,
    key: String,
    key_options: Options,
    /// Primary and alternate labels, in registration order.
    label_options: Options,
    /// Leaf index for each entry of `label_options`.
    label_targets: Vec<usize>,
    leaves: Vec<LeafBinding>,
    policy: DefaultPolicy,
}

impl UnionCodec {
    pub fn build(
        decl: &Declaration,
        union: &UnionDecl,
        key: &str,
        registry: &Registry,
    ) -> Result<Self, BuildError> {
        let policy = match union.policies.as_slice() {
            [] => DefaultPolicy::Error,
            [policy] => policy.clone(),
            _ => {
                return Err(BuildError::ConflictingDefaultPolicy {
                    type_name: decl.name.clone(),
                })
            }
        };

        let resolution = resolve(decl, union, key)?;
        let unqualified = Qualifiers::new();
        let mut leaves = Vec::with_capacity(resolution.leaves.len());
        for leaf in resolution.leaves {
            leaves.push(LeafBinding {
                codec: registry.codec_for(leaf.target, &unqualified)?,
                name: leaf.name,
                primary: leaf.label.primary,
                route: leaf.route,
            });
        }

        debug!(
            union = %decl.name,
            key,
            leaves = leaves.len(),
            policy = policy.as_str(),
            "built union codec"
        );
        Ok(Self {
            type_name: decl.name.clone(),
            key: key.to_string(),
            key_options: Options::of([key]),
            label_options: Options::of(resolution.labels.keys().cloned()),
            label_targets: resolution.labels.values().copied().collect(),
            leaves,
            policy,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Every accepted label, primaries and alternates, in registration order.
    pub fn labels(&self) -> &[String] {
        self.label_options.strings()
    }

    /// Scans a copy of the reader for the discriminator.
    fn lookup(&self, reader: &JsonReader<'_>) -> Result<Lookup, CodecError> {
        let mut peeked = reader.peek_json();
        peeked.set_fail_on_unknown(false);
        peeked.begin_object()?;
        while peeked.has_next()? {
            if peeked.select_name(&self.key_options)?.is_none() {
                peeked.skip_name()?;
                peeked.skip_value()?;
                continue;
            }
            if peeked.peek()? != Token::String {
                return Err(CodecError::mismatch(
                    format!("a string label for key '{}'", self.key),
                    peeked.path(),
                ));
            }
            if let Some(index) = peeked.select_string(&self.label_options)? {
                return Ok(Lookup::Matched(self.label_targets[index]));
            }
            return Ok(Lookup::Unmatched(peeked.next_string()?));
        }
        Err(CodecError::MissingDiscriminator {
            key: self.key.clone(),
            path: reader.path(),
        })
    }
}

/// Runs `f` with unknown-key strictness off; the discriminator key itself is
/// unknown to the leaf codec.
fn lenient<'a, R>(reader: &mut JsonReader<'a>, f: impl FnOnce(&mut JsonReader<'a>) -> R) -> R {
    let strict = reader.options().fail_on_unknown;
    reader.set_fail_on_unknown(false);
    let out = f(reader);
    reader.set_fail_on_unknown(strict);
    out
}

impl DynCodec for UnionCodec {
    fn decode(&self, reader: &mut JsonReader<'_>) -> Result<Option<Instance>, CodecError> {
        if reader.peek()? == Token::Null {
            reader.next_null()?;
            return Ok(None);
        }
        let path = reader.path();
        let found = match self.lookup(reader)? {
            Lookup::Matched(index) => {
                let leaf = &self.leaves[index];
                return match lenient(reader, |r| leaf.codec.decode(r))? {
                    Some(value) => leaf.wrap(value).map(Some),
                    None => Err(CodecError::mismatch(leaf.name.as_str(), path)),
                };
            }
            Lookup::Unmatched(found) => found,
        };

        match &self.policy {
            DefaultPolicy::Error => Err(CodecError::UnmatchedDiscriminator {
                key: self.key.clone(),
                labels: self.labels().to_vec(),
                found,
                path,
            }),
            DefaultPolicy::NullDefault => {
                debug!(union = %self.type_name, label = %found, "unknown label, decoding to null");
                lenient(reader, |r| r.skip_value())?;
                Ok(None)
            }
            DefaultPolicy::Fallback(fallback) => {
                debug!(union = %self.type_name, label = %found, "unknown label, using fallback");
                fallback.decode(reader)
            }
            DefaultPolicy::DefaultValue(make) => {
                debug!(union = %self.type_name, label = %found, "unknown label, using default value");
                lenient(reader, |r| r.skip_value())?;
                Ok(Some(make()))
            }
        }
    }

    fn encode(&self, writer: &mut JsonWriter, value: &AnyValue) -> Result<(), CodecError> {
        for leaf in &self.leaves {
            let Some(inner) = leaf.project(value) else {
                continue;
            };
            writer.begin_object()?;
            writer.name(&self.key)?;
            writer.string_value(&leaf.primary)?;
            let token = writer.begin_flatten()?;
            let written = leaf.codec.encode(writer, inner);
            writer.end_flatten(token);
            written?;
            writer.end_object()?;
            return Ok(());
        }

        match &self.policy {
            DefaultPolicy::Fallback(fallback) => fallback.encode(writer, value),
            _ => Err(CodecError::UnregisteredVariant {
                union: self.type_name.clone(),
            }),
        }
    }
}
