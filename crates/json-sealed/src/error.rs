//! Construction-time and run-time error types.

use json_sealed_stream::StreamError;
use thiserror::Error;

/// Raised while building a codec. Fatal for the requested type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Union alternative {type_name} of {union} must declare a variant label")]
    MissingLabel { type_name: String, union: String },

    #[error("Duplicate label '{label}' defined for {first} and {second}.")]
    DuplicateLabel {
        label: String,
        first: String,
        second: String,
    },

    #[error("Duplicate alternate label '{label}' defined for {first} and {second}.")]
    DuplicateAlternateLabel {
        label: String,
        first: String,
        second: String,
    },

    #[error("{type_name} is redundantly declared as a union keyed by '{key}', the key of its parent")]
    RedundantUnionRedeclaration { type_name: String, key: String },

    #[error("{type_name} declares both a variant label and its own discriminator key")]
    LabelledUnionKey { type_name: String },

    #[error("Union alternatives cannot be generic: {type_name}")]
    GenericLeafRejected { type_name: String },

    #[error("{type_name} declares more than one default policy")]
    ConflictingDefaultPolicy { type_name: String },

    #[error("{type_name} declares fields '{first}' and '{second}' with the same JSON name '{wire_name}'")]
    DuplicateWireName {
        type_name: String,
        wire_name: String,
        first: String,
        second: String,
    },

    #[error("{type_name} has a field named '{key}', which clashes with the discriminator key of {union}")]
    DiscriminatorFieldClash {
        type_name: String,
        key: String,
        union: String,
    },

    #[error("No codec for {type_name} annotated {qualifiers}")]
    NoCodec {
        type_name: String,
        qualifiers: String,
    },
}

/// Raised while decoding or encoding one message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error(
        "Expected one of [{}] for key '{key}' but found '{found}'. Register a subtype for this label.",
        .labels.join(", ")
    )]
    UnmatchedDiscriminator {
        key: String,
        labels: Vec<String>,
        found: String,
        path: String,
    },

    #[error("Missing label for {key} at path {path}")]
    MissingDiscriminator { key: String, path: String },

    #[error("Required value '{field}' missing for {type_name} at path {path}")]
    MissingField {
        field: String,
        type_name: String,
        path: String,
    },

    #[error("Expected one of the registered alternatives of {union} but found an unregistered value. Register this subtype.")]
    UnregisteredVariant { union: String },

    #[error("Expected {expected} at {path}")]
    TypeMismatch { expected: String, path: String },

    #[error("Codec for {0} was used before its construction completed")]
    Unresolved(String),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

impl CodecError {
    pub(crate) fn mismatch(expected: impl Into<String>, path: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            path: path.into(),
        }
    }
}

/// Location reported for mismatches found while encoding.
pub(crate) const ENCODING: &str = "(encoding)";
