//! Error types for JSON reading and writing.

use thiserror::Error;

use crate::token::Token;

/// Errors raised by [`crate::JsonReader`] and [`crate::JsonWriter`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreamError {
    /// The next token was not the one the caller asked for.
    #[error("Expected {expected} but was {actual} at path {path}")]
    Unexpected {
        expected: Token,
        actual: Token,
        path: String,
    },
    /// The input is not well-formed JSON.
    #[error("{message} at path {path}")]
    Malformed { message: String, path: String },
    /// A value could not be converted to the requested scalar.
    #[error("Expected {expected} but was {found} at path {path}")]
    Conversion {
        expected: &'static str,
        found: String,
        path: String,
    },
    /// `skip_value`/`skip_name` was called on a reader configured to fail on unknown input.
    #[error("Cannot skip unexpected {token} at {path}")]
    SkipForbidden { token: Token, path: String },
    /// More than [`crate::MAX_NESTING`] objects and arrays are open.
    #[error("Nesting too deep at {path}")]
    NestingTooDeep { path: String },
    /// Invalid UTF-8 in a string or name.
    #[error("Invalid UTF-8 at byte offset {0}")]
    InvalidUtf8(usize),
    /// The writer was driven out of order (value without a name, unbalanced end, ...).
    #[error("Nesting problem: {0}")]
    Nesting(&'static str),
    #[error("Numeric values must be finite, but was {0}")]
    NonFinite(f64),
    /// `finish` was called before the top-level value was complete.
    #[error("Incomplete document")]
    Incomplete,
}

impl StreamError {
    pub(crate) fn malformed(message: impl Into<String>, path: String) -> Self {
        Self::Malformed {
            message: message.into(),
            path,
        }
    }
}
