//! Token kinds and the known-name set used for fast selection.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The kind of the next token in a JSON stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    BeginObject,
    EndObject,
    BeginArray,
    EndArray,
    Name,
    String,
    Number,
    Bool,
    Null,
    EndDocument,
}

impl Token {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeginObject => "BEGIN_OBJECT",
            Self::EndObject => "END_OBJECT",
            Self::BeginArray => "BEGIN_ARRAY",
            Self::EndArray => "END_ARRAY",
            Self::Name => "NAME",
            Self::String => "STRING",
            Self::Number => "NUMBER",
            Self::Bool => "BOOLEAN",
            Self::Null => "NULL",
            Self::EndDocument => "END_DOCUMENT",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable set of known strings, each mapped to its position.
///
/// Built once (typically at codec construction) and shared by every read:
/// [`crate::JsonReader::select_name`] and [`crate::JsonReader::select_string`]
/// resolve a name to its index without allocating per call.
#[derive(Debug, Clone)]
pub struct Options {
    strings: Arc<[String]>,
    index: Arc<HashMap<String, usize>>,
}

impl Options {
    /// Builds the set. A repeated string keeps its first index.
    pub fn of<I, S>(strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let strings: Vec<String> = strings.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(strings.len());
        for (i, s) in strings.iter().enumerate() {
            index.entry(s.clone()).or_insert(i);
        }
        Self {
            strings: strings.into(),
            index: Arc::new(index),
        }
    }

    pub fn get(&self, s: &str) -> Option<usize> {
        self.index.get(s).copied()
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
