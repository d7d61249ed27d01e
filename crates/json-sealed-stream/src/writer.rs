//! `JsonWriter`: streaming JSON writer into a `String`.
//!
//! String escaping and float formatting follow the byte-level `JsonEncoder`.
//! On top of that the writer tracks a scope stack so it can place separators
//! itself, defer names until a value arrives (dropping `name: null` pairs when
//! nulls are not serialized), and flatten one nested object into its parent.

use serde_json::Value;

use crate::error::StreamError;

/// Writer behaviour switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterOptions {
    /// Write `"name":null` pairs instead of dropping them.
    pub serialize_nulls: bool,
    /// Indentation unit; empty means compact output.
    pub indent: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    EmptyDocument,
    NonEmptyDocument,
    EmptyObject,
    DanglingName,
    NonEmptyObject,
    EmptyArray,
    NonEmptyArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Flatten {
    depth: usize,
    entered: bool,
}

/// Returned by [`JsonWriter::begin_flatten`]; hand it back to
/// [`JsonWriter::end_flatten`] to restore the enclosing flatten state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct FlattenToken(Option<Flatten>);

#[derive(Debug)]
pub struct JsonWriter {
    out: String,
    scopes: Vec<Scope>,
    deferred_name: Option<String>,
    flatten: Option<Flatten>,
    options: WriterOptions,
}

impl Default for JsonWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonWriter {
    pub fn new() -> Self {
        Self::with_options(WriterOptions::default())
    }

    pub fn with_options(options: WriterOptions) -> Self {
        Self {
            out: String::new(),
            scopes: vec![Scope::EmptyDocument],
            deferred_name: None,
            flatten: None,
            options,
        }
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    pub fn set_serialize_nulls(&mut self, serialize_nulls: bool) {
        self.options.serialize_nulls = serialize_nulls;
    }

    /// Returns the document. Fails unless exactly one top-level value was written.
    pub fn finish(self) -> Result<String, StreamError> {
        if self.scopes.as_slice() != [Scope::NonEmptyDocument] || self.deferred_name.is_some() {
            return Err(StreamError::Incomplete);
        }
        Ok(self.out)
    }

    // ---- Structure ----

    pub fn begin_object(&mut self) -> Result<(), StreamError> {
        let depth = self.scopes.len();
        let in_object = matches!(self.top(), Scope::EmptyObject | Scope::NonEmptyObject);
        if let Some(flatten) = self.flatten.as_mut() {
            if !flatten.entered && flatten.depth == depth && in_object && self.deferred_name.is_none()
            {
                flatten.entered = true;
                return Ok(());
            }
        }
        self.open(Scope::EmptyObject, '{')
    }

    pub fn end_object(&mut self) -> Result<(), StreamError> {
        let depth = self.scopes.len();
        if let Some(flatten) = self.flatten.as_mut() {
            if flatten.entered && flatten.depth == depth {
                flatten.entered = false;
                return Ok(());
            }
        }
        self.close(Scope::EmptyObject, Scope::NonEmptyObject, '}')
    }

    pub fn begin_array(&mut self) -> Result<(), StreamError> {
        self.open(Scope::EmptyArray, '[')
    }

    pub fn end_array(&mut self) -> Result<(), StreamError> {
        self.close(Scope::EmptyArray, Scope::NonEmptyArray, ']')
    }

    /// Makes the next `begin_object`/`end_object` pair at the current depth
    /// transparent, so its members land in the currently open object.
    pub fn begin_flatten(&mut self) -> Result<FlattenToken, StreamError> {
        if !matches!(self.top(), Scope::EmptyObject | Scope::NonEmptyObject)
            || self.deferred_name.is_some()
        {
            return Err(StreamError::Nesting("flatten requires an open object"));
        }
        let token = FlattenToken(self.flatten);
        self.flatten = Some(Flatten {
            depth: self.scopes.len(),
            entered: false,
        });
        Ok(token)
    }

    pub fn end_flatten(&mut self, token: FlattenToken) {
        self.flatten = token.0;
    }

    // ---- Names and values ----

    pub fn name(&mut self, name: &str) -> Result<(), StreamError> {
        if self.deferred_name.is_some() {
            return Err(StreamError::Nesting("name already pending"));
        }
        if !matches!(self.top(), Scope::EmptyObject | Scope::NonEmptyObject) {
            return Err(StreamError::Nesting("name outside of an object"));
        }
        self.deferred_name = Some(name.to_string());
        Ok(())
    }

    pub fn null_value(&mut self) -> Result<(), StreamError> {
        if self.deferred_name.is_some() && !self.options.serialize_nulls {
            self.deferred_name = None;
            return Ok(());
        }
        self.before_value()?;
        self.out.push_str("null");
        Ok(())
    }

    pub fn string_value(&mut self, s: &str) -> Result<(), StreamError> {
        self.before_value()?;
        self.write_str(s);
        Ok(())
    }

    pub fn bool_value(&mut self, b: bool) -> Result<(), StreamError> {
        self.before_value()?;
        self.out.push_str(if b { "true" } else { "false" });
        Ok(())
    }

    pub fn i64_value(&mut self, int: i64) -> Result<(), StreamError> {
        self.before_value()?;
        self.out.push_str(&int.to_string());
        Ok(())
    }

    pub fn u64_value(&mut self, uint: u64) -> Result<(), StreamError> {
        self.before_value()?;
        self.out.push_str(&uint.to_string());
        Ok(())
    }

    pub fn f64_value(&mut self, float: f64) -> Result<(), StreamError> {
        if !float.is_finite() {
            return Err(StreamError::NonFinite(float));
        }
        self.before_value()?;
        self.out.push_str(&format_float(float));
        Ok(())
    }

    /// Writes an untyped value tree through the same scope tracking.
    pub fn json_value(&mut self, value: &Value) -> Result<(), StreamError> {
        match value {
            Value::Null => self.null_value(),
            Value::Bool(b) => self.bool_value(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    self.i64_value(i)
                } else if let Some(u) = n.as_u64() {
                    self.u64_value(u)
                } else {
                    self.f64_value(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => self.string_value(s),
            Value::Array(items) => {
                self.begin_array()?;
                for item in items {
                    self.json_value(item)?;
                }
                self.end_array()
            }
            Value::Object(map) => {
                self.begin_object()?;
                for (key, item) in map {
                    self.name(key)?;
                    self.json_value(item)?;
                }
                self.end_object()
            }
        }
    }

    // ---- Internals ----

    fn top(&self) -> Scope {
        self.scopes.last().copied().unwrap_or(Scope::EmptyDocument)
    }

    fn set_top(&mut self, scope: Scope) {
        if let Some(top) = self.scopes.last_mut() {
            *top = scope;
        }
    }

    fn open(&mut self, empty: Scope, bracket: char) -> Result<(), StreamError> {
        self.before_value()?;
        self.scopes.push(empty);
        self.out.push(bracket);
        Ok(())
    }

    fn close(&mut self, empty: Scope, non_empty: Scope, bracket: char) -> Result<(), StreamError> {
        let top = self.top();
        if top != empty && top != non_empty {
            return Err(StreamError::Nesting("unbalanced close"));
        }
        if self.deferred_name.is_some() {
            return Err(StreamError::Nesting("dangling name"));
        }
        self.scopes.pop();
        if top == non_empty {
            self.newline();
        }
        self.out.push(bracket);
        Ok(())
    }

    fn write_deferred_name(&mut self) {
        let Some(name) = self.deferred_name.take() else {
            return;
        };
        if self.top() == Scope::NonEmptyObject {
            self.out.push(',');
        }
        self.newline();
        self.write_str(&name);
        self.out.push(':');
        if !self.options.indent.is_empty() {
            self.out.push(' ');
        }
        self.set_top(Scope::DanglingName);
    }

    fn before_value(&mut self) -> Result<(), StreamError> {
        self.write_deferred_name();
        match self.top() {
            Scope::EmptyDocument => self.set_top(Scope::NonEmptyDocument),
            Scope::NonEmptyDocument => {
                return Err(StreamError::Nesting("JSON must have only one top-level value"))
            }
            Scope::EmptyArray => {
                self.set_top(Scope::NonEmptyArray);
                self.newline();
            }
            Scope::NonEmptyArray => {
                self.out.push(',');
                self.newline();
            }
            Scope::DanglingName => self.set_top(Scope::NonEmptyObject),
            Scope::EmptyObject | Scope::NonEmptyObject => {
                return Err(StreamError::Nesting("value without a name"))
            }
        }
        Ok(())
    }

    fn newline(&mut self) {
        if self.options.indent.is_empty() {
            return;
        }
        self.out.push('\n');
        for _ in 1..self.scopes.len() {
            self.out.push_str(&self.options.indent);
        }
    }

    fn write_str(&mut self, s: &str) {
        let bytes = s.as_bytes();
        if bytes
            .iter()
            .all(|&b| (32..=126).contains(&b) && b != b'"' && b != b'\\')
        {
            self.out.reserve(bytes.len() + 2);
            self.out.push('"');
            self.out.push_str(s);
            self.out.push('"');
            return;
        }
        let json_str = serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string());
        self.out.push_str(&json_str);
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}
