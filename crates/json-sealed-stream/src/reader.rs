//! `JsonReader`: pull-style JSON reader over a borrowed byte slice.
//!
//! The scanning routines (whitespace, numbers, strings) follow the byte-level
//! `JsonDecoder`; instead of materializing a whole value tree the reader hands
//! out one token at a time and keeps a scope stack so callers can walk objects
//! field by field, select names from a known set, and skip what they do not
//! understand.

use serde_json::{Map, Number, Value};

use crate::error::StreamError;
use crate::token::{Options, Token};

/// Deepest allowed nesting of objects and arrays.
pub const MAX_NESTING: usize = 256;

/// Reader behaviour switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderOptions {
    /// When set, `skip_name`/`skip_value` fail instead of discarding input.
    pub fail_on_unknown: bool,
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

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Name(Option<String>),
    Index(usize),
}

/// Pull parser producing [`Token`]s.
///
/// Cloning is cheap relative to the input (the bytes are borrowed), which is
/// what [`JsonReader::peek_json`] relies on for look-ahead.
#[derive(Debug, Clone)]
pub struct JsonReader<'a> {
    data: &'a [u8],
    x: usize,
    scopes: Vec<Scope>,
    path: Vec<PathSegment>,
    peeked: Option<Token>,
    options: ReaderOptions,
}

impl<'a> JsonReader<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::from_slice(input.as_bytes())
    }

    pub fn from_slice(data: &'a [u8]) -> Self {
        Self {
            data,
            x: 0,
            scopes: vec![Scope::EmptyDocument],
            path: Vec::new(),
            peeked: None,
            options: ReaderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReaderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    pub fn set_fail_on_unknown(&mut self, fail_on_unknown: bool) {
        self.options.fail_on_unknown = fail_on_unknown;
    }

    /// Returns an independent reader positioned at the same token.
    ///
    /// Reading from the copy never advances `self`.
    pub fn peek_json(&self) -> JsonReader<'a> {
        self.clone()
    }

    /// The JSON path of the current position, e.g. `$.error_logs.order`.
    pub fn path(&self) -> String {
        let mut out = String::from("$");
        for segment in &self.path {
            match segment {
                PathSegment::Name(Some(name)) => {
                    out.push('.');
                    out.push_str(name);
                }
                PathSegment::Name(None) => out.push('.'),
                PathSegment::Index(i) => {
                    out.push('[');
                    out.push_str(&i.to_string());
                    out.push(']');
                }
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // Structure

    pub fn peek(&mut self) -> Result<Token, StreamError> {
        if let Some(token) = self.peeked {
            return Ok(token);
        }
        let token = self.do_peek()?;
        self.peeked = Some(token);
        Ok(token)
    }

    pub fn has_next(&mut self) -> Result<bool, StreamError> {
        Ok(!matches!(
            self.peek()?,
            Token::EndObject | Token::EndArray | Token::EndDocument
        ))
    }

    /// Fails with [`StreamError::NestingTooDeep`] once [`MAX_NESTING`]
    /// containers are already open.
    pub fn begin_object(&mut self) -> Result<(), StreamError> {
        self.expect(Token::BeginObject)?;
        self.open(Scope::EmptyObject, PathSegment::Name(None))
    }

    pub fn end_object(&mut self) -> Result<(), StreamError> {
        self.expect(Token::EndObject)?;
        self.consume(1);
        self.scopes.pop();
        self.path.pop();
        self.after_value();
        Ok(())
    }

    pub fn begin_array(&mut self) -> Result<(), StreamError> {
        self.expect(Token::BeginArray)?;
        self.open(Scope::EmptyArray, PathSegment::Index(0))
    }

    pub fn end_array(&mut self) -> Result<(), StreamError> {
        self.expect(Token::EndArray)?;
        self.consume(1);
        self.scopes.pop();
        self.path.pop();
        self.after_value();
        Ok(())
    }

    /// Checks that the whole input has been consumed.
    pub fn end_document(&mut self) -> Result<(), StreamError> {
        self.expect(Token::EndDocument)
    }

    // ------------------------------------------------------------------
    // Names

    pub fn next_name(&mut self) -> Result<String, StreamError> {
        self.expect(Token::Name)?;
        let name = self.read_str()?;
        self.peeked = None;
        self.set_path_name(name.clone());
        Ok(name)
    }

    /// Consumes the next name if it is one of `options` and returns its index.
    ///
    /// On a miss the name stays unconsumed; follow up with `next_name` or
    /// `skip_name`.
    pub fn select_name(&mut self, options: &Options) -> Result<Option<usize>, StreamError> {
        self.expect(Token::Name)?;
        let start = self.x;
        let name = self.read_str()?;
        match options.get(&name) {
            Some(index) => {
                self.peeked = None;
                self.set_path_name(name);
                Ok(Some(index))
            }
            None => {
                self.x = start;
                Ok(None)
            }
        }
    }

    pub fn skip_name(&mut self) -> Result<(), StreamError> {
        if self.options.fail_on_unknown {
            let token = self.peek()?;
            return Err(StreamError::SkipForbidden {
                token,
                path: self.path(),
            });
        }
        self.next_name().map(|_| ())
    }

    // ------------------------------------------------------------------
    // Scalars

    /// Reads a string; a number is accepted and returned as its literal text.
    pub fn next_string(&mut self) -> Result<String, StreamError> {
        let value = match self.peek()? {
            Token::String => self.read_str()?,
            Token::Number => self.read_number_text()?.to_string(),
            actual => return Err(self.unexpected(Token::String, actual)),
        };
        self.peeked = None;
        self.after_value();
        Ok(value)
    }

    /// Consumes the next string if it is one of `options` and returns its index.
    ///
    /// A miss, or a token that is not a string, leaves the reader untouched.
    pub fn select_string(&mut self, options: &Options) -> Result<Option<usize>, StreamError> {
        if self.peek()? != Token::String {
            return Ok(None);
        }
        let start = self.x;
        let value = self.read_str()?;
        match options.get(&value) {
            Some(index) => {
                self.peeked = None;
                self.after_value();
                Ok(Some(index))
            }
            None => {
                self.x = start;
                Ok(None)
            }
        }
    }

    pub fn next_bool(&mut self) -> Result<bool, StreamError> {
        self.expect(Token::Bool)?;
        let value = if self.data[self.x..].starts_with(b"true") {
            self.consume(4);
            true
        } else if self.data[self.x..].starts_with(b"false") {
            self.consume(5);
            false
        } else {
            return Err(StreamError::malformed("Invalid literal", self.path()));
        };
        self.after_value();
        Ok(value)
    }

    pub fn next_null(&mut self) -> Result<(), StreamError> {
        self.expect(Token::Null)?;
        if !self.data[self.x..].starts_with(b"null") {
            return Err(StreamError::malformed("Invalid literal", self.path()));
        }
        self.consume(4);
        self.after_value();
        Ok(())
    }

    pub fn next_f64(&mut self) -> Result<f64, StreamError> {
        let text = self.next_numeric_text()?;
        let value: f64 = text.parse().map_err(|_| self.conversion("a double", &text))?;
        if !value.is_finite() {
            return Err(self.conversion("a finite number", &text));
        }
        self.peeked = None;
        self.after_value();
        Ok(value)
    }

    pub fn next_i64(&mut self) -> Result<i64, StreamError> {
        let text = self.next_numeric_text()?;
        let value = match text.parse::<i64>() {
            Ok(v) => v,
            Err(_) => {
                let as_double: f64 = text.parse().map_err(|_| self.conversion("a long", &text))?;
                let truncated = as_double as i64;
                if truncated as f64 != as_double {
                    return Err(self.conversion("a long", &text));
                }
                truncated
            }
        };
        self.peeked = None;
        self.after_value();
        Ok(value)
    }

    pub fn next_u64(&mut self) -> Result<u64, StreamError> {
        let text = self.next_numeric_text()?;
        let value = match text.parse::<u64>() {
            Ok(v) => v,
            Err(_) => {
                let as_double: f64 = text
                    .parse()
                    .map_err(|_| self.conversion("an unsigned long", &text))?;
                let truncated = as_double as u64;
                if as_double < 0.0 || truncated as f64 != as_double {
                    return Err(self.conversion("an unsigned long", &text));
                }
                truncated
            }
        };
        self.peeked = None;
        self.after_value();
        Ok(value)
    }

    /// Skips the next value, including nested objects and arrays.
    pub fn skip_value(&mut self) -> Result<(), StreamError> {
        if self.options.fail_on_unknown {
            let token = self.peek()?;
            return Err(StreamError::SkipForbidden {
                token,
                path: self.path(),
            });
        }
        let mut depth = 0usize;
        loop {
            match self.peek()? {
                Token::BeginObject => {
                    self.begin_object()?;
                    depth += 1;
                }
                Token::BeginArray => {
                    self.begin_array()?;
                    depth += 1;
                }
                Token::EndObject if depth > 0 => {
                    self.end_object()?;
                    depth -= 1;
                }
                Token::EndArray if depth > 0 => {
                    self.end_array()?;
                    depth -= 1;
                }
                Token::Name => {
                    self.next_name()?;
                }
                Token::String => {
                    self.read_str()?;
                    self.peeked = None;
                    self.after_value();
                }
                Token::Number => {
                    self.read_number_text()?;
                    self.peeked = None;
                    self.after_value();
                }
                Token::Bool => {
                    self.next_bool()?;
                }
                Token::Null => self.next_null()?,
                actual @ (Token::EndObject | Token::EndArray | Token::EndDocument) => {
                    return Err(StreamError::SkipForbidden {
                        token: actual,
                        path: self.path(),
                    });
                }
            }
            if depth == 0 {
                return Ok(());
            }
        }
    }

    /// Reads the next value as an untyped tree. Numbers are read as doubles.
    pub fn read_json_value(&mut self) -> Result<Value, StreamError> {
        match self.peek()? {
            Token::BeginObject => {
                let mut map = Map::new();
                self.begin_object()?;
                while self.has_next()? {
                    let name = self.next_name()?;
                    let value = self.read_json_value()?;
                    if map.insert(name.clone(), value).is_some() {
                        return Err(StreamError::malformed(
                            format!("Map key '{name}' has multiple values"),
                            self.path(),
                        ));
                    }
                }
                self.end_object()?;
                Ok(Value::Object(map))
            }
            Token::BeginArray => {
                let mut items = Vec::new();
                self.begin_array()?;
                while self.has_next()? {
                    items.push(self.read_json_value()?);
                }
                self.end_array()?;
                Ok(Value::Array(items))
            }
            Token::String => Ok(Value::String(self.next_string()?)),
            Token::Number => {
                let value = self.next_f64()?;
                Number::from_f64(value)
                    .map(Value::Number)
                    .ok_or_else(|| self.conversion("a finite number", &value.to_string()))
            }
            Token::Bool => Ok(Value::Bool(self.next_bool()?)),
            Token::Null => {
                self.next_null()?;
                Ok(Value::Null)
            }
            actual => Err(self.unexpected(Token::BeginObject, actual)),
        }
    }

    // ------------------------------------------------------------------
    // Internals

    fn do_peek(&mut self) -> Result<Token, StreamError> {
        let scope = match self.scopes.last() {
            Some(scope) => *scope,
            None => return Err(StreamError::Nesting("reader has no open scope")),
        };
        match scope {
            Scope::EmptyArray => {
                self.set_scope(Scope::NonEmptyArray);
                self.skip_whitespace();
                if self.current() == Some(b']') {
                    return Ok(Token::EndArray);
                }
            }
            Scope::NonEmptyArray => {
                self.skip_whitespace();
                match self.current() {
                    Some(b']') => return Ok(Token::EndArray),
                    Some(b',') => self.x += 1,
                    _ => return Err(StreamError::malformed("Unterminated array", self.path())),
                }
            }
            Scope::EmptyObject | Scope::NonEmptyObject => {
                self.skip_whitespace();
                match self.current() {
                    Some(b'}') => return Ok(Token::EndObject),
                    Some(b',') if scope == Scope::NonEmptyObject => self.x += 1,
                    _ if scope == Scope::NonEmptyObject => {
                        return Err(StreamError::malformed("Unterminated object", self.path()))
                    }
                    _ => {}
                }
                self.set_scope(Scope::DanglingName);
                self.skip_whitespace();
                return match self.current() {
                    Some(b'"') => Ok(Token::Name),
                    _ => Err(StreamError::malformed("Expected name", self.path())),
                };
            }
            Scope::DanglingName => {
                self.set_scope(Scope::NonEmptyObject);
                self.skip_whitespace();
                if self.current() != Some(b':') {
                    return Err(StreamError::malformed("Expected ':'", self.path()));
                }
                self.x += 1;
            }
            Scope::EmptyDocument => self.set_scope(Scope::NonEmptyDocument),
            Scope::NonEmptyDocument => {
                self.skip_whitespace();
                if self.x >= self.data.len() {
                    return Ok(Token::EndDocument);
                }
                return Err(StreamError::malformed(
                    "Trailing data after the top-level value",
                    self.path(),
                ));
            }
        }

        self.skip_whitespace();
        match self.current() {
            Some(b'{') => Ok(Token::BeginObject),
            Some(b'[') => Ok(Token::BeginArray),
            Some(b'"') => Ok(Token::String),
            Some(b't') | Some(b'f') => Ok(Token::Bool),
            Some(b'n') => Ok(Token::Null),
            Some(c) if c == b'-' || c.is_ascii_digit() => Ok(Token::Number),
            Some(c) => Err(StreamError::malformed(
                format!("Unexpected character '{}'", c as char),
                self.path(),
            )),
            None => Err(StreamError::malformed("End of input", self.path())),
        }
    }

    /// Consumes an opening bracket and enters its scope. The document scope
    /// sits at the bottom of the stack, so `scopes.len() - 1` containers are open.
    fn open(&mut self, scope: Scope, segment: PathSegment) -> Result<(), StreamError> {
        if self.scopes.len() > MAX_NESTING {
            return Err(StreamError::NestingTooDeep { path: self.path() });
        }
        self.consume(1);
        self.scopes.push(scope);
        self.path.push(segment);
        Ok(())
    }

    fn expect(&mut self, expected: Token) -> Result<(), StreamError> {
        let actual = self.peek()?;
        if actual != expected {
            return Err(self.unexpected(expected, actual));
        }
        Ok(())
    }

    fn unexpected(&self, expected: Token, actual: Token) -> StreamError {
        StreamError::Unexpected {
            expected,
            actual,
            path: self.path(),
        }
    }

    fn conversion(&self, expected: &'static str, found: &str) -> StreamError {
        StreamError::Conversion {
            expected,
            found: found.to_string(),
            path: self.path(),
        }
    }

    fn consume(&mut self, len: usize) {
        self.x += len;
        self.peeked = None;
    }

    fn current(&self) -> Option<u8> {
        self.data.get(self.x).copied()
    }

    fn set_scope(&mut self, scope: Scope) {
        if let Some(top) = self.scopes.last_mut() {
            *top = scope;
        }
    }

    fn set_path_name(&mut self, name: String) {
        if let Some(PathSegment::Name(slot)) = self.path.last_mut() {
            *slot = Some(name);
        }
    }

    fn after_value(&mut self) {
        if let Some(PathSegment::Index(i)) = self.path.last_mut() {
            *i += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while self.x < self.data.len() {
            match self.data[self.x] {
                b' ' | b'\t' | b'\n' | b'\r' => self.x += 1,
                _ => break,
            }
        }
    }

    /// Text of the next number or string, for numeric conversion.
    fn next_numeric_text(&mut self) -> Result<String, StreamError> {
        match self.peek()? {
            Token::Number => Ok(self.read_number_text()?.to_string()),
            Token::String => self.read_str(),
            actual => Err(self.unexpected(Token::Number, actual)),
        }
    }

    fn read_number_text(&mut self) -> Result<&'a str, StreamError> {
        let data = self.data;
        let len = data.len();
        let start = self.x;
        let mut x = self.x;

        if x < len && data[x] == b'-' {
            x += 1;
        }
        let digits_start = x;
        while x < len && data[x].is_ascii_digit() {
            x += 1;
        }
        if x == digits_start {
            return Err(StreamError::malformed("Invalid number", self.path()));
        }
        if x < len && data[x] == b'.' {
            x += 1;
            while x < len && data[x].is_ascii_digit() {
                x += 1;
            }
        }
        if x < len && (data[x] == b'e' || data[x] == b'E') {
            x += 1;
            if x < len && (data[x] == b'+' || data[x] == b'-') {
                x += 1;
            }
            while x < len && data[x].is_ascii_digit() {
                x += 1;
            }
        }
        self.x = x;
        std::str::from_utf8(&data[start..x]).map_err(|_| StreamError::InvalidUtf8(start))
    }

    fn read_str(&mut self) -> Result<String, StreamError> {
        let data = self.data;
        if self.current() != Some(b'"') {
            return Err(StreamError::malformed("Expected string", self.path()));
        }
        let x0 = self.x + 1;
        let x1 = self.find_ending_quote(x0)?;
        let value = decode_json_string(&data[x0..x1], x0)?;
        self.x = x1 + 1;
        Ok(value)
    }

    fn find_ending_quote(&self, from: usize) -> Result<usize, StreamError> {
        let data = self.data;
        let mut x = from;
        while x < data.len() {
            match data[x] {
                b'\\' => x += 2,
                b'"' => return Ok(x),
                _ => x += 1,
            }
        }
        Err(StreamError::malformed("Unterminated string", self.path()))
    }
}

/// Decodes a JSON string body (between the quotes), handling escapes.
fn decode_json_string(bytes: &[u8], offset: usize) -> Result<String, StreamError> {
    if !bytes.contains(&b'\\') {
        return std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| StreamError::InvalidUtf8(offset));
    }
    let mut quoted = Vec::with_capacity(bytes.len() + 2);
    quoted.push(b'"');
    quoted.extend_from_slice(bytes);
    quoted.push(b'"');
    serde_json::from_slice(&quoted).map_err(|e| StreamError::Malformed {
        message: format!("Invalid string escape: {e}"),
        path: format!("offset {offset}"),
    })
}
