//! Integration tests for `JsonReader`.

use json_sealed_stream::{JsonReader, Options, ReaderOptions, StreamError, Token, MAX_NESTING};
use serde_json::json;

#[test]
fn walks_tokens_of_nested_document() {
    let mut r = JsonReader::new(r#" {"a": [1, "two", true, null], "b": {}} "#);
    assert_eq!(r.peek().unwrap(), Token::BeginObject);
    r.begin_object().unwrap();
    assert_eq!(r.next_name().unwrap(), "a");
    r.begin_array().unwrap();
    assert_eq!(r.next_i64().unwrap(), 1);
    assert_eq!(r.next_string().unwrap(), "two");
    assert!(r.next_bool().unwrap());
    assert_eq!(r.peek().unwrap(), Token::Null);
    r.next_null().unwrap();
    assert!(!r.has_next().unwrap());
    r.end_array().unwrap();
    assert_eq!(r.next_name().unwrap(), "b");
    r.begin_object().unwrap();
    assert_eq!(r.peek().unwrap(), Token::EndObject);
    r.end_object().unwrap();
    r.end_object().unwrap();
    r.end_document().unwrap();
}

#[test]
fn select_name_hits_and_misses() {
    let options = Options::of(["cooking", "order"]);
    let mut r = JsonReader::new(r#"{"order":1,"noise":2,"cooking":"x"}"#);
    r.begin_object().unwrap();
    assert_eq!(r.select_name(&options).unwrap(), Some(1));
    assert_eq!(r.next_i64().unwrap(), 1);

    assert_eq!(r.select_name(&options).unwrap(), None);
    // The miss left the name in place.
    assert_eq!(r.peek().unwrap(), Token::Name);
    r.skip_name().unwrap();
    r.skip_value().unwrap();

    assert_eq!(r.select_name(&options).unwrap(), Some(0));
    assert_eq!(r.next_string().unwrap(), "x");
    r.end_object().unwrap();
}

#[test]
fn select_string_leaves_reader_on_miss() {
    let options = Options::of(["success", "error"]);
    let mut r = JsonReader::new(r#"["error","taco",3]"#);
    r.begin_array().unwrap();
    assert_eq!(r.select_string(&options).unwrap(), Some(1));
    assert_eq!(r.select_string(&options).unwrap(), None);
    assert_eq!(r.next_string().unwrap(), "taco");
    assert_eq!(r.select_string(&options).unwrap(), None);
    assert_eq!(r.next_i64().unwrap(), 3);
    r.end_array().unwrap();
}

#[test]
fn skip_value_skips_nested_structures() {
    let mut r = JsonReader::new(r#"{"skip":{"a":[1,{"b":null}],"c":"d"},"keep":7}"#);
    r.begin_object().unwrap();
    assert_eq!(r.next_name().unwrap(), "skip");
    r.skip_value().unwrap();
    assert_eq!(r.next_name().unwrap(), "keep");
    assert_eq!(r.next_i64().unwrap(), 7);
    r.end_object().unwrap();
    r.end_document().unwrap();
}

#[test]
fn fail_on_unknown_forbids_skipping() {
    let mut r = JsonReader::new(r#"{"a":1}"#).with_options(ReaderOptions {
        fail_on_unknown: true,
    });
    r.begin_object().unwrap();
    let err = r.skip_name().unwrap_err();
    assert!(matches!(err, StreamError::SkipForbidden { token: Token::Name, .. }));
    r.next_name().unwrap();
    let err = r.skip_value().unwrap_err();
    assert_eq!(err.to_string(), "Cannot skip unexpected NUMBER at $.a");
}

#[test]
fn peek_json_does_not_advance_original() {
    let mut r = JsonReader::new(r#"{"type":"error","error_logs":{"order":66}}"#);
    r.begin_object().unwrap();

    let mut copy = r.peek_json();
    assert_eq!(copy.next_name().unwrap(), "type");
    assert_eq!(copy.next_string().unwrap(), "error");

    assert_eq!(r.next_name().unwrap(), "type");
    assert_eq!(r.next_string().unwrap(), "error");
    assert_eq!(r.next_name().unwrap(), "error_logs");
}

#[test]
fn read_json_value_reads_numbers_as_doubles() {
    let mut r = JsonReader::new(r#"{"order":66,"nested":[1.5,"s",false,null]}"#);
    let value = r.read_json_value().unwrap();
    assert_eq!(value, json!({"order": 66.0, "nested": [1.5, "s", false, null]}));
    assert_eq!(value["order"].as_f64(), Some(66.0));
    assert!(value["order"].as_i64().is_none());
}

#[test]
fn read_json_value_rejects_duplicate_keys() {
    let mut r = JsonReader::new(r#"{"a":1,"a":2}"#);
    let err = r.read_json_value().unwrap_err();
    assert!(err.to_string().contains("Map key 'a' has multiple values"));
}

#[test]
fn numbers_convert_between_forms() {
    let mut r = JsonReader::new(r#"[1.0, "42", 1.5, -3, 2e3]"#);
    r.begin_array().unwrap();
    assert_eq!(r.next_i64().unwrap(), 1);
    assert_eq!(r.next_i64().unwrap(), 42);
    assert!(matches!(
        r.next_i64().unwrap_err(),
        StreamError::Conversion { expected: "a long", .. }
    ));
}

#[test]
fn numbers_read_as_unsigned_and_double() {
    let mut r = JsonReader::new(r#"[18446744073709551615, -0.25, "x"]"#);
    r.begin_array().unwrap();
    assert_eq!(r.next_u64().unwrap(), u64::MAX);
    assert_eq!(r.next_f64().unwrap(), -0.25);
    assert!(r.next_f64().is_err());
}

#[test]
fn strings_with_escapes_decode() {
    let mut r = JsonReader::new(r#""line\nbreak \"quoted\" é""#);
    assert_eq!(r.next_string().unwrap(), "line\nbreak \"quoted\" é");
}

#[test]
fn unexpected_token_reports_path() {
    let mut r = JsonReader::new(r#"{"a":[true, "x"]}"#);
    r.begin_object().unwrap();
    r.next_name().unwrap();
    r.begin_array().unwrap();
    r.next_bool().unwrap();
    let err = r.next_bool().unwrap_err();
    assert_eq!(
        err,
        StreamError::Unexpected {
            expected: Token::Bool,
            actual: Token::String,
            path: "$.a[1]".to_string(),
        }
    );
}

#[test]
fn malformed_input_is_rejected() {
    let mut r = JsonReader::new(r#"{"a" 1}"#);
    r.begin_object().unwrap();
    r.next_name().unwrap();
    assert!(matches!(r.peek().unwrap_err(), StreamError::Malformed { .. }));

    let mut r = JsonReader::new("[1 2]");
    r.begin_array().unwrap();
    r.next_i64().unwrap();
    assert!(r.peek().is_err());

    let mut r = JsonReader::new("1 2");
    r.next_i64().unwrap();
    assert!(r.end_document().is_err());

    let mut r = JsonReader::new(r#""unterminated"#);
    assert!(r.next_string().is_err());
}

fn nested_arrays(depth: usize) -> String {
    format!("{}{}", "[".repeat(depth), "]".repeat(depth))
}

#[test]
fn nesting_up_to_the_limit_is_read() {
    let json = nested_arrays(MAX_NESTING);
    let mut r = JsonReader::new(&json);
    assert!(r.read_json_value().is_ok());
    r.end_document().unwrap();

    let mut r = JsonReader::new(&json);
    r.skip_value().unwrap();
    r.end_document().unwrap();
}

#[test]
fn nesting_past_the_limit_is_rejected() {
    let json = nested_arrays(MAX_NESTING + 1);
    let err = JsonReader::new(&json).read_json_value().unwrap_err();
    assert!(matches!(err, StreamError::NestingTooDeep { .. }));
    assert!(err.to_string().starts_with("Nesting too deep at $[0]"));

    // Far deeper input fails the same way instead of exhausting the stack.
    let json = nested_arrays(200_000);
    assert!(matches!(
        JsonReader::new(&json).read_json_value().unwrap_err(),
        StreamError::NestingTooDeep { .. }
    ));
    assert!(matches!(
        JsonReader::new(&json).skip_value().unwrap_err(),
        StreamError::NestingTooDeep { .. }
    ));

    let json = format!("{}1{}", r#"{"a":"#.repeat(300), "}".repeat(300));
    assert!(matches!(
        JsonReader::new(&json).read_json_value().unwrap_err(),
        StreamError::NestingTooDeep { .. }
    ));
}
