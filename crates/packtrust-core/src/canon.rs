//! Deterministic byte encoding of JSON-like value trees.
//!
//! Two structurally equal trees (ignoring object key order) always encode to
//! the same bytes; the encoding is what gets hashed and signed. Three
//! variants share one emitter:
//!
//! - [`canonicalize`]: any root, arrays keep producer order.
//! - [`canonicalize_flat`]: meta-only records. Object root, no arrays anywhere.
//! - [`canonicalize_nested`]: object or array root; arrays made only of
//!   primitives are sorted so producer order does not leak into the bytes.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::rc::Rc;
use thiserror::Error;

pub type Map = BTreeMap<String, Value>;

/// A JSON-like value. Containers are shared handles so that callers can
/// express graphs the serializer must refuse (cycles).
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Map>>),
    /// Raw bytes have no JSON representation and are always rejected.
    Bytes(Vec<u8>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Value::Object(Rc::new(RefCell::new(map)))
    }

    fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
        )
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            // serde_json numbers are always finite; integers above 2^53 lose
            // precision exactly as they would in a JSON producer.
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CanonError {
    #[error("CANON_NON_FINITE_NUMBER")]
    NonFiniteNumber,
    #[error("CANON_NEGATIVE_ZERO")]
    NegativeZero,
    #[error("CANON_CYCLE")]
    Cycle,
    #[error("CANON_INVALID_TYPE")]
    InvalidType,
    #[error("CANON_ARRAY_FORBIDDEN")]
    ArrayForbidden,
    #[error("CANON_ROOT")]
    Root,
}

impl CanonError {
    pub fn code(self) -> &'static str {
        match self {
            CanonError::NonFiniteNumber => "CANON_NON_FINITE_NUMBER",
            CanonError::NegativeZero => "CANON_NEGATIVE_ZERO",
            CanonError::Cycle => "CANON_CYCLE",
            CanonError::InvalidType => "CANON_INVALID_TYPE",
            CanonError::ArrayForbidden => "CANON_ARRAY_FORBIDDEN",
            CanonError::Root => "CANON_ROOT",
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    General,
    Flat,
    Nested,
}

pub fn canonicalize(value: &Value) -> Result<Vec<u8>, CanonError> {
    emit(value, Mode::General)
}

pub fn canonicalize_flat(value: &Value) -> Result<Vec<u8>, CanonError> {
    if !matches!(value, Value::Object(_)) {
        return Err(CanonError::Root);
    }
    emit(value, Mode::Flat)
}

pub fn canonicalize_nested(value: &Value) -> Result<Vec<u8>, CanonError> {
    if !matches!(value, Value::Object(_) | Value::Array(_)) {
        return Err(CanonError::Root);
    }
    emit(value, Mode::Nested)
}

/// Convenience for anything `Serialize`: goes through `serde_json::Value`.
pub fn canonicalize_serde<T: serde::Serialize>(value: &T) -> crate::Result<Vec<u8>> {
    let json = serde_json::to_value(value)?;
    Ok(canonicalize(&Value::from(json))?)
}

fn emit(value: &Value, mode: Mode) -> Result<Vec<u8>, CanonError> {
    let mut out = String::new();
    let mut visiting = HashSet::new();
    write_value(&mut out, value, mode, &mut visiting)?;
    Ok(out.into_bytes())
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

fn write_value(
    out: &mut String,
    value: &Value,
    mode: Mode,
    visiting: &mut HashSet<usize>,
) -> Result<(), CanonError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(out, *n)?,
        Value::String(s) => write_string(out, s),
        Value::Bytes(_) => return Err(CanonError::InvalidType),
        Value::Array(items) => {
            if mode == Mode::Flat {
                return Err(CanonError::ArrayForbidden);
            }
            let id = Rc::as_ptr(items) as *const () as usize;
            if !visiting.insert(id) {
                return Err(CanonError::Cycle);
            }
            let items = items.borrow();
            out.push('[');
            if mode == Mode::Nested && items.iter().all(Value::is_primitive) {
                // Validate before sorting so NaN never reaches the comparator.
                for item in items.iter() {
                    if let Value::Number(n) = item {
                        check_number(*n)?;
                    }
                }
                let mut sorted: Vec<&Value> = items.iter().collect();
                sorted.sort_by(|a, b| compare_primitives(a, b));
                for (i, item) in sorted.into_iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write_value(out, item, mode, visiting)?;
                }
            } else {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write_value(out, item, mode, visiting)?;
                }
            }
            out.push(']');
            visiting.remove(&id);
        }
        Value::Object(map) => {
            let id = Rc::as_ptr(map) as *const () as usize;
            if !visiting.insert(id) {
                return Err(CanonError::Cycle);
            }
            let map = map.borrow();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| utf16_cmp(a, b));
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, &map[key], mode, visiting)?;
            }
            out.push('}');
            visiting.remove(&id);
        }
    }
    Ok(())
}

fn check_number(n: f64) -> Result<(), CanonError> {
    if !n.is_finite() {
        return Err(CanonError::NonFiniteNumber);
    }
    if n == 0.0 && n.is_sign_negative() {
        return Err(CanonError::NegativeZero);
    }
    Ok(())
}

fn write_number(out: &mut String, n: f64) -> Result<(), CanonError> {
    check_number(n)?;
    if n.fract() == 0.0 && n.abs() < 1e15 {
        let _ = write!(out, "{}", n as i64);
    } else {
        let _ = write!(out, "{n}");
    }
    Ok(())
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Key order is UTF-16 code unit order, which differs from `str` order for
/// characters above the BMP.
fn utf16_cmp(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

fn primitive_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        _ => 4,
    }
}

fn compare_primitives(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => utf16_cmp(x, y),
        _ => primitive_rank(a).cmp(&primitive_rank(b)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    fn json(s: &str) -> Value {
        Value::from(serde_json::from_str::<serde_json::Value>(s).unwrap())
    }

    #[test]
    fn object_keys_are_sorted() {
        let v = json(r#"{"b":1,"a":{"d":true,"c":null}}"#);
        assert_eq!(text(canonicalize(&v).unwrap()), r#"{"a":{"c":null,"d":true},"b":1}"#);
    }

    #[test]
    fn key_order_is_utf16_not_bytes() {
        // U+FF61 sorts before U+1F600 in UTF-8 order but after it in UTF-16.
        let v = Value::object([("\u{1F600}", Value::Null), ("\u{FF61}", Value::Null)]);
        assert_eq!(
            text(canonicalize(&v).unwrap()),
            "{\"\u{1F600}\":null,\"\u{FF61}\":null}"
        );
    }

    #[test]
    fn structurally_equal_values_encode_identically() {
        let a = json(r#"{"x":[1,2,{"k":"v","j":"w"}],"y":"s"}"#);
        let b = json(r#"{"y":"s","x":[1,2,{"j":"w","k":"v"}]}"#);
        assert_eq!(canonicalize(&a).unwrap(), canonicalize(&b).unwrap());
    }

    #[test]
    fn numbers_and_strings_are_emitted_compactly() {
        let v = json(r#"{"i":42,"f":1.5,"neg":-3,"s":"a\"b\n\u0001"}"#);
        assert_eq!(
            text(canonicalize(&v).unwrap()),
            r#"{"f":1.5,"i":42,"neg":-3,"s":"a\"b\n\u0001"}"#
        );
    }

    #[test]
    fn general_variant_keeps_array_order() {
        let v = json(r#"{"a":[3,1,2]}"#);
        assert_eq!(text(canonicalize(&v).unwrap()), r#"{"a":[3,1,2]}"#);
    }

    #[test]
    fn rejects_non_finite_numbers() {
        let nan = Value::object([("n", Value::Number(f64::NAN))]);
        let inf = Value::object([("n", Value::Number(f64::INFINITY))]);
        let ninf = Value::object([("n", Value::Number(f64::NEG_INFINITY))]);
        for v in [nan, inf, ninf] {
            assert_eq!(canonicalize(&v).unwrap_err(), CanonError::NonFiniteNumber);
            assert_eq!(canonicalize_flat(&v).unwrap_err(), CanonError::NonFiniteNumber);
            assert_eq!(canonicalize_nested(&v).unwrap_err(), CanonError::NonFiniteNumber);
        }
    }

    #[test]
    fn rejects_negative_zero() {
        let v = Value::object([("z", Value::Number(-0.0))]);
        assert_eq!(canonicalize(&v).unwrap_err(), CanonError::NegativeZero);
        let ok = Value::object([("z", Value::Number(0.0))]);
        assert_eq!(text(canonicalize(&ok).unwrap()), r#"{"z":0}"#);
    }

    #[test]
    fn rejects_cycles() {
        let map = Rc::new(RefCell::new(Map::new()));
        map.borrow_mut()
            .insert("self".to_string(), Value::Object(Rc::clone(&map)));
        let v = Value::Object(Rc::clone(&map));
        assert_eq!(canonicalize(&v).unwrap_err(), CanonError::Cycle);
        assert_eq!(canonicalize_flat(&v).unwrap_err(), CanonError::Cycle);
        assert_eq!(canonicalize_nested(&v).unwrap_err(), CanonError::Cycle);
        // break the Rc cycle so the test does not leak
        map.borrow_mut().clear();
    }

    #[test]
    fn rejects_cycles_through_arrays() {
        let items = Rc::new(RefCell::new(Vec::new()));
        let root = Value::object([("list", Value::Array(Rc::clone(&items)))]);
        items.borrow_mut().push(root.clone());
        assert_eq!(canonicalize(&root).unwrap_err(), CanonError::Cycle);
        items.borrow_mut().clear();
    }

    #[test]
    fn shared_subtree_is_not_a_cycle() {
        let shared = Value::object([("k", Value::Bool(true))]);
        let v = Value::object([("a", shared.clone()), ("b", shared)]);
        assert_eq!(
            text(canonicalize(&v).unwrap()),
            r#"{"a":{"k":true},"b":{"k":true}}"#
        );
    }

    #[test]
    fn rejects_values_outside_the_json_model() {
        let v = Value::object([("blob", Value::Bytes(vec![1, 2, 3]))]);
        assert_eq!(canonicalize(&v).unwrap_err(), CanonError::InvalidType);
    }

    #[test]
    fn flat_variant_forbids_arrays_and_non_object_roots() {
        let v = json(r#"{"meta":{"tags":["a"]}}"#);
        assert_eq!(canonicalize_flat(&v).unwrap_err(), CanonError::ArrayForbidden);
        assert_eq!(canonicalize_flat(&json("[1]")).unwrap_err(), CanonError::Root);
        assert_eq!(canonicalize_flat(&json("\"s\"")).unwrap_err(), CanonError::Root);
        let ok = json(r#"{"b":"x","a":1}"#);
        assert_eq!(text(canonicalize_flat(&ok).unwrap()), r#"{"a":1,"b":"x"}"#);
    }

    #[test]
    fn nested_variant_sorts_primitive_arrays_only() {
        let v = json(r#"{"p":["b",3,null,"a",true,1,false],"o":[{"z":1},{"a":2}]}"#);
        assert_eq!(
            text(canonicalize_nested(&v).unwrap()),
            r#"{"o":[{"z":1},{"a":2}],"p":[null,false,true,1,3,"a","b"]}"#
        );
        assert_eq!(text(canonicalize_nested(&json("[3,1,2]")).unwrap()), "[1,2,3]");
        assert_eq!(canonicalize_nested(&json("7")).unwrap_err(), CanonError::Root);
    }

    #[test]
    fn nested_variant_rejects_nan_inside_sorted_arrays() {
        let v = Value::object([(
            "p",
            Value::array(vec![Value::Number(1.0), Value::Number(f64::NAN)]),
        )]);
        assert_eq!(canonicalize_nested(&v).unwrap_err(), CanonError::NonFiniteNumber);
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(CanonError::Cycle.code(), "CANON_CYCLE");
        assert_eq!(CanonError::Cycle.to_string(), "CANON_CYCLE");
        assert_eq!(CanonError::ArrayForbidden.code(), "CANON_ARRAY_FORBIDDEN");
    }

    proptest! {
        #[test]
        fn key_permutation_never_changes_bytes(
            entries in prop::collection::btree_map("[a-zA-Z0-9_]{1,8}", any::<i32>(), 0..12)
        ) {
            let forward: Vec<(String, Value)> = entries
                .iter()
                .map(|(k, v)| (k.clone(), Value::Number(f64::from(*v))))
                .collect();
            let mut reversed = forward.clone();
            reversed.reverse();

            let mut a = serde_json::Map::new();
            for (k, v) in &entries {
                a.insert(k.clone(), serde_json::json!(v));
            }
            let from_json = Value::from(serde_json::Value::Object(a));

            let x = canonicalize(&Value::object(forward)).unwrap();
            let y = canonicalize(&Value::object(reversed)).unwrap();
            let z = canonicalize(&from_json).unwrap();
            prop_assert_eq!(&x, &y);
            prop_assert_eq!(&x, &z);
        }
    }
}
