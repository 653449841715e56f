// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! The dynamically-typed property tree (§9) that parameter substitution,
//! precondition evaluation, and plugin configuration all operate over, plus
//! the `{{ name }}` substitutor (component A, §4.1).

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CodedError, ErrorCode};

/// A JSON-like value. `Map` uses `BTreeMap` rather than preserving insertion
/// order — nothing in the substitution or precondition contracts depends on
/// key order, only on structural equality.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Num(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => {
                serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Num(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => {
                Value::Map(map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect())
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Parameter names must match this before being handed to [`substitute`];
/// the substitutor itself trusts callers to have pre-filtered (§4.1).
pub fn is_valid_param_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(r"\{\{\s*([A-Za-z0-9]+)\s*\}\}") {
        Ok(re) => re,
        Err(_) => unreachable!("token regex pattern is a fixed valid literal"),
    })
}

fn sole_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(r"^\{\{\s*([A-Za-z0-9]+)\s*\}\}$") {
        Ok(re) => re,
        Err(_) => unreachable!("sole-token regex pattern is a fixed valid literal"),
    })
}

/// Replace every `{{ name }}` token reachable in `value` against `params`.
/// Recurses into lists and maps; scalars other than strings pass through
/// unchanged (§4.1).
pub fn substitute(value: &Value, params: &BTreeMap<String, Value>) -> Value {
    match value {
        Value::Str(s) => substitute_str(s, params),
        Value::List(items) => Value::List(items.iter().map(|v| substitute(v, params)).collect()),
        Value::Map(map) => {
            Value::Map(map.iter().map(|(k, v)| (k.clone(), substitute(v, params))).collect())
        }
        other => other.clone(),
    }
}

fn substitute_str(s: &str, params: &BTreeMap<String, Value>) -> Value {
    let trimmed = s.trim();
    if let Some(caps) = sole_token_regex().captures(trimmed) {
        if let Some(value) = params.get(&caps[1]) {
            return value.clone();
        }
    }
    Value::Str(substitute_embedded(s, params))
}

/// Single left-to-right pass over every token match in `s`. Replacements
/// are built from spans of the *original* string only, so a replacement
/// value that itself contains `{{...}}` is never re-scanned.
fn substitute_embedded(s: &str, params: &BTreeMap<String, Value>) -> String {
    let re = token_regex();
    let mut out = String::with_capacity(s.len());
    let mut last = 0usize;
    for caps in re.captures_iter(s) {
        let Some(whole) = caps.get(0) else { continue };
        let name = &caps[1];
        out.push_str(&s[last..whole.start()]);
        match params.get(name) {
            Some(value) => out.push_str(&unescape_dollar(&coerce_to_string(value))),
            None => out.push_str(whole.as_str()),
        }
        last = whole.end();
    }
    out.push_str(&s[last..]);
    out
}

/// Renders a substituted [`Value`] back to the string form a precondition
/// argument or shell command line needs: strings pass through, everything
/// else is re-serialized as JSON text.
pub fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => serde_json::to_string(&other.to_json()).unwrap_or_default(),
    }
}

/// Undoes the pre-escaping some older documents carry from an earlier
/// regex-based replacement engine, where a literal `$` in a parameter value
/// had to be doubled to survive `ReplaceAllString`-style expansion.
fn unescape_dollar(s: &str) -> Cow<'_, str> {
    if s.contains("$$") {
        Cow::Owned(s.replace("$$", "$"))
    } else {
        Cow::Borrowed(s)
    }
}

/// Boolean coercion rules (§4.1): true booleans pass through; empty string
/// is false; a non-empty string must parse as `true`/`false`; null is false;
/// anything else is an error.
pub fn coerce_bool(value: &Value) -> Result<bool, CodedError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Null => Ok(false),
        Value::Str(s) if s.is_empty() => Ok(false),
        Value::Str(s) => s
            .parse::<bool>()
            .map_err(|_| CodedError::new(ErrorCode::SubstitutionError, format!("cannot parse {s:?} as boolean"))),
        other => Err(CodedError::new(
            ErrorCode::SubstitutionError,
            format!("cannot coerce {other:?} to boolean"),
        )),
    }
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
