// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Values produced by module evaluation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Signature of a host-provided function
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync;

/// A function implemented by the host and callable from module code.
#[derive(Clone)]
pub struct NativeFunction {
    name: Arc<str>,
    func: Arc<NativeFn>,
}

impl NativeFunction {
    /// Wrap a closure as a callable value
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    /// The function's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the function. Errors are plain messages; the caller decides
    /// which kind of error to raise.
    pub fn call(&self, args: &[Value]) -> Result<Value, String> {
        (self.func)(args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function: {}]", self.name)
    }
}

/// A module namespace: export name to value, ordered by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespace {
    bindings: BTreeMap<String, Value>,
}

impl Namespace {
    /// Create an empty namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an exported value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// Check whether a name is exported
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Get the default export
    pub fn get_default(&self) -> Option<&Value> {
        self.bindings.get("default")
    }

    /// Exported names in namespace order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Iterate over all bindings
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of exports
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if nothing is exported
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub(crate) fn insert(&mut self, name: String, value: Value) {
        self.bindings.insert(name, value);
    }

    /// JSON rendering of the bindings
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.bindings
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, Value)> for Namespace {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

/// A value visible to module code.
///
/// Values are immutable and thread-safe; aggregates are shared behind `Arc`.
#[derive(Debug, Clone)]
pub enum Value {
    /// undefined
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Array literal
    Array(Arc<Vec<Value>>),
    /// Plain object
    Object(Arc<BTreeMap<String, Value>>),
    /// Module namespace object
    Namespace(Arc<Namespace>),
    /// Host function
    Function(NativeFunction),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            // NaN != NaN falls out of f64 comparison
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Namespace(a), Value::Namespace(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(&a.func, &b.func),
            _ => false,
        }
    }
}

impl Value {
    /// Create a string value
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Create an object value from key/value pairs
    pub fn object<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Object(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Returns true if this value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns true if this value is null or undefined.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Returns the string contents if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The `typeof` name of the value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) | Value::Object(_) | Value::Namespace(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Converts the value to a number (ToNumber).
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            _ => f64::NAN,
        }
    }

    /// The `+` operator: concatenation if either side is a string or an
    /// aggregate, numeric addition otherwise.
    pub fn add(&self, other: &Value) -> Value {
        let concatenates = |v: &Value| {
            matches!(
                v,
                Value::String(_)
                    | Value::Array(_)
                    | Value::Object(_)
                    | Value::Namespace(_)
                    | Value::Function(_)
            )
        };
        if concatenates(self) || concatenates(other) {
            Value::String(format!("{}{}", self, other))
        } else {
            Value::Number(self.to_number() + other.to_number())
        }
    }

    /// Property lookup. `None` means the base cannot have properties.
    pub fn get_property(&self, key: &str) -> Option<Value> {
        match self {
            Value::Undefined | Value::Null => None,
            Value::Object(map) => Some(map.get(key).cloned().unwrap_or(Value::Undefined)),
            Value::Namespace(ns) => Some(ns.get(key).cloned().unwrap_or(Value::Undefined)),
            Value::Array(items) => Some(match key {
                "length" => Value::Number(items.len() as f64),
                _ => key
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or(Value::Undefined),
            }),
            Value::String(s) if key == "length" => Some(Value::Number(s.chars().count() as f64)),
            Value::Function(f) if key == "name" => Some(Value::String(f.name().to_string())),
            _ => Some(Value::Undefined),
        }
    }

    /// Convert a JSON value (config files, sandbox globals)
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(arr) => {
                Value::Array(Arc::new(arr.iter().map(Value::from_json).collect()))
            }
            serde_json::Value::Object(obj) => Value::Object(Arc::new(
                obj.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            )),
        }
    }

    /// JSON rendering. Functions render as their `[Function: name]` tag and
    /// non-finite numbers as `null`, as `JSON.stringify` would drop them.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serde_json::Value::Number((*n as i64).into())
            }
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Namespace(ns) => ns.to_json(),
            Value::Function(f) => serde_json::Value::String(format!("{:?}", f)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|v| if v.is_nullish() { String::new() } else { v.to_string() })
                    .collect();
                write!(f, "{}", parts.join(","))
            }
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Namespace(_) => write!(f, "[object Module]"),
            Value::Function(func) => write!(f, "function {}() {{ [native code] }}", func.name()),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_concatenates_strings() {
        let v = Value::from("count: ").add(&Value::Number(3.0));
        assert_eq!(v, Value::from("count: 3"));
        assert_eq!(Value::Number(1.5).add(&Value::Boolean(true)), Value::Number(2.5));
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(Value::Number(42.0).to_string(), "42");
        assert_eq!(Value::Number(0.5).to_string(), "0.5");
        assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::Number(f64::NEG_INFINITY).to_string(), "-Infinity");
    }

    #[test]
    fn test_json_conversion() {
        let json = serde_json::json!({ "name": "strata", "ports": [80, 443], "debug": false });
        let value = Value::from_json(&json);
        assert_eq!(
            value.get_property("name"),
            Some(Value::from("strata"))
        );
        assert_eq!(
            value.get_property("ports").and_then(|p| p.get_property("length")),
            Some(Value::Number(2.0))
        );
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn test_namespace_identity() {
        let ns = Arc::new(Namespace::from_iter([("a".to_string(), Value::Null)]));
        let same = Value::Namespace(Arc::clone(&ns));
        let copy = Value::Namespace(Arc::new((*ns).clone()));
        assert_eq!(Value::Namespace(ns), same);
        assert_ne!(same, copy);
    }

    #[test]
    fn test_properties_of_nullish_values() {
        assert_eq!(Value::Undefined.get_property("x"), None);
        assert_eq!(Value::Number(1.0).get_property("x"), Some(Value::Undefined));
    }
}
