use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

/// Parameter mapping handed to a query template: placeholder argument key → value.
pub type Params = HashMap<String, Value>;

/// Custom serialization hook for the `row` template function.
///
/// ```rust
/// use store_middleware::prelude::*;
///
/// #[derive(Debug)]
/// struct Point(i32, i32);
///
/// impl RowLiteral for Point {
///     fn to_row_literal(&self) -> String {
///         format!("ROW({}, {})", self.0, self.1)
///     }
/// }
///
/// let value = Value::row(Point(1, 2));
/// assert_eq!(value.to_text(), "ROW(1, 2)");
/// ```
pub trait RowLiteral: fmt::Debug + Send + Sync {
    fn to_row_literal(&self) -> String;
}

/// Untyped value bound to a template placeholder.
///
/// Values arrive without a declared type; each template function decides how to coerce them:
/// ```rust
/// use store_middleware::prelude::*;
///
/// let params = params! {
///     "id" => 7,
///     "name" => "alice",
///     "tags" => vec!["a", "b"],
///     "deleted" => Option::<i64>::None,
/// };
/// assert_eq!(params["tags"].to_int(), 2);
/// assert!(params["deleted"].is_null());
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent value
    Null,
    Bool(bool),
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    Text(String),
    /// Ordered sequence
    List(Vec<Value>),
    /// Ordered key/value pairs
    Map(Vec<(String, Value)>),
    /// Opaque composite with its own textual form
    Row(Arc<dyn RowLiteral>),
}

impl Value {
    pub fn row(literal: impl RowLiteral + 'static) -> Self {
        Value::Row(Arc::new(literal))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let Value::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        if let Value::Int(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let Value::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        if let Value::List(values) = self {
            Some(values)
        } else {
            None
        }
    }

    /// Integer coercion used by `int`, `arrint` and `inint`.
    ///
    /// Null, empty and non-numeric text yield 0; sequences yield their element count;
    /// text with a numeric prefix yields that number truncated toward zero.
    #[must_use]
    pub fn to_int(&self) -> i64 {
        match self {
            Value::Null => 0,
            Value::Bool(b) => i64::from(*b),
            Value::Int(i) => *i,
            #[allow(clippy::cast_possible_truncation)]
            Value::Float(f) => *f as i64,
            Value::Text(text) => text_to_int(text),
            Value::List(values) => len_to_i64(values.len()),
            Value::Map(entries) => len_to_i64(entries.len()),
            Value::Row(_) => 1,
        }
    }

    /// Float coercion used by `float`; same falsy-to-zero rules as [`Value::to_int`].
    #[must_use]
    pub fn to_float(&self) -> f64 {
        match self {
            Value::Float(f) => *f,
            Value::Text(text) => numeric_prefix(text)
                .and_then(|(prefix, _)| prefix.parse::<f64>().ok())
                .unwrap_or(0.0),
            #[allow(clippy::cast_precision_loss)]
            other => other.to_int() as f64,
        }
    }

    /// Truthiness used by `bool`.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(text) => !(text.is_empty() || text == "0"),
            Value::List(values) => !values.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            Value::Row(_) => true,
        }
    }

    /// Raw textual form, before any quoting.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Text(text) => text.clone(),
            Value::List(_) | Value::Map(_) => self.to_json().to_string(),
            Value::Row(literal) => literal.to_row_literal(),
        }
    }

    /// JSON form used by the `json` template function. Non-finite floats become `null`.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
            Value::Text(text) => JsonValue::String(text.clone()),
            Value::List(values) => JsonValue::Array(values.iter().map(Value::to_json).collect()),
            Value::Map(entries) => JsonValue::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
            Value::Row(literal) => JsonValue::String(literal.to_row_literal()),
        }
    }

    /// Elements seen by the array and `IN` list functions: lists yield their items, maps their
    /// values, null yields nothing and any scalar is a single element.
    #[must_use]
    pub fn elements(&self) -> Vec<&Value> {
        match self {
            Value::Null => Vec::new(),
            Value::List(values) => values.iter().collect(),
            Value::Map(entries) => entries.iter().map(|(_, value)| value).collect(),
            scalar => vec![scalar],
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Row(a), Value::Row(b)) => a.to_row_literal() == b.to_row_literal(),
            _ => false,
        }
    }
}

fn len_to_i64(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}

fn text_to_int(text: &str) -> i64 {
    match numeric_prefix(text) {
        Some((prefix, true)) => prefix.parse::<i64>().unwrap_or_else(|_| {
            // out of i64 range: saturate through f64
            #[allow(clippy::cast_possible_truncation)]
            let saturated = prefix.parse::<f64>().map_or(0, |f| f as i64);
            saturated
        }),
        #[allow(clippy::cast_possible_truncation)]
        Some((prefix, false)) => prefix.parse::<f64>().map_or(0, |f| f as i64),
        None => 0,
    }
}

/// Leading numeric portion of `text` (after leading whitespace), plus whether it is integral.
fn numeric_prefix(text: &str) -> Option<(&str, bool)> {
    let s = text.trim_start_matches([' ', '\t', '\n', '\r', '\x0b', '\x0c']);
    let bytes = s.as_bytes();
    let mut idx = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        idx += 1;
    }
    let int_start = idx;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    let mut digits = idx - int_start;
    let mut integral = true;

    if bytes.get(idx) == Some(&b'.') {
        let frac_start = idx + 1;
        let mut end = frac_start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if digits > 0 || end > frac_start {
            digits += end - frac_start;
            idx = end;
            integral = false;
        }
    }
    if digits == 0 {
        return None;
    }

    if matches!(bytes.get(idx), Some(b'e' | b'E')) {
        let mut end = idx + 1;
        if matches!(bytes.get(end), Some(b'+' | b'-')) {
            end += 1;
        }
        let exp_start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end > exp_start {
            idx = end;
            integral = false;
        }
    }

    Some((&s[..idx], integral))
}

pub(crate) fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        value.to_string()
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Int(i64::from(value))
                }
            }
        )*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Int(len_to_i64(value))
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Text(value.format("%Y-%m-%d %H:%M:%S%.f").to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Clone + Into<Value>> From<&[T]> for Value {
    fn from(values: &[T]) -> Self {
        Value::List(values.iter().cloned().map(Into::into).collect())
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            JsonValue::String(s) => Value::Text(s),
            JsonValue::Array(values) => Value::List(values.into_iter().map(Value::from).collect()),
            JsonValue::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}
