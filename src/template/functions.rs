use std::fmt;
use std::str::FromStr;

use super::dialect::Dialect;
use crate::error::StoreError;
use crate::types::{Value, format_float};

/// Conversion applied to a placeholder argument.
///
/// The names are fixed; they are what appears inside `{{ name(argument) }}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    /// Quoted string literal
    Str,
    /// Integer
    Int,
    /// Float
    Float,
    /// `true` / `false`
    Bool,
    /// Quoted identifier
    Tbl,
    /// Raw pass-through
    Row,
    /// JSON text as a quoted literal
    Json,
    /// Integer array literal, quoted
    ArrInt,
    /// Text array literal, quoted
    ArrStr,
    /// Integer list for `IN (...)`
    InInt,
    /// Quoted string list for `IN (...)`
    InStr,
}

impl Function {
    pub const ALL: [Function; 11] = [
        Function::Str,
        Function::Int,
        Function::Float,
        Function::Bool,
        Function::Tbl,
        Function::Row,
        Function::Json,
        Function::ArrInt,
        Function::ArrStr,
        Function::InInt,
        Function::InStr,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Function::Str => "str",
            Function::Int => "int",
            Function::Float => "float",
            Function::Bool => "bool",
            Function::Tbl => "tbl",
            Function::Row => "row",
            Function::Json => "json",
            Function::ArrInt => "arrint",
            Function::ArrStr => "arrstr",
            Function::InInt => "inint",
            Function::InStr => "instr",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|function| function.name() == name)
    }

    /// Render `value` as query text.
    ///
    /// ```rust
    /// use store_middleware::prelude::*;
    ///
    /// let pg = PostgresDialect;
    /// assert_eq!(Function::Int.apply(&Value::from(vec!["a", "b"]), &pg), "2");
    /// assert_eq!(Function::Tbl.apply(&Value::Int(123), &pg), "\"123\"");
    /// assert_eq!(Function::ArrInt.apply(&Value::from(vec![1, 2, 3]), &pg), "'{1,2,3}'");
    /// ```
    #[must_use]
    pub fn apply(self, value: &Value, dialect: &dyn Dialect) -> String {
        match self {
            Function::Str => dialect.quote_literal(&value.to_text()),
            Function::Int => value.to_int().to_string(),
            Function::Float => float_literal(value.to_float(), dialect),
            Function::Bool => bool_literal(value.is_truthy()).to_string(),
            Function::Tbl => dialect.quote_identifier(&value.to_text()),
            Function::Row => row_literal(value),
            Function::Json => dialect.quote_literal(&value.to_json().to_string()),
            Function::ArrInt => {
                let items: Vec<String> = value
                    .elements()
                    .into_iter()
                    .map(|item| item.to_int().to_string())
                    .collect();
                dialect.quote_literal(&array_literal(&items))
            }
            Function::ArrStr => {
                let items: Vec<String> = value
                    .elements()
                    .into_iter()
                    .map(|item| array_element(&item.to_text()))
                    .collect();
                dialect.quote_literal(&array_literal(&items))
            }
            Function::InInt => in_list(
                value
                    .elements()
                    .into_iter()
                    .map(|item| item.to_int().to_string())
                    .collect(),
            ),
            Function::InStr => in_list(
                value
                    .elements()
                    .into_iter()
                    .map(|item| dialect.quote_literal(&item.to_text()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Function {
    type Err = StoreError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::from_name(name)
            .ok_or_else(|| StoreError::template_parse(0, format!("unknown template function `{name}`")))
    }
}

fn bool_literal(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

fn float_literal(value: f64, dialect: &dyn Dialect) -> String {
    if value.is_finite() {
        format_float(value)
    } else {
        // NaN and infinities only exist as quoted input strings
        dialect.quote_literal(&format_float(value))
    }
}

fn row_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        other => other.to_text(),
    }
}

fn array_literal(items: &[String]) -> String {
    format!("{{{}}}", items.join(","))
}

fn array_element(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

fn in_list(items: Vec<String>) -> String {
    if items.is_empty() {
        // `IN ()` is a syntax error; `IN (NULL)` matches nothing
        "(NULL)".to_string()
    } else {
        format!("({})", items.join(","))
    }
}
