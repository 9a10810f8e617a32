use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;

mod dialect;
mod functions;
mod parsers;
mod scanner;

use parsers::{is_placeholder_close, is_placeholder_open};
use scanner::Cursor;
use tracing::trace;

use crate::error::StoreError;
use crate::types::{Params, Value};

pub use dialect::{Dialect, PostgresDialect, RedisDialect};
pub use functions::Function;

/// What a placeholder is evaluated against.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// Key looked up in the parameter mapping at render time
    Key(String),
    /// Value written directly in the template: `'text'`, a number, `null`, `true`, `false`
    Literal(Value),
}

/// One `{{ function(argument) }}` marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    function: Function,
    argument: Argument,
    span: Range<usize>,
}

impl Placeholder {
    #[must_use]
    pub fn function(&self) -> Function {
        self.function
    }

    #[must_use]
    pub fn argument(&self) -> &Argument {
        &self.argument
    }

    /// Byte range of the marker in the template source.
    #[must_use]
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    fn render(&self, params: &Params, dialect: &dyn Dialect) -> Result<String, StoreError> {
        let value = match &self.argument {
            Argument::Key(key) => params
                .get(key)
                .ok_or_else(|| StoreError::TemplateParameterMissing(key.clone()))?,
            Argument::Literal(value) => value,
        };
        Ok(self.function.apply(value, dialect))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Literal(String),
    Placeholder(Placeholder),
}

/// A parsed query template.
///
/// Text outside `{{ ... }}` markers passes through untouched. Parsing fails fast on malformed
/// markers, so a template that parsed can only fail to render on a missing parameter.
///
/// ```rust
/// use store_middleware::prelude::*;
///
/// # fn main() -> Result<(), StoreError> {
/// let template = Template::parse("select count(*) from {{ tbl(table) }}")?;
/// let sql = template.render(&params! { "table" => "pg_class" }, &PostgresDialect)?;
/// assert_eq!(sql, r#"select count(*) from "pg_class""#);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    /// # Errors
    /// Returns `StoreError::TemplateParse` for malformed markers or unknown function names.
    pub fn parse(source: &str) -> Result<Self, StoreError> {
        let bytes = source.as_bytes();
        let mut nodes = Vec::new();
        let mut literal_start = 0;
        let mut idx = 0;

        while idx < bytes.len() {
            if is_placeholder_open(bytes, idx) {
                if idx > literal_start {
                    nodes.push(Node::Literal(source[literal_start..idx].to_string()));
                }
                let placeholder = scan_placeholder(source, idx)?;
                idx = placeholder.span.end;
                literal_start = idx;
                nodes.push(Node::Placeholder(placeholder));
            } else {
                idx += 1;
            }
        }
        if literal_start < bytes.len() {
            nodes.push(Node::Literal(source[literal_start..].to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            nodes,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Placeholder(placeholder) => Some(placeholder),
            Node::Literal(_) => None,
        })
    }

    #[must_use]
    pub fn has_placeholders(&self) -> bool {
        self.placeholders().next().is_some()
    }

    /// Parameter keys referenced by the template, in first-use order, without repeats.
    #[must_use]
    pub fn parameter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for placeholder in self.placeholders() {
            if let Argument::Key(key) = &placeholder.argument
                && !names.contains(&key.as_str())
            {
                names.push(key);
            }
        }
        names
    }

    /// Substitute every placeholder using `params` and `dialect`'s quoting rules.
    ///
    /// # Errors
    /// Returns `StoreError::TemplateParameterMissing` when a referenced key is absent.
    pub fn render(&self, params: &Params, dialect: &dyn Dialect) -> Result<String, StoreError> {
        let mut out = String::with_capacity(self.source.len());
        for node in &self.nodes {
            match node {
                Node::Literal(text) => out.push_str(text),
                Node::Placeholder(placeholder) => {
                    out.push_str(&placeholder.render(params, dialect)?);
                }
            }
        }
        trace!(dialect = dialect.name(), query = %out, "rendered template");
        Ok(out)
    }
}

impl FromStr for Template {
    type Err = StoreError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Self::parse(source)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse and render in one step.
///
/// # Errors
/// Returns template parse or missing-parameter errors.
pub fn render(source: &str, params: &Params, dialect: &dyn Dialect) -> Result<String, StoreError> {
    Template::parse(source)?.render(params, dialect)
}

fn scan_placeholder(source: &str, start: usize) -> Result<Placeholder, StoreError> {
    let mut cursor = Cursor::new(source, start + 2);
    cursor.skip_whitespace();

    let name_pos = cursor.pos();
    let name = cursor
        .identifier()
        .ok_or_else(|| StoreError::template_parse(name_pos, "expected template function name"))?;
    let function = Function::from_name(name).ok_or_else(|| {
        StoreError::template_parse(name_pos, format!("unknown template function `{name}`"))
    })?;

    cursor.skip_whitespace();
    cursor.expect(b'(', "expected `(` after template function name")?;
    cursor.skip_whitespace();
    let argument = scan_argument(&mut cursor)?;
    cursor.skip_whitespace();
    cursor.expect(b')', "expected `)` after template argument")?;
    cursor.skip_whitespace();

    if !is_placeholder_close(source.as_bytes(), cursor.pos()) || !cursor.eat("}}") {
        return Err(StoreError::template_parse(
            cursor.pos(),
            "expected `}}` to close placeholder",
        ));
    }

    Ok(Placeholder {
        function,
        argument,
        span: start..cursor.pos(),
    })
}

fn scan_argument(cursor: &mut Cursor<'_>) -> Result<Argument, StoreError> {
    let pos = cursor.pos();
    if cursor.at_number() {
        return cursor.number_literal().map(Argument::Literal);
    }
    if cursor.peek() == Some(b'\'') {
        return cursor
            .string_literal()
            .map(|text| Argument::Literal(Value::Text(text)));
    }
    match cursor.key() {
        Some("null") => Ok(Argument::Literal(Value::Null)),
        Some("true") => Ok(Argument::Literal(Value::Bool(true))),
        Some("false") => Ok(Argument::Literal(Value::Bool(false))),
        Some(key) => Ok(Argument::Key(key.to_string())),
        None => Err(StoreError::template_parse(
            pos,
            "expected parameter name or literal",
        )),
    }
}

/// Parsed templates keyed by source text.
///
/// Drivers keep one per connection so repeated queries skip re-parsing. When full, the cache
/// is emptied and refilled.
#[derive(Debug)]
pub struct TemplateCache {
    entries: HashMap<String, Arc<Template>>,
    capacity: usize,
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl TemplateCache {
    pub const DEFAULT_CAPACITY: usize = 128;

    /// A capacity of zero disables caching.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
        }
    }

    /// # Errors
    /// Returns `StoreError::TemplateParse` when `source` is not a valid template.
    pub fn get_or_parse(&mut self, source: &str) -> Result<Arc<Template>, StoreError> {
        if let Some(template) = self.entries.get(source) {
            return Ok(Arc::clone(template));
        }
        let template = Arc::new(Template::parse(source)?);
        if self.capacity > 0 {
            if self.entries.len() >= self.capacity {
                self.entries.clear();
            }
            self.entries
                .insert(source.to_string(), Arc::clone(&template));
        }
        Ok(template)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
