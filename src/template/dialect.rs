/// Backend-specific quoting used by the template functions.
pub trait Dialect: Send + Sync {
    /// Short backend name, used in log events.
    fn name(&self) -> &'static str;

    /// Quote `text` as a string literal.
    fn quote_literal(&self, text: &str) -> String;

    /// Quote `text` as an identifier (table, column, key name).
    fn quote_identifier(&self, text: &str) -> String;
}

/// PostgreSQL quoting, following libpq's `PQescapeLiteral` / `PQescapeIdentifier`.
///
/// Literals double embedded single quotes. When the text contains a backslash, backslashes
/// are doubled as well and the literal gets the ` E` escape-string prefix (leading space
/// included, as libpq emits it). Identifiers are wrapped in double quotes with embedded
/// double quotes doubled. Text is cut at the first NUL byte, which PostgreSQL cannot store.
///
/// ```rust
/// use store_middleware::prelude::*;
///
/// assert_eq!(PostgresDialect.quote_literal("it's"), "'it''s'");
/// assert_eq!(PostgresDialect.quote_literal(r"a\b"), r" E'a\\b'");
/// assert_eq!(PostgresDialect.quote_identifier(r#"my"table"#), r#""my""table""#);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_literal(&self, text: &str) -> String {
        let text = until_nul(text);
        let mut out = String::with_capacity(text.len() + 4);
        if text.contains('\\') {
            out.push_str(" E");
        }
        out.push('\'');
        for ch in text.chars() {
            if ch == '\'' || ch == '\\' {
                out.push(ch);
            }
            out.push(ch);
        }
        out.push('\'');
        out
    }

    fn quote_identifier(&self, text: &str) -> String {
        let text = until_nul(text);
        let mut out = String::with_capacity(text.len() + 2);
        out.push('"');
        for ch in text.chars() {
            if ch == '"' {
                out.push(ch);
            }
            out.push(ch);
        }
        out.push('"');
        out
    }
}

/// Redis inline-command quoting: double quotes with backslash escapes, which the server's
/// argument splitter (and [`crate::redis::split_args`]) turn back into the original bytes.
///
/// ```rust
/// use store_middleware::prelude::*;
///
/// assert_eq!(RedisDialect.quote_literal("say \"hi\"\n"), r#""say \"hi\"\n""#);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedisDialect;

impl RedisDialect {
    fn quote(text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 2);
        out.push('"');
        for ch in text.chars() {
            match ch {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                '\x07' => out.push_str("\\a"),
                '\x08' => out.push_str("\\b"),
                c if c.is_ascii_control() => out.push_str(&format!("\\x{:02x}", u32::from(c))),
                c => out.push(c),
            }
        }
        out.push('"');
        out
    }
}

impl Dialect for RedisDialect {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn quote_literal(&self, text: &str) -> String {
        Self::quote(text)
    }

    fn quote_identifier(&self, text: &str) -> String {
        Self::quote(text)
    }
}

fn until_nul(text: &str) -> &str {
    text.find('\0').map_or(text, |idx| &text[..idx])
}
