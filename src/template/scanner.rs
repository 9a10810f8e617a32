use super::parsers::{is_ident_char, is_ident_start, is_key_char, starts_number};
use crate::error::StoreError;
use crate::types::Value;

/// Byte cursor over the inside of one placeholder.
pub(super) struct Cursor<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(super) fn new(source: &'a str, pos: usize) -> Self {
        Self { source, pos }
    }

    pub(super) fn pos(&self) -> usize {
        self.pos
    }

    fn bytes(&self) -> &'a [u8] {
        self.source.as_bytes()
    }

    pub(super) fn peek(&self) -> Option<u8> {
        self.bytes().get(self.pos).copied()
    }

    pub(super) fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    pub(super) fn expect(&mut self, expected: u8, message: &str) -> Result<(), StoreError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(StoreError::template_parse(self.pos, message))
        }
    }

    pub(super) fn eat(&mut self, expected: &str) -> bool {
        if self.source[self.pos..].starts_with(expected) {
            self.pos += expected.len();
            true
        } else {
            false
        }
    }

    /// `[A-Za-z_][A-Za-z0-9_]*`
    pub(super) fn identifier(&mut self) -> Option<&'a str> {
        self.take(is_ident_char)
    }

    /// Like [`Cursor::identifier`] but dots are allowed after the first byte.
    pub(super) fn key(&mut self) -> Option<&'a str> {
        self.take(is_key_char)
    }

    fn take(&mut self, continues: fn(u8) -> bool) -> Option<&'a str> {
        let start = self.pos;
        if !self.peek().is_some_and(is_ident_start) {
            return None;
        }
        self.pos += 1;
        while self.peek().is_some_and(continues) {
            self.pos += 1;
        }
        Some(&self.source[start..self.pos])
    }

    pub(super) fn at_number(&self) -> bool {
        starts_number(self.bytes(), self.pos)
    }

    /// Single-quoted literal; `''` stands for one quote.
    pub(super) fn string_literal(&mut self) -> Result<String, StoreError> {
        let start = self.pos;
        self.expect(b'\'', "expected `'`")?;
        let mut out = String::new();
        loop {
            let rest = &self.source[self.pos..];
            let Some(quote) = rest.find('\'') else {
                return Err(StoreError::template_parse(start, "unterminated string literal"));
            };
            out.push_str(&rest[..quote]);
            self.pos += quote + 1;
            if self.peek() == Some(b'\'') {
                out.push('\'');
                self.pos += 1;
            } else {
                return Ok(out);
            }
        }
    }

    /// `[+-]?digits[.digits][e[+-]digits]` as `Int` when integral, else `Float`.
    pub(super) fn number_literal(&mut self) -> Result<Value, StoreError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        let mut integral = true;
        self.pos = scan_digits(self.bytes(), self.pos);
        if self.peek() == Some(b'.') {
            integral = false;
            self.pos = scan_digits(self.bytes(), self.pos + 1);
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            integral = false;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            self.pos = scan_digits(self.bytes(), self.pos);
        }

        let text = &self.source[start..self.pos];
        if integral && let Ok(int) = text.parse::<i64>() {
            return Ok(Value::Int(int));
        }
        text.parse::<f64>()
            .map(Value::Float)
            .map_err(|_| StoreError::template_parse(start, format!("invalid number `{text}`")))
    }
}

pub(super) fn scan_digits(bytes: &[u8], start: usize) -> usize {
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    idx
}
