use crate::error::StoreError;

/// Split an inline command line into arguments the way the Redis server does.
///
/// Unquoted arguments end at whitespace. Double-quoted arguments understand `\n`, `\r`, `\t`,
/// `\b`, `\a`, `\xHH` and backslash-escaped characters; single-quoted arguments only
/// understand `\'`. A closing quote must be followed by whitespace or the end of the line.
///
/// ```rust
/// use store_middleware::redis::split_args;
///
/// let args = split_args(r#"SET "user:1" "a \"quoted\" word""#).unwrap();
/// assert_eq!(args, vec![b"SET".to_vec(), b"user:1".to_vec(), b"a \"quoted\" word".to_vec()]);
/// assert!(split_args(r#"GET "open"#).is_err());
/// ```
///
/// # Errors
/// Returns `StoreError::TemplateParse` for unbalanced quotes or a closing quote glued to the
/// next argument.
pub fn split_args(line: &str) -> Result<Vec<Vec<u8>>, StoreError> {
    let bytes = line.as_bytes();
    let mut args = Vec::new();
    let mut pos = 0;

    loop {
        while pos < bytes.len() && is_space(bytes[pos]) {
            pos += 1;
        }
        if pos >= bytes.len() {
            return Ok(args);
        }

        let mut current = Vec::new();
        loop {
            match bytes.get(pos) {
                None | Some(b' ' | b'\n' | b'\r' | b'\t' | b'\0') => break,
                Some(b'"') => pos = double_quoted(bytes, pos, &mut current)?,
                Some(b'\'') => pos = single_quoted(bytes, pos, &mut current)?,
                Some(&b) => {
                    current.push(b);
                    pos += 1;
                }
            }
        }
        args.push(current);
    }
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c')
}

fn hex_value(b: u8) -> Option<u8> {
    char::from(b)
        .to_digit(16)
        .and_then(|digit| u8::try_from(digit).ok())
}

/// Returns the position just past the closing quote.
fn double_quoted(bytes: &[u8], open: usize, out: &mut Vec<u8>) -> Result<usize, StoreError> {
    let mut pos = open + 1;
    loop {
        match bytes.get(pos) {
            None => {
                return Err(StoreError::template_parse(open, "unbalanced double quote"));
            }
            Some(b'\\') => {
                let escaped = bytes.get(pos + 1).copied();
                if escaped == Some(b'x')
                    && let (Some(hi), Some(lo)) = (
                        bytes.get(pos + 2).copied().and_then(hex_value),
                        bytes.get(pos + 3).copied().and_then(hex_value),
                    )
                {
                    out.push(hi * 16 + lo);
                    pos += 4;
                    continue;
                }
                match escaped {
                    Some(b'n') => out.push(b'\n'),
                    Some(b'r') => out.push(b'\r'),
                    Some(b't') => out.push(b'\t'),
                    Some(b'b') => out.push(0x08),
                    Some(b'a') => out.push(0x07),
                    Some(other) => out.push(other),
                    None => {
                        return Err(StoreError::template_parse(open, "unbalanced double quote"));
                    }
                }
                pos += 2;
            }
            Some(b'"') => return closing_quote(bytes, pos),
            Some(&b) => {
                out.push(b);
                pos += 1;
            }
        }
    }
}

fn single_quoted(bytes: &[u8], open: usize, out: &mut Vec<u8>) -> Result<usize, StoreError> {
    let mut pos = open + 1;
    loop {
        match bytes.get(pos) {
            None => {
                return Err(StoreError::template_parse(open, "unbalanced single quote"));
            }
            Some(b'\\') if bytes.get(pos + 1) == Some(&b'\'') => {
                out.push(b'\'');
                pos += 2;
            }
            Some(b'\'') => return closing_quote(bytes, pos),
            Some(&b) => {
                out.push(b);
                pos += 1;
            }
        }
    }
}

fn closing_quote(bytes: &[u8], pos: usize) -> Result<usize, StoreError> {
    match bytes.get(pos + 1) {
        Some(&next) if !is_space(next) => Err(StoreError::template_parse(
            pos + 1,
            "closing quote must be followed by a space",
        )),
        _ => Ok(pos + 1),
    }
}
