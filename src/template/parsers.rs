pub(super) fn is_placeholder_open(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'{') && bytes.get(idx + 1) == Some(&b'{')
}

pub(super) fn is_placeholder_close(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'}') && bytes.get(idx + 1) == Some(&b'}')
}

pub(super) fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

pub(super) fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Parameter keys may be dotted or dashed after the first byte, e.g. `user.id`, `user-id`.
pub(super) fn is_key_char(b: u8) -> bool {
    is_ident_char(b) || b == b'.' || b == b'-'
}

pub(super) fn starts_number(bytes: &[u8], idx: usize) -> bool {
    match bytes.get(idx) {
        Some(b) if b.is_ascii_digit() => true,
        Some(b'+' | b'-' | b'.') => bytes
            .get(idx + 1)
            .is_some_and(|next| next.is_ascii_digit() || *next == b'.'),
        _ => false,
    }
}
