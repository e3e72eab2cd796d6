//! String escaping for the export format.
//!
//! | Character | Written as |
//! |---|---|
//! | `\` | `\\` |
//! | `"` | `\"` |
//! | newline | `\n` |
//! | carriage return | `\r` |
//! | tab | `\t` |
//!
//! Any other control character has no representation and is rejected.

/// Escape `s` for use inside a double-quoted string.
///
/// Returns the first unsupported control character on failure.
pub fn escape(s: &str) -> Result<String, char> {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => return Err(c),
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Inverse of an escape sequence letter, as read after a backslash.
pub fn unescape_char(c: char) -> Option<char> {
    match c {
        '\\' => Some('\\'),
        '"' => Some('"'),
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        _ => None,
    }
}
