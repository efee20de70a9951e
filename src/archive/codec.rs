//! Row codec: one record per tab-separated line.
//!
//! Fields are escaped so that a record never spans lines:
//!
//! | raw         | escaped |
//! |-------------|---------|
//! | `\`         | `\\`    |
//! | newline     | `\n`    |
//! | tab         | `\t`    |
//!
//! Escaping is applied in that order. Unescaping is done in a single
//! left-to-right pass, so `\\n` always decodes to a backslash followed by
//! `n` and never to a newline.

/// Escape one field.
#[must_use]
pub fn escape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverse [`escape`]. Unknown escape sequences are kept verbatim.
#[must_use]
pub fn unescape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Encode a record as a single terminated line.
#[must_use]
pub fn encode<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = fields
        .iter()
        .map(|f| escape(f.as_ref()))
        .collect::<Vec<_>>()
        .join("\t");
    line.push('\n');
    line
}

/// Decode a line (with or without its `\n` terminator) into fields.
#[must_use]
pub fn decode(line: &str) -> Vec<String> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.split('\t').map(unescape).collect()
}
