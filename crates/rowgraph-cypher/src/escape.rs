//! Quoting of user-supplied names and literals.
//!
//! Both escaping functions accept any string; nothing is rejected. The output
//! can be spliced into statement text without changing its structure.

/// Quote a label or property name with backticks, doubling embedded ones.
///
/// ```
/// # use rowgraph_cypher::escape_identifier;
/// assert_eq!(escape_identifier("Person"), "`Person`");
/// assert_eq!(escape_identifier("a`b"), "`a``b`");
/// ```
pub fn escape_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('`');
    for c in name.chars() {
        if c == '`' {
            out.push('`');
        }
        out.push(c);
    }
    out.push('`');
    out
}

/// Inverse of [`escape_identifier`].
///
/// Returns `None` if `quoted` is not a backtick-quoted identifier with every
/// inner backtick doubled.
pub fn unescape_identifier(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('`')?.strip_suffix('`')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '`' && chars.next() != Some('`') {
            return None;
        }
        out.push(c);
    }
    Some(out)
}

/// Quote a string literal with double quotes.
///
/// Backslashes are escaped before quotes so an escaped quote is never
/// escaped twice.
pub fn escape_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    out.push_str(&value.replace('\\', "\\\\").replace('"', "\\\""));
    out.push('"');
    out
}

/// Render a map key or property name: bare when it is a plain identifier,
/// backtick-quoted otherwise.
pub fn map_key(name: &str) -> String {
    if is_plain_identifier(name) {
        name.to_string()
    } else {
        escape_identifier(name)
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
