//! Case conventions and reserved-word handling for target identifiers.

/// Words the target grammar reserves; such identifiers get a trailing `_`.
const RESERVED: &[&str] = &[
    "after", "alias", "and", "case", "catch", "cond", "def", "defmodule", "defp", "do", "else",
    "end", "false", "fn", "for", "import", "in", "nil", "not", "or", "quote", "raise", "receive",
    "require", "rescue", "true", "try", "unquote", "when", "with",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED.binary_search(&name).is_ok()
}

/// Convert camelCase / PascalCase to snake_case.
///
/// Acronyms are split once: `HTTPServer` becomes `http_server`. Characters
/// that cannot appear in an identifier become `_`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                let next_lower = chars.get(i + 1).is_some_and(char::is_ascii_lowercase);
                let boundary = prev.is_ascii_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_ascii_uppercase() && next_lower);
                if boundary && !out.ends_with('_') {
                    out.push('_');
                }
            }
            out.push(c.to_ascii_lowercase());
        } else if c.is_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    out
}

/// Split a front-end shadow-avoidance suffix: `total$2` → `("total", "2")`.
pub fn split_shadow_suffix(name: &str, separator: char) -> Option<(&str, &str)> {
    let (base, digits) = name.rsplit_once(separator)?;
    if base.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((base, digits))
}

/// Default display form of a declared name: leading underscores stripped,
/// snake_cased, reserved words escaped.
pub fn convert_name(declared: &str, escape_reserved: bool) -> String {
    let snake = to_snake_case(declared);
    let trimmed = snake.trim_start_matches('_');
    if trimmed.is_empty() {
        return "_".to_string();
    }
    let mut name = trimmed.to_string();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    if escape_reserved && is_reserved(&name) {
        name.push('_');
    }
    name
}

/// Atom spelling of a constructor tag.
pub fn ctor_tag(ctor: &str) -> String {
    let trimmed = ctor.trim_start_matches('_');
    if trimmed.is_empty() {
        return "_".to_string();
    }
    to_snake_case(trimmed)
}
