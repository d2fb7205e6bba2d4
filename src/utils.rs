//! Utility functions for response sanitization and message splitting.

use unicode_segmentation::UnicodeSegmentation;

/// Character entities that must survive re-sanitization untouched.
///
/// Telegram's HTML mode accepts only these named entities plus numeric
/// references; notably `&apos;` is not recognized, so it gets escaped.
const NAMED_ENTITIES: &[&str] = &["amp;", "lt;", "gt;", "quot;"];

/// Longest entity an escaped message can carry: `&#1234567;`.
const MAX_ENTITY_LEN: usize = 10;

/// Returns true when `rest` (the text following a `&`) begins a character
/// entity, either named or numeric (`#` followed by up to 7 digits and `;`).
fn is_entity_start(rest: &str) -> bool {
    if NAMED_ENTITIES.iter().any(|e| rest.starts_with(e)) {
        return true;
    }
    let Some(stripped) = rest.strip_prefix('#') else {
        return false;
    };
    match stripped.find(';') {
        Some(n) if (1..=7).contains(&n) => stripped[..n].chars().all(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// Escapes markup-significant characters so agent output renders as literal
/// text under Telegram's HTML parse mode.
///
/// Policy: escape everything rather than strip, so no information is lost.
/// An ampersand that already begins a character entity is left alone, which
/// makes the transform idempotent: sanitizing twice never produces a visible
/// `&amp;lt;` artifact.
///
/// # Examples
///
/// ```
/// use asistente_rs::utils::sanitize_html;
/// assert_eq!(sanitize_html("1 < 2 & 3 > 1"), "1 &lt; 2 &amp; 3 &gt; 1");
/// assert_eq!(sanitize_html("&lt;b&gt;"), "&lt;b&gt;");
/// ```
#[must_use]
pub fn sanitize_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.char_indices() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' if !is_entity_start(&text[i + 1..]) => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    out
}

/// Byte length of a complete `&...;` entity at the start of `s`, if any.
fn entity_prefix_len(s: &str) -> Option<usize> {
    let rest = s.strip_prefix('&')?;
    let n = rest.find(';')?;
    if n == 0 || n + 2 > MAX_ENTITY_LEN {
        return None;
    }
    rest[..n]
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '#')
        .then_some(n + 2)
}

/// Splits a long message into parts that fit within Telegram's message limit.
///
/// Splits at line boundaries; a single line longer than `max_length` is split
/// by grapheme clusters so multi-byte characters are never broken apart. A
/// `&...;` character entity counts as one unit, so sanitized output is never
/// severed mid-entity.
///
/// # Examples
///
/// ```
/// use asistente_rs::utils::split_long_message;
/// let long_msg = "A very long message...\n".repeat(300);
/// let parts = split_long_message(&long_msg, 4096);
/// assert!(parts.len() > 1);
/// ```
#[must_use]
pub fn split_long_message(message: &str, max_length: usize) -> Vec<String> {
    if message.is_empty() {
        return Vec::new();
    }

    if message.len() <= max_length {
        return vec![message.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();

    for line in message.lines() {
        if line.len() > max_length {
            if !current.is_empty() {
                parts.push(current.trim_end().to_string());
                current.clear();
            }

            let mut chunk = String::new();
            let mut rest = line;
            while !rest.is_empty() {
                let unit_len = entity_prefix_len(rest)
                    .or_else(|| rest.graphemes(true).next().map(str::len))
                    .unwrap_or(rest.len());
                let (unit, tail) = rest.split_at(unit_len);
                if chunk.len() + unit.len() > max_length && !chunk.is_empty() {
                    parts.push(chunk.trim_end().to_string());
                    chunk.clear();
                }
                chunk.push_str(unit);
                rest = tail;
            }
            if !chunk.is_empty() {
                current.push_str(&chunk);
                current.push('\n');
            }
            continue;
        }

        if current.len() + line.len() + 1 > max_length && !current.is_empty() {
            parts.push(current.trim_end().to_string());
            current.clear();
        }
        current.push_str(line);
        current.push('\n');
    }

    if !current.is_empty() {
        parts.push(current.trim_end().to_string());
    }

    parts
}
