//! Attribute label → storage column name
//!
//! Datasheet legends arrive in whatever language and punctuation the source site
//! uses ("Auflösung (MP)", "Gewicht inkl. Akku", "ISO-Empfindlichkeit"). They become
//! SQLite column names, so they have to be ASCII, stable across runs and safe to
//! quote. `normalize` is idempotent: feeding its output back in returns it unchanged.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

static UNDERSCORE_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new("_{2,}").expect("underscore pattern is valid"));

/// Map a raw legend to a column identifier.
///
/// Returns the empty string for blank labels (and for labels made only of
/// deleted punctuation). Callers treat `""` as "drop this attribute".
pub fn normalize(label: &str) -> String {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let mut column = String::with_capacity(trimmed.len());
    for ch in transliterate(trimmed).chars() {
        match ch {
            '(' | ')' | '*' | '"' => {}
            c if c.is_ascii_alphanumeric() || c == '_' => column.push(c),
            // space . - , / and everything else that would need quoting
            _ => column.push('_'),
        }
    }

    UNDERSCORE_RUNS
        .replace_all(&column, "_")
        .trim_matches('_')
        .to_string()
}

/// Closest-ASCII rendition of `input`. Characters with no ASCII form become `_`.
fn transliterate(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_ascii() {
            out.push(ch);
            continue;
        }
        if let Some(replacement) = undecomposable_letter(ch) {
            out.push_str(replacement);
            continue;
        }
        for part in std::iter::once(ch).nfkd() {
            if part.is_ascii() {
                out.push(part);
            } else if !is_combining_mark(part) {
                out.push('_');
            }
        }
    }
    out
}

/// Letters that NFKD leaves alone but that have a conventional ASCII spelling.
fn undecomposable_letter(ch: char) -> Option<&'static str> {
    let replacement = match ch {
        'ß' => "ss",
        'ẞ' => "SS",
        'æ' => "ae",
        'Æ' => "AE",
        'œ' => "oe",
        'Œ' => "OE",
        'ø' => "o",
        'Ø' => "O",
        'ł' => "l",
        'Ł' => "L",
        'đ' => "d",
        'Đ' => "D",
        'þ' => "th",
        'Þ' => "Th",
        'µ' | 'μ' => "u",
        _ => return None,
    };
    Some(replacement)
}
