//! Light repair of almost-JSON model output.
//!
//! Models that are told to "respond with JSON only" still slip into
//! JavaScript-isms: trailing commas, bare object keys, single-quoted strings,
//! or typographic quotes pasted in by a chat template. Each rule here is a
//! pure `&str → String` pass.
//!
//! The rule set is policy, not contract. Passes are ordered from least to
//! most invasive so legitimate text inside string literals survives whenever
//! a milder pass already yields valid JSON:
//!
//! 1. [`fix_structure`]: trailing commas, bare keys, single-quoted strings;
//!    only ever touches characters *outside* double-quoted strings.
//! 2. [`normalise_typography`] then [`fix_structure`]: smart quotes become
//!    ASCII quotes everywhere, invisible Unicode is dropped.

use once_cell::sync::Lazy;
use regex::Regex;

/// Repaired variants of `input`, mildest first. Variants identical to the
/// input or to an earlier variant are omitted.
pub fn repair_candidates(input: &str) -> Vec<String> {
    let structural = fix_structure(input);
    let typographic = fix_structure(&normalise_typography(input));

    let mut out: Vec<String> = Vec::with_capacity(2);
    for variant in [structural, typographic] {
        if variant != input && !out.contains(&variant) {
            out.push(variant);
        }
    }
    out
}

// ── Pass 1: structural fixes outside strings ─────────────────────────────────

/// Strip trailing commas, quote bare object keys and convert single-quoted
/// strings to double-quoted ones. Double-quoted strings are copied verbatim.
pub fn fix_structure(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    // Last non-whitespace character emitted outside a string.
    let mut last_sig: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                let (_, next) = scan_string(&chars, i, '"');
                out.extend(&chars[i..next]);
                last_sig = Some('"');
                i = next;
            }
            '\'' => {
                let (content_end, next) = scan_string(&chars, i, '\'');
                push_single_quoted(&mut out, &chars[i + 1..content_end]);
                if next > content_end {
                    out.push('"');
                }
                last_sig = Some('"');
                i = next;
            }
            ',' if next_significant(&chars, i + 1).is_some_and(|n| n == '}' || n == ']') => {
                i += 1;
            }
            c if is_ident_start(c) && matches!(last_sig, Some('{') | Some(',')) => {
                let mut end = i;
                while end < chars.len() && is_ident_char(chars[end]) {
                    end += 1;
                }
                if next_significant(&chars, end) == Some(':') {
                    out.push('"');
                    out.extend(&chars[i..end]);
                    out.push('"');
                    last_sig = Some('"');
                } else {
                    out.extend(&chars[i..end]);
                    last_sig = Some(chars[end - 1]);
                }
                i = end;
            }
            _ => {
                out.push(c);
                if !c.is_whitespace() {
                    last_sig = Some(c);
                }
                i += 1;
            }
        }
    }

    out
}

/// Scan a string literal opening at `start`. Returns the index where its
/// content ends and the index just past the closing quote (both equal to
/// `chars.len()` when the literal is unterminated).
fn scan_string(chars: &[char], start: usize, quote: char) -> (usize, usize) {
    let mut j = start + 1;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            c if c == quote => return (j, j + 1),
            _ => j += 1,
        }
    }
    (chars.len(), chars.len())
}

fn push_single_quoted(out: &mut String, content: &[char]) {
    out.push('"');
    let mut k = 0;
    while k < content.len() {
        match content[k] {
            '\\' if content.get(k + 1) == Some(&'\'') => {
                out.push('\'');
                k += 2;
            }
            '\\' => {
                out.push('\\');
                if let Some(&escaped) = content.get(k + 1) {
                    out.push(escaped);
                }
                k += 2;
            }
            '"' => {
                out.push_str("\\\"");
                k += 1;
            }
            other => {
                out.push(other);
                k += 1;
            }
        }
    }
}

fn next_significant(chars: &[char], from: usize) -> Option<char> {
    chars[from.min(chars.len())..]
        .iter()
        .copied()
        .find(|c| !c.is_whitespace())
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '-'
}

// ── Pass 2: typography ───────────────────────────────────────────────────────

static RE_DOUBLE_SMART: Lazy<Regex> = Lazy::new(|| Regex::new("[\u{201C}\u{201D}\u{201E}\u{201F}\u{2033}]").unwrap());
static RE_SINGLE_SMART: Lazy<Regex> = Lazy::new(|| Regex::new("[\u{2018}\u{2019}\u{201A}\u{201B}\u{2032}]").unwrap());

/// Replace typographic quotes with ASCII ones and drop invisible Unicode
/// (zero-width spaces, BOM, soft hyphens) that JSON parsers reject.
pub fn normalise_typography(input: &str) -> String {
    let s = RE_DOUBLE_SMART.replace_all(input, "\"");
    let s = RE_SINGLE_SMART.replace_all(&s, "'");
    s.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}
