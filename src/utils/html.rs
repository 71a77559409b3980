//! HTML utility functions.
//!
//! - `escape()`, `escape_attr()` - HTML entity escaping
//! - `is_void_element()` - Elements that never take children (br, img, etc.)
//! - `strip_tags()` - Text content of a markup fragment
//! - `inject_before_body_end()` - Splice markup into an existing document

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

// =============================================================================
// HTML Escaping
// =============================================================================

/// Characters that require HTML escaping.
const ESCAPE_CHARS: [char; 5] = ['<', '>', '&', '"', '\''];

/// Get the HTML entity for a special character.
#[inline]
fn escape_char(c: char) -> Option<&'static str> {
    match c {
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '&' => Some("&amp;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#39;"),
        _ => None,
    }
}

/// Escape HTML special characters in text content.
///
/// Uses `Cow` to avoid allocation when no escaping is needed.
#[inline]
pub fn escape(s: &str) -> Cow<'_, str> {
    escape_with(s, &ESCAPE_CHARS)
}

/// Escape an attribute value for a double-quoted attribute.
///
/// Leaves `'` and `>` alone so JSX literals such as `className='x'` come out
/// readable (`class="x"`).
#[inline]
pub fn escape_attr(s: &str) -> Cow<'_, str> {
    escape_with(s, &['"', '&', '<'])
}

#[inline]
fn escape_with<'a>(s: &'a str, chars: &[char]) -> Cow<'a, str> {
    if !s.contains(chars) {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match escape_char(c) {
            Some(entity) if chars.contains(&c) => result.push_str(entity),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}

// =============================================================================
// Element Classification
// =============================================================================

/// Check if an HTML tag is a void element.
#[inline]
pub fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

// =============================================================================
// Fragment Helpers
// =============================================================================

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Text content of a fragment: tags removed, whitespace collapsed.
pub fn strip_tags(fragment: &str) -> String {
    let text = TAG_RE.replace_all(fragment, "");
    SPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Insert `markup` right before the last `</body>`, or append when absent.
pub fn inject_before_body_end(document: &str, markup: &str) -> String {
    match document.rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(document.len() + markup.len());
            out.push_str(&document[..pos]);
            out.push_str(markup);
            out.push_str(&document[pos..]);
            out
        }
        None => format!("{document}{markup}"),
    }
}

// =============================================================================
// Tests
// =============================================================================
