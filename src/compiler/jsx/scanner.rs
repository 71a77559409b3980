//! Recursive-descent scanner over JSX source text.
//!
//! Three mutually recursive constructs:
//!
//! ```text
//! children   := (text | '{' expression '}' | element | closing-tag)*
//! element    := '<' name attribute* ('/>' | '>' children)
//! expression := (string | template | comment | '{' expression '}' | element | any)*
//! ```
//!
//! Expressions are never evaluated. The scanner only needs to find where
//! they end, which is why nested braces, strings, template literals and
//! JSX inside expressions (`{items.map(i => <li>{i}</li>)}`) are all walked
//! structurally. String-literal expressions are the one thing kept.

use crate::error::CompileError;
use crate::utils::html::{escape, escape_attr, is_void_element};

/// Bytes after which a `<` starts a JSX element inside an expression.
const JSX_CONTEXT: &[u8] = b"(,=:?&|{[!>";

pub(super) struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub(super) fn new(src: &'a str, pos: usize) -> Self {
        Self { src, pos }
    }

    // =========================================================================
    // Cursor primitives
    // =========================================================================

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    #[inline]
    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    /// Advance past one (possibly multi-byte) character.
    #[inline]
    fn bump(&mut self) {
        if let Some(c) = self.src[self.pos..].chars().next() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn read_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn read_name(&mut self) -> &'a str {
        self.read_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_' | b':'))
    }

    /// `<` opens an element when followed by a tag name start or `>` (fragment).
    fn at_element_start(&self) -> bool {
        self.peek() == Some(b'<')
            && self
                .peek_at(1)
                .is_some_and(|b| b.is_ascii_alphabetic() || b == b'>')
    }

    // =========================================================================
    // Children
    // =========================================================================

    /// Translate children until the closing tag of the current element.
    ///
    /// `inside` is false only at the root, where a stray closing tag is
    /// copied through instead of ending the scan. EOF inside an element is
    /// tolerated: the output is lossy, not strict.
    fn children(&mut self, out: &mut String, inside: bool) -> Result<(), CompileError> {
        while let Some(b) = self.peek() {
            match b {
                b'<' if self.peek_at(1) == Some(b'/') => {
                    self.closing_tag(out)?;
                    if inside {
                        return Ok(());
                    }
                }
                b'<' if self.at_element_start() => self.element(out)?,
                b'{' => {
                    let expr = self.expression()?;
                    if let Some(text) = string_literal(expr) {
                        out.push_str(&escape(&text));
                    }
                }
                _ => {
                    let start = self.pos;
                    self.pos += 1;
                    while self.peek().is_some_and(|b| b != b'<' && b != b'{') {
                        self.pos += 1;
                    }
                    out.push_str(&self.src[start..self.pos]);
                }
            }
        }
        Ok(())
    }

    fn closing_tag(&mut self, out: &mut String) -> Result<(), CompileError> {
        let start = self.pos;
        self.pos += 2;
        self.skip_whitespace();
        let name = self.read_name();
        self.skip_whitespace();
        if self.peek() != Some(b'>') {
            return Err(CompileError::UnterminatedTag {
                tag: format!("/{name}"),
                offset: start,
            });
        }
        self.pos += 1;

        let tag = map_tag(name);
        if !name.is_empty() && !is_void_element(tag) {
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        Ok(())
    }

    // =========================================================================
    // Elements
    // =========================================================================

    /// Translate one element (and its subtree) starting at `<`.
    pub(super) fn element(&mut self, out: &mut String) -> Result<(), CompileError> {
        let start = self.pos;
        self.pos += 1;

        // fragment: children only
        if self.peek() == Some(b'>') {
            self.pos += 1;
            return self.children(out, true);
        }

        let name = self.read_name();
        let tag = map_tag(name);
        let mut attrs = String::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => {
                    return Err(CompileError::UnterminatedTag {
                        tag: name.to_string(),
                        offset: start,
                    });
                }
                Some(b'/') if self.peek_at(1) == Some(b'>') => {
                    self.pos += 2;
                    push_open(out, tag, &attrs);
                    if !is_void_element(tag) {
                        out.push_str("</");
                        out.push_str(tag);
                        out.push('>');
                    }
                    return Ok(());
                }
                Some(b'>') => {
                    self.pos += 1;
                    push_open(out, tag, &attrs);
                    if is_void_element(tag) {
                        return Ok(());
                    }
                    return self.children(out, true);
                }
                // spread props: {...rest}
                Some(b'{') => {
                    self.expression()?;
                }
                Some(_) => self.attribute(&mut attrs)?,
            }
        }
    }

    fn attribute(&mut self, attrs: &mut String) -> Result<(), CompileError> {
        let name = self.read_while(|b| {
            !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/' | b'{')
        });
        if name.is_empty() {
            // lone '/' or other junk
            self.bump();
            return Ok(());
        }

        self.skip_whitespace();
        if self.peek() != Some(b'=') {
            attrs.push(' ');
            attrs.push_str(map_attr(name));
            return Ok(());
        }
        self.pos += 1;
        self.skip_whitespace();

        let value = match self.peek() {
            Some(q @ (b'"' | b'\'')) => {
                let start = self.pos;
                self.pos += 1;
                let value = self.read_while(|b| b != q);
                if self.peek().is_none() {
                    return Err(CompileError::UnterminatedString { offset: start });
                }
                self.pos += 1;
                Some(value.to_string())
            }
            Some(b'{') => {
                let expr = self.expression()?;
                string_literal(expr)
            }
            _ => {
                let bare = self.read_while(|b| !b.is_ascii_whitespace() && b != b'>');
                Some(bare.trim_end_matches('/').to_string())
            }
        };

        // dynamic values are dropped together with their attribute
        if let Some(value) = value {
            attrs.push(' ');
            attrs.push_str(map_attr(name));
            attrs.push_str("=\"");
            attrs.push_str(&escape_attr(&value));
            attrs.push('"');
        }
        Ok(())
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// Skip a `{ … }` expression and return its inner source text.
    fn expression(&mut self) -> Result<&'a str, CompileError> {
        let start = self.pos;
        self.pos += 1;
        let mut last: Option<u8> = None;

        loop {
            let Some(b) = self.peek() else {
                return Err(CompileError::UnterminatedExpression { offset: start });
            };
            match b {
                b'}' => {
                    self.pos += 1;
                    return Ok(&self.src[start + 1..self.pos - 1]);
                }
                b'{' => {
                    self.expression()?;
                    last = Some(b'}');
                    continue;
                }
                b'"' | b'\'' => self.string(b)?,
                b'`' => self.template()?,
                b'/' if self.peek_at(1) == Some(b'/') => {
                    while self.peek().is_some_and(|b| b != b'\n') {
                        self.pos += 1;
                    }
                    continue;
                }
                b'/' if self.peek_at(1) == Some(b'*') => {
                    match self.src[self.pos + 2..].find("*/") {
                        Some(end) => self.pos += 2 + end + 2,
                        None => return Err(CompileError::UnterminatedExpression { offset: start }),
                    }
                    continue;
                }
                b'<' if self.at_element_start()
                    && (last.is_none_or(|l| JSX_CONTEXT.contains(&l)) || self.after_return()) =>
                {
                    let mut sink = String::new();
                    self.element(&mut sink)?;
                    last = Some(b')');
                    continue;
                }
                _ if b.is_ascii_whitespace() => {
                    self.pos += 1;
                    continue;
                }
                _ => self.bump(),
            }
            last = self.src.as_bytes().get(self.pos.wrapping_sub(1)).copied();
        }
    }

    fn after_return(&self) -> bool {
        self.src[..self.pos].trim_end().ends_with("return")
    }

    fn string(&mut self, quote: u8) -> Result<(), CompileError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                None => return Err(CompileError::UnterminatedString { offset: start }),
                Some(b'\\') => {
                    self.pos += 1;
                    self.bump();
                }
                Some(b) if b == quote => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(_) => self.bump(),
            }
        }
    }

    fn template(&mut self) -> Result<(), CompileError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                None => return Err(CompileError::UnterminatedString { offset: start }),
                Some(b'\\') => {
                    self.pos += 1;
                    self.bump();
                }
                Some(b'`') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(b'$') if self.peek_at(1) == Some(b'{') => {
                    self.pos += 1;
                    self.expression()?;
                }
                Some(_) => self.bump(),
            }
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn push_open(out: &mut String, tag: &str, attrs: &str) {
    out.push('<');
    out.push_str(tag);
    out.push_str(attrs);
    out.push('>');
}

/// Framework components with a direct HTML counterpart.
fn map_tag(name: &str) -> &str {
    match name {
        "Link" | "NextLink" | "RouterLink" => "a",
        "Image" => "img",
        _ => name,
    }
}

fn map_attr(name: &str) -> &str {
    match name {
        "className" => "class",
        "htmlFor" => "for",
        _ => name,
    }
}

/// Content of a plain string-literal expression (`'x'`, `"x"`, `` `x` ``).
///
/// Anything else (concatenations, interpolated templates, identifiers)
/// returns `None`.
pub(crate) fn string_literal(expr: &str) -> Option<String> {
    let t = expr.trim();
    let bytes = t.as_bytes();
    if bytes.len() < 2 {
        return None;
    }
    let quote = bytes[0];
    if !matches!(quote, b'"' | b'\'' | b'`') || bytes[bytes.len() - 1] != quote {
        return None;
    }
    let inner = &t[1..t.len() - 1];
    if quote == b'`' && inner.contains("${") {
        return None;
    }

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            c if c as u32 == u32::from(quote) => return None,
            c => out.push(c),
        }
    }
    Some(out)
}
