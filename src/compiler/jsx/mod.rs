//! JSX to static HTML translation.
//!
//! A textual transform for the Next.js and React compilers. It never
//! evaluates anything:
//!
//! ```text
//! 'use client'                      dropped
//! import …  / export default …{     dropped
//! return ( <Root …> … </Root> )     Root subtree is translated
//!
//! className= / htmlFor=             class= / for=
//! <Link href="/x">Go</Link>         <a href="/x">Go</a>
//! {'text'}                          text
//! {anything.else}                   removed
//! <Card />                          <Card></Card>
//! <>…</>                            children only
//! ```
//!
//! Parsing is done by [`scanner::Scanner`], which tracks brace and tag
//! depth so that nested expressions are removed whole.

mod scanner;

pub(crate) use scanner::string_literal;


use std::sync::LazyLock;

use regex::Regex;

use crate::error::CompileError;
use scanner::Scanner;

/// `return (<` or `return <`: start of a rendered root.
static RETURN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\breturn\s*\(?\s*<[A-Za-z>]").unwrap());

/// `=> (<` or `=> <`: arrow component with an expression body.
static ARROW_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"=>\s*\(?\s*<[A-Za-z>]").unwrap());

static EXPORT_DEFAULT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bexport\s+default\b").unwrap());

/// Translate the rendered root of a component source file.
///
/// Returns `Ok(None)` when the source has no recognizable JSX root (a
/// redirect stub, a plain module). Errors carry byte offsets into `source`.
pub fn translate(source: &str) -> Result<Option<String>, CompileError> {
    let Some(root) = find_root(source) else {
        return Ok(None);
    };

    let mut out = String::new();
    Scanner::new(source, root).element(&mut out)?;
    Ok(Some(out.trim().to_string()))
}

/// Byte offset of the `<` that opens the rendered root.
fn find_root(source: &str) -> Option<usize> {
    let body = skip_directive(source);

    // prefer the default export's return over helper components above it
    let from = EXPORT_DEFAULT_RE
        .find_at(source, body)
        .map_or(body, |m| m.start());

    for re in [&*RETURN_RE, &*ARROW_RE] {
        if let Some(m) = re.find_at(source, from).or_else(|| re.find_at(source, body)) {
            // match ends one byte past '<'
            return Some(m.end() - 2);
        }
    }

    strip_boilerplate(source, body)
}

/// Offset just past a leading `'use client'` / `"use client"` directive.
fn skip_directive(source: &str) -> usize {
    let trimmed = source.trim_start();
    let lead = source.len() - trimmed.len();
    for directive in ["'use client'", "\"use client\""] {
        if let Some(rest) = trimmed.strip_prefix(directive) {
            let rest = rest.strip_prefix(';').unwrap_or(rest);
            return source.len() - rest.len();
        }
    }
    lead
}

/// Bare JSX files: skip import lines and an `export default … {` header,
/// and accept the remainder if it starts with markup.
fn strip_boilerplate(source: &str, from: usize) -> Option<usize> {
    let mut offset = from;
    for line in source[from..].split_inclusive('\n') {
        let t = line.trim();
        let skip = t.is_empty()
            || t.starts_with("import ")
            || (t.starts_with("export default") && t.ends_with('{'));
        if !skip {
            let indent = line.len() - line.trim_start().len();
            return t.starts_with('<').then_some(offset + indent);
        }
        offset += line.len();
    }
    None
}
