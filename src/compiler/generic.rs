//! Plain HTML projects.
//!
//! `index.html` (or the first `.html` file) is served as-is, with local
//! stylesheets and scripts inlined so the document needs no file access.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::detect::Framework;
use crate::error::CompileError;
use crate::tree::FlatFileMap;

use super::document::{DocumentShell, placeholder};
use super::{CompileContext, TemplateCompiler};

const ENTRIES: &[&str] = &["index.html", "public/index.html", "src/index.html"];

static STYLESHEET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<link\b[^>]*\brel\s*=\s*["']?stylesheet["']?[^>]*>"#).unwrap()
});

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script\b([^>]*)\bsrc\s*=\s*["']([^"']+)["']([^>]*)>\s*</script\s*>"#).unwrap()
});

static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bhref\s*=\s*["']([^"']+)["']"#).unwrap());

pub struct GenericCompiler;

impl TemplateCompiler for GenericCompiler {
    fn framework(&self) -> Framework {
        Framework::Generic
    }

    fn compile(&self, files: &FlatFileMap, _cx: &CompileContext<'_>) -> Result<String, CompileError> {
        let entry = files
            .first_present(ENTRIES)
            .or_else(|| files.paths().find(|p| p.ends_with(".html")));
        let Some(entry) = entry else {
            return Ok(placeholder("Loading preview"));
        };

        let html = inline_assets(files.get(entry).unwrap_or_default(), entry, files);
        if html.trim().is_empty() {
            return Ok(placeholder("Loading preview"));
        }
        if html.contains("<html") || html.contains("<HTML") {
            return Ok(html);
        }
        // fragment: give it a document around it
        Ok(DocumentShell::new().render(&html, entry))
    }
}

fn inline_assets(html: &str, entry: &str, files: &FlatFileMap) -> String {
    let base = entry.rsplit_once('/').map_or("", |(dir, _)| dir);

    let html = STYLESHEET_RE.replace_all(html, |caps: &Captures| {
        let tag = &caps[0];
        HREF_RE
            .captures(tag)
            .and_then(|href| files.get(&resolve(base, &href[1])?))
            .map_or_else(|| tag.to_string(), |css| format!("<style>\n{}\n</style>", css.trim_end()))
    });

    SCRIPT_RE
        .replace_all(&html, |caps: &Captures| {
            match resolve(base, &caps[2]).and_then(|path| files.get(&path)) {
                Some(js) => format!("<script{}{}>\n{}\n</script>", caps[1].trim_end(), &caps[3], js.trim_end()),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Resolve a local reference against the entry directory.
///
/// Remote and protocol-relative URLs resolve to `None`.
fn resolve(base: &str, reference: &str) -> Option<String> {
    if reference.contains("://") || reference.starts_with("//") || reference.starts_with("data:") {
        return None;
    }
    let reference = reference.split(['?', '#']).next().unwrap_or(reference);

    let mut parts: Vec<&str> = match reference.strip_prefix('/') {
        Some(_) => Vec::new(),
        None => base.split('/').filter(|s| !s.is_empty()).collect(),
    };
    for seg in reference.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            seg => parts.push(seg),
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::TemplateRegistry;

    fn compile(files: &[(&str, &str)]) -> String {
        let files: FlatFileMap = files.iter().copied().collect();
        let registry = TemplateRegistry::empty();
        GenericCompiler
            .compile(&files, &CompileContext { registry: &registry })
            .unwrap()
    }

    #[test]
    fn test_index_html_with_inlined_assets() {
        let index = r#"<html><head><link rel="stylesheet" href="./css/site.css"><link rel="stylesheet" href="https://cdn.example/x.css"></head>
<body><h1>Site</h1><script type="module" src="js/app.js"></script></body></html>"#;
        let html = compile(&[
            ("index.html", index),
            ("css/site.css", "h1{color:red}\n"),
            ("js/app.js", "console.log('hi')"),
        ]);
        assert!(html.contains("<style>\nh1{color:red}\n</style>"));
        assert!(html.contains(r#"href="https://cdn.example/x.css""#));
        assert!(html.contains("<script type=\"module\">\nconsole.log('hi')\n</script>"));
        assert!(!html.contains("js/app.js"));
    }

    #[test]
    fn test_any_html_file_and_missing_assets() {
        let html = compile(&[(
            "pages/about.html",
            r#"<html><body><script src="../missing.js"></script></body></html>"#,
        )]);
        assert!(html.contains(r#"<script src="../missing.js"></script>"#));
    }

    #[test]
    fn test_fragment_gets_a_document() {
        let html = compile(&[("index.html", "<h2>Just a fragment</h2>")]);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Just a fragment</title>"));
    }

    #[test]
    fn test_no_html_is_placeholder() {
        let html = compile(&[("README.md", "# hi")]);
        assert!(html.contains("Loading preview"));
    }

    #[test]
    fn test_resolve() {
        assert_eq!(resolve("pages", "../a.css").as_deref(), Some("a.css"));
        assert_eq!(resolve("pages", "/root.css").as_deref(), Some("root.css"));
        assert_eq!(resolve("", "./x/y.js?v=2").as_deref(), Some("x/y.js"));
        assert_eq!(resolve("", "../escape.js"), None);
        assert_eq!(resolve("", "https://cdn/x.js"), None);
    }
}
