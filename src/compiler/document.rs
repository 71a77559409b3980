//! Document assembly shared by every compiler.
//!
//! ```text
//! <!DOCTYPE html>
//! <html> <head>
//!   <title>   first <h1>..<h6> text, else the compiler's default
//!   <script>  utility stylesheet CDN
//!   <style>   every .css file in path order
//! </head> <body> … </body> </html>
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::embed::preview::{PLACEHOLDER_HTML, PlaceholderVars, SHELL_HTML, ShellVars};
use crate::tree::FlatFileMap;
use crate::utils::html::{escape, strip_tags};

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h[1-6](?:\s[^>]*)?>(.*?)</h[1-6]>").unwrap());

/// Assembles the final self-contained document.
#[derive(Debug, Clone, Default)]
pub struct DocumentShell {
    title: Option<String>,
    style: String,
}

impl DocumentShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit title; skips heading extraction.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Append a stylesheet block.
    pub fn style(mut self, css: &str) -> Self {
        if !css.trim().is_empty() {
            if !self.style.is_empty() {
                self.style.push('\n');
            }
            self.style.push_str(css.trim_end());
        }
        self
    }

    /// Render `body` into a full document, titling it from its first heading
    /// unless a title was set, else `default_title`.
    pub fn render(&self, body: &str, default_title: &str) -> String {
        let title = match &self.title {
            Some(title) => title.clone(),
            None => extract_title(body).unwrap_or_else(|| default_title.to_string()),
        };
        SHELL_HTML.render(&ShellVars {
            title: &escape(&title),
            style: &self.style,
            body: body.trim(),
        })
    }
}

/// Concatenate every `.css` file, each under a `/* path */` header.
pub fn collect_css(files: &FlatFileMap) -> String {
    let mut out = String::new();
    for (path, content) in files.ending_with(".css") {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("/* ");
        out.push_str(path);
        out.push_str(" */\n");
        out.push_str(content.trim_end());
    }
    out
}

/// Text of the first non-empty `<h1>`..`<h6>`.
pub fn extract_title(html: &str) -> Option<String> {
    HEADING_RE
        .captures_iter(html)
        .map(|caps| strip_tags(&caps[1]))
        .find(|text| !text.is_empty())
}

/// Spinner document used when a project has nothing renderable yet.
pub fn placeholder(message: &str) -> String {
    let body = PLACEHOLDER_HTML.render(&PlaceholderVars {
        message: &escape(message),
    });
    DocumentShell::new().title("Loading preview").render(&body, "")
}

/// Minimal valid document for a compiler that could not produce output.
pub fn fallback(message: &str) -> String {
    let body = format!(
        r#"<div class="p-8 text-gray-600"><p>{}</p></div>"#,
        escape(message)
    );
    DocumentShell::new().title("Preview unavailable").render(&body, "")
}
