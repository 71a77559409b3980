//! Vue single-file-component projects.
//!
//! Only the outermost `<template>` of the entry component is rendered:
//! directives (`v-*`, `:prop`, `@event`, `#slot`) are stripped, `{{ }}`
//! interpolations are removed unless they hold a plain string literal, and
//! every `<style>` block in the project is inlined alongside the `.css` files.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::detect::Framework;
use crate::error::CompileError;
use crate::tree::FlatFileMap;
use crate::utils::html::{escape, is_void_element};

use super::document::{DocumentShell, collect_css, placeholder};
use super::{CompileContext, TemplateCompiler, jsx};

const ENTRY: &str = "src/App.vue";

static TEMPLATE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<template\b[^>]*>|</template\s*>").unwrap());

static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b[^>]*>(.*?)</style\s*>").unwrap());

static MUSTACHE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{\{(.*?)\}\}").unwrap());

/// An opening tag with quoted, unquoted or bare attributes.
static OPEN_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<([A-Za-z][\w\-]*)((?:\s+[^\s"'>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+))?)*)\s*(/?)>"#,
    )
    .unwrap()
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s+([^\s"'>/=]+)(?:\s*=\s*("[^"]*"|'[^']*'|[^\s"'>]+))?"#).unwrap()
});

static ROUTER_LINK_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</(?:router-link|RouterLink)\s*>").unwrap());

static TEMPLATE_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</template\s*>").unwrap());

pub struct VueCompiler;

impl TemplateCompiler for VueCompiler {
    fn framework(&self) -> Framework {
        Framework::Vue
    }

    fn compile(&self, files: &FlatFileMap, _cx: &CompileContext<'_>) -> Result<String, CompileError> {
        let entry = if files.contains(ENTRY) {
            Some(ENTRY)
        } else {
            files.paths().find(|p| p.ends_with(".vue"))
        };
        let Some(entry) = entry else {
            return Ok(placeholder("Waiting for src/App.vue"));
        };

        let source = files.get(entry).unwrap_or_default();
        let Some(template) = outer_template(source) else {
            return Ok(placeholder("Component has no <template>"));
        };
        let body = rewrite_tags(&interpolate(template));

        let mut shell = DocumentShell::new().style(&collect_css(files));
        for (path, content) in files.ending_with(".vue") {
            let blocks: Vec<&str> = STYLE_RE
                .captures_iter(content)
                .filter_map(|c| c.get(1).map(|m| m.as_str().trim()))
                .filter(|css| !css.is_empty())
                .collect();
            if !blocks.is_empty() {
                shell = shell.style(&format!("/* {} */\n{}", path, blocks.join("\n")));
            }
        }

        Ok(shell.render(&body, "Vue App"))
    }
}

/// Content of the outermost `<template>`, nested slot templates included.
fn outer_template(source: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = None;
    for m in TEMPLATE_TAG_RE.find_iter(source) {
        if m.as_str().starts_with("</") {
            if depth == 0 {
                continue;
            }
            depth -= 1;
            if depth == 0 {
                return start.map(|s| &source[s..m.start()]);
            }
        } else {
            if depth == 0 {
                start = Some(m.end());
            }
            depth += 1;
        }
    }
    // unclosed: take the rest
    start.map(|s| &source[s..])
}

fn interpolate(template: &str) -> String {
    MUSTACHE_RE
        .replace_all(template, |caps: &Captures| {
            jsx::string_literal(&caps[1])
                .map(|text| escape(&text).into_owned())
                .unwrap_or_default()
        })
        .into_owned()
}

/// Strip directives, unwrap slot templates, map router links, expand
/// self-closing components.
fn rewrite_tags(markup: &str) -> String {
    let out = OPEN_TAG_RE.replace_all(markup, |caps: &Captures| {
        let name = &caps[1];
        if name == "template" {
            return String::new();
        }
        let is_link = matches!(name, "router-link" | "RouterLink");
        let tag = if is_link { "a" } else { name };

        let mut attrs = String::new();
        for attr in ATTR_RE.captures_iter(&caps[2]) {
            let key = &attr[1];
            if key.starts_with("v-") || key.starts_with([':', '@', '#']) {
                continue;
            }
            attrs.push(' ');
            attrs.push_str(if is_link && key == "to" { "href" } else { key });
            if let Some(value) = attr.get(2) {
                attrs.push('=');
                attrs.push_str(value.as_str());
            }
        }

        let self_closing = !caps[3].is_empty();
        if self_closing && !is_void_element(tag) {
            format!("<{tag}{attrs}></{tag}>")
        } else {
            format!("<{tag}{attrs}>")
        }
    });
    let out = ROUTER_LINK_CLOSE_RE.replace_all(&out, "</a>");
    TEMPLATE_CLOSE_RE.replace_all(&out, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::TemplateRegistry;

    fn compile(files: &[(&str, &str)]) -> String {
        let files: FlatFileMap = files.iter().copied().collect();
        let registry = TemplateRegistry::empty();
        VueCompiler
            .compile(&files, &CompileContext { registry: &registry })
            .unwrap()
    }

    const APP: &str = r#"<template>
  <div id="app" :class="{ dark }" @click="toggle">
    <h1 v-if="ready">{{ 'Hello Vue' }}</h1>
    <p>{{ message }}</p>
    <router-link to="/about">About</router-link>
    <HelloWorld msg="hi" />
    <template v-slot:footer><small>foot</small></template>
  </div>
</template>

<script setup>
const message = 'x'
</script>

<style scoped>
h1 { color: green; }
</style>
"#;

    #[test]
    fn test_vue_template_rendering() {
        let html = compile(&[("src/App.vue", APP), ("src/style.css", "body{margin:0}")]);
        assert!(html.contains(r#"<div id="app">"#));
        assert!(html.contains("<h1>Hello Vue</h1>"));
        assert!(html.contains("<p></p>"));
        assert!(html.contains(r#"<a href="/about">About</a>"#));
        assert!(html.contains(r#"<HelloWorld msg="hi"></HelloWorld>"#));
        assert!(html.contains("<small>foot</small>"));
        assert!(!html.contains("<template"));
        assert!(html.contains("<title>Hello Vue</title>"));
        assert!(html.contains("h1 { color: green; }"));
        assert!(html.contains("body{margin:0}"));
        assert!(!html.contains("<script setup>"));
    }

    #[test]
    fn test_outer_template_handles_nesting() {
        let src = "<template><a><template #x>in</template></a></template><style></style>";
        assert_eq!(outer_template(src), Some("<a><template #x>in</template></a>"));
        assert_eq!(outer_template("<script></script>"), None);
    }

    #[test]
    fn test_any_vue_file_is_an_entry() {
        let html = compile(&[("components/Card.vue", "<template><article>card</article></template>")]);
        assert!(html.contains("<article>card</article>"));
    }

    #[test]
    fn test_missing_template_is_a_placeholder() {
        let html = compile(&[("src/App.vue", "<script>export default {}</script>")]);
        assert!(html.contains("Component has no &lt;template&gt;"));
    }
}
