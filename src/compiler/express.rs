//! Express API projects.
//!
//! There is no page to render, so the preview is a static catalog of the
//! routes found in the server source. Nothing is executed.

use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashSet;

use crate::detect::Framework;
use crate::error::CompileError;
use crate::tree::FlatFileMap;
use crate::utils::html::escape;

use super::document::DocumentShell;
use super::{CompileContext, TemplateCompiler};

const ENTRIES: &[&str] = &["src/server.ts", "app.js"];

/// Endpoints listed whenever their path occurs anywhere in the source.
const KNOWN_ROUTES: &[&str] = &[
    "/api/users",
    "/api/auth",
    "/api/products",
    "/api/posts",
    "/api/health",
    "/health",
];

static ROUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\.(get|post|put|patch|delete)\s*\(\s*['"`](/[^'"`]*)['"`]"#).unwrap()
});

static LISTEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\blisten\s*\(\s*|\bPORT\s*\|\|\s*)(\d{2,5})").unwrap());

/// One discovered endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Route {
    method: String,
    path: String,
}

pub struct ExpressApiCompiler;

impl TemplateCompiler for ExpressApiCompiler {
    fn framework(&self) -> Framework {
        Framework::ExpressApi
    }

    fn compile(&self, files: &FlatFileMap, _cx: &CompileContext<'_>) -> Result<String, CompileError> {
        let sources = server_sources(files);
        let routes = routes(&sources);
        let port = sources
            .iter()
            .find_map(|src| LISTEN_RE.captures(src).map(|c| c[1].to_string()));
        let name = package_name(files).unwrap_or_else(|| "Express API".to_string());

        let mut body = String::new();
        body.push_str(r#"<main class="max-w-3xl mx-auto p-8">"#);
        body.push_str(&format!(
            r#"<h1 class="text-3xl font-bold mb-2">{}</h1>"#,
            escape(&name)
        ));
        if let Some(port) = port {
            body.push_str(&format!(
                r#"<p class="text-gray-500 mb-6">Listening on port <code>{port}</code></p>"#
            ));
        }
        if routes.is_empty() {
            body.push_str(r#"<p class="text-gray-500">No routes found yet.</p>"#);
        } else {
            body.push_str(r#"<ul class="divide-y rounded-lg border">"#);
            for route in &routes {
                body.push_str(&format!(
                    concat!(
                        r#"<li class="flex gap-4 p-3 font-mono text-sm">"#,
                        r#"<span class="w-16 font-semibold text-blue-600">{}</span><span>{}</span></li>"#
                    ),
                    route.method,
                    escape(&route.path)
                ));
            }
            body.push_str("</ul>");
        }
        body.push_str("</main>");

        Ok(DocumentShell::new().render(&body, "Express API"))
    }
}

/// Entry files first, then every other script in path order.
fn server_sources(files: &FlatFileMap) -> Vec<&str> {
    let mut sources: Vec<&str> = ENTRIES.iter().filter_map(|p| files.get(p)).collect();
    sources.extend(
        files
            .iter()
            .filter(|(path, _)| !ENTRIES.contains(path))
            .filter(|(path, _)| [".js", ".ts", ".mjs", ".cjs"].iter().any(|ext| path.ends_with(ext)))
            .map(|(_, content)| content),
    );
    sources
}

/// Registered routes in source order, then known endpoints, de-duplicated.
fn routes(sources: &[&str]) -> Vec<Route> {
    let mut seen = FxHashSet::default();
    let mut out = Vec::new();

    for src in sources {
        for caps in ROUTE_RE.captures_iter(src) {
            let route = Route {
                method: caps[1].to_ascii_uppercase(),
                path: caps[2].to_string(),
            };
            if seen.insert((route.method.clone(), route.path.clone())) {
                out.push(route);
            }
        }
    }

    for known in KNOWN_ROUTES {
        let listed = out.iter().any(|r| r.path == *known);
        if !listed && sources.iter().any(|src| src.contains(known)) {
            out.push(Route {
                method: "GET".to_string(),
                path: known.to_string(),
            });
        }
    }
    out
}

fn package_name(files: &FlatFileMap) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(files.get("package.json")?).ok()?;
    json.get("name")?.as_str().map(str::to_string)
}
