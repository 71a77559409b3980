//! Next.js projects (app router or pages router).
//!
//! Starter templates often ship a root page that only redirects:
//!
//! ```text
//! app/page.tsx            redirect('/dashboard')      no markup
//! app/dashboard/page.tsx  <main>…</main>              >100 chars
//! ```
//!
//! Rendering the stub would show nothing, so the first other `page.tsx`
//! with real content is rendered in its place.

use std::sync::LazyLock;

use regex::Regex;

use crate::detect::Framework;
use crate::error::CompileError;
use crate::tree::FlatFileMap;
use crate::utils::html::escape;

use super::document::{DocumentShell, collect_css, placeholder};
use super::{CompileContext, TemplateCompiler, jsx};

const ENTRIES: &[&str] = &[
    "src/app/page.tsx",
    "app/page.tsx",
    "src/pages/index.tsx",
    "pages/index.tsx",
];

/// Minimum trimmed length for a substitute page.
const MIN_SUBSTITUTE_LEN: usize = 100;

const DEFAULT_TITLE: &str = "Next.js App";

static REDIRECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bredirect\s*\(\s*['"`]([^'"`]*)['"`]"#).unwrap());

pub struct NextJsCompiler;

impl TemplateCompiler for NextJsCompiler {
    fn framework(&self) -> Framework {
        Framework::NextJs
    }

    fn compile(&self, files: &FlatFileMap, cx: &CompileContext<'_>) -> Result<String, CompileError> {
        let Some((mut path, mut source)) = entry(files) else {
            return Ok(placeholder("Waiting for a page component"));
        };

        let redirect = redirect_target(source);
        if redirect.is_some()
            && let Some((alt_path, alt_source)) = substitute(files, path)
        {
            crate::debug!("compile"; "{} only redirects, rendering {}", path, alt_path);
            path = alt_path;
            source = alt_source;
        }

        let body = match cx.registry.find(source) {
            Some(special) => {
                crate::debug!("compile"; "{} matched template `{}`", path, special.name());
                special.render(source)
            }
            None => match jsx::translate(source).map_err(|e| e.in_file(path))? {
                Some(markup) => markup,
                None => match redirect_target(source) {
                    Some(target) => redirect_notice(&target),
                    None => return Ok(placeholder("Nothing to render yet")),
                },
            },
        };

        Ok(DocumentShell::new()
            .style(&collect_css(files))
            .render(&body, DEFAULT_TITLE))
    }
}

/// First known entry, else any page component.
fn entry(files: &FlatFileMap) -> Option<(&str, &str)> {
    if let Some(path) = files.first_present(ENTRIES) {
        return files.get(path).map(|src| (path, src));
    }
    files
        .iter()
        .find(|(path, _)| path.ends_with("page.tsx") || path.ends_with("index.tsx"))
}

/// Redirect target when the page renders no markup of its own.
fn redirect_target(source: &str) -> Option<String> {
    let caps = REDIRECT_RE.captures(source)?;
    match jsx::translate(source) {
        Ok(None) => Some(caps[1].to_string()),
        _ => None,
    }
}

/// First other `page.tsx` with real, non-redirect content.
fn substitute<'a>(files: &'a FlatFileMap, stub: &str) -> Option<(&'a str, &'a str)> {
    files.ending_with("page.tsx").find(|(path, content)| {
        *path != stub
            && content.trim().len() > MIN_SUBSTITUTE_LEN
            && redirect_target(content).is_none()
    })
}

fn redirect_notice(target: &str) -> String {
    format!(
        r#"<div class="min-h-screen flex items-center justify-center"><p class="text-gray-500">Redirecting to <code>{}</code></p></div>"#,
        escape(target)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::TemplateRegistry;

    fn compile(files: &[(&str, &str)]) -> String {
        let files: FlatFileMap = files.iter().copied().collect();
        let registry = TemplateRegistry::builtin();
        NextJsCompiler
            .compile(&files, &CompileContext { registry: &registry })
            .unwrap()
    }

    #[test]
    fn test_redirect_stub_is_replaced() {
        let dashboard = r#"export default function Dashboard() {
  return (
    <main className="p-6">
      <h1 className="text-2xl">Dashboard</h1>
      <p>Welcome back to your workspace overview.</p>
    </main>
  );
}"#;
        let html = compile(&[
            ("app/page.tsx", "redirect('/dashboard'); return null;"),
            ("app/dashboard/page.tsx", dashboard),
        ]);
        assert!(html.contains(r#"<h1 class="text-2xl">Dashboard</h1>"#));
        assert!(html.contains("<title>Dashboard</title>"));
        assert!(!html.contains("Redirecting"));
    }

    #[test]
    fn test_short_candidates_are_not_substituted() {
        let html = compile(&[
            ("app/page.tsx", "redirect('/dashboard'); return null;"),
            ("app/dashboard/page.tsx", "export default () => <p>x</p>"),
        ]);
        assert!(html.contains("Redirecting to <code>/dashboard</code>"));
        assert!(html.contains("<title>Next.js App</title>"));
    }

    #[test]
    fn test_page_with_markup_is_not_a_redirect() {
        let src = "export default function P(){ if (x) redirect('/login'); return (<h2>Home</h2>) }";
        assert_eq!(redirect_target(src), None);
        assert!(compile(&[("app/page.tsx", src)]).contains("<h2>Home</h2>"));
    }

    #[test]
    fn test_pages_router_entry() {
        let html = compile(&[(
            "pages/index.tsx",
            "export default function Index(){ return (<section><h1>Pages</h1></section>) }",
        )]);
        assert!(html.contains("<section><h1>Pages</h1></section>"));
    }

    #[test]
    fn test_registry_takes_precedence() {
        let html = compile(&[(
            "app/page.tsx",
            "export default function H(){ return (<h1>Welcome to LearnHub</h1>) }",
        )]);
        assert!(html.contains("Popular courses"));
    }

    #[test]
    fn test_config_only_project_gets_placeholder() {
        let html = compile(&[("next.config.js", "module.exports = {}")]);
        assert!(html.contains("Waiting for a page component"));
    }
}
