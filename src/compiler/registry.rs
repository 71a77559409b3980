//! Sentinel registry for known project templates.
//!
//! Some starter templates are recognizable by brand markers in their page
//! source. For those, a hand-built static mock looks far closer to the real
//! site than the textual JSX transform does, so the compiler asks the
//! registry first:
//!
//! ```text
//! page source ──► registry.find(source) ──► Some(entry) ──► entry.render(source)
//!                                       └─► None        ──► jsx::translate(source)
//! ```
//!
//! Entries are checked in registration order; the first match wins.

use crate::embed::preview::{ELEARNING_HTML, LandingVars, SAAS_HTML};
use crate::utils::html::escape;

use super::document::extract_title;

type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync>;
type Renderer = Box<dyn Fn(&str) -> String + Send + Sync>;

/// One special-cased template: a source predicate and a body renderer.
pub struct SpecialTemplate {
    name: &'static str,
    predicate: Predicate,
    render: Renderer,
}

impl SpecialTemplate {
    pub fn new(
        name: &'static str,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
        render: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            predicate: Box::new(predicate),
            render: Box::new(render),
        }
    }

    /// Entry matching when any of `markers` occurs in the source.
    pub fn sentinel(
        name: &'static str,
        markers: &'static [&'static str],
        render: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, move |src| markers.iter().any(|m| src.contains(m)), render)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn matches(&self, source: &str) -> bool {
        (self.predicate)(source)
    }

    /// Body markup for `source`.
    pub fn render(&self, source: &str) -> String {
        (self.render)(source)
    }
}

impl std::fmt::Debug for SpecialTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecialTemplate").field("name", &self.name).finish()
    }
}

/// Ordered set of special-cased templates.
#[derive(Debug)]
pub struct TemplateRegistry {
    entries: Vec<SpecialTemplate>,
}

const ELEARNING_MARKERS: &[&str] = &["EduLearn", "LearnHub", "E-Learning", "Online Courses"];
const SAAS_MARKERS: &[&str] = &["SaaSify", "CloudFlow", "Start free trial", "Start Free Trial"];

impl TemplateRegistry {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registry with the built-in landing-page entries.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(SpecialTemplate::sentinel(
            "e-learning",
            ELEARNING_MARKERS,
            |src| landing(src, ELEARNING_MARKERS, "Learn without limits", true),
        ));
        registry.register(SpecialTemplate::sentinel("saas", SAAS_MARKERS, |src| {
            landing(src, SAAS_MARKERS, "Grow your business faster", false)
        }));
        registry
    }

    pub fn register(&mut self, entry: SpecialTemplate) {
        self.entries.push(entry);
    }

    /// First entry whose predicate accepts `source`.
    pub fn find(&self, source: &str) -> Option<&SpecialTemplate> {
        self.entries.iter().find(|e| e.matches(source))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn landing(source: &str, markers: &[&str], default_headline: &str, elearning: bool) -> String {
    // brand: first marker that looks like a name rather than a phrase
    let brand = markers
        .iter()
        .find(|m| !m.contains(' ') && source.contains(*m))
        .copied()
        .unwrap_or(if elearning { "EduLearn" } else { "SaaSify" });

    let headline = extract_title(source)
        .filter(|t| !t.contains('{'))
        .unwrap_or_else(|| default_headline.to_string());

    let vars = LandingVars {
        brand: &escape(brand),
        headline: &escape(&headline),
    };
    if elearning {
        ELEARNING_HTML.render(&vars)
    } else {
        SAAS_HTML.render(&vars)
    }
}
