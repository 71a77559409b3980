//! Template types for variable injection.

/// Trait for template variable sets.
pub trait TemplateVars {
    /// `(placeholder, value)` pairs, placeholders written as `__NAME__`.
    fn pairs(&self) -> Vec<(&'static str, &str)>;

    fn apply(&self, content: &str) -> String {
        substitute(content, &self.pairs())
    }
}

/// Embedded template text with `__NAME__` placeholders.
#[derive(Debug, Clone, Copy)]
pub struct Template {
    content: &'static str,
}

impl Template {
    pub const fn new(content: &'static str) -> Self {
        Self { content }
    }

    pub fn render(&self, vars: &impl TemplateVars) -> String {
        vars.apply(self.content)
    }
}

/// Replace placeholders in one left-to-right pass.
///
/// Values are never rescanned, so user content that happens to contain
/// `__BODY__` is emitted verbatim.
pub fn substitute(content: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(content.len() + vars.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = content;

    'scan: while let Some(i) = rest.find("__") {
        for (key, value) in vars {
            if rest[i..].starts_with(key) {
                out.push_str(&rest[..i]);
                out.push_str(value);
                rest = &rest[i + key.len()..];
                continue 'scan;
            }
        }
        out.push_str(&rest[..i + 2]);
        rest = &rest[i + 2..];
    }
    out.push_str(rest);
    out
}
