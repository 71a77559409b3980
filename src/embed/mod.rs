//! Embedded static resources for instaview.
//!
//! # Module Structure
//!
//! - `template` - Template types for variable injection
//! - `preview` - Document shell, placeholder and registry mock pages
//!
//! # Usage
//!
//! ```ignore
//! use embed::preview::{SHELL_HTML, ShellVars};
//!
//! let html = SHELL_HTML.render(&ShellVars { title: "Home", style: "", body: "<h1>Home</h1>" });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod preview {
    use super::{Template, TemplateVars};

    /// Utility stylesheet runtime; the only external reference a preview carries.
    pub const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";

    /// Variables for shell.html.
    pub struct ShellVars<'a> {
        pub title: &'a str,
        pub style: &'a str,
        pub body: &'a str,
    }

    impl TemplateVars for ShellVars<'_> {
        fn pairs(&self) -> Vec<(&'static str, &str)> {
            vec![
                ("__TITLE__", self.title),
                ("__CDN__", TAILWIND_CDN),
                ("__STYLE__", self.style),
                ("__BODY__", self.body),
            ]
        }
    }

    /// Full document skeleton every compiler renders into.
    pub const SHELL_HTML: Template =
        Template::new(include_str!("preview/shell.html"));

    /// Variables for placeholder.html.
    pub struct PlaceholderVars<'a> {
        pub message: &'a str,
    }

    impl TemplateVars for PlaceholderVars<'_> {
        fn pairs(&self) -> Vec<(&'static str, &str)> {
            vec![("__MESSAGE__", self.message)]
        }
    }

    /// Spinner body shown while nothing renderable exists yet.
    pub const PLACEHOLDER_HTML: Template =
        Template::new(include_str!("preview/placeholder.html"));

    /// Variables for the landing-page mocks.
    pub struct LandingVars<'a> {
        pub brand: &'a str,
        pub headline: &'a str,
    }

    impl TemplateVars for LandingVars<'_> {
        fn pairs(&self) -> Vec<(&'static str, &str)> {
            vec![("__BRAND__", self.brand), ("__HEADLINE__", self.headline)]
        }
    }

    /// Static mock for e-learning landing templates.
    pub const ELEARNING_HTML: Template =
        Template::new(include_str!("preview/elearning.html"));

    /// Static mock for SaaS landing templates.
    pub const SAAS_HTML: Template =
        Template::new(include_str!("preview/saas.html"));
}
