//! Project-shape detection.
//!
//! Ordered signature checks; the first match wins. Next.js is checked before
//! React and Vue because its templates routinely contain React syntax (and
//! hybrid templates ship `.vue` files too).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tree::FlatFileMap;

/// Supported project shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framework {
    NextJs,
    Vue,
    ExpressApi,
    React,
    Generic,
}

impl Framework {
    pub const fn name(self) -> &'static str {
        match self {
            Self::NextJs => "nextjs",
            Self::Vue => "vue",
            Self::ExpressApi => "express-api",
            Self::React => "react",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const NEXTJS_SIGNATURES: &[&str] = &[
    "src/app/page.tsx",
    "app/page.tsx",
    "src/pages/index.tsx",
    "pages/index.tsx",
    "next.config.js",
];
const VUE_ENTRY: &str = "src/App.vue";
const EXPRESS_SIGNATURES: &[&str] = &["src/server.ts", "app.js"];
const REACT_SIGNATURES: &[&str] = &["src/App.tsx", "src/App.jsx", "src/main.tsx"];

/// Detect the project shape. Never fails; defaults to `Generic`.
pub fn detect(files: &FlatFileMap) -> Framework {
    if files.first_present(NEXTJS_SIGNATURES).is_some() {
        Framework::NextJs
    } else if files.contains(VUE_ENTRY) || files.paths().any(|p| p.ends_with(".vue")) {
        Framework::Vue
    } else if files.first_present(EXPRESS_SIGNATURES).is_some() {
        Framework::ExpressApi
    } else if files.first_present(REACT_SIGNATURES).is_some() {
        Framework::React
    } else {
        Framework::Generic
    }
}
