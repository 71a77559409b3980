//! Plain React (Vite / CRA) projects.

use crate::detect::Framework;
use crate::error::CompileError;
use crate::tree::FlatFileMap;

use super::document::{DocumentShell, collect_css, placeholder};
use super::{CompileContext, TemplateCompiler, jsx};

/// Entry candidates in priority order.
const ENTRIES: &[&str] = &["src/App.tsx", "src/App.jsx", "src/main.tsx"];

pub struct ReactCompiler;

impl TemplateCompiler for ReactCompiler {
    fn framework(&self) -> Framework {
        Framework::React
    }

    fn compile(&self, files: &FlatFileMap, cx: &CompileContext<'_>) -> Result<String, CompileError> {
        let Some(entry) = files.first_present(ENTRIES) else {
            return Ok(placeholder("Waiting for src/App.tsx"));
        };
        let source = files.get(entry).unwrap_or_default();

        let body = match cx.registry.find(source) {
            Some(special) => special.render(source),
            None => match jsx::translate(source).map_err(|e| e.in_file(entry))? {
                Some(markup) => markup,
                None => return Ok(placeholder("Nothing to render yet")),
            },
        };

        Ok(DocumentShell::new()
            .style(&collect_css(files))
            .render(&body, "React App"))
    }
}
