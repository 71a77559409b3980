//! Template compilation: flat file map to one self-contained HTML document.
//!
//! ```text
//! FlatFileMap ──► detect() ──► Framework ──► TemplateCompiler ──► html
//!                                                  │
//!                                   nextjs / react │ jsx::translate
//!                                                  │ TemplateRegistry
//!                                                  ▼
//!                                   CompiledDocument { html, content_hash, … }
//! ```
//!
//! Compilers are pure: the same map always yields byte-identical HTML. They
//! report failures as [`CompileError`]; [`CompilerSet::compile`] turns those
//! into a minimal valid document, [`CompilerSet::try_compile`] hands them to
//! the caller (the render scheduler keeps its last good paint instead).

pub mod document;
mod express;
mod generic;
pub mod jsx;
mod nextjs;
mod react;
pub mod registry;
mod vue;


use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::detect::{Framework, detect};
use crate::error::CompileError;
use crate::freshness::ContentHash;
use crate::tree::FlatFileMap;
use crate::utils::time::now_ms;

pub use registry::{SpecialTemplate, TemplateRegistry};

/// Output of one compile run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledDocument {
    pub html: String,
    pub content_hash: ContentHash,
    pub compiled_at_ms: u64,
    pub framework: Framework,
    pub compile_duration_ms: u64,
}

impl CompiledDocument {
    pub fn new(html: String, framework: Framework, compile_duration_ms: u64) -> Self {
        Self {
            content_hash: ContentHash::of(&html),
            html,
            compiled_at_ms: now_ms(),
            framework,
            compile_duration_ms,
        }
    }
}

/// Shared state handed to every compiler.
pub struct CompileContext<'a> {
    pub registry: &'a TemplateRegistry,
}

/// One compilation strategy per project shape.
pub trait TemplateCompiler: Send + Sync {
    fn framework(&self) -> Framework;

    /// Render `files` into a complete document.
    fn compile(&self, files: &FlatFileMap, cx: &CompileContext<'_>) -> Result<String, CompileError>;
}

/// Compiler for `framework`.
pub fn compiler_for(framework: Framework) -> &'static dyn TemplateCompiler {
    match framework {
        Framework::NextJs => &nextjs::NextJsCompiler,
        Framework::Vue => &vue::VueCompiler,
        Framework::ExpressApi => &express::ExpressApiCompiler,
        Framework::React => &react::ReactCompiler,
        Framework::Generic => &generic::GenericCompiler,
    }
}

/// Detection plus the compiler strategies plus the sentinel registry.
#[derive(Debug, Default)]
pub struct CompilerSet {
    registry: TemplateRegistry,
}

impl CompilerSet {
    pub fn new(registry: TemplateRegistry) -> Self {
        Self { registry }
    }

    pub fn registry_mut(&mut self) -> &mut TemplateRegistry {
        &mut self.registry
    }

    /// Detect and compile, surfacing failures.
    pub fn try_compile(&self, files: &FlatFileMap) -> Result<CompiledDocument, CompileError> {
        self.try_compile_as(files, detect(files))
    }

    /// Compile with a known framework.
    pub fn try_compile_as(
        &self,
        files: &FlatFileMap,
        framework: Framework,
    ) -> Result<CompiledDocument, CompileError> {
        let start = Instant::now();
        let cx = CompileContext {
            registry: &self.registry,
        };
        let compiler = compiler_for(framework);
        let html = compiler.compile(files, &cx)?;
        let elapsed = start.elapsed().as_millis() as u64;

        crate::debug!("compile"; "{} in {}ms ({} files)", compiler.framework(), elapsed, files.len());
        Ok(CompiledDocument::new(html, framework, elapsed))
    }

    /// Detect and compile; never fails.
    ///
    /// A compiler error degrades to a minimal document carrying the message.
    pub fn compile(&self, files: &FlatFileMap) -> CompiledDocument {
        let framework = detect(files);
        self.try_compile_as(files, framework).unwrap_or_else(|e| {
            crate::log!("compile"; "{} compile failed: {}", framework, e);
            CompiledDocument::new(document::fallback(&e.to_string()), framework, 0)
        })
    }
}

/// Free-function form of [`CompilerSet::compile`] with the built-in registry.
pub fn compile_html(files: &FlatFileMap) -> String {
    CompilerSet::default().compile(files).html
}
