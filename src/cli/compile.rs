//! `instaview compile`: one-shot compile of a project directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::compiler::{CompiledDocument, CompilerSet};
use crate::detect::Framework;
use crate::freshness::ContentHash;
use crate::log;
use crate::tree::{flatten, read_tree};

/// What `--json` prints in place of the document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompileReport {
    framework: Framework,
    content_hash: ContentHash,
    compiled_at_ms: u64,
    compile_duration_ms: u64,
    bytes: usize,
    files: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<PathBuf>,
}

pub fn compile_project(dir: &Path, output: Option<&Path>, json: bool) -> Result<()> {
    let (doc, files) = compile_dir(dir)?;

    if let Some(path) = output {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &doc.html).with_context(|| format!("Failed to write {}", path.display()))?;
        if !json {
            log!("compile"; "{} → {} ({}ms)", doc.framework, path.display(), doc.compile_duration_ms);
        }
    }

    let mut stdout = std::io::stdout().lock();
    if json {
        let report = CompileReport {
            framework: doc.framework,
            content_hash: doc.content_hash,
            compiled_at_ms: doc.compiled_at_ms,
            compile_duration_ms: doc.compile_duration_ms,
            bytes: doc.html.len(),
            files,
            output: output.map(Path::to_path_buf),
        };
        serde_json::to_writer_pretty(&mut stdout, &report)?;
        writeln!(stdout)?;
    } else if output.is_none() {
        stdout.write_all(doc.html.as_bytes())?;
    }
    Ok(())
}

/// Read and compile `dir`; compile failures are errors here.
fn compile_dir(dir: &Path) -> Result<(CompiledDocument, usize)> {
    let tree = read_tree(dir).with_context(|| format!("Failed to read {}", dir.display()))?;
    let files = flatten(&tree);
    let doc = CompilerSet::default()
        .try_compile(&files)
        .with_context(|| format!("Failed to compile {}", dir.display()))?;
    Ok((doc, files.len()))
}
