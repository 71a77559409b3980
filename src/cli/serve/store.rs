//! In-memory project files held by the compile authority.
//!
//! Seeded once from `<projects>/<projectId>/` on disk; afterwards edits only
//! arrive over HTTP or the room and are never written back.

use std::fs;
use std::path::Path;

use dashmap::DashMap;
use thiserror::Error;

use crate::compiler::{CompiledDocument, CompilerSet};
use crate::config::is_valid_id;
use crate::error::CompileError;
use crate::tree::{FlatFileMap, flatten, read_tree};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("invalid project id `{0}`")]
    InvalidProject(String),

    #[error("invalid file path `{0}`")]
    InvalidPath(String),

    #[error("unknown project `{0}`")]
    UnknownProject(String),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Project id → flat file map, plus the compilers that render them.
#[derive(Debug, Default)]
pub struct ProjectStore {
    projects: DashMap<String, FlatFileMap>,
    compilers: CompilerSet,
}

impl ProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every valid project directory under `dir`.
    ///
    /// A missing directory is an empty store.
    pub fn seed(dir: &Path) -> std::io::Result<Self> {
        let store = Self::new();
        if !dir.is_dir() {
            crate::log!("serve"; "projects directory {} not found, starting empty", dir.display());
            return Ok(store);
        }

        let mut entries: Vec<_> = fs::read_dir(dir)?.filter_map(Result::ok).collect();
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let id = entry.file_name().to_string_lossy().into_owned();
            if !entry.file_type()?.is_dir() || !is_valid_id(&id) {
                continue;
            }
            let files = flatten(&read_tree(&entry.path())?);
            crate::debug!("serve"; "seeded {} ({} files)", id, files.len());
            store.projects.insert(id, files);
        }
        Ok(store)
    }

    pub fn insert(&self, id: &str, files: FlatFileMap) {
        self.projects.insert(id.to_string(), files);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.projects.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Make sure `id` exists, creating an empty project if needed.
    pub fn ensure(&self, id: &str) -> Result<(), StoreError> {
        check_id(id)?;
        self.projects.entry(id.to_string()).or_default();
        Ok(())
    }

    /// Current document of a project. Compile failures degrade to a
    /// minimal document.
    pub fn snapshot(&self, id: &str) -> Result<CompiledDocument, StoreError> {
        check_id(id)?;
        let files = self
            .projects
            .get(id)
            .ok_or_else(|| StoreError::UnknownProject(id.to_string()))?;
        Ok(self.compilers.compile(&files))
    }

    /// Recompile without changing anything.
    pub fn compile(&self, id: &str) -> Result<CompiledDocument, StoreError> {
        check_id(id)?;
        let files = self
            .projects
            .get(id)
            .ok_or_else(|| StoreError::UnknownProject(id.to_string()))?;
        Ok(self.compilers.try_compile(&files)?)
    }

    /// Store one file (or drop it when `removed`) and recompile.
    ///
    /// Unknown projects are created; the edit is kept even if the
    /// compile fails.
    pub fn apply(
        &self,
        id: &str,
        path: &str,
        content: &str,
        removed: bool,
    ) -> Result<CompiledDocument, StoreError> {
        check_id(id)?;
        let path = normalize_path(path).ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;

        let mut files = self.projects.entry(id.to_string()).or_default();
        if removed {
            files.remove(&path);
        } else {
            files.insert(&path, content);
        }
        Ok(self.compilers.try_compile(&files)?)
    }
}

fn check_id(id: &str) -> Result<(), StoreError> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(StoreError::InvalidProject(id.to_string()))
    }
}

/// Relative, `/`-separated, no `..` or empty segments.
pub fn normalize_path(path: &str) -> Option<String> {
    let path = path.replace('\\', "/");
    let path = path.strip_prefix("./").unwrap_or(&path);
    if path.is_empty() || path.starts_with('/') {
        return None;
    }
    let ok = path
        .split('/')
        .all(|seg| !seg.is_empty() && seg != "." && seg != ".." && !seg.contains(':'));
    ok.then(|| path.to_string())
}
