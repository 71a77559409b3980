//! Tree → flat map.

use std::collections::BTreeMap;

use super::{FileNode, NodeKind};

/// `path → content` view of a project.
///
/// Backed by a `BTreeMap` so iteration (CSS concatenation, candidate search)
/// is sorted and every compiler is deterministic for identical input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatFileMap {
    files: BTreeMap<String, String>,
}

impl FlatFileMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file, normalizing the path (`/` separators, no leading slash).
    pub fn insert(&mut self, path: &str, content: impl Into<String>) {
        self.files.insert(normalize(path), content.into());
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.files.remove(&normalize(path))
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// First of `paths` present in the map, in the given order.
    pub fn first_present<'a>(&self, paths: &[&'a str]) -> Option<&'a str> {
        paths.iter().copied().find(|p| self.contains(p))
    }

    /// Files whose path ends with `suffix`, in sorted path order.
    pub fn ending_with<'a>(&'a self, suffix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.iter().filter(move |(path, _)| path.ends_with(suffix))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Paths whose content differs from `baseline` (added or modified).
    pub fn changed_since<'a>(&'a self, baseline: &FlatFileMap) -> Vec<(&'a str, &'a str)> {
        self.iter()
            .filter(|(path, content)| baseline.get(path) != Some(*content))
            .collect()
    }

    /// Paths present in `baseline` but gone from `self`.
    pub fn removed_since<'a>(&self, baseline: &'a FlatFileMap) -> Vec<&'a str> {
        baseline.paths().filter(|p| !self.contains(p)).collect()
    }
}

impl FromIterator<(String, String)> for FlatFileMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (path, content) in iter {
            map.insert(&path, content);
        }
        map
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for FlatFileMap {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (path, content) in iter {
            map.insert(path, content);
        }
        map
    }
}

/// Flatten a forest of nodes into a `path → content` map.
///
/// Directories contribute nothing themselves. Files without content map to
/// `""` so "empty file" stays distinguishable from "missing file".
pub fn flatten(nodes: &[FileNode]) -> FlatFileMap {
    let mut map = FlatFileMap::new();
    for node in nodes {
        walk(node, "", &mut map);
    }
    map
}

fn walk(node: &FileNode, parent: &str, map: &mut FlatFileMap) {
    let name = node.name.trim_matches('/');
    let path = match (parent.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (false, true) => parent.to_string(),
        (false, false) => format!("{parent}/{name}"),
    };

    match node.kind {
        NodeKind::Directory => {
            for child in node.children.iter().flatten() {
                walk(child, &path, map);
            }
        }
        NodeKind::File => {
            if path.is_empty() {
                return;
            }
            map.insert(&path, node.content.clone().unwrap_or_default());
        }
    }
}

fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let trimmed = path.trim_start_matches("./").trim_start_matches('/');
    trimmed.to_string()
}
