//! Read a project directory into a `FileNode` tree.

use std::fs;
use std::io;
use std::path::Path;

use super::FileNode;

/// Directories never shipped to the preview.
const SKIP_DIRS: &[&str] = &["node_modules", "target", "dist", "build", "out"];

/// Read `root` recursively. Children are sorted by name.
///
/// Dot-entries (`.git`, `.next`, `.instaview`, …) and non-UTF-8 files are
/// skipped; the editor never holds those as text either.
pub fn read_tree(root: &Path) -> io::Result<Vec<FileNode>> {
    read_tree_skipping(root, None)
}

/// [`read_tree`], leaving out the file at `skip` if it lies inside `root`.
pub fn read_tree_skipping(root: &Path, skip: Option<&Path>) -> io::Result<Vec<FileNode>> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("not a directory: {}", root.display()),
        ));
    }
    read_dir(root, skip)
}

fn read_dir(dir: &Path, skip: Option<&Path>) -> io::Result<Vec<FileNode>> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.filter_map(Result::ok).collect();
    entries.sort_by_key(|e| e.file_name());

    let mut nodes = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if SKIP_DIRS.contains(&name.as_str()) {
                continue;
            }
            nodes.push(FileNode::dir(name, read_dir(&entry.path(), skip)?));
        } else if file_type.is_file() {
            let path = entry.path();
            if skip == Some(path.as_path()) {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(content) => nodes.push(FileNode::file(name, content)),
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    crate::debug!("tree"; "skipping binary file: {}", path.display());
                }
                Err(e) => return Err(e),
            }
        }
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::flatten;
    use tempfile::TempDir;

    #[test]
    fn test_read_tree_skips_ignored_entries() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("app")).unwrap();
        fs::create_dir_all(root.join("node_modules/react")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("app/page.tsx"), "page").unwrap();
        fs::write(root.join("node_modules/react/index.js"), "lib").unwrap();
        fs::write(root.join(".git/HEAD"), "ref").unwrap();
        fs::write(root.join("logo.png"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let files = flatten(&read_tree(root).unwrap());
        let paths: Vec<_> = files.paths().collect();
        assert_eq!(paths, vec!["app/page.tsx"]);
    }

    #[test]
    fn test_read_tree_skipping_leaves_out_one_file() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("public")).unwrap();
        fs::write(root.join("index.html"), "<p>src</p>").unwrap();
        fs::write(root.join("public/preview.html"), "<p>out</p>").unwrap();

        let skip = root.join("public/preview.html");
        let files = flatten(&read_tree_skipping(root, Some(&skip)).unwrap());
        let paths: Vec<_> = files.paths().collect();
        assert_eq!(paths, vec!["index.html"]);

        let outside = dir.path().join("../elsewhere.html");
        assert_eq!(flatten(&read_tree_skipping(root, Some(&outside)).unwrap()).len(), 2);
    }

    #[test]
    fn test_read_tree_missing_root() {
        let dir = TempDir::new().unwrap();
        let err = read_tree(&dir.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
