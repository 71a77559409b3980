//! `instaview detect`: print the project shape.

use std::path::Path;

use anyhow::{Context, Result};

use crate::detect::{Framework, detect};
use crate::tree::{flatten, read_tree};

pub fn detect_project(dir: &Path) -> Result<()> {
    println!("{}", detect_dir(dir)?);
    Ok(())
}

fn detect_dir(dir: &Path) -> Result<Framework> {
    let tree = read_tree(dir).with_context(|| format!("Failed to read {}", dir.display()))?;
    Ok(detect(&flatten(&tree)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_detect_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect_dir(dir.path()).unwrap(), Framework::Generic);

        fs::write(dir.path().join("next.config.js"), "module.exports = {}").unwrap();
        assert_eq!(detect_dir(dir.path()).unwrap(), Framework::NextJs);
    }
}
