// src/fs/mod.rs

//! Filesystem seam used by media placement and render-config discovery.

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Copy a file, returning the number of bytes written.
    fn copy(&self, from: &Path, to: &Path) -> Result<u64>;

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("creating dir {:?}", path))
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        fs::copy(from, to).with_context(|| format!("copying {:?} to {:?}", from, to))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            entries.push(entry.path());
        }
        Ok(entries)
    }
}

/// Depth-first search for the first file with the given extension.
///
/// Files of a directory are considered before its subdirectories, and names
/// are visited in lexical order so the result is deterministic.
pub fn find_first_with_extension(
    fs: &dyn FileSystem,
    root: &Path,
    extension: &str,
) -> Result<Option<PathBuf>> {
    if !fs.is_dir(root) {
        return Ok(None);
    }

    let mut entries = fs.read_dir(root)?;
    entries.sort();

    let (files, dirs): (Vec<PathBuf>, Vec<PathBuf>) =
        entries.into_iter().partition(|p| fs.is_file(p));

    if let Some(hit) = files
        .into_iter()
        .find(|p| p.extension().and_then(|e| e.to_str()) == Some(extension))
    {
        return Ok(Some(hit));
    }

    for dir in dirs.into_iter().filter(|p| fs.is_dir(p)) {
        if let Some(hit) = find_first_with_extension(fs, &dir, extension)? {
            return Ok(Some(hit));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::mock::MockFileSystem;
    use super::*;

    #[test]
    fn prefers_shallow_files_over_nested_ones() {
        let fs = MockFileSystem::new();
        fs.add_file("/model/b/deeper/config.yml", "x");
        fs.add_file("/model/a/config.yml", "x");
        fs.add_file("/model/notes.txt", "x");

        let hit = find_first_with_extension(&fs, Path::new("/model"), "yml").unwrap();
        assert_eq!(hit, Some(PathBuf::from("/model/a/config.yml")));

        fs.add_file("/model/top.yml", "x");
        let hit = find_first_with_extension(&fs, Path::new("/model"), "yml").unwrap();
        assert_eq!(hit, Some(PathBuf::from("/model/top.yml")));
    }

    #[test]
    fn missing_root_yields_none() {
        let fs = MockFileSystem::new();
        let hit = find_first_with_extension(&fs, Path::new("/nope"), "yml").unwrap();
        assert!(hit.is_none());
    }
}
