// src/ingest.rs

//! Media placement: puts a task's input images where preprocessing expects
//! them. This has to happen before the task is admitted.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::fs::FileSystem;

/// Copy every regular file of `source_dir` (lexical order) into `images_dir`
/// as `image-<n>.<ext>`. Returns the number of files placed.
pub fn place_images(fs: &dyn FileSystem, source_dir: &Path, images_dir: &Path) -> Result<usize> {
    if !fs.is_dir(source_dir) {
        bail!("input directory {:?} does not exist", source_dir);
    }

    let mut files: Vec<_> = fs
        .read_dir(source_dir)?
        .into_iter()
        .filter(|p| fs.is_file(p))
        .collect();
    files.sort();

    if files.is_empty() {
        bail!("input directory {:?} contains no files", source_dir);
    }

    fs.create_dir_all(images_dir)?;

    for (i, src) in files.iter().enumerate() {
        let ext = src
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg")
            .to_lowercase();
        let dest = images_dir.join(format!("image-{i}.{ext}"));
        fs.copy(src, &dest)
            .with_context(|| format!("placing input image {:?}", src))?;
        debug!(from = ?src, to = ?dest, "placed image");
    }

    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn copies_files_in_lexical_order() {
        let fs = MockFileSystem::new();
        fs.add_file("/in/b.PNG", "second");
        fs.add_file("/in/a.jpg", "first");
        fs.add_dir("/in/nested");

        let placed = place_images(&fs, Path::new("/in"), Path::new("/t/dataset/images")).unwrap();
        assert_eq!(placed, 2);
        assert_eq!(
            fs.contents("/t/dataset/images/image-0.jpg").as_deref(),
            Some(&b"first"[..])
        );
        assert_eq!(
            fs.contents("/t/dataset/images/image-1.png").as_deref(),
            Some(&b"second"[..])
        );
    }

    #[test]
    fn empty_or_missing_input_is_an_error() {
        let fs = MockFileSystem::new();
        assert!(place_images(&fs, Path::new("/missing"), Path::new("/out")).is_err());

        fs.add_dir("/empty");
        let err = place_images(&fs, Path::new("/empty"), Path::new("/out")).unwrap_err();
        assert!(err.to_string().contains("no files"));
    }
}
