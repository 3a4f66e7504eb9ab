/// Annotation store
///
/// The manifest (a two-column CSV of absolute and relative image paths)
/// is the durable record of what belongs to a dataset. This module handles:
/// - Generating a manifest from a folder of images (scan.rs)
/// - Loading a manifest through a lazy row iterator (rows.rs)
/// - CSV quoting for paths that contain commas or quotes (csv.rs)

pub mod csv;
pub mod rows;
pub mod scan;

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::{PipelineError, Result};

pub use rows::ManifestRows;

/// Header written at the top of every generated manifest
pub const MANIFEST_HEADER: [&str; 2] = ["absolute_path", "relative_path"];

/// One manifest row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub absolute_path: String,
    pub relative_path: String,
}

/// All rows of a manifest, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as CSV text, header included
    pub fn to_csv(&self) -> String {
        let mut out = csv::encode_row(&MANIFEST_HEADER);
        for entry in &self.entries {
            out.push_str(&csv::encode_row(&[&entry.absolute_path, &entry.relative_path]));
        }
        out
    }

    /// Write to `path` atomically: a temp file in the same directory is
    /// filled, flushed and then renamed over the destination.
    pub fn write(&self, path: &Path) -> Result<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| PipelineError::io(&parent, e))?;
        tmp.write_all(self.to_csv().as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| PipelineError::io(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| PipelineError::io(path, e.error))?;

        Ok(())
    }
}

/// Load a manifest file.
///
/// Fails with `NotFound` if the file is absent, and with `Format` if it is
/// empty, has a header that is not two columns wide, has a row with the
/// wrong number of fields, or lists the same absolute path twice.
pub fn load(path: &Path) -> Result<Manifest> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    let mut rows = ManifestRows::new(path)?;
    while let Some(entry) = rows.next() {
        let entry = entry?;
        if !seen.insert(entry.absolute_path.clone()) {
            return Err(PipelineError::format(
                path,
                rows.line_no(),
                format!("duplicate absolute path {}", entry.absolute_path),
            ));
        }
        entries.push(entry);
    }

    info!("Loaded {} manifest entries from {}", entries.len(), path.display());
    Ok(Manifest { entries })
}

/// Build a manifest from the images in `images_dir` and write it to `output`.
///
/// # Arguments
/// * `images_dir` - Folder to scan (jpg/jpeg/png, case-insensitive)
/// * `base_dir` - Directory the relative paths are computed against
/// * `output` - Where the manifest CSV is written
/// * `recursive` - Descend into subfolders
pub fn generate(
    images_dir: &Path,
    base_dir: &Path,
    output: &Path,
    recursive: bool,
) -> Result<Manifest> {
    let files = scan::image_files(images_dir, recursive)?;

    let base = base_dir
        .canonicalize()
        .map_err(|_| PipelineError::NotFound(base_dir.to_path_buf()))?;

    let mut entries = Vec::with_capacity(files.len());
    for file in files {
        let absolute = file.canonicalize().map_err(|e| PipelineError::io(&file, e))?;
        let relative = scan::relative_to(&absolute, &base);
        entries.push(ManifestEntry {
            absolute_path: absolute.to_string_lossy().to_string(),
            relative_path: relative.to_string_lossy().to_string(),
        });
    }

    let manifest = Manifest { entries };
    manifest.write(output)?;

    info!(
        "Wrote {} manifest entries for {} to {}",
        manifest.len(),
        images_dir.display(),
        output.display()
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch_images(dir: &Path, names: &[&str]) {
        for name in names {
            std::fs::write(dir.join(name), b"not decoded here").unwrap();
        }
    }

    #[test]
    fn test_load_preserves_row_count_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotation.csv");
        let mut content = String::from("absolute_path,relative_path\n");
        for i in 0..25 {
            content.push_str(&format!("/data/{:02}.png,{:02}.png\n", 24 - i, 24 - i));
        }
        std::fs::write(&path, content).unwrap();

        let manifest = load(&path).unwrap();
        assert_eq!(manifest.len(), 25);
        assert_eq!(manifest.entries[0].absolute_path, "/data/24.png");
        assert_eq!(manifest.entries[24].relative_path, "00.png");
    }

    #[test]
    fn test_load_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotation.csv");
        std::fs::write(&path, "absolute_path,relative_path\n").unwrap();

        let manifest = load(&path).unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let result = load(Path::new("/nonexistent/annotation.csv"));
        assert!(matches!(result, Err(PipelineError::NotFound(_))));
    }

    #[test]
    fn test_load_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotation.csv");
        std::fs::write(&path, "a,b\n/x.png,x.png\n/y.png,y.png\n/x.png,x.png\n").unwrap();

        match load(&path) {
            Err(PipelineError::Format { line, reason, .. }) => {
                assert_eq!(line, 4);
                assert!(reason.contains("duplicate"));
            }
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_line_counts_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotation.csv");
        std::fs::write(&path, "a,b\n\n/x.png,x.png\n\n\n/x.png,x.png\n").unwrap();

        match load(&path) {
            Err(PipelineError::Format { line, .. }) => assert_eq!(line, 6),
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_generate_relative_to_images_dir() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir(&images).unwrap();
        touch_images(&images, &["b.PNG", "a.jpg", "skip.gif"]);
        let output = dir.path().join("annotation.csv");

        let manifest = generate(&images, &images, &output, false).unwrap();

        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.entries[0].relative_path, "a.jpg");
        assert_eq!(manifest.entries[1].relative_path, "b.PNG");
        assert!(Path::new(&manifest.entries[0].absolute_path).is_absolute());

        // What was written is what load reads back
        assert_eq!(load(&output).unwrap(), manifest);
    }

    #[test]
    fn test_generate_relative_to_parent_base() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir(&images).unwrap();
        touch_images(&images, &["cat.jpeg"]);
        let output = dir.path().join("annotation.csv");

        let manifest = generate(&images, dir.path(), &output, false).unwrap();

        let expected = Path::new("images").join("cat.jpeg");
        assert_eq!(manifest.entries[0].relative_path, expected.to_string_lossy());
    }

    #[test]
    fn test_generate_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("annotation.csv");
        let result = generate(&dir.path().join("nope"), dir.path(), &output, false);

        assert!(matches!(result, Err(PipelineError::NotFound(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_write_replaces_existing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotation.csv");
        std::fs::write(&path, "stale").unwrap();

        let manifest = Manifest {
            entries: vec![ManifestEntry {
                absolute_path: "/data/a,b.png".to_string(),
                relative_path: "a,b.png".to_string(),
            }],
        };
        manifest.write(&path).unwrap();

        assert_eq!(load(&path).unwrap(), manifest);
        // No temp files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
