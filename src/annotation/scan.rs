use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{PipelineError, Result};

/// Extensions accepted into a dataset (compared lowercase)
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Check if a path looks like a dataset image by extension
pub fn is_image_file(path: &Path) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy().to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// List the image files of a folder, sorted by path
///
/// Only the folder itself is read unless `recursive` is set.
/// Fails with `NotFound` if `images_dir` is not a directory.
pub fn image_files(images_dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !images_dir.is_dir() {
        return Err(PipelineError::NotFound(images_dir.to_path_buf()));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in WalkDir::new(images_dir)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };

        // Only process files (not directories)
        let path = entry.path();
        if path.is_file() && is_image_file(path) {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// Express `path` relative to `base`, walking up with `..` where needed.
/// Both paths should be absolute and normalized.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path_parts: Vec<Component> = path.components().collect();
    let base_parts: Vec<Component> = base.components().collect();

    let common = path_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in &path_parts[common..] {
        relative.push(part.as_os_str());
    }

    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    relative
}
