//! Gallery enumeration.
//!
//! The gallery is an externally managed directory of reference images,
//! listed fresh on every verification cycle so additions and removals
//! between cycles take effect without a restart.

use std::path::{Path, PathBuf};
use thiserror::Error;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("cannot read gallery directory {path}: {source}")]
    Unreadable {
        path: String,
        source: std::io::Error,
    },
}

/// List the reference image files in `dir`, sorted by path.
///
/// Entries without a recognized image extension are skipped. An empty
/// result is not an error here; the aggregator rejects empty galleries
/// before scoring.
pub fn scan(dir: &Path) -> Result<Vec<PathBuf>, GalleryError> {
    let entries = std::fs::read_dir(dir).map_err(|source| GalleryError::Unreadable {
        path: dir.to_string_lossy().into_owned(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_image_extension(path))
        .collect();
    paths.sort();

    Ok(paths)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
