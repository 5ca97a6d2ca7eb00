use crate::error::ScanError;
use crate::photo::ImageFile;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

/// Whether `filename` looks like an image we should hash.
///
/// With `legacy_jpg_match` set, any name containing ".jpg" anywhere is
/// accepted as well (so `note.jpgx.txt` matches).
pub fn is_image(filename: &str, legacy_jpg_match: bool) -> bool {
    let lower = filename.to_lowercase();
    if legacy_jpg_match && lower.contains(".jpg") {
        return true;
    }
    IMAGE_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)))
}

/// List the image files directly inside `dir`. Not recursive.
///
/// A missing or unreadable directory is fatal. Entries that vanish or
/// cannot be stat'ed mid-listing are logged and skipped.
pub fn list_images(dir: &Path, legacy_jpg_match: bool) -> Result<Vec<ImageFile>, ScanError> {
    if !dir.exists() {
        return Err(ScanError::InvalidPath {
            path: dir.to_string_lossy().to_string(),
        });
    }
    if !dir.is_dir() {
        return Err(ScanError::InvalidPath {
            path: format!("{} is not a directory", dir.to_string_lossy()),
        });
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(match e.into_io_error() {
                    Some(io) => ScanError::Io(io),
                    None => ScanError::InvalidPath {
                        path: dir.to_string_lossy().to_string(),
                    },
                });
            }
            Err(e) => {
                log::warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy();
        if !is_image(&name, legacy_jpg_match) {
            continue;
        }

        // Follows symlinks, so linked images are sized by their target.
        match fs::metadata(entry.path()) {
            Ok(meta) if meta.is_file() => images.push(ImageFile::new(entry.path(), meta.len())),
            Ok(_) => {}
            Err(e) => log::warn!("Could not stat {}: {}", entry.path().display(), e),
        }
    }

    log::debug!("Found {} candidate images in {}", images.len(), dir.display());
    Ok(images)
}
