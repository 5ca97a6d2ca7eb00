use crate::error::DeleteFailure;
use crate::resolve::ScanResult;
use std::fs;
use std::path::PathBuf;

/// Outcome of one deletion batch.
#[derive(Debug, Default)]
pub struct DeletionReport {
    pub deleted: Vec<PathBuf>,
    pub failures: Vec<DeleteFailure>,
}

impl DeletionReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Remove every file flagged for deletion in `result`. Failures are
/// collected and the batch carries on. With `dry_run` nothing is touched
/// and every flagged path is reported as deleted.
pub fn delete_marked(result: &ScanResult, dry_run: bool) -> DeletionReport {
    let mut report = DeletionReport::default();
    for photo in result.marked() {
        let path = photo.path().to_path_buf();
        if dry_run {
            report.deleted.push(path);
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("Deleted {}", path.display());
                report.deleted.push(path);
            }
            Err(error) => {
                log::warn!("Failed to delete {}: {}", path.display(), error);
                report.failures.push(DeleteFailure { path, error });
            }
        }
    }
    report
}
