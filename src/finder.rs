use crate::cluster::{bucket_by_hash, merge_similar};
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::hash::PhotoHasher;
use crate::progress::{ProgressReporter, ScanEvent};
use crate::resolve::ScanResult;
use crate::scanner::list_images;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tokio::sync::mpsc;

/// Run the whole pipeline on the calling thread: list, hash, bucket,
/// merge, resolve. Progress goes to `reporter`; the terminal event is
/// left to the caller.
pub fn find_similar_images(
    dir: &Path,
    config: &ScanConfig,
    reporter: &ProgressReporter,
    cancel: &AtomicBool,
) -> Result<ScanResult, ScanError> {
    config.validate()?;
    let started = Instant::now();

    let mut files = list_images(dir, config.legacy_jpg_match)?;
    files.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    log::info!("Hashing {} images in {}", files.len(), dir.display());

    let hasher = PhotoHasher::new(config);
    reporter.start_hashing(files.len());
    let (photos, skipped) = benchmark("hashing", || hasher.hash_all(files, reporter, cancel))?;

    let buckets = bucket_by_hash(photos);
    let groups = benchmark("distance", || {
        merge_similar(buckets, config.threshold, config.key_len, reporter, cancel)
    })?;

    let result = ScanResult::new(groups, skipped);
    log::info!(
        "Scan finished in {:.2?}: {} groups, {} to delete, {} skipped",
        started.elapsed(),
        result.groups.len(),
        result.deletions_count,
        result.skipped.len()
    );
    Ok(result)
}

/// Run `f()` and log how long it took.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    log::info!("{} took {:.2?}", label, start.elapsed());
    result
}

/// A scan running on its own thread. The owner polls events at its own
/// pace with [`ScanHandle::try_next`] or awaits them with [`ScanHandle::next`].
pub struct ScanHandle {
    events: mpsc::UnboundedReceiver<ScanEvent>,
    cancellation_token: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ScanHandle {
    /// Next pending event, without blocking. `Ok(None)` means nothing is
    /// ready yet; `Err(WorkerLost)` means the worker died without a
    /// terminal event.
    pub fn try_next(&mut self) -> Result<Option<ScanEvent>, ScanError> {
        match self.events.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(ScanError::WorkerLost),
        }
    }

    /// Wait for the next event. `None` once the channel is closed.
    pub async fn next(&mut self) -> Option<ScanEvent> {
        self.events.recv().await
    }

    pub fn cancel(&self) {
        self.cancellation_token.store(true, Ordering::Relaxed);
    }

    pub fn cancellation_token(&self) -> Arc<AtomicBool> {
        self.cancellation_token.clone()
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        self.cancel();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Start a scan of `dir` on a dedicated worker thread.
pub fn spawn_scan(dir: impl Into<PathBuf>, config: ScanConfig) -> ScanHandle {
    let dir = dir.into();
    let (tx, rx) = mpsc::unbounded_channel();
    let cancellation_token = Arc::new(AtomicBool::new(false));
    let cancel = cancellation_token.clone();

    let worker = thread::spawn(move || {
        let reporter = ProgressReporter::new(tx);
        match find_similar_images(&dir, &config, &reporter, &cancel) {
            Ok(result) => reporter.done(result),
            Err(e) => {
                log::error!("Scan of {} failed: {}", dir.display(), e);
                reporter.failed(e);
            }
        }
    });

    ScanHandle {
        events: rx,
        cancellation_token,
        worker: Some(worker),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, Rgb};
    use std::fs;
    use tempfile::TempDir;

    /// Blocky pseudo-random noise; different seeds give unrelated images.
    fn pattern(width: u32, height: u32, seed: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
            let n = (x / 8).wrapping_mul(73_856_093)
                ^ (y / 8).wrapping_mul(19_349_663)
                ^ seed.wrapping_add(1).wrapping_mul(83_492_791);
            let v = (n.wrapping_mul(2_654_435_761) >> 24) as u8;
            Rgb([v, v, v])
        }))
    }

    fn gradient(width: u32, height: u32, horizontal: bool) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
            let v = if horizontal {
                x * 255 / width
            } else {
                y * 255 / height
            } as u8;
            Rgb([v, v, v])
        }))
    }

    fn small_config() -> ScanConfig {
        ScanConfig {
            hash_size: 8,
            threshold: 1,
            ..ScanConfig::default()
        }
    }

    async fn collect(mut handle: ScanHandle) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.next().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_identical_pair_kept_largest_and_outlier_absent() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.png");
        let b = temp_dir.path().join("b.bmp");
        let c = temp_dir.path().join("c.png");
        pattern(64, 64, 0).save(&a).unwrap();
        pattern(64, 64, 0).save(&b).unwrap();
        pattern(64, 64, 2).save(&c).unwrap();

        let a_size = fs::metadata(&a).unwrap().len();
        let b_size = fs::metadata(&b).unwrap().len();
        assert_ne!(a_size, b_size);
        let (kept, dropped) = if b_size > a_size {
            ("b.bmp", "a.png")
        } else {
            ("a.png", "b.bmp")
        };

        let cancel = AtomicBool::new(false);
        let result = find_similar_images(
            temp_dir.path(),
            &small_config(),
            &ProgressReporter::detached(),
            &cancel,
        )
        .unwrap();

        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.deletions_count, 1);
        let group = &result.groups[0];
        assert_eq!(group.keeper().unwrap().name(), kept);
        assert!(group.photos.iter().all(|p| p.name() != "c.png"));
        let marked: Vec<&str> = result.marked().map(|p| p.name()).collect();
        assert_eq!(marked, vec![dropped]);
    }

    #[test]
    fn test_smooth_unrelated_images_not_grouped_by_default() {
        let temp_dir = TempDir::new().unwrap();
        gradient(300, 200, true).save(temp_dir.path().join("sunset.png")).unwrap();
        gradient(300, 200, false).save(temp_dir.path().join("sky.png")).unwrap();

        let cancel = AtomicBool::new(false);
        let result = find_similar_images(
            temp_dir.path(),
            &ScanConfig::default(),
            &ProgressReporter::detached(),
            &cancel,
        )
        .unwrap();

        assert!(result.groups.is_empty());
        assert_eq!(result.deletions_count, 0);
    }

    #[test]
    fn test_brightened_copy_grouped_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let original = pattern(200, 200, 5).to_rgb8();
        let muted = |lift: u8| {
            DynamicImage::ImageRgb8(ImageBuffer::from_fn(200, 200, |x, y| {
                let v = original.get_pixel(x, y)[0] / 2 + 32 + lift;
                Rgb([v, v, v])
            }))
        };
        muted(0).save(temp_dir.path().join("photo.png")).unwrap();
        muted(3).save(temp_dir.path().join("photo_edit.bmp")).unwrap();
        pattern(200, 200, 9).save(temp_dir.path().join("other.png")).unwrap();

        let cancel = AtomicBool::new(false);
        let result = find_similar_images(
            temp_dir.path(),
            &ScanConfig::default(),
            &ProgressReporter::detached(),
            &cancel,
        )
        .unwrap();

        assert_eq!(result.groups.len(), 1);
        let mut names: Vec<&str> = result.groups[0].photos.iter().map(|p| p.name()).collect();
        names.sort();
        assert_eq!(names, vec!["photo.png", "photo_edit.bmp"]);
        // BMP is uncompressed, so the edited copy is the larger file.
        assert_eq!(result.groups[0].keeper().unwrap().name(), "photo_edit.bmp");
    }

    #[test]
    fn test_broken_image_skipped_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        pattern(32, 32, 0).save(temp_dir.path().join("a.png")).unwrap();
        fs::write(temp_dir.path().join("broken.jpg"), b"nope").unwrap();

        let cancel = AtomicBool::new(false);
        let result = find_similar_images(
            temp_dir.path(),
            &small_config(),
            &ProgressReporter::detached(),
            &cancel,
        )
        .unwrap();

        assert!(result.groups.is_empty());
        assert_eq!(result.skipped.len(), 1);
        assert!(result.skipped[0].path.ends_with("broken.jpg"));
    }

    #[tokio::test]
    async fn test_empty_folder_completes_immediately() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("readme.txt"), b"text").unwrap();

        let events = collect(spawn_scan(temp_dir.path(), ScanConfig::default())).await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ScanEvent::Progress(f) if f == 1.0));
        match &events[1] {
            ScanEvent::Done(result) => {
                assert!(result.groups.is_empty());
                assert_eq!(result.deletions_count, 0);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_folder_fails_without_progress() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("gone");

        let events = collect(spawn_scan(missing, ScanConfig::default())).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ScanEvent::Failed(ScanError::InvalidPath { .. })));
    }

    #[tokio::test]
    async fn test_progress_monotonic_then_single_done() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..6 {
            pattern(48, 48, i % 3).save(temp_dir.path().join(format!("img_{}.png", i))).unwrap();
        }

        let events = collect(spawn_scan(temp_dir.path(), small_config())).await;

        let terminal: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_terminal())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(terminal, vec![events.len() - 1]);
        assert!(matches!(events.last(), Some(ScanEvent::Done(_))));

        let fractions: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Progress(f) => Some(*f),
                _ => None,
            })
            .collect();
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));
        assert_eq!(fractions.last().copied(), Some(1.0));

        if let Some(ScanEvent::Done(result)) = events.last() {
            assert_eq!(result.groups.len(), 3);
            assert_eq!(result.deletions_count, 3);
        }
    }

    #[test]
    fn test_cancelled_scan_fails() {
        let temp_dir = TempDir::new().unwrap();
        pattern(32, 32, 0).save(temp_dir.path().join("a.png")).unwrap();

        let cancel = AtomicBool::new(true);
        let result = find_similar_images(
            temp_dir.path(),
            &small_config(),
            &ProgressReporter::detached(),
            &cancel,
        );
        assert!(matches!(result, Err(ScanError::Cancelled)));
    }
}
