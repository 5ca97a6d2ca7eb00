use crate::config::ScanConfig;
use crate::error::{HashError, ScanError};
use crate::photo::{ImageFile, PerceptualHash, Photo};
use crate::progress::ProgressReporter;
use image::{imageops::FilterType, DynamicImage, ImageReader};
use image_hasher::{HashAlg, Hasher, HasherConfig};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// An image dropped from the scan because it could not be hashed.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedImage {
    pub path: PathBuf,
    pub reason: String,
}

/// pHash over a `hash_size` x `hash_size` grid: DCT coefficients
/// thresholded against their median, so about half the bits are set
/// whatever the image's texture.
pub struct PhotoHasher {
    hasher: Hasher,
    prescale: u32,
}

impl PhotoHasher {
    pub fn new(config: &ScanConfig) -> Self {
        let hasher = HasherConfig::new()
            .hash_size(config.hash_size, config.hash_size)
            .hash_alg(HashAlg::Median)
            .preproc_dct()
            .to_hasher();

        Self {
            hasher,
            prescale: config.hash_size.saturating_mul(config.highfreq_factor),
        }
    }

    pub fn hash_image(&self, img: &DynamicImage) -> PerceptualHash {
        let scaled = img
            .grayscale()
            .resize_exact(self.prescale, self.prescale, FilterType::Lanczos3);
        PerceptualHash::from_bytes(self.hasher.hash_image(&scaled).as_bytes())
    }

    /// Decode the file (format sniffed from content, not the name) and hash it.
    pub fn hash_file(&self, path: &Path) -> Result<PerceptualHash, HashError> {
        let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        Ok(self.hash_image(&img))
    }

    /// Hash `files` in parallel. The returned photos keep the input order;
    /// failures are logged and returned separately. Each file, hashed or
    /// not, advances the reporter by one step.
    pub fn hash_all(
        &self,
        files: Vec<ImageFile>,
        reporter: &ProgressReporter,
        cancel: &AtomicBool,
    ) -> Result<(Vec<Photo>, Vec<SkippedImage>), ScanError> {
        let outcomes: Vec<Result<Photo, SkippedImage>> = files
            .into_par_iter()
            .map(|file| {
                if cancel.load(Ordering::Relaxed) {
                    return Err(ScanError::Cancelled);
                }

                let outcome = match self.hash_file(file.path()) {
                    Ok(hash) => Ok(Photo::new(file, hash)),
                    Err(e) => {
                        log::warn!("Problem: {} with {}", e, file.name());
                        Err(SkippedImage {
                            path: file.path().to_path_buf(),
                            reason: e.to_string(),
                        })
                    }
                };
                reporter.hashed_one();
                Ok(outcome)
            })
            .collect::<Result<_, ScanError>>()?;

        let mut photos = Vec::with_capacity(outcomes.len());
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(photo) => photos.push(photo),
                Err(skip) => skipped.push(skip),
            }
        }
        Ok((photos, skipped))
    }
}
