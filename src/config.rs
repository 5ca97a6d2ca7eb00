use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const MAX_HASH_SIZE: u32 = 256;

/// Tuning knobs for a scan. Every field has a default, so a config file
/// only needs to name the values it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Width and height of the hash grid, in bits.
    pub hash_size: u32,
    /// Images are pre-scaled to `hash_size * highfreq_factor` square before
    /// hashing. The DCT itself always runs on a `2 * hash_size` square, so
    /// this only sets the resampling source resolution; it must be at least
    /// 2 to avoid upsampling.
    pub highfreq_factor: u32,
    /// Two hashes are similar when their Hamming distance is strictly below this.
    pub threshold: u32,
    /// Number of hex characters of the claimant hash used as the group key.
    pub key_len: usize,
    /// Also accept any filename containing ".jpg", not just the extension.
    pub legacy_jpg_match: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            hash_size: 64,
            highfreq_factor: 4,
            threshold: 500,
            key_len: 32,
            legacy_jpg_match: true,
        }
    }
}

impl ScanConfig {
    /// Read a JSON config file. Missing fields fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self, ScanError> {
        let raw = fs::read_to_string(path)?;
        let config: ScanConfig = serde_json::from_str(&raw)
            .map_err(|e| ScanError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `explicit` if given, else the per-user config file if it
    /// exists, else the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ScanError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => {
                log::debug!("Loading config from {}", path.display());
                Self::from_file(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        if self.hash_size == 0 {
            return Err(ScanError::Config("hash_size must be positive".to_string()));
        }
        if self.hash_size > MAX_HASH_SIZE {
            return Err(ScanError::Config(format!(
                "hash_size must be at most {}",
                MAX_HASH_SIZE
            )));
        }
        if self.highfreq_factor < 2 {
            return Err(ScanError::Config(
                "highfreq_factor must be at least 2".to_string(),
            ));
        }
        if self.threshold == 0 {
            return Err(ScanError::Config(
                "threshold must be positive; nothing would ever match".to_string(),
            ));
        }
        if self.key_len == 0 {
            return Err(ScanError::Config("key_len must be positive".to_string()));
        }
        Ok(())
    }
}

/// `<config_dir>/dupefind/config.json`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dupefind").join("config.json"))
}
