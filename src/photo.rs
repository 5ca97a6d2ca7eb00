use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

const SIZE_UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Render a byte count the way the result listing shows it: `0B`,
/// `100.0 B`, `1.5 KB`, `2.34 MB`.
pub fn size_text(size_bytes: u64) -> String {
    if size_bytes == 0 {
        return "0B".to_string();
    }
    let mut unit = 0;
    let mut scale = 1u128;
    while unit + 1 < SIZE_UNITS.len() && u128::from(size_bytes) >= scale * 1024 {
        scale *= 1024;
        unit += 1;
    }
    let value = ((size_bytes as f64 / scale as f64) * 100.0).round() / 100.0;
    format!("{:?} {}", value, SIZE_UNITS[unit])
}

/// A candidate image found on disk, before hashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    path: PathBuf,
    name: String,
    size: u64,
}

impl ImageFile {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        Self { path, name, size }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Processing order key: the part of the name before the first dot,
    /// then the full name so equal stems still sort reproducibly.
    pub fn sort_key(&self) -> (&str, &str) {
        let stem = self.name.split('.').next().unwrap_or_default();
        (stem, self.name.as_str())
    }
}

/// Fixed-width perceptual signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PerceptualHash(Box<[u8]>);

impl PerceptualHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn bit_len(&self) -> usize {
        self.0.len() * 8
    }

    /// Hamming distance. Hashes of different widths never come from the
    /// same scan; the extra bytes of the longer one count as differing.
    pub fn dist(&self, other: &PerceptualHash) -> u32 {
        let shared: u32 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        let extra = self.0.len().abs_diff(other.0.len()) as u32 * 8;
        shared + extra
    }

    /// First `len` characters of the lowercase hex form.
    pub fn key(&self, len: usize) -> String {
        let mut hex = self.to_string();
        hex.truncate(len);
        hex
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// A hashed image. Identity, size and hash are fixed once built; the
/// deletion flag is the one mutable field.
#[derive(Debug, Clone, Serialize)]
pub struct Photo {
    path: PathBuf,
    name: String,
    size: u64,
    size_text: String,
    #[serde(skip)]
    hash: PerceptualHash,
    #[serde(rename = "delete_flag")]
    delete: bool,
}

impl Photo {
    pub fn new(file: ImageFile, hash: PerceptualHash) -> Self {
        let size_text = size_text(file.size);
        Self {
            path: file.path,
            name: file.name,
            size: file.size,
            size_text,
            hash,
            delete: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn size_text(&self) -> &str {
        &self.size_text
    }

    pub fn hash(&self) -> &PerceptualHash {
        &self.hash
    }

    pub fn is_marked(&self) -> bool {
        self.delete
    }

    pub fn set_marked(&mut self, delete: bool) {
        self.delete = delete;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_text_units() {
        assert_eq!(size_text(0), "0B");
        assert_eq!(size_text(100), "100.0 B");
        assert_eq!(size_text(1023), "1023.0 B");
        assert_eq!(size_text(1024), "1.0 KB");
        assert_eq!(size_text(1536), "1.5 KB");
        assert_eq!(size_text(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(size_text(2_453_667), "2.34 MB");
    }

    #[test]
    fn test_hamming_distance() {
        let a = PerceptualHash::from_bytes(&[0b0000_0000, 0xff]);
        let b = PerceptualHash::from_bytes(&[0b0000_0111, 0xff]);
        assert_eq!(a.dist(&a), 0);
        assert_eq!(a.dist(&b), 3);
        assert_eq!(b.dist(&a), 3);
        assert_eq!(a.bit_len(), 16);
    }

    #[test]
    fn test_key_truncates_hex() {
        let hash = PerceptualHash::from_bytes(&[0xab, 0xcd, 0xef, 0x01]);
        assert_eq!(hash.to_string(), "abcdef01");
        assert_eq!(hash.key(4), "abcd");
        assert_eq!(hash.key(32), "abcdef01");
    }

    #[test]
    fn test_sort_key_uses_stem_before_first_dot() {
        let a = ImageFile::new("/tmp/b.tar.jpg", 1);
        let b = ImageFile::new("/tmp/b.jpg", 1);
        assert_eq!(a.sort_key().0, "b");
        assert_eq!(b.sort_key().0, "b");
        assert!(b.sort_key() < a.sort_key());
    }

    #[test]
    fn test_photo_starts_unmarked_and_serialises_flag() {
        let file = ImageFile::new("/photos/a.png", 2048);
        let mut photo = Photo::new(file, PerceptualHash::from_bytes(&[1, 2]));
        assert!(!photo.is_marked());
        assert_eq!(photo.size_text(), "2.0 KB");

        photo.set_marked(true);
        let json = serde_json::to_value(&photo).unwrap();
        assert_eq!(json["delete_flag"], true);
        assert_eq!(json["name"], "a.png");
        assert_eq!(json["size"], 2048);
        assert!(json.get("hash").is_none());
    }
}
