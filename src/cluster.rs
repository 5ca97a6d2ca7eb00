//! Grouping of hashed photos into duplicate sets.
//!
//! Photos are first bucketed by exact hash. Buckets are then merged
//! greedily: walking buckets in first-populated order, each bucket not
//! yet claimed becomes a claimant and takes every unclaimed bucket whose
//! hash is within the threshold of its own. A claimed bucket never moves
//! to a later group, so the outcome depends on bucket order and a chain
//! A~B~C where A and C are far apart is only kept together if A's claim
//! reaches C directly.
//!
//! The merge compares every claimant with every bucket: O(B²) distance
//! computations for B distinct hashes.

use crate::error::ScanError;
use crate::photo::{PerceptualHash, Photo};
use crate::progress::ProgressReporter;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

/// Photos sharing one exact hash.
#[derive(Debug, Clone)]
pub struct Bucket {
    pub hash: PerceptualHash,
    pub photos: Vec<Photo>,
}

/// A set of photos judged to be duplicates of each other, keyed by the
/// truncated hash of the bucket that claimed them.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub key: String,
    pub photos: Vec<Photo>,
}

impl DuplicateGroup {
    /// The member not flagged for deletion, if exactly one such member exists.
    pub fn keeper(&self) -> Option<&Photo> {
        let mut kept = self.photos.iter().filter(|p| !p.is_marked());
        match (kept.next(), kept.next()) {
            (Some(photo), None) => Some(photo),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }
}

/// Group photos by identical hash, buckets ordered by first appearance.
pub fn bucket_by_hash(photos: Vec<Photo>) -> Vec<Bucket> {
    let mut index: HashMap<PerceptualHash, usize> = HashMap::new();
    let mut buckets: Vec<Bucket> = Vec::new();

    for photo in photos {
        match index.get(photo.hash()) {
            Some(&i) => buckets[i].photos.push(photo),
            None => {
                index.insert(photo.hash().clone(), buckets.len());
                buckets.push(Bucket {
                    hash: photo.hash().clone(),
                    photos: vec![photo],
                });
            }
        }
    }
    buckets
}

/// Greedy first-claimant-wins merge of `buckets`. Groups with fewer than
/// two photos are dropped.
///
/// Cancellation is checked before every distance computation.
pub fn merge_similar(
    buckets: Vec<Bucket>,
    threshold: u32,
    key_len: usize,
    reporter: &ProgressReporter,
    cancel: &AtomicBool,
) -> Result<Vec<DuplicateGroup>, ScanError> {
    let (hashes, mut members): (Vec<PerceptualHash>, Vec<Option<Vec<Photo>>>) = buckets
        .into_iter()
        .map(|b| (b.hash, Some(b.photos)))
        .unzip();

    reporter.start_clustering(hashes.len());

    let mut groups: Vec<DuplicateGroup> = Vec::new();
    let mut used_keys: HashSet<String> = HashSet::new();

    for claimant in 0..hashes.len() {
        if members[claimant].is_none() {
            reporter.clustered_one();
            continue;
        }

        let mut photos = Vec::new();
        for candidate in 0..hashes.len() {
            if cancel.load(Ordering::Relaxed) {
                return Err(ScanError::Cancelled);
            }
            if members[candidate].is_none() {
                continue;
            }
            if hashes[claimant].dist(&hashes[candidate]) < threshold {
                if let Some(claimed) = members[candidate].take() {
                    photos.extend(claimed);
                }
            }
        }

        let key = unique_key(hashes[claimant].key(key_len), &mut used_keys);
        groups.push(DuplicateGroup { key, photos });
        reporter.clustered_one();
    }

    groups.retain(|g| g.len() >= 2);
    log::debug!(
        "{} distinct hashes merged into {} duplicate groups",
        hashes.len(),
        groups.len()
    );
    Ok(groups)
}

/// Two claimants can share a truncated key; the later one gets a suffix
/// so it stays a separate group.
fn unique_key(base: String, used: &mut HashSet<String>) -> String {
    let mut key = base.clone();
    let mut n = 1;
    while used.contains(&key) {
        key = format!("{}-{}", base, n);
        n += 1;
    }
    used.insert(key.clone());
    key
}
