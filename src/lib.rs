//! Find visually duplicate images in a folder and decide which copy of
//! each group to keep.
//!
//! The pipeline is: [`scanner`] lists candidate files, [`hash`] computes a
//! DCT perceptual hash for each, [`cluster`] buckets and greedily merges
//! similar hashes, and [`resolve`] keeps the largest file of every group.
//! [`finder::spawn_scan`] runs all of it on a worker thread and streams
//! [`progress::ScanEvent`]s to the caller.

pub mod cluster;
pub mod config;
pub mod delete;
pub mod error;
pub mod finder;
pub mod hash;
pub mod history;
pub mod photo;
pub mod progress;
pub mod resolve;
pub mod scanner;

pub use config::ScanConfig;
pub use error::{DeleteFailure, HashError, ScanError};
pub use finder::{find_similar_images, spawn_scan, ScanHandle};
pub use progress::ScanEvent;
pub use resolve::ScanResult;
