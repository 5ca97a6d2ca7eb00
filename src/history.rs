use crate::delete::DeletionReport;
use crate::resolve::ScanResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub const HISTORY_FILE: &str = ".history.jsonl";

/// One line of the deletion log: what a single group kept and lost.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeletionRecord {
    pub timestamp: String,
    pub retained: Vec<String>,
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

pub fn history_path(dir: &Path) -> PathBuf {
    dir.join(HISTORY_FILE)
}

/// Build one record per group that had something flagged.
pub fn records_for(result: &ScanResult, report: &DeletionReport) -> Vec<DeletionRecord> {
    let deleted: HashSet<&Path> = report.deleted.iter().map(PathBuf::as_path).collect();
    let failed: HashSet<&Path> = report.failures.iter().map(|f| f.path.as_path()).collect();
    let timestamp = Utc::now().to_rfc3339();

    result
        .groups
        .iter()
        .filter(|g| g.photos.iter().any(|p| p.is_marked()))
        .map(|g| {
            let pick = |set: &HashSet<&Path>| {
                g.photos
                    .iter()
                    .filter(|p| p.is_marked() && set.contains(p.path()))
                    .map(|p| p.path().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
            };
            DeletionRecord {
                timestamp: timestamp.clone(),
                retained: g
                    .photos
                    .iter()
                    .filter(|p| !p.is_marked())
                    .map(|p| p.path().to_string_lossy().into_owned())
                    .collect(),
                deleted: pick(&deleted),
                failed: pick(&failed),
            }
        })
        .collect()
}

/// Append `records` to the history file in `dir`, one JSON object per line.
pub fn append(dir: &Path, records: &[DeletionRecord]) -> io::Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    let mut out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(history_path(dir))?;
    for record in records {
        writeln!(out, "{}", serde_json::to_string(record)?)?;
    }
    Ok(())
}

/// Read every record from the history file in `dir`. Malformed lines are
/// returned as errors in place so callers can report them by index.
pub fn load(dir: &Path) -> io::Result<Vec<Result<DeletionRecord, serde_json::Error>>> {
    let reader = BufReader::new(File::open(history_path(dir))?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str::<DeletionRecord>(&line));
    }
    Ok(records)
}
