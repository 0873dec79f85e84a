//! Binary feature records: one `{strf, fs}` MessagePack map per segment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SleepSpecError};
use crate::strf::FeatureTensor;

/// File extension of feature records.
pub const RECORD_EXTENSION: &str = "rec";

/// Cached feature tensor of one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Time-averaged STRF magnitude.
    pub strf: FeatureTensor,
    /// Sample rate of the segment in Hz.
    pub fs: u32,
}

impl FeatureRecord {
    pub fn new(strf: FeatureTensor, fs: u32) -> Self {
        Self { strf, fs }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(self).map_err(|e| SleepSpecError::Record(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(data).map_err(|e| SleepSpecError::Record(e.to_string()))
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_bytes()?)?;
        debug!("saved feature record to {}", path.display());
        Ok(())
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
            .map_err(|e| SleepSpecError::Record(format!("{}: {e}", path.display())))
    }
}

/// File name for the record of the segment at 0-based `index`.
pub fn record_file_name(index: usize) -> String {
    format!("segment_{}_strf.{RECORD_EXTENSION}", index + 1)
}

/// Lists the record files in `dir`, ordered by the segment number in their
/// names. Files without a number sort last, by name.
pub fn list_records(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == RECORD_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort_by_cached_key(|p| {
        let name = p
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        (segment_number(&name).unwrap_or(usize::MAX), name)
    });
    Ok(paths)
}

/// Removes every record file in `dir`, leaving other files alone.
/// Returns the number of files removed; a missing directory removes nothing.
pub fn clear_records(dir: impl AsRef<Path>) -> Result<usize> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(0);
    }
    let paths = list_records(dir)?;
    for path in &paths {
        std::fs::remove_file(path)?;
    }
    if !paths.is_empty() {
        debug!(count = paths.len(), "removed stale records from {}", dir.display());
    }
    Ok(paths.len())
}

/// Extracts `n` from names like `segment_12_strf.rec`.
fn segment_number(name: &str) -> Option<usize> {
    let rest = name.strip_prefix("segment_")?;
    let digits: &str = &rest[..rest.find(|c: char| !c.is_ascii_digit())?];
    digits.parse().ok()
}
