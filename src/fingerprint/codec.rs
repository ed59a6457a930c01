//! Fingerprint persistence.
//!
//! One JSON file per song: `{ filename, duration, sample_rate, points }`.
//! The reader ignores unknown top-level keys, so files written by older
//! or richer producers stay loadable.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

use super::Fingerprint;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write a fingerprint as pretty-printed JSON.
pub fn save(fingerprint: &Fingerprint, path: &Path) -> Result<(), CodecError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, fingerprint)?;
    Ok(())
}

/// Read a fingerprint back from JSON.
pub fn load(path: &Path) -> Result<Fingerprint, CodecError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Strip the characters that are unsafe in file names across platforms.
pub fn sanitize_filename(name: &str) -> String {
    const INVALID: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
    name.chars().filter(|c| !INVALID.contains(c)).collect()
}
