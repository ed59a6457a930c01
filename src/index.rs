//! Inverted landmark index.
//!
//! Maps integer frequency (Hz) to every `(song, time)` posting seen at
//! that frequency across the loaded fingerprints. Built once, then shared
//! read-only with the matcher and the batch workers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::fingerprint::{codec, Fingerprint};

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("cannot read index directory {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no readable fingerprints in {0}")]
    Empty(PathBuf),
}

/// One occurrence of a frequency: which song, and when.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Posting {
    /// Interned song id, resolved through [`InvertedIndex::song_name`].
    pub song: u32,
    pub time_sec: f64,
}

/// Frequency-keyed posting lists over a fingerprint corpus. Song names are
/// interned to small integers at load time; postings per key are kept in
/// insertion order and never deduplicated.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    songs: Vec<String>,
    song_ids: HashMap<String, u32>,
    postings: HashMap<i32, Vec<Posting>>,
    total_points: usize,
}

impl InvertedIndex {
    /// Add every point of a fingerprint under its rounded frequency.
    pub fn insert(&mut self, fingerprint: &Fingerprint) {
        let song = self.intern(&fingerprint.filename);
        for point in &fingerprint.points {
            let freq = point.freq_hz.round() as i32;
            self.postings.entry(freq).or_default().push(Posting {
                song,
                time_sec: point.time_sec,
            });
        }
        self.total_points += fingerprint.points.len();
    }

    fn intern(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.song_ids.get(name) {
            return id;
        }
        let id = self.songs.len() as u32;
        self.songs.push(name.to_string());
        self.song_ids.insert(name.to_string(), id);
        id
    }

    pub fn lookup(&self, freq_hz: i32) -> Option<&[Posting]> {
        self.postings.get(&freq_hz).map(Vec::as_slice)
    }

    pub fn song_name(&self, id: u32) -> &str {
        &self.songs[id as usize]
    }

    pub fn song_count(&self) -> usize {
        self.songs.len()
    }

    /// Total postings over all keys.
    pub fn len(&self) -> usize {
        self.total_points
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Load every `*.json` fingerprint in `dir` (non-recursive). Files that
    /// fail to parse are skipped with a warning; a directory yielding no
    /// fingerprints at all is an error, since matching against nothing is
    /// meaningless.
    pub fn load_directory(dir: &Path) -> Result<Self, IndexError> {
        let mut index = InvertedIndex::default();

        for entry in WalkDir::new(dir).max_depth(1).follow_links(true) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    return Err(IndexError::Io {
                        path: dir.to_path_buf(),
                        source: e.into(),
                    })
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match codec::load(path) {
                Ok(fp) => index.insert(&fp),
                Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
            }
        }

        if index.is_empty() {
            return Err(IndexError::Empty(dir.to_path_buf()));
        }

        log::info!(
            "Indexed {} songs, {} postings",
            index.song_count(),
            index.len()
        );
        Ok(index)
    }
}
