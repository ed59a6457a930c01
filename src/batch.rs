//! Directory-scale operations: batch identification against a shared
//! index, and bulk fingerprinting of a folder of WAV files.

use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use walkdir::WalkDir;

use crate::fingerprint::{self, codec};
use crate::index::InvertedIndex;
use crate::matcher::{self, MatchResult, MatchStatus};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

pub const CSV_HEADER: &str =
    "Query File;Best Match;Offset (s);Score;Total Points;Confidence %;Time;Status";

pub struct BatchSummary {
    pub processed: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub errors: usize,
}

pub struct FpdirSummary {
    pub written: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Collect the `*.wav` files directly inside `dir`, sorted by name so runs
/// submit jobs in a stable order.
fn wav_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("wav"))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Run the full per-file pipeline: decode, extract, match. Decode failures
/// become an empty result so batch runs keep going; the elapsed time covers
/// the whole pipeline, not just the vote.
pub fn identify_file(path: &Path, index: &InvertedIndex, window_size: usize) -> MatchResult {
    let start = Instant::now();
    let label = file_label(path);

    let mut result = match crate::audio::read_wav(path) {
        Ok(audio) => {
            let points =
                fingerprint::extract_points(audio.primary(), audio.sample_rate, window_size);
            matcher::match_points(&label, &points, index)
        }
        Err(e) => {
            log::warn!("Decode failed for {}: {}", path.display(), e);
            MatchResult::empty(label)
        }
    };
    result.elapsed = start.elapsed();
    result
}

fn csv_row(result: &MatchResult) -> String {
    format!(
        "{};{};{:.2};{};{};{:.2};{:.2?};{}",
        result.query_file,
        result.best_match.as_deref().unwrap_or("None"),
        result.offset_sec,
        result.score,
        result.total_points,
        result.confidence,
        result.elapsed,
        result.status(),
    )
}

/// Identify every WAV in `query_dir` against the shared index.
///
/// Worker tasks on a rayon pool each run the per-file pipeline and push
/// their `MatchResult` into a channel; this thread is the single collector,
/// writing CSV rows in arrival order and driving the progress bar. Rows are
/// therefore not in submission order.
pub fn identify_directory(
    query_dir: &Path,
    index: Arc<InvertedIndex>,
    window_size: usize,
    workers: usize,
    csv_path: &Path,
) -> Result<BatchSummary, BatchError> {
    let files = wav_files(query_dir);
    log::info!(
        "Batch identify: {} files, {} workers",
        files.len(),
        workers
    );

    if let Some(parent) = csv_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut report = BufWriter::new(File::create(csv_path)?);
    writeln!(report, "{}", CSV_HEADER)?;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap()
        .progress_chars("#>-"),
    );

    let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
    let (tx, rx) = mpsc::channel::<MatchResult>();

    for file in files {
        let tx = tx.clone();
        let index = Arc::clone(&index);
        pool.spawn(move || {
            let result = identify_file(&file, &index, window_size);
            // the collector hanging up just means we stop reporting
            let _ = tx.send(result);
        });
    }
    drop(tx);

    let mut summary = BatchSummary {
        processed: 0,
        matched: 0,
        unmatched: 0,
        errors: 0,
    };

    for result in rx {
        summary.processed += 1;
        match result.status() {
            MatchStatus::Match => summary.matched += 1,
            MatchStatus::NoMatch => summary.unmatched += 1,
            MatchStatus::Error => summary.errors += 1,
        }

        writeln!(report, "{}", csv_row(&result))?;

        pb.inc(1);
        pb.set_message(format!(
            "{} matched, {} errors",
            summary.matched, summary.errors
        ));
    }

    report.flush()?;
    pb.finish_with_message(format!(
        "Done: {} matched, {} no match, {} errors",
        summary.matched, summary.unmatched, summary.errors
    ));

    Ok(summary)
}

/// Fingerprint every WAV in `input_dir` into `output_dir`, one JSON per
/// file named after the sanitized song id. Files that decode to zero
/// landmarks are skipped with a warning.
pub fn fingerprint_directory(
    input_dir: &Path,
    output_dir: &Path,
    window_size: usize,
) -> Result<FpdirSummary, BatchError> {
    let files = wav_files(input_dir);
    std::fs::create_dir_all(output_dir)?;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) {msg}",
        )
        .unwrap()
        .progress_chars("#>-"),
    );

    let mut summary = FpdirSummary {
        written: 0,
        skipped: 0,
        errors: 0,
    };

    for file in &files {
        match fingerprint::fingerprint_file(file, window_size) {
            Ok(fp) if fp.points.is_empty() => {
                log::warn!("No landmarks in {}, skipping", file.display());
                summary.skipped += 1;
            }
            Ok(fp) => {
                let name = codec::sanitize_filename(&fp.filename);
                let out = output_dir.join(format!("{}.json", name));
                match codec::save(&fp, &out) {
                    Ok(()) => summary.written += 1,
                    Err(e) => {
                        log::error!("Could not write {}: {}", out.display(), e);
                        summary.errors += 1;
                    }
                }
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", file.display(), e);
                summary.errors += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message(format!(
        "Done: {} written, {} skipped, {} errors",
        summary.written, summary.skipped, summary.errors
    ));

    Ok(summary)
}
