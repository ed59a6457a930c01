use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use wavemark::fingerprint::codec;
use wavemark::index::InvertedIndex;
use wavemark::matcher;

#[derive(Parser)]
#[command(name = "wavemark", version, about = "Constellation-based audio fingerprinting")]
struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute one song's landmarks and save them as JSON
    Fingerprint {
        /// Input audio file (.wav)
        audio: PathBuf,

        /// Output fingerprint file
        #[arg(short, long, default_value = "fingerprint.json")]
        output: PathBuf,

        /// FFT window size (must match across fingerprints and queries)
        #[arg(short = 'w', long)]
        winsize: Option<usize>,
    },

    /// Compare two fingerprint files directly
    Match {
        /// Reference fingerprint (.json)
        reference: PathBuf,

        /// Sample fingerprint (.json)
        sample: PathBuf,

        /// Minimum score to declare a match
        #[arg(short = 't', long, default_value = "100")]
        threshold: u32,

        /// Write the offset histogram to debug_hist.json
        #[arg(short = 'd', long)]
        dump_histogram: bool,
    },

    /// Identify an audio file (or a directory of files) against an index
    Identify {
        /// Directory of fingerprint JSON files
        index_dir: PathBuf,

        /// Query WAV file, or a directory of them for batch mode
        input: PathBuf,

        /// FFT window size (must match the one used for the fingerprints)
        #[arg(short = 'w', long)]
        winsize: Option<usize>,

        /// Report file for batch mode
        #[arg(long, default_value = "report.csv")]
        csv: PathBuf,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,
    },

    /// Fingerprint every .wav file in a directory
    Fpdir {
        /// Directory containing WAV files
        input_dir: PathBuf,

        /// Output directory for the fingerprints
        #[arg(short, long, default_value = "fingerprints")]
        output: PathBuf,

        /// FFT window size
        #[arg(short = 'w', long)]
        winsize: Option<usize>,
    },
}

fn main() -> Result<()> {
    // usage errors exit 1, like every other fatal failure
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        let _ = e.print();
        std::process::exit(1);
    });

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = wavemark::config::AppConfig::load();

    match cli.command {
        Commands::Fingerprint { audio, output, winsize } => {
            let window_size = config.resolve_window(winsize);
            println!("Generating fingerprint for '{}'", audio.display());

            let fp = wavemark::fingerprint::fingerprint_file(&audio, window_size)
                .with_context(|| format!("Failed to fingerprint {}", audio.display()))?;
            codec::save(&fp, &output)
                .with_context(|| format!("Failed to write {}", output.display()))?;

            println!(
                "Fingerprint saved to '{}' ({} key points)",
                output.display(),
                fp.points.len()
            );
        }

        Commands::Match { reference, sample, threshold, dump_histogram } => {
            let ref_fp = codec::load(&reference)
                .with_context(|| format!("Failed to load {}", reference.display()))?;
            let sample_fp = codec::load(&sample)
                .with_context(|| format!("Failed to load {}", sample.display()))?;

            println!("Comparing:");
            println!("   Reference: {} ({} keypoints)", reference.display(), ref_fp.points.len());
            println!("   Sample:    {} ({} keypoints)", sample.display(), sample_fp.points.len());

            let mut index = InvertedIndex::default();
            index.insert(&ref_fp);

            let histogram = matcher::vote(&sample_fp.points, &index);
            let (score, offset_sec) = match matcher::best_candidate(&histogram) {
                Some((_, bin, smoothed)) => (smoothed, bin as f64 / 10.0),
                None => (0, 0.0),
            };

            println!();
            println!("Analysis results:");
            println!("   Maximum score:    {} matches", score);
            println!("   Estimated offset: {:.1} seconds", offset_sec);
            println!();

            if score > threshold {
                println!("Match detected!");
                println!(
                    "The sample appears to be a fragment of the reference audio, starting at second {:.1}",
                    offset_sec
                );
            } else {
                println!("Sample did not match the reference");
            }

            if dump_histogram {
                let bins = matcher::histogram_bins(&histogram);
                let path = PathBuf::from("debug_hist.json");
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                serde_json::to_writer_pretty(file, &bins)?;
                println!("(debug) Histogram saved to '{}'", path.display());
            }
        }

        Commands::Identify { index_dir, input, winsize, csv, jobs } => {
            let window_size = config.resolve_window(winsize);

            println!("Indexing fingerprint directory: '{}'", index_dir.display());
            let index = InvertedIndex::load_directory(&index_dir)
                .context("Failed to build index")?;
            println!("Indexed {} songs ({} postings)", index.song_count(), index.len());

            let meta = std::fs::metadata(&input)
                .with_context(|| format!("Cannot access {}", input.display()))?;

            if meta.is_dir() {
                let workers = config.resolve_workers(jobs);
                let summary = wavemark::batch::identify_directory(
                    &input,
                    Arc::new(index),
                    window_size,
                    workers,
                    &csv,
                )
                .context("Batch identification failed")?;
                println!();
                println!(
                    "Processed {} files: {} matched, {} no match, {} errors",
                    summary.processed, summary.matched, summary.unmatched, summary.errors
                );
                println!("Report saved to: {}", csv.display());
            } else {
                println!("Analyzing: {}", input.display());
                let result = wavemark::batch::identify_file(&input, &index, window_size);

                println!();
                println!("Results:");
                println!("   Match:      {}", result.best_match.as_deref().unwrap_or("None"));
                println!("   Offset:     {:.1}s", result.offset_sec);
                println!("   Score:      {} / {} points", result.score, result.total_points);
                println!("   Confidence: {:.2}%", result.confidence);
                println!();

                if result.is_match() {
                    println!("Verdict: match found");
                } else {
                    println!("Verdict: no match (low confidence)");
                }
            }
        }

        Commands::Fpdir { input_dir, output, winsize } => {
            let window_size = config.resolve_window(winsize);
            let summary =
                wavemark::batch::fingerprint_directory(&input_dir, &output, window_size)
                    .context("Directory fingerprinting failed")?;
            println!(
                "Fingerprinting complete: {} written, {} skipped, {} errors",
                summary.written, summary.skipped, summary.errors
            );
        }
    }

    Ok(())
}
