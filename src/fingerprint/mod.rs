//! Landmark types and extraction.
//!
//! A fingerprint is the constellation of a recording: per frame, the
//! strongest spectral bin of each frequency band that rises above the
//! silence floor.

pub mod codec;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::audio::{self, DecodeError};
use crate::signal::spectrum;

/// Below this level a band is considered silent and emits no landmark.
pub const SILENCE_FLOOR_DB: f64 = -50.0;

/// A frequency band landmarks are picked from. Bands are half-open on the
/// upper edge except the last.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub min_hz: f64,
    pub max_hz: f64,
}

/// The fixed band partition. One landmark per band per loud frame,
/// regardless of spectral tilt.
pub const BANDS: [Band; 4] = [
    Band { min_hz: 40.0, max_hz: 300.0 },
    Band { min_hz: 300.0, max_hz: 2000.0 },
    Band { min_hz: 2000.0, max_hz: 5000.0 },
    Band { min_hz: 5000.0, max_hz: 10_000.0 },
];

/// One landmark: time in seconds (3 decimals), frequency in Hz (whole),
/// magnitude in dB (2 decimals). The rounding is part of the on-disk
/// format and must stay bit-exact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    #[serde(rename = "t")]
    pub time_sec: f64,
    #[serde(rename = "f")]
    pub freq_hz: f64,
    #[serde(rename = "m")]
    pub mag_db: f64,
}

/// A named landmark set, the unit of persistence. An empty `points` list
/// signals a failed or empty input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub filename: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub sample_rate: u32,
    pub points: Vec<KeyPoint>,
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Pick the landmarks of one frame: within each band, the bin with the
/// highest `20*log10(magnitude)`, kept only above the silence floor.
/// Yields 0 to 4 points.
pub fn landmarks(
    magnitudes: &[f64],
    sample_rate: u32,
    window_size: usize,
    time_sec: f64,
) -> Vec<KeyPoint> {
    let mut points = Vec::new();
    if magnitudes.is_empty() {
        return points;
    }

    for band in &BANDS {
        let start_bin = (band.min_hz * window_size as f64 / sample_rate as f64) as usize;
        let end_bin =
            ((band.max_hz * window_size as f64 / sample_rate as f64) as usize).min(magnitudes.len() - 1);

        let mut max_db = -999.0;
        let mut max_idx = None;
        for (k, &mag) in magnitudes.iter().enumerate().take(end_bin + 1).skip(start_bin) {
            let mag_db = 20.0 * mag.log10();
            if mag_db > max_db {
                max_db = mag_db;
                max_idx = Some(k);
            }
        }

        if let Some(idx) = max_idx {
            if max_db > SILENCE_FLOOR_DB {
                let freq = idx as f64 * sample_rate as f64 / window_size as f64;
                points.push(KeyPoint {
                    time_sec: round_to(time_sec, 3),
                    freq_hz: freq.round(),
                    mag_db: round_to(max_db, 2),
                });
            }
        }
    }

    points
}

/// Run the whole extraction pipeline over a PCM buffer.
pub fn extract_points(samples: &[f64], sample_rate: u32, window_size: usize) -> Vec<KeyPoint> {
    spectrum::spectra(samples, sample_rate, window_size)
        .flat_map(|frame| landmarks(&frame.magnitudes, sample_rate, window_size, frame.time_sec))
        .collect()
}

/// Decode a WAV file and fingerprint its first channel. The song id is the
/// file stem.
pub fn fingerprint_file(
    path: &Path,
    window_size: usize,
) -> Result<Fingerprint, DecodeError> {
    let audio = audio::read_wav(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let points = extract_points(audio.primary(), audio.sample_rate, window_size);
    log::info!("{}: {} landmarks", path.display(), points.len());

    Ok(Fingerprint {
        filename: name,
        duration: audio.duration_secs(),
        sample_rate: audio.sample_rate,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const RATE: u32 = 44_100;
    const WINDOW: usize = 2048;

    fn sine(freq: f64, secs: f64, amplitude: f64) -> Vec<f64> {
        let n = (RATE as f64 * secs) as usize;
        (0..n)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / RATE as f64).sin())
            .collect()
    }

    fn band_of(freq: f64) -> Option<usize> {
        BANDS.iter().position(|b| freq >= b.min_hz && freq <= b.max_hz)
    }

    #[test]
    fn sine_440_lands_on_bin_431_every_frame() {
        let samples = sine(440.0, 2.0, 0.9);
        let points = extract_points(&samples, RATE, WINDOW);

        // one band-2 landmark per frame, 85 frames for 2 s at 50% overlap
        assert_eq!(points.len(), 85);
        for p in &points {
            assert_eq!(p.freq_hz, 431.0, "off-bin landmark at t={}", p.time_sec);
            assert!(p.mag_db > -10.0, "weak landmark: {} dB", p.mag_db);
        }
    }

    #[test]
    fn silence_emits_nothing() {
        let samples = vec![0.0; RATE as usize];
        let points = extract_points(&samples, RATE, WINDOW);
        assert!(points.is_empty());
    }

    #[test]
    fn two_tones_hit_two_bands() {
        let a = sine(440.0, 1.0, 0.45);
        let b = sine(3000.0, 1.0, 0.45);
        let samples: Vec<f64> = a.iter().zip(&b).map(|(x, y)| x + y).collect();

        let points = extract_points(&samples, RATE, WINDOW);
        assert!(!points.is_empty());

        let frames = points.len() / 2;
        assert!(frames > 0);
        for pair in points.chunks(2) {
            assert_eq!(pair.len(), 2, "expected exactly two landmarks per frame");
            assert_eq!(band_of(pair[0].freq_hz), Some(1));
            assert_eq!(band_of(pair[1].freq_hz), Some(2));
        }
    }

    #[test]
    fn at_most_four_landmarks_per_frame_inside_bands() {
        // broadband-ish content: sum of tones in all four bands
        let tones = [100.0, 900.0, 3500.0, 8000.0];
        let mut samples = vec![0.0; RATE as usize];
        for freq in tones {
            for (i, s) in samples.iter_mut().enumerate() {
                *s += 0.2 * (2.0 * PI * freq * i as f64 / RATE as f64).sin();
            }
        }

        let mut by_time: std::collections::BTreeMap<u64, usize> = std::collections::BTreeMap::new();
        for p in extract_points(&samples, RATE, WINDOW) {
            assert!(band_of(p.freq_hz).is_some(), "landmark outside bands: {}", p.freq_hz);
            *by_time.entry((p.time_sec * 1000.0) as u64).or_default() += 1;
        }
        for (&t, &count) in &by_time {
            assert!(count <= 4, "{count} landmarks in frame at {t} ms");
        }
    }

    #[test]
    fn rounding_is_applied() {
        let samples = sine(440.0, 0.2, 0.9);
        for p in extract_points(&samples, RATE, WINDOW) {
            assert_eq!(p.time_sec, round_to(p.time_sec, 3));
            assert_eq!(p.freq_hz, p.freq_hz.round());
            assert_eq!(p.mag_db, round_to(p.mag_db, 2));
        }
    }

    #[test]
    fn quiet_signal_below_floor_is_dropped() {
        // -60 dB sine: below the -50 dB floor even at the peak bin
        let samples = sine(440.0, 0.5, 0.001);
        let points = extract_points(&samples, RATE, WINDOW);
        assert!(points.is_empty());
    }
}
