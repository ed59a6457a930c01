//! Framing, windowing and magnitude extraction.
//!
//! Turns a PCM buffer into the sequence of half-overlapping magnitude
//! spectra the landmark extractor consumes.

use num_complex::Complex;
use std::f64::consts::PI;

use super::fft::fft;

/// One analysis frame: the magnitude spectrum of a Hann-windowed,
/// zero-padded window starting `time_sec` into the signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    pub time_sec: f64,
    pub magnitudes: Vec<f64>,
}

/// Multiply by the Hann window `0.5 * (1 - cos(2*pi*i / (N-1)))`.
pub fn hann_window(input: &[f64]) -> Vec<f64> {
    let n = input.len();
    input
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let factor = 0.5 * (1.0 - (2.0 * PI * i as f64 / (n - 1) as f64).cos());
            x * factor
        })
        .collect()
}

/// Embed real samples as complex values, zero-padded up to the next power
/// of two. A no-op pad when the length already is one.
pub fn pad_to_power_of_two(data: &[f64]) -> Vec<Complex<f64>> {
    let target = data.len().next_power_of_two();
    let mut padded = vec![Complex::new(0.0, 0.0); target];
    for (slot, &v) in padded.iter_mut().zip(data) {
        *slot = Complex::new(v, 0.0);
    }
    padded
}

/// Magnitudes of the meaningful half of a spectrum: `|X[k]| * 2 / N` for
/// the first `N/2` bins.
pub fn magnitudes(spectrum: &[Complex<f64>]) -> Vec<f64> {
    let n = spectrum.len();
    spectrum[..n / 2]
        .iter()
        .map(|x| x.norm() * 2.0 / n as f64)
        .collect()
}

/// Lazy sequence of windows `samples[i..i + window_size]` for
/// `i = 0, W/2, W, ...` while the window fits. The trailing partial
/// window is dropped; a buffer shorter than one window yields nothing.
pub fn frames(samples: &[f64], window_size: usize) -> impl Iterator<Item = (usize, &[f64])> {
    let hop = (window_size / 2).max(1);
    let last_start = if window_size == 0 {
        None
    } else {
        samples.len().checked_sub(window_size)
    };

    (0..)
        .map(move |k| k * hop)
        .take_while(move |&i| last_start.is_some_and(|last| i <= last))
        .map(move |i| (i, &samples[i..i + window_size]))
}

/// Drive the full frame pipeline: window, pad, FFT, magnitudes. Frames are
/// stamped with their start time `i / sample_rate`.
pub fn spectra(
    samples: &[f64],
    sample_rate: u32,
    window_size: usize,
) -> impl Iterator<Item = SpectrumFrame> + '_ {
    frames(samples, window_size).map(move |(start, chunk)| {
        let windowed = hann_window(chunk);
        let spectrum = fft(&pad_to_power_of_two(&windowed));
        SpectrumFrame {
            time_sec: start as f64 / sample_rate as f64,
            magnitudes: magnitudes(&spectrum),
        }
    })
}
