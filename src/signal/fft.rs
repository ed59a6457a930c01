use num_complex::Complex;
use std::f64::consts::PI;

/// Subproblems larger than this are split across rayon tasks. A single
/// fingerprint frame (2048 points) stays just above the threshold, so the
/// top level of each frame's transform forks once and the rest runs
/// sequentially.
pub const PARALLEL_THRESHOLD: usize = 1024;

/// Forward DFT of a power-of-two-length sequence, sign convention
/// `X[k] = sum x[n] * exp(-2*pi*i*k*n / N)`. The input is not mutated.
///
/// Radix-2 decimation-in-time Cooley-Tukey. Above `PARALLEL_THRESHOLD`
/// the even half is handed to a sibling rayon task while the odd half
/// runs on the current one.
///
/// A non-power-of-two length is a caller bug, checked in debug builds.
pub fn fft(input: &[Complex<f64>]) -> Vec<Complex<f64>> {
    debug_assert!(
        input.len().is_power_of_two(),
        "fft length must be a power of two, got {}",
        input.len()
    );

    if input.len() <= PARALLEL_THRESHOLD {
        return fft_sequential(input);
    }

    let (even, odd) = split_even_odd(input);
    let (even_fft, odd_fft) = rayon::join(|| fft(&even), || fft(&odd));
    combine(&even_fft, &odd_fft)
}

fn fft_sequential(input: &[Complex<f64>]) -> Vec<Complex<f64>> {
    if input.len() == 1 {
        return input.to_vec();
    }

    let (even, odd) = split_even_odd(input);
    let even_fft = fft_sequential(&even);
    let odd_fft = fft_sequential(&odd);
    combine(&even_fft, &odd_fft)
}

fn split_even_odd(input: &[Complex<f64>]) -> (Vec<Complex<f64>>, Vec<Complex<f64>>) {
    let half = input.len() / 2;
    let mut even = Vec::with_capacity(half);
    let mut odd = Vec::with_capacity(half);
    for pair in input.chunks_exact(2) {
        even.push(pair[0]);
        odd.push(pair[1]);
    }
    (even, odd)
}

/// Butterfly: merge the transforms of the even- and odd-indexed halves.
fn combine(even_fft: &[Complex<f64>], odd_fft: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let half = even_fft.len();
    let n = half * 2;
    let mut result = vec![Complex::new(0.0, 0.0); n];

    for k in 0..half {
        let rotation = -2.0 * PI * k as f64 / n as f64;
        let w = Complex::from_polar(1.0, rotation);
        let t = w * odd_fft[k];
        result[k] = even_fft[k] + t;
        result[k + half] = even_fft[k] - t;
    }

    result
}
