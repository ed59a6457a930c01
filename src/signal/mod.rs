//! Time–frequency decomposition: FFT engine and frame pipeline.

pub mod fft;
pub mod spectrum;

pub use fft::fft;
pub use spectrum::{frames, hann_window, magnitudes, pad_to_power_of_two, spectra, SpectrumFrame};
