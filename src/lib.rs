pub mod audio;
pub mod batch;
pub mod config;
pub mod fingerprint;
pub mod index;
pub mod matcher;
pub mod signal;

/// Application name for XDG paths
pub const APP_NAME: &str = "wavemark";

/// Default FFT window size for fingerprinting
pub const DEFAULT_WINDOW_SIZE: usize = 2048;
