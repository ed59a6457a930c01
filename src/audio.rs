//! WAV decoding.
//!
//! Thin wrapper over `hound` that yields normalized f64 samples split per
//! channel. The rest of the pipeline only ever consumes channel 0.

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("WAV decode error: {0}")]
    Wav(#[from] hound::Error),
    #[error("file has no audio channels")]
    NoChannels,
}

/// Decoded PCM audio: one `Vec<f64>` per channel, samples in [-1, 1].
#[derive(Debug, Clone)]
pub struct AudioData {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f64>>,
}

impl AudioData {
    /// The channel the pipeline analyzes.
    pub fn primary(&self) -> &[f64] {
        &self.channels[0]
    }

    pub fn duration_secs(&self) -> f64 {
        self.channels[0].len() as f64 / self.sample_rate as f64
    }
}

/// Read a PCM WAV file and normalize integer samples by `2^(bits-1)`.
/// Float-encoded files are passed through as-is.
pub fn read_wav(path: &Path) -> Result<AudioData, DecodeError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let num_channels = spec.channels as usize;
    if num_channels == 0 {
        return Err(DecodeError::NoChannels);
    }

    let interleaved: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let scale = 2f64.powi(spec.bits_per_sample as i32 - 1);
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f64 / scale))
                .collect::<Result<_, _>>()?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<Result<_, _>>()?,
    };

    let samples_per_channel = interleaved.len() / num_channels;
    let mut channels = vec![Vec::with_capacity(samples_per_channel); num_channels];
    for (i, sample) in interleaved.into_iter().enumerate() {
        channels[i % num_channels].push(sample);
    }

    log::debug!(
        "Decoded {}: {} Hz, {} channels, {} samples/channel",
        path.display(),
        spec.sample_rate,
        num_channels,
        samples_per_channel
    );

    Ok(AudioData {
        sample_rate: spec.sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, spec: hound::WavSpec, samples: &[i16]) {
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn decodes_and_normalizes_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        write_wav(&path, spec, &[0, 16_384, -16_384, i16::MAX]);

        let audio = read_wav(&path).unwrap();
        assert_eq!(audio.sample_rate, 44_100);
        assert_eq!(audio.channels.len(), 1);
        assert_eq!(audio.primary().len(), 4);
        assert!((audio.primary()[1] - 0.5).abs() < 1e-9);
        assert!((audio.primary()[2] + 0.5).abs() < 1e-9);
        assert!(audio.primary()[3] < 1.0);
    }

    #[test]
    fn deinterleaves_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        // left ramps up, right stays at zero
        write_wav(&path, spec, &[100, 0, 200, 0, 300, 0]);

        let audio = read_wav(&path).unwrap();
        assert_eq!(audio.channels.len(), 2);
        assert_eq!(audio.primary().len(), 3);
        assert!(audio.primary()[0] < audio.primary()[1]);
        assert!(audio.channels[1].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_audio.wav");
        std::fs::write(&path, b"definitely not a wav").unwrap();
        assert!(read_wav(&path).is_err());
    }
}
