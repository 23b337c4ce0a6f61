//! Audio capture module
//!
//! Provides the capture abstraction the dispatcher records through: live
//! cpal streams (microphone and system loopback) and pre-recorded files
//! for test transcriptions. All sources deliver f32 mono samples at the
//! configured rate.

pub mod cpal_source;
pub mod file_source;
pub mod session;

use crate::config::Config;
use crate::error::AudioError;
use crate::events::CaptureTarget;
use std::time::Duration;
use tokio::sync::mpsc;

/// Where a buffer's samples came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Microphone,
    Loopback,
    File,
}

impl From<CaptureTarget> for SourceKind {
    fn from(target: CaptureTarget) -> Self {
        match target {
            CaptureTarget::Microphone => SourceKind::Microphone,
            CaptureTarget::SystemAudio => SourceKind::Loopback,
        }
    }
}

/// A finalized recording, immutable once built.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// f32 samples in [-1, 1], mono
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub source: SourceKind,
    /// Set when the stream errored mid-capture and the tail is missing
    pub truncated: bool,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, source: SourceKind, truncated: bool) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
            source,
            truncated,
        }
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Full-buffer RMS on the f32 full-scale
    pub fn rms(&self) -> f32 {
        rms(&self.samples)
    }
}

/// What a source hands back when capture stops
#[derive(Debug)]
pub struct Capture {
    pub samples: Vec<f32>,
    /// The stream errored mid-capture; samples hold whatever was collected
    pub truncated: bool,
}

/// Trait for audio capture implementations
#[async_trait::async_trait]
pub trait AudioSource: Send + Sync {
    /// Start capturing audio.
    /// Returns a channel receiver for live chunks (f32 samples, mono,
    /// at the configured rate) used for level metering.
    async fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>, AudioError>;

    /// Stop capturing and return everything recorded so far
    async fn stop(&mut self) -> Result<Capture, AudioError>;
}

/// Creates sources on demand, one per capture session
pub trait SourceFactory: Send + Sync {
    fn open(&self, kind: SourceKind) -> Result<Box<dyn AudioSource>, AudioError>;
}

/// cpal/file-backed factory driven by the runtime configuration
pub struct CpalSourceFactory {
    config: Config,
}

impl CpalSourceFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl SourceFactory for CpalSourceFactory {
    fn open(&self, kind: SourceKind) -> Result<Box<dyn AudioSource>, AudioError> {
        match kind {
            SourceKind::Microphone => Ok(Box::new(cpal_source::CpalSource::microphone(
                &self.config.microphone,
                self.config.sample_rate,
            ))),
            SourceKind::Loopback => Ok(Box::new(cpal_source::CpalSource::loopback(
                &self.config.output_capture_source,
                self.config.sample_rate,
            ))),
            SourceKind::File => {
                if self.config.test_input_file.is_empty() {
                    return Err(AudioError::UnsupportedFile(
                        "no test_input_file configured".to_string(),
                    ));
                }
                Ok(Box::new(file_source::FileSource::new(
                    std::path::PathBuf::from(&self.config.test_input_file),
                    self.config.sample_rate,
                )))
            }
        }
    }
}

/// RMS of a sample slice on the f32 full-scale
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Linear interpolation resampling
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = (src_idx - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else {
            samples.get(idx).copied().unwrap_or(0.0)
        };

        output.push(sample);
    }

    output
}

/// Mix interleaved multi-channel frames down to mono
pub fn mix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
