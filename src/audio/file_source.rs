//! File-backed audio source for test transcriptions
//!
//! Reads a pre-recorded .wav or .mp3 asset in full, synchronously, and
//! yields it as a single buffer. Backs the `talktype transcribe` command
//! and the settings UI's "Test transcription" action.

use super::{mix_to_mono, resample, AudioSource, Capture};
use crate::error::AudioError;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tokio::sync::mpsc;

pub struct FileSource {
    path: PathBuf,
    target_rate: u32,
    samples: Option<Vec<f32>>,
}

impl FileSource {
    pub fn new(path: PathBuf, target_rate: u32) -> Self {
        Self {
            path,
            target_rate,
            samples: None,
        }
    }

    fn decode(&self) -> Result<Vec<f32>, AudioError> {
        let ext = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "wav" => self.decode_wav(),
            "mp3" => self.decode_mp3(),
            _ => Err(AudioError::UnsupportedFile(self.path.display().to_string())),
        }
    }

    fn decode_wav(&self) -> Result<Vec<f32>, AudioError> {
        let mut reader = hound::WavReader::open(&self.path)
            .map_err(|e| AudioError::DecodeFailed(format!("{}: {}", self.path.display(), e)))?;
        let spec = reader.spec();

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| AudioError::DecodeFailed(e.to_string()))?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()
                    .map_err(|e| AudioError::DecodeFailed(e.to_string()))?
            }
        };

        let mono = mix_to_mono(&interleaved, spec.channels as usize);
        Ok(resample(&mono, spec.sample_rate, self.target_rate))
    }

    fn decode_mp3(&self) -> Result<Vec<f32>, AudioError> {
        use rodio::Source;

        let file = File::open(&self.path)
            .map_err(|e| AudioError::DecodeFailed(format!("{}: {}", self.path.display(), e)))?;
        let decoder = rodio::Decoder::new(BufReader::new(file))
            .map_err(|e| AudioError::DecodeFailed(e.to_string()))?;

        let channels = decoder.channels() as usize;
        let sample_rate = decoder.sample_rate();

        let interleaved: Vec<f32> = decoder.map(|s: i16| s as f32 / 32768.0).collect();
        let mono = mix_to_mono(&interleaved, channels);
        Ok(resample(&mono, sample_rate, self.target_rate))
    }
}

#[async_trait::async_trait]
impl AudioSource for FileSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>, AudioError> {
        let samples = self.decode()?;
        tracing::info!(
            "Loaded test audio: {} ({} samples, {:.2}s)",
            self.path.display(),
            samples.len(),
            samples.len() as f32 / self.target_rate as f32
        );

        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(samples.clone());
        self.samples = Some(samples);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<Capture, AudioError> {
        let samples = self.samples.take().unwrap_or_default();
        Ok(Capture {
            samples,
            truncated: false,
        })
    }
}
