//! Parakeet-based speech-to-text transcription
//!
//! Uses NVIDIA's Parakeet TDT models via the parakeet-rs crate. Only
//! compiled with the `parakeet` feature; the factory reports a config
//! error when a parakeet-* model is selected in a build without it.

use super::{Transcriber, Transcript};
use crate::audio::AudioBuffer;
use crate::config::{Config, ModelDevice};
use crate::error::TranscribeError;
#[cfg(feature = "parakeet-cuda")]
use parakeet_rs::ExecutionProvider;
use parakeet_rs::{ExecutionConfig, ParakeetTDT, Transcriber as ParakeetTranscriberTrait};
use std::path::PathBuf;
use std::sync::Mutex;

/// Sample rate the TDT models are trained on
const PARAKEET_SAMPLE_RATE: u32 = 16000;

/// Parakeet-based transcriber using ONNX Runtime
pub struct ParakeetTranscriber {
    /// TDT model instance; transcription needs &mut, hence the mutex
    model: Mutex<ParakeetTDT>,
}

impl ParakeetTranscriber {
    /// Load the configured Parakeet model directory.
    pub fn new(config: &Config) -> Result<Self, TranscribeError> {
        let model_path = resolve_model_path(&config.model)?;

        tracing::info!("Loading Parakeet model from {:?}", model_path);
        let start = std::time::Instant::now();

        let exec_config = build_execution_config(config.model_device);

        let model = ParakeetTDT::from_pretrained(&model_path, exec_config)
            .map_err(|e| TranscribeError::InitFailed(format!("Parakeet init failed: {}", e)))?;

        tracing::info!(
            "Parakeet model loaded in {:.2}s",
            start.elapsed().as_secs_f32()
        );

        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl Transcriber for ParakeetTranscriber {
    fn transcribe(&self, buffer: &AudioBuffer) -> Result<Transcript, TranscribeError> {
        if buffer.is_empty() {
            return Err(TranscribeError::AudioFormat(
                "Empty audio buffer".to_string(),
            ));
        }

        let samples = if buffer.sample_rate == PARAKEET_SAMPLE_RATE {
            buffer.samples.clone()
        } else {
            crate::audio::resample(&buffer.samples, buffer.sample_rate, PARAKEET_SAMPLE_RATE)
        };

        tracing::debug!(
            "Transcribing {:.2}s of audio ({} samples) with Parakeet",
            samples.len() as f32 / PARAKEET_SAMPLE_RATE as f32,
            samples.len()
        );

        let start = std::time::Instant::now();

        let mut model = self.model.lock().map_err(|e| {
            TranscribeError::InferenceFailed(format!("Failed to lock Parakeet mutex: {}", e))
        })?;

        let result = model
            .transcribe_samples(samples, 16000, 1, None)
            .map_err(|e| {
                TranscribeError::InferenceFailed(format!("Parakeet inference failed: {}", e))
            })?;

        tracing::info!(
            "Parakeet transcription completed in {:.2}s",
            start.elapsed().as_secs_f32()
        );

        Ok(Transcript::from_raw(result.text))
    }
}

/// Pick the execution provider from the configured device and build features
fn build_execution_config(device: ModelDevice) -> Option<ExecutionConfig> {
    #[cfg(feature = "parakeet-cuda")]
    {
        if device == ModelDevice::Gpu {
            tracing::info!("Configuring CUDA execution provider for Parakeet");
            return Some(ExecutionConfig::new().with_execution_provider(ExecutionProvider::Cuda));
        }
    }

    if device == ModelDevice::Gpu {
        tracing::warn!(
            "model_device = 'gpu' but this build has no Parakeet GPU provider; using CPU"
        );
    }
    None
}

/// Resolve a parakeet model id to its directory
fn resolve_model_path(model: &str) -> Result<PathBuf, TranscribeError> {
    let path = PathBuf::from(model);
    if path.is_absolute() && path.exists() {
        return Ok(path);
    }

    let models_dir = Config::models_dir();
    let model_path = models_dir.join(model);
    if model_path.exists() {
        return Ok(model_path);
    }

    let local_models_path = PathBuf::from("models").join(model);
    if local_models_path.exists() {
        return Ok(local_models_path);
    }

    Err(TranscribeError::ModelNotFound(format!(
        "Parakeet model '{}' not found. Looked in:\n  - {}\n  - {}\n\n\
         Download: https://huggingface.co/istupakov/parakeet-tdt-0.6b-v3-onnx",
        model,
        model_path.display(),
        local_models_path.display()
    )))
}
