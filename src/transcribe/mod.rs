//! Speech-to-text transcription module
//!
//! Provides transcription via:
//! - Local whisper.cpp inference (whisper-rs crate)
//! - Local Parakeet inference (parakeet-rs crate, `parakeet` feature)
//! - Remote OpenAI-compatible Whisper API
//!
//! Backends are interchangeable behind one trait; selection is driven by
//! `whisper_backend` and the model id. Loaded local models are kept warm in
//! a cache keyed by (model id, device) so switching models doesn't evict
//! what was already paid for.

#[cfg(feature = "parakeet")]
pub mod parakeet;
pub mod remote;
pub mod whisper;

use crate::audio::AudioBuffer;
use crate::config::{BackendMode, Config, ModelDevice};
use crate::error::TranscribeError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Outcome of a transcription call.
///
/// "No speech in the audio" is an expected result, not an error; backends
/// report it as `Empty` so the pipeline can tell it apart from failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcript {
    Text(String),
    Empty,
}

impl Transcript {
    /// Normalize raw backend text: whitespace-only output is Empty.
    pub fn from_raw(text: String) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Transcript::Empty
        } else {
            Transcript::Text(trimmed.to_string())
        }
    }
}

/// Trait for speech-to-text implementations
pub trait Transcriber: Send + Sync {
    /// Transcribe a finalized buffer (f32 samples, mono).
    fn transcribe(&self, buffer: &AudioBuffer) -> Result<Transcript, TranscribeError>;
}

/// Hands the dispatcher a ready transcriber for the current configuration.
///
/// The indirection keeps model loading off the control loop and lets tests
/// substitute stub backends.
pub trait TranscriberProvider: Send + Sync {
    fn acquire(&self) -> Result<Arc<dyn Transcriber>, TranscribeError>;
}

/// True when the model id selects the Parakeet family
pub fn is_parakeet_model(model: &str) -> bool {
    model.trim().starts_with("parakeet-")
}

/// Factory function to create a transcriber for the configured backend
pub fn create_transcriber(config: &Config) -> Result<Box<dyn Transcriber>, TranscribeError> {
    match config.whisper_backend {
        BackendMode::Api => {
            tracing::info!("Using remote transcription backend: {}", config.api_url);
            Ok(Box::new(remote::RemoteTranscriber::new(config)?))
        }
        BackendMode::Local => {
            if is_parakeet_model(&config.model) {
                create_parakeet(config)
            } else {
                tracing::info!(
                    "Using local whisper backend: model={}, device={:?}",
                    config.model,
                    config.model_device
                );
                Ok(Box::new(whisper::WhisperTranscriber::new(config)?))
            }
        }
    }
}

#[cfg(feature = "parakeet")]
fn create_parakeet(config: &Config) -> Result<Box<dyn Transcriber>, TranscribeError> {
    tracing::info!(
        "Using local parakeet backend: model={}, device={:?}",
        config.model,
        config.model_device
    );
    Ok(Box::new(parakeet::ParakeetTranscriber::new(config)?))
}

#[cfg(not(feature = "parakeet"))]
fn create_parakeet(config: &Config) -> Result<Box<dyn Transcriber>, TranscribeError> {
    Err(TranscribeError::ConfigError(format!(
        "Model '{}' requires the parakeet backend, but this build lacks the \
         'parakeet' feature. Rebuild with --features parakeet.",
        config.model
    )))
}

/// Cache key for warm models
fn cache_key(config: &Config) -> (String, ModelDevice) {
    match config.whisper_backend {
        // Remote transcribers are cheap, but caching one keeps the
        // endpoint/timeout validation to a single startup cost.
        BackendMode::Api => (
            format!("api:{}{}", config.api_url, config.api_endpoint),
            ModelDevice::Cpu,
        ),
        BackendMode::Local => (config.model.clone(), config.model_device),
    }
}

/// Warm-model cache keyed by (model id, device).
///
/// Loads lazily on first use. The mutex makes loading single-writer: a
/// model switch cannot race an in-flight load, and concurrent requests for
/// the same key load once. Entries survive switches, so flipping between
/// two models keeps both warm.
pub struct ModelCache {
    config: Config,
    entries: Mutex<HashMap<(String, ModelDevice), Arc<dyn Transcriber>>>,
}

impl ModelCache {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl TranscriberProvider for ModelCache {
    fn acquire(&self) -> Result<Arc<dyn Transcriber>, TranscribeError> {
        let key = cache_key(&self.config);

        let mut entries = self
            .entries
            .lock()
            .map_err(|_| TranscribeError::InitFailed("model cache poisoned".to_string()))?;

        if let Some(existing) = entries.get(&key) {
            return Ok(existing.clone());
        }

        tracing::info!("Loading transcriber for {:?}", key);
        let start = std::time::Instant::now();
        let transcriber: Arc<dyn Transcriber> = Arc::from(create_transcriber(&self.config)?);
        tracing::info!(
            "Transcriber ready in {:.2}s",
            start.elapsed().as_secs_f32()
        );

        entries.insert(key, transcriber.clone());
        Ok(transcriber)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_from_raw() {
        assert_eq!(
            Transcript::from_raw("  hello world \n".to_string()),
            Transcript::Text("hello world".to_string())
        );
        assert_eq!(Transcript::from_raw("   \n\t".to_string()), Transcript::Empty);
        assert_eq!(Transcript::from_raw(String::new()), Transcript::Empty);
    }

    #[test]
    fn test_is_parakeet_model() {
        assert!(is_parakeet_model("parakeet-tdt-0.6b-v3"));
        assert!(is_parakeet_model("  parakeet-ctc-0.6b"));
        assert!(!is_parakeet_model("whisper-base-en"));
        assert!(!is_parakeet_model(""));
    }

    #[test]
    fn test_cache_key_distinguishes_device() {
        let mut config = Config::default();
        config.model_device = ModelDevice::Cpu;
        let cpu_key = cache_key(&config);
        config.model_device = ModelDevice::Gpu;
        let gpu_key = cache_key(&config);
        assert_ne!(cpu_key, gpu_key);
    }

    #[test]
    fn test_cache_key_api_ignores_model_device() {
        let mut config = Config::default();
        config.whisper_backend = BackendMode::Api;
        config.model_device = ModelDevice::Cpu;
        let a = cache_key(&config);
        config.model_device = ModelDevice::Gpu;
        let b = cache_key(&config);
        assert_eq!(a, b);
    }

    #[test]
    #[cfg(not(feature = "parakeet"))]
    fn test_parakeet_model_without_feature_is_config_error() {
        let mut config = Config::default();
        config.model = "parakeet-tdt-0.6b-v3".to_string();
        let err = create_transcriber(&config).err().unwrap();
        assert!(matches!(err, TranscribeError::ConfigError(_)));
    }
}
