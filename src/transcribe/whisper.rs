//! Whisper-based speech-to-text transcription
//!
//! Uses whisper.cpp via the whisper-rs crate for fast, local transcription.
//! Inference expects 16kHz mono f32 samples; buffers captured at another
//! rate are resampled on the way in.

use super::{Transcriber, Transcript};
use crate::audio::AudioBuffer;
use crate::config::{Config, ModelDevice};
use crate::error::TranscribeError;
use std::path::PathBuf;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Sample rate whisper.cpp expects
const WHISPER_SAMPLE_RATE: u32 = 16000;

/// Whisper-based transcriber
pub struct WhisperTranscriber {
    /// Whisper context (holds the model)
    ctx: WhisperContext,
    /// Language hint, None for auto-detection
    language: Option<String>,
    /// Number of threads for inference
    threads: usize,
}

impl WhisperTranscriber {
    /// Load the configured model.
    pub fn new(config: &Config) -> Result<Self, TranscribeError> {
        let model_path = resolve_model_path(&config.model)?;

        tracing::info!("Loading whisper model from {:?}", model_path);
        let start = std::time::Instant::now();

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(config.model_device == ModelDevice::Gpu);

        let ctx = WhisperContext::new_with_params(
            model_path
                .to_str()
                .ok_or_else(|| TranscribeError::ModelNotFound("Invalid path".to_string()))?,
            ctx_params,
        )
        .map_err(|e| TranscribeError::InitFailed(e.to_string()))?;

        tracing::info!("Model loaded in {:.2}s", start.elapsed().as_secs_f32());

        let language = match config.language.trim() {
            "" | "auto" => None,
            lang => Some(lang.to_string()),
        };

        Ok(Self {
            ctx,
            language,
            threads: num_cpus::get().min(4),
        })
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, buffer: &AudioBuffer) -> Result<Transcript, TranscribeError> {
        if buffer.is_empty() {
            return Err(TranscribeError::AudioFormat("Empty audio buffer".to_string()));
        }

        let samples = if buffer.sample_rate == WHISPER_SAMPLE_RATE {
            buffer.samples.clone()
        } else {
            crate::audio::resample(&buffer.samples, buffer.sample_rate, WHISPER_SAMPLE_RATE)
        };

        let duration_secs = samples.len() as f32 / WHISPER_SAMPLE_RATE as f32;
        tracing::debug!(
            "Transcribing {:.2}s of audio ({} samples)",
            duration_secs,
            samples.len()
        );

        let start = std::time::Instant::now();

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| TranscribeError::InferenceFailed(e.to_string()))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(self.language.as_deref());
        params.set_n_threads(self.threads as i32);

        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        params.set_suppress_blank(true);
        params.set_suppress_nst(true);

        // Short dictation clips decode fastest as a single segment
        if duration_secs < 30.0 {
            params.set_single_segment(true);
        }

        state
            .full(params, &samples)
            .map_err(|e| TranscribeError::InferenceFailed(e.to_string()))?;

        let mut text = String::new();
        for segment in state.as_iter() {
            text.push_str(
                segment
                    .to_str()
                    .map_err(|e| TranscribeError::InferenceFailed(e.to_string()))?,
            );
        }

        let result = Transcript::from_raw(text);

        tracing::info!(
            "Transcription completed in {:.2}s",
            start.elapsed().as_secs_f32()
        );

        Ok(result)
    }
}

/// Resolve a model id to a ggml model file path.
///
/// Accepts the talktype "whisper-*" ids, bare whisper.cpp names
/// ("base.en"), and absolute/relative paths to .bin files.
fn resolve_model_path(model: &str) -> Result<PathBuf, TranscribeError> {
    let path = PathBuf::from(model);
    if path.is_absolute() && path.exists() {
        return Ok(path);
    }

    let model_filename = match ggml_filename(model) {
        Some(name) => name,
        None => {
            return Err(TranscribeError::ModelNotFound(format!(
                "Unknown model: '{}'. Valid models: whisper-tiny, whisper-base, \
                 whisper-small, whisper-medium, whisper-large-v3, whisper-turbo \
                 (plus -en variants), or a path to a ggml .bin file",
                model
            )));
        }
    };

    let models_dir = Config::models_dir();
    let model_path = models_dir.join(&model_filename);
    if model_path.exists() {
        return Ok(model_path);
    }

    let cwd_path = PathBuf::from(&model_filename);
    if cwd_path.exists() {
        return Ok(cwd_path);
    }

    let local_models_path = PathBuf::from("models").join(&model_filename);
    if local_models_path.exists() {
        return Ok(local_models_path);
    }

    Err(TranscribeError::ModelNotFound(format!(
        "Model '{}' not found. Looked in:\n  - {}\n  - {}\n  - {}\n\n\
         Download from: https://huggingface.co/ggerganov/whisper.cpp/tree/main",
        model,
        model_path.display(),
        cwd_path.display(),
        local_models_path.display()
    )))
}

/// Map a model id to its ggml filename
fn ggml_filename(model: &str) -> Option<String> {
    // "whisper-base-en" and "base.en" both resolve
    let short = model.strip_prefix("whisper-").unwrap_or(model);

    let name = match short {
        "tiny" => "ggml-tiny.bin",
        "tiny-en" | "tiny.en" => "ggml-tiny.en.bin",
        "base" => "ggml-base.bin",
        "base-en" | "base.en" => "ggml-base.en.bin",
        "small" => "ggml-small.bin",
        "small-en" | "small.en" => "ggml-small.en.bin",
        "medium" => "ggml-medium.bin",
        "medium-en" | "medium.en" => "ggml-medium.en.bin",
        "large" | "large-v2" => "ggml-large-v2.bin",
        "large-v1" => "ggml-large-v1.bin",
        "large-v3" => "ggml-large-v3.bin",
        "turbo" | "large-v3-turbo" => "ggml-large-v3-turbo.bin",
        other if other.ends_with(".bin") => other,
        _ => return None,
    };

    Some(name.to_string())
}
