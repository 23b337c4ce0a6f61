//! Remote speech-to-text transcription via OpenAI-compatible API
//!
//! Sends one multipart POST per accepted recording to
//! `{api_url}{api_endpoint}`, enabling a GPU server to do the heavy
//! lifting. A response whose transcript field is empty is an empty result,
//! not an error; connection failures and non-2xx statuses are.

use super::{Transcriber, Transcript};
use crate::audio::AudioBuffer;
use crate::config::Config;
use crate::error::TranscribeError;
use std::io::Cursor;
use std::time::Duration;

/// Remote transcriber using an OpenAI-compatible transcription endpoint
#[derive(Debug)]
pub struct RemoteTranscriber {
    /// Full request URL ({api_url}{api_endpoint})
    url: String,
    /// Model name to send to the server
    model: String,
    /// Language hint; None when auto-detecting
    language: Option<String>,
    /// Request timeout
    timeout: Duration,
}

impl RemoteTranscriber {
    /// Create a new remote transcriber from config
    pub fn new(config: &Config) -> Result<Self, TranscribeError> {
        let base = config.api_url.trim();
        if base.is_empty() {
            return Err(TranscribeError::ConfigError(
                "api_url is required when whisper_backend = 'api'".into(),
            ));
        }
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(TranscribeError::ConfigError(format!(
                "api_url must start with http:// or https://, got: {}",
                base
            )));
        }

        if base.starts_with("http://")
            && !base.contains("localhost")
            && !base.contains("127.0.0.1")
            && !base.contains("[::1]")
        {
            tracing::warn!(
                "Remote endpoint uses HTTP without TLS. Audio data will be transmitted unencrypted!"
            );
        }

        let url = format!(
            "{}/{}",
            base.trim_end_matches('/'),
            config.api_endpoint.trim_start_matches('/')
        );

        let model = match config.model.trim() {
            "" => "whisper-1".to_string(),
            m => m.to_string(),
        };

        let language = match config.language.trim() {
            "" | "auto" => None,
            lang => Some(lang.to_string()),
        };

        let timeout = Duration::from_secs(config.api_timeout_secs.max(1));

        tracing::info!(
            "Configured remote transcriber: url={}, model={}, timeout={}s",
            url,
            model,
            timeout.as_secs()
        );

        Ok(Self {
            url,
            model,
            language,
            timeout,
        })
    }

    /// Encode f32 samples to 16-bit PCM WAV
    fn encode_wav(&self, buffer: &AudioBuffer) -> Result<Vec<u8>, TranscribeError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: buffer.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut out = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut out, spec).map_err(|e| {
            TranscribeError::AudioFormat(format!("Failed to create WAV writer: {}", e))
        })?;

        for &sample in &buffer.samples {
            let clamped = sample.clamp(-1.0, 1.0);
            let scaled = (clamped * i16::MAX as f32) as i16;
            writer.write_sample(scaled).map_err(|e| {
                TranscribeError::AudioFormat(format!("Failed to write sample: {}", e))
            })?;
        }

        writer
            .finalize()
            .map_err(|e| TranscribeError::AudioFormat(format!("Failed to finalize WAV: {}", e)))?;

        Ok(out.into_inner())
    }

    /// Build the multipart form body for the API request
    fn build_multipart_body(&self, wav_data: &[u8]) -> (String, Vec<u8>) {
        let boundary = format!(
            "----TalktypeBoundary{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );

        let mut body = Vec::new();

        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"file\"; filename=\"recording.wav\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: audio/wav\r\n\r\n");
        body.extend_from_slice(wav_data);
        body.extend_from_slice(b"\r\n");

        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"model\"\r\n\r\n");
        body.extend_from_slice(self.model.as_bytes());
        body.extend_from_slice(b"\r\n");

        if let Some(ref language) = self.language {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            body.extend_from_slice(b"Content-Disposition: form-data; name=\"language\"\r\n\r\n");
            body.extend_from_slice(language.as_bytes());
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"response_format\"\r\n\r\n");
        body.extend_from_slice(b"json\r\n");

        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        (boundary, body)
    }
}

impl Transcriber for RemoteTranscriber {
    fn transcribe(&self, buffer: &AudioBuffer) -> Result<Transcript, TranscribeError> {
        if buffer.is_empty() {
            return Err(TranscribeError::AudioFormat("Empty audio buffer".into()));
        }

        tracing::debug!(
            "Sending {:.2}s of audio to {} ({} samples)",
            buffer.duration().as_secs_f32(),
            self.url,
            buffer.samples.len()
        );

        let start = std::time::Instant::now();

        let wav_data = self.encode_wav(buffer)?;
        let (boundary, body) = self.build_multipart_body(&wav_data);

        let request = ureq::post(&self.url).timeout(self.timeout).set(
            "Content-Type",
            &format!("multipart/form-data; boundary={}", boundary),
        );

        let response = request.send_bytes(&body).map_err(|e| match e {
            ureq::Error::Status(code, resp) => {
                let body = resp.into_string().unwrap_or_default();
                TranscribeError::RemoteError(format!("Server returned {}: {}", code, body))
            }
            ureq::Error::Transport(t) => {
                let msg = t.to_string();
                if msg.contains("timed out") || msg.contains("timeout") {
                    TranscribeError::Timeout(self.timeout.as_secs())
                } else {
                    TranscribeError::Network(msg)
                }
            }
        })?;

        let raw = response
            .into_string()
            .map_err(|e| TranscribeError::RemoteError(format!("Failed to read response: {}", e)))?;

        let text = extract_text(&raw);

        tracing::info!(
            "Remote transcription completed in {:.2}s",
            start.elapsed().as_secs_f32()
        );

        Ok(Transcript::from_raw(text))
    }
}

/// Pull the transcript out of a server response.
///
/// Servers in the wild answer with `{"text": ...}`, `{"transcript": ...}`,
/// `{"transcription": ...}`, a bare JSON string, or plain text.
fn extract_text(raw: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) else {
        return raw.trim().to_string();
    };

    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Object(map) => {
            for key in ["text", "transcript", "transcription"] {
                if let Some(field) = map.get(key) {
                    return match field {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                }
            }
            tracing::warn!("Response has no transcript field: {:?}", map.keys());
            String::new()
        }
        other => other.to_string(),
    }
}
