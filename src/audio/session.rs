//! Capture session: one in-progress recording
//!
//! Owns the audio source for the duration of a recording, feeds the live
//! level meter from the streaming chunks, and finalizes everything into a
//! single immutable buffer on stop. A stream error mid-capture degrades to
//! a truncated buffer; partial audio is never discarded.

use super::{AudioBuffer, AudioSource, SourceKind};
use crate::error::AudioError;
use crate::events::{CaptureTarget, EventEmitter, LifecycleEvent};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Minimum spacing between RecordingLevel events (≈20/s ceiling)
const LEVEL_INTERVAL: Duration = Duration::from_millis(50);

pub struct CaptureSession {
    source: Box<dyn AudioSource>,
    target: CaptureTarget,
    sample_rate: u32,
    started: Instant,
    level_task: Option<tokio::task::JoinHandle<()>>,
}

impl CaptureSession {
    /// Open the source and start recording.
    pub async fn begin(
        mut source: Box<dyn AudioSource>,
        target: CaptureTarget,
        sample_rate: u32,
        emitter: EventEmitter,
    ) -> Result<Self, AudioError> {
        let frames = source.start().await?;
        let level_task = tokio::spawn(level_loop(frames, target, emitter));

        Ok(Self {
            source,
            target,
            sample_rate,
            started: Instant::now(),
            level_task: Some(level_task),
        })
    }

    pub fn target(&self) -> CaptureTarget {
        self.target
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Stop the source and build the final buffer.
    pub async fn finalize(mut self) -> Result<AudioBuffer, AudioError> {
        let capture = self.source.stop().await?;

        if let Some(task) = self.level_task.take() {
            task.abort();
        }

        if capture.truncated {
            tracing::warn!(
                "Capture stream errored mid-recording; keeping {} partial samples",
                capture.samples.len()
            );
        }

        Ok(AudioBuffer::new(
            capture.samples,
            self.sample_rate,
            SourceKind::from(self.target),
            capture.truncated,
        ))
    }
}

/// Drain streaming chunks and emit throttled level events.
async fn level_loop(
    mut frames: mpsc::Receiver<Vec<f32>>,
    target: CaptureTarget,
    emitter: EventEmitter,
) {
    let mut last_emit = Instant::now() - LEVEL_INTERVAL;
    let mut window: Vec<f32> = Vec::new();

    while let Some(chunk) = frames.recv().await {
        window.extend_from_slice(&chunk);

        if last_emit.elapsed() >= LEVEL_INTERVAL {
            let rms = super::rms(&window);
            emitter.emit(LifecycleEvent::RecordingLevel { target, rms });
            window.clear();
            last_emit = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Capture;
    use crate::events;

    /// Scripted source for session tests
    struct ScriptedSource {
        chunks: Vec<Vec<f32>>,
        truncated: bool,
        fail_start: bool,
    }

    #[async_trait::async_trait]
    impl AudioSource for ScriptedSource {
        async fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>, AudioError> {
            if self.fail_start {
                return Err(AudioError::DeviceNotFound("scripted".to_string()));
            }
            let (tx, rx) = mpsc::channel(16);
            for chunk in &self.chunks {
                let _ = tx.try_send(chunk.clone());
            }
            Ok(rx)
        }

        async fn stop(&mut self) -> Result<Capture, AudioError> {
            Ok(Capture {
                samples: self.chunks.concat(),
                truncated: self.truncated,
            })
        }
    }

    #[tokio::test]
    async fn test_session_finalizes_buffer() {
        let (emitter, _rx) = events::channel(64);
        let source = Box::new(ScriptedSource {
            chunks: vec![vec![0.1; 800], vec![0.2; 800]],
            truncated: false,
            fail_start: false,
        });

        let session = CaptureSession::begin(source, CaptureTarget::Microphone, 16000, emitter)
            .await
            .unwrap();
        let buffer = session.finalize().await.unwrap();

        assert_eq!(buffer.samples.len(), 1600);
        assert_eq!(buffer.sample_rate, 16000);
        assert_eq!(buffer.source, SourceKind::Microphone);
        assert!(!buffer.truncated);
    }

    #[tokio::test]
    async fn test_stream_error_yields_truncated_buffer() {
        let (emitter, _rx) = events::channel(64);
        let source = Box::new(ScriptedSource {
            chunks: vec![vec![0.1; 400]],
            truncated: true,
            fail_start: false,
        });

        let session = CaptureSession::begin(source, CaptureTarget::SystemAudio, 16000, emitter)
            .await
            .unwrap();
        let buffer = session.finalize().await.unwrap();

        // Partial audio is kept and flagged, not dropped
        assert_eq!(buffer.samples.len(), 400);
        assert!(buffer.truncated);
        assert_eq!(buffer.source, SourceKind::Loopback);
    }

    #[tokio::test]
    async fn test_failed_start_propagates() {
        let (emitter, _rx) = events::channel(64);
        let source = Box::new(ScriptedSource {
            chunks: vec![],
            truncated: false,
            fail_start: true,
        });

        let result =
            CaptureSession::begin(source, CaptureTarget::Microphone, 16000, emitter).await;
        assert!(matches!(result, Err(AudioError::DeviceNotFound(_))));
    }

    #[tokio::test]
    async fn test_level_events_emitted() {
        let (emitter, mut rx) = events::channel(64);
        let source = Box::new(ScriptedSource {
            chunks: vec![vec![0.5; 1600]],
            truncated: false,
            fail_start: false,
        });

        let session = CaptureSession::begin(source, CaptureTarget::Microphone, 16000, emitter)
            .await
            .unwrap();

        // Give the level task a moment to drain the chunk
        tokio::time::sleep(Duration::from_millis(120)).await;
        session.finalize().await.unwrap();

        let mut saw_level = false;
        while let Ok(event) = rx.try_recv() {
            if let LifecycleEvent::RecordingLevel { rms, .. } = event {
                assert!(rms > 0.4 && rms < 0.6);
                saw_level = true;
            }
        }
        assert!(saw_level);
    }
}
