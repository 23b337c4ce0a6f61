//! Dispatcher - orchestrates one end-to-end request per capture
//!
//! A single control loop consumes capture commands from the hotkey hook,
//! drives the session lifecycle, runs the sensitivity gate, hands accepted
//! buffers to the backend on blocking workers, and routes fresh results to
//! the output sink. Every transition is narrated over the lifecycle event
//! stream.
//!
//! Supersession: each target carries a monotonically increasing request
//! sequence number. A backend completion whose id no longer matches the
//! target's latest id was superseded by a newer request and is discarded
//! silently; in-flight work is never force-cancelled.

use crate::audio::session::CaptureSession;
use crate::audio::{AudioBuffer, SourceFactory, SourceKind};
use crate::error::{AudioError, TranscribeError};
use crate::events::{CaptureTarget, ErrorKind, EventEmitter, LifecycleEvent};
use crate::gate::{GateDecision, SensitivityGate};
use crate::hotkey::controller::ActiveFlags;
use crate::hotkey::Command;
use crate::output::OutputSink;
use crate::text;
use crate::transcribe::{Transcript, TranscriberProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Commands consumed by the dispatcher control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineCommand {
    Capture(Command),
    Shutdown,
}

/// Backend completion routed back to the control loop
struct CompletedRequest {
    target: CaptureTarget,
    request_id: u64,
    outcome: Result<Transcript, TranscribeError>,
    latency: Duration,
}

#[derive(Default)]
struct TargetState {
    /// Latest allocated request id; completions with older ids are stale
    seq: u64,
    session: Option<CaptureSession>,
}

pub struct Dispatcher {
    gate: SensitivityGate,
    emitter: EventEmitter,
    sources: Arc<dyn SourceFactory>,
    backend: Arc<dyn TranscriberProvider>,
    sink: Arc<dyn OutputSink>,
    /// Shared with the hotkey controller for toggle decisions
    active: ActiveFlags,
    sample_rate: u32,
    max_duration: Duration,
    targets: HashMap<CaptureTarget, TargetState>,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gate: SensitivityGate,
        emitter: EventEmitter,
        sources: Arc<dyn SourceFactory>,
        backend: Arc<dyn TranscriberProvider>,
        sink: Arc<dyn OutputSink>,
        active: ActiveFlags,
        sample_rate: u32,
        max_duration: Duration,
    ) -> Self {
        Self {
            gate,
            emitter,
            sources,
            backend,
            sink,
            active,
            sample_rate,
            max_duration,
            targets: HashMap::new(),
        }
    }

    /// Run the control loop until a Shutdown command or channel close.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<PipelineCommand>) {
        let (result_tx, mut results) = mpsc::channel::<CompletedRequest>(16);
        let mut watchdog = tokio::time::interval(Duration::from_millis(250));
        watchdog.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = commands.recv() => {
                    match cmd {
                        Some(PipelineCommand::Capture(Command::StartCapture(target))) => {
                            self.start_capture(target).await;
                        }
                        Some(PipelineCommand::Capture(Command::StopCapture(target))) => {
                            self.stop_capture(target, &result_tx).await;
                        }
                        Some(PipelineCommand::Shutdown) | None => break,
                    }
                }

                done = results.recv() => {
                    if let Some(done) = done {
                        self.handle_completion(done);
                    }
                }

                _ = watchdog.tick() => {
                    self.enforce_max_duration(&result_tx).await;
                }
            }
        }

        // Abandon whatever is still recording; in-flight backend calls are
        // simply never delivered.
        for (target, state) in self.targets.iter_mut() {
            if let Some(session) = state.session.take() {
                tracing::info!("Shutdown with active {} capture, discarding", target);
                let _ = session.finalize().await;
            }
        }
        tracing::debug!("Dispatcher stopped");
    }

    /// Open a source and start recording. A start while the target already
    /// records is a no-op; two concurrent sessions per target cannot exist.
    async fn start_capture(&mut self, target: CaptureTarget) {
        let state = self.targets.entry(target).or_default();
        if state.session.is_some() {
            tracing::debug!("StartCapture for {} while already recording, ignored", target);
            return;
        }

        let source = match self.sources.open(SourceKind::from(target)) {
            Ok(source) => source,
            Err(e) => {
                tracing::error!("Failed to open {} source: {}", target, e);
                self.emitter.emit(LifecycleEvent::Error {
                    target,
                    kind: audio_error_kind(&e),
                    message: e.to_string(),
                });
                return;
            }
        };

        match CaptureSession::begin(source, target, self.sample_rate, self.emitter.clone()).await {
            Ok(session) => {
                tracing::info!("Recording started ({})", target);
                state.session = Some(session);
                self.active.set(target, true);
                self.emitter.emit(LifecycleEvent::RecordingStarted { target });
            }
            Err(e) => {
                tracing::error!("Failed to start {} capture: {}", target, e);
                self.emitter.emit(LifecycleEvent::Error {
                    target,
                    kind: audio_error_kind(&e),
                    message: e.to_string(),
                });
            }
        }
    }

    /// Finalize the session, gate the buffer, and kick off transcription.
    async fn stop_capture(
        &mut self,
        target: CaptureTarget,
        result_tx: &mpsc::Sender<CompletedRequest>,
    ) {
        let state = self.targets.entry(target).or_default();
        let Some(session) = state.session.take() else {
            tracing::debug!("StopCapture for {} while idle, ignored", target);
            return;
        };
        self.active.set(target, false);

        let buffer = match session.finalize().await {
            Ok(buffer) => buffer,
            Err(e) => {
                tracing::error!("Failed to finalize {} capture: {}", target, e);
                self.emitter.emit(LifecycleEvent::Error {
                    target,
                    kind: audio_error_kind(&e),
                    message: e.to_string(),
                });
                return;
            }
        };

        let duration = buffer.duration();
        tracing::info!("Recording stopped ({}, {:.1}s)", target, duration.as_secs_f32());
        self.emitter
            .emit(LifecycleEvent::RecordingStopped { target, duration });

        if buffer.is_empty() {
            tracing::warn!("Recording produced no audio");
            self.emitter.emit(LifecycleEvent::EmptyResult { target });
            return;
        }

        match self.gate.evaluate(&buffer) {
            GateDecision::Rejected { rms, threshold } => {
                self.emitter.emit(LifecycleEvent::SensitivityRejected {
                    target,
                    rms,
                    threshold,
                });
            }
            GateDecision::Accepted => {
                let state = self.targets.entry(target).or_default();
                state.seq += 1;
                let request_id = state.seq;
                self.emitter
                    .emit(LifecycleEvent::TranscribingStarted { target });
                self.spawn_transcription(target, request_id, buffer, result_tx.clone());
            }
        }
    }

    /// Run the backend call on a blocking worker so a slow model or network
    /// never delays the next hotkey press.
    fn spawn_transcription(
        &self,
        target: CaptureTarget,
        request_id: u64,
        buffer: AudioBuffer,
        result_tx: mpsc::Sender<CompletedRequest>,
    ) {
        let provider = self.backend.clone();
        let started = Instant::now();

        tokio::task::spawn_blocking(move || {
            let outcome = provider
                .acquire()
                .and_then(|transcriber| transcriber.transcribe(&buffer));
            let _ = result_tx.blocking_send(CompletedRequest {
                target,
                request_id,
                outcome,
                latency: started.elapsed(),
            });
        });
    }

    /// Route a backend completion: discard stale results, sanitize and
    /// deliver fresh ones.
    fn handle_completion(&mut self, done: CompletedRequest) {
        let state = self.targets.entry(done.target).or_default();
        if done.request_id != state.seq {
            tracing::debug!(
                "Discarding superseded result for {} (request {} < {})",
                done.target,
                done.request_id,
                state.seq
            );
            return;
        }

        let target = done.target;
        match done.outcome {
            Ok(Transcript::Text(raw)) => {
                let cleaned = text::sanitize(&raw);
                if cleaned.is_empty() {
                    tracing::debug!("Transcript sanitized to nothing");
                    self.emitter.emit(LifecycleEvent::EmptyResult { target });
                    return;
                }

                tracing::info!(
                    "Transcribed in {:.2}s: {:?}",
                    done.latency.as_secs_f32(),
                    preview(&cleaned)
                );
                self.emitter.emit(LifecycleEvent::Result {
                    target,
                    text: cleaned.clone(),
                    latency: done.latency,
                });
                self.deliver(target, cleaned);
            }
            Ok(Transcript::Empty) => {
                tracing::info!("Transcription was empty");
                self.emitter.emit(LifecycleEvent::EmptyResult { target });
            }
            Err(e) => {
                tracing::error!("Transcription failed: {}", e);
                self.emitter.emit(LifecycleEvent::Error {
                    target,
                    kind: transcribe_error_kind(&e),
                    message: e.to_string(),
                });
            }
        }
    }

    /// Best-effort delivery on a blocking worker; failures become events.
    fn deliver(&self, target: CaptureTarget, text: String) {
        let sink = self.sink.clone();
        let emitter = self.emitter.clone();

        tokio::task::spawn_blocking(move || {
            if let Err(e) = sink.deliver(&text) {
                tracing::error!("Output delivery via {} failed: {}", sink.name(), e);
                emitter.emit(LifecycleEvent::Error {
                    target,
                    kind: ErrorKind::OutputDeliveryFailure,
                    message: e.to_string(),
                });
            }
        });
    }

    /// Stop any recording that outlived the safety limit, running the
    /// normal stop path so captured audio still gets transcribed.
    async fn enforce_max_duration(&mut self, result_tx: &mpsc::Sender<CompletedRequest>) {
        let expired: Vec<CaptureTarget> = self
            .targets
            .iter()
            .filter_map(|(target, state)| {
                state
                    .session
                    .as_ref()
                    .filter(|s| s.elapsed() > self.max_duration)
                    .map(|_| *target)
            })
            .collect();

        for target in expired {
            tracing::warn!(
                "Recording timeout on {} ({:.0}s limit), stopping",
                target,
                self.max_duration.as_secs_f32()
            );
            self.stop_capture(target, result_tx).await;
        }
    }
}

fn audio_error_kind(e: &AudioError) -> ErrorKind {
    match e {
        AudioError::LoopbackUnsupported(_) => ErrorKind::LoopbackUnsupported,
        _ => ErrorKind::DeviceUnavailable,
    }
}

fn transcribe_error_kind(e: &TranscribeError) -> ErrorKind {
    match e {
        TranscribeError::Network(_) | TranscribeError::RemoteError(_) => ErrorKind::NetworkFailure,
        TranscribeError::Timeout(_) => ErrorKind::Timeout,
        _ => ErrorKind::TranscriptionFailed,
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > 50 {
        format!("{}...", text.chars().take(50).collect::<String>())
    } else {
        text.to_string()
    }
}
