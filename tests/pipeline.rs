//! End-to-end pipeline tests with stub sources, backends, and sinks.
//!
//! These drive the dispatcher control loop exactly the way the hotkey hook
//! does, and assert the event-stream and delivery guarantees: one terminal
//! event per capture, gate behavior, supersession, and per-target
//! independence.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use talktype::audio::{AudioSource, Capture, SourceFactory, SourceKind};
use talktype::dispatch::{Dispatcher, PipelineCommand};
use talktype::error::{AudioError, OutputError, TranscribeError};
use talktype::events::{self, CaptureTarget, ErrorKind, LifecycleEvent};
use talktype::gate::SensitivityGate;
use talktype::hotkey::controller::ActiveFlags;
use talktype::hotkey::Command;
use talktype::output::OutputSink;
use talktype::transcribe::{Transcriber, TranscriberProvider, Transcript};

// ---------------------------------------------------------------------------
// Stubs

struct StubSource {
    samples: Vec<f32>,
    truncated: bool,
}

#[async_trait::async_trait]
impl AudioSource for StubSource {
    async fn start(&mut self) -> Result<tokio::sync::mpsc::Receiver<Vec<f32>>, AudioError> {
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        let _ = tx.try_send(self.samples.clone());
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<Capture, AudioError> {
        Ok(Capture {
            samples: self.samples.clone(),
            truncated: self.truncated,
        })
    }
}

struct StubFactory {
    mic_samples: Vec<f32>,
    loopback_samples: Vec<f32>,
    truncated: bool,
    fail_loopback: bool,
}

impl StubFactory {
    fn with_mic(samples: Vec<f32>) -> Self {
        Self {
            mic_samples: samples,
            loopback_samples: vec![0.3; 8000],
            truncated: false,
            fail_loopback: false,
        }
    }
}

impl SourceFactory for StubFactory {
    fn open(&self, kind: SourceKind) -> Result<Box<dyn AudioSource>, AudioError> {
        let samples = match kind {
            SourceKind::Microphone => self.mic_samples.clone(),
            SourceKind::Loopback => {
                if self.fail_loopback {
                    return Err(AudioError::LoopbackUnsupported(
                        "no monitor source".to_string(),
                    ));
                }
                self.loopback_samples.clone()
            }
            SourceKind::File => self.mic_samples.clone(),
        };
        Ok(Box::new(StubSource {
            samples,
            truncated: self.truncated,
        }))
    }
}

/// Backend whose per-call behavior is scripted up front
struct ScriptedBackend {
    script: Mutex<VecDeque<ScriptedCall>>,
    calls: AtomicUsize,
}

enum ScriptedCall {
    Reply {
        delay: Duration,
        outcome: Result<Transcript, &'static str>,
    },
}

impl ScriptedBackend {
    /// Replies instantly with the same text on every call
    fn echo(text: &'static str) -> Arc<Self> {
        let script = (0..16)
            .map(|_| ScriptedCall::Reply {
                delay: Duration::ZERO,
                outcome: Ok(Transcript::Text(text.to_string())),
            })
            .collect();
        Arc::new(Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
        })
    }

    fn scripted(calls: Vec<ScriptedCall>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(calls.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transcriber for ScriptedBackend {
    fn transcribe(
        &self,
        _buffer: &talktype::audio::AudioBuffer,
    ) -> Result<Transcript, TranscribeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let call = self.script.lock().unwrap().pop_front();
        match call {
            Some(ScriptedCall::Reply { delay, outcome }) => {
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                outcome.map_err(|msg| TranscribeError::Network(msg.to_string()))
            }
            None => Ok(Transcript::Empty),
        }
    }
}

/// Provider wrapping an existing transcriber instance
struct ArcProvider(Arc<dyn Transcriber>);

impl TranscriberProvider for ArcProvider {
    fn acquire(&self) -> Result<Arc<dyn Transcriber>, TranscribeError> {
        Ok(self.0.clone())
    }
}

/// Sink that records every delivery
#[derive(Default)]
struct RecordingSink {
    delivered: Mutex<Vec<String>>,
    fail: bool,
}

impl OutputSink for RecordingSink {
    fn deliver(&self, text: &str) -> Result<(), OutputError> {
        if self.fail {
            return Err(OutputError::Clipboard("stub failure".to_string()));
        }
        self.delivered.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording-stub"
    }
}

// ---------------------------------------------------------------------------
// Harness

struct Harness {
    commands: tokio::sync::mpsc::Sender<PipelineCommand>,
    events: tokio::sync::mpsc::Receiver<LifecycleEvent>,
    sink: Arc<RecordingSink>,
    dispatcher: tokio::task::JoinHandle<()>,
}

fn spawn_pipeline(
    factory: StubFactory,
    backend: Arc<ScriptedBackend>,
    threshold: f32,
    fail_delivery: bool,
) -> Harness {
    let (emitter, events_rx) = events::channel(256);
    let sink = Arc::new(RecordingSink {
        delivered: Mutex::new(Vec::new()),
        fail: fail_delivery,
    });
    let (cmd_tx, cmd_rx) = tokio::sync::mpsc::channel(64);

    let mut dispatcher = Dispatcher::new(
        SensitivityGate::new(threshold),
        emitter,
        Arc::new(factory),
        Arc::new(ArcProvider(backend)),
        sink.clone(),
        ActiveFlags::new(),
        16000,
        Duration::from_secs(60),
    );

    let handle = tokio::spawn(async move { dispatcher.run(cmd_rx).await });

    Harness {
        commands: cmd_tx,
        events: events_rx,
        sink,
        dispatcher: handle,
    }
}

impl Harness {
    async fn send(&self, command: Command) {
        self.commands
            .send(PipelineCommand::Capture(command))
            .await
            .unwrap();
    }

    async fn start(&self, target: CaptureTarget) {
        self.send(Command::StartCapture(target)).await;
    }

    async fn stop(&self, target: CaptureTarget) {
        self.send(Command::StopCapture(target)).await;
    }

    /// Shut down and collect everything that was emitted/delivered.
    async fn finish(mut self) -> (Vec<LifecycleEvent>, Vec<String>) {
        self.commands
            .send(PipelineCommand::Shutdown)
            .await
            .unwrap();
        let _ = self.dispatcher.await;
        // Delivery tasks run on blocking threads; give them a beat
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        let delivered = self.sink.delivered.lock().unwrap().clone();
        (events, delivered)
    }
}

fn settle() -> tokio::time::Sleep {
    tokio::time::sleep(Duration::from_millis(150))
}

fn terminal_events(events: &[LifecycleEvent], target: CaptureTarget) -> Vec<&LifecycleEvent> {
    events
        .iter()
        .filter(|e| e.target() == target && e.is_terminal())
        .collect()
}

fn loud_samples() -> Vec<f32> {
    (0..16000)
        .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 16000.0).sin() * 0.5)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests

#[tokio::test]
async fn round_trip_delivers_echoed_text() {
    let backend = ScriptedBackend::echo("hello from the stub");
    let harness = spawn_pipeline(StubFactory::with_mic(loud_samples()), backend, 0.0, false);

    harness.start(CaptureTarget::Microphone).await;
    settle().await;
    harness.stop(CaptureTarget::Microphone).await;
    settle().await;

    let (events, delivered) = harness.finish().await;

    assert_eq!(delivered, vec!["hello from the stub".to_string()]);

    // Causal order: started -> stopped -> transcribing -> result
    let positions: Vec<usize> = [
        events
            .iter()
            .position(|e| matches!(e, LifecycleEvent::RecordingStarted { .. }))
            .unwrap(),
        events
            .iter()
            .position(|e| matches!(e, LifecycleEvent::RecordingStopped { .. }))
            .unwrap(),
        events
            .iter()
            .position(|e| matches!(e, LifecycleEvent::TranscribingStarted { .. }))
            .unwrap(),
        events
            .iter()
            .position(|e| matches!(e, LifecycleEvent::Result { .. }))
            .unwrap(),
    ]
    .to_vec();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted, "events out of causal order: {:?}", events);

    assert_eq!(terminal_events(&events, CaptureTarget::Microphone).len(), 1);
}

#[tokio::test]
async fn quiet_recording_rejected_before_backend() {
    // RMS 0.01 against threshold 0.02: rejected, no request allocated
    let backend = ScriptedBackend::echo("should never appear");
    let backend_probe = backend.clone();
    let harness = spawn_pipeline(
        StubFactory::with_mic(vec![0.01; 16000]),
        backend,
        0.02,
        false,
    );

    harness.start(CaptureTarget::Microphone).await;
    settle().await;
    harness.stop(CaptureTarget::Microphone).await;
    settle().await;

    let (events, delivered) = harness.finish().await;

    assert_eq!(backend_probe.call_count(), 0, "backend must not be called");
    assert!(delivered.is_empty());

    let terminals = terminal_events(&events, CaptureTarget::Microphone);
    assert_eq!(terminals.len(), 1);
    assert!(matches!(
        terminals[0],
        LifecycleEvent::SensitivityRejected { rms, threshold, .. }
            if (*rms - 0.01).abs() < 0.001 && *threshold == 0.02
    ));
    assert!(!events
        .iter()
        .any(|e| matches!(e, LifecycleEvent::TranscribingStarted { .. })));
}

#[tokio::test]
async fn zero_threshold_accepts_near_silence() {
    let backend = ScriptedBackend::echo("faint but accepted");
    let backend_probe = backend.clone();
    let harness = spawn_pipeline(
        StubFactory::with_mic(vec![0.0001; 16000]),
        backend,
        0.0,
        false,
    );

    harness.start(CaptureTarget::Microphone).await;
    settle().await;
    harness.stop(CaptureTarget::Microphone).await;
    settle().await;

    let (_events, delivered) = harness.finish().await;
    assert_eq!(backend_probe.call_count(), 1);
    assert_eq!(delivered, vec!["faint but accepted".to_string()]);
}

#[tokio::test]
async fn loud_recording_reaches_backend_with_threshold() {
    let backend = ScriptedBackend::echo("loud and clear");
    let backend_probe = backend.clone();
    let harness = spawn_pipeline(StubFactory::with_mic(loud_samples()), backend, 0.02, false);

    harness.start(CaptureTarget::Microphone).await;
    settle().await;
    harness.stop(CaptureTarget::Microphone).await;
    settle().await;

    let (_events, delivered) = harness.finish().await;
    assert_eq!(backend_probe.call_count(), 1);
    assert_eq!(delivered, vec!["loud and clear".to_string()]);
}

#[tokio::test]
async fn backend_failure_reports_network_error_and_returns_to_idle() {
    // First capture fails like an HTTP 500; second succeeds
    let backend = ScriptedBackend::scripted(vec![
        ScriptedCall::Reply {
            delay: Duration::ZERO,
            outcome: Err("Server returned 500"),
        },
        ScriptedCall::Reply {
            delay: Duration::ZERO,
            outcome: Ok(Transcript::Text("recovered".to_string())),
        },
    ]);
    let harness = spawn_pipeline(StubFactory::with_mic(loud_samples()), backend, 0.0, false);

    harness.start(CaptureTarget::Microphone).await;
    settle().await;
    harness.stop(CaptureTarget::Microphone).await;
    settle().await;

    // Pipeline is idle again: the next capture runs normally
    harness.start(CaptureTarget::Microphone).await;
    settle().await;
    harness.stop(CaptureTarget::Microphone).await;
    settle().await;

    let (events, delivered) = harness.finish().await;

    let errors: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, LifecycleEvent::Error { kind: ErrorKind::NetworkFailure, .. }))
        .collect();
    assert_eq!(errors.len(), 1);

    // The failed request never reached the sink
    assert_eq!(delivered, vec!["recovered".to_string()]);
    assert_eq!(terminal_events(&events, CaptureTarget::Microphone).len(), 2);
}

#[tokio::test]
async fn superseded_result_never_reaches_sink() {
    // Request 1 is slow; request 2 lands while 1 is still in flight
    let backend = ScriptedBackend::scripted(vec![
        ScriptedCall::Reply {
            delay: Duration::from_millis(500),
            outcome: Ok(Transcript::Text("stale result".to_string())),
        },
        ScriptedCall::Reply {
            delay: Duration::ZERO,
            outcome: Ok(Transcript::Text("fresh result".to_string())),
        },
    ]);
    let harness = spawn_pipeline(StubFactory::with_mic(loud_samples()), backend, 0.0, false);

    harness.start(CaptureTarget::Microphone).await;
    settle().await;
    harness.stop(CaptureTarget::Microphone).await; // request 1, slow
    tokio::time::sleep(Duration::from_millis(50)).await;

    harness.start(CaptureTarget::Microphone).await;
    settle().await;
    harness.stop(CaptureTarget::Microphone).await; // request 2, instant
    tokio::time::sleep(Duration::from_millis(700)).await; // let request 1 finish too

    let (events, delivered) = harness.finish().await;

    assert_eq!(delivered, vec!["fresh result".to_string()]);
    let results: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, LifecycleEvent::Result { .. }))
        .collect();
    assert_eq!(results.len(), 1, "stale result must be discarded silently");
}

#[tokio::test]
async fn start_while_recording_is_noop() {
    let backend = ScriptedBackend::echo("single session");
    let harness = spawn_pipeline(StubFactory::with_mic(loud_samples()), backend, 0.0, false);

    harness.start(CaptureTarget::Microphone).await;
    settle().await;
    // Second start on the same target must not spawn a second session
    harness.start(CaptureTarget::Microphone).await;
    settle().await;
    harness.stop(CaptureTarget::Microphone).await;
    settle().await;

    let (events, delivered) = harness.finish().await;

    let starts = events
        .iter()
        .filter(|e| matches!(e, LifecycleEvent::RecordingStarted { .. }))
        .count();
    assert_eq!(starts, 1);
    assert_eq!(delivered.len(), 1);
}

#[tokio::test]
async fn overlapping_targets_are_independent() {
    let backend = ScriptedBackend::scripted(vec![
        ScriptedCall::Reply {
            delay: Duration::ZERO,
            outcome: Ok(Transcript::Text("first stop".to_string())),
        },
        ScriptedCall::Reply {
            delay: Duration::ZERO,
            outcome: Ok(Transcript::Text("second stop".to_string())),
        },
    ]);
    let harness = spawn_pipeline(StubFactory::with_mic(loud_samples()), backend, 0.0, false);

    harness.start(CaptureTarget::Microphone).await;
    harness.start(CaptureTarget::SystemAudio).await;
    settle().await;
    harness.stop(CaptureTarget::SystemAudio).await;
    settle().await;
    harness.stop(CaptureTarget::Microphone).await;
    settle().await;

    let (events, delivered) = harness.finish().await;

    assert_eq!(delivered.len(), 2);

    // Each target has a complete, ordered stream of its own
    for target in [CaptureTarget::Microphone, CaptureTarget::SystemAudio] {
        let stream: Vec<_> = events.iter().filter(|e| e.target() == target).collect();
        assert!(
            matches!(stream.first(), Some(LifecycleEvent::RecordingStarted { .. })),
            "{} stream must open with RecordingStarted",
            target
        );
        let terminals = terminal_events(&events, target);
        assert_eq!(terminals.len(), 1, "{} needs exactly one terminal", target);
    }
}

#[tokio::test]
async fn loopback_unsupported_surfaces_typed_error() {
    let mut factory = StubFactory::with_mic(loud_samples());
    factory.fail_loopback = true;
    let backend = ScriptedBackend::echo("unused");
    let harness = spawn_pipeline(factory, backend, 0.0, false);

    harness.start(CaptureTarget::SystemAudio).await;
    settle().await;

    let (events, delivered) = harness.finish().await;

    assert!(delivered.is_empty());
    assert!(events.iter().any(|e| matches!(
        e,
        LifecycleEvent::Error {
            target: CaptureTarget::SystemAudio,
            kind: ErrorKind::LoopbackUnsupported,
            ..
        }
    )));
    // No recording ever started on that target
    assert!(!events.iter().any(|e| matches!(
        e,
        LifecycleEvent::RecordingStarted {
            target: CaptureTarget::SystemAudio
        }
    )));
}

#[tokio::test]
async fn empty_transcript_is_empty_result_not_error() {
    let backend = ScriptedBackend::scripted(vec![ScriptedCall::Reply {
        delay: Duration::ZERO,
        outcome: Ok(Transcript::Empty),
    }]);
    let harness = spawn_pipeline(StubFactory::with_mic(loud_samples()), backend, 0.0, false);

    harness.start(CaptureTarget::Microphone).await;
    settle().await;
    harness.stop(CaptureTarget::Microphone).await;
    settle().await;

    let (events, delivered) = harness.finish().await;

    assert!(delivered.is_empty());
    let terminals = terminal_events(&events, CaptureTarget::Microphone);
    assert_eq!(terminals.len(), 1);
    assert!(matches!(terminals[0], LifecycleEvent::EmptyResult { .. }));
}

#[tokio::test]
async fn hallucinated_you_collapses_to_empty_result() {
    let backend = ScriptedBackend::scripted(vec![ScriptedCall::Reply {
        delay: Duration::ZERO,
        outcome: Ok(Transcript::Text(" You. ".to_string())),
    }]);
    let harness = spawn_pipeline(StubFactory::with_mic(loud_samples()), backend, 0.0, false);

    harness.start(CaptureTarget::Microphone).await;
    settle().await;
    harness.stop(CaptureTarget::Microphone).await;
    settle().await;

    let (events, delivered) = harness.finish().await;

    assert!(delivered.is_empty());
    assert!(events
        .iter()
        .any(|e| matches!(e, LifecycleEvent::EmptyResult { .. })));
}

#[tokio::test]
async fn truncated_capture_still_transcribes() {
    let mut factory = StubFactory::with_mic(loud_samples());
    factory.truncated = true;
    let backend = ScriptedBackend::echo("partial audio text");
    let harness = spawn_pipeline(factory, backend, 0.0, false);

    harness.start(CaptureTarget::Microphone).await;
    settle().await;
    harness.stop(CaptureTarget::Microphone).await;
    settle().await;

    let (events, delivered) = harness.finish().await;

    // Partial audio is transcribed, not dropped
    assert_eq!(delivered, vec!["partial audio text".to_string()]);
    assert_eq!(terminal_events(&events, CaptureTarget::Microphone).len(), 1);
}

#[tokio::test]
async fn delivery_failure_is_event_not_pipeline_error() {
    let backend = ScriptedBackend::echo("undeliverable");
    let harness = spawn_pipeline(StubFactory::with_mic(loud_samples()), backend, 0.0, true);

    harness.start(CaptureTarget::Microphone).await;
    settle().await;
    harness.stop(CaptureTarget::Microphone).await;
    settle().await;

    let (events, delivered) = harness.finish().await;

    assert!(delivered.is_empty());
    // The transcription result still went out, followed by a delivery error
    assert!(events
        .iter()
        .any(|e| matches!(e, LifecycleEvent::Result { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        LifecycleEvent::Error {
            kind: ErrorKind::OutputDeliveryFailure,
            ..
        }
    )));
}

#[tokio::test]
async fn rapid_toggle_pairs_emit_one_terminal_each() {
    let backend = ScriptedBackend::echo("pair");
    let harness = spawn_pipeline(StubFactory::with_mic(loud_samples()), backend, 0.0, false);

    for _ in 0..3 {
        harness.start(CaptureTarget::Microphone).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        harness.stop(CaptureTarget::Microphone).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    let (events, delivered) = harness.finish().await;

    assert_eq!(delivered.len(), 3);
    assert_eq!(terminal_events(&events, CaptureTarget::Microphone).len(), 3);
}
