//! Lifecycle event stream for the overlay/notification collaborator
//!
//! The pipeline narrates each request over a bounded one-way channel. The
//! consumer (overlay, tray, logger) owns rendering and timing; the emitting
//! side never blocks on it. Level events are high-frequency and droppable;
//! everything else is logged if the sink falls behind.

use std::time::Duration;
use tokio::sync::mpsc;

/// Which input a capture session records from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureTarget {
    Microphone,
    SystemAudio,
}

impl std::fmt::Display for CaptureTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureTarget::Microphone => write!(f, "microphone"),
            CaptureTarget::SystemAudio => write!(f, "system-audio"),
        }
    }
}

/// Error classification surfaced to the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DeviceUnavailable,
    LoopbackUnsupported,
    NetworkFailure,
    Timeout,
    TranscriptionFailed,
    OutputDeliveryFailure,
}

/// One-way notifications describing the life of a request.
///
/// For a given target the events of one request arrive in causal order:
/// `RecordingStarted` before `TranscribingStarted` before a terminal event.
/// Every started capture ends in exactly one terminal event:
/// `SensitivityRejected`, `Result`, `EmptyResult`, or `Error`.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    RecordingStarted {
        target: CaptureTarget,
    },
    /// Rolling RMS of the live recording, throttled to ~20/s
    RecordingLevel {
        target: CaptureTarget,
        rms: f32,
    },
    RecordingStopped {
        target: CaptureTarget,
        duration: Duration,
    },
    SensitivityRejected {
        target: CaptureTarget,
        rms: f32,
        threshold: f32,
    },
    TranscribingStarted {
        target: CaptureTarget,
    },
    Result {
        target: CaptureTarget,
        text: String,
        latency: Duration,
    },
    EmptyResult {
        target: CaptureTarget,
    },
    Error {
        target: CaptureTarget,
        kind: ErrorKind,
        message: String,
    },
}

impl LifecycleEvent {
    /// True for events that close out a capture
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleEvent::SensitivityRejected { .. }
                | LifecycleEvent::Result { .. }
                | LifecycleEvent::EmptyResult { .. }
                | LifecycleEvent::Error { .. }
        )
    }

    pub fn target(&self) -> CaptureTarget {
        match self {
            LifecycleEvent::RecordingStarted { target }
            | LifecycleEvent::RecordingLevel { target, .. }
            | LifecycleEvent::RecordingStopped { target, .. }
            | LifecycleEvent::SensitivityRejected { target, .. }
            | LifecycleEvent::TranscribingStarted { target, .. }
            | LifecycleEvent::Result { target, .. }
            | LifecycleEvent::EmptyResult { target, .. }
            | LifecycleEvent::Error { target, .. } => *target,
        }
    }
}

/// Non-blocking sender half of the event stream
#[derive(Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<LifecycleEvent>,
}

impl EventEmitter {
    /// Emit an event without ever blocking the caller.
    ///
    /// Level events are dropped silently when the sink lags; anything else
    /// dropped is worth a warning since the overlay will miss a transition.
    pub fn emit(&self, event: LifecycleEvent) {
        let droppable = matches!(event, LifecycleEvent::RecordingLevel { .. });
        if let Err(e) = self.tx.try_send(event) {
            if !droppable {
                tracing::warn!("Event sink lagging, dropped lifecycle event: {:?}", e);
            }
        }
    }
}

/// Create the event channel. Capacity bounds how far the sink may lag.
pub fn channel(capacity: usize) -> (EventEmitter, mpsc::Receiver<LifecycleEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventEmitter { tx }, rx)
}
