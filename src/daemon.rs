//! Daemon module - wiring and lifecycle
//!
//! Builds the pipeline from configuration, installs the global hotkey hook,
//! runs the dispatcher control loop, and tears everything down on shutdown.
//! Also hosts the one-shot file transcription used by `talktype transcribe`.

use crate::audio::{cpal_source, AudioBuffer, CpalSourceFactory, SourceFactory, SourceKind};
use crate::config::{BackendMode, Config, HotkeyMode};
use crate::dispatch::{Dispatcher, PipelineCommand};
use crate::error::{Result, TalktypeError};
use crate::events::{self, CaptureTarget, LifecycleEvent};
use crate::gate::{GateDecision, SensitivityGate};
use crate::hotkey::{self, controller::ActiveFlags, HotkeyController, HotkeyHook};
use crate::output::{OutputSink, TextDelivery};
use crate::text;
use crate::transcribe::{ModelCache, Transcript, TranscriberProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Outcome of a one-shot file transcription
#[derive(Debug, PartialEq)]
pub enum TestOutcome {
    Text(String),
    Empty,
    Rejected { rms: f32, threshold: f32 },
}

/// Main daemon that owns the pipeline for the life of the process
pub struct Daemon {
    config: Config,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the daemon until SIGINT/SIGTERM.
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("Starting talktype daemon");

        Config::ensure_directories().map_err(|e| {
            TalktypeError::Config(format!("Failed to create directories: {}", e))
        })?;

        // Lifecycle event stream; the overlay/notification collaborator
        // would take this receiver. The daemon itself just logs it.
        let (emitter, events_rx) = events::channel(256);
        let events_task = tokio::spawn(log_events(events_rx));

        // Backend: warm the local model up-front so a broken selection
        // fails at startup, not on the first hotkey press. Remote backends
        // get a reachability probe instead (informational only).
        let backend = Arc::new(ModelCache::new(&self.config));
        match self.config.whisper_backend {
            BackendMode::Local => {
                let warm = backend.clone();
                tokio::task::spawn_blocking(move || warm.acquire())
                    .await
                    .map_err(|e| TalktypeError::Config(format!("Model load panicked: {}", e)))??;
                tracing::info!("Model loaded, ready for voice input");
            }
            BackendMode::Api => {
                let url = self.config.api_url.clone();
                tokio::task::spawn_blocking(move || ping_server(&url)).await.ok();
            }
        }

        // Hotkey bindings: primary microphone key plus the optional
        // system-audio key, each running its own state machine.
        let mut bindings = vec![hotkey::parse_binding(
            &self.config.hotkey,
            CaptureTarget::Microphone,
            self.config.hotkey_mode,
            self.config.suppress_hotkey,
        )?];
        if !self.config.system_audio_hotkey.trim().is_empty() {
            bindings.push(hotkey::parse_binding(
                &self.config.system_audio_hotkey,
                CaptureTarget::SystemAudio,
                self.config.hotkey_mode,
                self.config.suppress_hotkey,
            )?);
        }

        let mode_desc = match self.config.hotkey_mode {
            HotkeyMode::Hold => "hold to record, release to transcribe",
            HotkeyMode::Toggle => "press to start/stop recording",
        };
        tracing::info!("Hotkey: {} ({})", self.config.hotkey, mode_desc);
        if !self.config.system_audio_hotkey.trim().is_empty() {
            tracing::info!("System-audio hotkey: {}", self.config.system_audio_hotkey);
        }

        let active = ActiveFlags::new();
        let controller = HotkeyController::new(bindings, active.clone());

        // Command queue between the hook thread and the control loop.
        // The hook side only ever try_sends.
        let (cmd_tx, cmd_rx) = mpsc::channel::<PipelineCommand>(64);

        let hook_tx = cmd_tx.clone();
        let hook = HotkeyHook::install(controller, self.config.suppress_hotkey, move |command| {
            if hook_tx
                .try_send(PipelineCommand::Capture(command))
                .is_err()
            {
                tracing::warn!("Command queue full, dropped {:?}", command);
            }
        })?;

        let sources: Arc<dyn SourceFactory> = Arc::new(CpalSourceFactory::new(&self.config));
        let sink: Arc<dyn OutputSink> = Arc::new(TextDelivery::new(&self.config));
        let gate = SensitivityGate::new(self.config.sensitivity_threshold());

        let mut dispatcher = Dispatcher::new(
            gate,
            emitter,
            sources,
            backend,
            sink,
            active,
            self.config.sample_rate,
            Duration::from_secs(self.config.max_duration_secs as u64),
        );

        let dispatch_task = tokio::spawn(async move { dispatcher.run(cmd_rx).await });

        wait_for_shutdown().await;
        tracing::info!("Shutting down...");

        let _ = cmd_tx.send(PipelineCommand::Shutdown).await;
        let _ = dispatch_task.await;
        hook.uninstall();
        events_task.abort();

        tracing::info!("Daemon stopped");
        Ok(())
    }
}

/// One-shot pipeline over the file source: the Settings "Test
/// transcription" action and the `talktype transcribe` command.
pub async fn transcribe_file(config: &Config, deliver: bool) -> Result<TestOutcome> {
    let factory = CpalSourceFactory::new(config);
    let mut source = factory.open(SourceKind::File)?;

    let _frames = source.start().await.map_err(TalktypeError::from)?;
    let capture = source.stop().await.map_err(TalktypeError::from)?;
    let buffer = AudioBuffer::new(
        capture.samples,
        config.sample_rate,
        SourceKind::File,
        capture.truncated,
    );

    if buffer.is_empty() {
        return Ok(TestOutcome::Empty);
    }

    let gate = SensitivityGate::new(config.sensitivity_threshold());
    if let GateDecision::Rejected { rms, threshold } = gate.evaluate(&buffer) {
        return Ok(TestOutcome::Rejected { rms, threshold });
    }

    let backend = ModelCache::new(config);
    let outcome = tokio::task::spawn_blocking(move || {
        backend
            .acquire()
            .and_then(|transcriber| transcriber.transcribe(&buffer))
    })
    .await
    .map_err(|e| TalktypeError::Config(format!("Transcription task panicked: {}", e)))??;

    let cleaned = match outcome {
        Transcript::Text(raw) => text::sanitize(&raw),
        Transcript::Empty => String::new(),
    };
    if cleaned.is_empty() {
        return Ok(TestOutcome::Empty);
    }

    if deliver {
        let sink = TextDelivery::new(config);
        let text = cleaned.clone();
        tokio::task::spawn_blocking(move || sink.deliver(&text))
            .await
            .map_err(|e| TalktypeError::Config(format!("Delivery task panicked: {}", e)))??;
    }

    Ok(TestOutcome::Text(cleaned))
}

/// Print the available capture devices
pub fn list_devices() -> Result<()> {
    let devices = cpal_source::list_input_devices()?;
    if devices.is_empty() {
        println!("No audio input devices found.");
    } else {
        println!("Audio input devices:");
        for name in devices {
            println!("  - {}", name);
        }
    }
    Ok(())
}

/// Check whether the remote server answers at all.
///
/// Any HTTP response counts as reachable; only transport failures are
/// reported. Never fatal: the server may come up later.
pub fn ping_server(base_url: &str) {
    let base = base_url.trim_end_matches('/');
    for path in ["/health", "/"] {
        let url = format!("{}{}", base, path);
        match ureq::get(&url).timeout(Duration::from_secs(5)).call() {
            Ok(resp) => {
                tracing::info!("Remote server reachable: {} ({})", url, resp.status());
                return;
            }
            Err(ureq::Error::Status(code, _)) => {
                tracing::info!("Remote server reachable: {} ({})", url, code);
                return;
            }
            Err(ureq::Error::Transport(t)) => {
                tracing::debug!("Ping {} failed: {}", url, t);
            }
        }
    }
    tracing::warn!(
        "Remote server {} not reachable - is it running? Transcriptions will fail until it is.",
        base_url
    );
}

/// Log the lifecycle stream. An overlay/notification collaborator would
/// consume the same receiver instead.
async fn log_events(mut rx: mpsc::Receiver<LifecycleEvent>) {
    while let Some(event) = rx.recv().await {
        match &event {
            LifecycleEvent::RecordingLevel { rms, .. } => {
                tracing::trace!("level {:.4}", rms);
            }
            LifecycleEvent::Result { target, text, latency } => {
                tracing::info!(
                    "[{}] result in {:.2}s: {:?}",
                    target,
                    latency.as_secs_f32(),
                    text
                );
            }
            LifecycleEvent::Error { target, kind, message } => {
                tracing::warn!("[{}] {:?}: {}", target, kind, message);
            }
            other => {
                tracing::debug!("[{}] {:?}", other.target(), other);
            }
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Failed to set up SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT"),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Received Ctrl+C");
}
