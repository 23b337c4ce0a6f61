//! Error types for talktype
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that guide users toward fixing common issues.

use thiserror::Error;

/// Top-level error type for the talktype application
#[derive(Error, Debug)]
pub enum TalktypeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),

    #[error("Audio capture error: {0}")]
    Audio(#[from] AudioError),

    #[error("Transcription error: {0}")]
    Transcribe(#[from] TranscribeError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to the global hotkey hook
#[derive(Error, Debug)]
pub enum HotkeyError {
    #[error("Failed to install global input hook: {0}")]
    HookInstall(String),

    #[error("Unknown key name: '{0}'. Examples: 'ctrl+shift+space', 'f9', 'pause'")]
    UnknownKey(String),

    #[error("Hotkey '{0}' has no trigger key (only modifiers)")]
    NoTrigger(String),
}

/// Errors related to audio capture
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio connection failed: {0}")]
    Connection(String),

    #[error("Audio device not found: '{0}'. List devices with: talktype devices")]
    DeviceNotFound(String),

    #[error("No loopback-capable capture source available. {0}")]
    LoopbackUnsupported(String),

    #[error("Recording timeout: exceeded {0} seconds")]
    Timeout(u32),

    #[error("No audio was captured. Check your microphone.")]
    EmptyRecording,

    #[error("Audio stream error: {0}")]
    StreamError(String),

    #[error("Unsupported audio file '{0}': expected .wav or .mp3")]
    UnsupportedFile(String),

    #[error("Failed to decode audio file: {0}")]
    DecodeFailed(String),
}

/// Errors related to speech-to-text transcription
#[derive(Error, Debug)]
pub enum TranscribeError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Backend initialization failed: {0}")]
    InitFailed(String),

    #[error("Transcription failed: {0}")]
    InferenceFailed(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Remote server error: {0}")]
    RemoteError(String),
}

/// Errors related to text delivery (clipboard / synthetic keyboard)
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Clipboard access failed: {0}")]
    Clipboard(String),

    #[error("Keyboard synthesis failed: {0}")]
    Keyboard(String),

    #[error("No output method enabled (both output_clipboard and output_insert are off)")]
    NothingEnabled,
}

/// Result type alias using TalktypeError
pub type Result<T> = std::result::Result<T, TalktypeError>;
