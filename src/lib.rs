//! Talktype: global push-to-talk speech-to-text
//!
//! This library provides the core functionality for:
//! - Detecting global hotkeys via rdev (toggle or hold, with optional
//!   system-wide suppression)
//! - Capturing audio via cpal (microphone or system loopback), or reading
//!   a test file
//! - Gating near-silent recordings with an RMS sensitivity threshold
//! - Transcribing speech locally (whisper.cpp, Parakeet) or via a remote
//!   OpenAI-compatible API
//! - Delivering text to the clipboard and/or the focused app (paste chord
//!   or per-character typing)
//!
//! # Architecture
//!
//! ```text
//!   ┌────────────┐  commands   ┌──────────────────────────────────────┐
//!   │ HotkeyHook │────────────▶│              Dispatcher              │
//!   │   (rdev)   │             │  one control loop, per-target state  │
//!   └────────────┘             └──────────────────────────────────────┘
//!                                   │            │             │
//!                        open/stop  │      gate  │    spawn    │ deliver
//!                                   ▼            ▼             ▼
//!                          ┌──────────────┐ ┌─────────┐ ┌─────────────┐
//!                          │CaptureSession│ │RMS gate │ │ Transcriber │
//!                          │ (cpal/file)  │ └─────────┘ │local/remote │
//!                          └──────────────┘             └─────────────┘
//!                                   │                         │
//!                                   └──── lifecycle events ◀──┘
//!                                         (overlay sink)
//! ```
//!
//! Every capture ends in exactly one terminal lifecycle event; results of
//! superseded requests are discarded before they reach the output sink.

pub mod audio;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod gate;
pub mod hotkey;
pub mod output;
pub mod text;
pub mod transcribe;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use daemon::Daemon;
pub use error::{Result, TalktypeError};
