// Command-line interface definitions for talktype

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "talktype")]
#[command(author, version, about = "Global push-to-talk speech-to-text")]
#[command(long_about = "
Talktype is a push-to-talk speech-to-text tool. Press a global hotkey to
record, release (or press again) to transcribe, and the text lands on your
clipboard and/or at the cursor.

Transcription runs locally (whisper.cpp / Parakeet) or against a remote
OpenAI-compatible server.

USAGE:
  Press ctrl+shift+space (default) to start recording, press again to stop.
  Configure a second hotkey to capture system audio instead of the mic.
")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Override model (whisper-tiny, whisper-base-en, parakeet-tdt-0.6b-v3, ...)
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Override the primary hotkey (e.g. "ctrl+shift+space", "f9")
    #[arg(long, value_name = "COMBO")]
    pub hotkey: Option<String>,

    /// Use hold mode (record while held) instead of toggle
    #[arg(long)]
    pub hold: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as daemon (default if no command specified)
    Daemon,

    /// Transcribe an audio file through the full pipeline (test action)
    Transcribe {
        /// Path to a .wav or .mp3 file; defaults to test_input_file
        file: Option<std::path::PathBuf>,

        /// Also deliver the result to clipboard/cursor per config
        #[arg(long)]
        deliver: bool,
    },

    /// List audio capture devices
    Devices,

    /// Show the effective configuration
    Config {
        /// Also probe the remote server (api backend)
        #[arg(long)]
        check: bool,
    },
}
