//! Configuration loading and types for talktype
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/talktype/config.toml)
//! 3. Environment variables (TALKTYPE_*)
//! 4. CLI arguments (highest priority)
//!
//! The key set is deliberately flat: every option a collaborator (settings
//! UI, tray) may write is a single top-level key, which keeps the file
//! trivially diffable and round-trippable.

use crate::error::TalktypeError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Talktype Configuration
#
# Location: ~/.config/talktype/config.toml
# All settings can be overridden via CLI flags

# Primary push-to-talk hotkey. Modifiers joined with '+', trigger key last.
# Examples: "ctrl+shift+space", "f9", "pause"
hotkey = "ctrl+shift+space"

# Secondary hotkey that captures system audio (loopback) instead of the
# microphone. Empty string disables it.
system_audio_hotkey = ""

# Hotkey semantics: "toggle" (press to start, press again to stop)
# or "hold" (record while held)
hotkey_mode = "toggle"

# Swallow the hotkey system-wide so it never reaches the focused app
suppress_hotkey = false

# Audio input device ("default" uses the system default input)
microphone = "default"

# Minimum RMS level a recording must reach to be transcribed, on the
# 16-bit sample scale (0..4000). 0 disables the gate.
microphone_sensitivity = 0.0

# Capture sample rate in Hz (whisper expects 16000)
sample_rate = 16000

# Safety limit on a single recording, in seconds
max_duration_secs = 120

# Loopback capture source for the system-audio hotkey.
# "auto" picks the first monitor/loopback-capable input.
output_capture_source = "auto"

# Transcription backend: "local" (in-process model) or "api" (remote server)
whisper_backend = "local"

# Model for the local backend: whisper-tiny, whisper-base, whisper-small,
# whisper-medium, whisper-large-v3, whisper-turbo (plus -en variants),
# parakeet-tdt-0.6b-v3, or an absolute path to a ggml .bin file.
# For the api backend this is the model name sent to the server.
model = "whisper-base-en"

# Inference device for local models: "cpu" or "gpu"
model_device = "cpu"

# Language hint ("auto" for detection)
language = "auto"

# Remote backend endpoint (OpenAI-compatible server)
api_url = "http://localhost:9876"
api_endpoint = "/v1/audio/transcriptions"
api_timeout_secs = 60

# Where the transcript goes: clipboard, focused app, or both
output_clipboard = false
output_insert = true

# Insert method: "paste" (clipboard + paste chord) or "type" (per-character)
output_insert_method = "type"

# Characters per second when output_insert_method = "type"
typing_speed = 1000

# Audio file used by `talktype transcribe` when no path is given
test_input_file = ""
"#;

/// Hotkey activation mode
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HotkeyMode {
    /// Press once to start recording, press again to stop (default)
    #[default]
    Toggle,
    /// Hold key to record, release to stop
    Hold,
}

/// Transcription backend selection
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    /// In-process model inference (whisper / parakeet)
    #[default]
    Local,
    /// Remote OpenAI-compatible HTTP server
    Api,
}

/// Inference device for local models
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelDevice {
    #[default]
    Cpu,
    Gpu,
}

/// Text insertion method
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InsertMethod {
    /// Put text on the clipboard and synthesize the platform paste chord
    Paste,
    /// Synthesize one keystroke per character
    #[default]
    Type,
}

/// Root configuration structure.
///
/// Field names match the on-disk keys one-to-one; collaborators that persist
/// settings rely on that.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Primary (microphone) hotkey combo, e.g. "ctrl+shift+space"
    pub hotkey: String,

    /// Secondary hotkey capturing system audio; empty = disabled
    pub system_audio_hotkey: String,

    pub hotkey_mode: HotkeyMode,

    /// Swallow matched hotkey events system-wide
    pub suppress_hotkey: bool,

    /// Input device name, or "default"
    pub microphone: String,

    /// RMS gate threshold on the i16 sample scale (0 disables), clamped 0..=4000
    pub microphone_sensitivity: f32,

    /// Capture sample rate in Hz
    pub sample_rate: u32,

    /// Safety limit on a single recording
    pub max_duration_secs: u32,

    /// Loopback source name for system-audio capture, or "auto"
    pub output_capture_source: String,

    pub whisper_backend: BackendMode,

    /// Model id (local) or model name sent to the server (api)
    pub model: String,

    pub model_device: ModelDevice,

    /// Language hint, "auto" for detection
    pub language: String,

    pub api_url: String,
    pub api_endpoint: String,
    pub api_timeout_secs: u64,

    pub output_clipboard: bool,
    pub output_insert: bool,
    pub output_insert_method: InsertMethod,

    /// Characters per second for type-mode insertion, clamped 50..=5000
    pub typing_speed: u32,

    /// Audio file used for test transcriptions
    pub test_input_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hotkey: "ctrl+shift+space".to_string(),
            system_audio_hotkey: String::new(),
            hotkey_mode: HotkeyMode::Toggle,
            suppress_hotkey: false,
            microphone: "default".to_string(),
            microphone_sensitivity: 0.0,
            sample_rate: 16000,
            max_duration_secs: 120,
            output_capture_source: "auto".to_string(),
            whisper_backend: BackendMode::Local,
            model: "whisper-base-en".to_string(),
            model_device: ModelDevice::Cpu,
            language: "auto".to_string(),
            api_url: "http://localhost:9876".to_string(),
            api_endpoint: "/v1/audio/transcriptions".to_string(),
            api_timeout_secs: 60,
            output_clipboard: false,
            output_insert: true,
            output_insert_method: InsertMethod::Type,
            typing_speed: 1000,
            test_input_file: String::new(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "talktype")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "talktype")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the data directory path (for models)
    pub fn data_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "talktype")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the models directory path
    pub fn models_dir() -> PathBuf {
        Self::data_dir().join("models")
    }

    /// Ensure config and model directories exist
    pub fn ensure_directories() -> std::io::Result<()> {
        if let Some(config_dir) = Self::config_dir() {
            std::fs::create_dir_all(&config_dir)?;
            tracing::debug!("Ensured config directory exists: {:?}", config_dir);
        }

        let models_dir = Self::models_dir();
        std::fs::create_dir_all(&models_dir)?;
        tracing::debug!("Ensured models directory exists: {:?}", models_dir);

        Ok(())
    }

    /// Sensitivity threshold normalized to full-scale f32 RMS.
    ///
    /// The on-disk value lives on the i16 sample scale (matching what level
    /// meters show); internally all audio is f32 in [-1, 1].
    pub fn sensitivity_threshold(&self) -> f32 {
        let clamped = self.microphone_sensitivity.clamp(0.0, 4000.0);
        clamped / 32768.0
    }

    /// Typing speed clamped to a sane range
    pub fn typing_speed_cps(&self) -> u32 {
        self.typing_speed.clamp(50, 5000)
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, TalktypeError> {
    let mut config = Config::default();

    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| TalktypeError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| TalktypeError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    // Override from environment variables
    if let Ok(key) = std::env::var("TALKTYPE_HOTKEY") {
        config.hotkey = key;
    }
    if let Ok(model) = std::env::var("TALKTYPE_MODEL") {
        config.model = model;
    }
    if let Ok(url) = std::env::var("TALKTYPE_API_URL") {
        config.api_url = url;
    }
    if let Ok(backend) = std::env::var("TALKTYPE_BACKEND") {
        config.whisper_backend = match backend.to_lowercase().as_str() {
            "api" | "remote" => BackendMode::Api,
            _ => BackendMode::Local,
        };
    }

    Ok(config)
}

/// Save configuration to file
#[allow(dead_code)]
pub fn save_config(config: &Config, path: &Path) -> Result<(), TalktypeError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| TalktypeError::Config(format!("Failed to create config dir: {}", e)))?;
    }

    let contents = toml::to_string_pretty(config)
        .map_err(|e| TalktypeError::Config(format!("Failed to serialize config: {}", e)))?;

    std::fs::write(path, contents)
        .map_err(|e| TalktypeError::Config(format!("Failed to write config: {}", e)))?;

    Ok(())
}
