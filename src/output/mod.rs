//! Text output module
//!
//! Delivers the final transcript to the clipboard and/or the focused
//! application. Delivery is best-effort by contract: failures are reported
//! to the caller as `OutputError` and surfaced as lifecycle events, never
//! as pipeline errors.
//!
//! Insert methods:
//! - `paste`: put the text on the clipboard and synthesize the platform
//!   paste chord (works with any keyboard layout)
//! - `type`: synthesize one keystroke per character at the configured rate

pub mod clipboard;
pub mod keyboard;

use crate::config::{Config, InsertMethod};
use crate::error::OutputError;
use std::time::Duration;

/// Settle time between clipboard writes and the keystrokes that use them
const CLIPBOARD_SETTLE: Duration = Duration::from_millis(150);

/// Trait for text delivery implementations
pub trait OutputSink: Send + Sync {
    /// Deliver final text. Runs on a blocking thread; may sleep.
    fn deliver(&self, text: &str) -> Result<(), OutputError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Clipboard/keyboard delivery per the output_* configuration
pub struct TextDelivery {
    clipboard: bool,
    insert: bool,
    method: InsertMethod,
    typing_speed_cps: u32,
}

impl TextDelivery {
    pub fn new(config: &Config) -> Self {
        Self {
            clipboard: config.output_clipboard,
            insert: config.output_insert,
            method: config.output_insert_method,
            typing_speed_cps: config.typing_speed_cps(),
        }
    }
}

impl OutputSink for TextDelivery {
    fn deliver(&self, text: &str) -> Result<(), OutputError> {
        if text.is_empty() {
            return Ok(());
        }
        if !self.clipboard && !self.insert {
            return Err(OutputError::NothingEnabled);
        }

        let uses_clipboard = self.clipboard || (self.insert && self.method == InsertMethod::Paste);

        // When pasting without clipboard output, the user's clipboard is
        // borrowed and must be handed back afterwards.
        let saved = if uses_clipboard && !self.clipboard {
            clipboard::get_text().unwrap_or_default()
        } else {
            None
        };

        if uses_clipboard {
            clipboard::set_text(text)?;
            tracing::debug!("Transcript copied to clipboard ({} chars)", text.len());
        }

        if self.insert {
            // Give the focused app a beat to observe the clipboard change
            std::thread::sleep(CLIPBOARD_SETTLE);
            match self.method {
                InsertMethod::Paste => keyboard::send_paste_chord()?,
                InsertMethod::Type => keyboard::type_text(text, self.typing_speed_cps)?,
            }
        }

        if let Some(previous) = saved {
            std::thread::sleep(CLIPBOARD_SETTLE);
            clipboard::set_text(&previous)?;
            tracing::debug!("Restored previous clipboard contents");
        }

        tracing::info!(
            "Delivered transcript ({} chars, clipboard={}, insert={:?})",
            text.len(),
            self.clipboard,
            self.insert.then_some(self.method)
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "clipboard/keyboard"
    }
}
