//! Synthetic keyboard output via enigo
//!
//! Two entry points: the platform paste chord (Cmd+V / Ctrl+V) and
//! per-character typing at a configured rate. Both run on blocking threads;
//! typing a long transcript at 50 cps can take a while.

use crate::error::OutputError;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use std::time::Duration;

fn new_enigo() -> Result<Enigo, OutputError> {
    Enigo::new(&Settings::default()).map_err(|e| OutputError::Keyboard(e.to_string()))
}

/// The modifier used for the paste chord on this platform
fn paste_modifier() -> Key {
    if cfg!(target_os = "macos") {
        Key::Meta
    } else {
        Key::Control
    }
}

/// Synthesize the platform paste shortcut
pub fn send_paste_chord() -> Result<(), OutputError> {
    let mut enigo = new_enigo()?;
    let modifier = paste_modifier();

    enigo
        .key(modifier, Direction::Press)
        .map_err(|e| OutputError::Keyboard(e.to_string()))?;
    let result = enigo.key(Key::Unicode('v'), Direction::Click);
    // Always release the modifier, even if the 'v' failed
    let release = enigo.key(modifier, Direction::Release);

    result.map_err(|e| OutputError::Keyboard(e.to_string()))?;
    release.map_err(|e| OutputError::Keyboard(e.to_string()))?;

    tracing::debug!("Sent paste chord");
    Ok(())
}

/// Type text one character at a time at `chars_per_sec`
pub fn type_text(text: &str, chars_per_sec: u32) -> Result<(), OutputError> {
    let mut enigo = new_enigo()?;
    let delay = Duration::from_secs_f64(1.0 / chars_per_sec.max(1) as f64);

    for c in text.chars() {
        enigo
            .text(&c.to_string())
            .map_err(|e| OutputError::Keyboard(e.to_string()))?;
        std::thread::sleep(delay);
    }

    tracing::debug!(
        "Typed {} chars at {} cps",
        text.chars().count(),
        chars_per_sec
    );
    Ok(())
}
