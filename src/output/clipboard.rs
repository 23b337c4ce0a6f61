//! Clipboard access via arboard
//!
//! A fresh handle per operation: arboard contexts are cheap to open and
//! holding one hostage blocks other clipboard clients on X11.

use crate::error::OutputError;

/// Read the current clipboard text, None when empty or non-text
pub fn get_text() -> Result<Option<String>, OutputError> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| OutputError::Clipboard(e.to_string()))?;

    match clipboard.get_text() {
        Ok(text) => Ok(Some(text)),
        // Empty clipboard or image content is not an error for our purposes
        Err(arboard::Error::ContentNotAvailable) => Ok(None),
        Err(e) => Err(OutputError::Clipboard(e.to_string())),
    }
}

/// Replace the clipboard contents
pub fn set_text(text: &str) -> Result<(), OutputError> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| OutputError::Clipboard(e.to_string()))?;

    clipboard
        .set_text(text.to_string())
        .map_err(|e| OutputError::Clipboard(e.to_string()))
}
