//! Global hotkey module
//!
//! Parses hotkey combos ("ctrl+shift+space"), runs a per-target state
//! machine over the raw key event stream, and installs the process-wide
//! input hook via rdev. The hook thread never does real work: it feeds the
//! controller and forwards the resulting capture commands to the dispatcher
//! over a bounded queue.

pub mod controller;
pub mod rdev_hook;

pub use controller::{HotkeyController, Verdict};
pub use rdev_hook::HotkeyHook;

use crate::config::HotkeyMode;
use crate::error::HotkeyError;
use crate::events::CaptureTarget;

/// Raw input fed to the controller (already narrowed to key events)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    KeyPress(rdev::Key),
    KeyRelease(rdev::Key),
}

/// Capture command produced by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartCapture(CaptureTarget),
    StopCapture(CaptureTarget),
}

/// Abstract modifier; matches either the left or right physical key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Ctrl,
    Shift,
    Alt,
    Meta,
}

impl Modifier {
    /// The physical keys that satisfy this modifier
    pub fn keys(self) -> &'static [rdev::Key] {
        use rdev::Key;
        match self {
            Modifier::Ctrl => &[Key::ControlLeft, Key::ControlRight],
            Modifier::Shift => &[Key::ShiftLeft, Key::ShiftRight],
            Modifier::Alt => &[Key::Alt, Key::AltGr],
            Modifier::Meta => &[Key::MetaLeft, Key::MetaRight],
        }
    }

    /// Whether a physical key is any modifier at all
    pub fn from_key(key: rdev::Key) -> Option<Modifier> {
        use rdev::Key;
        match key {
            Key::ControlLeft | Key::ControlRight => Some(Modifier::Ctrl),
            Key::ShiftLeft | Key::ShiftRight => Some(Modifier::Shift),
            Key::Alt | Key::AltGr => Some(Modifier::Alt),
            Key::MetaLeft | Key::MetaRight => Some(Modifier::Meta),
            _ => None,
        }
    }
}

/// One configured hotkey: modifiers + trigger key, bound to a capture target
#[derive(Debug, Clone)]
pub struct Binding {
    pub target: CaptureTarget,
    pub mode: HotkeyMode,
    pub suppress: bool,
    pub modifiers: Vec<Modifier>,
    pub trigger: rdev::Key,
}

/// Parse a "+"-separated combo string into a binding.
///
/// Modifier tokens may appear in any order; exactly one non-modifier token
/// is required and becomes the trigger key.
pub fn parse_binding(
    combo: &str,
    target: CaptureTarget,
    mode: HotkeyMode,
    suppress: bool,
) -> Result<Binding, HotkeyError> {
    let mut modifiers = Vec::new();
    let mut trigger = None;

    for part in combo.split('+') {
        let token = part.trim().to_lowercase();
        if token.is_empty() {
            continue;
        }

        match token.as_str() {
            "ctrl" | "control" => modifiers.push(Modifier::Ctrl),
            "shift" => modifiers.push(Modifier::Shift),
            "alt" => modifiers.push(Modifier::Alt),
            "meta" | "super" | "win" | "cmd" => modifiers.push(Modifier::Meta),
            _ => {
                let key = parse_key_name(&token)?;
                if trigger.replace(key).is_some() {
                    return Err(HotkeyError::UnknownKey(format!(
                        "{} (multiple trigger keys in one combo)",
                        combo
                    )));
                }
            }
        }
    }

    let trigger = trigger.ok_or_else(|| HotkeyError::NoTrigger(combo.to_string()))?;

    Ok(Binding {
        target,
        mode,
        suppress,
        modifiers,
        trigger,
    })
}

/// Parse a single (lowercased) key token into an rdev key
fn parse_key_name(name: &str) -> Result<rdev::Key, HotkeyError> {
    use rdev::Key;

    // Single letters and digits
    if name.chars().count() == 1 {
        if let Some(c) = name.chars().next() {
            if let Some(key) = letter_key(c).or_else(|| digit_key(c)) {
                return Ok(key);
            }
        }
    }

    let key = match name {
        "space" => Key::Space,
        "enter" | "return" => Key::Return,
        "tab" => Key::Tab,
        "escape" | "esc" => Key::Escape,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "insert" | "ins" => Key::Insert,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" | "pgup" => Key::PageUp,
        "pagedown" | "pgdn" => Key::PageDown,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "pause" | "break" => Key::Pause,
        "scrolllock" | "scroll_lock" => Key::ScrollLock,
        "printscreen" | "prtsc" => Key::PrintScreen,
        "capslock" => Key::CapsLock,
        "numlock" => Key::NumLock,
        "grave" | "backquote" | "`" => Key::BackQuote,
        "minus" => Key::Minus,
        "equal" => Key::Equal,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        _ => return Err(HotkeyError::UnknownKey(name.to_string())),
    };

    Ok(key)
}

fn letter_key(c: char) -> Option<rdev::Key> {
    use rdev::Key;
    Some(match c {
        'a' => Key::KeyA,
        'b' => Key::KeyB,
        'c' => Key::KeyC,
        'd' => Key::KeyD,
        'e' => Key::KeyE,
        'f' => Key::KeyF,
        'g' => Key::KeyG,
        'h' => Key::KeyH,
        'i' => Key::KeyI,
        'j' => Key::KeyJ,
        'k' => Key::KeyK,
        'l' => Key::KeyL,
        'm' => Key::KeyM,
        'n' => Key::KeyN,
        'o' => Key::KeyO,
        'p' => Key::KeyP,
        'q' => Key::KeyQ,
        'r' => Key::KeyR,
        's' => Key::KeyS,
        't' => Key::KeyT,
        'u' => Key::KeyU,
        'v' => Key::KeyV,
        'w' => Key::KeyW,
        'x' => Key::KeyX,
        'y' => Key::KeyY,
        'z' => Key::KeyZ,
        _ => return None,
    })
}

fn digit_key(c: char) -> Option<rdev::Key> {
    use rdev::Key;
    Some(match c {
        '0' => Key::Num0,
        '1' => Key::Num1,
        '2' => Key::Num2,
        '3' => Key::Num3,
        '4' => Key::Num4,
        '5' => Key::Num5,
        '6' => Key::Num6,
        '7' => Key::Num7,
        '8' => Key::Num8,
        '9' => Key::Num9,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_combo() {
        let binding = parse_binding(
            "ctrl+shift+space",
            CaptureTarget::Microphone,
            HotkeyMode::Toggle,
            false,
        )
        .unwrap();
        assert_eq!(binding.trigger, rdev::Key::Space);
        assert_eq!(binding.modifiers, vec![Modifier::Ctrl, Modifier::Shift]);
        assert_eq!(binding.target, CaptureTarget::Microphone);
    }

    #[test]
    fn test_parse_bare_key() {
        let binding = parse_binding("f9", CaptureTarget::Microphone, HotkeyMode::Hold, true)
            .unwrap();
        assert_eq!(binding.trigger, rdev::Key::F9);
        assert!(binding.modifiers.is_empty());
        assert!(binding.suppress);
    }

    #[test]
    fn test_parse_whitespace_and_case() {
        let binding = parse_binding(
            " Ctrl + ALT + P ",
            CaptureTarget::SystemAudio,
            HotkeyMode::Toggle,
            false,
        )
        .unwrap();
        assert_eq!(binding.trigger, rdev::Key::KeyP);
        assert_eq!(binding.modifiers, vec![Modifier::Ctrl, Modifier::Alt]);
    }

    #[test]
    fn test_parse_meta_aliases() {
        for alias in ["meta+v", "super+v", "win+v", "cmd+v"] {
            let binding = parse_binding(
                alias,
                CaptureTarget::Microphone,
                HotkeyMode::Toggle,
                false,
            )
            .unwrap();
            assert_eq!(binding.modifiers, vec![Modifier::Meta]);
        }
    }

    #[test]
    fn test_parse_rejects_modifier_only() {
        let err = parse_binding(
            "ctrl+shift",
            CaptureTarget::Microphone,
            HotkeyMode::Toggle,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, HotkeyError::NoTrigger(_)));
    }

    #[test]
    fn test_parse_rejects_unknown_key() {
        let err = parse_binding(
            "ctrl+doesnotexist",
            CaptureTarget::Microphone,
            HotkeyMode::Toggle,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, HotkeyError::UnknownKey(_)));
    }

    #[test]
    fn test_parse_rejects_two_triggers() {
        let err = parse_binding(
            "a+b",
            CaptureTarget::Microphone,
            HotkeyMode::Toggle,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, HotkeyError::UnknownKey(_)));
    }
}
