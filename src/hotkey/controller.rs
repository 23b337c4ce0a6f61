//! Hotkey state machine
//!
//! Pure logic over the raw key event stream: tracks modifier state, runs
//! the per-binding Idle/Recording transitions under toggle or hold
//! semantics, and decides when a matched event should be suppressed.
//!
//! Toggle decisions consult the dispatcher-owned "capture active" flag per
//! target rather than mirroring state here, so a failed capture start
//! cannot leave the controller out of sync with reality.

use super::{Binding, Command, HookEvent};
use crate::config::HotkeyMode;
use crate::events::CaptureTarget;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared per-target "a capture session is live" flags, written by the
/// dispatcher, read by the controller for toggle decisions.
#[derive(Debug, Clone, Default)]
pub struct ActiveFlags {
    microphone: Arc<AtomicBool>,
    system_audio: Arc<AtomicBool>,
}

impl ActiveFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, target: CaptureTarget, active: bool) {
        self.flag(target).store(active, Ordering::SeqCst);
    }

    pub fn is_active(&self, target: CaptureTarget) -> bool {
        self.flag(target).load(Ordering::SeqCst)
    }

    fn flag(&self, target: CaptureTarget) -> &AtomicBool {
        match target {
            CaptureTarget::Microphone => &self.microphone,
            CaptureTarget::SystemAudio => &self.system_audio,
        }
    }
}

/// What the controller decided for one input event
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Verdict {
    pub commands: Vec<Command>,
    /// Swallow this event system-wide (suppression enabled and matched)
    pub suppress: bool,
}

struct BindingState {
    binding: Binding,
    /// Trigger key physically held; filters key-repeat
    held: bool,
    /// Local latch for toggle mode, covering the window before the
    /// dispatcher has processed our StartCapture and raised the flag
    toggled_on: bool,
}

pub struct HotkeyController {
    bindings: Vec<BindingState>,
    pressed: HashSet<rdev::Key>,
    active: ActiveFlags,
}

impl HotkeyController {
    pub fn new(bindings: Vec<Binding>, active: ActiveFlags) -> Self {
        Self {
            bindings: bindings
                .into_iter()
                .map(|binding| BindingState {
                    binding,
                    held: false,
                    toggled_on: false,
                })
                .collect(),
            pressed: HashSet::new(),
            active,
        }
    }

    /// Feed one raw event through the state machine.
    pub fn handle(&mut self, event: HookEvent) -> Verdict {
        let mut verdict = Verdict::default();

        let (key, is_press) = match event {
            HookEvent::KeyPress(key) => (key, true),
            HookEvent::KeyRelease(key) => (key, false),
        };

        // Modifier bookkeeping happens before trigger matching so a combo
        // whose trigger is itself a modifier key still sees prior state.
        let was_pressed = self.pressed.contains(&key);
        if is_press {
            self.pressed.insert(key);
        } else {
            self.pressed.remove(&key);
        }

        for state in &mut self.bindings {
            if state.binding.trigger != key {
                continue;
            }

            let mods_ok = state
                .binding
                .modifiers
                .iter()
                .all(|m| self.pressed.iter().any(|k| m.keys().contains(k)));

            if is_press {
                // Key-repeat shows up as a second press without a release
                let repeat = was_pressed || state.held;

                if mods_ok && !repeat {
                    state.held = true;
                    match state.binding.mode {
                        HotkeyMode::Hold => {
                            verdict
                                .commands
                                .push(Command::StartCapture(state.binding.target));
                        }
                        HotkeyMode::Toggle => {
                            // The dispatcher flag is authoritative once it has
                            // caught up; the local latch covers the queue delay.
                            let flag = self.active.is_active(state.binding.target);
                            if flag {
                                state.toggled_on = false;
                            }
                            if flag || state.toggled_on {
                                state.toggled_on = false;
                                verdict
                                    .commands
                                    .push(Command::StopCapture(state.binding.target));
                            } else {
                                state.toggled_on = true;
                                verdict
                                    .commands
                                    .push(Command::StartCapture(state.binding.target));
                            }
                        }
                    }
                }

                if state.binding.suppress && (mods_ok || state.held) {
                    verdict.suppress = true;
                }
            } else {
                let was_held = state.held;
                state.held = false;

                if was_held {
                    if state.binding.mode == HotkeyMode::Hold {
                        verdict
                            .commands
                            .push(Command::StopCapture(state.binding.target));
                    }
                    if state.binding.suppress {
                        verdict.suppress = true;
                    }
                }
            }
        }

        verdict
    }
}
