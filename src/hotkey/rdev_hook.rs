//! Process-wide input hook via rdev
//!
//! One hook instance exists per process, installed at startup and marked
//! inert at shutdown (rdev offers no way to tear the OS hook down short of
//! process exit, so uninstall just stops forwarding).
//!
//! The hook callback runs on rdev's listener thread and must never block:
//! it feeds the controller and forwards commands through a non-blocking
//! closure supplied by the daemon. Suppression uses `rdev::grab`, which
//! lets the callback swallow matched events; without suppression the
//! cheaper `rdev::listen` is used.

use super::controller::HotkeyController;
use super::{Command, HookEvent};
use crate::error::HotkeyError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How long to wait for the hook thread to report an install failure
const INSTALL_GRACE: Duration = Duration::from_millis(300);

pub struct HotkeyHook {
    active: Arc<AtomicBool>,
}

impl HotkeyHook {
    /// Install the global hook and start forwarding capture commands.
    ///
    /// `on_command` is invoked on the hook thread and must not block
    /// (the daemon passes a bounded-queue try_send).
    ///
    /// Failure to install the hook (missing permissions, no display
    /// connection) is a fatal startup error, reported here rather than
    /// per-event.
    pub fn install(
        controller: HotkeyController,
        suppress: bool,
        on_command: impl Fn(Command) + Send + Sync + 'static,
    ) -> Result<Self, HotkeyError> {
        let active = Arc::new(AtomicBool::new(true));
        let controller = Arc::new(Mutex::new(controller));
        let on_command = Arc::new(on_command);

        let (err_tx, err_rx) = std::sync::mpsc::channel::<String>();

        let thread_active = active.clone();
        std::thread::Builder::new()
            .name("talktype-hotkey".to_string())
            .spawn(move || {
                let result = if suppress {
                    run_grab(controller, on_command, thread_active)
                } else {
                    run_listen(controller, on_command, thread_active)
                };
                if let Err(msg) = result {
                    tracing::error!("Input hook failed: {}", msg);
                    let _ = err_tx.send(msg);
                }
            })
            .map_err(|e| HotkeyError::HookInstall(e.to_string()))?;

        // rdev reports install failures by returning from listen/grab almost
        // immediately; give it a short grace window to do so.
        match err_rx.recv_timeout(INSTALL_GRACE) {
            Ok(msg) => Err(HotkeyError::HookInstall(msg)),
            Err(_) => {
                tracing::info!(
                    "Global input hook installed (suppression: {})",
                    if suppress { "on" } else { "off" }
                );
                Ok(Self { active })
            }
        }
    }

    /// Stop forwarding events. The OS hook itself lives until process exit.
    pub fn uninstall(&self) {
        self.active.store(false, Ordering::SeqCst);
        tracing::debug!("Input hook marked inactive");
    }
}

impl Drop for HotkeyHook {
    fn drop(&mut self) {
        self.uninstall();
    }
}

fn to_hook_event(event_type: &rdev::EventType) -> Option<HookEvent> {
    match event_type {
        rdev::EventType::KeyPress(key) => Some(HookEvent::KeyPress(*key)),
        rdev::EventType::KeyRelease(key) => Some(HookEvent::KeyRelease(*key)),
        _ => None,
    }
}

fn run_listen(
    controller: Arc<Mutex<HotkeyController>>,
    on_command: Arc<dyn Fn(Command) + Send + Sync>,
    active: Arc<AtomicBool>,
) -> Result<(), String> {
    rdev::listen(move |event: rdev::Event| {
        if !active.load(Ordering::SeqCst) {
            return;
        }
        let Some(hook_event) = to_hook_event(&event.event_type) else {
            return;
        };
        let verdict = match controller.lock() {
            Ok(mut ctl) => ctl.handle(hook_event),
            Err(_) => return,
        };
        for command in verdict.commands {
            on_command(command);
        }
    })
    .map_err(|e| format!("{:?}", e))
}

fn run_grab(
    controller: Arc<Mutex<HotkeyController>>,
    on_command: Arc<dyn Fn(Command) + Send + Sync>,
    active: Arc<AtomicBool>,
) -> Result<(), String> {
    rdev::grab(move |event: rdev::Event| {
        if !active.load(Ordering::SeqCst) {
            return Some(event);
        }
        let Some(hook_event) = to_hook_event(&event.event_type) else {
            return Some(event);
        };
        let verdict = match controller.lock() {
            Ok(mut ctl) => ctl.handle(hook_event),
            Err(_) => return Some(event),
        };
        for command in verdict.commands {
            on_command(command);
        }
        if verdict.suppress {
            None
        } else {
            Some(event)
        }
    })
    .map_err(|e| format!("{:?}", e))
}
