//! Global key listener using macOS CGEventTap
//!
//! Monitors system-wide key-down, key-up and modifier flag changes and
//! forwards them as [`KeyEvent`]s. Runs on a dedicated thread with its own
//! CFRunLoop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tracing::{error, info};

use super::keys::KeyEvent;

/// Events sent from the key listener to the gesture engine
#[derive(Debug, Clone)]
pub enum HotkeyEvent {
    /// A key went down or up
    Key(KeyEvent),
    /// Event tap was disabled by macOS (events may have been missed)
    TapDisabled,
}

/// Global key listener feeding the gesture engine
pub struct HotkeyListener {
    event_tx: mpsc::Sender<HotkeyEvent>,
    running: Arc<AtomicBool>,
}

impl HotkeyListener {
    /// Create a new key listener
    pub fn new(event_tx: mpsc::Sender<HotkeyEvent>) -> Self {
        Self {
            event_tx,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the key listener
    ///
    /// Spawns a dedicated thread that runs a CFRunLoop to receive
    /// CGEventTap callbacks. The listener runs until `stop()` is called
    /// or the program exits.
    pub fn start(&self) -> Result<(), HotkeyError> {
        if !cfg!(target_os = "macos") {
            return Err(HotkeyError::Unsupported);
        }

        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyRunning);
        }

        let event_tx = self.event_tx.clone();
        let running = Arc::clone(&self.running);

        let spawned = thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                info!("hotkey listener thread started");

                if let Err(e) = run_event_loop(event_tx, running.clone()) {
                    error!(?e, "hotkey listener error");
                }

                running.store(false, Ordering::SeqCst);
                info!("hotkey listener thread stopped");
            });

        if let Err(e) = spawned {
            self.running.store(false, Ordering::SeqCst);
            return Err(HotkeyError::ThreadSpawn(e.to_string()));
        }

        Ok(())
    }

    /// Stop the key listener; the run loop exits on its next poll
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the listener is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Errors that can occur in the key listener
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey listener is already running")]
    AlreadyRunning,

    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("global key capture is not supported on this platform")]
    Unsupported,
}

/// Run the CFRunLoop with the event tap
#[cfg(target_os = "macos")]
fn run_event_loop(
    event_tx: mpsc::Sender<HotkeyEvent>,
    running: Arc<AtomicBool>,
) -> Result<(), HotkeyError> {
    use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
    use core_graphics::event::{
        CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
        CGEventTapProxy, CGEventType, EventField,
    };
    use tracing::{debug, warn};

    use super::keys::{Key, ModifierState, Transition};

    let (callback_tx, callback_rx) = std::sync::mpsc::channel::<HotkeyEvent>();

    // CGEventTap callback - must be fast and non-blocking
    let callback = move |_proxy: CGEventTapProxy,
                         event_type: CGEventType,
                         event: &CGEvent|
          -> Option<CGEvent> {
        let keycode =
            || event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;

        let forwarded = match event_type {
            CGEventType::KeyDown => Some(HotkeyEvent::Key(KeyEvent::down(Key::from_keycode(
                keycode(),
            )))),
            CGEventType::KeyUp => Some(HotkeyEvent::Key(KeyEvent::up(Key::from_keycode(
                keycode(),
            )))),
            CGEventType::FlagsChanged => {
                // The keycode names the modifier; the flags say whether it is now held
                let key = Key::from_keycode(keycode());
                if key.is_modifier() {
                    let transition = if ModifierState::from_flags(event.get_flags()).is_held(key) {
                        Transition::Down
                    } else {
                        Transition::Up
                    };
                    Some(HotkeyEvent::Key(KeyEvent { key, transition }))
                } else {
                    None
                }
            }
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                Some(HotkeyEvent::TapDisabled)
            }
            _ => None,
        };

        if let Some(forwarded) = forwarded {
            let _ = callback_tx.send(forwarded);
        }
        Some(event.clone())
    };

    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![
            CGEventType::KeyDown,
            CGEventType::KeyUp,
            CGEventType::FlagsChanged,
        ],
        callback,
    )
    .map_err(|_| {
        error!("failed to create event tap - is Accessibility permission granted?");
        HotkeyError::EventTapCreation
    })?;

    tap.enable();

    let run_loop_source = tap
        .mach_port
        .create_runloop_source(0)
        .map_err(|_| HotkeyError::EventTapCreation)?;
    let run_loop = CFRunLoop::get_current();

    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
    }

    info!("event tap created and enabled");

    while running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(
                kCFRunLoopDefaultMode,
                std::time::Duration::from_millis(100),
                true,
            );
        }

        while let Ok(forwarded) = callback_rx.try_recv() {
            if let HotkeyEvent::TapDisabled = forwarded {
                warn!("event tap disabled, re-enabling");
                tap.enable();
            } else {
                debug!(?forwarded, "key event");
            }

            // Not in an async context here, so block on the bounded channel
            if event_tx.blocking_send(forwarded).is_err() {
                warn!("failed to send key event - channel closed?");
                return Ok(());
            }
        }
    }

    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn run_event_loop(
    _event_tx: mpsc::Sender<HotkeyEvent>,
    _running: Arc<AtomicBool>,
) -> Result<(), HotkeyError> {
    Err(HotkeyError::Unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = HotkeyListener::new(tx);
        assert!(!listener.is_running());
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_start_unsupported_off_macos() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = HotkeyListener::new(tx);
        assert!(matches!(listener.start(), Err(HotkeyError::Unsupported)));
        assert!(!listener.is_running());
    }
}
