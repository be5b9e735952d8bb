//! Chord gesture recognizer
//!
//! Turns key-down/key-up transitions of Control, Alt, Meta and Space into
//! recording and command-mode signals. Control+Alt (the base chord) gates
//! every gesture:
//!
//! - Control+Alt: push-to-talk, recording while held
//! - Control+Alt+Space: toggle hands-free
//! - Control+Alt+Meta: quick command, or a persistent command mode pulse
//!   when hands-free is latched
//!
//! Releasing Meta before Control/Alt is common, so turning quick command
//! off after a Meta release is deferred by a grace period. If the chord
//! breaks inside that window the quick command is confirmed instead.

use std::time::Duration;

use tracing::{debug, info};

use super::handler::CommandHandler;
use super::timer::{GraceTimer, TimerToken};
use crate::hotkey::{Key, KeyEvent, ModifierState, Transition};

/// Default delay before a Meta release turns quick command off
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(100);

/// Single-owner state machine mapping key transitions to commands
pub struct GestureRecognizer<H, T> {
    /// Physical modifier state
    modifiers: ModifierState,
    /// Optimistic mirror of the recording controller
    recording: bool,
    /// Latch owned by the consumer, reported back through the setter
    hands_free: bool,
    grace_period: Duration,
    /// Token of the armed grace timer, if any
    pending_grace: Option<TimerToken>,
    next_token: u64,
    handler: H,
    timer: T,
}

impl<H: CommandHandler, T: GraceTimer> GestureRecognizer<H, T> {
    /// Create a recognizer with every flag cleared and no timer pending
    pub fn new(handler: H, timer: T, grace_period: Duration) -> Self {
        Self {
            modifiers: ModifierState::default(),
            recording: false,
            hands_free: false,
            grace_period,
            pending_grace: None,
            next_token: 0,
            handler,
            timer,
        }
    }

    pub fn modifiers(&self) -> ModifierState {
        self.modifiers
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn is_hands_free(&self) -> bool {
        self.hands_free
    }

    pub fn is_grace_pending(&self) -> bool {
        self.pending_grace.is_some()
    }

    /// Feed one key transition
    pub fn handle(&mut self, event: KeyEvent) {
        debug!(key = %event.key, transition = ?event.transition, "key transition");
        match event.transition {
            Transition::Down => self.key_down(event.key),
            Transition::Up => self.key_up(event.key),
        }
    }

    /// External correction of the recording mirror
    pub fn set_recording_state(&mut self, recording: bool) {
        if self.recording != recording {
            debug!(recording, "recording state corrected");
        }
        self.recording = recording;
    }

    /// External confirmation of the hands-free latch
    pub fn set_hands_free_state(&mut self, hands_free: bool) {
        if self.hands_free != hands_free {
            info!(hands_free, "hands-free latch changed");
        }
        self.hands_free = hands_free;
    }

    /// Toggle recording outside the chord path
    pub fn toggle_recording(&mut self) {
        self.handler.on_toggle_recording();
        self.recording = !self.recording;
    }

    /// Called by the owner when an armed grace timer fires
    ///
    /// Expiries for a token that is no longer pending are dropped; the
    /// timer may have fired just as it was being cancelled.
    pub fn on_grace_expired(&mut self, token: TimerToken) {
        if self.pending_grace != Some(token) {
            debug!(?token, "stale grace expiry ignored");
            return;
        }
        self.pending_grace = None;
        debug!("grace period elapsed, quick command off");
        self.handler.on_quick_command(false);
    }

    fn key_down(&mut self, key: Key) {
        self.modifiers.apply(KeyEvent::down(key));
        let base_chord = self.modifiers.is_base_chord();

        // Push-to-talk start; Space is reserved for the hands-free toggle
        if base_chord && !self.recording && key != Key::Space {
            info!("push-to-talk started");
            self.cancel_grace();
            self.handler.on_quick_command(false);
            self.handler.on_start_recording();
            self.recording = true;
        }

        if key == Key::Meta && base_chord {
            self.cancel_grace();
            if self.hands_free {
                info!("command mode toggled");
                self.handler.on_command_mode(true);
            } else {
                info!("quick command on");
                self.handler.on_quick_command(true);
            }
        }

        if base_chord && key == Key::Space {
            info!("hands-free toggle requested");
            self.handler.on_toggle_hands_free();
        }
    }

    fn key_up(&mut self, key: Key) {
        self.modifiers.apply(KeyEvent::up(key));

        match key {
            Key::Meta => {
                if self.modifiers.is_base_chord() && !self.hands_free {
                    self.arm_grace();
                }
            }
            Key::Control | Key::Alt => {
                if self.modifiers.is_base_chord() {
                    return;
                }

                // Chord broke inside the grace window: the user meant the command
                if self.cancel_grace() {
                    info!("quick command confirmed on chord release");
                    self.handler.on_quick_command(true);
                }

                if self.recording && !self.hands_free {
                    info!("push-to-talk released");
                    self.handler.on_stop_recording();
                    self.recording = false;
                }
            }
            Key::Space | Key::Other => {}
        }
    }

    fn arm_grace(&mut self) {
        self.cancel_grace();

        let token = TimerToken(self.next_token);
        self.next_token = self.next_token.wrapping_add(1);

        debug!(?token, grace_ms = self.grace_period.as_millis() as u64, "grace timer armed");
        self.timer.arm(self.grace_period, token);
        self.pending_grace = Some(token);
    }

    /// Cancel the pending grace timer, returning whether one was pending
    fn cancel_grace(&mut self) -> bool {
        match self.pending_grace.take() {
            Some(token) => {
                debug!(?token, "grace timer cancelled");
                self.timer.cancel();
                true
            }
            None => false,
        }
    }
}

impl<H, T> GestureRecognizer<H, T> {
    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    #[cfg(test)]
    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }
}
