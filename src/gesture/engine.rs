//! Gesture engine task
//!
//! Owns the recognizer and the controller it emits into, and serializes
//! everything that touches them: key events from the listener, grace
//! timer expiries and toggle requests. Each input runs to completion,
//! including the controller's confirmations, before the next is taken.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::recognizer::GestureRecognizer;
use super::timer::{TimerToken, TokioGraceTimer};
use crate::controller::{Confirmation, Controller, SessionState};
use crate::hotkey::HotkeyEvent;

/// Non-keyboard inputs to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineInput {
    /// An armed grace timer fired
    GraceExpired(TimerToken),
    /// Toggle recording without a chord
    ToggleRecording,
}

/// Runs the recognizer on a single task
pub struct GestureEngine {
    recognizer: GestureRecognizer<Controller, TokioGraceTimer>,
}

impl GestureEngine {
    /// Create an engine driving `controller`
    ///
    /// `input_tx` must feed the receiver later passed to [`run`](Self::run);
    /// grace timer expiries are posted through it.
    pub fn new(
        controller: Controller,
        input_tx: &mpsc::Sender<EngineInput>,
        grace_period: Duration,
    ) -> Self {
        Self {
            recognizer: GestureRecognizer::new(
                controller,
                TokioGraceTimer::new(input_tx),
                grace_period,
            ),
        }
    }

    /// Consumer-side session flags
    pub fn session(&self) -> SessionState {
        self.recognizer.handler().state()
    }

    /// Process key events and engine inputs until both channels close
    pub async fn run(
        &mut self,
        mut hotkey_rx: mpsc::Receiver<HotkeyEvent>,
        mut input_rx: mpsc::Receiver<EngineInput>,
    ) {
        info!("gesture engine started");

        loop {
            tokio::select! {
                Some(input) = input_rx.recv() => self.dispatch(input),
                Some(event) = hotkey_rx.recv() => self.handle_hotkey(event),
                else => break,
            }
            self.apply_confirmations();
        }

        info!("gesture engine stopped");
    }

    fn handle_hotkey(&mut self, event: HotkeyEvent) {
        match event {
            HotkeyEvent::Key(key_event) => self.recognizer.handle(key_event),
            HotkeyEvent::TapDisabled => {
                warn!(
                    modifiers = ?self.recognizer.modifiers(),
                    recording = self.recognizer.is_recording(),
                    hands_free = self.recognizer.is_hands_free(),
                    grace_pending = self.recognizer.is_grace_pending(),
                    "hotkey tap disabled, key releases may have been missed"
                );
            }
        }
    }

    fn dispatch(&mut self, input: EngineInput) {
        match input {
            EngineInput::GraceExpired(token) => self.recognizer.on_grace_expired(token),
            EngineInput::ToggleRecording => self.recognizer.toggle_recording(),
        }
    }

    /// Feed the controller's settled values back before the next input
    fn apply_confirmations(&mut self) {
        for confirmation in self.recognizer.handler_mut().take_confirmations() {
            match confirmation {
                Confirmation::Recording(recording) => {
                    self.recognizer.set_recording_state(recording)
                }
                Confirmation::HandsFree(hands_free) => {
                    self.recognizer.set_hands_free_state(hands_free)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::gesture::DEFAULT_GRACE_PERIOD;
    use crate::hotkey::{Key, KeyEvent};
    use tokio::sync::broadcast;
    use tokio::task::JoinHandle;
    use tokio::time::Instant;

    struct Harness {
        hotkey_tx: mpsc::Sender<HotkeyEvent>,
        input_tx: mpsc::Sender<EngineInput>,
        command_rx: broadcast::Receiver<Command>,
        engine: JoinHandle<GestureEngine>,
    }

    impl Harness {
        fn spawn() -> Self {
            let (hotkey_tx, hotkey_rx) = mpsc::channel(32);
            let (input_tx, input_rx) = mpsc::channel(32);
            let (command_tx, command_rx) = broadcast::channel(64);

            let controller = Controller::new(command_tx);
            let mut engine = GestureEngine::new(controller, &input_tx, DEFAULT_GRACE_PERIOD);
            let engine = tokio::spawn(async move {
                engine.run(hotkey_rx, input_rx).await;
                engine
            });

            Self {
                hotkey_tx,
                input_tx,
                command_rx,
                engine,
            }
        }

        async fn press(&self, key: Key) {
            self.hotkey_tx
                .send(HotkeyEvent::Key(KeyEvent::down(key)))
                .await
                .unwrap();
        }

        async fn release(&self, key: Key) {
            self.hotkey_tx
                .send(HotkeyEvent::Key(KeyEvent::up(key)))
                .await
                .unwrap();
        }

        async fn next(&mut self) -> Command {
            self.command_rx.recv().await.unwrap()
        }

        /// Nothing arrives even after a long stretch of virtual time
        async fn assert_quiet(&mut self) {
            let waited =
                tokio::time::timeout(Duration::from_secs(5), self.command_rx.recv()).await;
            assert!(waited.is_err(), "unexpected command: {waited:?}");
        }

        /// Close the inputs and return the controller's final session
        async fn finish(self) -> SessionState {
            drop(self.hotkey_tx);
            drop(self.input_tx);
            self.engine.await.unwrap().session()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_to_talk_round_trip() {
        let mut h = Harness::spawn();

        h.press(Key::Control).await;
        h.press(Key::Alt).await;
        assert_eq!(h.next().await, Command::QuickCommand { active: false });
        assert_eq!(h.next().await, Command::StartRecording);

        h.release(Key::Alt).await;
        h.release(Key::Control).await;
        assert_eq!(h.next().await, Command::StopRecording);
        h.assert_quiet().await;

        assert!(!h.finish().await.recording);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quick_tap_then_press_again() {
        let mut h = Harness::spawn();

        // Whole tap queued before the engine runs
        h.press(Key::Control).await;
        h.press(Key::Alt).await;
        h.release(Key::Alt).await;
        h.release(Key::Control).await;

        assert_eq!(h.next().await, Command::QuickCommand { active: false });
        assert_eq!(h.next().await, Command::StartRecording);
        assert_eq!(h.next().await, Command::StopRecording);

        tokio::time::sleep(Duration::from_millis(500)).await;
        h.press(Key::Control).await;
        h.press(Key::Alt).await;
        assert_eq!(h.next().await, Command::QuickCommand { active: false });
        assert_eq!(h.next().await, Command::StartRecording);

        assert!(h.finish().await.recording);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hands_free_latch_applies_to_queued_release() {
        let mut h = Harness::spawn();

        h.press(Key::Control).await;
        h.press(Key::Alt).await;
        h.press(Key::Space).await;
        h.release(Key::Space).await;
        h.release(Key::Alt).await;

        assert_eq!(h.next().await, Command::QuickCommand { active: false });
        assert_eq!(h.next().await, Command::StartRecording);
        assert_eq!(h.next().await, Command::ToggleHandsFree);
        // Latched before the Alt release was handled, so recording continues
        h.assert_quiet().await;

        let session = h.finish().await;
        assert!(session.hands_free);
        assert!(session.recording);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_timer_expires_after_period() {
        let mut h = Harness::spawn();

        h.press(Key::Control).await;
        h.press(Key::Alt).await;
        h.press(Key::Meta).await;
        h.next().await;
        h.next().await;
        assert_eq!(h.next().await, Command::QuickCommand { active: true });

        let released_at = Instant::now();
        h.release(Key::Meta).await;
        assert_eq!(h.next().await, Command::QuickCommand { active: false });
        assert!(released_at.elapsed() >= DEFAULT_GRACE_PERIOD);

        h.assert_quiet().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_chord_break_cancels_grace_timer() {
        let mut h = Harness::spawn();

        h.press(Key::Control).await;
        h.press(Key::Alt).await;
        h.press(Key::Meta).await;
        for _ in 0..3 {
            h.next().await;
        }

        h.release(Key::Meta).await;
        h.release(Key::Alt).await;
        assert_eq!(h.next().await, Command::QuickCommand { active: true });
        assert_eq!(h.next().await, Command::StopRecording);

        h.assert_quiet().await;

        let session = h.finish().await;
        assert!(session.quick_command);
        assert!(!session.recording);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hands_free_meta_pulses_command_mode() {
        let mut h = Harness::spawn();

        h.press(Key::Control).await;
        h.press(Key::Alt).await;
        h.press(Key::Space).await;
        h.press(Key::Meta).await;

        assert_eq!(h.next().await, Command::QuickCommand { active: false });
        assert_eq!(h.next().await, Command::StartRecording);
        assert_eq!(h.next().await, Command::ToggleHandsFree);
        assert_eq!(h.next().await, Command::CommandMode { active: true });

        h.release(Key::Meta).await;
        h.release(Key::Control).await;
        h.assert_quiet().await;

        assert!(h.finish().await.command_mode);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_recording_input() {
        let mut h = Harness::spawn();

        h.input_tx.send(EngineInput::ToggleRecording).await.unwrap();
        assert_eq!(h.next().await, Command::ToggleRecording);

        // Mirror now says recording, so the chord does not start again
        h.press(Key::Control).await;
        h.press(Key::Alt).await;
        h.release(Key::Alt).await;
        assert_eq!(h.next().await, Command::StopRecording);

        assert!(!h.finish().await.recording);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_stops_when_inputs_close() {
        let h = Harness::spawn();
        assert_eq!(h.finish().await, SessionState::default());
    }
}
