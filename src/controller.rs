//! Command consumer
//!
//! Owns the ground truth the recognizer only mirrors: whether recording
//! is on, the hands-free latch, persistent command mode and the transient
//! quick command. Runs inline as the recognizer's [`CommandHandler`]; the
//! recording and hands-free values it settles on are queued as
//! [`Confirmation`]s that the engine applies before the next input.

use std::io::Write;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::commands::Command;
use crate::gesture::CommandHandler;

/// How the next piece of generated text would be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// Pasted into the focused application
    Paste,
    /// Interpreted as a command
    Command,
}

/// Consumer-side session flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    pub recording: bool,
    pub hands_free: bool,
    pub command_mode: bool,
    pub quick_command: bool,
}

impl SessionState {
    pub fn routing(&self) -> Routing {
        if self.command_mode || self.quick_command {
            Routing::Command
        } else {
            Routing::Paste
        }
    }
}

/// State the recognizer must adopt after a command was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Recording(bool),
    HandsFree(bool),
}

/// Applies emitted commands to the session and republishes them
pub struct Controller {
    state: SessionState,
    command_tx: broadcast::Sender<Command>,
    confirmations: Vec<Confirmation>,
}

impl Controller {
    pub fn new(command_tx: broadcast::Sender<Command>) -> Self {
        Self {
            state: SessionState::default(),
            command_tx,
            confirmations: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drain the confirmations queued since the last call
    pub fn take_confirmations(&mut self) -> Vec<Confirmation> {
        std::mem::take(&mut self.confirmations)
    }

    fn apply(&mut self, command: Command) {
        info!(%command, "command");
        if self.command_tx.send(command).is_err() {
            debug!(%command, "no command subscribers");
        }

        let routing_before = self.state.routing();

        match command {
            Command::StartRecording => {
                self.state.recording = true;
                info!(action = "start", "recording action");
                self.confirmations.push(Confirmation::Recording(true));
            }
            Command::StopRecording => {
                self.state.recording = false;
                info!(action = "stop", "recording action");
            }
            Command::ToggleRecording => {
                self.state.recording = !self.state.recording;
                info!(action = "toggle", recording = self.state.recording, "recording action");
                self.confirmations
                    .push(Confirmation::Recording(self.state.recording));
            }
            Command::ToggleHandsFree => {
                self.state.hands_free = !self.state.hands_free;
                info!(hands_free = self.state.hands_free, "hands-free toggled");
                self.confirmations
                    .push(Confirmation::HandsFree(self.state.hands_free));
            }
            Command::CommandMode { active } => {
                // Only the rising pulse toggles persistent mode
                if active {
                    self.state.command_mode = !self.state.command_mode;
                    info!(command_mode = self.state.command_mode, "command mode toggled");
                }
            }
            Command::QuickCommand { active } => {
                self.state.quick_command = active;
            }
        }

        let routing = self.state.routing();
        if routing != routing_before {
            info!(?routing, "text routing changed");
        }
    }
}

impl CommandHandler for Controller {
    fn on_start_recording(&mut self) {
        self.apply(Command::StartRecording);
    }

    fn on_stop_recording(&mut self) {
        self.apply(Command::StopRecording);
    }

    fn on_toggle_recording(&mut self) {
        self.apply(Command::ToggleRecording);
    }

    fn on_toggle_hands_free(&mut self) {
        self.apply(Command::ToggleHandsFree);
    }

    fn on_command_mode(&mut self, active: bool) {
        self.apply(Command::CommandMode { active });
    }

    fn on_quick_command(&mut self, active: bool) {
        self.apply(Command::QuickCommand { active });
    }
}

/// Print every command as one JSON line on stdout until the channel closes
pub async fn write_json_lines(mut command_rx: broadcast::Receiver<Command>) {
    loop {
        let command = match command_rx.recv().await {
            Ok(command) => command,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "json output lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let line = match serde_json::to_string(&command) {
            Ok(line) => line,
            Err(e) => {
                warn!(?e, "failed to encode command");
                continue;
            }
        };

        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{line}").and_then(|_| stdout.flush()) {
            debug!(?e, "failed to write command to stdout");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_controller() -> (Controller, broadcast::Receiver<Command>) {
        let (tx, rx) = broadcast::channel(16);
        (Controller::new(tx), rx)
    }

    #[test]
    fn test_start_and_stop_recording() {
        let (mut controller, _rx) = create_controller();

        controller.on_start_recording();
        assert!(controller.state().recording);
        assert_eq!(controller.take_confirmations(), [Confirmation::Recording(true)]);

        controller.on_stop_recording();
        assert!(!controller.state().recording);
        // The recognizer already cleared its own mirror
        assert!(controller.take_confirmations().is_empty());
    }

    #[test]
    fn test_commands_are_republished() {
        let (mut controller, mut rx) = create_controller();

        controller.on_quick_command(true);
        controller.on_toggle_hands_free();

        assert_eq!(rx.try_recv().unwrap(), Command::QuickCommand { active: true });
        assert_eq!(rx.try_recv().unwrap(), Command::ToggleHandsFree);
        tokio_test::assert_err!(rx.try_recv());
    }

    #[test]
    fn test_runs_without_subscribers() {
        let (mut controller, rx) = create_controller();
        drop(rx);

        controller.on_start_recording();
        assert!(controller.state().recording);
    }

    #[test]
    fn test_toggle_hands_free_confirms_latch() {
        let (mut controller, _rx) = create_controller();

        controller.on_toggle_hands_free();
        controller.on_toggle_hands_free();
        assert_eq!(
            controller.take_confirmations(),
            [Confirmation::HandsFree(true), Confirmation::HandsFree(false)]
        );
        assert!(!controller.state().hands_free);
    }

    #[test]
    fn test_toggle_recording_confirms() {
        let (mut controller, _rx) = create_controller();

        controller.on_toggle_recording();
        assert_eq!(controller.take_confirmations(), [Confirmation::Recording(true)]);
        controller.on_toggle_recording();
        assert_eq!(controller.take_confirmations(), [Confirmation::Recording(false)]);
    }

    #[test]
    fn test_command_mode_toggles_on_pulse_only() {
        let (mut controller, _rx) = create_controller();

        controller.on_command_mode(true);
        assert!(controller.state().command_mode);

        controller.on_command_mode(false);
        assert!(controller.state().command_mode);

        controller.on_command_mode(true);
        assert!(!controller.state().command_mode);
    }

    #[test]
    fn test_routing_follows_command_flags() {
        let (mut controller, _rx) = create_controller();
        assert_eq!(controller.state().routing(), Routing::Paste);

        controller.on_quick_command(true);
        assert_eq!(controller.state().routing(), Routing::Command);

        controller.on_quick_command(false);
        assert_eq!(controller.state().routing(), Routing::Paste);

        controller.on_command_mode(true);
        assert_eq!(controller.state().routing(), Routing::Command);
    }

    #[tokio::test]
    async fn test_json_writer_stops_when_channel_closes() {
        let (command_tx, command_rx) = broadcast::channel(4);

        command_tx.send(Command::StartRecording).unwrap();
        drop(command_tx);

        write_json_lines(command_rx).await;
    }
}
