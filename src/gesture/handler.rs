//! Callback interface between the recognizer and its consumers

#[cfg(test)]
use crate::commands::Command;

/// Receives the commands the recognizer emits
///
/// Calls are fire-and-forget: implementations must not block the caller.
pub trait CommandHandler {
    fn on_start_recording(&mut self);
    fn on_stop_recording(&mut self);
    fn on_toggle_recording(&mut self);
    fn on_toggle_hands_free(&mut self);
    fn on_command_mode(&mut self, active: bool);
    fn on_quick_command(&mut self, active: bool);
}

/// Collects commands in order; used by tests
#[cfg(test)]
impl CommandHandler for Vec<Command> {
    fn on_start_recording(&mut self) {
        self.push(Command::StartRecording);
    }

    fn on_stop_recording(&mut self) {
        self.push(Command::StopRecording);
    }

    fn on_toggle_recording(&mut self) {
        self.push(Command::ToggleRecording);
    }

    fn on_toggle_hands_free(&mut self) {
        self.push(Command::ToggleHandsFree);
    }

    fn on_command_mode(&mut self, active: bool) {
        self.push(Command::CommandMode { active });
    }

    fn on_quick_command(&mut self, active: bool) {
        self.push(Command::QuickCommand { active });
    }
}
