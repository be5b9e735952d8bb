//! Commands emitted by the gesture recognizer
//!
//! Discrete signals for the consumers that drive recording and
//! command routing.

use serde::{Deserialize, Serialize};

/// A command produced from a recognized key gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Base chord pressed while not recording
    StartRecording,

    /// Base chord broken while recording and not hands-free
    StopRecording,

    /// Recording toggle requested outside the chord path (SIGUSR1)
    ToggleRecording,

    /// Control+Alt+Space
    ToggleHandsFree,

    /// Persistent command mode pulse; the consumer inverts its flag on `active`
    CommandMode { active: bool },

    /// Transient quick command mode on or off
    QuickCommand { active: bool },
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::StartRecording => write!(f, "START_RECORDING"),
            Command::StopRecording => write!(f, "STOP_RECORDING"),
            Command::ToggleRecording => write!(f, "TOGGLE_RECORDING"),
            Command::ToggleHandsFree => write!(f, "TOGGLE_HANDS_FREE"),
            Command::CommandMode { active } => write!(f, "COMMAND_MODE ({})", on_off(*active)),
            Command::QuickCommand { active } => write!(f, "QUICK_COMMAND ({})", on_off(*active)),
        }
    }
}

fn on_off(active: bool) -> &'static str {
    if active {
        "on"
    } else {
        "off"
    }
}
