//! Hotkey module for global keyboard event listening
//!
//! Uses macOS CGEventTap to monitor key-down/key-up events and resolves
//! them into the keys the gesture recognizer tracks.

// Keycode resolution is only reached through the macOS event tap
#![cfg_attr(not(target_os = "macos"), allow(dead_code))]

mod keys;
mod listener;

pub use keys::{Key, KeyEvent, ModifierState, Transition};
pub use listener::{HotkeyEvent, HotkeyListener};
