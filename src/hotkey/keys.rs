//! Key identifiers, key transitions and modifier state tracking
//!
//! Raw platform key codes are resolved into the small set of keys the
//! gesture recognizer cares about. Everything else becomes [`Key::Other`].

use std::fmt;

/// macOS virtual key codes for the keys we track
pub mod keycodes {
    pub const SPACE: u16 = 0x31;
    pub const COMMAND: u16 = 0x37;
    pub const RIGHT_COMMAND: u16 = 0x36;
    pub const OPTION: u16 = 0x3A;
    pub const RIGHT_OPTION: u16 = 0x3D;
    pub const CONTROL: u16 = 0x3B;
    pub const RIGHT_CONTROL: u16 = 0x3E;
}

/// Modifier key flag masks from macOS CGEventFlags
#[cfg(target_os = "macos")]
pub mod flags {
    use core_graphics::event::CGEventFlags;

    /// Control key modifier flag
    pub const CONTROL: CGEventFlags = CGEventFlags::CGEventFlagControl;
    /// Option/Alt key modifier flag
    pub const OPTION: CGEventFlags = CGEventFlags::CGEventFlagAlternate;
    /// Command key modifier flag
    pub const COMMAND: CGEventFlags = CGEventFlags::CGEventFlagCommand;
}

/// A key as seen by the gesture recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Control,
    /// Alt on Linux/Windows, Option on macOS
    Alt,
    /// Command on macOS, Super/Windows elsewhere
    Meta,
    Space,
    Other,
}

impl Key {
    /// Resolve a macOS virtual key code. Left and right variants collapse.
    pub fn from_keycode(code: u16) -> Self {
        match code {
            keycodes::CONTROL | keycodes::RIGHT_CONTROL => Key::Control,
            keycodes::OPTION | keycodes::RIGHT_OPTION => Key::Alt,
            keycodes::COMMAND | keycodes::RIGHT_COMMAND => Key::Meta,
            keycodes::SPACE => Key::Space,
            _ => Key::Other,
        }
    }

    /// Whether this key is one of the tracked modifiers
    pub fn is_modifier(&self) -> bool {
        matches!(self, Key::Control | Key::Alt | Key::Meta)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Control => write!(f, "Control"),
            Key::Alt => write!(f, "Alt"),
            Key::Meta => write!(f, "Meta"),
            Key::Space => write!(f, "Space"),
            Key::Other => write!(f, "Other"),
        }
    }
}

/// Direction of a key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Down,
    Up,
}

/// A single key-down or key-up from the keyboard source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub transition: Transition,
}

impl KeyEvent {
    pub fn down(key: Key) -> Self {
        Self {
            key,
            transition: Transition::Down,
        }
    }

    pub fn up(key: Key) -> Self {
        Self {
            key,
            transition: Transition::Up,
        }
    }
}

/// Tracks which modifier keys are physically held
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    /// Control key is held
    pub control: bool,
    /// Option/Alt key is held
    pub alt: bool,
    /// Command/Meta key is held
    pub meta: bool,
}

impl ModifierState {
    /// Create a ModifierState from CGEventFlags
    #[cfg(target_os = "macos")]
    pub fn from_flags(cg_flags: core_graphics::event::CGEventFlags) -> Self {
        Self {
            control: cg_flags.contains(flags::CONTROL),
            alt: cg_flags.contains(flags::OPTION),
            meta: cg_flags.contains(flags::COMMAND),
        }
    }

    /// Record a transition. Non-modifier keys leave the state untouched.
    pub fn apply(&mut self, event: KeyEvent) {
        let held = event.transition == Transition::Down;
        match event.key {
            Key::Control => self.control = held,
            Key::Alt => self.alt = held,
            Key::Meta => self.meta = held,
            Key::Space | Key::Other => {}
        }
    }

    /// Whether the given modifier is currently held
    pub fn is_held(&self, key: Key) -> bool {
        match key {
            Key::Control => self.control,
            Key::Alt => self.alt,
            Key::Meta => self.meta,
            Key::Space | Key::Other => false,
        }
    }

    /// Control + Alt held together
    pub fn is_base_chord(&self) -> bool {
        self.control && self.alt
    }
}
