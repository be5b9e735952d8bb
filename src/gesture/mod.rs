//! Gesture module: chord recognition and its runtime
//!
//! - `recognizer`: the pure state machine over key transitions
//! - `timer`: the grace period timer port and its tokio implementation
//! - `handler`: the callback interface commands are emitted through
//! - `engine`: the task that owns the recognizer and serializes its inputs

mod engine;
mod handler;
mod recognizer;
mod timer;

pub use engine::{EngineInput, GestureEngine};
pub use handler::CommandHandler;
pub use recognizer::DEFAULT_GRACE_PERIOD;
