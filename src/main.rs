//! chord-daemon: turns global modifier-key chords into voice capture commands
//!
//! The daemon provides:
//! - Global key capture via CGEventTap
//! - A gesture recognizer mapping Control/Alt/Meta/Space chords to
//!   recording, hands-free and command-mode signals
//! - A controller holding the consumer-side session state
//!
//! Audio capture, transcription and text insertion live elsewhere; they
//! consume the commands this daemon emits.

mod commands;
mod config;
mod controller;
mod gesture;
mod hotkey;
mod lifecycle;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::Command;
use crate::config::Config;
use crate::controller::Controller;
use crate::gesture::{EngineInput, GestureEngine};
use crate::hotkey::HotkeyListener;
use crate::lifecycle::{LifecycleSignal, SignalListener};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        grace_ms = config.grace_period.as_millis() as u64,
        emit_json = config.emit_json,
        "chord-daemon starting"
    );

    let mut signals = SignalListener::new().context("failed to register signal handlers")?;

    // Key listener -> engine
    let (hotkey_tx, hotkey_rx) = mpsc::channel(32);
    // Timer expiries, toggle requests -> engine
    let (input_tx, input_rx) = mpsc::channel::<EngineInput>(32);
    // Engine -> consumers
    let (command_tx, _) = broadcast::channel::<Command>(64);

    if config.emit_json {
        tokio::spawn(controller::write_json_lines(command_tx.subscribe()));
    }

    let controller = Controller::new(command_tx);
    let mut engine = GestureEngine::new(controller, &input_tx, config.grace_period);

    let hotkey_listener = HotkeyListener::new(hotkey_tx);
    match hotkey_listener.start() {
        Ok(()) => {
            info!("hotkey listener started");
        }
        Err(e) => {
            error!(?e, "failed to start hotkey listener");
            warn!("continuing without hotkey support - check Accessibility permissions");
        }
    }

    info!("daemon initialized, entering main loop");

    tokio::select! {
        _ = engine.run(hotkey_rx, input_rx) => {
            info!("gesture engine exited");
        }

        _ = async {
            loop {
                match signals.next().await {
                    LifecycleSignal::ToggleRecording => {
                        info!("toggle recording requested");
                        if input_tx.send(EngineInput::ToggleRecording).await.is_err() {
                            break;
                        }
                    }
                    LifecycleSignal::Shutdown => break,
                }
            }
        } => {
            info!("shutdown signal received");
        }
    }

    info!("shutting down...");

    hotkey_listener.stop();

    info!(state = ?engine.session(), "chord-daemon stopped");

    Ok(())
}
