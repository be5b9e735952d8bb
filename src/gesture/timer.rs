//! Grace period timer port
//!
//! The recognizer never sleeps itself. It arms a [`GraceTimer`] with a
//! token and is told later, through its owner, that the token expired.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::engine::EngineInput;

/// Identifies one arming of the grace timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken(pub u64);

/// A cancellable one-shot timer
///
/// At most one arming is live: `arm` replaces whatever was pending.
pub trait GraceTimer {
    fn arm(&mut self, duration: Duration, token: TimerToken);
    fn cancel(&mut self);
}

/// Tokio-backed timer that posts expiries into the engine queue
///
/// Expiry is delivered as [`EngineInput::GraceExpired`], so it is
/// serialized with key events on the engine task. Holds only a weak
/// sender so a pending timer never keeps the queue open.
pub struct TokioGraceTimer {
    input_tx: mpsc::WeakSender<EngineInput>,
    pending: Option<JoinHandle<()>>,
}

impl TokioGraceTimer {
    pub fn new(input_tx: &mpsc::Sender<EngineInput>) -> Self {
        Self {
            input_tx: input_tx.downgrade(),
            pending: None,
        }
    }
}

impl GraceTimer for TokioGraceTimer {
    fn arm(&mut self, duration: Duration, token: TimerToken) {
        self.cancel();

        let input_tx = self.input_tx.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let Some(input_tx) = input_tx.upgrade() else {
                return;
            };
            if input_tx.send(EngineInput::GraceExpired(token)).await.is_err() {
                debug!(?token, "engine gone before grace expiry");
            }
        }));
    }

    fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

impl Drop for TokioGraceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Virtual-time timer for deterministic tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ManualTimer {
    now: Duration,
    armed: Option<(Duration, TimerToken)>,
    pub arms: usize,
    pub cancels: usize,
}

#[cfg(test)]
impl ManualTimer {
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Time left until the armed deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.armed
            .map(|(deadline, _)| deadline.saturating_sub(self.now))
    }

    /// Move virtual time forward, returning the token if the deadline passed
    pub fn advance(&mut self, by: Duration) -> Option<TimerToken> {
        self.now += by;
        match self.armed {
            Some((deadline, token)) if deadline <= self.now => {
                self.armed = None;
                Some(token)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
impl GraceTimer for ManualTimer {
    fn arm(&mut self, duration: Duration, token: TimerToken) {
        self.armed = Some((self.now + duration, token));
        self.arms += 1;
    }

    fn cancel(&mut self) {
        if self.armed.take().is_some() {
            self.cancels += 1;
        }
    }
}
