use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Interview attempt states.
///
/// `Idle -> Connecting -> Active -> Ended`, with `Error` reachable from the
/// setup states. `Ended` and `Error` are terminal for an attempt; a new
/// attempt means a fresh controller and a re-fetched config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Idle,
    Connecting,
    Active,
    Ended,
    Error,
}

impl Lifecycle {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Lifecycle::Ended | Lifecycle::Error)
    }
}

/// Why an interview ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The candidate (or an operator) stopped the interview.
    UserStop,
    /// The countdown reached zero.
    TimeLimit,
    /// The agent closed the stream or the transport failed.
    StreamClosed,
}

/// First-writer-wins cell recording why the interview ended.
///
/// Multiple paths race to end a session (stop request, timer expiry, the
/// stream closing); the first one to record a reason is the cause, and the
/// others observing the closed connection must not overwrite it.
#[derive(Clone, Default)]
pub struct EndReasonCell {
    inner: Arc<Mutex<Option<EndReason>>>,
}

impl EndReasonCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, reason: EndReason) {
        if let Ok(mut slot) = self.inner.lock() {
            if slot.is_none() {
                *slot = Some(reason);
            }
        }
    }

    pub fn get(&self) -> Option<EndReason> {
        self.inner.lock().ok().and_then(|slot| *slot)
    }
}
