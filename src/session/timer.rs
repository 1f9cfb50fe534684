//! Interview countdown
//!
//! One countdown per interview attempt. The pure [`InterviewTimer`] holds
//! the tick arithmetic (and the exactly-one-expiry guarantee); the spawned
//! countdown task wires it to wall-clock ticks, publishes remaining seconds,
//! and forces the session shut when time runs out.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use super::lifecycle::{EndReason, EndReasonCell};
use super::transcript::{Speaker, TranscriptLog};
use crate::realtime::ClientSlot;

pub const DEFAULT_INTERVIEW_SECS: u64 = 15 * 60;

/// Outcome of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    Running { remaining_secs: u64 },
    /// The tick that crossed zero. Produced at most once per timer.
    Expired,
    /// Any tick after expiry.
    Spent,
}

/// Tick arithmetic for the countdown.
#[derive(Debug)]
pub struct InterviewTimer {
    remaining_secs: u64,
    expired: bool,
}

impl InterviewTimer {
    pub fn new(duration_secs: u64) -> Self {
        Self {
            remaining_secs: duration_secs,
            expired: false,
        }
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn tick(&mut self) -> TimerTick {
        if self.expired {
            return TimerTick::Spent;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.expired = true;
            TimerTick::Expired
        } else {
            TimerTick::Running {
                remaining_secs: self.remaining_secs,
            }
        }
    }
}

/// Remaining time as the countdown reads on screen, e.g. "15:00", "0:07".
pub fn format_clock(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Running countdown task handle.
pub struct TimerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Stop the countdown without expiring it.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }
}

/// Start the countdown. On expiry it logs the time-limit message, records
/// the end reason, and closes the live connection, which unwinds the rest
/// of the session.
pub fn spawn_countdown(
    duration_secs: u64,
    remaining_tx: watch::Sender<u64>,
    transcript: TranscriptLog,
    reason: EndReasonCell,
    slot: ClientSlot,
) -> TimerHandle {
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let _ = remaining_tx.send(duration_secs);

    let task = tokio::spawn(async move {
        let mut timer = InterviewTimer::new(duration_secs);
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        // The first tick completes immediately; the countdown starts one
        // second later.
        interval.tick().await;

        loop {
            tokio::select! {
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => match timer.tick() {
                    TimerTick::Running { remaining_secs } => {
                        let _ = remaining_tx.send(remaining_secs);
                    }
                    TimerTick::Expired => {
                        let _ = remaining_tx.send(0);
                        info!("Interview time limit reached, ending session");
                        transcript
                            .append(Speaker::System, "<< Time Limit Reached >>")
                            .await;
                        reason.set(EndReason::TimeLimit);
                        if let Some(client) = slot.get() {
                            client.close().await;
                        }
                        break;
                    }
                    TimerTick::Spent => break,
                },
            }
        }
    });

    TimerHandle { stop_tx, task }
}
