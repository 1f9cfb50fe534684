//! Interview session management

pub mod config;
pub mod controller;
pub mod lifecycle;
pub mod report;
pub mod timer;
pub mod transcript;

pub use config::InterviewConfig;
pub use controller::{
    InterviewSummary, SessionController, SessionHandle, SessionSettings, SessionStatus,
};
pub use lifecycle::{EndReason, EndReasonCell, Lifecycle};
pub use report::{EndMessage, EndReport};
pub use timer::{
    format_clock, spawn_countdown, InterviewTimer, TimerHandle, TimerTick, DEFAULT_INTERVIEW_SECS,
};
pub use transcript::{Speaker, TranscriptEntry, TranscriptLog};
