//! Interview provisioning backend
//!
//! The backend owns interview codes: it hands out the per-code agent
//! configuration before the session and receives the recording and
//! transcription after it. [`InterviewBackend`] is the seam; the HTTP
//! implementation talks to the real service and [`MemoryBackend`] stands in
//! for it in tests and local runs.

pub mod client;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::recording::FinalRecording;
use crate::session::InterviewConfig;

pub use client::BackendClient;
pub use memory::{MemoryBackend, StoredUpload};

#[derive(Debug, Error)]
pub enum BackendError {
    /// The code does not name a provisioned interview.
    #[error("Invalid interview code.")]
    InvalidCode,

    /// The backend answered but the configuration is unusable.
    #[error("Invalid configuration received from server.")]
    InvalidConfig,

    /// The backend rejected the request; the message is user-facing.
    #[error("{0}")]
    Server(String),

    /// The backend was unreachable.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Provisioning service for interview attempts.
#[async_trait]
pub trait InterviewBackend: Send + Sync {
    /// Exchange an interview code for the agent configuration. The returned
    /// config carries the code and has passed completeness validation.
    async fn fetch_config(&self, code: &str) -> Result<InterviewConfig, BackendError>;

    /// Submit the sealed recording and rendered transcription for a
    /// completed interview.
    async fn submit_recording(
        &self,
        recording: FinalRecording,
        transcription: String,
    ) -> Result<(), BackendError>;
}
