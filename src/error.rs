use thiserror::Error;

use crate::api::BackendError;

/// Failure classes for one interview attempt.
///
/// None of these are fatal to the host process; each degrades to a visible
/// state or message. The variants differ in what survives the failure:
/// a config-send failure keeps the media graph alive for a retry, a setup
/// failure leaves nothing to tear down, and a recording failure lets the
/// interview itself continue.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Media devices could not be acquired or wired up.
    #[error("media setup failed: {0}")]
    Setup(String),

    /// The initial configuration message never reached the agent. Media
    /// permissions are preserved; the attempt may be retried.
    #[error("failed to send session configuration: {0}")]
    ConfigSend(String),

    /// The realtime connection failed mid-session. Raised by the encoder
    /// loop when an audio send fails on a connection nobody closed.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The local recorder could not start. The interview proceeds without
    /// archival capability.
    #[error("recording setup failed: {0}")]
    RecordingSetup(String),

    /// Submitting the finished recording failed. Terminal, not retried;
    /// the display text is what the end screen shows.
    #[error("{}", upload_message(.0))]
    Upload(#[source] BackendError),

    /// The controller was asked to do something its lifecycle does not allow.
    #[error("invalid session state: {0}")]
    InvalidState(String),
}

impl SessionError {
    /// Whether already-granted media devices stay usable after this error.
    pub fn keeps_media(&self) -> bool {
        matches!(
            self,
            SessionError::ConfigSend(_) | SessionError::RecordingSetup(_) | SessionError::Upload(_)
        )
    }
}

fn upload_message(error: &BackendError) -> String {
    match error {
        BackendError::Network(_) => "Network error during upload.".to_string(),
        other => format!("Failed to upload interview data: {}", other),
    }
}
