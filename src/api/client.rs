//! HTTP implementation of the interview backend

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{BackendError, InterviewBackend};
use crate::recording::{FinalRecording, RECORDING_CONTENT_TYPE};
use crate::session::InterviewConfig;

/// Error payload shape shared by every backend route.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn config_url(&self, code: &str) -> String {
        format!("{}/api/interview/{}/config", self.base_url, code)
    }

    fn complete_url(&self, code: &str) -> String {
        format!("{}/api/interview/{}/complete", self.base_url, code)
    }

    /// Pull the user-facing message out of an error response, falling back
    /// to the supplied default when the body is not the expected shape.
    async fn error_message(response: reqwest::Response, fallback: &str) -> String {
        match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => fallback.to_string(),
        }
    }
}

#[async_trait]
impl InterviewBackend for BackendClient {
    async fn fetch_config(&self, code: &str) -> Result<InterviewConfig, BackendError> {
        let url = self.config_url(code);
        debug!("Fetching interview config from {}", url);

        let response = self.http.get(&url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::InvalidCode);
        }
        if !status.is_success() {
            let message =
                Self::error_message(response, &format!("Error: {}", status.as_u16())).await;
            warn!("Config fetch failed ({}): {}", status, message);
            return Err(BackendError::Server(message));
        }

        let mut config: InterviewConfig = response
            .json()
            .await
            .map_err(|_| BackendError::InvalidConfig)?;
        // The backend omits the code from its payload; the caller's code is
        // authoritative.
        config.code = code.to_string();
        if config.validate().is_err() {
            warn!("Incomplete configuration received for code {}", code);
            return Err(BackendError::InvalidConfig);
        }

        info!("Interview configuration received for code {}", code);
        Ok(config)
    }

    async fn submit_recording(
        &self,
        recording: FinalRecording,
        transcription: String,
    ) -> Result<(), BackendError> {
        let url = self.complete_url(&recording.code);
        let file_name = recording.file_name();
        info!(
            "Uploading recording to {} ({} bytes, {} chunks)",
            url,
            recording.size_bytes(),
            recording.chunk_count
        );

        let recording_part = Part::bytes(recording.bytes)
            .file_name(file_name)
            .mime_str(RECORDING_CONTENT_TYPE)
            .map_err(|e| BackendError::Server(format!("invalid recording part: {}", e)))?;
        let form = Form::new()
            .part("recording", recording_part)
            .text("transcription", transcription);

        let response = self.http.post(&url).multipart(form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = Self::error_message(response, "Unknown upload error").await;
            warn!("Upload rejected ({}): {}", status, message);
            return Err(BackendError::Server(message));
        }

        info!("Recording upload accepted");
        Ok(())
    }
}
