//! In-memory backend for tests and offline runs

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use super::{BackendError, InterviewBackend};
use crate::recording::FinalRecording;
use crate::session::InterviewConfig;

/// One accepted upload, kept verbatim for assertions.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub code: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub transcription: String,
}

/// [`InterviewBackend`] over process memory. Seed it with configs, then
/// inspect what was uploaded.
#[derive(Default)]
pub struct MemoryBackend {
    configs: Mutex<HashMap<String, InterviewConfig>>,
    uploads: Mutex<Vec<StoredUpload>>,
    upload_attempts: Mutex<usize>,
    reject_message: Option<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a provisioned interview, keyed by its code.
    pub fn with_interview(self, config: InterviewConfig) -> Self {
        if let Ok(mut configs) = self.configs.try_lock() {
            configs.insert(config.code.clone(), config);
        }
        self
    }

    /// Make every upload fail with the given backend message.
    pub fn reject_uploads(mut self, message: impl Into<String>) -> Self {
        self.reject_message = Some(message.into());
        self
    }

    pub async fn uploads(&self) -> Vec<StoredUpload> {
        self.uploads.lock().await.clone()
    }

    pub async fn upload_attempts(&self) -> usize {
        *self.upload_attempts.lock().await
    }
}

#[async_trait]
impl InterviewBackend for MemoryBackend {
    async fn fetch_config(&self, code: &str) -> Result<InterviewConfig, BackendError> {
        let configs = self.configs.lock().await;
        let Some(config) = configs.get(code) else {
            return Err(BackendError::InvalidCode);
        };

        let mut config = config.clone();
        config.code = code.to_string();
        if config.validate().is_err() {
            return Err(BackendError::InvalidConfig);
        }
        Ok(config)
    }

    async fn submit_recording(
        &self,
        recording: FinalRecording,
        transcription: String,
    ) -> Result<(), BackendError> {
        *self.upload_attempts.lock().await += 1;

        if let Some(message) = &self.reject_message {
            return Err(BackendError::Server(message.clone()));
        }

        debug!(
            "Storing upload for {}: {} bytes",
            recording.code,
            recording.size_bytes()
        );
        self.uploads.lock().await.push(StoredUpload {
            code: recording.code.clone(),
            file_name: recording.file_name(),
            bytes: recording.bytes,
            transcription,
        });
        Ok(())
    }
}
