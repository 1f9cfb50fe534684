//! Recording lifecycle driver
//!
//! Owns artifact assembly for one interview attempt: starts the recorder,
//! appends chunks in arrival order from a single task, and on stop waits for
//! the chunk stream to finalize before sealing and uploading. The upload is
//! best-effort: an empty artifact skips it with a warning, a failed one is
//! reported and never retried, and neither outcome disturbs the rest of the
//! session teardown.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::artifact::RecordingArtifact;
use super::mux::MediaRecorder;
use crate::api::InterviewBackend;
use crate::error::SessionError;
use crate::session::EndReport;

pub struct RecordingCoordinator {
    code: String,
    recorder: Box<dyn MediaRecorder>,
    backend: Arc<dyn InterviewBackend>,
    report: EndReport,
    append_task: Option<JoinHandle<RecordingArtifact>>,
}

impl RecordingCoordinator {
    pub fn new(
        code: impl Into<String>,
        recorder: Box<dyn MediaRecorder>,
        backend: Arc<dyn InterviewBackend>,
        report: EndReport,
    ) -> Self {
        Self {
            code: code.into(),
            recorder,
            backend,
            report,
            append_task: None,
        }
    }

    /// Start recording. On failure the interview proceeds without archival
    /// capability; the caller decides how loudly to warn.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        let mut chunk_rx = self
            .recorder
            .start()
            .await
            .map_err(|e| SessionError::RecordingSetup(e.to_string()))?;

        let code = self.code.clone();
        // Sole writer of the artifact; the stream closing is the recorder's
        // finalize signal.
        self.append_task = Some(tokio::spawn(async move {
            let mut artifact = RecordingArtifact::new(code);
            while let Some(chunk) = chunk_rx.recv().await {
                artifact.append(chunk);
            }
            info!("Recording finalized: {} chunks", artifact.chunk_count());
            artifact
        }));

        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.append_task.is_some()
    }

    /// Stop recording and hand off to upload.
    ///
    /// Finalization is asynchronous: the returned task completes only after
    /// the chunk stream has drained (the media feeds must be closed for that
    /// to happen) and the upload outcome has been written to the report.
    /// Returns `None` when recording never started.
    pub fn stop(&mut self, transcription: String) -> Option<JoinHandle<()>> {
        let append_task = self.append_task.take()?;
        let backend = Arc::clone(&self.backend);
        let report = self.report.clone();

        Some(tokio::spawn(async move {
            let artifact = match append_task.await {
                Ok(artifact) => artifact,
                Err(e) => {
                    warn!("recording append task failed: {}", e);
                    report.set("Warning: No recording data captured to upload.", false);
                    return;
                }
            };

            if artifact.is_empty() {
                warn!("Skipping upload: recording artifact is empty");
                report.set("Warning: No recording data captured to upload.", false);
                return;
            }

            let recording = artifact.finalize();
            info!(
                chunks = recording.chunk_count,
                bytes = recording.size_bytes(),
                "Uploading interview recording"
            );

            match backend.submit_recording(recording, transcription).await {
                Ok(()) => {
                    info!("Upload complete");
                    report.set("Interview data uploaded successfully.", false);
                }
                Err(e) => {
                    warn!("Upload failed: {}", e);
                    // The typed failure carries the end-screen wording.
                    let failure = SessionError::Upload(e);
                    report.set(failure.to_string(), true);
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryBackend;
    use crate::recording::artifact::{MediaChunk, MediaKind};
    use anyhow::Result;
    use tokio::sync::mpsc;

    struct ScriptedRecorder {
        chunks: Vec<MediaChunk>,
    }

    #[async_trait::async_trait]
    impl MediaRecorder for ScriptedRecorder {
        async fn start(&mut self) -> Result<mpsc::Receiver<MediaChunk>> {
            let (tx, rx) = mpsc::channel(32);
            let chunks = std::mem::take(&mut self.chunks);
            tokio::spawn(async move {
                for chunk in chunks {
                    if tx.send(chunk).await.is_err() {
                        return;
                    }
                }
            });
            Ok(rx)
        }
    }

    struct BrokenRecorder;

    #[async_trait::async_trait]
    impl MediaRecorder for BrokenRecorder {
        async fn start(&mut self) -> Result<mpsc::Receiver<MediaChunk>> {
            anyhow::bail!("device busy")
        }
    }

    #[tokio::test]
    async fn test_empty_recording_skips_upload() {
        let backend = Arc::new(MemoryBackend::new());
        let report = EndReport::new();
        let mut coordinator = RecordingCoordinator::new(
            "tide",
            Box::new(ScriptedRecorder { chunks: vec![] }),
            backend.clone(),
            report.clone(),
        );

        coordinator.start().await.unwrap();
        let upload = coordinator.stop("transcript".to_string()).unwrap();
        upload.await.unwrap();

        assert!(backend.uploads().await.is_empty());
        let message = report.current().unwrap();
        assert_eq!(message.text, "Warning: No recording data captured to upload.");
        assert!(!message.is_error);
    }

    #[tokio::test]
    async fn test_chunks_uploaded_in_order() {
        let backend = Arc::new(MemoryBackend::new());
        let report = EndReport::new();
        let chunks = vec![
            MediaChunk::audio(0, vec![1, 1]),
            MediaChunk::video(20, vec![2]),
            MediaChunk::audio(1000, vec![3, 3]),
        ];
        let mut coordinator = RecordingCoordinator::new(
            "tide",
            Box::new(ScriptedRecorder { chunks }),
            backend.clone(),
            report.clone(),
        );

        coordinator.start().await.unwrap();
        assert!(coordinator.is_recording());
        let upload = coordinator.stop("AI: Hello".to_string()).unwrap();
        upload.await.unwrap();

        let uploads = backend.uploads().await;
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].code, "tide");
        assert_eq!(uploads[0].transcription, "AI: Hello");
        assert_eq!(uploads[0].file_name, "tide-recording.mlog");

        let decoded = MediaChunk::decode_all(&uploads[0].bytes).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].kind, MediaKind::Audio);
        assert_eq!(decoded[1].kind, MediaKind::Video);
        assert_eq!(decoded[2].timestamp_ms, 1000);

        let message = report.current().unwrap();
        assert_eq!(message.text, "Interview data uploaded successfully.");
        assert!(!message.is_error);
    }

    #[tokio::test]
    async fn test_upload_rejection_reported_not_retried() {
        let backend = Arc::new(MemoryBackend::new().reject_uploads("Error saving interview data."));
        let report = EndReport::new();
        let mut coordinator = RecordingCoordinator::new(
            "tide",
            Box::new(ScriptedRecorder {
                chunks: vec![MediaChunk::audio(0, vec![1])],
            }),
            backend.clone(),
            report.clone(),
        );

        coordinator.start().await.unwrap();
        let upload = coordinator.stop(String::new()).unwrap();
        upload.await.unwrap();

        assert_eq!(backend.upload_attempts().await, 1);
        let message = report.current().unwrap();
        assert_eq!(
            message.text,
            "Failed to upload interview data: Error saving interview data."
        );
        assert!(message.is_error);
    }

    #[test]
    fn test_coordinator_is_shareable_across_tasks() {
        // Handler futures hold the coordinator across await points, which
        // needs the boxed recorder to be Sync as well as Send.
        fn assert_shareable<T: Send + Sync>() {}
        assert_shareable::<RecordingCoordinator>();
        assert_shareable::<Box<dyn MediaRecorder>>();
    }

    #[tokio::test]
    async fn test_recorder_start_failure_is_recording_setup() {
        let backend = Arc::new(MemoryBackend::new());
        let mut coordinator = RecordingCoordinator::new(
            "tide",
            Box::new(BrokenRecorder),
            backend,
            EndReport::new(),
        );

        let err = coordinator.start().await.unwrap_err();
        assert!(matches!(err, SessionError::RecordingSetup(_)));
        assert!(!coordinator.is_recording());
        assert!(coordinator.stop(String::new()).is_none());
    }
}
