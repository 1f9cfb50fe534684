//! Top-level interview state machine
//!
//! One `SessionController` per interview attempt. It owns the connection
//! state and the timer, drives every other component through an explicit
//! lifecycle (`prepare` the media graph, `connect` to the agent, `run` the
//! dispatch loop), and funnels all teardown paths through a single `finish`
//! stage so stop requests, timer expiry, and transport failures cannot
//! double-release anything.

use anyhow::Result;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::InterviewConfig;
use super::lifecycle::{EndReason, EndReasonCell, Lifecycle};
use super::report::{EndMessage, EndReport};
use super::timer::{format_clock, spawn_countdown, TimerHandle, DEFAULT_INTERVIEW_SECS};
use super::transcript::{Speaker, TranscriptEntry, TranscriptLog};
use crate::api::InterviewBackend;
use crate::audio::{bytes_to_samples, run_encoder, AudioRouter, PlaybackQueue, RouterConfig, TransportArm};
use crate::audio::playback::OutputSink;
use crate::capture::CaptureBackend;
use crate::error::SessionError;
use crate::realtime::{AgentConnector, ClientSlot, ServerEvent, TransportError};
use crate::recording::{MuxConfig, MuxRecorder, RecordingCoordinator};

/// Engine-side settings for one attempt, independent of the fetched
/// interview configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Countdown duration in seconds.
    pub duration_secs: u64,
    pub router: RouterConfig,
    pub mux: MuxConfig,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_INTERVIEW_SECS,
            router: RouterConfig::default(),
            mux: MuxConfig::default(),
        }
    }
}

pub struct SessionController {
    /// Fetched interview configuration, immutable for the attempt.
    config: InterviewConfig,
    settings: SessionSettings,
    attempt_id: Uuid,

    /// Lifecycle broadcast; handles subscribe for status reads.
    lifecycle_tx: watch::Sender<Lifecycle>,

    /// Remaining-seconds broadcast. The sender moves into the countdown
    /// task when the session goes active.
    remaining_tx: Option<watch::Sender<u64>>,
    remaining_rx: watch::Receiver<u64>,

    /// Media graph, present from `prepare` until consumed by teardown.
    router: Option<AudioRouter>,
    playback: Option<PlaybackQueue>,
    coordinator: Option<RecordingCoordinator>,

    /// Live-connection cell shared with the encoder loop and handles.
    slot: ClientSlot,
    arm: TransportArm,

    transcript: TranscriptLog,
    /// Agent speech accumulated from transcript deltas, flushed at the next
    /// utterance boundary. Mutated only by the dispatch loop.
    current_utterance: Option<String>,

    timer: Option<TimerHandle>,
    report: EndReport,
    reason: EndReasonCell,

    connector: Arc<dyn AgentConnector>,
    backend: Arc<dyn InterviewBackend>,

    encoder_task: Option<JoinHandle<Result<(), SessionError>>>,
    started_at: Option<DateTime<Utc>>,
}

impl SessionController {
    pub fn new(
        config: InterviewConfig,
        settings: SessionSettings,
        connector: Arc<dyn AgentConnector>,
        backend: Arc<dyn InterviewBackend>,
    ) -> Self {
        let (lifecycle_tx, _) = watch::channel(Lifecycle::Idle);
        let (remaining_tx, remaining_rx) = watch::channel(settings.duration_secs);

        Self {
            config,
            settings,
            attempt_id: Uuid::new_v4(),
            lifecycle_tx,
            remaining_tx: Some(remaining_tx),
            remaining_rx,
            router: None,
            playback: None,
            coordinator: None,
            slot: ClientSlot::new(),
            arm: TransportArm::new(),
            transcript: TranscriptLog::new(),
            current_utterance: None,
            timer: None,
            report: EndReport::new(),
            reason: EndReasonCell::new(),
            connector,
            backend,
            encoder_task: None,
            started_at: None,
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle_tx.borrow()
    }

    fn set_lifecycle(&self, state: Lifecycle) {
        let previous = self.lifecycle_tx.send_replace(state);
        if previous != state {
            info!(attempt = %self.attempt_id, "session state: {:?} -> {:?}", previous, state);
        }
    }

    /// Acquire media and wire the routing graph. Corresponds to the
    /// permission grant: after this the microphone is live, the encoder
    /// loop is waiting (disarmed), and recording has started.
    pub async fn prepare(
        &mut self,
        capture: Box<dyn CaptureBackend>,
        sink: Box<dyn OutputSink>,
    ) -> Result<(), SessionError> {
        if self.router.is_some() {
            return Err(SessionError::InvalidState("media already prepared".into()));
        }

        let mut router = AudioRouter::build(capture, sink, self.settings.router.clone())
            .await
            .map_err(|e| {
                self.set_lifecycle(Lifecycle::Error);
                SessionError::Setup(e.to_string())
            })?;

        if let Some(transport_rx) = router.take_transport_feed() {
            self.encoder_task = Some(tokio::spawn(run_encoder(
                transport_rx,
                self.slot.clone(),
                self.arm.clone(),
            )));
        }

        // Recording is best-effort: a recorder that cannot start downgrades
        // the attempt, it never blocks the interview.
        let recorder = MuxRecorder::new(
            router.take_mixed_feed(),
            router.take_video_feed(),
            self.settings.mux.clone(),
        );
        let mut coordinator = RecordingCoordinator::new(
            self.config.code.clone(),
            Box::new(recorder),
            Arc::clone(&self.backend),
            self.report.clone(),
        );
        if let Err(e) = coordinator.start().await {
            warn!("Recording unavailable, continuing without archival: {}", e);
        }

        self.playback = Some(router.playback());
        self.router = Some(router);
        self.coordinator = Some(coordinator);

        info!(attempt = %self.attempt_id, code = %self.config.code, "media prepared");
        Ok(())
    }

    /// Open the agent connection and send the opening configuration.
    ///
    /// On a config-send failure the attempt stays retryable: the media
    /// graph is kept, the error is surfaced in the transcript, and the
    /// state returns to `Idle`.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        if self.lifecycle() != Lifecycle::Idle {
            return Err(SessionError::InvalidState(format!(
                "cannot connect from {:?}",
                self.lifecycle()
            )));
        }
        if self.router.is_none() {
            return Err(SessionError::InvalidState(
                "media not prepared; call prepare first".into(),
            ));
        }

        self.set_lifecycle(Lifecycle::Connecting);
        self.transcript
            .append(Speaker::System, "<< Connecting to interview session... >>")
            .await;

        let client = match self.connector.connect(&self.config).await {
            Ok(client) => Arc::new(client),
            Err(e) => return self.fail_config_send(e).await,
        };
        if let Err(e) = client.send_session_config(&self.config).await {
            client.close().await;
            return self.fail_config_send(e).await;
        }

        self.slot.set(client);
        debug!("session config sent, awaiting acknowledgement");
        Ok(())
    }

    async fn fail_config_send(&mut self, e: TransportError) -> Result<(), SessionError> {
        warn!("failed to send session config: {}", e);
        self.transcript
            .append(
                Speaker::System,
                "[Connection error]: Unable to send initial config message. \
                 Please check your endpoint and authentication details.",
            )
            .await;
        // Media permissions survive; the attempt may be retried.
        self.set_lifecycle(Lifecycle::Idle);
        Err(SessionError::ConfigSend(e.to_string()))
    }

    /// Observer/control handle for this attempt. Cheap to clone.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            code: self.config.code.clone(),
            attempt_id: self.attempt_id,
            lifecycle_rx: self.lifecycle_tx.subscribe(),
            remaining_rx: self.remaining_rx.clone(),
            transcript: self.transcript.clone(),
            report: self.report.clone(),
            slot: self.slot.clone(),
            reason: self.reason.clone(),
        }
    }

    /// Dispatch loop: consume inbound events in arrival order until the
    /// connection closes, then wind the attempt down. Consumes the
    /// controller; the returned summary is the attempt's final word.
    pub async fn run(mut self) -> InterviewSummary {
        if let Some(client) = self.slot.get() {
            while let Some(event) = client.next_event().await {
                self.dispatch(event).await;
            }
            debug!("event stream ended");
        }
        // Whoever actually caused the close recorded the reason first.
        self.reason.set(EndReason::StreamClosed);
        self.finish().await
    }

    async fn dispatch(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::SessionCreated => {
                if self.lifecycle() != Lifecycle::Connecting {
                    warn!("session acknowledgement in {:?}, ignoring", self.lifecycle());
                    return;
                }
                self.arm.arm();
                self.set_lifecycle(Lifecycle::Active);
                self.started_at = Some(Utc::now());
                if let Some(remaining_tx) = self.remaining_tx.take() {
                    self.timer = Some(spawn_countdown(
                        self.settings.duration_secs,
                        remaining_tx,
                        self.transcript.clone(),
                        self.reason.clone(),
                        self.slot.clone(),
                    ));
                }
                self.transcript
                    .append(Speaker::System, "<< Session Started >>")
                    .await;
            }
            ServerEvent::AudioTranscriptDelta { delta } => {
                self.current_utterance
                    .get_or_insert_with(String::new)
                    .push_str(&delta);
            }
            ServerEvent::AudioDelta { delta } => {
                match base64::engine::general_purpose::STANDARD.decode(delta.as_bytes()) {
                    Ok(bytes) => {
                        if let Some(playback) = &self.playback {
                            let samples = bytes_to_samples(&bytes);
                            if let Err(e) = playback.enqueue(samples).await {
                                warn!("failed to enqueue agent audio: {}", e);
                            }
                        }
                    }
                    Err(e) => warn!("undecodable audio delta: {}", e),
                }
            }
            ServerEvent::SpeechStarted => {
                // Barge-in: cut any queued agent audio immediately.
                if let Some(playback) = &self.playback {
                    playback.clear();
                }
            }
            ServerEvent::InputTranscriptionCompleted { transcript } => {
                self.flush_utterance().await;
                self.transcript.append(Speaker::User, transcript).await;
            }
            ServerEvent::ResponseDone => {
                // Not an utterance boundary: a follow-up delta continues the
                // same agent entry.
                debug!("agent response turn complete");
            }
            ServerEvent::Unknown { kind } => {
                debug!("unhandled event type: {}", kind);
            }
        }
    }

    async fn flush_utterance(&mut self) {
        if let Some(text) = self.current_utterance.take() {
            if !text.trim().is_empty() {
                self.transcript.append(Speaker::Agent, text).await;
            }
        }
    }

    /// The single teardown path. Every step tolerates having already been
    /// done, so racing end causes (stop, expiry, stream close) converge
    /// here safely.
    async fn finish(mut self) -> InterviewSummary {
        self.set_lifecycle(Lifecycle::Ended);
        self.arm.disarm();

        if let Some(client) = self.slot.clear() {
            client.close().await;
        }
        if let Some(timer) = self.timer.take() {
            timer.stop().await;
        }
        self.flush_utterance().await;

        self.report
            .set("Interview Ended. Processing recording...", false);

        let transcription = self.transcript.render_text().await;
        let upload = self
            .coordinator
            .as_mut()
            .and_then(|coordinator| coordinator.stop(transcription));

        // Closing the media graph ends the chunk stream, which is what lets
        // the recording finalize and the upload proceed.
        if let Some(router) = self.router.as_mut() {
            router.teardown().await;
        }
        if let Some(encoder) = self.encoder_task.take() {
            match encoder.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("encoder stopped early: {}", e),
                Err(e) => warn!("encoder task panicked: {}", e),
            }
        }
        if let Some(upload) = upload {
            if let Err(e) = upload.await {
                warn!("upload task panicked: {}", e);
            }
        }

        let end_reason = self.reason.get();
        info!(
            attempt = %self.attempt_id,
            code = %self.config.code,
            reason = ?end_reason,
            "interview ended"
        );

        InterviewSummary {
            attempt_id: self.attempt_id,
            code: self.config.code.clone(),
            end_reason,
            started_at: self.started_at,
            ended_at: Utc::now(),
            transcript_entries: self.transcript.len().await,
            end_message: self.report.current(),
        }
    }
}

/// Clonable observer/control surface for a running attempt.
#[derive(Clone)]
pub struct SessionHandle {
    code: String,
    attempt_id: Uuid,
    lifecycle_rx: watch::Receiver<Lifecycle>,
    remaining_rx: watch::Receiver<u64>,
    transcript: TranscriptLog,
    report: EndReport,
    slot: ClientSlot,
    reason: EndReasonCell,
}

impl SessionHandle {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle_rx.borrow()
    }

    pub fn remaining_secs(&self) -> u64 {
        *self.remaining_rx.borrow()
    }

    /// Countdown as displayed to the candidate.
    pub fn timer_display(&self) -> String {
        format_clock(self.remaining_secs())
    }

    /// Request the interview to end. Closing the connection unwinds the
    /// dispatch loop; repeated stops are no-ops.
    pub async fn stop(&self) {
        self.reason.set(EndReason::UserStop);
        if let Some(client) = self.slot.get() {
            client.close().await;
        }
    }

    pub async fn transcript(&self) -> Vec<TranscriptEntry> {
        self.transcript.snapshot().await
    }

    pub fn end_message(&self) -> Option<EndMessage> {
        self.report.current()
    }

    pub async fn status(&self) -> SessionStatus {
        SessionStatus {
            code: self.code.clone(),
            attempt_id: self.attempt_id,
            lifecycle: self.lifecycle(),
            remaining_secs: self.remaining_secs(),
            timer_display: self.timer_display(),
            connected: self.slot.is_connected(),
            transcript_entries: self.transcript.len().await,
            end_reason: self.reason.get(),
            end_message: self.end_message(),
        }
    }
}

/// Point-in-time view of an attempt, shaped for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub code: String,
    pub attempt_id: Uuid,
    pub lifecycle: Lifecycle,
    pub remaining_secs: u64,
    pub timer_display: String,
    pub connected: bool,
    pub transcript_entries: usize,
    pub end_reason: Option<EndReason>,
    pub end_message: Option<EndMessage>,
}

/// Final word on one attempt, produced when the dispatch loop exits.
#[derive(Debug, Clone, Serialize)]
pub struct InterviewSummary {
    pub attempt_id: Uuid,
    pub code: String,
    pub end_reason: Option<EndReason>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
    pub transcript_entries: usize,
    pub end_message: Option<EndMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryBackend;
    use crate::audio::CollectSink;
    use crate::capture::{CaptureConfig, SilenceBackend};
    use crate::realtime::transport::channel_pair;
    use crate::realtime::AgentClient;

    struct RefusingConnector;

    #[async_trait::async_trait]
    impl AgentConnector for RefusingConnector {
        async fn connect(&self, _: &InterviewConfig) -> Result<AgentClient, TransportError> {
            Err(TransportError::Connect("connection refused".into()))
        }
    }

    struct ClosedTransportConnector;

    #[async_trait::async_trait]
    impl AgentConnector for ClosedTransportConnector {
        async fn connect(&self, _: &InterviewConfig) -> Result<AgentClient, TransportError> {
            let (transport, peer) = channel_pair(4);
            drop(peer);
            Ok(AgentClient::new(Box::new(transport)))
        }
    }

    fn test_config() -> InterviewConfig {
        InterviewConfig {
            code: "tide".to_string(),
            endpoint: "wss://example.test/realtime".to_string(),
            api_key: "secret".to_string(),
            deployment: "gpt-4o-realtime".to_string(),
            system_prompt: "Ask about X".to_string(),
            voice: "coral".to_string(),
            temperature: None,
        }
    }

    fn silence_capture() -> Box<dyn CaptureBackend> {
        Box::new(SilenceBackend::new(CaptureConfig {
            frame_duration_ms: 10,
            ..CaptureConfig::default()
        }))
    }

    fn controller(connector: Arc<dyn AgentConnector>) -> SessionController {
        SessionController::new(
            test_config(),
            SessionSettings::default(),
            connector,
            Arc::new(MemoryBackend::new()),
        )
    }

    #[tokio::test]
    async fn test_connect_requires_prepared_media() {
        let mut controller = controller(Arc::new(RefusingConnector));
        let err = controller.connect().await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidState(_)));
        assert_eq!(controller.lifecycle(), Lifecycle::Idle);
    }

    #[tokio::test]
    async fn test_config_send_failure_keeps_media_for_retry() {
        let mut controller = controller(Arc::new(ClosedTransportConnector));
        controller
            .prepare(silence_capture(), Box::new(CollectSink::new()))
            .await
            .unwrap();

        let err = controller.connect().await.unwrap_err();
        assert!(matches!(err, SessionError::ConfigSend(_)));
        assert!(err.keeps_media());

        // Back to Idle with the media graph intact and the error visible.
        assert_eq!(controller.lifecycle(), Lifecycle::Idle);
        assert!(controller.router.is_some());
        assert!(!controller.router.as_ref().unwrap().is_torn_down());
        let entries = controller.transcript.snapshot().await;
        assert!(entries
            .iter()
            .any(|e| e.text.starts_with("[Connection error]")));

        // A retry is allowed from here.
        let err = controller.connect().await.unwrap_err();
        assert!(matches!(err, SessionError::ConfigSend(_)));

        // Manual unwind so capture tasks do not outlive the test.
        controller.run().await;
    }

    #[tokio::test]
    async fn test_connect_refused_reports_and_stays_idle() {
        let mut controller = controller(Arc::new(RefusingConnector));
        controller
            .prepare(silence_capture(), Box::new(CollectSink::new()))
            .await
            .unwrap();

        let err = controller.connect().await.unwrap_err();
        assert!(matches!(err, SessionError::ConfigSend(_)));
        assert_eq!(controller.lifecycle(), Lifecycle::Idle);

        controller.run().await;
    }

    #[tokio::test]
    async fn test_prepare_twice_rejected() {
        let mut controller = controller(Arc::new(RefusingConnector));
        controller
            .prepare(silence_capture(), Box::new(CollectSink::new()))
            .await
            .unwrap();
        let err = controller
            .prepare(silence_capture(), Box::new(CollectSink::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidState(_)));

        controller.run().await;
    }

    #[tokio::test]
    async fn test_run_without_connect_ends_cleanly() {
        let mut controller = controller(Arc::new(RefusingConnector));
        controller
            .prepare(silence_capture(), Box::new(CollectSink::new()))
            .await
            .unwrap();

        let handle = controller.handle();
        let summary = controller.run().await;
        assert_eq!(handle.lifecycle(), Lifecycle::Ended);
        assert_eq!(summary.code, "tide");
        assert!(summary.started_at.is_none());
    }
}
