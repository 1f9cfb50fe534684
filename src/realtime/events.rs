//! Typed events for the realtime agent protocol
//!
//! Field names and event type tags follow the realtime speech API wire
//! format, so these types serialize directly to the JSON a live endpoint
//! expects.

use serde::{Deserialize, Serialize};

use crate::session::InterviewConfig;

/// Voice activity detection settings sent with the session config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self {
            kind: "server_vad".to_string(),
        }
    }
}

/// Input transcription settings sent with the session config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputTranscription {
    pub model: String,
}

impl Default for InputTranscription {
    fn default() -> Self {
        Self {
            model: "whisper-1".to_string(),
        }
    }
}

/// The `session` payload of a `session.update` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfigPayload {
    pub turn_detection: TurnDetection,
    pub input_audio_transcription: InputTranscription,
    pub instructions: String,
    pub voice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl SessionConfigPayload {
    /// Build the opening config from an interview's settings.
    pub fn for_interview(config: &InterviewConfig) -> Self {
        Self {
            turn_detection: TurnDetection::default(),
            input_audio_transcription: InputTranscription::default(),
            instructions: config.system_prompt.clone(),
            voice: config.voice.clone(),
            temperature: config.temperature,
        }
    }
}

/// Events this engine sends to the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Opening configuration; must be the first event on a connection.
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfigPayload },
    /// One base64-encoded PCM16 frame of candidate audio.
    #[serde(rename = "input_audio_buffer.append")]
    AppendAudio { audio: String },
}

/// Events the agent sends to this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// The agent accepted the session config; the interview is live.
    #[serde(rename = "session.created")]
    SessionCreated,
    /// Incremental agent speech transcript text.
    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta { delta: String },
    /// Base64-encoded PCM16 agent speech audio.
    #[serde(rename = "response.audio.delta")]
    AudioDelta { delta: String },
    /// The candidate started speaking; pending agent audio must be cut.
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,
    /// Final transcription of one candidate utterance.
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted { transcript: String },
    /// The agent finished one response turn.
    #[serde(rename = "response.done")]
    ResponseDone,
    /// Any event type this engine does not handle. Logged and skipped.
    #[serde(skip)]
    Unknown { kind: String },
}

impl ServerEvent {
    /// Parse a raw JSON event. Unrecognized event types come back as
    /// `Unknown` rather than an error so one odd message never kills the
    /// stream.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        match serde_json::from_value::<Self>(value.clone()) {
            Ok(event) => Ok(event),
            Err(_) => {
                let kind = value
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("<missing type>")
                    .to_string();
                Ok(ServerEvent::Unknown { kind })
            }
        }
    }
}
