// Shared helpers for the integration suites.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

use vivavoce::audio::{AudioFrame, StreamSource, TRANSPORT_FRAME_SAMPLES};
use vivavoce::capture::{CaptureBackend, CaptureStreams, VideoFrame};
use vivavoce::realtime::{
    channel_pair, AgentClient, AgentConnector, AgentPeer, TransportError,
};
use vivavoce::session::InterviewConfig;

pub fn test_interview(code: &str) -> InterviewConfig {
    InterviewConfig {
        code: code.to_string(),
        endpoint: "wss://example.test/realtime".to_string(),
        api_key: "secret".to_string(),
        deployment: "gpt-4o-realtime".to_string(),
        system_prompt: "Ask about X".to_string(),
        voice: "coral".to_string(),
        temperature: None,
    }
}

pub fn mic_frame(samples: Vec<i16>, timestamp_ms: u64) -> AudioFrame {
    AudioFrame::transport(samples, timestamp_ms, StreamSource::Microphone)
}

/// Capture backend that plays a fixed set of frames and then ends its
/// streams. With a gate, the frames are held back until the test opens it.
pub struct ScriptedCapture {
    audio: Vec<AudioFrame>,
    video: Vec<VideoFrame>,
    gate: Option<watch::Receiver<bool>>,
    capturing: bool,
}

impl ScriptedCapture {
    pub fn new(audio: Vec<AudioFrame>) -> Self {
        Self {
            audio,
            video: Vec::new(),
            gate: None,
            capturing: false,
        }
    }

    pub fn with_video(mut self, video: Vec<VideoFrame>) -> Self {
        self.video = video;
        self
    }

    /// Hold every frame until the returned sender fires `true`.
    pub fn gated(mut self) -> (Self, watch::Sender<bool>) {
        let (gate_tx, gate_rx) = watch::channel(false);
        self.gate = Some(gate_rx);
        (self, gate_tx)
    }
}

#[async_trait]
impl CaptureBackend for ScriptedCapture {
    async fn start(&mut self) -> Result<CaptureStreams> {
        let (audio_tx, audio_rx) = mpsc::channel(64);
        let frames = std::mem::take(&mut self.audio);
        let gate = self.gate.clone();
        tokio::spawn(async move {
            if let Some(mut gate) = gate {
                if gate.wait_for(|open| *open).await.is_err() {
                    return;
                }
            }
            for frame in frames {
                if audio_tx.send(frame).await.is_err() {
                    return;
                }
            }
        });

        let video = if self.video.is_empty() {
            None
        } else {
            let (video_tx, video_rx) = mpsc::channel(64);
            let frames = std::mem::take(&mut self.video);
            tokio::spawn(async move {
                for frame in frames {
                    if video_tx.send(frame).await.is_err() {
                        return;
                    }
                }
            });
            Some(video_rx)
        };

        self.capturing = true;
        Ok(CaptureStreams {
            audio: audio_rx,
            video,
        })
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Hands the agent-side peer of each connection to the test, which then
/// plays the agent by hand.
#[derive(Clone, Default)]
pub struct PeerHandoff {
    inner: Arc<Mutex<Option<AgentPeer>>>,
}

impl PeerHandoff {
    pub fn take(&self) -> Option<AgentPeer> {
        self.inner.lock().ok().and_then(|mut slot| slot.take())
    }
}

pub struct ManualConnector {
    pub handoff: PeerHandoff,
}

impl ManualConnector {
    pub fn new() -> Self {
        Self {
            handoff: PeerHandoff::default(),
        }
    }
}

#[async_trait]
impl AgentConnector for ManualConnector {
    async fn connect(&self, _config: &InterviewConfig) -> Result<AgentClient, TransportError> {
        let (transport, peer) = channel_pair(16);
        if let Ok(mut slot) = self.handoff.inner.lock() {
            *slot = Some(peer);
        }
        Ok(AgentClient::new(Box::new(transport)))
    }
}

/// Exactly one transport frame's worth of microphone samples (100ms at 24kHz).
pub fn full_frame_samples(value: i16) -> Vec<i16> {
    vec![value; TRANSPORT_FRAME_SAMPLES]
}
