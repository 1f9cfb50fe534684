//! Audio routing between capture, transport, playback, and recording
//!
//! The topology is fixed:
//!
//! ```text
//! microphone ──┬──> transport feed (encoder)
//!              └──> recording mix ──> mixed feed (recorder)
//! playback   ──┬──> output sink
//!              └──> recording mix
//! ```
//!
//! The microphone is never wired to the output sink, so the candidate cannot
//! hear themselves. Each leg runs as its own task over bounded channels; a
//! slow or dead leg detaches without stalling the others.

use anyhow::{Context, Result};
use futures::future;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::frame::AudioFrame;
use super::mixer::{MixerConfig, RecordingMixer};
use super::playback::{OutputSink, PlaybackQueue};
use crate::capture::{CaptureBackend, VideoFrame};

/// Channel capacities and mix settings for one routing graph.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub mixer: MixerConfig,
    /// Capacity of each hand-off channel, in frames.
    pub channel_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            mixer: MixerConfig::default(),
            channel_capacity: 32,
        }
    }
}

/// Owns the capture backend and the routing tasks for one interview attempt.
pub struct AudioRouter {
    capture: Box<dyn CaptureBackend>,
    playback: PlaybackQueue,
    renderer_shutdown: watch::Sender<bool>,
    transport_feed: Option<mpsc::Receiver<AudioFrame>>,
    mixed_feed: Option<mpsc::Receiver<AudioFrame>>,
    video_feed: Option<mpsc::Receiver<VideoFrame>>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
    torn_down: bool,
}

impl AudioRouter {
    /// Start capture and wire the full routing graph.
    pub async fn build(
        mut capture: Box<dyn CaptureBackend>,
        sink: Box<dyn OutputSink>,
        config: RouterConfig,
    ) -> Result<Self> {
        let streams = capture
            .start()
            .await
            .context("Failed to start media capture")?;

        let capacity = config.channel_capacity;
        let (transport_tx, transport_rx) = mpsc::channel(capacity);
        let (mix_tx, mix_rx) = mpsc::channel(capacity);
        let (mixed_tx, mixed_rx) = mpsc::channel(capacity);
        let (playback, renderer) = PlaybackQueue::channel(capacity);

        let mut tasks = Vec::new();

        // Microphone fan-out. A dead leg is detached; the survivor keeps
        // getting frames.
        let mic_mix_tx = mix_tx.clone();
        let mut mic_rx = streams.audio;
        tasks.push(tokio::spawn(async move {
            let mut transport_open = true;
            let mut mix_open = true;
            while let Some(frame) = mic_rx.recv().await {
                if transport_open && transport_tx.send(frame.clone()).await.is_err() {
                    debug!("transport feed closed, detaching microphone leg");
                    transport_open = false;
                }
                if mix_open && mic_mix_tx.send(frame).await.is_err() {
                    debug!("recording mix closed, detaching microphone leg");
                    mix_open = false;
                }
                if !transport_open && !mix_open {
                    break;
                }
            }
            debug!("microphone fan-out finished");
        }));

        // Agent playback: renders to the sink and mirrors into the mix.
        let renderer_shutdown = renderer.shutdown_handle();
        tasks.push(tokio::spawn(renderer.run(sink, mix_tx)));

        // Recording mix.
        let mixer = RecordingMixer::new(config.mixer);
        tasks.push(tokio::spawn(mixer.run(mix_rx, mixed_tx)));

        info!("Audio routing graph started");

        Ok(Self {
            capture,
            playback,
            renderer_shutdown,
            transport_feed: Some(transport_rx),
            mixed_feed: Some(mixed_rx),
            video_feed: streams.video,
            tasks,
            torn_down: false,
        })
    }

    /// Handle for enqueueing and cutting agent audio.
    pub fn playback(&self) -> PlaybackQueue {
        self.playback.clone()
    }

    /// Microphone frames destined for the transport encoder. Single take.
    pub fn take_transport_feed(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.transport_feed.take()
    }

    /// Mixed two-leg audio destined for the recorder. Single take.
    pub fn take_mixed_feed(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.mixed_feed.take()
    }

    /// Webcam frames, when the capture backend has a camera. Single take.
    pub fn take_video_feed(&mut self) -> Option<mpsc::Receiver<VideoFrame>> {
        self.video_feed.take()
    }

    /// Stop capture and unwind every routing task. Calling this again after
    /// it has run is a no-op.
    pub async fn teardown(&mut self) {
        if self.torn_down {
            debug!("router already torn down");
            return;
        }
        self.torn_down = true;

        // Unclaimed feeds would back-pressure the graph shut; drop them so
        // every task can run to completion.
        self.transport_feed.take();
        self.mixed_feed.take();
        self.video_feed.take();

        self.playback.clear();
        let _ = self.renderer_shutdown.send(true);

        if let Err(e) = self.capture.stop().await {
            warn!("capture stop failed during teardown: {}", e);
        }

        for result in future::join_all(self.tasks.drain(..)).await {
            if let Err(e) = result {
                warn!("routing task panicked during teardown: {}", e);
            }
        }

        info!("Audio routing graph torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}
