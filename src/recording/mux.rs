//! Media chunk multiplexer
//!
//! Folds the mixed audio feed and the optional video feed into one ordered
//! chunk stream. Audio is segmented on a fixed cadence; video packets pass
//! through one-to-one. The chunk stream closing is the finalize signal: it
//! happens only after both input feeds have ended and the tail segment has
//! been flushed.

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::artifact::MediaChunk;
use crate::audio::{samples_to_bytes, AudioFrame};
use crate::capture::VideoFrame;

#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Audio segment duration in milliseconds.
    pub segment_ms: u64,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self { segment_ms: 1000 }
    }
}

/// Source of the recording chunk stream.
///
/// `start` may be called once; the returned stream ends when the recorder
/// has flushed everything it will ever produce, which is the finalization
/// signal downstream.
#[async_trait::async_trait]
pub trait MediaRecorder: Send + Sync {
    async fn start(&mut self) -> Result<mpsc::Receiver<MediaChunk>>;
}

/// Segments one interview's media feeds into chunks.
pub struct ChunkMuxer {
    config: MuxConfig,
}

impl ChunkMuxer {
    pub fn new(config: MuxConfig) -> Self {
        Self { config }
    }

    /// Mux loop: consumes both feeds until they close, then flushes the
    /// pending audio segment. Closing `tx` is the caller's finalize signal.
    pub async fn run(
        self,
        mut audio_rx: mpsc::Receiver<AudioFrame>,
        mut video_rx: Option<mpsc::Receiver<VideoFrame>>,
        tx: mpsc::Sender<MediaChunk>,
    ) {
        let mut pending: Vec<u8> = Vec::new();
        let mut segment_start: Option<u64> = None;
        let mut audio_open = true;
        let mut video_open = video_rx.is_some();
        let mut emitted = 0usize;

        info!(
            segment_ms = self.config.segment_ms,
            with_video = video_open,
            "Recording mux started"
        );

        while audio_open || video_open {
            let video_recv = async {
                match video_rx.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                maybe = audio_rx.recv(), if audio_open => match maybe {
                    Some(frame) => {
                        if let Some(start) = segment_start {
                            let elapsed = frame.timestamp_ms.saturating_sub(start);
                            if elapsed >= self.config.segment_ms && !pending.is_empty() {
                                let chunk = MediaChunk::audio(start, std::mem::take(&mut pending));
                                segment_start = Some(frame.timestamp_ms);
                                emitted += 1;
                                if tx.send(chunk).await.is_err() {
                                    debug!("chunk consumer gone, stopping mux");
                                    return;
                                }
                            }
                        } else {
                            segment_start = Some(frame.timestamp_ms);
                        }
                        pending.extend(samples_to_bytes(&frame.samples));
                    }
                    None => audio_open = false,
                },
                maybe = video_recv, if video_open => match maybe {
                    Some(frame) => {
                        emitted += 1;
                        if tx
                            .send(MediaChunk::video(frame.timestamp_ms, frame.data))
                            .await
                            .is_err()
                        {
                            debug!("chunk consumer gone, stopping mux");
                            return;
                        }
                    }
                    None => video_open = false,
                },
            }
        }

        // Both feeds ended; flush the tail segment.
        if !pending.is_empty() {
            let start = segment_start.unwrap_or(0);
            emitted += 1;
            let _ = tx.send(MediaChunk::audio(start, pending)).await;
        }

        info!("Recording mux complete: {} chunks emitted", emitted);
    }
}

/// [`MediaRecorder`] over the router's mixed-audio and video feeds.
pub struct MuxRecorder {
    config: MuxConfig,
    audio_rx: Option<mpsc::Receiver<AudioFrame>>,
    video_rx: Option<mpsc::Receiver<VideoFrame>>,
}

impl MuxRecorder {
    pub fn new(
        audio_rx: Option<mpsc::Receiver<AudioFrame>>,
        video_rx: Option<mpsc::Receiver<VideoFrame>>,
        config: MuxConfig,
    ) -> Self {
        Self {
            config,
            audio_rx,
            video_rx,
        }
    }
}

#[async_trait::async_trait]
impl MediaRecorder for MuxRecorder {
    async fn start(&mut self) -> Result<mpsc::Receiver<MediaChunk>> {
        let Some(audio_rx) = self.audio_rx.take() else {
            anyhow::bail!("no mixed audio feed available (already started?)");
        };
        let video_rx = self.video_rx.take();

        let (chunk_tx, chunk_rx) = mpsc::channel(32);
        let muxer = ChunkMuxer::new(self.config.clone());
        tokio::spawn(muxer.run(audio_rx, video_rx, chunk_tx));
        Ok(chunk_rx)
    }
}
