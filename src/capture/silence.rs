//! Silence capture backend
//!
//! Emits paced zero frames so the full pipeline can run without any audio
//! device. Useful for development servers and timer-oriented tests.

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use super::{CaptureBackend, CaptureConfig, CaptureStreams};
use crate::audio::{AudioFrame, StreamSource};

pub struct SilenceBackend {
    config: CaptureConfig,
    capturing: bool,
    stop_tx: Option<watch::Sender<bool>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl SilenceBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            capturing: false,
            stop_tx: None,
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for SilenceBackend {
    async fn start(&mut self) -> Result<CaptureStreams> {
        if self.capturing {
            anyhow::bail!("Silence capture already started");
        }

        let frame_samples = self.config.frame_samples();
        let frame_ms = self.config.frame_duration_ms;
        let sample_rate = self.config.sample_rate;
        let channels = self.config.channels;

        let (audio_tx, audio_rx) = mpsc::channel(32);
        let (stop_tx, mut stop_rx) = watch::channel(false);

        info!(frame_samples, frame_ms, "Starting silence capture");

        let task = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_millis(frame_ms));
            let mut timestamp_ms = 0u64;

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                }

                let frame = AudioFrame {
                    samples: vec![0i16; frame_samples],
                    sample_rate,
                    channels,
                    timestamp_ms,
                    source: StreamSource::Microphone,
                };
                timestamp_ms += frame_ms;

                if audio_tx.send(frame).await.is_err() {
                    break;
                }
            }
            debug!("Silence capture finished");
        });

        self.capturing = true;
        self.stop_tx = Some(stop_tx);
        self.task = Some(task);

        Ok(CaptureStreams {
            audio: audio_rx,
            video: None,
        })
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.capturing {
            return Ok(());
        }
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.capturing = false;
        info!("Silence capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "silence"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_silence_backend_emits_zero_frames() {
        let config = CaptureConfig {
            frame_duration_ms: 10,
            ..CaptureConfig::default()
        };
        let mut backend = SilenceBackend::new(config);
        let mut streams = backend.start().await.unwrap();

        let frame = streams.audio.recv().await.unwrap();
        assert_eq!(frame.samples.len(), 240);
        assert!(frame.samples.iter().all(|&s| s == 0));
        assert_eq!(frame.source, StreamSource::Microphone);

        backend.stop().await.unwrap();
        assert!(!backend.is_capturing());
    }

    #[tokio::test]
    async fn test_stop_closes_audio_stream() {
        let config = CaptureConfig {
            frame_duration_ms: 10,
            ..CaptureConfig::default()
        };
        let mut backend = SilenceBackend::new(config);
        let mut streams = backend.start().await.unwrap();
        let _ = streams.audio.recv().await;

        backend.stop().await.unwrap();

        // Drain whatever was in flight; the channel must then close.
        while streams.audio.recv().await.is_some() {}
    }
}
