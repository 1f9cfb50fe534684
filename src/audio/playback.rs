// Playback queue for agent speech
//
// Decoded audio deltas are posted into a bounded channel and rendered by an
// independent task, so decoding inbound events never blocks rendering (and
// vice versa). Barge-in is an epoch bump: blocks enqueued before the bump are
// skipped by the renderer instead of being played, which cuts the agent off
// without touching audio that already reached the output device.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::frame::{AudioFrame, StreamSource};

/// Where rendered agent audio is written so the candidate can hear it.
///
/// The engine itself is headless; a platform integration supplies a real
/// device sink. [`NullSink`] discards audio, [`CollectSink`] keeps it for
/// inspection.
pub trait OutputSink: Send {
    fn write(&mut self, samples: &[i16]) -> Result<()>;
}

/// Discards all rendered audio. Used by the HTTP server mode.
pub struct NullSink;

impl OutputSink for NullSink {
    fn write(&mut self, _samples: &[i16]) -> Result<()> {
        Ok(())
    }
}

/// Accumulates rendered audio in memory.
#[derive(Clone, Default)]
pub struct CollectSink {
    samples: Arc<Mutex<Vec<i16>>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything rendered so far, in playback order.
    pub fn rendered(&self) -> Vec<i16> {
        self.samples.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Seconds of audio rendered at the transport rate.
    pub fn rendered_secs(&self, sample_rate: u32) -> f64 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.rendered().len() as f64 / sample_rate as f64
    }
}

impl OutputSink for CollectSink {
    fn write(&mut self, samples: &[i16]) -> Result<()> {
        self.samples
            .lock()
            .map_err(|_| anyhow::anyhow!("collect sink poisoned"))?
            .extend_from_slice(samples);
        Ok(())
    }
}

/// One enqueued block of agent audio, tagged with the epoch it belongs to.
#[derive(Debug)]
struct PlaybackBlock {
    samples: Vec<i16>,
    epoch: u64,
}

/// Producer half of the playback pipeline.
///
/// Cheap to clone; the session controller enqueues decoded deltas and calls
/// `clear()` on barge-in, while the matching [`PlaybackRenderer`] runs as its
/// own task.
#[derive(Debug, Clone)]
pub struct PlaybackQueue {
    tx: mpsc::Sender<PlaybackBlock>,
    epoch: Arc<AtomicU64>,
}

impl PlaybackQueue {
    /// Create the queue and its renderer. `capacity` bounds the hand-off.
    pub fn channel(capacity: usize) -> (PlaybackQueue, PlaybackRenderer) {
        let (tx, rx) = mpsc::channel(capacity);
        let epoch = Arc::new(AtomicU64::new(0));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        (
            PlaybackQueue { tx, epoch: Arc::clone(&epoch) },
            PlaybackRenderer {
                rx,
                epoch,
                shutdown_tx,
                shutdown_rx,
            },
        )
    }

    /// Schedule a block of samples for gap-free rendering after everything
    /// already queued. Waits if the renderer is behind (bounded hand-off).
    pub async fn enqueue(&self, samples: Vec<i16>) -> Result<()> {
        let block = PlaybackBlock {
            samples,
            epoch: self.epoch.load(Ordering::SeqCst),
        };
        self.tx
            .send(block)
            .await
            .map_err(|_| anyhow::anyhow!("playback renderer is gone"))
            .context("failed to enqueue playback block")
    }

    /// Drop all queued-but-unrendered audio immediately.
    ///
    /// Safe to call when nothing is queued; never affects audio that has
    /// already been rendered.
    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

/// Consumer half: renders queued blocks back-to-back into the output sink and
/// mirrors them onto the recording mix so the agent's voice is archived.
pub struct PlaybackRenderer {
    rx: mpsc::Receiver<PlaybackBlock>,
    epoch: Arc<AtomicU64>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl PlaybackRenderer {
    /// Handle the router uses to stop the renderer at teardown.
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    /// Render loop. Ends when the shutdown signal fires or every queue handle
    /// is dropped.
    pub async fn run(mut self, mut sink: Box<dyn OutputSink>, mix_tx: mpsc::Sender<AudioFrame>) {
        // Rendered-samples clock; keeps the recording leg gap-free relative
        // to playback order regardless of when deltas arrived.
        let mut clock_ms: u64 = 0;
        let mut mix_open = true;

        loop {
            tokio::select! {
                biased;
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                }
                block = self.rx.recv() => {
                    let Some(block) = block else { break };
                    if block.epoch < self.epoch.load(Ordering::SeqCst) {
                        // Cleared before it reached the speaker: barge-in.
                        debug!("skipping {} cleared playback samples", block.samples.len());
                        continue;
                    }
                    if block.samples.is_empty() {
                        continue;
                    }
                    if let Err(e) = sink.write(&block.samples) {
                        warn!("Output sink write failed: {}", e);
                    }
                    let frame = AudioFrame::transport(block.samples, clock_ms, StreamSource::Agent);
                    clock_ms += frame.duration_ms();
                    if mix_open && mix_tx.send(frame).await.is_err() {
                        // Recording leg gone; playback itself continues.
                        warn!("Recording mix closed, playback continues unarchived");
                        mix_open = false;
                    }
                }
            }
        }
        debug!("Playback renderer stopped at {}ms", clock_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain_mix(mut rx: mpsc::Receiver<AudioFrame>) -> Vec<i16> {
        let mut all = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            all.extend(frame.samples);
        }
        all
    }

    #[tokio::test]
    async fn test_renders_blocks_back_to_back() {
        let (queue, renderer) = PlaybackQueue::channel(8);
        let (mix_tx, mix_rx) = mpsc::channel(8);
        let sink = CollectSink::new();

        queue.enqueue(vec![1, 2, 3]).await.unwrap();
        queue.enqueue(vec![4, 5]).await.unwrap();
        drop(queue);

        renderer.run(Box::new(sink.clone()), mix_tx).await;

        assert_eq!(sink.rendered(), vec![1, 2, 3, 4, 5]);
        assert_eq!(drain_mix(mix_rx), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_clear_then_enqueue_renders_only_new_audio() {
        let (queue, renderer) = PlaybackQueue::channel(8);
        let (mix_tx, _mix_rx) = mpsc::channel(8);
        let sink = CollectSink::new();

        // Queued before the clear: must never be heard.
        queue.enqueue(vec![9; 100]).await.unwrap();
        queue.enqueue(vec![8; 50]).await.unwrap();
        queue.clear();
        queue.enqueue(vec![1, 2, 3, 4]).await.unwrap();
        drop(queue);

        renderer.run(Box::new(sink.clone()), mix_tx).await;

        assert_eq!(sink.rendered(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_clear_on_empty_queue_is_harmless() {
        let (queue, renderer) = PlaybackQueue::channel(8);
        let (mix_tx, _mix_rx) = mpsc::channel(8);
        let sink = CollectSink::new();

        queue.clear();
        queue.clear();
        queue.enqueue(vec![7, 7]).await.unwrap();
        drop(queue);

        renderer.run(Box::new(sink.clone()), mix_tx).await;

        assert_eq!(sink.rendered(), vec![7, 7]);
    }

    #[tokio::test]
    async fn test_recording_leg_carries_playback_clock() {
        let (queue, renderer) = PlaybackQueue::channel(8);
        let (mix_tx, mut mix_rx) = mpsc::channel(8);

        // Two 100ms blocks at 24kHz.
        queue.enqueue(vec![0; 2400]).await.unwrap();
        queue.enqueue(vec![0; 2400]).await.unwrap();
        drop(queue);

        renderer.run(Box::new(NullSink), mix_tx).await;

        let first = mix_rx.try_recv().unwrap();
        let second = mix_rx.try_recv().unwrap();
        assert_eq!(first.timestamp_ms, 0);
        assert_eq!(second.timestamp_ms, 100);
        assert_eq!(first.source, StreamSource::Agent);
    }

    #[tokio::test]
    async fn test_shutdown_stops_renderer_with_audio_still_queued() {
        let (queue, renderer) = PlaybackQueue::channel(8);
        let (mix_tx, _mix_rx) = mpsc::channel(8);
        let sink = CollectSink::new();
        let shutdown = renderer.shutdown_handle();

        queue.enqueue(vec![5; 10]).await.unwrap();
        shutdown.send(true).unwrap();

        renderer.run(Box::new(sink.clone()), mix_tx).await;

        // The queued block may or may not have been rendered before the
        // signal was observed; the renderer must simply have stopped.
        assert!(sink.rendered().len() <= 10);
    }
}
