// Recording mix for the archival feed
//
// The archived recording must contain both sides of the conversation: the
// candidate's microphone and the agent's rendered speech. This module
// combines the two legs into a single mixed stream by buffering frames per
// source, aligning them loosely by timestamp, and adding samples with
// clipping. The mixed stream is the sole audio feed handed to the recording
// stage; the transport-bound stream stays microphone-only.

use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::frame::{AudioFrame, StreamSource, TRANSPORT_SAMPLE_RATE};

/// Configuration for the recording mix.
#[derive(Debug, Clone)]
pub struct MixerConfig {
    /// Sample rate every input leg must already run at.
    pub sample_rate: u32,
    /// Channel count of the mix output.
    pub channels: u16,
    /// Maximum buffering delay in milliseconds. Frames older than this
    /// relative to the mix position are dropped to prevent unbounded
    /// buffering when one leg stalls.
    pub max_buffer_delay_ms: u64,
    /// Legs included in the mix.
    pub enabled_sources: HashSet<StreamSource>,
}

impl Default for MixerConfig {
    fn default() -> Self {
        let mut enabled_sources = HashSet::new();
        enabled_sources.insert(StreamSource::Microphone);
        enabled_sources.insert(StreamSource::Agent);

        Self {
            sample_rate: TRANSPORT_SAMPLE_RATE,
            channels: 1,
            max_buffer_delay_ms: 200,
            enabled_sources,
        }
    }
}

/// Combines the microphone and agent legs into one archival stream.
pub struct RecordingMixer {
    config: MixerConfig,
    /// Pending frames per input leg.
    buffers: HashMap<StreamSource, VecDeque<AudioFrame>>,
    current_position_ms: u64,
}

impl RecordingMixer {
    pub fn new(config: MixerConfig) -> Self {
        let mut buffers = HashMap::new();
        for source in &config.enabled_sources {
            buffers.insert(*source, VecDeque::new());
        }

        debug!(
            "Recording mixer initialized: {}Hz, {} channels, {} legs",
            config.sample_rate,
            config.channels,
            config.enabled_sources.len()
        );

        Self {
            config,
            buffers,
            current_position_ms: 0,
        }
    }

    /// Mix loop: consumes frames from both legs and emits mixed frames until
    /// every input sender is gone, then flushes whatever is still buffered.
    pub async fn run(mut self, mut rx: mpsc::Receiver<AudioFrame>, tx: mpsc::Sender<AudioFrame>) {
        info!("Recording mix started");
        let mut produced = 0usize;

        while let Some(frame) = rx.recv().await {
            self.buffer_frame(frame);
            if let Some(mixed) = self.mix_next_chunk() {
                produced += 1;
                if tx.send(mixed).await.is_err() {
                    debug!("Recording feed closed, stopping mix");
                    return;
                }
            }
        }

        // Input legs finished; drain the buffers.
        while let Some(mixed) = self.mix_next_chunk() {
            produced += 1;
            if tx.send(mixed).await.is_err() {
                return;
            }
        }

        info!("Recording mix complete: {} mixed frames produced", produced);
    }

    /// Buffer a frame on its leg, dropping anything the mix cannot use.
    fn buffer_frame(&mut self, frame: AudioFrame) {
        if !self.config.enabled_sources.contains(&frame.source) {
            debug!(
                "Skipping frame from disabled leg: {:?} at {}ms",
                frame.source, frame.timestamp_ms
            );
            return;
        }

        if frame.sample_rate != self.config.sample_rate {
            warn!(
                "Frame sample rate mismatch: expected {}, got {}. Dropping frame.",
                self.config.sample_rate, frame.sample_rate
            );
            return;
        }

        if frame.channels != self.config.channels {
            warn!(
                "Frame channel count mismatch: expected {}, got {}. Dropping frame.",
                self.config.channels, frame.channels
            );
            return;
        }

        if let Some(buffer) = self.buffers.get_mut(&frame.source) {
            buffer.push_back(frame);
        }

        self.cleanup_old_frames();
    }

    /// Remove frames that fell too far behind the mix position.
    fn cleanup_old_frames(&mut self) {
        let cutoff_time = self
            .current_position_ms
            .saturating_sub(self.config.max_buffer_delay_ms);

        for (source, buffer) in &mut self.buffers {
            while let Some(frame) = buffer.front() {
                if frame.timestamp_ms < cutoff_time {
                    warn!(
                        "Dropping stale {:?} frame at {}ms (mix position: {}ms)",
                        source, frame.timestamp_ms, self.current_position_ms
                    );
                    buffer.pop_front();
                } else {
                    break;
                }
            }
        }
    }

    /// Take one frame from each leg that has data and mix them.
    ///
    /// Returns None when every buffer is empty.
    fn mix_next_chunk(&mut self) -> Option<AudioFrame> {
        let mut frames_to_mix: Vec<AudioFrame> = Vec::new();

        for buffer in self.buffers.values_mut() {
            if let Some(frame) = buffer.pop_front() {
                frames_to_mix.push(frame);
            }
        }

        if frames_to_mix.is_empty() {
            return None;
        }

        let mixed = self.mix_frames(&frames_to_mix);
        self.current_position_ms = mixed.timestamp_ms;
        Some(mixed)
    }

    /// Add samples across frames with clipping; the output takes the
    /// earliest timestamp and the longest length.
    fn mix_frames(&self, frames: &[AudioFrame]) -> AudioFrame {
        let timestamp_ms = frames.iter().map(|f| f.timestamp_ms).min().unwrap_or(0);
        let max_len = frames.iter().map(|f| f.samples.len()).max().unwrap_or(0);
        let mut mixed_samples = Vec::with_capacity(max_len);

        for i in 0..max_len {
            let mut sum: i32 = 0;
            for frame in frames {
                sum += frame.samples.get(i).copied().unwrap_or(0) as i32;
            }
            // Clip to prevent overflow.
            mixed_samples.push(sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
        }

        AudioFrame {
            samples: mixed_samples,
            sample_rate: self.config.sample_rate,
            channels: self.config.channels,
            timestamp_ms,
            source: StreamSource::Mixed,
        }
    }
}
