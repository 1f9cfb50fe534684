use serde::{Deserialize, Serialize};

/// Sample rate of the transport stream, in Hz.
///
/// The remote agent both consumes and produces 24 kHz mono PCM16; the whole
/// local graph runs at the same rate so no resampling happens mid-pipeline.
pub const TRANSPORT_SAMPLE_RATE: u32 = 24_000;

/// Size of one outbound transport frame, in bytes (PCM16 mono).
pub const TRANSPORT_FRAME_BYTES: usize = 4_800;

/// Size of one outbound transport frame, in samples.
pub const TRANSPORT_FRAME_SAMPLES: usize = TRANSPORT_FRAME_BYTES / 2;

/// Which leg of the interview an audio frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamSource {
    /// Candidate microphone input.
    Microphone,
    /// Agent speech rendered by the playback queue.
    Agent,
    /// Microphone and agent audio combined for the archival recording.
    Mixed,
}

/// Audio sample data (16-bit PCM, mono).
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM).
    pub samples: Vec<i16>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels.
    pub channels: u16,
    /// Timestamp in milliseconds since the interview graph started.
    pub timestamp_ms: u64,
    /// Which leg produced this frame.
    pub source: StreamSource,
}

impl AudioFrame {
    /// Frame at the transport format (24 kHz mono).
    pub fn transport(samples: Vec<i16>, timestamp_ms: u64, source: StreamSource) -> Self {
        Self {
            samples,
            sample_rate: TRANSPORT_SAMPLE_RATE,
            channels: 1,
            timestamp_ms,
            source,
        }
    }

    /// Duration of this frame in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / (self.sample_rate as u64 * self.channels as u64)
    }
}

/// Serialize samples to little-endian PCM16 bytes.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Parse little-endian PCM16 bytes into samples.
///
/// An odd trailing byte cannot form a sample and is ignored; inbound deltas
/// are agent-sized and occasionally land on odd boundaries mid-stream.
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
