//! Recording artifact assembly
//!
//! The archived recording is a single byte stream of length-prefixed media
//! chunks (mixed audio and passthrough video interleaved in arrival order).
//! `RecordingArtifact` is the append-only accumulator; finalizing consumes
//! it, so an artifact can be sealed exactly once and is immutable after.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

/// Content type the upload endpoint receives for the chunk log.
pub const RECORDING_CONTENT_TYPE: &str = "application/octet-stream";

/// Which track a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn tag(&self) -> u8 {
        match self {
            MediaKind::Audio => 0x01,
            MediaKind::Video => 0x02,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(MediaKind::Audio),
            0x02 => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// One timestamped chunk of recorded media.
///
/// Wire layout: tag byte, timestamp in ms (u64 LE), payload length (u32 LE),
/// payload bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaChunk {
    pub kind: MediaKind,
    pub timestamp_ms: u64,
    pub payload: Vec<u8>,
}

impl MediaChunk {
    pub fn audio(timestamp_ms: u64, payload: Vec<u8>) -> Self {
        Self {
            kind: MediaKind::Audio,
            timestamp_ms,
            payload,
        }
    }

    pub fn video(timestamp_ms: u64, payload: Vec<u8>) -> Self {
        Self {
            kind: MediaKind::Video,
            timestamp_ms,
            payload,
        }
    }

    pub fn encoded_len(&self) -> usize {
        1 + 8 + 4 + self.payload.len()
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.kind.tag());
        out.extend_from_slice(&self.timestamp_ms.to_le_bytes());
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.payload);
    }

    /// Parse every chunk out of an encoded recording.
    pub fn decode_all(mut bytes: &[u8]) -> Result<Vec<MediaChunk>> {
        let mut chunks = Vec::new();
        while !bytes.is_empty() {
            if bytes.len() < 13 {
                bail!("truncated chunk header ({} bytes left)", bytes.len());
            }
            let Some(kind) = MediaKind::from_tag(bytes[0]) else {
                bail!("unknown chunk tag 0x{:02x}", bytes[0]);
            };
            let timestamp_ms = u64::from_le_bytes(bytes[1..9].try_into()?);
            let len = u32::from_le_bytes(bytes[9..13].try_into()?) as usize;
            if bytes.len() < 13 + len {
                bail!("truncated chunk payload (want {}, have {})", len, bytes.len() - 13);
            }
            chunks.push(MediaChunk {
                kind,
                timestamp_ms,
                payload: bytes[13..13 + len].to_vec(),
            });
            bytes = &bytes[13 + len..];
        }
        Ok(chunks)
    }
}

/// Append-only chunk accumulator for one interview attempt.
///
/// Single-writer by construction: the append task owns it exclusively while
/// recording, and `finalize` takes it by value so sealing can happen once.
#[derive(Debug)]
pub struct RecordingArtifact {
    code: String,
    chunks: Vec<MediaChunk>,
    started_at: DateTime<Utc>,
}

impl RecordingArtifact {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            chunks: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn append(&mut self, chunk: MediaChunk) {
        self.chunks.push(chunk);
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Seal the artifact into its uploadable form.
    pub fn finalize(self) -> FinalRecording {
        let mut bytes = Vec::with_capacity(self.chunks.iter().map(MediaChunk::encoded_len).sum());
        let mut audio_bytes = 0usize;
        let mut video_frames = 0usize;
        for chunk in &self.chunks {
            match chunk.kind {
                MediaKind::Audio => audio_bytes += chunk.payload.len(),
                MediaKind::Video => video_frames += 1,
            }
            chunk.encode_into(&mut bytes);
        }

        FinalRecording {
            code: self.code,
            bytes,
            chunk_count: self.chunks.len(),
            audio_bytes,
            video_frames,
            started_at: self.started_at,
            finalized_at: Utc::now(),
        }
    }
}

/// The sealed recording handed to the upload collaborator.
#[derive(Debug, Clone)]
pub struct FinalRecording {
    pub code: String,
    pub bytes: Vec<u8>,
    pub chunk_count: usize,
    pub audio_bytes: usize,
    pub video_frames: usize,
    pub started_at: DateTime<Utc>,
    pub finalized_at: DateTime<Utc>,
}

impl FinalRecording {
    /// File name the upload carries, keyed by interview code.
    pub fn file_name(&self) -> String {
        format!("{}-recording.mlog", self.code)
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}
