//! Media capture collaborators
//!
//! The engine treats the candidate's devices as an external seam: a capture
//! backend delivers microphone audio (and optionally webcam video) over
//! bounded channels and releases the devices on `stop()`. Video packets are
//! opaque; they pass through untouched and are only multiplexed into the
//! archival recording.
//!
//! Shipped backends:
//! - File: plays a WAV file as the microphone (testing/batch)
//! - Silence: paced zero frames for device-less development

mod file;
mod silence;

pub use file::FileBackend;
pub use silence::SilenceBackend;

use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::audio::{AudioFrame, TRANSPORT_SAMPLE_RATE};

/// One opaque encoded video packet from the webcam.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Encoded packet bytes, passed through unmodified.
    pub data: Vec<u8>,
    /// Timestamp in milliseconds since capture started.
    pub timestamp_ms: u64,
}

/// The live feeds a backend produces once started.
pub struct CaptureStreams {
    /// Microphone audio in capture order.
    pub audio: mpsc::Receiver<AudioFrame>,
    /// Webcam video, if this backend has a camera.
    pub video: Option<mpsc::Receiver<VideoFrame>>,
}

/// Configuration for capture backends.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate; the transport runs at 24kHz.
    pub sample_rate: u32,
    /// Target channel count (1 = mono).
    pub channels: u16,
    /// Frame size in milliseconds (affects latency).
    pub frame_duration_ms: u64,
    /// Deliver frames at wall-clock pace. Disabled for batch test runs.
    pub pace: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: TRANSPORT_SAMPLE_RATE,
            channels: 1,
            frame_duration_ms: 100,
            pace: true,
        }
    }
}

impl CaptureConfig {
    /// Samples per frame at the configured rate.
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate as u64 * self.frame_duration_ms / 1000) as usize
            * self.channels as usize
    }
}

/// Media capture backend trait.
///
/// Starting grants the "device"; stopping releases it. A backend may be
/// started at most once per interview attempt.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Acquire the device and start delivering frames.
    async fn start(&mut self) -> Result<CaptureStreams>;

    /// Release the device. Closing the audio channel signals end of stream.
    async fn stop(&mut self) -> Result<()>;

    /// Whether the backend is currently delivering frames.
    fn is_capturing(&self) -> bool;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Capture source selection.
#[derive(Debug, Clone)]
pub enum CaptureSource {
    /// Paced silence (device-less development).
    Silence,
    /// WAV file played as the microphone.
    File(PathBuf),
    /// Real microphone + webcam.
    Microphone,
}

/// Capture backend factory.
pub struct CaptureFactory;

impl CaptureFactory {
    pub fn create(source: CaptureSource, config: CaptureConfig) -> Result<Box<dyn CaptureBackend>> {
        match source {
            CaptureSource::Silence => Ok(Box::new(SilenceBackend::new(config))),
            CaptureSource::File(path) => Ok(Box::new(FileBackend::new(path, config))),
            CaptureSource::Microphone => {
                anyhow::bail!(
                    "Microphone capture requires a platform audio integration; \
                     use the file or silence source"
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_samples_at_transport_rate() {
        let config = CaptureConfig::default();
        assert_eq!(config.frame_samples(), 2400); // 100ms at 24kHz mono
    }

    #[test]
    fn test_factory_rejects_microphone_source() {
        let result = CaptureFactory::create(CaptureSource::Microphone, CaptureConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_factory_builds_silence_backend() {
        let backend =
            CaptureFactory::create(CaptureSource::Silence, CaptureConfig::default()).unwrap();
        assert_eq!(backend.name(), "silence");
        assert!(!backend.is_capturing());
    }
}
