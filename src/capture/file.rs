//! WAV file capture backend
//!
//! Plays a WAV file as the interview microphone. Stereo input is folded to
//! mono and integer-ratio sample rates are decimated to the transport rate,
//! so fixtures recorded at 48kHz work unchanged.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::{CaptureBackend, CaptureConfig, CaptureStreams};
use crate::audio::{AudioFrame, StreamSource};

pub struct FileBackend {
    path: PathBuf,
    config: CaptureConfig,
    capturing: bool,
    stop_tx: Option<watch::Sender<bool>>,
    reader_task: Option<tokio::task::JoinHandle<()>>,
}

impl FileBackend {
    pub fn new(path: PathBuf, config: CaptureConfig) -> Self {
        Self {
            path,
            config,
            capturing: false,
            stop_tx: None,
            reader_task: None,
        }
    }

    /// Load the file and normalize it to the configured rate and channel
    /// count. Fails when the rate cannot be reached by integer decimation.
    fn load_samples(path: &PathBuf, config: &CaptureConfig) -> Result<Vec<i16>> {
        let reader = hound::WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;
        let spec = reader.spec();

        debug!(
            path = %path.display(),
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            "Loaded WAV capture source"
        );

        let raw: Vec<i16> = match spec.sample_format {
            hound::SampleFormat::Int => reader
                .into_samples::<i16>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("Failed to read WAV samples")?,
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("Failed to read WAV samples")?,
        };

        let mono = match spec.channels {
            1 => raw,
            2 => fold_stereo(&raw),
            n => anyhow::bail!("Unsupported channel count in WAV file: {}", n),
        };

        if spec.sample_rate == config.sample_rate {
            return Ok(mono);
        }
        if spec.sample_rate % config.sample_rate != 0 {
            anyhow::bail!(
                "Cannot resample {}Hz to {}Hz (integer decimation only)",
                spec.sample_rate,
                config.sample_rate
            );
        }
        let step = (spec.sample_rate / config.sample_rate) as usize;
        Ok(mono.iter().step_by(step).copied().collect())
    }
}

/// Average each stereo pair into one mono sample.
fn fold_stereo(samples: &[i16]) -> Vec<i16> {
    samples
        .chunks_exact(2)
        .map(|pair| {
            let sum = pair[0] as i32 + pair[1] as i32;
            (sum / 2) as i16
        })
        .collect()
}

#[async_trait::async_trait]
impl CaptureBackend for FileBackend {
    async fn start(&mut self) -> Result<CaptureStreams> {
        if self.capturing {
            anyhow::bail!("File capture already started");
        }

        let samples = Self::load_samples(&self.path, &self.config)?;
        let frame_samples = self.config.frame_samples();
        let frame_ms = self.config.frame_duration_ms;
        let sample_rate = self.config.sample_rate;
        let channels = self.config.channels;
        let pace = self.config.pace;

        let (audio_tx, audio_rx) = mpsc::channel(32);
        let (stop_tx, mut stop_rx) = watch::channel(false);

        info!(
            path = %self.path.display(),
            total_samples = samples.len(),
            frame_samples,
            "Starting file capture"
        );

        let task = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_millis(frame_ms));
            let mut offset = 0usize;
            let mut timestamp_ms = 0u64;

            while offset < samples.len() {
                if pace {
                    tokio::select! {
                        _ = interval.tick() => {}
                        _ = stop_rx.changed() => {
                            if *stop_rx.borrow() {
                                break;
                            }
                        }
                    }
                } else if *stop_rx.borrow() {
                    break;
                }

                let end = (offset + frame_samples).min(samples.len());
                let frame = AudioFrame {
                    samples: samples[offset..end].to_vec(),
                    sample_rate,
                    channels,
                    timestamp_ms,
                    source: StreamSource::Microphone,
                };
                offset = end;
                timestamp_ms += frame_ms;

                if audio_tx.send(frame).await.is_err() {
                    debug!("File capture consumer gone, stopping reader");
                    break;
                }
            }
            // Dropping audio_tx closes the stream.
            debug!("File capture reader finished");
        });

        self.capturing = true;
        self.stop_tx = Some(stop_tx);
        self.reader_task = Some(task);

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
        if let Some(task) = self.reader_task.take() {
            if let Err(e) = task.await {
                warn!("File capture reader task failed: {}", e);
            }
        }
        self.capturing = false;
        info!("File capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_wav(path: &PathBuf, sample_rate: u32, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_fold_stereo_averages_pairs() {
        let folded = fold_stereo(&[100, 200, -50, 50]);
        assert_eq!(folded, vec![150, 0]);
    }

    #[tokio::test]
    async fn test_file_backend_streams_all_samples() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mic.wav");
        let samples: Vec<i16> = (0..4800).map(|i| (i % 100) as i16).collect();
        write_wav(&path, 24000, 1, &samples);

        let config = CaptureConfig {
            pace: false,
            ..CaptureConfig::default()
        };
        let mut backend = FileBackend::new(path, config);
        let mut streams = backend.start().await.unwrap();
        assert!(backend.is_capturing());
        assert!(streams.video.is_none());

        let mut received = Vec::new();
        while let Some(frame) = streams.audio.recv().await {
            assert_eq!(frame.source, StreamSource::Microphone);
            assert_eq!(frame.sample_rate, 24000);
            received.extend(frame.samples);
        }
        assert_eq!(received, samples);

        backend.stop().await.unwrap();
        assert!(!backend.is_capturing());
    }

    #[tokio::test]
    async fn test_file_backend_decimates_48k_to_24k() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mic48.wav");
        let samples: Vec<i16> = (0..960).map(|i| i as i16).collect();
        write_wav(&path, 48000, 1, &samples);

        let config = CaptureConfig {
            pace: false,
            ..CaptureConfig::default()
        };
        let mut backend = FileBackend::new(path, config);
        let mut streams = backend.start().await.unwrap();

        let mut received = Vec::new();
        while let Some(frame) = streams.audio.recv().await {
            received.extend(frame.samples);
        }
        // Every other source sample survives decimation.
        assert_eq!(received.len(), 480);
        assert_eq!(received[0], 0);
        assert_eq!(received[1], 2);

        backend.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_backend_rejects_fractional_resample() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mic44.wav");
        write_wav(&path, 44100, 1, &[0i16; 100]);

        let mut backend = FileBackend::new(path, CaptureConfig::default());
        assert!(backend.start().await.is_err());
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mic.wav");
        write_wav(&path, 24000, 1, &[0i16; 2400]);

        let config = CaptureConfig {
            pace: false,
            ..CaptureConfig::default()
        };
        let mut backend = FileBackend::new(path, config);
        let _streams = backend.start().await.unwrap();
        assert!(backend.start().await.is_err());
        backend.stop().await.unwrap();
    }
}
