use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::capture::CaptureSource;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub session: SessionConfig,
    pub capture: CaptureSection,
    pub backend: BackendConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    /// Interview time limit in seconds.
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
}

fn default_duration_secs() -> u64 {
    crate::session::DEFAULT_INTERVIEW_SECS
}

#[derive(Debug, Deserialize)]
pub struct CaptureSection {
    /// "silence", "file", or "microphone".
    pub source: String,
    /// WAV path for the file source.
    pub file: Option<PathBuf>,
    #[serde(default = "default_frame_duration_ms")]
    pub frame_duration_ms: u64,
}

fn default_frame_duration_ms() -> u64 {
    100
}

impl CaptureSection {
    pub fn source(&self) -> Result<CaptureSource> {
        match self.source.as_str() {
            "silence" => Ok(CaptureSource::Silence),
            "file" => match &self.file {
                Some(path) => Ok(CaptureSource::File(path.clone())),
                None => bail!("capture.file is required when capture.source is \"file\""),
            },
            "microphone" => Ok(CaptureSource::Microphone),
            other => bail!("unknown capture source: {}", other),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    /// Remote interview provisioning service. When unset the engine runs
    /// offline against an in-memory backend.
    pub base_url: Option<String>,
    /// Code provisioned for the offline demo interview.
    #[serde(default = "default_offline_code")]
    pub offline_code: String,
}

fn default_offline_code() -> String {
    "demo".to_string()
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
