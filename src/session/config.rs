use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Configuration for one interview, fetched by code from the backend.
///
/// Immutable after fetch; the controller owns one copy for the lifetime of
/// an attempt. Field names follow the backend's JSON (camelCase). The code
/// is not part of the fetched body, so it defaults to empty and is filled in
/// by the fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewConfig {
    #[serde(default)]
    pub code: String,

    /// Realtime endpoint URL.
    pub endpoint: String,

    /// Credential for the realtime endpoint.
    pub api_key: String,

    /// Model deployment identity.
    pub deployment: String,

    /// Interviewer instructions sent as the session's system prompt.
    pub system_prompt: String,

    /// Agent voice identity (e.g. "coral").
    pub voice: String,

    /// Optional sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl InterviewConfig {
    /// Reject configs the interview cannot run with. Voice is allowed to be
    /// empty; the agent falls back to its default voice.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("endpoint", &self.endpoint),
            ("apiKey", &self.api_key),
            ("deployment", &self.deployment),
            ("systemPrompt", &self.system_prompt),
        ] {
            if value.trim().is_empty() {
                bail!("incomplete interview configuration: {} is missing", field);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> InterviewConfig {
        InterviewConfig {
            code: "tide".to_string(),
            endpoint: "wss://example.test/realtime".to_string(),
            api_key: "secret".to_string(),
            deployment: "gpt-4o-realtime".to_string(),
            system_prompt: "Ask about X".to_string(),
            voice: "coral".to_string(),
            temperature: Some(0.8),
        }
    }

    #[test]
    fn test_parses_backend_response_shape() {
        let body = r#"{
            "endpoint": "wss://example.test/realtime",
            "apiKey": "secret",
            "deployment": "gpt-4o-realtime",
            "voice": "coral",
            "systemPrompt": "Ask about X"
        }"#;
        let mut config: InterviewConfig = serde_json::from_str(body).unwrap();
        assert_eq!(config.code, "");
        assert_eq!(config.voice, "coral");
        assert!(config.temperature.is_none());

        config.code = "tide".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let mut config = full_config();
        config.api_key = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("apiKey"));
    }

    #[test]
    fn test_empty_voice_is_allowed() {
        let mut config = full_config();
        config.voice = String::new();
        assert!(config.validate().is_ok());
    }
}
