use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Who produced a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Agent,
    User,
    System,
}

/// One line of the conversation log, in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Shared, append-only conversation log for one interview attempt.
///
/// Entry order is arrival order of the underlying events, which is the
/// canonical conversation order.
#[derive(Clone, Default)]
pub struct TranscriptLog {
    entries: Arc<Mutex<Vec<TranscriptEntry>>>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, speaker: Speaker, text: impl Into<String>) {
        let mut entries = self.entries.lock().await;
        entries.push(TranscriptEntry::new(speaker, text));
    }

    pub async fn snapshot(&self) -> Vec<TranscriptEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Render the log as the uploadable transcription text: one line per
    /// entry, agent lines prefixed "AI: ", user lines "User: ", system lines
    /// bare.
    pub async fn render_text(&self) -> String {
        let entries = self.entries.lock().await;
        let mut out = String::new();
        for entry in entries.iter() {
            match entry.speaker {
                Speaker::Agent => {
                    out.push_str("AI: ");
                    out.push_str(&entry.text);
                }
                Speaker::User => {
                    out.push_str("User: ");
                    out.push_str(&entry.text);
                }
                Speaker::System => out.push_str(&entry.text),
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}
