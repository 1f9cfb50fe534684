use serde::Serialize;
use std::sync::{Arc, Mutex};

/// The user-visible end-of-interview message.
#[derive(Debug, Clone, Serialize)]
pub struct EndMessage {
    pub text: String,
    pub is_error: bool,
}

/// Shared end-state message cell.
///
/// Written from whichever path finishes last (teardown, then the upload
/// task); later writes replace earlier ones, mirroring a status line.
#[derive(Clone, Default)]
pub struct EndReport {
    inner: Arc<Mutex<Option<EndMessage>>>,
}

impl EndReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, text: impl Into<String>, is_error: bool) {
        if let Ok(mut slot) = self.inner.lock() {
            *slot = Some(EndMessage {
                text: text.into(),
                is_error,
            });
        }
    }

    pub fn current(&self) -> Option<EndMessage> {
        self.inner.lock().ok().and_then(|slot| slot.clone())
    }
}
