use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::api::InterviewBackend;
use crate::capture::{CaptureConfig, CaptureSource};
use crate::realtime::AgentConnector;
use crate::session::{InterviewSummary, SessionController, SessionHandle, SessionSettings};

/// The single interview slot.
///
/// `Joined` holds a prepared controller waiting for start; `Running` holds
/// the live attempt. A finished attempt stays in `Running` (its handle keeps
/// serving status and transcript) until the next join replaces it.
pub enum InterviewSlot {
    Empty,
    Joined {
        controller: SessionController,
        handle: SessionHandle,
    },
    Running {
        handle: SessionHandle,
        task: JoinHandle<InterviewSummary>,
    },
}

impl InterviewSlot {
    /// Handle of the current attempt, if any.
    pub fn handle(&self) -> Option<&SessionHandle> {
        match self {
            InterviewSlot::Empty => None,
            InterviewSlot::Joined { handle, .. } => Some(handle),
            InterviewSlot::Running { handle, .. } => Some(handle),
        }
    }
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn InterviewBackend>,
    pub connector: Arc<dyn AgentConnector>,
    pub settings: SessionSettings,
    pub capture_source: CaptureSource,
    pub capture_config: CaptureConfig,
    pub slot: Arc<RwLock<InterviewSlot>>,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn InterviewBackend>,
        connector: Arc<dyn AgentConnector>,
        settings: SessionSettings,
        capture_source: CaptureSource,
        capture_config: CaptureConfig,
    ) -> Self {
        Self {
            backend,
            connector,
            settings,
            capture_source,
            capture_config,
            slot: Arc::new(RwLock::new(InterviewSlot::Empty)),
        }
    }
}
