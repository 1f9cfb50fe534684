//! Agent connection wrapper and shared connection slot
//!
//! `AgentClient` owns one realtime connection and layers a closed flag over
//! the raw transport: closing is idempotent, pending sends and receives are
//! cancelled the moment the flag flips, and `next_event` never hands out
//! events queued behind a close. `ClientSlot` is the shared cell the encoder
//! and HTTP handlers read the live connection from.

use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::debug;

use super::events::{ClientEvent, SessionConfigPayload};
use super::transport::{AgentTransport, TransportError};
use super::ServerEvent;
use crate::session::InterviewConfig;

pub struct AgentClient {
    transport: Box<dyn AgentTransport>,
    closed_tx: watch::Sender<bool>,
}

impl AgentClient {
    pub fn new(transport: Box<dyn AgentTransport>) -> Self {
        let (closed_tx, _) = watch::channel(false);
        Self {
            transport,
            closed_tx,
        }
    }

    /// Send the opening `session.update`. Must go out before any audio.
    pub async fn send_session_config(
        &self,
        config: &InterviewConfig,
    ) -> Result<(), TransportError> {
        self.send(ClientEvent::SessionUpdate {
            session: SessionConfigPayload::for_interview(config),
        })
        .await
    }

    /// Send one base64 audio frame.
    pub async fn append_audio(&self, audio: String) -> Result<(), TransportError> {
        self.send(ClientEvent::AppendAudio { audio }).await
    }

    /// Guarded send: fails immediately once the connection is closed, and a
    /// close while the send is in flight cancels it.
    async fn send(&self, event: ClientEvent) -> Result<(), TransportError> {
        let mut closed_rx = self.closed_tx.subscribe();
        tokio::select! {
            biased;
            _ = closed_rx.wait_for(|closed| *closed) => Err(TransportError::Closed),
            result = self.transport.send(event) => result,
        }
    }

    /// Next inbound event. Returns `None` when the peer ends the stream or
    /// the connection is closed locally; events still queued at close time
    /// are not delivered.
    pub async fn next_event(&self) -> Option<ServerEvent> {
        let mut closed_rx = self.closed_tx.subscribe();
        tokio::select! {
            biased;
            _ = closed_rx.wait_for(|closed| *closed) => None,
            event = self.transport.recv() => event,
        }
    }

    /// Close the connection. Every call after the first is a no-op.
    pub async fn close(&self) {
        if self.closed_tx.send_replace(true) {
            return;
        }
        debug!("closing agent connection");
        self.transport.close().await;
    }

    pub fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }
}

/// Shared cell holding the live connection, if any.
///
/// The encoder loop and HTTP handlers hold clones; the session controller
/// sets it on connect and clears it during teardown.
#[derive(Clone, Default)]
pub struct ClientSlot {
    inner: Arc<RwLock<Option<Arc<AgentClient>>>>,
}

impl ClientSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, client: Arc<AgentClient>) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = Some(client);
        }
    }

    pub fn get(&self) -> Option<Arc<AgentClient>> {
        self.inner.read().ok().and_then(|slot| slot.clone())
    }

    /// Empty the slot, returning the connection that was in it so the
    /// caller can close it.
    pub fn clear(&self) -> Option<Arc<AgentClient>> {
        self.inner.write().ok().and_then(|mut slot| slot.take())
    }

    pub fn is_connected(&self) -> bool {
        self.get().is_some()
    }
}

/// Builds agent connections from interview settings.
///
/// The loopback connector scripts an in-process agent; a production build
/// plugs a websocket connector in here.
#[async_trait::async_trait]
pub trait AgentConnector: Send + Sync {
    async fn connect(&self, config: &InterviewConfig) -> Result<AgentClient, TransportError>;
}
