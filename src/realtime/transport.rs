//! Transport seam for the realtime agent connection
//!
//! The session engine talks to the agent through `AgentTransport`, so the
//! same dispatch and encode loops run against a live endpoint or an
//! in-process pair. `ChannelTransport` is the in-process implementation used
//! by the loopback connector and the test suite.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

use super::events::{ClientEvent, ServerEvent};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,
    #[error("send failed: {0}")]
    Send(String),
    #[error("connect failed: {0}")]
    Connect(String),
}

/// Bidirectional, ordered event stream to the agent.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Send one event. Events arrive in send order.
    async fn send(&self, event: ClientEvent) -> Result<(), TransportError>;

    /// Receive the next inbound event, `None` when the peer is gone.
    async fn recv(&self) -> Option<ServerEvent>;

    /// Tear the connection down. Safe to call more than once.
    async fn close(&self);
}

/// In-process transport over bounded channels.
pub struct ChannelTransport {
    tx: Mutex<Option<mpsc::Sender<ClientEvent>>>,
    rx: Mutex<mpsc::Receiver<ServerEvent>>,
}

/// The agent-side ends of a [`ChannelTransport`] pair.
pub struct AgentPeer {
    pub rx: mpsc::Receiver<ClientEvent>,
    pub tx: mpsc::Sender<ServerEvent>,
}

/// Create a connected transport/peer pair.
pub fn channel_pair(capacity: usize) -> (ChannelTransport, AgentPeer) {
    let (client_tx, client_rx) = mpsc::channel(capacity);
    let (server_tx, server_rx) = mpsc::channel(capacity);
    (
        ChannelTransport {
            tx: Mutex::new(Some(client_tx)),
            rx: Mutex::new(server_rx),
        },
        AgentPeer {
            rx: client_rx,
            tx: server_tx,
        },
    )
}

#[async_trait]
impl AgentTransport for ChannelTransport {
    async fn send(&self, event: ClientEvent) -> Result<(), TransportError> {
        let tx = self.tx.lock().await;
        match tx.as_ref() {
            Some(tx) => tx.send(event).await.map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    async fn recv(&self) -> Option<ServerEvent> {
        self.rx.lock().await.recv().await
    }

    async fn close(&self) {
        // Dropping the sender tells the peer the stream ended.
        self.tx.lock().await.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_send_order() {
        let (transport, mut peer) = channel_pair(8);

        transport
            .send(ClientEvent::AppendAudio {
                audio: "one".into(),
            })
            .await
            .unwrap();
        transport
            .send(ClientEvent::AppendAudio {
                audio: "two".into(),
            })
            .await
            .unwrap();

        let first = peer.rx.recv().await.unwrap();
        let second = peer.rx.recv().await.unwrap();
        assert!(matches!(first, ClientEvent::AppendAudio { audio } if audio == "one"));
        assert!(matches!(second, ClientEvent::AppendAudio { audio } if audio == "two"));
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (transport, _peer) = channel_pair(8);
        transport.close().await;

        let result = transport
            .send(ClientEvent::AppendAudio {
                audio: "late".into(),
            })
            .await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_recv_none_when_peer_drops() {
        let (transport, peer) = channel_pair(8);
        peer.tx
            .send(ServerEvent::SessionCreated)
            .await
            .unwrap();
        drop(peer);

        assert!(matches!(
            transport.recv().await,
            Some(ServerEvent::SessionCreated)
        ));
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_ends_peer_stream() {
        let (transport, mut peer) = channel_pair(8);
        transport.close().await;
        assert!(peer.rx.recv().await.is_none());
    }
}
