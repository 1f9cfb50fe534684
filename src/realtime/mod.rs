//! Realtime agent connection: typed protocol events, the transport seam, the
//! connection wrapper, and a scripted loopback agent.

pub mod client;
pub mod events;
pub mod loopback;
pub mod transport;

pub use client::{AgentClient, AgentConnector, ClientSlot};
pub use events::{ClientEvent, ServerEvent, SessionConfigPayload};
pub use loopback::{AgentTurn, LoopbackConnector};
pub use transport::{channel_pair, AgentPeer, AgentTransport, ChannelTransport, TransportError};
