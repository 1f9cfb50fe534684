// Outbound frame encoder: accumulates captured PCM and cuts it into
// fixed-size base64 frames for the realtime transport.
//
// The remote agent only accepts full 4800-byte frames, so partial input is
// retained across pushes and a short tail at interview end is dropped rather
// than sent. While disarmed the encoder discards input instead of buffering
// it, so re-arming after a reconnect never replays stale audio.

use base64::Engine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::frame::{samples_to_bytes, AudioFrame, TRANSPORT_FRAME_BYTES};
use crate::error::SessionError;
use crate::realtime::client::ClientSlot;

/// Shared armed flag for the outbound encoder.
///
/// The session controller arms it when the connection becomes active and
/// disarms it on teardown; the encode loop reads it per capture frame.
#[derive(Debug, Clone, Default)]
pub struct TransportArm {
    armed: Arc<AtomicBool>,
}

impl TransportArm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}

/// Accumulates raw PCM bytes and emits exact transport frames.
#[derive(Debug, Default)]
pub struct FrameEncoder {
    pending: Vec<u8>,
    armed: bool,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sync the armed state. Disarming clears any partial accumulation.
    pub fn set_armed(&mut self, armed: bool) {
        if self.armed && !armed {
            self.pending.clear();
        }
        self.armed = armed;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Bytes retained waiting for the next push.
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    /// Append captured samples and return every complete frame, oldest first,
    /// base64-encoded for the wire. Returns nothing while disarmed.
    pub fn push(&mut self, samples: &[i16]) -> Vec<String> {
        if !self.armed {
            // Discarded, not buffered: unbounded growth while idle would
            // replay minutes of stale audio on the next arm.
            self.pending.clear();
            return Vec::new();
        }

        self.pending.extend(samples_to_bytes(samples));

        let mut frames = Vec::new();
        while self.pending.len() >= TRANSPORT_FRAME_BYTES {
            let rest = self.pending.split_off(TRANSPORT_FRAME_BYTES);
            let frame = std::mem::replace(&mut self.pending, rest);
            frames.push(base64::engine::general_purpose::STANDARD.encode(frame));
        }
        frames
    }
}

/// Encode loop: reads microphone frames from the router, emits one transport
/// send per complete frame, in capture order.
///
/// A send that fails while the connection is still open is a transport
/// fault: the loop closes the connection, which is the session's single
/// cancellation point, and reports the fault to whoever joins the task. A
/// send that fails because the connection was already closed locally is a
/// normal end.
pub async fn run_encoder(
    mut rx: mpsc::Receiver<AudioFrame>,
    client: ClientSlot,
    arm: TransportArm,
) -> Result<(), SessionError> {
    let mut encoder = FrameEncoder::new();

    while let Some(frame) = rx.recv().await {
        encoder.set_armed(arm.is_armed());
        let payloads = encoder.push(&frame.samples);
        if payloads.is_empty() {
            continue;
        }

        let Some(client) = client.get() else {
            debug!("encoder armed without a live connection, dropping frames");
            continue;
        };

        for payload in payloads {
            if let Err(e) = client.append_audio(payload).await {
                if client.is_closed() {
                    debug!("connection closed under the encoder, stopping");
                    return Ok(());
                }
                warn!("audio frame send failed, closing connection: {}", e);
                client.close().await;
                return Err(SessionError::Transport(e.to_string()));
            }
        }
    }

    if encoder.pending_bytes() > 0 {
        // Never send a short frame; the tail at stream end is accepted loss.
        debug!(
            "dropping {} trailing bytes below one frame",
            encoder.pending_bytes()
        );
    }
    Ok(())
}
