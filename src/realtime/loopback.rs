//! Scripted in-process agent
//!
//! Drives the client side of a [`channel_pair`] through a fixed set of
//! interview turns: speak a prompt (transcript deltas plus one audio delta),
//! wait for candidate audio, then report the candidate's utterance. Lets the
//! whole engine run end to end with no network and no live model.

use async_trait::async_trait;
use base64::Engine;
use tracing::debug;

use super::client::{AgentClient, AgentConnector};
use super::events::{ClientEvent, ServerEvent};
use super::transport::{channel_pair, AgentPeer, TransportError};
use crate::audio::samples_to_bytes;
use crate::session::InterviewConfig;

/// One scripted exchange: the agent speaks, the candidate answers.
#[derive(Debug, Clone)]
pub struct AgentTurn {
    pub prompt: String,
    pub user_reply: String,
}

impl AgentTurn {
    pub fn new(prompt: impl Into<String>, user_reply: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            user_reply: user_reply.into(),
        }
    }
}

pub struct LoopbackConnector {
    turns: Vec<AgentTurn>,
    /// Audio frames to consume from the candidate before each reply is
    /// considered complete. Zero means reply without waiting for audio.
    appends_per_turn: usize,
}

impl LoopbackConnector {
    pub fn new(turns: Vec<AgentTurn>) -> Self {
        Self {
            turns,
            appends_per_turn: 0,
        }
    }

    pub fn with_appends_per_turn(mut self, appends: usize) -> Self {
        self.appends_per_turn = appends;
        self
    }

    /// A short canned interview for demo runs.
    pub fn demo() -> Self {
        Self::new(vec![
            AgentTurn::new(
                "Welcome to your interview. Could you briefly introduce yourself?",
                "I am a backend engineer with six years of experience.",
            ),
            AgentTurn::new(
                "Tell me about a production incident you handled.",
                "We lost a database node during a deploy and failed over within minutes.",
            ),
            AgentTurn::new(
                "Thank you, that concludes the interview. Goodbye!",
                "Thanks for your time.",
            ),
        ])
    }
}

#[async_trait]
impl AgentConnector for LoopbackConnector {
    async fn connect(&self, _config: &InterviewConfig) -> Result<AgentClient, TransportError> {
        let (transport, peer) = channel_pair(64);
        tokio::spawn(run_script(peer, self.turns.clone(), self.appends_per_turn));
        Ok(AgentClient::new(Box::new(transport)))
    }
}

/// 100ms of sawtooth at the transport rate, standing in for agent speech.
fn agent_tone() -> String {
    let samples: Vec<i16> = (0..2400).map(|i| ((i % 48) as i16 - 24) * 256).collect();
    base64::engine::general_purpose::STANDARD.encode(samples_to_bytes(&samples))
}

async fn run_script(mut peer: AgentPeer, turns: Vec<AgentTurn>, appends_per_turn: usize) {
    // The engine must configure the session before anything else happens.
    match peer.rx.recv().await {
        Some(ClientEvent::SessionUpdate { .. }) => {}
        _ => {
            debug!("loopback agent: stream ended before session config");
            return;
        }
    }
    if peer.tx.send(ServerEvent::SessionCreated).await.is_err() {
        return;
    }

    for turn in turns {
        // Speak: transcript text word by word, then the audio, then done.
        for (i, word) in turn.prompt.split_whitespace().enumerate() {
            let delta = if i == 0 {
                word.to_string()
            } else {
                format!(" {}", word)
            };
            if peer
                .tx
                .send(ServerEvent::AudioTranscriptDelta { delta })
                .await
                .is_err()
            {
                return;
            }
        }
        if peer
            .tx
            .send(ServerEvent::AudioDelta {
                delta: agent_tone(),
            })
            .await
            .is_err()
        {
            return;
        }
        if peer.tx.send(ServerEvent::ResponseDone).await.is_err() {
            return;
        }

        // Listen: consume candidate audio, then report the utterance.
        let mut appends = 0;
        while appends < appends_per_turn {
            match peer.rx.recv().await {
                Some(ClientEvent::AppendAudio { .. }) => appends += 1,
                Some(_) => {}
                None => {
                    debug!("loopback agent: candidate stream ended mid-turn");
                    return;
                }
            }
        }
        if peer.tx.send(ServerEvent::SpeechStarted).await.is_err() {
            return;
        }
        if peer
            .tx
            .send(ServerEvent::InputTranscriptionCompleted {
                transcript: turn.user_reply,
            })
            .await
            .is_err()
        {
            return;
        }
    }
    // Dropping the sender ends the inbound stream; the engine reads that as
    // the agent hanging up.
    debug!("loopback agent: script complete");
}
