//! Per-connection protocol state machine
//!
//! Pure bookkeeping: decides what an inbound frame means for the current
//! phase and what the connection should do about it. The transport side
//! lives in [`super::client`].

use tracing::{debug, warn};

use crate::game::GameState;

use super::protocol::{decode_game_state, ClientMsg, Envelope, Inbound};

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    /// Constructed, `connect` not yet called
    Idle,
    /// Transport handshake in flight
    Connecting,
    /// Transport open
    Connected,
    /// Waiting for the server's "connected" notification or for the ready
    /// acknowledgement to go out
    AwaitingReady,
    /// Ready sent, game snapshots flowing
    Playing,
    /// Terminal
    Closed,
}

/// What the connection must do after an inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Send the ready acknowledgement, then report the outcome through
    /// [`ProtocolSession::ready_sent`]
    SendReady(ClientMsg),
    /// Hand a decoded snapshot to the state handler
    State(GameState),
    /// Close the connection gracefully
    Close,
    /// Nothing to do
    Ignore,
}

#[derive(Debug)]
pub struct ProtocolSession {
    bot_id: String,
    game_id: String,
    phase: ClientPhase,
}

impl ProtocolSession {
    pub fn new(bot_id: impl Into<String>, game_id: impl Into<String>) -> Self {
        Self {
            bot_id: bot_id.into(),
            game_id: game_id.into(),
            phase: ClientPhase::Idle,
        }
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    pub fn is_playing(&self) -> bool {
        self.phase == ClientPhase::Playing
    }

    /// `Idle -> Connecting`. Returns false when the session already left `Idle`.
    pub fn begin_connect(&mut self) -> bool {
        if self.phase != ClientPhase::Idle {
            return false;
        }
        self.phase = ClientPhase::Connecting;
        true
    }

    /// Transport is open: `Connecting -> Connected -> AwaitingReady`
    pub fn opened(&mut self) {
        if self.phase != ClientPhase::Connecting {
            return;
        }
        self.phase = ClientPhase::Connected;
        debug!(bot_id = %self.bot_id, "Transport open, awaiting ready notification");
        self.phase = ClientPhase::AwaitingReady;
    }

    /// Outcome of sending the ready acknowledgement
    pub fn ready_sent(&mut self) {
        if self.phase == ClientPhase::AwaitingReady {
            self.phase = ClientPhase::Playing;
        }
    }

    pub fn closed(&mut self) {
        self.phase = ClientPhase::Closed;
    }

    /// Route one inbound text frame
    pub fn handle_text(&mut self, text: &str) -> Dispatch {
        let envelope = match serde_json::from_str::<Envelope>(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(bot_id = %self.bot_id, error = %e, "Failed to decode inbound frame");
                return Dispatch::Ignore;
            }
        };

        match (envelope.classify(), self.phase) {
            (_, ClientPhase::Closed) => {
                debug!(bot_id = %self.bot_id, "Frame after close, dropping");
                Dispatch::Ignore
            }
            (Inbound::Connected, ClientPhase::AwaitingReady) => Dispatch::SendReady(ClientMsg::Ready {
                player_id: self.bot_id.clone(),
                game_id: self.game_id.clone(),
            }),
            (Inbound::Connected, phase) => {
                warn!(bot_id = %self.bot_id, ?phase, "Unexpected connected notification");
                Dispatch::Ignore
            }
            (Inbound::Finished, _) => {
                debug!(bot_id = %self.bot_id, game_id = %self.game_id, "Game finished");
                self.phase = ClientPhase::Closed;
                Dispatch::Close
            }
            (Inbound::GameState, ClientPhase::AwaitingReady | ClientPhase::Playing) => {
                match decode_game_state(text) {
                    Ok(state) => Dispatch::State(state),
                    Err(e) => {
                        warn!(bot_id = %self.bot_id, error = %e, "Failed to decode game state");
                        Dispatch::Ignore
                    }
                }
            }
            (Inbound::GameState, phase) => {
                warn!(bot_id = %self.bot_id, ?phase, "Game state before transport open");
                Dispatch::Ignore
            }
            (Inbound::Other { kind, status }, _) => {
                warn!(
                    bot_id = %self.bot_id,
                    kind = kind.as_deref().unwrap_or("<none>"),
                    status = status.as_deref().unwrap_or("<none>"),
                    "Unknown message type/status"
                );
                Dispatch::Ignore
            }
        }
    }
}
