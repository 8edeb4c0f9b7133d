//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are JSON objects tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::core::ids::DuelCode;
use crate::duel::notify::Notification;
use crate::duel::record::MatchOutcome;

/// Smallest supported cube.
pub const MIN_CUBE_SIZE: u32 = 2;

/// Largest supported cube.
pub const MAX_CUBE_SIZE: u32 = 7;

pub use crate::core::scramble::MAX_SCRAMBLE_LENGTH;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Host a new duel.
    CreateDuel {
        /// Cube size (layers per side).
        cube_size: u32,
        /// Inspection time in seconds.
        #[serde(default)]
        inspection_time: u32,
        /// Scramble move count override.
        #[serde(default)]
        scramble_length: Option<u32>,
    },

    /// Join a duel by code.
    JoinDuel {
        /// Code shared by the host.
        duel_code: String,
    },

    /// Ready to start.
    Ready {
        /// Duel code.
        duel_code: String,
    },

    /// Solve finished.
    SolveFinished {
        /// Duel code.
        duel_code: String,
        /// Elapsed time in milliseconds.
        time_ms: u64,
    },

    /// Leave the duel.
    ExitDuel {
        /// Duel code.
        duel_code: String,
    },

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp, echoed back.
        timestamp: u64,
    },
}

impl ClientMessage {
    /// Reject parameters the server cannot honor.
    pub fn validate(&self) -> Result<(), ServerError> {
        match self {
            ClientMessage::CreateDuel {
                cube_size,
                scramble_length,
                ..
            } => {
                if !(MIN_CUBE_SIZE..=MAX_CUBE_SIZE).contains(cube_size) {
                    return Err(ServerError::new(
                        ErrorCode::InvalidInput,
                        format!(
                            "Cube size must be between {} and {}",
                            MIN_CUBE_SIZE, MAX_CUBE_SIZE
                        ),
                    ));
                }
                if scramble_length.map_or(false, |len| len > MAX_SCRAMBLE_LENGTH) {
                    return Err(ServerError::new(
                        ErrorCode::InvalidInput,
                        format!("Scramble length must be at most {}", MAX_SCRAMBLE_LENGTH),
                    ));
                }
                Ok(())
            }
            ClientMessage::JoinDuel { duel_code }
            | ClientMessage::Ready { duel_code }
            | ClientMessage::SolveFinished { duel_code, .. }
            | ClientMessage::ExitDuel { duel_code } => {
                if duel_code.trim().is_empty() {
                    return Err(ServerError::new(ErrorCode::InvalidInput, "Missing duel code"));
                }
                Ok(())
            }
            ClientMessage::Ping { .. } => Ok(()),
        }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message on every connection.
    Welcome {
        /// Session id assigned to this connection.
        session_id: String,
        /// Server version.
        server_version: String,
    },

    /// Duel created; share the code.
    DuelCreated {
        /// Duel code.
        duel_code: DuelCode,
    },

    /// Opponent present; scramble and settings attached.
    DuelReady {
        /// Duel code.
        duel_code: DuelCode,
        /// Scramble to apply.
        scramble: String,
        /// Cube size.
        cube_size: u32,
        /// Inspection time in seconds.
        inspection_time: u32,
    },

    /// Both ready; start the timer.
    DuelStarted {
        /// Duel code.
        duel_code: DuelCode,
    },

    /// Both solves in.
    DuelEnded(DuelEndInfo),

    /// Opponent left.
    DuelCancelled {
        /// Duel code.
        duel_code: DuelCode,
    },

    /// Pong response.
    Pong {
        /// Echo of the client timestamp.
        timestamp: u64,
        /// Server wall clock (ms since epoch).
        server_time: u64,
    },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown {
        /// Reason shown to the user.
        reason: String,
    },
}

/// Result of a finished duel, from the recipient's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuelEndInfo {
    /// Duel code.
    pub duel_code: DuelCode,
    /// Won, lost or draw.
    pub outcome: MatchOutcome,
    /// Convenience flag, true only when `outcome` is `won`.
    pub is_winner: bool,
    /// Recipient's own time (ms).
    pub own_time_ms: u64,
    /// Opponent's time (ms).
    pub opponent_time_ms: u64,
}

/// Error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    /// Build an error message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Invalid input.
    InvalidInput,
    /// Server overloaded.
    ServerOverloaded,
    /// Internal error.
    InternalError,
}

impl From<Notification> for ServerMessage {
    fn from(notification: Notification) -> Self {
        match notification {
            Notification::DuelCreated { duel_code } => ServerMessage::DuelCreated { duel_code },
            Notification::DuelReady {
                duel_code,
                scramble,
                cube_size,
                inspection_time,
            } => ServerMessage::DuelReady {
                duel_code,
                scramble,
                cube_size,
                inspection_time,
            },
            Notification::DuelStarted { duel_code } => ServerMessage::DuelStarted { duel_code },
            Notification::DuelEnded {
                duel_code,
                outcome,
                own_time_ms,
                opponent_time_ms,
            } => ServerMessage::DuelEnded(DuelEndInfo {
                duel_code,
                outcome,
                is_winner: outcome.is_winner(),
                own_time_ms,
                opponent_time_ms,
            }),
            Notification::DuelCancelled { duel_code } => {
                ServerMessage::DuelCancelled { duel_code }
            }
        }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
