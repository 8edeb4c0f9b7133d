//! Network Layer
//!
//! WebSocket transport for duel clients. This layer only translates between
//! sockets and the engine; all duel rules live in `duel/`.

pub mod protocol;
pub mod server;

pub use protocol::{ClientMessage, DuelEndInfo, ErrorCode, ServerError, ServerMessage};
pub use server::{ConnectionRegistry, DuelServer, DuelServerError, ServerConfig};
