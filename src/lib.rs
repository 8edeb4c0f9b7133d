//! # Cube Duel Server
//!
//! Coordination engine for head-to-head cube-solving duels.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CUBE DUEL SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  ├── ids.rs      - Session ids and shareable duel codes      │
//! │  ├── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │  └── scramble.rs - Scramble generation for 2x2 to 7x7        │
//! │                                                              │
//! │  duel/           - Duel coordination                         │
//! │  ├── record.rs   - Duel record, roles and results            │
//! │  ├── store.rs    - Authoritative store and stale sweep       │
//! │  ├── events.rs   - Inbound events and FIFO queue             │
//! │  ├── notify.rs   - Outbound notifications                    │
//! │  ├── processor.rs- Single event consumer                     │
//! │  └── engine.rs   - Background task lifecycle                 │
//! │                                                              │
//! │  network/        - Transport                                 │
//! │  ├── server.rs   - WebSocket server and connection registry  │
//! │  └── protocol.rs - Message types                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Event Ordering
//!
//! Every state change goes through one queue drained by one consumer, so
//! events for a duel are applied in the order they were enqueued. The
//! store is still safe to read from any task while that happens.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod duel;
pub mod network;

// Re-export commonly used types
pub use core::ids::{DuelCode, SessionId};
pub use core::scramble::{RandomScrambler, ScrambleGenerator};
pub use duel::{DuelEngine, DuelEvent, DuelRecord, DuelResult, DuelStore, EngineConfig, Notifier};
pub use network::{ConnectionRegistry, DuelServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
