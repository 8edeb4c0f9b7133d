//! Duel Coordination
//!
//! ## Module Structure
//!
//! - `record`: Duel record, roles, results
//! - `store`: Authoritative duel state and the abandoned-duel sweep
//! - `events`: Inbound events and the FIFO event queue
//! - `notify`: Outbound notifications and the transport boundary
//! - `processor`: Single consumer applying events to the store
//! - `engine`: Lifecycle owner for store, processor and sweeper

pub mod record;
pub mod store;
pub mod events;
pub mod notify;
pub mod processor;
pub mod engine;

// Re-export key types
pub use record::{DuelRecord, DuelResult, MatchOutcome, Role};
pub use store::{Departure, DuelError, DuelStore, ErrorKind};
pub use events::{event_queue, DuelEvent, DuelEventKind, EventReceiver, EventSender};
pub use notify::{Notification, Notifier, NotifyError};
pub use processor::DuelEventProcessor;
pub use engine::{DuelEngine, EngineConfig};
