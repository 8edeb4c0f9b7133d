//! Duel Events
//!
//! Inbound events and the queue that carries them to the processor.
//! Any number of connection handlers hold an [`EventSender`]; exactly one
//! [`EventReceiver`] exists and it is drained in arrival order.

use std::fmt;

use tokio::sync::mpsc;

use crate::core::ids::{DuelCode, SessionId};

/// Event-specific payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuelEventKind {
    /// Host asked for a new duel.
    DuelCreated {
        /// Cube size (layers per side).
        cube_size: u32,
        /// Inspection time in seconds.
        inspection_time: u32,
        /// Override for the scramble move count.
        scramble_length: Option<u32>,
    },
    /// Challenger entered a code.
    DuelJoined,
    /// Participant confirmed readiness.
    PlayerReady,
    /// Participant left, or its session ended.
    DuelExited,
    /// Participant finished solving.
    SolveFinished {
        /// Elapsed time in milliseconds.
        time_ms: u64,
    },
}

impl DuelEventKind {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            DuelEventKind::DuelCreated { .. } => "duel_created",
            DuelEventKind::DuelJoined => "duel_joined",
            DuelEventKind::PlayerReady => "player_ready",
            DuelEventKind::DuelExited => "duel_exited",
            DuelEventKind::SolveFinished { .. } => "solve_finished",
        }
    }
}

/// One inbound duel event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuelEvent {
    /// Duel the event targets.
    pub duel_code: DuelCode,
    /// Session that raised it.
    pub session_id: SessionId,
    /// What happened.
    pub kind: DuelEventKind,
}

impl DuelEvent {
    /// Build an event.
    pub fn new(duel_code: DuelCode, session_id: SessionId, kind: DuelEventKind) -> Self {
        Self {
            duel_code,
            session_id,
            kind,
        }
    }

    /// Create event.
    pub fn created(
        duel_code: DuelCode,
        session_id: SessionId,
        cube_size: u32,
        inspection_time: u32,
        scramble_length: Option<u32>,
    ) -> Self {
        Self::new(
            duel_code,
            session_id,
            DuelEventKind::DuelCreated {
                cube_size,
                inspection_time,
                scramble_length,
            },
        )
    }

    /// Join event.
    pub fn joined(duel_code: DuelCode, session_id: SessionId) -> Self {
        Self::new(duel_code, session_id, DuelEventKind::DuelJoined)
    }

    /// Ready event.
    pub fn ready(duel_code: DuelCode, session_id: SessionId) -> Self {
        Self::new(duel_code, session_id, DuelEventKind::PlayerReady)
    }

    /// Exit event.
    pub fn exited(duel_code: DuelCode, session_id: SessionId) -> Self {
        Self::new(duel_code, session_id, DuelEventKind::DuelExited)
    }

    /// Solve-finished event.
    pub fn solved(duel_code: DuelCode, session_id: SessionId, time_ms: u64) -> Self {
        Self::new(duel_code, session_id, DuelEventKind::SolveFinished { time_ms })
    }
}

impl fmt::Display for DuelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} for duel {} from {}", self.kind.name(), self.duel_code, self.session_id)
    }
}

/// The processor is gone; the event was not queued.
#[derive(Debug, thiserror::Error)]
#[error("Event queue closed, dropped {0}")]
pub struct EventQueueClosed(pub DuelEvent);

/// Producer side of the event queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<DuelEvent>,
}

impl EventSender {
    /// Enqueue without blocking.
    pub fn send(&self, event: DuelEvent) -> Result<(), EventQueueClosed> {
        self.tx.send(event).map_err(|e| EventQueueClosed(e.0))
    }

    /// Whether the consumer has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the event queue.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<DuelEvent>,
}

impl EventReceiver {
    /// Next event in arrival order; `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<DuelEvent> {
        self.rx.recv().await
    }

    /// Stop accepting new events. Already queued events stay readable.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// Create a connected sender/receiver pair.
pub fn event_queue() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}
