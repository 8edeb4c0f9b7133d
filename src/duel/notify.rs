//! Outbound Notifications
//!
//! The processor talks to clients only through [`Notifier`]. The transport
//! implements it; tests use [`testing::RecordingNotifier`].

use serde::{Deserialize, Serialize};

use crate::core::ids::{DuelCode, SessionId};
use crate::duel::record::MatchOutcome;

/// Payload delivered to one or more participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// The creator's duel exists under this code.
    DuelCreated {
        /// Code to share with the challenger.
        duel_code: DuelCode,
    },
    /// Both participants present.
    DuelReady {
        /// Duel code.
        duel_code: DuelCode,
        /// Scramble to apply.
        scramble: String,
        /// Cube size (layers per side).
        cube_size: u32,
        /// Inspection time in seconds.
        inspection_time: u32,
    },
    /// Both participants ready; start timing.
    DuelStarted {
        /// Duel code.
        duel_code: DuelCode,
    },
    /// Both times are in.
    DuelEnded {
        /// Duel code.
        duel_code: DuelCode,
        /// Outcome for the recipient.
        outcome: MatchOutcome,
        /// Recipient's own time (ms).
        own_time_ms: u64,
        /// Opponent's time (ms), the one shown to the recipient.
        opponent_time_ms: u64,
    },
    /// The other participant left.
    DuelCancelled {
        /// Duel code.
        duel_code: DuelCode,
    },
}

impl Notification {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Notification::DuelCreated { .. } => "duel_created",
            Notification::DuelReady { .. } => "duel_ready",
            Notification::DuelStarted { .. } => "duel_started",
            Notification::DuelEnded { .. } => "duel_ended",
            Notification::DuelCancelled { .. } => "duel_cancelled",
        }
    }
}

/// Delivery failures reported by a [`Notifier`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    /// Some recipients are not (or no longer) connected.
    #[error("Recipients not connected: {0:?}")]
    NotConnected(Vec<SessionId>),

    /// Some recipients' outbound buffers are full.
    #[error("Outbound buffer full for: {0:?}")]
    BufferFull(Vec<SessionId>),

    /// Transport-specific failure.
    #[error("Delivery failed: {0}")]
    Transport(String),
}

/// Transport boundary: deliver a notification to sessions.
///
/// Implementations must not block; a send is fire-and-forget from the
/// caller's point of view. Every recipient is attempted even if an earlier
/// one fails.
pub trait Notifier: Send + Sync {
    /// Deliver `notification` to every session in `recipients`.
    fn notify(&self, recipients: &[SessionId], notification: &Notification)
        -> Result<(), NotifyError>;
}

/// Test doubles.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    use super::*;

    /// Records every delivery; recipients in `unreachable` fail.
    #[derive(Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<(SessionId, Notification)>>,
        unreachable: Mutex<BTreeSet<SessionId>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make deliveries to `session` fail.
        pub fn disconnect(&self, session: SessionId) {
            self.unreachable.lock().unwrap().insert(session);
        }

        /// Everything delivered so far, in order.
        pub fn sent(&self) -> Vec<(SessionId, Notification)> {
            self.sent.lock().unwrap().clone()
        }

        /// Notifications delivered to `session`, in order.
        pub fn sent_to(&self, session: SessionId) -> Vec<Notification> {
            self.sent()
                .into_iter()
                .filter(|(s, _)| *s == session)
                .map(|(_, n)| n)
                .collect()
        }

        pub fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        pub fn clear(&self) {
            self.sent.lock().unwrap().clear();
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(
            &self,
            recipients: &[SessionId],
            notification: &Notification,
        ) -> Result<(), NotifyError> {
            let unreachable = self.unreachable.lock().unwrap();
            let mut sent = self.sent.lock().unwrap();
            let mut failed = Vec::new();

            for session in recipients {
                if unreachable.contains(session) {
                    failed.push(*session);
                } else {
                    sent.push((*session, notification.clone()));
                }
            }

            if failed.is_empty() {
                Ok(())
            } else {
                Err(NotifyError::NotConnected(failed))
            }
        }
    }
}
