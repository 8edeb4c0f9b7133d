//! Duel Store
//!
//! Authoritative in-memory state for active duels. Every operation takes the
//! store lock for its whole read-modify-write, so the event processor and the
//! background sweep never interleave on a record.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::core::ids::{DuelCode, SessionId};
use crate::duel::record::{DuelRecord, DuelResult, Role};

/// Broad category of a [`DuelError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Duel code unknown.
    NotFound,
    /// Code in use, slot taken, or value already recorded.
    Conflict,
    /// Session is neither host nor challenger.
    UnknownParticipant,
    /// Result requested before both solves are in.
    NotReady,
    /// Parameters rejected at creation.
    InvalidInput,
}

/// Duel store errors.
///
/// All of these are expected outcomes of stale or duplicate client events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DuelError {
    /// No duel under this code.
    #[error("Duel {0} not found")]
    NotFound(DuelCode),

    /// Code already used by an active duel.
    #[error("Duel code {0} already in use")]
    AlreadyExists(DuelCode),

    /// Challenger slot already filled.
    #[error("Duel {0} already has a challenger")]
    AlreadyFull(DuelCode),

    /// Session already takes part in this duel.
    #[error("Session already participates in duel {0}")]
    AlreadyParticipant(DuelCode),

    /// Session is not host or challenger.
    #[error("Session is not a participant of duel {0}")]
    UnknownParticipant(DuelCode),

    /// Solve time for this role was already recorded.
    #[error("Solve time already recorded in duel {0}")]
    SolveAlreadyRecorded(DuelCode),

    /// Not both solve times recorded yet.
    #[error("Duel {0} has no result yet")]
    NotReady(DuelCode),

    /// Cube size must be positive.
    #[error("Invalid cube size {0}")]
    InvalidCubeSize(u32),
}

impl DuelError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DuelError::NotFound(_) => ErrorKind::NotFound,
            DuelError::AlreadyExists(_)
            | DuelError::AlreadyFull(_)
            | DuelError::AlreadyParticipant(_)
            | DuelError::SolveAlreadyRecorded(_) => ErrorKind::Conflict,
            DuelError::UnknownParticipant(_) => ErrorKind::UnknownParticipant,
            DuelError::NotReady(_) => ErrorKind::NotReady,
            DuelError::InvalidCubeSize(_) => ErrorKind::InvalidInput,
        }
    }
}

/// What happened when a participant left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    /// Role the departing session held.
    pub role: Role,
    /// The whole record was deleted (host left).
    pub removed_whole_duel: bool,
    /// Participant still to be told, if any.
    pub other_participant: Option<SessionId>,
}

/// Owns all active duels.
pub struct DuelStore {
    duels: RwLock<BTreeMap<DuelCode, DuelRecord>>,
}

impl DuelStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            duels: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert a fresh duel awaiting a challenger.
    pub async fn create_duel(
        &self,
        code: DuelCode,
        host_id: SessionId,
        cube_size: u32,
        inspection_time: u32,
        scramble: String,
    ) -> Result<(), DuelError> {
        if cube_size == 0 {
            return Err(DuelError::InvalidCubeSize(cube_size));
        }

        let mut duels = self.duels.write().await;
        if duels.contains_key(&code) {
            return Err(DuelError::AlreadyExists(code));
        }

        let record = DuelRecord::new(
            code.clone(),
            host_id,
            cube_size,
            inspection_time,
            scramble,
            Utc::now(),
        );
        duels.insert(code, record);
        Ok(())
    }

    /// Assign the challenger slot. Returns a snapshot of the joined duel.
    pub async fn join_duel(
        &self,
        code: &DuelCode,
        challenger_id: SessionId,
    ) -> Result<DuelRecord, DuelError> {
        let mut duels = self.duels.write().await;
        let duel = duels
            .get_mut(code)
            .ok_or_else(|| DuelError::NotFound(code.clone()))?;

        if duel.host_id == challenger_id {
            return Err(DuelError::AlreadyParticipant(code.clone()));
        }
        if duel.challenger_id.is_some() {
            return Err(DuelError::AlreadyFull(code.clone()));
        }

        duel.assign_challenger(challenger_id);
        Ok(duel.clone())
    }

    /// Mark the caller's role ready.
    ///
    /// Returns `true` only on the call that makes both roles ready, so a
    /// repeated ready from either side never reports the start twice.
    pub async fn set_ready(&self, code: &DuelCode, session: SessionId) -> Result<bool, DuelError> {
        let mut duels = self.duels.write().await;
        let duel = duels
            .get_mut(code)
            .ok_or_else(|| DuelError::NotFound(code.clone()))?;
        let role = duel
            .role_of(&session)
            .ok_or_else(|| DuelError::UnknownParticipant(code.clone()))?;

        if duel.is_ready(role) {
            return Ok(false);
        }

        duel.set_ready(role);
        Ok(duel.both_ready())
    }

    /// Record the caller's solve time. The first time reported per role stands.
    pub async fn record_solve_time(
        &self,
        code: &DuelCode,
        session: SessionId,
        time_ms: u64,
    ) -> Result<Role, DuelError> {
        let mut duels = self.duels.write().await;
        let duel = duels
            .get_mut(code)
            .ok_or_else(|| DuelError::NotFound(code.clone()))?;
        let role = duel
            .role_of(&session)
            .ok_or_else(|| DuelError::UnknownParticipant(code.clone()))?;

        if duel.solve_time(role).is_some() {
            return Err(DuelError::SolveAlreadyRecorded(code.clone()));
        }

        duel.set_solve_time(role, time_ms);
        Ok(role)
    }

    /// Result of the duel if both solve times are present.
    pub async fn try_compute_result(&self, code: &DuelCode) -> Result<DuelResult, DuelError> {
        let duels = self.duels.read().await;
        let duel = duels
            .get(code)
            .ok_or_else(|| DuelError::NotFound(code.clone()))?;

        duel.result().ok_or_else(|| DuelError::NotReady(code.clone()))
    }

    /// Remove a participant.
    ///
    /// The host leaving deletes the duel; the challenger leaving reopens the
    /// slot. The other participant (if any) is returned for notification.
    pub async fn remove_participant(
        &self,
        code: &DuelCode,
        session: SessionId,
    ) -> Result<Departure, DuelError> {
        let mut duels = self.duels.write().await;
        let duel = duels
            .get_mut(code)
            .ok_or_else(|| DuelError::NotFound(code.clone()))?;
        let role = duel
            .role_of(&session)
            .ok_or_else(|| DuelError::UnknownParticipant(code.clone()))?;

        let departure = match role {
            Role::Host => {
                let other = duel.challenger_id;
                duels.remove(code);
                Departure {
                    role,
                    removed_whole_duel: true,
                    other_participant: other,
                }
            }
            Role::Challenger => {
                duel.reset_challenger();
                Departure {
                    role,
                    removed_whole_duel: false,
                    other_participant: Some(duel.host_id),
                }
            }
        };

        Ok(departure)
    }

    /// Delete a duel unconditionally. Returns whether it existed.
    pub async fn remove(&self, code: &DuelCode) -> bool {
        self.duels.write().await.remove(code).is_some()
    }

    /// Snapshot of a duel.
    pub async fn get(&self, code: &DuelCode) -> Option<DuelRecord> {
        self.duels.read().await.get(code).cloned()
    }

    /// Number of active duels.
    pub async fn duel_count(&self) -> usize {
        self.duels.read().await.len()
    }

    /// Evict duels that never got a challenger within `inactivity_timeout`
    /// of `now`. A duel whose challenger joined and left is kept. Returns the
    /// evicted codes.
    pub async fn sweep_expired(
        &self,
        now: DateTime<Utc>,
        inactivity_timeout: Duration,
    ) -> Vec<DuelCode> {
        let mut duels = self.duels.write().await;

        let expired: Vec<DuelCode> = duels
            .values()
            .filter(|d| d.never_joined())
            .filter(|d| {
                (now - d.created_at)
                    .to_std()
                    .map(|age| age > inactivity_timeout)
                    .unwrap_or(false)
            })
            .map(|d| d.code.clone())
            .collect();

        for code in &expired {
            duels.remove(code);
        }

        expired
    }

    /// Spawn the periodic sweep. Stops when `shutdown` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        every: Duration,
        inactivity_timeout: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = store.sweep_expired(Utc::now(), inactivity_timeout).await;
                        if evicted.is_empty() {
                            debug!("Sweep found no abandoned duels");
                        } else {
                            info!("Swept {} abandoned duel(s): {:?}", evicted.len(), evicted);
                        }
                    }
                    _ = shutdown.recv() => {
                        debug!("Sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}

impl Default for DuelStore {
    fn default() -> Self {
        Self::new()
    }
}
