//! Duel Record
//!
//! State of one duel session plus the result computed from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ids::{DuelCode, SessionId};

/// Participant role within a duel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Created the duel.
    Host,
    /// Joined with the code.
    Challenger,
}

impl Role {
    /// The other role.
    pub fn opponent(self) -> Self {
        match self {
            Role::Host => Role::Challenger,
            Role::Challenger => Role::Host,
        }
    }
}

/// State of a single duel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuelRecord {
    /// Code the duel is stored under.
    pub code: DuelCode,
    /// Session that created the duel.
    pub host_id: SessionId,
    /// Session that joined, if any.
    pub challenger_id: Option<SessionId>,
    /// A challenger has joined at some point, even if they left again.
    pub challenger_joined: bool,
    /// Cube size (layers per side).
    pub cube_size: u32,
    /// Inspection time in seconds.
    pub inspection_time: u32,
    /// Scramble both participants solve.
    pub scramble: String,
    /// Host confirmed readiness.
    pub host_ready: bool,
    /// Challenger confirmed readiness.
    pub challenger_ready: bool,
    /// Host's solve time (ms).
    pub host_solve_time: Option<u64>,
    /// Challenger's solve time (ms).
    pub challenger_solve_time: Option<u64>,
    /// When the duel was created.
    pub created_at: DateTime<Utc>,
}

impl DuelRecord {
    /// New record awaiting a challenger.
    pub fn new(
        code: DuelCode,
        host_id: SessionId,
        cube_size: u32,
        inspection_time: u32,
        scramble: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            code,
            host_id,
            challenger_id: None,
            challenger_joined: false,
            cube_size,
            inspection_time,
            scramble,
            host_ready: false,
            challenger_ready: false,
            host_solve_time: None,
            challenger_solve_time: None,
            created_at,
        }
    }

    /// Role held by `session`, if it participates.
    pub fn role_of(&self, session: &SessionId) -> Option<Role> {
        if self.host_id == *session {
            Some(Role::Host)
        } else if self.challenger_id.as_ref() == Some(session) {
            Some(Role::Challenger)
        } else {
            None
        }
    }

    /// Session holding `role`.
    pub fn participant(&self, role: Role) -> Option<SessionId> {
        match role {
            Role::Host => Some(self.host_id),
            Role::Challenger => self.challenger_id,
        }
    }

    /// Host and challenger, when both are present.
    pub fn participants(&self) -> Vec<SessionId> {
        let mut ids = vec![self.host_id];
        ids.extend(self.challenger_id);
        ids
    }

    /// Whether `role` has confirmed readiness.
    pub fn is_ready(&self, role: Role) -> bool {
        match role {
            Role::Host => self.host_ready,
            Role::Challenger => self.challenger_ready,
        }
    }

    /// Solve time recorded for `role`.
    pub fn solve_time(&self, role: Role) -> Option<u64> {
        match role {
            Role::Host => self.host_solve_time,
            Role::Challenger => self.challenger_solve_time,
        }
    }

    /// Both participants ready.
    pub fn both_ready(&self) -> bool {
        self.host_ready && self.challenger_ready
    }

    /// Both solve times recorded.
    pub fn both_solved(&self) -> bool {
        self.host_solve_time.is_some() && self.challenger_solve_time.is_some()
    }

    /// No challenger currently assigned.
    pub fn awaiting_challenger(&self) -> bool {
        self.challenger_id.is_none()
    }

    /// Never had a challenger; only such duels count as abandoned.
    pub fn never_joined(&self) -> bool {
        !self.challenger_joined
    }

    pub(crate) fn assign_challenger(&mut self, challenger: SessionId) {
        self.challenger_id = Some(challenger);
        self.challenger_joined = true;
    }

    pub(crate) fn set_ready(&mut self, role: Role) {
        match role {
            Role::Host => self.host_ready = true,
            Role::Challenger => self.challenger_ready = true,
        }
    }

    pub(crate) fn set_solve_time(&mut self, role: Role, time_ms: u64) {
        match role {
            Role::Host => self.host_solve_time = Some(time_ms),
            Role::Challenger => self.challenger_solve_time = Some(time_ms),
        }
    }

    /// Drop the challenger and return to the awaiting-challenger state.
    ///
    /// Host readiness and time are reset too: a new challenger starts a
    /// fresh round against the same scramble. `challenger_joined` stays set.
    pub(crate) fn reset_challenger(&mut self) {
        self.challenger_id = None;
        self.challenger_ready = false;
        self.challenger_solve_time = None;
        self.host_ready = false;
        self.host_solve_time = None;
    }

    /// Result, once both times are in.
    pub fn result(&self) -> Option<DuelResult> {
        let challenger_id = self.challenger_id?;
        let host_time = self.host_solve_time?;
        let challenger_time = self.challenger_solve_time?;

        Some(DuelResult {
            code: self.code.clone(),
            host_id: self.host_id,
            challenger_id,
            host_time,
            challenger_time,
        })
    }
}

/// Outcome from one participant's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    /// Strictly faster than the opponent.
    Won,
    /// Strictly slower than the opponent.
    Lost,
    /// Identical times.
    Draw,
}

impl MatchOutcome {
    /// True only for [`MatchOutcome::Won`].
    pub fn is_winner(self) -> bool {
        matches!(self, MatchOutcome::Won)
    }
}

/// Final result of a completed duel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuelResult {
    /// Duel the result belongs to.
    pub code: DuelCode,
    /// Host session.
    pub host_id: SessionId,
    /// Challenger session.
    pub challenger_id: SessionId,
    /// Host's solve time (ms).
    pub host_time: u64,
    /// Challenger's solve time (ms).
    pub challenger_time: u64,
}

impl DuelResult {
    /// Winning role; `None` on equal times.
    pub fn winner(&self) -> Option<Role> {
        use std::cmp::Ordering;

        match self.host_time.cmp(&self.challenger_time) {
            Ordering::Less => Some(Role::Host),
            Ordering::Greater => Some(Role::Challenger),
            Ordering::Equal => None,
        }
    }

    /// Winning session; `None` on a draw.
    pub fn winner_id(&self) -> Option<SessionId> {
        self.winner().map(|role| self.session(role))
    }

    /// The faster time.
    pub fn winner_time(&self) -> u64 {
        self.host_time.min(self.challenger_time)
    }

    /// The slower time.
    pub fn loser_time(&self) -> u64 {
        self.host_time.max(self.challenger_time)
    }

    /// Session holding `role`.
    pub fn session(&self, role: Role) -> SessionId {
        match role {
            Role::Host => self.host_id,
            Role::Challenger => self.challenger_id,
        }
    }

    /// Time recorded by `role`.
    pub fn time(&self, role: Role) -> u64 {
        match role {
            Role::Host => self.host_time,
            Role::Challenger => self.challenger_time,
        }
    }

    /// Outcome as seen by `role`.
    pub fn outcome_for(&self, role: Role) -> MatchOutcome {
        match self.winner() {
            None => MatchOutcome::Draw,
            Some(winner) if winner == role => MatchOutcome::Won,
            Some(_) => MatchOutcome::Lost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: SessionId = SessionId::new([1; 16]);
    const CHALLENGER: SessionId = SessionId::new([2; 16]);

    fn joined_record() -> DuelRecord {
        let mut record = DuelRecord::new(
            DuelCode::new("ABC234"),
            HOST,
            3,
            15,
            "R U R' U'".to_string(),
            Utc::now(),
        );
        record.assign_challenger(CHALLENGER);
        record
    }

    #[test]
    fn test_role_lookup() {
        let record = joined_record();
        assert_eq!(record.role_of(&HOST), Some(Role::Host));
        assert_eq!(record.role_of(&CHALLENGER), Some(Role::Challenger));
        assert_eq!(record.role_of(&SessionId::new([9; 16])), None);
        assert_eq!(record.participants(), vec![HOST, CHALLENGER]);
    }

    #[test]
    fn test_result_needs_both_times() {
        let mut record = joined_record();
        record.set_ready(Role::Host);
        record.set_ready(Role::Challenger);
        assert!(record.both_ready());

        record.set_solve_time(Role::Host, 9000);
        assert!(!record.both_solved());
        assert!(record.result().is_none());

        record.set_solve_time(Role::Challenger, 8500);
        assert!(record.both_solved());
        assert!(record.result().is_some());
    }

    #[test]
    fn test_reset_challenger_returns_to_awaiting() {
        let mut record = joined_record();
        record.set_ready(Role::Host);
        record.set_ready(Role::Challenger);
        record.set_solve_time(Role::Host, 1000);

        record.reset_challenger();

        assert!(record.awaiting_challenger());
        assert!(!record.never_joined());
        assert!(!record.host_ready && !record.challenger_ready);
        assert_eq!(record.host_solve_time, None);
        assert_eq!(record.challenger_solve_time, None);
        assert_eq!(record.participants(), vec![HOST]);
    }

    #[test]
    fn test_challenger_wins() {
        let mut record = joined_record();
        record.set_solve_time(Role::Host, 9000);
        record.set_solve_time(Role::Challenger, 8500);

        let result = record.result().unwrap();
        assert_eq!(result.winner(), Some(Role::Challenger));
        assert_eq!(result.winner_id(), Some(CHALLENGER));
        assert_eq!(result.winner_time(), 8500);
        assert_eq!(result.loser_time(), 9000);
        assert_eq!(result.outcome_for(Role::Host), MatchOutcome::Lost);
        assert_eq!(result.outcome_for(Role::Challenger), MatchOutcome::Won);
    }

    #[test]
    fn test_equal_times_draw() {
        let mut record = joined_record();
        record.set_solve_time(Role::Host, 7000);
        record.set_solve_time(Role::Challenger, 7000);

        let result = record.result().unwrap();
        assert_eq!(result.winner(), None);
        assert_eq!(result.winner_id(), None);
        assert_eq!(result.outcome_for(Role::Host), MatchOutcome::Draw);
        assert!(!result.outcome_for(Role::Challenger).is_winner());
    }
}
