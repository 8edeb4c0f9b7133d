//! Duel Event Processor
//!
//! Single consumer of the event queue. Each event is applied to the store and
//! its notifications are sent before the next event is taken, so handlers
//! never race each other; the store lock only guards against the sweep.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument};

use crate::core::ids::{DuelCode, SessionId};
use crate::core::scramble::ScrambleGenerator;
use crate::duel::events::{DuelEvent, DuelEventKind, EventReceiver};
use crate::duel::notify::{Notification, Notifier, NotifyError};
use crate::duel::record::Role;
use crate::duel::store::{DuelError, DuelStore, ErrorKind};

/// Why an event produced no (or partial) notifications.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// Store rejected the transition; the event is stale or a duplicate.
    #[error(transparent)]
    Store(#[from] DuelError),

    /// Store transition applied but delivery failed.
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// Applies duel events to the store and notifies participants.
pub struct DuelEventProcessor {
    store: Arc<DuelStore>,
    notifier: Arc<dyn Notifier>,
    scrambler: Box<dyn ScrambleGenerator>,
}

impl DuelEventProcessor {
    /// Create a processor over `store`.
    pub fn new(
        store: Arc<DuelStore>,
        notifier: Arc<dyn Notifier>,
        scrambler: Box<dyn ScrambleGenerator>,
    ) -> Self {
        Self {
            store,
            notifier,
            scrambler,
        }
    }

    /// Drain `events` until shutdown or until every sender is gone.
    ///
    /// A shutdown signal wins over pending events: nothing further is
    /// processed once it fires.
    pub async fn run(mut self, mut events: EventReceiver, mut shutdown: broadcast::Receiver<()>) {
        info!("Duel event processor started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Duel event processor stopping");
                    events.close();
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.process(event).await,
                    None => {
                        info!("Event queue closed, duel event processor exiting");
                        break;
                    }
                }
            }
        }
    }

    /// Handle one event. Failures are logged, never propagated.
    #[instrument(skip_all, fields(kind = event.kind.name(), duel = %event.duel_code, session = %event.session_id))]
    pub async fn process(&mut self, event: DuelEvent) {
        let DuelEvent {
            duel_code,
            session_id,
            kind,
        } = event;

        let result = match kind {
            DuelEventKind::DuelCreated {
                cube_size,
                inspection_time,
                scramble_length,
            } => {
                self.handle_created(duel_code, session_id, cube_size, inspection_time, scramble_length)
                    .await
            }
            DuelEventKind::DuelJoined => self.handle_joined(&duel_code, session_id).await,
            DuelEventKind::PlayerReady => self.handle_ready(&duel_code, session_id).await,
            DuelEventKind::SolveFinished { time_ms } => {
                self.handle_solve_finished(&duel_code, session_id, time_ms).await
            }
            DuelEventKind::DuelExited => self.handle_exited(&duel_code, session_id).await,
        };

        match result {
            Ok(()) => {}
            Err(ProcessError::Store(e)) => {
                debug!("Dropping stale event: {}", e);
            }
            Err(ProcessError::Notify(e)) => {
                error!("Failed to notify participants: {}", e);
            }
        }
    }

    async fn handle_created(
        &mut self,
        code: DuelCode,
        host: SessionId,
        cube_size: u32,
        inspection_time: u32,
        scramble_length: Option<u32>,
    ) -> Result<(), ProcessError> {
        let scramble = self.scrambler.generate(cube_size, scramble_length);

        self.store
            .create_duel(code.clone(), host, cube_size, inspection_time, scramble)
            .await?;
        info!("Duel {} created by {}", code, host);

        self.notifier
            .notify(&[host], &Notification::DuelCreated { duel_code: code })?;
        Ok(())
    }

    async fn handle_joined(
        &mut self,
        code: &DuelCode,
        challenger: SessionId,
    ) -> Result<(), ProcessError> {
        let duel = self.store.join_duel(code, challenger).await?;
        info!("Duel {} joined by {}", code, challenger);

        let notification = Notification::DuelReady {
            duel_code: code.clone(),
            scramble: duel.scramble.clone(),
            cube_size: duel.cube_size,
            inspection_time: duel.inspection_time,
        };
        self.notifier
            .notify(&[duel.host_id, challenger], &notification)?;
        Ok(())
    }

    async fn handle_ready(&mut self, code: &DuelCode, session: SessionId) -> Result<(), ProcessError> {
        if !self.store.set_ready(code, session).await? {
            return Ok(());
        }

        let duel = self
            .store
            .get(code)
            .await
            .ok_or_else(|| DuelError::NotFound(code.clone()))?;
        info!("Duel {} started", code);

        self.notifier.notify(
            &duel.participants(),
            &Notification::DuelStarted {
                duel_code: code.clone(),
            },
        )?;
        Ok(())
    }

    async fn handle_solve_finished(
        &mut self,
        code: &DuelCode,
        session: SessionId,
        time_ms: u64,
    ) -> Result<(), ProcessError> {
        let role = self.store.record_solve_time(code, session, time_ms).await?;
        debug!("{:?} finished in {} ms", role, time_ms);

        let result = match self.store.try_compute_result(code).await {
            Ok(result) => result,
            Err(e) if e.kind() == ErrorKind::NotReady => {
                debug!("Waiting for opponent's time");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        // Attempt both deliveries before reporting either failure
        let mut delivery = Ok(());
        for role in [Role::Host, Role::Challenger] {
            let notification = Notification::DuelEnded {
                duel_code: code.clone(),
                outcome: result.outcome_for(role),
                own_time_ms: result.time(role),
                opponent_time_ms: result.time(role.opponent()),
            };
            if let Err(e) = self.notifier.notify(&[result.session(role)], &notification) {
                delivery = Err(e);
            }
        }

        self.store.remove(code).await;
        match result.winner_id() {
            Some(winner) => info!(
                "Duel {} won by {} ({} ms vs {} ms)",
                code,
                winner,
                result.winner_time(),
                result.loser_time()
            ),
            None => info!("Duel {} drawn at {} ms", code, result.winner_time()),
        }

        delivery?;
        Ok(())
    }

    async fn handle_exited(&mut self, code: &DuelCode, session: SessionId) -> Result<(), ProcessError> {
        let departure = self.store.remove_participant(code, session).await?;

        if departure.removed_whole_duel {
            info!("Duel {} closed, host left", code);
        } else {
            info!("Challenger left duel {}, awaiting a new one", code);
        }

        if let Some(other) = departure.other_participant {
            self.notifier.notify(
                &[other],
                &Notification::DuelCancelled {
                    duel_code: code.clone(),
                },
            )?;
        }
        Ok(())
    }
}
