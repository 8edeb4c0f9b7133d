//! Duel Engine
//!
//! Owns the store, the event queue and the two background tasks (processor
//! and sweeper). Starting the engine spawns both; [`DuelEngine::shutdown`]
//! stops both and waits for them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::core::scramble::ScrambleGenerator;
use crate::duel::events::{event_queue, EventSender};
use crate::duel::notify::Notifier;
use crate::duel::processor::DuelEventProcessor;
use crate::duel::store::DuelStore;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How often the sweep runs.
    pub sweep_interval: Duration,
    /// Age after which a duel without a challenger is evicted.
    pub inactivity_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(10 * 60),
            inactivity_timeout: Duration::from_secs(60 * 60),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sweep_interval: env_secs("DUEL_SWEEP_INTERVAL_SECS").unwrap_or(defaults.sweep_interval),
            inactivity_timeout: env_secs("DUEL_INACTIVITY_TIMEOUT_SECS")
                .unwrap_or(defaults.inactivity_timeout),
        }
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
        _ => {
            warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}

/// Running duel coordination engine.
pub struct DuelEngine {
    store: Arc<DuelStore>,
    events: EventSender,
    shutdown_tx: broadcast::Sender<()>,
    processor_handle: JoinHandle<()>,
    sweeper_handle: JoinHandle<()>,
}

impl DuelEngine {
    /// Start the processor and sweeper on the current tokio runtime.
    pub fn start(
        config: EngineConfig,
        notifier: Arc<dyn Notifier>,
        scrambler: Box<dyn ScrambleGenerator>,
    ) -> Self {
        let store = Arc::new(DuelStore::new());
        let (events, receiver) = event_queue();
        let (shutdown_tx, _) = broadcast::channel(1);

        let processor = DuelEventProcessor::new(store.clone(), notifier, scrambler);
        let processor_handle = tokio::spawn(processor.run(receiver, shutdown_tx.subscribe()));

        let sweeper_handle = store.spawn_sweeper(
            config.sweep_interval,
            config.inactivity_timeout,
            shutdown_tx.subscribe(),
        );

        info!(
            "Duel engine started (sweep every {:?}, evict after {:?})",
            config.sweep_interval, config.inactivity_timeout
        );

        Self {
            store,
            events,
            shutdown_tx,
            processor_handle,
            sweeper_handle,
        }
    }

    /// A producer handle for the event queue.
    pub fn events(&self) -> EventSender {
        self.events.clone()
    }

    /// The store, for read access.
    pub fn store(&self) -> &Arc<DuelStore> {
        &self.store
    }

    /// Stop both tasks and wait for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());

        if let Err(e) = self.processor_handle.await {
            warn!("Processor task ended abnormally: {}", e);
        }
        if let Err(e) = self.sweeper_handle.await {
            warn!("Sweeper task ended abnormally: {}", e);
        }
        info!("Duel engine stopped");
    }
}
