//! Batched order admission and inventory reservation engine.
//!
//! Requests enter through a bounded admission queue, a scheduler drains
//! them into micro-batches, and each batch is reserved and persisted in
//! a single storage transaction with a deterministic accept/reject
//! partition. Every admitted request receives exactly one outcome on
//! its completion channel.

pub mod admission;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod plan;
pub mod reservation;
pub mod scheduler;
pub mod submit;

pub use admission::EngineHandle;
pub use config::{
    BatchPolicy, DEFAULT_MAX_BATCH_ITEMS, DEFAULT_MAX_WAIT_MS, DEFAULT_QUEUE_CAPACITY,
    EngineConfig,
};
pub use error::{AdmissionError, SubmitError};
pub use plan::{PendingOrder, Plan, plan};
pub use reservation::ReservationManager;
pub use submit::submit_and_collect;

use store::{ReservationStore, StockCache};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::scheduler::BatchScheduler;

/// A running engine: the admission handle plus the scheduler task.
pub struct Engine {
    handle: EngineHandle,
    shutdown: oneshot::Sender<()>,
    scheduler: JoinHandle<()>,
}

impl Engine {
    /// Starts the engine over the given store.
    pub fn start<S>(store: S, cache: StockCache, config: EngineConfig) -> Self
    where
        S: ReservationStore + 'static,
    {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown, shutdown_rx) = oneshot::channel();
        let manager = ReservationManager::new(store, cache, &config);
        let scheduler = BatchScheduler::new(receiver, shutdown_rx, manager, config.policy);

        Self {
            handle: EngineHandle::new(sender),
            shutdown,
            scheduler: tokio::spawn(scheduler.run()),
        }
    }

    /// Returns a cloneable submission handle.
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Closes admission and waits for already-admitted requests to be
    /// processed and answered. Handles still held by callers start
    /// failing with [`AdmissionError::Closed`].
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(err) = self.scheduler.await {
            tracing::error!(error = %err, "scheduler task panicked during shutdown");
        }
    }
}
