//! Micro-batch scheduler.
//!
//! Drains the admission queue into batches: a batch opens on the first
//! received request, then fills until it holds `max_batch_items` item
//! lines or `max_wait` has elapsed since it opened, whichever comes
//! first. Requests are never reordered on the way in; determinism of the
//! accept/reject partition is the planner's job, not the scheduler's.

use std::collections::HashMap;

use common::OrderId;
use domain::{CompletionSender, OrderRequest};
use store::ReservationStore;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::config::BatchPolicy;
use crate::dispatch::dispatch;
use crate::plan::PendingOrder;
use crate::reservation::ReservationManager;

/// Pulls requests off the admission queue and runs batch cycles until
/// the queue closes and drains.
pub struct BatchScheduler<S> {
    receiver: mpsc::Receiver<OrderRequest>,
    shutdown: Option<oneshot::Receiver<()>>,
    manager: ReservationManager<S>,
    policy: BatchPolicy,
}

impl<S: ReservationStore> BatchScheduler<S> {
    pub fn new(
        receiver: mpsc::Receiver<OrderRequest>,
        shutdown: oneshot::Receiver<()>,
        manager: ReservationManager<S>,
        policy: BatchPolicy,
    ) -> Self {
        Self {
            receiver,
            shutdown: Some(shutdown),
            manager,
            policy,
        }
    }

    /// Runs batch cycles until shutdown. On the shutdown signal the
    /// queue is closed to new submissions, but every request admitted
    /// before close is still processed and answered before this returns.
    pub async fn run(mut self) {
        loop {
            let first = if let Some(shutdown) = self.shutdown.as_mut() {
                tokio::select! {
                    request = self.receiver.recv() => match request {
                        Some(request) => request,
                        None => break,
                    },
                    _ = shutdown => {
                        self.receiver.close();
                        self.shutdown = None;
                        continue;
                    }
                }
            } else {
                match self.receiver.recv().await {
                    Some(request) => request,
                    None => break,
                }
            };

            let batch = self.fill(first).await;
            self.cycle(batch).await;
        }
        tracing::debug!("admission queue closed and drained, scheduler stopping");
    }

    /// Collects one batch, starting from its first request.
    async fn fill(&mut self, first: OrderRequest) -> Vec<OrderRequest> {
        let deadline = Instant::now() + self.policy.max_wait;
        let mut batch = vec![first];
        let mut items: usize = batch[0].items.len();

        while items < self.policy.max_batch_items {
            match tokio::time::timeout_at(deadline, self.receiver.recv()).await {
                Ok(Some(request)) => {
                    items += request.items.len();
                    batch.push(request);
                }
                // Queue closed: process what we have, run() stops next.
                Ok(None) => break,
                // Deadline reached.
                Err(_) => break,
            }
        }

        batch
    }

    /// One full cycle: plan and persist the batch, then answer every
    /// order exactly once.
    async fn cycle(&self, batch: Vec<OrderRequest>) {
        let mut pendings = Vec::with_capacity(batch.len());
        let mut completions: HashMap<OrderId, CompletionSender> =
            HashMap::with_capacity(batch.len());
        for request in batch {
            let (pending, completion) = PendingOrder::split(request);
            completions.insert(pending.id, completion);
            pendings.push(pending);
        }

        let outcomes = self.manager.process(pendings).await;
        dispatch(outcomes, completions);
    }
}
