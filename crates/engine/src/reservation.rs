//! Reservation transaction manager.
//!
//! Processes one batch per storage transaction: locks every touched
//! product in ascending order, plans the accept/reject partition
//! deterministically, applies each accepted order inside its own
//! savepoint, and commits. Infrastructure failures are retried at the
//! narrowest scope first (single order, then the whole batch) before
//! they surface as rejections.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use common::OrderId;
use domain::{Order, ProductId, Rejection, SubmitOutcome};
use store::{ReservationStore, ReservationTx, StockCache, StoreError, decrements_for};

use crate::config::EngineConfig;
use crate::plan::{PendingOrder, plan};

/// Runs reservation transactions for batches of orders.
pub struct ReservationManager<S> {
    store: S,
    cache: StockCache,
    max_order_apply_attempts: u32,
    max_batch_attempts: u32,
}

impl<S: ReservationStore> ReservationManager<S> {
    /// Creates a new manager over the given store and cache mirror.
    pub fn new(store: S, cache: StockCache, config: &EngineConfig) -> Self {
        Self {
            store,
            cache,
            max_order_apply_attempts: config.max_order_apply_attempts.max(1),
            max_batch_attempts: config.max_batch_attempts.max(1),
        }
    }

    /// Processes one batch and returns exactly one outcome per order.
    ///
    /// Exactly one transaction attempt is made per batch cycle; a failed
    /// commit reverts every tentatively reserved order to pending and the
    /// batch is re-attempted within the bounded attempt budget. Business
    /// rejections are final and never retried.
    #[tracing::instrument(skip(self, batch), fields(orders = batch.len()))]
    pub async fn process(&self, batch: Vec<PendingOrder>) -> Vec<(OrderId, SubmitOutcome)> {
        if batch.is_empty() {
            return Vec::new();
        }

        metrics::counter!("batches_total").increment(1);
        metrics::histogram!("batch_size").record(batch.len() as f64);
        let started = std::time::Instant::now();

        let mut attempt = 0;
        let outcomes = loop {
            attempt += 1;
            match self.attempt(&batch).await {
                Ok(outcomes) => break outcomes,
                Err(err) if attempt < self.max_batch_attempts => {
                    tracing::warn!(error = %err, attempt, "batch aborted, re-attempting");
                }
                Err(err) => {
                    tracing::error!(error = %err, attempt, "batch failed, rejecting all orders");
                    break batch
                        .iter()
                        .map(|order| {
                            (
                                order.id,
                                Err(Rejection::Persistence {
                                    reason: err.to_string(),
                                }),
                            )
                        })
                        .collect();
                }
            }
        };

        let accepted = outcomes.iter().filter(|(_, o)| o.is_ok()).count();
        metrics::counter!("orders_accepted_total").increment(accepted as u64);
        metrics::counter!("orders_rejected_total").increment((outcomes.len() - accepted) as u64);
        metrics::histogram!("batch_duration_seconds").record(started.elapsed().as_secs_f64());

        outcomes
    }

    /// One transaction attempt over the whole batch.
    async fn attempt(
        &self,
        batch: &[PendingOrder],
    ) -> Result<Vec<(OrderId, SubmitOutcome)>, StoreError> {
        let mut tx = self.store.begin().await?;

        let product_ids: Vec<ProductId> = batch
            .iter()
            .flat_map(|order| order.items.iter().map(|item| item.product_id.clone()))
            .collect();
        let available = tx.lock_quantities(&product_ids).await?;

        let plan = plan(batch, &available);
        let mut remaining = plan.remaining;

        let by_id: HashMap<OrderId, &PendingOrder> =
            batch.iter().map(|order| (order.id, order)).collect();
        let now = Utc::now();

        let mut outcomes: Vec<(OrderId, SubmitOutcome)> = Vec::with_capacity(batch.len());
        for (order_id, decision) in plan.decisions {
            match decision {
                Err(rejection) => outcomes.push((order_id, Err(rejection))),
                Ok(()) => {
                    // The id comes from the plan over this same batch.
                    let pending = by_id[&order_id];
                    let order = Order::create(
                        pending.id,
                        pending.user_id,
                        &pending.items,
                        pending.trace_token.clone(),
                        now,
                    );

                    match self.apply_with_retry(&mut tx, &order).await {
                        Ok(()) => outcomes.push((order_id, Ok(order))),
                        Err(err) => {
                            tracing::warn!(
                                %order_id,
                                error = %err,
                                "order apply failed, surfacing persistence rejection"
                            );
                            // The savepoint rollback returned this
                            // order's units to the ledger; mirror that in
                            // the post-commit quantities.
                            credit_back(&mut remaining, &order);
                            outcomes.push((
                                order_id,
                                Err(Rejection::Persistence {
                                    reason: err.to_string(),
                                }),
                            ));
                        }
                    }
                }
            }
        }

        tx.commit().await?;

        // Best-effort mirror refresh, only after commit.
        self.cache.refresh(remaining);

        Ok(outcomes)
    }

    /// Applies one order, retrying within the configured per-order budget.
    async fn apply_with_retry<T: ReservationTx>(
        &self,
        tx: &mut T,
        order: &Order,
    ) -> Result<(), StoreError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match tx.apply_order(order).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt < self.max_order_apply_attempts => {
                    tracing::warn!(order_id = %order.id, error = %err, attempt, "order apply failed, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn credit_back(remaining: &mut BTreeMap<ProductId, u32>, order: &Order) {
    for (product_id, quantity) in decrements_for(order) {
        if let Some(current) = remaining.get_mut(&product_id) {
            *current += quantity;
        }
    }
}
