//! In-memory reservation store for testing.
//!
//! Keeps a committed state behind a mutex and a staged overlay per
//! transaction, so transactional semantics (isolation, rollback on drop,
//! per-order savepoints) match the PostgreSQL implementation. Failure
//! injection knobs simulate infrastructure errors for the retry paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use common::OrderId;
use domain::{Order, ProductId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{Result, StoreError};
use crate::store::{ReservationStore, ReservationTx, decrements_for};

#[derive(Default)]
struct Shared {
    stock: HashMap<ProductId, u32>,
    orders: HashMap<OrderId, Order>,
}

/// In-memory reservation store.
///
/// A transaction holds the store-wide lock until commit or rollback,
/// which serializes transactions the way row locks do for conflicting
/// batches.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Mutex<Shared>>,
    fail_applies: Arc<AtomicU32>,
    fail_commits: Arc<AtomicU32>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets or replaces the available quantity for a product.
    pub async fn upsert_stock(&self, product_id: impl Into<ProductId>, quantity: u32) {
        let mut shared = self.shared.lock().await;
        shared.stock.insert(product_id.into(), quantity);
    }

    /// Returns the number of persisted orders.
    pub async fn order_count(&self) -> usize {
        self.shared.lock().await.orders.len()
    }

    /// Makes the next `n` calls to `apply_order` fail.
    pub fn fail_next_applies(&self, n: u32) {
        self.fail_applies.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` calls to `commit` fail.
    pub fn fail_next_commits(&self, n: u32) {
        self.fail_commits.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReservationStore for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx> {
        let guard = self.shared.clone().lock_owned().await;
        Ok(InMemoryTx {
            guard,
            staged_stock: HashMap::new(),
            staged_orders: Vec::new(),
            fail_applies: self.fail_applies.clone(),
            fail_commits: self.fail_commits.clone(),
        })
    }

    async fn read_quantity(&self, product_id: &ProductId) -> Result<Option<u32>> {
        let shared = self.shared.lock().await;
        Ok(shared.stock.get(product_id).copied())
    }

    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let mut shared = self.shared.lock().await;
        match shared.stock.get_mut(product_id) {
            Some(current) => {
                *current += quantity;
                Ok(())
            }
            None => Err(StoreError::StockConflict {
                product_id: product_id.clone(),
            }),
        }
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let shared = self.shared.lock().await;
        Ok(shared.orders.get(&order_id).cloned())
    }
}

/// In-memory transaction: staged changes over the locked committed state.
pub struct InMemoryTx {
    guard: OwnedMutexGuard<Shared>,
    /// New quantities staged by applied orders, keyed by product.
    staged_stock: HashMap<ProductId, u32>,
    staged_orders: Vec<Order>,
    fail_applies: Arc<AtomicU32>,
    fail_commits: Arc<AtomicU32>,
}

impl InMemoryTx {
    fn current_quantity(&self, product_id: &ProductId) -> Option<u32> {
        self.staged_stock
            .get(product_id)
            .copied()
            .or_else(|| self.guard.stock.get(product_id).copied())
    }

    fn take_injected(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ReservationTx for InMemoryTx {
    async fn lock_quantities(&mut self, product_ids: &[ProductId]) -> Result<BTreeMap<ProductId, u32>> {
        // The whole store is locked by the guard, so this only reads.
        let mut quantities = BTreeMap::new();
        for product_id in product_ids {
            if let Some(quantity) = self.current_quantity(product_id) {
                quantities.insert(product_id.clone(), quantity);
            }
        }
        Ok(quantities)
    }

    async fn apply_order(&mut self, order: &Order) -> Result<()> {
        if Self::take_injected(&self.fail_applies) {
            return Err(StoreError::Unavailable("injected apply failure".into()));
        }

        // Savepoint semantics: stage into a scratch copy, merge only if
        // every decrement succeeds.
        let mut scratch = self.staged_stock.clone();
        for (product_id, quantity) in decrements_for(order) {
            let current = scratch
                .get(&product_id)
                .copied()
                .or_else(|| self.guard.stock.get(&product_id).copied())
                .ok_or_else(|| StoreError::StockConflict {
                    product_id: product_id.clone(),
                })?;
            let remaining = current
                .checked_sub(quantity)
                .ok_or_else(|| StoreError::StockConflict {
                    product_id: product_id.clone(),
                })?;
            scratch.insert(product_id, remaining);
        }

        self.staged_stock = scratch;
        self.staged_orders.push(order.clone());
        Ok(())
    }

    async fn commit(mut self) -> Result<()> {
        if Self::take_injected(&self.fail_commits) {
            // Guard drops here: staged work is discarded, as a failed
            // database commit would discard the transaction.
            return Err(StoreError::Unavailable("injected commit failure".into()));
        }

        for (product_id, quantity) in self.staged_stock.drain() {
            self.guard.stock.insert(product_id, quantity);
        }
        for order in self.staged_orders.drain(..) {
            self.guard.orders.insert(order.id, order);
        }
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::{ItemDraft, Money, OrderRequest, UserId};

    fn order_for(items: Vec<ItemDraft>) -> Order {
        let (request, _rx) = OrderRequest::new(UserId::new(), items).unwrap();
        Order::create(request.id, request.user_id, &request.items, None, Utc::now())
    }

    #[tokio::test]
    async fn test_apply_and_commit_decrements_stock() {
        let store = InMemoryStore::new();
        store.upsert_stock("SKU-001", 10).await;

        let order = order_for(vec![ItemDraft::new("SKU-001", Money::from_cents(1000), 4)]);

        let mut tx = store.begin().await.unwrap();
        let locked = tx
            .lock_quantities(&[ProductId::new("SKU-001")])
            .await
            .unwrap();
        assert_eq!(locked.get(&ProductId::new("SKU-001")), Some(&10));

        tx.apply_order(&order).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            store
                .read_quantity(&ProductId::new("SKU-001"))
                .await
                .unwrap(),
            Some(6)
        );
        assert_eq!(store.order_count().await, 1);
        assert!(store.get_order(order.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_work() {
        let store = InMemoryStore::new();
        store.upsert_stock("SKU-001", 10).await;

        let order = order_for(vec![ItemDraft::new("SKU-001", Money::from_cents(1000), 4)]);

        let mut tx = store.begin().await.unwrap();
        tx.apply_order(&order).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(
            store
                .read_quantity(&ProductId::new("SKU-001"))
                .await
                .unwrap(),
            Some(10)
        );
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_apply_rejects_overdraw_without_partial_staging() {
        let store = InMemoryStore::new();
        store.upsert_stock("SKU-001", 10).await;
        store.upsert_stock("SKU-002", 1).await;

        // SKU-001 would fit, SKU-002 would not; neither may be staged.
        let order = order_for(vec![
            ItemDraft::new("SKU-001", Money::from_cents(1000), 4),
            ItemDraft::new("SKU-002", Money::from_cents(500), 2),
        ]);

        let mut tx = store.begin().await.unwrap();
        let err = tx.apply_order(&order).await.unwrap_err();
        assert!(matches!(err, StoreError::StockConflict { .. }));

        // Transaction stays usable after the failed apply.
        let other = order_for(vec![ItemDraft::new("SKU-001", Money::from_cents(1000), 1)]);
        tx.apply_order(&other).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            store
                .read_quantity(&ProductId::new("SKU-001"))
                .await
                .unwrap(),
            Some(9)
        );
        assert_eq!(
            store
                .read_quantity(&ProductId::new("SKU-002"))
                .await
                .unwrap(),
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_missing_product_is_absent_from_lock() {
        let store = InMemoryStore::new();
        store.upsert_stock("SKU-001", 5).await;

        let mut tx = store.begin().await.unwrap();
        let locked = tx
            .lock_quantities(&[ProductId::new("SKU-001"), ProductId::new("SKU-404")])
            .await
            .unwrap();

        assert_eq!(locked.len(), 1);
        assert!(!locked.contains_key(&ProductId::new("SKU-404")));
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_apply_failure_is_consumed() {
        let store = InMemoryStore::new();
        store.upsert_stock("SKU-001", 10).await;
        store.fail_next_applies(1);

        let order = order_for(vec![ItemDraft::new("SKU-001", Money::from_cents(1000), 1)]);

        let mut tx = store.begin().await.unwrap();
        let err = tx.apply_order(&order).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        // Second attempt succeeds: the knob armed a single failure.
        tx.apply_order(&order).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(
            store
                .read_quantity(&ProductId::new("SKU-001"))
                .await
                .unwrap(),
            Some(9)
        );
    }

    #[tokio::test]
    async fn test_injected_commit_failure_discards_transaction() {
        let store = InMemoryStore::new();
        store.upsert_stock("SKU-001", 10).await;
        store.fail_next_commits(1);

        let order = order_for(vec![ItemDraft::new("SKU-001", Money::from_cents(1000), 4)]);

        let mut tx = store.begin().await.unwrap();
        tx.apply_order(&order).await.unwrap();
        let err = tx.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        assert_eq!(
            store
                .read_quantity(&ProductId::new("SKU-001"))
                .await
                .unwrap(),
            Some(10)
        );
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_release_restores_quantity() {
        let store = InMemoryStore::new();
        store.upsert_stock("SKU-001", 3).await;

        store.release(&ProductId::new("SKU-001"), 2).await.unwrap();
        assert_eq!(
            store
                .read_quantity(&ProductId::new("SKU-001"))
                .await
                .unwrap(),
            Some(5)
        );

        let err = store
            .release(&ProductId::new("SKU-404"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StockConflict { .. }));
    }
}
