//! Reservation store traits.
//!
//! The stock ledger and the order record store share one transactional
//! boundary: ledger decrements and the order/item rows they pay for are
//! written in the same transaction, so either both commit or neither
//! does.

use std::collections::BTreeMap;

use async_trait::async_trait;
use common::OrderId;
use domain::{Order, ProductId};

use crate::error::Result;

/// Authoritative store for stock quantities and order records.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Transaction handle type.
    type Tx: ReservationTx;

    /// Opens a new reservation transaction.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Reads the available quantity for a product outside any
    /// transaction.
    ///
    /// For inspection and cache warming only; reservation decisions must
    /// always go through [`ReservationTx::lock_quantities`].
    async fn read_quantity(&self, product_id: &ProductId) -> Result<Option<u32>>;

    /// Compensating increment, used only when undoing a decrement that
    /// already committed. Fails if the product does not exist.
    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<()>;

    /// Loads a persisted order with its items, for reconciliation by
    /// order identity.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;
}

/// One reservation transaction.
///
/// Implementations must hold exclusive access to every product locked via
/// [`lock_quantities`](Self::lock_quantities) until the transaction
/// commits or rolls back.
#[async_trait]
pub trait ReservationTx: Send {
    /// Acquires exclusive row-level access to the given products in
    /// ascending product-id order and returns their current quantities.
    ///
    /// Products that do not exist are absent from the returned map. The
    /// fixed acquisition order prevents deadlock between concurrent
    /// transactions touching overlapping product sets.
    async fn lock_quantities(&mut self, product_ids: &[ProductId]) -> Result<BTreeMap<ProductId, u32>>;

    /// Persists one accepted order: decrements stock for its items and
    /// inserts the order and item rows, all inside a savepoint.
    ///
    /// On error the savepoint is rolled back and the transaction remains
    /// usable, so a failure here is scoped to this order only.
    async fn apply_order(&mut self, order: &Order) -> Result<()>;

    /// Commits every applied order and its decrements atomically.
    async fn commit(self) -> Result<()>;

    /// Discards all uncommitted work.
    async fn rollback(self) -> Result<()>;
}

/// Sums the stock decrement per product required by an order's items.
///
/// Shared by store implementations so the decrement applied can never
/// diverge from the item rows persisted.
pub fn decrements_for(order: &Order) -> BTreeMap<ProductId, u32> {
    let mut decrements: BTreeMap<ProductId, u32> = BTreeMap::new();
    for item in &order.items {
        *decrements.entry(item.product_id.clone()).or_insert(0) += item.quantity;
    }
    decrements
}
