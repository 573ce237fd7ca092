//! Deterministic reservation planning.
//!
//! Planning is a pure function over the quantities read under row locks:
//! given the same batch and the same available quantities it always
//! produces the same accept/reject partition. All storage writes happen
//! afterwards, against an already-decided plan.

use std::collections::{BTreeMap, HashMap};

use common::OrderId;
use domain::{
    CompletionSender, OrderItemRequest, OrderRequest, ProductId, Rejection, UserId,
};

/// An admitted order stripped of its completion channel.
#[derive(Debug, Clone)]
pub struct PendingOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItemRequest>,
    pub trace_token: Option<String>,
}

impl PendingOrder {
    /// Splits an admitted request into its order data and the write half
    /// of its completion channel.
    pub fn split(request: OrderRequest) -> (Self, CompletionSender) {
        (
            Self {
                id: request.id,
                user_id: request.user_id,
                items: request.items,
                trace_token: request.trace_token,
            },
            request.completion,
        )
    }

    /// Total number of item lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

/// Outcome of planning one batch.
#[derive(Debug)]
pub struct Plan {
    /// Accept/reject decision per order, in batch order.
    pub decisions: Vec<(OrderId, Result<(), Rejection>)>,

    /// Working quantities after all accepted reservations.
    pub remaining: BTreeMap<ProductId, u32>,
}

/// Partitions a batch into accepted and rejected orders against the
/// locked quantities.
///
/// Items across the whole batch are reserved in ascending item-identity
/// order, so contention on the same product always resolves the same
/// way. An item that cannot be satisfied rejects its whole owning order;
/// the order's earlier tentative reservations are returned to the pool
/// before later items are evaluated, and its remaining items are
/// skipped. Sibling orders are unaffected.
pub fn plan(batch: &[PendingOrder], available: &BTreeMap<ProductId, u32>) -> Plan {
    let mut working = available.clone();
    let mut rejections: HashMap<OrderId, Rejection> = HashMap::new();
    let mut reserved: HashMap<OrderId, Vec<(ProductId, u32)>> = HashMap::new();

    let mut items: Vec<&OrderItemRequest> =
        batch.iter().flat_map(|order| order.items.iter()).collect();
    items.sort_by_key(|item| item.id);

    for item in items {
        if rejections.contains_key(&item.order_id) {
            continue;
        }

        let rejection = match working.get_mut(&item.product_id) {
            None => Some(Rejection::ProductNotFound {
                product_id: item.product_id.clone(),
            }),
            Some(quantity) if *quantity >= item.quantity => {
                *quantity -= item.quantity;
                reserved
                    .entry(item.order_id)
                    .or_default()
                    .push((item.product_id.clone(), item.quantity));
                None
            }
            Some(quantity) => Some(Rejection::OutOfStock {
                product_id: item.product_id.clone(),
                requested: item.quantity,
                available: *quantity,
            }),
        };

        if let Some(rejection) = rejection {
            // All-or-nothing per order: give back what this order had
            // tentatively reserved so later items can use it.
            for (product_id, quantity) in reserved.remove(&item.order_id).unwrap_or_default() {
                if let Some(current) = working.get_mut(&product_id) {
                    *current += quantity;
                }
            }
            rejections.insert(item.order_id, rejection);
        }
    }

    let decisions = batch
        .iter()
        .map(|order| {
            let decision = match rejections.remove(&order.id) {
                Some(rejection) => Err(rejection),
                None => Ok(()),
            };
            (order.id, decision)
        })
        .collect();

    Plan {
        decisions,
        remaining: working,
    }
}
