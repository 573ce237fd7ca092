//! Order requests and their completion channels.
//!
//! A caller builds an [`OrderRequest`], keeps the receiving half of the
//! completion channel, and hands the request to the admission queue. The
//! core fulfills the channel exactly once with a [`SubmitOutcome`]; the
//! oneshot sender is consumed on send, so double delivery is
//! unrepresentable.

use common::OrderId;
use tokio::sync::oneshot;

use crate::error::{Rejection, RequestError};
use crate::order::Order;
use crate::value_objects::{Money, OrderItemId, ProductId, UserId};

/// Terminal outcome of a submitted order request.
pub type SubmitOutcome = Result<Order, Rejection>;

/// Write half of a completion channel, owned by the core after admission.
pub type CompletionSender = oneshot::Sender<SubmitOutcome>;

/// Read half of a completion channel, kept by the caller.
pub type CompletionReceiver = oneshot::Receiver<SubmitOutcome>;

/// A single item line within an order request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItemRequest {
    /// Item identity; the deterministic tie-break key inside a batch.
    pub id: OrderItemId,
    /// Owning order identity.
    pub order_id: OrderId,
    /// Product being ordered.
    pub product_id: ProductId,
    /// Unit price quoted to the customer; snapshotted into the order.
    pub unit_price: Money,
    /// Requested quantity, always positive.
    pub quantity: u32,
}

/// Item data supplied by the caller before identities are assigned.
#[derive(Debug, Clone)]
pub struct ItemDraft {
    pub product_id: ProductId,
    pub unit_price: Money,
    pub quantity: u32,
}

impl ItemDraft {
    /// Creates a new item draft.
    pub fn new(product_id: impl Into<ProductId>, unit_price: Money, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            unit_price,
            quantity,
        }
    }
}

/// An order submission, owned by the caller until handed to the
/// admission queue.
#[derive(Debug)]
pub struct OrderRequest {
    /// Order identity.
    pub id: OrderId,
    /// User placing the order.
    pub user_id: UserId,
    /// Ordered item lines.
    pub items: Vec<OrderItemRequest>,
    /// Write half of the completion channel.
    pub completion: CompletionSender,
    /// Optional trace-correlation token propagated to the processed order.
    pub trace_token: Option<String>,
}

impl OrderRequest {
    /// Builds a validated request and returns it together with the read
    /// half of its completion channel.
    pub fn new(
        user_id: UserId,
        drafts: Vec<ItemDraft>,
    ) -> Result<(Self, CompletionReceiver), RequestError> {
        if drafts.is_empty() {
            return Err(RequestError::NoItems);
        }

        let order_id = OrderId::new();
        let mut items = Vec::with_capacity(drafts.len());
        for draft in drafts {
            if draft.quantity == 0 {
                return Err(RequestError::InvalidQuantity {
                    product_id: draft.product_id,
                    quantity: draft.quantity,
                });
            }
            items.push(OrderItemRequest {
                id: OrderItemId::new(),
                order_id,
                product_id: draft.product_id,
                unit_price: draft.unit_price,
                quantity: draft.quantity,
            });
        }

        Ok(Self::from_parts(order_id, user_id, items))
    }

    /// Assembles a request from pre-built parts.
    ///
    /// Used by tests that need explicit item identities; `new` is the
    /// validated path for callers.
    pub fn from_parts(
        id: OrderId,
        user_id: UserId,
        items: Vec<OrderItemRequest>,
    ) -> (Self, CompletionReceiver) {
        let (completion, receiver) = oneshot::channel();
        (
            Self {
                id,
                user_id,
                items,
                completion,
                trace_token: None,
            },
            receiver,
        )
    }

    /// Attaches a trace-correlation token.
    pub fn with_trace_token(mut self, token: impl Into<String>) -> Self {
        self.trace_token = Some(token.into());
        self
    }

    /// Total quantity requested for a given product across all items.
    pub fn quantity_for(&self, product_id: &ProductId) -> u32 {
        self.items
            .iter()
            .filter(|item| &item.product_id == product_id)
            .map(|item| item.quantity)
            .sum()
    }
}
