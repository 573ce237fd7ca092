//! Domain error types.

use thiserror::Error;

use crate::value_objects::ProductId;

/// Terminal per-order rejection delivered on the completion channel.
///
/// Business-rule rejections (`OutOfStock`, `ProductNotFound`) are final and
/// never retried by the core. `Persistence` is surfaced only after the
/// bounded infrastructure retries inside the batch cycle are exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// At least one item requested more than the available quantity.
    #[error("out of stock for product {product_id}: requested {requested}, available {available}")]
    OutOfStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The referenced product does not exist in the stock ledger.
    #[error("product not found: {product_id}")]
    ProductNotFound { product_id: ProductId },

    /// Storage failure unrelated to any business rule.
    #[error("persistence failure: {reason}")]
    Persistence { reason: String },
}

/// Errors raised while constructing an order request, before admission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Item quantity must be a positive integer.
    #[error("invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// An order must contain at least one item.
    #[error("order has no items")]
    NoItems,
}
