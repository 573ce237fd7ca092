//! Domain types for the batched order reservation system.
//!
//! Defines the order request/record types, stock entries, money and
//! identifier value objects, and the per-order rejection taxonomy.

pub mod error;
pub mod order;
pub mod request;
pub mod value_objects;

pub use error::{Rejection, RequestError};
pub use order::{Order, OrderItem, OrderStatus, StockEntry};
pub use request::{
    CompletionReceiver, CompletionSender, ItemDraft, OrderItemRequest, OrderRequest, SubmitOutcome,
};
pub use value_objects::{Money, OrderItemId, ProductId, UserId};

pub use common::OrderId;
