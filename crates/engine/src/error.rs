//! Engine error types.

use domain::{OrderRequest, Rejection};
use thiserror::Error;

/// Failure to admit a request into the queue.
///
/// Both variants hand the request back so the caller can retry or reject
/// it upstream; the core never retries admission internally.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The admission queue is at capacity; the caller must back off.
    #[error("admission queue capacity exceeded")]
    CapacityExceeded(OrderRequest),

    /// The engine has shut down and accepts no further requests.
    #[error("engine is closed")]
    Closed(OrderRequest),
}

impl AdmissionError {
    /// Recovers the request that was not admitted.
    pub fn into_request(self) -> OrderRequest {
        match self {
            AdmissionError::CapacityExceeded(request) | AdmissionError::Closed(request) => request,
        }
    }
}

/// Per-order failure as seen by a caller collecting submission results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The request never entered the core: the queue was full.
    #[error("admission queue capacity exceeded")]
    CapacityExceeded,

    /// The request never entered the core: the engine is shut down.
    #[error("engine is closed")]
    Closed,

    /// The core rejected the order.
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// The completion channel closed before a result arrived. Outcome
    /// unknown; reconcile by order identity.
    #[error("completion channel closed before a result was delivered")]
    ResultChannelClosed,
}
