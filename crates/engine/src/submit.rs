//! Batch submit-and-collect convenience.

use std::collections::HashMap;

use common::OrderId;
use domain::{CompletionReceiver, Order, OrderRequest};
use futures_util::future::join_all;

use crate::admission::EngineHandle;
use crate::error::{AdmissionError, SubmitError};

/// Submits a set of requests and awaits every outcome.
///
/// Requests that fail admission get an explicit per-order error entry;
/// the rest are awaited concurrently on their completion channels. The
/// result maps every input order id to exactly one outcome.
pub async fn submit_and_collect(
    handle: &EngineHandle,
    requests: Vec<(OrderRequest, CompletionReceiver)>,
) -> HashMap<OrderId, Result<Order, SubmitError>> {
    let mut results = HashMap::with_capacity(requests.len());
    let mut awaiting = Vec::new();

    for (request, receiver) in requests {
        let order_id = request.id;
        match handle.submit(request) {
            Ok(()) => awaiting.push(async move { (order_id, receiver.await) }),
            Err(AdmissionError::CapacityExceeded(_)) => {
                results.insert(order_id, Err(SubmitError::CapacityExceeded));
            }
            Err(AdmissionError::Closed(_)) => {
                results.insert(order_id, Err(SubmitError::Closed));
            }
        }
    }

    for (order_id, received) in join_all(awaiting).await {
        let outcome = match received {
            Ok(Ok(order)) => Ok(order),
            Ok(Err(rejection)) => Err(SubmitError::Rejected(rejection)),
            Err(_) => Err(SubmitError::ResultChannelClosed),
        };
        results.insert(order_id, outcome);
    }

    results
}
