//! Admission into the bounded request queue.

use domain::OrderRequest;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::AdmissionError;

/// Cloneable handle for submitting order requests to the engine.
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<OrderRequest>,
}

impl EngineHandle {
    pub(crate) fn new(sender: mpsc::Sender<OrderRequest>) -> Self {
        Self { sender }
    }

    /// Admits a request into the queue without blocking.
    ///
    /// A full queue is immediate backpressure: the request comes back in
    /// the error and no completion will ever fire for it.
    pub fn submit(&self, request: OrderRequest) -> Result<(), AdmissionError> {
        match self.sender.try_send(request) {
            Ok(()) => {
                metrics::counter!("orders_admitted_total").increment(1);
                Ok(())
            }
            Err(TrySendError::Full(request)) => {
                metrics::counter!("admission_rejected_total", "reason" => "capacity").increment(1);
                Err(AdmissionError::CapacityExceeded(request))
            }
            Err(TrySendError::Closed(request)) => {
                metrics::counter!("admission_rejected_total", "reason" => "closed").increment(1);
                Err(AdmissionError::Closed(request))
            }
        }
    }
}
