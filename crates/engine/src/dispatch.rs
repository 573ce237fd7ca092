//! Exactly-once result dispatch.
//!
//! Each order's outcome is delivered through its oneshot completion
//! sender; sending consumes the sender, so a second delivery for the
//! same order cannot be expressed. A caller that dropped its receiver
//! only loses its own notification.

use std::collections::HashMap;

use common::OrderId;
use domain::{CompletionSender, Rejection, SubmitOutcome};

/// Delivers one outcome per order to its completion channel.
///
/// Any completion left without an outcome receives a persistence
/// rejection rather than a silently dropped channel.
pub fn dispatch(
    outcomes: Vec<(OrderId, SubmitOutcome)>,
    mut completions: HashMap<OrderId, CompletionSender>,
) {
    for (order_id, outcome) in outcomes {
        match completions.remove(&order_id) {
            Some(completion) => {
                if completion.send(outcome).is_err() {
                    tracing::warn!(%order_id, "caller dropped completion receiver");
                }
            }
            None => {
                tracing::error!(%order_id, "no completion channel for processed order");
            }
        }
    }

    for (order_id, completion) in completions {
        tracing::error!(%order_id, "order left without an outcome");
        let _ = completion.send(Err(Rejection::Persistence {
            reason: "order was not processed".to_string(),
        }));
    }
}
