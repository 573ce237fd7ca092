//! Engine configuration.

use std::time::Duration;

/// Default maximum time the scheduler waits after the first request of a
/// batch before closing it.
///
/// Shorter = lower latency, longer = higher throughput per transaction.
pub const DEFAULT_MAX_WAIT_MS: u64 = 10;

/// Default maximum number of order items per batch.
pub const DEFAULT_MAX_BATCH_ITEMS: usize = 256;

/// Default capacity of the admission queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Micro-batching policy: a batch closes when it reaches
/// `max_batch_items` items or when `max_wait` has elapsed since its
/// first request joined, whichever occurs first.
///
/// This is a scheduling policy, not business logic; tuning it never
/// changes reservation semantics.
#[derive(Debug, Clone)]
pub struct BatchPolicy {
    /// Maximum order items collected into one batch.
    pub max_batch_items: usize,

    /// Maximum time the first request in a batch waits for company.
    pub max_wait: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            max_batch_items: DEFAULT_MAX_BATCH_ITEMS,
            max_wait: Duration::from_millis(DEFAULT_MAX_WAIT_MS),
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bounded capacity of the admission queue.
    pub queue_capacity: usize,

    /// Batch close policy.
    pub policy: BatchPolicy,

    /// Attempts to apply a single order within one batch cycle before
    /// surfacing a persistence failure for that order (1 retry).
    pub max_order_apply_attempts: u32,

    /// Attempts for the whole batch transaction before surfacing a
    /// persistence failure to every still-pending order (1 re-attempt
    /// after a commit failure).
    pub max_batch_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            policy: BatchPolicy::default(),
            max_order_apply_attempts: 2,
            max_batch_attempts: 2,
        }
    }
}
