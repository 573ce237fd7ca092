//! Non-authoritative read cache mirroring stock quantities.
//!
//! Refreshed only after a reservation transaction commits. Serves
//! read-mostly availability queries (e.g. catalog display); reservation
//! decisions never consult it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use domain::{ProductId, StockEntry};

/// Shared in-process mirror of committed stock quantities.
#[derive(Debug, Clone, Default)]
pub struct StockCache {
    inner: Arc<RwLock<HashMap<ProductId, u32>>>,
}

impl StockCache {
    /// Creates a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the cached quantity for the given products.
    pub fn refresh(&self, entries: impl IntoIterator<Item = (ProductId, u32)>) {
        let mut inner = self.inner.write().unwrap();
        for (product_id, quantity) in entries {
            inner.insert(product_id, quantity);
        }
    }

    /// Returns the cached quantity for a product, if known.
    ///
    /// May lag the authoritative ledger; eventually refreshed after
    /// commit.
    pub fn read(&self, product_id: &ProductId) -> Option<u32> {
        self.inner.read().unwrap().get(product_id).copied()
    }

    /// Returns a snapshot of all cached entries, sorted by product.
    pub fn snapshot(&self) -> Vec<StockEntry> {
        let inner = self.inner.read().unwrap();
        let mut entries: Vec<StockEntry> = inner
            .iter()
            .map(|(product_id, quantity)| StockEntry {
                product_id: product_id.clone(),
                quantity: *quantity,
            })
            .collect();
        entries.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_after_refresh() {
        let cache = StockCache::new();
        assert_eq!(cache.read(&ProductId::new("SKU-001")), None);

        cache.refresh(vec![(ProductId::new("SKU-001"), 7)]);
        assert_eq!(cache.read(&ProductId::new("SKU-001")), Some(7));

        cache.refresh(vec![(ProductId::new("SKU-001"), 3)]);
        assert_eq!(cache.read(&ProductId::new("SKU-001")), Some(3));
    }

    #[test]
    fn test_snapshot_sorted_by_product() {
        let cache = StockCache::new();
        cache.refresh(vec![
            (ProductId::new("SKU-002"), 2),
            (ProductId::new("SKU-001"), 1),
        ]);

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].product_id.as_str(), "SKU-001");
        assert_eq!(snapshot[1].product_id.as_str(), "SKU-002");
    }
}
