use std::collections::HashMap;

use crate::native::NativeProduct;
use crate::queue::RequestId;

/// Most recently queried products, keyed by product identifier.
#[derive(Debug, Default)]
pub(crate) struct ProductCatalog {
    products: HashMap<String, NativeProduct>,
}

impl ProductCatalog {
    pub fn upsert(&mut self, product: NativeProduct) {
        self.products.insert(product.identifier.clone(), product);
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.products.contains_key(product_id)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }
}

#[derive(Debug)]
struct Pending<H> {
    id: RequestId,
    handle: Option<H>,
}

/// Outcome of [`PendingRequest::complete`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Completion<H> {
    /// The request was current; its platform handle, if it was stored.
    Current(Option<H>),
    /// The request was replaced or already completed.
    Stale,
}

/// The single in-flight product request, if any.
#[derive(Debug)]
pub(crate) struct PendingRequest<H> {
    next_id: RequestId,
    current: Option<Pending<H>>,
}

impl<H> Default for PendingRequest<H> {
    fn default() -> Self {
        Self {
            next_id: 1,
            current: None,
        }
    }
}

impl<H> PendingRequest<H> {
    /// Reserves an id for a new request and hands back the handle of the
    /// request it replaces.
    pub fn begin(&mut self) -> (RequestId, Option<H>) {
        let id = self.next_id;
        self.next_id += 1;
        let replaced = self
            .current
            .replace(Pending { id, handle: None })
            .and_then(|pending| pending.handle);
        (id, replaced)
    }

    /// Stores the platform handle for `id`. Returns the handle back if `id`
    /// is no longer the current request.
    pub fn started(&mut self, id: RequestId, handle: H) -> Option<H> {
        match self.current.as_mut() {
            Some(pending) if pending.id == id => {
                pending.handle = Some(handle);
                None
            }
            _ => Some(handle),
        }
    }

    /// Clears the current request if it is `id`, handing its handle back to
    /// the caller.
    pub fn complete(&mut self, id: RequestId) -> Completion<H> {
        match self.current.take() {
            Some(pending) if pending.id == id => Completion::Current(pending.handle),
            other => {
                self.current = other;
                Completion::Stale
            }
        }
    }

    #[cfg(test)]
    pub fn current(&self) -> Option<RequestId> {
        self.current.as_ref().map(|pending| pending.id)
    }
}

#[derive(Debug)]
struct CachedTransaction<T> {
    sequence: u64,
    handle: T,
}

/// Payment-queue transactions awaiting acknowledgement, keyed by transaction
/// identifier. With a non-zero capacity the oldest entry is evicted first.
#[derive(Debug)]
pub(crate) struct TransactionCache<T> {
    capacity: usize,
    sequence: u64,
    entries: HashMap<String, CachedTransaction<T>>,
}

impl<T> TransactionCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            sequence: 0,
            entries: HashMap::new(),
        }
    }

    /// Inserts or refreshes an entry, returning the id of an evicted entry.
    pub fn upsert(&mut self, transaction_id: String, handle: T) -> Option<String> {
        self.sequence += 1;
        self.entries.insert(
            transaction_id,
            CachedTransaction {
                sequence: self.sequence,
                handle,
            },
        );
        if self.capacity == 0 || self.entries.len() <= self.capacity {
            return None;
        }
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.sequence)
            .map(|(id, _)| id.clone())?;
        self.entries.remove(&oldest);
        Some(oldest)
    }

    pub fn remove(&mut self, transaction_id: &str) -> Option<T> {
        self.entries
            .remove(transaction_id)
            .map(|entry| entry.handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_request_replaces_previous() {
        let mut pending = PendingRequest::default();
        let (first, replaced) = pending.begin();
        assert!(replaced.is_none());
        assert!(pending.started(first, "first").is_none());

        let (second, replaced) = pending.begin();
        assert_eq!(replaced, Some("first"));
        assert_ne!(first, second);
        assert_eq!(pending.complete(first), Completion::Stale);
        assert_eq!(pending.current(), Some(second));
        assert!(pending.started(second, "second").is_none());
        assert_eq!(pending.complete(second), Completion::Current(Some("second")));
        assert_eq!(pending.current(), None);
        assert_eq!(pending.complete(second), Completion::Stale);
    }

    #[test]
    fn late_handle_for_replaced_request_is_returned() {
        let mut pending = PendingRequest::default();
        let (first, _) = pending.begin();
        let (_second, replaced) = pending.begin();
        assert!(replaced.is_none());
        assert_eq!(pending.started(first, 7), Some(7));
    }

    #[test]
    fn transaction_cache_evicts_oldest() {
        let mut cache = TransactionCache::new(2);
        assert!(cache.upsert("T1".to_string(), 1).is_none());
        assert!(cache.upsert("T2".to_string(), 2).is_none());
        // refreshing T1 makes T2 the oldest
        assert!(cache.upsert("T1".to_string(), 11).is_none());
        assert_eq!(cache.upsert("T3".to_string(), 3), Some("T2".to_string()));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.remove("T1"), Some(11));
        assert!(cache.remove("T2").is_none());
    }

    #[test]
    fn zero_capacity_is_unbounded() {
        let mut cache = TransactionCache::new(0);
        for i in 0..1000 {
            assert!(cache.upsert(format!("T{i}"), i).is_none());
        }
        assert_eq!(cache.len(), 1000);
        assert_eq!(cache.remove("T0"), Some(0));
    }
}
