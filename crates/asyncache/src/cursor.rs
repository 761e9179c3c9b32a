//! Read-only views over the recency order.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::lru::{Handle, LruStore};

/// Read-only view of a cached entry, or the past-the-end position.
///
/// A cursor is a generational handle into the cache's storage: eviction,
/// invalidation and [`Cache::flush`](crate::Cache::flush) all invalidate
/// it, after which [`value`](Cursor::value) and [`key`](Cursor::key) return
/// `None`. It never owns the entry and never keeps one alive.
///
/// Cursors walk the cache from most- to least-recently used via
/// [`advance`](Cursor::advance), terminating at the end position.
pub struct Cursor<K, V> {
    store: Rc<RefCell<LruStore<K, V>>>,
    handle: Handle,
}

impl<K, V> Cursor<K, V> {
    pub(crate) fn new(store: Rc<RefCell<LruStore<K, V>>>, handle: Handle) -> Self {
        Cursor { store, handle }
    }

    /// Read-only guard for the entry's value.
    ///
    /// `None` at the end position or when the entry has since been removed.
    /// The guard borrows the cache's storage; drop it before the next cache
    /// operation.
    pub fn value(&self) -> Option<Ref<'_, V>> {
        Ref::filter_map(self.store.borrow(), |store| store.value(self.handle)).ok()
    }

    /// Read-only guard for the entry's key.
    ///
    /// `None` at the end position or when the entry has since been removed.
    /// The guard borrows the cache's storage; drop it before the next cache
    /// operation.
    pub fn key(&self) -> Option<Ref<'_, K>> {
        Ref::filter_map(self.store.borrow(), |store| store.key(self.handle)).ok()
    }

    /// Step toward the least-recently-used end.
    ///
    /// Advancing from the last entry, from the end position or from a
    /// removed entry lands on the end position.
    pub fn advance(&mut self) {
        let next = self.store.borrow().older(self.handle);
        self.handle = next;
    }

    /// Whether this cursor sits at the past-the-end position.
    pub fn is_end(&self) -> bool {
        self.handle == Handle::sentinel()
    }
}

impl<K, V> Clone for Cursor<K, V> {
    fn clone(&self) -> Self {
        Cursor {
            store: Rc::clone(&self.store),
            handle: self.handle,
        }
    }
}

impl<K, V> PartialEq for Cursor<K, V> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.store, &other.store) && self.handle == other.handle
    }
}

impl<K, V> Eq for Cursor<K, V> {}

impl<K, V> fmt::Debug for Cursor<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("end", &self.is_end())
            .finish()
    }
}
