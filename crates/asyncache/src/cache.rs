//! Cache engine: hit/miss state machine, pending-request coalescing and
//! single-use reply tokens.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use ahash::RandomState;

use crate::cursor::Cursor;
use crate::lru::{Handle, LruStore};
use crate::stats::CacheStats;

/// Result delivered to [`Cache::get`] callbacks: a cursor at the resolved
/// entry, or the resolver's error.
pub type GetResult<K, V, E> = Result<Cursor<K, V>, E>;

type Callback<K, V, E> = Box<dyn FnOnce(GetResult<K, V, E>)>;
type PendingTable<K, V, E> = HashMap<K, Vec<Callback<K, V, E>>, RandomState>;

const DEFAULT_LOAD_FACTOR: f32 = 0.75;

/// Bounded LRU cache with asynchronous miss resolution.
///
/// A `Cache` is a cheap clonable handle over shared single-threaded state;
/// clones observe the same entries. Lookups that hit promote the entry and
/// run the callback synchronously. Lookups that miss are delegated to the
/// resolver supplied at construction; concurrent misses for one key are
/// coalesced behind a single resolver invocation and all their callbacks
/// receive the same result, in registration order.
///
/// No internal borrow is held while the resolver or a callback runs, so
/// both may call back into the cache, and a resolver may fulfill its
/// [`Reply`] synchronously inside [`get`](Cache::get).
pub struct Cache<K, V, E> {
    store: Rc<RefCell<LruStore<K, V>>>,
    pending: Rc<RefCell<PendingTable<K, V, E>>>,
    resolver: Rc<dyn Fn(&K, Reply<K, V, E>)>,
}

impl<K, V, E> Clone for Cache<K, V, E> {
    fn clone(&self) -> Self {
        Cache {
            store: Rc::clone(&self.store),
            pending: Rc::clone(&self.pending),
            resolver: Rc::clone(&self.resolver),
        }
    }
}

impl<K, V, E> Cache<K, V, E>
where
    K: Hash + Eq + Clone,
    E: Clone,
{
    /// Create a cache holding at most `capacity` entries.
    ///
    /// The resolver is invoked on every fresh miss with the key and a
    /// single-use [`Reply`]; it must eventually fulfill the reply exactly
    /// once, synchronously or from a later event-loop turn.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new<R>(capacity: usize, resolver: R) -> Self
    where
        R: Fn(&K, Reply<K, V, E>) + 'static,
    {
        Self::with_load_factor(capacity, DEFAULT_LOAD_FACTOR, resolver)
    }

    /// Like [`new`](Cache::new), additionally sizing the initial index for
    /// `load_factor` (clamped to [0.5, 0.95]; a performance knob only).
    pub fn with_load_factor<R>(capacity: usize, load_factor: f32, resolver: R) -> Self
    where
        R: Fn(&K, Reply<K, V, E>) + 'static,
    {
        Cache {
            store: Rc::new(RefCell::new(LruStore::new(capacity, load_factor))),
            pending: Rc::new(RefCell::new(HashMap::with_hasher(RandomState::new()))),
            resolver: Rc::new(resolver),
        }
    }

    /// Look up `key`, promoting the entry on a hit.
    ///
    /// On a hit the callback runs synchronously, before `get` returns. On a
    /// miss the callback is queued; if no resolution for `key` is in
    /// flight, the resolver is invoked with a fresh [`Reply`], otherwise
    /// the callback waits behind the in-flight one. Queued callbacks fire
    /// in registration order, exactly once, when the reply is fulfilled.
    pub fn get<F>(&self, key: K, callback: F)
    where
        F: FnOnce(GetResult<K, V, E>) + 'static,
    {
        let hit = {
            let mut store = self.store.borrow_mut();
            match store.lookup(&key) {
                Some(handle) => {
                    store.touch(handle);
                    store.stats.hits += 1;
                    Some(handle)
                }
                None => {
                    store.stats.misses += 1;
                    None
                }
            }
        };

        if let Some(handle) = hit {
            callback(Ok(Cursor::new(Rc::clone(&self.store), handle)));
            return;
        }

        // The pending entry must be fully registered before the resolver
        // runs: a synchronous reply looks it up on this same call stack.
        let fresh_miss = {
            let mut pending = self.pending.borrow_mut();
            let waiters = pending.entry(key.clone()).or_default();
            waiters.push(Box::new(callback));
            waiters.len() == 1
        };

        if fresh_miss {
            let reply = Reply {
                store: Rc::downgrade(&self.store),
                pending: Rc::downgrade(&self.pending),
                key: key.clone(),
            };
            (self.resolver)(&key, reply);
        }
    }

    /// Look up `key` without promoting it and without invoking the
    /// resolver.
    ///
    /// Returns the end cursor when the key is absent.
    pub fn peek(&self, key: &K) -> Cursor<K, V> {
        let handle = self
            .store
            .borrow()
            .lookup(key)
            .unwrap_or_else(Handle::sentinel);
        Cursor::new(Rc::clone(&self.store), handle)
    }

    /// Remove `key`, returning its owned value.
    ///
    /// No-op returning `None` when absent. An in-flight resolution for
    /// `key` is unaffected: it still completes and re-inserts on success.
    pub fn invalidate(&self, key: &K) -> Option<V> {
        self.store.borrow_mut().remove(key)
    }

    /// Drop every entry and reset the recency ring.
    ///
    /// Pending resolutions are preserved: replies still in flight deliver
    /// into the emptied cache.
    pub fn flush(&self) {
        self.store.borrow_mut().flush();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.store.borrow().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fixed capacity chosen at construction.
    pub fn capacity(&self) -> usize {
        self.store.borrow().capacity()
    }

    /// Number of keys with a resolution currently in flight.
    pub fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Cursor at the most-recently-used entry; the end cursor when empty.
    pub fn front(&self) -> Cursor<K, V> {
        let handle = self.store.borrow().newest();
        Cursor::new(Rc::clone(&self.store), handle)
    }

    /// The past-the-end cursor.
    pub fn end(&self) -> Cursor<K, V> {
        Cursor::new(Rc::clone(&self.store), Handle::sentinel())
    }

    /// Snapshot of the hit/miss/insert/eviction counters.
    pub fn stats(&self) -> CacheStats {
        self.store.borrow().stats
    }

    /// Zero the statistics counters.
    pub fn reset_stats(&self) {
        self.store.borrow_mut().stats = CacheStats::default();
    }
}

/// Single-use token a resolver consumes to deliver its result.
///
/// Fulfilling consumes the token, so a resolution can be answered at most
/// once. Dropping a reply without fulfilling it strands the callbacks
/// queued behind it, which the resolver contract forbids. A reply that
/// outlives its cache is discarded on fulfillment.
pub struct Reply<K, V, E> {
    store: Weak<RefCell<LruStore<K, V>>>,
    pending: Weak<RefCell<PendingTable<K, V, E>>>,
    key: K,
}

impl<K, V, E> Reply<K, V, E>
where
    K: Hash + Eq + Clone,
    E: Clone,
{
    /// The key this reply resolves.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Deliver the resolution result.
    ///
    /// `Ok(value)` inserts the value as the newest entry, then evicts from
    /// the least-recently-used end while the cache is over capacity.
    /// `Err(e)` leaves the cache unchanged. Either way, every callback
    /// queued for the key then runs in registration order with the same
    /// result; the callbacks may call back into the cache.
    pub fn fulfill(self, result: Result<V, E>) {
        let (Some(store), Some(pending)) = (self.store.upgrade(), self.pending.upgrade()) else {
            return;
        };

        let outcome = match result {
            Ok(value) => {
                let mut store_mut = store.borrow_mut();
                let handle = store_mut.insert(self.key.clone(), value);
                let evicted = store_mut.enforce_capacity();
                store_mut.stats.inserts += 1;
                store_mut.stats.evictions += evicted;
                Ok(handle)
            }
            Err(err) => Err(err),
        };

        // Take the queue out before draining so a reentrant `get` from a
        // callback starts a fresh episode instead of appending to a list
        // being iterated.
        let waiters = pending.borrow_mut().remove(&self.key).unwrap_or_default();
        debug_assert!(!waiters.is_empty(), "fulfilled a reply with no waiters");

        for callback in waiters {
            let result = match &outcome {
                Ok(handle) => Ok(Cursor::new(Rc::clone(&store), *handle)),
                Err(err) => Err(err.clone()),
            };
            callback(result);
        }
    }
}
