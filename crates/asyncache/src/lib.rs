//! # asyncache
//!
//! Bounded LRU cache with asynchronous miss resolution for single-threaded,
//! event-driven programs.
//!
//! ## Architecture
//! - **Index**: AHash map from key to arena slot (O(1) lookups)
//! - **Recency ring**: circular doubly-linked list threaded through a slot
//!   arena and anchored at a sentinel, for O(1) promotion and eviction
//! - **Pending table**: per-key callback queues that coalesce concurrent
//!   misses into a single resolver invocation
//!
//! A lookup that hits runs its callback synchronously, before [`Cache::get`]
//! returns. A miss is handed to the external resolver; the callback fires
//! when the resolver fulfills its [`Reply`], which may happen on the same
//! call stack or later from the event loop. Lookups that miss while a
//! resolution for the same key is already in flight are queued behind it
//! and all receive the same result, in registration order.
//!
//! The cache is a cheap clonable handle and performs no locking; all
//! operations must run on one logical thread of control.

#![warn(missing_docs)]

mod cache;
mod cursor;
mod lru;
mod stats;

pub use cache::{Cache, GetResult, Reply};
pub use cursor::Cursor;
pub use stats::CacheStats;
