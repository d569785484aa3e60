//! # beacon-cache
//!
//! Bounded LRU + TTL cache used to memoize expensive per-workspace queries
//! (model lists, account snapshots, thread listings).
//!
//! - [`BoundedCache`]: single-owner store, `get` / `set` / `delete` / `clear`
//! - [`MemoCache`]: shared wrapper with [`MemoCache::get_or_try_fetch`]
//! - [`CacheConfig`]: capacity and TTL, buildable from settings

#![deny(unsafe_code)]

pub mod bounded;
pub mod config;
pub mod memo;

pub use bounded::{BoundedCache, CacheStats};
pub use config::CacheConfig;
pub use memo::MemoCache;
