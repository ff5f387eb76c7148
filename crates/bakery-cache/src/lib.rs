//! Parse-result cache for Bakery plugin loads.
//!
//! Parsing a large plugin hierarchy dominates load time, and most files do
//! not change between loads. This crate caches parsed [`bakery_core::Plugin`]
//! values keyed by absolute path and validated by a Blake3 content
//! fingerprint: a fingerprint match lets the loader adopt the cached result,
//! any mismatch forces a fresh parse and a cache update.
//!
//! # Architecture
//!
//! - [`Fingerprint`] - `blake3:<hex>` content identity, the same format the
//!   rest of the system uses for integrity values
//! - [`CacheReconciler`] - in-memory LRU table in front of one JSON entry
//!   file per plugin under a cache directory
//! - [`FlushGate`] - non-blocking reentrancy guard confining disk writes to
//!   one exclusive pass; a contended flush is skipped, never queued
//!
//! Reads are safe for concurrent access from many loader workers. Writes are
//! batched: [`CacheReconciler::store`] only updates the in-memory table, and
//! [`CacheReconciler::flush`] persists everything dirty in one gated pass
//! after a load completes. A skipped flush just means the next load re-parses
//! and re-caches those items - staleness is tolerated, writer contention is
//! not.
//!
//! # Examples
//!
//! ```
//! use bakery_cache::{CacheReconciler, Fingerprint, FlushOutcome};
//! use bakery_core::{Plugin, PluginKind, declare};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let temp = tempfile::tempdir()?;
//! let cache = CacheReconciler::open(temp.path(), 1024)?;
//!
//! let text = "[Main]\nTitle=A\n";
//! let path = Path::new("/base/p/a.script");
//! let plugin = declare::parse_plugin(path, "p/a.script", PluginKind::Plugin, 1, text)?;
//! let fp = Fingerprint::of_bytes(text.as_bytes());
//!
//! assert!(cache.lookup(path, &fp).is_none());
//! cache.store(path, fp.clone(), plugin.clone());
//! assert_eq!(cache.lookup(path, &fp), Some(plugin));
//!
//! assert!(matches!(cache.flush()?, FlushOutcome::Completed { .. }));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod error;
mod fingerprint;
mod gate;
mod reconciler;

pub use error::{CacheError, Result};
pub use fingerprint::Fingerprint;
pub use gate::{FlushGate, FlushPermit};
pub use reconciler::{CacheEntry, CacheReconciler, FlushOutcome};
