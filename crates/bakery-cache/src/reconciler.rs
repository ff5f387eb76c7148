//! Cache reconciler: fingerprint-validated reuse of parsed plugins.

use crate::error::{CacheError, Result};
use crate::fingerprint::Fingerprint;
use crate::gate::FlushGate;
use bakery_core::Plugin;
use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One persisted cache record: a parsed plugin plus the fingerprint of the
/// file content it was parsed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Absolute path of the plugin file this entry caches.
    pub path: PathBuf,
    /// Fingerprint of the file bytes at parse time.
    pub fingerprint: Fingerprint,
    /// When the entry was stored.
    pub stored_at: DateTime<Utc>,
    /// The parsed plugin.
    pub plugin: Plugin,
}

/// Result of a [`CacheReconciler::flush`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The pass ran to completion.
    Completed {
        /// Entries whose disk files were (re)written.
        refreshed: usize,
        /// Entries that were already current on disk and were skipped.
        current: usize,
    },
    /// Another flush held the gate; this pass was abandoned immediately.
    Skipped,
}

#[derive(Debug)]
struct Inner {
    entries: LruCache<PathBuf, CacheEntry>,
    dirty: HashSet<PathBuf>,
}

/// Maps `(path, fingerprint)` to previously parsed plugins.
///
/// Loader workers call [`lookup`](Self::lookup) concurrently during a load;
/// [`store`](Self::store) records fresh parses in memory; a single
/// [`flush`](Self::flush) pass after the load persists dirty entries to one
/// JSON file per plugin under the cache directory. The flush is guarded by a
/// [`FlushGate`]: a pass that finds the gate held abandons itself rather than
/// queuing.
///
/// # Thread Safety
///
/// `CacheReconciler` is `Send + Sync`; the in-memory table sits behind a
/// mutex with short critical sections (no I/O is done under the lock on the
/// lookup fast path).
///
/// # Examples
///
/// ```no_run
/// use bakery_cache::CacheReconciler;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = CacheReconciler::default_dir().expect("platform cache dir");
/// let cache = CacheReconciler::open(dir, 4096)?;
/// println!("{} entries on disk", cache.disk_entry_count()?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CacheReconciler {
    dir: PathBuf,
    inner: Mutex<Inner>,
    gate: FlushGate,
}

impl CacheReconciler {
    /// Opens (and if needed creates) a cache directory.
    ///
    /// `capacity` bounds the in-memory table; evicted entries fall back to
    /// their disk files on the next lookup. Entry files are loaded lazily,
    /// so opening a large cache is cheap.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::DirectoryUnusable`] when the directory cannot
    /// be created or read. Callers are expected to continue with caching
    /// disabled rather than aborting the session.
    pub fn open(dir: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| CacheError::DirectoryUnusable {
            path: dir.clone(),
            reason: e.to_string(),
        })?;
        // Probe readability up front so a broken cache disables itself at
        // open time instead of mid-load.
        fs::read_dir(&dir).map_err(|e| CacheError::DirectoryUnusable {
            path: dir.clone(),
            reason: e.to_string(),
        })?;

        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);

        tracing::debug!(dir = %dir.display(), capacity = capacity.get(), "plugin cache opened");
        Ok(Self {
            dir,
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                dirty: HashSet::new(),
            }),
            gate: FlushGate::new(),
        })
    }

    /// Returns the platform-default cache directory for Bakery.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|d| d.join("bakery").join("plugins"))
    }

    /// Returns a previously parsed plugin if its fingerprint still matches.
    ///
    /// Checks the in-memory table first, then the entry file on disk. A
    /// fingerprint mismatch, a missing entry, or a malformed entry file all
    /// yield `None` - a malformed file costs only that one entry, never the
    /// session.
    #[must_use]
    pub fn lookup(&self, path: &Path, fingerprint: &Fingerprint) -> Option<Plugin> {
        {
            let mut inner = self.inner.lock().expect("cache mutex poisoned");
            if let Some(entry) = inner.entries.get(path) {
                if entry.fingerprint == *fingerprint {
                    return Some(entry.plugin.clone());
                }
                // The file changed since this entry was stored; the memory
                // table is at least as fresh as disk, so don't bother there.
                return None;
            }
        }

        match self.read_entry_file(path) {
            Ok(Some(entry)) if entry.fingerprint == *fingerprint => {
                let plugin = entry.plugin.clone();
                let mut inner = self.inner.lock().expect("cache mutex poisoned");
                inner.entries.put(path.to_path_buf(), entry);
                Some(plugin)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable cache entry");
                None
            }
        }
    }

    /// Records a freshly parsed plugin in the in-memory table.
    ///
    /// The entry becomes dirty and is persisted by the next successful
    /// [`flush`](Self::flush). Last write wins per path.
    pub fn store(&self, path: &Path, fingerprint: Fingerprint, plugin: Plugin) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.entries.put(
            path.to_path_buf(),
            CacheEntry {
                path: path.to_path_buf(),
                fingerprint,
                stored_at: Utc::now(),
                plugin,
            },
        );
        inner.dirty.insert(path.to_path_buf());
    }

    /// Persists all dirty entries to disk in one exclusive pass.
    ///
    /// If another flush currently holds the gate this pass returns
    /// [`FlushOutcome::Skipped`] immediately - a skipped refresh just means
    /// the next load re-parses and re-caches those items.
    ///
    /// # Errors
    ///
    /// Returns an error only when the pass as a whole cannot run (the cache
    /// directory vanished). Individual entry write failures are logged and
    /// the entry stays dirty for a later pass.
    pub fn flush(&self) -> Result<FlushOutcome> {
        let Some(_permit) = self.gate.try_acquire() else {
            tracing::debug!("cache flush skipped: another flush is in progress");
            return Ok(FlushOutcome::Skipped);
        };

        if !self.dir.is_dir() {
            return Err(CacheError::DirectoryUnusable {
                path: self.dir.clone(),
                reason: "cache directory no longer exists".to_string(),
            });
        }

        let (to_write, current) = {
            let mut inner = self.inner.lock().expect("cache mutex poisoned");
            let dirty = std::mem::take(&mut inner.dirty);
            let mut batch = Vec::with_capacity(dirty.len());
            for path in dirty {
                if let Some(entry) = inner.entries.peek(&path) {
                    batch.push(entry.clone());
                }
            }
            (batch, inner.entries.len())
        };
        let current = current - to_write.len();

        let mut refreshed = 0usize;
        for entry in to_write {
            match self.write_entry_file(&entry) {
                Ok(()) => refreshed += 1,
                Err(e) => {
                    tracing::warn!(
                        path = %entry.path.display(),
                        error = %e,
                        "cache entry not persisted; will retry on a later flush"
                    );
                    let mut inner = self.inner.lock().expect("cache mutex poisoned");
                    inner.dirty.insert(entry.path.clone());
                }
            }
        }

        tracing::debug!(refreshed, current, "cache flush completed");
        Ok(FlushOutcome::Completed { refreshed, current })
    }

    /// Counts entry files currently on disk.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the cache directory cannot be read.
    pub fn disk_entry_count(&self) -> Result<usize> {
        let mut count = 0usize;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.path().extension().is_some_and(|e| e == "json") {
                count += 1;
            }
        }
        Ok(count)
    }

    fn entry_path(&self, path: &Path) -> PathBuf {
        let key = blake3::hash(path.to_string_lossy().as_bytes());
        self.dir.join(format!("{}.json", key.to_hex()))
    }

    fn read_entry_file(&self, path: &Path) -> Result<Option<CacheEntry>> {
        let file = self.entry_path(path);
        let text = match fs::read_to_string(&file) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: CacheEntry = serde_json::from_str(&text)?;
        // A moved cache directory or a path-hash collision would hand back
        // an entry for the wrong file; the stored path settles it.
        if entry.path != path || !Fingerprint::is_valid_format(entry.fingerprint.as_str()) {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    fn write_entry_file(&self, entry: &CacheEntry) -> Result<()> {
        let file = self.entry_path(&entry.path);
        let json = serde_json::to_string_pretty(entry)?;
        fs::write(&file, json)?;
        Ok(())
    }
}

const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(4096).unwrap();
