//! Category table for memoization
//!
//! Maps every [`MatchCategory`] queried during a parse to the single
//! coordinator that owns it. The table is append-only: entries are never
//! removed or replaced while a parse runs, and ids are dense indices into
//! the entry list, so a walker can refer to its owner by id instead of by
//! owning pointer.
//!
//! # Implementation Details
//!
//! - Lookups take a shared read lock; only a miss takes the write lock.
//! - The write path re-checks the index, so get-or-create is atomic and at
//!   most one entry is ever created per category.
//! - Hits and misses are counted for [`stats`](CategoryTable::stats).

use super::matching::MatchCategory;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hash map with the ahash hasher
pub(crate) type FastMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// Hash set with the ahash hasher
pub(crate) type FastSet<K> = hashbrown::HashSet<K, ahash::RandomState>;

/// Dense index of an entry in a [`CategoryTable`]
pub(crate) type EntryId = usize;

struct TableInner<T> {
    /// Category -> entry index
    index: FastMap<MatchCategory, EntryId>,
    /// Entries in creation order
    entries: Vec<Arc<T>>,
}

/// Append-only map from categories to shared entries
pub(crate) struct CategoryTable<T> {
    inner: RwLock<TableInner<T>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T> CategoryTable<T> {
    /// Create an empty table sized for roughly `estimated_entries`
    pub fn with_capacity(estimated_entries: usize) -> Self {
        Self {
            inner: RwLock::new(TableInner {
                index: FastMap::with_capacity_and_hasher(
                    estimated_entries,
                    ahash::RandomState::new(),
                ),
                entries: Vec::with_capacity(estimated_entries),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get the entry for `category`, creating it with `make` if absent
    ///
    /// Returns the entry and whether this call created it. `make` receives
    /// the id the new entry will have and runs under the write lock, so it
    /// must not touch the table.
    pub fn get_or_create<F>(&self, category: MatchCategory, make: F) -> (Arc<T>, bool)
    where
        F: FnOnce(EntryId) -> T,
    {
        if let Some(entry) = self.find(category) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return (entry, false);
        }

        let mut inner = self.inner.write();
        if let Some(&id) = inner.index.get(&category) {
            // Lost the race to another creator
            self.hits.fetch_add(1, Ordering::Relaxed);
            return (Arc::clone(&inner.entries[id]), false);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let id = inner.entries.len();
        let entry = Arc::new(make(id));
        inner.entries.push(Arc::clone(&entry));
        inner.index.insert(category, id);
        (entry, true)
    }

    /// Look up an existing entry
    pub fn find(&self, category: MatchCategory) -> Option<Arc<T>> {
        let inner = self.inner.read();
        inner
            .index
            .get(&category)
            .map(|&id| Arc::clone(&inner.entries[id]))
    }

    /// Get an entry by id
    ///
    /// # Panics
    /// Panics if `id` was not handed out by this table.
    pub fn get(&self, id: EntryId) -> Arc<T> {
        Arc::clone(&self.inner.read().entries[id])
    }

    /// All entries, in creation order
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.inner.read().entries.clone()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Get table statistics: (hits, misses, hit rate)
    pub fn stats(&self) -> (u64, u64, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };
        (hits, misses, hit_rate)
    }
}
