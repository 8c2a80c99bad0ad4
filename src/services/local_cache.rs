//! In-memory cache of posts or reviews owned by a single view.
//!
//! The cache mirrors a subset of backend state between fetches. It is rebuilt
//! wholesale by `replace_all` after each fetch and patched in place by the
//! reconciler. Identifiers are unique within a cache.

use crate::models::{Post, Review};

/// A record that can be held in a [`LocalCache`].
pub trait CacheRecord {
    fn id(&self) -> i64;
}

impl CacheRecord for Post {
    fn id(&self) -> i64 {
        self.id
    }
}

impl CacheRecord for Review {
    fn id(&self) -> i64 {
        self.id
    }
}

/// Collection of records keyed by their identifier.
#[derive(Debug, Clone)]
pub struct LocalCache<T> {
    records: Vec<T>,
}

impl<T> Default for LocalCache<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<T: CacheRecord> LocalCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from fetched records.
    pub fn from_records(records: Vec<T>) -> Self {
        let mut cache = Self::new();
        cache.replace_all(records);
        cache
    }

    fn position(&self, id: i64) -> Option<usize> {
        self.records.iter().position(|r| r.id() == id)
    }

    pub fn find(&self, id: i64) -> Option<&T> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.position(id).is_some()
    }

    /// Apply `mutator` to the record with `id` in place.
    ///
    /// Returns the updated record, or `None` if nothing matched. The mutator
    /// must not change the record's identifier.
    pub fn patch<F>(&mut self, id: i64, mutator: F) -> Option<&T>
    where
        F: FnOnce(&mut T),
    {
        let index = self.position(id)?;
        let record = &mut self.records[index];
        mutator(record);
        debug_assert_eq!(record.id(), id, "patch must not change the record id");
        Some(&self.records[index])
    }

    /// Remove and return the record with `id`.
    pub fn evict(&mut self, id: i64) -> Option<T> {
        let index = self.position(id)?;
        Some(self.records.remove(index))
    }

    /// Add a record. A record with the same id is replaced in place.
    pub fn append(&mut self, record: T) {
        match self.position(record.id()) {
            Some(index) => self.records[index] = record,
            None => self.records.push(record),
        }
    }

    /// Replace the whole collection with freshly fetched records.
    ///
    /// If the fetch returned the same id twice, the later record wins.
    pub fn replace_all(&mut self, records: Vec<T>) {
        self.records.clear();
        for record in records {
            self.append(record);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.iter()
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    /// A copy of the records sorted newest first by `key`.
    ///
    /// Records without a key sort last. This is a presentation helper; the
    /// cache itself keeps no order.
    pub fn newest_first<K, F>(&self, key: F) -> Vec<T>
    where
        T: Clone,
        K: Ord,
        F: Fn(&T) -> Option<K>,
    {
        let mut sorted = self.records.clone();
        sorted.sort_by(|a, b| key(b).cmp(&key(a)));
        sorted
    }
}
