#![forbid(unsafe_code)]
//! Id-indexed entity tables.
//!
//! Every object the catalog scan cross-references (inodes, data streams,
//! catalog node ids) lives in an [`IdTable`]. A table has a fixed number of
//! buckets; an id always lands in bucket `id % HTABLE_BUCKETS`, and each
//! bucket owns a chain of entries kept strictly ascending by id.
//!
//! Entries are only ever created through [`IdTable::get_or_create`], so a
//! table holds at most one entity per id. Entries are only ever released
//! through [`IdTable::for_each_then_free`], which hands each one to a
//! finalizer first. Checks that need the whole catalog to have been seen
//! run in that finalizer.

use afsck_error::{FsckError, Result};
use tracing::{debug, trace};

/// Bucket count shared by every table.
pub const HTABLE_BUCKETS: usize = 512;

/// An entity that can live in an [`IdTable`].
pub trait TableEntry {
    /// A fresh entity for `id`, with every other field zeroed.
    fn new(id: u64) -> Self;

    /// The id this entity is keyed by.
    fn id(&self) -> u64;
}

/// Fixed-bucket table of entities keyed by a 64-bit id.
#[derive(Debug)]
pub struct IdTable<E> {
    buckets: Vec<Vec<E>>,
    len: usize,
}

#[allow(clippy::cast_possible_truncation)] // remainder is below HTABLE_BUCKETS
fn bucket_index(id: u64) -> usize {
    (id % HTABLE_BUCKETS as u64) as usize
}

impl<E: TableEntry> IdTable<E> {
    /// Allocate an empty table.
    pub fn new() -> Result<Self> {
        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(HTABLE_BUCKETS)
            .map_err(|_| FsckError::OutOfMemory {
                what: "hash table buckets",
            })?;
        buckets.resize_with(HTABLE_BUCKETS, Vec::new);
        Ok(Self { buckets, len: 0 })
    }

    /// Find the entity for `id`, creating a zeroed one if it is not there yet.
    ///
    /// The new entity is spliced into its bucket chain at the position that
    /// keeps the chain sorted.
    pub fn get_or_create(&mut self, id: u64) -> Result<&mut E> {
        let chain = &mut self.buckets[bucket_index(id)];
        match chain.binary_search_by_key(&id, E::id) {
            Ok(pos) => Ok(&mut chain[pos]),
            Err(pos) => {
                chain.try_reserve(1).map_err(|_| FsckError::OutOfMemory {
                    what: "hash table entry",
                })?;
                chain.insert(pos, E::new(id));
                self.len += 1;
                trace!(id, "created table entry");
                Ok(&mut chain[pos])
            }
        }
    }

    /// Look up `id` without creating anything.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&E> {
        let chain = &self.buckets[bucket_index(id)];
        chain
            .binary_search_by_key(&id, E::id)
            .ok()
            .map(|pos| &chain[pos])
    }

    /// Number of entities in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no entity has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The chain stored in bucket `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= HTABLE_BUCKETS`.
    #[must_use]
    pub fn bucket(&self, index: usize) -> &[E] {
        &self.buckets[index]
    }

    /// Every entity, bucket by bucket, each chain in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.buckets.iter().flatten()
    }

    /// Release the table, handing each entity to `finalize` before it is
    /// dropped.
    ///
    /// Buckets are visited in index order and each chain front to back. If
    /// `finalize` fails, the error is returned and the entities not yet
    /// visited are dropped unchecked.
    pub fn for_each_then_free<F>(self, mut finalize: F) -> Result<()>
    where
        F: FnMut(E) -> Result<()>,
    {
        debug!(entries = self.len, "releasing table");
        for chain in self.buckets {
            for entry in chain {
                finalize(entry)?;
            }
        }
        Ok(())
    }
}
