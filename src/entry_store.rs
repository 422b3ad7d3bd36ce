//! Slot arena plus bucket index backing every hash-based container.
//!
//! `entries` is the arena and `buckets` maps `hash % capacity` to the head
//! of a chain threaded through the arena. Vacant slots form an intrusive
//! free list that is consumed before the arena grows.

use alloc::vec;
use alloc::vec::Vec;
use core::mem;

use crate::error::CollectionError;
use crate::primes;

/// A live entry in the arena.
#[derive(Clone, Debug)]
pub(crate) struct Occupied<K, V> {
    pub(crate) hash: u32,
    /// Next entry in the same bucket chain.
    pub(crate) next: Option<u32>,
    pub(crate) key: K,
    pub(crate) value: V,
}

#[derive(Clone, Debug)]
pub(crate) enum Slot<K, V> {
    Occupied(Occupied<K, V>),
    Vacant { next_free: Option<u32> },
}

impl<K, V> Slot<K, V> {
    #[inline]
    pub(crate) fn as_occupied(&self) -> Option<&Occupied<K, V>> {
        match self {
            Slot::Occupied(entry) => Some(entry),
            Slot::Vacant { .. } => None,
        }
    }
}

/// Invariants:
/// - `buckets.len()` is the capacity and `entries.len() <= capacity`.
/// - Both are empty together (unallocated) or sized together.
/// - `len() == entries.len() - free_count`.
#[derive(Clone, Debug)]
pub(crate) struct EntryStore<K, V> {
    buckets: Vec<Option<u32>>,
    entries: Vec<Slot<K, V>>,
    free_head: Option<u32>,
    free_count: usize,
}

impl<K, V> EntryStore<K, V> {
    pub(crate) const fn new() -> Self {
        Self {
            buckets: Vec::new(),
            entries: Vec::new(),
            free_head: None,
            free_count: 0,
        }
    }

    /// Allocates a store sized to the first prime `>= capacity`.
    pub(crate) fn with_capacity(capacity: usize) -> Result<Self, CollectionError> {
        if capacity == 0 {
            return Ok(Self::new());
        }
        Ok(Self::allocate(primes::get_prime(capacity)?))
    }

    fn allocate(size: usize) -> Self {
        debug_assert!(size <= primes::MAX_PRIME_CAPACITY);
        Self {
            buckets: vec![None; size],
            entries: Vec::with_capacity(size),
            free_head: None,
            free_count: 0,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len() - self.free_count
    }

    /// Number of slots ever initialized since the last compaction.
    #[inline]
    pub(crate) fn end(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub(crate) fn free_count(&self) -> usize {
        self.free_count
    }

    #[inline]
    pub(crate) fn slots(&self) -> &[Slot<K, V>] {
        &self.entries
    }

    #[inline]
    fn bucket_of(&self, hash: u32) -> usize {
        hash as usize % self.buckets.len()
    }

    /// Head of the chain `hash` falls into.
    #[inline]
    pub(crate) fn chain_head(&self, hash: u32) -> Option<u32> {
        if self.buckets.is_empty() {
            return None;
        }
        self.buckets[self.bucket_of(hash)]
    }

    #[inline]
    pub(crate) fn occupied(&self, index: u32) -> Option<&Occupied<K, V>> {
        self.entries.get(index as usize).and_then(Slot::as_occupied)
    }

    #[inline]
    pub(crate) fn occupied_mut(&mut self, index: u32) -> Option<&mut Occupied<K, V>> {
        match self.entries.get_mut(index as usize) {
            Some(Slot::Occupied(entry)) => Some(entry),
            _ => None,
        }
    }

    /// Stores a new entry at the head of its chain and returns its slot.
    ///
    /// The free-list head is reused first; otherwise the entry is appended,
    /// growing the store when every slot has been initialized.
    pub(crate) fn occupy(&mut self, hash: u32, key: K, value: V) -> Result<u32, CollectionError> {
        let index = match self.free_head {
            Some(free) => {
                let next_free = match self.entries.get(free as usize) {
                    Some(Slot::Vacant { next_free }) => *next_free,
                    _ => return Err(CollectionError::ConcurrentOperation),
                };
                self.free_head = next_free;
                self.free_count -= 1;
                free
            }
            None => {
                if self.entries.len() == self.buckets.len() {
                    self.resize(primes::expand_prime(self.len())?);
                }
                self.entries.push(Slot::Vacant { next_free: None });
                (self.entries.len() - 1) as u32
            }
        };

        let bucket = self.bucket_of(hash);
        self.entries[index as usize] = Slot::Occupied(Occupied {
            hash,
            next: self.buckets[bucket],
            key,
            value,
        });
        self.buckets[bucket] = Some(index);
        Ok(index)
    }

    /// Unlinks the entry at `index` (whose chain predecessor is `prev`) and
    /// pushes its slot onto the free list.
    pub(crate) fn vacate(&mut self, index: u32, prev: Option<u32>) -> Result<(K, V), CollectionError> {
        let (hash, next) = match self.occupied(index) {
            Some(entry) => (entry.hash, entry.next),
            None => return Err(CollectionError::ConcurrentOperation),
        };
        match prev {
            Some(prev) => match self.occupied_mut(prev) {
                Some(entry) => entry.next = next,
                None => return Err(CollectionError::ConcurrentOperation),
            },
            None => {
                let bucket = self.bucket_of(hash);
                self.buckets[bucket] = next;
            }
        }

        let vacant = Slot::Vacant {
            next_free: self.free_head,
        };
        self.free_head = Some(index);
        self.free_count += 1;
        match mem::replace(&mut self.entries[index as usize], vacant) {
            Slot::Occupied(entry) => Ok((entry.key, entry.value)),
            Slot::Vacant { .. } => Err(CollectionError::ConcurrentOperation),
        }
    }

    /// Rehashes every occupied slot into fresh arrays of `new_size`.
    ///
    /// Free slots are dropped along the way, so this doubles as compaction.
    pub(crate) fn resize(&mut self, new_size: usize) {
        debug_assert!(new_size >= self.len());
        let mut fresh = Self::allocate(new_size);
        for slot in self.entries.drain(..) {
            if let Slot::Occupied(mut entry) = slot {
                let index = fresh.entries.len() as u32;
                let bucket = fresh.bucket_of(entry.hash);
                entry.next = fresh.buckets[bucket];
                fresh.buckets[bucket] = Some(index);
                fresh.entries.push(Slot::Occupied(entry));
            }
        }
        *self = fresh;
    }

    /// Drops every entry and the allocation itself.
    pub(crate) fn release(&mut self) {
        *self = Self::new();
    }

    /// Drops every entry while keeping the allocation.
    pub(crate) fn clear(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        self.buckets.fill(None);
        self.entries.clear();
        self.free_head = None;
        self.free_count = 0;
    }

    /// Circular scan over occupied slots starting at slot `start`.
    pub(crate) fn scan(&self, start: usize) -> Scan<'_, K, V> {
        Scan {
            slots: &self.entries,
            start: if self.entries.is_empty() { 0 } else { start % self.entries.len() },
            step: 0,
            remaining: self.len(),
        }
    }
}

/// Iterator over the occupied slots of a store, wrapping at `end`.
#[derive(Clone)]
pub(crate) struct Scan<'a, K, V> {
    slots: &'a [Slot<K, V>],
    start: usize,
    step: usize,
    remaining: usize,
}

impl<'a, K, V> Iterator for Scan<'a, K, V> {
    type Item = (u32, &'a Occupied<K, V>);

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 && self.step < self.slots.len() {
            let index = (self.start + self.step) % self.slots.len();
            self.step += 1;
            if let Slot::Occupied(entry) = &self.slots[index] {
                self.remaining -= 1;
                return Some((index as u32, entry));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Scan<'_, K, V> {}
