//! The chained hash table shared by sets and maps.
//!
//! Lookups walk a bucket chain through the [`EntryStore`] arena, comparing
//! the stored hash before calling `Eq`. Sets are tables with `()` values;
//! the set-algebra operations live on `HashTable<T, ()>`.

use alloc::vec;
use alloc::vec::Vec;
use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::Hash;
use core::mem;

use crate::enumeration;
use crate::entry_store::EntryStore;
use crate::entry_store::Occupied;
use crate::entry_store::Scan;
use crate::error::CollectionError;
use crate::primes;
use crate::structural::hash_of;

/// What an insert does when the key is already present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OnExisting {
    Keep,
    Replace,
    Fail,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Inserted<V> {
    Added,
    Kept,
    Replaced(V),
}

/// Position of an entry in its chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Located {
    pub(crate) index: u32,
    pub(crate) prev: Option<u32>,
}

/// Statistics about the table layout.
#[cfg(feature = "stats")]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of live entries
    pub len: usize,
    /// Number of slots allocated (a prime)
    pub capacity: usize,
    /// Number of slots initialized since the last compaction
    pub end: usize,
    /// Number of slots waiting on the free list
    pub free_slots: usize,
    /// Buckets with no chain
    pub empty_buckets: usize,
    /// Length of the longest bucket chain
    pub longest_chain: usize,
    /// Load factor (len / capacity)
    pub load_factor: f64,
}

#[cfg(feature = "stats")]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Debug Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor)",
            self.len,
            self.capacity,
            self.load_factor * 100.0
        );
        println!(
            "Slots: {} initialized, {} on the free list",
            self.end, self.free_slots
        );
        println!(
            "Buckets: {} empty, longest chain {}",
            self.empty_buckets, self.longest_chain
        );
    }
}

/// Hash table storing entries in a prime-sized slot arena with separate
/// chaining and a free list of removed slots.
///
/// The table is the shared storage of the set and map kinds; it is exposed so
/// that hash-based operands can be recognized by [`SetOperand`]. Tables are
/// only created by the containers:
///
/// ```compile_fail
/// let table: freeze_hash::HashTable<u32, ()> = Default::default();
/// ```
pub struct HashTable<K, V> {
    store: EntryStore<K, V>,
    /// Picks where enumerations start; drawn anew for every storage.
    seed: u64,
    /// Bumped by every change to the entries or the layout.
    revision: u32,
}

impl<K: Clone, V: Clone> Clone for HashTable<K, V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            seed: enumeration::next_seed(),
            revision: self.revision,
        }
    }
}

impl<K, V> Debug for HashTable<K, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HashTable")
            .field("len", &self.store.len())
            .field("capacity", &self.store.capacity())
            .field("end", &self.store.end())
            .field("free", &self.store.free_count())
            .finish()
    }
}

impl<K, V> HashTable<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            store: EntryStore::new(),
            seed: enumeration::next_seed(),
            revision: 0,
        }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Result<Self, CollectionError> {
        Ok(Self {
            store: EntryStore::with_capacity(capacity)?,
            seed: enumeration::next_seed(),
            revision: 0,
        })
    }

    /// Returns the number of entries in the table.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    /// Returns the number of slots allocated.
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Slot at which enumerations of this table start.
    pub(crate) fn start_offset(&self) -> usize {
        enumeration::start_offset(self.seed, self.store.end())
    }

    /// Changes whenever entries are added, removed or replaced, or the
    /// layout is rebuilt. Operations that change nothing leave it alone.
    #[inline]
    pub(crate) fn revision(&self) -> u32 {
        self.revision
    }

    #[inline]
    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    pub(crate) fn scan(&self) -> Scan<'_, K, V> {
        self.store.scan(self.start_offset())
    }

    pub(crate) fn iter(&self) -> Iter<'_, K, V> {
        Iter { scan: self.scan() }
    }

    pub(crate) fn keys(&self) -> Keys<'_, K, V> {
        Keys { scan: self.scan() }
    }

    /// Entry at an arena slot, if that slot is occupied.
    pub(crate) fn slot(&self, index: usize) -> Option<&Occupied<K, V>> {
        self.store.slots().get(index).and_then(|s| s.as_occupied())
    }

    pub(crate) fn end(&self) -> usize {
        self.store.end()
    }

    pub(crate) fn clear(&mut self) {
        if self.store.end() != 0 {
            self.store.clear();
            self.touch();
        }
    }

    /// Grows to the first prime `>= capacity` if needed; never shrinks.
    pub(crate) fn ensure_capacity(&mut self, capacity: usize) -> Result<usize, CollectionError> {
        let current = self.store.capacity();
        if current >= capacity {
            return Ok(current);
        }
        let size = primes::get_prime(capacity)?;
        self.store.resize(size);
        self.touch();
        Ok(size)
    }

    /// Compacts into a store sized for `capacity` entries.
    pub(crate) fn trim_excess(&mut self, capacity: usize) -> Result<(), CollectionError> {
        let len = self.store.len();
        if capacity < len {
            return Err(CollectionError::ArgumentOutOfRange {
                name: "capacity",
                value: capacity,
                limit: len,
            });
        }
        if capacity == 0 {
            if self.store.capacity() != 0 {
                self.store.release();
                self.touch();
            }
            return Ok(());
        }
        let size = primes::get_prime(capacity)?;
        if size < self.store.capacity() {
            self.store.resize(size);
            self.touch();
        }
        Ok(())
    }

    /// Walks the chain for `hash`, returning the first entry accepted by `eq`.
    ///
    /// A walk longer than the arena can only come from a cycle, which a
    /// single writer never creates.
    pub(crate) fn find_index(
        &self,
        hash: u32,
        eq: impl Fn(&K) -> bool,
    ) -> Result<Option<Located>, CollectionError> {
        let mut prev = None;
        let mut cursor = self.store.chain_head(hash);
        let mut collisions = 0usize;
        while let Some(index) = cursor {
            let entry = self
                .store
                .occupied(index)
                .ok_or(CollectionError::ConcurrentOperation)?;
            if entry.hash == hash && eq(&entry.key) {
                return Ok(Some(Located { index, prev }));
            }
            prev = Some(index);
            cursor = entry.next;
            collisions += 1;
            if collisions > self.store.end() {
                return Err(CollectionError::ConcurrentOperation);
            }
        }
        Ok(None)
    }

    pub(crate) fn entry(&self, located: Located) -> Option<&Occupied<K, V>> {
        self.store.occupied(located.index)
    }

    pub(crate) fn entry_mut(&mut self, located: Located) -> Option<&mut Occupied<K, V>> {
        self.store.occupied_mut(located.index)
    }

    pub(crate) fn remove_located(&mut self, located: Located) -> Result<(K, V), CollectionError> {
        let removed = self.store.vacate(located.index, located.prev)?;
        self.touch();
        Ok(removed)
    }

    /// Removes the entry at arena slot `index`, looking up its predecessor.
    fn remove_slot(&mut self, index: u32) -> Result<(K, V), CollectionError> {
        let hash = self
            .store
            .occupied(index)
            .ok_or(CollectionError::ConcurrentOperation)?
            .hash;
        let mut prev = None;
        let mut cursor = self.store.chain_head(hash);
        let mut collisions = 0usize;
        while let Some(current) = cursor {
            if current == index {
                let removed = self.store.vacate(index, prev)?;
                self.touch();
                return Ok(removed);
            }
            prev = Some(current);
            cursor = self
                .store
                .occupied(current)
                .ok_or(CollectionError::ConcurrentOperation)?
                .next;
            collisions += 1;
            if collisions > self.store.end() {
                break;
            }
        }
        Err(CollectionError::ConcurrentOperation)
    }

    pub(crate) fn insert_hashed(
        &mut self,
        hash: u32,
        key: K,
        value: V,
        on_existing: OnExisting,
    ) -> Result<Inserted<V>, CollectionError>
    where
        K: Eq,
    {
        if let Some(found) = self.find_index(hash, |k| k == &key)? {
            return match on_existing {
                OnExisting::Keep => Ok(Inserted::Kept),
                OnExisting::Fail => Err(CollectionError::DuplicateKey),
                OnExisting::Replace => {
                    let entry = self
                        .store
                        .occupied_mut(found.index)
                        .ok_or(CollectionError::ConcurrentOperation)?;
                    let old = mem::replace(&mut entry.value, value);
                    self.touch();
                    Ok(Inserted::Replaced(old))
                }
            };
        }
        self.store.occupy(hash, key, value)?;
        self.touch();
        Ok(Inserted::Added)
    }

    /// Returns detailed layout statistics.
    #[cfg(feature = "stats")]
    pub fn debug_stats(&self) -> DebugStats {
        let capacity = self.store.capacity();
        let mut empty_buckets = 0;
        let mut longest_chain = 0;
        for bucket in 0..capacity {
            let mut length = 0;
            let mut cursor = self.store.chain_head(bucket as u32);
            while let Some(index) = cursor {
                length += 1;
                if length > self.store.end() {
                    break;
                }
                cursor = self.store.occupied(index).and_then(|e| e.next);
            }
            if length == 0 {
                empty_buckets += 1;
            }
            longest_chain = longest_chain.max(length);
        }

        DebugStats {
            len: self.store.len(),
            capacity,
            end: self.store.end(),
            free_slots: self.store.free_count(),
            empty_buckets,
            longest_chain,
            load_factor: if capacity == 0 {
                0.0
            } else {
                self.store.len() as f64 / capacity as f64
            },
        }
    }
}

impl<K, V> HashTable<K, V>
where
    K: Hash + Eq,
{
    pub(crate) fn locate<Q>(&self, key: &Q) -> Result<Option<Located>, CollectionError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_index(hash_of(key), |k| k.borrow() == key)
    }

    pub(crate) fn find<Q>(&self, key: &Q) -> Result<Option<&Occupied<K, V>>, CollectionError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        Ok(self.locate(key)?.and_then(|found| self.entry(found)))
    }

    pub(crate) fn contains_key<Q>(&self, key: &Q) -> Result<bool, CollectionError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        Ok(self.locate(key)?.is_some())
    }

    pub(crate) fn insert(
        &mut self,
        key: K,
        value: V,
        on_existing: OnExisting,
    ) -> Result<Inserted<V>, CollectionError> {
        self.insert_hashed(hash_of(&key), key, value, on_existing)
    }

    pub(crate) fn remove<Q>(&mut self, key: &Q) -> Result<Option<(K, V)>, CollectionError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.locate(key)? {
            Some(found) => self.remove_located(found).map(Some),
            None => Ok(None),
        }
    }
}

/// Iterator over `(key, value)` pairs in enumeration order.
pub struct Iter<'a, K, V> {
    scan: Scan<'a, K, V>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.scan.next().map(|(_, e)| (&e.key, &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.scan.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// Iterator over the keys of a table in enumeration order.
pub struct Keys<'a, K, V> {
    scan: Scan<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.scan.next().map(|(_, e)| &e.key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.scan.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

/// Right-hand side of a set-algebra operation.
///
/// Hash-based operands report their table so operations can probe it
/// directly; everything else is consumed as a plain sequence of items that
/// may contain duplicates.
pub trait SetOperand<'a, T: 'a> {
    /// Iterator over the operand's items.
    type Items: Iterator<Item = &'a T>;

    /// The backing table, when the operand is a hash set of this crate.
    fn hash_table(&self) -> Option<&'a HashTable<T, ()>> {
        None
    }

    /// Consumes the operand into its items.
    fn items(self) -> Self::Items;
}

impl<'a, T: 'a> SetOperand<'a, T> for &'a HashTable<T, ()> {
    type Items = Keys<'a, T, ()>;

    fn hash_table(&self) -> Option<&'a HashTable<T, ()>> {
        Some(*self)
    }

    fn items(self) -> Self::Items {
        self.keys()
    }
}

impl<'a, T: 'a> SetOperand<'a, T> for &'a [T] {
    type Items = core::slice::Iter<'a, T>;

    fn items(self) -> Self::Items {
        self.iter()
    }
}

impl<'a, T: 'a, const N: usize> SetOperand<'a, T> for &'a [T; N] {
    type Items = core::slice::Iter<'a, T>;

    fn items(self) -> Self::Items {
        self.iter()
    }
}

impl<'a, T: 'a> SetOperand<'a, T> for &'a Vec<T> {
    type Items = core::slice::Iter<'a, T>;

    fn items(self) -> Self::Items {
        self.iter()
    }
}

const INLINE_WORDS: usize = 4;

/// One bit per arena slot. Small tables keep the bits inline.
enum Marks {
    Inline([u64; INLINE_WORDS]),
    Heap(Vec<u64>),
}

impl Marks {
    fn new(bits: usize) -> Self {
        let words = bits.div_ceil(64);
        if words <= INLINE_WORDS {
            Marks::Inline([0; INLINE_WORDS])
        } else {
            Marks::Heap(vec![0; words])
        }
    }

    fn words(&self) -> &[u64] {
        match self {
            Marks::Inline(words) => words,
            Marks::Heap(words) => words,
        }
    }

    fn words_mut(&mut self) -> &mut [u64] {
        match self {
            Marks::Inline(words) => words,
            Marks::Heap(words) => words,
        }
    }

    #[inline]
    fn mark(&mut self, index: u32) {
        let index = index as usize;
        self.words_mut()[index / 64] |= 1 << (index % 64);
    }

    #[inline]
    fn is_marked(&self, index: u32) -> bool {
        let index = index as usize;
        self.words()[index / 64] & (1 << (index % 64)) != 0
    }
}

impl<T> HashTable<T, ()>
where
    T: Hash + Eq,
{
    /// Whether `other` is this very table.
    #[inline]
    pub(crate) fn is_same(&self, other: Option<&HashTable<T, ()>>) -> bool {
        other.is_some_and(|other| core::ptr::eq(self, other))
    }

    /// Probes with a hash computed by a table using the same hasher.
    #[inline]
    fn contains_hashed(&self, hash: u32, item: &T) -> Result<bool, CollectionError> {
        Ok(self.find_index(hash, |k| k == item)?.is_some())
    }

    /// Whether every element of `self` is in `other`.
    fn all_in(&self, other: &HashTable<T, ()>) -> Result<bool, CollectionError> {
        for (_, entry) in self.scan() {
            if !other.contains_hashed(entry.hash, &entry.key)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Counts how many distinct elements of `self` the items hit and how
    /// many items miss, without copying the items.
    fn uniques_and_unfound<'a, I>(
        &self,
        items: I,
        stop_on_unfound: bool,
    ) -> Result<(usize, usize), CollectionError>
    where
        I: Iterator<Item = &'a T>,
        T: 'a,
    {
        let mut items = items;
        if self.is_empty() {
            return Ok((0, usize::from(items.next().is_some())));
        }

        let mut marks = Marks::new(self.end());
        let mut unique_found = 0;
        let mut unfound = 0;
        for item in items {
            match self.locate(item)? {
                Some(found) => {
                    if !marks.is_marked(found.index) {
                        marks.mark(found.index);
                        unique_found += 1;
                    }
                }
                None => {
                    unfound += 1;
                    if stop_on_unfound {
                        break;
                    }
                }
            }
        }
        Ok((unique_found, unfound))
    }

    pub(crate) fn union_with<'a, O>(&mut self, other: O) -> Result<(), CollectionError>
    where
        O: SetOperand<'a, T>,
        T: Clone + 'a,
    {
        for item in other.items() {
            self.insert(item.clone(), (), OnExisting::Keep)?;
        }
        Ok(())
    }

    pub(crate) fn intersect_with<'a, O>(&mut self, other: O) -> Result<(), CollectionError>
    where
        O: SetOperand<'a, T>,
        T: 'a,
    {
        if self.is_empty() {
            return Ok(());
        }

        if let Some(table) = other.hash_table() {
            if table.is_empty() {
                self.clear();
                return Ok(());
            }
            for index in 0..self.end() {
                let keep = match self.slot(index) {
                    Some(entry) => table.contains_hashed(entry.hash, &entry.key)?,
                    None => continue,
                };
                if !keep {
                    self.remove_slot(index as u32)?;
                }
            }
            return Ok(());
        }

        let mut marks = Marks::new(self.end());
        for item in other.items() {
            if let Some(found) = self.locate(item)? {
                marks.mark(found.index);
            }
        }
        for index in 0..self.end() {
            if self.slot(index).is_some() && !marks.is_marked(index as u32) {
                self.remove_slot(index as u32)?;
            }
        }
        Ok(())
    }

    pub(crate) fn except_with<'a, O>(&mut self, other: O) -> Result<(), CollectionError>
    where
        O: SetOperand<'a, T>,
        T: 'a,
    {
        if self.is_empty() {
            return Ok(());
        }
        for item in other.items() {
            self.remove(item)?;
        }
        Ok(())
    }

    pub(crate) fn symmetric_except_with<'a, O>(&mut self, other: O) -> Result<(), CollectionError>
    where
        O: SetOperand<'a, T>,
        T: Clone + 'a,
    {
        if self.is_empty() {
            return self.union_with(other);
        }

        if other.hash_table().is_some() {
            for item in other.items() {
                if self.remove(item)?.is_none() {
                    self.insert(item.clone(), (), OnExisting::Keep)?;
                }
            }
            return Ok(());
        }

        // Duplicates in the operand must toggle membership only once.
        let mut unique: HashTable<&'a T, ()> = HashTable::new();
        for item in other.items() {
            unique.insert(item, (), OnExisting::Keep)?;
        }
        for &item in unique.keys() {
            if self.remove(item)?.is_none() {
                self.insert(item.clone(), (), OnExisting::Keep)?;
            }
        }
        Ok(())
    }

    pub(crate) fn is_subset_of<'a, O>(&self, other: O) -> Result<bool, CollectionError>
    where
        O: SetOperand<'a, T>,
        T: 'a,
    {
        if self.is_empty() {
            return Ok(true);
        }
        if let Some(table) = other.hash_table() {
            if self.is_same(Some(table)) {
                return Ok(true);
            }
            if self.len() > table.len() {
                return Ok(false);
            }
            return self.all_in(table);
        }
        let (unique_found, _) = self.uniques_and_unfound(other.items(), false)?;
        Ok(unique_found == self.len())
    }

    pub(crate) fn is_proper_subset_of<'a, O>(&self, other: O) -> Result<bool, CollectionError>
    where
        O: SetOperand<'a, T>,
        T: 'a,
    {
        if let Some(table) = other.hash_table() {
            if self.is_same(Some(table)) || self.len() >= table.len() {
                return Ok(false);
            }
            return self.all_in(table);
        }
        let (unique_found, unfound) = self.uniques_and_unfound(other.items(), false)?;
        Ok(unique_found == self.len() && unfound > 0)
    }

    pub(crate) fn is_superset_of<'a, O>(&self, other: O) -> Result<bool, CollectionError>
    where
        O: SetOperand<'a, T>,
        T: 'a,
    {
        if let Some(table) = other.hash_table() {
            if self.is_same(Some(table)) {
                return Ok(true);
            }
            if table.len() > self.len() {
                return Ok(false);
            }
            return table.all_in(self);
        }
        for item in other.items() {
            if !self.contains_key(item)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub(crate) fn is_proper_superset_of<'a, O>(&self, other: O) -> Result<bool, CollectionError>
    where
        O: SetOperand<'a, T>,
        T: 'a,
    {
        if self.is_empty() {
            return Ok(false);
        }
        if let Some(table) = other.hash_table() {
            if self.is_same(Some(table)) || table.len() >= self.len() {
                return Ok(false);
            }
            return table.all_in(self);
        }
        let (unique_found, unfound) = self.uniques_and_unfound(other.items(), true)?;
        Ok(unique_found < self.len() && unfound == 0)
    }

    pub(crate) fn overlaps<'a, O>(&self, other: O) -> Result<bool, CollectionError>
    where
        O: SetOperand<'a, T>,
        T: 'a,
    {
        if self.is_empty() {
            return Ok(false);
        }
        if self.is_same(other.hash_table()) {
            return Ok(true);
        }
        for item in other.items() {
            if self.contains_key(item)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub(crate) fn set_equals<'a, O>(&self, other: O) -> Result<bool, CollectionError>
    where
        O: SetOperand<'a, T>,
        T: 'a,
    {
        if let Some(table) = other.hash_table() {
            if self.is_same(Some(table)) {
                return Ok(true);
            }
            if self.len() != table.len() {
                return Ok(false);
            }
            return table.all_in(self);
        }
        let (unique_found, unfound) = self.uniques_and_unfound(other.items(), true)?;
        Ok(unique_found == self.len() && unfound == 0)
    }
}
