//! Ownership protocol between builders and the immutable values they publish.
//!
//! A builder owns its table through an `Arc`. Publishing hands a clone of
//! that `Arc` to the new value and moves the builder to
//! [`BuilderState::CopyOnWrite`]; the next mutation clones the table if a
//! value still holds it. The value side keeps no state besides a lazily
//! computed content hash ([`HashCache`]).
//!
//! State machine on the builder:
//!
//! ```text
//! Mutable(v)      --mutate-->  Mutable(v + 1)
//! Mutable(v)      --build--->  CopyOnWrite(v)
//! CopyOnWrite(v)  --mutate-->  clone if shared, Mutable(v + 1)
//! CopyOnWrite(v)  --build--->  CopyOnWrite(v)
//! any             --enter--->  Exclusive --leave--> Mutable
//! ```
//!
//! A mutation that leaves the table's revision unchanged keeps `v`.
//!
//! `&mut self` already rules out overlapping calls, so a builder is only
//! observed in `Exclusive` after an operation unwound out of user `Hash` or
//! `Eq` code mid-mutation. Such a builder stays poisoned.

use alloc::sync::Arc;
use core::sync::atomic::AtomicBool;
use core::sync::atomic::AtomicU32;
use core::sync::atomic::Ordering;

use crate::entry_store::Occupied;
use crate::error::CollectionError;
use crate::error::settle;
use crate::hash_table::HashTable;

/// Highest version a builder reaches before its epoch advances.
pub(crate) const LAST_MUTABLE_VERSION: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BuilderState {
    Mutable { version: u32 },
    CopyOnWrite { version: u32 },
    Exclusive,
}

/// Identifies one structural revision of a builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Stamp {
    epoch: u32,
    version: u32,
}

/// Token carried from [`Duality::enter`] to [`Duality::leave`].
#[derive(Debug)]
#[must_use]
pub(crate) struct Pending {
    version: u32,
}

#[derive(Clone, Debug)]
pub(crate) struct Duality {
    state: BuilderState,
    epoch: u32,
}

impl Duality {
    pub(crate) const fn mutable() -> Self {
        Self {
            state: BuilderState::Mutable { version: 0 },
            epoch: 0,
        }
    }

    pub(crate) const fn copy_on_write() -> Self {
        Self {
            state: BuilderState::CopyOnWrite { version: 0 },
            epoch: 0,
        }
    }

    #[cfg(test)]
    pub(crate) const fn at_version(version: u32) -> Self {
        Self {
            state: BuilderState::Mutable { version },
            epoch: 0,
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> BuilderState {
        self.state
    }

    pub(crate) fn stamp(&self) -> Result<Stamp, CollectionError> {
        match self.state {
            BuilderState::Mutable { version } | BuilderState::CopyOnWrite { version } => Ok(Stamp {
                epoch: self.epoch,
                version,
            }),
            BuilderState::Exclusive => Err(CollectionError::ConcurrentOperation),
        }
    }

    /// Locks the builder for one mutating operation.
    pub(crate) fn enter(&mut self) -> Result<Pending, CollectionError> {
        let version = match self.state {
            BuilderState::Mutable { version } | BuilderState::CopyOnWrite { version } => version,
            BuilderState::Exclusive => return Err(CollectionError::ConcurrentOperation),
        };
        self.state = BuilderState::Exclusive;
        Ok(Pending { version })
    }

    /// Unlocks the builder; the storage is exclusively owned again.
    pub(crate) fn leave(&mut self, pending: Pending, modified: bool) {
        debug_assert_eq!(self.state, BuilderState::Exclusive);
        let version = if !modified {
            pending.version
        } else if pending.version >= LAST_MUTABLE_VERSION {
            // Restart the count under a new epoch rather than wrap onto
            // stamps that cursors may still hold.
            self.epoch = self.epoch.wrapping_add(1);
            0
        } else {
            pending.version + 1
        };
        self.state = BuilderState::Mutable { version };
    }

    /// Marks the storage as shared with a freshly published value.
    pub(crate) fn publish(&mut self) -> Result<(), CollectionError> {
        match self.state {
            BuilderState::Mutable { version } | BuilderState::CopyOnWrite { version } => {
                self.state = BuilderState::CopyOnWrite { version };
                Ok(())
            }
            BuilderState::Exclusive => Err(CollectionError::ConcurrentOperation),
        }
    }
}

/// Lazily computed structural hash of an immutable value.
///
/// The hash is deterministic, so threads racing to fill the cache store the
/// same value. The hash is written before `computed` is released, and read
/// only after `computed` is acquired.
#[derive(Debug)]
pub(crate) struct HashCache {
    hash: AtomicU32,
    computed: AtomicBool,
}

impl HashCache {
    pub(crate) const fn new() -> Self {
        Self {
            hash: AtomicU32::new(0),
            computed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub(crate) fn get(&self) -> Option<u32> {
        self.computed
            .load(Ordering::Acquire)
            .then(|| self.hash.load(Ordering::Relaxed))
    }

    pub(crate) fn get_or_compute(&self, compute: impl FnOnce() -> u32) -> u32 {
        if let Some(hash) = self.get() {
            return hash;
        }
        let hash = compute();
        self.hash.store(hash, Ordering::Relaxed);
        self.computed.store(true, Ordering::Release);
        hash
    }
}

impl Clone for HashCache {
    fn clone(&self) -> Self {
        let cache = Self::new();
        if let Some(hash) = self.get() {
            cache.hash.store(hash, Ordering::Relaxed);
            cache.computed.store(true, Ordering::Release);
        }
        cache
    }
}

/// Position of a detached enumeration over a builder.
///
/// Unlike a borrowing iterator, a cursor does not hold the builder, so the
/// builder can be mutated between steps; the next
/// [`advance`](crate::HashSetBuilder::advance) then fails with
/// [`CollectionError::ModifiedDuringEnumeration`].
#[derive(Clone, Debug)]
pub struct Cursor {
    start: usize,
    step: usize,
    stamp: Stamp,
}

/// A builder's table together with its duality state.
#[derive(Debug)]
pub(crate) struct SharedTable<K, V> {
    table: Arc<HashTable<K, V>>,
    duality: Duality,
}

impl<K, V> SharedTable<K, V> {
    pub(crate) fn new(table: HashTable<K, V>) -> Self {
        Self {
            table: Arc::new(table),
            duality: Duality::mutable(),
        }
    }

    /// Adopts the storage of a published value without copying it.
    pub(crate) fn from_published(table: Arc<HashTable<K, V>>) -> Self {
        Self {
            table,
            duality: Duality::copy_on_write(),
        }
    }

    /// Read access to the table.
    ///
    /// # Panics
    ///
    /// Panics if a previous mutation was interrupted.
    #[track_caller]
    #[inline]
    pub(crate) fn read(&self) -> &HashTable<K, V> {
        if self.duality.state() == BuilderState::Exclusive {
            panic!("{}", CollectionError::ConcurrentOperation);
        }
        &self.table
    }

    /// Whether `other` is this builder's storage, shared or not.
    #[inline]
    pub(crate) fn shares_storage_with(&self, other: Option<&HashTable<K, V>>) -> bool {
        other.is_some_and(|other| core::ptr::eq(Arc::as_ptr(&self.table), other))
    }

    pub(crate) fn check_usable(&self) -> Result<(), CollectionError> {
        self.duality.stamp().map(drop)
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> BuilderState {
        self.duality.state()
    }

    #[cfg(test)]
    pub(crate) fn with_duality(mut self, duality: Duality) -> Self {
        self.duality = duality;
        self
    }

    /// Shares the storage with a new value; no entries are copied.
    pub(crate) fn publish(&mut self) -> Result<Arc<HashTable<K, V>>, CollectionError> {
        self.duality.publish()?;
        Ok(Arc::clone(&self.table))
    }

    /// Drops every entry. Shared storage is left to the values holding it and
    /// replaced by a fresh table instead of being cloned. Clearing a builder
    /// with no initialized slots changes nothing.
    pub(crate) fn clear(&mut self) -> Result<(), CollectionError> {
        if self.table.end() == 0 {
            return self.check_usable();
        }
        let pending = self.duality.enter()?;
        match Arc::get_mut(&mut self.table) {
            Some(table) => table.clear(),
            None => self.table = Arc::new(HashTable::new()),
        }
        self.duality.leave(pending, true);
        Ok(())
    }

    #[track_caller]
    pub(crate) fn cursor(&self) -> Cursor {
        Cursor {
            start: self.read().start_offset(),
            step: 0,
            stamp: settle(self.duality.stamp()),
        }
    }

    /// Moves `cursor` to the next occupied slot.
    pub(crate) fn advance(
        &self,
        cursor: &mut Cursor,
    ) -> Result<Option<&Occupied<K, V>>, CollectionError> {
        if self.duality.stamp()? != cursor.stamp {
            return Err(CollectionError::ModifiedDuringEnumeration);
        }
        let end = self.table.end();
        while cursor.step < end {
            let index = (cursor.start + cursor.step) % end;
            cursor.step += 1;
            if let Some(entry) = self.table.slot(index) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}

impl<K, V> SharedTable<K, V>
where
    K: Clone,
    V: Clone,
{
    /// Runs one mutating operation under exclusive mode.
    ///
    /// Storage still shared with a published value is cloned before `op`
    /// sees it, so a failing `op` never touches a value. The version moves
    /// only if the table's revision did, whether `op` succeeded or failed
    /// halfway. A corrupted chain leaves the builder poisoned.
    pub(crate) fn write<R>(
        &mut self,
        op: impl FnOnce(&mut HashTable<K, V>) -> Result<R, CollectionError>,
    ) -> Result<R, CollectionError> {
        let pending = self.duality.enter()?;
        let table = Arc::make_mut(&mut self.table);
        let revision = table.revision();
        let result = op(&mut *table);
        let modified = table.revision() != revision;
        if !matches!(result, Err(CollectionError::ConcurrentOperation)) {
            self.duality.leave(pending, modified);
        }
        result
    }

    /// Exclusive access for in-place value updates, which do not count as
    /// structural changes.
    pub(crate) fn unshare(&mut self) -> Result<&mut HashTable<K, V>, CollectionError> {
        let pending = self.duality.enter()?;
        self.duality.leave(pending, false);
        Ok(Arc::make_mut(&mut self.table))
    }
}

impl<K, V> Clone for SharedTable<K, V>
where
    K: Clone,
    V: Clone,
{
    fn clone(&self) -> Self {
        Self::new(self.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash_table::Inserted;
    use crate::hash_table::OnExisting;

    fn table_of(items: &[u32]) -> SharedTable<u32, ()> {
        let mut shared = SharedTable::new(HashTable::new());
        for &item in items {
            shared
                .write(|t| t.insert(item, (), OnExisting::Keep))
                .unwrap();
        }
        shared
    }

    #[test]
    fn mutation_bumps_the_version() {
        let mut duality = Duality::mutable();
        let before = duality.stamp().unwrap();
        let pending = duality.enter().unwrap();
        assert_eq!(duality.state(), BuilderState::Exclusive);
        duality.leave(pending, true);
        assert_eq!(duality.state(), BuilderState::Mutable { version: 1 });
        assert_ne!(duality.stamp().unwrap(), before);
    }

    #[test]
    fn unmodified_leave_keeps_the_version() {
        let mut duality = Duality::at_version(5);
        let pending = duality.enter().unwrap();
        duality.leave(pending, false);
        assert_eq!(duality.state(), BuilderState::Mutable { version: 5 });
    }

    #[test]
    fn exclusive_state_rejects_entry() {
        let mut duality = Duality::mutable();
        let _pending = duality.enter().unwrap();
        assert_eq!(duality.enter().unwrap_err(), CollectionError::ConcurrentOperation);
        assert_eq!(duality.publish(), Err(CollectionError::ConcurrentOperation));
        assert_eq!(duality.stamp(), Err(CollectionError::ConcurrentOperation));
    }

    #[test]
    fn publish_keeps_the_version() {
        let mut duality = Duality::at_version(9);
        duality.publish().unwrap();
        assert_eq!(duality.state(), BuilderState::CopyOnWrite { version: 9 });
        duality.publish().unwrap();
        let pending = duality.enter().unwrap();
        duality.leave(pending, true);
        assert_eq!(duality.state(), BuilderState::Mutable { version: 10 });
    }

    #[test]
    fn version_ceiling_moves_to_a_new_epoch() {
        let mut duality = Duality::at_version(LAST_MUTABLE_VERSION);
        let before = duality.stamp().unwrap();
        let pending = duality.enter().unwrap();
        duality.leave(pending, true);
        assert_eq!(duality.state(), BuilderState::Mutable { version: 0 });
        let after = duality.stamp().unwrap();
        assert_ne!(after, before);
        assert_ne!(after, Duality::mutable().stamp().unwrap());
    }

    #[test]
    fn hash_cache_computes_once() {
        let cache = HashCache::new();
        assert_eq!(cache.get(), None);
        let mut calls = 0;
        assert_eq!(
            cache.get_or_compute(|| {
                calls += 1;
                0
            }),
            0
        );
        assert_eq!(cache.get(), Some(0));
        assert_eq!(cache.get_or_compute(|| unreachable!()), 0);
        assert_eq!(calls, 1);
        assert_eq!(cache.clone().get(), Some(0));
    }

    #[test]
    fn publish_shares_storage() {
        let mut shared = table_of(&[1, 2, 3]);
        let before = Arc::as_ptr(&shared.table);
        let published = shared.publish().unwrap();
        assert_eq!(Arc::as_ptr(&published), before);
        assert_eq!(shared.state(), BuilderState::CopyOnWrite { version: 3 });
    }

    #[test]
    fn write_after_publish_clones() {
        let mut shared = table_of(&[1, 2, 3]);
        let published = shared.publish().unwrap();
        shared
            .write(|t| t.insert(4, (), OnExisting::Keep))
            .unwrap();
        assert!(!Arc::ptr_eq(&published, &shared.table));
        assert_eq!(published.len(), 3);
        assert_eq!(shared.read().len(), 4);
        assert_eq!(shared.state(), BuilderState::Mutable { version: 4 });
    }

    #[test]
    fn write_after_dropped_value_reuses_storage() {
        let mut shared = table_of(&[1]);
        let before = Arc::as_ptr(&shared.table);
        drop(shared.publish().unwrap());
        shared
            .write(|t| t.insert(2, (), OnExisting::Keep))
            .unwrap();
        assert_eq!(Arc::as_ptr(&shared.table), before);
    }

    #[test]
    fn clear_of_shared_storage_swaps_tables() {
        let mut shared = table_of(&[1, 2]);
        let published = shared.publish().unwrap();
        shared.clear().unwrap();
        assert_eq!(published.len(), 2);
        assert_eq!(shared.read().len(), 0);
    }

    #[test]
    fn cursor_detects_mutation() {
        let mut shared = table_of(&[1, 2, 3]);
        let mut cursor = shared.cursor();
        assert!(shared.advance(&mut cursor).unwrap().is_some());
        shared
            .write(|t| t.insert(9, (), OnExisting::Keep))
            .unwrap();
        assert_eq!(
            shared.advance(&mut cursor).unwrap_err(),
            CollectionError::ModifiedDuringEnumeration
        );
    }

    #[test]
    fn cursor_taken_before_publish_sees_later_writes() {
        let mut shared = table_of(&[1, 2, 3]);
        let mut cursor = shared.cursor();
        let _value = shared.publish().unwrap();
        assert!(shared.advance(&mut cursor).is_ok());
        shared
            .write(|t| t.insert(9, (), OnExisting::Keep))
            .unwrap();
        assert_eq!(
            shared.advance(&mut cursor).unwrap_err(),
            CollectionError::ModifiedDuringEnumeration
        );
    }

    #[test]
    fn cursor_visits_everything() {
        let shared = table_of(&[4, 5, 6, 7]);
        let mut cursor = shared.cursor();
        let mut count = 0;
        while shared.advance(&mut cursor).unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 4);
        assert!(shared.advance(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn corrupted_chain_poisons_the_builder() {
        let mut shared = table_of(&[1, 2, 3]);
        let err = shared.write(|_| Err::<(), _>(CollectionError::ConcurrentOperation));
        assert_eq!(err, Err(CollectionError::ConcurrentOperation));
        assert_eq!(shared.state(), BuilderState::Exclusive);
        assert_eq!(
            shared.write(|t| t.insert(4, (), OnExisting::Keep)).unwrap_err(),
            CollectionError::ConcurrentOperation
        );
    }

    #[test]
    fn failed_write_does_not_bump_the_version() {
        let mut shared = table_of(&[1]).with_duality(Duality::at_version(1));
        let err = shared.write(|_| Err::<(), _>(CollectionError::DuplicateKey));
        assert_eq!(err, Err(CollectionError::DuplicateKey));
        assert_eq!(shared.state(), BuilderState::Mutable { version: 1 });
    }

    #[test]
    fn partially_applied_write_bumps_the_version() {
        let mut shared = table_of(&[1]).with_duality(Duality::at_version(1));
        let mut cursor = shared.cursor();
        let err = shared.write(|t| {
            t.insert(2, (), OnExisting::Keep)?;
            Err::<(), _>(CollectionError::CapacityOverflow)
        });
        assert_eq!(err, Err(CollectionError::CapacityOverflow));
        assert_eq!(shared.state(), BuilderState::Mutable { version: 2 });
        assert_eq!(
            shared.advance(&mut cursor).unwrap_err(),
            CollectionError::ModifiedDuringEnumeration
        );
    }

    #[test]
    fn write_that_changes_nothing_keeps_the_version() {
        let mut shared = table_of(&[1, 2]);
        let published = shared.publish().unwrap();
        let inserted = shared.write(|t| t.insert(1, (), OnExisting::Keep)).unwrap();
        assert_eq!(inserted, Inserted::Kept);
        assert_eq!(shared.state(), BuilderState::Mutable { version: 2 });
        assert_eq!(published.len(), 2);
    }

    #[test]
    fn clear_of_empty_storage_keeps_the_state() {
        let mut shared = table_of(&[]);
        let _published = shared.publish().unwrap();
        shared.clear().unwrap();
        assert_eq!(shared.state(), BuilderState::CopyOnWrite { version: 0 });
    }

    #[test]
    fn hash_cache_clone_before_compute_stays_empty() {
        let cache = HashCache::new();
        let copy = cache.clone();
        assert_eq!(cache.get_or_compute(|| 7), 7);
        assert_eq!(copy.get(), None);
        assert_eq!(copy.get_or_compute(|| 7), 7);
    }
}
