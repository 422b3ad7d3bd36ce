use alloc::sync::Arc;
use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::Hash;
use core::hash::Hasher;

use crate::duality::Cursor;
use crate::duality::HashCache;
use crate::duality::SharedTable;
use crate::error::CollectionError;
use crate::error::settle;
use crate::hash_table::HashTable;
use crate::hash_table::Inserted;
use crate::hash_table::Keys;
use crate::hash_table::OnExisting;
use crate::hash_table::SetOperand;
use crate::structural::SET_TAG;
use crate::structural::UnorderedHash;

/// Mutable staging area for an [`ImmutableHashSet`].
///
/// Mutating methods return `Result` because the builder guards every
/// mutation with the duality protocol: storage shared with a published value
/// is cloned first, and a builder whose last mutation was interrupted
/// reports [`CollectionError::ConcurrentOperation`] from then on.
///
/// `build()` is O(1): the new value shares the builder's storage.
///
/// # Examples
///
/// ```rust
/// use freeze_hash::HashSetBuilder;
///
/// let mut builder = HashSetBuilder::new();
/// builder.insert(1).unwrap();
/// builder.insert(2).unwrap();
/// let first = builder.build().unwrap();
///
/// builder.insert(3).unwrap();
/// let second = builder.build().unwrap();
///
/// assert_eq!(first.len(), 2);
/// assert_eq!(second.len(), 3);
/// assert!(!first.contains(&3));
/// ```
pub struct HashSetBuilder<T> {
    shared: SharedTable<T, ()>,
}

/// Immutable hash set with structural equality and hashing.
///
/// Cloning is O(1). Equality ignores enumeration order, and so does the
/// hash: any two sets holding the same elements are equal and hash alike,
/// whatever order they were built in.
pub struct ImmutableHashSet<T> {
    table: Arc<HashTable<T, ()>>,
    hash: HashCache,
}

/// Writes `[a, b, c]`.
pub(crate) fn debug_items<'a, T, I>(f: &mut core::fmt::Formatter<'_>, items: I) -> core::fmt::Result
where
    T: Debug + 'a,
    I: Iterator<Item = &'a T>,
{
    f.write_str("[")?;
    for (i, item) in items.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        item.fmt(f)?;
    }
    f.write_str("]")
}

impl<T> HashSetBuilder<T> {
    /// Creates an empty builder. No storage is allocated until the first
    /// insert.
    pub fn new() -> Self {
        Self {
            shared: SharedTable::new(HashTable::new()),
        }
    }

    /// Creates an empty builder with room for at least `capacity` elements.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use freeze_hash::HashSetBuilder;
    ///
    /// let builder: HashSetBuilder<u32> = HashSetBuilder::with_capacity(100).unwrap();
    /// assert!(builder.capacity() >= 100);
    /// ```
    pub fn with_capacity(capacity: usize) -> Result<Self, CollectionError> {
        Ok(Self {
            shared: SharedTable::new(HashTable::with_capacity(capacity)?),
        })
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.shared.read().len()
    }

    /// Returns `true` if the builder holds no elements.
    pub fn is_empty(&self) -> bool {
        self.shared.read().is_empty()
    }

    /// Returns the number of slots allocated.
    pub fn capacity(&self) -> usize {
        self.shared.read().capacity()
    }

    /// Returns an iterator over the elements.
    ///
    /// The order is unspecified and deliberately differs between separately
    /// built sets.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.shared.read().keys(),
        }
    }

    /// Starts a detached enumeration; see [`Cursor`].
    pub fn cursor(&self) -> Cursor {
        self.shared.cursor()
    }

    /// Returns the next element of a detached enumeration.
    ///
    /// Fails with [`CollectionError::ModifiedDuringEnumeration`] if the
    /// builder's contents changed since `cursor` was created. Calls that
    /// change nothing, such as inserting an element already present, keep
    /// the cursor valid.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use freeze_hash::CollectionError;
    /// use freeze_hash::HashSetBuilder;
    ///
    /// let mut builder: HashSetBuilder<i32> = [1, 2, 3].into_iter().collect();
    /// let mut cursor = builder.cursor();
    /// assert!(builder.advance(&mut cursor).unwrap().is_some());
    ///
    /// builder.insert(4).unwrap();
    /// assert_eq!(
    ///     builder.advance(&mut cursor),
    ///     Err(CollectionError::ModifiedDuringEnumeration)
    /// );
    /// ```
    pub fn advance(&self, cursor: &mut Cursor) -> Result<Option<&T>, CollectionError> {
        Ok(self.shared.advance(cursor)?.map(|entry| &entry.key))
    }

    /// Removes every element.
    pub fn clear(&mut self) -> Result<(), CollectionError> {
        self.shared.clear()
    }

    /// Publishes the current contents as an immutable set in O(1).
    ///
    /// The builder stays usable; its next mutation copies the storage if the
    /// returned set is still alive.
    pub fn build(&mut self) -> Result<ImmutableHashSet<T>, CollectionError> {
        Ok(ImmutableHashSet::from_table(self.shared.publish()?))
    }

    /// Returns detailed layout statistics of the backing table.
    #[cfg(feature = "stats")]
    pub fn debug_stats(&self) -> crate::hash_table::DebugStats {
        self.shared.read().debug_stats()
    }
}

impl<T> HashSetBuilder<T>
where
    T: Hash + Eq,
{
    /// Returns `true` if the builder contains `value`.
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        settle(self.shared.read().contains_key(value))
    }

    /// Returns the stored element equal to `value`.
    pub fn get<Q>(&self, value: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        settle(self.shared.read().find(value)).map(|entry| &entry.key)
    }

    /// Whether every element of `self` is in `other`.
    pub fn is_subset_of<'a, O: SetOperand<'a, T>>(&self, other: O) -> bool
    where
        T: 'a,
    {
        settle(self.shared.read().is_subset_of(other))
    }

    /// Whether `self` is a subset of `other` and `other` has more elements.
    pub fn is_proper_subset_of<'a, O: SetOperand<'a, T>>(&self, other: O) -> bool
    where
        T: 'a,
    {
        settle(self.shared.read().is_proper_subset_of(other))
    }

    /// Whether every element of `other` is in `self`.
    pub fn is_superset_of<'a, O: SetOperand<'a, T>>(&self, other: O) -> bool
    where
        T: 'a,
    {
        settle(self.shared.read().is_superset_of(other))
    }

    /// Whether `self` is a superset of `other` and has more elements.
    pub fn is_proper_superset_of<'a, O: SetOperand<'a, T>>(&self, other: O) -> bool
    where
        T: 'a,
    {
        settle(self.shared.read().is_proper_superset_of(other))
    }

    /// Whether `self` and `other` share at least one element.
    pub fn overlaps<'a, O: SetOperand<'a, T>>(&self, other: O) -> bool
    where
        T: 'a,
    {
        settle(self.shared.read().overlaps(other))
    }

    /// Whether `self` and `other` hold the same elements, ignoring
    /// duplicates in `other`.
    pub fn set_equals<'a, O: SetOperand<'a, T>>(&self, other: O) -> bool
    where
        T: 'a,
    {
        settle(self.shared.read().set_equals(other))
    }
}

impl<T> HashSetBuilder<T>
where
    T: Hash + Eq + Clone,
{
    /// Adds a value. Returns `false` if an equal value was already present,
    /// in which case the set is unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use freeze_hash::HashSetBuilder;
    ///
    /// let mut builder: HashSetBuilder<i32> = [1, 2, 3].into_iter().collect();
    /// assert_eq!(builder.insert(2), Ok(false));
    /// assert_eq!(builder.insert(4), Ok(true));
    /// assert_eq!(builder.len(), 4);
    /// ```
    pub fn insert(&mut self, value: T) -> Result<bool, CollectionError> {
        let inserted = self
            .shared
            .write(|table| table.insert(value, (), OnExisting::Keep))?;
        Ok(inserted == Inserted::Added)
    }

    /// Removes a value. Returns whether it was present.
    pub fn remove<Q>(&mut self, value: &Q) -> Result<bool, CollectionError>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        Ok(self.take(value)?.is_some())
    }

    /// Removes and returns the stored value equal to `value`.
    pub fn take<Q>(&mut self, value: &Q) -> Result<Option<T>, CollectionError>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.shared.write(|table| table.remove(value))?;
        Ok(removed.map(|(key, ())| key))
    }

    /// Grows the storage to hold at least `capacity` elements and returns the
    /// resulting capacity. Never shrinks.
    pub fn ensure_capacity(&mut self, capacity: usize) -> Result<usize, CollectionError> {
        self.shared.write(|table| table.ensure_capacity(capacity))
    }

    /// Compacts the storage to fit `capacity` elements.
    ///
    /// Fails with [`CollectionError::ArgumentOutOfRange`] when `capacity` is
    /// below the current length.
    pub fn trim_excess(&mut self, capacity: usize) -> Result<(), CollectionError> {
        self.shared.write(|table| table.trim_excess(capacity))
    }

    /// Compacts the storage to fit the current length.
    pub fn trim_to_len(&mut self) -> Result<(), CollectionError> {
        let len = self.len();
        self.trim_excess(len)
    }

    /// Adds every element of `other`.
    pub fn union_with<'a, O: SetOperand<'a, T>>(&mut self, other: O) -> Result<(), CollectionError>
    where
        T: 'a,
    {
        if self.shared.shares_storage_with(other.hash_table()) {
            return self.shared.check_usable();
        }
        self.shared.write(|table| table.union_with(other))
    }

    /// Keeps only the elements also in `other`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use freeze_hash::HashSetBuilder;
    ///
    /// let mut builder: HashSetBuilder<i32> = [1, 2, 3, 4].into_iter().collect();
    /// builder.intersect_with(&[2, 4, 6]).unwrap();
    /// assert!(builder.set_equals(&[2, 4]));
    /// ```
    pub fn intersect_with<'a, O: SetOperand<'a, T>>(&mut self, other: O) -> Result<(), CollectionError>
    where
        T: 'a,
    {
        if self.shared.shares_storage_with(other.hash_table()) {
            return self.shared.check_usable();
        }
        self.shared.write(|table| table.intersect_with(other))
    }

    /// Removes every element found in `other`.
    pub fn except_with<'a, O: SetOperand<'a, T>>(&mut self, other: O) -> Result<(), CollectionError>
    where
        T: 'a,
    {
        if self.shared.shares_storage_with(other.hash_table()) {
            return self.clear();
        }
        self.shared.write(|table| table.except_with(other))
    }

    /// Keeps the elements found in exactly one of `self` and `other`.
    pub fn symmetric_except_with<'a, O: SetOperand<'a, T>>(
        &mut self,
        other: O,
    ) -> Result<(), CollectionError>
    where
        T: 'a,
    {
        if self.shared.shares_storage_with(other.hash_table()) {
            return self.clear();
        }
        self.shared.write(|table| table.symmetric_except_with(other))
    }
}

impl<T> Default for HashSetBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for HashSetBuilder<T>
where
    T: Clone,
{
    /// Deep copy; the clone does not share storage with `self`.
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Debug for HashSetBuilder<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        debug_items(f, self.iter())
    }
}

impl<T> FromIterator<T> for HashSetBuilder<T>
where
    T: Hash + Eq,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            shared: SharedTable::new(collect_table(iter)),
        }
    }
}

impl<T> Extend<T> for HashSetBuilder<T>
where
    T: Hash + Eq + Clone,
{
    /// # Panics
    ///
    /// Panics if an insert fails, as the standard collections do on capacity
    /// overflow.
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            settle(self.insert(value));
        }
    }
}

fn collect_table<T, I>(iter: I) -> HashTable<T, ()>
where
    T: Hash + Eq,
    I: IntoIterator<Item = T>,
{
    let mut table = HashTable::new();
    for value in iter {
        settle(table.insert(value, (), OnExisting::Keep));
    }
    table
}

impl<T> ImmutableHashSet<T> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::from_table(Arc::new(HashTable::new()))
    }

    fn from_table(table: Arc<HashTable<T, ()>>) -> Self {
        Self {
            table,
            hash: HashCache::new(),
        }
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set holds no elements.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of slots allocated.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Returns an iterator over the elements in enumeration order.
    ///
    /// Enumerating the same set twice always yields the same order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.table.keys(),
        }
    }

    /// Creates a builder sharing this set's storage in O(1).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use freeze_hash::ImmutableHashSet;
    ///
    /// let set: ImmutableHashSet<i32> = [1, 2].into_iter().collect();
    /// let mut builder = set.to_builder();
    /// builder.insert(3).unwrap();
    ///
    /// assert_eq!(set.len(), 2);
    /// assert_eq!(builder.build().unwrap().len(), 3);
    /// ```
    pub fn to_builder(&self) -> HashSetBuilder<T> {
        HashSetBuilder {
            shared: SharedTable::from_published(Arc::clone(&self.table)),
        }
    }

    /// Returns detailed layout statistics of the backing table.
    #[cfg(feature = "stats")]
    pub fn debug_stats(&self) -> crate::hash_table::DebugStats {
        self.table.debug_stats()
    }
}

impl<T> ImmutableHashSet<T>
where
    T: Hash + Eq,
{
    /// Returns `true` if the set contains `value`.
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        settle(self.table.contains_key(value))
    }

    /// Returns the stored element equal to `value`.
    pub fn get<Q>(&self, value: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        settle(self.table.find(value)).map(|entry| &entry.key)
    }

    /// Order-independent content hash, computed on first use and cached.
    pub fn structural_hash(&self) -> u32 {
        self.hash.get_or_compute(|| {
            let mut acc = UnorderedHash::new();
            for (_, entry) in self.table.scan() {
                acc.add(entry.hash);
            }
            acc.finish(SET_TAG)
        })
    }

    /// Whether every element of `self` is in `other`.
    pub fn is_subset_of<'a, O: SetOperand<'a, T>>(&self, other: O) -> bool
    where
        T: 'a,
    {
        settle(self.table.is_subset_of(other))
    }

    /// Whether `self` is a subset of `other` and `other` has more elements.
    pub fn is_proper_subset_of<'a, O: SetOperand<'a, T>>(&self, other: O) -> bool
    where
        T: 'a,
    {
        settle(self.table.is_proper_subset_of(other))
    }

    /// Whether every element of `other` is in `self`.
    pub fn is_superset_of<'a, O: SetOperand<'a, T>>(&self, other: O) -> bool
    where
        T: 'a,
    {
        settle(self.table.is_superset_of(other))
    }

    /// Whether `self` is a superset of `other` and has more elements.
    pub fn is_proper_superset_of<'a, O: SetOperand<'a, T>>(&self, other: O) -> bool
    where
        T: 'a,
    {
        settle(self.table.is_proper_superset_of(other))
    }

    /// Whether `self` and `other` share at least one element.
    pub fn overlaps<'a, O: SetOperand<'a, T>>(&self, other: O) -> bool
    where
        T: 'a,
    {
        settle(self.table.overlaps(other))
    }

    /// Whether `self` and `other` hold the same elements.
    pub fn set_equals<'a, O: SetOperand<'a, T>>(&self, other: O) -> bool
    where
        T: 'a,
    {
        settle(self.table.set_equals(other))
    }
}

impl<T> ImmutableHashSet<T>
where
    T: Hash + Eq + Clone,
{
    /// Returns a set holding the elements of both `self` and `other`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use freeze_hash::ImmutableHashSet;
    ///
    /// let left: ImmutableHashSet<i32> = [1, 2].into_iter().collect();
    /// let right: ImmutableHashSet<i32> = [3, 4].into_iter().collect();
    ///
    /// let union = left.union(&right).unwrap();
    /// assert_eq!(union.len(), 4);
    /// assert!(left.intersect(&right).unwrap().is_empty());
    /// ```
    pub fn union<'a, O: SetOperand<'a, T>>(&self, other: O) -> Result<Self, CollectionError>
    where
        T: 'a,
    {
        let mut builder = self.to_builder();
        builder.union_with(other)?;
        builder.build()
    }

    /// Returns a set holding the elements in both `self` and `other`.
    pub fn intersect<'a, O: SetOperand<'a, T>>(&self, other: O) -> Result<Self, CollectionError>
    where
        T: 'a,
    {
        let mut builder = self.to_builder();
        builder.intersect_with(other)?;
        builder.build()
    }

    /// Returns a set holding the elements of `self` not in `other`.
    pub fn except<'a, O: SetOperand<'a, T>>(&self, other: O) -> Result<Self, CollectionError>
    where
        T: 'a,
    {
        let mut builder = self.to_builder();
        builder.except_with(other)?;
        builder.build()
    }

    /// Returns a set holding the elements in exactly one of `self` and
    /// `other`.
    pub fn symmetric_except<'a, O: SetOperand<'a, T>>(
        &self,
        other: O,
    ) -> Result<Self, CollectionError>
    where
        T: 'a,
    {
        let mut builder = self.to_builder();
        builder.symmetric_except_with(other)?;
        builder.build()
    }
}

impl<T> Default for ImmutableHashSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ImmutableHashSet<T> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            hash: self.hash.clone(),
        }
    }
}

impl<T> PartialEq for ImmutableHashSet<T>
where
    T: Hash + Eq,
{
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.table, &other.table) {
            return true;
        }
        if self.len() != other.len() {
            return false;
        }
        if let (Some(left), Some(right)) = (self.hash.get(), other.hash.get()) {
            if left != right {
                return false;
            }
        }
        self.set_equals(other)
    }
}

impl<T> Eq for ImmutableHashSet<T> where T: Hash + Eq {}

impl<T> Hash for ImmutableHashSet<T>
where
    T: Hash + Eq,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.structural_hash());
    }
}

impl<T> Debug for ImmutableHashSet<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        debug_items(f, self.iter())
    }
}

impl<T> FromIterator<T> for ImmutableHashSet<T>
where
    T: Hash + Eq,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_table(Arc::new(collect_table(iter)))
    }
}

impl<'a, T> IntoIterator for &'a ImmutableHashSet<T> {
    type IntoIter = Iter<'a, T>;
    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a HashSetBuilder<T> {
    type IntoIter = Iter<'a, T>;
    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T: 'a> SetOperand<'a, T> for &'a ImmutableHashSet<T> {
    type Items = Iter<'a, T>;

    fn hash_table(&self) -> Option<&'a HashTable<T, ()>> {
        let set: &'a ImmutableHashSet<T> = *self;
        Some(&*set.table)
    }

    fn items(self) -> Self::Items {
        self.iter()
    }
}

impl<'a, T: 'a> SetOperand<'a, T> for &'a HashSetBuilder<T> {
    type Items = Iter<'a, T>;

    fn hash_table(&self) -> Option<&'a HashTable<T, ()>> {
        let builder: &'a HashSetBuilder<T> = *self;
        Some(builder.shared.read())
    }

    fn items(self) -> Self::Items {
        self.iter()
    }
}

/// An iterator over the elements of a hash set.
pub struct Iter<'a, T> {
    inner: Keys<'a, T, ()>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
