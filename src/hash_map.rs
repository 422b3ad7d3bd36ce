use alloc::sync::Arc;
use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::Hash;
use core::hash::Hasher;
use core::ops::Index;

use crate::duality::Cursor;
use crate::duality::HashCache;
use crate::duality::SharedTable;
use crate::error::CollectionError;
use crate::error::settle;
use crate::hash_table;
use crate::hash_table::HashTable;
use crate::hash_table::Inserted;
use crate::hash_table::OnExisting;
use crate::structural::MAP_TAG;
use crate::structural::UnorderedHash;
use crate::structural::entry_hash;

/// Mutable staging area for an [`ImmutableHashMap`].
///
/// # Examples
///
/// ```rust
/// use freeze_hash::HashMapBuilder;
///
/// let mut builder = HashMapBuilder::new();
/// builder.insert("a", 1).unwrap();
/// builder.insert("b", 2).unwrap();
///
/// let map = builder.build().unwrap();
/// assert_eq!(map.get("a"), Some(&1));
/// assert_eq!(map["b"], 2);
/// ```
pub struct HashMapBuilder<K, V> {
    shared: SharedTable<K, V>,
}

/// Immutable hash map with structural equality and hashing.
///
/// Two maps are equal when they hold the same keys mapped to equal values,
/// regardless of the order either was built in.
pub struct ImmutableHashMap<K, V> {
    table: Arc<HashTable<K, V>>,
    hash: HashCache,
}

fn debug_entries<K: Debug, V: Debug>(
    f: &mut core::fmt::Formatter<'_>,
    entries: Iter<'_, K, V>,
) -> core::fmt::Result {
    f.write_str("[")?;
    for (i, (key, value)) in entries.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{key:?}: {value:?}")?;
    }
    f.write_str("]")
}

fn collect_table<K, V, I>(iter: I) -> HashTable<K, V>
where
    K: Hash + Eq,
    I: IntoIterator<Item = (K, V)>,
{
    let mut table = HashTable::new();
    for (key, value) in iter {
        settle(table.insert(key, value, OnExisting::Replace));
    }
    table
}

impl<K, V> HashMapBuilder<K, V> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            shared: SharedTable::new(HashTable::new()),
        }
    }

    /// Creates an empty builder with room for at least `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Result<Self, CollectionError> {
        Ok(Self {
            shared: SharedTable::new(HashTable::with_capacity(capacity)?),
        })
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.shared.read().len()
    }

    /// Returns `true` if the builder holds no entries.
    pub fn is_empty(&self) -> bool {
        self.shared.read().is_empty()
    }

    /// Returns the number of slots allocated.
    pub fn capacity(&self) -> usize {
        self.shared.read().capacity()
    }

    /// Returns an iterator over `(key, value)` pairs.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.shared.read().iter(),
        }
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Returns `true` if some key maps to `value`. Linear in the length.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.values().any(|v| v == value)
    }

    /// Starts a detached enumeration; see [`Cursor`].
    pub fn cursor(&self) -> Cursor {
        self.shared.cursor()
    }

    /// Returns the next entry of a detached enumeration, or
    /// [`CollectionError::ModifiedDuringEnumeration`] if entries were added,
    /// removed or replaced, or the storage was resized, since `cursor` was
    /// created.
    pub fn advance(&self, cursor: &mut Cursor) -> Result<Option<(&K, &V)>, CollectionError> {
        Ok(self
            .shared
            .advance(cursor)?
            .map(|entry| (&entry.key, &entry.value)))
    }

    /// Removes every entry.
    pub fn clear(&mut self) -> Result<(), CollectionError> {
        self.shared.clear()
    }

    /// Publishes the current contents as an immutable map in O(1).
    pub fn build(&mut self) -> Result<ImmutableHashMap<K, V>, CollectionError> {
        Ok(ImmutableHashMap::from_table(self.shared.publish()?))
    }

    /// Returns detailed layout statistics of the backing table.
    #[cfg(feature = "stats")]
    pub fn debug_stats(&self) -> crate::hash_table::DebugStats {
        self.shared.read().debug_stats()
    }
}

impl<K, V> HashMapBuilder<K, V>
where
    K: Hash + Eq,
{
    /// Returns `true` if the builder contains `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        settle(self.shared.read().contains_key(key))
    }

    /// Returns the value mapped to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, v)| v)
    }

    /// Returns the stored key and value for `key`.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        settle(self.shared.read().find(key)).map(|entry| (&entry.key, &entry.value))
    }

    /// Returns the value mapped to `key`, or
    /// [`CollectionError::KeyNotFound`].
    pub fn try_get<Q>(&self, key: &Q) -> Result<&V, CollectionError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).ok_or(CollectionError::KeyNotFound)
    }
}

impl<K, V> HashMapBuilder<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Maps `key` to `value`, returning the value it replaced.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use freeze_hash::HashMapBuilder;
    ///
    /// let mut builder = HashMapBuilder::new();
    /// assert_eq!(builder.insert(37, "a"), Ok(None));
    /// assert_eq!(builder.insert(37, "b"), Ok(Some("a")));
    /// assert_eq!(builder[&37], "b");
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, CollectionError> {
        let inserted = self
            .shared
            .write(|table| table.insert(key, value, OnExisting::Replace))?;
        Ok(match inserted {
            Inserted::Replaced(old) => Some(old),
            Inserted::Added | Inserted::Kept => None,
        })
    }

    /// Adds a new entry, failing with [`CollectionError::DuplicateKey`] if
    /// `key` is already present. The builder is unchanged on failure.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use freeze_hash::CollectionError;
    /// use freeze_hash::HashMapBuilder;
    ///
    /// let mut builder = HashMapBuilder::new();
    /// builder.try_add("k", 1).unwrap();
    /// assert_eq!(builder.try_add("k", 2), Err(CollectionError::DuplicateKey));
    /// assert_eq!(builder["k"], 1);
    /// ```
    pub fn try_add(&mut self, key: K, value: V) -> Result<(), CollectionError> {
        self.shared
            .write(|table| table.insert(key, value, OnExisting::Fail))
            .map(drop)
    }

    /// Returns a mutable reference to the value mapped to `key`.
    ///
    /// Updating a value in place is not a structural change, so live
    /// cursors stay valid. Storage shared with a published map is copied
    /// first.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Result<Option<&mut V>, CollectionError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let table = self.shared.unshare()?;
        let Some(found) = table.locate(key)? else {
            return Ok(None);
        };
        Ok(table.entry_mut(found).map(|entry| &mut entry.value))
    }

    /// Removes `key`, returning the value it mapped to.
    pub fn remove<Q>(&mut self, key: &Q) -> Result<Option<V>, CollectionError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        Ok(self.remove_entry(key)?.map(|(_, v)| v))
    }

    /// Removes `key`, returning the stored key and value.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Result<Option<(K, V)>, CollectionError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.write(|table| table.remove(key))
    }

    /// Grows the storage to hold at least `capacity` entries and returns the
    /// resulting capacity.
    pub fn ensure_capacity(&mut self, capacity: usize) -> Result<usize, CollectionError> {
        self.shared.write(|table| table.ensure_capacity(capacity))
    }

    /// Compacts the storage to fit `capacity` entries; see
    /// [`HashSetBuilder::trim_excess`](crate::HashSetBuilder::trim_excess).
    pub fn trim_excess(&mut self, capacity: usize) -> Result<(), CollectionError> {
        self.shared.write(|table| table.trim_excess(capacity))
    }

    /// Compacts the storage to fit the current length.
    pub fn trim_to_len(&mut self) -> Result<(), CollectionError> {
        let len = self.len();
        self.trim_excess(len)
    }
}

impl<K, V> Default for HashMapBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for HashMapBuilder<K, V>
where
    K: Clone,
    V: Clone,
{
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<K, V> Debug for HashMapBuilder<K, V>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        debug_entries(f, self.iter())
    }
}

impl<K, V, Q> Index<&Q> for HashMapBuilder<K, V>
where
    K: Hash + Eq + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if the key is not present.
    #[track_caller]
    fn index(&self, key: &Q) -> &V {
        settle(self.try_get(key))
    }
}

impl<K, V> FromIterator<(K, V)> for HashMapBuilder<K, V>
where
    K: Hash + Eq,
{
    /// Later pairs overwrite earlier pairs with the same key.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            shared: SharedTable::new(collect_table(iter)),
        }
    }
}

impl<K, V> Extend<(K, V)> for HashMapBuilder<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            settle(self.insert(key, value));
        }
    }
}

impl<'a, K, V> IntoIterator for &'a HashMapBuilder<K, V> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V> ImmutableHashMap<K, V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::from_table(Arc::new(HashTable::new()))
    }

    fn from_table(table: Arc<HashTable<K, V>>) -> Self {
        Self {
            table,
            hash: HashCache::new(),
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of slots allocated.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Returns an iterator over `(key, value)` pairs.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Returns `true` if some key maps to `value`.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.values().any(|v| v == value)
    }

    /// Creates a builder sharing this map's storage in O(1).
    pub fn to_builder(&self) -> HashMapBuilder<K, V> {
        HashMapBuilder {
            shared: SharedTable::from_published(Arc::clone(&self.table)),
        }
    }

    /// Returns detailed layout statistics of the backing table.
    #[cfg(feature = "stats")]
    pub fn debug_stats(&self) -> crate::hash_table::DebugStats {
        self.table.debug_stats()
    }
}

impl<K, V> ImmutableHashMap<K, V>
where
    K: Hash + Eq,
{
    /// Returns `true` if the map contains `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        settle(self.table.contains_key(key))
    }

    /// Returns the value mapped to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, v)| v)
    }

    /// Returns the stored key and value for `key`.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        settle(self.table.find(key)).map(|entry| (&entry.key, &entry.value))
    }

    /// Returns the value mapped to `key`, or
    /// [`CollectionError::KeyNotFound`].
    pub fn try_get<Q>(&self, key: &Q) -> Result<&V, CollectionError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).ok_or(CollectionError::KeyNotFound)
    }

    /// Order-independent content hash, computed on first use and cached.
    ///
    /// Each entry contributes its key hash combined with the hash of its
    /// value, so maps that differ only in one value hash differently.
    pub fn structural_hash(&self) -> u32
    where
        V: Hash,
    {
        self.hash.get_or_compute(|| {
            let mut acc = UnorderedHash::new();
            for (_, entry) in self.table.scan() {
                acc.add(entry_hash(entry.hash, &entry.value));
            }
            acc.finish(MAP_TAG)
        })
    }
}

impl<K, V> Default for ImmutableHashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for ImmutableHashMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            hash: self.hash.clone(),
        }
    }
}

impl<K, V> PartialEq for ImmutableHashMap<K, V>
where
    K: Hash + Eq,
    V: PartialEq,
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
        self.iter()
            .all(|(key, value)| other.get(key).is_some_and(|v| v == value))
    }
}

impl<K, V> Eq for ImmutableHashMap<K, V>
where
    K: Hash + Eq,
    V: Eq,
{
}

impl<K, V> Hash for ImmutableHashMap<K, V>
where
    K: Hash + Eq,
    V: Hash,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.structural_hash());
    }
}

impl<K, V> Debug for ImmutableHashMap<K, V>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        debug_entries(f, self.iter())
    }
}

impl<K, V, Q> Index<&Q> for ImmutableHashMap<K, V>
where
    K: Hash + Eq + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if the key is not present.
    #[track_caller]
    fn index(&self, key: &Q) -> &V {
        settle(self.try_get(key))
    }
}

impl<K, V> FromIterator<(K, V)> for ImmutableHashMap<K, V>
where
    K: Hash + Eq,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_table(Arc::new(collect_table(iter)))
    }
}

impl<'a, K, V> IntoIterator for &'a ImmutableHashMap<K, V> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over the entries of a hash map.
pub struct Iter<'a, K, V> {
    inner: hash_table::Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// An iterator over the keys of a hash map.
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

/// An iterator over the values of a hash map.
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}
