//! Immutable sequence and its single-use builder.
//!
//! Lists skip the copy-on-write protocol of the hash containers: a
//! [`ListBuilder`] hands its buffer to the one [`ImmutableList`] it builds
//! and refuses any further use.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::hash::Hash;
use core::hash::Hasher;
use core::ops::Index;

use crate::duality::HashCache;
use crate::error::CollectionError;
use crate::hash_set::debug_items;
use crate::hash_table::SetOperand;
use crate::structural::LIST_TAG;
use crate::structural::ordered_hash;

/// Growable buffer that is frozen into an [`ImmutableList`] exactly once.
///
/// # Examples
///
/// ```rust
/// use freeze_hash::CollectionError;
/// use freeze_hash::ListBuilder;
///
/// let mut builder = ListBuilder::new();
/// builder.push(1).unwrap();
/// builder.push(3).unwrap();
/// builder.insert(1, 2).unwrap();
///
/// let list = builder.build().unwrap();
/// assert_eq!(list.as_slice(), &[1, 2, 3]);
/// assert_eq!(builder.push(4), Err(CollectionError::AlreadyBuilt));
/// ```
pub struct ListBuilder<T> {
    items: Vec<T>,
    built: bool,
}

/// Immutable sequence with order-sensitive equality and hashing.
pub struct ImmutableList<T> {
    items: Arc<Vec<T>>,
    hash: HashCache,
}

fn reserve_error(_: alloc::collections::TryReserveError) -> CollectionError {
    CollectionError::CapacityOverflow
}

impl<T> ListBuilder<T> {
    /// Creates an empty builder.
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            built: false,
        }
    }

    /// Creates an empty builder with room for at least `capacity` items.
    pub fn with_capacity(capacity: usize) -> Result<Self, CollectionError> {
        let mut builder = Self::new();
        builder.ensure_capacity(capacity)?;
        Ok(builder)
    }

    fn check_unbuilt(&self) -> Result<(), CollectionError> {
        if self.built {
            Err(CollectionError::AlreadyBuilt)
        } else {
            Ok(())
        }
    }

    /// Returns the number of items. A builder that has been built is empty.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the builder holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the number of items the buffer holds without reallocating.
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Returns the item at `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Returns an iterator over the items in order.
    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Appends an item.
    pub fn push(&mut self, item: T) -> Result<(), CollectionError> {
        self.check_unbuilt()?;
        self.items.try_reserve(1).map_err(reserve_error)?;
        self.items.push(item);
        Ok(())
    }

    /// Inserts an item at `index`, shifting later items right.
    pub fn insert(&mut self, index: usize, item: T) -> Result<(), CollectionError> {
        self.check_unbuilt()?;
        if index > self.items.len() {
            return Err(CollectionError::ArgumentOutOfRange {
                name: "index",
                value: index,
                limit: self.items.len(),
            });
        }
        self.items.try_reserve(1).map_err(reserve_error)?;
        self.items.insert(index, item);
        Ok(())
    }

    /// Removes and returns the item at `index`, shifting later items left.
    pub fn remove(&mut self, index: usize) -> Result<T, CollectionError> {
        self.check_unbuilt()?;
        if index >= self.items.len() {
            return Err(CollectionError::ArgumentOutOfRange {
                name: "index",
                value: index,
                limit: self.items.len(),
            });
        }
        Ok(self.items.remove(index))
    }

    /// Removes every item, keeping the buffer.
    pub fn clear(&mut self) -> Result<(), CollectionError> {
        self.check_unbuilt()?;
        self.items.clear();
        Ok(())
    }

    /// Grows the buffer to hold at least `capacity` items and returns the
    /// resulting capacity.
    pub fn ensure_capacity(&mut self, capacity: usize) -> Result<usize, CollectionError> {
        self.check_unbuilt()?;
        if capacity > self.items.capacity() {
            let additional = capacity - self.items.len();
            self.items.try_reserve(additional).map_err(reserve_error)?;
        }
        Ok(self.items.capacity())
    }

    /// Shrinks the buffer to `capacity`, which may not be below the length.
    pub fn trim_excess(&mut self, capacity: usize) -> Result<(), CollectionError> {
        self.check_unbuilt()?;
        if capacity < self.items.len() {
            return Err(CollectionError::ArgumentOutOfRange {
                name: "capacity",
                value: capacity,
                limit: self.items.len(),
            });
        }
        self.items.shrink_to(capacity);
        Ok(())
    }

    /// Moves the items into an [`ImmutableList`] without copying them.
    ///
    /// A second call fails with [`CollectionError::AlreadyBuilt`].
    pub fn build(&mut self) -> Result<ImmutableList<T>, CollectionError> {
        self.check_unbuilt()?;
        self.built = true;
        Ok(ImmutableList::from_vec(core::mem::take(&mut self.items)))
    }
}

impl<T> Default for ListBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Debug> Debug for ListBuilder<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        debug_items(f, self.iter())
    }
}

impl<T> FromIterator<T> for ListBuilder<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
            built: false,
        }
    }
}

impl<T> ImmutableList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    fn from_vec(items: Vec<T>) -> Self {
        Self {
            items: Arc::new(items),
            hash: HashCache::new(),
        }
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the list holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the item at `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Returns an iterator over the items in order.
    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Returns the items as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Returns a new list of `len` items starting at `offset`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use freeze_hash::ImmutableList;
    ///
    /// let list: ImmutableList<i32> = (0..10).collect();
    /// assert_eq!(list.slice(2, 3).unwrap().as_slice(), &[2, 3, 4]);
    /// assert!(list.slice(8, 3).is_err());
    /// ```
    pub fn slice(&self, offset: usize, len: usize) -> Result<Self, CollectionError>
    where
        T: Clone,
    {
        let total = self.items.len();
        if offset > total {
            return Err(CollectionError::ArgumentOutOfRange {
                name: "offset",
                value: offset,
                limit: total,
            });
        }
        if len > total - offset {
            return Err(CollectionError::ArgumentOutOfRange {
                name: "len",
                value: len,
                limit: total - offset,
            });
        }
        Ok(Self::from_vec(self.items[offset..offset + len].to_vec()))
    }

    /// Copies the items into a fresh builder.
    pub fn to_builder(&self) -> ListBuilder<T>
    where
        T: Clone,
    {
        ListBuilder {
            items: Vec::clone(&self.items),
            built: false,
        }
    }

    /// Order-sensitive content hash, computed on first use and cached.
    pub fn structural_hash(&self) -> u32
    where
        T: Hash,
    {
        self.hash
            .get_or_compute(|| ordered_hash(LIST_TAG, self.items.iter()))
    }
}

impl<T> Default for ImmutableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ImmutableList<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            hash: self.hash.clone(),
        }
    }
}

impl<T: PartialEq> PartialEq for ImmutableList<T> {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.items, &other.items) {
            return true;
        }
        if let (Some(left), Some(right)) = (self.hash.get(), other.hash.get()) {
            if left != right {
                return false;
            }
        }
        self.items == other.items
    }
}

impl<T: Eq> Eq for ImmutableList<T> {}

impl<T: Hash> Hash for ImmutableList<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.structural_hash());
    }
}

impl<T: Debug> Debug for ImmutableList<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        debug_items(f, self.iter())
    }
}

impl<T> Index<usize> for ImmutableList<T> {
    type Output = T;

    #[track_caller]
    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<T> FromIterator<T> for ImmutableList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a ImmutableList<T> {
    type IntoIter = core::slice::Iter<'a, T>;
    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T: 'a> SetOperand<'a, T> for &'a ImmutableList<T> {
    type Items = core::slice::Iter<'a, T>;

    fn items(self) -> Self::Items {
        self.iter()
    }
}
