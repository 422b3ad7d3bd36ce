//! Mutable-collection views over builders and immutable values.
//!
//! Code written against these traits accepts either side of the duality.
//! Builders forward to their own methods; immutable values answer every
//! mutation with [`CollectionError::NotSupported`] and leave themselves
//! untouched.
//!
//! # Examples
//!
//! ```rust
//! use freeze_hash::CollectionError;
//! use freeze_hash::ImmutableHashSet;
//! use freeze_hash::SetView;
//!
//! fn add_all<S: SetView<u32>>(set: &mut S) -> Result<(), CollectionError> {
//!     for v in 0..3 {
//!         set.add(v)?;
//!     }
//!     Ok(())
//! }
//!
//! let mut value: ImmutableHashSet<u32> = ImmutableHashSet::new();
//! assert_eq!(add_all(&mut value), Err(CollectionError::NotSupported));
//!
//! let mut builder = value.to_builder();
//! add_all(&mut builder).unwrap();
//! assert_eq!(builder.len(), 3);
//! ```

use core::hash::Hash;

use crate::error::CollectionError;
use crate::hash_map::HashMapBuilder;
use crate::hash_map::ImmutableHashMap;
use crate::hash_set::HashSetBuilder;
use crate::hash_set::ImmutableHashSet;
use crate::list::ImmutableList;
use crate::list::ListBuilder;

/// A set that may or may not accept mutation.
pub trait SetView<T> {
    /// Number of elements.
    fn len(&self) -> usize;

    /// Whether the set holds no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the set contains `value`.
    fn contains(&self, value: &T) -> bool;

    /// Adds `value`; `Ok(false)` if it was already present.
    fn add(&mut self, value: T) -> Result<bool, CollectionError>;

    /// Removes `value`; `Ok(false)` if it was absent.
    fn remove(&mut self, value: &T) -> Result<bool, CollectionError>;

    /// Removes every element.
    fn clear(&mut self) -> Result<(), CollectionError>;
}

/// A map that may or may not accept mutation.
pub trait MapView<K, V> {
    /// Number of entries.
    fn len(&self) -> usize;

    /// Whether the map holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value mapped to `key`.
    fn get(&self, key: &K) -> Option<&V>;

    /// Whether the map contains `key`.
    fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Maps `key` to `value`, returning the replaced value.
    fn insert(&mut self, key: K, value: V) -> Result<Option<V>, CollectionError>;

    /// Adds an entry, failing on an existing key.
    fn try_add(&mut self, key: K, value: V) -> Result<(), CollectionError>;

    /// Removes `key`, returning its value.
    fn remove(&mut self, key: &K) -> Result<Option<V>, CollectionError>;

    /// Removes every entry.
    fn clear(&mut self) -> Result<(), CollectionError>;
}

/// A sequence that may or may not accept mutation.
pub trait ListView<T> {
    /// Number of items.
    fn len(&self) -> usize;

    /// Whether the sequence holds no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The item at `index`.
    fn get(&self, index: usize) -> Option<&T>;

    /// Appends `item`.
    fn push(&mut self, item: T) -> Result<(), CollectionError>;

    /// Inserts `item` at `index`.
    fn insert(&mut self, index: usize, item: T) -> Result<(), CollectionError>;

    /// Removes the item at `index`.
    fn remove(&mut self, index: usize) -> Result<T, CollectionError>;

    /// Removes every item.
    fn clear(&mut self) -> Result<(), CollectionError>;
}

impl<T> SetView<T> for HashSetBuilder<T>
where
    T: Hash + Eq + Clone,
{
    fn len(&self) -> usize {
        HashSetBuilder::len(self)
    }

    fn contains(&self, value: &T) -> bool {
        HashSetBuilder::contains(self, value)
    }

    fn add(&mut self, value: T) -> Result<bool, CollectionError> {
        self.insert(value)
    }

    fn remove(&mut self, value: &T) -> Result<bool, CollectionError> {
        HashSetBuilder::remove(self, value)
    }

    fn clear(&mut self) -> Result<(), CollectionError> {
        HashSetBuilder::clear(self)
    }
}

impl<T> SetView<T> for ImmutableHashSet<T>
where
    T: Hash + Eq,
{
    fn len(&self) -> usize {
        ImmutableHashSet::len(self)
    }

    fn contains(&self, value: &T) -> bool {
        ImmutableHashSet::contains(self, value)
    }

    fn add(&mut self, _value: T) -> Result<bool, CollectionError> {
        Err(CollectionError::NotSupported)
    }

    fn remove(&mut self, _value: &T) -> Result<bool, CollectionError> {
        Err(CollectionError::NotSupported)
    }

    fn clear(&mut self) -> Result<(), CollectionError> {
        Err(CollectionError::NotSupported)
    }
}

impl<K, V> MapView<K, V> for HashMapBuilder<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn len(&self) -> usize {
        HashMapBuilder::len(self)
    }

    fn get(&self, key: &K) -> Option<&V> {
        HashMapBuilder::get(self, key)
    }

    fn insert(&mut self, key: K, value: V) -> Result<Option<V>, CollectionError> {
        HashMapBuilder::insert(self, key, value)
    }

    fn try_add(&mut self, key: K, value: V) -> Result<(), CollectionError> {
        HashMapBuilder::try_add(self, key, value)
    }

    fn remove(&mut self, key: &K) -> Result<Option<V>, CollectionError> {
        HashMapBuilder::remove(self, key)
    }

    fn clear(&mut self) -> Result<(), CollectionError> {
        HashMapBuilder::clear(self)
    }
}

impl<K, V> MapView<K, V> for ImmutableHashMap<K, V>
where
    K: Hash + Eq,
{
    fn len(&self) -> usize {
        ImmutableHashMap::len(self)
    }

    fn get(&self, key: &K) -> Option<&V> {
        ImmutableHashMap::get(self, key)
    }

    fn insert(&mut self, _key: K, _value: V) -> Result<Option<V>, CollectionError> {
        Err(CollectionError::NotSupported)
    }

    fn try_add(&mut self, _key: K, _value: V) -> Result<(), CollectionError> {
        Err(CollectionError::NotSupported)
    }

    fn remove(&mut self, _key: &K) -> Result<Option<V>, CollectionError> {
        Err(CollectionError::NotSupported)
    }

    fn clear(&mut self) -> Result<(), CollectionError> {
        Err(CollectionError::NotSupported)
    }
}

impl<T> ListView<T> for ListBuilder<T> {
    fn len(&self) -> usize {
        ListBuilder::len(self)
    }

    fn get(&self, index: usize) -> Option<&T> {
        ListBuilder::get(self, index)
    }

    fn push(&mut self, item: T) -> Result<(), CollectionError> {
        ListBuilder::push(self, item)
    }

    fn insert(&mut self, index: usize, item: T) -> Result<(), CollectionError> {
        ListBuilder::insert(self, index, item)
    }

    fn remove(&mut self, index: usize) -> Result<T, CollectionError> {
        ListBuilder::remove(self, index)
    }

    fn clear(&mut self) -> Result<(), CollectionError> {
        ListBuilder::clear(self)
    }
}

impl<T> ListView<T> for ImmutableList<T> {
    fn len(&self) -> usize {
        ImmutableList::len(self)
    }

    fn get(&self, index: usize) -> Option<&T> {
        ImmutableList::get(self, index)
    }

    fn push(&mut self, _item: T) -> Result<(), CollectionError> {
        Err(CollectionError::NotSupported)
    }

    fn insert(&mut self, _index: usize, _item: T) -> Result<(), CollectionError> {
        Err(CollectionError::NotSupported)
    }

    fn remove(&mut self, _index: usize) -> Result<T, CollectionError> {
        Err(CollectionError::NotSupported)
    }

    fn clear(&mut self) -> Result<(), CollectionError> {
        Err(CollectionError::NotSupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_map<M: MapView<u8, u8>>(map: &mut M) -> Result<usize, CollectionError> {
        map.insert(1, 1)?;
        map.try_add(2, 2)?;
        map.remove(&1)?;
        Ok(map.len())
    }

    #[test]
    fn test_builders_accept_mutation() {
        let mut set: HashSetBuilder<u8> = HashSetBuilder::new();
        assert_eq!(SetView::add(&mut set, 1), Ok(true));
        assert_eq!(SetView::add(&mut set, 1), Ok(false));
        assert!(SetView::contains(&set, &1));
        assert_eq!(SetView::remove(&mut set, &1), Ok(true));
        assert!(SetView::is_empty(&set));

        let mut map: HashMapBuilder<u8, u8> = HashMapBuilder::new();
        assert_eq!(fill_map(&mut map), Ok(1));
        assert!(MapView::contains_key(&map, &2));

        let mut list: ListBuilder<u8> = ListBuilder::new();
        ListView::push(&mut list, 2).unwrap();
        ListView::insert(&mut list, 0, 1).unwrap();
        assert_eq!(ListView::get(&list, 1), Some(&2));
        assert_eq!(ListView::remove(&mut list, 0), Ok(1));
        ListView::clear(&mut list).unwrap();
        assert!(ListView::is_empty(&list));
    }

    #[test]
    fn test_values_reject_mutation() {
        let mut set: ImmutableHashSet<u8> = [1].into_iter().collect();
        assert_eq!(SetView::add(&mut set, 2), Err(CollectionError::NotSupported));
        assert_eq!(SetView::remove(&mut set, &1), Err(CollectionError::NotSupported));
        assert_eq!(SetView::clear(&mut set), Err(CollectionError::NotSupported));
        assert_eq!(SetView::len(&set), 1);

        let mut map: ImmutableHashMap<u8, u8> = [(1, 1)].into_iter().collect();
        assert_eq!(fill_map(&mut map), Err(CollectionError::NotSupported));
        assert_eq!(MapView::get(&map, &1), Some(&1));
        assert_eq!(MapView::clear(&mut map), Err(CollectionError::NotSupported));

        let mut list: ImmutableList<u8> = [1, 2].into_iter().collect();
        assert_eq!(ListView::push(&mut list, 3), Err(CollectionError::NotSupported));
        assert_eq!(ListView::remove(&mut list, 0), Err(CollectionError::NotSupported));
        assert_eq!(ListView::len(&list), 2);
    }
}
