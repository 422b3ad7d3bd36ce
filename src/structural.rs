//! Content hashing shared by every container kind.
//!
//! Lists fold their elements in order. Sets and maps use
//! [`UnorderedHash`], whose lanes keep a running maximum so that any
//! permutation of the same elements produces the same hash.

use core::hash::BuildHasher;
use core::hash::Hash;
use core::hash::Hasher;

use crate::DefaultHashBuilder;

/// Kind tags folded into each structural hash so that, say, an empty set and
/// an empty list do not collide.
pub(crate) const SET_TAG: u32 = 0x5E7_0001;
pub(crate) const MAP_TAG: u32 = 0x3A9_0002;
pub(crate) const LIST_TAG: u32 = 0x115_0003;

const LANES: usize = 32;

#[inline]
fn fold(hash: u64) -> u32 {
    (hash ^ (hash >> 32)) as u32
}

/// Hashes `value` with the crate hasher, folded to the width stored in the
/// entry store.
#[inline]
pub(crate) fn hash_of<Q: Hash + ?Sized>(value: &Q) -> u32 {
    fold(DefaultHashBuilder::default().hash_one(value))
}

/// Order-insensitive hash accumulator.
pub(crate) struct UnorderedHash {
    lanes: [u32; LANES],
    count: usize,
}

impl UnorderedHash {
    pub(crate) const fn new() -> Self {
        Self {
            lanes: [0; LANES],
            count: 0,
        }
    }

    #[inline]
    pub(crate) fn add(&mut self, hash: u32) {
        let lane = &mut self.lanes[hash as usize % LANES];
        *lane = (*lane).max(hash);
        self.count += 1;
    }

    pub(crate) fn finish(&self, tag: u32) -> u32 {
        let mut hasher = DefaultHashBuilder::default().build_hasher();
        hasher.write_u32(tag);
        hasher.write_usize(self.count);
        for lane in self.lanes {
            hasher.write_u32(lane);
        }
        fold(hasher.finish())
    }
}

/// Order-sensitive hash of a sequence.
pub(crate) fn ordered_hash<'a, T, I>(tag: u32, items: I) -> u32
where
    T: Hash + 'a,
    I: ExactSizeIterator<Item = &'a T>,
{
    let mut hasher = DefaultHashBuilder::default().build_hasher();
    hasher.write_u32(tag);
    hasher.write_usize(items.len());
    for item in items {
        item.hash(&mut hasher);
    }
    fold(hasher.finish())
}

/// Hash of one map entry given the stored key hash.
#[inline]
pub(crate) fn entry_hash<V: Hash>(key_hash: u32, value: &V) -> u32 {
    hash_of(&(key_hash, value))
}
