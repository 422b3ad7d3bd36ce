#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// Hasher used for every key. Deterministic across runs so that
        /// structural hashes are stable.
        pub type DefaultHashBuilder = foldhash::fast::FixedState;
    } else if #[cfg(feature = "std")] {
        /// Hasher used for every key. Deterministic across runs so that
        /// structural hashes are stable.
        pub type DefaultHashBuilder =
            core::hash::BuildHasherDefault<std::hash::DefaultHasher>;
    } else {
        compile_error!("enable the `foldhash` or `std` feature to select a hasher");
    }
}

mod duality;
mod entry_store;
mod enumeration;
mod error;
mod primes;
mod structural;

/// Immutable hash maps and their builders.
///
/// [`ImmutableHashMap`] values are cheap to clone and share; a
/// [`HashMapBuilder`] stages changes and publishes them in O(1).
pub mod hash_map;

/// Immutable hash sets, their builders and set algebra.
pub mod hash_set;

pub mod hash_table;

pub mod list;

pub mod view;

pub use duality::Cursor;
pub use error::CollectionError;
pub use hash_map::HashMapBuilder;
pub use hash_map::ImmutableHashMap;
pub use hash_set::HashSetBuilder;
pub use hash_set::ImmutableHashSet;
#[cfg(feature = "stats")]
pub use hash_table::DebugStats;
pub use hash_table::HashTable;
pub use hash_table::SetOperand;
pub use list::ImmutableList;
pub use list::ListBuilder;
pub use view::ListView;
pub use view::MapView;
pub use view::SetView;
