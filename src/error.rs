use core::fmt;

/// Failure reported by a collection operation.
///
/// Every variant is raised synchronously by the call that broke the
/// contract; nothing is retried internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionError {
    /// An index, capacity, offset or length fell outside the accepted range.
    ArgumentOutOfRange {
        /// Name of the offending argument.
        name: &'static str,
        /// The value that was passed.
        value: usize,
        /// The bound it violated.
        limit: usize,
    },
    /// A strict insert found the key already present.
    DuplicateKey,
    /// A direct lookup did not find the key.
    KeyNotFound,
    /// A single-use builder was touched after `build()`.
    AlreadyBuilt,
    /// A cursor was advanced after its collection was structurally modified.
    ModifiedDuringEnumeration,
    /// Overlapping or interrupted access was detected; the instance must be
    /// considered corrupted.
    ConcurrentOperation,
    /// A mutation was attempted through the view of an immutable value.
    NotSupported,
    /// The requested capacity or count cannot be represented.
    CapacityOverflow,
}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionError::ArgumentOutOfRange { name, value, limit } => write!(
                f,
                "argument `{name}` is out of range: got {value}, limit is {limit}"
            ),
            CollectionError::DuplicateKey => f.write_str("an entry with the same key already exists"),
            CollectionError::KeyNotFound => f.write_str("the given key was not present"),
            CollectionError::AlreadyBuilt => {
                f.write_str("the builder has already produced its immutable value")
            }
            CollectionError::ModifiedDuringEnumeration => {
                f.write_str("collection was modified; enumeration operation may not execute")
            }
            CollectionError::ConcurrentOperation => f.write_str(
                "operations that change non-concurrent collections must have exclusive access; \
                 the collection state may be corrupted",
            ),
            CollectionError::NotSupported => f.write_str("the collection is immutable"),
            CollectionError::CapacityOverflow => f.write_str("capacity overflow"),
        }
    }
}

impl core::error::Error for CollectionError {}

/// Unwraps the result of a read-only table walk.
///
/// Reads only fail on a poisoned builder or a corrupted chain, neither of
/// which a caller can recover from.
#[track_caller]
pub(crate) fn settle<T>(result: Result<T, CollectionError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("{err}"),
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn messages_name_the_argument() {
        let err = CollectionError::ArgumentOutOfRange {
            name: "capacity",
            value: 2,
            limit: 5,
        };
        assert_eq!(
            err.to_string(),
            "argument `capacity` is out of range: got 2, limit is 5"
        );
    }

    #[test]
    fn settle_passes_values_through() {
        assert_eq!(settle::<u8>(Ok(7)), 7);
    }

    #[cfg(feature = "std")]
    #[test]
    fn settle_panics_with_the_error_message() {
        let res = std::panic::catch_unwind(|| settle::<()>(Err(CollectionError::ConcurrentOperation)));
        let payload = res.expect_err("settle must panic on errors");
        let message = payload
            .downcast_ref::<alloc::string::String>()
            .cloned()
            .unwrap_or_default();
        assert!(message.contains("exclusive access"), "{message}");
    }
}
