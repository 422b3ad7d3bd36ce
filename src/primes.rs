//! Prime capacities for the entry store.
//!
//! Bucket indices are `hash % capacity`; prime moduli spread poorly
//! distributed hashes (multiples, aligned pointers) more evenly than powers
//! of two do.

use crate::error::CollectionError;

/// Largest prime capacity whose indices still fit the `u32` slot links.
pub(crate) const MAX_PRIME_CAPACITY: usize = 0x7FFF_FFC3;

/// Primes past this one are searched for instead of read from the table, and
/// must not be `1 mod HASH_PRIME`.
const HASH_PRIME: usize = 101;

/// Precomputed primes, each roughly 1.2x the previous one.
const PRIMES: [usize; 72] = [
    3, 7, 11, 17, 23, 29, 37, 47, 59, 71, 89, 107, 131, 163, 197, 239, 293, 353, 431, 521, 631,
    761, 919, 1103, 1327, 1597, 1931, 2333, 2801, 3371, 4049, 4861, 5839, 7013, 8419, 10103,
    12143, 14591, 17519, 21023, 25229, 30293, 36353, 43627, 52361, 62851, 75431, 90523, 108631,
    130363, 156437, 187751, 225307, 270371, 324449, 389357, 467237, 560689, 672827, 807403,
    968897, 1162687, 1395263, 1674319, 2009191, 2411033, 2893249, 3471899, 4166287, 4999559,
    5999471, 7199369,
];

fn is_prime(candidate: usize) -> bool {
    if candidate & 1 == 0 {
        return candidate == 2;
    }
    let mut divisor = 3;
    while divisor * divisor <= candidate {
        if candidate % divisor == 0 {
            return false;
        }
        divisor += 2;
    }
    true
}

/// Returns the smallest usable prime `>= min`.
pub(crate) fn get_prime(min: usize) -> Result<usize, CollectionError> {
    if min > MAX_PRIME_CAPACITY {
        return Err(CollectionError::CapacityOverflow);
    }
    if let Some(&prime) = PRIMES.iter().find(|&&p| p >= min) {
        return Ok(prime);
    }
    let mut candidate = min | 1;
    while candidate < MAX_PRIME_CAPACITY {
        if is_prime(candidate) && (candidate - 1) % HASH_PRIME != 0 {
            return Ok(candidate);
        }
        candidate += 2;
    }
    Ok(MAX_PRIME_CAPACITY)
}

/// Returns the capacity to grow to from `old_size`: the next prime at least
/// twice as large, clamped to [`MAX_PRIME_CAPACITY`].
pub(crate) fn expand_prime(old_size: usize) -> Result<usize, CollectionError> {
    if old_size >= MAX_PRIME_CAPACITY {
        return Err(CollectionError::CapacityOverflow);
    }
    let new_size = old_size.saturating_mul(2);
    if new_size > MAX_PRIME_CAPACITY {
        return Ok(MAX_PRIME_CAPACITY);
    }
    get_prime(new_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_entries_are_prime() {
        for p in PRIMES {
            assert!(is_prime(p), "{p} is not prime");
        }
        assert!(is_prime(MAX_PRIME_CAPACITY));
    }

    #[test]
    fn get_prime_rounds_up() {
        assert_eq!(get_prime(0), Ok(3));
        assert_eq!(get_prime(3), Ok(3));
        assert_eq!(get_prime(4), Ok(7));
        assert_eq!(get_prime(100), Ok(107));
    }

    #[test]
    fn get_prime_searches_past_the_table() {
        let p = get_prime(7_199_370).unwrap();
        assert!(p >= 7_199_370);
        assert!(is_prime(p));
        assert_ne!((p - 1) % HASH_PRIME, 0);
    }

    #[test]
    fn expand_prime_at_least_doubles() {
        assert_eq!(expand_prime(3), Ok(7));
        assert_eq!(expand_prime(7), Ok(17));
        let grown = expand_prime(1000).unwrap();
        assert!(grown >= 2000);
    }

    #[test]
    fn limits_report_overflow() {
        assert_eq!(
            get_prime(MAX_PRIME_CAPACITY + 1),
            Err(CollectionError::CapacityOverflow)
        );
        assert_eq!(
            expand_prime(MAX_PRIME_CAPACITY),
            Err(CollectionError::CapacityOverflow)
        );
        assert_eq!(expand_prime(MAX_PRIME_CAPACITY - 10), Ok(MAX_PRIME_CAPACITY));
    }
}
