//! Starting offsets for enumerating hash-based containers.
//!
//! Hash containers do not enumerate in insertion order. Every table draws a
//! seed when its storage is created, and each scan starts at an offset
//! derived from that seed. One storage always yields one order, while
//! separately built storages usually disagree, even when the allocator hands
//! them the same address. Callers must not rely on either property.

use core::sync::atomic::AtomicUsize;
use core::sync::atomic::Ordering;

static NEXT_SEED: AtomicUsize = AtomicUsize::new(0);

/// Finalizer from splitmix64; spreads consecutive inputs across the range.
#[inline]
fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Draws the seed for a newly created storage.
pub(crate) fn next_seed() -> u64 {
    let count = NEXT_SEED.fetch_add(1, Ordering::Relaxed) as u64;
    // The static's address differs between runs under ASLR.
    let base = (&raw const NEXT_SEED).addr() as u64;
    mix(base ^ count.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Slot at which a scan over `end` initialized slots begins.
#[inline]
pub(crate) fn start_offset(seed: u64, end: usize) -> usize {
    if end == 0 {
        return 0;
    }
    (seed % end as u64) as usize
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn offset_is_stable_for_one_seed() {
        let seed = next_seed();
        let first = start_offset(seed, 10);
        for _ in 0..8 {
            assert_eq!(start_offset(seed, 10), first);
        }
        assert!(first < 10);
    }

    #[test]
    fn empty_scan_starts_at_zero() {
        assert_eq!(start_offset(next_seed(), 0), 0);
    }

    #[test]
    fn seeds_are_fresh_per_draw() {
        let seeds: Vec<u64> = (0..20).map(|_| next_seed()).collect();
        let offsets: Vec<usize> = seeds.iter().map(|&s| start_offset(s, 10)).collect();
        assert!(seeds.iter().skip(1).all(|&s| s != seeds[0]));
        assert!(offsets.iter().any(|&o| o != offsets[0]), "{offsets:?}");
    }
}
