//! Deterministic PRNG for buffer initialization and test fixtures.
//!
//! The benchmark fills its buffers with small non-negative values
//! (`next & mask`) so the printed sums stay in a readable range. Full-size
//! integer sums still wrap, and large `f32` sums round.

use crate::element::Element;

/// SplitMix64 generator with a single u64 of state (period 2^64).
///
/// # Example
/// ```
/// use simdsum_core::SplitMix64;
///
/// let mut rng = SplitMix64::new(42);
/// let mut buf = vec![0.0f32; 16];
/// rng.fill_masked(&mut buf, 0x3f);
/// assert!(buf.iter().all(|&x| (0.0..64.0).contains(&x)));
/// ```
#[derive(Clone, Debug)]
pub struct SplitMix64(u64);

impl SplitMix64 {
    /// Create a new PRNG with the given seed.
    #[inline]
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Next raw u64.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E3779B97F4A7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }

    /// Low bits of the next draw, `next & mask`.
    #[inline]
    pub fn next_masked(&mut self, mask: u32) -> u32 {
        (self.next_u64() >> 32) as u32 & mask
    }

    /// Fill `buf` with `next_masked(mask)` converted to the element type.
    pub fn fill_masked<T: Element>(&mut self, buf: &mut [T], mask: u32) {
        for x in buf.iter_mut() {
            *x = T::from_u32(self.next_masked(mask));
        }
    }
}
