//! Block/remainder/tree-combine skeleton shared by every vector kernel.
//!
//! A kernel is one instantiation of [`reduce_blocked`] for a lane type
//! (e.g. four `f32` in an `__m128`) and an unroll factor:
//!
//! ```text
//! buf:  [ block 0 | block 1 | ... | block n-1 | remainder ]
//!         └ UNROLL registers of WIDTH lanes ┘
//!
//! acc[k] += load(block + k*WIDTH)          for every block
//! v       = (acc0 + acc1) + (acc2 + acc3)  tree combine
//! total   = v[0] + v[1] + ... + v[W-1]     horizontal, lane order
//! total  += remainder[0] + remainder[1] ...
//! ```
//!
//! Lane `j` of accumulator `k` therefore sums every element whose index is
//! `k*WIDTH + j` modulo the block width.

use simdsum_core::Element;

/// Widest register in lanes (AVX f32).
pub const MAX_LANES: usize = 8;

/// How a buffer of `len` elements splits into full blocks and a remainder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockPlan {
    /// Elements consumed per loop iteration, `lanes * unroll`.
    pub block_width: usize,
    /// Number of full blocks.
    pub blocks: usize,
    /// Index of the first element summed sequentially.
    pub tail_start: usize,
}

impl BlockPlan {
    #[inline(always)]
    pub fn new(len: usize, lanes: usize, unroll: usize) -> Self {
        let block_width = lanes * unroll;
        let blocks = len / block_width;
        Self {
            block_width,
            blocks,
            tail_start: blocks * block_width,
        }
    }

    /// Number of trailing elements that do not fill a block.
    #[inline]
    pub fn remainder(&self, len: usize) -> usize {
        len - self.tail_start
    }
}

/// One SIMD register's worth of elements.
///
/// Implementations wrap a single vector type and forward to its intrinsics.
/// All methods are `#[inline(always)]` so they compile inside the
/// `#[target_feature]` entry point that instantiates the skeleton.
pub trait Lanes: Copy {
    type Elem: Element;
    const WIDTH: usize;

    /// All lanes zero.
    unsafe fn zero() -> Self;

    /// Aligned load of `WIDTH` elements.
    ///
    /// # Safety
    /// `ptr` must be valid for `WIDTH` reads and aligned to the register width.
    unsafe fn load(ptr: *const Self::Elem) -> Self;

    /// Lane-wise addition.
    unsafe fn add(self, rhs: Self) -> Self;

    /// Unaligned store of all lanes to `out[..WIDTH]`.
    unsafe fn store(self, out: *mut Self::Elem);
}

/// Sum `xs` onto `start`, strictly left to right.
#[inline(always)]
pub fn fold_in_order<T: Element>(start: T, xs: &[T]) -> T {
    xs.iter().fold(start, |acc, &x| acc.accumulate(x))
}

/// Pairwise combine: `(a0 + a1) + (a2 + a3)` for four accumulators.
#[inline(always)]
pub unsafe fn tree_combine<V: Lanes>(acc: &[V]) -> V {
    match acc {
        [a] => *a,
        [a0, a1] => a0.add(*a1),
        [a0, a1, a2, a3] => a0.add(*a1).add(a2.add(*a3)),
        [first, rest @ ..] => rest.iter().fold(*first, |s, v| s.add(*v)),
        [] => V::zero(),
    }
}

/// Extract the lanes and add them in increasing lane order.
#[inline(always)]
pub unsafe fn horizontal_sum<V: Lanes>(v: V) -> V::Elem {
    debug_assert!(V::WIDTH <= MAX_LANES);
    let mut lanes = [<V::Elem as Element>::ZERO; MAX_LANES];
    v.store(lanes.as_mut_ptr());
    fold_in_order(lanes[0], &lanes[1..V::WIDTH])
}

/// Sum `buf` with `UNROLL` independent accumulators of lane type `V`.
///
/// # Safety
/// The CPU must support the instruction set behind `V`, and `buf` must start
/// on a `V::WIDTH * size_of::<V::Elem>()` byte boundary.
#[inline(always)]
pub unsafe fn reduce_blocked<V: Lanes, const UNROLL: usize>(buf: &[V::Elem]) -> V::Elem {
    let plan = BlockPlan::new(buf.len(), V::WIDTH, UNROLL);
    let base = buf.as_ptr();

    let mut acc = [V::zero(); UNROLL];
    for block in 0..plan.blocks {
        let p = base.add(block * plan.block_width);
        for (k, a) in acc.iter_mut().enumerate() {
            *a = a.add(V::load(p.add(k * V::WIDTH)));
        }
    }

    let total = horizontal_sum(tree_combine(&acc));
    fold_in_order(total, &buf[plan.tail_start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Portable lane type so the skeleton can be checked without SIMD.
    #[derive(Clone, Copy, Debug)]
    struct Emulated<const W: usize>([i32; W]);

    impl<const W: usize> Lanes for Emulated<W> {
        type Elem = i32;
        const WIDTH: usize = W;

        unsafe fn zero() -> Self {
            Self([0; W])
        }

        unsafe fn load(ptr: *const i32) -> Self {
            let mut v = [0; W];
            std::ptr::copy_nonoverlapping(ptr, v.as_mut_ptr(), W);
            Self(v)
        }

        unsafe fn add(self, rhs: Self) -> Self {
            let mut v = self.0;
            for (a, b) in v.iter_mut().zip(rhs.0) {
                *a = a.wrapping_add(b);
            }
            Self(v)
        }

        unsafe fn store(self, out: *mut i32) {
            std::ptr::copy_nonoverlapping(self.0.as_ptr(), out, W);
        }
    }

    #[test]
    fn test_block_plan() {
        let plan = BlockPlan::new(5, 4, 1);
        assert_eq!(plan, BlockPlan { block_width: 4, blocks: 1, tail_start: 4 });
        assert_eq!(plan.remainder(5), 1);

        let plan = BlockPlan::new(31, 8, 4);
        assert_eq!(plan.blocks, 0);
        assert_eq!(plan.remainder(31), 31);

        let plan = BlockPlan::new(0, 2, 4);
        assert_eq!(plan.blocks, 0);
        assert_eq!(plan.tail_start, 0);
    }

    #[test]
    fn test_emulated_skeleton_sums() {
        let data: Vec<i32> = (1..=5).collect();
        let sum = unsafe { reduce_blocked::<Emulated<4>, 1>(&data) };
        assert_eq!(sum, 15);

        let data: Vec<i32> = (0..1000).collect();
        let expected: i32 = data.iter().sum();
        for len in [0, 1, 7, 8, 9, 31, 32, 33, 1000] {
            let want: i32 = data[..len].iter().sum();
            assert_eq!(unsafe { reduce_blocked::<Emulated<2>, 4>(&data[..len]) }, want);
            assert_eq!(unsafe { reduce_blocked::<Emulated<8>, 1>(&data[..len]) }, want);
        }
        assert_eq!(unsafe { reduce_blocked::<Emulated<4>, 4>(&data) }, expected);
    }

    #[test]
    fn test_tree_combine_order() {
        // Lane 0 records the combine order as a positional number.
        let acc = [Emulated([1]), Emulated([10]), Emulated([100]), Emulated([1000])];
        let v = unsafe { tree_combine(&acc) };
        assert_eq!(v.0[0], 1111);
        let single = unsafe { tree_combine(&acc[..1]) };
        assert_eq!(single.0[0], 1);
    }

    #[test]
    fn test_horizontal_sum_float_lane_order() {
        // 1e8 + 1 + 1 - 1e8: left-to-right loses the ones in f32.
        let lanes = [1.0e8f32, 1.0, 1.0, -1.0e8];
        let total = fold_in_order(lanes[0], &lanes[1..]);
        assert_eq!(total, 0.0);
        assert_eq!(fold_in_order(0.0f32, &[]), 0.0);
    }
}
