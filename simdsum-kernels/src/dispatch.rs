//! Variant tables and runtime dispatch.
//!
//! Each element type has a static table of every summation variant compiled
//! for the target. The [`Dispatcher`] filters that table against the
//! detected CPU (and an optional lower ceiling) and hands out [`Reducer`]s,
//! which are the only safe way to call a kernel.
//!
//! ```
//! use simdsum_core::AlignedBuf;
//! use simdsum_kernels::Dispatcher;
//!
//! let buf = AlignedBuf::from_slice(&[1i32, 2, 3, 4, 5]).unwrap();
//! let dispatcher = Dispatcher::detect();
//! for reducer in dispatcher.available::<i32>() {
//!     assert_eq!(reducer.reduce(&buf), 15, "{}", reducer.name());
//! }
//! ```

use std::fmt;

use smallvec::SmallVec;

use simdsum_core::{detect, AlignedBuf, CpuCaps, Element, ElementFamily, Result, SimdTier, SumError};

use crate::scalar;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
use crate::x86::{avx, mmx, sse};

/// Kernel signature shared by every variant.
pub type SumFn<T> = unsafe fn(&[T]) -> T;

/// One (element type, tier, unroll) kernel.
pub struct Variant<T: 'static> {
    pub name: &'static str,
    pub tier: SimdTier,
    pub unroll: usize,
    func: SumFn<T>,
}

impl<T: Element> Variant<T> {
    const fn new(name: &'static str, tier: SimdTier, unroll: usize, func: SumFn<T>) -> Self {
        Self {
            name,
            tier,
            unroll,
            func,
        }
    }

    /// Elements per register.
    pub fn lanes(&self) -> usize {
        self.tier.lanes(T::FAMILY)
    }

    /// Elements consumed per loop iteration.
    pub fn block_width(&self) -> usize {
        self.lanes() * self.unroll
    }

    /// Byte alignment the kernel's loads need.
    pub fn alignment(&self) -> usize {
        match self.tier {
            SimdTier::None => std::mem::align_of::<T>(),
            tier => tier.register_bits() / 8,
        }
    }
}

impl<T: Element> fmt::Debug for Variant<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variant")
            .field("name", &self.name)
            .field("family", &T::FAMILY)
            .field("tier", &self.tier)
            .field("unroll", &self.unroll)
            .finish()
    }
}

static INT_VARIANTS: &[Variant<i32>] = &[
    Variant::new("sumint_base", SimdTier::None, 1, scalar::sum_i32_scalar),
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Variant::new("sumint_mmx", SimdTier::Legacy64, 1, mmx::sum_i32_mmx),
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Variant::new("sumint_mmx_4loop", SimdTier::Legacy64, 4, mmx::sum_i32_mmx_x4),
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Variant::new("sumint_sse", SimdTier::Vector128, 1, sse::sum_i32_sse2),
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Variant::new("sumint_sse_4loop", SimdTier::Vector128, 4, sse::sum_i32_sse2_x4),
];

static FLOAT_VARIANTS: &[Variant<f32>] = &[
    Variant::new("sumfloat_base", SimdTier::None, 1, scalar::sum_f32_scalar),
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Variant::new("sumfloat_sse", SimdTier::Vector128, 1, sse::sum_f32_sse),
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Variant::new("sumfloat_sse_4loop", SimdTier::Vector128, 4, sse::sum_f32_sse_x4),
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Variant::new("sumfloat_avx", SimdTier::Vector256, 1, avx::sum_f32_avx),
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Variant::new("sumfloat_avx_4loop", SimdTier::Vector256, 4, avx::sum_f32_avx_x4),
];

static DOUBLE_VARIANTS: &[Variant<f64>] = &[
    Variant::new("sumdouble_base", SimdTier::None, 1, scalar::sum_f64_scalar),
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Variant::new("sumdouble_sse", SimdTier::Vector128, 1, sse::sum_f64_sse2),
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Variant::new("sumdouble_sse_4loop", SimdTier::Vector128, 4, sse::sum_f64_sse2_x4),
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Variant::new("sumdouble_avx", SimdTier::Vector256, 1, avx::sum_f64_avx),
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    Variant::new("sumdouble_avx_4loop", SimdTier::Vector256, 4, avx::sum_f64_avx_x4),
];

/// An element type with a table of summation variants, lowest tier first.
pub trait Reducible: Element {
    fn variants() -> &'static [Variant<Self>];
}

impl Reducible for i32 {
    fn variants() -> &'static [Variant<Self>] {
        INT_VARIANTS
    }
}

impl Reducible for f32 {
    fn variants() -> &'static [Variant<Self>] {
        FLOAT_VARIANTS
    }
}

impl Reducible for f64 {
    fn variants() -> &'static [Variant<Self>] {
        DOUBLE_VARIANTS
    }
}

/// Chooses which variants may run on this CPU.
#[derive(Clone, Copy, Debug)]
pub struct Dispatcher {
    caps: &'static CpuCaps,
    ceiling: SimdTier,
}

impl Dispatcher {
    /// Dispatcher for the executing CPU, no ceiling.
    pub fn detect() -> Self {
        Self {
            caps: detect(),
            ceiling: SimdTier::Vector256,
        }
    }

    /// Cap dispatch at `tier`. A ceiling can only lower the current one.
    pub fn with_ceiling(self, tier: SimdTier) -> Self {
        Self {
            ceiling: self.ceiling.min(tier),
            ..self
        }
    }

    pub fn ceiling(&self) -> SimdTier {
        self.ceiling
    }

    /// Highest tier of `family` this dispatcher will run.
    pub fn tier(&self, family: ElementFamily) -> SimdTier {
        SimdTier::tiers_for(family)
            .iter()
            .rev()
            .copied()
            .find(|&t| self.allows(family, t))
            .unwrap_or(SimdTier::None)
    }

    fn allows(&self, family: ElementFamily, tier: SimdTier) -> bool {
        tier <= self.ceiling && self.caps.supports(family, tier)
    }

    /// Every runnable variant of `T`, lowest tier first.
    pub fn available<T: Reducible>(&self) -> SmallVec<[Reducer<T>; 5]> {
        T::variants()
            .iter()
            .filter(|v| self.allows(T::FAMILY, v.tier))
            .map(|variant| Reducer { variant })
            .collect()
    }

    /// The sequential baseline of `T`. Always runnable.
    pub fn baseline<T: Reducible>(&self) -> Reducer<T> {
        // Tables start with the baseline.
        Reducer {
            variant: &T::variants()[0],
        }
    }

    /// Widest runnable variant, preferring the unrolled form.
    pub fn best<T: Reducible>(&self) -> Reducer<T> {
        let reducer = T::variants()
            .iter()
            .filter(|v| self.allows(T::FAMILY, v.tier))
            .max_by_key(|v| (v.tier, v.unroll))
            .map(|variant| Reducer { variant })
            .unwrap_or_else(|| self.baseline());
        tracing::debug!(family = %T::FAMILY, variant = reducer.name(), "selected best variant");
        reducer
    }

    /// Look a variant up by name.
    pub fn select<T: Reducible>(&self, name: &str) -> Result<Reducer<T>> {
        let variant = T::variants()
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| SumError::UnknownVariant {
                family: T::FAMILY,
                name: name.to_string(),
            })?;
        if !self.allows(T::FAMILY, variant.tier) {
            return Err(SumError::TierUnavailable {
                family: T::FAMILY,
                variant: variant.name,
                required: variant.tier,
                ceiling: self.tier(T::FAMILY),
            });
        }
        Ok(Reducer { variant })
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::detect()
    }
}

/// A variant checked against the CPU. Safe to call on aligned buffers.
pub struct Reducer<T: 'static> {
    variant: &'static Variant<T>,
}

impl<T: 'static> Clone for Reducer<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for Reducer<T> {}

impl<T: Element> Reducer<T> {
    pub fn name(&self) -> &'static str {
        self.variant.name
    }

    pub fn tier(&self) -> SimdTier {
        self.variant.tier
    }

    pub fn unroll(&self) -> usize {
        self.variant.unroll
    }

    pub fn lanes(&self) -> usize {
        self.variant.lanes()
    }

    pub fn variant(&self) -> &'static Variant<T> {
        self.variant
    }

    /// Sum an aligned buffer.
    #[inline]
    pub fn reduce(&self, buf: &AlignedBuf<T>) -> T {
        // Safety: the dispatcher only builds reducers for tiers the CPU
        // supports, and `AlignedBuf` is aligned for the widest register.
        unsafe { (self.variant.func)(buf.as_slice()) }
    }

    /// Sum any slice, checking the alignment the variant needs.
    pub fn reduce_slice(&self, buf: &[T]) -> Result<T> {
        let required = self.variant.alignment();
        let addr = buf.as_ptr() as usize;
        if !buf.is_empty() && addr % required != 0 {
            return Err(SumError::Misaligned { addr, required });
        }
        // Safety: tier checked at construction, alignment checked above.
        Ok(unsafe { (self.variant.func)(buf) })
    }
}

impl<T: Element> fmt::Debug for Reducer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reducer").field(self.variant).finish()
    }
}

/// Sum `buf` with the widest variant the CPU supports.
pub fn sum<T: Reducible>(buf: &AlignedBuf<T>) -> T {
    Dispatcher::detect().best::<T>().reduce(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_buf<T: Element>(len: usize, mask: u32, seed: u64) -> AlignedBuf<T> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut buf = AlignedBuf::<T>::zeroed(len).unwrap();
        for x in buf.iter_mut() {
            *x = T::from_u32(rng.gen::<u32>() & mask);
        }
        buf
    }

    fn tolerance<T: Element>(buf: &[T]) -> f64 {
        let max = buf.iter().map(|x| x.to_f64().abs()).fold(0.0, f64::max);
        let eps = match T::FAMILY {
            ElementFamily::Float32 => f32::EPSILON as f64,
            _ => f64::EPSILON,
        };
        buf.len() as f64 * max * eps * 4.0
    }

    fn assert_matches_baseline<T: Reducible>(buf: &AlignedBuf<T>) {
        let dispatcher = Dispatcher::detect();
        let expected = dispatcher.baseline::<T>().reduce(buf);
        for reducer in dispatcher.available::<T>() {
            let got = reducer.reduce(buf);
            match T::FAMILY {
                ElementFamily::Int32 => {
                    assert_eq!(got, expected, "{} len={}", reducer.name(), buf.len())
                }
                _ => {
                    let diff = (got.to_f64() - expected.to_f64()).abs();
                    assert!(
                        diff <= tolerance(buf),
                        "{} len={}: {} vs baseline {}",
                        reducer.name(),
                        buf.len(),
                        got,
                        expected
                    );
                }
            }
        }
    }

    #[test]
    fn test_variant_tables() {
        for table in [
            INT_VARIANTS.iter().map(|v| (v.tier, v.unroll, v.name)).collect::<Vec<_>>(),
            FLOAT_VARIANTS.iter().map(|v| (v.tier, v.unroll, v.name)).collect(),
            DOUBLE_VARIANTS.iter().map(|v| (v.tier, v.unroll, v.name)).collect(),
        ] {
            assert_eq!(table[0].0, SimdTier::None);
            assert!(table.windows(2).all(|w| (w[0].0, w[0].1) < (w[1].0, w[1].1)));
            assert!(table.iter().all(|&(_, unroll, name)| (unroll == 4) == name.ends_with("_4loop")));
        }
        for v in INT_VARIANTS {
            assert!(v.tier.is_member(ElementFamily::Int32));
            assert!(v.name.starts_with("sumint_"));
        }
        for v in FLOAT_VARIANTS {
            assert!(v.tier.is_member(ElementFamily::Float32));
            assert!(v.name.contains(v.tier.label(ElementFamily::Float32)));
        }
        for v in DOUBLE_VARIANTS {
            assert!(v.tier.is_member(ElementFamily::Float64));
        }
    }

    #[test]
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    fn test_block_widths() {
        let widths: Vec<_> = INT_VARIANTS.iter().map(|v| v.block_width()).collect();
        assert_eq!(widths, [1, 2, 8, 4, 16]);
        let widths: Vec<_> = FLOAT_VARIANTS.iter().map(|v| v.block_width()).collect();
        assert_eq!(widths, [1, 4, 16, 8, 32]);
        let widths: Vec<_> = DOUBLE_VARIANTS.iter().map(|v| v.block_width()).collect();
        assert_eq!(widths, [1, 2, 8, 4, 16]);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_small_example() {
        let ints = AlignedBuf::from_slice(&[1i32, 2, 3, 4, 5]).unwrap();
        let floats = AlignedBuf::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let doubles = AlignedBuf::from_slice(&[1.0f64, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let dispatcher = Dispatcher::detect();
        for r in dispatcher.available::<i32>() {
            assert_eq!(r.reduce(&ints), 15, "{}", r.name());
        }
        for r in dispatcher.available::<f32>() {
            assert_eq!(r.reduce(&floats), 15.0, "{}", r.name());
        }
        for r in dispatcher.available::<f64>() {
            assert_eq!(r.reduce(&doubles), 15.0, "{}", r.name());
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_empty_buffer_is_zero() {
        let dispatcher = Dispatcher::detect();
        let ints = AlignedBuf::<i32>::zeroed(0).unwrap();
        let floats = AlignedBuf::<f32>::zeroed(0).unwrap();
        let doubles = AlignedBuf::<f64>::zeroed(0).unwrap();
        for r in dispatcher.available::<i32>() {
            assert_eq!(r.reduce(&ints), 0, "{}", r.name());
        }
        for r in dispatcher.available::<f32>() {
            assert_eq!(r.reduce(&floats), 0.0, "{}", r.name());
        }
        for r in dispatcher.available::<f64>() {
            assert_eq!(r.reduce(&doubles), 0.0, "{}", r.name());
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_int_variants_exact() {
        for len in [1, 3, 17, 100, 1023, 4096, 40_961] {
            let buf = random_buf::<i32>(len, 0x7fff, len as u64);
            assert_matches_baseline(&buf);
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_int_wrapping_matches_baseline() {
        let buf = AlignedBuf::filled(4099, i32::MAX / 3).unwrap();
        assert_matches_baseline(&buf);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_float_variants_within_tolerance() {
        let mut rng = StdRng::seed_from_u64(7);
        for len in [5, 64, 999, 8192, 40_000] {
            let mut f = AlignedBuf::<f32>::zeroed(len).unwrap();
            let mut d = AlignedBuf::<f64>::zeroed(len).unwrap();
            for (a, b) in f.iter_mut().zip(d.iter_mut()) {
                *a = rng.gen_range(-1.0..1.0);
                *b = rng.gen_range(-1.0e3..1.0e3);
            }
            assert_matches_baseline(&f);
            assert_matches_baseline(&d);
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_block_boundaries() {
        let dispatcher = Dispatcher::detect();
        for reducer in dispatcher.available::<i32>() {
            let w = reducer.variant().block_width();
            for len in [w - 1, w, w + 1, 3 * w - 1, 3 * w + 1] {
                let buf = random_buf::<i32>(len, 0x7fff, 99);
                let expected = dispatcher.baseline::<i32>().reduce(&buf);
                assert_eq!(reducer.reduce(&buf), expected, "{} len={}", reducer.name(), len);
            }
        }
        // Integer-valued floats below 2^24 sum exactly in any order.
        for reducer in dispatcher.available::<f32>() {
            let w = reducer.variant().block_width();
            for len in [w - 1, w, w + 1] {
                let buf = random_buf::<f32>(len, 0x3f, 5);
                let expected = dispatcher.baseline::<f32>().reduce(&buf);
                assert_eq!(reducer.reduce(&buf), expected, "{} len={}", reducer.name(), len);
            }
        }
        for reducer in dispatcher.available::<f64>() {
            let w = reducer.variant().block_width();
            for len in [w - 1, w, w + 1] {
                let buf = random_buf::<f64>(len, 0x7fff, 5);
                let expected = dispatcher.baseline::<f64>().reduce(&buf);
                assert_eq!(reducer.reduce(&buf), expected, "{} len={}", reducer.name(), len);
            }
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_unrolled_agrees_with_plain() {
        // Masked integral values sum exactly in every order, so agreement is exact.
        fn check<T: Reducible>(mask: u32) {
            let dispatcher = Dispatcher::detect();
            let available = dispatcher.available::<T>();
            for plain in available.iter().filter(|r| r.unroll() == 1 && r.tier() != SimdTier::None) {
                for unrolled in available.iter().filter(|r| r.unroll() == 4 && r.tier() == plain.tier()) {
                    let w = unrolled.variant().block_width();
                    for len in [w - 1, w, w + 1, 2 * w + 3, 10_007] {
                        let buf = random_buf::<T>(len, mask, len as u64);
                        assert_eq!(
                            plain.reduce(&buf),
                            unrolled.reduce(&buf),
                            "{} vs {} len={}",
                            plain.name(),
                            unrolled.name(),
                            len
                        );
                    }
                }
            }
        }
        check::<i32>(0x7fff);
        check::<f32>(0x3f);
        check::<f64>(0x7fff);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_idempotent() {
        let dispatcher = Dispatcher::detect();
        let mut rng = StdRng::seed_from_u64(11);
        let mut buf = AlignedBuf::<f32>::zeroed(12_345).unwrap();
        buf.iter_mut().for_each(|x| *x = rng.gen_range(-10.0..10.0));
        for r in dispatcher.available::<f32>() {
            let first = r.reduce(&buf);
            assert_eq!(first.to_bits(), r.reduce(&buf).to_bits(), "{}", r.name());
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_ones_sum_exactly() {
        let buf = AlignedBuf::filled(409_600, 1.0f32).unwrap();
        for r in Dispatcher::detect().available::<f32>() {
            assert_eq!(r.reduce(&buf), 409_600.0, "{}", r.name());
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_ceiling_only_lowers() {
        let full = Dispatcher::detect();
        let capped = full.with_ceiling(SimdTier::Legacy64);
        assert!(capped.tier(ElementFamily::Int32) <= SimdTier::Legacy64);
        assert_eq!(capped.tier(ElementFamily::Float32), SimdTier::None);
        assert!(capped.available::<f64>().iter().all(|r| r.tier() == SimdTier::None));

        let raised = capped.with_ceiling(SimdTier::Vector256);
        assert_eq!(raised.ceiling(), SimdTier::Legacy64);

        for family in ElementFamily::ALL {
            assert!(full.tier(family) <= detect().max_tier(family));
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_select_errors() {
        let dispatcher = Dispatcher::detect().with_ceiling(SimdTier::None);
        let err = dispatcher.select::<f32>("sumfloat_fma").unwrap_err();
        assert!(matches!(err, SumError::UnknownVariant { .. }));

        // Names are per family.
        assert!(dispatcher.select::<f64>("sumint_base").is_err());

        assert_eq!(dispatcher.select::<f64>("sumdouble_base").unwrap().name(), "sumdouble_base");

        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            let err = dispatcher.select::<i32>("sumint_sse_4loop").unwrap_err();
            match err {
                SumError::TierUnavailable { required, ceiling, .. } => {
                    assert_eq!(required, SimdTier::Vector128);
                    assert_eq!(ceiling, SimdTier::None);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_best_and_sum() {
        let dispatcher = Dispatcher::detect();
        let best = dispatcher.best::<f64>();
        assert_eq!(best.tier(), dispatcher.tier(ElementFamily::Float64));
        if best.tier() != SimdTier::None {
            assert_eq!(best.unroll(), 4);
        }
        let buf = AlignedBuf::filled(1000, 2i32).unwrap();
        assert_eq!(sum(&buf), 2000);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_reduce_slice_checks_alignment() {
        let dispatcher = Dispatcher::detect();
        let buf = AlignedBuf::filled(64, 1.0f64).unwrap();
        for r in dispatcher.available::<f64>() {
            assert_eq!(r.reduce_slice(&buf).unwrap(), 64.0);
            let shifted = &buf[1..];
            let result = r.reduce_slice(shifted);
            if r.variant().alignment() > std::mem::align_of::<f64>() {
                assert!(matches!(result, Err(SumError::Misaligned { .. })), "{}", r.name());
            } else {
                assert_eq!(result.unwrap(), 63.0);
            }
            assert_eq!(r.reduce_slice(&buf[1..1]).unwrap(), 0.0);
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_float_math_after_every_int_variant() {
        let buf = random_buf::<i32>(1000, 0x7fff, 1);
        for r in Dispatcher::detect().available::<i32>() {
            std::hint::black_box(r.reduce(&buf));
            let x = std::hint::black_box(3.0f64);
            let y = std::hint::black_box(0.5f32);
            assert_eq!(x * 0.5 + 0.25, 1.75, "{}", r.name());
            assert_eq!((y * y) as f64 + x.sqrt().powi(2).round(), 3.25, "{}", r.name());
        }
    }
}
