//! Summable element types.
//!
//! Every kernel sums one of three fixed-width scalar types. The family tag
//! selects the tier ladder (see [`crate::caps::SimdTier::tiers_for`]) and
//! names the buffer type in reports.

use std::fmt;

/// Element-width family. Each family has its own SIMD tier ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ElementFamily {
    /// 32-bit signed integers.
    #[default]
    Int32,
    /// Single-precision floats.
    Float32,
    /// Double-precision floats.
    Float64,
}

impl ElementFamily {
    pub const ALL: [ElementFamily; 3] = [
        ElementFamily::Int32,
        ElementFamily::Float32,
        ElementFamily::Float64,
    ];

    /// Size of one element in bytes.
    pub fn element_size(self) -> usize {
        match self {
            ElementFamily::Int32 => 4,
            ElementFamily::Float32 => 4,
            ElementFamily::Float64 => 8,
        }
    }

    /// Short name used in program banners and variant names (`sumint_sse`, ...).
    pub fn short_name(self) -> &'static str {
        match self {
            ElementFamily::Int32 => "int",
            ElementFamily::Float32 => "float",
            ElementFamily::Float64 => "double",
        }
    }
}

impl fmt::Display for ElementFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementFamily::Int32 => "i32",
            ElementFamily::Float32 => "f32",
            ElementFamily::Float64 => "f64",
        };
        f.write_str(name)
    }
}

/// A scalar the reduction kernels can sum.
///
/// `accumulate` is the one addition every kernel uses for scalar work
/// (horizontal combine and remainder), so integer sums wrap identically on
/// every tier.
pub trait Element: Copy + PartialEq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    const FAMILY: ElementFamily;
    /// Additive identity.
    const ZERO: Self;

    fn accumulate(self, rhs: Self) -> Self;

    /// Lossless for values below 2^24, which covers every fill mask in use.
    fn from_u32(v: u32) -> Self;

    fn to_f64(self) -> f64;
}

impl Element for i32 {
    const FAMILY: ElementFamily = ElementFamily::Int32;
    const ZERO: Self = 0;

    #[inline(always)]
    fn accumulate(self, rhs: Self) -> Self {
        self.wrapping_add(rhs)
    }

    #[inline]
    fn from_u32(v: u32) -> Self {
        v as i32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Element for f32 {
    const FAMILY: ElementFamily = ElementFamily::Float32;
    const ZERO: Self = 0.0;

    #[inline(always)]
    fn accumulate(self, rhs: Self) -> Self {
        self + rhs
    }

    #[inline]
    fn from_u32(v: u32) -> Self {
        v as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Element for f64 {
    const FAMILY: ElementFamily = ElementFamily::Float64;
    const ZERO: Self = 0.0;

    #[inline(always)]
    fn accumulate(self, rhs: Self) -> Self {
        self + rhs
    }

    #[inline]
    fn from_u32(v: u32) -> Self {
        v as f64
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}
