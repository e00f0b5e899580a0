//! 256-bit AVX kernels for `f32` (8 lanes) and `f64` (4 lanes).

use super::arch::*;
use crate::lanes::{reduce_blocked, Lanes};

#[derive(Clone, Copy)]
pub struct AvxF32(__m256);

#[derive(Clone, Copy)]
pub struct AvxF64(__m256d);

impl Lanes for AvxF32 {
    type Elem = f32;
    const WIDTH: usize = 8;

    #[inline(always)]
    unsafe fn zero() -> Self {
        Self(_mm256_setzero_ps())
    }

    #[inline(always)]
    unsafe fn load(ptr: *const f32) -> Self {
        Self(_mm256_load_ps(ptr))
    }

    #[inline(always)]
    unsafe fn add(self, rhs: Self) -> Self {
        Self(_mm256_add_ps(self.0, rhs.0))
    }

    #[inline(always)]
    unsafe fn store(self, out: *mut f32) {
        _mm256_storeu_ps(out, self.0)
    }
}

impl Lanes for AvxF64 {
    type Elem = f64;
    const WIDTH: usize = 4;

    #[inline(always)]
    unsafe fn zero() -> Self {
        Self(_mm256_setzero_pd())
    }

    #[inline(always)]
    unsafe fn load(ptr: *const f64) -> Self {
        Self(_mm256_load_pd(ptr))
    }

    #[inline(always)]
    unsafe fn add(self, rhs: Self) -> Self {
        Self(_mm256_add_pd(self.0, rhs.0))
    }

    #[inline(always)]
    unsafe fn store(self, out: *mut f64) {
        _mm256_storeu_pd(out, self.0)
    }
}

/// # Safety
/// Requires AVX; `buf` must be 32-byte aligned.
#[target_feature(enable = "avx")]
pub unsafe fn sum_f32_avx(buf: &[f32]) -> f32 {
    reduce_blocked::<AvxF32, 1>(buf)
}

/// # Safety
/// Requires AVX; `buf` must be 32-byte aligned.
#[target_feature(enable = "avx")]
pub unsafe fn sum_f32_avx_x4(buf: &[f32]) -> f32 {
    reduce_blocked::<AvxF32, 4>(buf)
}

/// # Safety
/// Requires AVX; `buf` must be 32-byte aligned.
#[target_feature(enable = "avx")]
pub unsafe fn sum_f64_avx(buf: &[f64]) -> f64 {
    reduce_blocked::<AvxF64, 1>(buf)
}

/// # Safety
/// Requires AVX; `buf` must be 32-byte aligned.
#[target_feature(enable = "avx")]
pub unsafe fn sum_f64_avx_x4(buf: &[f64]) -> f64 {
    reduce_blocked::<AvxF64, 4>(buf)
}
