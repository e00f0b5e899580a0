//! 128-bit kernels: SSE for `f32`, SSE2 for `i32` and `f64`.

use super::arch::*;
use crate::lanes::{reduce_blocked, Lanes};

#[derive(Clone, Copy)]
pub struct SseF32(__m128);

#[derive(Clone, Copy)]
pub struct Sse2I32(__m128i);

#[derive(Clone, Copy)]
pub struct Sse2F64(__m128d);

impl Lanes for SseF32 {
    type Elem = f32;
    const WIDTH: usize = 4;

    #[inline(always)]
    unsafe fn zero() -> Self {
        Self(_mm_setzero_ps())
    }

    #[inline(always)]
    unsafe fn load(ptr: *const f32) -> Self {
        Self(_mm_load_ps(ptr))
    }

    #[inline(always)]
    unsafe fn add(self, rhs: Self) -> Self {
        Self(_mm_add_ps(self.0, rhs.0))
    }

    #[inline(always)]
    unsafe fn store(self, out: *mut f32) {
        _mm_storeu_ps(out, self.0)
    }
}

impl Lanes for Sse2I32 {
    type Elem = i32;
    const WIDTH: usize = 4;

    #[inline(always)]
    unsafe fn zero() -> Self {
        Self(_mm_setzero_si128())
    }

    #[inline(always)]
    unsafe fn load(ptr: *const i32) -> Self {
        Self(_mm_load_si128(ptr as *const __m128i))
    }

    // paddd wraps, same as the scalar baseline.
    #[inline(always)]
    unsafe fn add(self, rhs: Self) -> Self {
        Self(_mm_add_epi32(self.0, rhs.0))
    }

    #[inline(always)]
    unsafe fn store(self, out: *mut i32) {
        _mm_storeu_si128(out as *mut __m128i, self.0)
    }
}

impl Lanes for Sse2F64 {
    type Elem = f64;
    const WIDTH: usize = 2;

    #[inline(always)]
    unsafe fn zero() -> Self {
        Self(_mm_setzero_pd())
    }

    #[inline(always)]
    unsafe fn load(ptr: *const f64) -> Self {
        Self(_mm_load_pd(ptr))
    }

    #[inline(always)]
    unsafe fn add(self, rhs: Self) -> Self {
        Self(_mm_add_pd(self.0, rhs.0))
    }

    #[inline(always)]
    unsafe fn store(self, out: *mut f64) {
        _mm_storeu_pd(out, self.0)
    }
}

/// # Safety
/// Requires SSE; `buf` must be 16-byte aligned.
#[target_feature(enable = "sse")]
pub unsafe fn sum_f32_sse(buf: &[f32]) -> f32 {
    reduce_blocked::<SseF32, 1>(buf)
}

/// # Safety
/// Requires SSE; `buf` must be 16-byte aligned.
#[target_feature(enable = "sse")]
pub unsafe fn sum_f32_sse_x4(buf: &[f32]) -> f32 {
    reduce_blocked::<SseF32, 4>(buf)
}

/// # Safety
/// Requires SSE2; `buf` must be 16-byte aligned.
#[target_feature(enable = "sse2")]
pub unsafe fn sum_i32_sse2(buf: &[i32]) -> i32 {
    reduce_blocked::<Sse2I32, 1>(buf)
}

/// # Safety
/// Requires SSE2; `buf` must be 16-byte aligned.
#[target_feature(enable = "sse2")]
pub unsafe fn sum_i32_sse2_x4(buf: &[i32]) -> i32 {
    reduce_blocked::<Sse2I32, 4>(buf)
}

/// # Safety
/// Requires SSE2; `buf` must be 16-byte aligned.
#[target_feature(enable = "sse2")]
pub unsafe fn sum_f64_sse2(buf: &[f64]) -> f64 {
    reduce_blocked::<Sse2F64, 1>(buf)
}

/// # Safety
/// Requires SSE2; `buf` must be 16-byte aligned.
#[target_feature(enable = "sse2")]
pub unsafe fn sum_f64_sse2_x4(buf: &[f64]) -> f64 {
    reduce_blocked::<Sse2F64, 4>(buf)
}
