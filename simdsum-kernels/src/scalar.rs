//! Scalar baselines. Strictly sequential, no reassociation.
//!
//! These are the reference every vector variant is compared against, and
//! the only variants available on CPUs (or targets) without SIMD.

use std::hint::black_box;

use crate::lanes::fold_in_order;

#[inline(never)]
pub fn sum_i32_scalar(buf: &[i32]) -> i32 {
    // Wrapping adds are associative, so LLVM would otherwise turn this loop
    // into packed SSE2 adds. The opaque accumulator keeps it one add per element.
    buf.iter().fold(0i32, |acc, &x| black_box(acc.wrapping_add(x)))
}

#[inline(never)]
pub fn sum_f32_scalar(buf: &[f32]) -> f32 {
    fold_in_order(0.0, buf)
}

#[inline(never)]
pub fn sum_f64_scalar(buf: &[f64]) -> f64 {
    fold_in_order(0.0, buf)
}
