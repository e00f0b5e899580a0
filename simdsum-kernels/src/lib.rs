//! # Simdsum Kernels
//!
//! Summation of `i32`, `f32` and `f64` buffers across successive SIMD tiers:
//!
//! - **Scalar** baselines, strictly left to right.
//! - **MMX** (`i32`, 2 lanes) via inline assembly, with a scoped `emms` guard.
//! - **SSE / SSE2** (4 × `f32`, 4 × `i32`, 2 × `f64`).
//! - **AVX** (8 × `f32`, 4 × `f64`).
//!
//! Every vector tier comes plain and 4× unrolled. All vector kernels share one
//! block/remainder/tree-combine skeleton ([`lanes::reduce_blocked`]) and are
//! reached through the runtime [`Dispatcher`].
//!
//! Vector variants reassociate the sum across lanes, so float results can
//! differ from the baseline in the low bits. Integer results are identical
//! on every tier (wrapping addition).

pub mod dispatch;
pub mod lanes;
pub mod scalar;
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub mod x86;

pub use dispatch::{sum, Dispatcher, Reducer, Reducible, SumFn, Variant};
pub use lanes::BlockPlan;
