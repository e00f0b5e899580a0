//! # Simdsum Core
//!
//! Shared plumbing for the simdsum reduction kernels.
//!
//! This crate provides:
//! - **Capability detection**: per-family SIMD tier of the executing CPU, cached after first query.
//! - **Aligned buffers**: owned, 32-byte aligned element storage the vector kernels can load from
//!   with aligned loads.
//! - **Element model**: the three summable element types (`i32`, `f32`, `f64`) and their families.
//! - **Configuration**: benchmark defaults with `SIMDSUM_*` environment overrides.
//! - **Deterministic PRNG** for buffer initialization and test fixtures.

pub mod buffer;
pub mod caps;
pub mod config;
pub mod element;
pub mod error;
pub mod rng;

pub use buffer::{AlignedBuf, ALIGNMENT};
pub use caps::{detect, detect_tier, print_caps, CpuCaps, SimdTier};
pub use config::BenchConfig;
pub use element::{Element, ElementFamily};
pub use error::{Result, SumError};
pub use rng::SplitMix64;
