//! x86 / x86_64 vector kernels.
//!
//! Every entry point is an `unsafe fn` that must only run on a CPU reporting
//! the named instruction set; [`crate::dispatch`] enforces that. Vector loads
//! are aligned, so the buffer must start on a register-width boundary.

pub mod avx;
pub mod mmx;
pub mod sse;

#[cfg(target_arch = "x86")]
pub(crate) use std::arch::x86 as arch;
#[cfg(target_arch = "x86_64")]
pub(crate) use std::arch::x86_64 as arch;
