//! 64-bit MMX kernels for `i32` (2 lanes).
//!
//! Rust exposes no MMX intrinsics, so the loops are inline assembly. MMX
//! registers alias the x87 stack: after any MMX instruction the FPU tag word
//! reads "full" and x87 arithmetic produces garbage until `emms` runs. Each
//! asm block therefore ends with `emms`, and all accumulation goes through
//! [`MmxGuard`], whose drop issues `emms` again on the way out of the scope.

use std::arch::asm;
use std::marker::PhantomData;

use simdsum_core::Element;

use crate::lanes::{fold_in_order, BlockPlan};

const LANES: usize = 2;

/// Scoped ownership of the MMX/x87 register file.
///
/// Releases the register file on drop, whatever path leaves the scope.
/// Not `Send`: the register state belongs to the current thread.
pub struct MmxGuard {
    _thread_bound: PhantomData<*const ()>,
}

impl MmxGuard {
    /// # Safety
    /// The CPU must support MMX.
    #[inline]
    pub unsafe fn acquire() -> Self {
        Self {
            _thread_bound: PhantomData,
        }
    }

    /// Lane sums of `blocks` consecutive 2-lane blocks starting at `ptr`,
    /// using one accumulator.
    ///
    /// # Safety
    /// `ptr` must be valid for `blocks * 2` reads.
    #[inline]
    pub unsafe fn accumulate(&self, ptr: *const i32, blocks: usize) -> [i32; LANES] {
        let mut out = [0i32; LANES];
        // asm! needs the x87 tag word empty when the block exits.
        asm!(
            "pxor mm0, mm0",
            "test {n}, {n}",
            "jz 3f",
            "2:",
            "paddd mm0, qword ptr [{p}]",
            "add {p}, 8",
            "dec {n}",
            "jnz 2b",
            "3:",
            "movq qword ptr [{dst}], mm0",
            "emms",
            p = inout(reg) ptr => _,
            n = inout(reg) blocks => _,
            dst = in(reg) out.as_mut_ptr(),
            out("mm0") _, out("mm1") _, out("mm2") _, out("mm3") _,
            out("mm4") _, out("mm5") _, out("mm6") _, out("mm7") _,
            out("st(0)") _, out("st(1)") _, out("st(2)") _, out("st(3)") _,
            out("st(4)") _, out("st(5)") _, out("st(6)") _, out("st(7)") _,
            options(nostack),
        );
        out
    }

    /// Same as [`Self::accumulate`] over 8-element blocks with four
    /// accumulators, tree-combined as `(mm0 + mm1) + (mm2 + mm3)`.
    ///
    /// # Safety
    /// `ptr` must be valid for `blocks * 8` reads.
    #[inline]
    pub unsafe fn accumulate_x4(&self, ptr: *const i32, blocks: usize) -> [i32; LANES] {
        let mut out = [0i32; LANES];
        asm!(
            "pxor mm0, mm0",
            "pxor mm1, mm1",
            "pxor mm2, mm2",
            "pxor mm3, mm3",
            "test {n}, {n}",
            "jz 3f",
            "2:",
            "paddd mm0, qword ptr [{p}]",
            "paddd mm1, qword ptr [{p} + 8]",
            "paddd mm2, qword ptr [{p} + 16]",
            "paddd mm3, qword ptr [{p} + 24]",
            "add {p}, 32",
            "dec {n}",
            "jnz 2b",
            "3:",
            "paddd mm0, mm1",
            "paddd mm2, mm3",
            "paddd mm0, mm2",
            "movq qword ptr [{dst}], mm0",
            "emms",
            p = inout(reg) ptr => _,
            n = inout(reg) blocks => _,
            dst = in(reg) out.as_mut_ptr(),
            out("mm0") _, out("mm1") _, out("mm2") _, out("mm3") _,
            out("mm4") _, out("mm5") _, out("mm6") _, out("mm7") _,
            out("st(0)") _, out("st(1)") _, out("st(2)") _, out("st(3)") _,
            out("st(4)") _, out("st(5)") _, out("st(6)") _, out("st(7)") _,
            options(nostack),
        );
        out
    }
}

impl Drop for MmxGuard {
    fn drop(&mut self) {
        unsafe { asm!("emms", options(nomem, nostack, preserves_flags)) };
    }
}

#[inline(always)]
unsafe fn reduce_mmx(buf: &[i32], unroll: usize) -> i32 {
    let plan = BlockPlan::new(buf.len(), LANES, unroll);
    let lanes = {
        let guard = MmxGuard::acquire();
        if unroll == 1 {
            guard.accumulate(buf.as_ptr(), plan.blocks)
        } else {
            guard.accumulate_x4(buf.as_ptr(), plan.blocks)
        }
    };
    let total = lanes[0].accumulate(lanes[1]);
    fold_in_order(total, &buf[plan.tail_start..])
}

/// # Safety
/// Requires MMX.
pub unsafe fn sum_i32_mmx(buf: &[i32]) -> i32 {
    reduce_mmx(buf, 1)
}

/// # Safety
/// Requires MMX.
pub unsafe fn sum_i32_mmx_x4(buf: &[i32]) -> i32 {
    reduce_mmx(buf, 4)
}
