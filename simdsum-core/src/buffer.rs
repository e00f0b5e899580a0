//! Owned, SIMD-aligned element buffers.
//!
//! The vector kernels use aligned loads (`movaps`, `vmovaps`, `movdqa`), so
//! the first element of every buffer they read must sit on a register-width
//! boundary. [`AlignedBuf`] guarantees the widest boundary any tier needs.
//!
//! # Example
//!
//! ```
//! use simdsum_core::{AlignedBuf, ALIGNMENT};
//!
//! let mut buf = AlignedBuf::<f32>::zeroed(409_600).unwrap();
//! buf.fill(1.0);
//! assert_eq!(buf.as_ptr() as usize % ALIGNMENT, 0);
//! assert_eq!(buf.len(), 409_600);
//! ```

use std::alloc;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::element::{Element, ElementFamily};
use crate::error::{Result, SumError};

/// Alignment for all buffers (one AVX register = 32 bytes).
pub const ALIGNMENT: usize = 32;

/// Heap buffer of `T` whose first element is [`ALIGNMENT`]-byte aligned.
///
/// # Safety model
///
/// The buffer owns a single allocation made with `Layout { size, ALIGNMENT }`
/// and frees it with the same layout on drop. Empty buffers allocate nothing
/// and use a dangling, suitably aligned pointer, which is valid for
/// zero-length slices.
pub struct AlignedBuf<T: Element> {
    ptr: NonNull<T>,
    len: usize,
    layout: Option<alloc::Layout>,
    _marker: PhantomData<T>,
}

// The buffer uniquely owns its elements, which are plain Send + Sync scalars.
unsafe impl<T: Element> Send for AlignedBuf<T> {}
unsafe impl<T: Element> Sync for AlignedBuf<T> {}

impl<T: Element> AlignedBuf<T> {
    /// Allocate a zero-initialized buffer of `len` elements.
    ///
    /// All-zero bytes are the additive identity for every [`Element`] type.
    pub fn zeroed(len: usize) -> Result<Self> {
        let byte_len = len
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(SumError::BufferTooLarge {
                len,
                family: T::FAMILY,
            })?;

        if byte_len == 0 {
            return Ok(Self {
                ptr: Self::dangling(),
                len: 0,
                layout: None,
                _marker: PhantomData,
            });
        }

        let layout = alloc::Layout::from_size_align(byte_len, ALIGNMENT).map_err(|_| {
            SumError::BufferTooLarge {
                len,
                family: T::FAMILY,
            }
        })?;
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw as *mut T) else {
            alloc::handle_alloc_error(layout);
        };

        Ok(Self {
            ptr,
            len,
            layout: Some(layout),
            _marker: PhantomData,
        })
    }

    /// Copy `src` into a fresh aligned buffer.
    pub fn from_slice(src: &[T]) -> Result<Self> {
        let mut buf = Self::zeroed(src.len())?;
        buf.copy_from_slice(src);
        Ok(buf)
    }

    /// Buffer of `len` copies of `value`.
    pub fn filled(len: usize, value: T) -> Result<Self> {
        let mut buf = Self::zeroed(len)?;
        buf.fill(value);
        Ok(buf)
    }

    /// Element family stored in this buffer.
    pub fn family(&self) -> ElementFamily {
        T::FAMILY
    }

    /// Guaranteed alignment of [`Self::as_ptr`] in bytes.
    pub fn alignment(&self) -> usize {
        ALIGNMENT
    }

    pub fn as_slice(&self) -> &[T] {
        // Safety: `ptr` is valid for `len` initialized elements (zeroed at
        // allocation, only written through `&mut self` since).
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    fn dangling() -> NonNull<T> {
        // An address equal to the alignment is non-null and aligned for both
        // `T` and the vector loads; nothing is ever read through it.
        NonNull::new(ALIGNMENT as *mut T).unwrap_or(NonNull::dangling())
    }
}

impl<T: Element> Drop for AlignedBuf<T> {
    fn drop(&mut self) {
        if let Some(layout) = self.layout {
            unsafe { alloc::dealloc(self.ptr.as_ptr() as *mut u8, layout) };
        }
    }
}

impl<T: Element> Deref for AlignedBuf<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Element> DerefMut for AlignedBuf<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Element> fmt::Debug for AlignedBuf<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuf")
            .field("family", &T::FAMILY)
            .field("len", &self.len)
            .field("ptr", &self.ptr)
            .finish()
    }
}
