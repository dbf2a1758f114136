use std::alloc::{self, Layout};
use std::ptr::NonNull;

use thiserror::Error;

/// An error type for storage allocation.
#[derive(Debug, Error, PartialEq)]
pub enum TensorAllocatorError {
    /// The element count overflows the address space for this element type.
    #[error("Invalid storage layout {0}")]
    LayoutError(core::alloc::LayoutError),

    /// The system allocator returned a null pointer.
    #[error("Null pointer")]
    NullPointer,
}

/// Element buffers backed by the global system allocator.
///
/// A buffer of `len` elements is laid out exactly like the buffer of a
/// `Vec<T>` with capacity `len`, so uniquely owned storage can be handed
/// back as a `Vec` without copying.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuAllocator;

impl CpuAllocator {
    /// Allocates uninitialized room for `len` elements of `T`.
    ///
    /// Empty buffers never reach the system allocator: they get a dangling
    /// pointer aligned for `T`.
    pub fn alloc_elements<T>(len: usize) -> Result<(NonNull<T>, Layout), TensorAllocatorError> {
        let layout = Layout::array::<T>(len).map_err(TensorAllocatorError::LayoutError)?;
        if layout.size() == 0 {
            return Ok((NonNull::dangling(), layout));
        }
        // SAFETY: the layout has a non-zero size
        let raw = unsafe { alloc::alloc(layout) } as *mut T;
        let ptr = NonNull::new(raw).ok_or(TensorAllocatorError::NullPointer)?;
        Ok((ptr, layout))
    }

    /// Frees a buffer returned by [`CpuAllocator::alloc_elements`].
    ///
    /// # Safety
    ///
    /// `ptr` and `layout` must come from the same `alloc_elements` call and
    /// the buffer must not have been freed or handed to a `Vec` already.
    pub unsafe fn dealloc_elements<T>(ptr: NonNull<T>, layout: Layout) {
        if layout.size() != 0 {
            alloc::dealloc(ptr.as_ptr() as *mut u8, layout);
        }
    }
}
