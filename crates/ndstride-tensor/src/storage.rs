//! Arc-based flat storage shared by every view of a tensor.
//!
//! A [`TensorStorage`] has no shape. It is a typed run of elements addressed
//! by linear offset, and any number of layouts may alias it. Writes go
//! through `&self`: aliasing views observe each other's mutations, which is
//! the contract views are built on.

use std::{alloc::Layout, ptr::NonNull, sync::Arc};

use crate::{
    allocator::CpuAllocator,
    dtype::Element,
    TensorError,
};

/// Inner storage that owns the allocation.
struct StorageImpl<T> {
    /// The pointer to the memory, non-null and aligned for `T`.
    ptr: NonNull<T>,
    /// Number of elements.
    len: usize,
    /// The memory layout used for allocation.
    layout: Layout,
}

impl<T> Drop for StorageImpl<T> {
    fn drop(&mut self) {
        // SAFETY: ptr and layout were created together during allocation
        unsafe { CpuAllocator::dealloc_elements(self.ptr, self.layout) };
    }
}

/// Reference-counted flat buffer of elements.
///
/// Clones share the same memory. Use [`TensorStorage::copy`] to break the
/// aliasing.
///
/// # Thread Safety
///
/// `TensorStorage` is `Send + Sync`, but it performs no synchronization of
/// element access. Concurrent mutation of overlapping ranges from different
/// threads is a precondition violation of the caller, exactly like mutating
/// overlapping views from one thread while holding a slice into them.
pub struct TensorStorage<T> {
    inner: Arc<StorageImpl<T>>,
}

impl<T: Element> TensorStorage<T> {
    /// Allocates uninitialized room for `len` elements.
    fn alloc(len: usize) -> Result<Arc<StorageImpl<T>>, TensorError> {
        let (ptr, layout) = CpuAllocator::alloc_elements::<T>(len)?;
        Ok(Arc::new(StorageImpl { ptr, len, layout }))
    }

    /// Creates a storage by copying the elements of a slice.
    pub fn from_slice(values: &[T]) -> Result<Self, TensorError> {
        let inner = Self::alloc(values.len())?;
        // SAFETY: fresh allocation of values.len() elements, regions don't overlap
        unsafe {
            std::ptr::copy_nonoverlapping(values.as_ptr(), inner.ptr.as_ptr(), values.len());
        }
        Ok(Self { inner })
    }

    /// Creates a storage from a vector.
    pub fn from_vec(values: Vec<T>) -> Result<Self, TensorError> {
        Self::from_slice(&values)
    }

    /// Creates a storage of `len` copies of `value`.
    pub fn from_elem(value: T, len: usize) -> Result<Self, TensorError> {
        let inner = Self::alloc(len)?;
        for i in 0..len {
            // SAFETY: i < len, within the fresh allocation
            unsafe { inner.ptr.as_ptr().add(i).write(value) };
        }
        Ok(Self { inner })
    }

    /// Creates a zero-filled storage.
    pub fn zeros(len: usize) -> Result<Self, TensorError> {
        Self::from_elem(T::zero(), len)
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len
    }

    /// True when the storage holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// Pointer to the first element.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.inner.ptr.as_ptr()
    }

    /// Mutable pointer to the first element.
    ///
    /// Available through `&self` because views share storage. The caller must
    /// not create overlapping references through it.
    #[inline]
    pub fn as_mut_ptr(&self) -> *mut T {
        self.inner.ptr.as_ptr()
    }

    /// Returns true if no other handle shares this storage.
    #[inline]
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.inner) == 1
    }

    /// Returns true if both handles share the same memory.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn check_range(&self, start: usize, len: usize) -> Result<(), TensorError> {
        match start.checked_add(len) {
            Some(end) if end <= self.len() => Ok(()),
            _ => Err(TensorError::index_out_of_bounds(
                start.saturating_add(len),
                self.len(),
            )),
        }
    }

    /// Reads the element at `offset`.
    #[inline]
    pub fn get(&self, offset: usize) -> Option<T> {
        if offset < self.len() {
            // SAFETY: bounds checked above
            Some(unsafe { self.get_unchecked(offset) })
        } else {
            None
        }
    }

    /// Writes the element at `offset`.
    #[inline]
    pub fn set(&self, offset: usize, value: T) -> Result<(), TensorError> {
        if offset >= self.len() {
            return Err(TensorError::index_out_of_bounds(offset, self.len()));
        }
        // SAFETY: bounds checked above
        unsafe { self.set_unchecked(offset, value) };
        Ok(())
    }

    /// Adds `value` to the element at `offset`, wrapping on integer overflow.
    pub fn inc(&self, offset: usize, value: T) -> Result<(), TensorError> {
        let current = self
            .get(offset)
            .ok_or(TensorError::index_out_of_bounds(offset, self.len()))?;
        // SAFETY: get succeeded, offset is in bounds
        unsafe { self.set_unchecked(offset, current.wrapping_add(value)) };
        Ok(())
    }

    /// Reads the element at `offset` without bounds checking.
    ///
    /// # Safety
    ///
    /// `offset` must be less than [`TensorStorage::len`].
    #[inline]
    pub unsafe fn get_unchecked(&self, offset: usize) -> T {
        self.inner.ptr.as_ptr().add(offset).read()
    }

    /// Writes the element at `offset` without bounds checking.
    ///
    /// # Safety
    ///
    /// `offset` must be less than [`TensorStorage::len`] and no reference to
    /// that element may be alive.
    #[inline]
    pub unsafe fn set_unchecked(&self, offset: usize, value: T) {
        self.inner.ptr.as_ptr().add(offset).write(value)
    }

    /// Borrows `len` elements starting at `start`.
    ///
    /// # Safety
    ///
    /// The range must be in bounds and must not be mutated through any alias
    /// while the slice is alive.
    #[inline]
    pub unsafe fn slice(&self, start: usize, len: usize) -> &[T] {
        std::slice::from_raw_parts(self.inner.ptr.as_ptr().add(start), len)
    }

    /// Mutably borrows `len` elements starting at `start`.
    ///
    /// # Safety
    ///
    /// The range must be in bounds and no other reference into it, through
    /// this handle or any alias, may be alive while the slice is.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slice_mut(&self, start: usize, len: usize) -> &mut [T] {
        std::slice::from_raw_parts_mut(self.inner.ptr.as_ptr().add(start), len)
    }

    /// Swaps two elements.
    pub fn swap(&self, i: usize, j: usize) -> Result<(), TensorError> {
        if i >= self.len() || j >= self.len() {
            return Err(TensorError::index_out_of_bounds(i.max(j), self.len()));
        }
        // SAFETY: both offsets checked; ptr::swap allows i == j
        unsafe {
            let ptr = self.inner.ptr.as_ptr();
            std::ptr::swap(ptr.add(i), ptr.add(j));
        }
        Ok(())
    }

    /// Sets `len` elements starting at `start` to `value`.
    pub fn fill(&self, value: T, start: usize, len: usize) -> Result<(), TensorError> {
        self.apply_range(start, len, |_| value)
    }

    /// Adds `value` to `len` elements starting at `start`.
    pub fn add(&self, start: usize, len: usize, value: T) -> Result<(), TensorError> {
        self.apply_range(start, len, |x| x.wrapping_add(value))
    }

    /// Subtracts `value` from `len` elements starting at `start`.
    pub fn sub(&self, start: usize, len: usize, value: T) -> Result<(), TensorError> {
        self.apply_range(start, len, |x| x.wrapping_sub(value))
    }

    /// Multiplies `len` elements starting at `start` by `value`.
    pub fn mul(&self, start: usize, len: usize, value: T) -> Result<(), TensorError> {
        self.apply_range(start, len, |x| x.wrapping_mul(value))
    }

    /// Divides `len` elements starting at `start` by `value`.
    ///
    /// Integer division by zero is rejected before any element changes, and
    /// `MIN / -1` wraps to `MIN`.
    pub fn div(&self, start: usize, len: usize, value: T) -> Result<(), TensorError> {
        if !T::DTYPE.is_floating_point() && value.is_zero() && len > 0 {
            return Err(TensorError::invalid_argument("integer division by zero"));
        }
        self.apply_range(start, len, |x| x.wrapping_div(value))
    }

    fn apply_range(&self, start: usize, len: usize, f: impl Fn(T) -> T) -> Result<(), TensorError> {
        self.check_range(start, len)?;
        // SAFETY: range checked; the caller contract excludes concurrent aliases
        let values = unsafe { self.slice_mut(start, len) };
        for value in values.iter_mut() {
            *value = f(*value);
        }
        Ok(())
    }

    /// Smallest of `len` elements starting at `start`, `None` on an empty range.
    ///
    /// NaN compares greater than every number.
    pub fn min(&self, start: usize, len: usize) -> Result<Option<T>, TensorError> {
        Ok(self
            .arg_min(start, len)?
            .and_then(|i| self.get(start + i)))
    }

    /// Position (relative to `start`) of the first smallest element.
    pub fn arg_min(&self, start: usize, len: usize) -> Result<Option<usize>, TensorError> {
        self.check_range(start, len)?;
        // SAFETY: range checked
        let values = unsafe { self.slice(start, len) };
        let mut best: Option<(usize, T)> = None;
        for (i, &value) in values.iter().enumerate() {
            match best {
                Some((_, current)) if value.cmp_nan_last(&current).is_ge() => {}
                _ => best = Some((i, value)),
            }
        }
        Ok(best.map(|(i, _)| i))
    }

    /// Reverses `len` elements starting at `start`.
    pub fn reverse(&self, start: usize, len: usize) -> Result<(), TensorError> {
        self.check_range(start, len)?;
        // SAFETY: range checked
        unsafe { self.slice_mut(start, len) }.reverse();
        Ok(())
    }

    /// Deep copy into a new, unshared storage.
    pub fn copy(&self) -> Result<Self, TensorError> {
        // SAFETY: whole range is in bounds
        Self::from_slice(unsafe { self.slice(0, self.len()) })
    }

    /// Copies the elements out into a vector.
    pub fn to_vec(&self) -> Vec<T> {
        // SAFETY: whole range is in bounds
        unsafe { self.slice(0, self.len()) }.to_vec()
    }

    /// Consumes the storage and returns its elements.
    ///
    /// Uniquely owned storage hands over its allocation without copying;
    /// shared storage is copied.
    pub fn into_vec(self) -> Vec<T> {
        match Arc::try_unwrap(self.inner) {
            Ok(inner) => {
                let ptr = inner.ptr;
                let len = inner.len;
                let zero_sized = inner.layout.size() == 0;
                std::mem::forget(inner);
                if zero_sized {
                    return Vec::new();
                }
                // SAFETY: the allocation came from the global allocator with
                // Layout::array::<T>(len), which is what Vec expects for capacity len
                unsafe { Vec::from_raw_parts(ptr.as_ptr(), len, len) }
            }
            Err(inner) => Self { inner }.to_vec(),
        }
    }
}

// SAFETY: the allocation is owned by the Arc and freed once. Element access
// through `&self` is unsynchronized and documented as a caller contract.
unsafe impl<T: Send> Send for TensorStorage<T> {}

// SAFETY: see Send. Overlapping concurrent writes are a caller precondition
// violation, non-overlapping writes touch disjoint memory.
unsafe impl<T: Sync> Sync for TensorStorage<T> {}

impl<T> Clone for TensorStorage<T> {
    /// Shares the same memory by incrementing the reference count.
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for TensorStorage<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TensorStorage")
            .field("ptr", &self.inner.ptr)
            .field("len", &self.inner.len)
            .field("refs", &Arc::strong_count(&self.inner))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_from_vec() -> Result<(), TensorError> {
        let storage = TensorStorage::<i32>::from_vec(vec![1, 2, 3, 4, 5])?;
        assert_eq!(storage.len(), 5);
        assert!(!storage.is_empty());
        assert_eq!(storage.to_vec(), vec![1, 2, 3, 4, 5]);
        assert_eq!(storage.get(4), Some(5));
        assert_eq!(storage.get(5), None);
        Ok(())
    }

    #[test]
    fn test_storage_into_vec() -> Result<(), TensorError> {
        let storage = TensorStorage::<f64>::from_vec(vec![1.0, 2.0, 3.0])?;
        assert_eq!(storage.into_vec(), vec![1.0, 2.0, 3.0]);

        let storage = TensorStorage::<f64>::from_vec(vec![1.0, 2.0])?;
        let shared = storage.clone();
        assert_eq!(storage.into_vec(), vec![1.0, 2.0]);
        assert_eq!(shared.get(1), Some(2.0));

        let empty = TensorStorage::<i8>::zeros(0)?;
        assert!(empty.is_empty());
        assert!(empty.into_vec().is_empty());
        Ok(())
    }

    #[test]
    fn test_storage_shared_mutation() -> Result<(), TensorError> {
        let a = TensorStorage::<i64>::zeros(4)?;
        let b = a.clone();
        assert!(!a.is_unique());
        assert!(a.ptr_eq(&b));
        b.set(2, 7)?;
        assert_eq!(a.get(2), Some(7));
        a.inc(2, 3)?;
        assert_eq!(b.get(2), Some(10));
        assert!(a.set(4, 1).is_err());
        Ok(())
    }

    #[test]
    fn test_storage_copy_breaks_aliasing() -> Result<(), TensorError> {
        let a = TensorStorage::<f32>::from_elem(1.0, 3)?;
        let b = a.copy()?;
        assert!(!a.ptr_eq(&b));
        b.set(0, 5.0)?;
        assert_eq!(a.get(0), Some(1.0));
        Ok(())
    }

    #[test]
    fn test_storage_range_arithmetic() -> Result<(), TensorError> {
        let storage = TensorStorage::<f64>::zeros(10)?;
        storage.fill(2.0, 2, 4)?;
        storage.add(0, 3, 1.0)?;
        storage.mul(2, 2, 3.0)?;
        storage.sub(5, 5, 1.0)?;
        storage.div(3, 1, 2.0)?;
        assert_eq!(
            storage.to_vec(),
            vec![1.0, 1.0, 9.0, 3.0, 2.0, 1.0, -1.0, -1.0, -1.0, -1.0]
        );
        assert!(storage.fill(0.0, 8, 3).is_err());
        Ok(())
    }

    #[test]
    fn test_storage_integer_division_by_zero() -> Result<(), TensorError> {
        let storage = TensorStorage::<i32>::from_vec(vec![4, 6])?;
        assert!(storage.div(0, 2, 0).is_err());
        assert_eq!(storage.to_vec(), vec![4, 6]);
        storage.div(0, 2, 2)?;
        assert_eq!(storage.to_vec(), vec![2, 3]);
        Ok(())
    }

    #[test]
    fn test_storage_integer_arithmetic_wraps() -> Result<(), TensorError> {
        let storage = TensorStorage::<i8>::from_vec(vec![127, 0, i8::MIN])?;
        storage.add(0, 2, 1)?;
        assert_eq!(storage.to_vec(), vec![i8::MIN, 1, i8::MIN]);
        storage.sub(2, 1, 1)?;
        storage.mul(1, 1, 127)?;
        assert_eq!(storage.to_vec(), vec![i8::MIN, 127, 127]);
        storage.div(0, 1, -1)?;
        storage.inc(2, 1)?;
        assert_eq!(storage.to_vec(), vec![i8::MIN, 127, i8::MIN]);
        Ok(())
    }

    #[test]
    fn test_storage_min_arg_min() -> Result<(), TensorError> {
        let storage = TensorStorage::<f64>::from_vec(vec![3.0, f64::NAN, 1.0, 5.0, 1.0])?;
        assert_eq!(storage.arg_min(0, 5)?, Some(2));
        assert_eq!(storage.min(0, 5)?, Some(1.0));
        assert_eq!(storage.arg_min(3, 2)?, Some(1));
        assert_eq!(storage.arg_min(1, 0)?, None);
        assert_eq!(storage.min(1, 0)?, None);
        assert!(storage.arg_min(4, 2).is_err());
        Ok(())
    }

    #[test]
    fn test_storage_swap_reverse() -> Result<(), TensorError> {
        let storage = TensorStorage::<i16>::from_vec((0..6).collect())?;
        storage.swap(0, 5)?;
        assert_eq!(storage.to_vec(), vec![5, 1, 2, 3, 4, 0]);
        storage.reverse(1, 4)?;
        assert_eq!(storage.to_vec(), vec![5, 4, 3, 2, 1, 0]);
        assert!(storage.swap(0, 6).is_err());
        Ok(())
    }
}
