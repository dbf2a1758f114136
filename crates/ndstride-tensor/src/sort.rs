//! In-place sorting along an axis and indirect sorting of flat tensors.

use std::cmp::Ordering;

use crate::{
    error::check_axis, iterators::PointerIterator, storage::TensorStorage, Element, Order, Tensor,
    TensorError,
};

/// A one-dimensional run of elements addressed by start and stride.
struct StrideRun<'a, T: Element> {
    storage: &'a TensorStorage<T>,
    start: isize,
    stride: isize,
    len: usize,
}

impl<T: Element> StrideRun<'_, T> {
    #[inline]
    fn offset(&self, i: usize) -> usize {
        (self.start + i as isize * self.stride) as usize
    }

    #[inline]
    fn get(&self, i: usize) -> T {
        // SAFETY: i < len and the run comes from a layout valid for storage
        unsafe { self.storage.get_unchecked(self.offset(i)) }
    }

    #[inline]
    fn swap(&self, i: usize, j: usize) {
        let (a, b) = (self.get(i), self.get(j));
        // SAFETY: see get; the run does not overlap itself
        unsafe {
            self.storage.set_unchecked(self.offset(i), b);
            self.storage.set_unchecked(self.offset(j), a);
        }
    }

    /// Heapsort with `cmp`, no allocation.
    fn sort_by(&self, cmp: impl Fn(&T, &T) -> Ordering) {
        let less = |i: usize, j: usize| cmp(&self.get(i), &self.get(j)) == Ordering::Less;
        let sift_down = |mut root: usize, end: usize| loop {
            let mut child = 2 * root + 1;
            if child >= end {
                break;
            }
            if child + 1 < end && less(child, child + 1) {
                child += 1;
            }
            if !less(root, child) {
                break;
            }
            self.swap(root, child);
            root = child;
        };
        for root in (0..self.len / 2).rev() {
            sift_down(root, self.len);
        }
        for end in (1..self.len).rev() {
            self.swap(0, end);
            sift_down(0, end);
        }
    }
}

fn comparator<T: Element>(asc: bool) -> impl Fn(&T, &T) -> Ordering {
    move |a: &T, b: &T| {
        let ord = a.cmp_nan_last(b);
        if asc {
            ord
        } else {
            ord.reverse()
        }
    }
}

impl<T: Element> Tensor<T> {
    /// Sorts every run along `axis` in place.
    ///
    /// The other axes are enumerated and each run is sorted where it lives,
    /// without a contiguous copy. NaN sorts after every number in ascending
    /// order. Views sharing the storage observe the new order.
    ///
    /// # Errors
    ///
    /// Fails without touching any element when `axis` is out of range or
    /// when the layout maps several elements onto one storage cell.
    pub fn sort_inplace(&mut self, axis: usize, asc: bool) -> Result<(), TensorError> {
        check_axis(axis, self.rank())?;
        if !self.layout.is_non_overlapping() {
            return Err(TensorError::unsupported_operation(
                "sort",
                "layout maps several elements to one storage cell",
            ));
        }
        let len = self.layout.dims()[axis];
        if len < 2 || self.is_empty() {
            return Ok(());
        }
        let stride = self.layout.strides()[axis];
        let outer = self.layout.without_axis(axis)?;
        let cmp = comparator::<T>(asc);
        for start in PointerIterator::new(&outer, Order::S) {
            let run = StrideRun {
                storage: &self.storage,
                start: start as isize,
                stride,
                len,
            };
            run.sort_by(&cmp);
        }
        Ok(())
    }

    /// Returns a sorted copy, leaving `self` untouched.
    pub fn sorted(&self, order: Order, axis: usize, asc: bool) -> Result<Tensor<T>, TensorError> {
        check_axis(axis, self.rank())?;
        let mut copy = self.copy(order)?;
        copy.sort_inplace(axis, asc)?;
        Ok(copy)
    }

    /// Reorders `indices` so that the values they point at are sorted.
    ///
    /// The tensor itself is not modified. The sort is stable.
    ///
    /// # Errors
    ///
    /// Fails when the tensor is not rank 1 or an index is out of range.
    pub fn arg_sort(&self, indices: &mut [usize], asc: bool) -> Result<(), TensorError> {
        if self.rank() != 1 {
            return Err(TensorError::unsupported_operation(
                "arg_sort",
                format!("not flat: tensor has rank {}", self.rank()),
            ));
        }
        let size = self.size();
        if let Some(&bad) = indices.iter().find(|&&i| i >= size) {
            return Err(TensorError::index_out_of_bounds(bad, size));
        }
        let run = StrideRun {
            storage: &self.storage,
            start: self.offset() as isize,
            stride: self.strides()[0],
            len: size,
        };
        let cmp = comparator::<T>(asc);
        indices.sort_by(|&a, &b| cmp(&run.get(a), &run.get(b)));
        Ok(())
    }
}
