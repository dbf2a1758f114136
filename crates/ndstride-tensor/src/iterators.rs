//! Lazy iteration over the storage offsets and indices of a layout.

use crate::{Order, Shape, StrideLayout};

/// Offsets of a layout that collapses to a single strided run.
#[derive(Clone, Debug)]
pub struct DensePointerIterator {
    next: isize,
    step: isize,
    remaining: usize,
}

impl Iterator for DensePointerIterator {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let pointer = self.next;
        self.remaining -= 1;
        self.next += self.step;
        Some(pointer as usize)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for DensePointerIterator {}

/// Offsets of an arbitrary layout, walked with per-axis counters.
///
/// Axis 0 of the internal dims is the fastest one.
#[derive(Clone, Debug)]
pub struct StridePointerIterator {
    dims: Vec<usize>,
    strides: Vec<isize>,
    counters: Vec<usize>,
    pointer: isize,
    remaining: usize,
}

impl StridePointerIterator {
    pub(crate) fn from_axes(offset: usize, dims: Vec<usize>, strides: Vec<isize>) -> Self {
        let remaining = dims.iter().product();
        let counters = vec![0; dims.len()];
        Self {
            dims,
            strides,
            counters,
            pointer: offset as isize,
            remaining,
        }
    }
}

impl Iterator for StridePointerIterator {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let pointer = self.pointer;
        self.remaining -= 1;
        if self.remaining > 0 {
            for k in 0..self.dims.len() {
                self.counters[k] += 1;
                self.pointer += self.strides[k];
                if self.counters[k] < self.dims[k] {
                    break;
                }
                self.pointer -= self.strides[k] * self.dims[k] as isize;
                self.counters[k] = 0;
            }
        }
        Some(pointer as usize)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for StridePointerIterator {}

/// Forward-only sequence of storage offsets in a traversal order.
///
/// Once exhausted it stays exhausted; build a new one to traverse again.
#[derive(Clone, Debug)]
pub enum PointerIterator {
    /// The layout collapses to one run with a single step.
    Dense(DensePointerIterator),
    /// General strided walk.
    Stride(StridePointerIterator),
}

impl PointerIterator {
    /// Creates the cheapest iterator for `layout` in `order`.
    pub fn new(layout: &StrideLayout, order: Order) -> Self {
        let (dims, strides) = layout.fortran_axes(order, true);
        if dims.len() == 1 {
            PointerIterator::Dense(DensePointerIterator {
                next: layout.offset() as isize,
                step: strides[0],
                remaining: layout.size(),
            })
        } else {
            PointerIterator::Stride(StridePointerIterator::from_axes(
                layout.offset(),
                dims,
                strides,
            ))
        }
    }

    /// True when driven by a single step.
    pub fn is_dense(&self) -> bool {
        matches!(self, PointerIterator::Dense(_))
    }
}

impl Iterator for PointerIterator {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        match self {
            PointerIterator::Dense(it) => it.next(),
            PointerIterator::Stride(it) => it.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            PointerIterator::Dense(it) => it.size_hint(),
            PointerIterator::Stride(it) => it.size_hint(),
        }
    }
}

impl ExactSizeIterator for PointerIterator {}

/// Multi-indices of a shape in `C` or `F` order.
///
/// `S` has no meaning without strides and walks in the default order.
#[derive(Clone, Debug)]
pub struct IndexIterator {
    dims: Vec<usize>,
    index: Vec<usize>,
    fortran: bool,
    remaining: usize,
}

impl IndexIterator {
    /// Creates an iterator over every index of `shape`.
    pub fn new(shape: &Shape, order: Order) -> Self {
        Self {
            dims: shape.dims().to_vec(),
            index: vec![0; shape.rank()],
            fortran: order.dense() == Order::F,
            remaining: shape.size(),
        }
    }
}

impl Iterator for IndexIterator {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.index.clone();
        self.remaining -= 1;
        let rank = self.dims.len();
        for k in 0..rank {
            let axis = if self.fortran { k } else { rank - 1 - k };
            self.index[axis] += 1;
            if self.index[axis] < self.dims[axis] {
                break;
            }
            self.index[axis] = 0;
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for IndexIterator {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TensorError;

    #[test]
    fn test_dense_iterator() {
        let layout = StrideLayout::of_dense([2, 3], 4, Order::C);
        let it = PointerIterator::new(&layout, Order::C);
        assert!(it.is_dense());
        assert_eq!(it.len(), 6);
        assert_eq!(it.collect::<Vec<_>>(), vec![4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_strided_iterator_orders() {
        let layout = StrideLayout::of_dense([2, 3], 0, Order::C);
        let f = PointerIterator::new(&layout, Order::F);
        assert!(!f.is_dense());
        assert_eq!(f.collect::<Vec<_>>(), vec![0, 3, 1, 4, 2, 5]);

        let flayout = StrideLayout::of_dense([2, 3], 0, Order::F);
        let s = PointerIterator::new(&flayout, Order::S);
        assert!(s.is_dense());
        assert_eq!(s.collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_iterator_negative_and_zero_strides() -> Result<(), TensorError> {
        let layout = StrideLayout::of_dense([2, 3], 0, Order::C).flip(1)?;
        let ptrs: Vec<usize> = PointerIterator::new(&layout, Order::C).collect();
        assert_eq!(ptrs, vec![2, 1, 0, 5, 4, 3]);

        let bcast = StrideLayout::of_dense([3, 1], 0, Order::C).expand(1, 2)?;
        let ptrs: Vec<usize> = PointerIterator::new(&bcast, Order::C).collect();
        assert_eq!(ptrs, vec![0, 0, 1, 1, 2, 2]);
        Ok(())
    }

    #[test]
    fn test_iterator_not_restartable() {
        let layout = StrideLayout::of_dense([2, 2], 0, Order::C);
        let mut it = PointerIterator::new(&layout, Order::C);
        assert_eq!(it.by_ref().count(), 4);
        assert_eq!(it.next(), None);
        assert_eq!(PointerIterator::new(&layout, Order::C).count(), 4);
    }

    #[test]
    fn test_empty_and_scalar() {
        let empty = StrideLayout::of_dense([2, 0, 3], 0, Order::C);
        assert_eq!(PointerIterator::new(&empty, Order::S).count(), 0);
        let scalar = StrideLayout::scalar(3);
        assert_eq!(PointerIterator::new(&scalar, Order::C).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_index_iterator() {
        let shape = Shape::from([2, 2]);
        let c: Vec<Vec<usize>> = IndexIterator::new(&shape, Order::C).collect();
        assert_eq!(c, vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
        let f: Vec<Vec<usize>> = IndexIterator::new(&shape, Order::F).collect();
        assert_eq!(f, vec![vec![0, 0], vec![1, 0], vec![0, 1], vec![1, 1]]);
        let scalar: Vec<Vec<usize>> = IndexIterator::new(&Shape::scalar(), Order::C).collect();
        assert_eq!(scalar, vec![Vec::<usize>::new()]);
    }
}
