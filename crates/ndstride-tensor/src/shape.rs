//! Immutable dimension vectors shared between views.

use std::sync::Arc;

use crate::{error::check_axis, Order, TensorError};

/// The dimensions of a tensor, one entry per axis.
///
/// Cloning is cheap: views that keep the same dimensions share one
/// allocation.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Arc<[usize]>,
}

impl Shape {
    /// Creates a shape from its dimensions.
    pub fn new(dims: &[usize]) -> Self {
        Self { dims: dims.into() }
    }

    /// The rank-0 shape of a scalar.
    pub fn scalar() -> Self {
        Self::new(&[])
    }

    /// Number of axes.
    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// The dimensions as a slice.
    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Size of one axis.
    pub fn dim(&self, axis: usize) -> Result<usize, TensorError> {
        check_axis(axis, self.rank())?;
        Ok(self.dims[axis])
    }

    /// Total number of elements. The empty shape has size 1.
    #[inline]
    pub fn size(&self) -> usize {
        self.dims.iter().product()
    }

    /// True when some axis has size 0.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of axes with size 1.
    pub fn unit_dim_count(&self) -> usize {
        self.dims.iter().filter(|&&d| d == 1).count()
    }

    /// Dense strides for this shape in the given order.
    ///
    /// `S` is treated as the default order.
    pub fn dense_strides(&self, order: Order) -> Vec<isize> {
        let mut strides = vec![0isize; self.rank()];
        let mut acc = 1isize;
        match order.dense() {
            Order::F => {
                for (stride, &dim) in strides.iter_mut().zip(self.dims.iter()) {
                    *stride = acc;
                    acc *= dim as isize;
                }
            }
            _ => {
                for (stride, &dim) in strides.iter_mut().zip(self.dims.iter()).rev() {
                    *stride = acc;
                    acc *= dim as isize;
                }
            }
        }
        strides
    }

    /// Linear position of a multi-index inside a dense buffer of this shape.
    pub fn position(&self, order: Order, index: &[usize]) -> Result<usize, TensorError> {
        if index.len() != self.rank() {
            return Err(TensorError::dimension_mismatch(
                "index length must equal rank",
                self.dims(),
                index,
            ));
        }
        let strides = self.dense_strides(order);
        let mut pos = 0usize;
        for ((&i, &dim), &stride) in index.iter().zip(self.dims.iter()).zip(strides.iter()) {
            if i >= dim {
                return Err(TensorError::index_out_of_bounds(i, dim));
            }
            pos += i * stride as usize;
        }
        Ok(pos)
    }

    /// Inverse of [`Shape::position`].
    pub fn index(&self, order: Order, pos: usize) -> Result<Vec<usize>, TensorError> {
        if pos >= self.size() {
            return Err(TensorError::index_out_of_bounds(pos, self.size()));
        }
        let strides = self.dense_strides(order);
        let mut axes: Vec<usize> = (0..self.rank()).collect();
        axes.sort_by_key(|&axis| std::cmp::Reverse(strides[axis]));
        let mut rem = pos;
        let mut index = vec![0; self.rank()];
        for axis in axes {
            let stride = strides[axis] as usize;
            index[axis] = rem / stride;
            rem %= stride;
        }
        Ok(index)
    }

    /// Broadcasts two shapes against each other, aligning trailing axes.
    ///
    /// Each pair of aligned dimensions must be equal or contain a 1.
    pub fn broadcast(&self, other: &Shape) -> Result<Shape, TensorError> {
        let rank = self.rank().max(other.rank());
        let mut dims = vec![0; rank];
        for (k, dim) in dims.iter_mut().enumerate() {
            let a = dim_from_end(self.dims(), rank - 1 - k);
            let b = dim_from_end(other.dims(), rank - 1 - k);
            *dim = match (a, b) {
                (a, b) if a == b => a,
                (1, b) => b,
                (a, 1) => a,
                _ => {
                    return Err(TensorError::dimension_mismatch(
                        "shapes cannot be broadcast together",
                        self.dims(),
                        other.dims(),
                    ))
                }
            };
        }
        Ok(Shape::new(&dims))
    }
}

fn dim_from_end(dims: &[usize], back: usize) -> usize {
    if back < dims.len() {
        dims[dims.len() - 1 - back]
    } else {
        1
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self { dims: dims.into() }
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims)
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Self::new(&dims)
    }
}

impl AsRef<[usize]> for Shape {
    fn as_ref(&self) -> &[usize] {
        &self.dims
    }
}

impl std::fmt::Debug for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Shape{self}")
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("(")?;
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{dim}")?;
        }
        f.write_str(")")
    }
}
