//! Zero-copy view transforms and index selection.
//!
//! Every function here returns tensors sharing the storage of `self`,
//! except [`Tensor::sel`] on an irregular index list, which has to gather
//! into a new buffer.

use crate::{Element, Order, Shape, StrideLayout, Tensor, TensorError};

/// How an index list along one axis is served.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    /// One index: a width-1 narrow.
    SingleIndex(usize),
    /// Indices `start, start + step, ...`: a view with a scaled stride.
    /// A zero step repeats one index and a negative step walks backwards.
    Progression {
        /// First selected index.
        start: usize,
        /// Constant difference between consecutive indices.
        step: isize,
    },
    /// Anything else: materialized by concatenating width-1 narrows.
    Gather,
}

impl Selection {
    /// Classifies a non-empty index list.
    pub fn classify(indices: &[usize]) -> Result<Selection, TensorError> {
        match indices {
            [] => Err(TensorError::invalid_argument("indices cannot be empty")),
            [index] => Ok(Selection::SingleIndex(*index)),
            [first, second, ..] => {
                let step = *second as isize - *first as isize;
                let regular = indices
                    .windows(2)
                    .all(|w| w[1] as isize - w[0] as isize == step);
                if regular {
                    Ok(Selection::Progression {
                        start: *first,
                        step,
                    })
                } else {
                    Ok(Selection::Gather)
                }
            }
        }
    }

    /// True when the selection can be served as a view.
    pub fn is_view(&self) -> bool {
        !matches!(self, Selection::Gather)
    }
}

impl<T: Element> Tensor<T> {
    /// Removes every unit axis.
    pub fn squeeze(&self) -> Tensor<T> {
        self.with_layout(self.layout.squeeze())
    }

    /// Removes the given unit axes.
    pub fn squeeze_axes(&self, axes: &[usize]) -> Result<Tensor<T>, TensorError> {
        Ok(self.with_layout(self.layout.squeeze_axes(axes)?))
    }

    /// Inserts unit axes at the given positions of the result.
    pub fn stretch(&self, axes: &[usize]) -> Result<Tensor<T>, TensorError> {
        Ok(self.with_layout(self.layout.stretch(axes)?))
    }

    /// Broadcasts a unit axis to `size` without copying.
    pub fn expand(&self, axis: usize, size: usize) -> Result<Tensor<T>, TensorError> {
        Ok(self.with_layout(self.layout.expand(axis, size)?))
    }

    /// Broadcasts to `shape`, aligning trailing axes.
    ///
    /// Missing leading axes are inserted, unit axes are expanded. Axes that
    /// are neither equal nor unit are an error.
    pub fn broadcast_to(&self, shape: &Shape) -> Result<Tensor<T>, TensorError> {
        if shape.rank() < self.rank() {
            return Err(TensorError::dimension_mismatch(
                "cannot broadcast to a lower rank",
                shape.dims(),
                self.shape().dims(),
            ));
        }
        let extra: Vec<usize> = (0..shape.rank() - self.rank()).collect();
        let mut layout = self.layout.stretch(&extra)?;
        for (axis, &target) in shape.dims().iter().enumerate() {
            let dim = layout.dims()[axis];
            if dim == target {
                continue;
            }
            if dim != 1 {
                return Err(TensorError::dimension_mismatch(
                    "shapes cannot be broadcast together",
                    shape.dims(),
                    self.shape().dims(),
                ));
            }
            layout = layout.expand(axis, target)?;
        }
        Ok(self.with_layout(layout))
    }

    /// Reorders axes: axis `i` of the result is axis `perm[i]` of `self`.
    pub fn permute(&self, perm: &[usize]) -> Result<Tensor<T>, TensorError> {
        Ok(self.with_layout(self.layout.permute(perm)?))
    }

    /// Reverses all axes; the transpose for matrices.
    pub fn t(&self) -> Tensor<T> {
        self.with_layout(self.layout.revert())
    }

    /// Moves axis `src` to position `dst`.
    pub fn move_axis(&self, src: usize, dst: usize) -> Result<Tensor<T>, TensorError> {
        Ok(self.with_layout(self.layout.move_axis(src, dst)?))
    }

    /// Swaps two axes.
    pub fn swap_axis(&self, a: usize, b: usize) -> Result<Tensor<T>, TensorError> {
        Ok(self.with_layout(self.layout.swap_axis(a, b)?))
    }

    /// Restricts one axis to `[start, end)`.
    pub fn narrow(
        &self,
        axis: usize,
        keep_dim: bool,
        start: usize,
        end: usize,
    ) -> Result<Tensor<T>, TensorError> {
        Ok(self.with_layout(self.layout.narrow(axis, keep_dim, start, end)?))
    }

    /// Restricts every axis to `[starts[i], ends[i])`.
    pub fn narrow_all(
        &self,
        keep_dim: bool,
        starts: &[usize],
        ends: &[usize],
    ) -> Result<Tensor<T>, TensorError> {
        Ok(self.with_layout(self.layout.narrow_all(keep_dim, starts, ends)?))
    }

    /// Reverses the direction of one axis.
    pub fn flip(&self, axis: usize) -> Result<Tensor<T>, TensorError> {
        Ok(self.with_layout(self.layout.flip(axis)?))
    }

    /// Selects `indices` along `axis`.
    ///
    /// Single indices and arithmetic progressions produce views. Any other
    /// index list is gathered into a new buffer laid out in `order`.
    pub fn sel(&self, order: Order, axis: usize, indices: &[usize]) -> Result<Tensor<T>, TensorError> {
        let dim = self.dim(axis)?;
        if let Some(&bad) = indices.iter().find(|&&i| i >= dim) {
            return Err(TensorError::index_out_of_bounds(bad, dim));
        }
        let selection = Selection::classify(indices)?;
        log::debug!("sel on axis {axis} of {} served as {selection:?}", self.shape());
        match selection {
            Selection::SingleIndex(index) => self.narrow(axis, true, index, index + 1),
            Selection::Progression { start, step } => {
                let stride = self.layout.strides()[axis];
                let mut dims = self.shape().dims().to_vec();
                let mut strides = self.strides().to_vec();
                dims[axis] = indices.len();
                strides[axis] = stride * step;
                let offset = (self.offset() as isize + start as isize * stride) as usize;
                let layout = StrideLayout::new(Shape::from(dims), offset, strides)?;
                Ok(self.with_layout(layout))
            }
            Selection::Gather => {
                let slices = indices
                    .iter()
                    .map(|&i| self.narrow(axis, true, i, i + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                Tensor::cat(order, axis, &slices)
            }
        }
    }

    /// Same as [`Tensor::sel`].
    pub fn take(&self, order: Order, axis: usize, indices: &[usize]) -> Result<Tensor<T>, TensorError> {
        self.sel(order, axis, indices)
    }

    /// Selects one index along `axis` and drops the axis.
    pub fn sel_squeeze(&self, axis: usize, index: usize) -> Result<Tensor<T>, TensorError> {
        self.narrow(axis, false, index, index + 1)
    }

    /// Selects every index along `axis` except `indices`.
    pub fn remove(&self, order: Order, axis: usize, indices: &[usize]) -> Result<Tensor<T>, TensorError> {
        let dim = self.dim(axis)?;
        let keep: Vec<usize> = (0..dim).filter(|i| !indices.contains(i)).collect();
        self.sel(order, axis, &keep)
    }

    /// Splits `axis` at the given start positions.
    ///
    /// Piece `i` covers `[indices[i], indices[i + 1])`, the last one runs to
    /// the end of the axis.
    pub fn split(&self, axis: usize, keep_dim: bool, indices: &[usize]) -> Result<Vec<Tensor<T>>, TensorError> {
        let dim = self.dim(axis)?;
        indices
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = indices.get(i + 1).copied().unwrap_or(dim);
                self.narrow(axis, keep_dim, start, end)
            })
            .collect()
    }

    /// Splits every axis at once, returning the cross product of pieces with
    /// the last axis varying fastest.
    pub fn split_all(&self, keep_dim: bool, indices: &[Vec<usize>]) -> Result<Vec<Tensor<T>>, TensorError> {
        let rank = self.rank();
        if indices.len() != rank {
            return Err(TensorError::invalid_argument(format!(
                "split_all needs {rank} index lists, got {}",
                indices.len()
            )));
        }
        if indices.iter().any(|list| list.is_empty()) {
            return Ok(Vec::new());
        }
        let dims = self.shape().dims();
        let mut counters = vec![0usize; rank];
        let mut starts = vec![0usize; rank];
        let mut ends = vec![0usize; rank];
        let total: usize = indices.iter().map(Vec::len).product();
        let mut pieces = Vec::with_capacity(total);
        for _ in 0..total {
            for axis in 0..rank {
                let list = &indices[axis];
                starts[axis] = list[counters[axis]];
                ends[axis] = list.get(counters[axis] + 1).copied().unwrap_or(dims[axis]);
            }
            pieces.push(self.narrow_all(keep_dim, &starts, &ends)?);
            for axis in (0..rank).rev() {
                counters[axis] += 1;
                if counters[axis] < indices[axis].len() {
                    break;
                }
                counters[axis] = 0;
            }
        }
        Ok(pieces)
    }

    /// Splits `axis` into pieces of `step` elements, the last one possibly
    /// shorter.
    pub fn chunk(&self, axis: usize, keep_dim: bool, step: usize) -> Result<Vec<Tensor<T>>, TensorError> {
        let dim = self.dim(axis)?;
        self.split(axis, keep_dim, &chunk_starts(dim, step)?)
    }

    /// Chunks every axis with its own step.
    pub fn chunk_all(&self, keep_dim: bool, steps: &[usize]) -> Result<Vec<Tensor<T>>, TensorError> {
        if steps.len() != self.rank() {
            return Err(TensorError::invalid_argument(format!(
                "chunk_all needs {} steps, got {}",
                self.rank(),
                steps.len()
            )));
        }
        let indices = self
            .shape()
            .dims()
            .iter()
            .zip(steps)
            .map(|(&dim, &step)| chunk_starts(dim, step))
            .collect::<Result<Vec<_>, _>>()?;
        self.split_all(keep_dim, &indices)
    }

    /// One view per index of `axis`.
    pub fn unbind(&self, axis: usize, keep_dim: bool) -> Result<Vec<Tensor<T>>, TensorError> {
        self.chunk(axis, keep_dim, 1)
    }
}

fn chunk_starts(dim: usize, step: usize) -> Result<Vec<usize>, TensorError> {
    if step == 0 {
        return Err(TensorError::invalid_argument("chunk step must be positive"));
    }
    Ok((0..dim).step_by(step).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_selection() -> Result<(), TensorError> {
        assert_eq!(Selection::classify(&[3])?, Selection::SingleIndex(3));
        assert_eq!(
            Selection::classify(&[0, 2, 4])?,
            Selection::Progression { start: 0, step: 2 }
        );
        assert_eq!(
            Selection::classify(&[1, 1, 1])?,
            Selection::Progression { start: 1, step: 0 }
        );
        assert_eq!(
            Selection::classify(&[4, 2])?,
            Selection::Progression { start: 4, step: -2 }
        );
        assert_eq!(Selection::classify(&[0, 2, 3])?, Selection::Gather);
        assert!(Selection::classify(&[]).is_err());
        Ok(())
    }

    #[test]
    fn sel_progression_is_view() -> Result<(), TensorError> {
        let t = Tensor::<f64>::seq([4, 3])?;
        let s = t.sel(Order::C, 0, &[0, 2])?;
        assert!(s.shares_storage(&t));
        assert_eq!(s.shape().dims(), &[2, 3]);
        assert_eq!(s.to_vec(Order::C), vec![0.0, 1.0, 2.0, 6.0, 7.0, 8.0]);

        let back = t.sel(Order::C, 1, &[2, 1, 0])?;
        assert!(back.shares_storage(&t));
        assert_eq!(back.get(&[1, 0])?, 5.0);

        let one = t.sel(Order::C, 1, &[1])?;
        assert_eq!(one.shape().dims(), &[4, 1]);
        assert_eq!(one.strides(), &[3, 1]);
        Ok(())
    }

    #[test]
    fn sel_gather_copies() -> Result<(), TensorError> {
        let t = Tensor::<i32>::seq([4, 3])?;
        let g = t.sel(Order::F, 0, &[3, 0, 1])?;
        assert!(!g.shares_storage(&t));
        assert!(g.layout().is_f_ordered());
        assert_eq!(g.to_vec(Order::C), vec![9, 10, 11, 0, 1, 2, 3, 4, 5]);
        assert!(t.sel(Order::C, 0, &[4]).is_err());
        assert!(t.sel(Order::C, 2, &[0]).is_err());
        Ok(())
    }

    #[test]
    fn remove_and_sel_squeeze() -> Result<(), TensorError> {
        let t = Tensor::<i64>::seq([4, 3])?;
        let r = t.remove(Order::C, 0, &[1])?;
        assert_eq!(r.to_vec(Order::C), vec![0, 1, 2, 6, 7, 8, 9, 10, 11]);
        let odd = t.remove(Order::C, 0, &[0, 2])?;
        assert!(odd.shares_storage(&t));
        let col = t.sel_squeeze(1, 2)?;
        assert_eq!(col.shape().dims(), &[4]);
        assert_eq!(col.to_vec(Order::C), vec![2, 5, 8, 11]);
        Ok(())
    }

    #[test]
    fn split_and_chunk() -> Result<(), TensorError> {
        let t = Tensor::<f32>::seq([5, 2])?;
        let parts = t.split(0, true, &[0, 2])?;
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].shape().dims(), &[2, 2]);
        assert_eq!(parts[1].shape().dims(), &[3, 2]);

        let chunks = t.chunk(0, true, 2)?;
        let dims: Vec<usize> = chunks.iter().map(|c| c.dim(0)).collect::<Result<_, _>>()?;
        assert_eq!(dims, vec![2, 2, 1]);
        assert!(t.chunk(0, true, 0).is_err());

        let rows = t.unbind(0, false)?;
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[4].to_vec(Order::C), vec![8.0, 9.0]);
        Ok(())
    }

    #[test]
    fn split_all_cross_product() -> Result<(), TensorError> {
        let t = Tensor::<i32>::seq([4, 4])?;
        let blocks = t.chunk_all(true, &[2, 3])?;
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0].shape().dims(), &[2, 3]);
        assert_eq!(blocks[1].shape().dims(), &[2, 1]);
        assert_eq!(blocks[3].to_vec(Order::C), vec![11, 15]);
        assert!(t.split_all(true, &[vec![0]]).is_err());
        Ok(())
    }

    #[test]
    fn broadcast_to_shares_cells() -> Result<(), TensorError> {
        let t = Tensor::<f64>::from_shape_vec([3, 1], vec![1.0, 2.0, 3.0])?;
        let b = t.broadcast_to(&Shape::from([2, 3, 4]))?;
        assert_eq!(b.shape().dims(), &[2, 3, 4]);
        assert_eq!(b.get(&[1, 2, 3])?, 3.0);
        assert!(b.layout().has_broadcast_axes());
        assert!(t.broadcast_to(&Shape::from([2, 4])).is_err());
        Ok(())
    }
}
