//! Stride layouts: how a multi-index maps to a linear storage offset.
//!
//! Every view transform produces a new [`StrideLayout`] in `O(rank)` and
//! leaves the original untouched.

use crate::{
    error::{check_axes, check_axis},
    Order, Shape, TensorError,
};

/// Shape, base offset and per-axis strides of a tensor view.
///
/// The linear offset of `index` is `offset + sum(index[i] * strides[i])`.
/// Strides may be zero (broadcast axes) or negative (flipped axes).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StrideLayout {
    shape: Shape,
    offset: usize,
    strides: Vec<isize>,
    c_ordered: bool,
    f_ordered: bool,
}

impl StrideLayout {
    /// Creates a layout, checking that there is one stride per axis.
    pub fn new(shape: Shape, offset: usize, strides: Vec<isize>) -> Result<Self, TensorError> {
        if strides.len() != shape.rank() {
            return Err(TensorError::invalid_argument(format!(
                "layout of rank {} needs {} strides, got {}",
                shape.rank(),
                shape.rank(),
                strides.len()
            )));
        }
        Ok(Self::from_parts(shape, offset, strides))
    }

    fn from_parts(shape: Shape, offset: usize, strides: Vec<isize>) -> Self {
        let (c_ordered, f_ordered) = ordering_flags(shape.dims(), &strides);
        Self {
            shape,
            offset,
            strides,
            c_ordered,
            f_ordered,
        }
    }

    /// Dense layout of `shape` in the given order, starting at `offset`.
    pub fn of_dense(shape: impl Into<Shape>, offset: usize, order: Order) -> Self {
        let shape = shape.into();
        let strides = shape.dense_strides(order);
        Self::from_parts(shape, offset, strides)
    }

    /// Rank-0 layout addressing a single offset.
    pub fn scalar(offset: usize) -> Self {
        Self::from_parts(Shape::scalar(), offset, Vec::new())
    }

    /// The shape of the layout.
    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// The dimensions of the layout.
    #[inline]
    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    /// Number of axes.
    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    /// Number of logical elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.shape.size()
    }

    /// Size of one axis.
    pub fn dim(&self, axis: usize) -> Result<usize, TensorError> {
        self.shape.dim(axis)
    }

    /// Base offset into storage.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Per-axis strides.
    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Stride of one axis.
    pub fn stride(&self, axis: usize) -> Result<isize, TensorError> {
        check_axis(axis, self.rank())?;
        Ok(self.strides[axis])
    }

    /// True when each stride is the next one times the next dimension,
    /// ignoring unit axes. Always true below two non-unit axes.
    #[inline]
    pub fn is_c_ordered(&self) -> bool {
        self.c_ordered
    }

    /// Mirror of [`StrideLayout::is_c_ordered`] for column-major strides.
    #[inline]
    pub fn is_f_ordered(&self) -> bool {
        self.f_ordered
    }

    /// True when the elements occupy one contiguous block in C or F order.
    pub fn is_dense(&self) -> bool {
        let mut non_unit = self
            .dims()
            .iter()
            .zip(self.strides.iter())
            .filter(|(&d, _)| d != 1)
            .map(|(_, &s)| s);
        let first = non_unit.next();
        let last = non_unit.last().or(first);
        match (first, last) {
            (None, _) | (_, None) => true,
            (Some(first), Some(last)) => {
                (self.c_ordered && last == 1) || (self.f_ordered && first == 1)
            }
        }
    }

    /// The order in which this layout is fastest to traverse on its own.
    pub fn storage_fast_order(&self) -> Order {
        if self.dims().iter().filter(|&&d| d != 1).count() < 2 {
            return Order::default();
        }
        if self.f_ordered {
            return Order::F;
        }
        if self.c_ordered {
            return Order::C;
        }
        Order::S
    }

    /// The order that is fast for every layout traversed together.
    ///
    /// When all layouts agree on `C` or `F` that order wins. Otherwise the
    /// majority between `C` and `F` wins, ties going to the default order.
    /// `S` is never returned because operands may not share storage order.
    pub fn storage_fast_tandem_order(layouts: &[&StrideLayout]) -> Order {
        let mut c_votes = 0usize;
        let mut f_votes = 0usize;
        for layout in layouts {
            match layout.storage_fast_order() {
                Order::C => c_votes += 1,
                Order::F => f_votes += 1,
                Order::S => {}
            }
        }
        let order = if f_votes > c_votes {
            Order::F
        } else {
            Order::C
        };
        log::debug!("tandem order {order} from {c_votes} C and {f_votes} F votes");
        order
    }

    /// Linear storage offset of a multi-index.
    pub fn pointer(&self, index: &[usize]) -> Result<usize, TensorError> {
        if index.len() != self.rank() {
            return Err(TensorError::dimension_mismatch(
                "index length must equal rank",
                self.dims(),
                index,
            ));
        }
        let mut pointer = self.offset as isize;
        for ((&i, &dim), &stride) in index.iter().zip(self.dims()).zip(self.strides.iter()) {
            if i >= dim {
                return Err(TensorError::index_out_of_bounds(i, dim));
            }
            pointer += i as isize * stride;
        }
        Ok(pointer as usize)
    }

    /// Multi-index of a linear storage offset, the inverse of
    /// [`StrideLayout::pointer`].
    ///
    /// Decomposes the offset by descending absolute stride. This is slow
    /// and meant for diagnostics only.
    pub fn index(&self, pointer: usize) -> Result<Vec<usize>, TensorError> {
        let (min, max) = self
            .pointer_range()
            .ok_or(TensorError::index_out_of_bounds(pointer, 0))?;
        let p = pointer as isize;
        if p < min || p > max {
            return Err(TensorError::index_out_of_bounds(pointer, (max + 1) as usize));
        }
        let mut axes: Vec<usize> = (0..self.rank()).collect();
        axes.sort_by(|&a, &b| {
            self.strides[b]
                .abs()
                .cmp(&self.strides[a].abs())
                .then(self.dims()[b].cmp(&self.dims()[a]))
        });
        // distance from the smallest reachable offset, all axes walked forward
        let mut rem = p - min;
        let mut index = vec![0usize; self.rank()];
        for axis in axes {
            let stride = self.strides[axis].abs();
            let dim = self.dims()[axis];
            if stride == 0 || dim == 1 {
                continue;
            }
            let k = ((rem / stride) as usize).min(dim - 1);
            rem -= k as isize * stride;
            index[axis] = if self.strides[axis] < 0 { dim - 1 - k } else { k };
        }
        if rem != 0 || self.pointer(&index)? != pointer {
            return Err(TensorError::invalid_argument(format!(
                "offset {pointer} is not reachable by layout {self:?}"
            )));
        }
        Ok(index)
    }

    /// Smallest and largest reachable offsets, `None` for an empty layout.
    pub fn pointer_range(&self) -> Option<(isize, isize)> {
        if self.size() == 0 {
            return None;
        }
        let mut min = self.offset as isize;
        let mut max = self.offset as isize;
        for (&dim, &stride) in self.dims().iter().zip(self.strides.iter()) {
            let span = (dim as isize - 1) * stride;
            if span < 0 {
                min += span;
            } else {
                max += span;
            }
        }
        Some((min, max))
    }

    /// Checks that every reachable offset lies in `[0, len)`.
    pub fn check_bounds(&self, len: usize) -> Result<(), TensorError> {
        match self.pointer_range() {
            Some((min, max)) if min < 0 || max >= len as isize => {
                Err(TensorError::LayoutOutOfBounds { min, max, len })
            }
            _ => Ok(()),
        }
    }

    /// True when some axis longer than one has stride zero.
    pub fn has_broadcast_axes(&self) -> bool {
        self.dims()
            .iter()
            .zip(self.strides.iter())
            .any(|(&d, &s)| d > 1 && s == 0)
    }

    /// True when no two logical elements share a storage offset.
    pub fn is_non_overlapping(&self) -> bool {
        let mut axes: Vec<(usize, isize)> = self
            .dims()
            .iter()
            .zip(self.strides.iter())
            .filter(|(&d, _)| d > 1)
            .map(|(&d, &s)| (d, s.abs()))
            .collect();
        axes.sort_by_key(|&(d, s)| (s, d));
        let mut extent = 0isize;
        for (dim, stride) in axes {
            if stride <= extent {
                return false;
            }
            extent += (dim as isize - 1) * stride;
        }
        true
    }

    /// Dims and strides reordered so that axis 0 is walked fastest.
    ///
    /// With `compact`, unit axes are dropped and neighbouring axes that are
    /// contiguous with each other are merged into one.
    pub(crate) fn fortran_axes(&self, order: Order, compact: bool) -> (Vec<usize>, Vec<isize>) {
        let rank = self.rank();
        let mut axes: Vec<usize> = (0..rank).collect();
        match order {
            Order::F => {}
            Order::C => axes.reverse(),
            Order::S => {
                let dims = self.dims();
                let strides = &self.strides;
                axes.sort_by(|&i, &j| match (strides[i] == 0, strides[j] == 0) {
                    (true, true) => dims[i].cmp(&dims[j]),
                    (true, false) => std::cmp::Ordering::Greater,
                    (false, true) => std::cmp::Ordering::Less,
                    (false, false) => strides[i]
                        .abs()
                        .cmp(&strides[j].abs())
                        .then(dims[i].cmp(&dims[j])),
                });
            }
        }
        let mut dims: Vec<usize> = axes.iter().map(|&a| self.dims()[a]).collect();
        let mut strides: Vec<isize> = axes.iter().map(|&a| self.strides[a]).collect();
        if !compact {
            return (dims, strides);
        }
        if self.size() == 0 {
            return (vec![0], vec![1]);
        }
        let kept: Vec<usize> = (0..rank).filter(|&k| dims[k] != 1).collect();
        if kept.is_empty() {
            return (vec![1], vec![1]);
        }
        dims = kept.iter().map(|&k| dims[k]).collect();
        strides = kept.iter().map(|&k| strides[k]).collect();
        let mut len = 1;
        for i in 1..dims.len() {
            if dims[len - 1] as isize * strides[len - 1] == strides[i] {
                dims[len - 1] *= dims[i];
                continue;
            }
            dims[len] = dims[i];
            strides[len] = strides[i];
            len += 1;
        }
        dims.truncate(len);
        strides.truncate(len);
        (dims, strides)
    }

    /// Layout of the same elements with axes reordered so that axis 0 is
    /// traversed fastest in the requested order.
    ///
    /// `S` sorts axes by ascending absolute stride with broadcast axes last
    /// and ties broken by ascending dimension. `compact` drops unit axes and
    /// merges axes with `dims[i-1] * strides[i-1] == strides[i]`.
    pub fn compute_fortran_layout(&self, order: Order, compact: bool) -> StrideLayout {
        let (dims, strides) = self.fortran_axes(order, compact);
        Self::from_parts(Shape::from(dims), self.offset, strides)
    }

    /// If the traversal in `order` is a single strided run, its start and step.
    pub fn single_run(&self, order: Order) -> Option<(usize, isize)> {
        let (_, strides) = self.fortran_axes(order, true);
        match strides.as_slice() {
            [step] => Some((self.offset, *step)),
            _ => None,
        }
    }

    /// Removes every unit axis.
    pub fn squeeze(&self) -> StrideLayout {
        let (dims, strides): (Vec<usize>, Vec<isize>) = self
            .dims()
            .iter()
            .zip(self.strides.iter())
            .filter(|(&d, _)| d != 1)
            .map(|(&d, &s)| (d, s))
            .unzip();
        Self::from_parts(Shape::from(dims), self.offset, strides)
    }

    /// Removes the given axes, each of which must have size 1.
    pub fn squeeze_axes(&self, axes: &[usize]) -> Result<StrideLayout, TensorError> {
        check_axes(axes, self.rank())?;
        for &axis in axes {
            let dim = self.dims()[axis];
            if dim != 1 {
                return Err(TensorError::InvalidAxisSize {
                    axis,
                    expected: 1,
                    actual: dim,
                });
            }
        }
        let (dims, strides): (Vec<usize>, Vec<isize>) = (0..self.rank())
            .filter(|axis| !axes.contains(axis))
            .map(|axis| (self.dims()[axis], self.strides[axis]))
            .unzip();
        Ok(Self::from_parts(Shape::from(dims), self.offset, strides))
    }

    /// Inserts unit axes with stride 0 at the given positions of the result.
    pub fn stretch(&self, axes: &[usize]) -> Result<StrideLayout, TensorError> {
        let rank = self.rank() + axes.len();
        check_axes(axes, rank)?;
        let mut dims = Vec::with_capacity(rank);
        let mut strides = Vec::with_capacity(rank);
        let mut source = 0;
        for axis in 0..rank {
            if axes.contains(&axis) {
                dims.push(1);
                strides.push(0);
            } else {
                dims.push(self.dims()[source]);
                strides.push(self.strides[source]);
                source += 1;
            }
        }
        Ok(Self::from_parts(Shape::from(dims), self.offset, strides))
    }

    /// Turns a unit axis into a broadcast axis of length `size`.
    pub fn expand(&self, axis: usize, size: usize) -> Result<StrideLayout, TensorError> {
        let dim = self.dim(axis)?;
        if dim != 1 {
            return Err(TensorError::InvalidAxisSize {
                axis,
                expected: 1,
                actual: dim,
            });
        }
        let mut dims = self.dims().to_vec();
        let mut strides = self.strides.clone();
        dims[axis] = size;
        strides[axis] = 0;
        Ok(Self::from_parts(Shape::from(dims), self.offset, strides))
    }

    /// Reorders axes: axis `i` of the result is axis `perm[i]` of `self`.
    pub fn permute(&self, perm: &[usize]) -> Result<StrideLayout, TensorError> {
        if perm.len() != self.rank() {
            return Err(TensorError::dimension_mismatch(
                "permutation length must equal rank",
                self.dims(),
                perm,
            ));
        }
        check_axes(perm, self.rank())?;
        let dims: Vec<usize> = perm.iter().map(|&a| self.dims()[a]).collect();
        let strides: Vec<isize> = perm.iter().map(|&a| self.strides[a]).collect();
        Ok(Self::from_parts(Shape::from(dims), self.offset, strides))
    }

    /// Reverses the order of all axes.
    pub fn revert(&self) -> StrideLayout {
        let dims: Vec<usize> = self.dims().iter().rev().copied().collect();
        let strides: Vec<isize> = self.strides.iter().rev().copied().collect();
        Self::from_parts(Shape::from(dims), self.offset, strides)
    }

    /// Moves axis `src` to position `dst`, shifting the axes in between.
    pub fn move_axis(&self, src: usize, dst: usize) -> Result<StrideLayout, TensorError> {
        check_axis(src, self.rank())?;
        check_axis(dst, self.rank())?;
        let mut perm: Vec<usize> = (0..self.rank()).collect();
        let axis = perm.remove(src);
        perm.insert(dst, axis);
        self.permute(&perm)
    }

    /// Swaps two axes.
    pub fn swap_axis(&self, a: usize, b: usize) -> Result<StrideLayout, TensorError> {
        check_axis(a, self.rank())?;
        check_axis(b, self.rank())?;
        let mut perm: Vec<usize> = (0..self.rank()).collect();
        perm.swap(a, b);
        self.permute(&perm)
    }

    fn check_range(&self, axis: usize, start: usize, end: usize) -> Result<usize, TensorError> {
        let dim = self.dim(axis)?;
        if start > end || end > dim {
            return Err(TensorError::InvalidRange {
                axis,
                start,
                end,
                dim,
            });
        }
        Ok(dim)
    }

    /// Restricts one axis to `[start, end)`.
    ///
    /// Without `keep_dim` an axis narrowed to width 1 is squeezed away.
    pub fn narrow(
        &self,
        axis: usize,
        keep_dim: bool,
        start: usize,
        end: usize,
    ) -> Result<StrideLayout, TensorError> {
        self.check_range(axis, start, end)?;
        let mut dims = self.dims().to_vec();
        dims[axis] = end - start;
        let offset = if end > start {
            (self.offset as isize + start as isize * self.strides[axis]) as usize
        } else {
            self.offset
        };
        let narrowed = Self::from_parts(Shape::from(dims), offset, self.strides.clone());
        if !keep_dim && end - start == 1 {
            return narrowed.squeeze_axes(&[axis]);
        }
        Ok(narrowed)
    }

    /// Restricts every axis to `[starts[i], ends[i])`.
    ///
    /// Without `keep_dim` every axis narrowed to width 1 is squeezed away.
    pub fn narrow_all(
        &self,
        keep_dim: bool,
        starts: &[usize],
        ends: &[usize],
    ) -> Result<StrideLayout, TensorError> {
        if starts.len() != self.rank() || ends.len() != self.rank() {
            return Err(TensorError::invalid_argument(format!(
                "narrow_all needs {} starts and ends, got {} and {}",
                self.rank(),
                starts.len(),
                ends.len()
            )));
        }
        let mut dims = self.dims().to_vec();
        let mut offset = self.offset as isize;
        let mut empty = false;
        for axis in 0..self.rank() {
            self.check_range(axis, starts[axis], ends[axis])?;
            dims[axis] = ends[axis] - starts[axis];
            empty |= dims[axis] == 0;
            offset += starts[axis] as isize * self.strides[axis];
        }
        let offset = if empty { self.offset } else { offset as usize };
        let narrowed = Self::from_parts(Shape::from(dims), offset, self.strides.clone());
        if keep_dim {
            return Ok(narrowed);
        }
        let unit: Vec<usize> = (0..self.rank())
            .filter(|&axis| narrowed.dims()[axis] == 1 && self.dims()[axis] != 1)
            .collect();
        narrowed.squeeze_axes(&unit)
    }

    /// Reverses the direction of one axis.
    pub fn flip(&self, axis: usize) -> Result<StrideLayout, TensorError> {
        let dim = self.dim(axis)?;
        let mut strides = self.strides.clone();
        let offset = if dim > 0 {
            (self.offset as isize + (dim as isize - 1) * strides[axis]) as usize
        } else {
            self.offset
        };
        strides[axis] = -strides[axis];
        Ok(Self::from_parts(self.shape.clone(), offset, strides))
    }

    /// Layout without `axis`, positioned at index 0 of that axis.
    pub(crate) fn without_axis(&self, axis: usize) -> Result<StrideLayout, TensorError> {
        check_axis(axis, self.rank())?;
        let mut dims = self.dims().to_vec();
        let mut strides = self.strides.clone();
        dims.remove(axis);
        strides.remove(axis);
        Ok(Self::from_parts(Shape::from(dims), self.offset, strides))
    }

    /// Reshapes without moving data, reading elements in `order`.
    ///
    /// Returns `None` when the current strides cannot express the new shape,
    /// in which case a copy is required.
    pub fn attempt_reshape(&self, shape: &Shape, order: Order) -> Option<StrideLayout> {
        if shape.size() != self.size() {
            return None;
        }
        if self.size() <= 1 {
            return Some(Self::of_dense(shape.clone(), self.offset, order));
        }
        let c_order = order.dense() == Order::C;
        // work in C order, mirroring both shapes for F
        let (mut old_dims, mut old_strides): (Vec<usize>, Vec<isize>) = self
            .dims()
            .iter()
            .zip(self.strides.iter())
            .filter(|(&d, _)| d != 1)
            .map(|(&d, &s)| (d, s))
            .unzip();
        let mut new_dims = shape.dims().to_vec();
        if !c_order {
            old_dims.reverse();
            old_strides.reverse();
            new_dims.reverse();
        }
        let mut new_strides = vec![0isize; new_dims.len()];
        let (mut oi, mut oj, mut ni, mut nj) = (0, 1, 0, 1);
        while ni < new_dims.len() && oi < old_dims.len() {
            let mut np = new_dims[ni];
            let mut op = old_dims[oi];
            while np != op {
                if np < op {
                    np *= new_dims[nj];
                    nj += 1;
                } else {
                    op *= old_dims[oj];
                    oj += 1;
                }
            }
            for ok in oi..oj - 1 {
                if old_strides[ok] != old_dims[ok + 1] as isize * old_strides[ok + 1] {
                    return None;
                }
            }
            new_strides[nj - 1] = old_strides[oj - 1];
            for nk in (ni + 1..nj).rev() {
                new_strides[nk - 1] = new_strides[nk] * new_dims[nk] as isize;
            }
            ni = nj;
            nj += 1;
            oi = oj;
            oj += 1;
        }
        let last = if ni > 0 { new_strides[ni - 1] } else { 1 };
        for stride in new_strides.iter_mut().skip(ni) {
            *stride = last;
        }
        if !c_order {
            new_strides.reverse();
        }
        Some(Self::from_parts(shape.clone(), self.offset, new_strides))
    }
}

fn ordering_flags(dims: &[usize], strides: &[isize]) -> (bool, bool) {
    let axes: Vec<(usize, isize)> = dims
        .iter()
        .zip(strides.iter())
        .filter(|(&d, _)| d != 1)
        .map(|(&d, &s)| (d, s))
        .collect();
    if axes.len() < 2 {
        return (true, true);
    }
    let c_ordered = axes
        .windows(2)
        .all(|w| w[0].1 == w[1].1 * w[1].0 as isize);
    let f_ordered = axes
        .windows(2)
        .all(|w| w[1].1 == w[0].1 * w[0].0 as isize);
    (c_ordered, f_ordered)
}

impl std::fmt::Debug for StrideLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "StrideLayout({}, {}, {:?})",
            self.shape, self.offset, self.strides
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(dims: &[usize], offset: usize, strides: &[isize]) -> StrideLayout {
        StrideLayout::from_parts(Shape::new(dims), offset, strides.to_vec())
    }

    #[test]
    fn test_flags() {
        let c = StrideLayout::of_dense([4, 3], 0, Order::C);
        assert!(c.is_c_ordered() && !c.is_f_ordered() && c.is_dense());
        assert_eq!(c.storage_fast_order(), Order::C);

        let f = StrideLayout::of_dense([4, 3], 0, Order::F);
        assert!(f.is_f_ordered() && !f.is_c_ordered() && f.is_dense());
        assert_eq!(f.storage_fast_order(), Order::F);

        let v = layout(&[5], 2, &[3]);
        assert!(v.is_c_ordered() && v.is_f_ordered());
        assert!(!v.is_dense());

        // every other column: C-ordered nesting but not contiguous
        let s = layout(&[4, 2], 0, &[3, 2]);
        assert!(!s.is_c_ordered() && !s.is_dense());
        assert_eq!(s.storage_fast_order(), Order::S);

        let unit = layout(&[3, 1, 4], 0, &[4, 100, 1]);
        assert!(unit.is_c_ordered() && unit.is_dense());
    }

    #[test]
    fn test_tandem_order() {
        let c = StrideLayout::of_dense([4, 3], 0, Order::C);
        let f = StrideLayout::of_dense([4, 3], 0, Order::F);
        let s = layout(&[4, 3], 0, &[1, 8]);
        assert_eq!(StrideLayout::storage_fast_tandem_order(&[&f, &f]), Order::F);
        assert_eq!(StrideLayout::storage_fast_tandem_order(&[&c, &f]), Order::C);
        assert_eq!(StrideLayout::storage_fast_tandem_order(&[&f, &f, &c]), Order::F);
        assert_eq!(StrideLayout::storage_fast_tandem_order(&[&s, &s]), Order::C);
    }

    #[test]
    fn test_pointer_index() -> Result<(), TensorError> {
        let l = StrideLayout::of_dense([2, 3, 4], 5, Order::C);
        assert_eq!(l.pointer(&[1, 2, 3])?, 5 + 12 + 8 + 3);
        assert!(l.pointer(&[2, 0, 0]).is_err());
        assert!(l.pointer(&[0, 0]).is_err());
        for i in 0..2 {
            for j in 0..3 {
                for k in 0..4 {
                    let p = l.pointer(&[i, j, k])?;
                    assert_eq!(l.index(p)?, vec![i, j, k]);
                }
            }
        }
        let flipped = l.flip(2)?.permute(&[2, 0, 1])?;
        let p = flipped.pointer(&[1, 1, 2])?;
        assert_eq!(flipped.index(p)?, vec![1, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_pointer_range_bounds() -> Result<(), TensorError> {
        let l = StrideLayout::of_dense([4, 3], 0, Order::C).flip(0)?;
        assert_eq!(l.offset(), 9);
        assert_eq!(l.pointer_range(), Some((0, 11)));
        assert!(l.check_bounds(12).is_ok());
        assert!(l.check_bounds(11).is_err());
        assert_eq!(layout(&[0, 3], 100, &[3, 1]).pointer_range(), None);
        Ok(())
    }

    #[test]
    fn test_overlap_and_broadcast() -> Result<(), TensorError> {
        let l = StrideLayout::of_dense([4, 1], 0, Order::C);
        let e = l.expand(1, 3)?;
        assert!(e.has_broadcast_axes());
        assert!(!e.is_non_overlapping());
        assert!(l.is_non_overlapping());
        assert!(!layout(&[3, 3], 0, &[1, 1]).is_non_overlapping());
        assert!(layout(&[3, 3], 0, &[1, 3]).is_non_overlapping());
        assert!(layout(&[2, 2], 0, &[-4, 1]).is_non_overlapping());
        Ok(())
    }

    #[test]
    fn test_compute_fortran_layout() {
        let c = StrideLayout::of_dense([2, 3, 4], 0, Order::C);
        let f = c.compute_fortran_layout(Order::C, false);
        assert_eq!(f.dims(), &[4, 3, 2]);
        assert_eq!(f.strides(), &[1, 4, 12]);
        let compact = c.compute_fortran_layout(Order::C, true);
        assert_eq!(compact.dims(), &[24]);
        assert_eq!(compact.strides(), &[1]);
        let fo = c.compute_fortran_layout(Order::F, true);
        assert_eq!(fo.dims(), &[2, 3, 4]);
        assert_eq!(fo.strides(), &[12, 4, 1]);

        let s = layout(&[3, 1, 4], 7, &[1, 0, 3]);
        let sl = s.compute_fortran_layout(Order::S, false);
        assert_eq!(sl.dims(), &[3, 4, 1]);
        assert_eq!(sl.strides(), &[1, 3, 0]);
        let sc = s.compute_fortran_layout(Order::S, true);
        assert_eq!(sc.dims(), &[12]);
        assert_eq!(sc.strides(), &[1]);
        assert_eq!(sc.offset(), 7);
    }

    #[test]
    fn test_squeeze_stretch_expand() -> Result<(), TensorError> {
        let l = layout(&[1, 3, 1, 2], 0, &[6, 2, 2, 1]);
        assert_eq!(l.squeeze().dims(), &[3, 2]);
        let s = l.squeeze_axes(&[2])?;
        assert_eq!(s.dims(), &[1, 3, 2]);
        assert_eq!(
            l.squeeze_axes(&[1]),
            Err(TensorError::InvalidAxisSize {
                axis: 1,
                expected: 1,
                actual: 3
            })
        );
        let st = s.squeeze().stretch(&[0, 2])?;
        assert_eq!(st.dims(), &[1, 3, 1, 2]);
        assert_eq!(st.strides(), &[0, 2, 0, 1]);
        assert!(s.stretch(&[4, 4]).is_err());
        let e = st.expand(2, 5)?;
        assert_eq!(e.dims(), &[1, 3, 5, 2]);
        assert!(e.expand(1, 2).is_err());
        Ok(())
    }

    #[test]
    fn test_permute_family() -> Result<(), TensorError> {
        let l = StrideLayout::of_dense([2, 3, 4], 0, Order::C);
        let p = l.permute(&[2, 0, 1])?;
        assert_eq!(p.dims(), &[4, 2, 3]);
        assert_eq!(p.strides(), &[1, 12, 4]);
        assert!(l.permute(&[0, 0, 1]).is_err());
        assert!(l.permute(&[0, 1]).is_err());
        assert_eq!(l.revert().dims(), &[4, 3, 2]);
        let m = l.move_axis(0, 2)?;
        assert_eq!(m.dims(), &[3, 4, 2]);
        assert_eq!(m.strides(), &[4, 1, 12]);
        let s = l.swap_axis(0, 2)?;
        assert_eq!(s.dims(), &[4, 3, 2]);
        assert_eq!(s.strides(), &[1, 4, 12]);
        assert!(l.swap_axis(0, 3).is_err());
        Ok(())
    }

    #[test]
    fn test_narrow() -> Result<(), TensorError> {
        let l = StrideLayout::of_dense([4, 3], 0, Order::C);
        let n = l.narrow(0, false, 1, 3)?;
        assert_eq!(n.dims(), &[2, 3]);
        assert_eq!(n.offset(), 3);
        let row = l.narrow(0, false, 2, 3)?;
        assert_eq!(row.dims(), &[3]);
        assert_eq!(row.offset(), 6);
        let kept = l.narrow(1, true, 2, 3)?;
        assert_eq!(kept.dims(), &[4, 1]);
        assert!(l.narrow(1, true, 2, 4).is_err());
        assert!(l.narrow(1, true, 2, 1).is_err());
        let all = l.narrow_all(false, &[1, 1], &[3, 2])?;
        assert_eq!(all.dims(), &[2]);
        assert_eq!(all.offset(), 4);
        assert!(l.narrow_all(true, &[0], &[1]).is_err());
        Ok(())
    }

    #[test]
    fn test_attempt_reshape() -> Result<(), TensorError> {
        let l = StrideLayout::of_dense([4, 3], 0, Order::C);
        let r = l.attempt_reshape(&Shape::from([2, 6]), Order::C);
        assert_eq!(r.map(|r| r.strides().to_vec()), Some(vec![6, 1]));

        let t = l.permute(&[1, 0])?;
        assert!(t.attempt_reshape(&Shape::from([12]), Order::C).is_none());
        let tf = t.attempt_reshape(&Shape::from([12]), Order::F);
        assert_eq!(tf.map(|r| r.strides().to_vec()), Some(vec![1]));

        let n = l.narrow(1, true, 0, 2)?;
        let split = n.attempt_reshape(&Shape::from([2, 2, 2]), Order::C);
        assert_eq!(split.map(|r| r.strides().to_vec()), Some(vec![6, 3, 1]));
        assert!(n.attempt_reshape(&Shape::from([8]), Order::C).is_none());
        Ok(())
    }
}
