use crate::{iterators::StridePointerIterator, Order, StrideLayout, TensorError};

/// Precomputed loop shape for walking a layout with one tight inner loop.
///
/// Each entry of `offsets` starts an inner loop of `bound` elements spaced
/// `step` apart. When `step == 1` the inner loop is a contiguous run and the
/// first `simd_bound` elements can be processed in chunks of `simd_len`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrideLoopDescriptor {
    /// Start offset of every inner loop.
    pub offsets: Vec<usize>,
    /// Elements per inner loop.
    pub bound: usize,
    /// Stride between inner-loop elements.
    pub step: isize,
    /// Lane count the descriptor was built for.
    pub simd_len: usize,
    /// Largest multiple of `simd_len` not above `bound`, 0 off the unit path.
    pub simd_bound: usize,
}

impl StrideLoopDescriptor {
    /// Builds the descriptor of `layout` traversed in `order`.
    pub fn of(layout: &StrideLayout, order: Order, simd_len: usize) -> Self {
        if layout.size() == 0 {
            return Self::empty(simd_len);
        }
        let (dims, strides) = layout.fortran_axes(order, true);
        Self::from_axes(layout.offset(), dims, strides, simd_len)
    }

    /// Builds one descriptor per layout so that all of them walk the same
    /// logical elements in lock step.
    ///
    /// Axes are merged only where they are contiguous in every layout, so
    /// `offsets[k]` and inner position `i` address the same multi-index in
    /// each returned descriptor. `S` is resolved to the dense default.
    pub fn of_tandem(
        layouts: &[&StrideLayout],
        order: Order,
        simd_len: usize,
    ) -> Result<Vec<Self>, TensorError> {
        let Some(first) = layouts.first() else {
            return Ok(Vec::new());
        };
        if let Some(other) = layouts.iter().find(|l| l.shape() != first.shape()) {
            return Err(TensorError::dimension_mismatch(
                "tandem traversal needs equal shapes",
                first.dims(),
                other.dims(),
            ));
        }
        if first.size() == 0 {
            return Ok(layouts.iter().map(|_| Self::empty(simd_len)).collect());
        }

        let order = order.dense();
        let axes: Vec<(Vec<usize>, Vec<isize>)> = layouts
            .iter()
            .map(|l| l.fortran_axes(order, false))
            .collect();
        let dims = &axes[0].0;
        let kept: Vec<usize> = (0..dims.len()).filter(|&k| dims[k] != 1).collect();

        let mut groups: Vec<usize> = Vec::new();
        let mut merged: Vec<Vec<isize>> = vec![Vec::new(); layouts.len()];
        for &k in &kept {
            let joinable = groups.last().is_some_and(|&d| {
                axes.iter()
                    .zip(&merged)
                    .all(|((_, strides), m)| m.last().is_some_and(|&s| d as isize * s == strides[k]))
            });
            if joinable {
                if let Some(last) = groups.last_mut() {
                    *last *= dims[k];
                }
            } else {
                groups.push(dims[k]);
                for ((_, strides), m) in axes.iter().zip(merged.iter_mut()) {
                    m.push(strides[k]);
                }
            }
        }
        if groups.is_empty() {
            groups.push(1);
            merged.iter_mut().for_each(|m| m.push(1));
        }

        Ok(layouts
            .iter()
            .zip(merged)
            .map(|(layout, strides)| {
                Self::from_axes(layout.offset(), groups.clone(), strides, simd_len)
            })
            .collect())
    }

    fn empty(simd_len: usize) -> Self {
        Self {
            offsets: Vec::new(),
            bound: 0,
            step: 1,
            simd_len,
            simd_bound: 0,
        }
    }

    fn from_axes(offset: usize, mut dims: Vec<usize>, mut strides: Vec<isize>, simd_len: usize) -> Self {
        let bound = dims.remove(0);
        let step = strides.remove(0);
        let offsets = StridePointerIterator::from_axes(offset, dims, strides).collect();
        let simd_bound = if step == 1 && simd_len > 0 && bound >= simd_len {
            bound - bound % simd_len
        } else {
            0
        };
        Self {
            offsets,
            bound,
            step,
            simd_len,
            simd_bound,
        }
    }

    /// True when inner loops are contiguous runs.
    #[inline]
    pub fn is_unit(&self) -> bool {
        self.step == 1
    }

    /// Total number of elements covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len() * self.bound
    }

    /// True when the descriptor covers no element.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Storage offsets of one inner loop.
    pub fn inner(&self, start: usize) -> impl Iterator<Item = usize> {
        let step = self.step;
        (0..self.bound).map(move |i| (start as isize + i as isize * step) as usize)
    }

    /// Every covered offset, inner loops in sequence.
    pub fn pointers(&self) -> impl Iterator<Item = usize> + '_ {
        self.offsets.iter().flat_map(move |&start| self.inner(start))
    }
}
