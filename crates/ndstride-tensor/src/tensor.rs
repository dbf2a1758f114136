use std::any::Any;

use crate::{
    dtype::{DType, Element, Scalar},
    iterators::{IndexIterator, PointerIterator},
    loop_descriptor::StrideLoopDescriptor,
    storage::TensorStorage,
    Order, Shape, StrideLayout, TensorError,
};

/// A strided n-dimensional array over shared storage.
///
/// A tensor is a [`StrideLayout`] paired with a [`TensorStorage`]. Views
/// produced by [`Tensor::narrow`], [`Tensor::permute`] and friends share the
/// storage of their source: a write through one is visible through all of
/// them. [`Tensor::copy`] is the way to get an independent buffer.
///
/// # Example
///
/// ```
/// use ndstride_tensor::{Order, Tensor};
///
/// let t = Tensor::<f64>::seq([4, 3])?;
/// let rows = t.narrow(0, false, 1, 3)?;
/// assert_eq!(rows.shape().dims(), &[2, 3]);
/// assert_eq!(rows.to_vec(Order::C), vec![3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
/// # Ok::<(), ndstride_tensor::TensorError>(())
/// ```
pub struct Tensor<T: Element> {
    pub(crate) layout: StrideLayout,
    pub(crate) storage: TensorStorage<T>,
}

impl<T: Element> Clone for Tensor<T> {
    /// Creates another handle on the same storage and layout.
    fn clone(&self) -> Self {
        Self {
            layout: self.layout.clone(),
            storage: self.storage.clone(),
        }
    }
}

impl<T: Element> Tensor<T> {
    /// Creates a tensor from a layout over an existing storage.
    ///
    /// # Errors
    ///
    /// Fails when the layout reaches offsets outside the storage.
    pub fn from_layout(layout: StrideLayout, storage: TensorStorage<T>) -> Result<Self, TensorError> {
        layout.check_bounds(storage.len())?;
        Ok(Self { layout, storage })
    }

    /// Wraps a layout already known to stay inside `self`'s storage.
    pub(crate) fn with_layout(&self, layout: StrideLayout) -> Self {
        debug_assert!(layout.check_bounds(self.storage.len()).is_ok());
        Self {
            layout,
            storage: self.storage.clone(),
        }
    }

    /// Creates a row-major tensor from a vector.
    ///
    /// # Errors
    ///
    /// Fails when the number of elements does not match the shape.
    pub fn from_shape_vec(shape: impl Into<Shape>, data: Vec<T>) -> Result<Self, TensorError> {
        Self::from_shape_vec_with_order(shape, data, Order::C)
    }

    /// Creates a dense tensor whose elements are given in `order`.
    pub fn from_shape_vec_with_order(
        shape: impl Into<Shape>,
        data: Vec<T>,
        order: Order,
    ) -> Result<Self, TensorError> {
        let shape = shape.into();
        if shape.size() != data.len() {
            return Err(TensorError::invalid_shape(shape.size(), data.len()));
        }
        let storage = TensorStorage::from_vec(data)?;
        Ok(Self {
            layout: StrideLayout::of_dense(shape, 0, order),
            storage,
        })
    }

    /// Creates a tensor filled with `value`.
    pub fn from_shape_val(shape: impl Into<Shape>, value: T) -> Result<Self, TensorError> {
        let shape = shape.into();
        let storage = TensorStorage::from_elem(value, shape.size())?;
        Ok(Self {
            layout: StrideLayout::of_dense(shape, 0, Order::C),
            storage,
        })
    }

    /// Creates a tensor by calling `f` on every multi-index in row-major order.
    pub fn from_shape_fn<F>(shape: impl Into<Shape>, mut f: F) -> Result<Self, TensorError>
    where
        F: FnMut(&[usize]) -> T,
    {
        let shape = shape.into();
        let data: Vec<T> = IndexIterator::new(&shape, Order::C)
            .map(|index| f(&index))
            .collect();
        Self::from_shape_vec(shape, data)
    }

    /// Creates a zero-filled tensor.
    pub fn zeros(shape: impl Into<Shape>) -> Result<Self, TensorError> {
        Self::from_shape_val(shape, T::zero())
    }

    /// Creates a zero-filled tensor laid out densely in `order`.
    pub fn zeros_with_order(shape: impl Into<Shape>, order: Order) -> Result<Self, TensorError> {
        let shape = shape.into();
        let storage = TensorStorage::zeros(shape.size())?;
        Ok(Self {
            layout: StrideLayout::of_dense(shape, 0, order),
            storage,
        })
    }

    /// Creates a row-major tensor holding `0, 1, 2, ...`.
    pub fn seq(shape: impl Into<Shape>) -> Result<Self, TensorError> {
        let shape = shape.into();
        let data: Vec<T> = (0..shape.size())
            .map(|i| T::from_scalar(Scalar::Int(i as i64)))
            .collect();
        Self::from_shape_vec(shape, data)
    }

    /// Creates a rank-0 tensor.
    pub fn scalar(value: T) -> Result<Self, TensorError> {
        Self::from_shape_val(Shape::scalar(), value)
    }

    /// The layout of this view.
    #[inline]
    pub fn layout(&self) -> &StrideLayout {
        &self.layout
    }

    /// The storage shared by this view.
    #[inline]
    pub fn storage(&self) -> &TensorStorage<T> {
        &self.storage
    }

    /// Runtime dtype tag.
    #[inline]
    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    /// Number of axes.
    #[inline]
    pub fn rank(&self) -> usize {
        self.layout.rank()
    }

    /// Shape of the view.
    #[inline]
    pub fn shape(&self) -> &Shape {
        self.layout.shape()
    }

    /// Size of one axis.
    pub fn dim(&self, axis: usize) -> Result<usize, TensorError> {
        self.layout.dim(axis)
    }

    /// Number of elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// True for rank-1 tensors.
    #[inline]
    pub fn is_vector(&self) -> bool {
        self.rank() == 1
    }

    /// True for rank-0 tensors.
    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.rank() == 0
    }

    /// True when the tensor has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Base storage offset.
    #[inline]
    pub fn offset(&self) -> usize {
        self.layout.offset()
    }

    /// Per-axis strides.
    #[inline]
    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }

    /// True when both handles share the same storage.
    pub fn shares_storage(&self, other: &Tensor<T>) -> bool {
        self.storage.ptr_eq(&other.storage)
    }

    /// Reads the element at a multi-index.
    pub fn get(&self, index: &[usize]) -> Result<T, TensorError> {
        let pointer = self.layout.pointer(index)?;
        self.ptr_get(pointer)
    }

    /// Writes the element at a multi-index.
    ///
    /// Every view sharing the storage observes the write.
    pub fn set(&mut self, index: &[usize], value: T) -> Result<(), TensorError> {
        let pointer = self.layout.pointer(index)?;
        self.storage.set(pointer, value)
    }

    /// Adds `value` to the element at a multi-index.
    pub fn inc(&mut self, index: &[usize], value: T) -> Result<(), TensorError> {
        let pointer = self.layout.pointer(index)?;
        self.storage.inc(pointer, value)
    }

    /// Reads the element at a linear storage offset.
    pub fn ptr_get(&self, pointer: usize) -> Result<T, TensorError> {
        self.storage
            .get(pointer)
            .ok_or(TensorError::index_out_of_bounds(pointer, self.storage.len()))
    }

    /// Writes the element at a linear storage offset.
    pub fn ptr_set(&mut self, pointer: usize, value: T) -> Result<(), TensorError> {
        self.storage.set(pointer, value)
    }

    /// Storage offsets of every element in `order`.
    pub fn ptr_iter(&self, order: Order) -> PointerIterator {
        PointerIterator::new(&self.layout, order)
    }

    /// Element values in `order`.
    pub fn iter(&self, order: Order) -> TensorIter<'_, T> {
        TensorIter {
            storage: &self.storage,
            pointers: self.ptr_iter(order),
        }
    }

    /// Multi-indices of every element in `order`.
    pub fn index_iter(&self, order: Order) -> IndexIterator {
        IndexIterator::new(self.shape(), order)
    }

    /// Loop descriptor for kernels of this element type.
    pub fn loop_descriptor(&self, order: Order) -> StrideLoopDescriptor {
        StrideLoopDescriptor::of(&self.layout, order, T::LANES)
    }

    /// Copies the elements out in `order`.
    pub fn to_vec(&self, order: Order) -> Vec<T> {
        let lp = self.loop_descriptor(order);
        let mut out = Vec::with_capacity(lp.len());
        for &start in &lp.offsets {
            if lp.is_unit() {
                // SAFETY: the run lies inside storage and no mutable alias is alive
                out.extend_from_slice(unsafe { self.storage.slice(start, lp.bound) });
            } else {
                // SAFETY: every offset of a valid layout is in bounds
                out.extend(lp.inner(start).map(|p| unsafe { self.storage.get_unchecked(p) }));
            }
        }
        out
    }

    /// Copies the elements out as f64 in `order`.
    pub fn to_f64_vec(&self, order: Order) -> Vec<f64> {
        self.iter(order).map(Element::to_f64).collect()
    }

    /// Borrows the underlying buffer when the view is one contiguous,
    /// unit-stride run in `order`, `None` otherwise.
    ///
    /// The run may start at any storage offset: a narrowed row of a dense
    /// tensor borrows its part of the buffer. Reversed or strided views
    /// return `None`.
    ///
    /// # Safety
    ///
    /// No handle sharing this storage may write to it while the slice is
    /// alive.
    pub unsafe fn as_slice(&self, order: Order) -> Option<&[T]> {
        if self.is_empty() {
            return Some(&[]);
        }
        match self.layout.single_run(order) {
            Some((start, 1)) => Some(self.storage.slice(start, self.size())),
            _ => None,
        }
    }

    /// Consumes the tensor and returns its elements in row-major order.
    ///
    /// Hands the allocation over without copying when the tensor is the
    /// only handle on a buffer it covers exactly in row-major order.
    pub fn into_vec(self) -> Vec<T> {
        let whole = self.layout.offset() == 0
            && self.size() == self.storage.len()
            && matches!(self.layout.single_run(Order::C), Some((0, 1)));
        if whole {
            self.storage.into_vec()
        } else {
            self.to_vec(Order::C)
        }
    }

    /// True when the view is one contiguous run in `order`.
    pub fn is_dense_in(&self, order: Order) -> bool {
        self.size() <= 1 || matches!(self.layout.single_run(order), Some((_, 1)))
    }

    /// Resolves the dense order a copy in `order` is written in.
    pub(crate) fn copy_order(&self, order: Order) -> Order {
        match order {
            Order::S => self.layout.storage_fast_order().dense(),
            other => other,
        }
    }

    /// Deep copy into a new dense buffer laid out in `order`.
    ///
    /// `S` keeps the storage order of `self` when it is dense in C or F.
    pub fn copy(&self, order: Order) -> Result<Tensor<T>, TensorError> {
        let order = self.copy_order(order);
        Self::from_shape_vec_with_order(self.shape().clone(), self.to_vec(order), order)
    }

    /// Copies every element into `dst`, which must have the same shape.
    ///
    /// Both sides are walked in their tandem-fast order. When `dst`
    /// shares storage with `self` the source is materialized first.
    pub fn copy_to(&self, dst: &mut Tensor<T>) -> Result<(), TensorError> {
        if self.shape() != dst.shape() {
            return Err(TensorError::dimension_mismatch(
                "copy_to needs equal shapes",
                dst.shape().dims(),
                self.shape().dims(),
            ));
        }
        if !dst.layout.is_non_overlapping() {
            return Err(TensorError::unsupported_operation(
                "copy_to",
                "destination aliases several elements to one storage cell",
            ));
        }
        let order = StrideLayout::storage_fast_tandem_order(&[&self.layout, &dst.layout]);
        let dst_ptrs = dst.ptr_iter(order);
        if self.shares_storage(dst) {
            for (value, dst_ptr) in self.to_vec(order).into_iter().zip(dst_ptrs) {
                // SAFETY: dst_ptr comes from a valid layout
                unsafe { dst.storage.set_unchecked(dst_ptr, value) };
            }
            return Ok(());
        }
        for (src_ptr, dst_ptr) in self.ptr_iter(order).zip(dst_ptrs) {
            // SAFETY: both pointers come from valid layouts over distinct storages
            unsafe {
                dst.storage
                    .set_unchecked(dst_ptr, self.storage.get_unchecked(src_ptr))
            };
        }
        Ok(())
    }

    /// Reshapes the tensor, reading and writing elements in `order`.
    ///
    /// Returns a view when the strides allow it and a dense copy otherwise.
    pub fn reshape(&self, shape: impl Into<Shape>, order: Order) -> Result<Tensor<T>, TensorError> {
        let shape = shape.into();
        if shape.size() != self.size() {
            return Err(TensorError::invalid_shape(self.size(), shape.size()));
        }
        let order = order.dense();
        if let Some(layout) = self.layout.attempt_reshape(&shape, order) {
            return Ok(self.with_layout(layout));
        }
        Self::from_shape_vec_with_order(shape, self.to_vec(order), order)
    }

    /// Rank-1 dense copy of the elements in `order`.
    pub fn flatten(&self, order: Order) -> Result<Tensor<T>, TensorError> {
        let order = self.copy_order(order);
        Self::from_shape_vec([self.size()], self.to_vec(order))
    }

    /// Rank-1 view of the elements in `order` when they form a single
    /// strided run, otherwise [`Tensor::flatten`].
    pub fn ravel(&self, order: Order) -> Result<Tensor<T>, TensorError> {
        match self.layout.single_run(order) {
            Some((start, step)) if self.size() > 0 => {
                let layout = StrideLayout::new(Shape::from([self.size()]), start, vec![step])?;
                Ok(self.with_layout(layout))
            }
            _ => self.flatten(order),
        }
    }

    /// Converts to element type `U`.
    ///
    /// When `U` is `T` and the view is already dense in `order` the same
    /// tensor is returned, sharing storage. Otherwise a dense copy is
    /// written in `order`, converting each element with `as` semantics:
    /// floats truncate toward zero.
    pub fn cast<U: Element>(&self, order: Order) -> Result<Tensor<U>, TensorError> {
        if T::DTYPE == U::DTYPE && self.is_dense_in(order) {
            if let Some(same) = (self as &dyn Any).downcast_ref::<Tensor<U>>() {
                return Ok(same.clone());
            }
        }
        let order = self.copy_order(order);
        let data: Vec<U> = self.iter(order).map(|v| v.cast::<U>()).collect();
        Tensor::from_shape_vec_with_order(self.shape().clone(), data, order)
    }
}

/// Iterator over the element values of a tensor.
pub struct TensorIter<'a, T: Element> {
    storage: &'a TensorStorage<T>,
    pointers: PointerIterator,
}

impl<T: Element> Iterator for TensorIter<'_, T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        // SAFETY: pointers come from a layout validated against this storage
        self.pointers
            .next()
            .map(|p| unsafe { self.storage.get_unchecked(p) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pointers.size_hint()
    }
}

impl<T: Element> ExactSizeIterator for TensorIter<'_, T> {}

impl<T: Element> std::fmt::Debug for Tensor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("dtype", &T::DTYPE)
            .field("layout", &self.layout)
            .field("storage", &self.storage)
            .finish()
    }
}
