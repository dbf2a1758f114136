use ndstride_tensor::{Element, Order, StrideLayout, StrideLoopDescriptor, Tensor};

use crate::{
    error::TensorOpsError,
    kernels,
    op::{
        Abs, Add, BinaryOp, Ceil, Clamp, Cos, Div, Equal, Exp, Fill, FillNan, Floor, Greater, Less,
        Ln, Max, Maximum, Min, Minimum, Mul, NanSkip, NanToNum, Neg, Pow, Prod, ReduceOp, Rint,
        Sigmoid, Sin, Sqr, Sqrt, Sub, Sum, Tan, Tanh, UnaryOp, WithScalar,
    },
    parallel::{self, ExecutionStrategy},
};

/// Element-wise kernels and reductions over strided tensors.
///
/// The generic entry points take an op value and an [`ExecutionStrategy`];
/// the named methods below them run with [`ExecutionStrategy::Auto`].
///
/// In-place methods (`*_inplace`) write through every view sharing the
/// storage of `self` and require a layout where no two elements share a
/// storage cell. Allocating methods return a new dense tensor.
///
/// # Example
///
/// ```
/// use ndstride_tensor::{Order, Tensor};
/// use ndstride_tensor_ops::TensorOps;
///
/// let a = Tensor::<f32>::seq([2, 3])?;
/// let row = Tensor::<f32>::from_shape_vec([3], vec![10.0, 20.0, 30.0])?;
/// let b = a.add(&row)?;
/// assert_eq!(b.to_vec(Order::C), vec![10.0, 21.0, 32.0, 13.0, 24.0, 35.0]);
/// assert_eq!(b.sum()?, 135.0);
/// # Ok::<(), ndstride_tensor_ops::TensorOpsError>(())
/// ```
pub trait TensorOps<T: Element>: Sized {
    /// Applies `op` to every element in place.
    ///
    /// # Errors
    ///
    /// [`TensorOpsError::FloatingPointOnly`] for float-only ops on integer
    /// tensors and [`TensorOpsError::BroadcastWrite`] for aliased layouts.
    /// Nothing is written when an error is returned.
    fn apply_inplace<O: UnaryOp<T>>(
        &mut self,
        op: &O,
        strategy: ExecutionStrategy,
    ) -> Result<(), TensorOpsError>;

    /// Applies `op` to every element into a new tensor.
    fn map_op<O: UnaryOp<T>>(&self, op: &O, strategy: ExecutionStrategy) -> Result<Self, TensorOpsError>;

    /// Combines every element with a fixed right-hand value in place.
    fn scalar_inplace<O: BinaryOp<T>>(
        &mut self,
        op: O,
        value: T,
        strategy: ExecutionStrategy,
    ) -> Result<(), TensorOpsError>;

    /// Combines `self` with `rhs` broadcast to the shape of `self`, in place.
    ///
    /// # Errors
    ///
    /// [`TensorOpsError::ShapeMismatch`] when `rhs` does not broadcast to
    /// the shape of `self`.
    fn binary_inplace<O: BinaryOp<T>>(
        &mut self,
        rhs: &Self,
        op: &O,
        strategy: ExecutionStrategy,
    ) -> Result<(), TensorOpsError>;

    /// Combines `self` and `rhs` broadcast to their common shape.
    fn binary<O: BinaryOp<T>>(
        &self,
        rhs: &Self,
        op: &O,
        strategy: ExecutionStrategy,
    ) -> Result<Self, TensorOpsError>;

    /// Reduces every element to one value.
    ///
    /// # Errors
    ///
    /// [`TensorOpsError::EmptyTensor`] when the tensor is empty and the
    /// reduction has no identity.
    fn reduce<O: ReduceOp<T>>(&self, op: &O, strategy: ExecutionStrategy) -> Result<T, TensorOpsError>;

    /// Reduces along `axis`, dropping it or keeping it with length 1.
    fn reduce_axis<O: ReduceOp<T>>(
        &self,
        op: &O,
        axis: usize,
        keep_dim: bool,
        strategy: ExecutionStrategy,
    ) -> Result<Self, TensorOpsError>;

    /// Arithmetic mean of every element.
    ///
    /// Computed in f64 with a second corrective pass. Float tensors only.
    fn mean_with(&self, strategy: ExecutionStrategy) -> Result<T, TensorOpsError>;

    /// Arithmetic mean along `axis`. Float tensors only.
    fn mean_axis_with(
        &self,
        axis: usize,
        keep_dim: bool,
        strategy: ExecutionStrategy,
    ) -> Result<Self, TensorOpsError>;

    /// Arithmetic mean of the elements that are not NaN. Float tensors only.
    ///
    /// # Errors
    ///
    /// [`TensorOpsError::EmptyTensor`] when no element is a number.
    fn nan_mean_with(&self, strategy: ExecutionStrategy) -> Result<T, TensorOpsError>;

    /// Number of elements matching `pred`.
    fn count_with(
        &self,
        pred: impl Fn(T) -> bool + Sync,
        strategy: ExecutionStrategy,
    ) -> Result<usize, TensorOpsError>;

    /// Multi-index of the first largest element, NaN skipped unless every
    /// element is NaN.
    fn argmax(&self) -> Result<Vec<usize>, TensorOpsError>;

    /// Multi-index of the first smallest element, NaN skipped unless every
    /// element is NaN.
    fn argmin(&self) -> Result<Vec<usize>, TensorOpsError>;

    /// Absolute value.
    fn abs(&self) -> Result<Self, TensorOpsError> {
        self.map_op(&Abs, ExecutionStrategy::Auto)
    }

    /// Negation.
    fn neg(&self) -> Result<Self, TensorOpsError> {
        self.map_op(&Neg, ExecutionStrategy::Auto)
    }

    /// Floor. Float tensors only.
    fn floor(&self) -> Result<Self, TensorOpsError> {
        self.map_op(&Floor, ExecutionStrategy::Auto)
    }

    /// Ceiling. Float tensors only.
    fn ceil(&self) -> Result<Self, TensorOpsError> {
        self.map_op(&Ceil, ExecutionStrategy::Auto)
    }

    /// Square root. Float tensors only.
    fn sqrt(&self) -> Result<Self, TensorOpsError> {
        self.map_op(&Sqrt, ExecutionStrategy::Auto)
    }

    /// Natural exponential. Float tensors only.
    fn exp(&self) -> Result<Self, TensorOpsError> {
        self.map_op(&Exp, ExecutionStrategy::Auto)
    }

    /// Natural logarithm. Float tensors only.
    fn ln(&self) -> Result<Self, TensorOpsError> {
        self.map_op(&Ln, ExecutionStrategy::Auto)
    }

    /// Square. Integer squares wrap.
    fn sqr(&self) -> Result<Self, TensorOpsError> {
        self.map_op(&Sqr, ExecutionStrategy::Auto)
    }

    /// Raises every element to `power`. Float tensors only.
    fn pow(&self, power: f64) -> Result<Self, TensorOpsError> {
        self.map_op(&Pow(power), ExecutionStrategy::Auto)
    }

    /// Rounds to the nearest integer, ties to even. Float tensors only.
    fn rint(&self) -> Result<Self, TensorOpsError> {
        self.map_op(&Rint, ExecutionStrategy::Auto)
    }

    /// Sine. Float tensors only.
    fn sin(&self) -> Result<Self, TensorOpsError> {
        self.map_op(&Sin, ExecutionStrategy::Auto)
    }

    /// Cosine. Float tensors only.
    fn cos(&self) -> Result<Self, TensorOpsError> {
        self.map_op(&Cos, ExecutionStrategy::Auto)
    }

    /// Tangent. Float tensors only.
    fn tan(&self) -> Result<Self, TensorOpsError> {
        self.map_op(&Tan, ExecutionStrategy::Auto)
    }

    /// Hyperbolic tangent. Float tensors only.
    fn tanh(&self) -> Result<Self, TensorOpsError> {
        self.map_op(&Tanh, ExecutionStrategy::Auto)
    }

    /// Logistic sigmoid. Float tensors only.
    fn sigmoid(&self) -> Result<Self, TensorOpsError> {
        self.map_op(&Sigmoid, ExecutionStrategy::Auto)
    }

    /// Limits every element to `[min, max]`.
    fn clamp(&self, min: T, max: T) -> Result<Self, TensorOpsError> {
        self.map_op(&Clamp { min, max }, ExecutionStrategy::Auto)
    }

    /// Sets every element to `value` in place.
    fn fill_inplace(&mut self, value: T) -> Result<(), TensorOpsError> {
        self.apply_inplace(&Fill(value), ExecutionStrategy::Auto)
    }

    /// Replaces NaN with `value` in place.
    fn fill_nan_inplace(&mut self, value: T) -> Result<(), TensorOpsError> {
        self.apply_inplace(&FillNan(value), ExecutionStrategy::Auto)
    }

    /// Replaces NaN, negative and positive infinity in place.
    fn nan_to_num_inplace(&mut self, nan: T, neg_inf: T, pos_inf: T) -> Result<(), TensorOpsError> {
        self.apply_inplace(&NanToNum { nan, neg_inf, pos_inf }, ExecutionStrategy::Auto)
    }

    /// Element-wise sum with broadcasting.
    fn add(&self, rhs: &Self) -> Result<Self, TensorOpsError> {
        self.binary(rhs, &Add, ExecutionStrategy::Auto)
    }

    /// Element-wise difference with broadcasting.
    fn sub(&self, rhs: &Self) -> Result<Self, TensorOpsError> {
        self.binary(rhs, &Sub, ExecutionStrategy::Auto)
    }

    /// Element-wise product with broadcasting.
    fn mul(&self, rhs: &Self) -> Result<Self, TensorOpsError> {
        self.binary(rhs, &Mul, ExecutionStrategy::Auto)
    }

    /// Element-wise quotient with broadcasting.
    fn div(&self, rhs: &Self) -> Result<Self, TensorOpsError> {
        self.binary(rhs, &Div, ExecutionStrategy::Auto)
    }

    /// Element-wise minimum with broadcasting.
    fn minimum(&self, rhs: &Self) -> Result<Self, TensorOpsError> {
        self.binary(rhs, &Minimum, ExecutionStrategy::Auto)
    }

    /// Element-wise maximum with broadcasting.
    fn maximum(&self, rhs: &Self) -> Result<Self, TensorOpsError> {
        self.binary(rhs, &Maximum, ExecutionStrategy::Auto)
    }

    /// Adds `rhs` in place.
    fn add_inplace(&mut self, rhs: &Self) -> Result<(), TensorOpsError> {
        self.binary_inplace(rhs, &Add, ExecutionStrategy::Auto)
    }

    /// Subtracts `rhs` in place.
    fn sub_inplace(&mut self, rhs: &Self) -> Result<(), TensorOpsError> {
        self.binary_inplace(rhs, &Sub, ExecutionStrategy::Auto)
    }

    /// Multiplies by `rhs` in place.
    fn mul_inplace(&mut self, rhs: &Self) -> Result<(), TensorOpsError> {
        self.binary_inplace(rhs, &Mul, ExecutionStrategy::Auto)
    }

    /// Divides by `rhs` in place.
    fn div_inplace(&mut self, rhs: &Self) -> Result<(), TensorOpsError> {
        self.binary_inplace(rhs, &Div, ExecutionStrategy::Auto)
    }

    /// Adds `value` to every element in place.
    fn add_scalar_inplace(&mut self, value: T) -> Result<(), TensorOpsError> {
        self.scalar_inplace(Add, value, ExecutionStrategy::Auto)
    }

    /// Subtracts `value` from every element in place.
    fn sub_scalar_inplace(&mut self, value: T) -> Result<(), TensorOpsError> {
        self.scalar_inplace(Sub, value, ExecutionStrategy::Auto)
    }

    /// Multiplies every element by `value` in place.
    fn mul_scalar_inplace(&mut self, value: T) -> Result<(), TensorOpsError> {
        self.scalar_inplace(Mul, value, ExecutionStrategy::Auto)
    }

    /// Divides every element by `value` in place.
    fn div_scalar_inplace(&mut self, value: T) -> Result<(), TensorOpsError> {
        self.scalar_inplace(Div, value, ExecutionStrategy::Auto)
    }

    /// One where equal to `rhs`, zero elsewhere.
    fn eq_mask(&self, rhs: &Self) -> Result<Self, TensorOpsError> {
        self.binary(rhs, &Equal, ExecutionStrategy::Auto)
    }

    /// One where less than `rhs`, zero elsewhere.
    fn lt_mask(&self, rhs: &Self) -> Result<Self, TensorOpsError> {
        self.binary(rhs, &Less, ExecutionStrategy::Auto)
    }

    /// One where greater than `rhs`, zero elsewhere.
    fn gt_mask(&self, rhs: &Self) -> Result<Self, TensorOpsError> {
        self.binary(rhs, &Greater, ExecutionStrategy::Auto)
    }

    /// Sum of every element.
    fn sum(&self) -> Result<T, TensorOpsError> {
        self.reduce(&Sum, ExecutionStrategy::Auto)
    }

    /// Product of every element.
    fn prod(&self) -> Result<T, TensorOpsError> {
        self.reduce(&Prod, ExecutionStrategy::Auto)
    }

    /// Smallest element.
    fn min(&self) -> Result<T, TensorOpsError> {
        self.reduce(&Min, ExecutionStrategy::Auto)
    }

    /// Largest element.
    fn max(&self) -> Result<T, TensorOpsError> {
        self.reduce(&Max, ExecutionStrategy::Auto)
    }

    /// Mean of every element. Float tensors only.
    fn mean(&self) -> Result<T, TensorOpsError> {
        self.mean_with(ExecutionStrategy::Auto)
    }

    /// Sum of the elements that are not NaN.
    fn nan_sum(&self) -> Result<T, TensorOpsError> {
        self.reduce(&NanSkip(Sum), ExecutionStrategy::Auto)
    }

    /// Product of the elements that are not NaN.
    fn nan_prod(&self) -> Result<T, TensorOpsError> {
        self.reduce(&NanSkip(Prod), ExecutionStrategy::Auto)
    }

    /// Smallest element that is not NaN.
    fn nan_min(&self) -> Result<T, TensorOpsError> {
        self.reduce(&NanSkip(Min), ExecutionStrategy::Auto)
    }

    /// Largest element that is not NaN.
    fn nan_max(&self) -> Result<T, TensorOpsError> {
        self.reduce(&NanSkip(Max), ExecutionStrategy::Auto)
    }

    /// Mean of the elements that are not NaN. Float tensors only.
    fn nan_mean(&self) -> Result<T, TensorOpsError> {
        self.nan_mean_with(ExecutionStrategy::Auto)
    }

    /// Number of NaN elements, always zero for integer tensors.
    fn nan_count(&self) -> Result<usize, TensorOpsError> {
        self.count_with(|x| x.is_nan(), ExecutionStrategy::Auto)
    }

    /// Number of elements equal to zero.
    fn zero_count(&self) -> Result<usize, TensorOpsError> {
        self.count_with(|x| x.is_zero(), ExecutionStrategy::Auto)
    }

    /// Sum along `axis`.
    fn sum_axis(&self, axis: usize, keep_dim: bool) -> Result<Self, TensorOpsError> {
        self.reduce_axis(&Sum, axis, keep_dim, ExecutionStrategy::Auto)
    }

    /// Product along `axis`.
    fn prod_axis(&self, axis: usize, keep_dim: bool) -> Result<Self, TensorOpsError> {
        self.reduce_axis(&Prod, axis, keep_dim, ExecutionStrategy::Auto)
    }

    /// Minimum along `axis`.
    fn min_axis(&self, axis: usize, keep_dim: bool) -> Result<Self, TensorOpsError> {
        self.reduce_axis(&Min, axis, keep_dim, ExecutionStrategy::Auto)
    }

    /// Maximum along `axis`.
    fn max_axis(&self, axis: usize, keep_dim: bool) -> Result<Self, TensorOpsError> {
        self.reduce_axis(&Max, axis, keep_dim, ExecutionStrategy::Auto)
    }

    /// Mean along `axis`. Float tensors only.
    fn mean_axis(&self, axis: usize, keep_dim: bool) -> Result<Self, TensorOpsError> {
        self.mean_axis_with(axis, keep_dim, ExecutionStrategy::Auto)
    }

    /// Sum along `axis` ignoring NaN.
    fn nan_sum_axis(&self, axis: usize, keep_dim: bool) -> Result<Self, TensorOpsError> {
        self.reduce_axis(&NanSkip(Sum), axis, keep_dim, ExecutionStrategy::Auto)
    }

    /// Product along `axis` ignoring NaN.
    fn nan_prod_axis(&self, axis: usize, keep_dim: bool) -> Result<Self, TensorOpsError> {
        self.reduce_axis(&NanSkip(Prod), axis, keep_dim, ExecutionStrategy::Auto)
    }

    /// Minimum along `axis` ignoring NaN. Fails when a run holds only NaN.
    fn nan_min_axis(&self, axis: usize, keep_dim: bool) -> Result<Self, TensorOpsError> {
        self.reduce_axis(&NanSkip(Min), axis, keep_dim, ExecutionStrategy::Auto)
    }

    /// Maximum along `axis` ignoring NaN. Fails when a run holds only NaN.
    fn nan_max_axis(&self, axis: usize, keep_dim: bool) -> Result<Self, TensorOpsError> {
        self.reduce_axis(&NanSkip(Max), axis, keep_dim, ExecutionStrategy::Auto)
    }
}

impl<T: Element> TensorOps<T> for Tensor<T> {
    fn apply_inplace<O: UnaryOp<T>>(
        &mut self,
        op: &O,
        strategy: ExecutionStrategy,
    ) -> Result<(), TensorOpsError> {
        if O::FLOATING_POINT_ONLY {
            TensorOpsError::check_float(O::NAME, T::DTYPE)?;
        }
        check_writable(self)?;
        let lp = self.loop_descriptor(Order::S);
        let storage = self.storage();
        parallel::for_each_run(strategy, &lp.offsets, lp.len(), |&start| {
            // SAFETY: runs of a non-overlapping layout are disjoint
            unsafe { kernels::unary_run(storage, &lp, start, op) };
            Ok(())
        })
    }

    fn map_op<O: UnaryOp<T>>(&self, op: &O, strategy: ExecutionStrategy) -> Result<Self, TensorOpsError> {
        if O::FLOATING_POINT_ONLY {
            TensorOpsError::check_float(O::NAME, T::DTYPE)?;
        }
        let mut out = self.copy(Order::S)?;
        out.apply_inplace(op, strategy)?;
        Ok(out)
    }

    fn scalar_inplace<O: BinaryOp<T>>(
        &mut self,
        op: O,
        value: T,
        strategy: ExecutionStrategy,
    ) -> Result<(), TensorOpsError> {
        check_writable(self)?;
        if self.is_empty() {
            return Ok(());
        }
        op.check_rhs(value)?;
        let unary = WithScalar { op, value };
        let lp = self.loop_descriptor(Order::S);
        let storage = self.storage();
        parallel::for_each_run(strategy, &lp.offsets, lp.len(), |&start| {
            if lp.is_unit() {
                unary.op.apply_range(storage, start, lp.bound, value)?;
            } else {
                // SAFETY: runs of a non-overlapping layout are disjoint
                unsafe { kernels::unary_run(storage, &lp, start, &unary) };
            }
            Ok(())
        })
    }

    fn binary_inplace<O: BinaryOp<T>>(
        &mut self,
        rhs: &Self,
        op: &O,
        strategy: ExecutionStrategy,
    ) -> Result<(), TensorOpsError> {
        let rhs = rhs.broadcast_to(self.shape()).map_err(|_| {
            TensorOpsError::ShapeMismatch(self.shape().dims().to_vec(), rhs.shape().dims().to_vec())
        })?;
        check_writable(self)?;
        if O::CHECKS_RHS {
            for value in rhs.iter(Order::S) {
                op.check_rhs(value)?;
            }
        }
        let rhs = if rhs.shares_storage(self) {
            log::warn!("{}: right-hand side aliases the output, copying it first", O::NAME);
            rhs.copy(Order::S)?
        } else {
            rhs
        };

        let layouts = [self.layout(), rhs.layout()];
        let order = StrideLayout::storage_fast_tandem_order(&layouts);
        let lps = StrideLoopDescriptor::of_tandem(&layouts, order, T::LANES)?;
        let (dst_lp, src_lp) = (&lps[0], &lps[1]);
        let runs: Vec<(usize, usize)> = dst_lp
            .offsets
            .iter()
            .copied()
            .zip(src_lp.offsets.iter().copied())
            .collect();
        let (dst, src) = (self.storage(), rhs.storage());
        parallel::for_each_run(strategy, &runs, dst_lp.len(), |&(d, s)| {
            // SAFETY: distinct storages, disjoint output runs
            unsafe { kernels::binary_run(dst, dst_lp, d, src, src_lp, s, op)? };
            Ok(())
        })
    }

    fn binary<O: BinaryOp<T>>(
        &self,
        rhs: &Self,
        op: &O,
        strategy: ExecutionStrategy,
    ) -> Result<Self, TensorOpsError> {
        let shape = self.shape().broadcast(rhs.shape()).map_err(|_| {
            TensorOpsError::ShapeMismatch(self.shape().dims().to_vec(), rhs.shape().dims().to_vec())
        })?;
        let mut out = self.broadcast_to(&shape)?.copy(Order::C)?;
        out.binary_inplace(rhs, op, strategy)?;
        Ok(out)
    }

    fn reduce<O: ReduceOp<T>>(&self, op: &O, strategy: ExecutionStrategy) -> Result<T, TensorOpsError> {
        let lp = self.loop_descriptor(Order::S);
        let storage = self.storage();
        let partials = parallel::map_runs(strategy, &lp.offsets, lp.len(), |&start| {
            // SAFETY: offsets come from a layout validated against this storage
            unsafe { fold_values(storage, start, lp.bound, lp.step, op) }
        })?;
        partials
            .into_iter()
            .flatten()
            .reduce(|a, b| op.fold(a, b))
            .or_else(|| op.identity())
            .ok_or_else(|| TensorOpsError::EmptyTensor(O::NAME.to_string()))
    }

    fn reduce_axis<O: ReduceOp<T>>(
        &self,
        op: &O,
        axis: usize,
        keep_dim: bool,
        strategy: ExecutionStrategy,
    ) -> Result<Self, TensorOpsError> {
        let values = axis_runs(self, axis, strategy, |storage, start, dim, stride| {
            // SAFETY: runs come from a layout validated against this storage
            unsafe { fold_values(storage, start, dim, stride, op) }
        })?;
        let identity = op.identity();
        let data = values
            .into_iter()
            .map(|v| v.or(identity))
            .collect::<Option<Vec<T>>>()
            .ok_or_else(|| TensorOpsError::EmptyTensor(O::NAME.to_string()))?;
        Ok(Tensor::from_shape_vec(reduced_dims(self, axis, keep_dim), data)?)
    }

    fn mean_with(&self, strategy: ExecutionStrategy) -> Result<T, TensorOpsError> {
        TensorOpsError::check_float("mean", T::DTYPE)?;
        if self.is_empty() {
            return Err(TensorOpsError::EmptyTensor("mean".to_string()));
        }
        let lp = self.loop_descriptor(Order::S);
        let storage = self.storage();
        let n = self.size() as f64;
        let sums = parallel::map_runs(strategy, &lp.offsets, lp.len(), |&start| {
            // SAFETY: offsets come from a layout validated against this storage
            unsafe { kernels::fold_run(storage, start, lp.bound, lp.step, 0.0, |acc, x: T| acc + x.to_f64()) }
        })?;
        let mean = sums.iter().sum::<f64>() / n;
        let residuals = parallel::map_runs(strategy, &lp.offsets, lp.len(), |&start| {
            // SAFETY: as above
            unsafe {
                kernels::fold_run(storage, start, lp.bound, lp.step, 0.0, |acc, x: T| {
                    acc + (x.to_f64() - mean)
                })
            }
        })?;
        Ok(T::from_f64(mean + residuals.iter().sum::<f64>() / n))
    }

    fn mean_axis_with(
        &self,
        axis: usize,
        keep_dim: bool,
        strategy: ExecutionStrategy,
    ) -> Result<Self, TensorOpsError> {
        TensorOpsError::check_float("mean", T::DTYPE)?;
        let values = axis_runs(self, axis, strategy, |storage, start, dim, stride| {
            // SAFETY: runs come from a layout validated against this storage
            unsafe { corrected_mean(storage, start, dim, stride) }
        })?;
        let data = values
            .into_iter()
            .collect::<Option<Vec<T>>>()
            .ok_or_else(|| TensorOpsError::EmptyTensor("mean".to_string()))?;
        Ok(Tensor::from_shape_vec(reduced_dims(self, axis, keep_dim), data)?)
    }

    fn nan_mean_with(&self, strategy: ExecutionStrategy) -> Result<T, TensorOpsError> {
        TensorOpsError::check_float("nan_mean", T::DTYPE)?;
        let lp = self.loop_descriptor(Order::S);
        let storage = self.storage();
        let sums = parallel::map_runs(strategy, &lp.offsets, lp.len(), |&start| {
            // SAFETY: offsets come from a layout validated against this storage
            unsafe {
                kernels::fold_run(storage, start, lp.bound, lp.step, (0.0, 0usize), |(acc, n), x: T| {
                    if x.is_nan() {
                        (acc, n)
                    } else {
                        (acc + x.to_f64(), n + 1)
                    }
                })
            }
        })?;
        let (sum, count) = sums.iter().fold((0.0, 0), |(s, c), &(ps, pc)| (s + ps, c + pc));
        if count == 0 {
            return Err(TensorOpsError::EmptyTensor("nan_mean".to_string()));
        }
        let n = count as f64;
        let mean = sum / n;
        let residuals = parallel::map_runs(strategy, &lp.offsets, lp.len(), |&start| {
            // SAFETY: as above
            unsafe {
                kernels::fold_run(storage, start, lp.bound, lp.step, 0.0, |acc, x: T| {
                    if x.is_nan() {
                        acc
                    } else {
                        acc + (x.to_f64() - mean)
                    }
                })
            }
        })?;
        Ok(T::from_f64(mean + residuals.iter().sum::<f64>() / n))
    }

    fn count_with(
        &self,
        pred: impl Fn(T) -> bool + Sync,
        strategy: ExecutionStrategy,
    ) -> Result<usize, TensorOpsError> {
        let lp = self.loop_descriptor(Order::S);
        let storage = self.storage();
        let counts = parallel::map_runs(strategy, &lp.offsets, lp.len(), |&start| {
            // SAFETY: offsets come from a layout validated against this storage
            unsafe {
                kernels::fold_run(storage, start, lp.bound, lp.step, 0usize, |n, x| {
                    n + usize::from(pred(x))
                })
            }
        })?;
        Ok(counts.into_iter().sum())
    }

    fn argmax(&self) -> Result<Vec<usize>, TensorOpsError> {
        arg_best(self, "argmax", |x, best| x > best)
    }

    fn argmin(&self) -> Result<Vec<usize>, TensorOpsError> {
        arg_best(self, "argmin", |x, best| x < best)
    }
}

fn check_writable<T: Element>(tensor: &Tensor<T>) -> Result<(), TensorOpsError> {
    if tensor.layout().is_non_overlapping() {
        Ok(())
    } else {
        Err(TensorOpsError::BroadcastWrite)
    }
}

/// Folds one run with `op`, `None` when the run has no element `op` keeps.
unsafe fn fold_values<T: Element, O: ReduceOp<T>>(
    storage: &ndstride_tensor::TensorStorage<T>,
    start: usize,
    bound: usize,
    step: isize,
    op: &O,
) -> Option<T> {
    kernels::fold_run(storage, start, bound, step, None, |acc, x| {
        if op.skip(x) {
            return acc;
        }
        Some(match acc {
            Some(a) => op.fold(a, x),
            None => x,
        })
    })
}

/// Two-pass mean of one run, `None` when the run is empty.
unsafe fn corrected_mean<T: Element>(
    storage: &ndstride_tensor::TensorStorage<T>,
    start: usize,
    bound: usize,
    step: isize,
) -> Option<T> {
    if bound == 0 {
        return None;
    }
    let n = bound as f64;
    let mean = kernels::fold_run(storage, start, bound, step, 0.0, |acc, x: T| acc + x.to_f64()) / n;
    let residual = kernels::fold_run(storage, start, bound, step, 0.0, |acc, x: T| {
        acc + (x.to_f64() - mean)
    });
    Some(T::from_f64(mean + residual / n))
}

/// Evaluates `f` on every run along `axis`, in row-major order of the
/// remaining axes.
fn axis_runs<T, R, F>(
    tensor: &Tensor<T>,
    axis: usize,
    strategy: ExecutionStrategy,
    f: F,
) -> Result<Vec<R>, TensorOpsError>
where
    T: Element,
    R: Send,
    F: Fn(&ndstride_tensor::TensorStorage<T>, usize, usize, isize) -> R + Sync + Send,
{
    TensorOpsError::check_axis(axis, tensor.rank())?;
    let dim = tensor.dim(axis)?;
    let stride = tensor.strides()[axis];
    let mut dims = tensor.shape().dims().to_vec();
    dims.remove(axis);
    if dim == 0 {
        let outer: usize = dims.iter().product();
        let storage = tensor.storage();
        return Ok((0..outer).map(|_| f(storage, 0, 0, stride)).collect());
    }
    let starts: Vec<usize> = tensor.sel_squeeze(axis, 0)?.ptr_iter(Order::C).collect();
    let storage = tensor.storage();
    parallel::map_runs(strategy, &starts, tensor.size(), |&start| {
        f(storage, start, dim, stride)
    })
}

fn reduced_dims<T: Element>(tensor: &Tensor<T>, axis: usize, keep_dim: bool) -> Vec<usize> {
    let mut dims = tensor.shape().dims().to_vec();
    if keep_dim {
        dims[axis] = 1;
    } else {
        dims.remove(axis);
    }
    dims
}

fn arg_best<T: Element>(
    tensor: &Tensor<T>,
    name: &str,
    better: impl Fn(T, T) -> bool,
) -> Result<Vec<usize>, TensorOpsError> {
    let mut best: Option<(usize, T)> = None;
    for (pos, x) in tensor.iter(Order::C).enumerate() {
        best = match best {
            None => Some((pos, x)),
            Some((_, b)) if !x.is_nan() && (b.is_nan() || better(x, b)) => Some((pos, x)),
            keep => keep,
        };
    }
    let (pos, _) = best.ok_or_else(|| TensorOpsError::EmptyTensor(name.to_string()))?;
    Ok(tensor.shape().index(Order::C, pos)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndstride_tensor::{Shape, TensorError};

    #[test]
    fn test_unary_on_views() -> Result<(), TensorOpsError> {
        let t = Tensor::<i32>::from_shape_vec([2, 3], vec![-1, 2, -3, 4, -5, 6])?;
        let a = t.t().abs()?;
        assert_eq!(a.shape().dims(), &[3, 2]);
        assert_eq!(a.to_vec(Order::C), vec![1, 4, 2, 5, 3, 6]);

        let mut column = t.narrow(1, false, 1, 2)?;
        column.fill_inplace(0)?;
        assert_eq!(t.to_vec(Order::C), vec![-1, 0, -3, 4, 0, 6]);
        Ok(())
    }

    #[test]
    fn test_float_only_rejects_integers() -> Result<(), TensorError> {
        let mut t = Tensor::<i64>::seq([4])?;
        let res = t.apply_inplace(&Floor, ExecutionStrategy::Serial);
        assert_eq!(
            res,
            Err(TensorOpsError::FloatingPointOnly {
                op: "floor",
                dtype: ndstride_tensor::DType::I64
            })
        );
        assert!(t.mean().is_err());
        assert_eq!(t.to_vec(Order::C), vec![0, 1, 2, 3]);
        Ok(())
    }

    #[test]
    fn test_float_unary() -> Result<(), TensorOpsError> {
        let t = Tensor::<f64>::from_shape_vec([4], vec![-1.5, 0.2, 4.0, 9.0])?;
        assert_eq!(t.floor()?.to_vec(Order::C), vec![-2.0, 0.0, 4.0, 9.0]);
        assert_eq!(t.ceil()?.to_vec(Order::C), vec![-1.0, 1.0, 4.0, 9.0]);
        let r = t.narrow(0, false, 2, 4)?.sqrt()?;
        assert_eq!(r.to_vec(Order::C), vec![2.0, 3.0]);
        let e = t.exp()?.ln()?;
        for (a, b) in e.to_vec(Order::C).iter().zip(t.to_vec(Order::C)) {
            assert_relative_eq!(*a, b, epsilon = 1e-12);
        }
        assert_eq!(t.clamp(0.0, 5.0)?.to_vec(Order::C), vec![0.0, 0.2, 4.0, 5.0]);
        Ok(())
    }

    #[test]
    fn test_broadcast_write_rejected() -> Result<(), TensorOpsError> {
        let t = Tensor::<f32>::from_shape_vec([1, 3], vec![1.0, 2.0, 3.0])?;
        let mut e = t.expand(0, 4)?;
        assert_eq!(e.neg().map(|n| n.size()), Ok(12));
        assert_eq!(e.add_scalar_inplace(1.0), Err(TensorOpsError::BroadcastWrite));
        assert_eq!(t.to_vec(Order::C), vec![1.0, 2.0, 3.0]);
        Ok(())
    }

    #[test]
    fn test_binary_broadcast() -> Result<(), TensorOpsError> {
        let a = Tensor::<i32>::seq([2, 3])?;
        let col = Tensor::<i32>::from_shape_vec([2, 1], vec![100, 200])?;
        let b = a.add(&col)?;
        assert_eq!(b.to_vec(Order::C), vec![100, 101, 102, 203, 204, 205]);

        let row = Tensor::<i32>::from_shape_vec([3], vec![1, 2, 3])?;
        let outer = col.mul(&row)?;
        assert_eq!(outer.shape(), &Shape::new(&[2, 3]));
        assert_eq!(outer.to_vec(Order::C), vec![100, 200, 300, 200, 400, 600]);

        let bad = Tensor::<i32>::seq([4])?;
        assert!(matches!(a.add(&bad), Err(TensorOpsError::ShapeMismatch(_, _))));
        Ok(())
    }

    #[test]
    fn test_binary_inplace_mixed_orders() -> Result<(), TensorOpsError> {
        let mut a = Tensor::<f64>::zeros_with_order([3, 4], Order::F)?;
        let b = Tensor::<f64>::seq([4, 3])?.t();
        a.add_inplace(&b)?;
        for i in 0..3 {
            for j in 0..4 {
                assert_eq!(a.get(&[i, j])?, (j * 3 + i) as f64);
            }
        }
        Ok(())
    }

    #[test]
    fn test_aliased_rhs_is_materialized() -> Result<(), TensorOpsError> {
        let mut a = Tensor::<i32>::seq([3, 3])?;
        let at = a.t();
        a.add_inplace(&at)?;
        assert_eq!(a.to_vec(Order::C), vec![0, 4, 8, 4, 8, 12, 8, 12, 16]);
        Ok(())
    }

    #[test]
    fn test_integer_division_by_zero() -> Result<(), TensorOpsError> {
        let mut a = Tensor::<i16>::seq([4])?;
        let b = Tensor::<i16>::from_shape_vec([4], vec![1, 1, 0, 1])?;
        assert!(a.div_inplace(&b).is_err());
        assert_eq!(a.to_vec(Order::C), vec![0, 1, 2, 3]);
        assert!(a.div_scalar_inplace(0).is_err());
        a.mul_scalar_inplace(6)?;
        a.div_scalar_inplace(4)?;
        assert_eq!(a.to_vec(Order::C), vec![0, 1, 3, 4]);
        Ok(())
    }

    #[test]
    fn test_masks() -> Result<(), TensorOpsError> {
        let a = Tensor::<f32>::from_shape_vec([4], vec![1.0, 2.0, 3.0, f32::NAN])?;
        let b = Tensor::<f32>::scalar(2.0)?;
        assert_eq!(a.eq_mask(&b)?.to_vec(Order::C), vec![0.0, 1.0, 0.0, 0.0]);
        assert_eq!(a.lt_mask(&b)?.to_vec(Order::C), vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(a.gt_mask(&b)?.to_vec(Order::C), vec![0.0, 0.0, 1.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_reductions() -> Result<(), TensorOpsError> {
        let t = Tensor::<i64>::seq([3, 4])?;
        assert_eq!(t.sum()?, 66);
        assert_eq!(t.narrow(1, false, 1, 3)?.prod()?, 2 * 5 * 6 * 9 * 10);
        assert_eq!(t.t().min()?, 0);
        assert_eq!(t.flip(0)?.max()?, 11);

        let rows = t.sum_axis(1, false)?;
        assert_eq!(rows.to_vec(Order::C), vec![6, 22, 38]);
        let cols = t.max_axis(0, true)?;
        assert_eq!(cols.shape().dims(), &[1, 4]);
        assert_eq!(cols.to_vec(Order::C), vec![8, 9, 10, 11]);
        assert!(matches!(t.sum_axis(2, false), Err(TensorOpsError::DimOutOfBounds(2, 2))));
        Ok(())
    }

    #[test]
    fn test_empty_reductions() -> Result<(), TensorOpsError> {
        let t = Tensor::<f32>::zeros([0, 3])?;
        assert_eq!(t.sum()?, 0.0);
        assert_eq!(t.prod()?, 1.0);
        assert!(matches!(t.max(), Err(TensorOpsError::EmptyTensor(_))));
        assert!(t.mean().is_err());
        assert_eq!(t.sum_axis(0, false)?.to_vec(Order::C), vec![0.0, 0.0, 0.0]);
        assert!(t.min_axis(0, false).is_err());
        assert_eq!(t.max_axis(1, false)?.size(), 0);
        Ok(())
    }

    #[test]
    fn test_mean() -> Result<(), TensorOpsError> {
        let t = Tensor::<f64>::from_shape_vec([2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?;
        assert_relative_eq!(t.mean()?, 3.5);
        let m = t.mean_axis(0, false)?;
        assert_eq!(m.to_vec(Order::C), vec![2.5, 3.5, 4.5]);
        let m = t.t().mean_axis(0, true)?;
        assert_eq!(m.shape().dims(), &[1, 2]);
        assert_eq!(m.to_vec(Order::C), vec![2.0, 5.0]);

        let big = Tensor::<f32>::from_shape_val([1000], 1e4 + 0.1)?;
        assert_relative_eq!(big.mean()?, 1e4 + 0.1, max_relative = 1e-6);
        Ok(())
    }

    #[test]
    fn test_integer_overflow_wraps() -> Result<(), TensorOpsError> {
        let mut t = Tensor::<i8>::from_shape_vec([2], vec![127, 0])?;
        t.add_scalar_inplace(1)?;
        assert_eq!(t.to_vec(Order::C), vec![i8::MIN, 1]);

        let s = Tensor::<i32>::from_shape_vec([2, 1], vec![i32::MAX, 1])?;
        assert_eq!(s.sum()?, i32::MIN);
        assert_eq!(s.sum_axis(0, false)?.to_vec(Order::C), vec![i32::MIN]);

        let m = Tensor::<i8>::from_shape_vec([2], vec![i8::MIN, -7])?;
        assert_eq!(m.abs()?.to_vec(Order::C), vec![i8::MIN, 7]);
        assert_eq!(m.neg()?.to_vec(Order::C), vec![i8::MIN, 7]);
        assert_eq!(m.sqr()?.to_vec(Order::C), vec![0, 49]);

        let mut d = Tensor::<i64>::from_shape_vec([2], vec![i64::MIN, 9])?;
        d.div_scalar_inplace(-1)?;
        assert_eq!(d.to_vec(Order::C), vec![i64::MIN, -9]);
        let rhs = Tensor::<i64>::from_shape_vec([1], vec![-1])?;
        d.sub_inplace(&rhs)?;
        d.mul_inplace(&rhs)?;
        assert_eq!(d.to_vec(Order::C), vec![i64::MAX, 8]);
        Ok(())
    }

    #[test]
    fn test_float_family() -> Result<(), TensorOpsError> {
        let t = Tensor::<f64>::from_shape_vec([4], vec![0.5, 1.5, -2.5, 3.0])?;
        assert_eq!(t.rint()?.to_vec(Order::C), vec![0.0, 2.0, -2.0, 3.0]);
        assert_eq!(t.sqr()?.to_vec(Order::C), vec![0.25, 2.25, 6.25, 9.0]);
        assert_eq!(t.pow(2.0)?.to_vec(Order::C), t.sqr()?.to_vec(Order::C));
        let z = Tensor::<f32>::zeros([2])?;
        assert_eq!(z.sigmoid()?.to_vec(Order::C), vec![0.5, 0.5]);
        assert_eq!(z.cos()?.to_vec(Order::C), vec![1.0, 1.0]);
        assert_eq!(z.sin()?.to_vec(Order::C), vec![0.0, 0.0]);
        assert_eq!(z.tan()?.to_vec(Order::C), vec![0.0, 0.0]);
        let th = t.tanh()?;
        for (a, b) in th.to_vec(Order::C).iter().zip(t.to_vec(Order::C)) {
            assert_relative_eq!(*a, b.tanh());
        }

        let i = Tensor::<i32>::seq([3])?;
        assert!(matches!(i.pow(2.0), Err(TensorOpsError::FloatingPointOnly { op: "pow", .. })));
        assert!(i.rint().is_err());
        assert!(i.sigmoid().is_err());
        assert_eq!(i.sqr()?.to_vec(Order::C), vec![0, 1, 4]);
        Ok(())
    }

    #[test]
    fn test_nan_cleanup_inplace() -> Result<(), TensorOpsError> {
        let t = Tensor::<f64>::from_shape_vec(
            [2, 2],
            vec![f64::NAN, f64::NEG_INFINITY, 1.0, f64::INFINITY],
        )?;
        let mut col = t.narrow(1, false, 0, 1)?;
        col.fill_nan_inplace(-1.0)?;
        assert_eq!(t.get(&[0, 0])?, -1.0);
        assert_eq!(t.get(&[0, 1])?, f64::NEG_INFINITY);

        let mut all = t.clone();
        all.fill_inplace(f64::NAN)?;
        all.nan_to_num_inplace(0.0, -9.0, 9.0)?;
        assert_eq!(t.to_vec(Order::C), vec![0.0, 0.0, 0.0, 0.0]);

        let mut u = Tensor::<f32>::from_shape_vec([3], vec![f32::NAN, f32::NEG_INFINITY, f32::INFINITY])?;
        u.nan_to_num_inplace(0.0, -9.0, 9.0)?;
        assert_eq!(u.to_vec(Order::C), vec![0.0, -9.0, 9.0]);

        let mut i = Tensor::<i16>::from_shape_vec([2], vec![i16::MIN, i16::MAX])?;
        i.nan_to_num_inplace(0, 0, 0)?;
        i.fill_nan_inplace(1)?;
        assert_eq!(i.to_vec(Order::C), vec![i16::MIN, i16::MAX]);
        Ok(())
    }

    #[test]
    fn test_nan_reductions() -> Result<(), TensorOpsError> {
        let nan = f64::NAN;
        let t = Tensor::<f64>::from_shape_vec([2, 3], vec![nan, 2.0, 0.0, 4.0, nan, -1.0])?;
        assert!(t.sum()?.is_nan());
        assert!(t.min()?.is_nan());
        assert!(t.max()?.is_nan());
        assert_eq!(t.nan_sum()?, 5.0);
        assert_eq!(t.nan_prod()?, 0.0);
        assert_eq!(t.nan_min()?, -1.0);
        assert_eq!(t.nan_max()?, 4.0);
        assert_relative_eq!(t.nan_mean()?, 1.25);
        assert_eq!(t.nan_count()?, 2);
        assert_eq!(t.zero_count()?, 1);

        assert_eq!(t.nan_sum_axis(0, false)?.to_vec(Order::C), vec![4.0, 2.0, -1.0]);
        assert_eq!(t.t().nan_max_axis(0, true)?.to_vec(Order::C), vec![2.0, 4.0]);
        assert_eq!(t.nan_prod_axis(1, false)?.to_vec(Order::C), vec![0.0, -4.0]);
        assert_eq!(t.nan_min_axis(1, false)?.to_vec(Order::C), vec![0.0, -1.0]);

        let all_nan = Tensor::<f32>::from_shape_val([3], f32::NAN)?;
        assert_eq!(all_nan.nan_sum()?, 0.0);
        assert_eq!(all_nan.nan_prod()?, 1.0);
        assert!(matches!(all_nan.nan_min(), Err(TensorOpsError::EmptyTensor(_))));
        assert!(matches!(all_nan.nan_mean(), Err(TensorOpsError::EmptyTensor(_))));
        assert!(all_nan.nan_max_axis(0, false).is_err());

        let ints = Tensor::<i32>::from_shape_vec([4], vec![0, 3, 0, -2])?;
        assert_eq!(ints.nan_count()?, 0);
        assert_eq!(ints.zero_count()?, 2);
        assert_eq!(ints.nan_min()?, -2);
        assert_eq!(ints.nan_sum()?, 1);
        assert!(ints.nan_mean().is_err());
        Ok(())
    }

    #[test]
    fn test_argmax_argmin() -> Result<(), TensorOpsError> {
        let t = Tensor::<f64>::from_shape_vec([2, 3], vec![f64::NAN, 5.0, -2.0, 5.0, -2.0, 1.0])?;
        assert_eq!(t.argmax()?, vec![0, 1]);
        assert_eq!(t.argmin()?, vec![0, 2]);
        assert_eq!(t.t().argmin()?, vec![1, 1]);
        let empty = Tensor::<i8>::zeros([0])?;
        assert!(empty.argmax().is_err());
        Ok(())
    }

    #[test]
    fn test_strategies_agree() -> Result<(), TensorOpsError> {
        let t = Tensor::<f64>::seq([64, 33])?.t();
        let serial = t.reduce_axis(&Sum, 1, false, ExecutionStrategy::Serial)?;
        let parallel = t.reduce_axis(&Sum, 1, false, ExecutionStrategy::Parallel)?;
        let fixed = t.reduce_axis(&Sum, 1, false, ExecutionStrategy::Fixed(3))?;
        assert_eq!(serial.to_vec(Order::C), parallel.to_vec(Order::C));
        assert_eq!(serial.to_vec(Order::C), fixed.to_vec(Order::C));

        let mut a = t.copy(Order::C)?;
        let mut b = t.copy(Order::C)?;
        a.apply_inplace(&Neg, ExecutionStrategy::Serial)?;
        b.apply_inplace(&Neg, ExecutionStrategy::Parallel)?;
        assert_eq!(a.to_vec(Order::C), b.to_vec(Order::C));
        Ok(())
    }
}
