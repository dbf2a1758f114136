use crate::{error::check_axis, Element, Order, Shape, Tensor, TensorError};

impl<T: Element> Tensor<T> {
    /// Concatenates tensors along an existing axis into a new dense buffer.
    ///
    /// All tensors must have the same rank and agree on every other axis.
    pub fn cat(order: Order, axis: usize, tensors: &[Tensor<T>]) -> Result<Tensor<T>, TensorError> {
        let first = tensors
            .first()
            .ok_or(TensorError::invalid_argument("cat needs at least one tensor"))?;
        check_axis(axis, first.rank())?;
        let mut dims = first.shape().dims().to_vec();
        dims[axis] = 0;
        for tensor in tensors {
            let other = tensor.shape().dims();
            let compatible = other.len() == dims.len()
                && other
                    .iter()
                    .zip(first.shape().dims())
                    .enumerate()
                    .all(|(i, (a, b))| i == axis || a == b);
            if !compatible {
                return Err(TensorError::dimension_mismatch(
                    format!("cat along axis {axis} needs equal dims elsewhere"),
                    first.shape().dims(),
                    other,
                ));
            }
            dims[axis] += other[axis];
        }
        let result = Tensor::zeros_with_order(Shape::from(dims), order.dense())?;
        let mut start = 0;
        for tensor in tensors {
            let end = start + tensor.shape().dims()[axis];
            let mut dst = result.narrow(axis, true, start, end)?;
            tensor.copy_to(&mut dst)?;
            start = end;
        }
        Ok(result)
    }

    /// Stacks equally shaped tensors along a new axis at position `axis`.
    pub fn stack(order: Order, axis: usize, tensors: &[Tensor<T>]) -> Result<Tensor<T>, TensorError> {
        let first = tensors
            .first()
            .ok_or(TensorError::invalid_argument("stack needs at least one tensor"))?;
        check_axis(axis, first.rank() + 1)?;
        if let Some(other) = tensors.iter().find(|t| t.shape() != first.shape()) {
            return Err(TensorError::dimension_mismatch(
                "stack needs equal shapes",
                first.shape().dims(),
                other.shape().dims(),
            ));
        }
        let mut dims = first.shape().dims().to_vec();
        dims.insert(axis, tensors.len());
        let result = Tensor::zeros_with_order(Shape::from(dims), order.dense())?;
        for (i, tensor) in tensors.iter().enumerate() {
            let mut dst = result.narrow(axis, false, i, i + 1)?;
            tensor.copy_to(&mut dst)?;
        }
        Ok(result)
    }

    /// Repeats the tensor `times` times along `axis`, concatenating or
    /// stacking the copies.
    pub fn repeat(&self, order: Order, axis: usize, times: usize, stack: bool) -> Result<Tensor<T>, TensorError> {
        if times == 0 {
            return Err(TensorError::invalid_argument("repeat count must be positive"));
        }
        let copies = vec![self.clone(); times];
        if stack {
            Tensor::stack(order, axis, &copies)
        } else {
            Tensor::cat(order, axis, &copies)
        }
    }
}
