//! Kernels on [`DynTensor`], resolved to the typed kernel once per call.

use ndstride_tensor::{dispatch_dyn, DType, DynTensor, Element, Order, Tensor};

use crate::{error::TensorOpsError, ops::TensorOps};

/// Names a kernel that can run on a [`DynTensor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryKind {
    /// Absolute value.
    Abs,
    /// Negation.
    Neg,
    /// Floor, float only.
    Floor,
    /// Ceiling, float only.
    Ceil,
    /// Square root, float only.
    Sqrt,
    /// Exponential, float only.
    Exp,
    /// Natural logarithm, float only.
    Ln,
    /// Square.
    Sqr,
    /// Round half to even, float only.
    Rint,
    /// Sine, float only.
    Sin,
    /// Cosine, float only.
    Cos,
    /// Tangent, float only.
    Tan,
    /// Hyperbolic tangent, float only.
    Tanh,
    /// Logistic sigmoid, float only.
    Sigmoid,
}

/// Names a binary kernel that can run on a [`DynTensor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryKind {
    /// Sum.
    Add,
    /// Difference.
    Sub,
    /// Product.
    Mul,
    /// Quotient.
    Div,
    /// Minimum.
    Minimum,
    /// Maximum.
    Maximum,
}

/// Runtime-dtype front end of [`TensorOps`].
pub trait DynTensorOps {
    /// Applies a unary kernel into a new tensor of the same dtype.
    fn unary(&self, kind: UnaryKind) -> Result<DynTensor, TensorOpsError>;

    /// Applies a binary kernel with broadcasting.
    ///
    /// `rhs` is first cast to the dtype of `self` when they differ.
    fn binary(&self, rhs: &DynTensor, kind: BinaryKind) -> Result<DynTensor, TensorOpsError>;

    /// Sum of every element, widened to f64.
    fn sum_f64(&self) -> Result<f64, TensorOpsError>;

    /// Mean of every element. Float dtypes only.
    fn mean_f64(&self) -> Result<f64, TensorOpsError>;

    /// Sum of the elements that are not NaN, widened to f64.
    fn nan_sum_f64(&self) -> Result<f64, TensorOpsError>;

    /// Number of NaN elements.
    fn nan_count(&self) -> Result<usize, TensorOpsError>;

    /// Multi-index of the first largest element.
    fn argmax(&self) -> Result<Vec<usize>, TensorOpsError>;
}

fn unary_typed<T: Element>(
    t: &Tensor<T>,
    kind: UnaryKind,
) -> Result<Tensor<T>, TensorOpsError> {
    match kind {
        UnaryKind::Abs => t.abs(),
        UnaryKind::Neg => t.neg(),
        UnaryKind::Floor => t.floor(),
        UnaryKind::Ceil => t.ceil(),
        UnaryKind::Sqrt => t.sqrt(),
        UnaryKind::Exp => t.exp(),
        UnaryKind::Ln => t.ln(),
        UnaryKind::Sqr => t.sqr(),
        UnaryKind::Rint => t.rint(),
        UnaryKind::Sin => t.sin(),
        UnaryKind::Cos => t.cos(),
        UnaryKind::Tan => t.tan(),
        UnaryKind::Tanh => t.tanh(),
        UnaryKind::Sigmoid => t.sigmoid(),
    }
}

fn binary_typed<T: Element>(
    t: &Tensor<T>,
    rhs: &Tensor<T>,
    kind: BinaryKind,
) -> Result<Tensor<T>, TensorOpsError> {
    match kind {
        BinaryKind::Add => t.add(rhs),
        BinaryKind::Sub => t.sub(rhs),
        BinaryKind::Mul => t.mul(rhs),
        BinaryKind::Div => t.div(rhs),
        BinaryKind::Minimum => t.minimum(rhs),
        BinaryKind::Maximum => t.maximum(rhs),
    }
}

fn aligned(rhs: &DynTensor, dtype: DType) -> Result<DynTensor, TensorOpsError> {
    if rhs.dtype() == dtype {
        return Ok(rhs.clone());
    }
    log::debug!("casting right-hand side from {} to {dtype}", rhs.dtype());
    Ok(rhs.cast(dtype, Order::S)?)
}

impl DynTensorOps for DynTensor {
    fn unary(&self, kind: UnaryKind) -> Result<DynTensor, TensorOpsError> {
        dispatch_dyn!(self, t => Ok(unary_typed(t, kind)?.into()))
    }

    fn binary(&self, rhs: &DynTensor, kind: BinaryKind) -> Result<DynTensor, TensorOpsError> {
        let rhs = aligned(rhs, self.dtype())?;
        dispatch_dyn!(self, t => {
            let rhs = rhs.into_typed()?;
            Ok(binary_typed(t, &rhs, kind)?.into())
        })
    }

    fn sum_f64(&self) -> Result<f64, TensorOpsError> {
        dispatch_dyn!(self, t => Ok(t.sum()?.to_f64()))
    }

    fn mean_f64(&self) -> Result<f64, TensorOpsError> {
        dispatch_dyn!(self, t => Ok(t.mean()?.to_f64()))
    }

    fn nan_sum_f64(&self) -> Result<f64, TensorOpsError> {
        dispatch_dyn!(self, t => Ok(t.nan_sum()?.to_f64()))
    }

    fn nan_count(&self) -> Result<usize, TensorOpsError> {
        dispatch_dyn!(self, t => t.nan_count())
    }

    fn argmax(&self) -> Result<Vec<usize>, TensorOpsError> {
        dispatch_dyn!(self, t => t.argmax())
    }
}
