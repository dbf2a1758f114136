use ndstride_tensor::{DType, TensorError};
use thiserror::Error;

/// An error type for tensor operations.
#[derive(Error, Debug, PartialEq)]
pub enum TensorOpsError {
    /// The axis to operate over is not smaller than the rank of the tensor.
    #[error("Dimension out of bounds. The dimension {0} is out of bounds ({1}).")]
    DimOutOfBounds(usize, usize),

    /// The operands cannot be broadcast together.
    #[error("Shape mismatch: {0:?} != {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),

    /// The kernel is only defined for floating point elements.
    #[error("{op} is only defined for floating point tensors, got {dtype}")]
    FloatingPointOnly {
        /// Name of the kernel.
        op: &'static str,
        /// Element type of the rejected tensor.
        dtype: DType,
    },

    /// The output aliases several logical elements onto one storage cell.
    #[error("cannot write element-wise into a layout with broadcast or overlapping axes")]
    BroadcastWrite,

    /// The reduction has no identity and the tensor has no element.
    #[error("{0} of an empty tensor")]
    EmptyTensor(String),

    /// The thread pool could not be built or the thread count is invalid.
    #[error("parallel execution failed: {0}")]
    Parallel(String),

    /// Tensor error
    #[error("Error with the tensor: {0}")]
    TensorError(#[from] TensorError),
}

impl TensorOpsError {
    /// Returns `Err(FloatingPointOnly)` when `dtype` is an integer type.
    pub(crate) fn check_float(op: &'static str, dtype: DType) -> Result<(), TensorOpsError> {
        if dtype.is_floating_point() {
            Ok(())
        } else {
            Err(TensorOpsError::FloatingPointOnly { op, dtype })
        }
    }

    /// Returns `Err(DimOutOfBounds)` when `axis >= rank`.
    pub(crate) fn check_axis(axis: usize, rank: usize) -> Result<(), TensorOpsError> {
        if axis < rank {
            Ok(())
        } else {
            Err(TensorOpsError::DimOutOfBounds(axis, rank))
        }
    }
}
