use thiserror::Error;

use crate::allocator::TensorAllocatorError;

/// Error type for tensor layout, view and storage operations.
///
/// Every failure carries the offending value(s). None of them are transient:
/// they describe a caller composing views or indices incorrectly.
#[derive(Error, Debug, PartialEq)]
pub enum TensorError {
    /// Type casting operation failed.
    #[error("Type cast failed: {0}")]
    CastError(String),

    /// Number of elements does not match the requested shape.
    #[error("Shape mismatch: expected {expected} elements for shape, but got {actual} elements in data")]
    InvalidShape {
        /// Expected number of elements based on shape
        expected: usize,
        /// Actual number of elements in the data
        actual: usize,
    },

    /// Index or offset exceeds its bounds.
    #[error("Index {index} out of bounds for dimension of size {size}")]
    IndexOutOfBounds {
        /// The invalid index that was attempted
        index: usize,
        /// The size of the dimension or storage being indexed
        size: usize,
    },

    /// Axis does not exist for the tensor rank.
    #[error("Axis {axis} out of bounds for tensor of rank {rank}")]
    AxisOutOfBounds {
        /// The requested axis
        axis: usize,
        /// The tensor rank
        rank: usize,
    },

    /// The same axis was given more than once.
    #[error("Axes contain duplicates: {0:?}")]
    DuplicateAxes(Vec<usize>),

    /// An axis has a different size than the operation requires.
    #[error("Axis {axis} must have size {expected}, but has size {actual}")]
    InvalidAxisSize {
        /// The offending axis
        axis: usize,
        /// The size required by the operation
        expected: usize,
        /// The actual axis size
        actual: usize,
    },

    /// A `[start, end)` range is empty-inverted or exceeds the axis.
    #[error("Invalid range [{start}, {end}) on axis {axis} of size {dim}")]
    InvalidRange {
        /// The axis being restricted
        axis: usize,
        /// Range start
        start: usize,
        /// Range end (exclusive)
        end: usize,
        /// Axis size
        dim: usize,
    },

    /// A layout reaches offsets outside its storage.
    #[error("Layout reaches offsets [{min}, {max}] outside storage of length {len}")]
    LayoutOutOfBounds {
        /// Smallest reachable offset
        min: isize,
        /// Largest reachable offset
        max: isize,
        /// Storage length
        len: usize,
    },

    /// Underlying storage allocation failed.
    #[error("Storage error: {0}")]
    StorageError(#[from] TensorAllocatorError),

    /// Tensor dimensions incompatible for the requested operation.
    #[error("Dimension mismatch: {message}. Expected shape: {expected}, got: {actual}")]
    DimensionMismatch {
        /// Human-readable description of the mismatch
        message: String,
        /// Expected shape description
        expected: String,
        /// Actual shape description
        actual: String,
    },

    /// Any other invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not supported for this tensor configuration.
    #[error("Unsupported operation: {operation} - {reason}")]
    UnsupportedOperation {
        /// Name of the operation that failed
        operation: String,
        /// Reason why the operation is not supported
        reason: String,
    },
}

impl TensorError {
    /// Creates an InvalidShape error.
    pub fn invalid_shape(expected: usize, actual: usize) -> Self {
        Self::InvalidShape { expected, actual }
    }

    /// Creates an IndexOutOfBounds error.
    pub fn index_out_of_bounds(index: usize, size: usize) -> Self {
        Self::IndexOutOfBounds { index, size }
    }

    /// Creates an AxisOutOfBounds error.
    pub fn axis_out_of_bounds(axis: usize, rank: usize) -> Self {
        Self::AxisOutOfBounds { axis, rank }
    }

    /// Creates a DimensionMismatch error with formatted shapes.
    pub fn dimension_mismatch(
        message: impl Into<String>,
        expected: &[usize],
        actual: &[usize],
    ) -> Self {
        Self::DimensionMismatch {
            message: message.into(),
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    }

    /// Creates an UnsupportedOperation error.
    pub fn unsupported_operation(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Creates an InvalidArgument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Returns true if the error reports an argument the caller composed incorrectly.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidShape { .. }
                | Self::AxisOutOfBounds { .. }
                | Self::DuplicateAxes(_)
                | Self::InvalidAxisSize { .. }
                | Self::InvalidRange { .. }
                | Self::DimensionMismatch { .. }
                | Self::InvalidArgument(_)
        )
    }

    /// Returns true if the error reports an index or offset out of bounds.
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(
            self,
            Self::IndexOutOfBounds { .. } | Self::LayoutOutOfBounds { .. }
        )
    }
}

/// Checks that `axis` is a valid axis for a tensor of rank `rank`.
pub(crate) fn check_axis(axis: usize, rank: usize) -> Result<(), TensorError> {
    if axis >= rank {
        return Err(TensorError::axis_out_of_bounds(axis, rank));
    }
    Ok(())
}

/// Checks that every axis is in range and none repeats.
pub(crate) fn check_axes(axes: &[usize], rank: usize) -> Result<(), TensorError> {
    let mut seen = vec![false; rank];
    for &axis in axes {
        check_axis(axis, rank)?;
        if seen[axis] {
            return Err(TensorError::DuplicateAxes(axes.to_vec()));
        }
        seen[axis] = true;
    }
    Ok(())
}
