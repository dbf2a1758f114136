#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Kernels on tensors with a runtime dtype.
///
/// Provides [`DynTensorOps`] for [`ndstride_tensor::DynTensor`].
pub mod dispatch;

/// Error types for tensor operations.
///
/// Defines [`TensorOpsError`] for handling failures during tensor computations.
pub mod error;

/// Low-level inner loops over loop descriptors.
///
/// Contiguous runs are processed in lane-sized chunks, any other stride
/// element by element.
pub mod kernels;

/// Scalar functions applied by the kernels.
pub mod op;

/// High-level tensor operations and traits.
///
/// Provides the [`TensorOps`] trait with element-wise arithmetic,
/// comparison masks and reductions.
pub mod ops;

/// Serial and rayon-parallel execution of kernel runs.
pub mod parallel;

pub use dispatch::{BinaryKind, DynTensorOps, UnaryKind};
pub use error::TensorOpsError;
pub use ops::TensorOps;
pub use parallel::{ExecutionStrategy, PARALLEL_THRESHOLD};
