#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Overview
//!
//! `ndstride-tensor` is the array substrate: a flat, reference-counted
//! [`TensorStorage`] addressed through a [`StrideLayout`] (shape, offset and
//! signed per-axis strides). Views such as narrow, permute, squeeze or
//! broadcast-expand only build a new layout and share the storage, so a
//! write through any view is visible through all of them.
//!
//! # Architecture
//!
//! - **Shape** and **StrideLayout**: pure arithmetic, every transform is `O(rank)`.
//! - **TensorStorage**: typed flat buffer with range arithmetic, shared by views.
//! - **PointerIterator** and **StrideLoopDescriptor**: the cheapest way to walk
//!   a layout in C, F or storage (S) order.
//! - **Tensor**: layout plus storage, generic over the sealed [`Element`] trait.
//! - **DynTensor**: the same tensor with its dtype only known at runtime.
//!
//! # Quick Start
//!
//! ```rust
//! use ndstride_tensor::{Order, Tensor};
//!
//! let t = Tensor::<f64>::seq([4, 3])?;
//!
//! // transpose is a view
//! let tt = t.permute(&[1, 0])?;
//! assert_eq!(tt.get(&[2, 1])?, t.get(&[1, 2])?);
//!
//! // an arithmetic progression of indices is a view too
//! let rows = t.sel(Order::C, 0, &[0, 2])?;
//! assert_eq!(rows.to_vec(Order::C), vec![0.0, 1.0, 2.0, 6.0, 7.0, 8.0]);
//!
//! // casting truncates toward zero
//! let i = Tensor::<f64>::from_shape_vec([2], vec![1.9, -1.9])?.cast::<i32>(Order::C)?;
//! assert_eq!(i.to_vec(Order::C), vec![1, -1]);
//! # Ok::<(), ndstride_tensor::TensorError>(())
//! ```
//!
//! # Aliasing contract
//!
//! Storage is shared and mutable through any handle. The library never
//! locks: mutating overlapping regions of one storage from several threads
//! at once is a precondition violation of the caller.

/// Allocator used by [`TensorStorage`].
pub mod allocator;

/// Concatenation, stacking and repetition.
pub mod concat;

/// Bounded text rendering.
pub mod display;

/// Runtime dtype tags and the sealed element trait.
pub mod dtype;

/// Tensors with a runtime dtype.
pub mod dyn_tensor;

/// Error types.
pub mod error;

/// Pointer and index iterators.
pub mod iterators;

/// Stride layouts.
pub mod layout;

/// Loop descriptors for element-wise kernels.
pub mod loop_descriptor;

/// Traversal orders.
pub mod order;

/// Shapes.
pub mod shape;

/// Sorting.
pub mod sort;

/// Shared flat storage.
pub mod storage;

/// The tensor type.
pub mod tensor;

/// View transforms and selection.
pub mod view;

/// Serde support for tensors, enabled by the `serde` feature.
#[cfg(feature = "serde")]
pub mod serde;

pub use crate::allocator::{CpuAllocator, TensorAllocatorError};
pub use crate::display::DisplayOptions;
pub use crate::dtype::{DType, Element, Scalar};
pub use crate::dyn_tensor::DynTensor;
pub use crate::error::TensorError;
pub use crate::iterators::{IndexIterator, PointerIterator};
pub use crate::layout::StrideLayout;
pub use crate::loop_descriptor::StrideLoopDescriptor;
pub use crate::order::Order;
pub use crate::shape::Shape;
pub use crate::storage::TensorStorage;
pub use crate::tensor::{Tensor, TensorIter};
pub use crate::view::Selection;
