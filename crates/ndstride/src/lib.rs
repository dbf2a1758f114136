#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use ndstride_tensor as tensor;

#[doc(inline)]
pub use ndstride_tensor_ops as ops;
