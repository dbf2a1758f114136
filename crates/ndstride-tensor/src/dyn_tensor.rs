use std::any::Any;

use crate::{display::DisplayOptions, DType, Element, Order, Shape, Tensor, TensorError};

/// A tensor whose element type is only known at runtime.
///
/// Each variant holds the generic [`Tensor`] of the matching dtype, so the
/// hot loops stay monomorphic and the tag is only inspected once per call.
#[derive(Clone, Debug)]
pub enum DynTensor {
    /// 8-bit integers.
    I8(Tensor<i8>),
    /// 16-bit integers.
    I16(Tensor<i16>),
    /// 32-bit integers.
    I32(Tensor<i32>),
    /// 64-bit integers.
    I64(Tensor<i64>),
    /// 32-bit floats.
    F32(Tensor<f32>),
    /// 64-bit floats.
    F64(Tensor<f64>),
}

/// Runs `$body` with `$t` bound to the typed tensor inside a [`DynTensor`].
#[macro_export]
macro_rules! dispatch_dyn {
    ($value:expr, $t:ident => $body:expr) => {
        match $value {
            $crate::DynTensor::I8($t) => $body,
            $crate::DynTensor::I16($t) => $body,
            $crate::DynTensor::I32($t) => $body,
            $crate::DynTensor::I64($t) => $body,
            $crate::DynTensor::F32($t) => $body,
            $crate::DynTensor::F64($t) => $body,
        }
    };
}

/// Runs `$body` with `$ty` bound to the element type of a [`DType`].
#[macro_export]
macro_rules! dispatch_dtype {
    ($dtype:expr, $ty:ident => $body:expr) => {
        match $dtype {
            $crate::DType::I8 => {
                type $ty = i8;
                $body
            }
            $crate::DType::I16 => {
                type $ty = i16;
                $body
            }
            $crate::DType::I32 => {
                type $ty = i32;
                $body
            }
            $crate::DType::I64 => {
                type $ty = i64;
                $body
            }
            $crate::DType::F32 => {
                type $ty = f32;
                $body
            }
            $crate::DType::F64 => {
                type $ty = f64;
                $body
            }
        }
    };
}

impl DynTensor {
    /// Zero-filled tensor of a runtime dtype.
    pub fn zeros(dtype: DType, shape: impl Into<Shape>, order: Order) -> Result<DynTensor, TensorError> {
        let shape = shape.into();
        dispatch_dtype!(dtype, E => Ok(Tensor::<E>::zeros_with_order(shape, order)?.into()))
    }

    /// Runtime dtype tag.
    pub fn dtype(&self) -> DType {
        dispatch_dyn!(self, t => t.dtype())
    }

    /// Shape of the tensor.
    pub fn shape(&self) -> &Shape {
        dispatch_dyn!(self, t => t.shape())
    }

    /// Number of axes.
    pub fn rank(&self) -> usize {
        dispatch_dyn!(self, t => t.rank())
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        dispatch_dyn!(self, t => t.size())
    }

    /// Converts to another dtype, see [`Tensor::cast`].
    pub fn cast(&self, dtype: DType, order: Order) -> Result<DynTensor, TensorError> {
        dispatch_dyn!(self, t => dispatch_dtype!(dtype, E => Ok(t.cast::<E>(order)?.into())))
    }

    /// Reads one element widened to f64.
    pub fn get_f64(&self, index: &[usize]) -> Result<f64, TensorError> {
        dispatch_dyn!(self, t => Ok(t.get(index)?.to_f64()))
    }

    /// Copies the elements out as f64 in `order`.
    pub fn to_f64_vec(&self, order: Order) -> Vec<f64> {
        dispatch_dyn!(self, t => t.to_f64_vec(order))
    }

    /// Diagnostic rendering, see [`Tensor::to_content`].
    pub fn to_content(&self, options: &DisplayOptions) -> String {
        dispatch_dyn!(self, t => t.to_content(options))
    }

    /// Borrows the typed tensor if the dtype is `T`.
    pub fn downcast_ref<T: Element>(&self) -> Option<&Tensor<T>> {
        dispatch_dyn!(self, t => (t as &dyn Any).downcast_ref::<Tensor<T>>())
    }

    /// Takes the typed tensor if the dtype is `T`.
    pub fn into_typed<T: Element>(self) -> Result<Tensor<T>, TensorError> {
        let found = self.dtype();
        self.downcast_ref::<T>().cloned().ok_or_else(|| {
            TensorError::CastError(format!("tensor has dtype {found}, not {}", T::DTYPE))
        })
    }
}

macro_rules! impl_from_tensor {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl From<Tensor<$ty>> for DynTensor {
            fn from(tensor: Tensor<$ty>) -> Self {
                DynTensor::$variant(tensor)
            }
        }
    )*};
}

impl_from_tensor!(i8 => I8, i16 => I16, i32 => I32, i64 => I64, f32 => F32, f64 => F64);

impl std::fmt::Display for DynTensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        dispatch_dyn!(self, t => std::fmt::Display::fmt(t, f))
    }
}
