//! Runtime dtype tags and the sealed set of numeric element types.

use std::cmp::Ordering;
use std::fmt::{Debug, Display};

use num_traits::{Bounded, Signed, WrappingAdd, WrappingMul, WrappingNeg, WrappingSub};

/// Bytes in one vector register the kernels size their lane chunks for.
pub const VECTOR_BYTES: usize = 32;

/// Runtime tag for the element kind of a tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DType {
    /// 8-bit signed integer.
    I8,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl DType {
    /// Short name of the dtype.
    pub fn id(self) -> &'static str {
        match self {
            DType::I8 => "i8",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::F32 => "f32",
            DType::F64 => "f64",
        }
    }

    /// Size of one element in bytes.
    pub fn byte_count(self) -> usize {
        match self {
            DType::I8 => 1,
            DType::I16 => 2,
            DType::I32 | DType::F32 => 4,
            DType::I64 | DType::F64 => 8,
        }
    }

    /// True for `F32` and `F64`.
    pub fn is_floating_point(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    /// Number of elements that fit one vector register.
    pub fn lanes(self) -> usize {
        VECTOR_BYTES / self.byte_count()
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// A dtype-erased element value.
///
/// Conversions between element types go through this value so that every
/// pair of dtypes follows Rust `as` semantics: floats truncate toward zero
/// and saturate, integers wrap when narrowed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    /// Any integer element, widened to 64 bits.
    Int(i64),
    /// Any float element, widened to 64 bits.
    Float(f64),
}

impl Scalar {
    /// The value as f64.
    pub fn to_f64(self) -> f64 {
        match self {
            Scalar::Int(v) => v as f64,
            Scalar::Float(v) => v,
        }
    }
}

mod private {
    pub trait Sealed {}
}

/// Numeric element kinds a tensor can store.
///
/// The trait is sealed: the kernels rely on the exact set of dtypes listed
/// in [`DType`].
pub trait Element:
    private::Sealed
    + Copy
    + Debug
    + Display
    + Default
    + PartialOrd
    + Signed
    + Bounded
    + Send
    + Sync
    + 'static
{
    /// Runtime tag of this element type.
    const DTYPE: DType;

    /// Elements per vector register.
    const LANES: usize;

    /// Widens to a dtype-erased value.
    fn to_scalar(self) -> Scalar;

    /// Converts from a dtype-erased value with `as` semantics.
    fn from_scalar(value: Scalar) -> Self;

    /// Converts to f64.
    fn to_f64(self) -> f64;

    /// Converts from f64 with `as` semantics.
    fn from_f64(value: f64) -> Self;

    /// True for a float NaN.
    fn is_nan(self) -> bool {
        false
    }

    /// Sum that wraps around at the integer bounds. Floats use IEEE addition.
    fn wrapping_add(self, rhs: Self) -> Self;

    /// Difference that wraps around at the integer bounds.
    fn wrapping_sub(self, rhs: Self) -> Self;

    /// Product that wraps around at the integer bounds.
    fn wrapping_mul(self, rhs: Self) -> Self;

    /// Quotient that wraps `MIN / -1` to `MIN`.
    ///
    /// Integer division by zero still panics; callers reject a zero divisor
    /// before dispatching.
    fn wrapping_div(self, rhs: Self) -> Self;

    /// Negation with `-MIN == MIN` for integers.
    fn wrapping_neg(self) -> Self;

    /// Absolute value with `abs(MIN) == MIN` for integers.
    fn wrapping_abs(self) -> Self;

    /// Converts to another element type.
    #[inline]
    fn cast<U: Element>(self) -> U {
        U::from_scalar(self.to_scalar())
    }

    /// Total order with NaN greater than every number.
    #[inline]
    fn cmp_nan_last(&self, other: &Self) -> Ordering {
        match self.partial_cmp(other) {
            Some(ord) => ord,
            None => self.is_nan().cmp(&other.is_nan()),
        }
    }
}

macro_rules! impl_int_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {$(
        impl private::Sealed for $ty {}

        impl Element for $ty {
            const DTYPE: DType = DType::$dtype;
            const LANES: usize = VECTOR_BYTES / std::mem::size_of::<$ty>();

            #[inline]
            fn to_scalar(self) -> Scalar {
                Scalar::Int(self as i64)
            }

            #[inline]
            fn from_scalar(value: Scalar) -> Self {
                match value {
                    Scalar::Int(v) => v as $ty,
                    Scalar::Float(v) => v as $ty,
                }
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $ty
            }

            #[inline]
            fn wrapping_add(self, rhs: Self) -> Self {
                WrappingAdd::wrapping_add(&self, &rhs)
            }

            #[inline]
            fn wrapping_sub(self, rhs: Self) -> Self {
                WrappingSub::wrapping_sub(&self, &rhs)
            }

            #[inline]
            fn wrapping_mul(self, rhs: Self) -> Self {
                WrappingMul::wrapping_mul(&self, &rhs)
            }

            #[inline]
            fn wrapping_div(self, rhs: Self) -> Self {
                <$ty>::wrapping_div(self, rhs)
            }

            #[inline]
            fn wrapping_neg(self) -> Self {
                WrappingNeg::wrapping_neg(&self)
            }

            #[inline]
            fn wrapping_abs(self) -> Self {
                <$ty>::wrapping_abs(self)
            }
        }
    )*};
}

macro_rules! impl_float_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {$(
        impl private::Sealed for $ty {}

        impl Element for $ty {
            const DTYPE: DType = DType::$dtype;
            const LANES: usize = VECTOR_BYTES / std::mem::size_of::<$ty>();

            #[inline]
            fn to_scalar(self) -> Scalar {
                Scalar::Float(self as f64)
            }

            #[inline]
            fn from_scalar(value: Scalar) -> Self {
                match value {
                    Scalar::Int(v) => v as $ty,
                    Scalar::Float(v) => v as $ty,
                }
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $ty
            }

            #[inline]
            fn is_nan(self) -> bool {
                <$ty>::is_nan(self)
            }

            #[inline]
            fn wrapping_add(self, rhs: Self) -> Self {
                self + rhs
            }

            #[inline]
            fn wrapping_sub(self, rhs: Self) -> Self {
                self - rhs
            }

            #[inline]
            fn wrapping_mul(self, rhs: Self) -> Self {
                self * rhs
            }

            #[inline]
            fn wrapping_div(self, rhs: Self) -> Self {
                self / rhs
            }

            #[inline]
            fn wrapping_neg(self) -> Self {
                -self
            }

            #[inline]
            fn wrapping_abs(self) -> Self {
                <$ty>::abs(self)
            }
        }
    )*};
}

impl_int_element!(i8 => I8, i16 => I16, i32 => I32, i64 => I64);
impl_float_element!(f32 => F32, f64 => F64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_properties() {
        assert_eq!(DType::F64.byte_count(), 8);
        assert_eq!(DType::I8.lanes(), 32);
        assert_eq!(DType::F32.lanes(), f32::LANES);
        assert!(DType::F32.is_floating_point());
        assert!(!DType::I64.is_floating_point());
        assert_eq!(<i16 as Element>::DTYPE, DType::I16);
    }

    #[test]
    fn test_cast_truncates_toward_zero() {
        assert_eq!(1.9f64.cast::<i32>(), 1);
        assert_eq!((-1.9f64).cast::<i32>(), -1);
        assert_eq!(3.0f32.cast::<i64>(), 3);
        assert_eq!(300i32.cast::<i8>(), 44);
        assert_eq!(f64::NAN.cast::<i16>(), 0);
        assert_eq!(1e10f64.cast::<i32>(), i32::MAX);
        assert_eq!(7i8.cast::<f64>(), 7.0);
    }

    #[test]
    fn test_wrapping_arithmetic_at_bounds() {
        assert_eq!(Element::wrapping_add(127i8, 1), i8::MIN);
        assert_eq!(Element::wrapping_sub(i16::MIN, 1), i16::MAX);
        assert_eq!(Element::wrapping_mul(i32::MAX, 2), -2);
        assert_eq!(Element::wrapping_div(i64::MIN, -1), i64::MIN);
        assert_eq!(Element::wrapping_neg(i8::MIN), i8::MIN);
        assert_eq!(Element::wrapping_abs(i8::MIN), i8::MIN);
        assert_eq!(Element::wrapping_abs(-5i32), 5);
        assert_eq!(Element::wrapping_add(f64::MAX, f64::MAX), f64::INFINITY);
        assert_eq!(Element::wrapping_abs(-2.5f32), 2.5);
        assert!(Element::wrapping_div(0.0f64, 0.0).is_nan());
    }

    #[test]
    fn test_cmp_nan_last() {
        assert_eq!(1.0f64.cmp_nan_last(&f64::NAN), Ordering::Less);
        assert_eq!(f64::NAN.cmp_nan_last(&1.0), Ordering::Greater);
        assert_eq!(f32::NAN.cmp_nan_last(&f32::NAN), Ordering::Equal);
        assert_eq!(3i32.cmp_nan_last(&2), Ordering::Greater);
    }
}
