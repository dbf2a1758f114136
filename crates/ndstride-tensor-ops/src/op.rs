//! Scalar functions applied by the kernels.
//!
//! Each operation is a zero-sized (or value-carrying) struct implementing
//! one of [`UnaryOp`], [`BinaryOp`] or [`ReduceOp`]. Kernels are generic
//! over these traits, so every call is monomorphized for its element type.

use ndstride_tensor::{Element, TensorError, TensorStorage};

/// An element-wise function of one element.
pub trait UnaryOp<T: Element>: Sync {
    /// Kernel name used in errors and logs.
    const NAME: &'static str;

    /// Only defined on `f32`/`f64`; checked before any element is touched.
    const FLOATING_POINT_ONLY: bool = false;

    /// Applies the function to one element.
    fn apply(&self, x: T) -> T;
}

/// An element-wise function of two elements.
pub trait BinaryOp<T: Element>: Sync {
    /// Kernel name used in errors and logs.
    const NAME: &'static str;

    /// Every right-hand value goes through [`BinaryOp::check_rhs`] before
    /// any element is written.
    const CHECKS_RHS: bool = false;

    /// Applies the function to one pair of elements.
    fn apply(&self, a: T, b: T) -> T;

    /// Rejects right-hand values the function is undefined for.
    fn check_rhs(&self, _rhs: T) -> Result<(), TensorError> {
        Ok(())
    }

    /// Applies the function to a contiguous storage range with one
    /// right-hand value, the case of a broadcast inner axis.
    fn apply_range(
        &self,
        storage: &TensorStorage<T>,
        start: usize,
        len: usize,
        value: T,
    ) -> Result<(), TensorError> {
        for p in start..start + len {
            let x = storage
                .get(p)
                .ok_or(TensorError::index_out_of_bounds(p, storage.len()))?;
            storage.set(p, self.apply(x, value))?;
        }
        Ok(())
    }
}

/// An associative fold over elements.
pub trait ReduceOp<T: Element>: Sync {
    /// Kernel name used in errors and logs.
    const NAME: &'static str;

    /// Result of reducing nothing, `None` when an empty input is an error.
    fn identity(&self) -> Option<T>;

    /// Folds one more element into the accumulator.
    fn fold(&self, acc: T, x: T) -> T;

    /// Elements the fold ignores, as if absent.
    #[inline]
    fn skip(&self, _x: T) -> bool {
        false
    }
}

macro_rules! unary_op {
    ($(#[$doc:meta])* $name:ident, $label:literal, $float_only:literal, |$x:ident| $body:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $name;

        impl<T: Element> UnaryOp<T> for $name {
            const NAME: &'static str = $label;
            const FLOATING_POINT_ONLY: bool = $float_only;

            #[inline]
            fn apply(&self, $x: T) -> T {
                $body
            }
        }
    };
}

unary_op!(
    /// Absolute value. `abs(MIN)` wraps to `MIN` on integers.
    Abs, "abs", false, |x| x.wrapping_abs()
);
unary_op!(
    /// Negation. `-MIN` wraps to `MIN` on integers.
    Neg, "neg", false, |x| x.wrapping_neg()
);
unary_op!(
    /// Square, wrapping on integer overflow.
    Sqr, "sqr", false, |x| x.wrapping_mul(x)
);
unary_op!(
    /// Largest integer not above the value.
    Floor, "floor", true, |x| T::from_f64(x.to_f64().floor())
);
unary_op!(
    /// Smallest integer not below the value.
    Ceil, "ceil", true, |x| T::from_f64(x.to_f64().ceil())
);
unary_op!(
    /// Square root.
    Sqrt, "sqrt", true, |x| T::from_f64(x.to_f64().sqrt())
);
unary_op!(
    /// Natural exponential.
    Exp, "exp", true, |x| T::from_f64(x.to_f64().exp())
);
unary_op!(
    /// Natural logarithm.
    Ln, "ln", true, |x| T::from_f64(x.to_f64().ln())
);
unary_op!(
    /// Nearest integer, ties to even.
    Rint, "rint", true, |x| T::from_f64(x.to_f64().round_ties_even())
);
unary_op!(
    /// Sine.
    Sin, "sin", true, |x| T::from_f64(x.to_f64().sin())
);
unary_op!(
    /// Cosine.
    Cos, "cos", true, |x| T::from_f64(x.to_f64().cos())
);
unary_op!(
    /// Tangent.
    Tan, "tan", true, |x| T::from_f64(x.to_f64().tan())
);
unary_op!(
    /// Hyperbolic tangent.
    Tanh, "tanh", true, |x| T::from_f64(x.to_f64().tanh())
);
unary_op!(
    /// Logistic function `1 / (1 + e^-x)`.
    Sigmoid, "sigmoid", true, |x| T::from_f64(1.0 / (1.0 + (-x.to_f64()).exp()))
);

/// Raises every element to a fixed real power.
#[derive(Clone, Copy, Debug)]
pub struct Pow(pub f64);

impl<T: Element> UnaryOp<T> for Pow {
    const NAME: &'static str = "pow";
    const FLOATING_POINT_ONLY: bool = true;

    #[inline]
    fn apply(&self, x: T) -> T {
        T::from_f64(x.to_f64().powf(self.0))
    }
}

/// Replaces NaN with a constant. Integers pass through unchanged.
#[derive(Clone, Copy, Debug)]
pub struct FillNan<T>(pub T);

impl<T: Element> UnaryOp<T> for FillNan<T> {
    const NAME: &'static str = "fill_nan";

    #[inline]
    fn apply(&self, x: T) -> T {
        if x.is_nan() {
            self.0
        } else {
            x
        }
    }
}

/// Replaces NaN and both infinities with finite values.
///
/// Integers pass through unchanged.
#[derive(Clone, Copy, Debug)]
pub struct NanToNum<T> {
    /// Replacement for NaN.
    pub nan: T,
    /// Replacement for negative infinity.
    pub neg_inf: T,
    /// Replacement for positive infinity.
    pub pos_inf: T,
}

impl<T: Element> UnaryOp<T> for NanToNum<T> {
    const NAME: &'static str = "nan_to_num";

    #[inline]
    fn apply(&self, x: T) -> T {
        if x.is_nan() {
            self.nan
        } else if x.to_f64() == f64::NEG_INFINITY {
            self.neg_inf
        } else if x.to_f64() == f64::INFINITY {
            self.pos_inf
        } else {
            x
        }
    }
}

/// Replaces every element with a constant.
#[derive(Clone, Copy, Debug)]
pub struct Fill<T>(pub T);

impl<T: Element> UnaryOp<T> for Fill<T> {
    const NAME: &'static str = "fill";

    #[inline]
    fn apply(&self, _x: T) -> T {
        self.0
    }
}

/// Limits every element to `[min, max]`. NaN stays NaN.
#[derive(Clone, Copy, Debug)]
pub struct Clamp<T> {
    /// Lower bound.
    pub min: T,
    /// Upper bound.
    pub max: T,
}

impl<T: Element> UnaryOp<T> for Clamp<T> {
    const NAME: &'static str = "clamp";

    #[inline]
    fn apply(&self, x: T) -> T {
        if x < self.min {
            self.min
        } else if x > self.max {
            self.max
        } else {
            x
        }
    }
}

/// A binary function with its right-hand side fixed.
#[derive(Clone, Copy, Debug)]
pub struct WithScalar<O, T> {
    /// The binary function.
    pub op: O,
    /// Right-hand value.
    pub value: T,
}

impl<T: Element, O: BinaryOp<T>> UnaryOp<T> for WithScalar<O, T> {
    const NAME: &'static str = O::NAME;

    #[inline]
    fn apply(&self, x: T) -> T {
        self.op.apply(x, self.value)
    }
}

macro_rules! binary_op {
    ($(#[$doc:meta])* $name:ident, $label:literal, |$a:ident, $b:ident| $body:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $name;

        impl<T: Element> BinaryOp<T> for $name {
            const NAME: &'static str = $label;

            #[inline]
            fn apply(&self, $a: T, $b: T) -> T {
                $body
            }
        }
    };
}

/// Addition.
#[derive(Clone, Copy, Debug, Default)]
pub struct Add;

impl<T: Element> BinaryOp<T> for Add {
    const NAME: &'static str = "add";

    #[inline]
    fn apply(&self, a: T, b: T) -> T {
        a.wrapping_add(b)
    }

    fn apply_range(&self, s: &TensorStorage<T>, start: usize, len: usize, v: T) -> Result<(), TensorError> {
        s.add(start, len, v)
    }
}

/// Subtraction.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sub;

impl<T: Element> BinaryOp<T> for Sub {
    const NAME: &'static str = "sub";

    #[inline]
    fn apply(&self, a: T, b: T) -> T {
        a.wrapping_sub(b)
    }

    fn apply_range(&self, s: &TensorStorage<T>, start: usize, len: usize, v: T) -> Result<(), TensorError> {
        s.sub(start, len, v)
    }
}

/// Multiplication.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mul;

impl<T: Element> BinaryOp<T> for Mul {
    const NAME: &'static str = "mul";

    #[inline]
    fn apply(&self, a: T, b: T) -> T {
        a.wrapping_mul(b)
    }

    fn apply_range(&self, s: &TensorStorage<T>, start: usize, len: usize, v: T) -> Result<(), TensorError> {
        s.mul(start, len, v)
    }
}

/// Division. Integer division truncates, rejects a zero divisor and wraps
/// `MIN / -1` to `MIN`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Div;

impl<T: Element> BinaryOp<T> for Div {
    const NAME: &'static str = "div";
    const CHECKS_RHS: bool = true;

    #[inline]
    fn apply(&self, a: T, b: T) -> T {
        a.wrapping_div(b)
    }

    fn check_rhs(&self, rhs: T) -> Result<(), TensorError> {
        if !T::DTYPE.is_floating_point() && rhs.is_zero() {
            return Err(TensorError::invalid_argument("integer division by zero"));
        }
        Ok(())
    }

    fn apply_range(&self, s: &TensorStorage<T>, start: usize, len: usize, v: T) -> Result<(), TensorError> {
        s.div(start, len, v)
    }
}

binary_op!(
    /// Element-wise minimum. A NaN on either side wins.
    Minimum, "minimum", |a, b| if a.is_nan() || a < b { a } else { b }
);
binary_op!(
    /// Element-wise maximum. A NaN on either side wins.
    Maximum, "maximum", |a, b| if b.is_nan() || b > a { b } else { a }
);
binary_op!(
    /// One where both sides are equal, zero elsewhere.
    Equal, "eq", |a, b| if a == b { T::one() } else { T::zero() }
);
binary_op!(
    /// One where the left side is smaller, zero elsewhere.
    Less, "lt", |a, b| if a < b { T::one() } else { T::zero() }
);
binary_op!(
    /// One where the left side is greater, zero elsewhere.
    Greater, "gt", |a, b| if a > b { T::one() } else { T::zero() }
);

/// Sum of the elements, zero when empty. Integer sums wrap.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sum;

impl<T: Element> ReduceOp<T> for Sum {
    const NAME: &'static str = "sum";

    fn identity(&self) -> Option<T> {
        Some(T::zero())
    }

    #[inline]
    fn fold(&self, acc: T, x: T) -> T {
        acc.wrapping_add(x)
    }
}

/// Product of the elements, one when empty. Integer products wrap.
#[derive(Clone, Copy, Debug, Default)]
pub struct Prod;

impl<T: Element> ReduceOp<T> for Prod {
    const NAME: &'static str = "prod";

    fn identity(&self) -> Option<T> {
        Some(T::one())
    }

    #[inline]
    fn fold(&self, acc: T, x: T) -> T {
        acc.wrapping_mul(x)
    }
}

/// Smallest element. Any NaN makes the result NaN.
#[derive(Clone, Copy, Debug, Default)]
pub struct Min;

impl<T: Element> ReduceOp<T> for Min {
    const NAME: &'static str = "min";

    fn identity(&self) -> Option<T> {
        None
    }

    #[inline]
    fn fold(&self, acc: T, x: T) -> T {
        if x.is_nan() || x < acc {
            x
        } else {
            acc
        }
    }
}

/// Largest element. Any NaN makes the result NaN.
#[derive(Clone, Copy, Debug, Default)]
pub struct Max;

impl<T: Element> ReduceOp<T> for Max {
    const NAME: &'static str = "max";

    fn identity(&self) -> Option<T> {
        None
    }

    #[inline]
    fn fold(&self, acc: T, x: T) -> T {
        if x.is_nan() || x > acc {
            x
        } else {
            acc
        }
    }
}

/// Wraps a reduction so that NaN elements are ignored.
///
/// `NanSkip(Sum)` of an all-NaN tensor is zero; `NanSkip(Min)` of one has
/// no value.
#[derive(Clone, Copy, Debug, Default)]
pub struct NanSkip<O>(pub O);

impl<T: Element, O: ReduceOp<T>> ReduceOp<T> for NanSkip<O> {
    const NAME: &'static str = O::NAME;

    fn identity(&self) -> Option<T> {
        self.0.identity()
    }

    #[inline]
    fn fold(&self, acc: T, x: T) -> T {
        self.0.fold(acc, x)
    }

    #[inline]
    fn skip(&self, x: T) -> bool {
        x.is_nan() || self.0.skip(x)
    }
}
