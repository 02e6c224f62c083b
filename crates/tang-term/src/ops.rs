//! Operator overloads for `TermId`.
//!
//! Every operator delegates to the combinators of the thread-local builder
//! installed by [`trace`](crate::trace), so sentinel short-circuits and the
//! logic mode apply uniformly.

use std::ops::{Add, AddAssign, BitAnd, BitOr, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use crate::builder::IntoTerm;
use crate::error::Result;
use crate::term::TermId;
use crate::with_builder;

macro_rules! binary_op {
    ($trait:ident, $method:ident) => {
        impl $trait for TermId {
            type Output = TermId;
            #[inline]
            fn $method(self, rhs: TermId) -> TermId {
                with_builder(|b| b.$method(self, rhs))
            }
        }

        impl $trait<f64> for TermId {
            type Output = TermId;
            #[inline]
            fn $method(self, rhs: f64) -> TermId {
                with_builder(|b| b.$method(self, rhs))
            }
        }

        impl $trait<TermId> for f64 {
            type Output = TermId;
            #[inline]
            fn $method(self, rhs: TermId) -> TermId {
                with_builder(|b| b.$method(self, rhs))
            }
        }
    };
}

binary_op!(Add, add);
binary_op!(Sub, sub);
binary_op!(Mul, mul);
binary_op!(Div, div);

impl Neg for TermId {
    type Output = TermId;
    #[inline]
    fn neg(self) -> TermId {
        with_builder(|b| b.neg(self))
    }
}

impl AddAssign for TermId {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for TermId {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for TermId {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl DivAssign for TermId {
    #[inline]
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

/// Logical and: AND or MIN depending on the builder's logic mode.
impl BitAnd for TermId {
    type Output = TermId;
    #[inline]
    fn bitand(self, rhs: TermId) -> TermId {
        with_builder(|b| b.conjoin(self, rhs))
    }
}

/// Logical or: OR or MAX depending on the builder's logic mode.
impl BitOr for TermId {
    type Output = TermId;
    #[inline]
    fn bitor(self, rhs: TermId) -> TermId {
        with_builder(|b| b.disjoin(self, rhs))
    }
}

impl TermId {
    /// Create a variable in the thread-local builder.
    #[inline]
    pub fn var() -> Self {
        with_builder(|b| b.create_variable())
    }

    #[inline]
    pub fn constant(v: f64) -> Self {
        with_builder(|b| b.constant(v))
    }

    // Comparisons are methods: `PartialOrd` must return `bool`.

    #[inline]
    pub fn less_than(self, rhs: impl IntoTerm) -> Self {
        with_builder(|b| b.lt(self, rhs))
    }

    #[inline]
    pub fn less_eq(self, rhs: impl IntoTerm) -> Self {
        with_builder(|b| b.le(self, rhs))
    }

    #[inline]
    pub fn greater_than(self, rhs: impl IntoTerm) -> Self {
        with_builder(|b| b.gt(self, rhs))
    }

    #[inline]
    pub fn greater_eq(self, rhs: impl IntoTerm) -> Self {
        with_builder(|b| b.ge(self, rhs))
    }

    #[inline]
    pub fn abs(self) -> Self {
        with_builder(|b| b.abs(self))
    }

    #[inline]
    pub fn sin(self) -> Self {
        with_builder(|b| b.sin(self))
    }

    #[inline]
    pub fn cos(self) -> Self {
        with_builder(|b| b.cos(self))
    }

    #[inline]
    pub fn exp(self) -> Self {
        with_builder(|b| b.exp(self))
    }

    #[inline]
    pub fn ln(self) -> Self {
        with_builder(|b| b.log(self))
    }

    /// `self ^ exponent` for a constant exponent.
    #[inline]
    pub fn powf(self, exponent: f64) -> Self {
        with_builder(|b| b.const_power(self, exponent))
    }

    /// `self ^ exponent` for a term exponent.
    #[inline]
    pub fn pow(self, exponent: TermId) -> Self {
        with_builder(|b| b.term_power(self, exponent))
    }

    #[inline]
    pub fn atan2(self, other: TermId) -> Self {
        with_builder(|b| b.atan2(self, other))
    }

    #[inline]
    pub fn negate(self) -> Result<Self> {
        with_builder(|b| b.negate(self))
    }
}
