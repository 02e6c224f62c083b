//! Term node types and the TermId handle.

use std::fmt;

use crate::tape::MAX_ARITY;

/// Numeric value of the `true` sentinel.
pub const TRUE_VALUE: f64 = 1.0;
/// Numeric value of the `false` sentinel (smallest positive normal f64).
pub const FALSE_VALUE: f64 = f64::MIN_POSITIVE;
/// Values above this count as true when logic nodes are folded or evaluated.
pub const TRUTH_THRESHOLD: f64 = 0.75;
/// Lower clamp of the sigmoid family.
pub const EPSILON: f64 = 1e-10;

/// Handle into a [`TermBuilder`](crate::TermBuilder) arena. Lightweight, Copy.
///
/// Carries the id of the owning builder so a handle can never be resolved
/// against the wrong arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TermId {
    pub(crate) owner: u32,
    pub(crate) index: u32,
}

impl TermId {
    /// Position of the term in its builder, in creation order.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub(crate) fn slot(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Debug for TermId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "t{}", self.index)
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "t{}", self.index)
    }
}

/// The closed set of term variants.
///
/// Every variant has at most [`MAX_ARITY`] term operands; scalar parameters
/// (exponents, steepness, reification bounds) live inline.
#[derive(Clone, Debug, PartialEq)]
pub enum TermKind {
    // Atoms
    Constant(f64),
    Variable {
        /// Evaluation-order slot, equal to the creation index among variables.
        slot: usize,
        external_id: Option<i64>,
    },

    // Arithmetic
    Sum(TermId, TermId),
    Product(TermId, TermId),
    ConstPower {
        base: TermId,
        exponent: f64,
    },
    TermPower {
        base: TermId,
        exponent: TermId,
    },
    Abs(TermId),
    Sin(TermId),
    Cos(TermId),
    Exp(TermId),
    Log(TermId),
    /// `atan2(left, right)`.
    Atan2(TermId, TermId),
    Sigmoid {
        arg: TermId,
        mid: TermId,
        steepness: f64,
    },
    LinSigmoid(TermId),

    // Soft logic
    Min(TermId, TermId),
    Max(TermId, TermId),
    And(TermId, TermId),
    Or(TermId, TermId),
    LessThan {
        left: TermId,
        right: TermId,
        steepness: f64,
        /// Memoized `right <= left`.
        negation: Option<TermId>,
    },
    LessEqual {
        left: TermId,
        right: TermId,
        steepness: f64,
        /// Memoized `right < left`.
        negation: Option<TermId>,
    },
    Reify {
        condition: TermId,
        negated: TermId,
        min: f64,
        max: f64,
    },
    ConstraintUtility {
        constraint: TermId,
        utility: TermId,
    },
}

impl TermKind {
    /// Short lowercase name, used in errors and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Constant(_) => "constant",
            Self::Variable { .. } => "variable",
            Self::Sum(..) => "sum",
            Self::Product(..) => "product",
            Self::ConstPower { .. } => "constPower",
            Self::TermPower { .. } => "termPower",
            Self::Abs(_) => "abs",
            Self::Sin(_) => "sin",
            Self::Cos(_) => "cos",
            Self::Exp(_) => "exp",
            Self::Log(_) => "log",
            Self::Atan2(..) => "atan2",
            Self::Sigmoid { .. } => "sigmoid",
            Self::LinSigmoid(_) => "linSigmoid",
            Self::Min(..) => "min",
            Self::Max(..) => "max",
            Self::And(..) => "and",
            Self::Or(..) => "or",
            Self::LessThan { .. } => "less-than",
            Self::LessEqual { .. } => "less-equal",
            Self::Reify { .. } => "reify",
            Self::ConstraintUtility { .. } => "constraint-utility",
        }
    }

    /// Term operands in parameter order.
    pub fn operands(&self) -> [Option<TermId>; MAX_ARITY] {
        match *self {
            Self::Constant(_) | Self::Variable { .. } => [None, None],
            Self::Abs(a) | Self::Sin(a) | Self::Cos(a) | Self::Exp(a) | Self::Log(a) => {
                [Some(a), None]
            }
            Self::LinSigmoid(a) => [Some(a), None],
            Self::ConstPower { base, .. } => [Some(base), None],
            Self::Sum(a, b)
            | Self::Product(a, b)
            | Self::Atan2(a, b)
            | Self::Min(a, b)
            | Self::Max(a, b)
            | Self::And(a, b)
            | Self::Or(a, b) => [Some(a), Some(b)],
            Self::TermPower { base, exponent } => [Some(base), Some(exponent)],
            Self::Sigmoid { arg, mid, .. } => [Some(arg), Some(mid)],
            Self::LessThan { left, right, .. } | Self::LessEqual { left, right, .. } => {
                [Some(left), Some(right)]
            }
            Self::Reify {
                condition, negated, ..
            } => [Some(condition), Some(negated)],
            Self::ConstraintUtility {
                constraint,
                utility,
            } => [Some(constraint), Some(utility)],
        }
    }

    /// Same variant with its term operands swapped for `ops`, in
    /// [`operands`](Self::operands) order. Scalar payloads are kept.
    pub(crate) fn with_operands(&self, ops: [Option<TermId>; MAX_ARITY]) -> Self {
        let mut k = self.clone();
        match (&mut k, ops) {
            (Self::Constant(_) | Self::Variable { .. }, _) => {}
            (
                Self::Abs(a)
                | Self::Sin(a)
                | Self::Cos(a)
                | Self::Exp(a)
                | Self::Log(a)
                | Self::LinSigmoid(a)
                | Self::ConstPower { base: a, .. },
                [Some(x), _],
            ) => *a = x,
            (
                Self::Sum(a, b)
                | Self::Product(a, b)
                | Self::Atan2(a, b)
                | Self::Min(a, b)
                | Self::Max(a, b)
                | Self::And(a, b)
                | Self::Or(a, b)
                | Self::TermPower {
                    base: a,
                    exponent: b,
                }
                | Self::Sigmoid { arg: a, mid: b, .. }
                | Self::LessThan {
                    left: a, right: b, ..
                }
                | Self::LessEqual {
                    left: a, right: b, ..
                }
                | Self::Reify {
                    condition: a,
                    negated: b,
                    ..
                }
                | Self::ConstraintUtility {
                    constraint: a,
                    utility: b,
                },
                [Some(x), Some(y)],
            ) => {
                *a = x;
                *b = y;
            }
            _ => {}
        }
        k
    }

    /// Whether the classical symbolic derivative exists for this variant.
    pub fn is_differentiable(&self) -> bool {
        !matches!(
            self,
            Self::Min(..)
                | Self::Max(..)
                | Self::And(..)
                | Self::Or(..)
                | Self::LessThan { .. }
                | Self::LessEqual { .. }
                | Self::Reify { .. }
                | Self::ConstraintUtility { .. }
        )
    }

    #[inline]
    pub fn as_constant(&self) -> Option<f64> {
        match self {
            Self::Constant(v) => Some(*v),
            _ => None,
        }
    }
}

/// A node in the arena: its variant plus bookkeeping the solver reads.
#[derive(Clone, Debug)]
pub struct Term {
    pub(crate) kind: TermKind,
    /// Interval hint. Not computed here.
    pub(crate) min: f64,
    pub(crate) max: f64,
    /// Row in the most recently compiled tape, if the term was linearized.
    pub(crate) tape_index: Option<usize>,
}

impl Term {
    pub(crate) fn new(kind: TermKind) -> Self {
        Self {
            kind,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            tape_index: None,
        }
    }

    #[inline]
    pub fn kind(&self) -> &TermKind {
        &self.kind
    }

    #[inline]
    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    #[inline]
    pub fn tape_index(&self) -> Option<usize> {
        self.tape_index
    }
}
