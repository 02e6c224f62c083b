//! Arena that owns every term of one problem instance.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::{BuilderConfig, LogicMode};
use crate::error::{Result, TermError};
use crate::tape::Tape;
use crate::term::{Term, TermId, TermKind, FALSE_VALUE, TRUE_VALUE};

static NEXT_BUILDER: AtomicU32 = AtomicU32::new(0);

/// Sole factory and owner of all terms for one problem instance.
///
/// Terms are never freed individually; they live until the builder is
/// dropped. Three constants are created up front and compared by identity:
/// [`zero`](Self::zero), [`true_term`](Self::true_term) and
/// [`false_term`](Self::false_term).
///
/// Factory methods panic when handed a [`TermId`] from another builder.
#[derive(Debug)]
pub struct TermBuilder {
    id: u32,
    terms: Vec<Term>,
    vars: Vec<TermId>,
    zero: TermId,
    truth: TermId,
    falsity: TermId,
    config: BuilderConfig,
    tape: Option<Tape>,
}

/// Anything a combinator accepts as an operand: a term, or a literal that is
/// turned into a fresh constant.
pub trait IntoTerm {
    fn into_term(self, builder: &mut TermBuilder) -> TermId;
}

impl IntoTerm for TermId {
    #[inline]
    fn into_term(self, _builder: &mut TermBuilder) -> TermId {
        self
    }
}

impl IntoTerm for f64 {
    #[inline]
    fn into_term(self, builder: &mut TermBuilder) -> TermId {
        builder.constant(self)
    }
}

impl TermBuilder {
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        let id = NEXT_BUILDER.fetch_add(1, Ordering::Relaxed);
        let mut b = Self {
            id,
            terms: Vec::new(),
            vars: Vec::new(),
            zero: TermId { owner: id, index: 0 },
            truth: TermId { owner: id, index: 0 },
            falsity: TermId { owner: id, index: 0 },
            config: BuilderConfig::default(),
            tape: None,
        };
        b.zero = b.constant(0.0);
        b.truth = b.constant(TRUE_VALUE);
        b.falsity = b.constant(FALSE_VALUE);
        b
    }

    pub fn with_config(config: BuilderConfig) -> Result<Self> {
        config.validate()?;
        let mut b = Self::new();
        b.config = config;
        Ok(b)
    }

    #[inline]
    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn set_logic_mode(&mut self, logic: LogicMode) {
        self.config.logic = logic;
    }

    /// Total number of terms, sentinels included.
    #[inline]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether the builder is empty (it never is after construction).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether `id` was allocated by this builder.
    #[inline]
    pub fn contains(&self, id: TermId) -> bool {
        id.owner == self.id && id.slot() < self.terms.len()
    }

    /// Fallible ownership check used by every non-factory entry point.
    pub fn check(&self, id: TermId) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(TermError::malformed(format!(
                "term {id} does not belong to builder {}",
                self.id
            )))
        }
    }

    #[inline]
    fn assert_owned(&self, id: TermId) {
        assert!(
            self.contains(id),
            "term {id} does not belong to builder {}",
            self.id
        );
    }

    #[inline]
    pub fn term(&self, id: TermId) -> &Term {
        self.assert_owned(id);
        &self.terms[id.slot()]
    }

    #[inline]
    pub fn kind(&self, id: TermId) -> &TermKind {
        &self.term(id).kind
    }

    #[inline]
    pub(crate) fn set_kind(&mut self, id: TermId, kind: TermKind) {
        self.terms[id.slot()].kind = kind;
    }

    #[inline]
    pub(crate) fn set_tape_index(&mut self, id: TermId, row: Option<usize>) {
        self.terms[id.slot()].tape_index = row;
    }

    /// Value of a constant term, `None` for everything else.
    #[inline]
    pub fn constant_value(&self, id: TermId) -> Option<f64> {
        self.kind(id).as_constant()
    }

    #[inline]
    pub fn is_constant(&self, id: TermId) -> bool {
        self.constant_value(id).is_some()
    }

    // --- Sentinels ---

    #[inline]
    pub fn zero(&self) -> TermId {
        self.zero
    }

    #[inline]
    pub fn true_term(&self) -> TermId {
        self.truth
    }

    #[inline]
    pub fn false_term(&self) -> TermId {
        self.falsity
    }

    // --- Variables ---

    pub fn create_variable(&mut self) -> TermId {
        self.push_variable(None)
    }

    /// Create a variable carrying a caller-side identifier.
    pub fn create_variable_with_id(&mut self, external_id: i64) -> TermId {
        self.push_variable(Some(external_id))
    }

    fn push_variable(&mut self, external_id: Option<i64>) -> TermId {
        let slot = self.vars.len();
        let v = self.push(TermKind::Variable { slot, external_id });
        self.vars.push(v);
        v
    }

    #[inline]
    pub fn variable_count(&self) -> usize {
        self.vars.len()
    }

    /// Variables in creation (slot) order.
    #[inline]
    pub fn variables(&self) -> &[TermId] {
        &self.vars
    }

    pub fn variable_slot(&self, id: TermId) -> Option<usize> {
        match self.kind(id) {
            TermKind::Variable { slot, .. } => Some(*slot),
            _ => None,
        }
    }

    pub fn external_id(&self, id: TermId) -> Option<i64> {
        match self.kind(id) {
            TermKind::Variable { external_id, .. } => *external_id,
            _ => None,
        }
    }

    // --- Interval hints ---

    pub fn bounds(&self, id: TermId) -> (f64, f64) {
        self.term(id).bounds()
    }

    pub fn set_bounds(&mut self, id: TermId, min: f64, max: f64) {
        self.assert_owned(id);
        let t = &mut self.terms[id.slot()];
        t.min = min;
        t.max = max;
    }

    // --- Factories: one node per call ---

    fn push(&mut self, kind: TermKind) -> TermId {
        for op in kind.operands().into_iter().flatten() {
            self.assert_owned(op);
        }
        let id = TermId {
            owner: self.id,
            index: self.terms.len() as u32,
        };
        self.terms.push(Term::new(kind));
        id
    }

    /// Create a constant term.
    pub fn constant(&mut self, value: f64) -> TermId {
        self.push(TermKind::Constant(value))
    }

    /// Add two terms.
    pub fn sum(&mut self, left: TermId, right: TermId) -> TermId {
        self.push(TermKind::Sum(left, right))
    }

    /// Multiply two terms.
    pub fn product(&mut self, left: TermId, right: TermId) -> TermId {
        self.push(TermKind::Product(left, right))
    }

    /// Smaller of two terms, ties going left.
    pub fn min(&mut self, left: TermId, right: TermId) -> TermId {
        self.push(TermKind::Min(left, right))
    }

    /// Larger of two terms, ties going left.
    pub fn max(&mut self, left: TermId, right: TermId) -> TermId {
        self.push(TermKind::Max(left, right))
    }

    /// Crisp conjunction of two conditions.
    pub fn and(&mut self, left: TermId, right: TermId) -> TermId {
        self.push(TermKind::And(left, right))
    }

    /// Crisp disjunction of two conditions.
    pub fn or(&mut self, left: TermId, right: TermId) -> TermId {
        self.push(TermKind::Or(left, right))
    }

    /// Soft `left < right` with the configured steepness.
    pub fn less_than(&mut self, left: TermId, right: TermId) -> TermId {
        let steepness = self.config.steepness;
        self.less_than_with(left, right, steepness)
    }

    /// Soft `left < right` with an explicit steepness.
    pub fn less_than_with(&mut self, left: TermId, right: TermId, steepness: f64) -> TermId {
        self.push(TermKind::LessThan {
            left,
            right,
            steepness,
            negation: None,
        })
    }

    /// Soft `left <= right` with the configured steepness.
    pub fn less_than_equal(&mut self, left: TermId, right: TermId) -> TermId {
        let steepness = self.config.steepness;
        self.less_than_equal_with(left, right, steepness)
    }

    /// Soft `left <= right` with an explicit steepness.
    pub fn less_than_equal_with(&mut self, left: TermId, right: TermId, steepness: f64) -> TermId {
        self.push(TermKind::LessEqual {
            left,
            right,
            steepness,
            negation: None,
        })
    }

    /// Absolute value.
    pub fn abs(&mut self, arg: TermId) -> TermId {
        self.push(TermKind::Abs(arg))
    }

    /// Raise a term to a constant power.
    pub fn const_power(&mut self, base: TermId, exponent: f64) -> TermId {
        self.push(TermKind::ConstPower { base, exponent })
    }

    /// Raise a term to a term power.
    pub fn term_power(&mut self, base: TermId, exponent: TermId) -> TermId {
        self.push(TermKind::TermPower { base, exponent })
    }

    /// Logistic curve centred on zero.
    pub fn sigmoid(&mut self, arg: TermId, steepness: f64) -> TermId {
        let mid = self.zero;
        self.sigmoid_around(arg, mid, steepness)
    }

    /// Logistic curve centred on `mid`.
    pub fn sigmoid_around(&mut self, arg: TermId, mid: TermId, steepness: f64) -> TermId {
        self.push(TermKind::Sigmoid {
            arg,
            mid,
            steepness,
        })
    }

    /// Logistic value whose gradient is the argument's, unscaled.
    pub fn lin_sigmoid(&mut self, arg: TermId) -> TermId {
        self.push(TermKind::LinSigmoid(arg))
    }

    /// Sine.
    pub fn sin(&mut self, arg: TermId) -> TermId {
        self.push(TermKind::Sin(arg))
    }

    /// Cosine.
    pub fn cos(&mut self, arg: TermId) -> TermId {
        self.push(TermKind::Cos(arg))
    }

    /// Natural exponential.
    pub fn exp(&mut self, arg: TermId) -> TermId {
        self.push(TermKind::Exp(arg))
    }

    /// Natural logarithm.
    pub fn log(&mut self, arg: TermId) -> TermId {
        self.push(TermKind::Log(arg))
    }

    /// Four-quadrant arctangent of `left / right`.
    pub fn atan2(&mut self, left: TermId, right: TermId) -> TermId {
        self.push(TermKind::Atan2(left, right))
    }

    /// Evaluates to `utility` while `constraint` holds, else to `constraint`.
    pub fn constraint_utility(&mut self, constraint: TermId, utility: TermId) -> TermId {
        self.push(TermKind::ConstraintUtility {
            constraint,
            utility,
        })
    }

    /// Reify `condition` into `{0, 1}`.
    pub fn reify(&mut self, condition: TermId) -> Result<TermId> {
        self.reify_between(condition, 0.0, 1.0)
    }

    /// Reify `condition` into `{min, max}`. Negates the condition once up
    /// front; the negation is linearized next to it.
    pub fn reify_between(&mut self, condition: TermId, min: f64, max: f64) -> Result<TermId> {
        self.check(condition)?;
        let negated = self.negate(condition)?;
        Ok(self.push(TermKind::Reify {
            condition,
            negated,
            min,
            max,
        }))
    }

    // --- Operator-level combinators ---

    /// `a + b`, returning the other operand when one is the zero sentinel.
    pub fn add(&mut self, a: impl IntoTerm, b: impl IntoTerm) -> TermId {
        let a = a.into_term(self);
        let b = b.into_term(self);
        if a == self.zero {
            b
        } else if b == self.zero {
            a
        } else {
            self.sum(a, b)
        }
    }

    /// `a - b` as `a + (-1) * b`.
    pub fn sub(&mut self, a: impl IntoTerm, b: impl IntoTerm) -> TermId {
        let a = a.into_term(self);
        let nb = self.neg(b);
        self.add(a, nb)
    }

    /// `a * b`, accepting literals.
    pub fn mul(&mut self, a: impl IntoTerm, b: impl IntoTerm) -> TermId {
        let a = a.into_term(self);
        let b = b.into_term(self);
        self.product(a, b)
    }

    /// `a / b` as `a * b^-1`.
    pub fn div(&mut self, a: impl IntoTerm, b: impl IntoTerm) -> TermId {
        let a = a.into_term(self);
        let b = b.into_term(self);
        let rb = self.const_power(b, -1.0);
        self.product(a, rb)
    }

    /// `-a` as `(-1) * a`.
    pub fn neg(&mut self, a: impl IntoTerm) -> TermId {
        let a = a.into_term(self);
        let m = self.constant(-1.0);
        self.product(m, a)
    }

    /// Logical `a & b`: short-circuits the sentinels, otherwise builds AND or
    /// MIN depending on the logic mode.
    pub fn conjoin(&mut self, a: TermId, b: TermId) -> TermId {
        self.conjoin_in(self.config.logic, a, b)
    }

    pub(crate) fn conjoin_in(&mut self, logic: LogicMode, a: TermId, b: TermId) -> TermId {
        if a == self.truth || b == self.falsity {
            return b;
        }
        if a == self.falsity || b == self.truth {
            return a;
        }
        match logic {
            LogicMode::Crisp => self.and(a, b),
            LogicMode::Soft => self.min(a, b),
        }
    }

    /// Logical `a | b`: short-circuits the sentinels, otherwise builds OR or
    /// MAX depending on the logic mode.
    pub fn disjoin(&mut self, a: TermId, b: TermId) -> TermId {
        self.disjoin_in(self.config.logic, a, b)
    }

    pub(crate) fn disjoin_in(&mut self, logic: LogicMode, a: TermId, b: TermId) -> TermId {
        if a == self.truth || b == self.falsity {
            return a;
        }
        if b == self.truth || a == self.falsity {
            return b;
        }
        match logic {
            LogicMode::Crisp => self.or(a, b),
            LogicMode::Soft => self.max(a, b),
        }
    }

    /// `a < b` with the configured steepness, accepting literals.
    pub fn lt(&mut self, a: impl IntoTerm, b: impl IntoTerm) -> TermId {
        let a = a.into_term(self);
        let b = b.into_term(self);
        self.less_than(a, b)
    }

    /// `a <= b` with the configured steepness, accepting literals.
    pub fn le(&mut self, a: impl IntoTerm, b: impl IntoTerm) -> TermId {
        let a = a.into_term(self);
        let b = b.into_term(self);
        self.less_than_equal(a, b)
    }

    /// `a > b` as `b < a`.
    pub fn gt(&mut self, a: impl IntoTerm, b: impl IntoTerm) -> TermId {
        let a = a.into_term(self);
        let b = b.into_term(self);
        self.less_than(b, a)
    }

    /// `a >= b` as `b <= a`.
    pub fn ge(&mut self, a: impl IntoTerm, b: impl IntoTerm) -> TermId {
        let a = a.into_term(self);
        let b = b.into_term(self);
        self.less_than_equal(b, a)
    }

    // --- Compilation ---

    /// Compile `top` into this builder's tape, replacing any previous one.
    pub fn compile(&mut self, top: TermId) -> Result<()> {
        self.tape = None;
        for t in &mut self.terms {
            t.tape_index = None;
        }
        let tape = Tape::compile(self, top)?;
        let order: Vec<TermId> = tape.program().order().to_vec();
        for (row, id) in order.into_iter().enumerate() {
            self.set_tape_index(id, Some(row));
        }
        self.tape = Some(tape);
        Ok(())
    }

    /// Evaluate the compiled tape at `input`, writing value and gradient
    /// into `output[0..=variable_count]`.
    pub fn evaluate(&mut self, input: &[f64], output: &mut [f64]) -> Result<()> {
        self.tape
            .as_mut()
            .ok_or(TermError::NotCompiled)?
            .evaluate(input, output)
    }

    #[inline]
    pub fn tape(&self) -> Option<&Tape> {
        self.tape.as_ref()
    }

    #[inline]
    pub(crate) fn owner_id(&self) -> u32 {
        self.id
    }

    // --- Structural comparison ---

    /// Whether `a` and `b` describe the same expression: same variants, same
    /// inline scalars, same variables, structurally equal operands.
    pub fn structurally_equal(&self, a: TermId, b: TermId) -> bool {
        let mut seen: HashSet<(TermId, TermId)> = HashSet::new();
        let mut pending = vec![(a, b)];
        while let Some((a, b)) = pending.pop() {
            if a == b || !seen.insert((a, b)) {
                continue;
            }
            let (ka, kb) = (self.kind(a), self.kind(b));
            if std::mem::discriminant(ka) != std::mem::discriminant(kb) {
                return false;
            }
            let same_scalars = inline_scalars(ka)
                .iter()
                .zip(inline_scalars(kb).iter())
                .all(|(x, y)| x.to_bits() == y.to_bits());
            if !same_scalars {
                return false;
            }
            for pair in ka.operands().into_iter().zip(kb.operands()) {
                match pair {
                    (Some(x), Some(y)) => pending.push((x, y)),
                    (None, None) => {}
                    _ => return false,
                }
            }
        }
        true
    }
}

/// Scalar payload of a variant, for structural comparison.
fn inline_scalars(kind: &TermKind) -> [f64; 2] {
    match *kind {
        TermKind::Constant(v) => [v, 0.0],
        TermKind::Variable { slot, .. } => [slot as f64, 0.0],
        TermKind::ConstPower { exponent, .. } => [exponent, 0.0],
        TermKind::Sigmoid { steepness, .. }
        | TermKind::LessThan { steepness, .. }
        | TermKind::LessEqual { steepness, .. } => [steepness, 0.0],
        TermKind::Reify { min, max, .. } => [min, max],
        _ => [0.0, 0.0],
    }
}

impl Default for TermBuilder {
    fn default() -> Self {
        Self::new()
    }
}
