//! Constant folding and algebraic identities.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::builder::TermBuilder;
use crate::error::{Result, TermError};
use crate::eval::{holds, logistic};
use crate::term::{TermId, TermKind, EPSILON, TRUTH_THRESHOLD};

impl TermBuilder {
    /// Fold constants bottom-up and apply the identity rules.
    ///
    /// Children are folded first and written back into their parents in
    /// place, so every term reachable from `term` may change. The returned
    /// term replaces `term` at the call site; the old handle may now point at
    /// a node that is no longer part of the folded formula.
    pub fn aggregate_constants(&mut self, term: TermId) -> Result<TermId> {
        self.check(term)?;
        let mut memo: HashMap<TermId, TermId> = HashMap::new();
        let mut entered: HashSet<TermId> = HashSet::new();
        let mut stack = vec![(term, false)];

        // Post-order with an explicit stack: accumulation loops build chains
        // far deeper than the call stack allows.
        while let Some((id, expanded)) = stack.pop() {
            if memo.contains_key(&id) {
                continue;
            }
            if !expanded {
                if !entered.insert(id) {
                    return Err(TermError::malformed(format!("cycle through {id}")));
                }
                stack.push((id, true));
                for op in self.kind(id).operands().into_iter().rev().flatten() {
                    if !memo.contains_key(&op) {
                        stack.push((op, false));
                    }
                }
                continue;
            }

            let kind = self.kind(id).clone();
            let [a, b] = kind.operands();
            let folded = |t: Option<TermId>| t.map(|t| memo.get(&t).copied().unwrap_or(t));
            let (fa, fb) = (folded(a), folded(b));
            if fa != a || fb != b {
                self.set_kind(id, kind.with_operands([fa, fb]));
            }

            let result = self.rewrite(id);
            if result != id {
                trace!(from = %id, to = %result, kind = self.kind(id).name(), "folded");
            }
            memo.insert(id, result);
        }

        let folded = memo.get(&term).copied().unwrap_or(term);
        debug!(term = %term, folded = %folded, visited = memo.len(), "aggregated constants");
        Ok(folded)
    }

    /// One node's rules, with its operands already folded.
    fn rewrite(&mut self, id: TermId) -> TermId {
        let (zero, truth, falsity) = (self.zero(), self.true_term(), self.false_term());
        let kind = self.kind(id).clone();

        match kind {
            TermKind::Constant(_) | TermKind::Variable { .. } => id,

            TermKind::Sum(a, b) => match (self.constant_value(a), self.constant_value(b)) {
                (Some(x), Some(y)) => self.constant(x + y),
                (_, Some(y)) if y == 0.0 => a,
                (Some(x), _) if x == 0.0 => b,
                _ => id,
            },

            TermKind::Product(a, b) => match (self.constant_value(a), self.constant_value(b)) {
                (Some(x), Some(y)) => self.constant(x * y),
                (Some(x), _) | (_, Some(x)) if x == 0.0 => zero,
                (Some(x), _) if x == 1.0 => b,
                (_, Some(y)) if y == 1.0 => a,
                _ => id,
            },

            TermKind::ConstPower { base, exponent } => {
                if let Some(x) = self.constant_value(base) {
                    return self.constant(x.powf(exponent));
                }
                if let TermKind::ConstPower {
                    base: inner,
                    exponent: e1,
                } = *self.kind(base)
                {
                    if e1.fract() == 0.0 && exponent.fract() == 0.0 {
                        self.set_kind(
                            id,
                            TermKind::ConstPower {
                                base: inner,
                                exponent: e1 * exponent,
                            },
                        );
                    }
                }
                id
            }

            TermKind::TermPower { base, exponent } => {
                match (self.constant_value(base), self.constant_value(exponent)) {
                    (Some(x), Some(y)) => return self.constant(x.powf(y)),
                    (_, Some(y)) => {
                        let p = self.const_power(base, y);
                        return self.rewrite(p);
                    }
                    _ => {}
                }
                if let TermKind::TermPower {
                    base: inner,
                    exponent: e1,
                } = *self.kind(base)
                {
                    let product = self.product(e1, exponent);
                    let product = self.rewrite(product);
                    self.set_kind(
                        id,
                        TermKind::TermPower {
                            base: inner,
                            exponent: product,
                        },
                    );
                    return self.rewrite(id);
                }
                id
            }

            TermKind::Abs(a) => self.fold_unary(id, a, f64::abs),
            TermKind::Sin(a) => self.fold_unary(id, a, f64::sin),
            TermKind::Cos(a) => self.fold_unary(id, a, f64::cos),
            TermKind::Exp(a) => self.fold_unary(id, a, f64::exp),
            TermKind::Log(a) => self.fold_unary(id, a, f64::ln),
            TermKind::LinSigmoid(a) => self.fold_unary(id, a, |x| {
                logistic(x, 0.0, 1.0).map_or(EPSILON, |(v, _)| v)
            }),

            TermKind::Atan2(l, r) => match (self.constant_value(l), self.constant_value(r)) {
                (Some(x), Some(y)) => self.constant(x.atan2(y)),
                _ => id,
            },

            TermKind::Sigmoid {
                arg,
                mid,
                steepness,
            } => match (self.constant_value(arg), self.constant_value(mid)) {
                (Some(x), Some(m)) => {
                    let v = logistic(x, m, steepness).map_or(EPSILON, |(v, _)| v);
                    self.constant(v)
                }
                _ => id,
            },

            TermKind::And(a, b) => {
                if a == falsity || b == falsity {
                    falsity
                } else if a == truth {
                    b
                } else if b == truth {
                    a
                } else {
                    match (self.constant_value(a), self.constant_value(b)) {
                        (Some(x), Some(y)) => {
                            if x > TRUTH_THRESHOLD && y > TRUTH_THRESHOLD {
                                truth
                            } else {
                                falsity
                            }
                        }
                        _ => id,
                    }
                }
            }

            TermKind::Or(a, b) | TermKind::Max(a, b) => self.fold_disjunction(id, a, b),

            TermKind::Min(a, b) => match (self.constant_value(a), self.constant_value(b)) {
                (Some(x), Some(y)) => self.constant(x.min(y)),
                _ => id,
            },

            TermKind::LessThan { left, right, .. } => {
                match (self.constant_value(left), self.constant_value(right)) {
                    (Some(x), Some(y)) => self.truth_of(x < y),
                    _ => id,
                }
            }

            TermKind::LessEqual { left, right, .. } => {
                match (self.constant_value(left), self.constant_value(right)) {
                    (Some(x), Some(y)) => self.truth_of(x <= y),
                    _ => id,
                }
            }

            TermKind::Reify {
                condition,
                min,
                max,
                ..
            } => match self.constant_value(condition) {
                Some(v) => self.constant(if holds(v) { max } else { min }),
                None => id,
            },

            TermKind::ConstraintUtility { .. } => id,
        }
    }

    fn fold_unary(&mut self, id: TermId, a: TermId, f: impl Fn(f64) -> f64) -> TermId {
        match self.constant_value(a) {
            Some(x) => self.constant(f(x)),
            None => id,
        }
    }

    /// Or-style sentinel rules shared by OR and MAX. Two constants fold to a
    /// sentinel for OR and to the numeric maximum for MAX.
    fn fold_disjunction(&mut self, id: TermId, a: TermId, b: TermId) -> TermId {
        let (truth, falsity) = (self.true_term(), self.false_term());
        if a == truth || b == truth {
            return truth;
        }
        if a == falsity {
            return b;
        }
        if b == falsity {
            return a;
        }
        let is_or = matches!(self.kind(id), TermKind::Or(..));
        match (self.constant_value(a), self.constant_value(b)) {
            (Some(x), Some(y)) if is_or => {
                self.truth_of(x > TRUTH_THRESHOLD || y > TRUTH_THRESHOLD)
            }
            (Some(x), Some(y)) => self.constant(x.max(y)),
            _ => id,
        }
    }

    #[inline]
    fn truth_of(&self, v: bool) -> TermId {
        if v {
            self.true_term()
        } else {
            self.false_term()
        }
    }
}
