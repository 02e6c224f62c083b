//! Symbolic differentiation.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::builder::TermBuilder;
use crate::error::{Result, TermError};
use crate::term::{TermId, TermKind};

impl TermBuilder {
    /// Build a new term for `d term / d var`.
    ///
    /// Shared subterms are differentiated once. Comparison, logic, min/max
    /// and reification nodes only have the relaxed numeric gradient of the
    /// tape and fail with [`TermError::NotDifferentiable`].
    pub fn derivative(&mut self, term: TermId, var: TermId) -> Result<TermId> {
        self.check(term)?;
        self.check(var)?;
        if self.variable_slot(var).is_none() {
            return Err(TermError::malformed(format!(
                "{var} is a {}, not a variable",
                self.kind(var).name()
            )));
        }
        let mut memo: HashMap<TermId, TermId> = HashMap::new();
        let mut entered: HashSet<TermId> = HashSet::new();
        let mut stack = vec![(term, false)];

        while let Some((t, expanded)) = stack.pop() {
            if memo.contains_key(&t) {
                continue;
            }
            if !expanded {
                let kind = self.kind(t);
                if !kind.is_differentiable() {
                    return Err(TermError::NotDifferentiable { kind: kind.name() });
                }
                if !entered.insert(t) {
                    return Err(TermError::malformed(format!("cycle through {t}")));
                }
                stack.push((t, true));
                for op in kind.operands().into_iter().rev().flatten() {
                    if !memo.contains_key(&op) {
                        stack.push((op, false));
                    }
                }
                continue;
            }
            let d = self.diff_node(t, var, &memo)?;
            memo.insert(t, d);
        }

        let d = memo.get(&term).copied().unwrap_or(self.zero());
        debug!(term = %term, var = %var, derivative = %d, "differentiated");
        Ok(d)
    }

    /// Derivative of one node, its operands' derivatives already in `memo`.
    fn diff_node(
        &mut self,
        term: TermId,
        var: TermId,
        memo: &HashMap<TermId, TermId>,
    ) -> Result<TermId> {
        let zero = self.zero();
        let d = |t: TermId| memo.get(&t).copied().unwrap_or(zero);

        let kind = self.kind(term).clone();
        let result = match kind {
            TermKind::Variable { .. } if term == var => self.constant(1.0),
            TermKind::Variable { .. } | TermKind::Constant(_) => zero,

            TermKind::Sum(a, b) => {
                // d(a + b) = da + db
                let da = d(a);
                let db = d(b);
                self.add(da, db)
            }

            TermKind::Product(a, b) => {
                // d(a * b) = da*b + a*db
                let da = d(a);
                let db = d(b);
                let t1 = self.scale(da, b);
                let t2 = self.scale(a, db);
                self.add(t1, t2)
            }

            TermKind::ConstPower { base, exponent } => {
                // d(a^e) = e * a^(e-1) * da
                let da = d(base);
                if da == zero {
                    zero
                } else {
                    let e = self.constant(exponent);
                    let p = self.const_power(base, exponent - 1.0);
                    let ep = self.product(e, p);
                    self.product(ep, da)
                }
            }

            TermKind::TermPower { base, exponent } => {
                // d(a^b) = a^(b-1) * (b*da + a*ln(a)*db)
                let da = d(base);
                let db = d(exponent);
                let t1 = self.scale(exponent, da);
                let t2 = if db == zero {
                    zero
                } else {
                    let ln_a = self.log(base);
                    let a_ln_a = self.product(base, ln_a);
                    self.product(a_ln_a, db)
                };
                let inner = self.add(t1, t2);
                if inner == zero {
                    zero
                } else {
                    let bm1 = self.sub(exponent, 1.0);
                    let p = self.term_power(base, bm1);
                    self.product(p, inner)
                }
            }

            TermKind::Abs(a) => {
                // d|a| = a / |a| * da
                let da = d(a);
                if da == zero {
                    zero
                } else {
                    let inv = self.const_power(term, -1.0);
                    let sign = self.product(a, inv);
                    self.product(sign, da)
                }
            }

            TermKind::Sin(a) => {
                let da = d(a);
                let cos_a = self.cos(a);
                self.scale(cos_a, da)
            }

            TermKind::Cos(a) => {
                let da = d(a);
                if da == zero {
                    zero
                } else {
                    let sin_a = self.sin(a);
                    let neg = self.neg(sin_a);
                    self.product(neg, da)
                }
            }

            TermKind::Exp(a) => {
                // d(exp a) = exp(a) * da, reusing this node
                let da = d(a);
                self.scale(term, da)
            }

            TermKind::Log(a) => {
                let da = d(a);
                if da == zero {
                    zero
                } else {
                    let inv = self.const_power(a, -1.0);
                    self.product(da, inv)
                }
            }

            TermKind::Atan2(l, r) => {
                // (l*dr - r*dl) / (l^2 + r^2), same sign convention as the tape
                let dl = d(l);
                let dr = d(r);
                let t1 = self.scale(l, dr);
                let t2 = self.scale(r, dl);
                let num = self.minus(t1, t2);
                if num == zero {
                    zero
                } else {
                    let l2 = self.const_power(l, 2.0);
                    let r2 = self.const_power(r, 2.0);
                    let den = self.sum(l2, r2);
                    self.div(num, den)
                }
            }

            TermKind::Sigmoid { arg, mid, steepness } => {
                // s * sig * (1 - sig) * (darg - dmid)
                let darg = d(arg);
                let dmid = d(mid);
                let inner = self.minus(darg, dmid);
                if inner == zero {
                    zero
                } else {
                    let one_minus = self.sub(1.0, term);
                    let slope = self.product(term, one_minus);
                    let s = self.constant(steepness);
                    let coef = self.product(s, slope);
                    self.product(coef, inner)
                }
            }

            // Gradient passes straight through, as in the tape.
            TermKind::LinSigmoid(a) => d(a),

            ref k => return Err(TermError::NotDifferentiable { kind: k.name() }),
        };

        Ok(result)
    }

    /// `a * b`, collapsing to the zero sentinel when either side is zero.
    fn scale(&mut self, a: TermId, b: TermId) -> TermId {
        let zero = self.zero();
        if a == zero || b == zero {
            zero
        } else {
            self.product(a, b)
        }
    }

    /// `a - b`, skipping the negation when `b` is the zero sentinel.
    fn minus(&mut self, a: TermId, b: TermId) -> TermId {
        if b == self.zero() {
            a
        } else {
            self.sub(a, b)
        }
    }
}
