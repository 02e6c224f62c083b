//! Composite terms built from the primitive factories.

use std::f64::consts::PI;

use crate::builder::{IntoTerm, TermBuilder};
use crate::error::{Result, TermError};
use crate::term::TermId;

fn same_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(TermError::DimensionMismatch {
            what,
            expected,
            actual,
        })
    }
}

impl TermBuilder {
    /// `left < arg & arg < right`, both with the given steepness.
    pub fn bounded_value(&mut self, arg: TermId, left: TermId, right: TermId, steepness: f64) -> TermId {
        let lo = self.less_than_with(left, arg, steepness);
        let hi = self.less_than_with(arg, right, steepness);
        self.conjoin(lo, hi)
    }

    /// Point `arg` lies strictly inside the axis-aligned box spanned by
    /// `lower` and `upper`.
    pub fn bounded_rectangle(
        &mut self,
        arg: [TermId; 2],
        lower: [TermId; 2],
        upper: [TermId; 2],
        steepness: f64,
    ) -> TermId {
        let x = self.bounded_value(arg[0], lower[0], upper[0], steepness);
        let y = self.bounded_value(arg[1], lower[1], upper[1], steepness);
        self.conjoin(x, y)
    }

    /// Logistic curve scaled to run from `lower` to `upper`.
    pub fn sigmoid_between(
        &mut self,
        arg: TermId,
        upper: TermId,
        lower: TermId,
        mid: TermId,
        steepness: f64,
    ) -> TermId {
        let range = self.sub(upper, lower);
        let s = self.sigmoid_around(arg, mid, steepness);
        let scaled = self.mul(range, s);
        self.add(scaled, lower)
    }

    pub fn euclidean_distance_sqr(&mut self, one: &[TermId], two: &[TermId]) -> Result<TermId> {
        same_len("second point", one.len(), two.len())?;
        let mut acc = self.zero();
        for (&a, &b) in one.iter().zip(two) {
            let d = self.sub(a, b);
            let sq = self.const_power(d, 2.0);
            acc = self.add(acc, sq);
        }
        Ok(acc)
    }

    pub fn euclidean_distance(&mut self, one: &[TermId], two: &[TermId]) -> Result<TermId> {
        let sqr = self.euclidean_distance_sqr(one, two)?;
        Ok(self.const_power(sqr, 0.5))
    }

    /// Unnormalized `exp(-|args - mean|^2 / (2 variance))`.
    pub fn gaussian(&mut self, args: &[TermId], mean: &[TermId], variance: f64) -> Result<TermId> {
        let sqr = self.euclidean_distance_sqr(args, mean)?;
        let scaled = self.mul(sqr, -0.5 / variance);
        Ok(self.exp(scaled))
    }

    /// [`gaussian`](Self::gaussian) times `1 / sqrt(2 pi variance)`.
    pub fn normal_distribution(&mut self, args: &[TermId], mean: &[TermId], variance: f64) -> Result<TermId> {
        let g = self.gaussian(args, mean, variance)?;
        Ok(self.mul(g, 1.0 / (2.0 * PI * variance).sqrt()))
    }

    /// 2D quadratic form `x^T A x`.
    pub fn quadform(&mut self, x: [TermId; 2], a: [[TermId; 2]; 2]) -> TermId {
        let x1_sq = self.const_power(x[0], 2.0);
        let x2_sq = self.const_power(x[1], 2.0);
        let t1 = self.mul(a[0][0], x1_sq);
        let cross = self.add(a[0][1], a[1][0]);
        let cross = self.mul(cross, x[0]);
        let t2 = self.mul(cross, x[1]);
        let t3 = self.mul(a[1][1], x2_sq);
        let s = self.add(t1, t2);
        self.add(s, t3)
    }

    // --- Logical connectives ---

    /// `left` lies within `tolerance` of `right`:
    /// `left < right + tolerance & left > right - tolerance`.
    pub fn equals(&mut self, left: TermId, right: TermId, tolerance: impl IntoTerm) -> TermId {
        let tolerance = tolerance.into_term(self);
        let upper = self.add(right, tolerance);
        let lower = self.sub(right, tolerance);
        let below = self.lt(left, upper);
        let above = self.gt(left, lower);
        self.conjoin(below, above)
    }

    /// Implication `!premise | conclusion`.
    pub fn if_then(&mut self, premise: TermId, conclusion: TermId) -> Result<TermId> {
        let not_premise = self.negate(premise)?;
        Ok(self.disjoin(not_premise, conclusion))
    }

    /// `(cond => then) & (!cond => otherwise)`.
    pub fn if_then_else(
        &mut self,
        cond: TermId,
        then: TermId,
        otherwise: TermId,
    ) -> Result<TermId> {
        let not_cond = self.negate(cond)?;
        let taken = self.disjoin(not_cond, then);
        let skipped = self.disjoin(cond, otherwise);
        Ok(self.conjoin(taken, skipped))
    }

    /// Equivalence `(a & b) | (!a & !b)`.
    pub fn equiv(&mut self, a: TermId, b: TermId) -> Result<TermId> {
        let not_a = self.negate(a)?;
        let not_b = self.negate(b)?;
        let both = self.conjoin(a, b);
        let neither = self.conjoin(not_a, not_b);
        Ok(self.disjoin(both, neither))
    }

    /// Optimize `utility` subject to `constraint`.
    pub fn constraint_apply(&mut self, constraint: TermId, utility: TermId) -> TermId {
        self.constraint_utility(constraint, utility)
    }

    /// `sum_i params[i] * inputs[i]^degree`.
    pub fn polynom(&mut self, inputs: &[TermId], degree: u32, params: &[TermId]) -> Result<TermId> {
        same_len("polynomial parameters", inputs.len(), params.len())?;
        let mut acc = self.zero();
        for (&x, &c) in inputs.iter().zip(params) {
            let p = self.const_power(x, f64::from(degree));
            let t = self.mul(p, c);
            acc = self.add(acc, t);
        }
        Ok(acc)
    }
}
