//! Per-instruction interpreter: value plus forward-mode gradient row.

use crate::tape::{Instruction, Op, Parameter};
use crate::term::{EPSILON, FALSE_VALUE, TRUTH_THRESHOLD};

/// Resolved operand: an inlined literal or an earlier row.
#[derive(Clone, Copy)]
enum Operand<'a> {
    Literal(f64),
    Row(&'a [f64]),
}

impl Operand<'_> {
    #[inline]
    fn value(&self) -> f64 {
        match *self {
            Operand::Literal(v) => v,
            Operand::Row(r) => r[0],
        }
    }

    /// Partial at row position `i` (1-based, past the value).
    #[inline]
    fn grad(&self, i: usize) -> f64 {
        match *self {
            Operand::Literal(_) => 0.0,
            Operand::Row(r) => r[i],
        }
    }

    /// Overwrite `row` with this operand's value and gradient.
    #[inline]
    fn copy_into(&self, row: &mut [f64]) {
        match *self {
            Operand::Literal(v) => {
                row.fill(0.0);
                row[0] = v;
            }
            Operand::Row(r) => row.copy_from_slice(r),
        }
    }

    #[inline]
    fn add_into(&self, row: &mut [f64]) {
        if let Operand::Row(r) = *self {
            for (o, x) in row.iter_mut().zip(r) {
                *o += x;
            }
        } else {
            row[0] += self.value();
        }
    }
}

#[inline]
fn resolve(p: Parameter, done: &[f64], width: usize) -> Operand<'_> {
    match p {
        Parameter::Literal(v) => Operand::Literal(v),
        Parameter::Index(r) => Operand::Row(&done[r * width..(r + 1) * width]),
        Parameter::Unused => Operand::Literal(0.0),
    }
}

/// Whether a reified condition holds. The false sentinel is positive, so the
/// test is against its value rather than against zero.
#[inline]
pub(crate) fn holds(condition: f64) -> bool {
    condition > FALSE_VALUE
}

/// Logistic `1 / (1 + e)` with `e = exp(steepness * (mid - arg))`.
///
/// Returns `None` when the curve has collapsed below [`EPSILON`] (or `e`
/// overflowed); callers then clamp to `EPSILON` with a flat gradient.
#[inline]
pub(crate) fn logistic(arg: f64, mid: f64, steepness: f64) -> Option<(f64, f64)> {
    let e = (steepness * (mid - arg)).exp();
    let value = 1.0 / (1.0 + e);
    if e.is_infinite() || value < EPSILON {
        None
    } else {
        Some((value, e))
    }
}

/// Fill `row` (value then partials) for one instruction. `done` holds every
/// earlier row.
pub(crate) fn dispatch(ins: &Instruction, done: &[f64], width: usize, input: &[f64], row: &mut [f64]) {
    // Variable operands index the input, not earlier rows.
    if ins.op == Op::Variable {
        let slot = match ins.params[0] {
            Parameter::Index(s) => s,
            _ => unreachable!("variable instruction without a slot"),
        };
        row.fill(0.0);
        row[0] = input[slot];
        row[slot + 1] = 1.0;
        return;
    }

    let a = resolve(ins.params[0], done, width);
    let b = resolve(ins.params[1], done, width);
    let (av, bv) = (a.value(), b.value());

    match ins.op {
        Op::Variable => unreachable!(),
        Op::Constant => a.copy_into(row),
        Op::Sum => {
            row[0] = av + bv;
            for i in 1..width {
                row[i] = a.grad(i) + b.grad(i);
            }
        }
        Op::Product => {
            row[0] = av * bv;
            for i in 1..width {
                row[i] = av * b.grad(i) + bv * a.grad(i);
            }
        }
        Op::ConstPower => {
            row[0] = av.powf(bv);
            let d = bv * av.powf(bv - 1.0);
            chain(row, &a, d, width);
        }
        Op::TermPower => {
            row[0] = av.powf(bv);
            let coef = av.powf(bv - 1.0);
            let ln_a = av.ln();
            for i in 1..width {
                let bi = b.grad(i);
                let exp_part = if bi == 0.0 { 0.0 } else { av * ln_a * bi };
                row[i] = coef * (bv * a.grad(i) + exp_part);
            }
        }
        Op::Abs => {
            row[0] = av.abs();
            let sign = if av > 0.0 {
                1.0
            } else if av < 0.0 {
                -1.0
            } else {
                0.0
            };
            chain(row, &a, sign, width);
        }
        Op::Sin => {
            row[0] = av.sin();
            chain(row, &a, av.cos(), width);
        }
        Op::Cos => {
            row[0] = av.cos();
            chain(row, &a, -av.sin(), width);
        }
        Op::Exp => {
            let e = av.exp();
            row[0] = e;
            chain(row, &a, e, width);
        }
        Op::Log => {
            row[0] = av.ln();
            chain(row, &a, 1.0 / av, width);
        }
        Op::Atan2 => {
            row[0] = av.atan2(bv);
            let denom = av * av + bv * bv;
            for i in 1..width {
                row[i] = (av * b.grad(i) - bv * a.grad(i)) / denom;
            }
        }
        Op::Sigmoid { steepness } => match logistic(av, bv, steepness) {
            Some((value, e)) => {
                row[0] = value;
                let d = steepness * e / ((1.0 + e) * (1.0 + e));
                for i in 1..width {
                    row[i] = d * (a.grad(i) - b.grad(i));
                }
            }
            None => clamp(row),
        },
        Op::LinSigmoid => match logistic(av, 0.0, 1.0) {
            Some((value, _)) => {
                row[0] = value;
                for i in 1..width {
                    row[i] = a.grad(i);
                }
            }
            None => clamp(row),
        },
        Op::Min => {
            if av <= bv {
                a.copy_into(row)
            } else {
                b.copy_into(row)
            }
        }
        Op::Max => {
            if av >= bv {
                a.copy_into(row)
            } else {
                b.copy_into(row)
            }
        }
        Op::And => {
            if av > TRUTH_THRESHOLD && bv > TRUTH_THRESHOLD {
                satisfied(row);
            } else {
                row.fill(0.0);
                if av <= TRUTH_THRESHOLD {
                    a.add_into(row);
                }
                if bv <= TRUTH_THRESHOLD {
                    b.add_into(row);
                }
            }
        }
        Op::Or => {
            if av > TRUTH_THRESHOLD || bv > TRUTH_THRESHOLD {
                satisfied(row);
            } else if av >= bv {
                a.copy_into(row);
            } else {
                b.copy_into(row);
            }
        }
        Op::LessThan { steepness } => {
            if av < bv {
                satisfied(row);
            } else {
                violation(row, &a, &b, steepness, width);
            }
        }
        Op::LessEqual { steepness } => {
            if av <= bv {
                satisfied(row);
            } else {
                violation(row, &a, &b, steepness, width);
            }
        }
        Op::Reify { min, max } => {
            if holds(av) {
                row[0] = max;
                for i in 1..width {
                    row[i] = -b.grad(i);
                }
            } else {
                row[0] = min;
                for i in 1..width {
                    row[i] = a.grad(i);
                }
            }
        }
        Op::ConstraintUtility => {
            if av > TRUTH_THRESHOLD {
                b.copy_into(row);
            } else {
                a.copy_into(row);
            }
        }
    }
}

/// `row[i] = d * a_i` for every partial.
#[inline]
fn chain(row: &mut [f64], a: &Operand<'_>, d: f64, width: usize) {
    for i in 1..width {
        row[i] = d * a.grad(i);
    }
}

#[inline]
fn satisfied(row: &mut [f64]) {
    row.fill(0.0);
    row[0] = 1.0;
}

#[inline]
fn clamp(row: &mut [f64]) {
    row.fill(0.0);
    row[0] = EPSILON;
}

/// Linear penalty `s * (right - left)` of a violated comparison.
#[inline]
fn violation(row: &mut [f64], left: &Operand<'_>, right: &Operand<'_>, steepness: f64, width: usize) {
    row[0] = steepness * (right.value() - left.value());
    for i in 1..width {
        row[i] = steepness * (right.grad(i) - left.grad(i));
    }
}
