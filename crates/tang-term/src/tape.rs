//! Linearized instruction tape.
//!
//! A term graph is flattened into rows in dependency order. Each row holds the
//! value and the full gradient of one term, so a tape of `n` rows over `v`
//! variables needs `n * (v + 1)` scratch doubles. Constant operands are
//! inlined as literals and never get a row of their own.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::builder::TermBuilder;
use crate::error::{Result, TermError};
use crate::eval;
use crate::term::{TermId, TermKind};

/// Maximum number of term operands of any instruction.
pub const MAX_ARITY: usize = 2;

/// One operand slot of an instruction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Parameter {
    Unused,
    /// Inlined constant.
    Literal(f64),
    /// Row of an earlier instruction, or the input slot of a variable.
    Index(usize),
}

/// Instruction opcode. Scalar parameters that are not operands ride along as
/// immediates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Op {
    Constant,
    Variable,
    Sum,
    Product,
    /// Exponent is `params[1]` as a literal.
    ConstPower,
    TermPower,
    Abs,
    Sin,
    Cos,
    Exp,
    Log,
    Atan2,
    Sigmoid { steepness: f64 },
    LinSigmoid,
    Min,
    Max,
    And,
    Or,
    LessThan { steepness: f64 },
    LessEqual { steepness: f64 },
    Reify { min: f64, max: f64 },
    ConstraintUtility,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instruction {
    pub op: Op,
    pub params: [Parameter; MAX_ARITY],
}

/// The immutable half of a compiled tape. Shareable across threads; each
/// evaluating thread brings its own [`Scratch`].
#[derive(Clone, Debug)]
pub struct Program {
    instructions: Vec<Instruction>,
    order: Vec<TermId>,
    variable_count: usize,
}

/// Mutable results buffer for one evaluating thread.
#[derive(Clone, Debug)]
pub struct Scratch {
    results: Vec<f64>,
}

impl Program {
    /// Linearize `top` and everything it depends on.
    pub fn compile(builder: &TermBuilder, top: TermId) -> Result<Self> {
        builder.check(top)?;
        let order = linearize(builder, top)?;
        let rows: HashMap<TermId, usize> =
            order.iter().enumerate().map(|(row, &id)| (id, row)).collect();

        let instructions = order
            .iter()
            .map(|&id| lower(builder, builder.kind(id), &rows))
            .collect::<Result<Vec<_>>>()?;

        if builder.is_constant(top) {
            warn!(term = %top, "compiling a constant top term");
        }
        debug!(
            builder = builder.owner_id(),
            top = %top,
            rows = instructions.len(),
            variables = builder.variable_count(),
            "compiled tape"
        );

        Ok(Self {
            instructions,
            order,
            variable_count: builder.variable_count(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    #[inline]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Term linearized into each row.
    #[inline]
    pub fn order(&self) -> &[TermId] {
        &self.order
    }

    #[inline]
    pub fn variable_count(&self) -> usize {
        self.variable_count
    }

    /// Doubles per row: the value followed by one partial per variable.
    #[inline]
    pub fn width(&self) -> usize {
        self.variable_count + 1
    }

    pub fn new_scratch(&self) -> Scratch {
        Scratch {
            results: vec![0.0; self.len() * self.width()],
        }
    }

    /// Evaluate at `input`. On success `output[0]` holds the value of the top
    /// term and `output[1 + i]` its partial with respect to variable `i`.
    pub fn evaluate(&self, scratch: &mut Scratch, input: &[f64], output: &mut [f64]) -> Result<()> {
        let width = self.width();
        if input.len() != self.variable_count {
            return Err(TermError::DimensionMismatch {
                what: "input",
                expected: self.variable_count,
                actual: input.len(),
            });
        }
        if output.len() < width {
            return Err(TermError::DimensionMismatch {
                what: "output",
                expected: width,
                actual: output.len(),
            });
        }
        scratch.results.resize(self.len() * width, 0.0);

        for (p, ins) in self.instructions.iter().enumerate() {
            let (done, rest) = scratch.results.split_at_mut(p * width);
            eval::dispatch(ins, done, width, input, &mut rest[..width]);
        }

        let last = (self.len() - 1) * width;
        output[..width].copy_from_slice(&scratch.results[last..last + width]);
        Ok(())
    }
}

/// A compiled program paired with its scratch buffer.
#[derive(Clone, Debug)]
pub struct Tape {
    program: Arc<Program>,
    scratch: Scratch,
}

impl Tape {
    pub fn compile(builder: &TermBuilder, top: TermId) -> Result<Self> {
        Ok(Self::from_program(Arc::new(Program::compile(builder, top)?)))
    }

    /// Wrap an already compiled program with a fresh scratch buffer.
    pub fn from_program(program: Arc<Program>) -> Self {
        let scratch = program.new_scratch();
        Self { program, scratch }
    }

    #[inline]
    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.program.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.program.is_empty()
    }

    pub fn evaluate(&mut self, input: &[f64], output: &mut [f64]) -> Result<()> {
        self.program.evaluate(&mut self.scratch, input, output)
    }

    /// Evaluate and split the result into value and gradient.
    pub fn value_and_gradient(&mut self, input: &[f64]) -> Result<(f64, Vec<f64>)> {
        let mut out = vec![0.0; self.program.width()];
        self.evaluate(input, &mut out)?;
        let gradient = out.split_off(1);
        Ok((out[0], gradient))
    }
}

/// Post-order DFS from `top`. Constant operands are skipped; a constant top
/// term still gets its single row.
fn linearize(builder: &TermBuilder, top: TermId) -> Result<Vec<TermId>> {
    let mut order = Vec::new();
    let mut emitted: HashSet<TermId> = HashSet::new();
    let mut entered: HashSet<TermId> = HashSet::new();
    let mut stack = vec![(top, false)];

    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            emitted.insert(id);
            order.push(id);
            continue;
        }
        if emitted.contains(&id) {
            continue;
        }
        if !entered.insert(id) {
            return Err(TermError::malformed(format!("cycle through {id}")));
        }
        stack.push((id, true));
        let ops = builder.kind(id).operands();
        for op in ops.into_iter().rev().flatten() {
            builder.check(op)?;
            if !builder.is_constant(op) && !emitted.contains(&op) {
                stack.push((op, false));
            }
        }
    }
    Ok(order)
}

fn lower(builder: &TermBuilder, kind: &TermKind, rows: &HashMap<TermId, usize>) -> Result<Instruction> {
    let param = |id: TermId| -> Result<Parameter> {
        match builder.constant_value(id) {
            Some(v) => Ok(Parameter::Literal(v)),
            None => rows
                .get(&id)
                .map(|&r| Parameter::Index(r))
                .ok_or_else(|| TermError::malformed(format!("{id} was not linearized"))),
        }
    };
    let unary = |op: Op, a: TermId| -> Result<Instruction> {
        Ok(Instruction {
            op,
            params: [param(a)?, Parameter::Unused],
        })
    };
    let binary = |op: Op, a: TermId, b: TermId| -> Result<Instruction> {
        Ok(Instruction {
            op,
            params: [param(a)?, param(b)?],
        })
    };

    match *kind {
        TermKind::Constant(v) => Ok(Instruction {
            op: Op::Constant,
            params: [Parameter::Literal(v), Parameter::Unused],
        }),
        TermKind::Variable { slot, .. } => Ok(Instruction {
            op: Op::Variable,
            params: [Parameter::Index(slot), Parameter::Unused],
        }),
        TermKind::Sum(a, b) => binary(Op::Sum, a, b),
        TermKind::Product(a, b) => binary(Op::Product, a, b),
        TermKind::ConstPower { base, exponent } => Ok(Instruction {
            op: Op::ConstPower,
            params: [param(base)?, Parameter::Literal(exponent)],
        }),
        TermKind::TermPower { base, exponent } => binary(Op::TermPower, base, exponent),
        TermKind::Abs(a) => unary(Op::Abs, a),
        TermKind::Sin(a) => unary(Op::Sin, a),
        TermKind::Cos(a) => unary(Op::Cos, a),
        TermKind::Exp(a) => unary(Op::Exp, a),
        TermKind::Log(a) => unary(Op::Log, a),
        TermKind::Atan2(a, b) => binary(Op::Atan2, a, b),
        TermKind::Sigmoid {
            arg,
            mid,
            steepness,
        } => binary(Op::Sigmoid { steepness }, arg, mid),
        TermKind::LinSigmoid(a) => unary(Op::LinSigmoid, a),
        TermKind::Min(a, b) => binary(Op::Min, a, b),
        TermKind::Max(a, b) => binary(Op::Max, a, b),
        TermKind::And(a, b) => binary(Op::And, a, b),
        TermKind::Or(a, b) => binary(Op::Or, a, b),
        TermKind::LessThan {
            left,
            right,
            steepness,
            ..
        } => binary(Op::LessThan { steepness }, left, right),
        TermKind::LessEqual {
            left,
            right,
            steepness,
            ..
        } => binary(Op::LessEqual { steepness }, left, right),
        TermKind::Reify {
            condition,
            negated,
            min,
            max,
        } => binary(Op::Reify { min, max }, condition, negated),
        TermKind::ConstraintUtility {
            constraint,
            utility,
        } => binary(Op::ConstraintUtility, constraint, utility),
    }
}
