//! Pretty-printing for terms.

use crate::builder::TermBuilder;
use crate::term::{TermId, TermKind};

/// Output fragment: literal text, or a term still to be laid out.
enum Piece {
    Text(String),
    Term(TermId),
}

fn text(s: impl Into<String>) -> Piece {
    Piece::Text(s.into())
}

fn infix(a: TermId, op: &str, b: TermId) -> Vec<Piece> {
    vec![
        text("("),
        Piece::Term(a),
        text(format!(" {op} ")),
        Piece::Term(b),
        text(")"),
    ]
}

fn call(name: &str, args: &[TermId], tail: String) -> Vec<Piece> {
    let mut out = vec![text(format!("{name}("))];
    for (i, &a) in args.iter().enumerate() {
        if i > 0 {
            out.push(text(", "));
        }
        out.push(Piece::Term(a));
    }
    out.push(text(tail + ")"));
    out
}

impl TermBuilder {
    /// Format a term as a human-readable string. Sentinels print as `true` /
    /// `false`, variables as `x{slot}`.
    pub fn fmt_term(&self, term: TermId) -> String {
        let mut out = String::new();
        let mut stack = vec![Piece::Term(term)];
        while let Some(piece) = stack.pop() {
            match piece {
                Piece::Text(s) => out.push_str(&s),
                Piece::Term(id) => stack.extend(self.layout(id).into_iter().rev()),
            }
        }
        out
    }

    fn layout(&self, term: TermId) -> Vec<Piece> {
        if term == self.true_term() {
            return vec![text("true")];
        }
        if term == self.false_term() {
            return vec![text("false")];
        }
        let none = String::new;
        match *self.kind(term) {
            TermKind::Constant(v) => vec![text(format!("{v}"))],
            TermKind::Variable { slot, .. } => vec![text(format!("x{slot}"))],
            TermKind::Sum(a, b) => infix(a, "+", b),
            TermKind::Product(a, b) => infix(a, "*", b),
            TermKind::ConstPower { base, exponent } => {
                vec![text("("), Piece::Term(base), text(format!(" ^ {exponent})"))]
            }
            TermKind::TermPower { base, exponent } => infix(base, "^", exponent),
            TermKind::Abs(a) => call("abs", &[a], none()),
            TermKind::Sin(a) => call("sin", &[a], none()),
            TermKind::Cos(a) => call("cos", &[a], none()),
            TermKind::Exp(a) => call("exp", &[a], none()),
            TermKind::Log(a) => call("log", &[a], none()),
            TermKind::Atan2(l, r) => call("atan2", &[l, r], none()),
            TermKind::Sigmoid {
                arg,
                mid,
                steepness,
            } => call("sigmoid", &[arg, mid], format!(", {steepness}")),
            TermKind::LinSigmoid(a) => call("linSigmoid", &[a], none()),
            TermKind::Min(a, b) => call("min", &[a, b], none()),
            TermKind::Max(a, b) => call("max", &[a, b], none()),
            TermKind::And(a, b) => infix(a, "&", b),
            TermKind::Or(a, b) => infix(a, "|", b),
            TermKind::LessThan { left, right, .. } => infix(left, "<", right),
            TermKind::LessEqual { left, right, .. } => infix(left, "<=", right),
            TermKind::Reify {
                condition, min, max, ..
            } => call("reify", &[condition], format!(", {min}, {max}")),
            TermKind::ConstraintUtility {
                constraint,
                utility,
            } => call("constraintUtility", &[constraint, utility], none()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::TermBuilder;

    #[test]
    fn display_simple() {
        let mut b = TermBuilder::new();
        let x = b.create_variable();
        let y = b.create_variable();
        let sum = b.sum(x, y);
        assert_eq!(b.fmt_term(sum), "(x0 + x1)");

        let prod = b.product(x, y);
        assert_eq!(b.fmt_term(prod), "(x0 * x1)");

        let s = b.sin(x);
        assert_eq!(b.fmt_term(s), "sin(x0)");

        let p = b.const_power(y, 2.0);
        assert_eq!(b.fmt_term(p), "(x1 ^ 2)");
    }

    #[test]
    fn display_logic() {
        let mut b = TermBuilder::new();
        let x = b.create_variable();
        let y = b.create_variable();
        let lt = b.less_than(x, y);
        let t = b.true_term();
        let and = b.and(lt, t);
        assert_eq!(b.fmt_term(and), "((x0 < x1) & true)");
        let r = b.reify(lt).unwrap();
        assert_eq!(b.fmt_term(r), "reify((x0 < x1), 0, 1)");
    }

    #[test]
    fn display_constants() {
        let mut b = TermBuilder::new();
        assert_eq!(b.fmt_term(b.zero()), "0");
        assert_eq!(b.fmt_term(b.false_term()), "false");
        let c = b.constant(-1.5);
        assert_eq!(b.fmt_term(c), "-1.5");
    }

    #[test]
    fn display_calls() {
        let mut b = TermBuilder::new();
        let x = b.create_variable();
        let s = b.sigmoid(x, 2.0);
        assert_eq!(b.fmt_term(s), "sigmoid(x0, 0, 2)");
        let a = b.atan2(x, s);
        let m = b.max(a, x);
        assert_eq!(b.fmt_term(m), "max(atan2(x0, sigmoid(x0, 0, 2)), x0)");
    }
}
