//! Logical negation.

use tracing::trace;

use crate::builder::TermBuilder;
use crate::config::LogicMode;
use crate::error::{Result, TermError};
use crate::term::{TermId, TermKind};

impl TermBuilder {
    /// Logical complement of `term`.
    ///
    /// `a < b` and `a <= b` negate to `b <= a` and `b < a`. The counterpart is
    /// allocated once and linked from both sides, so negating either node
    /// again returns the existing one. AND/OR and MIN/MAX follow De Morgan.
    /// Anything else becomes `true - term`.
    pub fn negate(&mut self, term: TermId) -> Result<TermId> {
        self.check(term)?;
        let (truth, falsity) = (self.true_term(), self.false_term());
        if term == truth {
            return Ok(falsity);
        }
        if term == falsity {
            return Ok(truth);
        }

        let kind = self.kind(term).clone();
        let negated = match kind {
            TermKind::LessThan {
                negation: Some(n), ..
            }
            | TermKind::LessEqual {
                negation: Some(n), ..
            } => return Ok(n),

            TermKind::LessThan {
                left,
                right,
                steepness,
                negation: None,
            } => {
                let n = self.less_than_equal_with(right, left, steepness);
                self.link_negations(term, n);
                n
            }
            TermKind::LessEqual {
                left,
                right,
                steepness,
                negation: None,
            } => {
                let n = self.less_than_with(right, left, steepness);
                self.link_negations(term, n);
                n
            }

            TermKind::And(a, b) => {
                let (na, nb) = (self.negate(a)?, self.negate(b)?);
                self.disjoin_in(LogicMode::Crisp, na, nb)
            }
            TermKind::Min(a, b) => {
                let (na, nb) = (self.negate(a)?, self.negate(b)?);
                self.disjoin_in(LogicMode::Soft, na, nb)
            }
            TermKind::Or(a, b) => {
                let (na, nb) = (self.negate(a)?, self.negate(b)?);
                self.conjoin_in(LogicMode::Crisp, na, nb)
            }
            TermKind::Max(a, b) => {
                let (na, nb) = (self.negate(a)?, self.negate(b)?);
                self.conjoin_in(LogicMode::Soft, na, nb)
            }

            TermKind::ConstraintUtility { .. } => {
                return Err(TermError::NotNegatable {
                    kind: kind.name(),
                })
            }

            _ => self.sub(truth, term),
        };

        trace!(term = %term, negated = %negated, "negated");
        Ok(negated)
    }

    /// Record `a` and `b` as each other's negation.
    fn link_negations(&mut self, a: TermId, b: TermId) {
        for (id, other) in [(a, b), (b, a)] {
            let mut kind = self.kind(id).clone();
            if let TermKind::LessThan { negation, .. } | TermKind::LessEqual { negation, .. } =
                &mut kind
            {
                *negation = Some(other);
            }
            self.set_kind(id, kind);
        }
    }
}
