//! tang-term — soft-constraint term graphs with a forward-mode gradient tape.
//!
//! Terms live in a [`TermBuilder`] arena and are referred to by copyable
//! [`TermId`] handles. A formula is folded with
//! [`aggregate_constants`](TermBuilder::aggregate_constants), linearized into a
//! [`Tape`], and then evaluated many times: each evaluation writes the value
//! and the full gradient in a single forward pass.
//!
//! # Quick start
//!
//! ```
//! use tang_term::{trace, TermId, Tape};
//!
//! let (mut b, f) = trace(|| {
//!     let x = TermId::var();
//!     let y = TermId::var();
//!     (x + y) * (x - y).exp()
//! });
//!
//! let f = b.aggregate_constants(f).unwrap();
//! b.compile(f).unwrap();
//!
//! let mut out = [0.0; 3];
//! b.evaluate(&[1.0, -2.0], &mut out).unwrap();
//! assert!((out[0] + 20.0855369231877).abs() < 1e-9);
//! assert!((out[2] - 40.1710738463753).abs() < 1e-9);
//!
//! // Or keep a standalone tape next to the builder.
//! let mut tape = Tape::compile(&b, f).unwrap();
//! let (value, grad) = tape.value_and_gradient(&[1.0, -2.0]).unwrap();
//! assert_eq!(grad.len(), 2);
//! # let _ = value;
//! ```

pub mod builder;
pub mod compose;
pub mod config;
pub mod diff;
pub mod display;
pub mod error;
mod eval;
pub mod fold;
pub mod negate;
mod ops;
pub mod tape;
pub mod term;

pub use builder::{IntoTerm, TermBuilder};
pub use config::{BuilderConfig, LogicMode};
pub use error::{Result, TermError};
pub use tape::{Instruction, Op, Parameter, Program, Scratch, Tape, MAX_ARITY};
pub use term::{Term, TermId, TermKind};

use std::cell::RefCell;

thread_local! {
    static BUILDER: RefCell<TermBuilder> = RefCell::new(TermBuilder::new());
}

/// Access the thread-local builder.
pub fn with_builder<F, R>(f: F) -> R
where
    F: FnOnce(&mut TermBuilder) -> R,
{
    BUILDER.with(|b| f(&mut b.borrow_mut()))
}

/// Run a closure against a fresh default builder, returning the builder and
/// the result.
///
/// Installs a new builder, runs `f` (which builds terms through `TermId`
/// operators), then extracts the builder and restores the previous one.
pub fn trace<F, R>(f: F) -> (TermBuilder, R)
where
    F: FnOnce() -> R,
{
    install(TermBuilder::new(), f)
}

/// Like [`trace`], with an explicit configuration.
pub fn trace_with<F, R>(config: BuilderConfig, f: F) -> Result<(TermBuilder, R)>
where
    F: FnOnce() -> R,
{
    Ok(install(TermBuilder::with_config(config)?, f))
}

fn install<F, R>(fresh: TermBuilder, f: F) -> (TermBuilder, R)
where
    F: FnOnce() -> R,
{
    BUILDER.with(|b| {
        let old = std::mem::replace(&mut *b.borrow_mut(), fresh);
        let result = f();
        let builder = std::mem::replace(&mut *b.borrow_mut(), old);
        (builder, result)
    })
}
