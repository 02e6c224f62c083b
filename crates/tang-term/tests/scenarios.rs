use tang_term::{BuilderConfig, Tape, TermBuilder, TermError, TermId, TermKind};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tang_term=debug")
        .with_test_writer()
        .try_init();
}

/// Fold, compile into the builder and evaluate at `input`.
fn run(b: &mut TermBuilder, top: TermId, input: &[f64]) -> Vec<f64> {
    init_logging();
    let top = b.aggregate_constants(top).unwrap();
    b.compile(top).unwrap();
    let mut out = vec![0.0; b.variable_count() + 1];
    b.evaluate(input, &mut out).unwrap();
    out
}

fn assert_close(actual: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() < tol,
            "component {i}: got {a}, expected {e} (all: {actual:?})"
        );
    }
}

// --- Concrete values ---

#[test]
fn abs_at_negative() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let t = b.abs(x);
    assert_close(&run(&mut b, t, &[-13.0]), &[13.0, -1.0], 1e-10);
}

#[test]
fn less_than_flat_and_violated() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let y = b.create_variable();
    let t = b.less_than(x, y);
    assert_close(&run(&mut b, t, &[13.0, 37.0]), &[1.0, 0.0, 0.0], 1e-10);
    assert_close(&run(&mut b, t, &[37.0, 13.0]), &[-0.24, -0.01, 0.01], 1e-10);
}

#[test]
fn less_than_equal_flat_and_violated() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let y = b.create_variable();
    let t = b.less_than_equal(x, y);
    assert_close(&run(&mut b, t, &[13.0, 37.0]), &[1.0, 0.0, 0.0], 1e-10);
    assert_close(&run(&mut b, t, &[37.0, 13.0]), &[-0.24, -0.01, 0.01], 1e-10);
    assert_close(&run(&mut b, t, &[5.0, 5.0]), &[1.0, 0.0, 0.0], 1e-10);
}

#[test]
fn const_power_square() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let t = b.const_power(x, 2.0);
    assert_close(&run(&mut b, t, &[13.0]), &[169.0, 26.0], 1e-10);
}

#[test]
fn max_selects_larger() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let y = b.create_variable();
    let t = b.max(x, y);
    assert_close(&run(&mut b, t, &[13.0, 37.0]), &[37.0, 0.0, 1.0], 1e-10);
}

#[test]
fn min_selects_smaller() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let y = b.create_variable();
    let t = b.min(x, y);
    assert_close(&run(&mut b, t, &[13.0, 37.0]), &[13.0, 1.0, 0.0], 1e-10);
}

#[test]
fn atan2_two_variables() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let y = b.create_variable();
    let t = b.atan2(x, y);
    assert_close(
        &run(&mut b, t, &[13.0, 37.0]),
        &[0.337878, -0.024057, 0.008453],
        1e-5,
    );
}

#[test]
fn and_of_satisfied_comparisons() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let y = b.create_variable();
    let zero = b.zero();
    let px = b.gt(x, zero);
    let py = b.gt(y, zero);
    let t = b.and(px, py);
    assert_close(&run(&mut b, t, &[13.0, 37.0]), &[1.0, 0.0, 0.0], 1e-10);
}

#[test]
fn or_of_true_operand() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let y = b.create_variable();
    let t = b.or(x, y);
    assert_close(&run(&mut b, t, &[13.0, 37.0]), &[1.0, 0.0, 0.0], 1e-10);
}

#[test]
fn constraint_utility_when_satisfied() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let y = b.create_variable();
    let c = b.lt(x, 42.0);
    let t = b.constraint_utility(c, y);
    assert_close(&run(&mut b, t, &[13.0, 37.0]), &[37.0, 0.0, 1.0], 1e-10);
}

#[test]
fn constraint_utility_when_violated() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let y = b.create_variable();
    let c = b.lt(x, 42.0);
    let t = b.constraint_utility(c, y);
    // x < 42 violated by 8: 0.01 * (42 - 50)
    assert_close(&run(&mut b, t, &[50.0, 37.0]), &[-0.08, -0.01, 0.0], 1e-10);
}

#[test]
fn unary_functions() {
    let cases: [(fn(&mut TermBuilder, TermId) -> TermId, f64, f64); 4] = [
        (TermBuilder::sin, 0.420167, 0.907447),
        (TermBuilder::cos, 0.907447, -0.420167),
        (TermBuilder::exp, 442413.392009, 442413.392009),
        (TermBuilder::log, 2.564949, 1.0 / 13.0),
    ];
    for (build, value, grad) in cases {
        let mut b = TermBuilder::new();
        let x = b.create_variable();
        let t = build(&mut b, x);
        let out = run(&mut b, t, &[13.0]);
        assert!((out[0] - value).abs() / value.abs() < 1e-6, "{out:?}");
        assert!((out[1] - grad).abs() / grad.abs() < 1e-6, "{out:?}");
    }
}

#[test]
fn lin_sigmoid_at_zero() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let t = b.lin_sigmoid(x);
    assert_close(&run(&mut b, t, &[0.0]), &[0.5, 1.0], 1e-10);
}

#[test]
fn reify_satisfied_condition() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let c = b.gt(x, 3.0);
    let t = b.reify(c).unwrap();
    assert_close(&run(&mut b, t, &[13.0]), &[1.0, 0.01], 1e-10);
}

#[test]
fn reify_violated_condition() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let c = b.gt(x, 3.0);
    let t = b.reify_between(c, -1.0, 1.0).unwrap();
    // 3 < x violated at x = 1: condition row is 0.01 * (1 - 3) with gradient 0.01
    assert_close(&run(&mut b, t, &[1.0]), &[-1.0, 0.01], 1e-10);
}

/// Evaluate `top` as built, without folding.
fn run_unfolded(b: &TermBuilder, top: TermId, input: &[f64]) -> Vec<f64> {
    init_logging();
    let mut tape = Tape::compile(b, top).unwrap();
    let mut out = vec![0.0; b.variable_count() + 1];
    tape.evaluate(input, &mut out).unwrap();
    out
}

#[test]
fn reify_of_false_sentinel_agrees_with_folding() {
    let mut b = TermBuilder::new();
    let _x = b.create_variable();
    let f = b.false_term();
    let r = b.reify(f).unwrap();
    let tape = run_unfolded(&b, r, &[0.0]);
    assert_close(&tape, &[0.0, 0.0], 0.0);
    assert_close(&run(&mut b, r, &[0.0]), &tape, 0.0);
}

#[test]
fn reify_of_condition_collapsing_to_false() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let lt = b.lt(x, 5.0);
    let f = b.false_term();
    let cond = b.and(lt, f);
    let r = b.reify_between(cond, -2.0, 3.0).unwrap();
    let tape = run_unfolded(&b, r, &[0.0]);
    assert_close(&tape, &[-2.0, 0.0], 0.0);
    assert_close(&run(&mut b, r, &[0.0]), &tape, 0.0);
}

#[test]
fn term_power_both_partials() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let y = b.create_variable();
    let t = b.term_power(x, y);
    assert_close(
        &run(&mut b, t, &[13.0, 2.0]),
        &[169.0, 26.0, 433.476441],
        1e-5,
    );
}

#[test]
fn product_with_exponential() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let y = b.create_variable();
    let s = b.add(x, y);
    let d = b.sub(x, y);
    let e = b.exp(d);
    let t = b.mul(s, e);
    assert_close(
        &run(&mut b, t, &[1.0, -2.0]),
        &[-20.0855369231877, 0.0, 40.1710738463753],
        1e-9,
    );
}

#[test]
fn sigmoid_around_midpoint() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let mid = b.constant(2.0);
    let t = b.sigmoid_around(x, mid, 3.0);
    // at the midpoint: 1/2, slope s/4
    assert_close(&run(&mut b, t, &[2.0]), &[0.5, 0.75], 1e-10);
}

// --- Sentinels ---

#[test]
fn sentinel_identity_after_folding() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let y = b.create_variable();
    let x = b.less_than(x, y);
    let (t, f) = (b.true_term(), b.false_term());

    let and_true = b.and(x, t);
    assert_eq!(b.aggregate_constants(and_true).unwrap(), x);
    let and_false = b.and(x, f);
    assert_eq!(b.aggregate_constants(and_false).unwrap(), f);
    let or_true = b.or(x, t);
    assert_eq!(b.aggregate_constants(or_true).unwrap(), t);
    let or_false = b.or(x, f);
    assert_eq!(b.aggregate_constants(or_false).unwrap(), x);
}

#[test]
fn sentinels_compare_by_identity() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let one = b.constant(1.0);
    // a constant 1.0 that is not the true sentinel does not short-circuit
    let n = b.conjoin(x, one);
    assert_ne!(n, x);
    assert!(matches!(b.kind(n), TermKind::Min(..)));
}

// --- Negation ---

#[test]
fn negation_memoized() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let y = b.create_variable();
    let lt = b.less_than(x, y);
    let first = b.negate(lt).unwrap();
    let second = b.negate(lt).unwrap();
    assert_eq!(first, second);
    assert!(matches!(b.kind(first), TermKind::LessEqual { .. }));
}

#[test]
fn reify_shares_memoized_negation() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let y = b.create_variable();
    let lt = b.less_than(x, y);
    let r1 = b.reify(lt).unwrap();
    let r2 = b.reify_between(lt, -1.0, 1.0).unwrap();
    let neg = |k: &TermKind| match *k {
        TermKind::Reify { negated, .. } => negated,
        _ => panic!("not a reify"),
    };
    assert_eq!(neg(b.kind(r1)), neg(b.kind(r2)));
    assert_eq!(neg(b.kind(r1)), b.negate(lt).unwrap());
}

// --- Errors ---

#[test]
fn symbolic_derivative_of_logic_fails() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let y = b.create_variable();
    for t in [
        b.and(x, y),
        b.or(x, y),
        b.min(x, y),
        b.max(x, y),
        b.less_than(x, y),
        b.less_than_equal(x, y),
    ] {
        assert!(matches!(
            b.derivative(t, x),
            Err(TermError::NotDifferentiable { .. })
        ));
    }
}

#[test]
fn compiling_logic_is_fine() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let y = b.create_variable();
    let t = b.max(x, y);
    assert!(b.compile(t).is_ok());
}

#[test]
fn foreign_terms_rejected() {
    let mut a = TermBuilder::new();
    let mut b = TermBuilder::new();
    let x = a.create_variable();
    let _y = b.create_variable();
    assert!(matches!(b.compile(x), Err(TermError::MalformedGraph { .. })));
    assert!(matches!(
        b.aggregate_constants(x),
        Err(TermError::MalformedGraph { .. })
    ));
    assert!(matches!(b.negate(x), Err(TermError::MalformedGraph { .. })));
    assert!(matches!(Tape::compile(&b, x), Err(TermError::MalformedGraph { .. })));
}

#[test]
fn evaluate_dimension_errors() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let y = b.create_variable();
    let t = b.sum(x, y);
    b.compile(t).unwrap();
    let mut out = [0.0; 3];
    assert_eq!(
        b.evaluate(&[1.0], &mut out),
        Err(TermError::DimensionMismatch {
            what: "input",
            expected: 2,
            actual: 1
        })
    );
    let mut short = [0.0; 2];
    assert!(matches!(
        b.evaluate(&[1.0, 2.0], &mut short),
        Err(TermError::DimensionMismatch { what: "output", .. })
    ));
}

#[test]
fn not_compiled() {
    let mut b = TermBuilder::new();
    let _x = b.create_variable();
    let mut out = [0.0; 2];
    assert_eq!(b.evaluate(&[0.0], &mut out), Err(TermError::NotCompiled));
}

// --- Compilation bookkeeping ---

#[test]
fn recompile_replaces_tape() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let s = b.sin(x);
    let c = b.cos(x);

    b.compile(s).unwrap();
    assert_eq!(b.term(s).tape_index(), Some(1));
    assert_eq!(b.term(c).tape_index(), None);

    b.compile(c).unwrap();
    assert_eq!(b.term(s).tape_index(), None);
    assert_eq!(b.term(c).tape_index(), Some(1));

    let mut out = [0.0; 2];
    b.evaluate(&[0.0], &mut out).unwrap();
    assert_close(&out, &[1.0, 0.0], 1e-12);
}

#[test]
fn repeated_evaluation_is_stable() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let y = b.create_variable();
    let p = b.product(x, y);
    let t = b.sin(p);
    b.compile(t).unwrap();
    let mut first = [0.0; 3];
    let mut other = [0.0; 3];
    let mut again = [0.0; 3];
    b.evaluate(&[0.3, 0.7], &mut first).unwrap();
    b.evaluate(&[5.0, -1.0], &mut other).unwrap();
    b.evaluate(&[0.3, 0.7], &mut again).unwrap();
    assert_eq!(first, again);
    assert_ne!(first, other);
}

#[test]
fn two_builders_two_logic_modes() {
    let mut soft = TermBuilder::new();
    let mut crisp = TermBuilder::with_config(BuilderConfig::crisp()).unwrap();

    let (a, b) = (soft.create_variable(), soft.create_variable());
    let s = soft.conjoin(a, b);
    let (c, d) = (crisp.create_variable(), crisp.create_variable());
    let k = crisp.conjoin(c, d);

    // min picks the smaller row; and sums the rows of unsatisfied operands
    assert_close(&run(&mut soft, s, &[0.2, 0.3]), &[0.2, 1.0, 0.0], 1e-12);
    assert_close(&run(&mut crisp, k, &[0.2, 0.3]), &[0.5, 1.0, 1.0], 1e-12);
}

#[test]
fn folding_shrinks_tape() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let two = b.constant(2.0);
    let three = b.constant(3.0);
    let six = b.product(two, three);
    let zero = b.constant(0.0);
    let dead = b.product(zero, x);
    let lhs = b.product(six, x);
    let top = b.sum(lhs, dead);

    let unfolded = Tape::compile(&b, top).unwrap();
    let folded_top = b.aggregate_constants(top).unwrap();
    let folded = Tape::compile(&b, folded_top).unwrap();
    assert!(folded.len() < unfolded.len());
    assert_eq!(folded.len(), 2);
    assert_close(&run(&mut b, folded_top, &[1.5]), &[9.0, 6.0], 1e-12);
}

#[test]
fn display_of_folded_formula() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let one = b.constant(1.0);
    let two = b.constant(2.0);
    let p = b.product(one, x);
    let q = b.const_power(p, 2.0);
    let r = b.sum(q, two);
    let r = b.aggregate_constants(r).unwrap();
    assert_eq!(b.fmt_term(r), "((x0 ^ 2) + 2)");
}

// --- Deep graphs ---

const DEPTH: usize = 20_000;

/// Left-deep `sin(x) + sin(x) + ...`, the shape accumulation loops produce.
fn deep_sum(b: &mut TermBuilder, x: TermId) -> TermId {
    let mut acc = b.zero();
    for _ in 0..DEPTH {
        let s = b.sin(x);
        acc = b.add(acc, s);
    }
    acc
}

#[test]
fn deep_chain_folds_and_compiles() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let zero = b.constant(0.0);
    let top = deep_sum(&mut b, x);
    let top = b.sum(top, zero);
    let folded = b.aggregate_constants(top).unwrap();
    let out = run(&mut b, folded, &[0.5]);
    let n = DEPTH as f64;
    assert_close(&out, &[n * 0.5f64.sin(), n * 0.5f64.cos()], 1e-6);
}

#[test]
fn deep_chain_differentiates_and_prints() {
    let mut b = TermBuilder::new();
    let x = b.create_variable();
    let top = deep_sum(&mut b, x);
    let d = b.derivative(top, x).unwrap();
    let out = run_unfolded(&b, d, &[0.5]);
    assert!((out[0] - DEPTH as f64 * 0.5f64.cos()).abs() < 1e-6);

    let text = b.fmt_term(top);
    assert!(text.starts_with("((((") && text.ends_with("sin(x0))"));
    assert!(b.structurally_equal(top, top));
    let other = deep_sum(&mut b, x);
    assert!(b.structurally_equal(top, other));
}
