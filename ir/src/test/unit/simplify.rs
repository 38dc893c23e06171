//! Simplifier tests: rule families, context narrowing, statements.

use crate::interval::ConstantInterval;
use crate::simplify::{SimplifyCtx, VarInfo, simplify, simplify_in, simplify_stmt};
use crate::{Expr, ForKind, Stmt};

fn x() -> Expr {
    Expr::var("x")
}

#[test]
fn constant_folding() {
    assert_eq!(simplify(&((Expr::int(2) + 3) * 4)), Expr::int(20));
    assert_eq!(simplify(&Expr::min(Expr::int(3), Expr::int(7))), Expr::int(3));
    assert_eq!(simplify(&Expr::cmp_lt(Expr::int(3), Expr::int(7))), Expr::bool_(true));
}

#[test]
fn additive_identities() {
    assert_eq!(simplify(&(x() + 0)), x());
    assert_eq!(simplify(&(Expr::int(0) + x())), x());
    assert_eq!(simplify(&(x() - 0)), x());
    assert_eq!(simplify(&(x() - x())), Expr::int(0));
}

#[test]
fn multiplicative_identities() {
    assert_eq!(simplify(&(x() * 1)), x());
    assert_eq!(simplify(&(x() * 0)), Expr::int(0));
    assert_eq!(simplify(&(x() / 1)), x());
    assert_eq!(simplify(&(x() % 1)), Expr::int(0));
}

#[test]
fn min_max_with_self() {
    assert_eq!(simplify(&Expr::min(x(), x())), x());
    assert_eq!(simplify(&Expr::max(x(), x())), x());
}

#[test]
fn select_folds() {
    let t = Expr::f32(1.0);
    let f = Expr::f32(2.0);
    assert_eq!(simplify(&Expr::select(Expr::bool_(true), t.clone(), f.clone())), t.clone());
    assert_eq!(simplify(&Expr::select(Expr::bool_(false), t.clone(), f.clone())), f);
    assert_eq!(simplify(&Expr::select(Expr::cmp_lt(x(), Expr::int(3)), t.clone(), t.clone())), t);
}

#[test]
fn constants_collapse_across_adds() {
    // ((x + 1) + 2) -> x + 3
    assert_eq!(simplify(&((x() + 1) + 2)), x() + 3);
    // ((x * 2) * 3) -> x * 6
    assert_eq!(simplify(&((x() * 2) * 3)), x() * 6);
    // (x - 5) -> x + -5, so adds and subs share a normal form
    assert_eq!(simplify(&((x() - 5) + 2)), x() + -3);
}

#[test]
fn gt_ge_normalize_away() {
    let gt = simplify(&Expr::cmp_gt(x(), Expr::var("y")));
    assert_eq!(gt, Expr::cmp_lt(Expr::var("y"), x()));
    let ge = simplify(&Expr::cmp_ge(x(), Expr::var("y")));
    assert_eq!(ge, Expr::cmp_le(Expr::var("y"), x()));
}

#[test]
fn commutative_constants_move_right() {
    assert_eq!(simplify(&(Expr::int(3) * x())), x() * 3);
    assert_eq!(simplify(&Expr::min(Expr::int(3), x())), Expr::min(x(), Expr::int(3)));
}

#[test]
fn context_narrows_comparisons() {
    let mut ctx = SimplifyCtx::new();
    ctx.push_var("x", VarInfo { interval: ConstantInterval::bounded(0, 7), equals: None });
    assert_eq!(simplify_in(&Expr::cmp_lt(x(), Expr::int(8)), &mut ctx), Expr::bool_(true));
    assert_eq!(simplify_in(&Expr::cmp_lt(x(), Expr::int(0)), &mut ctx), Expr::bool_(false));
    // Not provable either way: stays symbolic.
    assert_eq!(simplify_in(&Expr::cmp_lt(x(), Expr::int(4)), &mut ctx), Expr::cmp_lt(x(), Expr::int(4)));
}

#[test]
fn split_indexing_collapses() {
    // (xo * 8 + xi) / 8 -> xo and (xo * 8 + xi) % 8 -> xi given xi in [0, 8).
    let mut ctx = SimplifyCtx::new();
    ctx.push_var("xi", VarInfo { interval: ConstantInterval::bounded(0, 7), equals: None });
    let combined = Expr::var("xo") * 8 + Expr::var("xi");
    assert_eq!(simplify_in(&(combined.clone() / 8), &mut ctx), Expr::var("xo"));
    assert_eq!(simplify_in(&(combined % 8), &mut ctx), Expr::var("xi"));
}

#[test]
fn trivial_lets_inline() {
    let e = Expr::let_("t", Expr::int(5), Expr::var("t") + x());
    assert_eq!(simplify(&e), x() + 5);

    // Dead let disappears.
    let dead = Expr::let_("t", x() * 2, Expr::int(3));
    assert_eq!(simplify(&dead), Expr::int(3));

    // Single-use non-trivial value inlines.
    let single = Expr::let_("t", x() * 2, Expr::var("t") + 1);
    assert_eq!(simplify(&single), x() * 2 + 1);
}

#[test]
fn float_identities_respect_ieee() {
    let fx = Expr::var_typed("f", rill_dtype::Type::float32());
    // x * 1.0 is exact.
    assert_eq!(simplify(&(fx.clone() * 1.0f32)), fx.clone());
    // x + 0.0 is not (negative zero), so it only fires under fast-math.
    let sum = fx.clone() + 0.0f32;
    assert_eq!(simplify(&sum), sum);
    let mut fast = SimplifyCtx::with_fast_math();
    assert_eq!(simplify_in(&sum, &mut fast), fx);
}

#[test]
fn broadcast_algebra() {
    let a = Expr::broadcast(x(), 4);
    let b = Expr::broadcast(Expr::var("y"), 4);
    // Compare against the simplified spelling: commutative ordering may
    // canonicalize the inner operand order either way.
    assert_eq!(simplify(&(a + b)), simplify(&Expr::broadcast(x() + Expr::var("y"), 4)));

    let r = Expr::ramp(x(), Expr::int(1), 4);
    let c = Expr::broadcast(Expr::int(3), 4);
    assert_eq!(simplify(&(r + c)), Expr::ramp(x() + 3, Expr::int(1), 4));
}

#[test]
fn idempotence_on_assorted_exprs() {
    let samples = [
        (x() + 0) * (Expr::int(2) + 3),
        Expr::min(x() + 1, x() + 1),
        Expr::select(Expr::cmp_lt(x(), Expr::int(3)), x() + 2, x() * 2),
        Expr::let_("t", x() * 3, Expr::var("t") + Expr::var("t")),
        ((x() * 8 + Expr::var("y")) / 8) + (Expr::int(7) % 3),
    ];
    for e in samples {
        let once = simplify(&e);
        let twice = simplify(&once);
        assert_eq!(once, twice, "simplify not idempotent on {e}");
    }
}

// =========================================================================
// Statement simplification
// =========================================================================

#[test]
fn zero_extent_loop_disappears() {
    let body = Stmt::store("f", x(), Expr::f32(1.0), None);
    let s = Stmt::for_("x", Expr::int(0), Expr::int(0), ForKind::Serial, body);
    assert!(simplify_stmt(&s).is_no_op());
}

#[test]
fn constant_condition_if_collapses() {
    let store = Stmt::store("f", Expr::int(0), Expr::f32(1.0), None);
    let taken = Stmt::if_then_else(Expr::bool_(true), store.clone(), None);
    assert_eq!(simplify_stmt(&taken), store);

    let skipped = Stmt::if_then_else(Expr::bool_(false), store, None);
    assert!(simplify_stmt(&skipped).is_no_op());
}

#[test]
fn loop_var_bounds_reach_body() {
    // for x in [0, 8): guard (x < 8) is provably true and folds away.
    let guard = Expr::cmp_lt(x(), Expr::int(8));
    let body = Stmt::if_then_else(guard, Stmt::store("f", x(), Expr::f32(1.0), None), None);
    let s = Stmt::for_("x", Expr::int(0), Expr::int(8), ForKind::Serial, body);
    let simplified = simplify_stmt(&s);
    let expected = Stmt::for_(
        "x",
        Expr::int(0),
        Expr::int(8),
        ForKind::Serial,
        Stmt::store("f", x(), Expr::f32(1.0), None),
    );
    assert_eq!(simplified, expected);
}

#[test]
fn trivial_let_stmt_substitutes() {
    let body = Stmt::store("f", Expr::var("t"), Expr::f32(1.0), None);
    let s = Stmt::let_stmt("t", Expr::int(3), body);
    assert_eq!(simplify_stmt(&s), Stmt::store("f", Expr::int(3), Expr::f32(1.0), None));
}

#[test]
fn true_store_predicate_drops() {
    let s = Stmt::store("f", x(), Expr::f32(1.0), Some(Expr::bool_(true)));
    assert_eq!(simplify_stmt(&s), Stmt::store("f", x(), Expr::f32(1.0), None));

    let never = Stmt::store("f", x(), Expr::f32(1.0), Some(Expr::bool_(false)));
    assert!(simplify_stmt(&never).is_no_op());
}
