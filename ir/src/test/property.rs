//! Property tests: simplifier laws and interval soundness.

use proptest::prelude::*;

use crate::interval::{ConstantInterval, bounds_of_expr};
use crate::simplify::simplify;
use crate::substitute::substitute;
use crate::{BinaryOp, Expr};

/// Small integer expressions over one free variable `x`.
fn arb_expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![(-20i64..20).prop_map(Expr::int), Just(Expr::var("x")),];
    leaf.prop_recursive(3, 24, 2, |inner| {
        (inner.clone(), inner, prop_oneof![
            Just(BinaryOp::Add),
            Just(BinaryOp::Sub),
            Just(BinaryOp::Mul),
            Just(BinaryOp::Min),
            Just(BinaryOp::Max),
        ])
            .prop_map(|(a, b, op)| Expr::binary(op, a, b))
    })
}

/// Evaluate a closed integer expression by substituting and folding.
fn eval_at(e: &Expr, x: i64) -> Option<i64> {
    let closed = substitute(e, "x", &Expr::int(x));
    simplify(&closed).as_const_i64()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// simplify(simplify(e)) == simplify(e).
    #[test]
    fn simplify_is_idempotent(e in arb_expr()) {
        let once = simplify(&e);
        let twice = simplify(&once);
        prop_assert_eq!(once, twice);
    }

    /// Simplification preserves the value at sample points.
    #[test]
    fn simplify_preserves_value(e in arb_expr(), x in -10i64..10) {
        let before = eval_at(&e, x);
        let after = eval_at(&simplify(&e), x);
        // Overflow makes folding decline; only compare when both fold.
        if let (Some(a), Some(b)) = (before, after) {
            prop_assert_eq!(a, b);
        }
    }

    /// Any value the expression can take lies inside its computed bounds.
    #[test]
    fn interval_bounds_are_sound(e in arb_expr(), x in 0i64..8) {
        let interval = bounds_of_expr(&e, &|name| {
            (name == "x").then_some(ConstantInterval::bounded(0, 7))
        });
        if let Some(v) = eval_at(&e, x) {
            prop_assert!(interval.contains(v as i128),
                "{} = {} at x={} escapes {:?}", e, v, x, interval);
        }
    }

    /// Structural equality is reflexive through re-interning.
    #[test]
    fn reinterning_is_stable(e in arb_expr()) {
        let rebuilt = e.with_children(&e.children());
        prop_assert!(rebuilt.same(&e));
    }
}
