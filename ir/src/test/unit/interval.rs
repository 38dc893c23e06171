//! Constant interval arithmetic tests.

use test_case::test_case;

use crate::interval::{ConstantInterval, bounds_of_closed_expr, bounds_of_expr, compare_intervals};
use crate::{BinaryOp, Expr};

fn b(min: i128, max: i128) -> ConstantInterval {
    ConstantInterval::bounded(min, max)
}

#[test]
fn add_sub_shift_endpoints() {
    assert_eq!(b(0, 4).add(&b(1, 2)), b(1, 6));
    assert_eq!(b(0, 4).sub(&b(1, 2)), b(-2, 3));
    assert_eq!(b(0, 4).add(&ConstantInterval::everything()), ConstantInterval::everything());
}

#[test_case(b(-2, 3), b(4, 5), b(-10, 15); "mixed signs")]
#[test_case(b(2, 3), b(-5, -4), b(-15, -8); "negative rhs")]
#[test_case(b(0, 0), ConstantInterval::everything(), b(0, 0); "zero absorbs unbounded")]
fn mul_takes_corner_extremes(a: ConstantInterval, c: ConstantInterval, expect: ConstantInterval) {
    assert_eq!(a.mul(&c), expect);
}

#[test]
fn div_requires_nonzero_divisor() {
    assert_eq!(b(0, 10).div(&b(2, 2)), b(0, 5));
    assert_eq!(b(-7, 7).div(&b(2, 2)), b(-4, 3));
    assert_eq!(b(0, 10).div(&b(-1, 1)), ConstantInterval::everything());
}

#[test]
fn modulo_with_positive_divisor() {
    assert_eq!(b(-100, 100).modulo(&b(8, 8)), b(0, 7));
    // Already in range: unchanged.
    assert_eq!(b(2, 5).modulo(&b(8, 8)), b(2, 5));
}

#[test]
fn union_and_intersect() {
    assert_eq!(b(0, 4).union(&b(2, 9)), b(0, 9));
    assert_eq!(b(0, 4).intersect(&b(2, 9)), b(2, 4));
    assert_eq!(b(0, 4).union(&ConstantInterval::at_least(1)).min, Some(0));
    assert_eq!(b(0, 4).union(&ConstantInterval::at_least(1)).max, None);
}

#[test]
fn interval_comparisons() {
    assert_eq!(compare_intervals(BinaryOp::Lt, &b(0, 3), &b(4, 9)), Some(true));
    assert_eq!(compare_intervals(BinaryOp::Lt, &b(4, 9), &b(0, 3)), Some(false));
    assert_eq!(compare_intervals(BinaryOp::Lt, &b(0, 5), &b(3, 9)), None);
    assert_eq!(compare_intervals(BinaryOp::Eq, &b(2, 2), &b(2, 2)), Some(true));
    assert_eq!(compare_intervals(BinaryOp::Ne, &b(0, 1), &b(5, 6)), Some(true));
}

#[test]
fn expr_bounds_compose() {
    let lookup = |name: &str| (name == "x").then_some(b(0, 9));
    let e = Expr::var("x") * 2 + 5;
    assert_eq!(bounds_of_expr(&e, &lookup), b(5, 23));

    let m = Expr::min(Expr::var("x"), Expr::int(4));
    assert_eq!(bounds_of_expr(&m, &lookup), b(0, 4));

    let r = Expr::ramp(Expr::var("x"), Expr::int(1), 4);
    assert_eq!(bounds_of_expr(&r, &lookup), b(0, 12));
}

#[test]
fn unknown_vars_are_unbounded() {
    assert_eq!(bounds_of_closed_expr(&Expr::var("mystery")), ConstantInterval::everything());
    assert_eq!(bounds_of_closed_expr(&Expr::int(3)), ConstantInterval::single(3));
}
