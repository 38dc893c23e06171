//! Symbolic bounds inference tests.

use std::collections::HashMap;

use rill_func::Environment;
use rill_ir::{CallType, Expr, ForKind, Stmt, Type};

use crate::bounds::{
    Interval, Monotonic, Scope, bounds_of_expr_in_scope, boxes_provided, boxes_required,
    is_monotonic,
};

fn empty_env() -> Environment {
    Environment { functions: HashMap::new(), order: Vec::new(), outputs: Vec::new() }
}

fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::call(Type::float32(), name, args, CallType::Function)
}

#[test]
fn intervals_shift_through_arithmetic() {
    let env = empty_env();
    let mut scope = Scope::new();
    scope.push("x", Interval::bounded(Expr::int(0), Expr::int(9)));

    let i = bounds_of_expr_in_scope(&(Expr::var("x") * 2 + 5), &scope, &env);
    assert_eq!(i.min.map(|e| rill_ir::simplify(&e)), Some(Expr::int(5)));
    assert_eq!(i.max.map(|e| rill_ir::simplify(&e)), Some(Expr::int(23)));
}

#[test]
fn unknown_vars_are_symbolic_points() {
    let env = empty_env();
    let scope = Scope::new();
    // An outer loop variable is a point: the region becomes a function
    // of it.
    let i = bounds_of_expr_in_scope(&(Expr::var("t") + 1), &scope, &env);
    assert_eq!(i.min, Some(Expr::var("t") + 1));
    assert_eq!(i.max, Some(Expr::var("t") + 1));
}

#[test]
fn mod_by_positive_constant_is_bounded() {
    let env = empty_env();
    let scope = Scope::new();
    let i = bounds_of_expr_in_scope(&(Expr::var("anything") % 256), &scope, &env);
    assert_eq!(i.min, Some(Expr::int(0)));
    assert_eq!(i.max, Some(Expr::int(255)));
}

#[test]
fn boxes_union_across_call_sites() {
    // for (x, 0, 10) { out(x) = f(x - 1) + f(x + 1) }
    let env = empty_env();
    let value = Expr::add(
        call("f", vec![Expr::var("x") - 1]),
        call("f", vec![Expr::var("x") + 1]),
    );
    let body = Stmt::provide("out", vec![Expr::var("x")], vec![value], None);
    let loop_ = Stmt::for_("x", Expr::int(0), Expr::int(10), ForKind::Serial, body);

    let region = boxes_required(&loop_, "f", &env).expect("f is read");
    assert_eq!(region.len(), 1);
    assert_eq!(region[0].min, Some(Expr::int(-1)));
    assert_eq!(region[0].max, Some(Expr::int(10)));

    let writes = boxes_provided(&loop_, "out", &env).expect("out is written");
    assert_eq!(writes[0].min, Some(Expr::int(0)));
    assert_eq!(writes[0].max, Some(Expr::int(9)));
}

#[test]
fn boxes_see_through_lets_and_guards() {
    // for (x, 0, 8) { if (x < 4) { let t = x * 2; out(x) = f(t) } }
    let env = empty_env();
    let body = Stmt::if_then_else(
        Expr::cmp_lt(Expr::var("x"), Expr::int(4)),
        Stmt::let_stmt(
            "t",
            Expr::var("x") * 2,
            Stmt::provide("out", vec![Expr::var("x")], vec![call("f", vec![Expr::var("t")])], None),
        ),
        None,
    );
    let loop_ = Stmt::for_("x", Expr::int(0), Expr::int(8), ForKind::Serial, body);

    let region = boxes_required(&loop_, "f", &env).expect("f is read");
    // The guard narrows x to [0, 3], so t = 2x covers [0, 6].
    assert_eq!(region[0].min, Some(Expr::int(0)));
    assert_eq!(region[0].max, Some(Expr::int(6)));
}

#[test]
fn unbounded_reads_stay_unbounded() {
    let env = empty_env();
    let index = Expr::load(Type::int32(), "idx", Expr::var("x"), None);
    let body = Stmt::provide("out", vec![Expr::var("x")], vec![call("f", vec![index])], None);
    let loop_ = Stmt::for_("x", Expr::int(0), Expr::int(10), ForKind::Serial, body);

    let region = boxes_required(&loop_, "f", &env).expect("f is read");
    assert!(!region[0].is_bounded());
}

#[test]
fn monotonic_classification() {
    let t = || Expr::var("t");
    assert_eq!(is_monotonic(&(t() + 5), "t"), Monotonic::Increasing);
    assert_eq!(is_monotonic(&(t() * 3), "t"), Monotonic::Increasing);
    assert_eq!(is_monotonic(&(t() * -1), "t"), Monotonic::Decreasing);
    assert_eq!(is_monotonic(&(Expr::int(7) - t()), "t"), Monotonic::Decreasing);
    assert_eq!(is_monotonic(&Expr::var("other"), "t"), Monotonic::Constant);
    assert_eq!(is_monotonic(&Expr::min(t(), Expr::int(4)), "t"), Monotonic::Increasing);
    assert_eq!(is_monotonic(&(t() % 3), "t"), Monotonic::Unknown);
    assert_eq!(is_monotonic(&(t() / 2), "t"), Monotonic::Increasing);
}

#[test]
fn interval_union_keeps_extremes() {
    let a = Interval::bounded(Expr::int(2), Expr::int(5));
    let b = Interval::bounded(Expr::int(0), Expr::int(3));
    let u = a.union(&b);
    assert_eq!(u.min.map(|e| rill_ir::simplify(&e)), Some(Expr::int(0)));
    assert_eq!(u.max.map(|e| rill_ir::simplify(&e)), Some(Expr::int(5)));

    let open = Interval::everything().union(&a);
    assert!(!open.is_bounded());
}
