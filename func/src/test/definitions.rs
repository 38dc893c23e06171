//! Definition and call-graph tests.

use crate::{Error, Func, RDom, Var, build_environment};
use rill_ir::Expr;

fn xy() -> (Var, Var) {
    (Var::new("x"), Var::new("y"))
}

#[test]
fn define_records_args_and_types() {
    let (x, y) = xy();
    let f = Func::new("def_records");
    f.define_simple([x.clone(), y.clone()], &x + &y).unwrap();
    assert!(f.is_defined());
    assert_eq!(f.args(), vec!["x", "y"]);
}

#[test]
fn double_definition_is_rejected() {
    let x = Var::new("x");
    let f = Func::new("def_twice");
    f.define_simple([x.clone()], x.expr() + 1).unwrap();
    let err = f.define_simple([x.clone()], x.expr() + 2).unwrap_err();
    assert!(matches!(err, Error::AlreadyDefined { .. }));
}

#[test]
fn pure_self_reference_is_rejected() {
    let x = Var::new("x");
    let f = Func::new("def_self");
    // A pure definition may not call the function being defined; only
    // updates may. Build the self-call by name since at() requires a
    // defined function.
    let self_call =
        Expr::call(rill_ir::Type::int32(), f.name(), vec![x.expr()], rill_ir::CallType::Function);
    let err = f.define_simple([x.clone()], self_call).unwrap_err();
    assert!(matches!(err, Error::CyclicGraph { .. }));
}

#[test]
fn update_requires_known_lhs_vars() {
    let x = Var::new("x");
    let f = Func::new("upd_vars");
    f.define_simple([x.clone()], Expr::int(0)).unwrap();
    let err = f
        .update(vec![Expr::var("stranger")], vec![Expr::int(1)], None)
        .unwrap_err();
    assert!(matches!(err, Error::UnknownUpdateVariable { .. }));
}

#[test]
fn update_accepts_rdom_vars() {
    let x = Var::new("x");
    let hist = Func::new("upd_rdom");
    hist.define_simple([x.clone()], Expr::int(0)).unwrap();
    let r = RDom::single("r", Expr::int(0), Expr::int(100));
    hist.update(
        vec![r.x().expr() % 16],
        vec![hist.at([r.x().expr() % 16]) + 1],
        Some(&r),
    )
    .unwrap();
    assert_eq!(hist.num_updates(), 1);
}

#[test]
fn environment_orders_producers_first() {
    let (x, y) = xy();
    let a = Func::new("env_a");
    a.define_simple([x.clone(), y.clone()], &x + &y).unwrap();
    let b = Func::new("env_b");
    b.define_simple([x.clone(), y.clone()], a.at([x.expr(), y.expr()]) * 2).unwrap();
    let c = Func::new("env_c");
    c.define_simple([x.clone(), y.clone()], b.at([x.expr(), y.expr()]) + a.at([x.expr(), y.expr()])).unwrap();

    let env = build_environment(&[c.clone()]).unwrap();
    let pos = |n: &str| env.order.iter().position(|o| o == n).unwrap();
    assert!(pos("env_a") < pos("env_b"));
    assert!(pos("env_b") < pos("env_c"));
    assert_eq!(env.outputs, vec!["env_c"]);
    assert_eq!(env.functions.len(), 3);
}

#[test]
fn freezing_blocks_further_mutation() {
    let x = Var::new("x");
    let f = Func::new("frozen_f");
    f.define_simple([x.clone()], x.expr() + 1).unwrap();
    build_environment(&[f.clone()]).unwrap();
    let err = f.parallel(&x).unwrap_err();
    assert!(matches!(err, Error::Frozen { .. }));
}

#[test]
fn names_uniquify() {
    let a = Func::new("dup_name");
    let b = Func::new("dup_name");
    assert_ne!(a.name(), b.name());
}
