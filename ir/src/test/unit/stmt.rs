//! Statement tree construction and traversal tests.

use crate::analysis::{buffers_touched, free_vars, is_pure};
use crate::mutator::{Mutator, mutate_stmt_children};
use crate::substitute::{substitute, substitute_stmt};
use crate::{Expr, ExprNode, ForKind, Stmt};

#[test]
fn block_flattens_and_drops_no_ops() {
    let a = Stmt::store("f", Expr::int(0), Expr::f32(1.0), None);
    let b = Stmt::store("f", Expr::int(1), Expr::f32(2.0), None);
    let nested = Stmt::block(vec![a.clone(), Stmt::no_op(), Stmt::block(vec![b.clone()])]);
    match nested.node() {
        crate::StmtNode::Block { stmts } => assert_eq!(stmts.len(), 2),
        other => panic!("expected block, got {other:?}"),
    }

    // A block of one statement is that statement.
    assert_eq!(Stmt::block(vec![a.clone()]), a);
    assert!(Stmt::block(vec![]).is_no_op());
}

#[test]
fn no_op_mutation_preserves_identity() {
    struct Nothing;
    impl Mutator for Nothing {}

    let s = Stmt::for_(
        "x",
        Expr::int(0),
        Expr::int(4),
        ForKind::Serial,
        Stmt::store("f", Expr::var("x"), Expr::var("x") + 1, None),
    );
    let out = mutate_stmt_children(&mut Nothing, &s);
    assert!(out.same(&s));
}

#[test]
fn mutators_rebuild_only_changed_paths() {
    struct RenameX;
    impl Mutator for RenameX {
        fn mutate_expr(&mut self, e: &Expr) -> Expr {
            if let ExprNode::Var(n) = e.node()
                && n == "x"
            {
                return Expr::var("y");
            }
            crate::mutator::mutate_expr_children(self, e)
        }
    }

    let body = Stmt::store("f", Expr::var("x"), Expr::f32(1.0), None);
    let s = Stmt::block(vec![body, Stmt::store("g", Expr::int(0), Expr::f32(2.0), None)]);
    let out = RenameX.mutate_stmt(&s);
    let crate::StmtNode::Block { stmts } = out.node() else { panic!("expected block") };
    // Second store had no x: same allocation.
    let crate::StmtNode::Block { stmts: old } = s.node() else { panic!("expected block") };
    assert!(!stmts[0].same(&old[0]));
    assert!(stmts[1].same(&old[1]));
}

#[test]
fn substitution_respects_shadowing() {
    // (let x = 2 in x + y) with y -> x stays capture-correct for the
    // bound x.
    let inner = Expr::let_("x", Expr::int(2), Expr::var("x") + Expr::var("z"));
    let out = substitute(&inner, "x", &Expr::int(9));
    // The bound x is untouched.
    assert_eq!(out, inner);

    let loop_ = Stmt::for_(
        "x",
        Expr::int(0),
        Expr::var("n"),
        ForKind::Serial,
        Stmt::store("f", Expr::var("x"), Expr::f32(0.0), None),
    );
    let out = substitute_stmt(&loop_, "x", &Expr::int(3));
    // Loop variable shadows: body unchanged.
    assert_eq!(out, loop_);

    let out = substitute_stmt(&loop_, "n", &Expr::int(10));
    match out.node() {
        crate::StmtNode::For { extent, .. } => assert_eq!(*extent, Expr::int(10)),
        other => panic!("expected for, got {other:?}"),
    }
}

#[test]
fn analyses_see_through_trees() {
    let e = Expr::let_("t", Expr::var("a") + 1, Expr::var("t") * Expr::var("b"));
    let free = free_vars(&e);
    assert!(free.contains("a") && free.contains("b"));
    assert!(!free.contains("t"));

    let s = Stmt::block(vec![
        Stmt::store("out", Expr::var("x"), Expr::load(rill_dtype::Type::float32(), "in", Expr::var("x"), None), None),
    ]);
    let touched = buffers_touched(&s);
    assert!(touched.contains("out") && touched.contains("in"));

    assert!(is_pure(&(Expr::var("x") + 1)));
    assert!(!is_pure(&Expr::load(rill_dtype::Type::float32(), "b", Expr::int(0), None)));
}
