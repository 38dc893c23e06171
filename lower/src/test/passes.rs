//! Unit tests for the backend-neutral passes, over hand-built trees.

use rill_ir::{Expr, ExprNode, ForKind, Stmt, StmtNode, Type};

use crate::passes::{
    inject_early_frees, lower_parallel_tasks, remove_trivial_loops, substitute_in_lets,
    unroll_loops, vectorize_loops,
};

fn store_x(buffer: &str) -> Stmt {
    Stmt::store(buffer, Expr::var("x"), Expr::cast(Type::float32(), Expr::var("x")), None)
}

#[test]
fn vectorized_loop_becomes_ramp() {
    let s = Stmt::for_("x", Expr::int(0), Expr::int(8), ForKind::Vectorized, store_x("out"));
    let out = vectorize_loops(s).unwrap();
    let StmtNode::Store { index, value, .. } = out.node() else {
        panic!("expected a store, got {out}");
    };
    assert!(matches!(index.node(), ExprNode::Ramp { lanes: 8, .. }));
    assert_eq!(value.ty().lanes(), 8);
}

#[test]
fn vector_guard_becomes_store_predicate() {
    // if (x < 13) out[x] = x -- the tail guard of a split.
    let body = Stmt::if_then_else(
        Expr::cmp_lt(Expr::var("x"), Expr::int(13)),
        store_x("out"),
        None,
    );
    let s = Stmt::for_("x", Expr::int(8), Expr::int(8), ForKind::Vectorized, body);
    let out = vectorize_loops(s).unwrap();
    let StmtNode::Store { predicate: Some(p), .. } = out.node() else {
        panic!("expected a predicated store, got {out}");
    };
    assert_eq!(p.ty().lanes(), 8);
}

#[test]
fn vectorize_rejects_symbolic_extent() {
    let s = Stmt::for_("x", Expr::int(0), Expr::var("n"), ForKind::Vectorized, store_x("out"));
    assert!(vectorize_loops(s).is_err());
}

#[test]
fn unroll_expands_constant_loops() {
    let s = Stmt::for_("x", Expr::int(2), Expr::int(3), ForKind::Unrolled, store_x("out"));
    let out = unroll_loops(s).unwrap();
    let StmtNode::Block { stmts } = out.node() else {
        panic!("expected a block, got {out}");
    };
    assert_eq!(stmts.len(), 3);
    // Iterations are substituted copies at min + i.
    let StmtNode::Store { index, .. } = stmts[0].node() else { panic!() };
    assert_eq!(rill_ir::simplify(index), Expr::int(2));
}

#[test]
fn unroll_rejects_symbolic_extent() {
    let s = Stmt::for_("x", Expr::int(0), Expr::var("n"), ForKind::Unrolled, store_x("out"));
    assert!(unroll_loops(s).is_err());
}

#[test]
fn trivial_loops_collapse() {
    let one = Stmt::for_("x", Expr::int(5), Expr::int(1), ForKind::Serial, store_x("out"));
    assert!(matches!(remove_trivial_loops(one).node(), StmtNode::LetStmt { .. }));

    let zero = Stmt::for_("x", Expr::int(5), Expr::int(0), ForKind::Serial, store_x("out"));
    assert!(remove_trivial_loops(zero).is_no_op());
}

#[test]
fn parallel_loops_extract_closures() {
    let s = Stmt::for_("f.s0.x", Expr::int(0), Expr::int(64), ForKind::Parallel, store_x("out"));
    let (out, closures) = lower_parallel_tasks(s);
    assert_eq!(closures.len(), 1);
    assert_eq!(closures[0].var, "f.s0.x");
    let StmtNode::Evaluate { value } = out.node() else {
        panic!("expected a runtime call, got {out}");
    };
    let ExprNode::Call { name, .. } = value.node() else { panic!() };
    assert_eq!(name, "rill_par_for");
}

#[test]
fn early_frees_follow_last_use() {
    let body = Stmt::block(vec![
        Stmt::store("tmp", Expr::int(0), Expr::f32(1.0), None),
        Stmt::store("out", Expr::int(0), Expr::load(Type::float32(), "tmp", Expr::int(0), None), None),
        Stmt::store("out", Expr::int(1), Expr::f32(2.0), None),
    ]);
    let s = Stmt::allocate("tmp", Type::float32(), rill_ir::MemoryType::Auto, vec![Expr::int(1)], None, body);
    let out = inject_early_frees(s);
    let StmtNode::Allocate { body, .. } = out.node() else { panic!() };
    let StmtNode::Block { stmts } = body.node() else { panic!() };
    // Free lands between the last tmp use and the unrelated store.
    assert!(matches!(stmts[2].node(), StmtNode::Free { name } if name == "tmp"));
    assert_eq!(stmts.len(), 4);
}

#[test]
fn trivial_let_stmts_substitute() {
    let s = Stmt::let_stmt(
        "t",
        Expr::int(7),
        Stmt::store("out", Expr::var("t"), Expr::f32(0.0), None),
    );
    let out = substitute_in_lets(s);
    let StmtNode::Store { index, .. } = out.node() else { panic!() };
    assert_eq!(*index, Expr::int(7));
}
