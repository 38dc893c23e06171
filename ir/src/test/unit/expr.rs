//! Expression construction and interning tests.

use rill_dtype::Type;

use crate::{BinaryOp, ConstValue, Expr};

#[test]
fn interning_shares_identical_trees() {
    let a = Expr::add(Expr::var("x"), Expr::int(1));
    let b = Expr::add(Expr::var("x"), Expr::int(1));
    assert!(a.same(&b));
    assert_eq!(a.id(), b.id());
}

#[test]
fn interning_distinguishes_payloads() {
    let add = Expr::add(Expr::var("x"), Expr::int(1));
    let mul = Expr::mul(Expr::var("x"), Expr::int(1));
    assert!(!add.same(&mul));

    let x = Expr::var("x");
    let y = Expr::var("y");
    assert_ne!(x, y);
}

#[test]
fn equality_is_structural() {
    let a = Expr::min(Expr::var("x") + 2, Expr::var("y"));
    let b = Expr::min(Expr::add(Expr::var("x"), Expr::int(2)), Expr::var("y"));
    assert_eq!(a, b);
    assert_eq!(a.content_hash(), b.content_hash());
}

#[test]
fn with_children_preserves_identity_when_unchanged() {
    let e = Expr::add(Expr::var("x"), Expr::int(1));
    let rebuilt = e.with_children(&e.children());
    assert!(rebuilt.same(&e));
}

#[test]
fn with_children_reinterns_on_change() {
    let e = Expr::add(Expr::var("x"), Expr::int(1));
    let replaced = e.with_children(&[Expr::var("y"), Expr::int(1)]);
    assert_eq!(replaced, Expr::add(Expr::var("y"), Expr::int(1)));
}

#[test]
fn comparisons_produce_bool() {
    let c = Expr::cmp_lt(Expr::var("x"), Expr::int(4));
    assert!(c.ty().is_bool());
}

#[test]
fn mixed_operands_promote() {
    let e = Expr::var("x") + 1.5f32;
    assert_eq!(e.ty(), Type::float32());

    let v = Expr::broadcast(Expr::var("x"), 4) + 1;
    assert_eq!(v.ty(), Type::int32().with_lanes(4));
}

#[test]
fn scalar_broadcasts_against_vector() {
    let ramp = Expr::ramp(Expr::var("x"), Expr::int(1), 8);
    let sum = ramp + 3;
    assert_eq!(sum.ty().lanes(), 8);
}

#[test]
fn try_binary_rejects_mismatched_types() {
    let err = Expr::try_binary(BinaryOp::Add, Expr::var("x"), Expr::f32(1.0));
    assert!(err.is_err());
}

#[test]
fn as_const_sees_through_broadcast() {
    let b = Expr::broadcast(Expr::int(7), 4);
    assert_eq!(b.as_const(), Some(ConstValue::Int(7)));
    assert!(b.is_const_value(7));
}

#[test]
fn identity_cast_disappears() {
    let x = Expr::var("x");
    assert!(Expr::cast(Type::int32(), x.clone()).same(&x));
}

#[test]
fn imm_wraps_to_type_domain() {
    let v = Expr::imm(Type::uint(8), ConstValue::Int(260));
    assert_eq!(v.as_const(), Some(ConstValue::UInt(4)));
}
