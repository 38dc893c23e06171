//! The simplification rule set.
//!
//! Each rule is a local pattern plus a replacement constructor. Rules are
//! dispatched by the matched node's outermost constructor and scanned in
//! the order they are registered here, so registration order is part of
//! the normal form and must stay stable.
//!
//! Families, in order: comparison canonicalization, constant folding,
//! cast rules, canonical commutative ordering, identity elimination,
//! constant collapsing across associations and min/max, division and
//! remainder facts, interval-based comparison narrowing, vector (ramp /
//! broadcast) algebra, variable and let rules.

use crate::analysis::{count_var_uses, is_pure, uses_var};
use crate::eval::{eval_binary, eval_unary};
use crate::expr::{Expr, ExprNode};
use crate::interval::compare_intervals;
use crate::pattern::{Pat, PatternMatcher, RewriteFn};
use crate::substitute::substitute;
use crate::types::{BinaryOp, ConstValue, UnaryOp};
use rill_dtype::Type;

use super::SimplifyCtx;

fn is_zero(e: &Expr) -> bool {
    match e.as_const() {
        Some(ConstValue::Int(v)) => v == 0,
        Some(ConstValue::UInt(v)) => v == 0,
        Some(ConstValue::Float(v)) => v == 0.0,
        None => false,
    }
}

fn is_one(e: &Expr) -> bool {
    match e.as_const() {
        Some(ConstValue::Int(v)) => v == 1,
        Some(ConstValue::UInt(v)) => v == 1,
        Some(ConstValue::Float(v)) => v == 1.0,
        None => false,
    }
}

/// Fold `a op b` into an immediate of the right type, or decline.
fn fold(op: BinaryOp, a: &Expr, b: &Expr) -> Option<Expr> {
    let ty = a.ty();
    let result = eval_binary(op, &ty, a.as_const()?, b.as_const()?)?;
    let out_ty = if op.is_comparison() { Type::bool_() } else { ty };
    Some(Expr::imm(out_ty, result))
}

/// Whether an identity that is inexact for floats may fire on `e`.
fn float_ok(e: &Expr, ctx: &SimplifyCtx) -> bool {
    !e.ty().is_float() || ctx.fast_math
}

pub fn simplify_rules() -> PatternMatcher<SimplifyCtx> {
    let mut rules: Vec<(Pat, RewriteFn<SimplifyCtx>)> = Vec::new();

    // ========== Comparison canonicalization ==========
    // Gt/Ge are rewritten away so later rules only see Lt/Le/Eq/Ne.

    rule!(rules, Pat::var("x").gt(Pat::var("y")) => |x, y| {
        Some(Expr::cmp_lt(y.clone(), x.clone()))
    });
    rule!(rules, Pat::var("x").ge(Pat::var("y")) => |x, y| {
        Some(Expr::cmp_le(y.clone(), x.clone()))
    });

    // ========== Constant folding ==========

    macro_rules! fold_binary {
        ($($op:ident),*) => {
            $(
                rule!(rules, Pat::binary([BinaryOp::$op], Pat::imm("a"), Pat::imm("b")) => |a, b| {
                    fold(BinaryOp::$op, a, b)
                });
            )*
        };
    }
    fold_binary!(Add, Sub, Mul, Div, Mod, Min, Max, Eq, Ne, Lt, Le, And, Or);

    rule!(rules, Pat::named("n", Pat::unary([UnaryOp::Neg, UnaryOp::Not], Pat::imm("c"))) => |n, c| {
        let ExprNode::Unary(op, _) = n.node() else { return None };
        let folded = eval_unary(*op, &c.ty(), c.as_const()?)?;
        let ty = if *op == UnaryOp::Not { Type::bool_() } else { c.ty() };
        Some(Expr::imm(ty, folded))
    });

    // !!x -> x
    rule!(rules, !!Pat::var("x") => |x| Some(x.clone()));

    // Push negation through comparisons.
    rule!(rules, !Pat::var("a").lt(Pat::var("b")) => |a, b| Some(Expr::cmp_le(b.clone(), a.clone())));
    rule!(rules, !Pat::var("a").le(Pat::var("b")) => |a, b| Some(Expr::cmp_lt(b.clone(), a.clone())));
    rule!(rules, !Pat::var("a").eq_(Pat::var("b")) => |a, b| Some(Expr::cmp_ne(a.clone(), b.clone())));
    rule!(rules, !Pat::var("a").ne_(Pat::var("b")) => |a, b| Some(Expr::cmp_eq(a.clone(), b.clone())));

    // ========== Casts ==========

    // Fold a cast of an immediate.
    rule!(rules, Pat::named("outer", Pat::cast(Pat::imm("c"))) => |outer, c| {
        outer.ty().is_scalar().then(|| Some(Expr::imm(outer.ty(), c.as_const()?))).flatten()
    });

    // Strip a value-preserving intermediate cast: T((U)x) == T(x) when U
    // holds every value of x's type exactly.
    rule!(rules, Pat::named("outer", Pat::cast(Pat::named("mid", Pat::cast(Pat::var("x"))))) => |outer, mid, x| {
        mid.ty().can_represent(&x.ty()).then(|| Expr::cast(outer.ty(), x.clone()))
    });

    // ========== Canonical ordering of commutative operators ==========
    // Constants move right; otherwise operands order by content hash.

    rule!(rules, Pat::named("n", Pat::binary(
        [BinaryOp::Add, BinaryOp::Mul, BinaryOp::Min, BinaryOp::Max, BinaryOp::And, BinaryOp::Or],
        Pat::var("a"), Pat::var("b"))) => |n, a, b|
    {
        let ExprNode::Binary(op, _, _) = n.node() else { return None };
        let swap = if a.is_const() {
            !b.is_const()
        } else {
            !b.is_const() && a.content_hash() > b.content_hash()
        };
        swap.then(|| Expr::binary(*op, b.clone(), a.clone()))
    });

    // ========== Identity elimination ==========

    rule!(rules, Pat::var("x") + Pat::imm("c") => |x, c; ctx: SimplifyCtx| {
        (is_zero(c) && float_ok(x, ctx)).then(|| x.clone())
    });
    rule!(rules, Pat::var("x") - Pat::imm("c") => |x, c; ctx: SimplifyCtx| {
        (is_zero(c) && float_ok(x, ctx)).then(|| x.clone())
    });
    // x - x -> 0 (ints; NaN breaks it for floats)
    rule!(rules, Pat::var("x") - Pat::var("x") => |x| {
        x.ty().element_of().is_integral().then(|| {
            Expr::broadcast(Expr::imm(x.ty().element_of(), ConstValue::Int(0)), x.ty().lanes())
        })
    });
    // x - c -> x + (-c), so the association rules only deal with Add.
    rule!(rules, Pat::var("x") - Pat::imm("c") => |x, c| {
        if !c.ty().is_int() || is_zero(c) {
            return None;
        }
        let negated = eval_unary(UnaryOp::Neg, &c.ty(), c.as_const()?)?;
        Some(Expr::add(x.clone(), Expr::imm(c.ty(), negated)))
    });
    rule!(rules, Pat::var("x") * Pat::imm("c") => |x, _c| {
        is_one(_c).then(|| x.clone())
    });
    rule!(rules, Pat::var("x") * Pat::imm("c") => |x, c; ctx: SimplifyCtx| {
        (is_zero(c) && float_ok(x, ctx)).then(|| c.clone())
    });
    rule!(rules, Pat::var("x") / Pat::imm("c") => |x, _c| {
        is_one(_c).then(|| x.clone())
    });
    // 0 / x and 0 % x: division by zero is undefined anyway, so folding
    // on the defined inputs is sound.
    rule!(rules, Pat::imm("c") / Pat::var("x") => |c, _x| {
        (is_zero(c) && c.ty().is_int()).then(|| c.clone())
    });
    rule!(rules, Pat::var("x") % Pat::imm("c") => |x, c| {
        (is_one(c) && x.ty().is_int()).then(|| Expr::imm(x.ty(), ConstValue::Int(0)))
    });

    // min(x, x) / max(x, x) -> x
    rule!(rules, Pat::var("x").min_or_max(Pat::var("x")) => |x| Some(x.clone()));

    // min/max against the type's extreme value.
    rule!(rules, Pat::named("n", Pat::var("x").min_or_max(Pat::imm("c"))) => |n, x, c| {
        let ExprNode::Binary(op, _, _) = n.node() else { return None };
        let c_val = c.as_const_i64()?;
        let ty = x.ty().element_of();
        let saturated = match op {
            BinaryOp::Min => c_val >= ty.max_value()?,
            BinaryOp::Max => c_val <= ty.min_value()?,
            _ => return None,
        };
        saturated.then(|| x.clone())
    });

    // Boolean identities.
    rule!(rules, Pat::var("x").and_(Pat::imm("c")) => |x, c| {
        Some(if c.as_const()?.as_bool() { x.clone() } else { c.clone() })
    });
    rule!(rules, Pat::var("x").or_(Pat::imm("c")) => |x, c| {
        Some(if c.as_const()?.as_bool() { c.clone() } else { x.clone() })
    });
    rule!(rules, Pat::var("x").and_(Pat::var("x")) => |x| Some(x.clone()));
    rule!(rules, Pat::var("x").or_(Pat::var("x")) => |x| Some(x.clone()));

    // Reflexive comparisons (ints only; NaN != NaN).
    rule!(rules, Pat::named("n", Pat::var("x").comparison(Pat::var("x"))) => |n, x| {
        if x.ty().element_of().is_float() {
            return None;
        }
        let ExprNode::Binary(op, _, _) = n.node() else { return None };
        let value = matches!(op, BinaryOp::Eq | BinaryOp::Le | BinaryOp::Ge);
        Some(Expr::broadcast(Expr::bool_(value), x.ty().lanes()))
    });

    // ========== Select ==========

    rule!(rules, Pat::select(Pat::imm("c"), Pat::var("t"), Pat::var("f")) => |c, t, f| {
        Some(if c.as_const()?.as_bool() { t.clone() } else { f.clone() })
    });
    rule!(rules, Pat::select(Pat::broadcast(Pat::imm("c")), Pat::var("t"), Pat::var("f")) => |c, t, f| {
        Some(if c.as_const()?.as_bool() { t.clone() } else { f.clone() })
    });
    rule!(rules, Pat::select(Pat::var("c"), Pat::var("x"), Pat::var("x")) => |_c, x| Some(x.clone()));
    rule!(rules, Pat::select(!Pat::var("c"), Pat::var("t"), Pat::var("f")) => |c, t, f| {
        Some(Expr::select(c.clone(), f.clone(), t.clone()))
    });

    // ========== Constant collapsing across associations ==========

    rule!(rules, (Pat::var("x") + Pat::imm("c1")) + Pat::imm("c2") => |x, c1, c2; ctx: SimplifyCtx| {
        if !float_ok(c1, ctx) {
            return None;
        }
        Some(Expr::add(x.clone(), fold(BinaryOp::Add, c1, c2)?))
    });
    rule!(rules, (Pat::var("x") * Pat::imm("c1")) * Pat::imm("c2") => |x, c1, c2; ctx: SimplifyCtx| {
        if !float_ok(c1, ctx) {
            return None;
        }
        Some(Expr::mul(x.clone(), fold(BinaryOp::Mul, c1, c2)?))
    });
    // (x + c1) * c2 -> x * c2 + c1 * c2 (ints; distributes constants out
    // of loop-index arithmetic).
    rule!(rules, (Pat::var("x") + Pat::imm("c1")) * Pat::imm("c2") => |x, c1, c2| {
        if !c1.ty().is_int() {
            return None;
        }
        Some(Expr::add(Expr::mul(x.clone(), c2.clone()), fold(BinaryOp::Mul, c1, c2)?))
    });

    // Nested min/max with two constants.
    rule!(rules, Pat::named("n", (Pat::var("x").min_or_max(Pat::imm("c1"))).min_or_max(Pat::imm("c2"))) => |n, x, c1, c2| {
        let ExprNode::Binary(outer_op, inner, _) = n.node() else { return None };
        let ExprNode::Binary(inner_op, _, _) = inner.node() else { return None };
        (outer_op == inner_op)
            .then(|| Some(Expr::binary(*outer_op, x.clone(), fold(*outer_op, c1, c2)?)))
            .flatten()
    });

    // Distribute an added constant out of min/max: min(x + c1, c2) ->
    // min(x, c2 - c1) + c1.
    rule!(rules, Pat::named("n", (Pat::var("x") + Pat::imm("c1")).min_or_max(Pat::imm("c2"))) => |n, x, c1, c2| {
        let ExprNode::Binary(op, _, _) = n.node() else { return None };
        if !c1.ty().is_int() {
            return None;
        }
        let shifted = fold(BinaryOp::Sub, c2, c1)?;
        Some(Expr::add(Expr::binary(*op, x.clone(), shifted), c1.clone()))
    });
    // min(x + c, y + c) -> min(x, y) + c.
    rule!(rules, Pat::named("n", (Pat::var("x") + Pat::imm("c")).min_or_max(Pat::var("y") + Pat::imm("c"))) => |n, x, y, c| {
        let ExprNode::Binary(op, _, _) = n.node() else { return None };
        if !c.ty().is_int() {
            return None;
        }
        Some(Expr::add(Expr::binary(*op, x.clone(), y.clone()), c.clone()))
    });
    // min(x + c1, x + c2) -> x + min(c1, c2): same base, different
    // offsets - the shape loop-bound unions produce.
    rule!(rules, Pat::named("n", (Pat::var("x") + Pat::imm("c1")).min_or_max(Pat::var("x") + Pat::imm("c2"))) => |n, x, c1, c2| {
        let ExprNode::Binary(op, _, _) = n.node() else { return None };
        c1.ty().is_int().then(|| Some(Expr::add(x.clone(), fold(*op, c1, c2)?))).flatten()
    });
    // min(x + c, x) -> x + min(c, 0), and the mirrored orientation.
    rule!(rules, Pat::named("n", (Pat::var("x") + Pat::imm("c")).min_or_max(Pat::var("x"))) => |n, x, c| {
        let ExprNode::Binary(op, _, _) = n.node() else { return None };
        let c_val = c.as_const_i64()?;
        if !c.ty().is_int() {
            return None;
        }
        let keep_offset = match op {
            BinaryOp::Min => c_val <= 0,
            BinaryOp::Max => c_val >= 0,
            _ => return None,
        };
        Some(if keep_offset { Expr::add(x.clone(), c.clone()) } else { x.clone() })
    });
    rule!(rules, Pat::named("n", Pat::var("x").min_or_max(Pat::var("x") + Pat::imm("c"))) => |n, x, c| {
        let ExprNode::Binary(op, _, _) = n.node() else { return None };
        let c_val = c.as_const_i64()?;
        if !c.ty().is_int() {
            return None;
        }
        let keep_offset = match op {
            BinaryOp::Min => c_val <= 0,
            BinaryOp::Max => c_val >= 0,
            _ => return None,
        };
        Some(if keep_offset { Expr::add(x.clone(), c.clone()) } else { x.clone() })
    });
    // Differences of offsets from one base collapse to constants:
    // (x + c1) - (x + c2) -> c1 - c2, (x + c) - x -> c, x - (x + c) -> -c.
    rule!(rules, (Pat::var("x") + Pat::imm("c1")) - (Pat::var("x") + Pat::imm("c2")) => |_x, c1, c2| {
        c1.ty().is_int().then(|| fold(BinaryOp::Sub, c1, c2)).flatten()
    });
    rule!(rules, (Pat::var("x") + Pat::imm("c")) - Pat::var("x") => |_x, c| {
        c.ty().is_int().then(|| c.clone())
    });
    rule!(rules, Pat::var("x") - (Pat::var("x") + Pat::imm("c")) => |_x, c| {
        let negated = eval_unary(UnaryOp::Neg, &c.ty(), c.as_const()?)?;
        c.ty().is_int().then(|| Expr::imm(c.ty(), negated))
    });

    // ========== Division and remainder facts ==========

    rule!(rules, (Pat::var("x") * Pat::imm("c1")) / Pat::imm("c2") => |x, c1, c2| {
        let (a, b) = (c1.as_const_i64()?, c2.as_const_i64()?);
        (a == b && a != 0 && x.ty().is_int()).then(|| x.clone())
    });
    rule!(rules, (Pat::var("x") * Pat::imm("c1")) % Pat::imm("c2") => |x, c1, c2| {
        let (a, b) = (c1.as_const_i64()?, c2.as_const_i64()?);
        (b != 0 && a % b == 0 && x.ty().is_int())
            .then(|| Expr::imm(x.ty(), ConstValue::Int(0)))
    });
    // ((x * c) + y) / c -> x, and the matching % -> y, when y is known to
    // stay inside [0, c). This is what collapses split/fused loop
    // indexing back to the original variables.
    rule!(rules, ((Pat::var("x") * Pat::imm("c1")) + Pat::var("y")) / Pat::imm("c2") => |x, y, c1, c2; ctx: SimplifyCtx| {
        let (a, b) = (c1.as_const_i64()?, c2.as_const_i64()?);
        if a != b || a <= 0 || !x.ty().is_int() {
            return None;
        }
        let yb = ctx.bounds(y);
        (yb.min.is_some_and(|m| m >= 0) && yb.max.is_some_and(|m| m < a as i128)).then(|| x.clone())
    });
    rule!(rules, ((Pat::var("x") * Pat::imm("c1")) + Pat::var("y")) % Pat::imm("c2") => |x, y, c1, c2; ctx: SimplifyCtx| {
        let (a, b) = (c1.as_const_i64()?, c2.as_const_i64()?);
        if a != b || a <= 0 || !x.ty().is_int() {
            return None;
        }
        let yb = ctx.bounds(y);
        (yb.min.is_some_and(|m| m >= 0) && yb.max.is_some_and(|m| m < a as i128)).then(|| y.clone())
    });
    // Same two facts with the addends in the other order (canonical
    // ordering may place either side first).
    rule!(rules, (Pat::var("y") + (Pat::var("x") * Pat::imm("c1"))) / Pat::imm("c2") => |y, x, c1, c2; ctx: SimplifyCtx| {
        let (a, b) = (c1.as_const_i64()?, c2.as_const_i64()?);
        if a != b || a <= 0 || !x.ty().is_int() {
            return None;
        }
        let yb = ctx.bounds(y);
        (yb.min.is_some_and(|m| m >= 0) && yb.max.is_some_and(|m| m < a as i128)).then(|| x.clone())
    });
    rule!(rules, (Pat::var("y") + (Pat::var("x") * Pat::imm("c1"))) % Pat::imm("c2") => |y, x, c1, c2; ctx: SimplifyCtx| {
        let (a, b) = (c1.as_const_i64()?, c2.as_const_i64()?);
        if a != b || a <= 0 || !x.ty().is_int() {
            return None;
        }
        let yb = ctx.bounds(y);
        (yb.min.is_some_and(|m| m >= 0) && yb.max.is_some_and(|m| m < a as i128)).then(|| y.clone())
    });
    // Bounded numerators: x / c -> 0 and x % c -> x when 0 <= x < c.
    rule!(rules, Pat::var("x") / Pat::imm("c") => |x, c; ctx: SimplifyCtx| {
        let c_val = c.as_const_i64()?;
        if c_val <= 0 || !x.ty().is_int() {
            return None;
        }
        let xb = ctx.bounds(x);
        (xb.min.is_some_and(|m| m >= 0) && xb.max.is_some_and(|m| m < c_val as i128))
            .then(|| Expr::imm(x.ty(), ConstValue::Int(0)))
    });
    rule!(rules, Pat::var("x") % Pat::imm("c") => |x, c; ctx: SimplifyCtx| {
        let c_val = c.as_const_i64()?;
        if c_val <= 0 || !x.ty().is_int() {
            return None;
        }
        let xb = ctx.bounds(x);
        (xb.min.is_some_and(|m| m >= 0) && xb.max.is_some_and(|m| m < c_val as i128))
            .then(|| x.clone())
    });

    // ========== Interval-based comparison narrowing ==========

    rule!(rules, Pat::named("n", Pat::var("a").comparison(Pat::var("b"))) => |n, a, b; ctx: SimplifyCtx| {
        let ExprNode::Binary(op, _, _) = n.node() else { return None };
        if !a.ty().is_scalar() || !a.ty().is_integral() {
            return None;
        }
        let result = compare_intervals(*op, &ctx.bounds(a), &ctx.bounds(b))?;
        Some(Expr::bool_(result))
    });
    // (x + c1) < c2 -> x < c2 - c1 keeps comparisons against loop
    // variables in a shape the narrowing rule can see.
    rule!(rules, (Pat::var("x") + Pat::imm("c1")).lt(Pat::imm("c2")) => |x, c1, c2| {
        c1.ty().is_int().then(|| Some(Expr::cmp_lt(x.clone(), fold(BinaryOp::Sub, c2, c1)?))).flatten()
    });
    rule!(rules, (Pat::var("x") + Pat::imm("c1")).le(Pat::imm("c2")) => |x, c1, c2| {
        c1.ty().is_int().then(|| Some(Expr::cmp_le(x.clone(), fold(BinaryOp::Sub, c2, c1)?))).flatten()
    });

    // ========== Ramp / broadcast algebra ==========

    rule!(rules, Pat::named("n", Pat::binary(
        [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::Div, BinaryOp::Mod, BinaryOp::Min,
         BinaryOp::Max, BinaryOp::Eq, BinaryOp::Ne, BinaryOp::Lt, BinaryOp::Le, BinaryOp::And, BinaryOp::Or],
        Pat::broadcast(Pat::var("a")), Pat::broadcast(Pat::var("b")))) => |n, a, b|
    {
        let ExprNode::Binary(op, _, _) = n.node() else { return None };
        Some(Expr::broadcast(Expr::binary(*op, a.clone(), b.clone()), n.ty().lanes()))
    });
    rule!(rules, Pat::named("r", Pat::ramp(Pat::var("b"), Pat::var("s"))) + Pat::broadcast(Pat::var("v")) => |r, b, s, v| {
        let ExprNode::Ramp { lanes, .. } = r.node() else { return None };
        Some(Expr::ramp(Expr::add(b.clone(), v.clone()), s.clone(), *lanes))
    });
    rule!(rules, Pat::broadcast(Pat::var("v")) + Pat::named("r", Pat::ramp(Pat::var("b"), Pat::var("s"))) => |v, r, b, s| {
        let ExprNode::Ramp { lanes, .. } = r.node() else { return None };
        Some(Expr::ramp(Expr::add(b.clone(), v.clone()), s.clone(), *lanes))
    });
    rule!(rules, Pat::named("r", Pat::ramp(Pat::var("b"), Pat::var("s"))) - Pat::broadcast(Pat::var("v")) => |r, b, s, v| {
        let ExprNode::Ramp { lanes, .. } = r.node() else { return None };
        Some(Expr::ramp(Expr::sub(b.clone(), v.clone()), s.clone(), *lanes))
    });
    rule!(rules, Pat::named("r", Pat::ramp(Pat::var("b"), Pat::var("s"))) * Pat::broadcast(Pat::var("v")) => |r, b, s, v| {
        let ExprNode::Ramp { lanes, .. } = r.node() else { return None };
        Some(Expr::ramp(Expr::mul(b.clone(), v.clone()), Expr::mul(s.clone(), v.clone()), *lanes))
    });
    rule!(rules, Pat::named("r1", Pat::ramp(Pat::var("b1"), Pat::var("s1"))) + Pat::ramp(Pat::var("b2"), Pat::var("s2")) => |r1, b1, s1, b2, s2| {
        let ExprNode::Ramp { lanes, .. } = r1.node() else { return None };
        Some(Expr::ramp(Expr::add(b1.clone(), b2.clone()), Expr::add(s1.clone(), s2.clone()), *lanes))
    });
    // A cast of a broadcast moves inside.
    rule!(rules, Pat::named("outer", Pat::cast(Pat::named("bc", Pat::broadcast(Pat::var("v"))))) => |outer, bc, v| {
        let ExprNode::Broadcast { lanes, .. } = bc.node() else { return None };
        Some(Expr::broadcast(Expr::cast(outer.ty().element_of(), v.clone()), *lanes))
    });

    // ========== Variables and lets ==========

    // A variable whose definition is trivial, or whose interval pins a
    // single value, is replaced outright.
    rule!(rules, Pat::any_var("v") => |v; ctx: SimplifyCtx| {
        let name = v.as_var()?;
        let info = ctx.var_info(name)?;
        if let Some(eq) = &info.equals
            && (eq.is_const() || eq.as_var().is_some())
        {
            return Some(eq.clone());
        }
        let single = info.interval.is_single()?;
        let single_i64 = i64::try_from(single).ok()?;
        v.ty().can_represent_i64(single_i64).then(|| Expr::imm(v.ty(), ConstValue::Int(single_i64)))
    });

    // Let elimination: drop dead lets, inline trivial or single-use ones.
    rule!(rules, Pat::named("l", Pat::let_of(Pat::var("v"), Pat::var("b"))) => |l, v, b| {
        let ExprNode::Let { name, .. } = l.node() else { return None };
        if !uses_var(b, name) {
            return is_pure(v).then(|| b.clone());
        }
        if v.is_const() || v.as_var().is_some() || (is_pure(v) && count_var_uses(b, name) == 1) {
            return Some(substitute(b, name, v));
        }
        None
    });

    PatternMatcher::new(rules)
}
