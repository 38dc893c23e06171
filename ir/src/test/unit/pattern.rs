//! Pattern matcher tests.

use crate::pattern::{Pat, PatternMatcher, RewriteFn};
use crate::{Expr, rule};

fn matcher(rules: Vec<(Pat, RewriteFn<()>)>) -> PatternMatcher<()> {
    PatternMatcher::new(rules)
}

#[test]
fn wildcards_bind_and_rebuild() {
    let mut rules: Vec<(Pat, RewriteFn<()>)> = Vec::new();
    // a + b -> b + a (for this test only)
    rule!(rules, Pat::var("a") + Pat::var("b") => |a, b| {
        Some(Expr::add(b.clone(), a.clone()))
    });
    let m = matcher(rules);

    let e = Expr::add(Expr::var("x"), Expr::var("y"));
    let rewritten = m.rewrite(&e, &mut ()).expect("rule should fire");
    assert_eq!(rewritten, Expr::add(Expr::var("y"), Expr::var("x")));
}

#[test]
fn repeated_names_must_match_same_subtree() {
    let mut rules: Vec<(Pat, RewriteFn<()>)> = Vec::new();
    rule!(rules, Pat::var("x") - Pat::var("x") => |x| {
        Some(Expr::imm(x.ty(), crate::ConstValue::Int(0)))
    });
    let m = matcher(rules);

    let same = Expr::sub(Expr::var("x") + 1, Expr::var("x") + 1);
    assert!(m.rewrite(&same, &mut ()).is_some());

    let different = Expr::sub(Expr::var("x") + 1, Expr::var("x") + 2);
    assert!(m.rewrite(&different, &mut ()).is_none());
}

#[test]
fn dispatch_keys_on_outer_constructor() {
    let mut rules: Vec<(Pat, RewriteFn<()>)> = Vec::new();
    rule!(rules, Pat::var("a") * Pat::imm("c") => |a, _c| Some(a.clone()));
    let m = matcher(rules);

    // An Add never reaches a Mul-keyed rule.
    assert!(m.rewrite(&Expr::add(Expr::var("x"), Expr::int(3)), &mut ()).is_none());
    assert!(m.rewrite(&Expr::mul(Expr::var("x"), Expr::int(3)), &mut ()).is_some());
}

#[test]
fn imm_pattern_rejects_non_constants() {
    let mut rules: Vec<(Pat, RewriteFn<()>)> = Vec::new();
    rule!(rules, Pat::var("a") + Pat::imm("c") => |_a, c| Some(c.clone()));
    let m = matcher(rules);

    assert!(m.rewrite(&Expr::add(Expr::var("x"), Expr::var("y")), &mut ()).is_none());
    assert!(m.rewrite(&Expr::add(Expr::var("x"), Expr::int(3)), &mut ()).is_some());
}

#[test]
fn named_captures_whole_node() {
    let mut rules: Vec<(Pat, RewriteFn<()>)> = Vec::new();
    rule!(rules, Pat::named("whole", Pat::var("a") + Pat::var("b")) => |whole, a, _b| {
        assert_eq!(whole.children()[0], *a);
        Some(a.clone())
    });
    let m = matcher(rules);
    assert_eq!(m.rewrite(&Expr::add(Expr::var("p"), Expr::var("q")), &mut ()), Some(Expr::var("p")));
}

#[test]
fn rules_returning_input_do_not_fire() {
    let mut rules: Vec<(Pat, RewriteFn<()>)> = Vec::new();
    rule!(rules, Pat::var("a") => |a| Some(a.clone()));
    let m = matcher(rules);
    // Identity rewrites are suppressed so fixpoint drivers terminate.
    assert!(m.rewrite(&Expr::var("x"), &mut ()).is_none());
}
