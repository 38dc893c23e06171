//! Cross-cutting properties: schedule commutation, bounds monotonicity,
//! and pipeline-level error surfacing.

use rill_func::{Func, TailStrategy, Var};
use rill_ir::Expr;

use crate::pipeline::{CompileOptions, Pipeline};

fn gradient(name: &str) -> (Func, Var, Var) {
    let (x, y) = (Var::new("x"), Var::new("y"));
    let f = Func::new(name);
    f.define_simple([x.clone(), y.clone()], &x + &y).unwrap();
    (f, x, y)
}

#[test]
fn commuting_splits_produce_identical_ir() {
    // split(x) then split(y) vs split(y) then split(x). The function
    // name is reused, so the first graph must die before the second is
    // built for the loop names to line up.
    let module_a = {
        let (f, x, y) = gradient("commute_split");
        f.split(&x, &Var::new("xo"), &Var::new("xi"), 4, TailStrategy::GuardWithIf).unwrap();
        f.split(&y, &Var::new("yo"), &Var::new("yi"), 2, TailStrategy::GuardWithIf).unwrap();
        Pipeline::new(f).compile_to_module(&[16, 16], &CompileOptions::default()).unwrap()
    };
    let module_b = {
        let (f, x, y) = gradient("commute_split");
        f.split(&y, &Var::new("yo"), &Var::new("yi"), 2, TailStrategy::GuardWithIf).unwrap();
        f.split(&x, &Var::new("xo"), &Var::new("xi"), 4, TailStrategy::GuardWithIf).unwrap();
        Pipeline::new(f).compile_to_module(&[16, 16], &CompileOptions::default()).unwrap()
    };
    assert_eq!(module_a.stmt.to_string(), module_b.stmt.to_string());
}

#[test]
fn enlarging_output_never_shrinks_producer_regions() {
    let build = |size: i64| -> String {
        let x = Var::new("x");
        let f = Func::new("mono_f");
        f.define_simple([x.clone()], x.expr() * 2).unwrap();
        f.compute_root().unwrap();
        let g = Func::new("mono_g");
        g.define_simple([x.clone()], f.at([x.expr() - 1]) + f.at([x.expr() + 1])).unwrap();
        let module =
            Pipeline::new(g).compile_to_module(&[size], &CompileOptions::default()).unwrap();
        module.stmt.to_string()
    };

    let small = build(10);
    let large = build(20);
    // g reads f over [x-1, x+1]: the producer allocation is size + 2.
    assert!(small.contains("* 12]"), "expected a 12-wide producer allocation in:\n{small}");
    assert!(large.contains("* 22]"), "expected a 22-wide producer allocation in:\n{large}");
}

#[test]
fn deep_producer_chains_lower_cleanly() {
    // A chain of compute_root stages: each one realizes, feeds the
    // next, and frees.
    let x = Var::new("x");
    let mut previous: Option<Func> = None;
    for i in 0..5 {
        let f = Func::new(format!("chain_{i}"));
        match &previous {
            None => f.define_simple([x.clone()], x.expr() + 1).unwrap(),
            Some(p) => f.define_simple([x.clone()], p.at([x.expr()]) + 1).unwrap(),
        };
        if i < 4 {
            f.compute_root().unwrap();
        }
        previous = Some(f);
    }
    let out = previous.expect("chain built");
    let name = out.name();
    let got = Pipeline::new(out).realize(&[8]).unwrap().buffers[&name].to_i64_vec();
    let expected: Vec<i64> = (0..8).map(|x| x + 5).collect();
    assert_eq!(got, expected);
}

#[test]
fn unbounded_regions_are_rejected_with_structured_kind() {
    use rill_func::RDom;

    // An update writing through a non-affine index: hist(r * r) += 1.
    // The write region cannot be bounded without an explicit bound().
    let i = Var::new("i");
    let hist = Func::new("unbounded_hist");
    hist.define_simple([i.clone()], Expr::int(0)).unwrap();
    let r = RDom::single("r", Expr::int(0), Expr::int(10));
    let wild = r.x().expr() * r.x().expr();
    hist.update(vec![wild.clone()], vec![hist.at([wild]) + 1], Some(&r)).unwrap();

    let err = Pipeline::new(hist).realize(&[16]).unwrap_err();
    let crate::Error::Lower { source } = err else {
        panic!("expected a lowering error, got {err}");
    };
    assert!(
        matches!(source, rill_lower::Error::BoundsCannotBeInferred { .. }),
        "unexpected kind: {source}"
    );
}

#[test]
fn fused_and_unrolled_schedules_compute_the_same_values() {
    // fuse(y, x) collapses the nest into one loop with div/mod
    // recovery; unroll(x, 4) fully expands the inner iterations.
    let (x, y) = (Var::new("x"), Var::new("y"));
    let fused = Func::new("prop_fused");
    fused.define_simple([x.clone(), y.clone()], x.expr() * 10 + y.expr()).unwrap();
    fused.fuse(&y, &x, &Var::new("t")).unwrap();
    let fused_name = fused.name();
    let got = Pipeline::new(fused).realize(&[4, 4]).unwrap().buffers[&fused_name].to_i64_vec();
    let expected: Vec<i64> = (0..4).flat_map(|y| (0..4).map(move |x| x * 10 + y)).collect();
    assert_eq!(got, expected);

    let unrolled = Func::new("prop_unrolled");
    unrolled.define_simple([x.clone()], x.expr() + 2).unwrap();
    unrolled.unroll(&x, 4).unwrap();
    let unrolled_name = unrolled.name();
    let got = Pipeline::new(unrolled).realize(&[8]).unwrap().buffers[&unrolled_name].to_i64_vec();
    assert_eq!(got, (2..10).collect::<Vec<i64>>());
}

#[test]
fn specialized_schedules_pick_their_branch() {
    // One function, two loop structures: vectorized when the extent
    // parameter is large, plain otherwise. Both compute the same
    // values.
    let x = Var::new("x");
    let f = Func::new("spec_f");
    f.define_simple([x.clone()], x.expr() * 3).unwrap();
    let wide = f.specialize(Expr::cmp_ge(Expr::var("n"), Expr::int(64))).unwrap();
    wide.vectorize(&x, 8).unwrap();
    let name = f.name();

    let pipeline = Pipeline::new(f);
    let module = pipeline.compile_to_module(&[32], &CompileOptions::default()).unwrap();
    // Both branches survive lowering: one vectorized, one serial.
    let text = module.stmt.to_string();
    assert!(text.contains("if ((64 <= n))") || text.contains("if ((n >= 64))"), "{text}");

    let run = pipeline
        .realize_with(
            &[32],
            rill_codegen::RunEnv::new().with_scalar("n", rill_ir::ConstValue::Int(16)),
            &CompileOptions::default(),
        )
        .unwrap();
    assert_eq!(run.buffers[&name].to_i64_vec(), (0..32).map(|x| x * 3).collect::<Vec<i64>>());
}
