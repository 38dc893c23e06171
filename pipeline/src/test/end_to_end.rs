//! End-to-end scenarios: every pipeline is realized through the full
//! compile path and checked against the pointwise reference evaluator
//! (or an independently scheduled twin).

use std::collections::HashMap;

use rill_codegen::{Buffer, RunEnv};
use rill_func::{Func, ImageParam, RDom, TailStrategy, Var, build_environment};
use rill_ir::{ConstValue, Expr, Type};

use crate::pipeline::{CompileOptions, Pipeline};
use crate::reference::ReferenceEvaluator;

fn xy() -> (Var, Var) {
    (Var::new("x"), Var::new("y"))
}

/// Realize `f` and compare against the reference evaluator.
fn check_against_reference(f: &Func, extents: &[i64]) -> Vec<f64> {
    let name = f.name();
    let run = Pipeline::new(f.clone()).realize(extents).expect("realize");
    let got = run.buffers[&name].to_f64_vec();

    let env = build_environment(&[f.clone()]).expect("environment");
    let inputs = HashMap::new();
    let params = HashMap::new();
    let mut reference = ReferenceEvaluator::new(&env, &inputs, &params);
    let want = reference.realize(&name, extents).expect("reference").to_f64_vec();

    assert_eq!(got, want, "lowered output diverges from the reference for {name}");
    got
}

// =========================================================================
// Scenario 1: gradient, default and split schedules
// =========================================================================

#[test]
fn gradient_default_schedule() {
    let (x, y) = xy();
    let f = Func::new("e2e_gradient");
    f.define_simple([x.clone(), y.clone()], &x + &y).unwrap();

    let got = check_against_reference(&f, &[4, 4]);
    let expected: Vec<f64> = (0..4).flat_map(|y| (0..4).map(move |x| (x + y) as f64)).collect();
    assert_eq!(got, expected);
}

#[test]
fn gradient_split_matches_default() {
    let (x, y) = xy();
    let plain = Func::new("e2e_gradient_plain");
    plain.define_simple([x.clone(), y.clone()], &x + &y).unwrap();
    let plain_out = Pipeline::new(plain).realize(&[4, 4]).unwrap();

    let split = Func::new("e2e_gradient_split");
    split.define_simple([x.clone(), y.clone()], &x + &y).unwrap();
    split
        .split(&x, &Var::new("xo"), &Var::new("xi"), 2, TailStrategy::GuardWithIf)
        .unwrap();
    let split_out = Pipeline::new(split.clone()).realize(&[4, 4]).unwrap();

    assert_eq!(
        plain_out.buffers["e2e_gradient_plain"].to_i64_vec(),
        split_out.buffers[&split.name()].to_i64_vec(),
    );
}

// =========================================================================
// Scenario 2: 3x3 box blur, default vs tile + compute_at
// =========================================================================

fn ones_input(name: &str) -> (ImageParam, Buffer) {
    let input = ImageParam::new(name, Type::float32(), 2);
    // Covers the one-pixel apron the stencil reads.
    let buffer = Buffer::from_fn_spanning(
        Type::float32(),
        &[(-1, 258), (-1, 258)],
        |_| ConstValue::Float(1.0),
    );
    (input, buffer)
}

fn blur_graph(input: &ImageParam, suffix: &str) -> (Func, Func) {
    let (x, y) = xy();
    let blur_x = Func::new(format!("blur_x_{suffix}"));
    blur_x
        .define_simple(
            [x.clone(), y.clone()],
            (input.at([x.expr() - 1, y.expr()])
                + input.at([x.expr(), y.expr()])
                + input.at([x.expr() + 1, y.expr()]))
                / 3.0f32,
        )
        .unwrap();
    let blur_y = Func::new(format!("blur_y_{suffix}"));
    blur_y
        .define_simple(
            [x.clone(), y.clone()],
            (blur_x.at([x.expr(), y.expr() - 1])
                + blur_x.at([x.expr(), y.expr()])
                + blur_x.at([x.expr(), y.expr() + 1]))
                / 3.0f32,
        )
        .unwrap();
    (blur_x, blur_y)
}

#[test]
fn blur_tiled_matches_default_bitwise() {
    let (input, buffer) = ones_input("blur_in");
    let size = [256i64, 256];

    // Default: blur_x inlines into blur_y.
    let (_bx, by) = blur_graph(&input, "default");
    let default_run = Pipeline::new(by.clone())
        .realize_with(
            &size,
            RunEnv::new().with_buffer("blur_in", buffer.clone()),
            &CompileOptions::default(),
        )
        .unwrap();
    let default_out = default_run.buffers[&by.name()].to_f64_vec();
    assert!(default_out.iter().all(|&v| v == 1.0), "blur of ones must be ones");

    // Tiled: 32x32 tiles, blur_x computed per tile column.
    let (x, y) = xy();
    let (bx2, by2) = blur_graph(&input, "tiled");
    by2.tile_(&x, &y, &Var::new("xi"), &Var::new("yi"), 32, 32).unwrap();
    bx2.compute_at(&by2, &x).unwrap();
    let tiled_run = Pipeline::new(by2.clone())
        .realize_with(
            &size,
            RunEnv::new().with_buffer("blur_in", buffer),
            &CompileOptions::default(),
        )
        .unwrap();
    let tiled_out = tiled_run.buffers[&by2.name()].to_f64_vec();

    // Bitwise identical to the default schedule.
    let default_bits: Vec<u64> = default_out.iter().map(|v| v.to_bits()).collect();
    let tiled_bits: Vec<u64> = tiled_out.iter().map(|v| v.to_bits()).collect();
    assert_eq!(default_bits, tiled_bits);
}

// =========================================================================
// Scenario 3: histogram via reduction
// =========================================================================

#[test]
fn histogram_counts_by_residue() {
    let n = 1000i64;
    let i = Var::new("i");
    let input = Func::new("hist_in");
    input.define_simple([i.clone()], i.expr() % 256).unwrap();

    let hist = Func::new("e2e_hist");
    hist.define_simple([i.clone()], Expr::int(0)).unwrap();
    let r = RDom::single("r", Expr::int(0), Expr::int(n));
    let bucket = input.at([r.x().expr()]);
    hist.update(vec![bucket.clone()], vec![hist.at([bucket]) + 1], Some(&r)).unwrap();

    let name = hist.name();
    let run = Pipeline::new(hist.clone()).realize(&[256]).unwrap();
    let got = run.buffers[&name].to_i64_vec();

    for (k, &count) in got.iter().enumerate() {
        let expected = if (k as i64) < n % 256 { (n as u64).div_ceil(256) as i64 } else { n / 256 };
        assert_eq!(count, expected, "bucket {k}");
    }

    // And the reference evaluator agrees.
    let env = build_environment(&[hist]).unwrap();
    let inputs = HashMap::new();
    let params = HashMap::new();
    let want =
        ReferenceEvaluator::new(&env, &inputs, &params).realize(&name, &[256]).unwrap().to_i64_vec();
    assert_eq!(got, want);
}

// =========================================================================
// Scenario 4: sliding window with store_root + compute_at
// =========================================================================

#[test]
fn sliding_window_matches_unfolded() {
    let x = Var::new("x");

    let build = |suffix: &str, slide: bool| -> (Func, String) {
        let f = Func::new(format!("slide_f_{suffix}"));
        f.define_simple([x.clone()], x.expr() * 2 + 1).unwrap();
        let g = Func::new(format!("slide_g_{suffix}"));
        g.define_simple(
            [x.clone()],
            f.at([x.expr() - 1]) + f.at([x.expr()]) + f.at([x.expr() + 1]),
        )
        .unwrap();
        if slide {
            f.store_root().unwrap();
            f.compute_at(&g, &x).unwrap();
        } else {
            f.compute_root().unwrap();
        }
        let name = g.name();
        (g, name)
    };

    let (plain, plain_name) = build("plain", false);
    let plain_out = Pipeline::new(plain).realize(&[1000]).unwrap().buffers[&plain_name].to_i64_vec();

    let (slid, slid_name) = build("slid", true);
    let pipeline = Pipeline::new(slid);
    // The folded allocation is a power-of-two window, far smaller than
    // the full extent.
    let module = pipeline.compile_to_module(&[1000], &CompileOptions::default()).unwrap();
    let text = module.stmt.to_string();
    assert!(
        text.contains("allocate slide_f_slid[int32 * 4]"),
        "expected a folded window allocation in:\n{text}"
    );

    let slid_out = pipeline.realize(&[1000]).unwrap().buffers[&slid_name].to_i64_vec();
    assert_eq!(plain_out, slid_out);

    let expected: Vec<i64> = (0..1000).map(|x| 3 * (2 * x + 1)).collect();
    assert_eq!(slid_out, expected);
}

// =========================================================================
// Scenario 5: parallel correctness
// =========================================================================

#[test]
fn parallel_matches_serial() {
    let x = Var::new("x");
    let build = |suffix: &str, parallel: bool| -> (Func, String) {
        let f = Func::new(format!("par_f_{suffix}"));
        f.define_simple([x.clone()], x.expr() + 3).unwrap();
        let g = Func::new(format!("par_g_{suffix}"));
        g.define_simple([x.clone()], f.at([x.expr()]) * 2).unwrap();
        if parallel {
            g.parallel(&x).unwrap();
        }
        let name = g.name();
        (g, name)
    };

    let (serial, serial_name) = build("serial", false);
    let serial_out =
        Pipeline::new(serial).realize(&[10_000]).unwrap().buffers[&serial_name].to_i64_vec();

    let (parallel, parallel_name) = build("parallel", true);
    let parallel_out =
        Pipeline::new(parallel).realize(&[10_000]).unwrap().buffers[&parallel_name].to_i64_vec();

    assert_eq!(serial_out, parallel_out);
    assert_eq!(parallel_out[9_999], (9_999 + 3) * 2);
}

// =========================================================================
// Scenario 6: vectorize with a guarded tail
// =========================================================================

#[test]
fn vectorized_tail_stays_in_bounds() {
    let x = Var::new("x");
    let f = Func::new("e2e_vec_tail");
    f.define_simple([x.clone()], x.expr() * x.expr()).unwrap();
    f.vectorize(&x, 8).unwrap();
    let name = f.name();

    // 13 is not a multiple of 8; the buffer is exactly 13 wide, so any
    // out-of-bounds lane would fault the interpreter.
    let run = Pipeline::new(f.clone()).realize(&[13]).unwrap();
    let got = run.buffers[&name].to_i64_vec();
    let expected: Vec<i64> = (0..13).map(|x| x * x).collect();
    assert_eq!(got, expected);
}

// =========================================================================
// Boundary behaviors
// =========================================================================

#[test]
fn zero_extent_realization_is_a_no_op() {
    let x = Var::new("x");
    let f = Func::new("e2e_zero");
    f.define_simple([x.clone()], x.expr() + 1).unwrap();
    let name = f.name();
    let run = Pipeline::new(f).realize(&[0]).unwrap();
    assert!(run.buffers[&name].is_empty());
}

#[test]
fn split_tails_cover_non_dividing_extents() {
    // 13 split by 5 under every strategy legal for a pure pipeline.
    for tail in [TailStrategy::GuardWithIf, TailStrategy::ShiftInward, TailStrategy::Predicate] {
        let x = Var::new("x");
        let f = Func::new(format!("e2e_tail_{tail:?}"));
        f.define_simple([x.clone()], x.expr() * 7).unwrap();
        f.split(&x, &Var::new("xo"), &Var::new("xi"), 5, tail).unwrap();
        let name = f.name();
        let got = Pipeline::new(f).realize(&[13]).unwrap().buffers[&name].to_i64_vec();
        let expected: Vec<i64> = (0..13).map(|x| x * 7).collect();
        assert_eq!(got, expected, "tail strategy {tail:?}");
    }
}

#[test]
fn round_up_tail_on_intermediate_overcomputes_safely() {
    // RoundUp is illegal on outputs (it would write outside the
    // caller's buffer) but fine on a root-realized intermediate: the
    // allocation grows to cover the overshoot.
    let x = Var::new("x");
    let f = Func::new("e2e_roundup_f");
    f.define_simple([x.clone()], x.expr() * 5).unwrap();
    f.compute_root().unwrap();
    f.split(&x, &Var::new("xo"), &Var::new("xi"), 4, TailStrategy::RoundUp).unwrap();

    let g = Func::new("e2e_roundup_g");
    g.define_simple([x.clone()], f.at([x.expr()]) + 1).unwrap();
    let name = g.name();

    let got = Pipeline::new(g).realize(&[10]).unwrap().buffers[&name].to_i64_vec();
    let expected: Vec<i64> = (0..10).map(|x| x * 5 + 1).collect();
    assert_eq!(got, expected);
}

#[test]
fn round_up_tail_on_output_is_rejected() {
    let x = Var::new("x");
    let f = Func::new("e2e_roundup_out");
    f.define_simple([x.clone()], x.expr()).unwrap();
    f.split(&x, &Var::new("xo"), &Var::new("xi"), 4, TailStrategy::RoundUp).unwrap();
    let err = Pipeline::new(f).realize(&[10]).unwrap_err();
    assert!(matches!(err, crate::Error::Lower { .. }));
}

#[test]
fn parallel_histogram_without_atomic_is_rejected() {
    let i = Var::new("i");
    let input = Func::new("hazard_in");
    input.define_simple([i.clone()], i.expr() % 16).unwrap();

    let hist = Func::new("hazard_hist");
    hist.define_simple([i.clone()], Expr::int(0)).unwrap();
    let r = RDom::single("r", Expr::int(0), Expr::int(100));
    let bucket = input.at([r.x().expr()]);
    hist.update(vec![bucket.clone()], vec![hist.at([bucket]) + 1], Some(&r)).unwrap();
    hist.update_stage(0).parallel(&Var::new("r$x")).unwrap();

    let err = Pipeline::new(hist).realize(&[16]).unwrap_err();
    assert!(matches!(err, crate::Error::Lower { .. }));
}

#[test]
fn atomic_licenses_parallel_histogram() {
    let i = Var::new("i");
    let input = Func::new("atomic_in");
    input.define_simple([i.clone()], i.expr() % 16).unwrap();

    let hist = Func::new("atomic_hist");
    hist.define_simple([i.clone()], Expr::int(0)).unwrap();
    let r = RDom::single("r", Expr::int(0), Expr::int(1600));
    let bucket = input.at([r.x().expr()]);
    hist.update(vec![bucket.clone()], vec![hist.at([bucket]) + 1], Some(&r)).unwrap();
    hist.atomic().unwrap();
    hist.update_stage(0).parallel(&Var::new("r$x")).unwrap();

    let name = hist.name();
    let got = Pipeline::new(hist).realize(&[16]).unwrap().buffers[&name].to_i64_vec();
    assert_eq!(got, vec![100i64; 16]);
}

#[test]
fn rdom_predicate_gates_iterations() {
    // sum(r) for even r below 10: 0 + 2 + 4 + 6 + 8 = 20.
    let x = Var::new("x");
    let total = Func::new("e2e_pred_sum");
    total.define_simple([x.clone()], Expr::int(0)).unwrap();
    let r = RDom::single("r", Expr::int(0), Expr::int(10))
        .where_(Expr::cmp_eq(Expr::var("r$x") % 2, Expr::int(0)));
    total
        .update(
            vec![x.expr()],
            vec![total.at([x.expr()]) + Expr::var("r$x")],
            Some(&r),
        )
        .unwrap();
    let name = total.name();
    let got = Pipeline::new(total).realize(&[1]).unwrap().buffers[&name].to_i64_vec();
    assert_eq!(got, vec![20]);
}

#[test]
fn scalar_params_flow_to_runtime() {
    let x = Var::new("x");
    let f = Func::new("e2e_param");
    f.define_simple([x.clone()], x.expr() + Expr::var("offset")).unwrap();
    let name = f.name();

    let pipeline = Pipeline::new(f);
    let module = pipeline.compile_to_module(&[4], &CompileOptions::default()).unwrap();
    assert!(module.params.iter().any(|p| p.name == "offset"));

    let run = pipeline
        .realize_with(
            &[4],
            RunEnv::new().with_scalar("offset", ConstValue::Int(100)),
            &CompileOptions::default(),
        )
        .unwrap();
    assert_eq!(run.buffers[&name].to_i64_vec(), vec![100, 101, 102, 103]);
}
