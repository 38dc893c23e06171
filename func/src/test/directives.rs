//! Scheduling directive tests: pure setters over schedule records.

use crate::{Error, Func, LoopLevel, SplitKind, TailStrategy, Var};
use rill_ir::ForKind;

fn defined(name: &str) -> (Func, Var, Var) {
    let (x, y) = (Var::new("x"), Var::new("y"));
    let f = Func::new(name);
    f.define_simple([x.clone(), y.clone()], &x + &y).unwrap();
    (f, x, y)
}

#[test]
fn default_dims_put_first_arg_innermost() {
    let (f, _, _) = defined("dir_default");
    let stage = f.0.read().pure_stage.clone();
    let names: Vec<&str> = stage.dims.iter().map(|d| d.leaf_name()).collect();
    assert_eq!(names, vec!["y", "x"]);
}

#[test]
fn split_replaces_dim_with_hierarchical_pair() {
    let (f, x, _) = defined("dir_split");
    let (xo, xi) = (Var::new("xo"), Var::new("xi"));
    f.split(&x, &xo, &xi, 8, TailStrategy::GuardWithIf).unwrap();

    let stage = f.0.read().pure_stage.clone();
    let names: Vec<&str> = stage.dims.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["y", "x.xo", "x.xi"]);
    assert!(matches!(&stage.splits[0], SplitKind::Split { old, .. } if old == "x"));
}

#[test]
fn split_reusing_old_name_keeps_it_addressable() {
    let (f, x, _) = defined("dir_split_reuse");
    let xi = Var::new("xi");
    f.split(&x, &x, &xi, 8, TailStrategy::GuardWithIf).unwrap();
    // The outer loop still answers to "x".
    f.parallel(&x).unwrap();
    let stage = f.0.read().pure_stage.clone();
    assert_eq!(stage.dim("x").map(|d| d.kind), Some(ForKind::Parallel));
}

#[test]
fn nonpositive_split_factor_is_rejected() {
    let (f, x, _) = defined("dir_bad_factor");
    let err = f.split(&x, &Var::new("xo"), &Var::new("xi"), 0, TailStrategy::GuardWithIf).unwrap_err();
    assert!(matches!(err, Error::BadSplit { .. }));
}

#[test]
fn mark_conflicts_are_diagnosed() {
    let (f, x, _) = defined("dir_conflict");
    f.parallel(&x).unwrap();
    let err = f.vectorize_dim(&x).unwrap_err();
    assert!(matches!(err, Error::ScheduleConflict { .. }));
}

#[test]
fn unknown_dims_are_diagnosed() {
    let (f, _, _) = defined("dir_unknown");
    let err = f.parallel(&Var::new("zzz")).unwrap_err();
    assert!(matches!(err, Error::UnknownDimension { .. }));
}

#[test]
fn tile_is_two_splits_and_a_reorder() {
    let (f, x, y) = defined("dir_tile");
    let (xi, yi) = (Var::new("xi"), Var::new("yi"));
    f.tile_(&x, &y, &xi, &yi, 32, 32).unwrap();

    let stage = f.0.read().pure_stage.clone();
    let names: Vec<&str> = stage.dims.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["y.y", "x.x", "y.yi", "x.xi"]);
    assert_eq!(stage.splits.len(), 2);
}

#[test]
fn compute_at_records_level() {
    let (f, x, _) = defined("dir_level_f");
    let (g, _, _) = defined("dir_level_g");
    g.compute_at(&f, &x).unwrap();
    let schedule = g.0.read().schedule.clone();
    assert_eq!(
        schedule.compute_level,
        LoopLevel::At { func: f.name(), var: "x".to_string() }
    );
    // Store follows compute when unset.
    assert_eq!(schedule.store_level, schedule.compute_level);
}

#[test]
fn loop_level_matches_hierarchical_names() {
    let level = LoopLevel::At { func: "blur_y".to_string(), var: "x".to_string() };
    assert!(level.matches_loop("blur_y.s0.x.x"));
    assert!(level.matches_loop("blur_y.s0.x"));
    assert!(!level.matches_loop("blur_y.s0.x.xi"));
    assert!(!level.matches_loop("other.s0.x"));
    assert!(!level.matches_loop("blur_y.s1.x"));
}

#[test]
fn vectorize_splits_and_marks() {
    let (f, x, _) = defined("dir_vec");
    f.vectorize(&x, 8).unwrap();
    let stage = f.0.read().pure_stage.clone();
    assert_eq!(stage.dim("xv").map(|d| d.kind), Some(ForKind::Vectorized));
    assert!(matches!(&stage.splits[0],
        SplitKind::Split { tail: TailStrategy::GuardWithIf, .. }));
}

#[test]
fn fuse_combines_dims() {
    let (f, x, y) = defined("dir_fuse");
    f.fuse(&y, &x, &Var::new("t")).unwrap();
    let stage = f.0.read().pure_stage.clone();
    assert_eq!(stage.dims.len(), 1);
    assert!(matches!(&stage.splits[0], SplitKind::Fuse { .. }));
}
