//! Lowering integration tests: from a frozen graph to a final module.

use std::collections::HashMap;
use std::str::FromStr;

use rill_codegen::{Backend, Buffer, InterpreterBackend, RunEnv, Target};
use rill_func::{Func, Var, build_environment};
use rill_ir::Type;

use crate::driver::{CancelToken, LowerOptions, lower};

fn host() -> Target {
    Target::from_str("x86-64-linux").unwrap()
}

fn extents(name: &str, e: &[i64]) -> HashMap<String, Vec<i64>> {
    let mut m = HashMap::new();
    m.insert(name.to_string(), e.to_vec());
    m
}

#[test]
fn gradient_lowers_and_runs() {
    let (x, y) = (Var::new("x"), Var::new("y"));
    let f = Func::new("grad_lower");
    f.define_simple([x.clone(), y.clone()], &x + &y).unwrap();
    let name = f.name();

    let env = build_environment(&[f]).unwrap();
    let module = lower(&env, &host(), &extents(&name, &[4, 4]), &LowerOptions::default()).unwrap();

    // One output buffer, int32, two dimensions; nothing else.
    assert_eq!(module.buffers.len(), 1);
    assert_eq!(module.buffers[0].name, name);
    assert!(module.buffers[0].is_output);
    assert_eq!(module.buffers[0].dimensions, 2);
    assert!(module.params.is_empty());

    let callable = InterpreterBackend.compile(&module).unwrap();
    let mut run = RunEnv::new().with_buffer(&name, Buffer::new_dense(Type::int32(), &[4, 4]));
    callable.call(&mut run).unwrap();
    // Storage order: x has stride 1, so flat order is x-fastest.
    let expected: Vec<i64> = (0..4).flat_map(|y| (0..4).map(move |x| x + y)).collect();
    assert_eq!(run.buffers[&name].to_i64_vec(), expected);
}

#[test]
fn compute_root_producer_gets_realized_and_freed() {
    let x = Var::new("x");
    let producer = Func::new("root_producer");
    producer.define_simple([x.clone()], x.expr() * 2).unwrap();
    producer.compute_root().unwrap();
    let producer_name = producer.name();

    let consumer = Func::new("root_consumer");
    consumer.define_simple([x.clone()], producer.at([x.expr()]) + 1).unwrap();
    let consumer_name = consumer.name();

    let env = build_environment(&[consumer]).unwrap();
    let module =
        lower(&env, &host(), &extents(&consumer_name, &[10]), &LowerOptions::default()).unwrap();
    let text = module.stmt.to_string();

    // The producer's storage appears as a scoped allocation with an
    // early free; the consumer loads from it.
    assert!(text.contains(&format!("allocate {producer_name}[")), "no allocation in:\n{text}");
    assert!(text.contains(&format!("free {producer_name}")), "no early free in:\n{text}");

    let callable = InterpreterBackend.compile(&module).unwrap();
    let mut run =
        RunEnv::new().with_buffer(&consumer_name, Buffer::new_dense(Type::int32(), &[10]));
    callable.call(&mut run).unwrap();
    let got = run.buffers[&consumer_name].to_i64_vec();
    assert_eq!(got, (0..10).map(|x| x * 2 + 1).collect::<Vec<i64>>());
}

#[test]
fn unconsumed_functions_are_elided() {
    use crate::lowering::inject_realization;
    use rill_ir::{Expr, Stmt};

    let x = Var::new("x");
    let producer = Func::new("elide_producer");
    producer.define_simple([x.clone()], x.expr() * 3).unwrap();
    producer.compute_root().unwrap();
    let producer_name = producer.name();

    let out = Func::new("elide_out");
    out.define_simple([x.clone()], producer.at([x.expr()]) + 1).unwrap();

    let env = build_environment(&[out]).unwrap();
    let f = env.functions[&producer_name].clone();

    // A consumer tree that never mentions the producer: injection is a
    // no-op and the function vanishes from the pipeline.
    let unrelated = Stmt::store("other", Expr::var("x"), Expr::f32(0.0), None);
    let injected = inject_realization(unrelated.clone(), &f, &env).unwrap();
    assert_eq!(injected, unrelated);
}

#[test]
fn compute_at_places_producer_inside_consumer_loop() {
    let (x, y) = (Var::new("x"), Var::new("y"));
    let producer = Func::new("at_producer");
    producer.define_simple([x.clone(), y.clone()], &x * &y).unwrap();
    let producer_name = producer.name();

    let consumer = Func::new("at_consumer");
    consumer
        .define_simple([x.clone(), y.clone()], producer.at([x.expr(), y.expr()]) + 1)
        .unwrap();
    let consumer_name = consumer.name();

    producer.compute_at(&consumer, &y).unwrap();

    let env = build_environment(&[consumer]).unwrap();
    let module =
        lower(&env, &host(), &extents(&consumer_name, &[4, 4]), &LowerOptions::default()).unwrap();

    // The producer allocation sits inside the consumer's y loop: the
    // allocate line appears after the loop opens.
    let text = module.stmt.to_string();
    let loop_pos = text.find(&format!("for ({consumer_name}.s0.y")).expect("consumer y loop");
    let alloc_pos =
        text.find(&format!("allocate {producer_name}")).expect("producer allocation");
    assert!(alloc_pos > loop_pos, "allocation outside consumer loop:\n{text}");

    let callable = InterpreterBackend.compile(&module).unwrap();
    let mut run =
        RunEnv::new().with_buffer(&consumer_name, Buffer::new_dense(Type::int32(), &[4, 4]));
    callable.call(&mut run).unwrap();
    let got = run.buffers[&consumer_name].to_i64_vec();
    let expected: Vec<i64> = (0..4).flat_map(|y| (0..4).map(move |x| x * y + 1)).collect();
    assert_eq!(got, expected);
}

#[test]
fn cancellation_stops_at_pass_boundary() {
    let x = Var::new("x");
    let f = Func::new("cancel_f");
    f.define_simple([x.clone()], x.expr() + 1).unwrap();
    let name = f.name();

    let cancel = CancelToken::new();
    cancel.cancel();
    let options = LowerOptions { fast_math: false, cancel: Some(cancel) };
    let env = build_environment(&[f]).unwrap();
    let err = lower(&env, &host(), &extents(&name, &[4]), &options).unwrap_err();
    assert!(matches!(err, crate::Error::Cancelled { .. }));
}

#[test]
fn gpu_schedule_requires_gpu_target() {
    let (x, y) = (Var::new("x"), Var::new("y"));
    let f = Func::new("gpu_f");
    f.define_simple([x.clone(), y.clone()], &x + &y).unwrap();
    f.gpu_tile(&x, &y, &Var::new("bx"), &Var::new("by"), &Var::new("tx"), &Var::new("ty"), 8, 8)
        .unwrap();
    let name = f.name();

    let env = build_environment(&[f]).unwrap();
    let err = lower(&env, &host(), &extents(&name, &[32, 32]), &LowerOptions::default())
        .unwrap_err();
    assert!(matches!(err, crate::Error::Target { .. }));

    // The same schedule compiles for a GPU target.
    let gpu = Target::from_str("x86-64-linux-gpu").unwrap();
    lower(&env, &gpu, &extents(&name, &[32, 32]), &LowerOptions::default()).unwrap();
}
