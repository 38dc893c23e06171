//! Interpreter backend tests over hand-built statement trees.

use std::str::FromStr;

use crate::backend::{Backend, RunEnv};
use crate::buffer::Buffer;
use crate::interp::InterpreterBackend;
use crate::module::{BufferInfo, DeviceAffinity, LoweredModule, ParallelClosure, runtime_names};
use crate::target::Target;
use rill_dtype::Type;
use rill_ir::{CallType, ConstValue, Expr, ForKind, Stmt};

fn module(stmt: Stmt, buffers: Vec<BufferInfo>, closures: Vec<ParallelClosure>) -> LoweredModule {
    LoweredModule {
        stmt,
        buffers,
        params: Vec::new(),
        closures,
        target: Target::from_str("x86-64-linux").unwrap(),
    }
}

fn out_info(name: &str, ty: Type, dimensions: usize) -> BufferInfo {
    BufferInfo {
        name: name.to_string(),
        ty,
        dimensions,
        is_input: false,
        is_output: true,
        affinity: DeviceAffinity::Host,
    }
}

fn run(module: &LoweredModule, env: &mut RunEnv) {
    let callable = InterpreterBackend.compile(module).unwrap();
    callable.call(env).unwrap();
}

#[test]
fn serial_loop_stores_ascending() {
    // for (x, 0, 8) { out[x] = x * 2 }
    let x = Expr::var("x");
    let body = Stmt::store("out", x.clone(), Expr::mul(x.clone(), Expr::int(2)), None);
    let stmt = Stmt::for_("x", Expr::int(0), Expr::int(8), ForKind::Serial, body);
    let m = module(stmt, vec![out_info("out", Type::int32(), 1)], vec![]);

    let mut env = RunEnv::new().with_buffer("out", Buffer::new_dense(Type::int32(), &[8]));
    run(&m, &mut env);
    assert_eq!(env.buffers["out"].to_i64_vec(), vec![0, 2, 4, 6, 8, 10, 12, 14]);
}

#[test]
fn vector_store_writes_dense_lanes() {
    // out[ramp(0, 1, 4)] = ramp(10, 10, 4)
    let stmt = Stmt::store(
        "out",
        Expr::ramp(Expr::int(0), Expr::int(1), 4),
        Expr::ramp(Expr::int(10), Expr::int(10), 4),
        None,
    );
    let m = module(stmt, vec![out_info("out", Type::int32(), 1)], vec![]);
    let mut env = RunEnv::new().with_buffer("out", Buffer::new_dense(Type::int32(), &[4]));
    run(&m, &mut env);
    assert_eq!(env.buffers["out"].to_i64_vec(), vec![10, 20, 30, 40]);
}

#[test]
fn predicated_store_masks_lanes() {
    // out[ramp(0,1,4) if lane < 3] = broadcast(1, 4)
    let pred = Expr::cmp_lt(Expr::ramp(Expr::int(0), Expr::int(1), 4), Expr::broadcast(Expr::int(3), 4));
    let stmt = Stmt::store(
        "out",
        Expr::ramp(Expr::int(0), Expr::int(1), 4),
        Expr::broadcast(Expr::int(1), 4),
        Some(pred),
    );
    let m = module(stmt, vec![out_info("out", Type::int32(), 1)], vec![]);
    let mut env = RunEnv::new().with_buffer("out", Buffer::new_dense(Type::int32(), &[4]));
    run(&m, &mut env);
    assert_eq!(env.buffers["out"].to_i64_vec(), vec![1, 1, 1, 0]);
}

#[test]
fn allocations_have_scoped_lifetime() {
    // allocate tmp[4] { tmp[0] = 9; out[0] = tmp[0] }
    let body = Stmt::block(vec![
        Stmt::store("tmp", Expr::int(0), Expr::int(9), None),
        Stmt::store("out", Expr::int(0), Expr::load(Type::int32(), "tmp", Expr::int(0), None), None),
    ]);
    let stmt = Stmt::allocate(
        "tmp",
        Type::int32(),
        rill_ir::MemoryType::Auto,
        vec![Expr::int(4)],
        None,
        body,
    );
    let m = module(stmt, vec![out_info("out", Type::int32(), 1)], vec![]);
    let mut env = RunEnv::new().with_buffer("out", Buffer::new_dense(Type::int32(), &[1]));
    run(&m, &mut env);
    assert_eq!(env.buffers["out"].to_i64_vec(), vec![9]);
    // The temporary does not leak out.
    assert!(!env.buffers.contains_key("tmp"));
}

#[test]
fn parallel_loop_matches_serial() {
    let x = Expr::var("x");
    let body = Stmt::store("out", x.clone(), Expr::mul(x.clone(), Expr::int(3)), None);

    let serial = module(
        Stmt::for_("x", Expr::int(0), Expr::int(100), ForKind::Serial, body.clone()),
        vec![out_info("out", Type::int32(), 1)],
        vec![],
    );
    let mut serial_env = RunEnv::new().with_buffer("out", Buffer::new_dense(Type::int32(), &[100]));
    run(&serial, &mut serial_env);

    let parallel = module(
        Stmt::for_("x", Expr::int(0), Expr::int(100), ForKind::Parallel, body),
        vec![out_info("out", Type::int32(), 1)],
        vec![],
    );
    let mut parallel_env = RunEnv::new().with_buffer("out", Buffer::new_dense(Type::int32(), &[100]));
    run(&parallel, &mut parallel_env);

    assert_eq!(serial_env.buffers["out"].to_i64_vec(), parallel_env.buffers["out"].to_i64_vec());
}

#[test]
fn par_for_runtime_call_runs_closure() {
    let x = Expr::var("x");
    let closure = ParallelClosure {
        name: "out.s0.x.par".to_string(),
        var: "x".to_string(),
        body: Stmt::store("out", x.clone(), Expr::add(x.clone(), Expr::int(1)), None),
    };
    let call = Expr::call(
        Type::int32(),
        runtime_names::PAR_FOR,
        vec![Expr::string_imm("out.s0.x.par"), Expr::int(0), Expr::int(16)],
        CallType::Extern,
    );
    let m = module(Stmt::evaluate(call), vec![out_info("out", Type::int32(), 1)], vec![closure]);
    let mut env = RunEnv::new().with_buffer("out", Buffer::new_dense(Type::int32(), &[16]));
    run(&m, &mut env);
    assert_eq!(env.buffers["out"].to_i64_vec(), (1..=16).collect::<Vec<i64>>());
}

#[test]
fn failed_assert_surfaces_with_code() {
    let stmt = Stmt::assert_stmt(Expr::bool_(false), "bounds: input too small");
    let m = module(stmt, vec![out_info("out", Type::int32(), 1)], vec![]);
    let callable = InterpreterBackend.compile(&m).unwrap();
    let mut env = RunEnv::new().with_buffer("out", Buffer::new_dense(Type::int32(), &[1]));
    let err = callable.call(&mut env).unwrap_err();
    assert_eq!(err.code, crate::error::runtime_codes::BOUNDS_VIOLATION);
}

#[test]
fn scalar_params_resolve_as_vars() {
    let stmt = Stmt::store("out", Expr::int(0), Expr::var("offset") + 1, None);
    let mut m = module(stmt, vec![out_info("out", Type::int32(), 1)], vec![]);
    m.params.push(crate::module::ScalarParam { name: "offset".to_string(), ty: Type::int32() });
    let mut env = RunEnv::new()
        .with_buffer("out", Buffer::new_dense(Type::int32(), &[1]))
        .with_scalar("offset", ConstValue::Int(41));
    run(&m, &mut env);
    assert_eq!(env.buffers["out"].to_i64_vec(), vec![42]);
}
