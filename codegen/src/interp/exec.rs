//! The tree-walking execution engine.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use rill_dtype::Type;
use rill_ir::eval::{eval_binary, eval_unary};
use rill_ir::{BinaryOp, CallType, ConstValue, Expr, ExprNode, ForKind, Stmt, StmtNode};

use crate::backend::RunEnv;
use crate::buffer::Buffer;
use crate::error::{RuntimeError, runtime_codes};
use crate::module::{LoweredModule, ParallelClosure, runtime_names};

use super::value::Value;

type RunResult<T = ()> = std::result::Result<T, RuntimeError>;

fn unsupported(message: impl Into<String>) -> RuntimeError {
    RuntimeError::new(runtime_codes::UNSUPPORTED_IR, message)
}

/// State shared across parallel iterations.
struct Shared {
    buffers: RwLock<HashMap<String, Buffer>>,
    /// Held across `Atomic` bodies so multi-store updates are
    /// indivisible with respect to each other.
    atomic_lock: Mutex<()>,
    closures: HashMap<String, ParallelClosure>,
}

/// One execution context: lexical variables are private, buffers are
/// shared. Parallel loops clone the context per worker.
pub(super) struct Machine {
    vars: HashMap<String, Value>,
    shared: Arc<Shared>,
}

impl Machine {
    pub(super) fn new(module: &LoweredModule, env: &RunEnv) -> RunResult<Self> {
        let mut vars: HashMap<String, Value> = HashMap::new();
        for (name, value) in &env.scalars {
            vars.insert(name.clone(), Value::Scalar(*value));
        }
        // Buffer metadata symbols: <buf>.min.<d> / <buf>.extent.<d> /
        // <buf>.stride.<d>, bound from the descriptors.
        for (name, buffer) in &env.buffers {
            for (d, spec) in buffer.dims().iter().enumerate() {
                vars.insert(format!("{name}.min.{d}"), Value::Scalar(ConstValue::Int(spec.min)));
                vars.insert(format!("{name}.extent.{d}"), Value::Scalar(ConstValue::Int(spec.extent)));
                vars.insert(format!("{name}.stride.{d}"), Value::Scalar(ConstValue::Int(spec.stride)));
            }
        }
        let closures =
            module.closures.iter().map(|c| (c.name.clone(), c.clone())).collect::<HashMap<_, _>>();
        let shared = Arc::new(Shared {
            buffers: RwLock::new(env.buffers.clone()),
            atomic_lock: Mutex::new(()),
            closures,
        });
        Ok(Self { vars, shared })
    }

    /// Move the (possibly rewritten) buffers back into the caller's
    /// environment.
    pub(super) fn finish(self, env: &mut RunEnv) {
        let buffers = std::mem::take(&mut *self.shared.buffers.write());
        env.buffers = buffers;
    }

    fn fork(&self) -> Machine {
        Machine { vars: self.vars.clone(), shared: Arc::clone(&self.shared) }
    }

    /// Bind a variable for the duration of `f`, restoring any shadowed
    /// binding afterwards.
    fn scoped<R>(&mut self, name: &str, value: Value, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.vars.insert(name.to_string(), value);
        let out = f(self);
        match saved {
            Some(old) => {
                self.vars.insert(name.to_string(), old);
            }
            None => {
                self.vars.remove(name);
            }
        }
        out
    }

    // =====================================================================
    // Expressions
    // =====================================================================

    fn eval(&mut self, e: &Expr) -> RunResult<Value> {
        match e.node() {
            ExprNode::IntImm(v) => Ok(Value::Scalar(ConstValue::Int(*v))),
            ExprNode::UIntImm(v) => Ok(Value::Scalar(ConstValue::UInt(*v))),
            ExprNode::FloatImm(v) => Ok(Value::Scalar(ConstValue::Float(*v))),
            ExprNode::StringImm(s) => Ok(Value::Str(s.clone())),
            ExprNode::Var(name) => self.vars.get(name).cloned().ok_or_else(|| {
                RuntimeError::new(runtime_codes::UNDEFINED_SYMBOL, format!("undefined symbol {name:?}"))
            }),
            ExprNode::Cast { value } => {
                let ty = e.ty();
                let inner = self.eval(value)?;
                let lanes = (0..inner.lanes())
                    .map(|i| Ok(inner.lane(i)?.cast_to(&ty.element_of())))
                    .collect::<RunResult<SmallVec<_>>>()?;
                Ok(Value::from_lanes(lanes))
            }
            ExprNode::Unary(op, a) => {
                let ty = a.ty().element_of();
                let inner = self.eval(a)?;
                let lanes = (0..inner.lanes())
                    .map(|i| {
                        eval_unary(*op, &ty, inner.lane(i)?)
                            .ok_or_else(|| unsupported(format!("cannot evaluate {op:?}")))
                    })
                    .collect::<RunResult<SmallVec<_>>>()?;
                Ok(Value::from_lanes(lanes))
            }
            ExprNode::Binary(op, a, b) => {
                let ty = a.ty().element_of();
                let lhs = self.eval(a)?;
                let rhs = self.eval(b)?;
                let lanes = lhs.lanes().max(rhs.lanes());
                let out = (0..lanes)
                    .map(|i| scalar_binary(*op, &ty, lhs.lane(i)?, rhs.lane(i)?))
                    .collect::<RunResult<SmallVec<_>>>()?;
                Ok(Value::from_lanes(out))
            }
            ExprNode::Select { condition, true_value, false_value } => {
                let cond = self.eval(condition)?;
                let t = self.eval(true_value)?;
                let f = self.eval(false_value)?;
                let lanes = t.lanes().max(f.lanes()).max(cond.lanes());
                let out = (0..lanes)
                    .map(|i| {
                        let pick = if cond.lanes() == 1 { cond.as_bool_lane(0)? } else { cond.as_bool_lane(i)? };
                        if pick { t.lane(i) } else { f.lane(i) }
                    })
                    .collect::<RunResult<SmallVec<_>>>()?;
                Ok(Value::from_lanes(out))
            }
            ExprNode::Load { buffer, index, predicate } => {
                let index = self.eval(index)?;
                let predicate = predicate.as_ref().map(|p| self.eval(p)).transpose()?;
                let elem = e.ty().element_of();
                let buffers = self.shared.buffers.read();
                let buf = buffers
                    .get(buffer)
                    .ok_or_else(|| unsupported(format!("load from unknown buffer {buffer:?}")))?;
                let out = (0..index.lanes())
                    .map(|i| {
                        let masked_off = match &predicate {
                            Some(p) => !p.as_bool_lane(if p.lanes() == 1 { 0 } else { i })?,
                            None => false,
                        };
                        if masked_off {
                            return Ok(Value::zero_of(&elem));
                        }
                        let flat = index.lane(i)?.as_i64().ok_or_else(|| {
                            unsupported("non-integer load index")
                        })?;
                        buf.get_flat(flat)
                    })
                    .collect::<RunResult<SmallVec<_>>>()?;
                Ok(Value::from_lanes(out))
            }
            ExprNode::Ramp { base, stride, lanes } => {
                let base = self.eval(base)?.as_i64()?;
                let stride = self.eval(stride)?.as_i64()?;
                let out =
                    (0..*lanes as i64).map(|i| ConstValue::Int(base + i * stride)).collect::<SmallVec<_>>();
                Ok(Value::from_lanes(out))
            }
            ExprNode::Broadcast { value, lanes } => {
                let v = self.eval(value)?.as_scalar()?;
                Ok(Value::Vector((0..*lanes).map(|_| v).collect()))
            }
            ExprNode::Shuffle { vectors, indices } => {
                let mut pool: SmallVec<[ConstValue; 8]> = SmallVec::new();
                for v in vectors {
                    let value = self.eval(v)?;
                    for i in 0..value.lanes() {
                        pool.push(value.lane(i)?);
                    }
                }
                let out = indices
                    .iter()
                    .map(|&i| {
                        pool.get(i as usize).copied().ok_or_else(|| {
                            RuntimeError::new(runtime_codes::BAD_INDEX, format!("shuffle lane {i}"))
                        })
                    })
                    .collect::<RunResult<SmallVec<_>>>()?;
                Ok(Value::from_lanes(out))
            }
            ExprNode::Call { name, args, call_type, .. } => match call_type {
                CallType::Intrinsic => match name.as_str() {
                    // Branch-prediction hints are semantically identity.
                    "likely" | "likely_if_innermost" => self.eval(&args[0]),
                    _ => Err(unsupported(format!("unknown intrinsic {name:?}"))),
                },
                CallType::Extern => {
                    Err(unsupported(format!("extern call {name:?} in value position")))
                }
                CallType::Function | CallType::Image => {
                    Err(unsupported(format!("unlowered access to {name:?} reached the backend")))
                }
            },
            ExprNode::Let { name, value, body } => {
                let bound = self.eval(value)?;
                self.scoped(name, bound, |m| m.eval(body))
            }
        }
    }

    // =====================================================================
    // Statements
    // =====================================================================

    pub(super) fn run(&mut self, s: &Stmt) -> RunResult {
        match s.node() {
            StmtNode::LetStmt { name, value, body } => {
                let bound = self.eval(value)?;
                self.scoped(name, bound, |m| m.run(body))
            }
            StmtNode::AssertStmt { condition, message } => {
                if self.eval(condition)?.as_bool_lane(0)? {
                    Ok(())
                } else if let Some(detail) = message.strip_prefix("bounds: ") {
                    Err(RuntimeError::bounds(detail.to_string()))
                } else {
                    Err(RuntimeError::new(runtime_codes::ASSERT_FAILED, message.clone()))
                }
            }
            StmtNode::Block { stmts } => {
                for s in stmts {
                    self.run(s)?;
                }
                Ok(())
            }
            StmtNode::IfThenElse { condition, then_case, else_case } => {
                if self.eval(condition)?.as_bool_lane(0)? {
                    self.run(then_case)
                } else if let Some(e) = else_case {
                    self.run(e)
                } else {
                    Ok(())
                }
            }
            StmtNode::For { var, min, extent, kind, body } => {
                let min = self.eval(min)?.as_i64()?;
                let extent = self.eval(extent)?.as_i64()?;
                match kind {
                    ForKind::Parallel => self.run_parallel(var, min, extent, body),
                    // Serial, unrolled, vectorized remnants and GPU loop
                    // forms all execute in ascending order here.
                    _ => {
                        for i in min..min + extent {
                            self.scoped(var, Value::Scalar(ConstValue::Int(i)), |m| m.run(body))?;
                        }
                        Ok(())
                    }
                }
            }
            StmtNode::Store { buffer, index, value, predicate } => {
                let index = self.eval(index)?;
                let value = self.eval(value)?;
                let predicate = predicate.as_ref().map(|p| self.eval(p)).transpose()?;
                let mut buffers = self.shared.buffers.write();
                let buf = buffers
                    .get_mut(buffer)
                    .ok_or_else(|| unsupported(format!("store to unknown buffer {buffer:?}")))?;
                for i in 0..index.lanes().max(value.lanes()) {
                    let masked_off = match &predicate {
                        Some(p) => !p.as_bool_lane(if p.lanes() == 1 { 0 } else { i })?,
                        None => false,
                    };
                    if masked_off {
                        continue;
                    }
                    let flat = index
                        .lane(if index.lanes() == 1 { 0 } else { i })?
                        .as_i64()
                        .ok_or_else(|| unsupported("non-integer store index"))?;
                    buf.set_flat(flat, value.lane(if value.lanes() == 1 { 0 } else { i })?)?;
                }
                Ok(())
            }
            StmtNode::Allocate { name, ty, extents, condition, body, .. } => {
                let wanted = match condition {
                    Some(c) => self.eval(c)?.as_bool_lane(0)?,
                    None => true,
                };
                if wanted {
                    let extents = extents
                        .iter()
                        .map(|e| self.eval(e)?.as_i64())
                        .collect::<RunResult<Vec<i64>>>()?;
                    let buffer = Buffer::new_dense(*ty, &extents);
                    self.shared.buffers.write().insert(name.clone(), buffer);
                }
                let out = self.run(body);
                // LIFO lifetime: gone when the scope ends, whether or
                // not an early Free already removed it.
                self.shared.buffers.write().remove(name);
                out
            }
            StmtNode::Free { name } => {
                self.shared.buffers.write().remove(name);
                Ok(())
            }
            StmtNode::ProducerConsumer { body, .. } => self.run(body),
            StmtNode::Evaluate { value } => self.run_call(value),
            StmtNode::Prefetch { .. } => Ok(()),
            StmtNode::Atomic { body } => {
                let shared = Arc::clone(&self.shared);
                let _guard = shared.atomic_lock.lock();
                self.run(body)
            }
            StmtNode::Provide { name, .. } | StmtNode::Realize { name, .. } => {
                Err(unsupported(format!("unflattened access to {name:?} reached the backend")))
            }
        }
    }

    /// Runtime calls in statement position.
    fn run_call(&mut self, e: &Expr) -> RunResult {
        let ExprNode::Call { name, args, call_type: CallType::Extern, .. } = e.node() else {
            // A bare expression evaluated for effect; run it and drop.
            return self.eval(e).map(|_| ());
        };
        match name.as_str() {
            runtime_names::PAR_FOR => {
                let Value::Str(closure_name) = self.eval(&args[0])? else {
                    return Err(unsupported("par_for expects a closure name"));
                };
                let min = self.eval(&args[1])?.as_i64()?;
                let extent = self.eval(&args[2])?.as_i64()?;
                let closure = self
                    .shared
                    .closures
                    .get(&closure_name)
                    .cloned()
                    .ok_or_else(|| unsupported(format!("unknown closure {closure_name:?}")))?;
                self.run_parallel(&closure.var, min, extent, &closure.body)
            }
            runtime_names::COPY_TO_DEVICE | runtime_names::COPY_TO_HOST => {
                let Value::Str(buffer) = self.eval(&args[0])? else {
                    return Err(unsupported("device copy expects a buffer name"));
                };
                let mut buffers = self.shared.buffers.write();
                if let Some(buf) = buffers.get_mut(&buffer) {
                    buf.device = (name.as_str() == runtime_names::COPY_TO_DEVICE) as u64;
                }
                Ok(())
            }
            _ => Err(unsupported(format!("unknown runtime call {name:?}"))),
        }
    }

    /// Execute a loop body across worker threads. Iterations are
    /// independent by construction; each worker gets its own lexical
    /// environment and shares the buffer map.
    fn run_parallel(&mut self, var: &str, min: i64, extent: i64, body: &Stmt) -> RunResult {
        if extent <= 0 {
            return Ok(());
        }
        let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let workers = workers.min(extent as usize).max(1);
        if workers == 1 {
            for i in min..min + extent {
                self.scoped(var, Value::Scalar(ConstValue::Int(i)), |m| m.run(body))?;
            }
            return Ok(());
        }

        let chunk = (extent as usize).div_ceil(workers) as i64;
        let first_error: Mutex<Option<RuntimeError>> = Mutex::new(None);
        std::thread::scope(|scope| {
            for w in 0..workers as i64 {
                let lo = min + w * chunk;
                let hi = (lo + chunk).min(min + extent);
                if lo >= hi {
                    continue;
                }
                let mut machine = self.fork();
                let first_error = &first_error;
                scope.spawn(move || {
                    for i in lo..hi {
                        let out =
                            machine.scoped(var, Value::Scalar(ConstValue::Int(i)), |m| m.run(body));
                        if let Err(e) = out {
                            first_error.lock().get_or_insert(e);
                            return;
                        }
                    }
                });
            }
        });
        match first_error.into_inner() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Scalar binary evaluation with run-time semantics: signed overflow
/// wraps (the compile-time folder declines instead, because folding
/// would hide undefined behavior), division by zero faults.
fn scalar_binary(op: BinaryOp, ty: &Type, a: ConstValue, b: ConstValue) -> RunResult<ConstValue> {
    if let Some(v) = eval_binary(op, ty, a, b) {
        return Ok(v);
    }
    match (op, a, b) {
        (BinaryOp::Add, ConstValue::Int(x), ConstValue::Int(y)) => {
            Ok(ConstValue::Int(x.wrapping_add(y)).cast_to(ty))
        }
        (BinaryOp::Sub, ConstValue::Int(x), ConstValue::Int(y)) => {
            Ok(ConstValue::Int(x.wrapping_sub(y)).cast_to(ty))
        }
        (BinaryOp::Mul, ConstValue::Int(x), ConstValue::Int(y)) => {
            Ok(ConstValue::Int(x.wrapping_mul(y)).cast_to(ty))
        }
        (BinaryOp::Div | BinaryOp::Mod, _, _) => {
            Err(RuntimeError::new(runtime_codes::BAD_INDEX, "division by zero"))
        }
        _ => Err(unsupported(format!("cannot evaluate {op:?} on {a:?}, {b:?}"))),
    }
}
