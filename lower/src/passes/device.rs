//! Device selection and memory movement.
//!
//! GPU-scheduled loops are validated against the target, host-side
//! allocations inside device loops are rejected, and copy-to-device /
//! copy-from-device runtime calls are wrapped around each outermost
//! device loop's buffer set.

use std::collections::HashSet;

use rill_codegen::module::runtime_names;
use rill_codegen::{Target, error as codegen_error};
use rill_ir::mutator::{Mutator, mutate_stmt_children};
use rill_ir::visitor::{Visitor, walk_expr, walk_stmt};
use rill_ir::{CallType, Expr, ExprNode, MemoryType, Stmt, StmtNode, Type};

use crate::error::{Error, Result};

/// Buffers read and buffers written inside a subtree (flat form).
fn loads_and_stores(s: &Stmt) -> (HashSet<String>, HashSet<String>) {
    struct Uses {
        loads: HashSet<String>,
        stores: HashSet<String>,
    }
    impl Visitor for Uses {
        fn visit_expr(&mut self, e: &Expr) {
            if let ExprNode::Load { buffer, .. } = e.node() {
                self.loads.insert(buffer.clone());
            }
            walk_expr(self, e);
        }
        fn visit_stmt(&mut self, s: &Stmt) {
            if let StmtNode::Store { buffer, .. } = s.node() {
                self.stores.insert(buffer.clone());
            }
            walk_stmt(self, s);
        }
    }
    let mut v = Uses { loads: HashSet::new(), stores: HashSet::new() };
    v.visit_stmt(s);
    (v.loads, v.stores)
}

fn copy_call(symbol: &str, buffer: &str) -> Stmt {
    Stmt::evaluate(Expr::call(
        Type::int32(),
        symbol,
        vec![Expr::string_imm(buffer)],
        CallType::Extern,
    ))
}

struct DeviceLowering<'a> {
    target: &'a Target,
    /// Depth of enclosing device loops.
    device_depth: usize,
    error: Option<Error>,
}

impl Mutator for DeviceLowering<'_> {
    fn mutate_stmt(&mut self, s: &Stmt) -> Stmt {
        if self.error.is_some() {
            return s.clone();
        }
        match s.node() {
            StmtNode::For { var, min, extent, kind, body } if kind.is_gpu() => {
                if !self.target.supports_gpu() {
                    self.error = Some(Error::Target {
                        source: codegen_error::Error::TargetMismatch {
                            target: self.target.to_string(),
                            feature: format!("gpu loop {var}"),
                        },
                    });
                    return s.clone();
                }
                self.device_depth += 1;
                let new_body = self.mutate_stmt(body);
                self.device_depth -= 1;
                let loop_ = Stmt::for_(var.clone(), min.clone(), extent.clone(), *kind, new_body);

                if self.device_depth > 0 {
                    // Inner device loop: the outermost one owns the
                    // copies.
                    return loop_;
                }
                let (loads, stores) = loads_and_stores(&loop_);
                let mut parts = Vec::new();
                let mut sorted_loads: Vec<&String> = loads.iter().collect();
                sorted_loads.sort();
                for buffer in sorted_loads {
                    parts.push(copy_call(runtime_names::COPY_TO_DEVICE, buffer));
                }
                parts.push(loop_);
                let mut sorted_stores: Vec<&String> = stores.iter().collect();
                sorted_stores.sort();
                for buffer in sorted_stores {
                    parts.push(copy_call(runtime_names::COPY_TO_HOST, buffer));
                }
                Stmt::block(parts)
            }
            StmtNode::Allocate { name, memory, .. } if self.device_depth > 0 => {
                // Host-side compute (a host allocation) inside a device
                // loop is illegal; device-local storage is fine.
                if !matches!(memory, MemoryType::GpuShared | MemoryType::Register) {
                    self.error = Some(Error::HostComputeInDeviceLoop {
                        name: name.clone(),
                        loop_var: "<device loop>".to_string(),
                    });
                    return s.clone();
                }
                mutate_stmt_children(self, s)
            }
            _ => mutate_stmt_children(self, s),
        }
    }
}

/// Validate device loops against the target and insert buffer copies.
pub fn device_lowering(stmt: Stmt, target: &Target) -> Result<Stmt> {
    let mut pass = DeviceLowering { target, device_depth: 0, error: None };
    let out = pass.mutate_stmt(&stmt);
    match pass.error {
        Some(e) => Err(e),
        None => Ok(out),
    }
}
