//! Canonical textual form of the IR.
//!
//! The printed form is deterministic and is what golden tests compare.
//! Expressions print fully parenthesized, which keeps the grammar in
//! [`crate::parser`] free of precedence. Statements print indented with
//! braces around every scope.

use std::fmt::{self, Display, Formatter, Write as _};

use itertools::Itertools;

use crate::expr::{Expr, ExprNode};
use crate::stmt::{Range, Stmt, StmtNode};
use crate::types::{CallType, ForKind, UnaryOp};
use rill_dtype::Type;

fn fmt_float(v: f64, bits: u8, f: &mut Formatter<'_>) -> fmt::Result {
    // {:?} prints the shortest representation that reads back exactly,
    // always including a decimal point or exponent.
    if bits == 32 { write!(f, "{:?}f", v) } else { write!(f, "{:?}", v) }
}

fn fmt_imm(e: &Expr, f: &mut Formatter<'_>) -> fmt::Result {
    let ty = e.ty();
    match e.node() {
        ExprNode::IntImm(v) => {
            if ty == Type::int32() {
                write!(f, "{v}")
            } else {
                write!(f, "{ty}({v})")
            }
        }
        ExprNode::UIntImm(v) => {
            if ty.is_bool() {
                write!(f, "{}", *v != 0)
            } else if ty == Type::uint(32) {
                write!(f, "{v}u")
            } else {
                write!(f, "{ty}({v})")
            }
        }
        ExprNode::FloatImm(v) => {
            if ty.bits() == 32 || ty.bits() == 64 {
                fmt_float(*v, ty.bits(), f)
            } else {
                write!(f, "{ty}({v:?})")
            }
        }
        _ => unreachable!("fmt_imm on non-immediate"),
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.node() {
            ExprNode::IntImm(_) | ExprNode::UIntImm(_) | ExprNode::FloatImm(_) => fmt_imm(self, f),
            ExprNode::StringImm(s) => write!(f, "{s:?}"),
            ExprNode::Var(name) => write!(f, "{name}"),
            ExprNode::Cast { value } => write!(f, "{}({value})", self.ty()),
            ExprNode::Unary(UnaryOp::Neg, a) => write!(f, "-{a}"),
            ExprNode::Unary(UnaryOp::Not, a) => write!(f, "!{a}"),
            ExprNode::Binary(op, a, b) => match op.symbol() {
                Some(sym) => write!(f, "({a} {sym} {b})"),
                None => write!(f, "{}({a}, {b})", op.to_string().to_lowercase()),
            },
            ExprNode::Select { condition, true_value, false_value } => {
                write!(f, "select({condition}, {true_value}, {false_value})")
            }
            ExprNode::Load { buffer, index, predicate } => match predicate {
                Some(p) => write!(f, "{buffer}[{index} if {p}]"),
                None => write!(f, "{buffer}[{index}]"),
            },
            ExprNode::Ramp { base, stride, lanes } => write!(f, "ramp({base}, {stride}, {lanes})"),
            ExprNode::Broadcast { value, lanes } => write!(f, "broadcast({value}, {lanes})"),
            ExprNode::Shuffle { vectors, indices } => {
                write!(f, "shuffle([{}], [{}])", vectors.iter().join(", "), indices.iter().join(", "))
            }
            ExprNode::Call { name, args, call_type, value_index } => {
                let sigil = match call_type {
                    CallType::Function | CallType::Image => "",
                    CallType::Intrinsic => "@",
                    CallType::Extern => "~",
                };
                write!(f, "{sigil}{name}({})", args.iter().join(", "))?;
                if *value_index > 0 {
                    write!(f, ".{value_index}")?;
                }
                Ok(())
            }
            ExprNode::Let { name, value, body } => write!(f, "(let {name} = {value} in {body})"),
        }
    }
}

fn fmt_bounds(bounds: &[Range]) -> String {
    bounds.iter().map(|r| format!("[{}, {}]", r.min, r.extent)).join(", ")
}

fn fmt_stmt(s: &Stmt, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    macro_rules! line {
        ($($arg:tt)*) => {{
            let _ = write!(out, "{pad}");
            let _ = writeln!(out, $($arg)*);
        }};
    }
    macro_rules! scoped {
        ($header:expr, $body:expr) => {{
            line!("{} {{", $header);
            fmt_stmt($body, indent + 1, out);
            line!("}}");
        }};
    }
    match s.node() {
        StmtNode::LetStmt { name, value, body } => {
            line!("let {name} = {value}");
            fmt_stmt(body, indent, out);
        }
        StmtNode::AssertStmt { condition, message } => line!("assert({condition}, {message:?})"),
        StmtNode::Block { stmts } => {
            for s in stmts {
                fmt_stmt(s, indent, out);
            }
        }
        StmtNode::IfThenElse { condition, then_case, else_case } => {
            line!("if ({condition}) {{");
            fmt_stmt(then_case, indent + 1, out);
            if let Some(e) = else_case {
                line!("}} else {{");
                fmt_stmt(e, indent + 1, out);
            }
            line!("}}");
        }
        StmtNode::For { var, min, extent, kind, body } => {
            let keyword = if *kind == ForKind::Serial { "for".to_string() } else { kind.to_string() };
            scoped!(format!("{keyword} ({var}, {min}, {extent})"), body);
        }
        StmtNode::Store { buffer, index, value, predicate } => match predicate {
            Some(p) => line!("{buffer}[{index} if {p}] = {value}"),
            None => line!("{buffer}[{index}] = {value}"),
        },
        StmtNode::Provide { name, args, values, predicate } => {
            let lhs = format!("{name}({})", args.iter().join(", "));
            let rhs = if values.len() == 1 {
                values[0].to_string()
            } else {
                format!("({})", values.iter().join(", "))
            };
            match predicate {
                Some(p) => line!("{lhs} = {rhs} if {p}"),
                None => line!("{lhs} = {rhs}"),
            }
        }
        StmtNode::Allocate { name, ty, memory, extents, condition, body } => {
            let size = extents.iter().map(ToString::to_string).join(" * ");
            let mut header = format!("allocate {name}[{ty} * {size}]");
            if *memory != crate::types::MemoryType::Auto {
                let _ = write!(header, " in {memory}");
            }
            if let Some(c) = condition {
                let _ = write!(header, " if {c}");
            }
            scoped!(header, body);
        }
        StmtNode::Free { name } => line!("free {name}"),
        StmtNode::Realize { name, types, bounds, body } => {
            let types = types.iter().join(", ");
            scoped!(format!("realize {name}<{types}>({})", fmt_bounds(bounds)), body);
        }
        StmtNode::ProducerConsumer { name, is_producer, body } => {
            let keyword = if *is_producer { "produce" } else { "consume" };
            scoped!(format!("{keyword} {name}"), body);
        }
        StmtNode::Evaluate { value } => line!("{value}"),
        StmtNode::Prefetch { buffer, bounds } => line!("prefetch {buffer}({})", fmt_bounds(bounds)),
        StmtNode::Atomic { body } => scoped!("atomic", body),
    }
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        fmt_stmt(self, 0, &mut out);
        f.write_str(&out)
    }
}
