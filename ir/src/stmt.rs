//! The imperative statement tree.
//!
//! Statements are immutable `Arc` trees like expressions, but they are not
//! interned: statement trees are built once per lowering and rarely
//! duplicated. Mutators still preserve allocation identity for unchanged
//! subtrees, which keeps no-op passes cheap.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::expr::Expr;
use crate::types::{ForKind, MemoryType};
use rill_dtype::Type;

/// A half-open interval `[min, min + extent)` with symbolic endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub min: Expr,
    pub extent: Expr,
}

impl Range {
    pub fn new(min: Expr, extent: Expr) -> Self {
        Self { min, extent }
    }

    /// The last coordinate covered: `min + extent - 1`.
    pub fn max(&self) -> Expr {
        Expr::sub(Expr::add(self.min.clone(), self.extent.clone()), Expr::int(1))
    }
}

/// One statement node variant.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtNode {
    /// Bind a scalar name within a statement.
    LetStmt { name: String, value: Expr, body: Stmt },
    /// Runtime check; aborts execution with `message` when false.
    AssertStmt { condition: Expr, message: String },
    /// Sequential composition.
    Block { stmts: Vec<Stmt> },
    IfThenElse { condition: Expr, then_case: Stmt, else_case: Option<Stmt> },
    /// Bounded rectangular loop over `[min, min + extent)`.
    For { var: String, min: Expr, extent: Expr, kind: ForKind, body: Stmt },
    /// Flat scalar (or dense/gather vector) store into a named buffer.
    Store { buffer: String, index: Expr, value: Expr, predicate: Option<Expr> },
    /// Multi-dimensional store into a realization, before storage
    /// flattening rewrites it to `Store`.
    Provide { name: String, args: SmallVec<[Expr; 4]>, values: SmallVec<[Expr; 2]>, predicate: Option<Expr> },
    /// Scoped flat allocation; extents are per storage dimension.
    Allocate {
        name: String,
        ty: Type,
        memory: MemoryType,
        extents: Vec<Expr>,
        condition: Option<Expr>,
        body: Stmt,
    },
    Free { name: String },
    /// Scoped multi-dimensional allocation of a function's storage,
    /// rewritten to `Allocate` by storage flattening. One type per tuple
    /// component.
    Realize { name: String, types: Vec<Type>, bounds: Vec<Range>, body: Stmt },
    /// Marks the region of the tree that computes (`is_producer`) or
    /// consumes a given function's values.
    ProducerConsumer { name: String, is_producer: bool, body: Stmt },
    /// Evaluate an expression for its side effects (e.g. runtime calls).
    Evaluate { value: Expr },
    /// Hint that a region of a buffer is about to be read.
    Prefetch { buffer: String, bounds: Vec<Range> },
    /// All stores inside execute atomically with respect to other
    /// iterations of enclosing parallel loops.
    Atomic { body: Stmt },
}

/// A reference-counted handle to a statement.
#[derive(Clone)]
pub struct Stmt(Arc<StmtNode>);

impl std::fmt::Debug for Stmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl PartialEq for Stmt {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.node() == other.node()
    }
}

impl Stmt {
    pub fn new(node: StmtNode) -> Self {
        Self(Arc::new(node))
    }

    pub fn node(&self) -> &StmtNode {
        &self.0
    }

    /// Allocation identity - true when both handles are the same tree.
    pub fn same(&self, other: &Stmt) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// A statement with no effect.
    pub fn no_op() -> Stmt {
        Stmt::evaluate(Expr::int(0))
    }

    pub fn is_no_op(&self) -> bool {
        match self.node() {
            StmtNode::Evaluate { value } => value.is_const(),
            StmtNode::Block { stmts } => stmts.is_empty(),
            _ => false,
        }
    }

    pub fn let_stmt(name: impl Into<String>, value: Expr, body: Stmt) -> Stmt {
        Stmt::new(StmtNode::LetStmt { name: name.into(), value, body })
    }

    pub fn assert_stmt(condition: Expr, message: impl Into<String>) -> Stmt {
        Stmt::new(StmtNode::AssertStmt { condition, message: message.into() })
    }

    /// Sequence statements, flattening nested blocks and dropping no-ops.
    pub fn block(stmts: Vec<Stmt>) -> Stmt {
        let mut flat = Vec::with_capacity(stmts.len());
        for s in stmts {
            match s.node() {
                StmtNode::Block { stmts: inner } => flat.extend(inner.iter().cloned()),
                _ if s.is_no_op() => {}
                _ => flat.push(s),
            }
        }
        match flat.len() {
            0 => Stmt::no_op(),
            1 => flat.pop().unwrap_or_else(Stmt::no_op),
            _ => Stmt::new(StmtNode::Block { stmts: flat }),
        }
    }

    pub fn if_then_else(condition: Expr, then_case: Stmt, else_case: Option<Stmt>) -> Stmt {
        Stmt::new(StmtNode::IfThenElse { condition, then_case, else_case })
    }

    pub fn for_(var: impl Into<String>, min: Expr, extent: Expr, kind: ForKind, body: Stmt) -> Stmt {
        Stmt::new(StmtNode::For { var: var.into(), min, extent, kind, body })
    }

    pub fn store(buffer: impl Into<String>, index: Expr, value: Expr, predicate: Option<Expr>) -> Stmt {
        Stmt::new(StmtNode::Store { buffer: buffer.into(), index, value, predicate })
    }

    pub fn provide(
        name: impl Into<String>,
        args: Vec<Expr>,
        values: Vec<Expr>,
        predicate: Option<Expr>,
    ) -> Stmt {
        Stmt::new(StmtNode::Provide {
            name: name.into(),
            args: args.into_iter().collect(),
            values: values.into_iter().collect(),
            predicate,
        })
    }

    pub fn allocate(
        name: impl Into<String>,
        ty: Type,
        memory: MemoryType,
        extents: Vec<Expr>,
        condition: Option<Expr>,
        body: Stmt,
    ) -> Stmt {
        Stmt::new(StmtNode::Allocate { name: name.into(), ty, memory, extents, condition, body })
    }

    pub fn free(name: impl Into<String>) -> Stmt {
        Stmt::new(StmtNode::Free { name: name.into() })
    }

    pub fn realize(name: impl Into<String>, types: Vec<Type>, bounds: Vec<Range>, body: Stmt) -> Stmt {
        Stmt::new(StmtNode::Realize { name: name.into(), types, bounds, body })
    }

    pub fn producer(name: impl Into<String>, body: Stmt) -> Stmt {
        Stmt::new(StmtNode::ProducerConsumer { name: name.into(), is_producer: true, body })
    }

    pub fn consumer(name: impl Into<String>, body: Stmt) -> Stmt {
        Stmt::new(StmtNode::ProducerConsumer { name: name.into(), is_producer: false, body })
    }

    pub fn evaluate(value: Expr) -> Stmt {
        Stmt::new(StmtNode::Evaluate { value })
    }

    pub fn prefetch(buffer: impl Into<String>, bounds: Vec<Range>) -> Stmt {
        Stmt::new(StmtNode::Prefetch { buffer: buffer.into(), bounds })
    }

    pub fn atomic(body: Stmt) -> Stmt {
        Stmt::new(StmtNode::Atomic { body })
    }
}
