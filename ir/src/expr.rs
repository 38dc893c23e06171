//! The interned expression tree.
//!
//! Expressions are immutable, structurally shared, reference-counted trees.
//! Construction goes through the interning table in [`crate::intern`], so
//! two structurally identical expressions are always the same allocation
//! and deep equality is a single id comparison.

use std::sync::{Arc, OnceLock};

use smallvec::{SmallVec, smallvec};

use crate::error::{self, Result};
use crate::types::{BinaryOp, CallType, ConstValue, UnaryOp};
use rill_dtype::{Type, promote};
use snafu::ensure;

/// One expression node variant.
///
/// Children are stored inline in the variant; payload that is not a child
/// (names, lane counts, call kinds) sits alongside them. `PartialEq`/`Hash`
/// are not implemented here - [`Expr`] compares by interned id.
#[derive(Debug, Clone)]
pub enum ExprNode {
    /// Signed integer immediate.
    IntImm(i64),
    /// Unsigned integer immediate. Booleans are `UIntImm` 0/1 of type uint1.
    UIntImm(u64),
    /// Floating-point immediate (stored double-precision; the node type
    /// records the actual width).
    FloatImm(f64),
    /// String immediate, for extern call arguments.
    StringImm(String),
    /// Reference to a named scalar variable.
    Var(String),
    /// Typed conversion; the target type is the node's type.
    Cast { value: Expr },
    Unary(UnaryOp, Expr),
    Binary(BinaryOp, Expr, Expr),
    /// Ternary selection between two values of equal type.
    Select { condition: Expr, true_value: Expr, false_value: Expr },
    /// Read one element (or a vector of elements) from a named buffer.
    Load { buffer: String, index: Expr, predicate: Option<Expr> },
    /// The arithmetic progression `base + i * stride` for `i` in `0..lanes`.
    Ramp { base: Expr, stride: Expr, lanes: u16 },
    /// A scalar replicated across `lanes` lanes.
    Broadcast { value: Expr, lanes: u16 },
    /// Lane selection from the concatenation of the input vectors.
    Shuffle { vectors: SmallVec<[Expr; 2]>, indices: Vec<u16> },
    /// Call to an intrinsic, an extern symbol, or another pipeline
    /// function. `value_index` selects a component of a tuple-valued
    /// callee.
    Call { name: String, args: SmallVec<[Expr; 4]>, call_type: CallType, value_index: usize },
    /// Bind `name` to `value` within `body`.
    Let { name: String, value: Expr, body: Expr },
}

/// Interned payload behind an [`Expr`] handle.
#[derive(derive_more::Debug)]
pub struct ExprData {
    /// Stable id, unique per interned node. Two `Expr`s are structurally
    /// equal iff their ids are equal.
    pub(crate) id: u64,
    pub(crate) ty: Type,
    pub(crate) node: ExprNode,
    /// Content hash, stable across processes. Computed lazily.
    #[debug(skip)]
    pub(crate) content_hash: OnceLock<u64>,
}

/// A reference-counted handle to an interned expression.
///
/// Cloning is an `Arc` clone. Equality and hashing use the interned id and
/// therefore mean deep structural equality in O(1).
#[derive(Clone)]
pub struct Expr(pub(crate) Arc<ExprData>);

impl std::fmt::Debug for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Expr[{}: {} = {}]", self.id(), self.ty(), self)
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Expr {}

impl std::hash::Hash for Expr {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl Expr {
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn node(&self) -> &ExprNode {
        &self.0.node
    }

    pub fn ty(&self) -> Type {
        self.0.ty
    }

    /// Whether two handles point at the same interned node.
    ///
    /// Equivalent to `==` but reads better in mutators, where it expresses
    /// "the rewrite changed nothing".
    pub fn same(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Stable content hash of the whole subtree (xxh64).
    pub fn content_hash(&self) -> u64 {
        *self.0.content_hash.get_or_init(|| {
            use std::hash::{Hash, Hasher};
            use xxhash_rust::xxh64::Xxh64;

            let mut h = Xxh64::new(0);
            self.ty().hash(&mut h);
            std::mem::discriminant(self.node()).hash(&mut h);
            match self.node() {
                ExprNode::IntImm(v) => v.hash(&mut h),
                ExprNode::UIntImm(v) => v.hash(&mut h),
                ExprNode::FloatImm(v) => v.to_bits().hash(&mut h),
                ExprNode::StringImm(s) | ExprNode::Var(s) => s.hash(&mut h),
                ExprNode::Cast { .. } => {}
                ExprNode::Unary(op, _) => op.hash(&mut h),
                ExprNode::Binary(op, _, _) => op.hash(&mut h),
                ExprNode::Select { .. } => {}
                ExprNode::Load { buffer, predicate, .. } => {
                    buffer.hash(&mut h);
                    predicate.is_some().hash(&mut h);
                }
                ExprNode::Ramp { lanes, .. } | ExprNode::Broadcast { lanes, .. } => lanes.hash(&mut h),
                ExprNode::Shuffle { indices, .. } => indices.hash(&mut h),
                ExprNode::Call { name, call_type, value_index, .. } => {
                    name.hash(&mut h);
                    std::mem::discriminant(call_type).hash(&mut h);
                    value_index.hash(&mut h);
                }
                ExprNode::Let { name, .. } => name.hash(&mut h),
            }
            for child in self.children() {
                child.content_hash().hash(&mut h);
            }
            h.finish()
        })
    }

    /// All direct child expressions, in a stable order.
    pub fn children(&self) -> SmallVec<[Expr; 4]> {
        match self.node() {
            ExprNode::IntImm(_)
            | ExprNode::UIntImm(_)
            | ExprNode::FloatImm(_)
            | ExprNode::StringImm(_)
            | ExprNode::Var(_) => smallvec![],
            ExprNode::Cast { value } | ExprNode::Broadcast { value, .. } => smallvec![value.clone()],
            ExprNode::Unary(_, a) => smallvec![a.clone()],
            ExprNode::Binary(_, a, b) => smallvec![a.clone(), b.clone()],
            ExprNode::Select { condition, true_value, false_value } => {
                smallvec![condition.clone(), true_value.clone(), false_value.clone()]
            }
            ExprNode::Load { index, predicate, .. } => {
                let mut out = smallvec![index.clone()];
                out.extend(predicate.clone());
                out
            }
            ExprNode::Ramp { base, stride, .. } => smallvec![base.clone(), stride.clone()],
            ExprNode::Shuffle { vectors, .. } => vectors.iter().cloned().collect(),
            ExprNode::Call { args, .. } => args.iter().cloned().collect(),
            ExprNode::Let { value, body, .. } => smallvec![value.clone(), body.clone()],
        }
    }

    /// Rebuild this node with new children, preserving payload and type.
    ///
    /// Returns `self` unchanged (same allocation) when every child is the
    /// same node - the property mutators rely on for cheap no-op passes.
    ///
    /// # Panics
    ///
    /// Panics if the child count does not match the node's arity.
    pub fn with_children(&self, new: &[Expr]) -> Expr {
        let old = self.children();
        assert_eq!(old.len(), new.len(), "with_children arity mismatch on {self:?}");
        if old.iter().zip(new).all(|(a, b)| a.same(b)) {
            return self.clone();
        }
        let node = match self.node() {
            ExprNode::IntImm(_)
            | ExprNode::UIntImm(_)
            | ExprNode::FloatImm(_)
            | ExprNode::StringImm(_)
            | ExprNode::Var(_) => return self.clone(),
            ExprNode::Cast { .. } => ExprNode::Cast { value: new[0].clone() },
            ExprNode::Unary(op, _) => ExprNode::Unary(*op, new[0].clone()),
            ExprNode::Binary(op, _, _) => ExprNode::Binary(*op, new[0].clone(), new[1].clone()),
            ExprNode::Select { .. } => ExprNode::Select {
                condition: new[0].clone(),
                true_value: new[1].clone(),
                false_value: new[2].clone(),
            },
            ExprNode::Load { buffer, predicate, .. } => ExprNode::Load {
                buffer: buffer.clone(),
                index: new[0].clone(),
                predicate: predicate.is_some().then(|| new[1].clone()),
            },
            ExprNode::Ramp { lanes, .. } => {
                ExprNode::Ramp { base: new[0].clone(), stride: new[1].clone(), lanes: *lanes }
            }
            ExprNode::Broadcast { lanes, .. } => ExprNode::Broadcast { value: new[0].clone(), lanes: *lanes },
            ExprNode::Shuffle { indices, .. } => {
                ExprNode::Shuffle { vectors: new.iter().cloned().collect(), indices: indices.clone() }
            }
            ExprNode::Call { name, call_type, value_index, .. } => ExprNode::Call {
                name: name.clone(),
                args: new.iter().cloned().collect(),
                call_type: *call_type,
                value_index: *value_index,
            },
            ExprNode::Let { name, .. } => {
                ExprNode::Let { name: name.clone(), value: new[0].clone(), body: new[1].clone() }
            }
        };
        Expr::intern(node, self.ty())
    }

    // =========================================================================
    // Constructors
    // =========================================================================

    /// A 32-bit signed integer immediate, the default for loop arithmetic.
    pub fn int(v: i64) -> Expr {
        Expr::intern(ExprNode::IntImm(v), Type::int32())
    }

    /// An unsigned immediate of the given width.
    pub fn uint(ty: Type, v: u64) -> Expr {
        debug_assert!(ty.is_uint());
        Expr::intern(ExprNode::UIntImm(v), ty)
    }

    /// A 32-bit float immediate.
    pub fn f32(v: f32) -> Expr {
        Expr::intern(ExprNode::FloatImm(v as f64), Type::float32())
    }

    /// A boolean immediate (uint1).
    pub fn bool_(v: bool) -> Expr {
        Expr::intern(ExprNode::UIntImm(v as u64), Type::bool_())
    }

    /// A typed immediate from a runtime constant value.
    pub fn imm(ty: Type, v: ConstValue) -> Expr {
        debug_assert!(ty.is_scalar());
        match v.cast_to(&ty) {
            ConstValue::Int(i) => Expr::intern(ExprNode::IntImm(i), ty),
            ConstValue::UInt(u) => Expr::intern(ExprNode::UIntImm(u), ty),
            ConstValue::Float(f) => Expr::intern(ExprNode::FloatImm(f), ty),
        }
    }

    pub fn string_imm(s: impl Into<String>) -> Expr {
        Expr::intern(ExprNode::StringImm(s.into()), Type::handle())
    }

    /// An int32 variable - the type of every loop variable.
    pub fn var(name: impl Into<String>) -> Expr {
        Expr::intern(ExprNode::Var(name.into()), Type::int32())
    }

    pub fn var_typed(name: impl Into<String>, ty: Type) -> Expr {
        Expr::intern(ExprNode::Var(name.into()), ty)
    }

    /// Convert to `ty`. Identity casts disappear.
    pub fn cast(ty: Type, value: Expr) -> Expr {
        if value.ty() == ty {
            return value;
        }
        Expr::intern(ExprNode::Cast { value }, ty)
    }

    /// Build a binary node, requiring both operands to already share a
    /// type. The frontend sugar in [`crate::ops`] promotes first.
    pub fn try_binary(op: BinaryOp, a: Expr, b: Expr) -> Result<Expr> {
        ensure!(a.ty() == b.ty(), error::TypeMismatchSnafu { op, lhs: a.ty(), rhs: b.ty() });
        if op.is_boolean() {
            ensure!(
                a.ty().element_of().is_bool(),
                error::ExpectedBoolSnafu { context: "boolean operand", actual: a.ty() }
            );
        }
        let ty = if op.is_comparison() { Type::bool_().with_lanes(a.ty().lanes()) } else { a.ty() };
        Ok(Expr::intern(ExprNode::Binary(op, a, b), ty))
    }

    /// Binary construction with implicit promotion.
    ///
    /// # Panics
    ///
    /// Panics when no common type exists (e.g. handle vs float); that is a
    /// frontend programming error, reported eagerly.
    pub fn binary(op: BinaryOp, a: Expr, b: Expr) -> Expr {
        let (a, b) = Self::promoted(a, b);
        match Expr::try_binary(op, a, b) {
            Ok(e) => e,
            Err(err) => panic!("cannot build binary op: {err}"),
        }
    }

    fn promoted(a: Expr, b: Expr) -> (Expr, Expr) {
        if a.ty() == b.ty() {
            return (a, b);
        }
        // A scalar meeting a vector broadcasts first; element types then
        // promote via casts.
        let (a, b) = match (a.ty().lanes(), b.ty().lanes()) {
            (1, n) if n > 1 => (Expr::broadcast(a, n), b),
            (n, 1) if n > 1 => (a, Expr::broadcast(b, n)),
            _ => (a, b),
        };
        let Some(common) = promote(&a.ty(), &b.ty()) else {
            panic!("no common type for {} and {}", a.ty(), b.ty());
        };
        (Expr::cast(common, a), Expr::cast(common, b))
    }

    pub fn add(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Add, a, b)
    }

    pub fn sub(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Sub, a, b)
    }

    pub fn mul(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Mul, a, b)
    }

    pub fn div(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Div, a, b)
    }

    pub fn modulo(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Mod, a, b)
    }

    pub fn min(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Min, a, b)
    }

    pub fn max(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Max, a, b)
    }

    pub fn cmp_eq(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Eq, a, b)
    }

    pub fn cmp_ne(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Ne, a, b)
    }

    pub fn cmp_lt(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Lt, a, b)
    }

    pub fn cmp_le(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Le, a, b)
    }

    pub fn cmp_gt(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Gt, a, b)
    }

    pub fn cmp_ge(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Ge, a, b)
    }

    pub fn and(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::And, a, b)
    }

    pub fn or(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinaryOp::Or, a, b)
    }

    pub fn neg(a: Expr) -> Expr {
        let ty = a.ty();
        Expr::intern(ExprNode::Unary(UnaryOp::Neg, a), ty)
    }

    pub fn not(a: Expr) -> Expr {
        debug_assert!(a.ty().element_of().is_bool());
        let ty = a.ty();
        Expr::intern(ExprNode::Unary(UnaryOp::Not, a), ty)
    }

    pub fn try_select(condition: Expr, true_value: Expr, false_value: Expr) -> Result<Expr> {
        ensure!(
            condition.ty().element_of().is_bool(),
            error::ExpectedBoolSnafu { context: "select condition", actual: condition.ty() }
        );
        ensure!(
            true_value.ty() == false_value.ty(),
            error::SelectBranchMismatchSnafu { true_value: true_value.ty(), false_value: false_value.ty() }
        );
        let ty = true_value.ty();
        Ok(Expr::intern(ExprNode::Select { condition, true_value, false_value }, ty))
    }

    pub fn select(condition: Expr, true_value: Expr, false_value: Expr) -> Expr {
        let (t, f) = Self::promoted(true_value, false_value);
        match Expr::try_select(condition, t, f) {
            Ok(e) => e,
            Err(err) => panic!("cannot build select: {err}"),
        }
    }

    /// Load of element type `ty` (vector when the index is a vector).
    pub fn load(ty: Type, buffer: impl Into<String>, index: Expr, predicate: Option<Expr>) -> Expr {
        debug_assert_eq!(ty.lanes(), index.ty().lanes(), "load type lanes must match index lanes");
        Expr::intern(ExprNode::Load { buffer: buffer.into(), index, predicate }, ty)
    }

    pub fn ramp(base: Expr, stride: Expr, lanes: u16) -> Expr {
        debug_assert!(base.ty().is_scalar() && base.ty() == stride.ty());
        debug_assert!(lanes > 1);
        let ty = base.ty().with_lanes(lanes);
        Expr::intern(ExprNode::Ramp { base, stride, lanes }, ty)
    }

    pub fn broadcast(value: Expr, lanes: u16) -> Expr {
        debug_assert!(value.ty().is_scalar());
        if lanes == 1 {
            return value;
        }
        let ty = value.ty().with_lanes(lanes);
        Expr::intern(ExprNode::Broadcast { value, lanes }, ty)
    }

    pub fn shuffle(vectors: Vec<Expr>, indices: Vec<u16>) -> Result<Expr> {
        let elem = vectors[0].ty().element_of();
        let input_lanes: u16 = vectors.iter().map(|v| v.ty().lanes()).sum();
        for i in &indices {
            ensure!(*i < input_lanes, error::ShuffleIndexOutOfBoundsSnafu { index: *i, input_lanes });
        }
        let ty = elem.with_lanes(indices.len() as u16);
        Ok(Expr::intern(ExprNode::Shuffle { vectors: vectors.into_iter().collect(), indices }, ty))
    }

    pub fn call(ty: Type, name: impl Into<String>, args: Vec<Expr>, call_type: CallType) -> Expr {
        Expr::call_indexed(ty, name, args, call_type, 0)
    }

    pub fn call_indexed(
        ty: Type,
        name: impl Into<String>,
        args: Vec<Expr>,
        call_type: CallType,
        value_index: usize,
    ) -> Expr {
        Expr::intern(
            ExprNode::Call { name: name.into(), args: args.into_iter().collect(), call_type, value_index },
            ty,
        )
    }

    pub fn let_(name: impl Into<String>, value: Expr, body: Expr) -> Expr {
        let ty = body.ty();
        Expr::intern(ExprNode::Let { name: name.into(), value, body }, ty)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The scalar constant this expression denotes, if it is an immediate
    /// (or a broadcast of one).
    pub fn as_const(&self) -> Option<ConstValue> {
        match self.node() {
            ExprNode::IntImm(v) => Some(ConstValue::Int(*v)),
            ExprNode::UIntImm(v) => Some(ConstValue::UInt(*v)),
            ExprNode::FloatImm(v) => Some(ConstValue::Float(*v)),
            ExprNode::Broadcast { value, .. } => value.as_const(),
            _ => None,
        }
    }

    /// The expression as a signed integer constant, if it is one.
    pub fn as_const_i64(&self) -> Option<i64> {
        self.as_const().and_then(|v| v.as_i64())
    }

    pub fn is_const(&self) -> bool {
        self.as_const().is_some()
    }

    /// Whether this is the integer constant `v` (of any integral type).
    pub fn is_const_value(&self, v: i64) -> bool {
        self.as_const_i64() == Some(v)
    }

    pub fn as_var(&self) -> Option<&str> {
        match self.node() {
            ExprNode::Var(name) => Some(name),
            _ => None,
        }
    }
}
