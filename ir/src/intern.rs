//! Hash-consing for expressions.
//!
//! Structurally identical expressions share one allocation: construction
//! looks the node up in a global lock-free table keyed by (variant, type,
//! child ids, payload) and returns the existing `Arc` when present. The
//! table holds weak references, so nodes die with their last outside
//! reference and dead entries are collected lazily.

use std::mem::{Discriminant, discriminant};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use papaya::HashMap;
use smallvec::SmallVec;

use crate::expr::{Expr, ExprData, ExprNode};
use crate::types::{BinaryOp, CallType, UnaryOp};
use rill_dtype::Type;

// Monotonic node ids; never reused, so id equality has no ABA hazard.
static EXPR_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_expr_id() -> u64 {
    EXPR_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Non-child payload of a node variant, captured for the intern key.
///
/// The discriminant alone does not distinguish `Add` from `Mul` or two
/// different variable names; this enum carries exactly the data that makes
/// two same-variant nodes differ.
#[derive(PartialEq, Eq, Hash, Clone)]
enum Payload {
    Int(i64),
    UInt(u64),
    FloatBits(u64),
    Str(String),
    Unary(UnaryOp),
    Binary(BinaryOp),
    Lanes(u16),
    Buffer(String),
    Shuffle(Vec<u16>),
    Call(String, Discriminant<CallType>, usize),
    None,
}

#[derive(PartialEq, Eq, Hash, Clone)]
struct InternKey {
    variant: Discriminant<ExprNode>,
    ty: Type,
    child_ids: SmallVec<[u64; 4]>,
    payload: Payload,
}

impl InternKey {
    fn new(node: &ExprNode, ty: Type) -> Self {
        let payload = match node {
            ExprNode::IntImm(v) => Payload::Int(*v),
            ExprNode::UIntImm(v) => Payload::UInt(*v),
            ExprNode::FloatImm(v) => Payload::FloatBits(v.to_bits()),
            ExprNode::StringImm(s) | ExprNode::Var(s) => Payload::Str(s.clone()),
            ExprNode::Unary(op, _) => Payload::Unary(*op),
            ExprNode::Binary(op, _, _) => Payload::Binary(*op),
            ExprNode::Ramp { lanes, .. } | ExprNode::Broadcast { lanes, .. } => Payload::Lanes(*lanes),
            ExprNode::Load { buffer, .. } => Payload::Buffer(buffer.clone()),
            ExprNode::Shuffle { indices, .. } => Payload::Shuffle(indices.clone()),
            ExprNode::Call { name, call_type, value_index, .. } => {
                Payload::Call(name.clone(), discriminant(call_type), *value_index)
            }
            ExprNode::Let { name, .. } => Payload::Str(name.clone()),
            ExprNode::Cast { .. } | ExprNode::Select { .. } => Payload::None,
        };
        let child_ids = match node {
            ExprNode::Cast { value } | ExprNode::Broadcast { value, .. } => {
                SmallVec::from_slice(&[value.id()])
            }
            ExprNode::Unary(_, a) => SmallVec::from_slice(&[a.id()]),
            ExprNode::Binary(_, a, b) => SmallVec::from_slice(&[a.id(), b.id()]),
            ExprNode::Select { condition, true_value, false_value } => {
                SmallVec::from_slice(&[condition.id(), true_value.id(), false_value.id()])
            }
            ExprNode::Load { index, predicate, .. } => {
                let mut ids = SmallVec::from_slice(&[index.id()]);
                ids.extend(predicate.iter().map(Expr::id));
                ids
            }
            ExprNode::Ramp { base, stride, .. } => SmallVec::from_slice(&[base.id(), stride.id()]),
            ExprNode::Shuffle { vectors, .. } => vectors.iter().map(Expr::id).collect(),
            ExprNode::Call { args, .. } => args.iter().map(Expr::id).collect(),
            ExprNode::Let { value, body, .. } => SmallVec::from_slice(&[value.id(), body.id()]),
            _ => SmallVec::new(),
        };
        Self { variant: discriminant(node), ty, child_ids, payload }
    }
}

// Global intern table. Weak values: an expression stays alive only while
// something outside the table references it.
static EXPRS: OnceLock<HashMap<InternKey, Weak<ExprData>>> = OnceLock::new();

fn table() -> &'static HashMap<InternKey, Weak<ExprData>> {
    EXPRS.get_or_init(HashMap::new)
}

/// Drop table entries whose expression has died.
///
/// Dead entries are also replaced lazily on the next identical
/// construction; this exists for callers that want to release the memory
/// proactively after a large compilation.
pub fn gc_dead_refs() {
    let map = table();
    let guard = map.guard();
    let dead: Vec<InternKey> =
        map.iter(&guard).filter(|(_, w)| w.upgrade().is_none()).map(|(k, _)| k.clone()).collect();
    for key in dead {
        map.remove(&key, &guard);
    }
}

/// Number of live interned expressions. Test support.
pub fn live_count() -> usize {
    let map = table();
    let guard = map.guard();
    map.iter(&guard).filter(|(_, w)| w.upgrade().is_some()).count()
}

impl Expr {
    /// Intern a node, returning the canonical allocation for its
    /// structure.
    ///
    /// Thread-safe: identical nodes constructed concurrently resolve to
    /// one winner, so `Expr::same` works across threads.
    pub(crate) fn intern(node: ExprNode, ty: Type) -> Expr {
        use papaya::{Compute, Operation};

        let key = InternKey::new(&node, ty);
        let guard = table().guard();

        if let Some(weak) = table().get(&key, &guard)
            && let Some(data) = weak.upgrade()
        {
            return Expr(data);
        }

        let fresh = Arc::new(ExprData { id: next_expr_id(), ty, node, content_hash: OnceLock::new() });
        let weak = Arc::downgrade(&fresh);

        let result = table().compute(
            key,
            |entry| match entry {
                Some((_, existing)) => match existing.upgrade() {
                    // Lost the race: reuse the winner.
                    Some(arc) => Operation::Abort(arc),
                    // Dead entry: replace it with ours.
                    None => Operation::Insert(weak.clone()),
                },
                None => Operation::Insert(weak.clone()),
            },
            &guard,
        );

        match result {
            Compute::Aborted(existing) => Expr(existing),
            _ => Expr(fresh),
        }
    }
}
