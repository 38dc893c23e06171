//! Pattern matching and the rule dispatch table.
//!
//! [`PatternMatcher`] holds a rule set `(Pat, rewrite-fn)` and dispatches
//! on the matched expression's outermost constructor: rules are indexed
//! by operation key, then scanned linearly in registration order, with
//! wildcard-rooted rules scanned after the keyed ones. The scan order is
//! deterministic, which is what makes the simplifier confluent in
//! practice.
//!
//! The [`rule!`] macro removes the binding-extraction boilerplate from
//! rule definitions; see [`crate::simplify::rules`] for the idiom at
//! scale.

pub mod pat;

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::expr::{Expr, ExprNode};
use crate::types::{BinaryOp, UnaryOp};
pub use pat::Pat;

/// Name → matched subtree bindings from one successful match.
pub type Bindings = SmallVec<[(&'static str, Expr); 4]>;

/// Find a binding by name.
pub fn lookup<'a>(bindings: &'a Bindings, name: &str) -> Option<&'a Expr> {
    bindings.iter().find(|(n, _)| *n == name).map(|(_, e)| e)
}

/// A rule's action: build the replacement from the bindings, or decline.
pub type RewriteFn<C> = Box<dyn Fn(&Bindings, &mut C) -> Option<Expr>>;

/// Outermost-constructor key used to index rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum OpKey {
    Binary(BinaryOp),
    Unary(UnaryOp),
    Cast,
    Select,
    Ramp,
    Broadcast,
    Shuffle,
    Load,
    Call,
    Let,
    Var,
    Imm,
    StringImm,
}

impl OpKey {
    fn of(e: &Expr) -> OpKey {
        match e.node() {
            ExprNode::IntImm(_) | ExprNode::UIntImm(_) | ExprNode::FloatImm(_) => OpKey::Imm,
            ExprNode::StringImm(_) => OpKey::StringImm,
            ExprNode::Var(_) => OpKey::Var,
            ExprNode::Cast { .. } => OpKey::Cast,
            ExprNode::Unary(op, _) => OpKey::Unary(*op),
            ExprNode::Binary(op, _, _) => OpKey::Binary(*op),
            ExprNode::Select { .. } => OpKey::Select,
            ExprNode::Load { .. } => OpKey::Load,
            ExprNode::Ramp { .. } => OpKey::Ramp,
            ExprNode::Broadcast { .. } => OpKey::Broadcast,
            ExprNode::Shuffle { .. } => OpKey::Shuffle,
            ExprNode::Call { .. } => OpKey::Call,
            ExprNode::Let { .. } => OpKey::Let,
        }
    }

    /// Keys a pattern's root can produce, or None for wildcard roots.
    fn roots(pat: &Pat) -> Option<Vec<OpKey>> {
        match pat {
            Pat::Wild { .. } => None,
            Pat::Imm { .. } => Some(vec![OpKey::Imm]),
            Pat::Binary { ops, .. } => Some(ops.iter().map(|op| OpKey::Binary(*op)).collect()),
            Pat::Unary { ops, .. } => Some(ops.iter().map(|op| OpKey::Unary(*op)).collect()),
            Pat::CastOf { .. } => Some(vec![OpKey::Cast]),
            Pat::SelectOf { .. } => Some(vec![OpKey::Select]),
            Pat::RampOf { .. } => Some(vec![OpKey::Ramp]),
            Pat::BroadcastOf { .. } => Some(vec![OpKey::Broadcast]),
            Pat::VarRef { .. } => Some(vec![OpKey::Var]),
            Pat::LetOf { .. } => Some(vec![OpKey::Let]),
            Pat::Named { inner, .. } => Self::roots(inner),
        }
    }
}

fn bind(bindings: &mut Bindings, name: &'static str, e: &Expr) -> bool {
    match lookup(bindings, name) {
        // A name bound twice must bind the same subtree.
        Some(existing) => existing == e,
        None => {
            bindings.push((name, e.clone()));
            true
        }
    }
}

fn match_pat(pat: &Pat, e: &Expr, bindings: &mut Bindings) -> bool {
    match pat {
        Pat::Wild { name } => bind(bindings, name, e),
        Pat::Imm { name } => {
            matches!(e.node(), ExprNode::IntImm(_) | ExprNode::UIntImm(_) | ExprNode::FloatImm(_))
                && bind(bindings, name, e)
        }
        Pat::Binary { ops, lhs, rhs } => match e.node() {
            ExprNode::Binary(op, a, b) if ops.contains(op) => {
                match_pat(lhs, a, bindings) && match_pat(rhs, b, bindings)
            }
            _ => false,
        },
        Pat::Unary { ops, value } => match e.node() {
            ExprNode::Unary(op, a) if ops.contains(op) => match_pat(value, a, bindings),
            _ => false,
        },
        Pat::CastOf { value } => match e.node() {
            ExprNode::Cast { value: inner } => match_pat(value, inner, bindings),
            _ => false,
        },
        Pat::SelectOf { condition, true_value, false_value } => match e.node() {
            ExprNode::Select { condition: c, true_value: t, false_value: f } => {
                match_pat(condition, c, bindings)
                    && match_pat(true_value, t, bindings)
                    && match_pat(false_value, f, bindings)
            }
            _ => false,
        },
        Pat::RampOf { base, stride } => match e.node() {
            ExprNode::Ramp { base: b, stride: s, .. } => {
                match_pat(base, b, bindings) && match_pat(stride, s, bindings)
            }
            _ => false,
        },
        Pat::BroadcastOf { value } => match e.node() {
            ExprNode::Broadcast { value: v, .. } => match_pat(value, v, bindings),
            _ => false,
        },
        Pat::VarRef { name } => matches!(e.node(), ExprNode::Var(_)) && bind(bindings, name, e),
        Pat::LetOf { value, body } => match e.node() {
            ExprNode::Let { value: v, body: b, .. } => {
                match_pat(value, v, bindings) && match_pat(body, b, bindings)
            }
            _ => false,
        },
        Pat::Named { name, inner } => match_pat(inner, e, bindings) && bind(bindings, name, e),
    }
}

/// A rule set with outermost-constructor dispatch.
///
/// Generic over a context type `C` handed to every rewrite function;
/// rules that need no context take `&mut ()`-shaped parameters and
/// ignore them.
pub struct PatternMatcher<C> {
    rules: Vec<(Pat, RewriteFn<C>)>,
    index: HashMap<OpKey, Vec<usize>>,
    wildcard: Vec<usize>,
}

impl<C> PatternMatcher<C> {
    pub fn new(rules: Vec<(Pat, RewriteFn<C>)>) -> Self {
        let mut index: HashMap<OpKey, Vec<usize>> = HashMap::new();
        let mut wildcard = Vec::new();
        for (i, (pat, _)) in rules.iter().enumerate() {
            match OpKey::roots(pat) {
                Some(keys) => {
                    for key in keys {
                        index.entry(key).or_default().push(i);
                    }
                }
                None => wildcard.push(i),
            }
        }
        Self { rules, index, wildcard }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Try every applicable rule once, in dispatch order. Returns the
    /// first replacement, or None when no rule fires.
    pub fn rewrite(&self, e: &Expr, ctx: &mut C) -> Option<Expr> {
        let key = OpKey::of(e);
        let keyed = self.index.get(&key).map(Vec::as_slice).unwrap_or(&[]);
        for &i in keyed.iter().chain(&self.wildcard) {
            let (pat, action) = &self.rules[i];
            let mut bindings = Bindings::new();
            if match_pat(pat, e, &mut bindings)
                && let Some(replacement) = action(&bindings, ctx)
            {
                // A rule must make progress; returning the input would
                // loop the fixpoint driver.
                if !replacement.same(e) {
                    return Some(replacement);
                }
            }
        }
        None
    }
}

/// Define a rewrite rule with automatic binding extraction.
///
/// ```ignore
/// // x + 0 -> x
/// rule!(rules, Pat::var("x") + Pat::imm("c") => |x, c| {
///     c.is_const_value(0).then(|| x.clone())
/// });
///
/// // With context access (the context follows a `;`):
/// rule!(rules, Pat::var("x").lt(Pat::var("y")) => |x, y; ctx: SimplifyCtx| {
///     ctx.prove_lt(x, y).map(Expr::bool_)
/// });
/// ```
///
/// Closure parameter names must match the names used in the pattern; a
/// leading underscore is stripped for the lookup, so unused bindings can
/// be spelled `_x`.
#[macro_export]
macro_rules! rule {
    ($rules:ident, $pat:expr => |$($var:ident),* $(,)?| $body:expr) => {
        $rules.push((
            $pat,
            Box::new(move |bindings: &$crate::pattern::Bindings, _ctx: &mut _| {
                $(
                    let $var: &$crate::Expr = match $crate::pattern::lookup(
                        bindings,
                        stringify!($var).trim_start_matches('_'),
                    ) {
                        Some(v) => v,
                        None => return None,
                    };
                )*
                let _ = &bindings;
                $body
            }) as $crate::pattern::RewriteFn<_>,
        ));
    };
    ($rules:ident, $pat:expr => |$($var:ident),* ; $ctx:ident : $cty:ty| $body:expr) => {
        $rules.push((
            $pat,
            Box::new(move |bindings: &$crate::pattern::Bindings, $ctx: &mut $cty| {
                $(
                    let $var: &$crate::Expr = match $crate::pattern::lookup(
                        bindings,
                        stringify!($var).trim_start_matches('_'),
                    ) {
                        Some(v) => v,
                        None => return None,
                    };
                )*
                let _ = &bindings;
                $body
            }) as $crate::pattern::RewriteFn<$cty>,
        ));
    };
}
