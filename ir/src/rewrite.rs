//! Bottom-up rewrite engine.
//!
//! Drives a [`PatternMatcher`] over an expression tree: children first,
//! then a fixed-point rule loop at each node, recursing into replacement
//! trees until nothing fires. Results are cached per (node, scope), so
//! shared subtrees are processed once and unchanged subtrees keep their
//! allocation.
//!
//! Scoping: `Let` bodies (and, for statement drivers, loop and let-stmt
//! bodies) are rewritten under a fresh scope generation, because a rule
//! consulting the context may produce different results for the same
//! subtree under different bindings. The [`RewriteScope`] hooks let the
//! context learn bindings as the engine enters them.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::expr::{Expr, ExprNode};
use crate::pattern::PatternMatcher;

/// Context hooks invoked when the engine crosses a binding.
pub trait RewriteScope {
    fn enter_let(&mut self, _name: &str, _value: &Expr) {}
    fn exit_let(&mut self, _name: &str) {}
}

impl RewriteScope for () {}

// Fixed-point iteration cap per node. Hitting it means a rule pair is
// ping-ponging, which is a bug in the rule set, not in the input.
const MAX_REWRITES_PER_NODE: usize = 1_000;

pub struct Rewriter<'m, C> {
    matcher: &'m PatternMatcher<C>,
    cache: HashMap<(u64, u64), Expr>,
    scope_stack: Vec<u64>,
    next_scope: u64,
}

impl<'m, C: RewriteScope> Rewriter<'m, C> {
    pub fn new(matcher: &'m PatternMatcher<C>) -> Self {
        Self { matcher, cache: HashMap::new(), scope_stack: vec![0], next_scope: 1 }
    }

    fn scope(&self) -> u64 {
        self.scope_stack.last().copied().unwrap_or(0)
    }

    /// Enter a fresh cache scope. Statement drivers call this around
    /// loop and let bodies; `Let` expressions are handled internally.
    pub fn push_scope(&mut self) {
        self.scope_stack.push(self.next_scope);
        self.next_scope += 1;
    }

    pub fn pop_scope(&mut self) {
        self.scope_stack.pop();
    }

    /// Rewrite an expression to a fixed point of the rule set.
    pub fn rewrite(&mut self, e: &Expr, ctx: &mut C) -> Expr {
        let key = (e.id(), self.scope());
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }

        let rebuilt = match e.node() {
            ExprNode::Let { name, value, body } => {
                let new_value = self.rewrite(value, ctx);
                ctx.enter_let(name, &new_value);
                self.push_scope();
                let new_body = self.rewrite(body, ctx);
                self.pop_scope();
                ctx.exit_let(name);
                if new_value.same(value) && new_body.same(body) {
                    e.clone()
                } else {
                    Expr::let_(name.clone(), new_value, new_body)
                }
            }
            _ => {
                let children = e.children();
                if children.is_empty() {
                    e.clone()
                } else {
                    let new: SmallVec<[Expr; 4]> =
                        children.iter().map(|c| self.rewrite(c, ctx)).collect();
                    e.with_children(&new)
                }
            }
        };

        let result = self.fixpoint(rebuilt, ctx);
        self.cache.insert(key, result.clone());
        // The result is its own normal form; remember that too so chains
        // of rewrites short-circuit.
        self.cache.insert((result.id(), self.scope()), result.clone());
        result
    }

    fn fixpoint(&mut self, mut e: Expr, ctx: &mut C) -> Expr {
        for i in 0..MAX_REWRITES_PER_NODE {
            let Some(next) = self.matcher.rewrite(&e, ctx) else {
                return e;
            };
            tracing::trace!(from = %e, to = %next, "rewrite");
            // A rule may build fresh subtrees; normalize them before the
            // next round so rules always see simplified children.
            let children = next.children();
            if children.is_empty() {
                e = next;
            } else {
                let new: SmallVec<[Expr; 4]> =
                    children.iter().map(|c| self.rewrite(c, ctx)).collect();
                e = next.with_children(&new);
            }
            if i + 1 == MAX_REWRITES_PER_NODE {
                panic!("rewrite fixpoint did not terminate; last node: {e}");
            }
        }
        e
    }
}

/// One-shot rewrite with a fresh engine and scope.
pub fn rewrite_expr<C: RewriteScope>(matcher: &PatternMatcher<C>, e: &Expr, ctx: &mut C) -> Expr {
    Rewriter::new(matcher).rewrite(e, ctx)
}
