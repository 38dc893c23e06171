//! Function contents, the global registry, and frozen snapshots.
//!
//! A [`Func`] is a shared, lockable handle used during graph
//! construction. Compilation never sees it: [`crate::build_environment`]
//! freezes every reachable function into an immutable [`Function`]
//! snapshot, and lowering works exclusively on those.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;
use snafu::ensure;

use crate::error::{self, Error, Result};
use crate::rdom::{RDom, ReductionDomain};
use crate::schedule::{FuncSchedule, LoopLevel, StageSchedule};
use crate::var::Var;
use rill_ir::analysis::{called_functions, free_vars};
use rill_ir::{CallType, Expr, Type};

/// One update definition: its own argument expressions (possibly using
/// reduction variables), right-hand sides, domain, and stage schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateDefinition {
    pub args: Vec<Expr>,
    pub values: Vec<Expr>,
    pub rdom: Option<ReductionDomain>,
    pub stage: StageSchedule,
}

#[derive(Debug)]
pub(crate) struct FunctionContents {
    pub(crate) name: String,
    pub(crate) args: Vec<String>,
    pub(crate) values: Vec<Expr>,
    pub(crate) return_types: Vec<Type>,
    pub(crate) updates: Vec<UpdateDefinition>,
    pub(crate) schedule: FuncSchedule,
    pub(crate) pure_stage: StageSchedule,
    pub(crate) frozen: bool,
    /// Strong references to every function this one calls. Calls carry
    /// only names; holding the callees keeps the reachable graph alive
    /// (and its registry entries valid) for as long as any consumer
    /// handle lives.
    pub(crate) callees: Vec<Func>,
}

// Name -> contents, so calls (which carry only names) resolve during
// cycle checks and environment construction.
static REGISTRY: OnceLock<RwLock<HashMap<String, Weak<RwLock<FunctionContents>>>>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<String, Weak<RwLock<FunctionContents>>>> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

fn register(name: &str, contents: &Arc<RwLock<FunctionContents>>) {
    registry().write().insert(name.to_string(), Arc::downgrade(contents));
}

/// Pick an unused name: `base`, then `base$1`, `base$2`, ...
fn unique_name(base: &str) -> String {
    let reg = registry().read();
    let live = |n: &str| reg.get(n).is_some_and(|w| w.strong_count() > 0);
    if !live(base) {
        return base.to_string();
    }
    (1..)
        .map(|i| format!("{base}${i}"))
        .find(|candidate| !live(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Look a function up by name.
pub(crate) fn lookup(name: &str) -> Option<Func> {
    registry().read().get(name).and_then(Weak::upgrade).map(Func)
}

/// A handle to a function under construction.
///
/// Cheap to clone; all clones share contents. Mutable only until the
/// graph is frozen by compilation.
#[derive(Clone)]
pub struct Func(pub(crate) Arc<RwLock<FunctionContents>>);

impl std::fmt::Debug for Func {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Func({})", self.name())
    }
}

impl Func {
    /// Create an undefined function. The name is uniquified if taken.
    pub fn new(name: impl Into<String>) -> Self {
        let name = unique_name(&name.into());
        let contents = Arc::new(RwLock::new(FunctionContents {
            name: name.clone(),
            args: Vec::new(),
            values: Vec::new(),
            return_types: Vec::new(),
            updates: Vec::new(),
            schedule: FuncSchedule::default(),
            pure_stage: StageSchedule::default(),
            frozen: false,
            callees: Vec::new(),
        }));
        register(&name, &contents);
        Self(contents)
    }

    /// Record strong references to callees named in a definition.
    fn adopt_callees(&self, names: impl IntoIterator<Item = String>) {
        let mut inner = self.0.write();
        for name in names {
            if name != inner.name
                && !inner.callees.iter().any(|c| c.0.read().name == name)
                && let Some(callee) = lookup(&name)
            {
                inner.callees.push(callee);
            }
        }
    }

    pub fn name(&self) -> String {
        self.0.read().name.clone()
    }

    pub fn is_defined(&self) -> bool {
        !self.0.read().values.is_empty()
    }

    pub(crate) fn ensure_mutable(&self) -> Result<()> {
        let inner = self.0.read();
        ensure!(!inner.frozen, error::FrozenSnafu { name: inner.name.clone() });
        Ok(())
    }

    /// Whether `self` is reachable from `from` through the call graph.
    fn reachable_from(&self, from: &str) -> bool {
        let target = self.name();
        let mut stack = vec![from.to_string()];
        let mut seen = std::collections::HashSet::new();
        while let Some(name) = stack.pop() {
            if name == target {
                return true;
            }
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(func) = lookup(&name) {
                stack.extend(func.called_names());
            }
        }
        false
    }

    fn called_names(&self) -> Vec<String> {
        let inner = self.0.read();
        let mut names = std::collections::HashSet::new();
        for value in inner.values.iter().chain(inner.updates.iter().flat_map(|u| &u.values)) {
            names.extend(called_functions(value));
        }
        for update in &inner.updates {
            for arg in &update.args {
                names.extend(called_functions(arg));
            }
        }
        names.remove(&inner.name);
        names.into_iter().collect()
    }

    /// Give the function its pure definition.
    pub fn define(&self, args: impl IntoIterator<Item = Var>, values: Vec<Expr>) -> Result<&Self> {
        self.ensure_mutable()?;
        let name = self.name();
        ensure!(!self.is_defined(), error::AlreadyDefinedSnafu { name: name.clone() });
        assert!(!values.is_empty(), "a definition needs at least one value");

        // Adding the edges self -> called must not close a cycle.
        let callees: Vec<String> = values.iter().flat_map(called_functions).collect();
        for callee in &callees {
            if callee != &name
                && let Some(callee_func) = lookup(callee)
                && self.reachable_from(&callee_func.name())
            {
                return Err(Error::CyclicGraph { name: name.clone(), through: callee.clone() });
            }
            ensure!(
                callee == &name || lookup(callee).is_some(),
                error::UndefinedFunctionSnafu { name: callee.clone(), caller: name.clone() }
            );
            // A pure definition may not reference the function itself.
            ensure!(
                callee != &name,
                error::CyclicGraphSnafu { name: name.clone(), through: name.clone() }
            );
        }

        {
            let mut inner = self.0.write();
            inner.args = args.into_iter().map(|v| v.name().to_string()).collect();
            inner.return_types = values.iter().map(Expr::ty).collect();
            inner.pure_stage = StageSchedule::for_pure_args(&inner.args);
            inner.values = values;
        }
        self.adopt_callees(callees);
        Ok(self)
    }

    /// Single-value convenience for [`Func::define`].
    pub fn define_simple(&self, args: impl IntoIterator<Item = Var>, value: Expr) -> Result<&Self> {
        self.define(args, vec![value])
    }

    /// Add an update definition. `rdom` supplies reduction variables
    /// usable in both the argument and value expressions.
    pub fn update(&self, args: Vec<Expr>, values: Vec<Expr>, rdom: Option<&RDom>) -> Result<&Self> {
        self.ensure_mutable()?;
        let name = self.name();
        ensure!(self.is_defined(), error::UpdateBeforeDefinitionSnafu { name: name.clone() });
        {
            let inner = self.0.read();
            ensure!(
                values.len() == inner.return_types.len(),
                error::TupleArityMismatchSnafu {
                    name: name.clone(),
                    expected: inner.return_types.len(),
                    actual: values.len(),
                }
            );

            // Free variables on the left-hand side must be pure arguments
            // or reduction variables.
            let domain = rdom.map(|r| r.domain().clone());
            for arg in &args {
                for var in free_vars(arg) {
                    let known = inner.args.contains(&var)
                        || domain.as_ref().is_some_and(|d| d.contains(&var));
                    ensure!(
                        known,
                        error::UnknownUpdateVariableSnafu { name: name.clone(), var: var.clone() }
                    );
                }
            }
        }

        // Cycle check for calls introduced by the update (self-reference
        // is what makes it an update, so it is allowed).
        let callees: Vec<String> =
            values.iter().chain(args.iter()).flat_map(called_functions).collect();
        for callee in &callees {
            if callee != &name
                && let Some(callee_func) = lookup(callee)
                && self.reachable_from(&callee_func.name())
            {
                return Err(Error::CyclicGraph { name: name.clone(), through: callee.clone() });
            }
        }

        let domain = rdom.map(|r| r.domain().clone());
        let stage = default_update_stage(&self.0.read().args, &args, domain.as_ref());
        self.0.write().updates.push(UpdateDefinition { args, values, rdom: domain, stage });
        self.adopt_callees(callees);
        Ok(self)
    }

    /// A call to this function at the given coordinates.
    ///
    /// # Panics
    ///
    /// Panics when the function has no pure definition yet; calling an
    /// undefined function is a frontend programming error.
    pub fn at(&self, args: impl IntoIterator<Item = Expr>) -> Expr {
        self.component(0, args)
    }

    /// A call selecting one component of a tuple-valued function.
    pub fn component(&self, index: usize, args: impl IntoIterator<Item = Expr>) -> Expr {
        let inner = self.0.read();
        let Some(ty) = inner.return_types.get(index) else {
            panic!("function {} has no value {index} (is it defined yet?)", inner.name);
        };
        Expr::call_indexed(*ty, inner.name.clone(), args.into_iter().collect(), CallType::Function, index)
    }

    pub fn args(&self) -> Vec<String> {
        self.0.read().args.clone()
    }

    pub fn num_updates(&self) -> usize {
        self.0.read().updates.len()
    }

    /// Freeze into an immutable snapshot and mark the live handle
    /// frozen. Lowering consumes snapshots only.
    pub(crate) fn snapshot(&self) -> Function {
        let mut inner = self.0.write();
        inner.frozen = true;
        Function {
            name: inner.name.clone(),
            args: inner.args.clone(),
            values: inner.values.clone(),
            return_types: inner.return_types.clone(),
            updates: inner.updates.clone(),
            schedule: inner.schedule.clone(),
            pure_stage: inner.pure_stage.clone(),
        }
    }
}

/// Default stage schedule for an update: reduction variables outermost
/// (declaration order), then the pure loops (last argument outermost).
fn default_update_stage(
    pure_args: &[String],
    lhs_args: &[Expr],
    rdom: Option<&ReductionDomain>,
) -> StageSchedule {
    use crate::schedule::Dim;
    use rill_ir::ForKind;

    let lhs_free: std::collections::HashSet<String> =
        lhs_args.iter().flat_map(free_vars).collect();

    let mut dims = Vec::new();
    if let Some(domain) = rdom {
        dims.extend(domain.vars.iter().map(|v| Dim {
            name: v.name.clone(),
            kind: ForKind::Serial,
            is_rvar: true,
        }));
    }
    dims.extend(pure_args.iter().rev().filter(|a| lhs_free.contains(*a)).map(|a| Dim {
        name: a.clone(),
        kind: ForKind::Serial,
        is_rvar: false,
    }));
    StageSchedule { dims, splits: Vec::new(), atomic: false }
}

/// An immutable snapshot of one function, produced by freezing the
/// graph at compilation time.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub args: Vec<String>,
    pub values: Vec<Expr>,
    pub return_types: Vec<Type>,
    pub updates: Vec<UpdateDefinition>,
    pub schedule: FuncSchedule,
    pub pure_stage: StageSchedule,
}

impl Function {
    /// Number of definition stages: the pure definition plus updates.
    pub fn num_stages(&self) -> usize {
        1 + self.updates.len()
    }

    /// Stage schedule by index; stage 0 is the pure definition.
    pub fn stage(&self, i: usize) -> &StageSchedule {
        if i == 0 { &self.pure_stage } else { &self.updates[i - 1].stage }
    }

    pub fn is_pure(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn is_inlined(&self) -> bool {
        self.schedule.is_inlined()
    }

    /// Every function name this one calls (pure and update stages),
    /// excluding itself.
    pub fn called(&self) -> Vec<String> {
        let mut names = std::collections::HashSet::new();
        for value in self.values.iter().chain(self.updates.iter().flat_map(|u| &u.values)) {
            names.extend(called_functions(value));
        }
        for update in &self.updates {
            for arg in &update.args {
                names.extend(called_functions(arg));
            }
        }
        names.remove(&self.name);
        let mut out: Vec<String> = names.into_iter().collect();
        out.sort();
        out
    }

    /// Loop level sanity: compute must be at or inside store.
    /// `Inlined` means both are effectively at every call site.
    pub fn validate_levels(&self) -> Result<()> {
        let s = &self.schedule;
        let ok = match (&s.store_level, &s.compute_level) {
            (LoopLevel::Inlined, LoopLevel::Inlined) => true,
            (LoopLevel::Inlined, _) | (_, LoopLevel::Inlined) => false,
            _ => true,
        };
        ensure!(
            ok,
            error::ScheduleConflictSnafu {
                func: self.name.clone(),
                message: "store level set without a compute level (or vice versa)".to_string(),
            }
        );
        Ok(())
    }
}
