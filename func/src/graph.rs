//! Call-graph extraction and the frozen environment.
//!
//! Compilation starts here: from the output functions, walk the call
//! graph through the registry, freeze every reachable function, and
//! compute the realization order. The topological sort doubles as a
//! safety net against cycles the frontend somehow let through.

use std::collections::HashMap;

use crate::error::{self, Error, Result};
use crate::function::{Func, Function, lookup};

/// The frozen function graph handed to lowering.
#[derive(Debug, Clone)]
pub struct Environment {
    pub functions: HashMap<String, Function>,
    /// Realization order: producers before consumers; outputs last.
    pub order: Vec<String>,
    pub outputs: Vec<String>,
}

impl Environment {
    pub fn function(&self, name: &str) -> Result<&Function> {
        self.functions.get(name).ok_or_else(|| Error::UndefinedFunction {
            name: name.to_string(),
            caller: "<environment>".to_string(),
        })
    }
}

/// Freeze the graph reachable from `outputs` and topologically order it.
pub fn build_environment(outputs: &[Func]) -> Result<Environment> {
    let mut functions = HashMap::new();
    let mut stack: Vec<String> = outputs.iter().map(Func::name).collect();

    while let Some(name) = stack.pop() {
        if functions.contains_key(&name) {
            continue;
        }
        let Some(func) = lookup(&name) else {
            return error::UndefinedFunctionSnafu { name, caller: "<outputs>".to_string() }.fail();
        };
        let snapshot = func.snapshot();
        snapshot.validate_levels()?;
        stack.extend(snapshot.called());
        functions.insert(name, snapshot);
    }

    let order = topological_order(&functions)?;
    tracing::debug!(?order, "realization order");
    Ok(Environment { functions, order, outputs: outputs.iter().map(Func::name).collect() })
}

/// Producers-first order via depth-first post-order; errors on a cycle.
fn topological_order(functions: &HashMap<String, Function>) -> Result<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Visiting,
        Done,
    }

    fn visit(
        name: &str,
        functions: &HashMap<String, Function>,
        state: &mut HashMap<String, State>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        match state.get(name) {
            Some(State::Done) => return Ok(()),
            Some(State::Visiting) => {
                return error::CyclicGraphSnafu { name: name.to_string(), through: name.to_string() }.fail();
            }
            None => {}
        }
        state.insert(name.to_string(), State::Visiting);
        if let Some(func) = functions.get(name) {
            for callee in func.called() {
                if functions.contains_key(&callee) {
                    visit(&callee, functions, state, order)?;
                }
            }
        }
        state.insert(name.to_string(), State::Done);
        order.push(name.to_string());
        Ok(())
    }

    let mut names: Vec<&String> = functions.keys().collect();
    names.sort();
    let mut state = HashMap::new();
    let mut order = Vec::new();
    for name in names {
        visit(name, functions, &mut state, &mut order)?;
    }
    Ok(order)
}
