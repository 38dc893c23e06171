//! The pointwise reference evaluator.
//!
//! Evaluates a frozen function graph the way the definitions read: each
//! pure definition pointwise over its coordinates, then each update in
//! declaration order across its whole reduction domain. No schedules,
//! no loop nests, no storage - just the mathematical semantics the
//! lowered program must reproduce. End-to-end tests realize pipelines
//! both ways and demand equal buffers.

use std::collections::HashMap;

use rill_codegen::Buffer;
use rill_func::Environment;
use rill_ir::eval::{eval_binary, eval_unary};
use rill_ir::{CallType, ConstValue, Expr, ExprNode};

use crate::error::{Error, Result};

fn unsupported(message: impl Into<String>) -> Error {
    Error::Reference { message: message.into() }
}

pub struct ReferenceEvaluator<'a> {
    env: &'a Environment,
    inputs: &'a HashMap<String, Buffer>,
    params: &'a HashMap<String, ConstValue>,
    /// (function, coords, component) -> value, for pure functions only;
    /// functions with updates are re-folded per query.
    cache: HashMap<(String, Vec<i64>, usize), ConstValue>,
}

impl<'a> ReferenceEvaluator<'a> {
    pub fn new(
        env: &'a Environment,
        inputs: &'a HashMap<String, Buffer>,
        params: &'a HashMap<String, ConstValue>,
    ) -> Self {
        Self { env, inputs, params, cache: HashMap::new() }
    }

    /// Realize one function densely over `[0, extent)` per dimension.
    pub fn realize(&mut self, func: &str, extents: &[i64]) -> Result<Buffer> {
        let f = self.env.function(func)?.clone();
        let mut buffer = Buffer::new_dense(f.return_types[0], extents);
        let mut coords = vec![0i64; extents.len()];
        if extents.iter().any(|&e| e <= 0) {
            return Ok(buffer);
        }
        'fill: loop {
            let value = self.value(func, &coords, 0)?;
            buffer.set(&coords, value).map_err(|e| unsupported(e.to_string()))?;
            for d in 0..extents.len() {
                coords[d] += 1;
                if coords[d] < extents[d] {
                    continue 'fill;
                }
                coords[d] = 0;
            }
            break;
        }
        Ok(buffer)
    }

    /// The value of one function at one coordinate.
    pub fn value(&mut self, func: &str, coords: &[i64], component: usize) -> Result<ConstValue> {
        let key = (func.to_string(), coords.to_vec(), component);
        if let Some(v) = self.cache.get(&key) {
            return Ok(*v);
        }
        let f = self.env.function(func)?.clone();

        // Pure definition first.
        let mut bindings: HashMap<String, ConstValue> = f
            .args
            .iter()
            .zip(coords)
            .map(|(a, &c)| (a.clone(), ConstValue::Int(c)))
            .collect();
        let mut value = self.eval(&f.values[component], &bindings, None)?;

        // Updates in declaration order, each folded across its whole
        // reduction domain in ascending order; only the points whose
        // left-hand side lands on `coords` contribute.
        for update in &f.updates {
            let domain: Vec<(String, i64, i64, Option<Expr>)> = match &update.rdom {
                None => Vec::new(),
                Some(d) => d
                    .vars
                    .iter()
                    .map(|rv| {
                        let min = self.eval_closed(&rv.min)?;
                        let extent = self.eval_closed(&rv.extent)?;
                        Ok((rv.name.clone(), min, extent, rv.predicate.clone()))
                    })
                    .collect::<Result<_>>()?,
            };

            let mut point = vec![0i64; domain.len()];
            'fold: loop {
                for (i, (name, min, _, _)) in domain.iter().enumerate() {
                    bindings.insert(name.clone(), ConstValue::Int(min + point[i]));
                }
                let gated = domain.iter().try_fold(true, |acc, (_, _, _, pred)| {
                    match pred {
                        Some(p) => {
                            Ok::<bool, Error>(acc && self.eval(p, &bindings, None)?.as_bool())
                        }
                        None => Ok(acc),
                    }
                })?;
                if gated {
                    let lhs: Vec<i64> = update
                        .args
                        .iter()
                        .map(|a| {
                            self.eval(a, &bindings, None)?.as_i64().ok_or_else(|| {
                                unsupported("non-integer left-hand side coordinate")
                            })
                        })
                        .collect::<Result<_>>()?;
                    if lhs == coords {
                        let current = Some((func, coords, value));
                        value = self.eval(&update.values[component], &bindings, current)?;
                    }
                }
                // Odometer over the domain, last axis fastest
                // (declaration order is outermost-first).
                if domain.is_empty() {
                    break;
                }
                let mut d = domain.len();
                loop {
                    if d == 0 {
                        break 'fold;
                    }
                    d -= 1;
                    point[d] += 1;
                    if point[d] < domain[d].2 {
                        break;
                    }
                    point[d] = 0;
                }
            }
            for (name, ..) in &domain {
                bindings.remove(name);
            }
        }

        if f.is_pure() {
            self.cache.insert(key, value);
        }
        Ok(value)
    }

    fn eval_closed(&mut self, e: &Expr) -> Result<i64> {
        self.eval(e, &HashMap::new(), None)?
            .as_i64()
            .ok_or_else(|| unsupported("expected an integer bound"))
    }

    /// Evaluate an expression under variable bindings. `current`
    /// supplies the accumulator for a self-call at the update's own
    /// coordinates.
    fn eval(
        &mut self,
        e: &Expr,
        bindings: &HashMap<String, ConstValue>,
        current: Option<(&str, &[i64], ConstValue)>,
    ) -> Result<ConstValue> {
        match e.node() {
            ExprNode::IntImm(v) => Ok(ConstValue::Int(*v)),
            ExprNode::UIntImm(v) => Ok(ConstValue::UInt(*v)),
            ExprNode::FloatImm(v) => Ok(ConstValue::Float(*v)),
            ExprNode::Var(name) => bindings
                .get(name)
                .or_else(|| self.params.get(name))
                .copied()
                .ok_or_else(|| unsupported(format!("unbound variable {name:?}"))),
            ExprNode::Cast { value } => {
                Ok(self.eval(value, bindings, current)?.cast_to(&e.ty()))
            }
            ExprNode::Unary(op, a) => {
                let v = self.eval(a, bindings, current)?;
                eval_unary(*op, &a.ty(), v).ok_or_else(|| unsupported(format!("{op:?} undefined here")))
            }
            ExprNode::Binary(op, a, b) => {
                let x = self.eval(a, bindings, current)?;
                let y = self.eval(b, bindings, current)?;
                eval_binary(*op, &a.ty(), x, y)
                    .ok_or_else(|| unsupported(format!("{op:?} undefined here")))
            }
            ExprNode::Select { condition, true_value, false_value } => {
                if self.eval(condition, bindings, current)?.as_bool() {
                    self.eval(true_value, bindings, current)
                } else {
                    self.eval(false_value, bindings, current)
                }
            }
            ExprNode::Call { name, args, call_type, value_index } => {
                let coords: Vec<i64> = args
                    .iter()
                    .map(|a| {
                        self.eval(a, bindings, current)?
                            .as_i64()
                            .ok_or_else(|| unsupported("non-integer call coordinate"))
                    })
                    .collect::<Result<_>>()?;
                match call_type {
                    CallType::Image => {
                        let buffer = self.inputs.get(name).ok_or_else(|| {
                            unsupported(format!("missing input buffer {name:?}"))
                        })?;
                        buffer.at(&coords).map_err(|e| unsupported(e.to_string()))
                    }
                    CallType::Function => {
                        if let Some((cur_name, cur_coords, cur_value)) = current
                            && name == cur_name
                        {
                            // A self-call inside an update: defined only
                            // at the point being updated.
                            if coords == cur_coords {
                                return Ok(cur_value);
                            }
                            return Err(unsupported(
                                "update reads its own function at another coordinate",
                            ));
                        }
                        self.value(name, &coords, *value_index)
                    }
                    CallType::Intrinsic if name == "likely" => {
                        self.eval(&args[0], bindings, current)
                    }
                    _ => Err(unsupported(format!("call to {name:?}"))),
                }
            }
            ExprNode::Let { name, value, body } => {
                let bound = self.eval(value, bindings, current)?;
                let mut inner = bindings.clone();
                inner.insert(name.clone(), bound);
                self.eval(body, &inner, current)
            }
            _ => Err(unsupported("vector construct in a definition")),
        }
    }
}

