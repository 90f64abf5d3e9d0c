//! Rule evaluation.
//!
//! [`PlanEvaluator`] executes a rule by walking its template's steps: source
//! slots are bound from the query view (with defaults where a value is
//! missing), the mapping expression is evaluated per solution, the target
//! individual is resolved through the owning context's class bridge, and the
//! filter gates the result.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::compiler::{Expr, Rule, Step};
use crate::function::{EvalArgs, EvalError, FunctionScope};
use crate::graph::{Graph, GraphSchema, SchemaView, UnionGraph};
use crate::mapping::MappingModel;
use crate::model::{Term, Triple};

/// One binding of source slots to values.
pub type Solution = BTreeMap<usize, Term>;

/// What a rule evaluation sees.
pub struct EvalEnv<'a> {
    pub view: &'a dyn Graph,
    pub mapping: &'a MappingModel,
    pub max_depth: usize,
}

/// Executes compiled rules for one individual.
pub trait QueryEvaluator {
    /// Triples `rule` produces for `this`. An empty result is not an error.
    fn evaluate(&self, rule: &Rule, this: &Term, env: &EvalEnv<'_>) -> Result<Vec<Triple>, EvalError>;
}

/// The in-crate [`QueryEvaluator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanEvaluator;

impl QueryEvaluator for PlanEvaluator {
    fn evaluate(&self, rule: &Rule, this: &Term, env: &EvalEnv<'_>) -> Result<Vec<Triple>, EvalError> {
        if let Some(arg) = rule.unbound_argument() {
            return Err(EvalError::UnboundTemplateArgument {
                rule: rule.id().to_string(),
                arg,
            });
        }

        let mut solutions = bind_slots(rule, this, env.view);
        let mut out = Vec::new();
        // resolved lazily, at most once per firing
        let mut target: Option<Option<Term>> = None;

        for step in rule.template().steps() {
            match *step {
                Step::Optional { .. } | Step::DefaultBind { .. } => {}
                Step::Mapping => {
                    let mut results = Vec::with_capacity(solutions.len());
                    for solution in &solutions {
                        let mut scope = EvalScope::new(env, this, 0);
                        results.push(eval_expr(rule.expression(), solution, &mut scope)?);
                    }
                    out = results;
                }
                Step::Target => {
                    if target.is_none() {
                        target = Some(resolve_target(env, rule.context(), this, 0)?);
                    }
                }
                Step::Filter => {
                    let Some(filter) = rule.filter() else {
                        continue;
                    };
                    let mut kept_solutions = Vec::new();
                    let mut kept_results = Vec::new();
                    for (solution, result) in solutions.into_iter().zip(out) {
                        let mut scope = EvalScope::new(env, this, 0);
                        // a failing filter counts as false
                        let pass = matches!(
                            eval_expr(filter, &solution, &mut scope),
                            Ok(Some(ref t)) if is_true(t)
                        );
                        if pass {
                            kept_solutions.push(solution);
                            kept_results.push(result);
                        }
                    }
                    solutions = kept_solutions;
                    out = kept_results;
                }
            }
        }

        let Some(Some(target)) = target else {
            return Ok(Vec::new());
        };
        let triples: BTreeSet<Triple> = out
            .into_iter()
            .flatten()
            .map(|result| Triple::new(target.clone(), rule.target_predicate().clone(), result))
            .collect();
        trace!("Rule {} produced {} triples for {this}", rule.id(), triples.len());
        Ok(triples.into_iter().collect())
    }
}

fn is_true(term: &Term) -> bool {
    term.as_literal().and_then(|l| l.as_bool()).unwrap_or(false)
}

/// Slot solutions of `rule` for `this`, defaults applied where a slot has no value.
fn bind_slots(rule: &Rule, this: &Term, view: &dyn Graph) -> Vec<Solution> {
    let mut solutions = vec![Solution::new()];
    for step in rule.template().steps() {
        match *step {
            Step::Optional { slot } => {
                let Some(predicate) = rule.predicate(slot) else {
                    continue;
                };
                let values = view.objects(this, predicate);
                if values.is_empty() {
                    continue;
                }
                solutions = solutions
                    .into_iter()
                    .flat_map(|s| {
                        values.iter().map(move |v| {
                            let mut next = s.clone();
                            next.insert(slot, v.clone());
                            next
                        })
                    })
                    .collect();
            }
            Step::DefaultBind { slot } => {
                if let Some(default) = rule.default(slot) {
                    for s in &mut solutions {
                        s.entry(slot).or_insert_with(|| Term::Literal(default.clone()));
                    }
                }
            }
            _ => {}
        }
    }
    solutions
}

/// Target individual `context` produces for `individual`.
///
/// `None` when the individual is not of the context's source class, the
/// context has no class bridge, its filter rejects the individual, or the
/// target expression yields nothing usable as a subject.
pub fn resolve_target(
    env: &EvalEnv<'_>,
    context: &str,
    individual: &Term,
    depth: usize,
) -> Result<Option<Term>, EvalError> {
    if depth > env.max_depth {
        return Err(EvalError::TooDeep(env.max_depth));
    }
    let ctx = env
        .mapping
        .context(context)
        .ok_or_else(|| EvalError::UnknownContext(context.to_string()))?;
    let Some(bridge) = ctx.class_bridge() else {
        return Ok(None);
    };

    if !class_closure(env.view, env.mapping, individual).contains(ctx.source()) {
        return Ok(None);
    }

    if let Some(filter) = bridge.rule().filter() {
        let mut pass = false;
        for solution in bind_slots(bridge.rule(), individual, env.view) {
            let mut scope = EvalScope::new(env, individual, depth);
            if matches!(eval_expr(filter, &solution, &mut scope), Ok(Some(ref t)) if is_true(t)) {
                pass = true;
                break;
            }
        }
        if !pass {
            return Ok(None);
        }
    }

    let mut scope = EvalScope::new(env, individual, depth);
    let target = eval_expr(bridge.target(), &Solution::new(), &mut scope)?;
    Ok(target.filter(Term::is_resource))
}

/// Asserted classes of `individual` in `view` plus all their superclasses.
///
/// Subclass axioms count wherever they live: in the instance graphs of the
/// view or in the mapping schema.
pub fn class_closure(view: &dyn Graph, mapping: &MappingModel, individual: &Term) -> BTreeSet<Term> {
    let axioms = UnionGraph::new(vec![view, mapping.schema().graph() as &dyn Graph]);
    GraphSchema::new(&axioms).class_closure_of(individual)
}

/// Evaluate `expr` under one solution.
pub fn eval_expr(
    expr: &Expr,
    solution: &Solution,
    scope: &mut dyn FunctionScope,
) -> Result<Option<Term>, EvalError> {
    match expr {
        Expr::Const(term) => Ok(Some(term.clone())),
        Expr::Var(slot) => Ok(solution.get(slot).cloned()),
        Expr::This => Ok(Some(scope.this().clone())),
        Expr::Call { function, args } => {
            let mut values = Vec::with_capacity(args.len());
            for (name, arg) in args {
                values.push((name.clone(), eval_expr(arg, solution, scope)?));
            }
            function.evaluate(scope, &EvalArgs::new(values))
        }
    }
}

struct EvalScope<'e, 'a> {
    env: &'e EvalEnv<'a>,
    this: Term,
    depth: usize,
}

impl<'e, 'a> EvalScope<'e, 'a> {
    fn new(env: &'e EvalEnv<'a>, this: &Term, depth: usize) -> Self {
        Self {
            env,
            this: this.clone(),
            depth,
        }
    }
}

impl FunctionScope for EvalScope<'_, '_> {
    fn this(&self) -> &Term {
        &self.this
    }

    fn values(&self, subject: &Term, property: &Term) -> Vec<Term> {
        self.env.view.objects(subject, property).into_iter().collect()
    }

    fn target_of(&mut self, context: &str, individual: &Term) -> Result<Option<Term>, EvalError> {
        resolve_target(self.env, context, individual, self.depth + 1)
    }
}
