//! Compiled expressions.
//!
//! Source properties referenced by a mapping become positional variables
//! (`Var(slot)`) so that the same expression shape can run against whatever
//! predicates a rule binds. Identity wrappers disappear during compilation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::function::{Call, Function, Value, ValueType};
use crate::model::ontology::{func, local_name, map};
use crate::model::{Literal, Term};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(Term),
    /// Value of the source predicate bound to this slot.
    Var(usize),
    /// The individual being processed.
    This,
    Call {
        function: Arc<Function>,
        args: Vec<(String, Expr)>,
    },
}

impl Expr {
    /// Slots read anywhere in the expression.
    pub fn vars(&self) -> BTreeSet<usize> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut BTreeSet<usize>) {
        match self {
            Expr::Var(slot) => {
                out.insert(*slot);
            }
            Expr::Call { args, .. } => {
                for (_, arg) in args {
                    arg.collect_vars(out);
                }
            }
            Expr::Const(_) | Expr::This => {}
        }
    }

    /// Every function applied in the expression, outermost first.
    pub fn functions(&self) -> Vec<&Arc<Function>> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            if let Expr::Call { function, args } = expr {
                out.push(function);
                stack.extend(args.iter().rev().map(|(_, a)| a));
            }
        }
        out
    }

    /// Replace identity wrappers by the argument they pass through.
    pub fn simplify(self) -> Expr {
        match self {
            Expr::Call { function, args } => {
                let mut args: Vec<(String, Expr)> = args
                    .into_iter()
                    .map(|(name, arg)| (name, arg.simplify()))
                    .collect();
                if let Some(passed) = function.identity_arg() {
                    if let Some(pos) = args.iter().position(|(name, _)| name == passed) {
                        if folds_away(&function, &args[pos].1) {
                            return args.swap_remove(pos).1;
                        }
                    }
                }
                Expr::Call { function, args }
            }
            other => other,
        }
    }
}

/// A `withDefault` only disappears when it guards a slot, because the slot
/// then carries the default. Around anything else it has to stay a call.
fn folds_away(function: &Function, passed: &Expr) -> bool {
    function.iri() != func::WITH_DEFAULT || matches!(passed, Expr::Var(_))
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(term) => term.fmt(f),
            Expr::Var(slot) => write!(f, "?value{slot}"),
            Expr::This => f.write_str("?this"),
            Expr::Call { function, args } => {
                write!(f, "{}:{}(", func::PREFIX, function.local_name())?;
                for (i, (name, arg)) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}={arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Rewrites the calls of one rule into [`Expr`]s.
///
/// Slots are numbered per compiler in first-appearance order, so compiling
/// the mapping before the filter numbers mapping predicates first. The same
/// property always maps to the same slot.
#[derive(Debug)]
pub struct ExpressionCompiler<'a> {
    properties: &'a BTreeSet<Term>,
    slots: IndexMap<Term, usize>,
    defaults: BTreeMap<usize, Literal>,
}

impl<'a> ExpressionCompiler<'a> {
    /// `properties` are the source-context properties eligible for slots.
    pub fn new(properties: &'a BTreeSet<Term>) -> Self {
        Self {
            properties,
            slots: IndexMap::new(),
            defaults: BTreeMap::new(),
        }
    }

    /// Compile without turning any property into a slot. Used for the
    /// target expression of class bridges, whose functions read property
    /// values themselves.
    pub fn constant(call: &Call) -> Expr {
        let empty = BTreeSet::new();
        ExpressionCompiler::new(&empty).compile(call)
    }

    pub fn compile(&mut self, call: &Call) -> Expr {
        self.call(call).simplify()
    }

    /// Bound predicates in slot order.
    pub fn predicates(&self) -> Vec<(usize, Term)> {
        let mut out: Vec<(usize, Term)> = self
            .slots
            .iter()
            .map(|(property, slot)| (*slot, property.clone()))
            .collect();
        out.sort_by_key(|(slot, _)| *slot);
        out
    }

    pub fn defaults(&self) -> &BTreeMap<usize, Literal> {
        &self.defaults
    }

    fn call(&mut self, call: &Call) -> Expr {
        let args: Vec<(String, Expr)> = call
            .as_map()
            .into_iter()
            .map(|(spec, value)| (spec.name().to_string(), value, spec.value_type()))
            .map(|(name, value, ty)| {
                let expr = self.value(value, ty);
                (name, expr)
            })
            .collect();

        if call.function().iri() == func::WITH_DEFAULT {
            let slot = args.iter().find_map(|(name, e)| match e.clone().simplify() {
                Expr::Var(slot) if name == "arg1" => Some(slot),
                _ => None,
            });
            if let (Some(slot), Some(Value::Literal(default))) = (slot, call.arg("arg2")) {
                self.defaults.insert(slot, default.clone());
            }
        }

        Expr::Call {
            function: Arc::clone(call.function()),
            args,
        }
    }

    fn value(&mut self, value: &Value, ty: &ValueType) -> Expr {
        match value {
            Value::Literal(lit) => Expr::Const(Term::Literal(lit.clone())),
            Value::Call(nested) => self.call(nested),
            Value::Reference(iri) if iri == map::SOURCE_VARIABLE => Expr::This,
            Value::Reference(iri) => {
                let term = Term::iri(iri.as_str());
                if *ty == ValueType::Iri || !self.properties.contains(&term) {
                    return Expr::Const(term);
                }
                let next = self.slots.len() + 1;
                let slot = *self.slots.entry(term).or_insert(next);
                Expr::Var(slot)
            }
        }
    }
}

/// Short label for logs: local names of functions and constants.
pub fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Const(Term::Iri(iri)) => local_name(iri).to_string(),
        Expr::Call { function, args } => {
            let inner: Vec<String> = args.iter().map(|(_, a)| describe(a)).collect();
            format!("{}({})", function.local_name(), inner.join(", "))
        }
        other => other.to_string(),
    }
}
