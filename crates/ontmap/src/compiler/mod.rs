//! Rule and template compilation.
//!
//! A bridge is compiled into a [`Rule`]: a shared [`Template`] plus the
//! concrete arguments (expression, filter, predicates, defaults) bound to it.
//! Rules whose expressions read the same slot layout share one template.

pub mod expr;
pub mod template;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::function::{Call, Function, FunctionRegistry};
use crate::model::ontology::standard;
use crate::model::{Literal, Term};
use crate::store::SchemaStore;

pub use expr::{Expr, ExpressionCompiler};
pub use template::{args, ArgConstraint, Step, Template, TemplateKey};

/// Look up or synthesize the template for the given slot layout.
pub fn compile(
    store: &mut dyn SchemaStore,
    filter_slots: &[usize],
    mapping_slots: &[usize],
    target_arity: usize,
) -> Arc<Template> {
    let key = TemplateKey::new(filter_slots, mapping_slots, target_arity);
    if let Some(existing) = store.template(&key) {
        return existing;
    }
    debug!("Synthesizing template {key}");
    store.add_template(Template::synthesize(key))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleKind {
    /// Asserts the target individual's type.
    ClassBridge,
    /// Produces one target property.
    PropertyBridge,
}

/// A template bound to one bridge of one context.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    id: String,
    context: String,
    kind: RuleKind,
    template: Arc<Template>,
    expression: Expr,
    filter: Option<Expr>,
    predicates: Vec<(usize, Term)>,
    defaults: BTreeMap<usize, Literal>,
    target_predicate: Term,
    text: String,
}

impl Rule {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    pub fn expression(&self) -> &Expr {
        &self.expression
    }

    pub fn filter(&self) -> Option<&Expr> {
        self.filter.as_ref()
    }

    pub fn predicates(&self) -> &[(usize, Term)] {
        &self.predicates
    }

    pub fn predicate(&self, slot: usize) -> Option<&Term> {
        self.predicates
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, p)| p)
    }

    pub fn default(&self, slot: usize) -> Option<&Literal> {
        self.defaults.get(&slot)
    }

    pub fn defaults(&self) -> &BTreeMap<usize, Literal> {
        &self.defaults
    }

    pub fn target_predicate(&self) -> &Term {
        &self.target_predicate
    }

    /// Canonical text: the template body with this rule's arguments filled in.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Template arguments this rule binds, rendered as text.
    pub fn bindings(&self) -> IndexMap<String, String> {
        let mut out = IndexMap::new();
        out.insert(args::EXPRESSION.to_string(), self.expression.to_string());
        if let Some(filter) = &self.filter {
            out.insert(args::FILTER.to_string(), filter.to_string());
        }
        out.insert(args::CONTEXT.to_string(), format!("<{}>", self.context));
        out.insert(args::target_predicate(1), self.target_predicate.to_string());
        for (slot, property) in &self.predicates {
            out.insert(args::source_predicate(*slot), property.to_string());
        }
        for (slot, default) in &self.defaults {
            out.insert(args::source_default(*slot), default.to_string());
        }
        out
    }

    /// First required template argument this rule leaves unbound.
    pub fn unbound_argument(&self) -> Option<String> {
        let bindings = self.bindings();
        self.template
            .missing_argument(&|name| bindings.contains_key(name))
            .map(str::to_string)
    }

    /// Every function the rule's expressions apply.
    pub fn functions(&self) -> Vec<&Arc<Function>> {
        let mut out = self.expression.functions();
        if let Some(filter) = &self.filter {
            out.extend(filter.functions());
        }
        out
    }

    /// Slots read by the mapping expression or the filter.
    pub fn slots(&self) -> BTreeSet<usize> {
        let mut out = self.expression.vars();
        if let Some(filter) = &self.filter {
            out.extend(filter.vars());
        }
        out
    }
}

/// Compiles bridges of one context into rules, recording shared metadata in a store.
pub struct RuleCompiler<'a> {
    store: &'a mut dyn SchemaStore,
    functions: &'a FunctionRegistry,
    properties: &'a BTreeSet<Term>,
}

impl<'a> RuleCompiler<'a> {
    /// `properties` are the source-class properties that become slots.
    pub fn new(
        store: &'a mut dyn SchemaStore,
        functions: &'a FunctionRegistry,
        properties: &'a BTreeSet<Term>,
    ) -> Self {
        Self {
            store,
            functions,
            properties,
        }
    }

    /// Rule asserting `?target rdf:type target_class`, optionally gated by `filter`.
    pub fn class_bridge(
        &mut self,
        id: String,
        context: &str,
        target_class: &Term,
        filter: Option<&Call>,
    ) -> Rule {
        let mut compiler = ExpressionCompiler::new(self.properties);
        let filter = filter.map(|f| compiler.compile(f));
        self.finish(
            id,
            context,
            RuleKind::ClassBridge,
            &compiler,
            Expr::Const(target_class.clone()),
            filter,
            Term::iri(standard::RDF_TYPE),
        )
    }

    /// Rule asserting `?target target ?result` where `?result` is the mapping value.
    pub fn property_bridge(
        &mut self,
        id: String,
        context: &str,
        mapping: &Call,
        filter: Option<&Call>,
        target: &Term,
    ) -> Rule {
        let mut compiler = ExpressionCompiler::new(self.properties);
        let expression = compiler.compile(mapping);
        let filter = filter.map(|f| compiler.compile(f));
        self.finish(
            id,
            context,
            RuleKind::PropertyBridge,
            &compiler,
            expression,
            filter,
            target.clone(),
        )
    }

    /// Record a custom function and everything it depends on.
    pub fn register_function(&mut self, function: &Arc<Function>) {
        if !function.is_custom() {
            return;
        }
        let mut pending = vec![Arc::clone(function)];
        let mut seen = BTreeSet::new();
        while let Some(next) = pending.pop() {
            if !seen.insert(next.iri().to_string()) {
                continue;
            }
            self.store.add_function(&next);
            pending.extend(
                next.dependencies()
                    .iter()
                    .filter_map(|dep| self.functions.get(dep)),
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &mut self,
        id: String,
        context: &str,
        kind: RuleKind,
        compiler: &ExpressionCompiler<'_>,
        expression: Expr,
        filter: Option<Expr>,
        target_predicate: Term,
    ) -> Rule {
        let sources: Vec<usize> = expression.vars().into_iter().collect();
        let filters: Vec<usize> = filter
            .as_ref()
            .map(|f| f.vars().into_iter().collect())
            .unwrap_or_default();
        let template = compile(&mut *self.store, &filters, &sources, 1);

        let mut rule = Rule {
            id,
            context: context.to_string(),
            kind,
            template,
            expression,
            filter,
            predicates: compiler.predicates(),
            defaults: compiler.defaults().clone(),
            target_predicate,
            text: String::new(),
        };
        let bindings = rule.bindings();
        rule.text = rule.template.render(&|name| bindings.get(name).cloned());

        for slot in rule.slots() {
            self.store.add_variable(slot);
        }
        let used: Vec<Arc<Function>> = rule.functions().into_iter().cloned().collect();
        for function in &used {
            self.register_function(function);
        }
        debug!("Compiled rule {} onto {}", rule.id, rule.template.iri());
        rule
    }
}
