//! The mapping model: contexts, their bridges and compiled rules.
//!
//! A [`MappingModel`] owns the schema it validates against, the shared
//! [`MetaStore`] of templates and custom functions, and one [`Context`] per
//! `(source class, target class)` pair. Bridges are edited through
//! [`ContextMut`]; every check runs before anything is changed, so a failed
//! edit leaves the model as it was.

mod context;
mod materialize;

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::compiler::{Rule, RuleCompiler};
use crate::config::MapConfig;
use crate::error::{ErrorCode, Key, MapError, Result};
use crate::function::{Call, FunctionRegistry};
use crate::graph::{Graph, GraphMut, GraphSchema, MemGraph, SchemaView};
use crate::infer::{InferenceEngine, RunStats};
use crate::model::iri::IriMinter;
use crate::model::ontology::{func, standard};
use crate::model::Term;
use crate::store::{Liveness, MetaStore, SchemaStore};
use crate::validate::{ContextScope, ValidationSession};

pub use context::{ClassBridge, Context, ContextMut, PropertyBridge};

pub struct MappingModel {
    minter: IriMinter,
    config: MapConfig,
    functions: Arc<FunctionRegistry>,
    schema: GraphSchema<MemGraph>,
    contexts: IndexMap<String, Context>,
    store: MetaStore,
    next_id: usize,
}

impl MappingModel {
    /// Model over `schema` (the union of source and target ontologies).
    pub fn new(schema: MemGraph, functions: Arc<FunctionRegistry>) -> Self {
        Self::with_config(schema, functions, MapConfig::default())
    }

    pub fn with_config(schema: MemGraph, functions: Arc<FunctionRegistry>, config: MapConfig) -> Self {
        Self {
            minter: IriMinter::new(&config.base_iri),
            config,
            functions,
            schema: GraphSchema::new(schema),
            contexts: IndexMap::new(),
            store: MetaStore::new(),
            next_id: 0,
        }
    }

    pub fn iri(&self) -> &str {
        self.minter.base_uri()
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn functions(&self) -> &Arc<FunctionRegistry> {
        &self.functions
    }

    pub fn schema(&self) -> &GraphSchema<MemGraph> {
        &self.schema
    }

    pub fn store(&self) -> &MetaStore {
        &self.store
    }

    // ---------------------------------------------------------------------
    // Contexts
    // ---------------------------------------------------------------------

    /// Context for `source → target`, created on first request.
    pub fn create_context(&mut self, source: &str, target: &str) -> Result<String> {
        let id = self.ensure_context(source, target, false);
        if self.config.generate_named_individuals && target != standard::OWL_NAMED_INDIVIDUAL {
            self.ensure_named_individual_context(target)?;
        }
        Ok(id)
    }

    pub fn context(&self, id: &str) -> Option<&Context> {
        self.contexts.get(id)
    }

    pub fn context_mut(&mut self, id: &str) -> Result<ContextMut<'_>> {
        if !self.contexts.contains_key(id) {
            return Err(not_found(id));
        }
        Ok(ContextMut::new(self, id.to_string()))
    }

    /// All contexts, hidden ones included, in creation order.
    pub fn contexts(&self) -> impl Iterator<Item = &Context> {
        self.contexts.values()
    }

    pub fn find_context(&self, source: &str, target: &str) -> Option<&Context> {
        let (source, target) = (Term::iri(source), Term::iri(target));
        self.contexts
            .values()
            .find(|c| c.source() == &source && c.target() == &target)
    }

    /// Contexts whose expressions reference `id`.
    pub fn dependent_contexts(&self, id: &str) -> Vec<String> {
        self.contexts
            .values()
            .filter(|c| c.id() != id)
            .filter(|c| c.calls().any(|call| call.references().contains(&id)))
            .map(|c| c.id().to_string())
            .collect()
    }

    /// Delete a context with its bridges and rules, then collect garbage.
    pub fn remove_context(&mut self, id: &str) -> Result<()> {
        let Some(context) = self.contexts.get(id) else {
            return Err(not_found(id));
        };
        let dependents = self.dependent_contexts(id);
        if !dependents.is_empty() {
            let err = ErrorCode::MappingContextCannotBeDeletedDueToDependencies
                .error()
                .with(Key::Context, id)
                .with(Key::ContextSource, context.source().value())
                .with(Key::ContextTarget, context.target().value());
            return Err(dependents
                .iter()
                .fold(err, |err, dep| err.with(Key::Dependent, dep)));
        }

        if let Some(removed) = self.contexts.shift_remove(id) {
            debug!("Removed context {id}");
            self.drop_orphaned_companion(removed.target());
        }
        self.collect_garbage();
        Ok(())
    }

    /// Link two contexts through the single object property connecting their target classes.
    ///
    /// The bridge is added on the context whose target class is the link's
    /// subject, and reads the other context's target individual. Returns the
    /// new bridge's id.
    pub fn bind_contexts(&mut self, left: &str, right: &str) -> Result<String> {
        let l = self.contexts.get(left).ok_or_else(|| not_found(left))?;
        let r = self.contexts.get(right).ok_or_else(|| not_found(right))?;

        let mut candidates: Vec<(String, String, Term)> = Vec::new();
        for p in self.schema.link_properties(l.target(), r.target()) {
            candidates.push((left.to_string(), right.to_string(), p));
        }
        if l.target() != r.target() {
            for p in self.schema.link_properties(r.target(), l.target()) {
                candidates.push((right.to_string(), left.to_string(), p));
            }
        }

        let (owner, other, link) = match candidates.len() {
            0 => {
                return Err(ErrorCode::MappingAttachedContextTargetClassNotLinked
                    .error()
                    .with(Key::Context, left)
                    .with(Key::Context, right)
                    .with(Key::ContextTarget, l.target().value())
                    .with(Key::ContextTarget, r.target().value()))
            }
            1 => candidates.remove(0),
            _ => {
                let err = ErrorCode::MappingAttachedContextAmbiguousClassLink
                    .error()
                    .with(Key::Context, left)
                    .with(Key::Context, right);
                return Err(candidates
                    .iter()
                    .fold(err, |err, (_, _, p)| err.with(Key::Property, p.value())));
            }
        };

        let call = self
            .functions
            .require(func::TARGET_RESOURCE)?
            .call()
            .reference("context", &other)
            .build()?;
        let link = link.value().to_string();
        self.context_mut(&owner)?.add_property_bridge(None, call, &link)
    }

    /// Validate a call without a context: signatures and schema only.
    pub fn validate(&self, call: &Call) -> Result<()> {
        ValidationSession::new(&self.schema)
            .with_contexts(self.contexts.keys().cloned())
            .validate(call)
    }

    // ---------------------------------------------------------------------
    // Rules
    // ---------------------------------------------------------------------

    /// Every compiled rule, per context: class bridge first, then property bridges.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.contexts.values().flat_map(Context::rules)
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules().find(|r| r.id() == id)
    }

    /// Remove templates, custom functions and variables no rule uses any
    /// more. Runs to a fixed point, and at least twice, because dropping a
    /// function can orphan the functions it depends on.
    pub fn collect_garbage(&mut self) -> usize {
        let live = self.liveness();
        let mut removed = 0;
        let mut passes = 0;
        loop {
            let n = self.store.collect_garbage(&live);
            removed += n;
            passes += 1;
            if n == 0 && passes >= 2 {
                break;
            }
        }
        if removed > 0 {
            debug!("Garbage collection removed {removed} entries in {passes} passes");
        }
        removed
    }

    fn liveness(&self) -> Liveness {
        let mut live = Liveness::default();
        for rule in self.rules() {
            live.templates.insert(rule.template().iri().to_string());
            live.variables.extend(rule.slots());
            live.functions
                .extend(rule.functions().iter().map(|f| f.iri().to_string()));
        }
        for bridge in self.contexts.values().filter_map(Context::class_bridge) {
            live.functions.extend(
                bridge
                    .target()
                    .functions()
                    .iter()
                    .map(|f| f.iri().to_string()),
            );
        }
        live
    }

    /// Materialize the mapping as RDF.
    pub fn to_graph(&self) -> MemGraph {
        materialize::mapping_graph(self)
    }

    /// Run inference over `source`, writing into `target`.
    pub fn run_inference<T: GraphMut>(&self, source: &dyn Graph, target: &mut T) -> Result<RunStats> {
        InferenceEngine::new(self).run(source, target)
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn next_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    fn ensure_context(&mut self, source: &str, target: &str, hidden: bool) -> String {
        let (s, t) = (Term::iri(source), Term::iri(target));
        if let Some(existing) = self
            .contexts
            .values_mut()
            .find(|c| c.source() == &s && c.target() == &t)
        {
            if !hidden {
                existing.set_hidden(false);
            }
            return existing.id().to_string();
        }

        let mut id = self.minter.context_iri(source, target);
        if self.contexts.contains_key(&id) {
            id = IriMinter::uuid_iri(&format!("{} {source} {target}", self.minter.base_uri()));
        }
        debug!("Created context {id}");
        self.contexts
            .insert(id.clone(), Context::new(id.clone(), s, t, hidden));
        id
    }

    fn ensure_named_individual_context(&mut self, target: &str) -> Result<()> {
        let id = self.ensure_context(target, standard::OWL_NAMED_INDIVIDUAL, true);
        if self.contexts.get(&id).is_some_and(|c| c.class_bridge().is_some()) {
            return Ok(());
        }
        let call = self.functions.require(func::SELF)?.call().build()?;
        self.context_mut(&id)?.add_class_bridge(call)
    }

    /// Remove the hidden named-individual context of `target` once no
    /// visible context produces `target` any more.
    fn drop_orphaned_companion(&mut self, target: &Term) {
        let still_used = self
            .contexts
            .values()
            .any(|c| !c.is_hidden() && c.target() == target);
        if still_used {
            return;
        }
        let companion = self
            .contexts
            .values()
            .find(|c| c.is_hidden() && c.source() == target)
            .map(|c| c.id().to_string());
        if let Some(id) = companion {
            if self.dependent_contexts(&id).is_empty() {
                self.contexts.shift_remove(&id);
                debug!("Removed hidden context {id}");
            }
        }
    }

    fn session(&self, id: &str) -> Result<ValidationSession<'_>> {
        let context = self.contexts.get(id).ok_or_else(|| not_found(id))?;
        let scope = ContextScope {
            id: id.to_string(),
            source: context.source().clone(),
            target: context.target().clone(),
        };
        Ok(ValidationSession::for_context(&self.schema, scope)
            .with_contexts(self.contexts.keys().cloned()))
    }

    fn rule_compiler<'a>(
        store: &'a mut MetaStore,
        functions: &'a FunctionRegistry,
        properties: &'a BTreeSet<Term>,
    ) -> RuleCompiler<'a> {
        RuleCompiler::new(store as &mut dyn SchemaStore, functions, properties)
    }

    fn source_properties(&self, id: &str) -> BTreeSet<Term> {
        self.contexts
            .get(id)
            .map(|c| self.schema.properties_of(c.source()))
            .unwrap_or_default()
    }
}

fn not_found(id: &str) -> MapError {
    ErrorCode::ContextNotFound.error().with(Key::Context, id)
}
