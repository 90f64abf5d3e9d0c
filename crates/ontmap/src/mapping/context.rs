//! Contexts and their bridges.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::compiler::{Expr, ExpressionCompiler, Rule};
use crate::error::{ErrorCode, Key, Result};
use crate::function::Call;
use crate::graph::SchemaView;
use crate::model::Term;

use super::MappingModel;

/// Maps individuals of one source class onto individuals of one target class.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    id: String,
    source: Term,
    target: Term,
    class_bridge: Option<ClassBridge>,
    bridges: IndexMap<String, PropertyBridge>,
    hidden: bool,
}

impl Context {
    pub(super) fn new(id: String, source: Term, target: Term, hidden: bool) -> Self {
        Self {
            id,
            source,
            target,
            class_bridge: None,
            bridges: IndexMap::new(),
            hidden,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &Term {
        &self.source
    }

    pub fn target(&self) -> &Term {
        &self.target
    }

    /// Created implicitly, e.g. for `owl:NamedIndividual` typing.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub(super) fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn class_bridge(&self) -> Option<&ClassBridge> {
        self.class_bridge.as_ref()
    }

    pub fn property_bridges(&self) -> impl Iterator<Item = &PropertyBridge> {
        self.bridges.values()
    }

    pub fn property_bridge(&self, id: &str) -> Option<&PropertyBridge> {
        self.bridges.get(id)
    }

    /// Every call held by the context: target, filters and mappings.
    pub fn calls(&self) -> impl Iterator<Item = &Call> {
        let class = self
            .class_bridge
            .iter()
            .flat_map(|b| std::iter::once(&b.call).chain(b.filter.as_ref()));
        let properties = self
            .bridges
            .values()
            .flat_map(|b| std::iter::once(&b.mapping).chain(b.filter.as_ref()));
        class.chain(properties)
    }

    /// Class bridge rule first, then property bridge rules in insertion order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.class_bridge
            .iter()
            .map(|b| &b.rule)
            .chain(self.bridges.values().map(|b| &b.rule))
    }
}

/// How a context mints target individuals.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassBridge {
    call: Call,
    filter: Option<Call>,
    target: Expr,
    rule: Rule,
}

impl ClassBridge {
    pub fn call(&self) -> &Call {
        &self.call
    }

    pub fn filter(&self) -> Option<&Call> {
        self.filter.as_ref()
    }

    /// Compiled target expression, evaluated with the source individual as `?this`.
    pub fn target(&self) -> &Expr {
        &self.target
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }
}

/// Produces one target property from source values.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyBridge {
    id: String,
    mapping: Call,
    filter: Option<Call>,
    target: Term,
    rule: Rule,
}

impl PropertyBridge {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mapping(&self) -> &Call {
        &self.mapping
    }

    pub fn filter(&self) -> Option<&Call> {
        self.filter.as_ref()
    }

    pub fn target(&self) -> &Term {
        &self.target
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }
}

/// Mutable access to one context of a [`MappingModel`].
pub struct ContextMut<'m> {
    model: &'m mut MappingModel,
    id: String,
}

impl<'m> ContextMut<'m> {
    pub(super) fn new(model: &'m mut MappingModel, id: String) -> Self {
        Self { model, id }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn context(&self) -> Result<&Context> {
        self.model
            .contexts
            .get(&self.id)
            .ok_or_else(|| super::not_found(&self.id))
    }

    /// Validate `call` as if it were used in this context.
    pub fn validate(&self, call: &Call) -> Result<()> {
        self.model.session(&self.id)?.validate(call)
    }

    /// Set the class bridge, replacing any previous one.
    pub fn add_class_bridge(&mut self, call: Call) -> Result<()> {
        self.set_class_bridge(None, call)
    }

    /// Set a class bridge that only fires where `filter` holds.
    pub fn add_class_bridge_with_filter(&mut self, filter: Call, call: Call) -> Result<()> {
        self.set_class_bridge(Some(filter), call)
    }

    fn set_class_bridge(&mut self, filter: Option<Call>, call: Call) -> Result<()> {
        if !call.function().is_target() {
            return Err(ErrorCode::ContextRequireTargetFunction
                .error()
                .with(Key::Context, &self.id)
                .with(Key::Function, call.function().iri()));
        }
        if let Some(filter) = &filter {
            if !filter.function().is_boolean() {
                return Err(ErrorCode::ContextNotBooleanFilterFunction
                    .error()
                    .with(Key::Context, &self.id)
                    .with(Key::Function, filter.function().iri()));
            }
        }
        {
            let session = self.model.session(&self.id)?;
            session.validate(&call)?;
            if let Some(filter) = &filter {
                session.validate(filter)?;
            }
        }

        let target_class = self.context()?.target().clone();
        let n = self.model.next_id();
        let rule_id = self.model.minter.rule_iri(n);
        let properties = self.model.source_properties(&self.id);
        let functions = Arc::clone(&self.model.functions);
        let mut compiler =
            MappingModel::rule_compiler(&mut self.model.store, &functions, &properties);
        let rule = compiler.class_bridge(rule_id, &self.id, &target_class, filter.as_ref());
        for function in call.functions() {
            compiler.register_function(function);
        }
        let target = ExpressionCompiler::constant(&call);

        debug!("Class bridge of {} is now {call}", self.id);
        let bridge = ClassBridge {
            call,
            filter,
            target,
            rule,
        };
        if let Some(context) = self.model.contexts.get_mut(&self.id) {
            context.class_bridge = Some(bridge);
        }
        self.model.collect_garbage();
        Ok(())
    }

    /// Add a bridge asserting `target` on the target individual with the value of `mapping`.
    ///
    /// Returns the bridge id. `filter`, when given, must return `xsd:boolean`
    /// and gates the bridge per solution.
    pub fn add_property_bridge(
        &mut self,
        filter: Option<Call>,
        mapping: Call,
        target: &str,
    ) -> Result<String> {
        if mapping.function().is_target() {
            return Err(ErrorCode::PropertyBridgeTargetFunction
                .error()
                .with(Key::Context, &self.id)
                .with(Key::Function, mapping.function().iri()));
        }
        if let Some(filter) = &filter {
            if !filter.function().is_boolean() {
                return Err(ErrorCode::PropertyBridgeNotBooleanFilterFunction
                    .error()
                    .with(Key::Context, &self.id)
                    .with(Key::Function, filter.function().iri()));
            }
        }
        let target = Term::iri(target);
        {
            let session = self.model.session(&self.id)?;
            let allowed = session
                .target_properties()
                .is_some_and(|props| props.contains(&target));
            if !allowed {
                let context = self.context()?;
                return Err(ErrorCode::PropertyBridgeWrongTargetProperty
                    .error()
                    .with(Key::Context, &self.id)
                    .with(Key::ContextTarget, context.target().value())
                    .with(Key::Property, target.value()));
            }
            session.validate(&mapping)?;
            if let Some(filter) = &filter {
                session.validate(filter)?;
            }
        }

        let n = self.model.next_id();
        let bridge_id = self.model.minter.bridge_iri(n);
        let rule_id = self.model.minter.rule_iri(n);
        let properties = self.model.source_properties(&self.id);
        let functions = Arc::clone(&self.model.functions);
        let rule = MappingModel::rule_compiler(&mut self.model.store, &functions, &properties)
            .property_bridge(rule_id, &self.id, &mapping, filter.as_ref(), &target);

        debug!("Added property bridge {bridge_id} to {}: {mapping}", self.id);
        let bridge = PropertyBridge {
            id: bridge_id.clone(),
            mapping,
            filter,
            target,
            rule,
        };
        if let Some(context) = self.model.contexts.get_mut(&self.id) {
            context.bridges.insert(bridge_id.clone(), bridge);
        }
        Ok(bridge_id)
    }

    pub fn remove_property_bridge(&mut self, bridge_id: &str) -> Result<()> {
        let removed = self
            .model
            .contexts
            .get_mut(&self.id)
            .and_then(|c| c.bridges.shift_remove(bridge_id));
        if removed.is_none() {
            return Err(ErrorCode::PropertyBridgeNotFound
                .error()
                .with(Key::Context, &self.id)
                .with(Key::Mapping, bridge_id));
        }
        debug!("Removed property bridge {bridge_id} from {}", self.id);
        self.model.collect_garbage();
        Ok(())
    }

    /// Properties of the source class usable as slots.
    pub fn source_properties(&self) -> Vec<Term> {
        self.context()
            .map(|c| self.model.schema.properties_of(c.source()).into_iter().collect())
            .unwrap_or_default()
    }
}
