//! Storage for the shared metadata rules point at: templates, custom
//! functions and positional variables.

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::compiler::{Template, TemplateKey};
use crate::function::Function;

/// What the rules of a mapping still reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Liveness {
    pub templates: BTreeSet<String>,
    pub functions: BTreeSet<String>,
    pub variables: BTreeSet<usize>,
}

/// Add, look up and garbage-collect shared mapping metadata.
pub trait SchemaStore {
    fn template(&self, key: &TemplateKey) -> Option<Arc<Template>>;

    /// Store a template. An existing template with the same key wins.
    fn add_template(&mut self, template: Template) -> Arc<Template>;

    fn add_function(&mut self, function: &Arc<Function>);

    fn add_variable(&mut self, slot: usize);

    /// One collection pass; returns how many entries were removed.
    ///
    /// A function stays if it is live or if another stored function depends
    /// on it, so dependency chains shrink by one link per pass.
    fn collect_garbage(&mut self, live: &Liveness) -> usize;
}

/// In-memory [`SchemaStore`].
#[derive(Debug, Clone, Default)]
pub struct MetaStore {
    templates: IndexMap<TemplateKey, Arc<Template>>,
    functions: IndexMap<String, Arc<Function>>,
    variables: BTreeSet<usize>,
}

impl MetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn templates(&self) -> impl Iterator<Item = &Arc<Template>> {
        self.templates.values()
    }

    pub fn functions(&self) -> impl Iterator<Item = &Arc<Function>> {
        self.functions.values()
    }

    pub fn variables(&self) -> &BTreeSet<usize> {
        &self.variables
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty() && self.functions.is_empty() && self.variables.is_empty()
    }
}

impl SchemaStore for MetaStore {
    fn template(&self, key: &TemplateKey) -> Option<Arc<Template>> {
        self.templates.get(key).cloned()
    }

    fn add_template(&mut self, template: Template) -> Arc<Template> {
        Arc::clone(
            self.templates
                .entry(template.key().clone())
                .or_insert_with(|| Arc::new(template)),
        )
    }

    fn add_function(&mut self, function: &Arc<Function>) {
        self.functions
            .entry(function.iri().to_string())
            .or_insert_with(|| Arc::clone(function));
    }

    fn add_variable(&mut self, slot: usize) {
        self.variables.insert(slot);
    }

    fn collect_garbage(&mut self, live: &Liveness) -> usize {
        let before = self.templates.len() + self.functions.len() + self.variables.len();

        self.templates.retain(|_, t| {
            let keep = live.templates.contains(t.iri());
            if !keep {
                debug!("Dropping unused template {}", t.iri());
            }
            keep
        });

        let depended_on: BTreeSet<String> = self
            .functions
            .values()
            .flat_map(|f| f.dependencies().iter().cloned())
            .collect();
        self.functions.retain(|iri, _| {
            let keep = live.functions.contains(iri) || depended_on.contains(iri);
            if !keep {
                debug!("Dropping unused function {iri}");
            }
            keep
        });

        self.variables.retain(|slot| live.variables.contains(slot));

        before - (self.templates.len() + self.functions.len() + self.variables.len())
    }
}
