//! Mapping and inference configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::loader::LoadError;

/// Default number of pending individuals that triggers a synchronous drain.
pub const DEFAULT_MEMORY_THRESHOLD: usize = 50_000;

/// Configuration shared by a mapping model and the inference runs over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapConfig {
    /// Working-set size above which the first pass drains before continuing.
    pub memory_threshold: usize,
    /// Also type every target individual as `owl:NamedIndividual`.
    pub generate_named_individuals: bool,
    /// IRI of the mapping; context and rule IRIs are minted under it.
    pub base_iri: String,
    /// Maximum nesting of target resolution across contexts.
    pub max_target_depth: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            memory_threshold: DEFAULT_MEMORY_THRESHOLD,
            generate_named_individuals: false,
            base_iri: "urn:ontmap:mapping".to_string(),
            max_target_depth: 16,
        }
    }
}

impl MapConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_threshold(mut self, threshold: usize) -> Self {
        self.memory_threshold = threshold;
        self
    }

    pub fn with_named_individuals(mut self, enabled: bool) -> Self {
        self.generate_named_individuals = enabled;
        self
    }

    pub fn with_base_iri(mut self, iri: impl Into<String>) -> Self {
        self.base_iri = iri.into();
        self
    }

    pub fn with_max_target_depth(mut self, depth: usize) -> Self {
        self.max_target_depth = depth;
        self
    }

    /// Read a JSON configuration file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, LoadError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}
