//! Load graphs from N-Triples and mappings from JSON documents.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use oxttl::{NTriplesParser, TurtleParseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::MapConfig;
use crate::error::MapError;
use crate::function::{Call, FunctionRegistry, Value};
use crate::graph::{Graph, GraphMut, MemGraph};
use crate::mapping::MappingModel;
use crate::model::ontology::standard;
use crate::model::{Literal, Term, Triple};

/// Errors that can occur during loading.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("N-Triples syntax error: {0}")]
    Syntax(#[from] TurtleParseError),
    #[error("unsupported term: {0}")]
    UnsupportedTerm(String),
    #[error("mapping rejected: {0}")]
    Mapping(#[from] MapError),
    #[error("unknown context name: {0}")]
    UnknownContext(String),
}

// ---------------------------------------------------------------------------
// N-Triples
// ---------------------------------------------------------------------------

/// Load an N-Triples file from disk.
pub fn load_graph(path: &Path) -> Result<MemGraph, LoadError> {
    let file = File::open(path)?;
    let graph = read_ntriples(BufReader::new(file))?;
    debug!("Loaded {} triples from {}", graph.len(), path.display());
    Ok(graph)
}

/// Parse N-Triples text.
pub fn parse_ntriples(text: &str) -> Result<MemGraph, LoadError> {
    read_ntriples(text.as_bytes())
}

fn read_ntriples<R: Read>(reader: R) -> Result<MemGraph, LoadError> {
    let mut graph = MemGraph::new();
    for parsed in NTriplesParser::new().for_reader(reader) {
        let triple = parsed?;
        graph.insert(Triple::new(
            convert_term(oxrdf::Term::from(triple.subject))?,
            Term::iri(triple.predicate.as_str()),
            convert_term(triple.object)?,
        ));
    }
    Ok(graph)
}

fn convert_term(term: oxrdf::Term) -> Result<Term, LoadError> {
    match term {
        oxrdf::Term::NamedNode(node) => Ok(Term::iri(node.as_str())),
        oxrdf::Term::BlankNode(node) => Ok(Term::blank(node.as_str())),
        oxrdf::Term::Literal(literal) => {
            let converted = match literal.language() {
                Some(lang) => Literal::lang(literal.value(), lang),
                None => Literal::typed(literal.value(), literal.datatype().as_str()),
            };
            Ok(converted.into())
        }
        #[allow(unreachable_patterns)]
        other => Err(LoadError::UnsupportedTerm(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Mapping documents
// ---------------------------------------------------------------------------

/// JSON description of a mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingDocument {
    pub contexts: Vec<ContextSpec>,
    /// Pairs of context names to link with `bind_contexts`.
    #[serde(default)]
    pub bindings: Vec<BindingSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextSpec {
    /// Name other entries refer to the context by.
    #[serde(default)]
    pub name: Option<String>,
    pub source: String,
    pub target: String,
    pub class_bridge: CallSpec,
    #[serde(default)]
    pub class_filter: Option<CallSpec>,
    #[serde(default)]
    pub property_bridges: Vec<PropertyBridgeSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyBridgeSpec {
    pub mapping: CallSpec,
    #[serde(default)]
    pub filter: Option<CallSpec>,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingSpec {
    pub left: String,
    pub right: String,
}

/// A function call. `function` is an IRI or `fn:` shorthand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSpec {
    pub function: String,
    #[serde(default)]
    pub args: IndexMap<String, ArgSpecJson>,
}

/// One argument value.
///
/// Plain strings are read according to the argument's declared type; `"?this"`
/// stands for the individual being processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgSpecJson {
    Text(String),
    Iri {
        iri: String,
    },
    Context {
        context: String,
    },
    Literal {
        literal: String,
        #[serde(default)]
        datatype: Option<String>,
        #[serde(default)]
        lang: Option<String>,
    },
    Call(CallSpec),
}

/// Read a mapping document from disk.
pub fn load_mapping(path: &Path) -> Result<MappingDocument, LoadError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn expand_datatype(datatype: &str) -> String {
    match datatype.strip_prefix("xsd:") {
        Some(local) => format!("{}{local}", standard::XSD),
        None => datatype.to_string(),
    }
}

impl CallSpec {
    /// Build the call, resolving context names through `names`.
    pub fn to_call(
        &self,
        registry: &FunctionRegistry,
        names: &HashMap<String, String>,
    ) -> Result<Call, LoadError> {
        let function = registry.require(&self.function)?;
        let mut builder = function.call();
        for (arg, value) in &self.args {
            builder = match value {
                ArgSpecJson::Text(text) if text == "?this" => builder.add(arg, Value::source()),
                ArgSpecJson::Text(text) => builder.value(arg, text),
                ArgSpecJson::Iri { iri } => builder.reference(arg, iri),
                ArgSpecJson::Context { context } => {
                    let id = names
                        .get(context)
                        .ok_or_else(|| LoadError::UnknownContext(context.clone()))?;
                    builder.reference(arg, id)
                }
                ArgSpecJson::Literal {
                    literal,
                    datatype,
                    lang,
                } => {
                    let lit = match (datatype, lang) {
                        (_, Some(lang)) => Literal::lang(literal.as_str(), lang.as_str()),
                        (Some(dt), None) => Literal::typed(literal.as_str(), expand_datatype(dt)),
                        (None, None) => Literal::string(literal.as_str()),
                    };
                    builder.literal(arg, lit)
                }
                ArgSpecJson::Call(nested) => builder.call(arg, nested.to_call(registry, names)?),
            };
        }
        Ok(builder.build()?)
    }
}

impl MappingDocument {
    /// Build a mapping model over `schema`.
    ///
    /// Contexts are created first so that calls may refer to any of them by
    /// name; then class bridges, property bridges and bindings are added in
    /// document order.
    pub fn build(
        &self,
        functions: Arc<FunctionRegistry>,
        schema: MemGraph,
        config: MapConfig,
    ) -> Result<MappingModel, LoadError> {
        let mut model = MappingModel::with_config(schema, Arc::clone(&functions), config);
        let mut names = HashMap::new();
        let mut ids = Vec::with_capacity(self.contexts.len());
        for spec in &self.contexts {
            let id = model.create_context(&spec.source, &spec.target)?;
            if let Some(name) = &spec.name {
                names.insert(name.clone(), id.clone());
            }
            ids.push(id);
        }

        for (spec, id) in self.contexts.iter().zip(&ids) {
            let call = spec.class_bridge.to_call(&functions, &names)?;
            let mut context = model.context_mut(id)?;
            match &spec.class_filter {
                Some(filter) => {
                    let filter = filter.to_call(&functions, &names)?;
                    context.add_class_bridge_with_filter(filter, call)?;
                }
                None => context.add_class_bridge(call)?,
            }
        }

        for (spec, id) in self.contexts.iter().zip(&ids) {
            for bridge in &spec.property_bridges {
                let mapping = bridge.mapping.to_call(&functions, &names)?;
                let filter = bridge
                    .filter
                    .as_ref()
                    .map(|f| f.to_call(&functions, &names))
                    .transpose()?;
                model
                    .context_mut(id)?
                    .add_property_bridge(filter, mapping, &bridge.target)?;
            }
        }

        for binding in &self.bindings {
            let left = names
                .get(&binding.left)
                .ok_or_else(|| LoadError::UnknownContext(binding.left.clone()))?;
            let right = names
                .get(&binding.right)
                .ok_or_else(|| LoadError::UnknownContext(binding.right.clone()))?;
            model.bind_contexts(left, right)?;
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_escapes_and_tags() {
        let graph = parse_ntriples(
            "<http://ex.org/a> <http://ex.org/p> \"a\\\"b\\u00e9\"@en .\n\
             # comment\n\
             _:b1 <http://ex.org/p> \"7\"^^<http://www.w3.org/2001/XMLSchema#integer> .\n",
        )
        .unwrap();
        let triples: Vec<Triple> = graph.iter().collect();
        assert_eq!(triples.len(), 2);
        assert!(triples
            .iter()
            .any(|t| t.object == Term::Literal(Literal::lang("a\"bé", "en"))));
        assert!(triples
            .iter()
            .any(|t| t.object == Term::Literal(Literal::integer(7))));
    }

    #[test]
    fn rejects_unterminated_statements() {
        let err = parse_ntriples("\n<http://ex.org/a> <http://ex.org/p> <http://ex.org/b>\n").unwrap_err();
        assert!(matches!(err, LoadError::Syntax(_)), "{err}");
    }

    #[test]
    fn accepts_trailing_comments_and_long_escapes() {
        let graph = parse_ntriples(
            "<urn:a> <urn:p> <urn:b> . # note\n\
             <urn:a> <urn:p> \"\\U0001F600\" .\n\
             _:b1 <urn:p> _:b2.\n",
        )
        .unwrap();
        assert_eq!(graph.len(), 3);
        assert!(graph.contains(&Triple::new(Term::iri("urn:a"), Term::iri("urn:p"), Term::string("\u{1F600}"))));
        assert!(graph.contains(&Triple::new(Term::blank("b1"), Term::iri("urn:p"), Term::blank("b2"))));
    }

    #[test]
    fn untagged_arguments() {
        let spec: CallSpec = serde_json::from_str(
            r#"{"function": "fn:concat", "args": {
                "arg1": "plain",
                "arg2": {"iri": "http://ex.org/p"},
                "arg3": {"literal": "1", "datatype": "xsd:integer"},
                "arg4": {"function": "fn:upperCase", "args": {"arg1": "x"}}
            }}"#,
        )
        .unwrap();
        assert!(matches!(spec.args["arg2"], ArgSpecJson::Iri { .. }));
        assert!(matches!(spec.args["arg3"], ArgSpecJson::Literal { .. }));
        assert!(matches!(spec.args["arg4"], ArgSpecJson::Call(_)));
    }
}
