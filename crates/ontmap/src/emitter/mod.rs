pub mod ntriples;
pub mod turtle;

use std::io;

use crate::graph::Graph;
use crate::model::ontology::{func, map, standard};
use crate::model::Triple;

/// Serializes triples in one RDF syntax.
pub trait TriplesEmitter {
    /// Emit one triple.
    fn emit(&mut self, triple: &Triple) -> io::Result<()>;
    /// Register a namespace prefix. Only Turtle uses them for compaction.
    fn add_prefix(&mut self, prefix: &str, iri: &str) -> io::Result<()>;
    /// Flush any buffered output.
    fn flush(&mut self) -> io::Result<()>;
    /// Number of triples emitted so far.
    fn triple_count(&self) -> u64;
}

/// Register the prefixes used by mapping output.
pub fn add_standard_prefixes(emitter: &mut dyn TriplesEmitter) -> io::Result<()> {
    emitter.add_prefix("rdf", standard::RDF)?;
    emitter.add_prefix("rdfs", standard::RDFS)?;
    emitter.add_prefix("owl", standard::OWL)?;
    emitter.add_prefix("xsd", standard::XSD)?;
    emitter.add_prefix(map::PREFIX, map::NS)?;
    emitter.add_prefix(func::PREFIX, func::NS)
}

/// Emit every triple of `graph` in graph order and return how many were written.
pub fn emit_graph(emitter: &mut dyn TriplesEmitter, graph: &dyn Graph) -> io::Result<u64> {
    let before = emitter.triple_count();
    for triple in graph.triples() {
        emitter.emit(&triple)?;
    }
    Ok(emitter.triple_count() - before)
}
