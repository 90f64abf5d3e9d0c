pub mod iri;
pub mod ontology;
pub mod term;

pub use term::{Literal, Term, Triple};
