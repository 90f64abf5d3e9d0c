//! Class-scoped RDF mapping.
//!
//! A [`MappingModel`] holds contexts (one per source/target class pair) whose
//! bridges are typed function calls. Bridges compile into rules over shared
//! templates, and [`InferenceEngine`] runs those rules forward over a source
//! graph to populate a target graph.

pub mod compiler;
pub mod config;
pub mod emitter;
pub mod error;
pub mod function;
pub mod graph;
pub mod infer;
pub mod loader;
pub mod mapping;
pub mod model;
pub mod store;
pub mod validate;

pub use compiler::compile;
pub use config::MapConfig;
pub use error::{ErrorCode, Key, MapError};
pub use function::{Call, CallBuilder, Function, FunctionRegistry, Value, ValueType};
pub use graph::{Graph, GraphMut, MemGraph};
pub use infer::{InferenceEngine, RunStats};
pub use mapping::{ContextMut, MappingModel};
pub use model::{Literal, Term, Triple};
