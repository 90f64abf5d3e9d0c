//! Typed function signatures and their evaluation hooks.
//!
//! A [`Function`] is an immutable, versioned signature. Calls to it are built
//! with [`CallBuilder`] (see [`call`]) and evaluated by the inference engine
//! through the function's `eval` hook against a [`FunctionScope`].

pub mod call;
pub mod library;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::error::{ErrorCode, Key, MapError};
use crate::model::ontology::{local_name, map, standard};
use crate::model::Term;

pub use call::{Call, CallBuilder, Value};
pub use library::FunctionRegistry;

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// Declared type of an argument or of a function result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueType {
    /// Accepts anything.
    Undefined,
    /// Any resource (`rdfs:Resource`).
    Resource,
    /// A property of the context classes (`rdf:Property`).
    Property,
    /// Any IRI, never checked against the context.
    Iri,
    Class,
    Context,
    /// Any literal (`rdfs:Literal`).
    Literal,
    Datatype(String),
}

impl ValueType {
    pub fn boolean() -> Self {
        ValueType::Datatype(standard::XSD_BOOLEAN.to_string())
    }

    pub fn string() -> Self {
        ValueType::Datatype(standard::XSD_STRING.to_string())
    }

    pub fn integer() -> Self {
        ValueType::Datatype(standard::XSD_INTEGER.to_string())
    }

    pub fn decimal() -> Self {
        ValueType::Datatype(standard::XSD_DECIMAL.to_string())
    }

    pub fn from_iri(iri: &str) -> Self {
        match iri {
            standard::RDFS_RESOURCE => ValueType::Resource,
            standard::RDF_PROPERTY => ValueType::Property,
            standard::RDFS_CLASS | standard::OWL_CLASS => ValueType::Class,
            standard::RDFS_LITERAL => ValueType::Literal,
            map::CONTEXT => ValueType::Context,
            standard::XSD_ANY_URI => ValueType::Iri,
            "" => ValueType::Undefined,
            other if other.starts_with(standard::XSD) || other == standard::RDF_LANG_STRING => {
                ValueType::Datatype(other.to_string())
            }
            _ => ValueType::Resource,
        }
    }

    pub fn iri(&self) -> &str {
        match self {
            ValueType::Undefined => "",
            ValueType::Resource => standard::RDFS_RESOURCE,
            ValueType::Property => standard::RDF_PROPERTY,
            ValueType::Iri => standard::XSD_ANY_URI,
            ValueType::Class => standard::RDFS_CLASS,
            ValueType::Context => map::CONTEXT,
            ValueType::Literal => standard::RDFS_LITERAL,
            ValueType::Datatype(dt) => dt,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Datatype(dt) if standard::is_numeric(dt))
    }

    /// Types whose values are resources rather than literals.
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            ValueType::Resource
                | ValueType::Property
                | ValueType::Iri
                | ValueType::Class
                | ValueType::Context
        )
    }

    /// Whether a nested call returning `returned` may feed an argument of this type.
    pub fn accepts(&self, returned: &ValueType) -> bool {
        self == returned
            || *self == ValueType::Undefined
            || *returned == ValueType::Undefined
            || *self == ValueType::Resource && returned.is_resource()
            || *self == ValueType::Literal && matches!(returned, ValueType::Datatype(_))
            || self.is_numeric() && returned.is_numeric()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Undefined => f.write_str("undefined"),
            other => f.write_str(local_name(other.iri())),
        }
    }
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

/// One declared argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgSpec {
    name: String,
    value_type: ValueType,
    optional: bool,
    default: Option<Value>,
    vararg: bool,
}

impl ArgSpec {
    pub fn required(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            optional: false,
            default: None,
            vararg: false,
        }
    }

    pub fn optional(name: &str, value_type: ValueType) -> Self {
        Self {
            optional: true,
            ..Self::required(name, value_type)
        }
    }

    /// Repeating argument accepted as `{prefix}1`, `{prefix}2`, ...
    pub fn vararg(prefix: &str, value_type: ValueType) -> Self {
        Self {
            vararg: true,
            ..Self::optional(prefix, value_type)
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_vararg(&self) -> bool {
        self.vararg
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Position of `name` within this vararg, if it is one of its instances.
    fn vararg_index(&self, name: &str) -> Option<usize> {
        if !self.vararg {
            return None;
        }
        name.strip_prefix(self.name.as_str())
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| *n > 0)
    }
}

/// Values handed to an evaluation hook, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalArgs {
    values: Vec<(String, Option<Term>)>,
}

impl EvalArgs {
    pub fn new(values: Vec<(String, Option<Term>)>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Term> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_ref())
    }

    /// Values of `{prefix}N` arguments ordered by `N`; unbound ones are `None`.
    pub fn varargs(&self, prefix: &str) -> Vec<Option<&Term>> {
        let mut indexed: Vec<(usize, Option<&Term>)> = self
            .values
            .iter()
            .filter_map(|(n, v)| {
                n.strip_prefix(prefix)
                    .and_then(|i| i.parse::<usize>().ok())
                    .map(|i| (i, v.as_ref()))
            })
            .collect();
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, v)| v).collect()
    }
}

/// Failures raised while evaluating a function or a rule body.
///
/// Ordinary "no value" outcomes are `Ok(None)`; these errors abort a run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("function {0} has no evaluation hook")]
    NotExecutable(String),
    #[error("function {function} is missing argument {arg}")]
    MissingArgument { function: String, arg: String },
    #[error("rule {rule} does not bind template argument {arg}")]
    UnboundTemplateArgument { rule: String, arg: String },
    #[error("malformed URI template {0:?}")]
    Template(String),
    #[error("unknown context {0}")]
    UnknownContext(String),
    #[error("target resolution nested deeper than {0} levels")]
    TooDeep(usize),
}

/// What an evaluation hook can see of the running inference.
pub trait FunctionScope {
    /// The individual the current rule fires for.
    fn this(&self) -> &Term;

    /// Values of `property` on `subject` in the query view, in term order.
    fn values(&self, subject: &Term, property: &Term) -> Vec<Term>;

    /// Target individual that `context` produces for `individual`.
    fn target_of(&mut self, context: &str, individual: &Term) -> Result<Option<Term>, EvalError>;
}

pub type EvalFn =
    Arc<dyn Fn(&mut dyn FunctionScope, &EvalArgs) -> Result<Option<Term>, EvalError> + Send + Sync>;

/// An immutable function signature plus its optional evaluation hook.
#[derive(Clone)]
pub struct Function {
    iri: String,
    version: u32,
    args: Vec<ArgSpec>,
    return_type: ValueType,
    target: bool,
    custom: bool,
    identity: Option<String>,
    dependencies: Vec<String>,
    comment: Option<String>,
    eval: Option<EvalFn>,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("iri", &self.iri)
            .field("version", &self.version)
            .field("args", &self.args)
            .field("return_type", &self.return_type)
            .field("target", &self.target)
            .field("custom", &self.custom)
            .finish_non_exhaustive()
    }
}

/// Two functions are the same when IRI and version agree.
impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.iri == other.iri && self.version == other.version
    }
}

impl Function {
    pub fn define(iri: &str) -> FunctionDef {
        FunctionDef {
            function: Function {
                iri: iri.to_string(),
                version: 1,
                args: Vec::new(),
                return_type: ValueType::Undefined,
                target: false,
                custom: false,
                identity: None,
                dependencies: Vec::new(),
                comment: None,
                eval: None,
            },
        }
    }

    pub fn iri(&self) -> &str {
        &self.iri
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.iri)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    pub fn return_type(&self) -> &ValueType {
        &self.return_type
    }

    /// Can produce the target individual of a class bridge.
    pub fn is_target(&self) -> bool {
        self.target
    }

    pub fn is_boolean(&self) -> bool {
        self.return_type == ValueType::boolean()
    }

    pub fn is_custom(&self) -> bool {
        self.custom
    }

    /// Argument this function merely passes through, if it is a wrapper.
    pub fn identity_arg(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Declared argument `name`, or the vararg spec `name` instantiates.
    pub fn arg(&self, name: &str) -> Option<&ArgSpec> {
        self.args
            .iter()
            .find(|a| a.name == name && !a.vararg)
            .or_else(|| self.args.iter().find(|a| a.vararg_index(name).is_some()))
    }

    pub fn require_arg(&self, name: &str) -> Result<&ArgSpec, MapError> {
        self.arg(name).ok_or_else(|| {
            ErrorCode::FunctionNonexistentArgument
                .error()
                .with(Key::Function, &self.iri)
                .with(Key::Arg, name)
        })
    }

    /// Sort key placing declared arguments first, in order, then vararg instances by index.
    pub(crate) fn arg_position(&self, name: &str) -> (usize, usize) {
        for (i, spec) in self.args.iter().enumerate() {
            if spec.vararg {
                if let Some(n) = spec.vararg_index(name) {
                    return (i, n);
                }
            } else if spec.name == name {
                return (i, 0);
            }
        }
        (usize::MAX, 0)
    }

    pub fn call(self: &Arc<Self>) -> CallBuilder {
        CallBuilder::new(Arc::clone(self))
    }

    pub fn is_executable(&self) -> bool {
        self.eval.is_some()
    }

    pub fn evaluate(
        &self,
        scope: &mut dyn FunctionScope,
        args: &EvalArgs,
    ) -> Result<Option<Term>, EvalError> {
        match &self.eval {
            Some(eval) => eval(scope, args),
            None => Err(EvalError::NotExecutable(self.iri.clone())),
        }
    }
}

/// Builder for function definitions.
pub struct FunctionDef {
    function: Function,
}

impl FunctionDef {
    pub fn version(mut self, version: u32) -> Self {
        self.function.version = version;
        self
    }

    pub fn arg(mut self, spec: ArgSpec) -> Self {
        self.function.args.push(spec);
        self
    }

    pub fn returns(mut self, value_type: ValueType) -> Self {
        self.function.return_type = value_type;
        self
    }

    pub fn target(mut self) -> Self {
        self.function.target = true;
        self
    }

    pub fn custom(mut self) -> Self {
        self.function.custom = true;
        self
    }

    pub fn identity(mut self, arg: &str) -> Self {
        self.function.identity = Some(arg.to_string());
        self
    }

    pub fn depends_on(mut self, function: &str) -> Self {
        self.function.dependencies.push(function.to_string());
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.function.comment = Some(comment.to_string());
        self
    }

    pub fn eval<F>(mut self, eval: F) -> Self
    where
        F: Fn(&mut dyn FunctionScope, &EvalArgs) -> Result<Option<Term>, EvalError>
            + Send
            + Sync
            + 'static,
    {
        self.function.eval = Some(Arc::new(eval));
        self
    }

    pub fn build(self) -> Function {
        self.function
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_type_compatibility() {
        assert!(ValueType::Resource.accepts(&ValueType::Property));
        assert!(ValueType::decimal().accepts(&ValueType::integer()));
        assert!(ValueType::Undefined.accepts(&ValueType::boolean()));
        assert!(ValueType::string().accepts(&ValueType::Undefined));
        assert!(!ValueType::string().accepts(&ValueType::boolean()));
        assert!(!ValueType::Property.accepts(&ValueType::Resource));
    }

    #[test]
    fn vararg_lookup() {
        let f = Function::define("urn:f")
            .arg(ArgSpec::required("sep", ValueType::string()))
            .arg(ArgSpec::vararg("arg", ValueType::Undefined))
            .build();
        assert_eq!(f.arg("arg7").map(|a| a.name()), Some("arg"));
        assert!(f.arg("arg0").is_none());
        assert!(f.arg("argx").is_none());
        assert_eq!(f.arg_position("arg2"), (1, 2));
        assert!(f.require_arg("other").is_err());
    }

    #[test]
    fn varargs_are_ordered_numerically() {
        let args = EvalArgs::new(vec![
            ("arg10".into(), Some(Term::string("j"))),
            ("arg2".into(), Some(Term::string("b"))),
            ("arg1".into(), None),
        ]);
        let values = args.varargs("arg");
        assert_eq!(values.len(), 3);
        assert!(values[0].is_none());
        assert_eq!(values[2], Some(&Term::string("j")));
    }
}
