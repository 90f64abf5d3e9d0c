//! Function-call validation against signatures and the schema.
//!
//! A [`ValidationSession`] walks a whole call tree and collects every
//! violation before reporting, so one [`ErrorCode::MappingFunctionValidationFail`]
//! carries all problems of the call as its causes.

use std::cell::OnceCell;
use std::collections::BTreeSet;

use crate::error::{ErrorCode, Key, MapError};
use crate::function::{ArgSpec, Call, Value, ValueType};
use crate::graph::SchemaView;
use crate::model::ontology::{map, standard};
use crate::model::{Literal, Term};

/// The context a call is validated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextScope {
    pub id: String,
    pub source: Term,
    pub target: Term,
}

/// Validation state for one call or one context.
///
/// Property closures of the context classes are computed on first use and
/// reused for every call validated through the same session.
pub struct ValidationSession<'a> {
    schema: &'a dyn SchemaView,
    contexts: BTreeSet<String>,
    scope: Option<ContextScope>,
    source_properties: OnceCell<BTreeSet<Term>>,
    target_properties: OnceCell<BTreeSet<Term>>,
}

impl<'a> ValidationSession<'a> {
    pub fn new(schema: &'a dyn SchemaView) -> Self {
        Self {
            schema,
            contexts: BTreeSet::new(),
            scope: None,
            source_properties: OnceCell::new(),
            target_properties: OnceCell::new(),
        }
    }

    pub fn for_context(schema: &'a dyn SchemaView, scope: ContextScope) -> Self {
        Self {
            scope: Some(scope),
            ..Self::new(schema)
        }
    }

    /// Contexts that `Context`-typed arguments may reference.
    pub fn with_contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contexts = contexts.into_iter().map(Into::into).collect();
        self
    }

    pub fn scope(&self) -> Option<&ContextScope> {
        self.scope.as_ref()
    }

    pub fn source_properties(&self) -> Option<&BTreeSet<Term>> {
        let scope = self.scope.as_ref()?;
        Some(
            self.source_properties
                .get_or_init(|| self.schema.properties_of(&scope.source)),
        )
    }

    pub fn target_properties(&self) -> Option<&BTreeSet<Term>> {
        let scope = self.scope.as_ref()?;
        Some(
            self.target_properties
                .get_or_init(|| self.schema.properties_of(&scope.target)),
        )
    }

    pub fn validate(&self, call: &Call) -> Result<(), MapError> {
        let mut violations = Vec::new();
        self.check_call(call, &mut violations);
        if violations.is_empty() {
            return Ok(());
        }
        let mut err = ErrorCode::MappingFunctionValidationFail
            .error()
            .with(Key::Function, call.function().iri());
        if let Some(scope) = &self.scope {
            err = err
                .with(Key::Context, &scope.id)
                .with(Key::ContextSource, scope.source.value())
                .with(Key::ContextTarget, scope.target.value());
        }
        Err(err.with_causes(violations))
    }

    fn check_call(&self, call: &Call, out: &mut Vec<MapError>) {
        for (spec, value) in call.as_map() {
            let violation = |code: ErrorCode| {
                code.error()
                    .with(Key::Function, call.function().iri())
                    .with(Key::Arg, spec.name())
                    .with(Key::ArgType, spec.value_type())
                    .with(Key::Value, value)
            };
            match value {
                Value::Literal(lit) => {
                    if let Some(code) = self.check_literal(spec, lit) {
                        out.push(violation(code));
                    }
                }
                Value::Reference(iri) => {
                    if let Some(code) = self.check_reference(spec, iri) {
                        out.push(violation(code));
                    }
                }
                Value::Call(nested) => {
                    if !spec.value_type().accepts(nested.function().return_type()) {
                        out.push(violation(ErrorCode::FunctionCallIncompatibleReturnType));
                    }
                    self.check_call(nested, out);
                }
            }
        }
    }

    fn check_literal(&self, spec: &ArgSpec, lit: &Literal) -> Option<ErrorCode> {
        match spec.value_type() {
            ValueType::Undefined | ValueType::Literal => None,
            ValueType::Datatype(dt) if literal_fits(lit, dt) => None,
            ValueType::Datatype(_) => Some(ErrorCode::FunctionCallWrongLiteral),
            _ => Some(ErrorCode::FunctionCallReferenceExpected),
        }
    }

    fn check_reference(&self, spec: &ArgSpec, iri: &str) -> Option<ErrorCode> {
        if iri == map::SOURCE_VARIABLE {
            return None;
        }
        let term = Term::iri(iri);
        match spec.value_type() {
            ValueType::Undefined | ValueType::Resource | ValueType::Iri => None,
            ValueType::Class => {
                (!self.schema.is_class(&term)).then_some(ErrorCode::FunctionCallWrongResource)
            }
            ValueType::Context => {
                (!self.contexts.contains(iri)).then_some(ErrorCode::FunctionCallWrongResource)
            }
            ValueType::Property => {
                let (Some(source), Some(target)) =
                    (self.source_properties(), self.target_properties())
                else {
                    return None;
                };
                (!source.contains(&term) && !target.contains(&term))
                    .then_some(ErrorCode::FunctionCallNotContextProperty)
            }
            // a source property in a literal position is read for its value
            ValueType::Literal | ValueType::Datatype(_) => match self.source_properties() {
                Some(props) if !props.contains(&term) => {
                    Some(ErrorCode::FunctionCallLiteralExpected)
                }
                _ => None,
            },
        }
    }
}

/// Whether the lexical form of `lit` is valid for `datatype`.
fn literal_fits(lit: &Literal, datatype: &str) -> bool {
    let lex = lit.lexical().trim();
    match datatype {
        standard::XSD_STRING | standard::RDF_LANG_STRING => true,
        standard::XSD_BOOLEAN => matches!(lex, "true" | "false" | "1" | "0"),
        d if standard::is_integer(d) => lex.parse::<i64>().is_ok(),
        d if standard::is_numeric(d) => lex.parse::<f64>().is_ok(),
        d => lit.datatype() == d || lit.datatype() == standard::XSD_STRING,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_datatype_checks() {
        assert!(literal_fits(&Literal::string("12"), standard::XSD_INTEGER));
        assert!(!literal_fits(&Literal::string("1.5"), standard::XSD_INTEGER));
        assert!(literal_fits(&Literal::string("1.5"), standard::XSD_DECIMAL));
        assert!(!literal_fits(&Literal::string("yes"), standard::XSD_BOOLEAN));
        assert!(literal_fits(&Literal::integer(3), standard::XSD_STRING));
    }
}
