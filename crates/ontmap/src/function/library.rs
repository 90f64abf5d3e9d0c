//! Function registry and the builtin `fn:` library.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{ErrorCode, Key, MapError};
use crate::model::iri::IriMinter;
use crate::model::ontology::{func, standard};
use crate::model::{Literal, Term};

use super::{ArgSpec, EvalArgs, EvalError, Function, FunctionScope, Value, ValueType};

/// Registered functions keyed by IRI.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: IndexMap<String, Arc<Function>>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the `fn:` library.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for function in builtins() {
            registry.register(function);
        }
        registry
    }

    /// Register (or replace) a function and return the shared handle.
    pub fn register(&mut self, function: Function) -> Arc<Function> {
        let function = Arc::new(function);
        self.functions
            .insert(function.iri().to_string(), Arc::clone(&function));
        function
    }

    /// Look up by full IRI or by `fn:local` shorthand.
    pub fn get(&self, name: &str) -> Option<Arc<Function>> {
        let iri = match name.strip_prefix("fn:") {
            Some(local) => format!("{}{local}", func::NS),
            None => name.to_string(),
        };
        self.functions.get(&iri).cloned()
    }

    pub fn require(&self, name: &str) -> Result<Arc<Function>, MapError> {
        self.get(name)
            .ok_or_else(|| ErrorCode::FunctionNotFound.error().with(Key::Function, name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Function>> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Evaluation helpers
// ---------------------------------------------------------------------------

type EvalResult = Result<Option<Term>, EvalError>;

fn bool_term(value: bool) -> Term {
    Term::Literal(Literal::boolean(value))
}

fn source<'a>(function: &str, args: &'a EvalArgs) -> Result<&'a Term, EvalError> {
    args.get("source").ok_or_else(|| EvalError::MissingArgument {
        function: function.to_string(),
        arg: "source".to_string(),
    })
}

fn numeric(term: &Term) -> Option<f64> {
    term.as_literal().and_then(Literal::as_f64)
}

fn integral(term: &Term) -> Option<i64> {
    term.as_literal().and_then(Literal::as_i64)
}

fn truth(term: &Term) -> Option<bool> {
    term.as_literal().and_then(Literal::as_bool)
}

fn terms_equal(a: &Term, b: &Term) -> bool {
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn arithmetic(args: &EvalArgs, int_op: fn(i64, i64) -> Option<i64>, float_op: fn(f64, f64) -> f64) -> EvalResult {
    let (Some(a), Some(b)) = (args.get("arg1"), args.get("arg2")) else {
        return Ok(None);
    };
    if let (Some(x), Some(y)) = (integral(a), integral(b)) {
        if let Some(result) = int_op(x, y) {
            return Ok(Some(Term::Literal(Literal::integer(result))));
        }
    }
    Ok(numeric(a)
        .zip(numeric(b))
        .map(|(x, y)| Term::Literal(Literal::double(float_op(x, y)))))
}

fn compare(args: &EvalArgs, ord: std::cmp::Ordering) -> EvalResult {
    let (Some(a), Some(b)) = (args.get("arg1"), args.get("arg2")) else {
        return Ok(None);
    };
    let result = match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => Some(a.value().cmp(b.value())),
    };
    Ok(result.map(|r| bool_term(r == ord)))
}

fn map_string(args: &EvalArgs, f: fn(&str) -> String) -> EvalResult {
    Ok(args
        .get("arg1")
        .map(|t| Term::Literal(Literal::string(f(t.value())))))
}

// ---------------------------------------------------------------------------
// Builtins
// ---------------------------------------------------------------------------

fn builtins() -> Vec<Function> {
    vec![
        // target functions
        Function::define(func::SELF)
            .comment("The source individual itself")
            .arg(ArgSpec::required("source", ValueType::Resource))
            .returns(ValueType::Resource)
            .target()
            .eval(|_, args| Ok(Some(source(func::SELF, args)?.clone())))
            .build(),
        Function::define(func::IRI)
            .comment("IRI built from a string")
            .arg(ArgSpec::required("arg1", ValueType::Undefined))
            .returns(ValueType::Resource)
            .target()
            .eval(|_, args| Ok(args.get("arg1").map(|t| Term::iri(t.value()))))
            .build(),
        Function::define(func::BUILD_URI)
            .comment("IRI from a template with {?N} placeholders filled from property values")
            .arg(ArgSpec::required("source", ValueType::Resource))
            .arg(ArgSpec::required("template", ValueType::string()))
            .arg(ArgSpec::vararg("arg", ValueType::Property))
            .returns(ValueType::Resource)
            .target()
            .eval(build_uri)
            .build(),
        Function::define(func::UUID)
            .comment("Name-based urn:uuid derived from the source individual")
            .arg(ArgSpec::required("source", ValueType::Resource))
            .returns(ValueType::Resource)
            .target()
            .eval(|_, args| {
                let source = source(func::UUID, args)?;
                Ok(Some(Term::iri(IriMinter::uuid_iri(source.value()))))
            })
            .build(),
        // resources
        Function::define(func::CURRENT_INDIVIDUAL)
            .returns(ValueType::Resource)
            .eval(|scope, _| Ok(Some(scope.this().clone())))
            .build(),
        Function::define(func::TARGET_RESOURCE)
            .comment("Target individual another context produces for a source individual")
            .arg(ArgSpec::optional("source", ValueType::Resource).with_default(Value::source()))
            .arg(ArgSpec::required("context", ValueType::Context))
            .returns(ValueType::Resource)
            .eval(|scope, args| {
                let (Some(source), Some(context)) = (args.get("source"), args.get("context")) else {
                    return Ok(None);
                };
                let context = context.value().to_string();
                let source = source.clone();
                scope.target_of(&context, &source)
            })
            .build(),
        // identity wrappers
        Function::define(func::EQUALS)
            .arg(ArgSpec::required("arg1", ValueType::Undefined))
            .returns(ValueType::Undefined)
            .identity("arg1")
            .eval(|_, args| Ok(args.get("arg1").cloned()))
            .build(),
        Function::define(func::WITH_DEFAULT)
            .comment("arg1, or arg2 when the source has no value")
            .arg(ArgSpec::required("arg1", ValueType::Undefined))
            .arg(ArgSpec::required("arg2", ValueType::Literal))
            .returns(ValueType::Undefined)
            .identity("arg1")
            .eval(|_, args| Ok(args.get("arg1").or(args.get("arg2")).cloned()))
            .build(),
        Function::define(func::AS_IRI)
            .comment("Use a property IRI as a value instead of reading it")
            .arg(ArgSpec::required("arg1", ValueType::Iri))
            .returns(ValueType::Iri)
            .identity("arg1")
            .eval(|_, args| Ok(args.get("arg1").cloned()))
            .build(),
        // strings
        Function::define(func::CONCAT)
            .arg(ArgSpec::vararg("arg", ValueType::Undefined))
            .returns(ValueType::string())
            .eval(|_, args| {
                let parts: Option<Vec<&str>> =
                    args.varargs("arg").into_iter().map(|v| v.map(Term::value)).collect();
                Ok(parts.map(|p| Term::string(p.concat())))
            })
            .build(),
        Function::define(func::CONCAT_WITH_SEPARATOR)
            .arg(ArgSpec::required("arg1", ValueType::Undefined))
            .arg(ArgSpec::required("arg2", ValueType::Undefined))
            .arg(ArgSpec::optional("separator", ValueType::string()).with_default(Value::string(" ")))
            .returns(ValueType::string())
            .eval(|_, args| {
                let sep = args.get("separator").map_or(" ", Term::value);
                Ok(args
                    .get("arg1")
                    .zip(args.get("arg2"))
                    .map(|(a, b)| Term::string(format!("{}{sep}{}", a.value(), b.value()))))
            })
            .build(),
        Function::define(func::UPPER_CASE)
            .arg(ArgSpec::required("arg1", ValueType::string()))
            .returns(ValueType::string())
            .eval(|_, args| map_string(args, str::to_uppercase))
            .build(),
        Function::define(func::LOWER_CASE)
            .arg(ArgSpec::required("arg1", ValueType::string()))
            .returns(ValueType::string())
            .eval(|_, args| map_string(args, str::to_lowercase))
            .build(),
        Function::define(func::STRLEN)
            .arg(ArgSpec::required("arg1", ValueType::string()))
            .returns(ValueType::integer())
            .eval(|_, args| {
                Ok(args
                    .get("arg1")
                    .map(|t| Term::Literal(Literal::integer(t.value().chars().count() as i64))))
            })
            .build(),
        Function::define(func::CAST)
            .arg(ArgSpec::required("arg1", ValueType::Undefined))
            .arg(ArgSpec::required("datatype", ValueType::Iri))
            .returns(ValueType::Literal)
            .eval(|_, args| {
                let (Some(value), Some(dt)) = (args.get("arg1"), args.get("datatype")) else {
                    return Ok(None);
                };
                let lit = Literal::typed(value.value().trim(), dt.value());
                let valid = match dt.value() {
                    standard::XSD_BOOLEAN => Literal::typed(lit.lexical(), standard::XSD_BOOLEAN)
                        .as_bool()
                        .is_some(),
                    d if standard::is_numeric(d) => lit.as_f64().is_some(),
                    _ => true,
                };
                Ok(valid.then_some(Term::Literal(lit)))
            })
            .build(),
        Function::define(func::DATATYPE)
            .arg(ArgSpec::required("arg1", ValueType::Undefined))
            .returns(ValueType::Resource)
            .eval(|_, args| {
                Ok(args
                    .get("arg1")
                    .and_then(Term::as_literal)
                    .map(|lit| Term::iri(lit.datatype())))
            })
            .build(),
        // logic
        Function::define(func::EQ)
            .arg(ArgSpec::required("arg1", ValueType::Undefined))
            .arg(ArgSpec::required("arg2", ValueType::Undefined))
            .returns(ValueType::boolean())
            .eval(|_, args| {
                Ok(args
                    .get("arg1")
                    .zip(args.get("arg2"))
                    .map(|(a, b)| bool_term(terms_equal(a, b))))
            })
            .build(),
        Function::define(func::GT)
            .arg(ArgSpec::required("arg1", ValueType::Undefined))
            .arg(ArgSpec::required("arg2", ValueType::Undefined))
            .returns(ValueType::boolean())
            .eval(|_, args| compare(args, std::cmp::Ordering::Greater))
            .build(),
        Function::define(func::LT)
            .arg(ArgSpec::required("arg1", ValueType::Undefined))
            .arg(ArgSpec::required("arg2", ValueType::Undefined))
            .returns(ValueType::boolean())
            .eval(|_, args| compare(args, std::cmp::Ordering::Less))
            .build(),
        Function::define(func::NOT)
            .arg(ArgSpec::required("arg1", ValueType::boolean()))
            .returns(ValueType::boolean())
            .eval(|_, args| Ok(args.get("arg1").and_then(truth).map(|b| bool_term(!b))))
            .build(),
        Function::define(func::AND)
            .arg(ArgSpec::required("arg1", ValueType::boolean()))
            .arg(ArgSpec::required("arg2", ValueType::boolean()))
            .returns(ValueType::boolean())
            .eval(|_, args| {
                let a = args.get("arg1").and_then(truth);
                let b = args.get("arg2").and_then(truth);
                Ok(a.zip(b).map(|(a, b)| bool_term(a && b)))
            })
            .build(),
        Function::define(func::OR)
            .arg(ArgSpec::required("arg1", ValueType::boolean()))
            .arg(ArgSpec::required("arg2", ValueType::boolean()))
            .returns(ValueType::boolean())
            .eval(|_, args| {
                let a = args.get("arg1").and_then(truth);
                let b = args.get("arg2").and_then(truth);
                Ok(a.zip(b).map(|(a, b)| bool_term(a || b)))
            })
            .build(),
        // arithmetic
        Function::define(func::ADD)
            .arg(ArgSpec::required("arg1", ValueType::decimal()))
            .arg(ArgSpec::required("arg2", ValueType::decimal()))
            .returns(ValueType::decimal())
            .eval(|_, args| arithmetic(args, i64::checked_add, |x, y| x + y))
            .build(),
        Function::define(func::SUBTRACT)
            .arg(ArgSpec::required("arg1", ValueType::decimal()))
            .arg(ArgSpec::required("arg2", ValueType::decimal()))
            .returns(ValueType::decimal())
            .eval(|_, args| arithmetic(args, i64::checked_sub, |x, y| x - y))
            .build(),
        Function::define(func::MULTIPLY)
            .arg(ArgSpec::required("arg1", ValueType::decimal()))
            .arg(ArgSpec::required("arg2", ValueType::decimal()))
            .returns(ValueType::decimal())
            .eval(|_, args| arithmetic(args, i64::checked_mul, |x, y| x * y))
            .build(),
    ]
}

fn build_uri(scope: &mut dyn FunctionScope, args: &EvalArgs) -> EvalResult {
    let source = source(func::BUILD_URI, args)?.clone();
    let Some(template) = args.get("template") else {
        return Ok(None);
    };
    let mut values = Vec::new();
    for arg in args.varargs("arg") {
        let value = match arg {
            Some(Term::Iri(property)) => scope
                .values(&source, &Term::iri(property))
                .into_iter()
                .next()
                .map(|t| t.value().to_string()),
            Some(other) => Some(other.value().to_string()),
            None => None,
        };
        match value {
            Some(v) => values.push(v),
            None => return Ok(None),
        }
    }
    let template = template.value();
    if template.matches("{?").count() != template.matches('}').count() {
        return Err(EvalError::Template(template.to_string()));
    }
    Ok(IriMinter::fill_template(template, &values).map(Term::iri))
}
