//! Immutable function calls and their builder.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{ErrorCode, Key, MapError};
use crate::model::ontology::{local_name, map};
use crate::model::Literal;

use super::{ArgSpec, Function, ValueType};

/// An argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Literal(Literal),
    /// IRI of a resource: a property, class, context or individual.
    Reference(String),
    Call(Box<Call>),
}

impl Value {
    pub fn reference(iri: &str) -> Self {
        Value::Reference(iri.to_string())
    }

    pub fn string(lexical: &str) -> Self {
        Value::Literal(Literal::string(lexical))
    }

    /// The placeholder standing for the individual being processed.
    pub fn source() -> Self {
        Value::reference(map::SOURCE_VARIABLE)
    }

    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Value::Reference(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&Call> {
        match self {
            Value::Call(call) => Some(call),
            _ => None,
        }
    }
}

impl From<Literal> for Value {
    fn from(lit: Literal) -> Self {
        Value::Literal(lit)
    }
}

impl From<Call> for Value {
    fn from(call: Call) -> Self {
        Value::Call(Box::new(call))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Literal(lit) => lit.fmt(f),
            Value::Reference(iri) => write!(f, "<{iri}>"),
            Value::Call(call) => call.fmt(f),
        }
    }
}

/// A function applied to named arguments. Built only through [`CallBuilder`].
///
/// Equality compares function and arguments only, not the builder a call
/// came from.
#[derive(Debug, Clone)]
pub struct Call {
    function: Arc<Function>,
    args: IndexMap<String, Value>,
    origin: u64,
}

impl PartialEq for Call {
    fn eq(&self, other: &Self) -> bool {
        self.function == other.function && self.args == other.args
    }
}

impl Call {
    pub fn function(&self) -> &Arc<Function> {
        &self.function
    }

    pub fn args(&self) -> &IndexMap<String, Value> {
        &self.args
    }

    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Arguments paired with the spec that declares them, in declaration order.
    pub fn as_map(&self) -> Vec<(&ArgSpec, &Value)> {
        self.args
            .iter()
            .filter_map(|(name, value)| self.function.arg(name).map(|spec| (spec, value)))
            .collect()
    }

    /// Visit this call and every nested call, parents first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Call)) {
        visit(self);
        for value in self.args.values() {
            if let Value::Call(nested) = value {
                nested.walk(visit);
            }
        }
    }

    /// Every resource referenced anywhere in the call tree.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(&mut |call| {
            out.extend(call.args.values().filter_map(Value::as_reference));
        });
        out
    }

    /// IRIs of every function used in the call tree.
    pub fn functions(&self) -> Vec<&Arc<Function>> {
        let mut out = Vec::new();
        self.walk(&mut |call| out.push(&call.function));
        out
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.function.local_name())?;
        for (i, (name, value)) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match value {
                Value::Reference(iri) => write!(f, "{name}={}", local_name(iri))?,
                other => write!(f, "{name}={other}")?,
            }
        }
        f.write_str(")")
    }
}

static NEXT_BUILDER: AtomicU64 = AtomicU64::new(1);

/// Accumulates arguments for a [`Call`]; problems are reported by [`CallBuilder::build`].
///
/// Clones share the identity of the builder they were cloned from, so a
/// call built from a clone cannot be nested back into the original.
#[derive(Debug, Clone)]
pub struct CallBuilder {
    function: Arc<Function>,
    args: IndexMap<String, Value>,
    errors: Vec<MapError>,
    id: u64,
}

impl CallBuilder {
    pub fn new(function: Arc<Function>) -> Self {
        Self {
            function,
            args: IndexMap::new(),
            errors: Vec::new(),
            id: NEXT_BUILDER.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn function(&self) -> &Arc<Function> {
        &self.function
    }

    pub fn add(mut self, arg: &str, value: impl Into<Value>) -> Self {
        match self.function.require_arg(arg) {
            Ok(_) => {
                self.args.insert(arg.to_string(), value.into());
            }
            Err(err) => self.errors.push(err),
        }
        self
    }

    pub fn literal(self, arg: &str, literal: Literal) -> Self {
        self.add(arg, literal)
    }

    pub fn string(self, arg: &str, lexical: &str) -> Self {
        self.add(arg, Value::string(lexical))
    }

    pub fn reference(self, arg: &str, iri: &str) -> Self {
        self.add(arg, Value::reference(iri))
    }

    pub fn call(mut self, arg: &str, call: Call) -> Self {
        if call.origin == self.id {
            self.errors.push(self.self_call_error(arg));
            return self;
        }
        self.add(arg, call)
    }

    /// Build `nested` and pass the result as `arg`.
    pub fn nested(mut self, arg: &str, nested: CallBuilder) -> Self {
        if nested.id == self.id {
            self.errors.push(self.self_call_error(arg));
            return self;
        }
        match nested.build() {
            Ok(call) => self.add(arg, call),
            Err(err) => {
                self.errors.push(err);
                self
            }
        }
    }

    /// Append a value at the next free position of the function's vararg.
    pub fn vararg(self, value: impl Into<Value>) -> Self {
        let Some(spec) = self.function.args().iter().find(|a| a.is_vararg()) else {
            let err = ErrorCode::FunctionNonexistentArgument
                .error()
                .with(Key::Function, self.function.iri())
                .with(Key::Arg, "vararg");
            let mut this = self;
            this.errors.push(err);
            return this;
        };
        let prefix = spec.name().to_string();
        let next = (1..)
            .map(|n| map::positional(&prefix, n))
            .find(|name| !self.args.contains_key(name))
            .unwrap_or_else(|| map::positional(&prefix, 1));
        self.add(&next, value)
    }

    /// Interpret `text` according to the declared type of `arg`.
    ///
    /// Resource-typed arguments take the text as an IRI, datatype arguments as a
    /// lexical form of that datatype. Undefined arguments sniff: absolute IRIs
    /// become references, everything else goes through
    /// [`Literal::parse_shorthand`].
    pub fn value(self, arg: &str, text: &str) -> Self {
        let value = match self.function.arg(arg).map(|a| a.value_type().clone()) {
            Some(ty) if ty.is_resource() => Value::reference(text),
            Some(ValueType::Datatype(dt)) if !text.contains("^^") => {
                Value::Literal(Literal::typed(text, dt))
            }
            Some(ValueType::Undefined) if looks_like_iri(text) => Value::reference(text),
            _ => Value::Literal(Literal::parse_shorthand(text)),
        };
        self.add(arg, value)
    }

    fn self_call_error(&self, arg: &str) -> MapError {
        ErrorCode::FunctionSelfCall
            .error()
            .with(Key::Function, self.function.iri())
            .with(Key::Arg, arg)
    }

    pub fn build(self) -> Result<Call, MapError> {
        let CallBuilder {
            function,
            mut args,
            errors,
            id,
        } = self;
        if let Some(err) = errors.into_iter().next() {
            return Err(err);
        }

        if function.is_target()
            && function.arg("source").is_some()
            && !args.contains_key("source")
        {
            args.insert("source".to_string(), Value::source());
        }

        let mut missing = Vec::new();
        for spec in function.args().iter().filter(|a| !a.is_vararg()) {
            if args.contains_key(spec.name()) {
                continue;
            }
            match spec.default() {
                Some(default) => {
                    args.insert(spec.name().to_string(), default.clone());
                }
                None if !spec.is_optional() => missing.push(spec.name().to_string()),
                None => {}
            }
        }
        if !missing.is_empty() {
            let err = missing.iter().fold(
                ErrorCode::FunctionNoRequiredArg
                    .error()
                    .with(Key::Function, function.iri()),
                |err, arg| err.with(Key::Arg, arg),
            );
            return Err(err);
        }

        args.sort_by(|a, _, b, _| function.arg_position(a).cmp(&function.arg_position(b)));
        Ok(Call {
            function,
            args,
            origin: id,
        })
    }
}

/// Absolute IRIs: a scheme followed by `:` and no whitespace.
pub(crate) fn looks_like_iri(text: &str) -> bool {
    let Some((scheme, rest)) = text.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && !rest.is_empty()
        && !text.chars().any(char::is_whitespace)
        && (rest.starts_with("//") || scheme == "urn")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iri_sniffing() {
        assert!(looks_like_iri("http://ex.org/a"));
        assert!(looks_like_iri("urn:uuid:1234"));
        assert!(!looks_like_iri("12:30"));
        assert!(!looks_like_iri("hello world"));
        assert!(!looks_like_iri("mailto me"));
    }
}
