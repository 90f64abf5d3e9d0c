//! Coded mapping errors.
//!
//! Every failure the mapping API reports is a [`MapError`]: a stable
//! [`ErrorCode`], an ordered bag of `(Key, value)` details (a key may repeat,
//! e.g. one [`Key::Arg`] per missing argument) and nested causes.

use std::fmt;

use thiserror::Error;

pub type Result<T, E = MapError> = std::result::Result<T, E>;

/// Coarse grouping of error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Build,
    Context,
    Rule,
    Validation,
    Inference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Build
    FunctionNonexistentArgument,
    FunctionNoRequiredArg,
    FunctionSelfCall,
    FunctionNotFound,
    // Context
    ContextRequireTargetFunction,
    ContextNotBooleanFilterFunction,
    ContextNotFound,
    MappingAttachedContextAmbiguousClassLink,
    MappingAttachedContextTargetClassNotLinked,
    MappingContextCannotBeDeletedDueToDependencies,
    // Rule
    PropertyBridgeTargetFunction,
    PropertyBridgeNotBooleanFilterFunction,
    PropertyBridgeWrongTargetProperty,
    PropertyBridgeNotFound,
    // Validation
    MappingFunctionValidationFail,
    FunctionCallWrongLiteral,
    FunctionCallIncompatibleReturnType,
    FunctionCallNotContextProperty,
    FunctionCallWrongResource,
    FunctionCallReferenceExpected,
    FunctionCallLiteralExpected,
    // Inference
    InferenceNoRules,
    InferenceFail,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::FunctionNonexistentArgument => "FUNCTION_NONEXISTENT_ARGUMENT",
            ErrorCode::FunctionNoRequiredArg => "FUNCTION_NO_REQUIRED_ARG",
            ErrorCode::FunctionSelfCall => "FUNCTION_SELF_CALL",
            ErrorCode::FunctionNotFound => "FUNCTION_NOT_FOUND",
            ErrorCode::ContextRequireTargetFunction => "CONTEXT_REQUIRE_TARGET_FUNCTION",
            ErrorCode::ContextNotBooleanFilterFunction => "CONTEXT_NOT_BOOLEAN_FILTER_FUNCTION",
            ErrorCode::ContextNotFound => "CONTEXT_NOT_FOUND",
            ErrorCode::MappingAttachedContextAmbiguousClassLink => {
                "MAPPING_ATTACHED_CONTEXT_AMBIGUOUS_CLASS_LINK"
            }
            ErrorCode::MappingAttachedContextTargetClassNotLinked => {
                "MAPPING_ATTACHED_CONTEXT_TARGET_CLASS_NOT_LINKED"
            }
            ErrorCode::MappingContextCannotBeDeletedDueToDependencies => {
                "MAPPING_CONTEXT_CANNOT_BE_DELETED_DUE_TO_DEPENDENCIES"
            }
            ErrorCode::PropertyBridgeTargetFunction => "PROPERTY_BRIDGE_TARGET_FUNCTION",
            ErrorCode::PropertyBridgeNotBooleanFilterFunction => {
                "PROPERTY_BRIDGE_NOT_BOOLEAN_FILTER_FUNCTION"
            }
            ErrorCode::PropertyBridgeWrongTargetProperty => "PROPERTY_BRIDGE_WRONG_TARGET_PROPERTY",
            ErrorCode::PropertyBridgeNotFound => "PROPERTY_BRIDGE_NOT_FOUND",
            ErrorCode::MappingFunctionValidationFail => "MAPPING_FUNCTION_VALIDATION_FAIL",
            ErrorCode::FunctionCallWrongLiteral => "FUNCTION_CALL_WRONG_LITERAL",
            ErrorCode::FunctionCallIncompatibleReturnType => {
                "FUNCTION_CALL_INCOMPATIBLE_RETURN_TYPE"
            }
            ErrorCode::FunctionCallNotContextProperty => "FUNCTION_CALL_NOT_CONTEXT_PROPERTY",
            ErrorCode::FunctionCallWrongResource => "FUNCTION_CALL_WRONG_RESOURCE",
            ErrorCode::FunctionCallReferenceExpected => "FUNCTION_CALL_REFERENCE_EXPECTED",
            ErrorCode::FunctionCallLiteralExpected => "FUNCTION_CALL_LITERAL_EXPECTED",
            ErrorCode::InferenceNoRules => "INFERENCE_NO_RULES",
            ErrorCode::InferenceFail => "INFERENCE_FAIL",
        }
    }

    pub fn category(self) -> Category {
        use ErrorCode::*;
        match self {
            FunctionNonexistentArgument | FunctionNoRequiredArg | FunctionSelfCall
            | FunctionNotFound => Category::Build,
            ContextRequireTargetFunction
            | ContextNotBooleanFilterFunction
            | ContextNotFound
            | MappingAttachedContextAmbiguousClassLink
            | MappingAttachedContextTargetClassNotLinked
            | MappingContextCannotBeDeletedDueToDependencies => Category::Context,
            PropertyBridgeTargetFunction
            | PropertyBridgeNotBooleanFilterFunction
            | PropertyBridgeWrongTargetProperty
            | PropertyBridgeNotFound => Category::Rule,
            MappingFunctionValidationFail
            | FunctionCallWrongLiteral
            | FunctionCallIncompatibleReturnType
            | FunctionCallNotContextProperty
            | FunctionCallWrongResource
            | FunctionCallReferenceExpected
            | FunctionCallLiteralExpected => Category::Validation,
            InferenceNoRules | InferenceFail => Category::Inference,
        }
    }

    pub fn message(self) -> &'static str {
        use ErrorCode::*;
        match self {
            FunctionNonexistentArgument => "function has no such argument",
            FunctionNoRequiredArg => "required arguments are missing",
            FunctionSelfCall => "a call cannot take itself as an argument",
            FunctionNotFound => "function is not registered",
            ContextRequireTargetFunction => "class bridge requires a target function",
            ContextNotBooleanFilterFunction => "class bridge filter must return xsd:boolean",
            ContextNotFound => "no such context",
            MappingAttachedContextAmbiguousClassLink => {
                "more than one property links the target classes"
            }
            MappingAttachedContextTargetClassNotLinked => "no property links the target classes",
            MappingContextCannotBeDeletedDueToDependencies => {
                "context is referenced by other contexts"
            }
            PropertyBridgeTargetFunction => "property bridge cannot use a target function",
            PropertyBridgeNotBooleanFilterFunction => {
                "property bridge filter must return xsd:boolean"
            }
            PropertyBridgeWrongTargetProperty => "target property is not a property of the target class",
            PropertyBridgeNotFound => "no such property bridge",
            MappingFunctionValidationFail => "function call validation failed",
            FunctionCallWrongLiteral => "literal does not match the argument type",
            FunctionCallIncompatibleReturnType => "nested call returns an incompatible type",
            FunctionCallNotContextProperty => "property does not belong to the context classes",
            FunctionCallWrongResource => "resource is not of the expected kind",
            FunctionCallReferenceExpected => "argument expects a resource, got a literal",
            FunctionCallLiteralExpected => "argument expects a literal, got a resource",
            InferenceNoRules => "mapping contains no rules",
            InferenceFail => "rule evaluation failed",
        }
    }

    /// Start an error with this code.
    pub fn error(self) -> MapError {
        MapError::new(self)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detail keys attached to a [`MapError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Function,
    Arg,
    ArgType,
    Value,
    Context,
    ContextSource,
    ContextTarget,
    Dependent,
    Property,
    Mapping,
    Rule,
    Query,
    Instance,
    Class,
}

impl Key {
    pub fn as_str(self) -> &'static str {
        match self {
            Key::Function => "function",
            Key::Arg => "arg",
            Key::ArgType => "arg-type",
            Key::Value => "value",
            Key::Context => "context",
            Key::ContextSource => "context-source",
            Key::ContextTarget => "context-target",
            Key::Dependent => "dependent",
            Key::Property => "property",
            Key::Mapping => "mapping",
            Key::Rule => "rule",
            Key::Query => "query",
            Key::Instance => "instance",
            Key::Class => "class",
        }
    }
}

fn render_details(details: &[(Key, String)]) -> String {
    if details.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = details
        .iter()
        .map(|(k, v)| format!("{}={v}", k.as_str()))
        .collect();
    format!(" ({})", parts.join(", "))
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("[{code}] {}{}", .code.message(), render_details(.details))]
pub struct MapError {
    code: ErrorCode,
    details: Vec<(Key, String)>,
    causes: Vec<MapError>,
}

impl MapError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            details: Vec::new(),
            causes: Vec::new(),
        }
    }

    pub fn with(mut self, key: Key, value: impl fmt::Display) -> Self {
        self.details.push((key, value.to_string()));
        self
    }

    pub fn caused_by(mut self, cause: MapError) -> Self {
        self.causes.push(cause);
        self
    }

    pub fn with_causes(mut self, causes: impl IntoIterator<Item = MapError>) -> Self {
        self.causes.extend(causes);
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn category(&self) -> Category {
        self.code.category()
    }

    pub fn details(&self) -> &[(Key, String)] {
        &self.details
    }

    /// First value recorded for `key`.
    pub fn detail(&self, key: Key) -> Option<&str> {
        self.details
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value recorded for `key`, in insertion order.
    pub fn detail_all(&self, key: Key) -> Vec<&str> {
        self.details
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn causes(&self) -> &[MapError] {
        &self.causes
    }

    /// Multi-line rendering including the cause tree.
    pub fn report(&self) -> String {
        let mut out = String::new();
        self.write_report(&mut out, 0);
        out
    }

    fn write_report(&self, out: &mut String, depth: usize) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&self.to_string());
        out.push('\n');
        for cause in &self.causes {
            cause.write_report(out, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_details() {
        let err = ErrorCode::FunctionNoRequiredArg
            .error()
            .with(Key::Function, "fn:concat")
            .with(Key::Arg, "arg1")
            .with(Key::Arg, "arg2");
        assert_eq!(
            err.to_string(),
            "[FUNCTION_NO_REQUIRED_ARG] required arguments are missing (function=fn:concat, arg=arg1, arg=arg2)"
        );
        assert_eq!(err.detail_all(Key::Arg), vec!["arg1", "arg2"]);
        assert_eq!(err.category(), Category::Build);
    }

    #[test]
    fn report_indents_causes() {
        let err = ErrorCode::MappingFunctionValidationFail
            .error()
            .caused_by(ErrorCode::FunctionCallWrongLiteral.error().with(Key::Arg, "x"));
        let report = err.report();
        assert!(report.lines().nth(1).is_some_and(|l| l.starts_with("  [FUNCTION_CALL_WRONG_LITERAL]")));
    }
}
