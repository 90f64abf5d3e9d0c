//! RDF vocabulary constants.
//!
//! - `standard` -- RDF, RDFS, OWL and XSD terms the mapping engine understands
//! - `map:` prefix (http://ontmap.example/mapping#) -- contexts, rules, templates
//! - `fn:` prefix (http://ontmap.example/fn#) -- the builtin function library

/// Standard RDF/RDFS/OWL/XSD namespace URIs
pub mod standard {
    pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
    pub const OWL: &str = "http://www.w3.org/2002/07/owl#";
    pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const RDF_PROPERTY: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#Property";
    pub const RDF_FIRST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#first";
    pub const RDF_REST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#rest";
    pub const RDF_NIL: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#nil";
    pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

    pub const RDFS_CLASS: &str = "http://www.w3.org/2000/01/rdf-schema#Class";
    pub const RDFS_RESOURCE: &str = "http://www.w3.org/2000/01/rdf-schema#Resource";
    pub const RDFS_LITERAL: &str = "http://www.w3.org/2000/01/rdf-schema#Literal";
    pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
    pub const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";
    pub const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
    pub const RDFS_DOMAIN: &str = "http://www.w3.org/2000/01/rdf-schema#domain";
    pub const RDFS_RANGE: &str = "http://www.w3.org/2000/01/rdf-schema#range";

    pub const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
    pub const OWL_THING: &str = "http://www.w3.org/2002/07/owl#Thing";
    pub const OWL_NAMED_INDIVIDUAL: &str = "http://www.w3.org/2002/07/owl#NamedIndividual";
    pub const OWL_OBJECT_PROPERTY: &str = "http://www.w3.org/2002/07/owl#ObjectProperty";
    pub const OWL_DATATYPE_PROPERTY: &str = "http://www.w3.org/2002/07/owl#DatatypeProperty";
    pub const OWL_RESTRICTION: &str = "http://www.w3.org/2002/07/owl#Restriction";
    pub const OWL_ON_PROPERTY: &str = "http://www.w3.org/2002/07/owl#onProperty";
    pub const OWL_SOME_VALUES_FROM: &str = "http://www.w3.org/2002/07/owl#someValuesFrom";
    pub const OWL_ALL_VALUES_FROM: &str = "http://www.w3.org/2002/07/owl#allValuesFrom";
    pub const OWL_ON_CLASS: &str = "http://www.w3.org/2002/07/owl#onClass";
    pub const OWL_UNION_OF: &str = "http://www.w3.org/2002/07/owl#unionOf";
    pub const OWL_INTERSECTION_OF: &str = "http://www.w3.org/2002/07/owl#intersectionOf";
    pub const OWL_EQUIVALENT_CLASS: &str = "http://www.w3.org/2002/07/owl#equivalentClass";

    pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
    pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const XSD_INT: &str = "http://www.w3.org/2001/XMLSchema#int";
    pub const XSD_LONG: &str = "http://www.w3.org/2001/XMLSchema#long";
    pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
    pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
    pub const XSD_FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";
    pub const XSD_ANY_URI: &str = "http://www.w3.org/2001/XMLSchema#anyURI";

    const INTEGER_LOCALS: &[&str] = &[
        "integer",
        "int",
        "long",
        "short",
        "byte",
        "nonNegativeInteger",
        "positiveInteger",
        "nonPositiveInteger",
        "negativeInteger",
        "unsignedLong",
        "unsignedInt",
        "unsignedShort",
        "unsignedByte",
    ];

    /// True for the XSD integer family.
    pub fn is_integer(datatype: &str) -> bool {
        datatype
            .strip_prefix(XSD)
            .is_some_and(|local| INTEGER_LOCALS.contains(&local))
    }

    /// True for every XSD type the engine treats as a number.
    pub fn is_numeric(datatype: &str) -> bool {
        is_integer(datatype) || matches!(datatype, XSD_DECIMAL | XSD_DOUBLE | XSD_FLOAT)
    }
}

/// Mapping vocabulary (`map:` prefix)
pub mod map {
    pub const PREFIX: &str = "map";
    pub const NS: &str = "http://ontmap.example/mapping#";

    // Classes
    pub const CONTEXT: &str = "http://ontmap.example/mapping#Context";
    pub const CONSTRUCT_TEMPLATE: &str = "http://ontmap.example/mapping#ConstructTemplate";
    pub const FUNCTION: &str = "http://ontmap.example/mapping#Function";
    pub const VARIABLE: &str = "http://ontmap.example/mapping#Variable";
    pub const CONSTRAINT: &str = "http://ontmap.example/mapping#Constraint";

    // Context structure
    pub const SOURCE_CLASS: &str = "http://ontmap.example/mapping#sourceClass";
    pub const TARGET_CLASS: &str = "http://ontmap.example/mapping#targetClass";
    pub const TARGET: &str = "http://ontmap.example/mapping#target";
    pub const TARGET_FILTER: &str = "http://ontmap.example/mapping#targetFilter";
    pub const HIDDEN: &str = "http://ontmap.example/mapping#hidden";

    // Rules
    pub const RULE: &str = "http://ontmap.example/mapping#rule";
    pub const CONTEXT_ARG: &str = "http://ontmap.example/mapping#context";
    pub const EXPRESSION: &str = "http://ontmap.example/mapping#expression";
    pub const FILTER: &str = "http://ontmap.example/mapping#filter";
    pub const TARGET_PREDICATE: &str = "http://ontmap.example/mapping#targetPredicate";
    pub const SOURCE_PREDICATE: &str = "http://ontmap.example/mapping#sourcePredicate";
    pub const SOURCE_DEFAULT_VALUE: &str = "http://ontmap.example/mapping#sourceDefaultValue";

    // Templates and functions
    pub const BODY: &str = "http://ontmap.example/mapping#body";
    pub const CONSTRAINT_PROP: &str = "http://ontmap.example/mapping#constraint";
    pub const PREDICATE: &str = "http://ontmap.example/mapping#predicate";
    pub const VALUE_TYPE: &str = "http://ontmap.example/mapping#valueType";
    pub const OPTIONAL: &str = "http://ontmap.example/mapping#optional";
    pub const RETURN_TYPE: &str = "http://ontmap.example/mapping#returnType";
    pub const DEPENDS_ON: &str = "http://ontmap.example/mapping#dependsOn";
    pub const CALLS: &str = "http://ontmap.example/mapping#calls";

    /// Placeholder for the individual a rule is currently processing.
    pub const SOURCE_VARIABLE: &str = "http://ontmap.example/mapping#_source";

    /// Name of the vararg position `n` (1-based) of a template or function.
    pub fn positional(prefix: &str, n: usize) -> String {
        format!("{prefix}{n}")
    }
}

/// Builtin function library (`fn:` prefix)
pub mod func {
    pub const PREFIX: &str = "fn";
    pub const NS: &str = "http://ontmap.example/fn#";

    // Target functions
    pub const SELF: &str = "http://ontmap.example/fn#self";
    pub const IRI: &str = "http://ontmap.example/fn#IRI";
    pub const BUILD_URI: &str = "http://ontmap.example/fn#buildURI";
    pub const UUID: &str = "http://ontmap.example/fn#uuid";

    // Resources
    pub const CURRENT_INDIVIDUAL: &str = "http://ontmap.example/fn#currentIndividual";
    pub const TARGET_RESOURCE: &str = "http://ontmap.example/fn#targetResource";

    // Identity wrappers
    pub const EQUALS: &str = "http://ontmap.example/fn#equals";
    pub const WITH_DEFAULT: &str = "http://ontmap.example/fn#withDefault";
    pub const AS_IRI: &str = "http://ontmap.example/fn#asIRI";

    // Strings
    pub const CONCAT: &str = "http://ontmap.example/fn#concat";
    pub const CONCAT_WITH_SEPARATOR: &str = "http://ontmap.example/fn#concatWithSeparator";
    pub const UPPER_CASE: &str = "http://ontmap.example/fn#upperCase";
    pub const LOWER_CASE: &str = "http://ontmap.example/fn#lowerCase";
    pub const STRLEN: &str = "http://ontmap.example/fn#strlen";
    pub const CAST: &str = "http://ontmap.example/fn#cast";
    pub const DATATYPE: &str = "http://ontmap.example/fn#datatype";

    // Logic and arithmetic
    pub const EQ: &str = "http://ontmap.example/fn#eq";
    pub const GT: &str = "http://ontmap.example/fn#gt";
    pub const LT: &str = "http://ontmap.example/fn#lt";
    pub const NOT: &str = "http://ontmap.example/fn#not";
    pub const AND: &str = "http://ontmap.example/fn#and";
    pub const OR: &str = "http://ontmap.example/fn#or";
    pub const ADD: &str = "http://ontmap.example/fn#add";
    pub const SUBTRACT: &str = "http://ontmap.example/fn#subtract";
    pub const MULTIPLY: &str = "http://ontmap.example/fn#multiply";
}

/// Local part of an IRI: the text after the last `#` or `/`.
pub fn local_name(iri: &str) -> &str {
    iri.rsplit(['#', '/']).next().unwrap_or(iri)
}

/// Namespace part of an IRI, including the trailing `#` or `/`.
pub fn namespace(iri: &str) -> &str {
    &iri[..iri.len() - local_name(iri).len()]
}
