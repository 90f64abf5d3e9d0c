//! RDF terms and triples.
//!
//! Terms order IRIs before blank nodes before literals so that any
//! collection keyed by them iterates deterministically.

use std::fmt;

use super::ontology::standard;

/// An RDF literal: lexical form plus datatype, or a language tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal {
    lexical: String,
    datatype: String,
    lang: Option<String>,
}

impl Literal {
    pub fn typed(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: datatype.into(),
            lang: None,
        }
    }

    pub fn string(lexical: impl Into<String>) -> Self {
        Self::typed(lexical, standard::XSD_STRING)
    }

    pub fn lang(lexical: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: standard::RDF_LANG_STRING.to_string(),
            lang: Some(lang.into().to_lowercase()),
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self::typed(if value { "true" } else { "false" }, standard::XSD_BOOLEAN)
    }

    pub fn integer(value: i64) -> Self {
        Self::typed(value.to_string(), standard::XSD_INTEGER)
    }

    pub fn double(value: f64) -> Self {
        Self::typed(value.to_string(), standard::XSD_DOUBLE)
    }

    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    pub fn datatype(&self) -> &str {
        &self.datatype
    }

    pub fn language(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    /// Effective boolean value of an `xsd:boolean` literal.
    pub fn as_bool(&self) -> Option<bool> {
        if self.datatype != standard::XSD_BOOLEAN {
            return None;
        }
        match self.lexical.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    /// Numeric value of a literal whose datatype is one of the XSD numeric types.
    pub fn as_f64(&self) -> Option<f64> {
        if !standard::is_numeric(&self.datatype) {
            return None;
        }
        self.lexical.trim().parse().ok()
    }

    pub fn as_i64(&self) -> Option<i64> {
        if !standard::is_integer(&self.datatype) {
            return None;
        }
        self.lexical.trim().parse().ok()
    }

    /// Parse the `lex^^<datatype>` / `lex@lang` shorthand used in mapping
    /// documents. Anything else is a plain string.
    pub fn parse_shorthand(text: &str) -> Self {
        if let Some((lex, dt)) = text.rsplit_once("^^") {
            let dt = dt.trim_start_matches('<').trim_end_matches('>');
            let dt = match dt.strip_prefix("xsd:") {
                Some(local) => format!("{}{local}", standard::XSD),
                None => dt.to_string(),
            };
            return Self::typed(lex, dt);
        }
        if let Some((lex, lang)) = text.rsplit_once('@') {
            if !lang.is_empty() && lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Self::lang(lex, lang);
            }
        }
        Self::string(text)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", escape_literal(&self.lexical))?;
        match &self.lang {
            Some(lang) => write!(f, "@{lang}"),
            None if self.datatype == standard::XSD_STRING => Ok(()),
            None => write!(f, "^^<{}>", self.datatype),
        }
    }
}

/// An RDF term.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Iri(String),
    Blank(String),
    Literal(Literal),
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    pub fn blank(label: impl Into<String>) -> Self {
        Term::Blank(label.into())
    }

    pub fn string(lexical: impl Into<String>) -> Self {
        Term::Literal(Literal::string(lexical))
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// IRIs and blank nodes can stand in subject position.
    pub fn is_resource(&self) -> bool {
        !matches!(self, Term::Literal(_))
    }

    /// The string value of the term: IRI text, blank label or lexical form.
    pub fn value(&self) -> &str {
        match self {
            Term::Iri(iri) => iri,
            Term::Blank(label) => label,
            Term::Literal(lit) => lit.lexical(),
        }
    }
}

impl From<Literal> for Term {
    fn from(lit: Literal) -> Self {
        Term::Literal(lit)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{iri}>"),
            Term::Blank(label) => write!(f, "_:{label}"),
            Term::Literal(lit) => lit.fmt(f),
        }
    }
}

/// A single statement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// Escape a string for an N-Triples literal (RDF 1.1 N-Triples, section 2.4).
pub fn escape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            _ => out.push(c),
        }
    }
    out
}
