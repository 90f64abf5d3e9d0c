//! IRI minting for mapping resources and generated individuals.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use uuid::Uuid;

use super::ontology::{local_name, map};

/// Characters that need percent-encoding in IRI path segments.
/// We keep alphanumeric, -, _, ., ~ as unreserved per RFC 3987.
const IRI_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'!')
    .add(b'"')
    .add(b'#')
    .add(b'$')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b'+')
    .add(b',')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Generates consistent IRIs for contexts, rules and templates of one mapping.
#[derive(Debug, Clone)]
pub struct IriMinter {
    base_uri: String,
}

impl IriMinter {
    pub fn new(base_uri: &str) -> Self {
        Self {
            base_uri: base_uri.trim_end_matches(['/', '#']).to_string(),
        }
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Escape a string for use in an IRI path segment.
    pub fn escape(value: &str) -> String {
        utf8_percent_encode(value, IRI_ENCODE_SET).to_string()
    }

    /// IRI for the context mapping `source` onto `target`.
    pub fn context_iri(&self, source: &str, target: &str) -> String {
        format!(
            "{}#Context-{}-{}",
            self.base_uri,
            Self::escape(local_name(source)),
            Self::escape(local_name(target))
        )
    }

    /// IRI for the `n`-th rule created in this mapping.
    pub fn rule_iri(&self, n: usize) -> String {
        format!("{}#Rule-{n}", self.base_uri)
    }

    /// IRI for the `n`-th property bridge created in this mapping.
    pub fn bridge_iri(&self, n: usize) -> String {
        format!("{}#Bridge-{n}", self.base_uri)
    }

    /// IRI of the shared template with the given canonical key.
    pub fn template_iri(key: &str) -> String {
        format!("{}Mapping-{key}", map::NS)
    }

    /// IRI of the positional variable bound to predicate slot `n`.
    pub fn variable_iri(n: usize) -> String {
        format!("{}_arg{n}", map::NS)
    }

    /// Name-based UUID IRI, stable across runs for the same input.
    pub fn uuid_iri(name: &str) -> String {
        format!("urn:uuid:{}", Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()))
    }

    /// Substitute `{?n}` placeholders (1-based) with escaped values.
    ///
    /// Returns `None` when the template references a position that has no value.
    pub fn fill_template(template: &str, values: &[String]) -> Option<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{?") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find('}')?;
            let index: usize = after[..end].trim().parse().ok()?;
            let value = values.get(index.checked_sub(1)?)?;
            out.push_str(&Self::escape(value));
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Some(out)
    }
}
