use std::collections::HashMap;
use std::io::{self, Write};

use super::TriplesEmitter;
use crate::model::ontology::standard;
use crate::model::term::escape_literal;
use crate::model::{Literal, Term, Triple};

/// Turtle emitter with prefix compaction.
pub struct TurtleEmitter<W: Write> {
    writer: W,
    count: u64,
    prefixes: HashMap<String, String>,
    prefix_written: bool,
}

impl<W: Write> TurtleEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            count: 0,
            prefixes: HashMap::new(),
            prefix_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Write all registered prefixes (called before the first triple).
    fn write_prefixes(&mut self) -> io::Result<()> {
        if self.prefix_written {
            return Ok(());
        }
        self.prefix_written = true;
        let mut prefixes: Vec<_> = self.prefixes.iter().collect();
        prefixes.sort_by_key(|(k, _)| (*k).clone());
        for (prefix, iri) in prefixes {
            writeln!(self.writer, "@prefix {prefix}: <{iri}> .")?;
        }
        if !self.prefixes.is_empty() {
            writeln!(self.writer)?;
        }
        Ok(())
    }

    /// Compact an IRI with the longest matching prefix.
    fn compact_iri(&self, iri: &str) -> String {
        let mut best: Option<(&str, &str)> = None;
        for (prefix, ns) in &self.prefixes {
            if iri.starts_with(ns.as_str())
                && best.is_none_or(|(_, prev_ns)| ns.len() > prev_ns.len())
            {
                best = Some((prefix.as_str(), ns.as_str()));
            }
        }
        if let Some((prefix, ns)) = best {
            let local = &iri[ns.len()..];
            // only names Turtle accepts unescaped
            if !local.is_empty()
                && !local.starts_with('_')
                && local.chars().all(|c| c.is_alphanumeric() || c == '_')
            {
                return format!("{prefix}:{local}");
            }
        }
        format!("<{iri}>")
    }

    fn literal(&self, lit: &Literal) -> String {
        let escaped = escape_literal(lit.lexical());
        match lit.language() {
            Some(lang) => format!("\"{escaped}\"@{lang}"),
            None if lit.datatype() == standard::XSD_STRING => format!("\"{escaped}\""),
            None => format!("\"{escaped}\"^^{}", self.compact_iri(lit.datatype())),
        }
    }

    fn term(&self, term: &Term) -> String {
        match term {
            Term::Iri(iri) if iri == standard::RDF_TYPE => "a".to_string(),
            Term::Iri(iri) => self.compact_iri(iri),
            Term::Blank(label) => format!("_:{label}"),
            Term::Literal(lit) => self.literal(lit),
        }
    }
}

impl<W: Write> TriplesEmitter for TurtleEmitter<W> {
    fn emit(&mut self, triple: &Triple) -> io::Result<()> {
        self.write_prefixes()?;
        let s = match &triple.subject {
            Term::Iri(iri) => self.compact_iri(iri),
            other => self.term(other),
        };
        let p = self.term(&triple.predicate);
        let o = match &triple.object {
            Term::Iri(iri) => self.compact_iri(iri),
            other => self.term(other),
        };
        writeln!(self.writer, "{s} {p} {o} .")?;
        self.count += 1;
        Ok(())
    }

    fn add_prefix(&mut self, prefix: &str, iri: &str) -> io::Result<()> {
        self.prefixes.insert(prefix.to_string(), iri.to_string());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    fn triple_count(&self) -> u64 {
        self.count
    }
}
