use std::io::{self, Write};

use super::TriplesEmitter;
use crate::model::Triple;

/// N-Triples emitter. Streams triples as `<s> <p> <o> .` lines.
pub struct NTriplesEmitter<W: Write> {
    writer: W,
    count: u64,
}

impl<W: Write> NTriplesEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, count: 0 }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TriplesEmitter for NTriplesEmitter<W> {
    fn emit(&mut self, triple: &Triple) -> io::Result<()> {
        writeln!(self.writer, "{triple}")?;
        self.count += 1;
        Ok(())
    }

    fn add_prefix(&mut self, _prefix: &str, _iri: &str) -> io::Result<()> {
        // N-Triples has no prefixes
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    fn triple_count(&self) -> u64 {
        self.count
    }
}
