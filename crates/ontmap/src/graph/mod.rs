//! Triple storage seams.
//!
//! The engine only ever talks to [`Graph`] and [`GraphMut`]. [`MemGraph`] is an
//! ordered in-memory implementation, [`UnionGraph`] a read-only view over
//! several graphs, and [`schema::GraphSchema`] derives class and property
//! knowledge from any graph.

pub mod schema;
pub mod union;

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Term, Triple};

pub use schema::{GraphSchema, SchemaView};
pub use union::UnionGraph;

/// Read access to a set of triples.
pub trait Graph {
    /// All triples matching the pattern; `None` is a wildcard.
    fn find<'a>(
        &'a self,
        subject: Option<&Term>,
        predicate: Option<&Term>,
        object: Option<&Term>,
    ) -> Box<dyn Iterator<Item = Triple> + 'a>;

    /// Number of stored triples. Views that do not deduplicate may count a
    /// triple more than once.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, triple: &Triple) -> bool {
        self.find(
            Some(&triple.subject),
            Some(&triple.predicate),
            Some(&triple.object),
        )
        .next()
        .is_some()
    }

    fn triples<'a>(&'a self) -> Box<dyn Iterator<Item = Triple> + 'a> {
        self.find(None, None, None)
    }

    /// Objects of `subject predicate ?o`, sorted and distinct.
    fn objects(&self, subject: &Term, predicate: &Term) -> BTreeSet<Term> {
        self.find(Some(subject), Some(predicate), None)
            .map(|t| t.object)
            .collect()
    }

    /// Subjects of `?s predicate object`, sorted and distinct.
    fn subjects(&self, predicate: &Term, object: &Term) -> BTreeSet<Term> {
        self.find(None, Some(predicate), Some(object))
            .map(|t| t.subject)
            .collect()
    }

    fn object(&self, subject: &Term, predicate: &Term) -> Option<Term> {
        self.objects(subject, predicate).into_iter().next()
    }
}

/// Write access to a graph.
pub trait GraphMut: Graph {
    /// Returns `true` when the triple was not present before.
    fn insert(&mut self, triple: Triple) -> bool;

    /// Returns `true` when the triple was present.
    fn remove(&mut self, triple: &Triple) -> bool;

    fn extend_from<I: IntoIterator<Item = Triple>>(&mut self, triples: I) -> usize
    where
        Self: Sized,
    {
        triples
            .into_iter()
            .filter(|t| self.insert(t.clone()))
            .count()
    }
}

impl<G: Graph + ?Sized> Graph for &G {
    fn find<'a>(
        &'a self,
        subject: Option<&Term>,
        predicate: Option<&Term>,
        object: Option<&Term>,
    ) -> Box<dyn Iterator<Item = Triple> + 'a> {
        (**self).find(subject, predicate, object)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

type Index = BTreeMap<Term, BTreeMap<Term, BTreeSet<Term>>>;

/// In-memory graph indexed by subject and by object.
///
/// Iteration order is the term order, so two graphs with the same content
/// always enumerate identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemGraph {
    spo: Index,
    ops: Index,
    len: usize,
}

impl MemGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = Triple> + '_ {
        self.spo.iter().flat_map(|(s, po)| {
            po.iter().flat_map(move |(p, os)| {
                os.iter()
                    .map(move |o| Triple::new(s.clone(), p.clone(), o.clone()))
            })
        })
    }

    /// Insert every triple of `other`, returning how many were new.
    pub fn merge(&mut self, other: &dyn Graph) -> usize {
        other.triples().filter(|t| self.insert(t.clone())).count()
    }
}

impl FromIterator<Triple> for MemGraph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut graph = MemGraph::new();
        for triple in iter {
            graph.insert(triple);
        }
        graph
    }
}

fn matches(term: &Term, pattern: &Option<Term>) -> bool {
    pattern.as_ref().is_none_or(|p| p == term)
}

impl Graph for MemGraph {
    fn find<'a>(
        &'a self,
        subject: Option<&Term>,
        predicate: Option<&Term>,
        object: Option<&Term>,
    ) -> Box<dyn Iterator<Item = Triple> + 'a> {
        let p_pat = predicate.cloned();
        let o_pat = object.cloned();

        if let Some(s) = subject {
            let Some((s, po)) = self.spo.get_key_value(s) else {
                return Box::new(std::iter::empty());
            };
            return Box::new(
                po.iter()
                    .filter(move |(p, _)| matches(p, &p_pat))
                    .flat_map(move |(p, os)| {
                        let o_pat = o_pat.clone();
                        os.iter()
                            .filter(move |o| matches(o, &o_pat))
                            .map(move |o| Triple::new(s.clone(), p.clone(), o.clone()))
                    }),
            );
        }

        if let Some(o) = object {
            let Some((o, ps)) = self.ops.get_key_value(o) else {
                return Box::new(std::iter::empty());
            };
            return Box::new(
                ps.iter()
                    .filter(move |(p, _)| matches(p, &p_pat))
                    .flat_map(move |(p, ss)| {
                        ss.iter()
                            .map(move |s| Triple::new(s.clone(), p.clone(), o.clone()))
                    }),
            );
        }

        Box::new(self.iter().filter(move |t| matches(&t.predicate, &p_pat)))
    }

    fn len(&self) -> usize {
        self.len
    }
}

impl GraphMut for MemGraph {
    fn insert(&mut self, triple: Triple) -> bool {
        let Triple {
            subject,
            predicate,
            object,
        } = triple;
        let added = self
            .spo
            .entry(subject.clone())
            .or_default()
            .entry(predicate.clone())
            .or_default()
            .insert(object.clone());
        if added {
            self.ops
                .entry(object)
                .or_default()
                .entry(predicate)
                .or_default()
                .insert(subject);
            self.len += 1;
        }
        added
    }

    fn remove(&mut self, triple: &Triple) -> bool {
        let removed = remove_from(&mut self.spo, &triple.subject, &triple.predicate, &triple.object);
        if removed {
            remove_from(&mut self.ops, &triple.object, &triple.predicate, &triple.subject);
            self.len -= 1;
        }
        removed
    }
}

fn remove_from(index: &mut Index, first: &Term, second: &Term, third: &Term) -> bool {
    let Some(inner) = index.get_mut(first) else {
        return false;
    };
    let Some(leaves) = inner.get_mut(second) else {
        return false;
    };
    let removed = leaves.remove(third);
    if leaves.is_empty() {
        inner.remove(second);
    }
    if inner.is_empty() {
        index.remove(first);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str, p: &str, o: &str) -> Triple {
        Triple::new(Term::iri(s), Term::iri(p), Term::iri(o))
    }

    #[test]
    fn insert_is_set_semantics() {
        let mut g = MemGraph::new();
        assert!(g.insert(t("s", "p", "o")));
        assert!(!g.insert(t("s", "p", "o")));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn find_by_each_position() {
        let mut g = MemGraph::new();
        g.insert(t("a", "p", "x"));
        g.insert(t("b", "p", "x"));
        g.insert(t("b", "q", "y"));

        assert_eq!(g.find(Some(&Term::iri("b")), None, None).count(), 2);
        assert_eq!(g.find(None, None, Some(&Term::iri("x"))).count(), 2);
        assert_eq!(g.find(None, Some(&Term::iri("q")), None).count(), 1);
        assert_eq!(
            g.subjects(&Term::iri("p"), &Term::iri("x")),
            [Term::iri("a"), Term::iri("b")].into_iter().collect()
        );
    }

    #[test]
    fn remove_cleans_both_indexes() {
        let mut g = MemGraph::new();
        g.insert(t("a", "p", "x"));
        assert!(g.remove(&t("a", "p", "x")));
        assert!(!g.remove(&t("a", "p", "x")));
        assert!(g.is_empty());
        assert_eq!(g.find(None, None, Some(&Term::iri("x"))).count(), 0);
    }
}
