//! Class and property knowledge derived from RDFS/OWL axioms.
//!
//! Every traversal keeps a visited set, so cyclic `rdfs:subClassOf` chains
//! and self-referencing unions terminate.

use std::collections::BTreeSet;

use crate::model::ontology::standard;
use crate::model::Term;

use super::Graph;

/// Schema introspection used by validation, compilation and inference.
pub trait SchemaView {
    /// Asserted `rdf:type`s of a node.
    fn types_of(&self, node: &Term) -> BTreeSet<Term>;

    /// Direct named superclasses of a class.
    fn superclasses_of(&self, class: &Term) -> BTreeSet<Term>;

    /// Every property applicable to instances of `class`, inherited ones included.
    fn properties_of(&self, class: &Term) -> BTreeSet<Term>;

    fn is_class(&self, node: &Term) -> bool;

    /// Object properties whose subject can be a `from` and whose value can be a `to`.
    fn link_properties(&self, from: &Term, to: &Term) -> BTreeSet<Term>;

    /// `class` plus all of its transitive superclasses.
    fn closure(&self, class: &Term) -> BTreeSet<Term> {
        let mut visited = BTreeSet::new();
        let mut stack = vec![class.clone()];
        while let Some(next) = stack.pop() {
            if !visited.insert(next.clone()) {
                continue;
            }
            stack.extend(self.superclasses_of(&next));
        }
        visited
    }

    /// Class closure of every asserted type of `individual`.
    fn class_closure_of(&self, individual: &Term) -> BTreeSet<Term> {
        self.types_of(individual)
            .iter()
            .flat_map(|class| self.closure(class))
            .collect()
    }
}

/// [`SchemaView`] over the axioms of a graph.
#[derive(Debug, Clone, Default)]
pub struct GraphSchema<G> {
    graph: G,
}

impl<G: Graph> GraphSchema<G> {
    pub fn new(graph: G) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    fn is_restriction(&self, node: &Term) -> bool {
        self.graph
            .object(node, &iri(standard::OWL_ON_PROPERTY))
            .is_some()
    }

    /// Members of an RDF collection starting at `head`.
    fn list_items(&self, head: &Term) -> Vec<Term> {
        let first = iri(standard::RDF_FIRST);
        let rest = iri(standard::RDF_REST);
        let nil = iri(standard::RDF_NIL);
        let mut items = Vec::new();
        let mut seen = BTreeSet::new();
        let mut node = head.clone();
        while node != nil && seen.insert(node.clone()) {
            if let Some(item) = self.graph.object(&node, &first) {
                items.push(item);
            }
            match self.graph.object(&node, &rest) {
                Some(next) => node = next,
                None => break,
            }
        }
        items
    }

    /// Head of the RDF collection that contains the list cell `cell`.
    fn list_head(&self, cell: &Term) -> Term {
        let rest = iri(standard::RDF_REST);
        let mut seen = BTreeSet::new();
        let mut node = cell.clone();
        while seen.insert(node.clone()) {
            match self.graph.subjects(&rest, &node).into_iter().next() {
                Some(prev) => node = prev,
                None => break,
            }
        }
        node
    }

    /// Union classes that list `class` as a member.
    fn unions_containing(&self, class: &Term) -> BTreeSet<Term> {
        let union_of = iri(standard::OWL_UNION_OF);
        self.graph
            .subjects(&iri(standard::RDF_FIRST), class)
            .iter()
            .flat_map(|cell| self.graph.subjects(&union_of, &self.list_head(cell)))
            .collect()
    }

    /// Members of `owl:intersectionOf` lists on equivalent classes of `class`.
    fn intersection_members(&self, class: &Term) -> Vec<Term> {
        let intersection = iri(standard::OWL_INTERSECTION_OF);
        self.graph
            .objects(class, &iri(standard::OWL_EQUIVALENT_CLASS))
            .iter()
            .filter_map(|eq| self.graph.object(eq, &intersection))
            .flat_map(|head| self.list_items(&head))
            .collect()
    }

    fn collect_properties(&self, class: &Term, visited: &mut BTreeSet<Term>, out: &mut BTreeSet<Term>) {
        if !visited.insert(class.clone()) {
            return;
        }
        let on_property = iri(standard::OWL_ON_PROPERTY);

        out.extend(self.graph.subjects(&iri(standard::RDFS_DOMAIN), class));

        let parents = self
            .graph
            .objects(class, &iri(standard::RDFS_SUBCLASS_OF))
            .into_iter()
            .chain(self.intersection_members(class));
        for parent in parents {
            if self.is_restriction(&parent) {
                out.extend(self.graph.objects(&parent, &on_property));
            } else {
                self.collect_properties(&parent, visited, out);
            }
        }

        for union in self.unions_containing(class) {
            self.collect_properties(&union, visited, out);
        }
    }

    /// Classes a restriction on `class` (or any superclass) allows as values of `property`.
    fn restricted_ranges(&self, class: &Term, property: &Term) -> BTreeSet<Term> {
        let on_property = iri(standard::OWL_ON_PROPERTY);
        let value_preds = [
            iri(standard::OWL_SOME_VALUES_FROM),
            iri(standard::OWL_ALL_VALUES_FROM),
            iri(standard::OWL_ON_CLASS),
        ];
        let mut out = BTreeSet::new();
        for ancestor in self.closure(class) {
            let restrictions = self
                .graph
                .objects(&ancestor, &iri(standard::RDFS_SUBCLASS_OF))
                .into_iter()
                .chain(self.intersection_members(&ancestor));
            for restriction in restrictions {
                if !self.graph.objects(&restriction, &on_property).contains(property) {
                    continue;
                }
                for pred in &value_preds {
                    out.extend(self.graph.objects(&restriction, pred));
                }
            }
        }
        out
    }
}

impl<G: Graph> SchemaView for GraphSchema<G> {
    fn types_of(&self, node: &Term) -> BTreeSet<Term> {
        self.graph.objects(node, &iri(standard::RDF_TYPE))
    }

    fn superclasses_of(&self, class: &Term) -> BTreeSet<Term> {
        self.graph
            .objects(class, &iri(standard::RDFS_SUBCLASS_OF))
            .into_iter()
            .chain(self.intersection_members(class))
            .filter(|parent| !self.is_restriction(parent) && parent.is_resource())
            .collect()
    }

    fn properties_of(&self, class: &Term) -> BTreeSet<Term> {
        let mut visited = BTreeSet::new();
        let mut out = BTreeSet::new();
        self.collect_properties(class, &mut visited, &mut out);
        // everything is an owl:Thing, and every Thing can carry a label
        out.insert(iri(standard::RDFS_LABEL));
        self.collect_properties(&iri(standard::OWL_THING), &mut visited, &mut out);
        out
    }

    fn is_class(&self, node: &Term) -> bool {
        if matches!(
            node.as_iri(),
            Some(standard::OWL_THING | standard::OWL_NAMED_INDIVIDUAL)
        ) {
            return true;
        }
        let types = self.types_of(node);
        types.contains(&iri(standard::OWL_CLASS))
            || types.contains(&iri(standard::RDFS_CLASS))
            || self
                .graph
                .find(Some(node), Some(&iri(standard::RDFS_SUBCLASS_OF)), None)
                .next()
                .is_some()
    }

    fn link_properties(&self, from: &Term, to: &Term) -> BTreeSet<Term> {
        let accepted = self.closure(to);
        let range = iri(standard::RDFS_RANGE);
        self.properties_of(from)
            .into_iter()
            .filter(|p| {
                self.graph.objects(p, &range).iter().any(|r| accepted.contains(r))
                    || self
                        .restricted_ranges(from, p)
                        .iter()
                        .any(|r| accepted.contains(r))
            })
            .collect()
    }
}

fn iri(value: &str) -> Term {
    Term::iri(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphMut, MemGraph};
    use crate::model::Triple;

    const EX: &str = "http://ex.org/";

    fn ex(local: &str) -> Term {
        Term::iri(format!("{EX}{local}"))
    }

    fn add(g: &mut MemGraph, s: Term, p: &str, o: Term) {
        g.insert(Triple::new(s, Term::iri(p), o));
    }

    #[test]
    fn closure_survives_cycles() {
        let mut g = MemGraph::new();
        add(&mut g, ex("A"), standard::RDFS_SUBCLASS_OF, ex("B"));
        add(&mut g, ex("B"), standard::RDFS_SUBCLASS_OF, ex("A"));
        let schema = GraphSchema::new(g);
        assert_eq!(schema.closure(&ex("A")), [ex("A"), ex("B")].into_iter().collect());
    }

    #[test]
    fn properties_from_domain_restriction_and_union() {
        let mut g = MemGraph::new();
        add(&mut g, ex("name"), standard::RDFS_DOMAIN, ex("Agent"));
        add(&mut g, ex("Person"), standard::RDFS_SUBCLASS_OF, ex("Agent"));

        let restriction = Term::blank("r1");
        add(&mut g, ex("Person"), standard::RDFS_SUBCLASS_OF, restriction.clone());
        add(&mut g, restriction, standard::OWL_ON_PROPERTY, ex("age"));

        let union = Term::blank("u");
        let cell1 = Term::blank("l1");
        let cell2 = Term::blank("l2");
        add(&mut g, union.clone(), standard::OWL_UNION_OF, cell1.clone());
        add(&mut g, cell1.clone(), standard::RDF_FIRST, ex("Robot"));
        add(&mut g, cell1, standard::RDF_REST, cell2.clone());
        add(&mut g, cell2.clone(), standard::RDF_FIRST, ex("Person"));
        add(&mut g, cell2, standard::RDF_REST, Term::iri(standard::RDF_NIL));
        add(&mut g, ex("serial"), standard::RDFS_DOMAIN, union);

        let schema = GraphSchema::new(g);
        let props = schema.properties_of(&ex("Person"));
        assert!(props.contains(&ex("name")));
        assert!(props.contains(&ex("age")));
        assert!(props.contains(&ex("serial")));
        assert!(props.contains(&Term::iri(standard::RDFS_LABEL)));
        assert!(!schema.superclasses_of(&ex("Person")).contains(&Term::blank("r1")));
    }

    #[test]
    fn link_by_range() {
        let mut g = MemGraph::new();
        add(&mut g, ex("owns"), standard::RDFS_DOMAIN, ex("User"));
        add(&mut g, ex("owns"), standard::RDFS_RANGE, ex("Account"));
        add(&mut g, ex("name"), standard::RDFS_DOMAIN, ex("User"));
        let schema = GraphSchema::new(g);
        assert_eq!(
            schema.link_properties(&ex("User"), &ex("Account")),
            [ex("owns")].into_iter().collect()
        );
        assert!(schema.link_properties(&ex("Account"), &ex("User")).is_empty());
    }
}
