//! RDF rendering of a mapping model.
//!
//! The inference engine reads its rules back out of this graph through
//! `map:rule` triples, so everything a rule binds is written here.

use crate::compiler::{args, Expr, Rule};
use crate::graph::{GraphMut, MemGraph};
use crate::model::iri::IriMinter;
use crate::model::ontology::{map, standard};
use crate::model::{Literal, Term, Triple};

use super::MappingModel;

pub(super) fn mapping_graph(model: &MappingModel) -> MemGraph {
    let mut writer = Writer::default();

    for context in model.contexts() {
        let id = Term::iri(context.id());
        writer.add(&id, standard::RDF_TYPE, Term::iri(map::CONTEXT));
        writer.add(&id, map::SOURCE_CLASS, context.source().clone());
        writer.add(&id, map::TARGET_CLASS, context.target().clone());
        if context.is_hidden() {
            writer.add(&id, map::HIDDEN, Literal::boolean(true).into());
        }
        if let Some(bridge) = context.class_bridge() {
            let target = writer.expr(bridge.target());
            writer.add(&id, map::TARGET, target);
            if let Some(filter) = bridge.rule().filter() {
                let filter = writer.expr(filter);
                writer.add(&id, map::TARGET_FILTER, filter);
            }
        }
        for rule in context.rules() {
            writer.add(context.source(), map::RULE, Term::iri(rule.id()));
            writer.rule(rule);
        }
    }

    for template in model.store().templates() {
        let iri = Term::iri(template.iri());
        writer.add(&iri, standard::RDF_TYPE, Term::iri(map::CONSTRUCT_TEMPLATE));
        writer.add(&iri, map::BODY, Term::string(template.render(&|_| None)));
        for constraint in template.constraints() {
            let node = writer.blank();
            writer.add(&iri, map::CONSTRAINT_PROP, node.clone());
            writer.add(&node, map::PREDICATE, Term::iri(format!("{}{}", map::NS, constraint.name)));
            if !constraint.value_type.iri().is_empty() {
                writer.add(&node, map::VALUE_TYPE, Term::iri(constraint.value_type.iri()));
            }
            writer.add(&node, map::OPTIONAL, Literal::boolean(constraint.optional).into());
        }
    }

    for function in model.store().functions() {
        let iri = Term::iri(function.iri());
        writer.add(&iri, standard::RDF_TYPE, Term::iri(map::FUNCTION));
        if !function.return_type().iri().is_empty() {
            writer.add(&iri, map::RETURN_TYPE, Term::iri(function.return_type().iri()));
        }
        for dep in function.dependencies() {
            writer.add(&iri, map::DEPENDS_ON, Term::iri(dep.as_str()));
        }
        if let Some(comment) = function.comment() {
            writer.add(&iri, standard::RDFS_COMMENT, Term::string(comment));
        }
    }

    for slot in model.store().variables() {
        writer.add(
            &Term::iri(IriMinter::variable_iri(*slot)),
            standard::RDF_TYPE,
            Term::iri(map::VARIABLE),
        );
    }

    writer.graph
}

#[derive(Default)]
struct Writer {
    graph: MemGraph,
    blanks: usize,
}

impl Writer {
    fn add(&mut self, subject: &Term, predicate: &str, object: Term) {
        self.graph
            .insert(Triple::new(subject.clone(), Term::iri(predicate), object));
    }

    fn blank(&mut self) -> Term {
        self.blanks += 1;
        Term::blank(format!("e{}", self.blanks))
    }

    fn rule(&mut self, rule: &Rule) {
        let id = Term::iri(rule.id());
        self.add(&id, standard::RDF_TYPE, Term::iri(rule.template().iri()));
        self.add(&id, map::CONTEXT_ARG, Term::iri(rule.context()));
        let expression = self.expr(rule.expression());
        self.add(&id, map::EXPRESSION, expression);
        if let Some(filter) = rule.filter() {
            let filter = self.expr(filter);
            self.add(&id, map::FILTER, filter);
        }
        self.add(
            &id,
            &arg_predicate(&args::target_predicate(1)),
            rule.target_predicate().clone(),
        );
        for (slot, property) in rule.predicates() {
            self.add(&id, &arg_predicate(&args::source_predicate(*slot)), property.clone());
        }
        for (slot, default) in rule.defaults() {
            self.add(
                &id,
                &arg_predicate(&args::source_default(*slot)),
                default.clone().into(),
            );
        }
    }

    fn expr(&mut self, expr: &Expr) -> Term {
        match expr {
            Expr::Const(term) => term.clone(),
            Expr::Var(slot) => Term::iri(IriMinter::variable_iri(*slot)),
            Expr::This => Term::iri(map::SOURCE_VARIABLE),
            Expr::Call { function, args } => {
                let node = self.blank();
                self.add(&node, standard::RDF_TYPE, Term::iri(function.iri()));
                for (name, arg) in args {
                    let value = self.expr(arg);
                    self.add(&node, &arg_predicate(name), value);
                }
                node
            }
        }
    }
}

fn arg_predicate(name: &str) -> String {
    format!("{}{name}", map::NS)
}
