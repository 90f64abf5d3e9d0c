//! Forward-chaining inference over a mapping model.
//!
//! A run goes `Idle → Assembling → Selecting → Firing → Draining → Idle`.
//! Every typed subject of the source is processed once in term order; target
//! individuals produced along the way are queued in a working set and
//! processed in turn, so rules whose subject class is a target class (for
//! example the hidden `owl:NamedIndividual` contexts) fire on them as well.
//! A processed index keeps any `(individual, rule)` pair from firing twice.

pub mod evaluator;

use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet, VecDeque};

use tracing::{debug, info, trace, warn};

use crate::compiler::Rule;
use crate::error::{ErrorCode, Key, Result};
use crate::graph::{Graph, GraphMut, MemGraph, UnionGraph};
use crate::mapping::MappingModel;
use crate::model::ontology::{map, standard};
use crate::model::Term;

pub use evaluator::{class_closure, EvalEnv, PlanEvaluator, QueryEvaluator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Assembling,
    Selecting,
    Firing,
    Draining,
}

/// Counters of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Distinct individuals processed, source and discovered.
    pub individuals: usize,
    pub rules_fired: usize,
    /// Triples that were new to the target.
    pub triples_written: usize,
    /// Fires refused because the pair was already processed.
    pub skipped: usize,
    /// Synchronous drains triggered by the memory threshold.
    pub flushes: usize,
}

/// A selected rule plus the class whose instances it fires for.
#[derive(Debug, Clone)]
pub struct CompiledRule<'m> {
    pub rule: &'m Rule,
    pub subject_class: Term,
}

/// Deterministic rule order: context, class bridge before property bridges,
/// rendered text, then id.
fn rule_order(a: &CompiledRule<'_>, b: &CompiledRule<'_>) -> Ordering {
    a.rule
        .context()
        .cmp(b.rule.context())
        .then_with(|| a.rule.kind().cmp(&b.rule.kind()))
        .then_with(|| a.rule.text().cmp(b.rule.text()))
        .then_with(|| a.rule.id().cmp(b.rule.id()))
}

/// Individuals discovered during a run, waiting to be processed.
#[derive(Debug, Default)]
struct WorkingSet {
    queue: VecDeque<Term>,
    members: HashSet<Term>,
}

impl WorkingSet {
    fn push(&mut self, individual: Term) {
        if self.members.insert(individual.clone()) {
            self.queue.push_back(individual);
        }
    }

    fn pop(&mut self) -> Option<Term> {
        let next = self.queue.pop_front()?;
        self.members.remove(&next);
        Some(next)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Per-run bookkeeping.
struct Run<'m> {
    rules: Vec<CompiledRule<'m>>,
    mapping_graph: MemGraph,
    processed: HashSet<(Term, String)>,
    seen: HashSet<Term>,
    working: WorkingSet,
    stats: RunStats,
}

pub struct InferenceEngine<'m> {
    mapping: &'m MappingModel,
    evaluator: Box<dyn QueryEvaluator + 'm>,
    threshold: usize,
    max_depth: usize,
    state: Cell<EngineState>,
}

impl<'m> InferenceEngine<'m> {
    pub fn new(mapping: &'m MappingModel) -> Self {
        Self {
            mapping,
            evaluator: Box::new(PlanEvaluator),
            threshold: mapping.config().memory_threshold,
            max_depth: mapping.config().max_target_depth,
            state: Cell::new(EngineState::Idle),
        }
    }

    pub fn with_evaluator(mut self, evaluator: Box<dyn QueryEvaluator + 'm>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    fn enter(&self, state: EngineState) {
        debug!("Inference: {:?} -> {:?}", self.state.get(), state);
        self.state.set(state);
    }

    /// Rules of the mapping in firing order.
    pub fn selected_rules(&self) -> Result<Vec<CompiledRule<'m>>> {
        let graph = self.mapping.to_graph();
        self.select(&graph)
    }

    fn select(&self, view: &dyn Graph) -> Result<Vec<CompiledRule<'m>>> {
        let mut seen = BTreeSet::new();
        let mut rules = Vec::new();
        for triple in view.find(None, Some(&Term::iri(map::RULE)), None) {
            let Some(id) = triple.object.as_iri() else {
                continue;
            };
            if !seen.insert(id.to_string()) {
                continue;
            }
            match self.mapping.rule(id) {
                Some(rule) => rules.push(CompiledRule {
                    rule,
                    subject_class: triple.subject.clone(),
                }),
                None => warn!("Skipping unknown rule {id}"),
            }
        }
        if rules.is_empty() {
            return Err(ErrorCode::InferenceNoRules
                .error()
                .with(Key::Mapping, self.mapping.iri()));
        }
        rules.sort_by(rule_order);
        for selected in &rules {
            debug!("Selected rule {} for {}", selected.rule.id(), selected.subject_class);
        }
        Ok(rules)
    }

    /// Map every typed individual of `source` into `target`.
    ///
    /// On failure the triples written so far stay in `target`.
    pub fn run<T: GraphMut>(&self, source: &dyn Graph, target: &mut T) -> Result<RunStats> {
        let result = self.run_inner(source, target);
        self.enter(EngineState::Idle);
        result
    }

    fn run_inner<T: GraphMut>(&self, source: &dyn Graph, target: &mut T) -> Result<RunStats> {
        self.enter(EngineState::Assembling);
        let mapping_graph = self.mapping.to_graph();
        let rdf_type = Term::iri(standard::RDF_TYPE);

        self.enter(EngineState::Selecting);
        let rules = {
            let view = self.view(&*target, source, &mapping_graph);
            self.select(&view)?
        };
        let mut run = Run {
            rules,
            mapping_graph,
            processed: HashSet::new(),
            seen: HashSet::new(),
            working: WorkingSet::default(),
            stats: RunStats::default(),
        };

        self.enter(EngineState::Firing);
        let individuals: BTreeSet<Term> = source
            .find(None, Some(&rdf_type), None)
            .map(|t| t.subject)
            .collect();
        for individual in individuals {
            self.process(&mut run, &individual, source, target)?;
            if run.working.len() > self.threshold {
                info!(
                    "Working set holds {} individuals, draining",
                    run.working.len()
                );
                run.stats.flushes += 1;
                self.drain(&mut run, source, target)?;
                self.enter(EngineState::Firing);
            }
        }

        self.drain(&mut run, source, target)?;
        run.stats.individuals = run.seen.len();
        info!(
            "Inference finished: {} individuals, {} rules fired, {} triples written",
            run.stats.individuals, run.stats.rules_fired, run.stats.triples_written
        );
        Ok(run.stats)
    }

    fn drain<T: GraphMut>(&self, run: &mut Run<'m>, source: &dyn Graph, target: &mut T) -> Result<()> {
        self.enter(EngineState::Draining);
        while let Some(individual) = run.working.pop() {
            self.process(run, &individual, source, target)?;
        }
        Ok(())
    }

    fn view<'v>(
        &self,
        target: &'v dyn Graph,
        source: &'v dyn Graph,
        mapping_graph: &'v MemGraph,
    ) -> UnionGraph<'v>
    where
        'm: 'v,
    {
        let schema: &'v dyn Graph = self.mapping.schema().graph();
        UnionGraph::new(vec![target, source, schema, mapping_graph as &dyn Graph])
    }

    fn process<T: GraphMut>(
        &self,
        run: &mut Run<'m>,
        individual: &Term,
        source: &dyn Graph,
        target: &mut T,
    ) -> Result<()> {
        run.seen.insert(individual.clone());
        let rdf_type = Term::iri(standard::RDF_TYPE);
        let closure = {
            let view = self.view(&*target, source, &run.mapping_graph);
            class_closure(&view, self.mapping, individual)
        };

        for index in 0..run.rules.len() {
            let selected = &run.rules[index];
            if !closure.contains(&selected.subject_class) {
                continue;
            }
            let rule = selected.rule;
            let key = (individual.clone(), rule.id().to_string());
            if run.processed.contains(&key) {
                debug!("Rule {} already fired for {individual}", rule.id());
                run.stats.skipped += 1;
                continue;
            }
            run.processed.insert(key);

            trace!("Firing {} for {individual}", rule.id());
            let produced = {
                let view = self.view(&*target, source, &run.mapping_graph);
                let env = EvalEnv {
                    view: &view,
                    mapping: self.mapping,
                    max_depth: self.max_depth,
                };
                self.evaluator.evaluate(rule, individual, &env).map_err(|err| {
                    ErrorCode::InferenceFail
                        .error()
                        .with(Key::Query, rule.text())
                        .with(Key::Rule, rule.id())
                        .with(Key::Instance, individual)
                        .with(Key::Value, err)
                })?
            };
            run.stats.rules_fired += 1;

            for triple in produced {
                if triple.predicate == rdf_type && triple.subject.is_resource() {
                    run.working.push(triple.subject.clone());
                }
                if target.insert(triple) {
                    run.stats.triples_written += 1;
                }
            }
        }
        Ok(())
    }
}
