//! Parameterized rule bodies shared between rules of the same shape.

use std::collections::BTreeSet;
use std::fmt;

use crate::function::ValueType;
use crate::model::iri::IriMinter;

/// Template argument names.
pub mod args {
    pub const EXPRESSION: &str = "expression";
    pub const FILTER: &str = "filter";
    pub const CONTEXT: &str = "context";

    pub fn target_predicate(n: usize) -> String {
        format!("targetPredicate{n}")
    }

    pub fn source_predicate(slot: usize) -> String {
        format!("sourcePredicate{slot}")
    }

    pub fn source_default(slot: usize) -> String {
        format!("sourceDefaultValue{slot}")
    }
}

/// Canonical identity of a template: the predicate slots feeding the filter,
/// the slots feeding the mapping expression, and the number of target predicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateKey {
    filters: Vec<usize>,
    sources: Vec<usize>,
    targets: usize,
}

impl TemplateKey {
    pub fn new(filters: &[usize], sources: &[usize], targets: usize) -> Self {
        let norm = |slots: &[usize]| -> Vec<usize> {
            slots.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
        };
        Self {
            filters: norm(filters),
            sources: norm(sources),
            targets,
        }
    }

    pub fn filters(&self) -> &[usize] {
        &self.filters
    }

    pub fn sources(&self) -> &[usize] {
        &self.sources
    }

    pub fn targets(&self) -> usize {
        self.targets
    }
}

fn join(slots: &[usize]) -> String {
    slots
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join("-")
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}--{}-{}",
            join(&self.filters),
            join(&self.sources),
            self.targets
        )
    }
}

/// One step of a template body, executed in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// `OPTIONAL { ?this ?sourcePredicateN ?valueN }`
    Optional { slot: usize },
    /// `OPTIONAL { BIND(?sourceDefaultValueN AS ?valueN) }`, only where `?valueN` is unbound.
    DefaultBind { slot: usize },
    /// `BIND(eval(?expression, ?valueS...) AS ?result)`
    Mapping,
    /// `BIND(targetResource(?this, ?context) AS ?target)`
    Target,
    /// `FILTER(!bound(?filter) || eval(?filter, ?valueF...))`
    Filter,
}

/// Declared argument of a template.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgConstraint {
    pub name: String,
    pub value_type: ValueType,
    pub optional: bool,
}

impl ArgConstraint {
    fn new(name: impl Into<String>, value_type: ValueType, optional: bool) -> Self {
        Self {
            name: name.into(),
            value_type,
            optional,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    iri: String,
    key: TemplateKey,
    steps: Vec<Step>,
    constraints: Vec<ArgConstraint>,
}

impl Template {
    /// Synthesize the body and constraints for `key`.
    pub fn synthesize(key: TemplateKey) -> Self {
        let filters: BTreeSet<usize> = key.filters.iter().copied().collect();
        let all: BTreeSet<usize> = filters.iter().chain(&key.sources).copied().collect();

        let mut steps = Vec::new();
        let mut constraints = vec![
            ArgConstraint::new(args::EXPRESSION, ValueType::Undefined, false),
            ArgConstraint::new(args::FILTER, ValueType::boolean(), true),
            ArgConstraint::new(args::CONTEXT, ValueType::Context, false),
        ];
        for n in 1..=key.targets {
            constraints.push(ArgConstraint::new(
                args::target_predicate(n),
                ValueType::Property,
                false,
            ));
        }

        for &slot in &all {
            let filter_only = filters.contains(&slot) && !key.sources.contains(&slot);
            steps.push(Step::Optional { slot });
            constraints.push(ArgConstraint::new(
                args::source_predicate(slot),
                ValueType::Property,
                filter_only,
            ));
            if !filters.contains(&slot) {
                steps.push(Step::DefaultBind { slot });
                constraints.push(ArgConstraint::new(
                    args::source_default(slot),
                    ValueType::Literal,
                    true,
                ));
            }
        }
        steps.extend([Step::Mapping, Step::Target, Step::Filter]);

        // sorted so that two templates with the same key list identical constraints
        constraints.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            iri: IriMinter::template_iri(&key.to_string()),
            key,
            steps,
            constraints,
        }
    }

    pub fn iri(&self) -> &str {
        &self.iri
    }

    pub fn key(&self) -> &TemplateKey {
        &self.key
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn constraints(&self) -> &[ArgConstraint] {
        &self.constraints
    }

    /// First required argument `is_bound` reports as missing.
    pub fn missing_argument(&self, is_bound: &dyn Fn(&str) -> bool) -> Option<&str> {
        self.constraints
            .iter()
            .find(|c| !c.optional && !is_bound(&c.name))
            .map(|c| c.name.as_str())
    }

    /// SPARQL-like text of the body. `bind` supplies the rendering of a bound
    /// argument; unbound arguments render as `?name`.
    pub fn render(&self, bind: &dyn Fn(&str) -> Option<String>) -> String {
        let arg = |name: &str| bind(name).unwrap_or_else(|| format!("?{name}"));
        let values = |slots: &[usize]| -> String {
            slots
                .iter()
                .map(|s| format!(", ?value{s}"))
                .collect::<String>()
        };

        let mut out = String::from("CONSTRUCT {");
        for n in 1..=self.key.targets {
            out.push_str(&format!(" ?target {} ?result .", arg(&args::target_predicate(n))));
        }
        out.push_str(" } WHERE {");
        for step in &self.steps {
            let text = match *step {
                Step::Optional { slot } => format!(
                    " OPTIONAL {{ ?this {} ?value{slot} }}",
                    arg(&args::source_predicate(slot))
                ),
                Step::DefaultBind { slot } => format!(
                    " OPTIONAL {{ BIND({} AS ?value{slot}) }}",
                    arg(&args::source_default(slot))
                ),
                Step::Mapping => format!(
                    " BIND(eval({}{}) AS ?result)",
                    arg(args::EXPRESSION),
                    values(&self.key.sources)
                ),
                Step::Target => format!(
                    " BIND(targetResource(?this, {}) AS ?target)",
                    arg(args::CONTEXT)
                ),
                Step::Filter => format!(
                    " FILTER(!bound({0}) || eval({0}{1}))",
                    arg(args::FILTER),
                    values(&self.key.filters)
                ),
            };
            out.push_str(&text);
        }
        out.push_str(" }");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_sorted_and_deduplicated() {
        let key = TemplateKey::new(&[3, 1, 3], &[2, 10], 1);
        assert_eq!(key.to_string(), "1-3--2-10-1");
        assert_eq!(key, TemplateKey::new(&[1, 3], &[10, 2], 1));
    }

    #[test]
    fn filter_only_slots_get_no_default() {
        let template = Template::synthesize(TemplateKey::new(&[2], &[1], 1));
        assert_eq!(
            template.steps(),
            &[
                Step::Optional { slot: 1 },
                Step::DefaultBind { slot: 1 },
                Step::Optional { slot: 2 },
                Step::Mapping,
                Step::Target,
                Step::Filter,
            ]
        );
        let optional = |name: &str| {
            template
                .constraints()
                .iter()
                .find(|c| c.name == name)
                .map(|c| c.optional)
        };
        assert_eq!(optional("sourcePredicate1"), Some(false));
        assert_eq!(optional("sourcePredicate2"), Some(true));
        assert_eq!(optional("sourceDefaultValue2"), None);
    }

    #[test]
    fn render_marks_unbound_arguments() {
        let template = Template::synthesize(TemplateKey::new(&[], &[1], 1));
        let text = template.render(&|_| None);
        assert!(text.starts_with("CONSTRUCT { ?target ?targetPredicate1 ?result . } WHERE {"));
        assert!(text.contains("OPTIONAL { ?this ?sourcePredicate1 ?value1 }"));
        assert!(text.contains("BIND(eval(?expression, ?value1) AS ?result)"));
    }
}
