use crate::model::{Term, Triple};

use super::Graph;

/// Read-only view over several graphs.
///
/// Components are searched in order and results are concatenated without
/// deduplication; a triple present in two components is yielded twice.
#[derive(Clone, Default)]
pub struct UnionGraph<'a> {
    components: Vec<&'a dyn Graph>,
}

impl<'a> UnionGraph<'a> {
    pub fn new(components: Vec<&'a dyn Graph>) -> Self {
        Self { components }
    }

    pub fn push(&mut self, graph: &'a dyn Graph) {
        self.components.push(graph);
    }

    pub fn components(&self) -> usize {
        self.components.len()
    }
}

impl Graph for UnionGraph<'_> {
    fn find<'b>(
        &'b self,
        subject: Option<&Term>,
        predicate: Option<&Term>,
        object: Option<&Term>,
    ) -> Box<dyn Iterator<Item = Triple> + 'b> {
        let parts: Vec<_> = self
            .components
            .iter()
            .map(|g| g.find(subject, predicate, object))
            .collect();
        Box::new(parts.into_iter().flatten())
    }

    fn len(&self) -> usize {
        self.components.iter().map(|g| g.len()).sum()
    }

    fn contains(&self, triple: &Triple) -> bool {
        self.components.iter().any(|g| g.contains(triple))
    }
}
