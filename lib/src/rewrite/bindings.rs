//! Which variables the clauses of a group pattern are guaranteed to bind.

use oxigraph::model::{NamedNode, Variable};

use crate::model::NodeShape;
use crate::query::{Clause, ClauseKind, Query, TriplePattern};

/// Read-only view over the top-level clauses of a query.
pub(crate) struct Bindings<'q> {
    clauses: &'q [Clause],
}

impl<'q> Bindings<'q> {
    pub(crate) fn new(query: &'q Query) -> Self {
        Bindings {
            clauses: query.clauses(),
        }
    }

    /// Mandatory triple patterns with the index of their clause.
    fn mandatory_triples(&self) -> impl Iterator<Item = (usize, &'q TriplePattern)> + 'q {
        let clauses = self.clauses;
        clauses
            .iter()
            .enumerate()
            .flat_map(|(i, clause)| {
                let triples: &'q [TriplePattern] = match clause.kind() {
                    ClauseKind::Triples(block) => block.triples(),
                    _ => &[],
                };
                triples.iter().map(move |t| (i, t))
            })
    }

    /// True when a mandatory `variable rdf:type C` appears in a clause before
    /// `before`, for some target class `C` of `shape`.
    pub(crate) fn is_class_bound(&self, variable: &Variable, shape: &NodeShape, before: usize) -> bool {
        self.mandatory_triples()
            .take_while(|(i, _)| *i < before)
            .any(|(_, triple)| {
                shape
                    .target_classes()
                    .iter()
                    .any(|class| triple.is_type_assertion(variable, class))
            })
    }

    /// True when some clause before `before` can bind `variable`.
    pub(crate) fn bound_before(&self, variable: &Variable, before: usize) -> bool {
        self.clauses[..before.min(self.clauses.len())]
            .iter()
            .any(|clause| clause.mentions(variable))
    }

    /// True when a mandatory `S path object` triple exists whose subject is a
    /// class-bound variable of `shape`.
    pub(crate) fn binds_value_of(&self, shape: &NodeShape, path: &NamedNode, object: &Variable) -> bool {
        self.mandatory_triples().any(|(_, triple)| {
            triple.predicate().as_iri() == Some(path)
                && triple.object().as_variable() == Some(object)
                && triple
                    .subject()
                    .as_variable()
                    .is_some_and(|s| self.is_class_bound(s, shape, self.clauses.len()))
        })
    }
}
