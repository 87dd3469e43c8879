//! The rewrite rule catalogue, in application order.

use std::cmp::Ordering;

use oxigraph::model::Literal;

use crate::model::shapes::compare_numeric;
use crate::model::{PropertyConstraint, RangeKind};
use crate::named_nodes::local_name;
use crate::query::{AggregateGuard, Clause, ClauseKind, CompareOp, FilterCondition, Modifier, Query};
use crate::validate::lang_matches;

use super::bindings::Bindings;
use super::rule::{RewriteRule, RuleContext, RuleKind, Transformed};
use super::RewritePolicy;

/// Every rule, in the order they are tried for each constraint.
pub fn default_rules() -> Vec<Box<dyn RewriteRule>> {
    vec![
        Box::new(OptionalToMandatory::new(Cardinality::Both)),
        Box::new(DatatypeFilter),
        Box::new(LangFilter),
        Box::new(OptionalToMandatory::new(Cardinality::Max)),
        Box::new(OptionalToMandatory::new(Cardinality::Min)),
        Box::new(AggregateGuardRule::new(RangeKind::MinExclusive)),
        Box::new(AggregateGuardRule::new(RangeKind::MinInclusive)),
        Box::new(AggregateGuardRule::new(RangeKind::MaxExclusive)),
        Box::new(AggregateGuardRule::new(RangeKind::MaxInclusive)),
    ]
}

// A zero count declares nothing.
fn has_min_count(constraint: &PropertyConstraint) -> bool {
    constraint.min_count().is_some_and(|n| n > 0)
}

fn has_max_count(constraint: &PropertyConstraint) -> bool {
    constraint.max_count().is_some_and(|n| n > 0)
}

/// Removes the top-level clauses at the given (ascending) indices.
fn remove_clauses(query: &mut Query, indices: &[usize]) {
    let mut index = 0;
    query.pattern.clauses.retain(|_| {
        let keep = indices.binary_search(&index).is_err();
        index += 1;
        keep
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Both,
    Max,
    Min,
}

/// `OPTIONAL { ?s P ?o }` becomes the mandatory triple `?s P ?o`.
pub struct OptionalToMandatory {
    cardinality: Cardinality,
}

impl OptionalToMandatory {
    pub fn new(cardinality: Cardinality) -> Self {
        OptionalToMandatory { cardinality }
    }
}

impl RewriteRule for OptionalToMandatory {
    fn name(&self) -> &'static str {
        match self.cardinality {
            Cardinality::Both => "OptionalToMandatory(minCount+maxCount)",
            Cardinality::Max => "OptionalToMandatory(maxCount)",
            Cardinality::Min => "OptionalToMandatory(minCount)",
        }
    }

    fn description(&self) -> &'static str {
        "Turns a single-triple OPTIONAL on a property every focus node has into a mandatory triple"
    }

    fn kind(&self) -> RuleKind {
        RuleKind::OptionalToMandatory
    }

    fn licensed_by(&self, constraint: &PropertyConstraint) -> bool {
        match self.cardinality {
            Cardinality::Both => has_min_count(constraint) && has_max_count(constraint),
            Cardinality::Max => has_max_count(constraint),
            Cardinality::Min => has_min_count(constraint),
        }
    }

    fn apply(&self, mut query: Query, context: &RuleContext<'_>) -> Transformed {
        // Without a minimum count the OPTIONAL may be what keeps a row alive.
        if context.policy == RewritePolicy::Strict && !has_min_count(context.constraint) {
            return Transformed::no(query);
        }

        let mut replacements = Vec::new();
        let bindings = Bindings::new(&query);
        for (index, clause) in query.clauses().iter().enumerate() {
            let ClauseKind::Optional(optional) = clause.kind() else {
                continue;
            };
            let Some(triple) = optional.single_triple() else {
                continue;
            };
            if triple.predicate().as_iri() != Some(context.path()) {
                continue;
            }
            let (Some(subject), Some(object)) =
                (triple.subject().as_variable(), triple.object().as_variable())
            else {
                continue;
            };
            if context.policy == RewritePolicy::Strict
                && (subject == object
                    || !bindings.is_class_bound(subject, context.shape, index)
                    || bindings.bound_before(object, index))
            {
                continue;
            }

            // The combined rule keeps whatever terminator followed the group;
            // the single-count rules always emit one.
            let terminated = match self.cardinality {
                Cardinality::Both => optional.terminated,
                Cardinality::Max | Cardinality::Min => true,
            };
            let replacement = Clause::mandatory_triple(clause.leading.clone(), triple.clone(), terminated);
            replacements.push((index, replacement));
        }

        if replacements.is_empty() {
            return Transformed::no(query);
        }
        let edits = replacements.len();
        for (index, replacement) in replacements {
            query.pattern.clauses[index] = replacement;
        }
        Transformed::yes(query, edits)
    }
}

/// Deletes `FILTER (datatype(?o) = D)` when the constraint declares `D`.
pub struct DatatypeFilter;

impl RewriteRule for DatatypeFilter {
    fn name(&self) -> &'static str {
        "DatatypeFilter"
    }

    fn description(&self) -> &'static str {
        "Removes a datatype test every value of the property already passes"
    }

    fn kind(&self) -> RuleKind {
        RuleKind::DatatypeFilter
    }

    fn licensed_by(&self, constraint: &PropertyConstraint) -> bool {
        constraint.datatype().is_some()
    }

    fn apply(&self, mut query: Query, context: &RuleContext<'_>) -> Transformed {
        let Some(declared) = context.constraint.datatype() else {
            return Transformed::no(query);
        };
        let matches = filter_indices(&query, context, |condition| match condition {
            FilterCondition::Datatype { variable, datatype } if datatype == declared => {
                Some(variable)
            }
            _ => None,
        });
        if matches.is_empty() {
            return Transformed::no(query);
        }
        remove_clauses(&mut query, &matches);
        Transformed::yes(query, matches.len())
    }
}

/// Deletes `FILTER (langMatches(lang(?o), "R"))` when the constraint's
/// language range implies `R`.
pub struct LangFilter;

impl LangFilter {
    fn implies(declared: &str, range: &str, policy: RewritePolicy) -> bool {
        match policy {
            RewritePolicy::Legacy => declared.eq_ignore_ascii_case(range),
            RewritePolicy::Strict if declared == "*" => range == "*",
            RewritePolicy::Strict => lang_matches(declared, range),
        }
    }
}

impl RewriteRule for LangFilter {
    fn name(&self) -> &'static str {
        "LangFilter"
    }

    fn description(&self) -> &'static str {
        "Removes a language test every value of the property already passes"
    }

    fn kind(&self) -> RuleKind {
        RuleKind::LangFilter
    }

    fn licensed_by(&self, constraint: &PropertyConstraint) -> bool {
        constraint.lang_guarantee().is_some()
    }

    fn apply(&self, mut query: Query, context: &RuleContext<'_>) -> Transformed {
        let Some(declared) = context.constraint.lang_guarantee() else {
            return Transformed::no(query);
        };
        let matches = filter_indices(&query, context, |condition| match condition {
            FilterCondition::LangMatches { variable, range }
                if LangFilter::implies(declared, range, context.policy) =>
            {
                Some(variable)
            }
            _ => None,
        });
        if matches.is_empty() {
            return Transformed::no(query);
        }
        remove_clauses(&mut query, &matches);
        Transformed::yes(query, matches.len())
    }
}

/// Indices of the filter clauses that `select` accepts and whose tested
/// variable holds values of the constraint's path.
fn filter_indices<'q, F>(query: &'q Query, context: &RuleContext<'_>, select: F) -> Vec<usize>
where
    F: Fn(&'q FilterCondition) -> Option<&'q oxigraph::model::Variable>,
{
    let bindings = Bindings::new(query);
    let mut indices = Vec::new();
    for (index, clause) in query.clauses().iter().enumerate() {
        let ClauseKind::Filter(filter) = clause.kind() else {
            continue;
        };
        let Some(variable) = select(filter.condition()) else {
            continue;
        };
        let holds_values = match context.policy {
            RewritePolicy::Strict => bindings.binds_value_of(context.shape, context.path(), variable),
            RewritePolicy::Legacy => query.triple_patterns().iter().any(|triple| {
                triple.predicate().as_iri() == Some(context.path())
                    && triple.object().as_variable() == Some(variable)
            }),
        };
        if holds_values {
            indices.push(index);
        }
    }
    indices
}

/// Deletes `HAVING (min(?v) op c)` when a value range of the property whose
/// local name is `v` already guarantees it.
pub struct AggregateGuardRule {
    range: RangeKind,
}

impl AggregateGuardRule {
    pub fn new(range: RangeKind) -> Self {
        AggregateGuardRule { range }
    }

    fn operator(&self) -> CompareOp {
        match self.range {
            RangeKind::MinExclusive => CompareOp::Gt,
            RangeKind::MinInclusive => CompareOp::Ge,
            RangeKind::MaxExclusive => CompareOp::Lt,
            RangeKind::MaxInclusive => CompareOp::Le,
        }
    }

    /// True when every value within the declared range passes the guard.
    /// Bounds that do not compare exactly never imply anything.
    fn implied(&self, declared: &Literal, guard: &AggregateGuard) -> bool {
        let Some(order) = compare_numeric(declared, guard.bound()) else {
            return false;
        };
        match self.range {
            RangeKind::MinExclusive | RangeKind::MinInclusive => order != Ordering::Less,
            RangeKind::MaxExclusive | RangeKind::MaxInclusive => order != Ordering::Greater,
        }
    }

    fn deletes(&self, query: &Query, context: &RuleContext<'_>, guard: &AggregateGuard) -> bool {
        if guard.op() != self.operator()
            || guard.variable().as_str() != local_name(context.path().as_str())
        {
            return false;
        }
        match context.policy {
            RewritePolicy::Legacy => true,
            RewritePolicy::Strict => {
                query.has_group_by()
                    && context
                        .constraint
                        .range(self.range)
                        .is_some_and(|declared| self.implied(declared, guard))
                    && Bindings::new(query).binds_value_of(
                        context.shape,
                        context.path(),
                        guard.variable(),
                    )
            }
        }
    }
}

impl RewriteRule for AggregateGuardRule {
    fn name(&self) -> &'static str {
        match self.range {
            RangeKind::MinExclusive => "AggregateGuard(minExclusive)",
            RangeKind::MinInclusive => "AggregateGuard(minInclusive)",
            RangeKind::MaxExclusive => "AggregateGuard(maxExclusive)",
            RangeKind::MaxInclusive => "AggregateGuard(maxInclusive)",
        }
    }

    fn description(&self) -> &'static str {
        "Removes a HAVING bound on min(?v) that the declared value range already enforces"
    }

    fn kind(&self) -> RuleKind {
        RuleKind::AggregateGuard
    }

    fn licensed_by(&self, constraint: &PropertyConstraint) -> bool {
        constraint.range(self.range).is_some()
    }

    fn apply(&self, mut query: Query, context: &RuleContext<'_>) -> Transformed {
        // (modifier index, constraint index) pairs to delete
        let mut doomed = Vec::new();
        for (m, modifier) in query.modifiers().iter().enumerate() {
            let Modifier::Having(having) = modifier else {
                continue;
            };
            for (c, constraint) in having.constraints().iter().enumerate() {
                if constraint
                    .guard()
                    .is_some_and(|guard| self.deletes(&query, context, guard))
                {
                    doomed.push((m, c));
                }
            }
        }
        if doomed.is_empty() {
            return Transformed::no(query);
        }

        let edits = doomed.len();
        for (m, modifier) in query.modifiers.iter_mut().enumerate() {
            if let Modifier::Having(having) = modifier {
                let mut c = 0;
                having.constraints.retain(|_| {
                    let keep = !doomed.contains(&(m, c));
                    c += 1;
                    keep
                });
            }
        }
        // A HAVING with nothing left goes with its last constraint.
        query
            .modifiers
            .retain(|m| !matches!(m, Modifier::Having(having) if having.constraints.is_empty()));
        Transformed::yes(query, edits)
    }
}
