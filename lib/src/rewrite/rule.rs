//! The rewrite rule abstraction and per-application trace records.

use oxigraph::model::{NamedNode, Term};
use serde::Serialize;

use crate::model::{NodeShape, PropertyConstraint};
use crate::query::Query;

use super::RewritePolicy;

/// A structural edit licensed by one feature of a property constraint.
///
/// A rule must only remove or weaken clauses whose effect on the results is
/// already guaranteed by validated data: on a conforming data graph the
/// rewritten query returns the same multiset of rows as the input query.
pub trait RewriteRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str {
        "No description available"
    }

    fn kind(&self) -> RuleKind;

    /// Whether the constraint declares the feature this rule relies on.
    fn licensed_by(&self, constraint: &PropertyConstraint) -> bool;

    /// Apply this rule for one constraint. Returns the query unchanged when
    /// nothing matches.
    fn apply(&self, query: Query, context: &RuleContext<'_>) -> Transformed;
}

/// The constraint a rule is applied for.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub shape: &'a NodeShape,
    pub constraint: &'a PropertyConstraint,
    pub policy: RewritePolicy,
}

impl RuleContext<'_> {
    pub fn path(&self) -> &NamedNode {
        self.constraint.path()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleKind {
    OptionalToMandatory,
    DatatypeFilter,
    LangFilter,
    AggregateGuard,
}

/// The result of applying a rule.
#[derive(Debug, Clone)]
pub struct Transformed {
    pub query: Query,
    /// Number of clauses edited or removed
    pub edits: usize,
}

impl Transformed {
    pub fn yes(query: Query, edits: usize) -> Self {
        Transformed { query, edits }
    }

    pub fn no(query: Query) -> Self {
        Transformed { query, edits: 0 }
    }

    pub fn changed(&self) -> bool {
        self.edits > 0
    }
}

/// One rule application that changed the query.
#[derive(Debug, Clone)]
pub struct AppliedRewrite {
    pub rule: &'static str,
    pub description: &'static str,
    pub kind: RuleKind,
    pub shape: Term,
    pub path: NamedNode,
    pub edits: usize,
    pub iteration: usize,
    /// Query text before and after the rule, when tracing is enabled.
    pub before: Option<String>,
    pub after: Option<String>,
}
