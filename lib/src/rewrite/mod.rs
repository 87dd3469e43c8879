//! Shape-driven query rewriting.
//!
//! The [`Rewriter`] walks the property constraints that can match the query,
//! in model order, and tries every rule of [`rules::default_rules`] against
//! each of them in turn. Passes repeat until one changes nothing or
//! [`RewriteConfig::max_iterations`] is reached.

mod bindings;
pub mod rule;
pub mod rules;

use std::fmt;
use std::str::FromStr;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::lookup::ConstraintIndex;
use crate::query::Query;
use crate::report::Validated;

pub use rule::{AppliedRewrite, RewriteRule, RuleContext, RuleKind, Transformed};

/// How much of the query a rule inspects before it fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewritePolicy {
    /// Rules fire only where validated data guarantees identical results:
    /// the subject must be bound to a target class of the shape, and
    /// cardinality and range implications are checked.
    #[default]
    Strict,
    /// Rules match by property path (or its local name) alone, and
    /// `maxCount` alone licenses making an OPTIONAL mandatory.
    Legacy,
}

impl FromStr for RewritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(RewritePolicy::Strict),
            "legacy" => Ok(RewritePolicy::Legacy),
            other => Err(format!(
                "unknown rewrite policy '{}', expected 'strict' or 'legacy'",
                other
            )),
        }
    }
}

impl fmt::Display for RewritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewritePolicy::Strict => f.write_str("strict"),
            RewritePolicy::Legacy => f.write_str("legacy"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    pub policy: RewritePolicy,
    /// Maximum number of passes over the candidate constraints.
    pub max_iterations: usize,
    /// Record the query text before and after each applied rule.
    pub enable_trace: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        RewriteConfig {
            policy: RewritePolicy::default(),
            max_iterations: 10,
            enable_trace: false,
        }
    }
}

impl RewriteConfig {
    pub fn with_policy(mut self, policy: RewritePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_trace(mut self, enable: bool) -> Self {
        self.enable_trace = enable;
        self
    }
}

/// Counters collected while rewriting one query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteStats {
    pub optionals_made_mandatory: u64,
    pub datatype_filters_removed: u64,
    pub lang_filters_removed: u64,
    pub aggregate_guards_removed: u64,
    pub iterations: u64,
}

impl RewriteStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_edits(&self) -> u64 {
        self.optionals_made_mandatory
            + self.datatype_filters_removed
            + self.lang_filters_removed
            + self.aggregate_guards_removed
    }

    fn record(&mut self, kind: RuleKind, edits: usize) {
        let edits = edits as u64;
        match kind {
            RuleKind::OptionalToMandatory => self.optionals_made_mandatory += edits,
            RuleKind::DatatypeFilter => self.datatype_filters_removed += edits,
            RuleKind::LangFilter => self.lang_filters_removed += edits,
            RuleKind::AggregateGuard => self.aggregate_guards_removed += edits,
        }
    }
}

/// The rewritten query with a record of how it was obtained.
#[derive(Debug, Clone)]
pub struct Rewrite {
    pub query: Query,
    pub applied: Vec<AppliedRewrite>,
    pub stats: RewriteStats,
}

impl Rewrite {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }

    /// Human-readable summary of the applied rules, with the query text
    /// before and after each one when it was traced.
    pub fn format_trace(&self) -> String {
        let mut output = format!(
            "Rewrite completed in {} iterations, {} rules applied\n",
            self.stats.iterations,
            self.applied.len()
        );
        for (i, applied) in self.applied.iter().enumerate() {
            output.push_str(&format!(
                "\n--- Rule {} applied: {} on {} ({} edit(s), shape {}) ---\n{}\n",
                i + 1,
                applied.rule,
                applied.path,
                applied.edits,
                applied.shape,
                applied.description
            ));
            if let (Some(before), Some(after)) = (&applied.before, &applied.after) {
                output.push_str("Before:\n");
                output.push_str(before);
                output.push_str("\nAfter:\n");
                output.push_str(after);
                output.push('\n');
            }
        }
        output
    }
}

/// Rewrites queries against a validated shape model.
pub struct Rewriter<'m> {
    index: ConstraintIndex<'m>,
    rules: Vec<Box<dyn RewriteRule>>,
    config: RewriteConfig,
}

impl<'m> Rewriter<'m> {
    pub fn new(validated: Validated<'m>, config: RewriteConfig) -> Self {
        Rewriter {
            index: ConstraintIndex::new(validated.model()),
            rules: rules::default_rules(),
            config,
        }
    }

    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    /// Returns the rewritten query; `query` itself is left untouched.
    pub fn rewrite(&self, query: &Query) -> Rewrite {
        let mut current = query.clone();
        let mut applied = Vec::new();
        let mut stats = RewriteStats::new();
        let mut iterations = 0;

        loop {
            if iterations >= self.config.max_iterations {
                debug!(
                    "Rewriter reached max iterations ({}), stopping",
                    self.config.max_iterations
                );
                break;
            }
            iterations += 1;
            let mut changed_this_iteration = false;

            for candidate in self.index.candidates(&current) {
                let context = RuleContext {
                    shape: candidate.shape,
                    constraint: candidate.constraint,
                    policy: self.config.policy,
                };
                for rule in &self.rules {
                    if !rule.licensed_by(candidate.constraint) {
                        continue;
                    }
                    let before = self.config.enable_trace.then(|| current.to_string());
                    let result = rule.apply(current, &context);
                    let edits = result.edits;
                    current = result.query;
                    if edits == 0 {
                        trace!("Rule '{}' found nothing to rewrite for {}", rule.name(), context.path());
                        continue;
                    }

                    debug!(
                        "Rule '{}' rewrote {} clause(s) for {} in iteration {}",
                        rule.name(),
                        edits,
                        context.path(),
                        iterations
                    );
                    changed_this_iteration = true;
                    stats.record(rule.kind(), edits);
                    applied.push(AppliedRewrite {
                        rule: rule.name(),
                        description: rule.description(),
                        kind: rule.kind(),
                        shape: candidate.shape.identifier().clone(),
                        path: context.path().clone(),
                        edits,
                        iteration: iterations,
                        before,
                        after: self.config.enable_trace.then(|| current.to_string()),
                    });
                }
            }

            if !changed_this_iteration {
                debug!("No changes in iteration {}, reached fixpoint", iterations);
                break;
            }
        }

        stats.iterations = iterations as u64;
        Rewrite {
            query: current,
            applied,
            stats,
        }
    }
}

/// Rewrites `query` with the default configuration.
pub fn rewrite(query: &Query, validated: Validated<'_>) -> Query {
    Rewriter::new(validated, RewriteConfig::default())
        .rewrite(query)
        .query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DataGraph;
    use crate::model::ShapeModel;
    use crate::validate::Validator;
    use super::rules::DatatypeFilter;

    const SHAPES: &str = r#"
        @prefix sh: <http://www.w3.org/ns/shacl#> .
        @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
        @prefix ex: <http://example.org/ns#> .

        ex:PersonShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:property [ sh:path ex:mbox ; sh:minCount 1 ; sh:maxCount 1 ; sh:datatype xsd:string ] .
    "#;

    const DATA: &str = r#"
        @prefix ex: <http://example.org/ns#> .
        ex:alice a ex:Person ; ex:mbox "alice@example.org" .
    "#;

    fn with_rewriter<T>(config: RewriteConfig, f: impl FnOnce(&Rewriter<'_>) -> T) -> T {
        let model = ShapeModel::from_turtle(SHAPES, None).unwrap();
        let data = DataGraph::from_turtle(DATA, None).unwrap();
        let report = Validator::new(&model).validate(&data).unwrap();
        let rewriter = Rewriter::new(report.validated().unwrap(), config);
        f(&rewriter)
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("strict".parse::<RewritePolicy>(), Ok(RewritePolicy::Strict));
        assert_eq!("Legacy".parse::<RewritePolicy>(), Ok(RewritePolicy::Legacy));
        assert!("lenient".parse::<RewritePolicy>().is_err());
        assert_eq!(RewritePolicy::default().to_string(), "strict");
    }

    #[test]
    fn test_config_builders() {
        let config = RewriteConfig::default()
            .with_policy(RewritePolicy::Legacy)
            .with_max_iterations(3)
            .with_trace(true);
        assert_eq!(config.policy, RewritePolicy::Legacy);
        assert_eq!(config.max_iterations, 3);
        assert!(config.enable_trace);
    }

    #[test]
    fn test_rewrite_reaches_fixpoint() {
        let query = Query::parse(
            "PREFIX ex: <http://example.org/ns#>\n\
             PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>\n\
             SELECT ?p ?m WHERE {\n  ?p a ex:Person .\n  OPTIONAL { ?p ex:mbox ?m }\n  \
             FILTER (datatype(?m) = xsd:string)\n}",
        )
        .unwrap();
        let rewrite = with_rewriter(RewriteConfig::default().with_trace(true), |r| r.rewrite(&query));

        assert_eq!(
            rewrite.query.to_string(),
            "PREFIX ex: <http://example.org/ns#>\n\
             PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>\n\
             SELECT ?p ?m WHERE {\n  ?p a ex:Person .\n  ?p ex:mbox ?m\n}"
        );
        assert_eq!(rewrite.stats.optionals_made_mandatory, 1);
        assert_eq!(rewrite.stats.datatype_filters_removed, 1);
        assert_eq!(rewrite.stats.iterations, 2);
        assert_eq!(rewrite.applied.len(), 2);
        assert!(rewrite.applied.iter().all(|a| a.before.is_some() && a.after.is_some()));
        let trace = rewrite.format_trace();
        assert!(trace.contains("DatatypeFilter"));
        assert!(trace.contains(DatatypeFilter.description()));
    }

    #[test]
    fn test_zero_iterations_leaves_query_alone() {
        let source = "PREFIX ex: <http://example.org/ns#>\n\
                      SELECT * WHERE { ?p a ex:Person . OPTIONAL { ?p ex:mbox ?m } }";
        let query = Query::parse(source).unwrap();
        let rewrite = with_rewriter(RewriteConfig::default().with_max_iterations(0), |r| {
            r.rewrite(&query)
        });
        assert!(!rewrite.changed());
        assert_eq!(rewrite.query.to_string(), source);
    }
}
