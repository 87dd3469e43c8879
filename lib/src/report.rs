use std::collections::HashMap;
use std::fmt;

use oxigraph::model::{NamedNode, Term};
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::model::ShapeModel;

/// Proof that a shape model was validated against a data graph and the data
/// conformed. Only obtainable from [`ValidationReport::validated`].
#[derive(Debug, Clone, Copy)]
pub struct Validated<'m> {
    model: &'m ShapeModel,
}

impl<'m> Validated<'m> {
    pub fn model(&self) -> &'m ShapeModel {
        self.model
    }
}

/// One violated constraint for one focus node.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub focus_node: Term,
    pub path: NamedNode,
    /// Identifier of the node shape declaring the constraint
    pub source_shape: Term,
    pub source_constraint_component: NamedNode,
    pub value: Option<Term>,
    pub message: String,
}

pub struct ValidationReport<'m> {
    model: &'m ShapeModel,
    results: Vec<ValidationResult>,
    focus_nodes: usize,
}

impl<'m> ValidationReport<'m> {
    pub(crate) fn new(
        model: &'m ShapeModel,
        results: Vec<ValidationResult>,
        focus_nodes: usize,
    ) -> Self {
        ValidationReport {
            model,
            results,
            focus_nodes,
        }
    }

    pub fn conforms(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    /// Number of distinct (shape, focus node) pairs that were checked.
    pub fn focus_nodes(&self) -> usize {
        self.focus_nodes
    }

    /// The conformance marker that licenses rewriting, or
    /// [`Error::NonConforming`] when any constraint was violated.
    pub fn validated(&self) -> Result<Validated<'m>> {
        if self.conforms() {
            Ok(Validated { model: self.model })
        } else {
            Err(Error::NonConforming {
                violations: self.results.len(),
            })
        }
    }

    pub fn to_json(&self) -> Value {
        let results: Vec<Value> = self
            .results
            .iter()
            .map(|r| {
                json!({
                    "focusNode": r.focus_node.to_string(),
                    "resultPath": r.path.as_str(),
                    "sourceShape": r.source_shape.to_string(),
                    "sourceConstraintComponent": r.source_constraint_component.as_str(),
                    "value": r.value.as_ref().map(|v| v.to_string()),
                    "message": r.message,
                })
            })
            .collect();
        json!({
            "conforms": self.conforms(),
            "focusNodes": self.focus_nodes,
            "results": results,
        })
    }
}

impl fmt::Display for ValidationReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.results.is_empty() {
            return writeln!(f, "Validation report: No errors found.");
        }

        writeln!(f, "Validation Report:")?;
        writeln!(f, "------------------")?;

        // Group by focus node, keeping first-seen order.
        let mut order: Vec<&Term> = Vec::new();
        let mut grouped: HashMap<&Term, Vec<&ValidationResult>> = HashMap::new();
        for result in &self.results {
            if !grouped.contains_key(&result.focus_node) {
                order.push(&result.focus_node);
            }
            grouped.entry(&result.focus_node).or_default().push(result);
        }

        for focus_node in order {
            writeln!(f, "\nFocus Node: {}", focus_node)?;
            for result in grouped.get(focus_node).into_iter().flatten() {
                writeln!(f, "  - Error: {}", result.message)?;
                writeln!(f, "    Path: {}", result.path)?;
                writeln!(f, "    From shape: {}", result.source_shape)?;
            }
        }
        write!(f, "\n------------------")
    }
}
