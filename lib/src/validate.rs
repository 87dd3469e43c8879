//! Checks a data graph against a shape model.
//!
//! Focus nodes are the instances of each shape's target classes, including
//! instances of their subclasses. Value ranges are compared with SPARQL
//! semantics; values that cannot be compared with the bound are violations.

use std::collections::HashMap;

use log::{debug, info};
use oxigraph::model::{Literal, NamedNode, Term, TermRef};

use crate::error::Result;
use crate::graph::DataGraph;
use crate::model::{NodeShape, PropertyConstraint, RangeKind, ShapeModel};
use crate::named_nodes::SHACL;
use crate::report::{ValidationReport, ValidationResult};

const VALUES_QUERY: &str = "PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
SELECT DISTINCT ?focus ?value WHERE {
  VALUES ?class { $classes }
  ?focus rdf:type/rdfs:subClassOf* ?class .
  OPTIONAL { ?focus $path ?value }
}";

pub struct Validator<'m> {
    model: &'m ShapeModel,
}

/// Value nodes of one property for each focus node, in first-seen order.
struct ValueNodes {
    focus_nodes: Vec<Term>,
    values: HashMap<Term, Vec<Term>>,
}

impl<'m> Validator<'m> {
    pub fn new(model: &'m ShapeModel) -> Self {
        Validator { model }
    }

    pub fn validate(&self, data: &DataGraph) -> Result<ValidationReport<'m>> {
        let mut results = Vec::new();
        let mut focus_nodes = 0;

        for shape in self.model.shapes() {
            if shape.target_classes().is_empty() {
                debug!("Shape {} has no target classes", shape.identifier());
                continue;
            }
            let mut shape_focus_nodes = 0;
            for constraint in shape.properties() {
                let value_nodes = self.value_nodes(data, shape, constraint.path())?;
                shape_focus_nodes = shape_focus_nodes.max(value_nodes.focus_nodes.len());
                for focus in &value_nodes.focus_nodes {
                    let values = value_nodes
                        .values
                        .get(focus)
                        .map(Vec::as_slice)
                        .unwrap_or(&[]);
                    check_constraint(data, shape, constraint, focus, values, &mut results)?;
                }
            }
            focus_nodes += shape_focus_nodes;
        }

        info!(
            "Validated {} focus nodes: {} violation(s)",
            focus_nodes,
            results.len()
        );
        Ok(ValidationReport::new(self.model, results, focus_nodes))
    }

    fn value_nodes(&self, data: &DataGraph, shape: &NodeShape, path: &NamedNode) -> Result<ValueNodes> {
        let classes: Vec<String> = shape.target_classes().iter().map(|c| c.to_string()).collect();
        let query = VALUES_QUERY
            .replace("$classes", &classes.join(" "))
            .replace("$path", &path.to_string());

        let mut value_nodes = ValueNodes {
            focus_nodes: Vec::new(),
            values: HashMap::new(),
        };
        for row in data.execute_str(&query)? {
            let Some(focus) = row.get("focus") else {
                continue;
            };
            let values = value_nodes.values.entry(focus.clone()).or_insert_with(|| {
                value_nodes.focus_nodes.push(focus.clone());
                Vec::new()
            });
            if let Some(value) = row.get("value") {
                values.push(value.clone());
            }
        }
        Ok(value_nodes)
    }
}

fn check_constraint(
    data: &DataGraph,
    shape: &NodeShape,
    constraint: &PropertyConstraint,
    focus: &Term,
    values: &[Term],
    results: &mut Vec<ValidationResult>,
) -> Result<()> {
    let sh = SHACL::new();
    let mut fail = |component: NamedNode, value: Option<&Term>, message: String| {
        results.push(ValidationResult {
            focus_node: focus.clone(),
            path: constraint.path().clone(),
            source_shape: shape.identifier().clone(),
            source_constraint_component: component,
            value: value.cloned(),
            message,
        });
    };

    let count = values.len() as u64;
    if let Some(min) = constraint.min_count() {
        if count < min {
            fail(
                sh.min_count_component.into_owned(),
                None,
                format!(
                    "Value count ({}) does not meet minimum requirement: {}",
                    count, min
                ),
            );
        }
    }
    if let Some(max) = constraint.max_count() {
        if count > max {
            fail(
                sh.max_count_component.into_owned(),
                None,
                format!("Value count ({}) exceeds maximum requirement: {}", count, max),
            );
        }
    }

    if let Some(datatype) = constraint.datatype() {
        for value in values {
            match value.as_ref() {
                TermRef::Literal(literal) if literal.datatype() == datatype.as_ref() => {}
                TermRef::Literal(_) => fail(
                    sh.datatype_component.into_owned(),
                    Some(value),
                    format!("Value {} does not have datatype {}", value, datatype),
                ),
                _ => fail(
                    sh.datatype_component.into_owned(),
                    Some(value),
                    format!("Value {} is not a literal, expected datatype {}", value, datatype),
                ),
            }
        }
    }

    let declared_range: Vec<String> = constraint.lang_matches().map(str::to_string).into_iter().collect();
    let language_checks = [
        (constraint.language_in(), sh.language_in_component),
        (declared_range.as_slice(), sh.lang_matches_component),
    ];
    for (ranges, component) in language_checks {
        if ranges.is_empty() {
            continue;
        }
        for value in values {
            let tag = match value.as_ref() {
                TermRef::Literal(literal) => literal.language().unwrap_or(""),
                _ => "",
            };
            if !ranges.iter().any(|range| lang_matches(tag, range)) {
                fail(
                    component.into_owned(),
                    Some(value),
                    format!(
                        "Language tag '{}' of value {} is not in [{}]",
                        tag,
                        value,
                        ranges.join(", ")
                    ),
                );
            }
        }
    }

    for kind in RangeKind::ALL {
        let Some(bound) = constraint.range(kind) else {
            continue;
        };
        let (operator, component, relation) = match kind {
            RangeKind::MinExclusive => ("<", sh.min_exclusive_component, "exclusively greater than"),
            RangeKind::MinInclusive => ("<=", sh.min_inclusive_component, "greater than or equal to"),
            RangeKind::MaxExclusive => (">", sh.max_exclusive_component, "exclusively less than"),
            RangeKind::MaxInclusive => (">=", sh.max_inclusive_component, "less than or equal to"),
        };
        for value in values {
            if !in_range(data, bound, operator, value)? {
                fail(
                    component.into_owned(),
                    Some(value),
                    format!("Value {} is not {} {}", value, relation, bound),
                );
            }
        }
    }
    Ok(())
}

/// Evaluates `bound operator value` with SPARQL comparison semantics.
///
/// An incomparable pair is a type error inside the `FILTER`, which makes the
/// `ASK` false. Store and evaluation failures are returned.
fn in_range(data: &DataGraph, bound: &Literal, operator: &str, value: &Term) -> Result<bool> {
    if !matches!(value, Term::Literal(_)) {
        return Ok(false);
    }
    data.ask(&format!("ASK {{ FILTER({} {} {}) }}", bound, operator, value))
}

/// SPARQL `langMatches` on a language tag and a basic language range.
pub(crate) fn lang_matches(tag: &str, range: &str) -> bool {
    if range == "*" {
        return !tag.is_empty();
    }
    let tag = tag.to_lowercase();
    let range = range.to_lowercase();
    tag == range || tag.starts_with(&format!("{}-", range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::named_nodes::local_name;

    const SHAPES: &str = r#"
        @prefix sh: <http://www.w3.org/ns/shacl#> .
        @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
        @prefix ex: <http://example.org/ns#> .

        ex:PersonShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:property [ sh:path ex:mbox ; sh:minCount 1 ; sh:maxCount 1 ; sh:datatype xsd:string ] ;
            sh:property [ sh:path ex:age ; sh:minInclusive 0 ; sh:maxExclusive 150 ] ;
            sh:property [ sh:path ex:bio ; sh:languageIn ( "en" ) ] .
    "#;

    const PREFIXES: &str = "@prefix ex: <http://example.org/ns#> .\n\
                            @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .\n";

    fn validate(data: &str) -> (ShapeModel, Vec<ValidationResult>) {
        let model = ShapeModel::from_turtle(SHAPES, None).unwrap();
        let graph = DataGraph::from_turtle(&format!("{}{}", PREFIXES, data), None).unwrap();
        let results = Validator::new(&model)
            .validate(&graph)
            .unwrap()
            .results()
            .to_vec();
        (model, results)
    }

    /// Local names of the violated components, sorted.
    fn components(results: &[ValidationResult]) -> Vec<&str> {
        let mut names: Vec<&str> = results
            .iter()
            .map(|r| local_name(r.source_constraint_component.as_str()))
            .collect();
        names.sort_unstable();
        names
    }

    #[test]
    fn conforming_data_yields_marker() {
        let model = ShapeModel::from_turtle(SHAPES, None).unwrap();
        let graph = DataGraph::from_turtle(
            &format!(
                "{}ex:alice a ex:Person ; ex:mbox \"a@x\" ; ex:age 30 ; ex:bio \"hi\"@en-GB .",
                PREFIXES
            ),
            None,
        )
        .unwrap();
        let report = Validator::new(&model).validate(&graph).unwrap();
        assert!(report.conforms(), "{}", report);
        assert_eq!(report.focus_nodes(), 1);
        let validated = report.validated().unwrap();
        assert!(std::ptr::eq(validated.model(), &model));
    }

    #[test]
    fn cardinality_violations() {
        let (_, results) = validate("ex:a a ex:Person .\nex:b a ex:Person ; ex:mbox \"1\", \"2\" .");
        assert_eq!(
            components(&results),
            vec!["MaxCountConstraintComponent", "MinCountConstraintComponent"]
        );
    }

    #[test]
    fn datatype_violations() {
        let (_, results) = validate("ex:a a ex:Person ; ex:mbox 42 .\nex:b a ex:Person ; ex:mbox ex:x .");
        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .all(|r| r.source_constraint_component.as_str().ends_with("DatatypeConstraintComponent")));
    }

    #[test]
    fn range_violations_include_incomparable_values() {
        let (_, results) = validate(
            "ex:a a ex:Person ; ex:mbox \"a\" ; ex:age -1 .\n\
             ex:b a ex:Person ; ex:mbox \"b\" ; ex:age 150 .\n\
             ex:c a ex:Person ; ex:mbox \"c\" ; ex:age \"old\" .",
        );
        assert_eq!(
            components(&results),
            vec![
                "MaxExclusiveConstraintComponent",
                "MaxExclusiveConstraintComponent",
                "MinInclusiveConstraintComponent",
                "MinInclusiveConstraintComponent",
            ]
        );
    }

    #[test]
    fn language_violations() {
        let (_, results) = validate("ex:a a ex:Person ; ex:mbox \"a\" ; ex:bio \"salut\"@fr, \"plain\" .");
        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .all(|r| r.source_constraint_component.as_str().ends_with("LanguageInConstraintComponent")));
    }

    #[test]
    fn declared_lang_matches_is_checked_beside_language_in() {
        let shapes = r#"
            @prefix sh: <http://www.w3.org/ns/shacl#> .
            @prefix ex: <http://example.org/ns#> .
            ex:NoteShape a sh:NodeShape ;
                sh:targetClass ex:Note ;
                sh:property [ sh:path ex:text ; sh:langMatches "en" ; sh:languageIn ( "en" "fr" ) ] .
        "#;
        let model = ShapeModel::from_turtle(shapes, None).unwrap();
        let graph = DataGraph::from_turtle(
            &format!(
                "{}ex:n1 a ex:Note ; ex:text \"hallo\"@de .\nex:n2 a ex:Note ; ex:text \"salut\"@fr .",
                PREFIXES
            ),
            None,
        )
        .unwrap();
        let report = Validator::new(&model).validate(&graph).unwrap();
        assert_eq!(
            components(report.results()),
            vec![
                "LangMatchesConstraintComponent",
                "LangMatchesConstraintComponent",
                "LanguageInConstraintComponent",
            ]
        );
    }

    #[test]
    fn subclass_instances_are_focus_nodes() {
        let (_, results) = validate("ex:Student rdfs:subClassOf ex:Person .\nex:s a ex:Student .");
        assert_eq!(results.len(), 1);
        assert!(results[0].message.contains("minimum"));
    }

    #[test]
    fn non_conforming_report_refuses_marker() {
        let model = ShapeModel::from_turtle(SHAPES, None).unwrap();
        let graph = DataGraph::from_turtle(&format!("{}ex:a a ex:Person .", PREFIXES), None).unwrap();
        let report = Validator::new(&model).validate(&graph).unwrap();
        assert!(!report.conforms());
        assert!(matches!(
            report.validated(),
            Err(Error::NonConforming { violations: 1 })
        ));
    }

    #[test]
    fn lang_matches_follows_basic_filtering() {
        assert!(lang_matches("en-GB", "en"));
        assert!(lang_matches("EN", "en"));
        assert!(!lang_matches("eng", "en"));
        assert!(lang_matches("fr", "*"));
        assert!(!lang_matches("", "*"));
    }
}
