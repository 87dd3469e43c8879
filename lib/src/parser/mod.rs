//! Reads a SHACL shapes graph (Turtle) into a [`ShapeModel`].

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use log::{debug, info, warn};
use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{Literal, NamedNode, NamedNodeRef, Subject, Term};
use url::Url;

use crate::error::{ConstraintParseError, Error};
use crate::model::{NodeShape, PropertyConstraint, ShapeModel};
use crate::named_nodes::{RDF, SHACL};

impl ShapeModel {
    /// Parses Turtle shapes text. `base_iri` resolves relative IRIs, if any.
    pub fn from_turtle(text: &str, base_iri: Option<&str>) -> Result<Self, ConstraintParseError> {
        let graph = ShapesGraph::parse(text, base_iri)?;
        graph.into_model()
    }

    /// Reads and parses a Turtle shapes file, using its `file:` URL as base IRI.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        let base = path
            .canonicalize()
            .ok()
            .and_then(|p| Url::from_file_path(p).ok())
            .map(|u| u.to_string());
        info!("Loading shapes from {}", path.display());
        Ok(Self::from_turtle(&text, base.as_deref())?)
    }
}

/// Triples of the shapes graph grouped by subject then predicate, keeping
/// document order within each group.
struct ShapesGraph {
    by_subject: HashMap<Subject, HashMap<NamedNode, Vec<Term>>>,
    /// Subjects typed `sh:NodeShape`, in order of first declaration.
    node_shapes: Vec<Subject>,
}

impl ShapesGraph {
    fn parse(text: &str, base_iri: Option<&str>) -> Result<Self, ConstraintParseError> {
        let mut parser = RdfParser::from_format(RdfFormat::Turtle);
        if let Some(base) = base_iri {
            parser = parser.with_base_iri(base).map_err(|e| {
                ConstraintParseError::new(format!("invalid base IRI <{}>: {}", base, e))
            })?;
        }

        let rdf = RDF::new();
        let shacl = SHACL::new();
        let mut by_subject: HashMap<Subject, HashMap<NamedNode, Vec<Term>>> = HashMap::new();
        let mut node_shapes = Vec::new();

        for quad in parser.for_reader(Cursor::new(text.as_bytes())) {
            let quad = quad.map_err(|e| ConstraintParseError::new(e.to_string()))?;
            if quad.predicate.as_ref() == rdf.type_
                && quad.object == Term::from(shacl.node_shape)
                && !node_shapes.contains(&quad.subject)
            {
                node_shapes.push(quad.subject.clone());
            }
            by_subject
                .entry(quad.subject)
                .or_default()
                .entry(quad.predicate)
                .or_default()
                .push(quad.object);
        }

        Ok(ShapesGraph {
            by_subject,
            node_shapes,
        })
    }

    fn objects(&self, subject: &Subject, predicate: NamedNodeRef<'_>) -> &[Term] {
        self.by_subject
            .get(subject)
            .and_then(|preds| preds.get(&predicate.into_owned()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn single(
        &self,
        subject: &Subject,
        predicate: NamedNodeRef<'_>,
    ) -> Result<Option<&Term>, ConstraintParseError> {
        match self.objects(subject, predicate) {
            [] => Ok(None),
            [value] => Ok(Some(value)),
            _ => Err(ConstraintParseError::new(format!(
                "{} has more than one value for <{}>",
                subject,
                predicate.as_str()
            ))),
        }
    }

    fn into_model(self) -> Result<ShapeModel, ConstraintParseError> {
        let shacl = SHACL::new();
        let mut shapes = Vec::with_capacity(self.node_shapes.len());

        for shape_subject in &self.node_shapes {
            let mut target_classes = Vec::new();
            for target in self.objects(shape_subject, shacl.target_class) {
                match target {
                    Term::NamedNode(class) => target_classes.push(class.clone()),
                    other => {
                        return Err(ConstraintParseError::new(format!(
                            "sh:targetClass of {} must be an IRI, found {}",
                            shape_subject, other
                        )))
                    }
                }
            }

            let mut properties = Vec::new();
            for property in self.objects(shape_subject, shacl.property) {
                let property_subject = to_subject(property).ok_or_else(|| {
                    ConstraintParseError::new(format!(
                        "sh:property of {} must be an IRI or blank node, found {}",
                        shape_subject, property
                    ))
                })?;
                if let Some(constraint) = self.parse_property(&property_subject)? {
                    properties.push(constraint);
                }
            }

            debug!(
                "Parsed node shape {} with {} target class(es) and {} property constraint(s)",
                shape_subject,
                target_classes.len(),
                properties.len()
            );
            shapes.push(NodeShape::new(
                subject_to_term(shape_subject),
                target_classes,
                properties,
            ));
        }

        info!("Loaded {} node shape(s)", shapes.len());
        Ok(ShapeModel::new(shapes))
    }

    /// Parses one property shape. Returns `Ok(None)` for shapes whose path is
    /// a path expression rather than a single predicate.
    fn parse_property(
        &self,
        subject: &Subject,
    ) -> Result<Option<PropertyConstraint>, ConstraintParseError> {
        let shacl = SHACL::new();

        let path = match self.single(subject, shacl.path)? {
            Some(Term::NamedNode(p)) => p.clone(),
            Some(_) => {
                warn!(
                    "Skipping property shape {}: only predicate paths are supported",
                    subject
                );
                return Ok(None);
            }
            None => {
                return Err(ConstraintParseError::new(format!(
                    "property shape {} has no sh:path",
                    subject
                )))
            }
        };

        let mut constraint = PropertyConstraint::new(path);
        constraint.min_count = self
            .single(subject, shacl.min_count)?
            .map(|t| parse_count(t, "sh:minCount"))
            .transpose()?;
        constraint.max_count = self
            .single(subject, shacl.max_count)?
            .map(|t| parse_count(t, "sh:maxCount"))
            .transpose()?;
        constraint.datatype = match self.single(subject, shacl.datatype)? {
            Some(Term::NamedNode(dt)) => Some(dt.clone()),
            Some(other) => {
                return Err(ConstraintParseError::new(format!(
                    "sh:datatype must be an IRI, found {}",
                    other
                )))
            }
            None => None,
        };
        constraint.lang_matches = self
            .single(subject, shacl.lang_matches)?
            .map(|t| parse_string(t, "sh:langMatches"))
            .transpose()?;

        if let Some(head) = self.single(subject, shacl.language_in)? {
            let ranges = self
                .parse_list(head)?
                .iter()
                .map(|t| parse_string(t, "sh:languageIn"))
                .collect::<Result<Vec<_>, _>>()?;
            constraint.language_in = ranges;
        }

        constraint.min_exclusive = self
            .single(subject, shacl.min_exclusive)?
            .map(|t| parse_bound(t, "sh:minExclusive"))
            .transpose()?;
        constraint.min_inclusive = self
            .single(subject, shacl.min_inclusive)?
            .map(|t| parse_bound(t, "sh:minInclusive"))
            .transpose()?;
        constraint.max_exclusive = self
            .single(subject, shacl.max_exclusive)?
            .map(|t| parse_bound(t, "sh:maxExclusive"))
            .transpose()?;
        constraint.max_inclusive = self
            .single(subject, shacl.max_inclusive)?
            .map(|t| parse_bound(t, "sh:maxInclusive"))
            .transpose()?;

        if constraint.is_contradictory() {
            warn!(
                "Property shape {} on <{}> declares contradictory bounds",
                subject,
                constraint.path().as_str()
            );
        }

        Ok(Some(constraint))
    }

    /// Walks an RDF collection starting at `head`.
    fn parse_list(&self, head: &Term) -> Result<Vec<Term>, ConstraintParseError> {
        let rdf = RDF::new();
        let nil = Term::from(rdf.nil);
        let mut items = Vec::new();
        let mut current = head.clone();

        while current != nil {
            let node = to_subject(&current).ok_or_else(|| {
                ConstraintParseError::new(format!("malformed RDF list at {}", current))
            })?;
            let first = self.single(&node, rdf.first)?.ok_or_else(|| {
                ConstraintParseError::new(format!("RDF list node {} has no rdf:first", node))
            })?;
            items.push(first.clone());
            current = self
                .single(&node, rdf.rest)?
                .ok_or_else(|| {
                    ConstraintParseError::new(format!("RDF list node {} has no rdf:rest", node))
                })?
                .clone();
            if items.len() > self.by_subject.len() {
                return Err(ConstraintParseError::new("cyclic RDF list"));
            }
        }
        Ok(items)
    }
}

fn to_subject(term: &Term) -> Option<Subject> {
    match term {
        Term::NamedNode(n) => Some(n.clone().into()),
        Term::BlankNode(b) => Some(b.clone().into()),
        _ => None,
    }
}

fn subject_to_term(subject: &Subject) -> Term {
    subject.clone().into()
}

fn literal<'a>(term: &'a Term, name: &str) -> Result<&'a Literal, ConstraintParseError> {
    match term {
        Term::Literal(l) => Ok(l),
        other => Err(ConstraintParseError::new(format!(
            "{} must be a literal, found {}",
            name, other
        ))),
    }
}

fn parse_count(term: &Term, name: &str) -> Result<u64, ConstraintParseError> {
    let lit = literal(term, name)?;
    lit.value().trim().parse::<u64>().map_err(|_| {
        ConstraintParseError::new(format!(
            "{} must be a non-negative integer, found {}",
            name, lit
        ))
    })
}

fn parse_string(term: &Term, name: &str) -> Result<String, ConstraintParseError> {
    literal(term, name).map(|l| l.value().to_string())
}

fn parse_bound(term: &Term, name: &str) -> Result<Literal, ConstraintParseError> {
    literal(term, name).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RangeKind;

    const SHAPES: &str = r#"
@prefix ex: <http://example.org/ns#> .
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .

ex:PersonShape a sh:NodeShape ;
    sh:targetClass ex:Person ;
    sh:property [
        sh:path ex:mbox ;
        sh:minCount 1 ;
        sh:maxCount 1 ;
        sh:datatype xsd:string ;
    ] ;
    sh:property [
        sh:path ex:age ;
        sh:minInclusive 0 ;
        sh:maxExclusive 150 ;
    ] ;
    sh:property [
        sh:path ex:nickname ;
        sh:languageIn ( "en" ) ;
    ] .

ex:CompanyShape a sh:NodeShape ;
    sh:targetClass ex:Company ;
    sh:property [ sh:path ex:name ; sh:langMatches "pt" ] .
"#;

    fn ex(local: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.org/ns#{}", local))
    }

    #[test]
    fn parses_shapes_in_document_order() {
        let model = ShapeModel::from_turtle(SHAPES, None).unwrap();
        let shapes = model.shapes();
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].identifier(), &Term::from(ex("PersonShape")));
        assert_eq!(shapes[0].target_classes(), &[ex("Person")]);
        assert_eq!(shapes[1].target_classes(), &[ex("Company")]);

        let paths: Vec<_> = shapes[0]
            .properties()
            .iter()
            .map(|p| p.path().clone())
            .collect();
        assert_eq!(paths, vec![ex("mbox"), ex("age"), ex("nickname")]);
    }

    #[test]
    fn reads_every_constraint_feature() {
        let model = ShapeModel::from_turtle(SHAPES, None).unwrap();
        let person = &model.shapes()[0];

        let mbox = &person.properties()[0];
        assert_eq!(mbox.min_count(), Some(1));
        assert_eq!(mbox.max_count(), Some(1));
        assert_eq!(
            mbox.datatype().map(|d| d.as_str()),
            Some("http://www.w3.org/2001/XMLSchema#string")
        );

        let age = &person.properties()[1];
        assert_eq!(age.range(RangeKind::MinInclusive).map(|l| l.value()), Some("0"));
        assert_eq!(age.range(RangeKind::MaxExclusive).map(|l| l.value()), Some("150"));
        assert!(age.min_count().is_none());

        let nickname = &person.properties()[2];
        assert_eq!(nickname.language_in(), &["en".to_string()]);
        assert_eq!(nickname.lang_matches(), None);
        assert_eq!(nickname.lang_guarantee(), Some("en"));

        let name = &model.shapes()[1].properties()[0];
        assert_eq!(name.lang_matches(), Some("pt"));
    }

    #[test]
    fn unterminated_shape_block_is_a_parse_error() {
        let broken = r#"
@prefix ex: <http://example.org/ns#> .
@prefix sh: <http://www.w3.org/ns/shacl#> .
ex:PersonShape a sh:NodeShape ;
    sh:property [
        sh:path ex:mbox ;
        sh:minCount 1 ;
"#;
        assert!(ShapeModel::from_turtle(broken, None).is_err());
    }

    #[test]
    fn rejects_non_integer_counts() {
        let shapes = r#"
@prefix ex: <http://example.org/ns#> .
@prefix sh: <http://www.w3.org/ns/shacl#> .
ex:S a sh:NodeShape ; sh:property [ sh:path ex:p ; sh:minCount "many" ] .
"#;
        let err = ShapeModel::from_turtle(shapes, None).unwrap_err();
        assert!(err.message.contains("sh:minCount"));
    }

    #[test]
    fn rejects_property_without_path() {
        let shapes = r#"
@prefix ex: <http://example.org/ns#> .
@prefix sh: <http://www.w3.org/ns/shacl#> .
ex:S a sh:NodeShape ; sh:property [ sh:minCount 1 ] .
"#;
        let err = ShapeModel::from_turtle(shapes, None).unwrap_err();
        assert!(err.message.contains("no sh:path"));
    }

    #[test]
    fn skips_path_expressions() {
        let shapes = r#"
@prefix ex: <http://example.org/ns#> .
@prefix sh: <http://www.w3.org/ns/shacl#> .
ex:S a sh:NodeShape ;
    sh:property [ sh:path [ sh:inversePath ex:knows ] ; sh:minCount 1 ] ;
    sh:property [ sh:path ex:p ; sh:maxCount 2 ] .
"#;
        let model = ShapeModel::from_turtle(shapes, None).unwrap();
        let props = model.shapes()[0].properties();
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].path(), &ex("p"));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shapes.ttl");
        std::fs::write(&path, SHAPES).unwrap();
        let model = ShapeModel::from_file(&path).unwrap();
        assert_eq!(model.shapes().len(), 2);
    }
}
