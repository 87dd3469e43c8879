//! Constant-time lookup of property constraints by path.

use std::collections::{HashMap, HashSet};

use oxigraph::model::NamedNode;

use crate::model::{NodeShape, PropertyConstraint, ShapeModel};
use crate::named_nodes::local_name;
use crate::query::{PrefixMap, Query};

/// A property constraint together with the shape declaring it and its
/// position in model order.
#[derive(Debug, Clone, Copy)]
pub struct IndexedConstraint<'m> {
    pub order: usize,
    pub shape: &'m NodeShape,
    pub constraint: &'m PropertyConstraint,
}

/// Index over a [`ShapeModel`] keyed by absolute path IRI.
///
/// Aggregate guards name a variable rather than a predicate, so the index
/// is also keyed by the local name of each path.
#[derive(Debug)]
pub struct ConstraintIndex<'m> {
    by_path: HashMap<NamedNode, Vec<IndexedConstraint<'m>>>,
    by_local_name: HashMap<String, Vec<IndexedConstraint<'m>>>,
    len: usize,
}

impl<'m> ConstraintIndex<'m> {
    pub fn new(model: &'m ShapeModel) -> Self {
        let mut by_path: HashMap<NamedNode, Vec<IndexedConstraint<'m>>> = HashMap::new();
        let mut by_local_name: HashMap<String, Vec<IndexedConstraint<'m>>> = HashMap::new();
        let mut len = 0;

        for (order, (shape, constraint)) in model.constraints().enumerate() {
            let entry = IndexedConstraint {
                order,
                shape,
                constraint,
            };
            by_path
                .entry(constraint.path().clone())
                .or_default()
                .push(entry);
            by_local_name
                .entry(local_name(constraint.path().as_str()).to_string())
                .or_default()
                .push(entry);
            len += 1;
        }

        ConstraintIndex {
            by_path,
            by_local_name,
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Every constraint on `path`, in model order.
    pub fn lookup(&self, path: &NamedNode) -> &[IndexedConstraint<'m>] {
        self.by_path.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Like [`lookup`](Self::lookup) for a name as written in a query.
    /// A name that cannot be resolved matches nothing.
    pub fn lookup_name(&self, name: &str, prefixes: &PrefixMap) -> &[IndexedConstraint<'m>] {
        match prefixes.resolve(name) {
            Some(path) => self.lookup(&path),
            None => &[],
        }
    }

    /// Every constraint whose path has the given local name.
    pub fn lookup_local_name(&self, local: &str) -> &[IndexedConstraint<'m>] {
        self.by_local_name.get(local).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Constraints that could match something in `query`: those on a
    /// predicate the query uses, and those whose local name is the variable
    /// of an aggregate guard. Returned in model order.
    pub fn candidates(&self, query: &Query) -> Vec<IndexedConstraint<'m>> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        let by_predicate = query
            .triple_patterns()
            .into_iter()
            .filter_map(|triple| triple.predicate().as_iri())
            .flat_map(|path| self.lookup(path).iter());
        let by_guard = query
            .having_constraints()
            .filter_map(|c| c.guard())
            .flat_map(|guard| self.lookup_local_name(guard.variable().as_str()).iter());

        for entry in by_predicate.chain(by_guard) {
            if seen.insert(entry.order) {
                found.push(*entry);
            }
        }
        found.sort_by_key(|entry| entry.order);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHAPES: &str = r#"
        @prefix sh: <http://www.w3.org/ns/shacl#> .
        @prefix ex: <http://example.org/ns#> .

        ex:PersonShape a sh:NodeShape ;
            sh:targetClass ex:Person ;
            sh:property [ sh:path ex:mbox ; sh:maxCount 1 ] ;
            sh:property [ sh:path ex:age ; sh:minInclusive 0 ] .

        ex:CompanyShape a sh:NodeShape ;
            sh:targetClass ex:Company ;
            sh:property [ sh:path ex:mbox ; sh:minCount 1 ] .
    "#;

    fn model() -> ShapeModel {
        ShapeModel::from_turtle(SHAPES, None).unwrap()
    }

    fn ex(local: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.org/ns#{}", local))
    }

    #[test]
    fn lookup_returns_every_shape_in_order() {
        let model = model();
        let index = ConstraintIndex::new(&model);
        assert_eq!(index.len(), 3);

        let entries = index.lookup(&ex("mbox"));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].constraint.max_count(), Some(1));
        assert_eq!(entries[1].constraint.min_count(), Some(1));
        assert!(entries[0].order < entries[1].order);
        assert!(index.lookup(&ex("phone")).is_empty());
    }

    #[test]
    fn lookup_name_normalizes_prefixed_names() {
        let model = model();
        let index = ConstraintIndex::new(&model);
        let mut prefixes = PrefixMap::new();
        prefixes.insert("ex", "http://example.org/ns#");

        assert_eq!(index.lookup_name("ex:age", &prefixes).len(), 1);
        assert_eq!(
            index
                .lookup_name("<http://example.org/ns#age>", &prefixes)
                .len(),
            1
        );
        assert!(index.lookup_name("foaf:age", &prefixes).is_empty());
    }

    #[test]
    fn candidates_cover_predicates_and_guard_variables() {
        let model = model();
        let index = ConstraintIndex::new(&model);
        let query = Query::parse(
            "PREFIX ex: <http://example.org/ns#>\n\
             SELECT ?s WHERE { ?s ex:years ?age } GROUP BY ?s HAVING (min(?age) >= 0)",
        )
        .unwrap();
        let candidates = index.candidates(&query);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].constraint.path(), &ex("age"));

        let query =
            Query::parse("PREFIX ex: <http://example.org/ns#>\nSELECT * WHERE { ?s ex:phone ?p }")
                .unwrap();
        assert!(index.candidates(&query).is_empty());
    }
}
