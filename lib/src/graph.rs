//! The data graph: an in-memory oxigraph store that queries run against.

use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use log::{debug, info};
use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::Term;
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;
use url::Url;

use crate::error::{Error, Result};
use crate::query::Query;

/// One solution: output variable name to bound value. Unbound variables are
/// absent.
pub type Row = BTreeMap<String, Term>;

pub struct DataGraph {
    store: Store,
}

impl DataGraph {
    /// An empty graph.
    pub fn new() -> Result<Self> {
        Ok(DataGraph {
            store: Store::new()?,
        })
    }

    pub fn from_turtle(text: &str, base_iri: Option<&str>) -> Result<Self> {
        let graph = DataGraph::new()?;
        graph.load_turtle(text, base_iri)?;
        Ok(graph)
    }

    /// Reads a Turtle file, using its `file:` URL as base IRI.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let base = path
            .canonicalize()
            .ok()
            .and_then(|p| Url::from_file_path(p).ok())
            .map(|url| url.to_string());
        let graph = DataGraph::from_turtle(&text, base.as_deref())?;
        info!(
            "Loaded data graph from {} ({} triples)",
            path.display(),
            graph.len()?
        );
        Ok(graph)
    }

    /// Adds the triples of a Turtle document to the default graph.
    pub fn load_turtle(&self, text: &str, base_iri: Option<&str>) -> Result<()> {
        let mut parser = RdfParser::from_format(RdfFormat::Turtle).without_named_graphs();
        if let Some(base) = base_iri {
            parser = parser
                .with_base_iri(base)
                .map_err(|e| Error::DataLoad(format!("invalid base IRI <{}>: {}", base, e)))?;
        }
        for quad in parser.for_reader(Cursor::new(text.as_bytes())) {
            let quad = quad.map_err(|e| Error::DataLoad(e.to_string()))?;
            self.store.insert(&quad)?;
        }
        Ok(())
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.store.len()?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.store.is_empty()?)
    }

    /// Runs `query` and collects its solutions. An `ASK` query yields one
    /// empty row when true and none when false.
    pub fn execute(&self, query: &Query) -> Result<Vec<Row>> {
        self.execute_str(&query.to_string())
    }

    pub fn execute_str(&self, query: &str) -> Result<Vec<Row>> {
        debug!("Executing query:\n{}", query);
        match self.store.query(query)? {
            QueryResults::Solutions(solutions) => {
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution?;
                    let row: Row = solution
                        .iter()
                        .map(|(variable, term)| (variable.as_str().to_string(), term.clone()))
                        .collect();
                    rows.push(row);
                }
                Ok(rows)
            }
            QueryResults::Boolean(true) => Ok(vec![Row::new()]),
            QueryResults::Boolean(false) => Ok(Vec::new()),
            QueryResults::Graph(_) => Err(Error::UnexpectedResult(
                "graph result for a SELECT or ASK query".to_string(),
            )),
        }
    }

    /// Runs an `ASK` query.
    pub(crate) fn ask(&self, query: &str) -> Result<bool> {
        match self.store.query(query)? {
            QueryResults::Boolean(b) => Ok(b),
            _ => Err(Error::UnexpectedResult(format!(
                "expected a boolean result for: {}",
                query
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = r#"
        @prefix ex: <http://example.org/ns#> .
        ex:alice a ex:Person ; ex:name "Alice" ; ex:age 30 .
        ex:bob a ex:Person ; ex:name "Bob" .
    "#;

    #[test]
    fn execute_collects_rows() {
        let graph = DataGraph::from_turtle(DATA, None).unwrap();
        assert_eq!(graph.len().unwrap(), 5);

        let query = Query::parse(
            "PREFIX ex: <http://example.org/ns#>\n\
             SELECT ?name ?age WHERE { ?p ex:name ?name OPTIONAL { ?p ex:age ?age } }",
        )
        .unwrap();
        let rows = graph.execute(&query).unwrap();
        assert_eq!(rows.len(), 2);
        let bob = rows
            .iter()
            .find(|r| r.get("name").map(|t| t.to_string()) == Some("\"Bob\"".to_string()))
            .unwrap();
        assert!(!bob.contains_key("age"));
    }

    #[test]
    fn ask_yields_one_empty_row_when_true() {
        let graph = DataGraph::from_turtle(DATA, None).unwrap();
        let yes = Query::parse("PREFIX ex: <http://example.org/ns#>\nASK { ex:alice ex:age 30 }")
            .unwrap();
        let no = Query::parse("PREFIX ex: <http://example.org/ns#>\nASK { ex:bob ex:age ?a }")
            .unwrap();
        assert_eq!(graph.execute(&yes).unwrap(), vec![Row::new()]);
        assert!(graph.execute(&no).unwrap().is_empty());
    }

    #[test]
    fn malformed_turtle_is_a_load_error() {
        let err = DataGraph::from_turtle("@prefix ex: <http://example.org/ns#> .\nex:a ex:b", None)
            .err()
            .unwrap();
        assert!(matches!(err, Error::DataLoad(_)));
    }
}
