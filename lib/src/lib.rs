//! Shape-driven SPARQL query simplification.
//!
//! SHACL property constraints that a data graph is known to satisfy make some
//! parts of a query redundant: an `OPTIONAL` on a property every focus node
//! has, a `FILTER` on a datatype every value already carries, a `HAVING`
//! bound the declared value range already enforces. This crate
//!
//! 1. loads shapes into a [`ShapeModel`],
//! 2. validates a [`DataGraph`] against them with a [`Validator`],
//! 3. rewrites [`Query`] values with a [`Rewriter`], which can only be built
//!    from the [`Validated`] marker of a conforming report,
//! 4. and [`compare`]s the original and rewritten query on the same data.
//!
//! ```no_run
//! use shapeopt::{DataGraph, Query, RewriteConfig, Rewriter, ShapeModel, Validator};
//!
//! # fn main() -> shapeopt::Result<()> {
//! let model = ShapeModel::from_file("shapes.ttl".as_ref())?;
//! let data = DataGraph::from_file("data.ttl".as_ref())?;
//! let report = Validator::new(&model).validate(&data)?;
//! let rewriter = Rewriter::new(report.validated()?, RewriteConfig::default());
//! let query = Query::parse("SELECT * WHERE { ?s ?p ?o }")?;
//! println!("{}", rewriter.rewrite(&query).query);
//! # Ok(())
//! # }
//! ```

pub mod compare;
mod error;
mod graph;
mod lookup;
pub mod model;
mod named_nodes;
mod parser;
pub mod query;
mod report;
pub mod rewrite;
mod validate;

pub use compare::{compare, Comparison, Execution, Timing};
pub use error::{ConstraintParseError, Error, QueryParseError, Result};
pub use graph::{DataGraph, Row};
pub use lookup::{ConstraintIndex, IndexedConstraint};
pub use model::{NodeShape, PropertyConstraint, RangeKind, ShapeModel};
pub use query::Query;
pub use report::{Validated, ValidationReport, ValidationResult};
pub use rewrite::{rewrite, Rewrite, RewriteConfig, RewritePolicy, RewriteStats, Rewriter};
pub use validate::Validator;
