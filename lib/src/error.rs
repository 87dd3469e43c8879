//! Error types for loading shapes, parsing queries and running the collaborators.

use thiserror::Error;

/// Result type for shapeopt operations
pub type Result<T> = std::result::Result<T, Error>;

/// The shapes source could not be read into a constraint model.
///
/// Raised for malformed Turtle as well as for well-formed Turtle whose SHACL
/// terms carry values of the wrong kind. No partial model is ever returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid shapes graph: {message}")]
pub struct ConstraintParseError {
    pub message: String,
}

impl ConstraintParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The query text is not a query the rewriter can operate on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid query at line {line}, column {column}: {message}")]
pub struct QueryParseError {
    /// Byte offset into the query text
    pub position: usize,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl QueryParseError {
    /// Build an error for `position` in `source`, computing the 1-indexed line/column.
    pub fn at(source: &str, position: usize, message: impl Into<String>) -> Self {
        let mut line = 1;
        let mut column = 1;
        for (i, c) in source.char_indices() {
            if i >= position {
                break;
            }
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Self {
            position,
            line,
            column,
            message: message.into(),
        }
    }
}

/// Top-level error for the validate → rewrite → execute pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    ConstraintParse(#[from] ConstraintParseError),

    #[error(transparent)]
    QueryParse(#[from] QueryParseError),

    /// The data graph violates the shapes; rewriting would not be sound.
    #[error("data graph does not conform to the shapes: {violations} violation(s)")]
    NonConforming { violations: usize },

    /// The data could not be loaded into the store.
    #[error("failed to load data graph: {0}")]
    DataLoad(String),

    #[error("store error: {0}")]
    Storage(#[from] oxigraph::store::StorageError),

    #[error("query evaluation failed: {0}")]
    Evaluation(#[from] oxigraph::sparql::EvaluationError),

    #[error("unexpected query result: {0}")]
    UnexpectedResult(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
