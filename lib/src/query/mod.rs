//! SPARQL query clause model: tokenizer, parser and printer.

mod ast;
mod lex;
mod parse;
mod print;

pub use ast::{
    AggregateGuard, Clause, ClauseKind, CompareOp, Filter, FilterCondition, GroupPattern, Having,
    HavingConstraint, Modifier, Opaque, OptionalGroup, PatternValue, PrefixMap, Query, QueryForm,
    Segment, TermPattern, TriplePattern, TriplesBlock,
};
