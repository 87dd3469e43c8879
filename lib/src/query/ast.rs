//! Clause model of a parsed query.
//!
//! Only the clause kinds the rewriter manipulates are modelled structurally;
//! everything else is carried as opaque source text. Every node keeps the
//! exact text it was parsed from, together with the whitespace and comments
//! that preceded it, so printing an untouched query reproduces the input.

use std::collections::{BTreeSet, HashMap};

use oxigraph::model::{Literal, NamedNode, Variable};
use url::Url;

use crate::named_nodes::RDF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryForm {
    Select,
    Ask,
}

/// A parsed `SELECT` or `ASK` query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub(crate) form: QueryForm,
    pub(crate) prefixes: PrefixMap,
    /// Source text up to and including the `{` that opens the WHERE group.
    pub(crate) head: String,
    pub(crate) pattern: GroupPattern,
    pub(crate) modifiers: Vec<Modifier>,
    /// Whitespace and comments after the last token.
    pub(crate) trailing: String,
}

impl Query {
    pub fn form(&self) -> QueryForm {
        self.form
    }

    pub fn prefixes(&self) -> &PrefixMap {
        &self.prefixes
    }

    /// Clauses of the top-level WHERE group, in source order.
    pub fn clauses(&self) -> &[Clause] {
        &self.pattern.clauses
    }

    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    pub fn has_group_by(&self) -> bool {
        self.modifiers
            .iter()
            .any(|m| matches!(m, Modifier::GroupBy(_)))
    }

    /// Every `HAVING` constraint, across all `HAVING` modifiers.
    pub fn having_constraints(&self) -> impl Iterator<Item = &HavingConstraint> {
        self.modifiers.iter().flat_map(|m| match m {
            Modifier::Having(having) => having.constraints.iter(),
            _ => [].iter(),
        })
    }

    /// Every triple pattern in the top-level group, mandatory or optional.
    pub fn triple_patterns(&self) -> Vec<&TriplePattern> {
        let mut triples = Vec::new();
        for clause in &self.pattern.clauses {
            match &clause.kind {
                ClauseKind::Triples(block) => triples.extend(block.triples.iter()),
                ClauseKind::Optional(optional) => {
                    for inner in &optional.body.clauses {
                        if let ClauseKind::Triples(block) = &inner.kind {
                            triples.extend(block.triples.iter());
                        }
                    }
                }
                _ => {}
            }
        }
        triples
    }
}

/// A `{ ... }` group: its clauses and the text before the closing brace.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPattern {
    pub(crate) clauses: Vec<Clause>,
    pub(crate) closing: String,
}

impl GroupPattern {
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    /// Whitespace and comments between the previous token and this clause.
    pub(crate) leading: String,
    /// Exact text of the clause, including its `.` terminator if any.
    pub(crate) text: String,
    pub(crate) kind: ClauseKind,
}

impl Clause {
    /// A mandatory triples clause holding one triple, rendered from the
    /// triple's term texts.
    pub(crate) fn mandatory_triple(leading: String, triple: TriplePattern, terminated: bool) -> Self {
        let mut text = triple.to_string();
        if terminated {
            text.push_str(" .");
        }
        Clause {
            leading,
            text,
            kind: ClauseKind::Triples(TriplesBlock {
                triples: vec![triple],
                terminated,
            }),
        }
    }

    pub fn kind(&self) -> &ClauseKind {
        &self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_terminated(&self) -> bool {
        match &self.kind {
            ClauseKind::Triples(block) => block.terminated,
            ClauseKind::Optional(optional) => optional.terminated,
            ClauseKind::Filter(filter) => filter.terminated,
            ClauseKind::Opaque(opaque) => opaque.terminated,
        }
    }

    /// Triples blocks must be separated by `.`; other clauses need not be.
    pub fn is_triples_like(&self) -> bool {
        match &self.kind {
            ClauseKind::Triples(_) => true,
            ClauseKind::Opaque(opaque) => opaque.triples_like,
            _ => false,
        }
    }

    /// True when the clause can bind `variable`. Filters never bind.
    pub fn mentions(&self, variable: &Variable) -> bool {
        match &self.kind {
            ClauseKind::Triples(block) => block.triples.iter().any(|t| t.mentions(variable)),
            ClauseKind::Optional(optional) => {
                optional.body.clauses.iter().any(|c| c.mentions(variable))
            }
            ClauseKind::Filter(_) => false,
            ClauseKind::Opaque(opaque) => opaque.variables.contains(variable.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClauseKind {
    /// Simple triple patterns, possibly using `;` and `,` abbreviations.
    Triples(TriplesBlock),
    Optional(OptionalGroup),
    Filter(Filter),
    /// Anything the rewriter never edits: nested groups, UNION, MINUS, GRAPH,
    /// SERVICE, BIND, VALUES, property paths, blank node property lists.
    Opaque(Opaque),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriplesBlock {
    pub(crate) triples: Vec<TriplePattern>,
    pub(crate) terminated: bool,
}

impl TriplesBlock {
    pub fn triples(&self) -> &[TriplePattern] {
        &self.triples
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionalGroup {
    pub(crate) body: GroupPattern,
    pub(crate) terminated: bool,
}

impl OptionalGroup {
    pub fn body(&self) -> &GroupPattern {
        &self.body
    }

    /// The triple when the group body is exactly one triple pattern.
    pub fn single_triple(&self) -> Option<&TriplePattern> {
        match self.body.clauses.as_slice() {
            [Clause {
                kind: ClauseKind::Triples(block),
                ..
            }] if block.triples.len() == 1 => block.triples.first(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub(crate) condition: FilterCondition,
    pub(crate) terminated: bool,
}

impl Filter {
    pub fn condition(&self) -> &FilterCondition {
        &self.condition
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterCondition {
    /// `datatype(?v) = <iri>`, in either operand order
    Datatype {
        variable: Variable,
        datatype: NamedNode,
    },
    /// `langMatches(lang(?v), "range")`
    LangMatches { variable: Variable, range: String },
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Opaque {
    /// Names of every variable appearing in the clause
    pub(crate) variables: BTreeSet<String>,
    pub(crate) triples_like: bool,
    pub(crate) terminated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriplePattern {
    pub(crate) subject: TermPattern,
    pub(crate) predicate: TermPattern,
    pub(crate) object: TermPattern,
}

impl TriplePattern {
    pub fn subject(&self) -> &TermPattern {
        &self.subject
    }

    pub fn predicate(&self) -> &TermPattern {
        &self.predicate
    }

    pub fn object(&self) -> &TermPattern {
        &self.object
    }

    pub fn mentions(&self, variable: &Variable) -> bool {
        [&self.subject, &self.predicate, &self.object]
            .iter()
            .any(|t| t.as_variable() == Some(variable))
    }

    /// True for `S rdf:type C` (or `S a C`).
    pub fn is_type_assertion(&self, subject: &Variable, class: &NamedNode) -> bool {
        self.subject.as_variable() == Some(subject)
            && self.predicate.as_iri() == Some(&RDF::new().type_.into_owned())
            && self.object.as_iri() == Some(class)
    }
}

/// A term position of a triple pattern with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct TermPattern {
    pub(crate) value: PatternValue,
    pub(crate) text: String,
}

impl TermPattern {
    pub fn value(&self) -> &PatternValue {
        &self.value
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match &self.value {
            PatternValue::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_iri(&self) -> Option<&NamedNode> {
        match &self.value {
            PatternValue::Iri(iri) => Some(iri),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternValue {
    Variable(Variable),
    /// Absolute IRI, after prefix expansion
    Iri(NamedNode),
    Literal(Literal),
    BlankNode(String),
}

/// Solution modifiers following the WHERE group.
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    GroupBy(Segment),
    Having(Having),
    /// ORDER BY, LIMIT, OFFSET, trailing VALUES
    Other(Segment),
}

/// A modifier kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub(crate) leading: String,
    pub(crate) text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Having {
    pub(crate) leading: String,
    pub(crate) keyword: String,
    pub(crate) constraints: Vec<HavingConstraint>,
}

impl Having {
    pub fn constraints(&self) -> &[HavingConstraint] {
        &self.constraints
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HavingConstraint {
    pub(crate) leading: String,
    pub(crate) text: String,
    pub(crate) guard: Option<AggregateGuard>,
}

impl HavingConstraint {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn guard(&self) -> Option<&AggregateGuard> {
        self.guard.as_ref()
    }
}

/// `(min(?v) op constant)`
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateGuard {
    pub(crate) variable: Variable,
    pub(crate) op: CompareOp,
    /// The constant, typed by its lexical form as SPARQL types it.
    pub(crate) bound: Literal,
}

impl AggregateGuard {
    pub fn variable(&self) -> &Variable {
        &self.variable
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    pub fn bound(&self) -> &Literal {
        &self.bound
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub(crate) fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }
}

/// `PREFIX` and `BASE` declarations of a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrefixMap {
    prefixes: HashMap<String, String>,
    base: Option<String>,
}

impl PrefixMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    pub fn set_base(&mut self, base: impl Into<String>) {
        self.base = Some(base.into());
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.prefixes.contains_key(prefix)
    }

    /// Expand `prefix:local`; `None` when the prefix is not declared.
    pub fn expand(&self, prefix: &str, local: &str) -> Option<NamedNode> {
        let namespace = self.prefixes.get(prefix)?;
        Some(NamedNode::new_unchecked(format!("{}{}", namespace, local)))
    }

    /// Resolve an IRI reference against the declared base, if any.
    pub fn resolve_iri(&self, iri: &str) -> NamedNode {
        if Url::parse(iri).is_ok() {
            return NamedNode::new_unchecked(iri);
        }
        self.base
            .as_deref()
            .and_then(|base| Url::parse(base).ok())
            .and_then(|base| base.join(iri).ok())
            .map(|url| NamedNode::new_unchecked(url.as_str()))
            .unwrap_or_else(|| NamedNode::new_unchecked(iri))
    }

    /// Normalize a property name as written in a query (`<iri>`, `prefix:local`
    /// or a bare absolute IRI) to an absolute IRI.
    pub fn resolve(&self, name: &str) -> Option<NamedNode> {
        let name = name.trim();
        if let Some(iri) = name.strip_prefix('<').and_then(|n| n.strip_suffix('>')) {
            return Some(self.resolve_iri(iri));
        }
        if let Some((prefix, local)) = name.split_once(':') {
            if let Some(expanded) = self.expand(prefix, local) {
                return Some(expanded);
            }
        }
        let absolute = name.contains("://") || name.starts_with("urn:");
        (absolute && Url::parse(name).is_ok()).then(|| NamedNode::new_unchecked(name))
    }
}
