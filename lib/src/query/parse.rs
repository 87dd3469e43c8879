//! Recursive-descent parser from tokens to the clause model.

use std::collections::BTreeSet;
use std::str::FromStr;

use oxigraph::model::vocab::xsd;
use oxigraph::model::{Literal, NamedNode, NamedNodeRef, Variable};

use super::ast::{
    AggregateGuard, Clause, ClauseKind, CompareOp, Filter, FilterCondition, GroupPattern, Having,
    HavingConstraint, Modifier, Opaque, OptionalGroup, PatternValue, PrefixMap, Query, QueryForm,
    Segment, TermPattern, TriplePattern, TriplesBlock,
};
use super::lex::{tokenize, NumberKind, Token, TokenKind};
use crate::error::QueryParseError;
use crate::named_nodes::RDF;

type Result<T> = std::result::Result<T, QueryParseError>;

/// Keywords that start a non-triples clause inside a group.
const CLAUSE_KEYWORDS: [&str; 7] = [
    "OPTIONAL", "FILTER", "MINUS", "GRAPH", "SERVICE", "BIND", "VALUES",
];

/// Keywords that start a solution modifier after the WHERE group.
const MODIFIER_KEYWORDS: [&str; 6] = ["GROUP", "HAVING", "ORDER", "LIMIT", "OFFSET", "VALUES"];

impl Query {
    /// Parse a `SELECT` or `ASK` query.
    pub fn parse(source: &str) -> Result<Self> {
        Parser::new(source)?.parse_query()
    }
}

impl FromStr for Query {
    type Err = QueryParseError;

    fn from_str(source: &str) -> Result<Self> {
        Query::parse(source)
    }
}

fn is_clause_keyword(token: &Token) -> bool {
    CLAUSE_KEYWORDS.iter().any(|k| token.is_keyword(k))
}

fn is_modifier_keyword(token: &Token) -> bool {
    MODIFIER_KEYWORDS.iter().any(|k| token.is_keyword(k))
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    /// Index of the next token; never moves past `Eof`.
    pos: usize,
    /// Byte offset just after the last consumed token.
    cursor: usize,
    prefixes: PrefixMap,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Result<Self> {
        Ok(Parser {
            source,
            tokens: tokenize(source)?,
            pos: 0,
            cursor: 0,
            prefixes: PrefixMap::new(),
        })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
            self.cursor = token.span.end;
        }
        token
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        if self.peek().is_symbol(symbol) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error(&self, token: &Token, message: impl Into<String>) -> QueryParseError {
        QueryParseError::at(self.source, token.span.start, message)
    }

    fn error_here(&self, message: impl Into<String>) -> QueryParseError {
        self.error(self.peek(), message)
    }

    /// Trivia between the last consumed token and the next one.
    fn leading(&self) -> String {
        self.source[self.cursor..self.peek().span.start].to_string()
    }

    fn text_from(&self, start: usize) -> String {
        self.source[start..self.cursor].to_string()
    }

    fn parse_query(mut self) -> Result<Query> {
        self.parse_prologue()?;
        self.check_prefixes()?;
        let form = self.parse_form()?;

        // Projection and dataset clauses are kept verbatim in the head.
        let mut depth = 0usize;
        loop {
            let token = self.peek().clone();
            match &token.kind {
                TokenKind::Eof => return Err(self.error(&token, "expected a WHERE group")),
                TokenKind::Symbol("(") => depth += 1,
                TokenKind::Symbol(")") => depth = depth.saturating_sub(1),
                TokenKind::Symbol("{") if depth == 0 => {
                    self.bump();
                    break;
                }
                _ => {}
            }
            self.bump();
        }
        let head = self.source[..self.cursor].to_string();

        let pattern = self.parse_group_body()?;
        let modifiers = self.parse_modifiers()?;
        let trailing = self.source[self.cursor..].to_string();

        Ok(Query {
            form,
            prefixes: self.prefixes,
            head,
            pattern,
            modifiers,
            trailing,
        })
    }

    fn parse_prologue(&mut self) -> Result<()> {
        loop {
            let token = self.peek().clone();
            if token.is_keyword("PREFIX") {
                self.bump();
                let name = self.bump();
                let prefix = match &name.kind {
                    TokenKind::PrefixNs(prefix) => prefix.clone(),
                    _ => return Err(self.error(&name, "expected a prefix name after PREFIX")),
                };
                let iri = self.bump();
                let namespace = match &iri.kind {
                    TokenKind::Iri(namespace) => self.prefixes.resolve_iri(namespace),
                    _ => return Err(self.error(&iri, "expected an IRI in PREFIX declaration")),
                };
                self.prefixes.insert(prefix, namespace.as_str());
            } else if token.is_keyword("BASE") {
                self.bump();
                let iri = self.bump();
                match &iri.kind {
                    TokenKind::Iri(base) => self.prefixes.set_base(base.as_str()),
                    _ => return Err(self.error(&iri, "expected an IRI after BASE")),
                }
            } else {
                return Ok(());
            }
        }
    }

    fn check_prefixes(&self) -> Result<()> {
        for token in &self.tokens[self.pos..] {
            let prefix = match &token.kind {
                TokenKind::PrefixedName { prefix, .. } | TokenKind::PrefixNs(prefix) => prefix,
                _ => continue,
            };
            if !self.prefixes.contains(prefix) {
                return Err(self.error(token, format!("undeclared prefix '{}:'", prefix)));
            }
        }
        Ok(())
    }

    fn parse_form(&self) -> Result<QueryForm> {
        let token = self.peek();
        if token.is_keyword("SELECT") {
            Ok(QueryForm::Select)
        } else if token.is_keyword("ASK") {
            Ok(QueryForm::Ask)
        } else if token.is_keyword("CONSTRUCT") || token.is_keyword("DESCRIBE") {
            Err(self.error(token, "only SELECT and ASK queries are supported"))
        } else {
            Err(self.error(token, "expected SELECT or ASK"))
        }
    }

    /// Parses clauses up to and including the closing `}`; the opening brace
    /// has already been consumed.
    fn parse_group_body(&mut self) -> Result<GroupPattern> {
        let mut clauses = Vec::new();
        loop {
            let token = self.peek().clone();
            match &token.kind {
                TokenKind::Symbol("}") => {
                    let closing = self.leading();
                    self.bump();
                    return Ok(GroupPattern { clauses, closing });
                }
                TokenKind::Eof => return Err(self.error(&token, "unterminated group, expected '}'")),
                TokenKind::Symbol(".") => return Err(self.error(&token, "unexpected '.'")),
                _ => {}
            }

            let leading = self.leading();
            let start = token.span.start;
            let kind = if token.is_keyword("OPTIONAL") {
                self.parse_optional()?
            } else if token.is_keyword("FILTER") {
                self.parse_filter()?
            } else if token.is_symbol("{") || is_clause_keyword(&token) {
                self.parse_block()?
            } else {
                self.parse_triples()?
            };
            clauses.push(Clause {
                leading,
                text: self.text_from(start),
                kind,
            });
        }
    }

    fn parse_optional(&mut self) -> Result<ClauseKind> {
        self.bump();
        if !self.eat_symbol("{") {
            return Err(self.error_here("expected '{' after OPTIONAL"));
        }
        let body = self.parse_group_body()?;
        let terminated = self.eat_symbol(".");
        Ok(ClauseKind::Optional(OptionalGroup { body, terminated }))
    }

    fn parse_filter(&mut self) -> Result<ClauseKind> {
        self.bump();
        let start = self.pos;
        if self.peek().is_keyword("NOT") || self.peek().is_keyword("EXISTS") {
            return self.parse_exists_filter();
        }
        if !self.peek().is_symbol("(") {
            match self.peek().kind {
                TokenKind::Word(_) | TokenKind::PrefixedName { .. } | TokenKind::Iri(_) => {
                    self.bump();
                }
                _ => return Err(self.error_here("expected a FILTER constraint")),
            }
        }
        self.skip_balanced("(", ")")?;
        let condition = self.recognize_filter(start, self.pos);
        let terminated = self.eat_symbol(".");
        Ok(ClauseKind::Filter(Filter {
            condition,
            terminated,
        }))
    }

    /// `FILTER [NOT] EXISTS { ... }`, kept as an opaque condition.
    fn parse_exists_filter(&mut self) -> Result<ClauseKind> {
        if self.peek().is_keyword("NOT") {
            self.bump();
            if !self.peek().is_keyword("EXISTS") {
                return Err(self.error_here("expected EXISTS after NOT"));
            }
        }
        self.bump();
        self.skip_balanced("{", "}")?;
        let terminated = self.eat_symbol(".");
        Ok(ClauseKind::Filter(Filter {
            condition: FilterCondition::Other,
            terminated,
        }))
    }

    fn recognize_filter(&self, start: usize, end: usize) -> FilterCondition {
        let tokens = strip_parens(&self.tokens[start..end]);
        match tokens {
            [func, open, var, close, eq, iri]
                if func.is_keyword("datatype")
                    && open.is_symbol("(")
                    && close.is_symbol(")")
                    && eq.is_symbol("=") =>
            {
                self.datatype_condition(var, iri)
            }
            [iri, eq, func, open, var, close]
                if func.is_keyword("datatype")
                    && open.is_symbol("(")
                    && close.is_symbol(")")
                    && eq.is_symbol("=") =>
            {
                self.datatype_condition(var, iri)
            }
            [func, open, lang, lang_open, var, lang_close, comma, range, close]
                if func.is_keyword("langMatches")
                    && open.is_symbol("(")
                    && lang.is_keyword("lang")
                    && lang_open.is_symbol("(")
                    && lang_close.is_symbol(")")
                    && comma.is_symbol(",")
                    && close.is_symbol(")") =>
            {
                match (&var.kind, &range.kind) {
                    (TokenKind::Var(name), TokenKind::String(range)) => {
                        FilterCondition::LangMatches {
                            variable: Variable::new_unchecked(name.as_str()),
                            range: range.clone(),
                        }
                    }
                    _ => FilterCondition::Other,
                }
            }
            _ => FilterCondition::Other,
        }
    }

    fn datatype_condition(&self, var: &Token, iri: &Token) -> FilterCondition {
        match (&var.kind, self.named_node(iri)) {
            (TokenKind::Var(name), Some(datatype)) => FilterCondition::Datatype {
                variable: Variable::new_unchecked(name.as_str()),
                datatype,
            },
            _ => FilterCondition::Other,
        }
    }

    fn named_node(&self, token: &Token) -> Option<NamedNode> {
        match &token.kind {
            TokenKind::Iri(iri) => Some(self.prefixes.resolve_iri(iri)),
            TokenKind::PrefixedName { prefix, local } => self.prefixes.expand(prefix, local),
            TokenKind::PrefixNs(prefix) => self.prefixes.expand(prefix, ""),
            _ => None,
        }
    }

    /// Consume a bracketed run starting at the current `open` token.
    fn skip_balanced(&mut self, open: &str, close: &str) -> Result<()> {
        if !self.peek().is_symbol(open) {
            return Err(self.error_here(format!("expected '{}'", open)));
        }
        let opening = self.bump();
        let mut depth = 1usize;
        while depth > 0 {
            let token = self.bump();
            if token.kind == TokenKind::Eof {
                return Err(self.error(&opening, format!("unbalanced '{}'", open)));
            }
            if token.is_symbol(open) {
                depth += 1;
            } else if token.is_symbol(close) {
                depth -= 1;
            }
        }
        Ok(())
    }

    fn variables_in(&self, start: usize, end: usize) -> BTreeSet<String> {
        self.tokens[start..end]
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Var(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Nested groups, UNION, MINUS, GRAPH, SERVICE, BIND and VALUES.
    fn parse_block(&mut self) -> Result<ClauseKind> {
        let start = self.pos;
        let token = self.peek().clone();
        if token.is_symbol("{") {
            self.skip_balanced("{", "}")?;
            while self.peek().is_keyword("UNION") {
                self.bump();
                self.skip_balanced("{", "}")?;
            }
        } else if token.is_keyword("MINUS") {
            self.bump();
            self.skip_balanced("{", "}")?;
        } else if token.is_keyword("GRAPH") || token.is_keyword("SERVICE") {
            self.bump();
            if self.peek().is_keyword("SILENT") {
                self.bump();
            }
            match self.peek().kind {
                TokenKind::Var(_)
                | TokenKind::Iri(_)
                | TokenKind::PrefixedName { .. }
                | TokenKind::PrefixNs(_) => {
                    self.bump();
                }
                _ => return Err(self.error_here("expected a graph or service name")),
            }
            self.skip_balanced("{", "}")?;
        } else if token.is_keyword("BIND") {
            self.bump();
            self.skip_balanced("(", ")")?;
        } else {
            // VALUES
            self.bump();
            if self.peek().is_symbol("(") {
                self.skip_balanced("(", ")")?;
            } else if matches!(self.peek().kind, TokenKind::Var(_)) {
                self.bump();
            } else {
                return Err(self.error_here("expected variables after VALUES"));
            }
            self.skip_balanced("{", "}")?;
        }
        let variables = self.variables_in(start, self.pos);
        let terminated = self.eat_symbol(".");
        Ok(ClauseKind::Opaque(Opaque {
            variables,
            triples_like: false,
            terminated,
        }))
    }

    fn parse_triples(&mut self) -> Result<ClauseKind> {
        let start = self.pos;
        let start_cursor = self.cursor;
        match self.parse_simple_triples()? {
            Some(block) => Ok(ClauseKind::Triples(block)),
            None => {
                self.pos = start;
                self.cursor = start_cursor;
                self.parse_opaque_triples(start)
            }
        }
    }

    /// Triples built only from plain terms. `None` means the block uses
    /// paths, blank node property lists or collections.
    fn parse_simple_triples(&mut self) -> Result<Option<TriplesBlock>> {
        let mut triples = Vec::new();
        let Some(subject) = self.parse_term(false)? else {
            return Ok(None);
        };
        loop {
            let Some(predicate) = self.parse_term(true)? else {
                return Ok(None);
            };
            loop {
                let Some(object) = self.parse_term(false)? else {
                    return Ok(None);
                };
                triples.push(TriplePattern {
                    subject: subject.clone(),
                    predicate: predicate.clone(),
                    object,
                });
                if !self.eat_symbol(",") {
                    break;
                }
            }
            if !self.eat_symbol(";") {
                break;
            }
            while self.eat_symbol(";") {}
            if self.at_block_end() {
                break;
            }
        }

        let terminated = self.eat_symbol(".");
        if !terminated && !self.at_block_end() {
            return Err(self.error_here("expected '.' after triple pattern"));
        }
        Ok(Some(TriplesBlock {
            triples,
            terminated,
        }))
    }

    /// True at a token that cannot continue a triples block.
    fn at_block_end(&self) -> bool {
        let token = self.peek();
        token.is_symbol("}")
            || token.is_symbol("{")
            || token.is_symbol(".")
            || token.kind == TokenKind::Eof
            || is_clause_keyword(token)
    }

    fn parse_term(&mut self, verb: bool) -> Result<Option<TermPattern>> {
        let token = self.peek().clone();
        let value = match &token.kind {
            TokenKind::Var(name) => PatternValue::Variable(Variable::new_unchecked(name.as_str())),
            TokenKind::Iri(_) | TokenKind::PrefixedName { .. } | TokenKind::PrefixNs(_) => {
                match self.named_node(&token) {
                    Some(iri) => PatternValue::Iri(iri),
                    None => return Err(self.error(&token, "undeclared prefix")),
                }
            }
            TokenKind::Word(word) if verb && word == "a" => {
                PatternValue::Iri(RDF::new().type_.into_owned())
            }
            _ if verb => return Ok(None),
            TokenKind::BlankNode(label) => PatternValue::BlankNode(label.clone()),
            TokenKind::String(_) => {
                let literal = self.parse_literal()?;
                return Ok(Some(TermPattern {
                    value: PatternValue::Literal(literal),
                    text: self.text_from(token.span.start),
                }));
            }
            TokenKind::Number { lexical, kind } => PatternValue::Literal(
                Literal::new_typed_literal(lexical.as_str(), number_datatype(*kind)),
            ),
            TokenKind::Word(word)
                if word.eq_ignore_ascii_case("true") || word.eq_ignore_ascii_case("false") =>
            {
                PatternValue::Literal(Literal::new_typed_literal(
                    word.to_ascii_lowercase(),
                    xsd::BOOLEAN,
                ))
            }
            _ => return Ok(None),
        };
        self.bump();

        if verb {
            let path_operator = ["/", "|", "^", "*", "+", "?"]
                .iter()
                .any(|op| self.peek().is_symbol(op));
            if path_operator {
                return Ok(None);
            }
        }

        Ok(Some(TermPattern {
            value,
            text: self.text_from(token.span.start),
        }))
    }

    fn parse_literal(&mut self) -> Result<Literal> {
        let token = self.bump();
        let TokenKind::String(value) = &token.kind else {
            return Err(self.error(&token, "expected a string literal"));
        };
        let next = self.peek().clone();
        match &next.kind {
            TokenKind::LangTag(tag) => {
                self.bump();
                Literal::new_language_tagged_literal(value.as_str(), tag.as_str())
                    .map_err(|e| self.error(&next, format!("invalid language tag: {}", e)))
            }
            TokenKind::Symbol("^^") => {
                self.bump();
                let datatype_token = self.bump();
                match self.named_node(&datatype_token) {
                    Some(datatype) => Ok(Literal::new_typed_literal(value.as_str(), datatype)),
                    None => Err(self.error(&datatype_token, "expected a datatype IRI after '^^'")),
                }
            }
            _ => Ok(Literal::new_simple_literal(value.as_str())),
        }
    }

    /// Triples using property paths, blank node property lists or
    /// collections, kept as source text.
    fn parse_opaque_triples(&mut self, start: usize) -> Result<ClauseKind> {
        let mut depth = 0usize;
        let mut terminated = false;
        loop {
            let token = self.peek().clone();
            match &token.kind {
                TokenKind::Eof => return Err(self.error(&token, "unterminated group, expected '}'")),
                TokenKind::Symbol("(") | TokenKind::Symbol("[") => depth += 1,
                TokenKind::Symbol(")") | TokenKind::Symbol("]") => {
                    if depth == 0 {
                        return Err(self.error(&token, "unbalanced closing bracket"));
                    }
                    depth -= 1;
                }
                TokenKind::Symbol(".") if depth == 0 => {
                    self.bump();
                    terminated = true;
                    break;
                }
                TokenKind::Symbol("}") | TokenKind::Symbol("{") if depth == 0 => break,
                _ if depth == 0 && self.pos > start && is_clause_keyword(&token) => break,
                _ => {}
            }
            self.bump();
        }
        Ok(ClauseKind::Opaque(Opaque {
            variables: self.variables_in(start, self.pos),
            triples_like: true,
            terminated,
        }))
    }

    fn parse_modifiers(&mut self) -> Result<Vec<Modifier>> {
        let mut modifiers = Vec::new();
        loop {
            let token = self.peek().clone();
            if token.kind == TokenKind::Eof {
                return Ok(modifiers);
            }
            let leading = self.leading();
            if token.is_keyword("HAVING") {
                self.bump();
                let keyword = self.text_from(token.span.start);
                let constraints = self.parse_having_constraints()?;
                modifiers.push(Modifier::Having(Having {
                    leading,
                    keyword,
                    constraints,
                }));
            } else if is_modifier_keyword(&token) {
                self.bump();
                self.skip_modifier_body();
                let segment = Segment {
                    leading,
                    text: self.text_from(token.span.start),
                };
                if token.is_keyword("GROUP") {
                    modifiers.push(Modifier::GroupBy(segment));
                } else {
                    modifiers.push(Modifier::Other(segment));
                }
            } else {
                return Err(self.error(&token, "unexpected token after the WHERE group"));
            }
        }
    }

    fn skip_modifier_body(&mut self) {
        let mut depth = 0usize;
        loop {
            let token = self.peek();
            if token.kind == TokenKind::Eof || (depth == 0 && is_modifier_keyword(token)) {
                return;
            }
            if token.is_symbol("(") || token.is_symbol("{") {
                depth += 1;
            } else if token.is_symbol(")") || token.is_symbol("}") {
                depth = depth.saturating_sub(1);
            }
            self.bump();
        }
    }

    fn parse_having_constraints(&mut self) -> Result<Vec<HavingConstraint>> {
        let mut constraints = Vec::new();
        loop {
            let token = self.peek().clone();
            let call = matches!(
                token.kind,
                TokenKind::Word(_) | TokenKind::PrefixedName { .. } | TokenKind::Iri(_)
            ) && !is_modifier_keyword(&token)
                && self.peek_at(1).is_symbol("(");
            if !token.is_symbol("(") && !call {
                break;
            }
            let leading = self.leading();
            let start = self.pos;
            if call {
                self.bump();
            }
            self.skip_balanced("(", ")")?;
            constraints.push(HavingConstraint {
                leading,
                text: self.text_from(token.span.start),
                guard: recognize_guard(&self.tokens[start..self.pos]),
            });
        }
        if constraints.is_empty() {
            return Err(self.error_here("expected a HAVING constraint"));
        }
        Ok(constraints)
    }
}

/// Index of the token closing the bracket opened at `open`.
fn matching_close(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        if token.is_symbol("(") {
            depth += 1;
        } else if token.is_symbol(")") {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Remove redundant outer parentheses.
fn strip_parens(mut tokens: &[Token]) -> &[Token] {
    while tokens.len() >= 2
        && tokens[0].is_symbol("(")
        && matching_close(tokens, 0) == Some(tokens.len() - 1)
    {
        tokens = &tokens[1..tokens.len() - 1];
    }
    tokens
}

/// Recognise `(min(?v) op number)`.
fn recognize_guard(tokens: &[Token]) -> Option<AggregateGuard> {
    let tokens = strip_parens(tokens);
    let (head, number) = match tokens {
        [head @ .., sign, number] if sign.is_symbol("-") || sign.is_symbol("+") => {
            (head, number_literal(number, sign.is_symbol("-"))?)
        }
        [head @ .., number] => (head, number_literal(number, false)?),
        _ => return None,
    };
    match head {
        [func, open, var, close, op]
            if func.is_keyword("min") && open.is_symbol("(") && close.is_symbol(")") =>
        {
            let TokenKind::Var(name) = &var.kind else {
                return None;
            };
            let TokenKind::Symbol(symbol) = &op.kind else {
                return None;
            };
            Some(AggregateGuard {
                variable: Variable::new_unchecked(name.as_str()),
                op: CompareOp::from_symbol(symbol)?,
                bound: number,
            })
        }
        _ => None,
    }
}

fn number_literal(token: &Token, negative: bool) -> Option<Literal> {
    let TokenKind::Number { lexical, kind } = &token.kind else {
        return None;
    };
    let lexical = if negative {
        format!("-{}", lexical)
    } else {
        lexical.clone()
    };
    Some(Literal::new_typed_literal(lexical, number_datatype(*kind)))
}

fn number_datatype(kind: NumberKind) -> NamedNodeRef<'static> {
    match kind {
        NumberKind::Integer => xsd::INTEGER,
        NumberKind::Decimal => xsd::DECIMAL,
        NumberKind::Double => xsd::DOUBLE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROLOGUE: &str = "PREFIX ex: <http://example.org/ns#>\n\
                            PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>\n";

    fn parse(body: &str) -> Query {
        Query::parse(&format!("{}{}", PROLOGUE, body)).unwrap()
    }

    fn ex(local: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.org/ns#{}", local))
    }

    #[test]
    fn test_clause_kinds() {
        let query = parse(
            "SELECT ?name WHERE {\n\
             ?s a ex:Person ; ex:name ?name .\n\
             OPTIONAL { ?s ex:mbox ?m }\n\
             FILTER (datatype(?m) = xsd:string)\n\
             FILTER (langMatches(lang(?name), \"en\"))\n\
             FILTER regex(str(?m), \"work\", \"i\")\n\
             { ?s ex:knows ?o } UNION { ?o ex:knows ?s }\n\
             ?s ex:knows/ex:name ?friend .\n\
             }",
        );
        let kinds: Vec<_> = query.clauses().iter().map(|c| c.kind()).collect();
        assert_eq!(kinds.len(), 7);

        let ClauseKind::Triples(block) = kinds[0] else {
            panic!("expected triples, got {:?}", kinds[0]);
        };
        assert_eq!(block.triples().len(), 2);
        assert!(block.terminated);
        assert_eq!(
            block.triples()[0].predicate().as_iri().map(|n| n.as_str()),
            Some("http://www.w3.org/1999/02/22-rdf-syntax-ns#type")
        );

        let ClauseKind::Optional(optional) = kinds[1] else {
            panic!("expected optional");
        };
        let triple = optional.single_triple().unwrap();
        assert_eq!(triple.predicate().as_iri(), Some(&ex("mbox")));
        assert_eq!(triple.predicate().text(), "ex:mbox");

        assert!(matches!(
            kinds[2],
            ClauseKind::Filter(Filter {
                condition: FilterCondition::Datatype { .. },
                ..
            })
        ));
        assert!(matches!(
            kinds[3],
            ClauseKind::Filter(Filter {
                condition: FilterCondition::LangMatches { .. },
                ..
            })
        ));
        assert!(matches!(
            kinds[4],
            ClauseKind::Filter(Filter {
                condition: FilterCondition::Other,
                ..
            })
        ));
        assert!(matches!(kinds[5], ClauseKind::Opaque(o) if !o.triples_like));
        assert!(matches!(kinds[6], ClauseKind::Opaque(o) if o.triples_like && o.terminated));
    }

    #[test]
    fn test_datatype_filter_either_operand_order() {
        let query = parse("SELECT * WHERE { ?s ex:mbox ?m FILTER (xsd:string = datatype(?m)) }");
        let ClauseKind::Filter(filter) = query.clauses()[1].kind() else {
            panic!("expected filter");
        };
        assert_eq!(
            filter.condition(),
            &FilterCondition::Datatype {
                variable: Variable::new_unchecked("m"),
                datatype: NamedNode::new_unchecked("http://www.w3.org/2001/XMLSchema#string"),
            }
        );
    }

    #[test]
    fn test_modifiers_and_having_guards() {
        let query = parse(
            "SELECT ?s (min(?age) AS ?youngest) WHERE { ?s ex:age ?age }\n\
             GROUP BY ?s\n\
             HAVING (min(?age) >= 0) (count(?age) > 1) (MIN(?age) < -5)\n\
             ORDER BY ?s LIMIT 10",
        );
        assert!(query.has_group_by());
        assert_eq!(query.modifiers().len(), 4);
        let guards: Vec<_> = query.having_constraints().map(|c| c.guard()).collect();
        assert_eq!(guards.len(), 3);
        let first = guards[0].unwrap();
        assert_eq!(first.variable().as_str(), "age");
        assert_eq!(first.op(), CompareOp::Ge);
        assert_eq!(first.bound(), &Literal::new_typed_literal("0", xsd::INTEGER));
        assert!(guards[1].is_none());
        assert_eq!(
            guards[2].unwrap().bound(),
            &Literal::new_typed_literal("-5", xsd::INTEGER)
        );
    }

    #[test]
    fn test_exists_filters() {
        let body = "SELECT * WHERE {\n  ?p a ex:Person .\n  FILTER NOT EXISTS { ?p ex:mbox ?m . FILTER (?m != \"x\") } .\n  filter exists { ?p ex:age ?a }\n}";
        let query = parse(body);
        assert_eq!(query.to_string(), format!("{}{}", PROLOGUE, body));
        assert_eq!(query.clauses().len(), 3);
        for clause in &query.clauses()[1..] {
            let ClauseKind::Filter(filter) = clause.kind() else {
                panic!("expected a filter, got {:?}", clause.kind());
            };
            assert_eq!(filter.condition(), &FilterCondition::Other);
            assert!(!clause.mentions(&Variable::new_unchecked("m")));
        }
        assert!(query.clauses()[1].is_terminated());

        let err = Query::parse("SELECT * WHERE { FILTER NOT { ?s ?p ?o } }").unwrap_err();
        assert!(err.message.contains("EXISTS"));
    }

    #[test]
    fn test_ask_query() {
        let query = parse("ASK { ?s ex:age ?a }");
        assert_eq!(query.form(), QueryForm::Ask);
        assert_eq!(query.clauses().len(), 1);
    }

    #[test]
    fn test_undeclared_prefix_is_an_error() {
        let err = Query::parse("SELECT * WHERE { ?s foaf:name ?n }").unwrap_err();
        assert!(err.message.contains("foaf"));
        assert_eq!(err.column, 21);
    }

    #[test]
    fn test_unterminated_group_is_an_error() {
        let err = Query::parse("SELECT * WHERE { ?s ?p ?o .").unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_construct_is_rejected() {
        assert!(Query::parse("CONSTRUCT { ?s ?p ?o } WHERE { ?s ?p ?o }").is_err());
    }

    #[test]
    fn test_literals_in_triples() {
        let query = parse("SELECT * WHERE { ?s ex:label \"chat\"@fr ; ex:age 42 ; ex:ok true }");
        let ClauseKind::Triples(block) = query.clauses()[0].kind() else {
            panic!("expected triples");
        };
        let objects: Vec<_> = block.triples().iter().map(|t| t.object().text()).collect();
        assert_eq!(objects, vec!["\"chat\"@fr", "42", "true"]);
        assert!(!block.terminated);
    }
}
