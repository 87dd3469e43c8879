//! Printing the clause model back to SPARQL text.

use std::fmt;

use super::ast::{Clause, GroupPattern, Having, Modifier, Query, Segment, TriplePattern};

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.head)?;
        write!(f, "{}", self.pattern)?;
        for modifier in &self.modifiers {
            write!(f, "{}", modifier)?;
        }
        f.write_str(&self.trailing)
    }
}

impl fmt::Display for GroupPattern {
    /// Prints the clauses and the closing brace; the opening brace belongs to
    /// whatever precedes the group.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_clauses(f, &self.clauses)?;
        f.write_str(&self.closing)?;
        f.write_str("}")
    }
}

/// Adjacent triples blocks need a `.` between them. Parsed input always has
/// one; a rewrite that drops a terminator or deletes a clause may not.
fn write_clauses(f: &mut fmt::Formatter<'_>, clauses: &[Clause]) -> fmt::Result {
    for (i, clause) in clauses.iter().enumerate() {
        f.write_str(&clause.leading)?;
        f.write_str(&clause.text)?;
        let next_is_triples = clauses.get(i + 1).is_some_and(Clause::is_triples_like);
        if clause.is_triples_like() && !clause.is_terminated() && next_is_triples {
            f.write_str(" .")?;
        }
    }
    Ok(())
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.subject.text, self.predicate.text, self.object.text
        )
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::GroupBy(segment) | Modifier::Other(segment) => write!(f, "{}", segment),
            Modifier::Having(having) => write!(f, "{}", having),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.leading)?;
        f.write_str(&self.text)
    }
}

impl fmt::Display for Having {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.leading)?;
        f.write_str(&self.keyword)?;
        for constraint in &self.constraints {
            f.write_str(&constraint.leading)?;
            f.write_str(&constraint.text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::query::Query;

    #[test]
    fn test_round_trip_is_byte_exact() {
        let sources = [
            "PREFIX ex: <http://example.org/ns#>\nSELECT ?s WHERE { ?s ex:p ?o }",
            "# leading comment\nPREFIX ex: <http://example.org/ns#>\n\n\
             SELECT ?name ?mbox\nWHERE {\n  ?subject ex:name ?name .\n  \
             OPTIONAL{?subject ex:mbox ?mbox.}  # trailing comment\n  \
             FILTER regex(str(?mbox), \"work\", \"i\") .\n}\n",
            "PREFIX ex: <http://example.org/ns#>\nSELECT ?s (MIN(?a) AS ?m)\n\
             WHERE { ?s ex:age ?a }\nGROUP BY ?s\nHAVING(min(?a)>=0)  (count(?a) > 1)\n\
             ORDER BY DESC(?m)\nLIMIT 5\n",
            "ASK WHERE { { ?s ?p ?o } UNION { ?o ?p ?s } . BIND(1 AS ?x) VALUES ?x { 1 2 } }",
        ];
        for source in sources {
            let query = Query::parse(source).unwrap();
            assert_eq!(query.to_string(), source);
        }
    }
}
