mod common;

use proptest::prelude::*;
use shapeopt::compare::same_rows;
use shapeopt::query::{Clause, ClauseKind};
use shapeopt::{Query, RewriteConfig, RewritePolicy, Rewriter, Validator};

const PROLOGUE: &str = "PREFIX ex: <http://example.org/ns#>\n\
                        PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>\n";

const CLAUSES: &[&str] = &[
    "?p a ex:Person .",
    "?p ex:name ?name .",
    "?p ex:age ?age .",
    "?p ex:mbox ?other .",
    "?x ex:mbox ?mbox .",
    "OPTIONAL { ?p ex:mbox ?mbox }",
    "OPTIONAL { ?p ex:mbox ?mbox . } .",
    "OPTIONAL { ?p ex:bio ?bio }",
    "OPTIONAL { ?p ex:age ?age }",
    "OPTIONAL{?p ex:name ?name}",
    "FILTER (datatype(?mbox) = xsd:string)",
    "FILTER (xsd:string = datatype(?name)) .",
    "FILTER (langMatches(lang(?bio), \"en\"))",
    "FILTER (langMatches(lang(?bio), \"*\"))",
    "FILTER (?age > 25)",
    "FILTER NOT EXISTS { ?p ex:bio ?bio }",
    "{ ?p ex:name ?name } UNION { ?p ex:bio ?bio }",
    "# a comment\n  ?p ex:name ?name .",
];

const GUARDS: &[&str] = &[
    "(min(?age) >= 0)",
    "(min(?age) > -1)",
    "(min(?age) >= 30)",
    "(count(?age) > 0)",
    "(min(?age) >= 0) (count(?p) >= 1)",
];

fn build_query(clauses: &[&str], guard: Option<&str>) -> String {
    let body: String = clauses.iter().map(|c| format!("  {}\n", c)).collect();
    match guard {
        Some(guard) => format!(
            "{}SELECT ?p (MIN(?age) AS ?youngest)\nWHERE {{\n{}}}\nGROUP BY ?p\nHAVING {}\n",
            PROLOGUE, body, guard
        ),
        None => format!("{}SELECT *\nWHERE {{\n{}}}\n", PROLOGUE, body),
    }
}

fn query_strategy() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(prop::sample::select(CLAUSES), 1..7),
        prop::option::of(prop::sample::select(GUARDS)),
    )
        .prop_map(|(clauses, guard)| build_query(&clauses, guard))
}

/// What a clause asserts, with an OPTIONAL wrapper and terminator removed.
fn signature(clause: &Clause) -> String {
    match clause.kind() {
        ClauseKind::Optional(optional) => match optional.single_triple() {
            Some(triple) => triple.to_string(),
            None => clause.text().to_string(),
        },
        _ => clause.text().trim_end_matches('.').trim_end().to_string(),
    }
}

fn is_subsequence(short: &[String], long: &[String]) -> bool {
    let mut long = long.iter();
    short.iter().all(|item| long.any(|candidate| candidate == item))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn parse_then_print_is_identity(text in query_strategy()) {
        let query = Query::parse(&text).unwrap();
        prop_assert_eq!(query.to_string(), text);
    }

    #[test]
    fn rewrites_are_idempotent_and_conservative(
        text in query_strategy(),
        legacy in any::<bool>(),
    ) {
        let model = common::shapes().unwrap();
        let data = common::data().unwrap();
        let report = Validator::new(&model).validate(&data).unwrap();
        let policy = if legacy { RewritePolicy::Legacy } else { RewritePolicy::Strict };
        let rewriter = Rewriter::new(
            report.validated().unwrap(),
            RewriteConfig::default().with_policy(policy),
        );

        let original = Query::parse(&text).unwrap();
        let once = rewriter.rewrite(&original);
        let twice = rewriter.rewrite(&once.query);
        prop_assert!(!twice.changed());
        prop_assert_eq!(twice.query.to_string(), once.query.to_string());

        // The printed rewrite parses back to the same clauses.
        let reparsed = Query::parse(&once.query.to_string()).unwrap();
        prop_assert_eq!(reparsed.clauses().len(), once.query.clauses().len());

        // No clause is added or moved.
        let before: Vec<String> = original.clauses().iter().map(signature).collect();
        let after: Vec<String> = once.query.clauses().iter().map(signature).collect();
        prop_assert!(is_subsequence(&after, &before), "{:?} is not within {:?}", after, before);
        prop_assert!(
            once.query.having_constraints().count() <= original.having_constraints().count()
        );
    }

    #[test]
    fn strict_rewrites_preserve_results(text in query_strategy()) {
        let model = common::shapes().unwrap();
        let data = common::data().unwrap();
        let report = Validator::new(&model).validate(&data).unwrap();
        let rewriter = Rewriter::new(report.validated().unwrap(), RewriteConfig::default());

        let original = Query::parse(&text).unwrap();
        let rewrite = rewriter.rewrite(&original);
        let before = data.execute(&original).unwrap();
        let after = data.execute(&rewrite.query).unwrap();
        prop_assert!(
            same_rows(&before, &after),
            "results differ for\n{}\nrewritten to\n{}",
            text,
            rewrite.query
        );
    }
}
