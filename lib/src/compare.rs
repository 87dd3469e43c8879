//! Runs an original query and its rewrite against the same data graph,
//! timing both and checking that they return the same rows.

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use log::info;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::Result;
use crate::graph::{DataGraph, Row};
use crate::query::Query;

/// Wall-clock statistics over the timed runs of one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timing {
    pub runs: usize,
    pub total_secs: f64,
    pub mean_secs: f64,
    pub min_secs: f64,
    pub max_secs: f64,
}

impl Timing {
    fn from_runs(durations: &[Duration]) -> Self {
        let secs: Vec<f64> = durations.iter().map(Duration::as_secs_f64).collect();
        let total: f64 = secs.iter().sum();
        let runs = secs.len();
        if runs == 0 {
            return Timing {
                runs,
                total_secs: 0.0,
                mean_secs: 0.0,
                min_secs: 0.0,
                max_secs: 0.0,
            };
        }
        Timing {
            runs,
            total_secs: total,
            mean_secs: total / runs as f64,
            min_secs: secs.iter().copied().fold(f64::INFINITY, f64::min),
            max_secs: secs.iter().copied().fold(0.0, f64::max),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Execution {
    pub rows: Vec<Row>,
    pub timing: Timing,
}

#[derive(Debug, Clone)]
pub struct Comparison {
    pub original: Execution,
    pub rewritten: Execution,
    /// Whether both queries returned the same multiset of rows.
    pub results_match: bool,
}

impl Comparison {
    /// Mean time of the original divided by mean time of the rewrite.
    pub fn speedup(&self) -> Option<f64> {
        (self.rewritten.timing.mean_secs > 0.0)
            .then(|| self.original.timing.mean_secs / self.rewritten.timing.mean_secs)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "resultsMatch": self.results_match,
            "speedup": self.speedup(),
            "original": {
                "rows": self.original.rows.len(),
                "timing": self.original.timing,
            },
            "rewritten": {
                "rows": self.rewritten.rows.len(),
                "timing": self.rewritten.timing,
            },
        })
    }
}

/// Executes `query` once untimed to warm the store, then `runs` more times
/// under the clock. The rows of the last run are kept.
pub fn time_query(data: &DataGraph, query: &Query, runs: usize) -> Result<Execution> {
    let text = query.to_string();
    let mut rows = data.execute_str(&text)?;
    let mut durations = Vec::with_capacity(runs);
    for _ in 0..runs {
        let start = Instant::now();
        rows = data.execute_str(&text)?;
        durations.push(start.elapsed());
    }
    Ok(Execution {
        rows,
        timing: Timing::from_runs(&durations),
    })
}

/// Times `original` then `rewritten`, each in its own sequential section.
pub fn compare(data: &DataGraph, original: &Query, rewritten: &Query, runs: usize) -> Result<Comparison> {
    let runs = runs.max(1);
    let original = time_query(data, original, runs)?;
    let rewritten = time_query(data, rewritten, runs)?;
    let results_match = same_rows(&original.rows, &rewritten.rows);
    info!(
        "Original: {} rows, mean {:.6}s; rewritten: {} rows, mean {:.6}s; results match: {}",
        original.rows.len(),
        original.timing.mean_secs,
        rewritten.rows.len(),
        rewritten.timing.mean_secs,
        results_match
    );
    Ok(Comparison {
        original,
        rewritten,
        results_match,
    })
}

/// Multiset equality of two result sets; row order is ignored.
pub fn same_rows(left: &[Row], right: &[Row]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut counts: HashMap<&Row, isize> = HashMap::new();
    for row in left {
        *counts.entry(row).or_default() += 1;
    }
    for row in right {
        *counts.entry(row).or_default() -= 1;
    }
    counts.values().all(|&count| count == 0)
}

/// Renders rows as a `|`-separated table, one column per variable bound in
/// any row. Unbound cells are left empty.
pub fn format_table(rows: &[Row]) -> String {
    let columns: BTreeSet<&str> = rows.iter().flat_map(|r| r.keys().map(String::as_str)).collect();
    let mut table = columns.iter().copied().collect::<Vec<_>>().join(" | ");
    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| row.get(*column).map(|t| t.to_string()).unwrap_or_default())
            .collect();
        table.push('\n');
        table.push_str(&cells.join(" | "));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::{Literal, Term};

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Term::from(Literal::new_simple_literal(*v))))
            .collect()
    }

    #[test]
    fn test_same_rows_is_order_insensitive_multiset_equality() {
        let a = vec![row(&[("x", "1")]), row(&[("x", "2")]), row(&[("x", "2")])];
        let b = vec![row(&[("x", "2")]), row(&[("x", "1")]), row(&[("x", "2")])];
        let c = vec![row(&[("x", "1")]), row(&[("x", "1")]), row(&[("x", "2")])];
        assert!(same_rows(&a, &b));
        assert!(!same_rows(&a, &c));
        assert!(!same_rows(&a, &a[..2]));
    }

    #[test]
    fn test_format_table_leaves_unbound_cells_empty() {
        let rows = vec![row(&[("a", "1"), ("b", "2")]), row(&[("a", "3")])];
        assert_eq!(format_table(&rows), "a | b\n\"1\" | \"2\"\n\"3\" | ");
    }

    #[test]
    fn test_compare_times_both_queries() {
        let data = DataGraph::from_turtle(
            "@prefix ex: <http://example.org/ns#> .\nex:a ex:p 1 .\nex:b ex:p 2 .",
            None,
        )
        .unwrap();
        let original = Query::parse(
            "PREFIX ex: <http://example.org/ns#>\nSELECT ?s WHERE { ?s ex:p ?o FILTER(?o > 0) }",
        )
        .unwrap();
        let rewritten =
            Query::parse("PREFIX ex: <http://example.org/ns#>\nSELECT ?s WHERE { ?s ex:p ?o }")
                .unwrap();
        let comparison = compare(&data, &original, &rewritten, 0).unwrap();
        assert!(comparison.results_match);
        assert_eq!(comparison.original.timing.runs, 1);
        assert_eq!(comparison.rewritten.rows.len(), 2);
        assert_eq!(comparison.to_json()["resultsMatch"], json!(true));
    }
}
