// src/query.rs

use anyhow::{Context, Result};
use rusqlite::{types::ValueRef, Connection};
use std::{fmt, path::Path};
use tracing::{debug, instrument};

/// Column names plus every row of one statement, rendered as text.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

fn render(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => format!("{:?}", f),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &self.rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }

        let line = |f: &mut fmt::Formatter<'_>, cells: &[String]| -> fmt::Result {
            let padded: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{: <w$}", c, w = *w))
                .collect();
            writeln!(f, "{}", padded.join(" | ").trim_end())
        };

        line(f, &self.columns)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", rule.join("-+-"))?;
        for row in &self.rows {
            line(f, row)?;
        }
        write!(f, "({} rows)", self.rows.len())
    }
}

/// Run one statement verbatim and collect its full result set.
pub fn run_query(conn: &Connection, sql: &str) -> Result<QueryResult> {
    let mut stmt = conn
        .prepare(sql)
        .with_context(|| format!("preparing query {:?}", sql))?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut out = Vec::new();
    let mut rows = stmt
        .query([])
        .with_context(|| format!("running query {:?}", sql))?;
    while let Some(row) = rows.next()? {
        let cells = (0..columns.len())
            .map(|i| row.get_ref(i).map(render))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        out.push(cells);
    }
    debug!(sql, rows = out.len(), "query finished");

    Ok(QueryResult {
        sql: sql.to_string(),
        columns,
        rows: out,
    })
}

/// Open the store, run `queries` in order, print each result, close the store.
/// Queries are not parameterised; pass only trusted SQL.
#[instrument(level = "info", skip(queries))]
pub fn run_queries(db_path: &Path, queries: &[String]) -> Result<Vec<QueryResult>> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening store {}", db_path.display()))?;

    let mut results = Vec::with_capacity(queries.len());
    for sql in queries {
        let result = run_query(&conn, sql)?;
        println!("{}\n{}\n", result.sql, result);
        results.push(result);
    }
    Ok(results)
}
