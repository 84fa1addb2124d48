// src/load/sqlite.rs

use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{Array, ArrayRef, Float64Array, Int64Array, StringArray},
    compute::cast,
    datatypes::DataType,
    record_batch::RecordBatch,
};
use rusqlite::{params_from_iter, types::Value, Connection};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Quote an identifier so page headers like `Market cap (US$ billion)` survive.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn sql_type(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::Boolean => "INTEGER",
        DataType::Float16 | DataType::Float32 | DataType::Float64 => "REAL",
        _ => "TEXT",
    }
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| anyhow!("unexpected array type {}", array.data_type()))
}

/// Converts one column into SQLite values.
fn column_values(array: &ArrayRef) -> Result<Vec<Value>> {
    let array = match array.data_type() {
        DataType::Int64 | DataType::Float64 | DataType::Utf8 => array.clone(),
        DataType::Float16 | DataType::Float32 => cast(array, &DataType::Float64)?,
        dt if sql_type(dt) == "INTEGER" => cast(array, &DataType::Int64)?,
        _ => cast(array, &DataType::Utf8)?,
    };

    let values = match array.data_type() {
        DataType::Int64 => downcast::<Int64Array>(&array)?
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Integer))
            .collect(),
        DataType::Float64 => downcast::<Float64Array>(&array)?
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Real))
            .collect(),
        _ => downcast::<StringArray>(&array)?
            .iter()
            .map(|v| v.map_or(Value::Null, |s| Value::Text(s.to_string())))
            .collect(),
    };
    Ok(values)
}

/// Replace `table` in the store at `db_path` with the contents of `batch`.
///
/// Drop, create and insert run in one transaction, so a failed insert leaves
/// the previous table in place. Returns the number of rows written.
#[instrument(level = "info", skip(batch))]
pub fn write_table(batch: &RecordBatch, db_path: &Path, table: &str) -> Result<usize> {
    let mut conn = Connection::open(db_path)
        .with_context(|| format!("opening store {}", db_path.display()))?;

    let schema = batch.schema();
    let columns: Vec<Vec<Value>> = batch
        .columns()
        .iter()
        .map(column_values)
        .collect::<Result<_>>()?;

    let table_ident = quote_ident(table);
    let column_defs = schema
        .fields()
        .iter()
        .map(|f| format!("{} {}", quote_ident(f.name()), sql_type(f.data_type())))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; schema.fields().len()].join(", ");

    let tx = conn.transaction().context("starting transaction")?;
    tx.execute(&format!("DROP TABLE IF EXISTS {}", table_ident), [])
        .with_context(|| format!("dropping {}", table))?;
    tx.execute(
        &format!("CREATE TABLE {} ({})", table_ident, column_defs),
        [],
    )
    .with_context(|| format!("creating {}", table))?;
    debug!(%column_defs, "created table");

    {
        let mut stmt = tx
            .prepare(&format!("INSERT INTO {} VALUES ({})", table_ident, placeholders))
            .with_context(|| format!("preparing insert into {}", table))?;
        for row in 0..batch.num_rows() {
            stmt.execute(params_from_iter(columns.iter().map(|c| &c[row])))
                .with_context(|| format!("inserting row {} into {}", row, table))?;
        }
    }
    tx.commit().context("committing table replace")?;

    info!(rows = batch.num_rows(), table, "stored table");
    Ok(batch.num_rows())
}
