// src/extract/table.rs

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array, Int64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Node};
use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};
use tracing::{debug, trace};

use super::ExtractError;

static FOOTNOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").expect("footnote pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Visible text of a cell: `<br>` read as a space, footnote markers dropped,
/// whitespace collapsed.
pub fn cell_text(cell: ElementRef<'_>) -> String {
    let mut raw = String::new();
    for node in cell.descendants() {
        match node.value() {
            Node::Text(text) => raw.push_str(text),
            Node::Element(el) if el.name() == "br" => raw.push(' '),
            _ => {}
        }
    }
    let stripped = FOOTNOTE.replace_all(&raw, "");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

/// Numeric reading of a cell, thousands separators ignored.
/// Words that Rust would accept as floats (`inf`, `-NaN`, `+infinity`) stay
/// text; only an exponent marker may be a letter.
pub fn parse_number(s: &str) -> Option<f64> {
    if s.chars().any(|c| c.is_alphabetic() && !matches!(c, 'e' | 'E')) {
        return None;
    }
    s.replace(',', "").parse().ok()
}

fn parse_integer(s: &str) -> Option<i64> {
    s.replace(',', "").parse().ok()
}

/// Narrowest of Int64 → Float64 → Utf8 that every non-empty cell fits.
pub fn infer_dtype(values: &[Option<String>]) -> DataType {
    let present: Vec<&str> = values.iter().flatten().map(String::as_str).collect();
    if present.is_empty() {
        DataType::Utf8
    } else if present.iter().all(|s| parse_integer(s).is_some()) {
        DataType::Int64
    } else if present.iter().all(|s| parse_number(s).is_some()) {
        DataType::Float64
    } else {
        DataType::Utf8
    }
}

fn build_column(values: &[Option<String>], dtype: &DataType) -> ArrayRef {
    match dtype {
        DataType::Int64 => Arc::new(
            values
                .iter()
                .map(|v| v.as_deref().and_then(parse_integer))
                .collect::<Int64Array>(),
        ),
        DataType::Float64 => Arc::new(
            values
                .iter()
                .map(|v| v.as_deref().and_then(parse_number))
                .collect::<Float64Array>(),
        ),
        _ => Arc::new(values.iter().map(|v| v.as_deref()).collect::<StringArray>()),
    }
}

/// Header text → column name, applying aliases and making names unique.
fn column_names(headers: &[String], aliases: &BTreeMap<String, String>) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let base = match aliases.get(h) {
                Some(alias) => alias.clone(),
                None if h.is_empty() => format!("Unnamed: {}", i),
                None => h.clone(),
            };
            let mut name = base.clone();
            let mut n = 0;
            while !seen.insert(name.clone()) {
                n += 1;
                name = format!("{}.{}", base, n);
            }
            name
        })
        .collect()
}

struct Row {
    has_header_cells: bool,
    has_data_cells: bool,
    cells: Vec<String>,
}

fn read_row(tr: ElementRef<'_>) -> Row {
    let mut row = Row {
        has_header_cells: false,
        has_data_cells: false,
        cells: Vec::new(),
    };
    for cell in tr.children().filter_map(ElementRef::wrap) {
        match cell.value().name() {
            "th" => row.has_header_cells = true,
            "td" => row.has_data_cells = true,
            _ => continue,
        }
        row.cells.push(cell_text(cell));
    }
    row
}

/// Rows owned by `table` itself: direct `<tr>` children and those of its
/// `thead`/`tbody`/`tfoot`. Rows of tables nested in a cell are skipped.
fn own_rows<'a>(table: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|el| el.value().name() == "tr"),
            ),
            _ => {}
        }
    }
    rows
}

/// Convert an HTML `<table>` into a typed batch.
///
/// The header is the first row carrying `<th>` cells, or the first row when
/// none do. Every later row with at least one `<td>` is data; it is padded
/// with nulls or cut to the header width.
pub fn table_to_batch(
    table: ElementRef<'_>,
    aliases: &BTreeMap<String, String>,
) -> Result<RecordBatch> {
    let rows: Vec<Row> = own_rows(table).into_iter().map(read_row).collect();

    let header_idx = rows
        .iter()
        .position(|r| r.has_header_cells)
        .or_else(|| (!rows.is_empty()).then_some(0))
        .ok_or(ExtractError::NoHeader)?;
    let headers = &rows[header_idx].cells;
    if headers.is_empty() {
        return Err(ExtractError::NoHeader.into());
    }
    let names = column_names(headers, aliases);
    debug!(?names, "table header");

    let width = names.len();
    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
    for row in rows.iter().skip(header_idx + 1).filter(|r| r.has_data_cells) {
        if row.cells.len() != width {
            trace!(cells = row.cells.len(), width, "ragged row");
        }
        for (i, col) in columns.iter_mut().enumerate() {
            let value = row.cells.get(i).filter(|s| !s.is_empty()).cloned();
            col.push(value);
        }
    }

    let mut fields = Vec::with_capacity(width);
    let mut arrays = Vec::with_capacity(width);
    for (name, values) in names.iter().zip(&columns) {
        let dtype = infer_dtype(values);
        arrays.push(build_column(values, &dtype));
        fields.push(Field::new(name.as_str(), dtype, true));
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .context("assembling extracted table")
}
