// src/transform/mod.rs

use anyhow::{anyhow, bail, Context, Result};
use arrow::{
    array::{Array, ArrayRef, Float64Array, StringArray},
    compute::{cast_with_options, CastOptions},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::{path::Path, sync::Arc};
use tracing::{info, instrument, warn};

use crate::{extract::table::parse_number, progress::ProgressLog};

pub mod rates;

pub use rates::ExchangeRates;

/// What `transform` did with its input.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOutcome {
    Converted(RecordBatch),
    /// The USD column was missing; `batch` is the input, untouched.
    Unchanged { batch: RecordBatch, reason: String },
}

impl TransformOutcome {
    pub fn is_converted(&self) -> bool {
        matches!(self, TransformOutcome::Converted(_))
    }

    pub fn batch(&self) -> &RecordBatch {
        match self {
            TransformOutcome::Converted(batch) | TransformOutcome::Unchanged { batch, .. } => batch,
        }
    }

    pub fn into_batch(self) -> RecordBatch {
        match self {
            TransformOutcome::Converted(batch) | TransformOutcome::Unchanged { batch, .. } => batch,
        }
    }
}

/// Two decimals, ties away from zero.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn converted_column_name(code: &str) -> String {
    format!("MC_{}_Billion", code)
}

/// Load the rate table and add one `MC_<CODE>_Billion` column per currency.
///
/// A table without `usd_column` is handed back as
/// [`TransformOutcome::Unchanged`] after one error line is logged.
#[instrument(level = "info", skip(batch, log))]
pub fn transform(
    batch: RecordBatch,
    rates_path: &Path,
    usd_column: &str,
    currencies: &[String],
    log: &ProgressLog,
) -> Result<TransformOutcome> {
    log.log(&["Transforming bank table"])?;

    let rates = ExchangeRates::from_csv(rates_path)?;

    let schema = batch.schema();
    let Some((usd_idx, _)) = schema.column_with_name(usd_column) else {
        let reason = format!("Error: '{}' column not found in the table", usd_column);
        warn!(column = usd_column, "leaving table unchanged");
        log.log(&[reason.as_str()])?;
        return Ok(TransformOutcome::Unchanged { batch, reason });
    };

    let converted = convert(&batch, usd_idx, &rates, currencies)?;
    info!(
        added = currencies.len(),
        rows = converted.num_rows(),
        "converted market caps"
    );

    log.log(&["Transformation completed"])?;
    Ok(TransformOutcome::Converted(converted))
}

/// USD amounts as Float64. Text cells are read like page cells; one that is
/// not a number fails the whole column instead of turning into a null.
fn usd_values(array: &ArrayRef) -> Result<Float64Array> {
    if let Some(text) = array.as_any().downcast_ref::<StringArray>() {
        return text
            .iter()
            .enumerate()
            .map(|(row, cell)| match cell.map(str::trim) {
                None | Some("") => Ok(None),
                Some(s) => match parse_number(s) {
                    Some(x) => Ok(Some(x)),
                    None => bail!("USD market cap {:?} in row {} is not a number", s, row),
                },
            })
            .collect();
    }

    let strict = CastOptions {
        safe: false,
        ..Default::default()
    };
    let floats = cast_with_options(array, &DataType::Float64, &strict)
        .context("casting USD market cap to Float64")?;
    floats
        .as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| anyhow!("USD market cap did not cast to Float64"))
}

/// Append (or overwrite) the converted columns computed from column `usd_idx`.
pub fn convert(
    batch: &RecordBatch,
    usd_idx: usize,
    rates: &ExchangeRates,
    currencies: &[String],
) -> Result<RecordBatch> {
    let usd = usd_values(batch.column(usd_idx))?;

    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();

    for code in currencies {
        let rate = rates.rate(code)?;
        let values: Float64Array = usd.iter().map(|v| v.map(|x| round2(x * rate))).collect();
        let name = converted_column_name(code);
        let field = Field::new(name.as_str(), DataType::Float64, true);
        let array = Arc::new(values) as ArrayRef;

        match fields.iter().position(|f| f.name() == &name) {
            Some(i) => {
                fields[i] = field;
                columns[i] = array;
            }
            None => {
                fields.push(field);
                columns.push(array);
            }
        }
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .context("assembling transformed table")
}
