use anyhow::{Context, Result};
use arrow::{
    compute::concat_batches,
    csv::{ReaderBuilder, WriterBuilder},
    datatypes::SchemaRef,
    record_batch::RecordBatch,
};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};
use tracing::debug;

/// Write `batch` as comma-separated text with a header row, replacing any
/// existing file. Not atomic: a crash mid-write leaves a truncated file.
pub fn write_csv<P: AsRef<Path>>(batch: &RecordBatch, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;

    let mut writer = WriterBuilder::new()
        .with_header(true)
        .build(BufWriter::new(file));
    writer
        .write(batch)
        .with_context(|| format!("writing {}", path.display()))?;
    writer
        .into_inner()
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;

    debug!(rows = batch.num_rows(), path = %path.display(), "wrote CSV");
    Ok(())
}

/// Read a file produced by [`write_csv`] back under a known schema.
pub fn read_csv<P: AsRef<Path>>(path: P, schema: SchemaRef) -> Result<RecordBatch> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(BufReader::new(file))
        .with_context(|| format!("reading {}", path.display()))?;
    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("parsing {}", path.display()))?;
    concat_batches(&schema, &batches).context("joining CSV batches")
}
