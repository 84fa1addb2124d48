// src/extract/mod.rs

use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use reqwest::blocking::Client;
use scraper::Html;
use std::{collections::BTreeMap, time::Duration};
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use crate::progress::ProgressLog;

pub mod locate;
pub mod table;

pub use locate::{CssTableLocator, TableLocator};
pub use table::table_to_batch;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("no element matching `{selector}` on the page")]
    TableNotFound { selector: String },

    #[error("table has no header row")]
    NoHeader,

    #[error("invalid CSS selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
}

/// Where the page body comes from.
pub trait PageSource {
    fn fetch(&self) -> Result<String>;
}

/// One blocking GET, no timeout, no retry.
pub struct HttpSource {
    client: Client,
    url: Url,
}

impl HttpSource {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("parsing page URL {}", url))?;
        let client = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .context("building HTTP client")?;
        Ok(Self { client, url })
    }
}

impl PageSource for HttpSource {
    fn fetch(&self) -> Result<String> {
        debug!("Fetching text from {}", self.url);
        self.client
            .get(self.url.clone())
            .send()
            .with_context(|| format!("GET {} failed", self.url))?
            .error_for_status()
            .with_context(|| format!("Non-success status {}", self.url))?
            .text()
            .with_context(|| format!("Reading text from {}", self.url))
    }
}

/// A page already in memory, e.g. a saved copy or a test fixture.
#[derive(Debug, Clone)]
pub struct StaticSource(pub String);

impl PageSource for StaticSource {
    fn fetch(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Locate the table in `html` and convert it.
pub fn parse_bank_table(
    html: &str,
    locator: &dyn TableLocator,
    aliases: &BTreeMap<String, String>,
) -> Result<RecordBatch> {
    let document = Html::parse_document(html);
    let table = locator.locate(&document)?;
    table_to_batch(table, aliases)
}

pub struct Extractor {
    source: Box<dyn PageSource>,
    locator: Box<dyn TableLocator>,
    aliases: BTreeMap<String, String>,
}

impl Extractor {
    pub fn new(
        source: Box<dyn PageSource>,
        locator: Box<dyn TableLocator>,
        aliases: BTreeMap<String, String>,
    ) -> Self {
        Self {
            source,
            locator,
            aliases,
        }
    }

    #[instrument(level = "info", skip_all)]
    pub fn extract(&self, log: &ProgressLog) -> Result<RecordBatch> {
        log.log(&["Extracting bank table"])?;

        let html = self.source.fetch()?;
        debug!(bytes = html.len(), "page fetched");
        let batch = parse_bank_table(&html, self.locator.as_ref(), &self.aliases)?;
        info!(
            rows = batch.num_rows(),
            columns = batch.num_columns(),
            "extracted table"
        );

        log.log(&["Extraction completed"])?;
        Ok(batch)
    }
}
