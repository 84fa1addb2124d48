// src/pipeline.rs

use anyhow::Result;
use tracing::{info, instrument};

use crate::{
    config::PipelineConfig,
    extract::{CssTableLocator, Extractor, HttpSource, PageSource},
    load,
    progress::{verify_log, ProgressLog},
    query::{run_queries, QueryResult},
    transform::transform,
};

/// What one run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub rows_extracted: usize,
    pub converted: bool,
    pub rows_stored: usize,
    pub query_results: Vec<QueryResult>,
}

/// extract → transform → CSV → store → queries → log dump, in that order.
/// The first error ends the run; nothing already written is rolled back.
pub struct Pipeline {
    config: PipelineConfig,
    extractor: Extractor,
    log: ProgressLog,
}

impl Pipeline {
    /// Fetch the page over HTTP from `config.url`.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let source = HttpSource::new(&config.url)?;
        Self::with_source(config, Box::new(source))
    }

    pub fn with_source(config: PipelineConfig, source: Box<dyn PageSource>) -> Result<Self> {
        let locator = CssTableLocator::new(&config.table_selector)?;
        let extractor = Extractor::new(source, Box::new(locator), config.column_aliases.clone());
        let log = ProgressLog::new(config.log_path.clone());
        Ok(Self {
            config,
            extractor,
            log,
        })
    }

    pub fn log(&self) -> &ProgressLog {
        &self.log
    }

    #[instrument(level = "info", skip_all)]
    pub fn run(&self) -> Result<RunSummary> {
        let cfg = &self.config;
        let log = &self.log;

        log.log(&["Start of the bank ETL run"])?;

        let extracted = self.extractor.extract(log)?;
        let rows_extracted = extracted.num_rows();

        let outcome = transform(
            extracted,
            &cfg.exchange_rate_path,
            &cfg.usd_column,
            &cfg.currencies,
            log,
        )?;
        let converted = outcome.is_converted();
        let table = outcome.into_batch();

        log.log(&["Loading to CSV"])?;
        load::write_csv(&table, &cfg.output_csv_path)?;
        log.log(&["CSV loading completed"])?;

        log.log(&["Loading to SQL database"])?;
        let rows_stored = load::write_table(&table, &cfg.database_path, &cfg.table_name)?;
        log.log(&["Database loading completed"])?;

        log.log(&["Running queries on the database"])?;
        let query_results = run_queries(&cfg.database_path, &cfg.queries)?;
        log.log(&["Queries executed"])?;

        verify_log(log)?;

        info!(rows_extracted, converted, rows_stored, "run finished");
        Ok(RunSummary {
            rows_extracted,
            converted,
            rows_stored,
            query_results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{fixtures::LARGEST_BANKS_HTML, StaticSource};
    use rusqlite::Connection;
    use std::{collections::BTreeMap, fs, path::Path};
    use tempfile::tempdir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,bankscraper=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    const RUN_LOG: &[&str] = &[
        "Start of the bank ETL run",
        "Extracting bank table",
        "Extraction completed",
        "Transforming bank table",
        "Transformation completed",
        "Loading to CSV",
        "CSV loading completed",
        "Loading to SQL database",
        "Database loading completed",
        "Running queries on the database",
        "Queries executed",
        "Verifying log entries",
        "Log verification completed",
    ];

    fn config_in(dir: &Path) -> PipelineConfig {
        let cfg = PipelineConfig::default().rooted_at(dir);
        fs::write(
            &cfg.exchange_rate_path,
            "USD_to_GBP,USD_to_EUR,USD_to_INR\n0.8,0.93,82.5\n",
        )
        .unwrap();
        cfg
    }

    fn pipeline(cfg: PipelineConfig, html: &str) -> Pipeline {
        Pipeline::with_source(cfg, Box::new(StaticSource(html.to_string()))).unwrap()
    }

    fn stored_rows(db: &Path, table: &str) -> i64 {
        let conn = Connection::open(db).unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn full_run_writes_every_sink() {
        init_test_logging();
        let tmp = tempdir().unwrap();
        let cfg = config_in(tmp.path());
        let run = pipeline(cfg.clone(), LARGEST_BANKS_HTML);
        let summary = run.run().unwrap();

        assert_eq!(summary.rows_extracted, 3);
        assert!(summary.converted);
        assert_eq!(summary.rows_stored, 3);

        let csv = fs::read_to_string(&cfg.output_csv_path).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Rank,Name,MC_USD_Billion,MC_GBP_Billion,MC_EUR_Billion,MC_INR_Billion")
        );
        assert_eq!(lines.count(), 3);

        assert_eq!(stored_rows(&cfg.database_path, &cfg.table_name), 3);

        assert_eq!(summary.query_results.len(), 2);
        assert_eq!(summary.query_results[0].row_count(), 3);
        assert_eq!(summary.query_results[0].columns.len(), 6);
        assert_eq!(summary.query_results[1].rows, vec![vec!["3".to_string()]]);

        assert_eq!(run.log().path(), cfg.log_path.as_path());
        let log = run.log().read_all().unwrap();
        assert_eq!(log.lines().collect::<Vec<_>>(), RUN_LOG);
    }

    #[test]
    fn rerun_replaces_store_and_extends_log() {
        let tmp = tempdir().unwrap();
        let cfg = config_in(tmp.path());
        pipeline(cfg.clone(), LARGEST_BANKS_HTML).run().unwrap();

        let smaller = r#"<table class="wikitable">
            <tr><th>Rank</th><th>Bank name</th><th>Market cap<br>(US$ billion)</th></tr>
            <tr><td>1</td><td>BankA</td><td>100.0</td></tr>
        </table>"#;
        let summary = pipeline(cfg.clone(), smaller).run().unwrap();

        assert_eq!(summary.rows_stored, 1);
        assert_eq!(stored_rows(&cfg.database_path, &cfg.table_name), 1);
        assert_eq!(
            summary.query_results[0].rows[0],
            vec!["1", "BankA", "100.0", "80.0", "93.0", "8250.0"]
        );

        let log = fs::read_to_string(&cfg.log_path).unwrap();
        assert_eq!(log.lines().count(), RUN_LOG.len() * 2);
    }

    #[test]
    fn raw_headers_degrade_to_unconverted_output() {
        let tmp = tempdir().unwrap();
        let mut cfg = config_in(tmp.path());
        cfg.column_aliases = BTreeMap::new();

        let summary = pipeline(cfg.clone(), LARGEST_BANKS_HTML).run().unwrap();
        assert!(!summary.converted);
        assert_eq!(
            summary.query_results[0].columns,
            vec!["Rank", "Bank name", "Market cap (US$ billion)"]
        );

        let log = fs::read_to_string(&cfg.log_path).unwrap();
        assert!(log
            .lines()
            .any(|l| l == "Error: 'MC_USD_Billion' column not found in the table"));
        assert!(!log.contains("Transformation completed"));
    }

    #[test]
    fn missing_table_halts_before_any_output() {
        let tmp = tempdir().unwrap();
        let cfg = config_in(tmp.path());
        let err = pipeline(cfg.clone(), "<html><body></body></html>").run();

        assert!(err.is_err());
        assert!(!cfg.output_csv_path.exists());
        assert!(!cfg.database_path.exists());
        let log = fs::read_to_string(&cfg.log_path).unwrap();
        assert_eq!(log, "Start of the bank ETL run\nExtracting bank table\n");
    }

    #[test]
    fn bad_selector_fails_construction() {
        let tmp = tempdir().unwrap();
        let mut cfg = config_in(tmp.path());
        cfg.table_selector = "table..[".to_string();
        assert!(Pipeline::with_source(cfg, Box::new(StaticSource(String::new()))).is_err());
    }
}
