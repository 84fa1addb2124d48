use anyhow::Result;
use bankscraper::{Pipeline, PipelineConfig};
use std::{env, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    // stdout carries query results and the log dump; diagnostics go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();
    info!("startup");

    // ─── 2) configure ────────────────────────────────────────────────
    let config = match env::args_os().nth(1) {
        Some(path) => {
            let path = PathBuf::from(path);
            info!("loading config {}", path.display());
            PipelineConfig::from_yaml_file(&path)?
        }
        None => PipelineConfig::default(),
    };

    // ─── 3) run ──────────────────────────────────────────────────────
    let summary = Pipeline::new(config)?.run()?;

    info!(
        rows = summary.rows_extracted,
        converted = summary.converted,
        stored = summary.rows_stored,
        "all done"
    );
    Ok(())
}
