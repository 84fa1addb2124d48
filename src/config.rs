// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// Archived copy of the Wikipedia ranking, so the table layout stays put.
pub const DEFAULT_URL: &str =
    "https://web.archive.org/web/20230908091635/https://en.wikipedia.org/wiki/List_of_largest_banks";

/// Everything one run needs to know: where to read from, where to write to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub url: String,
    pub exchange_rate_path: PathBuf,
    pub output_csv_path: PathBuf,
    pub database_path: PathBuf,
    pub table_name: String,
    pub log_path: PathBuf,
    /// CSS selector for the ranking table; the first match wins.
    pub table_selector: String,
    pub usd_column: String,
    /// Currency codes to derive, in output column order.
    pub currencies: Vec<String>,
    /// Page header text → column name.
    pub column_aliases: BTreeMap<String, String>,
    pub queries: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let table_name = "Largest_banks".to_string();
        let column_aliases = [
            ("Bank name", "Name"),
            ("Market cap (US$ billion)", "MC_USD_Billion"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        Self {
            url: DEFAULT_URL.to_string(),
            exchange_rate_path: PathBuf::from("exchange_rate.csv"),
            output_csv_path: PathBuf::from("./Largest_banks_data.csv"),
            database_path: PathBuf::from("Banks.db"),
            log_path: PathBuf::from("code_log.txt"),
            table_selector: "table.wikitable".to_string(),
            usd_column: "MC_USD_Billion".to_string(),
            currencies: ["GBP", "EUR", "INR"].map(String::from).to_vec(),
            column_aliases,
            queries: vec![
                format!("SELECT * FROM {} LIMIT 5;", table_name),
                format!("SELECT COUNT(*) FROM {};", table_name),
            ],
            table_name,
        }
    }
}

impl PipelineConfig {
    /// Load from YAML; keys left out keep their defaults.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Same settings with every output artefact and the rate file moved under `dir`.
    pub fn rooted_at<P: AsRef<Path>>(mut self, dir: P) -> Self {
        let dir = dir.as_ref();
        let reroot = |p: &Path| dir.join(p.file_name().unwrap_or(p.as_os_str()));
        self.exchange_rate_path = reroot(&self.exchange_rate_path);
        self.output_csv_path = reroot(&self.output_csv_path);
        self.database_path = reroot(&self.database_path);
        self.log_path = reroot(&self.log_path);
        self
    }
}
