use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, Trim};
use std::{collections::BTreeMap, path::Path};
use tracing::debug;

const RATE_PREFIX: &str = "USD_to_";

/// Currency code → units of that currency per US dollar.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExchangeRates {
    rates: BTreeMap<String, f64>,
}

impl ExchangeRates {
    /// Read the first data row of a CSV with `USD_to_<CODE>` headers.
    /// Other columns are ignored.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .from_path(path)
            .with_context(|| format!("opening rate table {}", path.display()))?;

        let headers = rdr
            .headers()
            .with_context(|| format!("reading header of {}", path.display()))?
            .clone();
        let record = rdr
            .records()
            .next()
            .ok_or_else(|| anyhow!("rate table {} has no data row", path.display()))?
            .with_context(|| format!("parsing rate row in {}", path.display()))?;

        let mut rates = BTreeMap::new();
        for (header, value) in headers.iter().zip(record.iter()) {
            let Some(code) = header.strip_prefix(RATE_PREFIX) else {
                continue;
            };
            let rate: f64 = value
                .parse()
                .with_context(|| format!("{} = {:?} is not a number", header, value))?;
            rates.insert(code.to_string(), rate);
        }
        debug!(?rates, "loaded exchange rates");
        Ok(Self { rates })
    }

    pub fn rate(&self, code: &str) -> Result<f64> {
        self.rates
            .get(code)
            .copied()
            .ok_or_else(|| anyhow!("no {}{} column in rate table", RATE_PREFIX, code))
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for ExchangeRates {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self {
            rates: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
