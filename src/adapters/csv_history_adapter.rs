//! CSV price history adapter.
//!
//! Reads `{BASE}_{QUOTE}.csv` from a directory. Files carry a
//! `timestamp,price` header; timestamps are RFC 3339 or
//! `%Y-%m-%d %H:%M:%S` (UTC).

use crate::domain::error::TicktraderError;
use crate::domain::symbol::Symbol;
use crate::ports::history_port::HistoryPort;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs;
use std::path::PathBuf;

pub struct CsvHistoryAdapter {
    base_path: PathBuf,
}

impl CsvHistoryAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, symbol: &Symbol) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol.file_stem()))
    }
}

fn history_err(reason: String) -> TicktraderError {
    TicktraderError::History { reason }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, TicktraderError> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| history_err(format!("invalid timestamp {:?}: {}", value, e)))
}

impl HistoryPort for CsvHistoryAdapter {
    fn recent_prices(&self, symbol: &Symbol, limit: usize) -> Result<Vec<f64>, TicktraderError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path)
            .map_err(|e| history_err(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| history_err(format!("CSV header error: {}", e)))?
            .clone();
        let ts_col = headers.iter().position(|h| h.trim() == "timestamp").unwrap_or(0);
        let price_col = headers.iter().position(|h| h.trim() == "price").unwrap_or(1);

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| history_err(format!("CSV parse error: {}", e)))?;

            let ts = record
                .get(ts_col)
                .ok_or_else(|| history_err("missing timestamp column".into()))
                .and_then(parse_timestamp)?;

            let price: f64 = record
                .get(price_col)
                .ok_or_else(|| history_err("missing price column".into()))?
                .trim()
                .parse()
                .map_err(|e| history_err(format!("invalid price value: {}", e)))?;
            if !price.is_finite() || price <= 0.0 {
                return Err(history_err(format!("non-positive price {} at {}", price, ts)));
            }

            rows.push((ts, price));
        }

        rows.sort_by_key(|(ts, _)| *ts);
        let skip = rows.len().saturating_sub(limit);
        Ok(rows.into_iter().skip(skip).map(|(_, p)| p).collect())
    }
}
