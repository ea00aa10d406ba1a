//! SIC (Sistema de Información de Comercialización) market price exports.
//!
//! SIC publishes one export endpoint per (city, period):
//!
//! `{base}/pref_{city}_{period}_export.php`
//!
//! POSTing `type=csv|xml&records=all` returns the whole table. Any non-success
//! status means SIC has nothing for that period.

use std::io::{BufRead, BufReader, ErrorKind};

use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::config::Settings;
use crate::data::PriceSource;
use crate::domain::{City, ExportFormat, NormalizedTable, Timeframe};
use crate::error::SourceError;
use crate::io::ingest::read_raw_table;
use crate::prices::normalize::normalize_table;

/// Export URL for a city and period.
pub fn market_prices_url(base_url: &str, city: City, timeframe: Timeframe) -> String {
    format!(
        "{}/pref_{}_{}_export.php",
        base_url.trim_end_matches('/'),
        city.url_part(),
        timeframe.url_part()
    )
}

pub struct SicClient {
    client: Client,
    base_url: String,
}

impl SicClient {
    pub fn new(settings: &Settings) -> Result<Self, SourceError> {
        let client = Client::builder().user_agent(settings.user_agent.clone()).build()?;
        Ok(Self {
            client,
            base_url: settings.sic_base_url.clone(),
        })
    }

    pub fn url(&self, city: City, timeframe: Timeframe) -> String {
        market_prices_url(&self.base_url, city, timeframe)
    }

    /// Fetch the raw export body.
    ///
    /// With `limit = Some(n)` only the header plus `n` data lines are read off
    /// the wire; the rest of the response is dropped unread.
    pub fn fetch_export(
        &self,
        city: City,
        timeframe: Timeframe,
        format: ExportFormat,
        limit: Option<usize>,
    ) -> Result<String, SourceError> {
        let url = self.url(city, timeframe);
        debug!(%url, format = format.form_value(), ?limit, "requesting SIC export");

        let resp = self
            .client
            .post(&url)
            .form(&[("type", format.form_value()), ("records", "all")])
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::DataUnavailable {
                query: format!("{city}/{}", timeframe.url_part()),
                reason: format!("HTTP {status}"),
            });
        }

        match limit {
            Some(n) => read_limited_lines(BufReader::new(resp), n.saturating_add(1)),
            None => {
                let bytes = resp.bytes()?;
                String::from_utf8(bytes.to_vec()).map_err(|e| SourceError::Decode(e.to_string()))
            }
        }
    }
}

impl PriceSource for SicClient {
    fn fetch_table(
        &self,
        city: City,
        timeframe: Timeframe,
    ) -> Result<NormalizedTable, SourceError> {
        let body = self.fetch_export(city, timeframe, ExportFormat::Csv, None)?;
        let raw = read_raw_table(&body)?;
        let table = normalize_table(&raw)?;
        info!(
            city = %city,
            timeframe = %timeframe,
            rows = table.records.len(),
            dropped = table.dedup.dropped,
            "SIC table normalized"
        );
        Ok(table)
    }
}

/// Read at most `max_lines` lines (line terminators kept) from `reader`.
pub fn read_limited_lines<R: BufRead>(
    mut reader: R,
    max_lines: usize,
) -> Result<String, SourceError> {
    let mut out = String::new();
    for _ in 0..max_lines {
        match reader.read_line(&mut out) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(SourceError::Decode(e.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(out)
}
