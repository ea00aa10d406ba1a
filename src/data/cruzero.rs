//! cruzero.net bus-line routes.
//!
//! The line index is an HTML page whose links call `mostrarLinea(<id>, ...)`;
//! each route is served as JSON from `lineasbuses/json_rutas?lbsId=<id>`.

use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::data::retry::{RetryOn, exponential};
use crate::domain::{BusLine, LatLng};
use crate::error::SourceError;

static LINE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"mostrarLinea\((\d+),").expect("Invalid bus line id regex"));

const FETCH_ATTEMPTS: usize = 3;
const BASE_DELAY: Duration = Duration::from_secs(1);

pub struct CruzeroClient {
    client: Client,
    base_url: String,
}

impl CruzeroClient {
    pub fn new(settings: &Settings) -> Result<Self, SourceError> {
        let client = Client::builder().user_agent(settings.user_agent.clone()).build()?;
        Ok(Self {
            client,
            base_url: settings.cruzero_base_url.clone(),
        })
    }

    /// Ids of every line listed on the index page, in page order.
    pub fn bus_line_ids(&self) -> Result<Vec<u32>, SourceError> {
        let url = format!("{}/lineasbuses", self.base_url);
        let html = self.get_text(&url)?;
        let ids = extract_bus_line_ids(&html);
        info!(count = ids.len(), "bus line ids listed");
        Ok(ids)
    }

    /// Fetch one line; transport failures are retried with backoff.
    pub fn bus_line(&self, line_id: u32) -> Result<BusLine, SourceError> {
        let url = format!("{}/lineasbuses/json_rutas?lbsId={line_id}", self.base_url);
        let retry =
            RetryOn::new(SourceError::is_transient, FETCH_ATTEMPTS, exponential(BASE_DELAY))?;
        let body = retry.run(|| self.get_text(&url))?;
        parse_bus_line(line_id, &body)
    }

    /// Fetch every listed line, skipping the ones that fail.
    pub fn all_bus_lines(&self) -> Result<Vec<BusLine>, SourceError> {
        let ids = self.bus_line_ids()?;
        Ok(collect_bus_lines(&ids, |id| self.bus_line(id)))
    }

    fn get_text(&self, url: &str) -> Result<String, SourceError> {
        debug!(%url, "GET");
        let resp = self.client.get(url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::DataUnavailable {
                query: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }
        Ok(resp.text()?)
    }
}

/// Fetch each id in order; failures are logged and left out.
pub fn collect_bus_lines<F>(ids: &[u32], mut fetch: F) -> Vec<BusLine>
where
    F: FnMut(u32) -> Result<BusLine, SourceError>,
{
    let mut lines = Vec::with_capacity(ids.len());
    for &id in ids {
        match fetch(id) {
            Ok(line) => {
                info!(
                    line_id = id,
                    name = %line.name,
                    points = line.points.len(),
                    "bus line fetched"
                );
                lines.push(line);
            }
            Err(e) => warn!(line_id = id, error = %e, "bus line failed"),
        }
    }
    lines
}

pub fn extract_bus_line_ids(html: &str) -> Vec<u32> {
    LINE_ID_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect()
}

/// Parse a `json_rutas` response.
///
/// A body that isn't JSON at all is how cruzero answers unknown ids, so that
/// maps to `DataUnavailable`; JSON with missing fields is a `Schema` error.
pub fn parse_bus_line(line_id: u32, body: &str) -> Result<BusLine, SourceError> {
    let data: Value = serde_json::from_str(body).map_err(|e| SourceError::DataUnavailable {
        query: format!("bus line {line_id}"),
        reason: format!("response is not JSON ({e})"),
    })?;

    let info = data
        .get("infoLinea")
        .ok_or_else(|| SourceError::Schema(format!("bus line {line_id}: missing `infoLinea`")))?;

    let name = info
        .get("lbsNombre")
        .and_then(Value::as_str)
        .ok_or_else(|| SourceError::Schema(format!("bus line {line_id}: missing `lbsNombre`")))?
        .trim()
        .to_string();

    let route = data
        .get("lineasbusesruta")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            SourceError::Schema(format!("bus line {line_id}: missing `lineasbusesruta`"))
        })?;

    let mut points = Vec::with_capacity(route.len());
    for point in route {
        points.push(LatLng {
            lat: decimal_field(point, "lbrLatitud", line_id)?,
            lng: decimal_field(point, "lbrLongitud", line_id)?,
        });
    }

    Ok(BusLine {
        line_id,
        name,
        speed: decimal_field(info, "lbsVelocidad", line_id)?,
        distance: decimal_field(info, "lbsDistancia", line_id)?,
        total_time: decimal_field(info, "lbsTiempo", line_id)?,
        points,
    })
}

fn decimal_field(obj: &Value, field: &str, line_id: u32) -> Result<Decimal, SourceError> {
    let raw = match obj.get(field) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(SourceError::Schema(format!(
                "bus line {line_id}: missing numeric `{field}`"
            )));
        }
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|e| {
            SourceError::Schema(format!("bus line {line_id}: invalid `{field}` '{raw}': {e}"))
        })
}
