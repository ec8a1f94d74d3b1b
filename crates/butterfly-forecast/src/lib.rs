//! Remote forecast client.
//!
//! The collaborator accepts the three current parameters and answers with
//! a sparse JSON map from month offset to predicted parameter triples.
//! Responses are parsed tolerantly: malformed or partial entries are
//! skipped with a warning and never abort the whole merge. Late responses
//! are fenced off by [`ForecastExchange`] tickets (last request wins).

use butterfly_core::{Forecast, ForecastEntry, Parameters};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Default wall-clock budget for one forecast request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised by the forecast client. All are soft failures: the
/// caller keeps displaying the synthetic timeline.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("forecast request timed out")]
    Timeout,
    #[error("forecast request failed: {0}")]
    Http(reqwest::Error),
    #[error("forecast response is not a JSON object")]
    MalformedResponse,
}

impl From<reqwest::Error> for ForecastError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

/// Wire payload sent to the forecast service.
#[derive(Debug, Clone, Copy, Serialize)]
struct ForecastRequest {
    inflation_rate: f32,
    interest_rate: f32,
    gdp_growth_rate: f32,
}

impl From<&Parameters> for ForecastRequest {
    fn from(params: &Parameters) -> Self {
        Self {
            inflation_rate: params.inflation_rate,
            interest_rate: params.interest_rate,
            gdp_growth_rate: params.gdp_growth_rate,
        }
    }
}

/// HTTP client for the forecast collaborator.
pub struct ForecastClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ForecastClient {
    /// Build a client with an explicit request timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ForecastError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Request a forecast for the supplied parameters.
    pub async fn fetch(&self, params: &Parameters) -> Result<Forecast, ForecastError> {
        let request = ForecastRequest::from(params);
        debug!(endpoint = %self.endpoint, ?request, "requesting forecast");
        let value: Value = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_forecast(&value)
    }
}

/// Parse a forecast response body.
///
/// The top level must be a JSON object; beyond that, any entry that is
/// not a `month -> {three finite numbers}` pair is dropped with a
/// warning. Bounds validation happens later, field by field, during the
/// timeline merge.
pub fn parse_forecast(value: &Value) -> Result<Forecast, ForecastError> {
    let Some(map) = value.as_object() else {
        return Err(ForecastError::MalformedResponse);
    };

    let mut forecast = Forecast::new();
    for (key, entry) in map {
        let Ok(month_offset) = key.parse::<u32>() else {
            warn!(key, "forecast key is not a month offset; skipping entry");
            continue;
        };
        let Some(entry) = parse_entry(entry) else {
            warn!(month_offset, "malformed forecast entry; skipping");
            continue;
        };
        forecast.insert(month_offset, entry);
    }
    Ok(forecast)
}

fn parse_entry(value: &Value) -> Option<ForecastEntry> {
    let field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_f64)
            .map(|v| v as f32)
            .filter(|v| v.is_finite())
    };
    Some(ForecastEntry {
        inflation_rate: field("inflation_rate")?,
        interest_rate: field("interest_rate")?,
        gdp_growth_rate: field("gdp_growth_rate")?,
    })
}

/// Last-request-wins fence for in-flight forecasts.
///
/// `issue` stamps a new request; `accept` is true only for the newest
/// ticket, so a response that arrives after a newer request was issued
/// becomes a logged no-op.
#[derive(Debug, Default)]
pub struct ForecastExchange {
    latest: AtomicU64,
}

impl ForecastExchange {
    /// Stamp a new outgoing request.
    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether a completed request is still the authoritative one.
    #[must_use]
    pub fn accept(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }
}
