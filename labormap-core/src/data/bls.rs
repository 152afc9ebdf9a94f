//! BLS public data API (v2) client.
//!
//! One POST per batch to the timeseries endpoint, requesting only the latest
//! observation of each series. Transport failures and 5xx responses are
//! retried with exponential backoff. Quota rejections are never retried and
//! trip the shared [`QuotaLatch`].

use super::provider::{FetchError, LatestValues, SeriesSource};
use super::quota::QuotaLatch;
use crate::config::ApiConfig;
use crate::series_id::SeriesId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Status string of a successful response.
pub const SUCCESS_STATUS: &str = "REQUEST_SUCCEEDED";

/// Series per request with a registration key.
pub const REGISTERED_BATCH_LIMIT: usize = 50;
/// Series per request without a registration key.
pub const UNREGISTERED_BATCH_LIMIT: usize = 25;

#[derive(Debug, Serialize)]
struct TimeseriesRequest<'a> {
    seriesid: Vec<&'a str>,
    latest: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    registrationkey: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TimeseriesResponse {
    status: String,
    #[serde(default)]
    message: Vec<String>,
    #[serde(rename = "Results")]
    results: Option<TimeseriesResults>,
}

#[derive(Debug, Deserialize)]
struct TimeseriesResults {
    #[serde(default)]
    series: Vec<SeriesData>,
}

#[derive(Debug, Deserialize)]
struct SeriesData {
    #[serde(rename = "seriesID")]
    series_id: String,
    #[serde(default)]
    data: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    #[serde(default)]
    year: String,
    #[serde(default)]
    period: String,
    #[serde(default)]
    value: String,
}

pub struct BlsClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    registration_key: Option<String>,
    batch_size: usize,
    latch: Arc<QuotaLatch>,
    max_retries: u32,
    base_delay: Duration,
}

impl BlsClient {
    pub fn new(
        api: &ApiConfig,
        registration_key: Option<String>,
        latch: Arc<QuotaLatch>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .user_agent(concat!("labormap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::api(format!("failed to build HTTP client: {e}")))?;

        let registration_key = registration_key.filter(|k| !k.trim().is_empty());
        let ceiling = if registration_key.is_some() {
            REGISTERED_BATCH_LIMIT
        } else {
            UNREGISTERED_BATCH_LIMIT
        };

        Ok(Self {
            client,
            endpoint: api.endpoint.clone(),
            registration_key,
            batch_size: api.batch_size.clamp(1, ceiling),
            latch,
            max_retries: api.max_retries,
            base_delay: Duration::from_millis(api.retry_base_delay_ms),
        })
    }

    fn request_body<'a>(&'a self, ids: &'a [SeriesId]) -> TimeseriesRequest<'a> {
        TimeseriesRequest {
            seriesid: ids.iter().map(|id| id.as_str()).collect(),
            latest: true,
            registrationkey: self.registration_key.as_deref(),
        }
    }

    /// POST one batch, retrying transport errors and 5xx. Returns the raw body.
    fn post_with_retry(&self, ids: &[SeriesId]) -> Result<String, FetchError> {
        let body = self.request_body(ids);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.base_delay, attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying batch request");
                std::thread::sleep(delay);
            }

            debug!(series = ids.len(), attempt, endpoint = %self.endpoint, "posting batch");
            match self.client.post(&self.endpoint).json(&body).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        return Err(FetchError::QuotaExceeded {
                            message: format!("HTTP {status}"),
                        });
                    }

                    if status.is_server_error() {
                        last_error = Some(FetchError::ApiFailure {
                            reason: format!("HTTP {status}"),
                            body: resp.text().ok(),
                        });
                        continue;
                    }

                    let text = resp
                        .text()
                        .map_err(|e| FetchError::api(format!("failed to read response: {e}")))?;

                    if !status.is_success() {
                        return Err(FetchError::ApiFailure {
                            reason: format!("HTTP {status}"),
                            body: Some(text),
                        });
                    }

                    return Ok(text);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(FetchError::api(format!("transport: {e}")));
                        continue;
                    }
                    return Err(FetchError::api(format!("transport: {e}")));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::api("max retries exceeded")))
    }
}

/// Delay before retry `attempt` (1-based): base, 2x base, 4x base, ...
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

impl SeriesSource for BlsClient {
    fn name(&self) -> &str {
        "bls_api_v2"
    }

    fn max_batch_size(&self) -> usize {
        self.batch_size
    }

    fn fetch_batch(&self, ids: &[SeriesId]) -> Result<LatestValues, FetchError> {
        if let Some(message) = self.latch.exhausted() {
            return Err(FetchError::QuotaExceeded { message });
        }
        if ids.is_empty() {
            return Ok(LatestValues::new());
        }
        if ids.len() > self.batch_size {
            return Err(FetchError::api(format!(
                "batch of {} series exceeds limit of {}",
                ids.len(),
                self.batch_size
            )));
        }

        let result = self
            .post_with_retry(ids)
            .and_then(|body| parse_response(&body));

        if let Err(FetchError::QuotaExceeded { message }) = &result {
            self.latch.trip(message.clone());
        }
        result
    }
}

/// Parse a timeseries response body into latest values.
///
/// Series whose latest value is missing or non-numeric are left out.
pub fn parse_response(body: &str) -> Result<LatestValues, FetchError> {
    let resp: TimeseriesResponse =
        serde_json::from_str(body).map_err(|e| FetchError::ApiFailure {
            reason: format!("unparseable response: {e}"),
            body: Some(body.to_string()),
        })?;

    if resp.status != SUCCESS_STATUS {
        return Err(classify_failure(&resp.status, &resp.message, body));
    }

    let mut values = LatestValues::new();
    for series in resp.results.map(|r| r.series).unwrap_or_default() {
        let Some(obs) = series.data.first() else {
            debug!(series = %series.series_id, "no observations");
            continue;
        };
        match parse_value(&obs.value) {
            Some(v) => {
                values.insert(SeriesId::from_upstream(&series.series_id), v);
            }
            None => debug!(
                series = %series.series_id,
                year = %obs.year,
                period = %obs.period,
                raw = %obs.value,
                "skipping non-numeric value"
            ),
        }
    }
    Ok(values)
}

fn classify_failure(status: &str, messages: &[String], body: &str) -> FetchError {
    let joined = messages.join(" ");
    let lower = joined.to_ascii_lowercase();
    if lower.contains("threshold") || lower.contains("quota") {
        FetchError::QuotaExceeded { message: joined }
    } else {
        FetchError::ApiFailure {
            reason: format!("status {status}: {joined}"),
            body: Some(body.to_string()),
        }
    }
}

/// Parse an upstream value string. Footnote markers and blanks yield `None`.
pub fn parse_value(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
