//! Series source trait and structured fetch errors.
//!
//! The SeriesSource trait abstracts over the upstream API so the batch
//! fetcher, fallback resolver, and phases can run against a scripted source
//! in tests.

use crate::series_id::SeriesId;
use std::collections::BTreeMap;
use thiserror::Error;

/// Latest observation per series. Series without a usable value are absent.
pub type LatestValues = BTreeMap<SeriesId, f64>;

/// Fetch failures. `QuotaExceeded` is recoverable at the phase boundary,
/// everything else is fatal to the phase.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("daily request quota exceeded: {message}")]
    QuotaExceeded { message: String },

    #[error("API request failed: {reason}")]
    ApiFailure {
        reason: String,
        /// Raw response body, when one was received.
        body: Option<String>,
    },
}

impl FetchError {
    pub fn is_quota(&self) -> bool {
        matches!(self, FetchError::QuotaExceeded { .. })
    }

    pub(crate) fn api(reason: impl Into<String>) -> Self {
        FetchError::ApiFailure {
            reason: reason.into(),
            body: None,
        }
    }
}

/// A source of latest-observation values for batches of series.
pub trait SeriesSource {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Largest batch a single call accepts.
    fn max_batch_size(&self) -> usize;

    /// Fetch the latest value for every series in `ids` with one call.
    ///
    /// `ids.len()` never exceeds `max_batch_size()` when called through
    /// [`BatchFetcher`](super::fetcher::BatchFetcher).
    fn fetch_batch(&self, ids: &[SeriesId]) -> Result<LatestValues, FetchError>;
}
