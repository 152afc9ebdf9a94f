//! Upstream fetching, fallback resolution, and the persisted dataset

pub mod bls;
pub mod dataset;
pub mod fallback;
pub mod fetcher;
pub mod provider;
pub mod quota;
pub mod store;

pub use bls::BlsClient;
pub use dataset::{Coverage, Dataset, Metric, MetricRecord, MetricUpdate, Updates};
pub use fallback::{Annualization, Conversion, FallbackResolver, FallbackTier, Resolution, RoundingRule};
pub use fetcher::BatchFetcher;
pub use provider::{FetchError, LatestValues, SeriesSource};
pub use quota::QuotaLatch;
pub use store::{DatasetError, DatasetStore, PersistReport};
