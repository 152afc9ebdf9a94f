//! Batch fetcher — splits identifier lists into source-sized batches and
//! issues them one at a time.

use super::provider::{FetchError, LatestValues, SeriesSource};
use crate::series_id::SeriesId;
use std::collections::HashSet;
use tracing::{debug, info};

pub struct BatchFetcher<'a> {
    source: &'a dyn SeriesSource,
}

impl<'a> BatchFetcher<'a> {
    pub fn new(source: &'a dyn SeriesSource) -> Self {
        Self { source }
    }

    /// Fetch the latest value of every identifier.
    ///
    /// Batches run sequentially in input order. The first failing batch
    /// aborts the fetch and nothing from earlier batches is returned.
    pub fn fetch_latest(&self, ids: &[SeriesId]) -> Result<LatestValues, FetchError> {
        let mut seen = HashSet::new();
        let unique: Vec<SeriesId> = ids
            .iter()
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect();

        let size = self.source.max_batch_size().max(1);
        let total = unique.len().div_ceil(size);
        let mut values = LatestValues::new();

        for (i, batch) in unique.chunks(size).enumerate() {
            info!(
                source = self.source.name(),
                batch = i + 1,
                total,
                series = batch.len(),
                "fetching batch"
            );
            for (id, value) in self.source.fetch_batch(batch)? {
                if batch.contains(&id) {
                    values.insert(id, value);
                } else {
                    debug!(series = %id, "ignoring unrequested series in response");
                }
            }
        }

        Ok(values)
    }
}
