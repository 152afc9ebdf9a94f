//! Fallback resolution for regions the primary series left empty.
//!
//! Tiers run in declared order, each restricted to the regions still missing
//! after the tiers before it. Values from a tier go through its unit
//! conversion before being folded in. A quota rejection ends fallback for
//! the run and keeps whatever was resolved so far.

use super::fetcher::BatchFetcher;
use super::provider::{FetchError, LatestValues};
use crate::region::Region;
use crate::series_id::{DataTypeCode, SeriesId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Working hours in a year (52 weeks x 40 hours).
pub const HOURS_PER_YEAR: f64 = 2080.0;

/// Unit conversion applied to a fallback value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conversion {
    /// Value is already in the primary unit.
    #[default]
    Identity,
    /// Hourly rate, annualized with [`Annualization`].
    HourlyToAnnual,
}

/// Rounding applied to annualized values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingRule {
    #[default]
    Nearest,
    Truncate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Annualization {
    pub hours_per_year: f64,
    pub rounding: RoundingRule,
}

impl Default for Annualization {
    fn default() -> Self {
        Self {
            hours_per_year: HOURS_PER_YEAR,
            rounding: RoundingRule::Nearest,
        }
    }
}

impl Annualization {
    pub fn annualize(&self, hourly: f64) -> f64 {
        let annual = hourly * self.hours_per_year;
        match self.rounding {
            RoundingRule::Nearest => annual.round(),
            RoundingRule::Truncate => annual.trunc(),
        }
    }

    pub fn apply(&self, conversion: Conversion, value: f64) -> f64 {
        match conversion {
            Conversion::Identity => value,
            Conversion::HourlyToAnnual => self.annualize(value),
        }
    }
}

/// One fallback data type and how to convert its values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackTier {
    pub data_type: DataTypeCode,
    #[serde(default)]
    pub conversion: Conversion,
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Primary,
    Fallback(DataTypeCode),
}

/// Effective per-region values after primary and fallback tiers.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub values: BTreeMap<Region, f64>,
    pub sources: BTreeMap<Region, ValueSource>,
    /// Set when a quota rejection stopped fallback early.
    pub quota_stop: Option<String>,
}

impl Resolution {
    /// Regions from `regions` with no value.
    pub fn unresolved(&self, regions: &[Region]) -> Vec<Region> {
        regions
            .iter()
            .filter(|r| !self.values.contains_key(r))
            .copied()
            .collect()
    }

    pub fn fallback_count(&self) -> usize {
        self.sources
            .values()
            .filter(|s| matches!(s, ValueSource::Fallback(_)))
            .count()
    }
}

/// Map fetched series values back onto their regions.
pub fn values_by_region(ids: &[(Region, SeriesId)], values: &LatestValues) -> BTreeMap<Region, f64> {
    ids.iter()
        .filter_map(|(region, id)| values.get(id).map(|v| (*region, *v)))
        .collect()
}

pub struct FallbackResolver<'a> {
    fetcher: &'a BatchFetcher<'a>,
    tiers: &'a [FallbackTier],
    annualization: Annualization,
}

impl<'a> FallbackResolver<'a> {
    pub fn new(
        fetcher: &'a BatchFetcher<'a>,
        tiers: &'a [FallbackTier],
        annualization: Annualization,
    ) -> Self {
        Self {
            fetcher,
            tiers,
            annualization,
        }
    }

    /// Fill regions missing from `primary` using the fallback tiers.
    ///
    /// `build` constructs the series identifier for a region and data type.
    /// Only `ApiFailure` is returned as an error.
    pub fn resolve<F>(
        &self,
        primary: BTreeMap<Region, f64>,
        regions: &[Region],
        build: F,
    ) -> Result<Resolution, FetchError>
    where
        F: Fn(Region, DataTypeCode) -> SeriesId,
    {
        let mut resolution = Resolution {
            sources: primary.keys().map(|r| (*r, ValueSource::Primary)).collect(),
            values: primary,
            quota_stop: None,
        };

        for tier in self.tiers {
            let missing = resolution.unresolved(regions);
            if missing.is_empty() {
                break;
            }

            let ids: Vec<(Region, SeriesId)> = missing
                .iter()
                .map(|&r| (r, build(r, tier.data_type)))
                .collect();
            let request: Vec<SeriesId> = ids.iter().map(|(_, id)| id.clone()).collect();

            let fetched = match self.fetcher.fetch_latest(&request) {
                Ok(values) => values,
                Err(FetchError::QuotaExceeded { message }) => {
                    warn!(
                        data_type = %tier.data_type,
                        missing = missing.len(),
                        "quota exceeded during fallback, keeping partial result"
                    );
                    resolution.quota_stop = Some(message);
                    break;
                }
                Err(e) => return Err(e),
            };

            let found = values_by_region(&ids, &fetched);
            info!(
                data_type = %tier.data_type,
                requested = ids.len(),
                resolved = found.len(),
                "fallback tier complete"
            );
            for (region, raw) in found {
                let value = self.annualization.apply(tier.conversion, raw);
                resolution.values.insert(region, value);
                resolution
                    .sources
                    .insert(region, ValueSource::Fallback(tier.data_type));
            }
        }

        Ok(resolution)
    }
}
