//! Phase orchestration: wage, then unemployment, against one dataset file.
//!
//! Each phase reads the dataset, fetches its metric for every region (primary
//! series, then fallback tiers), merges only its own field, and persists.
//!
//! Failure policy per phase:
//! 1. `QuotaExceeded` → dataset left byte-identical, mirror refreshed, next phase runs
//! 2. Any other failure → nothing written for this phase, run aborts
//!
//! Writes from an earlier phase are never rolled back.

use crate::config::{ConfigError, PipelineConfig};
use crate::data::dataset::{Metric, MetricUpdate, Updates};
use crate::data::fallback::{
    values_by_region, Annualization, FallbackResolver, FallbackTier, Resolution,
};
use crate::data::fetcher::BatchFetcher;
use crate::data::provider::{FetchError, SeriesSource};
use crate::data::store::{DatasetError, DatasetStore, PersistReport};
use crate::region::Region;
use crate::series_id::{build_id, DataTypeCode, Family, SeriesId};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, info_span, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{phase} phase failed: {source}")]
    Fetch {
        phase: Phase,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// One statistic pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Wage,
    Unemployment,
}

impl Phase {
    /// Default run order.
    pub const ALL: [Phase; 2] = [Phase::Wage, Phase::Unemployment];

    pub fn metric(&self) -> Metric {
        match self {
            Phase::Wage => Metric::SoftwareDeveloperWage,
            Phase::Unemployment => Metric::UnemploymentRate,
        }
    }

    pub fn family(&self) -> Family {
        match self {
            Phase::Wage => Family::Wage,
            Phase::Unemployment => Family::Unemployment,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Wage => f.write_str("wage"),
            Phase::Unemployment => f.write_str("unemployment"),
        }
    }
}

/// How a phase ended, short of a fatal error.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutcome {
    Updated {
        /// Regions with a value after all tiers.
        resolved: usize,
        /// Of those, how many came from a fallback tier.
        via_fallback: usize,
        /// Regions left as explicit nulls.
        unresolved: Vec<Region>,
        /// Set when quota stopped fallback early.
        quota_stop: Option<String>,
        report: PersistReport,
    },
    /// Quota exhausted before any usable result; the dataset was not touched.
    PreservedOnQuota {
        message: String,
        mirrored_to: Option<PathBuf>,
    },
}

impl PhaseOutcome {
    pub fn hit_quota(&self) -> bool {
        match self {
            PhaseOutcome::Updated { quota_stop, .. } => quota_stop.is_some(),
            PhaseOutcome::PreservedOnQuota { .. } => true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub phases: Vec<(Phase, PhaseOutcome)>,
}

impl RunSummary {
    pub fn outcome(&self, phase: Phase) -> Option<&PhaseOutcome> {
        self.phases
            .iter()
            .find(|(p, _)| *p == phase)
            .map(|(_, o)| o)
    }

    pub fn hit_quota(&self) -> bool {
        self.phases.iter().any(|(_, o)| o.hit_quota())
    }
}

pub struct Orchestrator<'a> {
    source: &'a dyn SeriesSource,
    store: &'a DatasetStore,
    config: &'a PipelineConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        source: &'a dyn SeriesSource,
        store: &'a DatasetStore,
        config: &'a PipelineConfig,
    ) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    /// Run `phases` in order. Stops at the first fatal error.
    ///
    /// An invalid configuration is rejected before any phase starts.
    pub fn run(&self, phases: &[Phase]) -> Result<RunSummary, PipelineError> {
        self.config.validate()?;
        let mut summary = RunSummary::default();
        for &phase in phases {
            let outcome = self.run_phase(phase)?;
            summary.phases.push((phase, outcome));
        }
        Ok(summary)
    }

    pub fn run_phase(&self, phase: Phase) -> Result<PhaseOutcome, PipelineError> {
        let _span = info_span!("phase", %phase).entered();

        // Read first so a corrupt file fails before any quota is spent.
        let existing = self.store.load()?;
        let regions = Region::all();

        let resolution = match self.collect(phase, regions) {
            Ok(resolution) => resolution,
            Err(FetchError::QuotaExceeded { message }) => {
                warn!(%message, "quota exceeded, preserving existing dataset");
                let mirrored_to = self.store.mirror()?;
                return Ok(PhaseOutcome::PreservedOnQuota {
                    message,
                    mirrored_to,
                });
            }
            Err(source) => return Err(PipelineError::Fetch { phase, source }),
        };

        let metric = phase.metric();
        let updates: Updates = regions
            .iter()
            .map(|r| {
                let update = match resolution.values.get(r) {
                    Some(v) => MetricUpdate::set(metric, *v),
                    None => MetricUpdate::touch(),
                };
                (*r, update)
            })
            .collect();

        let unresolved = resolution.unresolved(regions);
        if !unresolved.is_empty() {
            let missing: Vec<&str> = unresolved.iter().map(|r| r.postal()).collect();
            warn!(field = metric.field_name(), ?missing, "regions left null after all tiers");
        }

        let merged = existing.merge(&updates);
        let report = self.store.persist(&merged)?;

        info!(
            resolved = resolution.values.len(),
            via_fallback = resolution.fallback_count(),
            unresolved = unresolved.len(),
            "phase complete"
        );

        Ok(PhaseOutcome::Updated {
            resolved: resolution.values.len(),
            via_fallback: resolution.fallback_count(),
            unresolved,
            quota_stop: resolution.quota_stop,
            report,
        })
    }

    fn collect(&self, phase: Phase, regions: &[Region]) -> Result<Resolution, FetchError> {
        let (data_type, tiers, annualization) = phase_settings(self.config, phase);
        let ids: Vec<(Region, SeriesId)> = regions
            .iter()
            .map(|&r| (r, build(self.config, phase, r, data_type)))
            .collect();
        let request: Vec<SeriesId> = ids.iter().map(|(_, id)| id.clone()).collect();

        let fetcher = BatchFetcher::new(self.source);
        let fetched = fetcher.fetch_latest(&request)?;
        let primary = values_by_region(&ids, &fetched);
        info!(
            data_type = %data_type,
            requested = ids.len(),
            resolved = primary.len(),
            "primary fetch complete"
        );

        FallbackResolver::new(&fetcher, tiers, annualization).resolve(primary, regions, |r, dt| {
            build(self.config, phase, r, dt)
        })
    }
}

/// Identifiers the primary fetch of `phase` requests, one per region.
pub fn primary_ids(config: &PipelineConfig, phase: Phase) -> Vec<(Region, SeriesId)> {
    let (data_type, _, _) = phase_settings(config, phase);
    Region::all()
        .iter()
        .map(|&r| (r, build(config, phase, r, data_type)))
        .collect()
}

fn phase_settings(
    config: &PipelineConfig,
    phase: Phase,
) -> (DataTypeCode, &[FallbackTier], Annualization) {
    let annualization = config.wage.annualization();
    match phase {
        Phase::Wage => (
            config.wage.data_type,
            config.wage.fallbacks.as_slice(),
            annualization,
        ),
        Phase::Unemployment => (
            config.unemployment.data_type,
            config.unemployment.fallbacks.as_slice(),
            annualization,
        ),
    }
}

fn build(config: &PipelineConfig, phase: Phase, region: Region, data_type: DataTypeCode) -> SeriesId {
    build_id(
        region,
        data_type,
        phase.family(),
        &config.wage.occupation_code,
    )
}
