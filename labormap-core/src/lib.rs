//! LaborMap Core — state labor statistics acquisition and reconciliation.
//!
//! - Fixed-width series identifiers for the wage and unemployment families
//! - Batched, quota-aware fetching of latest observations
//! - Fallback tiers with unit conversion for regions the primary series misses
//! - Field-level merge into a persisted per-state dataset, with a mirror copy
//! - Phase orchestration that preserves the dataset on quota exhaustion

pub mod config;
pub mod data;
pub mod pipeline;
pub mod region;
pub mod series_id;

pub use config::PipelineConfig;
pub use pipeline::{Orchestrator, Phase, PhaseOutcome, PipelineError, RunSummary};
pub use region::Region;
pub use series_id::{build_id, DataTypeCode, Family, OccupationCode, SeriesId, SeriesIdError};
