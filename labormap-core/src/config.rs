//! Pipeline configuration, loaded from an optional TOML file.
//!
//! Every section has defaults, so an empty file (or no file) gives a working
//! configuration against the public BLS endpoint.

use crate::data::fallback::{Annualization, Conversion, FallbackTier, RoundingRule, HOURS_PER_YEAR};
use crate::series_id::{
    DataTypeCode, OccupationCode, ANNUAL_MEAN_WAGE, HOURLY_MEAN_WAGE, UNEMPLOYMENT_RATE,
};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "https://api.bls.gov/publicAPI/v2/timeseries/data/";
pub const DEFAULT_API_KEY_ENV: &str = "BLS_API_KEY";
/// Upper bound on `api.max_retries`.
pub const MAX_RETRIES: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub api: ApiConfig,
    pub dataset: DatasetConfig,
    pub wage: WageConfig,
    pub unemployment: UnemploymentConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub endpoint: String,
    /// Per-call timeout.
    pub timeout_secs: u64,
    /// Requested batch size, clamped to the upstream ceiling.
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    /// Environment variable holding the registration key.
    pub api_key_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 30,
            batch_size: 50,
            max_retries: 2,
            retry_base_delay_ms: 500,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

impl ApiConfig {
    /// Registration key from the environment. Absent or blank is `None`.
    pub fn registration_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub path: PathBuf,
    /// Publish directory for the verbatim mirror copy.
    pub mirror_dir: Option<PathBuf>,
    /// Where readers look when `path` does not exist.
    pub fallback_read_path: Option<PathBuf>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/labor_stats.json"),
            mirror_dir: Some(PathBuf::from("web/data")),
            fallback_read_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WageConfig {
    pub occupation_code: OccupationCode,
    pub data_type: DataTypeCode,
    pub fallbacks: Vec<FallbackTier>,
    pub hours_per_year: f64,
    pub rounding: RoundingRule,
}

impl Default for WageConfig {
    fn default() -> Self {
        Self {
            occupation_code: OccupationCode::default(),
            data_type: ANNUAL_MEAN_WAGE,
            fallbacks: vec![FallbackTier {
                data_type: HOURLY_MEAN_WAGE,
                conversion: Conversion::HourlyToAnnual,
            }],
            hours_per_year: HOURS_PER_YEAR,
            rounding: RoundingRule::Nearest,
        }
    }
}

impl WageConfig {
    pub fn annualization(&self) -> Annualization {
        Annualization {
            hours_per_year: self.hours_per_year,
            rounding: self.rounding,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnemploymentConfig {
    pub data_type: DataTypeCode,
    pub fallbacks: Vec<FallbackTier>,
}

impl Default for UnemploymentConfig {
    fn default() -> Self {
        Self {
            data_type: UNEMPLOYMENT_RATE,
            fallbacks: Vec::new(),
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate. Code fields are validated while deserializing.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.wage.hours_per_year.is_finite() && self.wage.hours_per_year > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "wage.hours_per_year must be positive, got {}",
                self.wage.hours_per_year
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.timeout_secs must be > 0".into()));
        }
        if self.api.batch_size == 0 {
            return Err(ConfigError::Invalid("api.batch_size must be > 0".into()));
        }
        if self.api.max_retries > MAX_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "api.max_retries must be at most {MAX_RETRIES}, got {}",
                self.api.max_retries
            )));
        }
        if let Some(mirror) = &self.dataset.mirror_dir {
            let parent = self.dataset.path.parent().unwrap_or(Path::new(""));
            if lexical(mirror).eq(lexical(parent)) {
                return Err(ConfigError::Invalid(format!(
                    "dataset.mirror_dir {} is the directory of dataset.path",
                    mirror.display()
                )));
            }
        }
        for tier in &self.wage.fallbacks {
            if tier.data_type == self.wage.data_type {
                return Err(ConfigError::Invalid(format!(
                    "wage fallback repeats the primary data type {}",
                    tier.data_type
                )));
            }
        }
        for tier in &self.unemployment.fallbacks {
            if tier.data_type == self.unemployment.data_type {
                return Err(ConfigError::Invalid(format!(
                    "unemployment fallback repeats the primary data type {}",
                    tier.data_type
                )));
            }
        }
        Ok(())
    }
}

/// Path components without `.` segments.
fn lexical(path: &Path) -> impl Iterator<Item = Component<'_>> {
    path.components().filter(|c| *c != Component::CurDir)
}
