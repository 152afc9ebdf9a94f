//! Persisted dataset model and per-field merge.
//!
//! The dataset maps postal codes to metric records. Each phase owns one
//! field; a merge only writes the fields an update carries, so phases for
//! different metrics can interleave writes to the same file.

use crate::region::Region;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The two tracked metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Unemployment rate, percent.
    UnemploymentRate,
    /// Software developer annual mean wage, dollars.
    SoftwareDeveloperWage,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::SoftwareDeveloperWage, Metric::UnemploymentRate];

    /// Field name in the persisted file.
    pub fn field_name(&self) -> &'static str {
        match self {
            Metric::UnemploymentRate => "unemployment_rate",
            Metric::SoftwareDeveloperWage => "swdev_wage",
        }
    }

    pub fn get(&self, record: &MetricRecord) -> Option<f64> {
        match self {
            Metric::UnemploymentRate => record.unemployment_rate,
            Metric::SoftwareDeveloperWage => record.swdev_wage,
        }
    }
}

/// Per-region record. Missing values are explicit nulls in the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    #[serde(default)]
    pub unemployment_rate: Option<f64>,
    #[serde(default)]
    pub swdev_wage: Option<f64>,
    /// Fields written by something other than this pipeline; carried through.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Partial record: `Some` fields are written, `None` fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricUpdate {
    pub unemployment_rate: Option<f64>,
    pub swdev_wage: Option<f64>,
}

impl MetricUpdate {
    /// An update that only ensures the region exists.
    pub fn touch() -> Self {
        Self::default()
    }

    pub fn set(metric: Metric, value: f64) -> Self {
        let mut update = Self::default();
        match metric {
            Metric::UnemploymentRate => update.unemployment_rate = Some(value),
            Metric::SoftwareDeveloperWage => update.swdev_wage = Some(value),
        }
        update
    }

    fn apply(&self, record: &mut MetricRecord) {
        if let Some(v) = self.unemployment_rate {
            record.unemployment_rate = Some(v);
        }
        if let Some(v) = self.swdev_wage {
            record.swdev_wage = Some(v);
        }
    }
}

pub type Updates = BTreeMap<Region, MetricUpdate>;

/// Region code → record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    records: BTreeMap<String, MetricRecord>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Pretty-printed JSON with a trailing newline.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    pub fn get(&self, postal: &str) -> Option<&MetricRecord> {
        self.records.get(postal)
    }

    pub fn records(&self) -> &BTreeMap<String, MetricRecord> {
        &self.records
    }

    pub fn insert(&mut self, postal: impl Into<String>, record: MetricRecord) {
        self.records.insert(postal.into(), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Apply `updates` field by field.
    ///
    /// A region missing from the dataset starts as an all-null record.
    /// Regions without an update are passed through unchanged. Applying the
    /// same updates twice gives the same result as applying them once.
    pub fn merge(&self, updates: &Updates) -> Dataset {
        let mut merged = self.clone();
        for (region, update) in updates {
            let record = merged
                .records
                .entry(region.postal().to_string())
                .or_default();
            update.apply(record);
        }
        merged
    }

    /// How many of the tracked regions have a value for `metric`.
    pub fn coverage(&self, metric: Metric) -> Coverage {
        let mut missing = Vec::new();
        for region in Region::all() {
            let value = self.get(region.postal()).and_then(|r| metric.get(r));
            if value.is_none() {
                missing.push(*region);
            }
        }
        Coverage {
            metric,
            total: Region::all().len(),
            populated: Region::all().len() - missing.len(),
            missing,
        }
    }

    /// Tracked regions with a value for `metric`, highest first.
    pub fn ranking(&self, metric: Metric) -> Vec<(Region, f64)> {
        let mut ranked: Vec<(Region, f64)> = Region::all()
            .iter()
            .filter_map(|r| {
                self.get(r.postal())
                    .and_then(|rec| metric.get(rec))
                    .map(|v| (*r, v))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    pub metric: Metric,
    pub total: usize,
    pub populated: usize,
    pub missing: Vec<Region>,
}

impl Coverage {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}
