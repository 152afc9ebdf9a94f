//! Shared helpers for integration tests.

#![allow(dead_code)]

use labormap_core::data::{FetchError, LatestValues, SeriesSource};
use labormap_core::{build_id, DataTypeCode, Family, OccupationCode, Region, SeriesId};
use std::cell::RefCell;

pub fn region(postal: &str) -> Region {
    Region::from_postal(postal).unwrap()
}

pub fn dt(code: &str) -> DataTypeCode {
    DataTypeCode::new(code).unwrap()
}

pub fn wage_id(postal: &str, data_type: &str) -> SeriesId {
    build_id(
        region(postal),
        dt(data_type),
        Family::Wage,
        &OccupationCode::default(),
    )
}

pub fn unemployment_id(postal: &str) -> SeriesId {
    build_id(
        region(postal),
        dt("03"),
        Family::Unemployment,
        &OccupationCode::default(),
    )
}

/// In-memory source that serves fixed values and can fail on a given call.
pub struct ScriptedSource {
    pub values: LatestValues,
    pub batch_limit: usize,
    /// 1-based call number that fails, and the error it returns.
    pub fail_on_call: Option<(usize, FetchError)>,
    /// Every call from the failing one onwards fails (sticky quota).
    pub sticky: bool,
    pub calls: RefCell<Vec<Vec<SeriesId>>>,
}

impl ScriptedSource {
    pub fn new(values: LatestValues) -> Self {
        Self {
            values,
            batch_limit: 50,
            fail_on_call: None,
            sticky: false,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, call: usize, err: FetchError, sticky: bool) -> Self {
        self.fail_on_call = Some((call, err));
        self.sticky = sticky;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn requested(&self) -> Vec<SeriesId> {
        self.calls.borrow().iter().flatten().cloned().collect()
    }
}

impl SeriesSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn max_batch_size(&self) -> usize {
        self.batch_limit
    }

    fn fetch_batch(&self, ids: &[SeriesId]) -> Result<LatestValues, FetchError> {
        let mut calls = self.calls.borrow_mut();
        calls.push(ids.to_vec());
        if let Some((n, err)) = &self.fail_on_call {
            let hit = if self.sticky {
                calls.len() >= *n
            } else {
                calls.len() == *n
            };
            if hit {
                return Err(err.clone());
            }
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.values.get(id).map(|v| (id.clone(), *v)))
            .collect())
    }
}

pub fn quota() -> FetchError {
    FetchError::QuotaExceeded {
        message: "daily threshold for total number of requests reached".into(),
    }
}

pub fn api_failure() -> FetchError {
    FetchError::ApiFailure {
        reason: "HTTP 500 Internal Server Error".into(),
        body: Some("<html>oops</html>".into()),
    }
}
