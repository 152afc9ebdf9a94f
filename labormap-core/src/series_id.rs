//! Series identifier construction for the two statistic families.
//!
//! Identifiers are fixed-width strings. A single wrong digit still yields a
//! well-formed identifier that silently queries a different series (or
//! nothing), so every field here has a fixed width and the output is pinned
//! by golden tests.
//!
//! Wage family (OEWS), 25 chars:
//! `OE` `U` `S` `<fips>00000` `000000` `<occupation>` `<data type>`
//!
//! Unemployment family (LAUS), 20 chars:
//! `LA` `S` `ST<fips>00000000000` `<measure>`

use crate::region::Region;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Default occupation: software developers.
pub const SOFTWARE_DEVELOPERS: &str = "151252";

/// Malformed input given to identifier construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesIdError {
    #[error("unknown region code '{0}'")]
    UnknownRegion(String),

    #[error("region '{0}' is excluded from the working set")]
    ExcludedRegion(String),

    #[error("data type code must be exactly two digits, got '{0}'")]
    InvalidDataType(String),

    #[error("occupation code must be exactly six digits, got '{0}'")]
    InvalidOccupation(String),
}

/// Statistic family. The two families use different area encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Occupational employment and wage statistics, statewide.
    Wage,
    /// Local area unemployment statistics, statewide.
    Unemployment,
}

/// Two-digit data-type (measure) suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataTypeCode([u8; 2]);

/// Wage family: annual mean wage.
pub const ANNUAL_MEAN_WAGE: DataTypeCode = DataTypeCode(*b"04");
/// Wage family: hourly mean wage.
pub const HOURLY_MEAN_WAGE: DataTypeCode = DataTypeCode(*b"03");
/// Unemployment family: unemployment rate.
pub const UNEMPLOYMENT_RATE: DataTypeCode = DataTypeCode(*b"03");

impl DataTypeCode {
    pub fn new(code: &str) -> Result<Self, SeriesIdError> {
        match code.as_bytes() {
            [a, b] if a.is_ascii_digit() && b.is_ascii_digit() => Ok(Self([*a, *b])),
            _ => Err(SeriesIdError::InvalidDataType(code.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        // Both bytes are ASCII digits by construction.
        std::str::from_utf8(&self.0).unwrap_or("??")
    }
}

impl fmt::Display for DataTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DataTypeCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DataTypeCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        DataTypeCode::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Six-digit occupation code for the wage family.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OccupationCode(String);

impl OccupationCode {
    pub fn new(code: &str) -> Result<Self, SeriesIdError> {
        if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(code.to_string()))
        } else {
            Err(SeriesIdError::InvalidOccupation(code.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OccupationCode {
    fn default() -> Self {
        Self(SOFTWARE_DEVELOPERS.to_string())
    }
}

impl Serialize for OccupationCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for OccupationCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        OccupationCode::new(&s).map_err(serde::de::Error::custom)
    }
}

/// A fully-formed upstream series identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SeriesId(String);

impl SeriesId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap a raw identifier echoed back by the upstream API.
    pub(crate) fn from_upstream(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Length of a wage-family identifier.
pub const WAGE_ID_LEN: usize = 25;
/// Length of an unemployment-family identifier.
pub const UNEMPLOYMENT_ID_LEN: usize = 20;

/// Build a series identifier. Pure: identical input yields identical output.
pub fn build_id(
    region: Region,
    data_type: DataTypeCode,
    family: Family,
    occupation: &OccupationCode,
) -> SeriesId {
    let id = match family {
        Family::Wage => format!(
            "OEUS{area:0<7}000000{occ}{dt}",
            area = region.fips(),
            occ = occupation.as_str(),
            dt = data_type
        ),
        Family::Unemployment => format!(
            "LASST{area:0<13}{dt}",
            area = region.fips(),
            dt = data_type
        ),
    };
    debug_assert_eq!(
        id.len(),
        match family {
            Family::Wage => WAGE_ID_LEN,
            Family::Unemployment => UNEMPLOYMENT_ID_LEN,
        }
    );
    SeriesId(id)
}

/// Build an identifier from raw codes, rejecting anything outside the region
/// table or a malformed data type.
pub fn build_id_from_codes(
    fips: &str,
    data_type: &str,
    family: Family,
) -> Result<SeriesId, SeriesIdError> {
    let region = Region::from_fips(fips)?;
    let data_type = DataTypeCode::new(data_type)?;
    Ok(build_id(
        region,
        data_type,
        family,
        &OccupationCode::default(),
    ))
}
