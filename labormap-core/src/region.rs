//! Region table — the 48 contiguous states plus DC.
//!
//! Each region pairs a two-letter postal code with its two-digit FIPS code.
//! Regions can only be obtained from the fixed table, so a series identifier
//! can never be built for an unmapped code.

use crate::series_id::SeriesIdError;
use std::fmt;

/// A tracked region (state or federal district).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region {
    postal: &'static str,
    fips: &'static str,
}

/// Regions deliberately left out of the working set (non-contiguous).
pub const EXCLUDED_POSTAL: [&str; 2] = ["AK", "HI"];

const fn r(postal: &'static str, fips: &'static str) -> Region {
    Region { postal, fips }
}

/// The working set, ordered by postal code.
pub const REGIONS: [Region; 49] = [
    r("AL", "01"),
    r("AR", "05"),
    r("AZ", "04"),
    r("CA", "06"),
    r("CO", "08"),
    r("CT", "09"),
    r("DC", "11"),
    r("DE", "10"),
    r("FL", "12"),
    r("GA", "13"),
    r("IA", "19"),
    r("ID", "16"),
    r("IL", "17"),
    r("IN", "18"),
    r("KS", "20"),
    r("KY", "21"),
    r("LA", "22"),
    r("MA", "25"),
    r("MD", "24"),
    r("ME", "23"),
    r("MI", "26"),
    r("MN", "27"),
    r("MO", "29"),
    r("MS", "28"),
    r("MT", "30"),
    r("NC", "37"),
    r("ND", "38"),
    r("NE", "31"),
    r("NH", "33"),
    r("NJ", "34"),
    r("NM", "35"),
    r("NV", "32"),
    r("NY", "36"),
    r("OH", "39"),
    r("OK", "40"),
    r("OR", "41"),
    r("PA", "42"),
    r("RI", "44"),
    r("SC", "45"),
    r("SD", "46"),
    r("TN", "47"),
    r("TX", "48"),
    r("UT", "49"),
    r("VA", "51"),
    r("VT", "50"),
    r("WA", "53"),
    r("WI", "55"),
    r("WV", "54"),
    r("WY", "56"),
];

impl Region {
    /// Two-letter postal code, e.g. `CA`.
    pub fn postal(&self) -> &'static str {
        self.postal
    }

    /// Two-digit FIPS code, e.g. `06`.
    pub fn fips(&self) -> &'static str {
        self.fips
    }

    /// All 49 tracked regions.
    pub fn all() -> &'static [Region] {
        &REGIONS
    }

    /// Look up a region by postal code (case-insensitive).
    pub fn from_postal(code: &str) -> Result<Region, SeriesIdError> {
        let upper = code.trim().to_ascii_uppercase();
        if EXCLUDED_POSTAL.contains(&upper.as_str()) {
            return Err(SeriesIdError::ExcludedRegion(upper));
        }
        REGIONS
            .iter()
            .find(|r| r.postal == upper)
            .copied()
            .ok_or(SeriesIdError::UnknownRegion(upper))
    }

    /// Look up a region by two-digit FIPS code.
    pub fn from_fips(code: &str) -> Result<Region, SeriesIdError> {
        let code = code.trim();
        REGIONS
            .iter()
            .find(|r| r.fips == code)
            .copied()
            .ok_or_else(|| SeriesIdError::UnknownRegion(code.to_string()))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.postal)
    }
}
