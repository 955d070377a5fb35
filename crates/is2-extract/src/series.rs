//! Extraction result types.

use serde::{Deserialize, Serialize};

use is2_common::days_to_decimal_years;

/// One epoch of an extracted series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesRecord {
    /// Days since the mission epoch.
    pub time: f64,
    /// Extracted or aggregated value; NaN when no valid cells contributed.
    pub value: f64,
    /// Companion uncertainty, aggregated in quadrature for area weights.
    pub uncertainty: Option<f64>,
    /// Total weight area behind an aggregated value, in square meters.
    /// Carrying it lets sub-region series recombine exactly.
    pub area: Option<f64>,
}

impl SeriesRecord {
    /// The record's time as a fractional calendar year.
    pub fn decimal_year(&self) -> f64 {
        days_to_decimal_years(self.time)
    }
}

/// Descriptive metadata carried with every series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeriesMetadata {
    pub variable: String,
    pub units: String,
    pub long_name: String,
    /// Group the variable came from, when the layout is grouped.
    pub group: Option<String>,
    /// Lag length of the group, in quarters.
    pub lag_quarters: u32,
    pub crs_wkt: Option<String>,
}

/// A time series extracted from one geometry.
///
/// An empty record list is a valid outcome: the geometry fell outside the
/// grid or covered no valid cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSeries {
    pub records: Vec<SeriesRecord>,
    pub metadata: SeriesMetadata,
}

impl ExtractedSeries {
    pub fn empty(metadata: SeriesMetadata) -> Self {
        Self {
            records: Vec::new(),
            metadata,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn times(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.time).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.value).collect()
    }
}

/// A distance-by-time matrix sampled along a transect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransectProfile {
    /// Distance of each sample from the transect start, in meters.
    pub distances: Vec<f64>,
    /// Sample locations in projected coordinates.
    pub points: Vec<(f64, f64)>,
    /// Days since the mission epoch.
    pub times: Vec<f64>,
    /// Row-major values, one row per epoch, one column per sample.
    pub values: Vec<f64>,
    pub metadata: SeriesMetadata,
}

impl TransectProfile {
    /// Value at one epoch and sample index.
    pub fn value(&self, epoch: usize, sample: usize) -> f64 {
        self.values[epoch * self.distances.len() + sample]
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_year_conversion() {
        let record = SeriesRecord {
            time: 365.25,
            value: 1.0,
            uncertainty: None,
            area: None,
        };
        assert!((record.decimal_year() - 2019.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_series() {
        let series = ExtractedSeries::empty(SeriesMetadata::default());
        assert!(series.is_empty());
        assert_eq!(series.len(), 0);
    }
}
