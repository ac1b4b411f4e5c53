//! Tri-state data coverage classification.

use serde::{Deserialize, Serialize};

/// Classification of whether a requested interval is in-extent and clean
/// enough to support variance estimation.
///
/// Coverage results from independent axes combine by worst-case precedence:
/// `OutOfData` dominates `DataWithoutUncertainty` dominates
/// `DataWithUncertainty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataCoverage {
    /// The interval lies outside the data extent; no mean can be computed.
    OutOfData,
    /// A mean can be computed but the support is uneven or uncalibrated,
    /// so no variance estimate is available.
    DataWithoutUncertainty,
    /// Full, clean coverage: both mean and variance are available.
    DataWithUncertainty,
}

impl DataCoverage {
    /// Severity rank used for worst-case combination (higher = worse).
    fn severity(self) -> u8 {
        match self {
            DataCoverage::DataWithUncertainty => 0,
            DataCoverage::DataWithoutUncertainty => 1,
            DataCoverage::OutOfData => 2,
        }
    }

    /// Combine coverage across independent axes, worst case wins.
    pub fn combine(self, other: DataCoverage) -> DataCoverage {
        if self.severity() >= other.severity() {
            self
        } else {
            other
        }
    }

    /// Combine an iterator of per-axis coverages; empty input means full
    /// coverage (no axis constrained the request).
    pub fn combine_all<I: IntoIterator<Item = DataCoverage>>(iter: I) -> DataCoverage {
        iter.into_iter()
            .fold(DataCoverage::DataWithUncertainty, DataCoverage::combine)
    }

    pub fn is_out_of_data(self) -> bool {
        self == DataCoverage::OutOfData
    }
}
