//! Cell requests and recurring time segments.

use serde::{Deserialize, Serialize};

/// A recurring intra-year interval replicated across a range of years.
///
/// `last_day < first_day` signals a new-year wraparound: the segment runs
/// from `first_day` through the end of one year and continues from day 1
/// through `last_day` of the next. Days are 1-based day-of-year; hours are
/// 0-23 inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSegment {
    pub first_year: i32,
    pub last_year: i32,
    pub first_day: u16,
    pub last_day: u16,
    pub start_hour: u8,
    pub stop_hour: u8,
}

impl TimeSegment {
    pub fn new(
        first_year: i32,
        last_year: i32,
        first_day: u16,
        last_day: u16,
        start_hour: u8,
        stop_hour: u8,
    ) -> Self {
        Self {
            first_year,
            last_year,
            first_day,
            last_day,
            start_hour,
            stop_hour,
        }
    }

    /// Segment covering whole days of a single day-of-year range each year.
    pub fn days(first_year: i32, last_year: i32, first_day: u16, last_day: u16) -> Self {
        Self::new(first_year, last_year, first_day, last_day, 0, 23)
    }

    /// Whether the day range wraps across the new year.
    pub fn wraps_year(&self) -> bool {
        self.last_day < self.first_day
    }

    /// Whether the hour range covers all 24 hours.
    pub fn covers_full_day(&self) -> bool {
        self.start_hour == 0 && self.stop_hour >= 23
    }

    /// Number of years the segment is replicated over.
    pub fn year_count(&self) -> usize {
        if self.last_year < self.first_year {
            0
        } else {
            (self.last_year - self.first_year) as usize + 1
        }
    }

    /// Stable byte representation for structural content hashing.
    pub fn content_bytes(&self) -> [u8; 14] {
        let mut out = [0u8; 14];
        out[0..4].copy_from_slice(&self.first_year.to_le_bytes());
        out[4..8].copy_from_slice(&self.last_year.to_le_bytes());
        out[8..10].copy_from_slice(&self.first_day.to_le_bytes());
        out[10..12].copy_from_slice(&self.last_day.to_le_bytes());
        out[12] = self.start_hour;
        out[13] = self.stop_hour;
        out
    }
}

/// A single space-time aggregation request.
///
/// A point request has `lat_min == lat_max && lon_min == lon_max`.
/// Longitudes may cross the date line (`lon_min > lon_max` after
/// normalization is resolved by the cycled longitude axis, not here).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRequest {
    pub variable_name: String,
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    pub time: TimeSegment,
}

impl CellRequest {
    pub fn new(
        variable_name: impl Into<String>,
        lat_min: f64,
        lat_max: f64,
        lon_min: f64,
        lon_max: f64,
        time: TimeSegment,
    ) -> Self {
        Self {
            variable_name: variable_name.into(),
            lat_min,
            lat_max,
            lon_min,
            lon_max,
            time,
        }
    }

    /// A degenerate cell collapsing to a single coordinate.
    pub fn point(variable_name: impl Into<String>, lat: f64, lon: f64, time: TimeSegment) -> Self {
        Self::new(variable_name, lat, lat, lon, lon, time)
    }

    /// Whether this request is a point rather than an area.
    pub fn is_point(&self) -> bool {
        self.lat_min == self.lat_max && self.lon_min == self.lon_max
    }

    /// Stable byte representation for structural content hashing.
    pub fn content_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.variable_name.len() + 1 + 32 + 14);
        out.extend_from_slice(self.variable_name.as_bytes());
        out.push(0);
        for v in [self.lat_min, self.lat_max, self.lon_min, self.lon_max] {
            out.extend_from_slice(&v.to_bits().to_le_bytes());
        }
        out.extend_from_slice(&self.time.content_bytes());
        out
    }
}
