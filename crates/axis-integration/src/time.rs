//! Temporal projections and time-axis integration.
//!
//! A [`TimeSegment`] is a recurring intra-year interval replicated over a
//! year range. A [`TimeProjection`] maps it to scalar intervals in the time
//! axis's own units; the generic [`AxisIntegrator`] then does the weighting.
//! [`MonthlyMeansIntegrator`] bypasses projection entirely for axes with one
//! node per calendar month.

use std::collections::BTreeMap;

use agg_common::{DataCoverage, TimeSegment};
use chrono::NaiveDate;
use tracing::debug;

use crate::axis::{AxisIntegration, AxisIntegrator};
use crate::error::{AxisError, Result};
use crate::ips::{IndexBoundingBox, IntegrationPoints};

/// Cumulative day-of-year at each month boundary, non-leap calendar.
const MONTH_STARTS: [u16; 13] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334, 365];

/// Maps a recurring time segment to scalar intervals on a time axis.
///
/// Each replicated year yields one interval, or two when the day range
/// wraps across the new year. Years in which the requested days do not
/// exist (day 366 outside leap years) contribute nothing; a segment whose
/// days exist in no replicated year projects to an empty set, which
/// integrates as `OutOfData`.
pub trait TimeProjection: Send + Sync {
    fn project(&self, segment: &TimeSegment) -> Result<Vec<(f64, f64)>>;
}

/// Integrates recurring time segments against a concrete time axis.
pub trait TimeIntegrator: Send + Sync {
    fn integrate(&self, segment: &TimeSegment) -> Result<AxisIntegration>;

    fn bounding_box(&self, segment: &TimeSegment) -> Result<IndexBoundingBox> {
        Ok(self.integrate(segment)?.ips.bounding)
    }

    fn coverage(&self, segment: &TimeSegment) -> Result<DataCoverage> {
        Ok(self.integrate(segment)?.coverage)
    }
}

fn days_in_year(year: i32) -> u16 {
    if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 {
        366
    } else {
        365
    }
}

fn validate_segment(segment: &TimeSegment) -> Result<()> {
    if segment.last_year < segment.first_year {
        return Err(AxisError::invalid_segment(format!(
            "year range {}..{} is empty",
            segment.first_year, segment.last_year
        )));
    }
    if segment.first_day == 0 || segment.last_day == 0 {
        return Err(AxisError::invalid_segment("day-of-year is 1-based"));
    }
    if segment.start_hour > 23 || segment.stop_hour > 23 || segment.stop_hour < segment.start_hour {
        return Err(AxisError::invalid_segment(format!(
            "invalid hour range {}..{}",
            segment.start_hour, segment.stop_hour
        )));
    }
    Ok(())
}

/// Real-calendar projection: coordinates are `units_per_day` units since an
/// epoch date, leap years included.
#[derive(Debug, Clone)]
pub struct CalendarDaysProjection {
    epoch: NaiveDate,
    units_per_day: f64,
}

impl CalendarDaysProjection {
    pub fn new(epoch: NaiveDate, units_per_day: f64) -> Result<Self> {
        if !(units_per_day.is_finite() && units_per_day > 0.0) {
            return Err(AxisError::invalid_axis(format!(
                "units_per_day must be positive, got {units_per_day}"
            )));
        }
        Ok(Self {
            epoch,
            units_per_day,
        })
    }

    /// Axis coordinate of midnight starting the given day-of-year.
    fn day_coord(&self, year: i32, day: u16) -> Result<f64> {
        let date = NaiveDate::from_yo_opt(year, day as u32).ok_or_else(|| {
            AxisError::invalid_segment(format!("day {day} does not exist in year {year}"))
        })?;
        Ok((date - self.epoch).num_days() as f64 * self.units_per_day)
    }

    /// Interval for one replicated year; `None` when the first day does
    /// not exist in that calendar year.
    fn interval(
        &self,
        year: i32,
        first: u16,
        last: u16,
        segment: &TimeSegment,
    ) -> Result<Option<(f64, f64)>> {
        let days = days_in_year(year);
        if first > days {
            debug!(year, day = first, "day not in calendar year, skipping");
            return Ok(None);
        }
        let last = last.min(days);
        let start = self.day_coord(year, first)?
            + segment.start_hour as f64 / 24.0 * self.units_per_day;
        let stop = self.day_coord(year, last)?
            + (segment.stop_hour as f64 + 1.0) / 24.0 * self.units_per_day;
        Ok(Some((start, stop)))
    }
}

impl TimeProjection for CalendarDaysProjection {
    fn project(&self, segment: &TimeSegment) -> Result<Vec<(f64, f64)>> {
        validate_segment(segment)?;
        let mut intervals = Vec::with_capacity(segment.year_count() * 2);
        for year in segment.first_year..=segment.last_year {
            if segment.wraps_year() {
                intervals
                    .extend(self.interval(year, segment.first_day, days_in_year(year), segment)?);
                intervals.extend(self.interval(year + 1, 1, segment.last_day, segment)?);
            } else {
                intervals
                    .extend(self.interval(year, segment.first_day, segment.last_day, segment)?);
            }
        }
        Ok(intervals)
    }
}

/// 360-day-calendar projection: every year has 12 months of 30 days.
///
/// Used by climate model output on idealized calendars; `chrono` dates do
/// not apply here, coordinates are pure arithmetic from an epoch year.
#[derive(Debug, Clone)]
pub struct Days360Projection {
    epoch_year: i32,
    units_per_day: f64,
}

impl Days360Projection {
    pub fn new(epoch_year: i32, units_per_day: f64) -> Result<Self> {
        if !(units_per_day.is_finite() && units_per_day > 0.0) {
            return Err(AxisError::invalid_axis(format!(
                "units_per_day must be positive, got {units_per_day}"
            )));
        }
        Ok(Self {
            epoch_year,
            units_per_day,
        })
    }

    fn day_coord(&self, year: i32, day: u16) -> f64 {
        ((year - self.epoch_year) as f64 * 360.0 + (day as f64 - 1.0)) * self.units_per_day
    }

    /// Interval for one replicated year; `None` when the first day does
    /// not exist in the 360-day calendar.
    fn interval(
        &self,
        year: i32,
        first: u16,
        last: u16,
        segment: &TimeSegment,
    ) -> Option<(f64, f64)> {
        if first > 360 {
            debug!(year, day = first, "day not in 360-day calendar, skipping");
            return None;
        }
        let last = last.min(360);
        let start =
            self.day_coord(year, first) + segment.start_hour as f64 / 24.0 * self.units_per_day;
        let stop = self.day_coord(year, last)
            + (segment.stop_hour as f64 + 1.0) / 24.0 * self.units_per_day;
        Some((start, stop))
    }
}

impl TimeProjection for Days360Projection {
    fn project(&self, segment: &TimeSegment) -> Result<Vec<(f64, f64)>> {
        validate_segment(segment)?;
        let mut intervals = Vec::with_capacity(segment.year_count() * 2);
        for year in segment.first_year..=segment.last_year {
            if segment.wraps_year() {
                intervals.extend(self.interval(year, segment.first_day, 360, segment));
                intervals.extend(self.interval(year + 1, 1, segment.last_day, segment));
            } else {
                intervals.extend(self.interval(year, segment.first_day, segment.last_day, segment));
            }
        }
        Ok(intervals)
    }
}

/// Projects segments through a [`TimeProjection`] and merges the per-year
/// integrations into a single weighted index set.
pub struct ProjectedTimeIntegrator {
    projection: Box<dyn TimeProjection>,
    integrator: AxisIntegrator,
}

impl ProjectedTimeIntegrator {
    pub fn new(projection: Box<dyn TimeProjection>, integrator: AxisIntegrator) -> Self {
        Self {
            projection,
            integrator,
        }
    }
}

impl TimeIntegrator for ProjectedTimeIntegrator {
    fn integrate(&self, segment: &TimeSegment) -> Result<AxisIntegration> {
        let intervals = self.projection.project(segment)?;
        let mut merged: BTreeMap<usize, f64> = BTreeMap::new();
        let mut coverages = Vec::with_capacity(intervals.len());
        let mut any_out = false;
        let mut total_duration = 0.0;

        // Duration-weight each interval so multi-year means stay calendar
        // faithful (leap years contribute slightly more).
        let results: Vec<(AxisIntegration, f64)> = intervals
            .iter()
            .map(|&(a, b)| (self.integrator.integrate(a, b), (b - a).max(0.0)))
            .collect();
        let all_zero_length = results.iter().all(|(_, d)| *d == 0.0);

        for (result, duration) in results {
            if result.coverage == DataCoverage::OutOfData {
                any_out = true;
                continue;
            }
            let duration = if all_zero_length { 1.0 } else { duration };
            coverages.push(result.coverage);
            total_duration += duration;
            for (i, w) in result.ips.iter() {
                *merged.entry(i).or_insert(0.0) += w * duration;
            }
        }

        if merged.is_empty() || total_duration <= 0.0 {
            return Ok(AxisIntegration::out_of_data());
        }

        let mut coverage = DataCoverage::combine_all(coverages);
        if any_out {
            debug!("some projected intervals out of data, demoting coverage");
            coverage = coverage.combine(DataCoverage::DataWithoutUncertainty);
        }

        let sum: f64 = merged.values().sum();
        let (indices, weights) = merged
            .into_iter()
            .map(|(i, w)| (i, w / sum))
            .unzip();
        Ok(AxisIntegration {
            ips: IntegrationPoints::new(weights, indices),
            coverage,
        })
    }
}

/// Integrator for axes with exactly one node per calendar month.
///
/// A full non-leap calendar year collapses to 12 equal monthly weights and
/// keeps uncertainty support; any partial day range is weighted by
/// day-overlap per month and demoted to `DataWithoutUncertainty`.
#[derive(Debug, Clone)]
pub struct MonthlyMeansIntegrator {
    /// Year of the axis's first (January) node.
    first_year: i32,
    /// Number of monthly nodes on the axis.
    months: usize,
}

impl MonthlyMeansIntegrator {
    pub fn new(first_year: i32, months: usize) -> Result<Self> {
        if months == 0 {
            return Err(AxisError::invalid_axis("monthly axis has no nodes"));
        }
        Ok(Self { first_year, months })
    }

    fn month_index(&self, year: i32, month: usize) -> Option<usize> {
        let offset = (year as i64 - self.first_year as i64) * 12 + month as i64;
        if offset >= 0 && (offset as usize) < self.months {
            Some(offset as usize)
        } else {
            None
        }
    }

    /// Day-overlap of `[first, last]` with each non-leap month.
    fn month_overlaps(first: u16, last: u16) -> [f64; 12] {
        let mut out = [0.0; 12];
        let last = last.min(365);
        for m in 0..12 {
            let lo = (first - 1).max(MONTH_STARTS[m]);
            let hi = last.min(MONTH_STARTS[m + 1]);
            if hi > lo {
                out[m] = (hi - lo) as f64;
            }
        }
        out
    }

    fn accumulate(
        &self,
        year: i32,
        overlaps: &[f64; 12],
        merged: &mut BTreeMap<usize, f64>,
        dropped: &mut bool,
    ) {
        for (m, &w) in overlaps.iter().enumerate() {
            if w <= 0.0 {
                continue;
            }
            match self.month_index(year, m) {
                Some(i) => *merged.entry(i).or_insert(0.0) += w,
                None => *dropped = true,
            }
        }
    }
}

impl TimeIntegrator for MonthlyMeansIntegrator {
    fn integrate(&self, segment: &TimeSegment) -> Result<AxisIntegration> {
        validate_segment(segment)?;

        let full_year = !segment.wraps_year()
            && segment.first_day == 1
            && segment.last_day >= 365
            && segment.covers_full_day();

        let mut merged: BTreeMap<usize, f64> = BTreeMap::new();
        let mut dropped = false;
        for year in segment.first_year..=segment.last_year {
            if full_year {
                for m in 0..12 {
                    match self.month_index(year, m) {
                        Some(i) => *merged.entry(i).or_insert(0.0) += 1.0,
                        None => dropped = true,
                    }
                }
            } else if segment.wraps_year() {
                self.accumulate(
                    year,
                    &Self::month_overlaps(segment.first_day, 365),
                    &mut merged,
                    &mut dropped,
                );
                self.accumulate(
                    year + 1,
                    &Self::month_overlaps(1, segment.last_day),
                    &mut merged,
                    &mut dropped,
                );
            } else {
                self.accumulate(
                    year,
                    &Self::month_overlaps(segment.first_day, segment.last_day),
                    &mut merged,
                    &mut dropped,
                );
            }
        }

        if merged.is_empty() {
            return Ok(AxisIntegration::out_of_data());
        }

        let coverage = if full_year && !dropped {
            DataCoverage::DataWithUncertainty
        } else {
            DataCoverage::DataWithoutUncertainty
        };
        let sum: f64 = merged.values().sum();
        let (indices, weights) = merged
            .into_iter()
            .map(|(i, w)| (i, w / sum))
            .unzip();
        Ok(AxisIntegration {
            ips: IntegrationPoints::new(weights, indices),
            coverage,
        })
    }
}
