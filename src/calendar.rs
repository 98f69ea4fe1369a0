//! Compression of a discontinuous shift calendar into a dense integer
//! minute axis, and its inverse.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::PlannerError;

/// One row of the shift calendar. A shift may cross midnight: if
/// `end_time <= start_time`, the real end is placed on the following day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Shift {
    pub day: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub operator_capacity: u32,
}

/// A contiguous slab of compressed time mapped back to a real calendar window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompressedInterval {
    pub real_start: NaiveDateTime,
    pub real_end: NaiveDateTime,
    pub comp_start: i64,
    pub comp_end: i64,
    pub capacity: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecompressMode {
    Start,
    End,
}

/// Forward/inverse mapping between real timestamps and compressed minutes,
/// built once from a shift calendar and immutable thereafter.
#[derive(Clone, Debug)]
pub struct Calendar {
    intervals: Vec<CompressedInterval>,
}

impl Calendar {
    /// Builds the compressed interval sequence from an unordered list of
    /// shifts. Zero- or negative-duration shifts are skipped with a warning.
    /// Returns [`PlannerError::EmptyCalendar`] if nothing compresses.
    pub fn build(shifts: &[Shift]) -> Result<Self, PlannerError> {
        let mut sorted: Vec<Shift> = shifts.to_vec();
        sorted.sort_by(|a, b| (a.day, a.start_time).cmp(&(b.day, b.start_time)));

        let mut intervals = Vec::with_capacity(sorted.len());
        let mut accumulated: i64 = 0;

        for shift in &sorted {
            let real_start = NaiveDateTime::new(shift.day, shift.start_time);
            let mut real_end = NaiveDateTime::new(shift.day, shift.end_time);
            if shift.end_time <= shift.start_time {
                real_end += Duration::days(1);
            }

            let duration_min = (real_end - real_start).num_minutes();
            if duration_min <= 0 {
                tracing::warn!(?shift.day, "skipping zero/negative duration shift");
                continue;
            }

            let comp_start = accumulated;
            let comp_end = accumulated + duration_min;
            intervals.push(CompressedInterval {
                real_start,
                real_end,
                comp_start,
                comp_end,
                capacity: shift.operator_capacity,
            });
            accumulated = comp_end;
        }

        if accumulated == 0 {
            return Err(PlannerError::EmptyCalendar);
        }

        Ok(Self { intervals })
    }

    pub fn intervals(&self) -> &[CompressedInterval] {
        &self.intervals
    }

    pub fn total_compressed_minutes(&self) -> i64 {
        self.intervals.last().map(|i| i.comp_end).unwrap_or(0)
    }

    /// Maps a wall-clock instant to an integer compressed minute. Total:
    /// before the first interval returns 0, inside a gap snaps forward to
    /// the next working minute, past the end returns the calendar total.
    pub fn compress(&self, real_dt: NaiveDateTime) -> i64 {
        let Some(first) = self.intervals.first() else { return 0 };
        if real_dt < first.real_start {
            return 0;
        }

        for (idx, interval) in self.intervals.iter().enumerate() {
            if real_dt >= interval.real_start && real_dt < interval.real_end {
                let delta = (real_dt - interval.real_start).num_minutes();
                return interval.comp_start + delta;
            }
            if let Some(next) = self.intervals.get(idx + 1) {
                if real_dt >= interval.real_end && real_dt < next.real_start {
                    return next.comp_start;
                }
            }
        }

        self.intervals.last().unwrap().comp_end
    }

    /// Inverse of [`Self::compress`]. `Start` mode uses `[comp_start,
    /// comp_end)`; `End` mode uses `(comp_start, comp_end]`.
    pub fn decompress(&self, comp_min: i64, mode: DecompressMode) -> Result<NaiveDateTime, PlannerError> {
        for interval in &self.intervals {
            let in_range = match mode {
                DecompressMode::Start => comp_min >= interval.comp_start && comp_min < interval.comp_end,
                DecompressMode::End => comp_min > interval.comp_start && comp_min <= interval.comp_end,
            };
            if in_range {
                let delta = comp_min - interval.comp_start;
                return Ok(interval.real_start + Duration::minutes(delta));
            }
        }

        Err(PlannerError::OutOfCalendarRange {
            requested: comp_min,
            valid_range: (0, self.total_compressed_minutes()),
        })
    }

    /// Total intersection (in seconds) of `[a, b]` with every shift,
    /// divided by the average working seconds per calendar day. A
    /// closed-form sweep over the interval array, not a day-by-day loop.
    pub fn working_days(&self, a: NaiveDateTime, b: NaiveDateTime) -> f64 {
        if a > b {
            return 0.0;
        }

        let mut total_seconds = 0i64;
        for interval in &self.intervals {
            let lo = a.max(interval.real_start);
            let hi = b.min(interval.real_end);
            if hi > lo {
                total_seconds += (hi - lo).num_seconds();
            }
        }

        let seconds_per_day = self.average_seconds_per_day();
        if seconds_per_day <= 0.0 {
            return 0.0;
        }

        total_seconds as f64 / seconds_per_day
    }

    /// Average working hours per calendar day across the whole calendar,
    /// used both by [`Self::working_days`] and reported as a global metric.
    pub fn average_hours_per_day(&self) -> f64 {
        self.average_seconds_per_day() / 3600.0
    }

    fn average_seconds_per_day(&self) -> f64 {
        use std::collections::BTreeMap;

        let mut per_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for interval in &self.intervals {
            let seconds = (interval.real_end - interval.real_start).num_seconds();
            *per_day.entry(interval.real_start.date()).or_insert(0) += seconds;
        }

        if per_day.is_empty() {
            return 0.0;
        }

        let total: i64 = per_day.values().sum();
        total as f64 / per_day.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift(day: NaiveDate, start: (u32, u32), end: (u32, u32), capacity: u32) -> Shift {
        Shift {
            day,
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            operator_capacity: capacity,
        }
    }

    #[test]
    fn compresses_single_shift() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let cal = Calendar::build(&[shift(day, (8, 0), (16, 0), 2)]).unwrap();

        assert_eq!(cal.total_compressed_minutes(), 480);
        let dt = NaiveDateTime::new(day, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(cal.compress(dt), 60);
    }

    #[test]
    fn snaps_forward_across_a_gap() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let cal = Calendar::build(&[
            shift(day, (8, 0), (12, 0), 1),
            shift(day, (13, 0), (17, 0), 1),
        ])
        .unwrap();

        let in_gap = NaiveDateTime::new(day, NaiveTime::from_hms_opt(12, 30, 0).unwrap());
        assert_eq!(cal.compress(in_gap), 240);
    }

    #[test]
    fn round_trips_every_offset_inside_an_interval() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let cal = Calendar::build(&[shift(day, (8, 0), (16, 0), 2)]).unwrap();

        for delta in 0..480 {
            let dt = cal.intervals()[0].real_start + Duration::minutes(delta);
            assert_eq!(cal.compress(dt), delta);
            assert_eq!(cal.decompress(delta, DecompressMode::Start).unwrap(), dt);
        }
    }

    #[test]
    fn overnight_shift_lands_on_the_next_day() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let cal = Calendar::build(&[shift(day, (22, 0), (6, 0), 1)]).unwrap();

        assert_eq!(cal.total_compressed_minutes(), 480);
        assert_eq!(cal.intervals()[0].real_end.date(), day.succ_opt().unwrap());
    }

    #[test]
    fn empty_calendar_is_rejected() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let err = Calendar::build(&[shift(day, (8, 0), (8, 0), 1)]).unwrap_err();
        assert!(matches!(err, PlannerError::EmptyCalendar));
    }

    #[test]
    fn out_of_range_decompress_fails() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let cal = Calendar::build(&[shift(day, (8, 0), (16, 0), 1)]).unwrap();
        assert!(matches!(
            cal.decompress(10_000, DecompressMode::Start),
            Err(PlannerError::OutOfCalendarRange { .. })
        ));
    }
}
