//! Calendar alignment of report periods.
//!
//! A requested period is trimmed, intersected with the series' real data
//! range and then widened to whole buckets of the requested unit, all in one
//! fixed utc-offset. The result is always fully bounded with `start < end`,
//! where `end` is the last millisecond of the final bucket.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use tracing::debug;

use crate::models::{Bucket, BucketUnit, Interval, Timestamp, WaterYearStart};

#[derive(Debug, Clone, Copy)]
pub struct IntervalAligner {
    utc_offset: FixedOffset,
    water_year_start: WaterYearStart,
}

impl IntervalAligner {
    pub fn new(utc_offset: FixedOffset, water_year_start: WaterYearStart) -> Self {
        Self {
            utc_offset,
            water_year_start,
        }
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }

    /// Align `selected` against `data_range`, using the wall clock when both
    /// are fully open.
    pub fn align(&self, selected: &Interval, data_range: &Interval, unit: BucketUnit) -> Interval {
        let now = Utc::now().with_timezone(&self.utc_offset);
        self.align_at(selected, data_range, unit, now)
    }

    /// Same as [`IntervalAligner::align`] with an explicit "now".
    pub fn align_at(
        &self,
        selected: &Interval,
        data_range: &Interval,
        unit: BucketUnit,
        now: Timestamp,
    ) -> Interval {
        let offset = &self.utc_offset;
        let trimmed = trim(&selected.with_offset(offset));
        let data_range = data_range.with_offset(offset);

        let (start, end) = intersect(&trimmed, &data_range, now.with_timezone(offset));
        let (start, end) = self.expand(start, end, unit);

        debug!(
            "Aligned {} within data range {} by {:?} to [{}, {}]",
            selected, data_range, unit, start, end
        );
        Interval::bounded(start, end)
    }

    /// Water year a timestamp belongs to, labelled by the calendar year it
    /// starts in.
    pub fn water_year_of(&self, timestamp: &Timestamp) -> i32 {
        let local = timestamp.with_timezone(&self.utc_offset);
        if local.month() >= self.water_year_start.month() {
            local.year()
        } else {
            local.year() - 1
        }
    }

    /// Split an aligned interval into consecutive half-open buckets.
    ///
    /// The last bucket ends one millisecond after `aligned.end`. Open
    /// intervals produce no buckets.
    pub fn buckets(&self, aligned: &Interval, unit: BucketUnit) -> Vec<Bucket> {
        let (Some(start), Some(end)) = (aligned.start, aligned.end) else {
            return Vec::new();
        };
        let stop = end.with_timezone(&self.utc_offset) + Duration::milliseconds(1);

        let mut buckets = Vec::new();
        let mut cursor = start.with_timezone(&self.utc_offset);
        while cursor < stop {
            let next = match unit {
                BucketUnit::Year | BucketUnit::WaterYear => add_months(&cursor, 12),
                BucketUnit::Month => add_months(&cursor, 1),
                BucketUnit::Week => floor_day(&cursor) + Duration::days(7),
                BucketUnit::Day | BucketUnit::None => floor_day(&cursor) + Duration::days(1),
            };
            if next <= cursor {
                break;
            }
            buckets.push(Bucket {
                start: cursor,
                end: next.min(stop),
            });
            cursor = next;
        }
        buckets
    }

    fn expand(&self, start: Timestamp, end: Timestamp, unit: BucketUnit) -> (Timestamp, Timestamp) {
        let offset = &self.utc_offset;
        let last_ms = Duration::milliseconds(1);

        match unit {
            BucketUnit::Year => (
                month_start(offset, start.year(), 1),
                month_start(offset, end.year() + 1, 1) - last_ms,
            ),
            BucketUnit::WaterYear => {
                let first_month = self.water_year_start.month();
                (
                    month_start(offset, self.water_year_of(&start), first_month),
                    month_start(offset, self.water_year_of(&end) + 1, first_month) - last_ms,
                )
            }
            BucketUnit::Month => (
                month_start(offset, start.year(), start.month()),
                add_months(&end, 1) - last_ms,
            ),
            BucketUnit::Week => {
                let first = floor_day(&start);
                let days = (end.date_naive() - start.date_naive()).num_days() + 1;
                let weeks = ((days + 6) / 7).max(1);
                (first, first + Duration::days(weeks * 7) - last_ms)
            }
            BucketUnit::Day | BucketUnit::None => (
                floor_day(&start),
                floor_day(&end) + Duration::days(1) - last_ms,
            ),
        }
    }
}

/// Pull an exact-midnight end back into the previous day and floor the start.
fn trim(selected: &Interval) -> Interval {
    let end = selected.end.map(|end| {
        if end.time() == NaiveTime::MIN {
            end - Duration::milliseconds(1)
        } else {
            end
        }
    });
    Interval::new(selected.start.map(|s| floor_day(&s)), end)
}

fn intersect(selected: &Interval, data_range: &Interval, now: Timestamp) -> (Timestamp, Timestamp) {
    if data_range.is_open() {
        return match (selected.start, selected.end) {
            (Some(start), Some(end)) => (start, end.max(start)),
            (Some(start), None) => (start, start),
            (None, Some(end)) => (end, end),
            (None, None) => (now, now),
        };
    }

    // A selection entirely outside the record collapses onto the nearest bound
    if let (Some(start), Some(data_end)) = (selected.start, data_range.end) {
        if start > data_end {
            return (data_end, data_end);
        }
    }
    if let (Some(end), Some(data_start)) = (selected.end, data_range.start) {
        if end < data_start {
            return (data_start, data_start);
        }
    }

    let start = tighter(selected.start, data_range.start, std::cmp::max);
    let end = tighter(selected.end, data_range.end, std::cmp::min);
    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        (Some(start), None) => (start, start),
        (None, Some(end)) => (end, end),
        (None, None) => (now, now),
    };
    (start, end.max(start))
}

fn tighter(
    a: Option<Timestamp>,
    b: Option<Timestamp>,
    pick: fn(Timestamp, Timestamp) -> Timestamp,
) -> Option<Timestamp> {
    match (a, b) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, b) => a.or(b),
    }
}

pub(crate) fn midnight(offset: &FixedOffset, date: NaiveDate) -> Timestamp {
    let local = date.and_time(NaiveTime::MIN);
    let utc = local
        .checked_sub_signed(Duration::seconds(i64::from(offset.local_minus_utc())))
        .unwrap_or(local);
    DateTime::from_naive_utc_and_offset(utc, *offset)
}

pub(crate) fn floor_day(timestamp: &Timestamp) -> Timestamp {
    midnight(timestamp.offset(), timestamp.date_naive())
}

pub(crate) fn month_start(offset: &FixedOffset, year: i32, month: u32) -> Timestamp {
    // Years past chrono's calendar saturate at its first or last date
    let date = NaiveDate::from_ymd_opt(year, month.clamp(1, 12), 1).unwrap_or(if year < 0 {
        NaiveDate::MIN
    } else {
        NaiveDate::MAX
    });
    midnight(offset, date)
}

/// First instant of the month `months` after the one containing `timestamp`.
fn add_months(timestamp: &Timestamp, months: i32) -> Timestamp {
    let index = timestamp.year() * 12 + timestamp.month0() as i32 + months;
    month_start(
        timestamp.offset(),
        index.div_euclid(12),
        index.rem_euclid(12) as u32 + 1,
    )
}
