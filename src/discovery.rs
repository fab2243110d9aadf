//! Finding the true extent of a series without reading it.
//!
//! Long records can hold millions of points, so the first and last point are
//! located by narrowing: annual counts pick the years, daily counts inside
//! those years pick the days, and only those two days of raw points are
//! fetched. The number of queries is fixed regardless of record length.

use chrono::{Datelike, Duration, FixedOffset};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

use crate::alignment::{floor_day, month_start};
use crate::models::{Interval, PeriodCount, SeriesId, Timestamp};
use crate::source::{SourceError, TimeSeriesSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    First,
    Last,
}

pub struct RangeDiscoverer<'a, S: ?Sized> {
    source: &'a S,
}

impl<'a, S: TimeSeriesSource + ?Sized> RangeDiscoverer<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Discover `[first point, last point]` of a series.
    ///
    /// Returns a fully open interval when the series has no points, and an
    /// open end when the last point could not be pinned down.
    #[instrument(skip(self))]
    pub fn discover(&self, series_id: &str) -> Result<Interval, SourceError> {
        let info = self.source.series_info(series_id)?;
        let annual = self.source.annual_counts(series_id)?;

        let (Some(first_year), Some(last_year)) =
            (earliest_nonzero(&annual), latest_nonzero(&annual))
        else {
            debug!("Series {} has no points", series_id);
            return Ok(Interval::open());
        };

        let adjustment = info.interpolation_type.bin_adjustment();
        let offset = info.utc_offset;

        let Some(lower) = self.locate(series_id, first_year, Edge::First, adjustment, &offset)?
        else {
            debug!("No first point found for {} in {}", series_id, first_year.start);
            return Ok(Interval::open());
        };
        let upper = self.locate(series_id, last_year, Edge::Last, adjustment, &offset)?;

        let range = Interval::new(Some(lower), upper);
        info!("Discovered range {} for series {}", range, series_id);
        Ok(range)
    }

    fn locate(
        &self,
        series_id: &str,
        year: &PeriodCount,
        edge: Edge,
        adjustment: i32,
        offset: &FixedOffset,
    ) -> Result<Option<Timestamp>, SourceError> {
        let year_label = year.start.with_timezone(offset).year();
        let year_window = Interval::bounded(
            month_start(offset, year_label + adjustment, 1),
            month_start(offset, year_label + 1, 1),
        );

        let days = self.source.daily_counts(series_id, &year_window)?;
        let day = match edge {
            Edge::First => earliest_nonzero(&days),
            Edge::Last => latest_nonzero(&days),
        };
        let Some(day) = day else {
            debug!("No daily counts for {} within {}", series_id, year_window);
            return Ok(None);
        };

        let day_start = floor_day(&day.start.with_timezone(offset));
        let day_window = Interval::bounded(
            day_start + Duration::days(i64::from(adjustment)),
            day_start + Duration::days(1),
        );
        let points = self.source.raw_points(series_id, &day_window)?;
        let point = match edge {
            Edge::First => points.first(),
            Edge::Last => points.last(),
        };

        debug!(
            "Located {:?} point of {} in {}: {:?}",
            edge,
            series_id,
            day_window,
            point.map(|p| p.timestamp)
        );
        Ok(point.map(|p| p.timestamp))
    }
}

fn earliest_nonzero(counts: &[PeriodCount]) -> Option<&PeriodCount> {
    counts.iter().filter(|c| c.count > 0).min_by_key(|c| c.start)
}

fn latest_nonzero(counts: &[PeriodCount]) -> Option<&PeriodCount> {
    counts.iter().filter(|c| c.count > 0).max_by_key(|c| c.start)
}

/// Discovered ranges, memoized per series for a single report run.
///
/// Failures are not cached; the next request for that series searches again.
#[derive(Debug, Default)]
pub struct RangeCache {
    ranges: HashMap<SeriesId, Interval>,
}

impl RangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, series_id: &str) -> Option<Interval> {
        self.ranges.get(series_id).copied()
    }

    pub fn get_or_discover<S: TimeSeriesSource + ?Sized>(
        &mut self,
        series_id: &str,
        discoverer: &RangeDiscoverer<'_, S>,
    ) -> Result<Interval, SourceError> {
        if let Some(range) = self.get(series_id) {
            debug!("Range cache hit for {}", series_id);
            return Ok(range);
        }

        let range = discoverer.discover(series_id)?;
        self.ranges.insert(series_id.to_string(), range);
        Ok(range)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GradeRange, InterpolationType, Sample, SeriesInfo};
    use crate::store::{MemorySeriesStore, SeriesRecord};
    use chrono::DateTime;
    use std::cell::RefCell;

    fn ts(s: &str) -> Timestamp {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn record(id: &str, interpolation_type: InterpolationType, stamps: &[&str]) -> SeriesRecord {
        SeriesRecord {
            id: id.to_string(),
            label: "Stage".to_string(),
            parameter: "Stage".to_string(),
            unit: "ft".to_string(),
            utc_offset: FixedOffset::west_opt(7 * 3600).unwrap(),
            interpolation_type,
            points: stamps.iter().map(|s| Sample::new(ts(s), Some(1.0))).collect(),
            grades: Vec::new(),
        }
    }

    /// Records every query so tests can check how much was read.
    struct RecordingSource {
        inner: MemorySeriesStore,
        calls: RefCell<Vec<String>>,
    }

    impl RecordingSource {
        fn new(records: Vec<SeriesRecord>) -> Self {
            Self {
                inner: MemorySeriesStore::from_records(records).unwrap(),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self, prefix: &str) -> usize {
            self.calls
                .borrow()
                .iter()
                .filter(|c| c.starts_with(prefix))
                .count()
        }
    }

    impl TimeSeriesSource for RecordingSource {
        fn list_series(&self) -> Result<Vec<SeriesInfo>, SourceError> {
            self.inner.list_series()
        }

        fn series_info(&self, series_id: &str) -> Result<SeriesInfo, SourceError> {
            self.inner.series_info(series_id)
        }

        fn annual_counts(&self, series_id: &str) -> Result<Vec<PeriodCount>, SourceError> {
            self.calls.borrow_mut().push("annual".to_string());
            self.inner.annual_counts(series_id)
        }

        fn daily_counts(
            &self,
            series_id: &str,
            range: &Interval,
        ) -> Result<Vec<PeriodCount>, SourceError> {
            self.calls.borrow_mut().push(format!("daily {range}"));
            self.inner.daily_counts(series_id, range)
        }

        fn raw_points(&self, series_id: &str, range: &Interval) -> Result<Vec<Sample>, SourceError> {
            self.calls.borrow_mut().push(format!("raw {range}"));
            self.inner.raw_points(series_id, range)
        }

        fn grade_ranges(
            &self,
            series_id: &str,
            range: &Interval,
        ) -> Result<Vec<GradeRange>, SourceError> {
            self.inner.grade_ranges(series_id, range)
        }
    }

    /// Annual counts claim points in 2010 and 2020, but daily counts come
    /// back empty for `silent_year`.
    struct InconsistentSource {
        silent_year: i32,
    }

    impl TimeSeriesSource for InconsistentSource {
        fn list_series(&self) -> Result<Vec<SeriesInfo>, SourceError> {
            Ok(Vec::new())
        }

        fn series_info(&self, series_id: &str) -> Result<SeriesInfo, SourceError> {
            Ok(SeriesInfo {
                id: series_id.to_string(),
                label: "Stage".to_string(),
                parameter: "Stage".to_string(),
                unit: "ft".to_string(),
                utc_offset: FixedOffset::west_opt(7 * 3600).unwrap(),
                interpolation_type: InterpolationType::InstantaneousValues,
            })
        }

        fn annual_counts(&self, _series_id: &str) -> Result<Vec<PeriodCount>, SourceError> {
            Ok(vec![
                PeriodCount {
                    start: ts("2010-01-01T00:00:00-07:00"),
                    count: 5,
                },
                PeriodCount {
                    start: ts("2020-01-01T00:00:00-07:00"),
                    count: 5,
                },
            ])
        }

        fn daily_counts(
            &self,
            _series_id: &str,
            range: &Interval,
        ) -> Result<Vec<PeriodCount>, SourceError> {
            let year = range.start.unwrap().year();
            if year == self.silent_year {
                return Ok(Vec::new());
            }
            Ok(vec![PeriodCount {
                start: ts(&format!("{year}-06-01T00:00:00-07:00")),
                count: 5,
            }])
        }

        fn raw_points(&self, _series_id: &str, range: &Interval) -> Result<Vec<Sample>, SourceError> {
            let day = range.start.unwrap();
            Ok(vec![Sample::new(day + Duration::hours(1), Some(1.0))])
        }

        fn grade_ranges(
            &self,
            _series_id: &str,
            _range: &Interval,
        ) -> Result<Vec<GradeRange>, SourceError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_last_year_without_days_leaves_end_unknown() {
        let source = InconsistentSource { silent_year: 2020 };

        let range = RangeDiscoverer::new(&source).discover("s").unwrap();

        assert_eq!(
            range,
            Interval::new(Some(ts("2010-06-01T01:00:00-07:00")), None)
        );
    }

    #[test]
    fn test_first_year_without_days_is_open() {
        let source = InconsistentSource { silent_year: 2010 };

        let range = RangeDiscoverer::new(&source).discover("s").unwrap();

        assert_eq!(range, Interval::open());
    }

    #[test]
    fn test_discover_first_and_last_point() {
        let source = RecordingSource::new(vec![record(
            "s1",
            InterpolationType::InstantaneousValues,
            &[
                "1998-03-14T09:15:00-07:00",
                "1998-03-14T10:15:00-07:00",
                "2005-07-01T00:00:00-07:00",
                "2021-11-30T16:45:00-07:00",
                "2021-11-30T17:00:00-07:00",
            ],
        )]);

        let range = RangeDiscoverer::new(&source).discover("s1").unwrap();

        assert_eq!(range.start, Some(ts("1998-03-14T09:15:00-07:00")));
        assert_eq!(range.end, Some(ts("2021-11-30T17:00:00-07:00")));
    }

    #[test]
    fn test_discover_uses_fixed_number_of_queries() {
        let source = RecordingSource::new(vec![record(
            "s1",
            InterpolationType::InstantaneousValues,
            &[
                "1998-03-14T09:15:00-07:00",
                "2010-01-01T00:00:00-07:00",
                "2021-11-30T17:00:00-07:00",
            ],
        )]);

        RangeDiscoverer::new(&source).discover("s1").unwrap();

        assert_eq!(source.calls("annual"), 1);
        assert_eq!(source.calls("daily"), 2);
        assert_eq!(source.calls("raw"), 2);
    }

    #[test]
    fn test_discover_empty_series_is_open() {
        let source = RecordingSource::new(vec![record(
            "empty",
            InterpolationType::InstantaneousValues,
            &[],
        )]);

        let range = RangeDiscoverer::new(&source).discover("empty").unwrap();

        assert!(range.is_open());
        assert_eq!(source.calls("daily"), 0);
    }

    #[test]
    fn test_discover_single_point() {
        let source = RecordingSource::new(vec![record(
            "one",
            InterpolationType::InstantaneousValues,
            &["2015-06-01T12:00:00-07:00"],
        )]);

        let range = RangeDiscoverer::new(&source).discover("one").unwrap();

        assert_eq!(range.start, Some(ts("2015-06-01T12:00:00-07:00")));
        assert_eq!(range.end, Some(ts("2015-06-01T12:00:00-07:00")));
    }

    #[test]
    fn test_preceding_series_widens_search_windows() {
        let source = RecordingSource::new(vec![record(
            "totals",
            InterpolationType::PrecedingTotals,
            &["2012-01-01T00:00:00-07:00", "2013-12-31T23:00:00-07:00"],
        )]);

        let range = RangeDiscoverer::new(&source).discover("totals").unwrap();

        assert_eq!(range.start, Some(ts("2012-01-01T00:00:00-07:00")));
        assert_eq!(range.end, Some(ts("2013-12-31T23:00:00-07:00")));
        let calls = source.calls.borrow();
        assert!(calls
            .iter()
            .any(|c| c.starts_with("daily [2011-01-01T00:00:00-07:00")));
        assert!(calls
            .iter()
            .any(|c| c.starts_with("raw [2011-12-31T00:00:00-07:00")));
    }

    #[test]
    fn test_discover_unknown_series_is_error() {
        let source = RecordingSource::new(Vec::new());
        let result = RangeDiscoverer::new(&source).discover("missing");
        assert!(matches!(result, Err(SourceError::NotFound(id)) if id == "missing"));
    }

    #[test]
    fn test_range_cache_memoizes_per_series() {
        let source = RecordingSource::new(vec![
            record("a", InterpolationType::InstantaneousValues, &["2020-01-01T00:00:00-07:00"]),
            record("b", InterpolationType::InstantaneousValues, &["2021-01-01T00:00:00-07:00"]),
        ]);
        let discoverer = RangeDiscoverer::new(&source);
        let mut cache = RangeCache::new();

        let first = cache.get_or_discover("a", &discoverer).unwrap();
        let again = cache.get_or_discover("a", &discoverer).unwrap();
        cache.get_or_discover("b", &discoverer).unwrap();

        assert_eq!(first, again);
        assert_eq!(source.calls("annual"), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_range_cache_does_not_store_errors() {
        let source = RecordingSource::new(Vec::new());
        let discoverer = RangeDiscoverer::new(&source);
        let mut cache = RangeCache::new();

        assert!(cache.get_or_discover("missing", &discoverer).is_err());
        assert!(cache.is_empty());
    }
}
