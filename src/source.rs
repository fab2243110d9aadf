use crate::models::{GradeRange, Interval, PeriodCount, Sample, SeriesId, SeriesInfo};

/// Errors raised by a time-series store.
///
/// An empty result is never an error; these variants separate a series the
/// store does not know from a store that failed to answer.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Series not found: {0}")]
    NotFound(SeriesId),
    #[error("Time-series query failed: {0}")]
    Query(String),
}

/// Query shapes the report engine needs from a time-series store.
///
/// Ranges are half-open (`start <= t < end`) and an open side is unbounded.
/// Counts are keyed by the start of their period in the series' utc-offset.
pub trait TimeSeriesSource {
    fn list_series(&self) -> Result<Vec<SeriesInfo>, SourceError>;

    fn series_info(&self, series_id: &str) -> Result<SeriesInfo, SourceError>;

    /// Point counts per calendar year over the whole record.
    fn annual_counts(&self, series_id: &str) -> Result<Vec<PeriodCount>, SourceError>;

    /// Point counts per calendar day within `range`.
    fn daily_counts(&self, series_id: &str, range: &Interval)
        -> Result<Vec<PeriodCount>, SourceError>;

    /// Raw points within `range`, ascending.
    fn raw_points(&self, series_id: &str, range: &Interval) -> Result<Vec<Sample>, SourceError>;

    /// Grade ranges overlapping `range`, ascending and non-overlapping.
    fn grade_ranges(&self, series_id: &str, range: &Interval)
        -> Result<Vec<GradeRange>, SourceError>;
}
