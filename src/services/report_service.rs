use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::alignment::IntervalAligner;
use crate::config::Config;
use crate::discovery::{RangeCache, RangeDiscoverer};
use crate::extrema::find_extrema;
use crate::format::{format_fixed, format_significant_figures, format_sum};
use crate::grades::assign_grades;
use crate::models::{
    Bucket, BucketUnit, ExtremaMode, Interval, Sample, SeriesId, SeriesInfo, Timestamp,
    WaterYearStart,
};
use crate::source::{SourceError, TimeSeriesSource};

// Query parameters shared by every report (used by API and CLI)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub group_by: Option<String>,
    pub mode: Option<ExtremaMode>,
}

impl ReportQuery {
    pub fn selected(&self) -> Interval {
        Interval::new(self.from, self.to)
    }

    pub fn unit(&self) -> BucketUnit {
        self.group_by
            .as_deref()
            .map(BucketUnit::from_group_by)
            .unwrap_or_default()
    }

    pub fn mode(&self) -> ExtremaMode {
        self.mode.unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub water_year_start: WaterYearStart,
    pub extrema_padding_hours: i64,
    pub display_decimals: usize,
    /// When set, values are shown to this many significant figures instead
    /// of `display_decimals` places.
    pub significant_figures: Option<u32>,
    pub missing_text: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            water_year_start: WaterYearStart::default(),
            extrema_padding_hours: 12,
            display_decimals: 2,
            significant_figures: None,
            missing_text: "***".to_string(),
        }
    }
}

impl From<&Config> for ReportSettings {
    fn from(config: &Config) -> Self {
        Self {
            water_year_start: config.water_year_start,
            extrema_padding_hours: config.extrema_padding_hours,
            display_decimals: config.display_decimals,
            significant_figures: config.significant_figures,
            missing_text: config.missing_text.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportPeriod {
    pub series_id: SeriesId,
    pub unit: BucketUnit,
    pub data_range: Interval,
    pub period: Interval,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketRow {
    pub start: Timestamp,
    pub end: Timestamp,
    pub point_count: usize,
    pub gap_count: usize,
    pub min: String,
    pub max: String,
    pub mean: String,
    pub total: String,
    pub grade_codes: Vec<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketTable {
    pub series: SeriesInfo,
    pub period: Interval,
    pub unit: BucketUnit,
    pub rows: Vec<BucketRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtremaRow {
    pub bucket_start: Timestamp,
    pub bucket_end: Timestamp,
    pub timestamp: Option<Timestamp>,
    pub value: String,
    pub grade_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtremaReport {
    pub series: SeriesInfo,
    pub period: Interval,
    pub unit: BucketUnit,
    pub mode: ExtremaMode,
    pub rows: Vec<ExtremaRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PointRow {
    pub timestamp: Timestamp,
    pub value: String,
    pub grade_code: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PointsReport {
    pub series: SeriesInfo,
    pub period: Interval,
    pub rows: Vec<PointRow>,
}

/// Entry point for producing reports against a shared store.
pub struct ReportService<S> {
    source: Arc<S>,
    settings: ReportSettings,
}

// Manual impl: `S` itself need not be Clone behind the Arc
impl<S> Clone for ReportService<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            settings: self.settings.clone(),
        }
    }
}

impl<S: TimeSeriesSource> ReportService<S> {
    pub fn new(source: Arc<S>, settings: ReportSettings) -> Self {
        Self { source, settings }
    }

    pub fn list_series(&self) -> Result<Vec<SeriesInfo>, SourceError> {
        self.source.list_series()
    }

    /// Begin a report run with its own, empty range cache.
    pub fn start_run(&self) -> ReportRun<'_, S> {
        ReportRun {
            source: self.source.as_ref(),
            settings: &self.settings,
            cache: RangeCache::new(),
        }
    }
}

/// One report run. Discovered series ranges are reused for the lifetime of
/// the run and dropped with it.
pub struct ReportRun<'a, S> {
    source: &'a S,
    settings: &'a ReportSettings,
    cache: RangeCache,
}

impl<'a, S: TimeSeriesSource> ReportRun<'a, S> {
    /// Real first/last point of a series.
    pub fn series_range(&mut self, series_id: &str) -> Result<Interval, SourceError> {
        let discoverer = RangeDiscoverer::new(self.source);
        self.cache.get_or_discover(series_id, &discoverer)
    }

    #[instrument(skip(self))]
    pub fn report_period(
        &mut self,
        series_id: &str,
        selected: &Interval,
        unit: BucketUnit,
    ) -> Result<ReportPeriod, SourceError> {
        let (_, aligner, data_range, period) = self.resolve(series_id, selected, unit)?;
        debug!("Report period for {} uses offset {}", series_id, aligner.utc_offset());

        Ok(ReportPeriod {
            series_id: series_id.to_string(),
            unit,
            data_range,
            period,
        })
    }

    /// Summary statistics per bucket of the aligned period.
    #[instrument(skip(self))]
    pub fn bucket_table(
        &mut self,
        series_id: &str,
        selected: &Interval,
        unit: BucketUnit,
    ) -> Result<BucketTable, SourceError> {
        let (series, aligner, _, period) = self.resolve(series_id, selected, unit)?;
        let buckets = aligner.buckets(&period, unit);
        let window = covering(&period, &buckets);

        let points = self.source.raw_points(series_id, &window)?;
        let grade_ranges = self.source.grade_ranges(series_id, &window)?;
        let grades = assign_grades(&points, &grade_ranges);

        let rows = buckets
            .iter()
            .map(|bucket| {
                let (from, to) = bucket_slice(&points, bucket);
                self.bucket_row(bucket, &points[from..to], &grades[from..to])
            })
            .collect::<Vec<_>>();

        info!(
            "Built {} bucket rows from {} points for series {}",
            rows.len(),
            points.len(),
            series_id
        );

        Ok(BucketTable {
            series,
            period,
            unit,
            rows,
        })
    }

    /// Instantaneous min or max per bucket, with edges interpolated from
    /// points just outside the period.
    #[instrument(skip(self))]
    pub fn extrema(
        &mut self,
        series_id: &str,
        selected: &Interval,
        unit: BucketUnit,
        mode: ExtremaMode,
    ) -> Result<ExtremaReport, SourceError> {
        let (series, aligner, _, period) = self.resolve(series_id, selected, unit)?;
        let buckets = aligner.buckets(&period, unit);
        let Some(range_start) = period.start else {
            return Ok(ExtremaReport {
                series,
                period,
                unit,
                mode,
                rows: Vec::new(),
            });
        };

        let window = covering(&period, &buckets);
        let padded = pad(&window, self.settings.extrema_padding_hours);

        let samples = self.source.raw_points(series_id, &padded)?;
        let grade_ranges = self.source.grade_ranges(series_id, &padded)?;
        let bucket_ends: Vec<Timestamp> = buckets.iter().map(|b| b.end).collect();
        let found = find_extrema(&samples, &bucket_ends, mode, range_start);

        let rows = buckets
            .iter()
            .zip(found)
            .map(|(bucket, extremum)| {
                let grade_code = extremum.map(|e| {
                    let at = [Sample::new(e.timestamp, Some(e.value))];
                    assign_grades(&at, &grade_ranges)[0]
                });
                ExtremaRow {
                    bucket_start: bucket.start,
                    bucket_end: bucket.end,
                    timestamp: extremum.map(|e| e.timestamp),
                    value: self.value_text(extremum.map(|e| e.value)),
                    grade_code,
                }
            })
            .collect::<Vec<_>>();

        info!(
            "Found {:?} extrema for {} buckets of series {} from {} samples",
            mode,
            rows.len(),
            series_id,
            samples.len()
        );

        Ok(ExtremaReport {
            series,
            period,
            unit,
            mode,
            rows,
        })
    }

    /// Every point in the aligned period with its grade.
    #[instrument(skip(self))]
    pub fn graded_points(
        &mut self,
        series_id: &str,
        selected: &Interval,
        unit: BucketUnit,
    ) -> Result<PointsReport, SourceError> {
        let (series, aligner, _, period) = self.resolve(series_id, selected, unit)?;
        let window = covering(&period, &aligner.buckets(&period, unit));

        let points = self.source.raw_points(series_id, &window)?;
        let grade_ranges = self.source.grade_ranges(series_id, &window)?;
        let grades = assign_grades(&points, &grade_ranges);

        let rows = points
            .iter()
            .zip(grades)
            .map(|(point, grade_code)| PointRow {
                timestamp: point.timestamp,
                value: self.value_text(point.value),
                grade_code,
            })
            .collect::<Vec<_>>();

        info!("Graded {} points for series {}", rows.len(), series_id);

        Ok(PointsReport {
            series,
            period,
            rows,
        })
    }

    fn resolve(
        &mut self,
        series_id: &str,
        selected: &Interval,
        unit: BucketUnit,
    ) -> Result<(SeriesInfo, IntervalAligner, Interval, Interval), SourceError> {
        let series = self.source.series_info(series_id)?;
        let data_range = self.series_range(series_id)?;
        let aligner = IntervalAligner::new(series.utc_offset, self.settings.water_year_start);
        let period = aligner.align(selected, &data_range, unit);
        Ok((series, aligner, data_range, period))
    }

    fn bucket_row(&self, bucket: &Bucket, points: &[Sample], grades: &[i32]) -> BucketRow {
        let values: Vec<f64> = points.iter().filter_map(|p| p.value).collect();
        let total = (!values.is_empty()).then(|| values.iter().sum::<f64>());
        let mean = total.map(|t| t / values.len() as f64);
        let min = values.iter().copied().reduce(f64::min);
        let max = values.iter().copied().reduce(f64::max);
        let grade_codes: BTreeSet<i32> = grades.iter().copied().collect();

        BucketRow {
            start: bucket.start,
            end: bucket.end,
            point_count: values.len(),
            gap_count: points.len() - values.len(),
            min: self.value_text(min),
            max: self.value_text(max),
            mean: self.value_text(mean),
            total: format_sum(total, &self.settings.missing_text),
            grade_codes: grade_codes.into_iter().collect(),
        }
    }

    fn value_text(&self, value: Option<f64>) -> String {
        match (value, self.settings.significant_figures) {
            (Some(v), Some(sig_figs)) if !v.is_nan() => format_significant_figures(v, sig_figs),
            _ => format_fixed(
                value,
                self.settings.display_decimals,
                &self.settings.missing_text,
            ),
        }
    }
}

/// Half-open window spanning every bucket, or the period itself when there
/// are none.
fn covering(period: &Interval, buckets: &[Bucket]) -> Interval {
    match (buckets.first(), buckets.last()) {
        (Some(first), Some(last)) => Interval::bounded(first.start, last.end),
        _ => *period,
    }
}

/// Widen both sides of `window` by `hours`. A side that would leave chrono's
/// range keeps its unpadded bound.
fn pad(window: &Interval, hours: i64) -> Interval {
    let Some(padding) = Duration::try_hours(hours.max(0)) else {
        warn!("Extrema padding of {} hours is out of range, not padding", hours);
        return *window;
    };
    Interval::new(
        window
            .start
            .map(|t| t.checked_sub_signed(padding).unwrap_or(t)),
        window
            .end
            .map(|t| t.checked_add_signed(padding).unwrap_or(t)),
    )
}

/// Index range of the sorted `points` falling inside `bucket`.
fn bucket_slice(points: &[Sample], bucket: &Bucket) -> (usize, usize) {
    let from = points.partition_point(|p| p.timestamp < bucket.start);
    let len = points[from..]
        .iter()
        .take_while(|p| bucket.contains(&p.timestamp))
        .count();
    (from, from + len)
}
