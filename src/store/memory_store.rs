use chrono::{Datelike, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::alignment::{floor_day, month_start};
use crate::models::{
    GradeRange, Interval, InterpolationType, PeriodCount, Sample, SeriesId, SeriesInfo, Timestamp,
};
use crate::source::{SourceError, TimeSeriesSource};
use crate::store::StoreError;

/// One series as stored on disk: metadata, points and grade ranges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesRecord {
    pub id: SeriesId,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub parameter: String,
    #[serde(default)]
    pub unit: String,
    #[serde(with = "crate::models::utc_offset")]
    pub utc_offset: FixedOffset,
    #[serde(default)]
    pub interpolation_type: InterpolationType,
    #[serde(default)]
    pub points: Vec<Sample>,
    #[serde(default)]
    pub grades: Vec<GradeRange>,
}

impl SeriesRecord {
    pub fn info(&self) -> SeriesInfo {
        SeriesInfo {
            id: self.id.clone(),
            label: self.label.clone(),
            parameter: self.parameter.clone(),
            unit: self.unit.clone(),
            utc_offset: self.utc_offset,
            interpolation_type: self.interpolation_type,
        }
    }

    /// Sort points and grades so range queries can binary search.
    fn normalize(&mut self) {
        self.points.sort_by_key(|p| p.timestamp);
        self.grades.sort_by_key(|g| g.start);
    }

    fn points_in(&self, range: &Interval) -> &[Sample] {
        let from = match range.start {
            Some(start) => self.points.partition_point(|p| p.timestamp < start),
            None => 0,
        };
        let to = match range.end {
            Some(end) => self.points.partition_point(|p| p.timestamp < end),
            None => self.points.len(),
        };
        if from >= to {
            &[]
        } else {
            &self.points[from..to]
        }
    }

    fn count_by(&self, points: &[Sample], period_start: impl Fn(&Timestamp) -> Timestamp) -> Vec<PeriodCount> {
        let mut counts: BTreeMap<Timestamp, u64> = BTreeMap::new();
        for point in points {
            let local = point.timestamp.with_timezone(&self.utc_offset);
            *counts.entry(period_start(&local)).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .map(|(start, count)| PeriodCount { start, count })
            .collect()
    }
}

/// Series held in memory, loaded from JSON series files.
#[derive(Debug, Default)]
pub struct MemorySeriesStore {
    series: BTreeMap<SeriesId, SeriesRecord>,
}

impl MemorySeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(
        records: impl IntoIterator<Item = SeriesRecord>,
    ) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for record in records {
            store.insert(record)?;
        }
        Ok(store)
    }

    pub fn insert(&mut self, mut record: SeriesRecord) -> Result<(), StoreError> {
        if self.series.contains_key(&record.id) {
            return Err(StoreError::DuplicateSeries(record.id));
        }
        record.normalize();
        debug!(
            "Stored series {} with {} points and {} grade ranges",
            record.id,
            record.points.len(),
            record.grades.len()
        );
        self.series.insert(record.id.clone(), record);
        Ok(())
    }

    /// Read one series file.
    pub fn load_file(path: &Path) -> Result<SeriesRecord, StoreError> {
        let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load every `*.json` file in `dir`, in file-name order.
    #[instrument]
    pub fn load_dir(dir: &Path) -> Result<Self, StoreError> {
        let entries = fs::read_dir(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            } else {
                debug!("Skipping non-series file {}", path.display());
            }
        }
        paths.sort();

        if paths.is_empty() {
            warn!("No series files found in {}", dir.display());
        }

        let mut store = Self::new();
        for path in &paths {
            store.insert(Self::load_file(path)?)?;
        }

        info!("Loaded {} series from {}", store.len(), dir.display());
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    fn record(&self, series_id: &str) -> Result<&SeriesRecord, SourceError> {
        self.series
            .get(series_id)
            .ok_or_else(|| SourceError::NotFound(series_id.to_string()))
    }
}

impl TimeSeriesSource for MemorySeriesStore {
    fn list_series(&self) -> Result<Vec<SeriesInfo>, SourceError> {
        Ok(self.series.values().map(SeriesRecord::info).collect())
    }

    fn series_info(&self, series_id: &str) -> Result<SeriesInfo, SourceError> {
        Ok(self.record(series_id)?.info())
    }

    fn annual_counts(&self, series_id: &str) -> Result<Vec<PeriodCount>, SourceError> {
        let record = self.record(series_id)?;
        Ok(record.count_by(&record.points, |t| month_start(t.offset(), t.year(), 1)))
    }

    fn daily_counts(
        &self,
        series_id: &str,
        range: &Interval,
    ) -> Result<Vec<PeriodCount>, SourceError> {
        let record = self.record(series_id)?;
        Ok(record.count_by(record.points_in(range), floor_day))
    }

    fn raw_points(&self, series_id: &str, range: &Interval) -> Result<Vec<Sample>, SourceError> {
        Ok(self.record(series_id)?.points_in(range).to_vec())
    }

    fn grade_ranges(
        &self,
        series_id: &str,
        range: &Interval,
    ) -> Result<Vec<GradeRange>, SourceError> {
        let record = self.record(series_id)?;
        Ok(record
            .grades
            .iter()
            .filter(|g| range.start.map_or(true, |start| g.end > start))
            .filter(|g| range.end.map_or(true, |end| g.start < end))
            .copied()
            .collect())
    }
}
