#![allow(dead_code)]

use chrono::{DateTime, FixedOffset};
use hydro_report_engine::models::{GradeRange, InterpolationType, Sample, Timestamp};
use hydro_report_engine::services::{ReportService, ReportSettings};
use hydro_report_engine::store::{MemorySeriesStore, SeriesRecord};
use std::sync::Arc;

pub const STAGE_SERIES: &str = "Stage.Gauge@01";
pub const EMPTY_SERIES: &str = "Discharge.Gauge@01";

pub fn ts(s: &str) -> Timestamp {
    DateTime::parse_from_rfc3339(s).unwrap()
}

fn mst() -> FixedOffset {
    FixedOffset::west_opt(7 * 3600).unwrap()
}

/// Three days of stage with a gap on the second day and two grade ranges.
pub fn stage_record() -> SeriesRecord {
    SeriesRecord {
        id: STAGE_SERIES.to_string(),
        label: "Stage".to_string(),
        parameter: "Stage".to_string(),
        unit: "ft".to_string(),
        utc_offset: mst(),
        interpolation_type: InterpolationType::InstantaneousValues,
        points: vec![
            Sample::new(ts("2020-01-01T06:00:00-07:00"), Some(1.0)),
            Sample::new(ts("2020-01-01T18:00:00-07:00"), Some(5.0)),
            Sample::new(ts("2020-01-02T06:00:00-07:00"), Some(3.0)),
            Sample::new(ts("2020-01-02T12:00:00-07:00"), None),
            Sample::new(ts("2020-01-03T00:00:00-07:00"), Some(2.0)),
        ],
        grades: vec![
            GradeRange {
                start: ts("2020-01-01T00:00:00-07:00"),
                end: ts("2020-01-02T00:00:00-07:00"),
                grade_code: 50,
            },
            GradeRange {
                start: ts("2020-01-02T00:00:00-07:00"),
                end: ts("2020-01-04T00:00:00-07:00"),
                grade_code: 10,
            },
        ],
    }
}

pub fn empty_record() -> SeriesRecord {
    SeriesRecord {
        id: EMPTY_SERIES.to_string(),
        label: "Discharge".to_string(),
        parameter: "Discharge".to_string(),
        unit: "cfs".to_string(),
        utc_offset: mst(),
        interpolation_type: InterpolationType::InstantaneousValues,
        points: Vec::new(),
        grades: Vec::new(),
    }
}

pub fn test_store() -> MemorySeriesStore {
    MemorySeriesStore::from_records(vec![stage_record(), empty_record()])
        .expect("Failed to build test store")
}

pub fn test_service() -> ReportService<MemorySeriesStore> {
    ReportService::new(Arc::new(test_store()), ReportSettings::default())
}
