use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::config::ConfigError;

/// Every timestamp carries the fixed utc-offset it was produced in.
pub type Timestamp = DateTime<FixedOffset>;

/// Series identifiers are opaque strings (e.g. "Stage.Working@01234").
pub type SeriesId = String;

/// A possibly open time range.
///
/// Either side may be `None` to mean "unbounded". Once an interval has gone
/// through [`crate::alignment::IntervalAligner::align`] both sides are present
/// and `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Interval {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
}

impl Interval {
    pub fn new(start: Option<Timestamp>, end: Option<Timestamp>) -> Self {
        Self { start, end }
    }

    pub fn bounded(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// The unbounded record: both sides unknown.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Re-express both bounds in `offset` without moving the instants.
    pub fn with_offset(&self, offset: &FixedOffset) -> Self {
        Self {
            start: self.start.map(|t| t.with_timezone(offset)),
            end: self.end.map(|t| t.with_timezone(offset)),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |t: Option<Timestamp>| match t {
            Some(t) => t.to_rfc3339(),
            None => "unknown".to_string(),
        };
        write!(f, "[{}, {}]", side(self.start), side(self.end))
    }
}

/// Calendar unit a report period is bucketed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BucketUnit {
    #[default]
    None,
    Day,
    Week,
    Month,
    Year,
    WaterYear,
}

impl BucketUnit {
    /// Map a legacy "GroupBy" string onto a unit.
    ///
    /// Matching is case-insensitive. Anything unrecognized becomes
    /// [`BucketUnit::None`], which aligns and buckets like `Day`.
    pub fn from_group_by(group_by: &str) -> Self {
        match group_by.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => BucketUnit::Day,
            "week" | "weekly" => BucketUnit::Week,
            "month" | "monthly" => BucketUnit::Month,
            "year" | "yearly" | "annual" => BucketUnit::Year,
            "wateryear" | "water_year" | "water-year" => BucketUnit::WaterYear,
            "" | "none" => BucketUnit::None,
            other => {
                warn!("Unrecognized group-by '{}', falling back to daily buckets", other);
                BucketUnit::None
            }
        }
    }
}

/// First calendar month (1-12) of the water year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaterYearStart(u32);

impl WaterYearStart {
    pub fn new(month: u32) -> Result<Self, ConfigError> {
        if (1..=12).contains(&month) {
            Ok(Self(month))
        } else {
            Err(ConfigError::Invalid(format!(
                "water year start month must be 1-12, got {month}"
            )))
        }
    }

    pub fn month(&self) -> u32 {
        self.0
    }
}

impl Default for WaterYearStart {
    fn default() -> Self {
        Self(10)
    }
}

/// A time-aligned point. `value: None` is a known gap, not zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: Timestamp,
    pub value: Option<f64>,
}

impl Sample {
    pub fn new(timestamp: Timestamp, value: Option<f64>) -> Self {
        Self { timestamp, value }
    }
}

/// Quality code applied to `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeRange {
    pub start: Timestamp,
    pub end: Timestamp,
    pub grade_code: i32,
}

/// One calendar bucket, `start <= t < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Bucket {
    pub fn contains(&self, timestamp: &Timestamp) -> bool {
        self.start <= *timestamp && *timestamp < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtremaMode {
    Min,
    #[default]
    Max,
}

/// How the store attributes a value to the time between points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationType {
    #[default]
    InstantaneousValues,
    PrecedingConstant,
    SucceedingConstant,
    InstantaneousTotals,
    DiscreteValues,
    PrecedingTotals,
}

impl InterpolationType {
    /// Offset applied to search windows during range discovery.
    ///
    /// Preceding-edge types attribute each bucket's count to the edge before
    /// it, so their windows are widened by one unit toward the past.
    pub fn bin_adjustment(&self) -> i32 {
        match self {
            InterpolationType::PrecedingConstant | InterpolationType::PrecedingTotals => -1,
            _ => 0,
        }
    }
}

/// Descriptive metadata for one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesInfo {
    pub id: SeriesId,
    pub label: String,
    pub parameter: String,
    pub unit: String,
    #[serde(with = "utc_offset")]
    pub utc_offset: FixedOffset,
    pub interpolation_type: InterpolationType,
}

/// One row of a counts-by-period query, keyed by period start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodCount {
    pub start: Timestamp,
    pub count: u64,
}

/// Parse a utc-offset written as `Z`, `+HH:MM`, `-HH:MM` or `+HHMM`.
pub fn parse_utc_offset(text: &str) -> Option<FixedOffset> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("z") || text.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match text.as_bytes().first()? {
        b'+' => (1, &text[1..]),
        b'-' => (-1, &text[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Render an offset as `+HH:MM`.
pub fn format_utc_offset(offset: &FixedOffset) -> String {
    let seconds = offset.local_minus_utc();
    let sign = if seconds < 0 { '-' } else { '+' };
    let seconds = seconds.abs();
    format!("{}{:02}:{:02}", sign, seconds / 3600, (seconds % 3600) / 60)
}

/// Serde adapter storing a [`FixedOffset`] as `+HH:MM`.
pub mod utc_offset {
    use chrono::FixedOffset;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(offset: &FixedOffset, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_utc_offset(offset))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FixedOffset, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_utc_offset(&text)
            .ok_or_else(|| de::Error::custom(format!("invalid utc offset '{text}'")))
    }
}
