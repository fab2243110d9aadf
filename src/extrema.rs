//! Per-bucket instantaneous minima and maxima.
//!
//! Samples are walked exactly once. The value of the series at every bucket
//! edge is interpolated from the real samples straddling it, so a peak that
//! crosses midnight is attributed to the edge rather than lost between two
//! buckets.

use chrono::Duration;
use serde::Serialize;

use crate::models::{ExtremaMode, Sample, Timestamp};

/// The winning value of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extremum {
    pub timestamp: Timestamp,
    pub value: f64,
}

impl ExtremaMode {
    /// Strict improvement test; ties keep the value seen first.
    fn improves(&self, candidate: f64, current: Option<&Extremum>) -> bool {
        match current {
            None => true,
            Some(current) => match self {
                ExtremaMode::Min => candidate < current.value,
                ExtremaMode::Max => candidate > current.value,
            },
        }
    }
}

/// Find the extremum of every bucket.
///
/// Buckets are `[range_start, bucket_ends[0]]`, `[bucket_ends[0],
/// bucket_ends[1]]`, ... A sample exactly on an edge is scanned by the bucket
/// that edge closes. `samples` must be sorted and should reach past both
/// `range_start` and the last bucket end so the edges have real neighbours to
/// interpolate between; `bucket_ends` must be ascending.
///
/// Buckets with no valid sample and no interpolable edge yield `None`.
pub fn find_extrema(
    samples: &[Sample],
    bucket_ends: &[Timestamp],
    mode: ExtremaMode,
    range_start: Timestamp,
) -> Vec<Option<Extremum>> {
    let mut results = Vec::with_capacity(bucket_ends.len());

    let mut cursor = samples.partition_point(|s| s.timestamp < range_start);
    let mut left_bin_value = if cursor > 0 && cursor < samples.len() {
        interpolate_between(&samples[cursor - 1], &samples[cursor], range_start)
    } else {
        None
    };
    let mut bucket_start = range_start;

    for &bucket_end in bucket_ends {
        let mut best = left_bin_value.map(|value| Extremum {
            timestamp: bucket_start,
            value,
        });

        while cursor < samples.len() && samples[cursor].timestamp <= bucket_end {
            let sample = &samples[cursor];
            if let Some(value) = sample.value {
                if mode.improves(value, best.as_ref()) {
                    best = Some(Extremum {
                        timestamp: sample.timestamp,
                        value,
                    });
                }
            }
            cursor += 1;
        }

        let boundary_value = if cursor > 0 && cursor < samples.len() {
            interpolate_between(&samples[cursor - 1], &samples[cursor], bucket_end)
        } else {
            None
        };
        if let Some(value) = boundary_value {
            if mode.improves(value, best.as_ref()) {
                best = Some(Extremum {
                    timestamp: bucket_end,
                    value,
                });
            }
        }

        results.push(best);
        left_bin_value = boundary_value;
        bucket_start = bucket_end;
    }

    results
}

fn interpolate_between(before: &Sample, after: &Sample, at: Timestamp) -> Option<f64> {
    interpolate(before.timestamp, before.value, after.timestamp, after.value, at)
}

/// Linear interpolation of the value at `x` between `(t1, y1)` and `(t2, y2)`.
///
/// Exact at both endpoints. Returns `None` when `x` lies outside `[t1, t2]`
/// or either value is missing.
pub fn interpolate(
    t1: Timestamp,
    y1: Option<f64>,
    t2: Timestamp,
    y2: Option<f64>,
    x: Timestamp,
) -> Option<f64> {
    let (y1, y2) = (y1?, y2?);
    if x == t1 {
        return Some(y1);
    }
    if x == t2 {
        return Some(y2);
    }
    if x < t1 || x > t2 {
        return None;
    }

    let fraction = ticks(x - t1) / ticks(t2 - t1);
    Some(y1 + (y2 - y1) * fraction)
}

/// Nanosecond ticks as a float, without the overflow of `num_nanoseconds`.
fn ticks(delta: Duration) -> f64 {
    delta.num_seconds() as f64 * 1e9 + f64::from(delta.subsec_nanos())
}
