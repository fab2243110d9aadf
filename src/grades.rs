use crate::models::{GradeRange, Sample};

/// Grade code for a sample no range covers.
pub const UNGRADED: i32 = -1;

/// Assign each sample the grade of the range containing it.
///
/// Both inputs must be sorted ascending and `ranges` must not overlap. The
/// range cursor only moves forward, so the cost is O(samples + ranges).
/// Unsorted input is not detected and simply produces wrong grades.
pub fn assign_grades(samples: &[Sample], ranges: &[GradeRange]) -> Vec<i32> {
    let mut cursor = 0;

    samples
        .iter()
        .map(|sample| {
            let t = sample.timestamp;
            while cursor < ranges.len() && ranges[cursor].end <= t {
                cursor += 1;
            }
            match ranges.get(cursor) {
                Some(range) if range.start <= t && t < range.end => range.grade_code,
                _ => UNGRADED,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timestamp;
    use chrono::DateTime;

    fn ts(s: &str) -> Timestamp {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn at(s: &str) -> Sample {
        Sample::new(ts(s), Some(1.0))
    }

    fn grade(start: &str, end: &str, grade_code: i32) -> GradeRange {
        GradeRange {
            start: ts(start),
            end: ts(end),
            grade_code,
        }
    }

    #[test]
    fn test_assign_grades_containment() {
        let ranges = vec![
            grade("2020-01-01T00:00:00Z", "2020-01-02T00:00:00Z", 50),
            grade("2020-01-03T00:00:00Z", "2020-01-04T00:00:00Z", 10),
        ];
        let samples = vec![
            at("2019-12-31T12:00:00Z"),
            at("2020-01-01T00:00:00Z"),
            at("2020-01-01T23:59:59Z"),
            at("2020-01-02T00:00:00Z"),
            at("2020-01-02T12:00:00Z"),
            at("2020-01-03T06:00:00Z"),
            at("2020-01-05T00:00:00Z"),
        ];

        assert_eq!(
            assign_grades(&samples, &ranges),
            vec![UNGRADED, 50, 50, UNGRADED, UNGRADED, 10, UNGRADED]
        );
    }

    #[test]
    fn test_adjacent_ranges() {
        let ranges = vec![
            grade("2020-01-01T00:00:00Z", "2020-01-02T00:00:00Z", 1),
            grade("2020-01-02T00:00:00Z", "2020-01-03T00:00:00Z", 2),
        ];
        let samples = vec![at("2020-01-01T12:00:00Z"), at("2020-01-02T00:00:00Z")];

        assert_eq!(assign_grades(&samples, &ranges), vec![1, 2]);
    }

    #[test]
    fn test_gaps_in_values_still_graded() {
        let ranges = vec![grade("2020-01-01T00:00:00Z", "2020-01-02T00:00:00Z", 7)];
        let samples = vec![Sample::new(ts("2020-01-01T06:00:00Z"), None)];

        assert_eq!(assign_grades(&samples, &ranges), vec![7]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(assign_grades(&[], &[]).is_empty());
        assert_eq!(assign_grades(&[at("2020-01-01T00:00:00Z")], &[]), vec![UNGRADED]);
    }
}
