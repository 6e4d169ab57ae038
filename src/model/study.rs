use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::segment::Segment;

// ---------------------------------------------------------------------------
// Study / Series / Segmentation: the containers segments arrive in
// ---------------------------------------------------------------------------

/// One imaging timepoint for a subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Study {
    #[serde(default)]
    pub study_id: String,
    /// ISO 8601 date or date-time.
    #[serde(default)]
    pub study_date: String,
    /// Marks the reference timepoint. Uniqueness is not enforced.
    #[serde(default)]
    pub is_basal: bool,
    #[serde(default)]
    pub series: Vec<Series>,
}

/// One acquisition within a study.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub series_instance_uid: String,
    #[serde(default)]
    pub segmentations: Vec<Segmentation>,
}

/// A named collection of segments produced for one series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segmentation {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl Study {
    pub fn new(study_id: impl Into<String>, study_date: impl Into<String>) -> Self {
        Self {
            study_id: study_id.into(),
            study_date: study_date.into(),
            ..Default::default()
        }
    }

    pub fn basal(mut self) -> Self {
        self.is_basal = true;
        self
    }

    pub fn with_series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    /// Convenience for the common one-series, one-segmentation layout.
    pub fn with_segments(self, series_uid: impl Into<String>, segments: Vec<Segment>) -> Self {
        let series_uid = series_uid.into();
        let segmentation = Segmentation {
            id: format!("{}-seg", series_uid),
            name: String::new(),
            segments,
        };
        self.with_series(Series {
            series_instance_uid: series_uid,
            segmentations: vec![segmentation],
        })
    }

    /// Every segment of the study, series by series, in document order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.series
            .iter()
            .flat_map(|series| series.segmentations.iter())
            .flat_map(|segmentation| segmentation.segments.iter())
    }

    /// Parsed `study_date`, or `None` if it is not a recognizable ISO 8601
    /// date.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_study_date(&self.study_date)
    }
}

impl Series {
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segmentations
            .iter()
            .flat_map(|segmentation| segmentation.segments.iter())
    }
}

/// Parse RFC 3339, naive date-times (read as UTC) and plain dates (UTC
/// midnight).
pub fn parse_study_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_rfc3339() {
        let ts = parse_study_date("2021-07-29T10:30:00+02:00").unwrap();
        assert_eq!(ts.hour(), 8);
        assert_eq!(ts.day(), 29);
    }

    #[test]
    fn test_parse_plain_date_and_naive() {
        let date = parse_study_date("2021-01-01").unwrap();
        let naive = parse_study_date("2021-01-01T00:00:00").unwrap();
        assert_eq!(date, naive);
        assert_eq!(date.year(), 2021);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_study_date("").is_none());
        assert!(parse_study_date("last tuesday").is_none());
        assert!(parse_study_date("2021-13-45").is_none());
    }

    #[test]
    fn test_segments_flatten_in_order() {
        let study = Study::new("s1", "2021-01-01")
            .with_segments("series-a", vec![Segment::new("a", "A"), Segment::new("b", "B")])
            .with_segments("series-b", vec![Segment::new("c", "C")]);

        let ids: Vec<&str> = study.segments().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(study.series[1].segments().count(), 1);
    }
}
