//! Date range filtering on front matter fields.

use crate::config::IndexConfig;
use crate::note::Note;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use std::ops::{Bound, RangeBounds};

/// A range of points in time with independent inclusive/exclusive ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Bound<DateTime<Utc>>,
    pub end: Bound<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Bound<DateTime<Utc>>, end: Bound<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Whole calendar days `from..=to`, in UTC. Either end may be open.
    pub fn days(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        let start = match from {
            Some(d) => Bound::Included(midnight(d)),
            None => Bound::Unbounded,
        };
        let end = match to.and_then(|d| d.checked_add_days(Days::new(1))) {
            Some(next) => Bound::Excluded(midnight(next)),
            None => match to {
                // the last representable day
                Some(d) => Bound::Included(midnight(d)),
                None => Bound::Unbounded,
            },
        };
        Self { start, end }
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        RangeBounds::contains(self, at)
    }
}

impl RangeBounds<DateTime<Utc>> for DateRange {
    fn start_bound(&self) -> Bound<&DateTime<Utc>> {
        self.start.as_ref()
    }

    fn end_bound(&self) -> Bound<&DateTime<Utc>> {
        self.end.as_ref()
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// The point in time `field` holds for `note`.
///
/// A missing field falls back to the file's creation or modification time
/// when the field is configured as a created or modified field. A value that
/// is present but not a date yields `None`.
pub fn field_datetime(note: &Note, field: &str, config: &IndexConfig) -> Option<DateTime<Utc>> {
    match note.field(field) {
        Some(value) => value.as_datetime(),
        None if config.created_fields.iter().any(|f| f == field) => note.created,
        None if config.modified_fields.iter().any(|f| f == field) => note.modified,
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::FileMeta;
    use crate::parser::NoteParser;
    use std::path::Path;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn note(content: &str, meta: FileMeta) -> Note {
        NoteParser::default()
            .parse(content.as_bytes(), Path::new("n.md"), meta)
            .unwrap()
    }

    #[test]
    fn test_days_are_inclusive() {
        let range = DateRange::days(Some(date("2024-01-01")), Some(date("2024-01-31")));
        assert!(range.contains(&midnight(date("2024-01-01"))));
        assert!(range.contains(&(midnight(date("2024-02-01")) - chrono::Duration::seconds(1))));
        assert!(!range.contains(&midnight(date("2024-02-01"))));
        assert!(!range.contains(&midnight(date("2023-12-31"))));
    }

    #[test]
    fn test_open_ends() {
        let range = DateRange::days(None, Some(date("2024-01-31")));
        assert!(range.contains(&midnight(date("1999-01-01"))));
        let range = DateRange::days(Some(date("2024-01-01")), None);
        assert!(range.contains(&midnight(date("2999-01-01"))));
    }

    #[test]
    fn test_field_fallbacks() {
        let config = IndexConfig::default();
        let created = midnight(date("2023-06-01"));
        let meta = FileMeta {
            created: Some(created),
            modified: None,
        };

        let with_field = note("---\ncreated: 2024-01-05\n---\n", meta);
        assert_eq!(
            field_datetime(&with_field, "created", &config),
            Some(midnight(date("2024-01-05")))
        );

        let without = note("body\n", meta);
        assert_eq!(field_datetime(&without, "created", &config), Some(created));
        assert_eq!(field_datetime(&without, "modified", &config), None);
        assert_eq!(field_datetime(&without, "due", &config), None);

        let garbage = note("---\ncreated: someday\n---\n", meta);
        assert_eq!(field_datetime(&garbage, "created", &config), None);
    }
}
