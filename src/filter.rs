// 🔎 Report Filters - the optional narrowing options every report accepts
//
// trip_id, location, category, start_date, end_date. Every option is
// optional and absence means "no restriction on this dimension".

use chrono::NaiveDate;
use std::collections::HashMap;

// ============================================================================
// DATE RANGE
// ============================================================================

/// Inclusive date range. Only exists when BOTH bounds were supplied.
///
/// Bounds are kept as the raw strings the caller sent. The store compares
/// them lexically (`BETWEEN`), which only behaves like a date comparison for
/// `YYYY-MM-DD` values - memories keep their date as free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    /// Both bounds parse as `YYYY-MM-DD`
    pub fn is_iso_formatted(&self) -> bool {
        is_iso_date(&self.start) && is_iso_date(&self.end)
    }
}

fn is_iso_date(value: &str) -> bool {
    value.len() == 10 && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

// ============================================================================
// FILTER SPEC
// ============================================================================

/// Normalized, immutable set of report filters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    trip_id: Option<String>,
    location: Option<String>,
    category: Option<String>,
    date_range: Option<DateRange>,
}

impl FilterSpec {
    /// No filters at all
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw request options.
    ///
    /// Empty strings count as absent. Values are not trimmed or checked for
    /// format; a lone `start_date` or `end_date` is dropped entirely.
    pub fn from_options(
        trip_id: Option<&str>,
        location: Option<&str>,
        category: Option<&str>,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Self {
        let date_range = match (present(start_date), present(end_date)) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            _ => None,
        };

        FilterSpec {
            trip_id: present(trip_id),
            location: present(location),
            category: present(category),
            date_range,
        }
    }

    /// Build from request query parameters; unknown keys are ignored
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        let get = |key: &str| query.get(key).map(String::as_str);
        Self::from_options(
            get("trip_id"),
            get("location"),
            get("category"),
            get("start_date"),
            get("end_date"),
        )
    }

    /// Build from `(key, value)` pairs, last value wins
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let query: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::from_query(&query)
    }

    pub fn with_trip(mut self, trip_id: impl Into<String>) -> Self {
        self.trip_id = non_empty(trip_id.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = non_empty(location.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = non_empty(category.into());
        self
    }

    pub fn with_date_range(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.date_range = match (non_empty(start.into()), non_empty(end.into())) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            _ => None,
        };
        self
    }

    /// Copy with the category dimension removed
    pub fn without_category(&self) -> Self {
        FilterSpec {
            category: None,
            ..self.clone()
        }
    }

    /// Copy with the location dimension removed
    pub fn without_location(&self) -> Self {
        FilterSpec {
            location: None,
            ..self.clone()
        }
    }

    pub fn trip_id(&self) -> Option<&str> {
        self.trip_id.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn date_range(&self) -> Option<&DateRange> {
        self.date_range.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.trip_id.is_none()
            && self.location.is_none()
            && self.category.is_none()
            && self.date_range.is_none()
    }
}

fn present(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_options_supplied() {
        let filter = FilterSpec::from_options(
            Some("1"),
            Some("Paris"),
            Some("Food"),
            Some("2024-01-01"),
            Some("2024-01-31"),
        );

        assert_eq!(filter.trip_id(), Some("1"));
        assert_eq!(filter.location(), Some("Paris"));
        assert_eq!(filter.category(), Some("Food"));
        assert_eq!(
            filter.date_range(),
            Some(&DateRange {
                start: "2024-01-01".to_string(),
                end: "2024-01-31".to_string(),
            })
        );
    }

    #[test]
    fn test_single_date_bound_is_ignored() {
        let only_start = FilterSpec::from_options(None, None, None, Some("2024-01-01"), None);
        let only_end = FilterSpec::from_options(None, None, None, None, Some("2024-01-31"));

        assert!(only_start.date_range().is_none());
        assert!(only_end.date_range().is_none());
        assert_eq!(only_start, FilterSpec::new());
        assert_eq!(only_end, FilterSpec::new());
    }

    #[test]
    fn test_empty_strings_are_absent() {
        let filter = FilterSpec::from_pairs([
            ("trip_id", ""),
            ("location", ""),
            ("category", "Food"),
            ("start_date", ""),
            ("end_date", "2024-01-31"),
        ]);

        assert!(filter.trip_id().is_none());
        assert!(filter.location().is_none());
        assert_eq!(filter.category(), Some("Food"));
        assert!(filter.date_range().is_none());
    }

    #[test]
    fn test_values_are_not_trimmed() {
        let filter = FilterSpec::from_pairs([("location", " Paris ")]);
        assert_eq!(filter.location(), Some(" Paris "));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let filter = FilterSpec::from_pairs([("sort", "desc"), ("page", "2")]);
        assert!(filter.is_empty());
    }

    #[test]
    fn test_without_category_keeps_other_dimensions() {
        let filter = FilterSpec::new()
            .with_trip("3")
            .with_category("Food")
            .with_date_range("2024-01-01", "2024-02-01");

        let narrowed = filter.without_category();
        assert!(narrowed.category().is_none());
        assert_eq!(narrowed.trip_id(), Some("3"));
        assert!(narrowed.date_range().is_some());
    }

    #[test]
    fn test_iso_format_detection() {
        let iso = DateRange {
            start: "2024-01-01".to_string(),
            end: "2024-12-31".to_string(),
        };
        let free_text = DateRange {
            start: "Jan 1st".to_string(),
            end: "2024-12-31".to_string(),
        };
        let short = DateRange {
            start: "2024-1-1".to_string(),
            end: "2024-12-31".to_string(),
        };

        assert!(iso.is_iso_formatted());
        assert!(!free_text.is_iso_formatted());
        assert!(!short.is_iso_formatted());
    }
}
