//! Query validation
//!
//! Malformed queries are rejected synchronously, before any I/O or cache
//! lookup. Everything here returns the structured [`RecallError::InvalidQuery`]
//! variant so callers can surface the failing field.

use crate::errors::{RecallError, RecallResult};
use crate::types::{EmotionFilter, QuerySpec, TemporalFilter};

/// Upper bound on a single query's result limit
///
/// Guards against a caller accidentally requesting the whole store.
pub const MAX_RESULT_LIMIT: usize = 1_000;

/// Validate a `QuerySpec`, rejecting malformed predicates
pub fn validate_query(query: &QuerySpec) -> RecallResult<()> {
    if query.limit == 0 {
        return Err(RecallError::invalid_query("limit", "must be greater than zero"));
    }
    if query.limit > MAX_RESULT_LIMIT {
        return Err(RecallError::invalid_query(
            "limit",
            format!("must be at most {MAX_RESULT_LIMIT}"),
        ));
    }

    if !(0.0..=1.0).contains(&query.min_importance) {
        return Err(RecallError::invalid_query(
            "min_importance",
            "must be within [0.0, 1.0]",
        ));
    }
    if !(0.0..=1.0).contains(&query.min_confidence) {
        return Err(RecallError::invalid_query(
            "min_confidence",
            "must be within [0.0, 1.0]",
        ));
    }

    if let Some(text) = &query.text {
        if text.trim().is_empty() {
            return Err(RecallError::invalid_query(
                "text",
                "must not be blank when present",
            ));
        }
    }

    if let Some(temporal) = &query.temporal {
        validate_temporal(temporal)?;
    }
    if let Some(emotion) = &query.emotion {
        validate_emotion(emotion)?;
    }

    Ok(())
}

fn validate_temporal(filter: &TemporalFilter) -> RecallResult<()> {
    match filter {
        TemporalFilter::RecentHours(hours) if *hours <= 0 => Err(RecallError::invalid_query(
            "temporal",
            "recent-hours window must be positive",
        )),
        TemporalFilter::RecentDays(days) if *days <= 0 => Err(RecallError::invalid_query(
            "temporal",
            "recent-days window must be positive",
        )),
        TemporalFilter::DaysAgo(days) if *days < 0 => Err(RecallError::invalid_query(
            "temporal",
            "days-ago offset must not be negative",
        )),
        TemporalFilter::Range { from, to } if from > to => Err(RecallError::invalid_query(
            "temporal",
            "range start must not be after range end",
        )),
        TemporalFilter::Anniversary { month, day }
            if !(1..=12).contains(month) || !(1..=31).contains(day) =>
        {
            Err(RecallError::invalid_query(
                "temporal",
                "anniversary must be a valid month and day",
            ))
        }
        _ => Ok(()),
    }
}

fn validate_emotion(filter: &EmotionFilter) -> RecallResult<()> {
    match filter {
        EmotionFilter::IntensityRange { min, max } => {
            if min > max || !(0.0..=1.0).contains(min) || !(0.0..=1.0).contains(max) {
                return Err(RecallError::invalid_query(
                    "emotion",
                    "intensity range must be ordered and within [0.0, 1.0]",
                ));
            }
            Ok(())
        }
        EmotionFilter::ValenceRange { min, max } => {
            if min > max || !(-1.0..=1.0).contains(min) || !(-1.0..=1.0).contains(max) {
                return Err(RecallError::invalid_query(
                    "emotion",
                    "valence range must be ordered and within [-1.0, 1.0]",
                ));
            }
            Ok(())
        }
        EmotionFilter::Tagged(tags) if tags.is_empty() => Err(RecallError::invalid_query(
            "emotion",
            "tag set must not be empty",
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashSet;

    #[test]
    fn test_zero_limit_rejected() {
        let mut query = QuerySpec::default();
        query.limit = 0;
        let err = validate_query(&query).unwrap_err();
        assert_eq!(err.code(), "INVALID_QUERY");
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut query = QuerySpec::default();
        let now = Utc::now();
        query.temporal = Some(TemporalFilter::Range {
            from: now,
            to: now - chrono::Duration::days(1),
        });
        assert!(validate_query(&query).is_err());
    }

    #[test]
    fn test_invalid_anniversary_rejected() {
        let mut query = QuerySpec::default();
        query.temporal = Some(TemporalFilter::Anniversary { month: 13, day: 1 });
        assert!(validate_query(&query).is_err());
    }

    #[test]
    fn test_empty_tag_set_rejected() {
        let mut query = QuerySpec::default();
        query.emotion = Some(EmotionFilter::Tagged(HashSet::new()));
        assert!(validate_query(&query).is_err());
    }

    #[test]
    fn test_well_formed_query_accepted() {
        let mut query = QuerySpec::text("coffee with ana");
        query.temporal = Some(TemporalFilter::RecentDays(7));
        query.emotion = Some(EmotionFilter::IntensityRange { min: 0.2, max: 0.8 });
        assert!(validate_query(&query).is_ok());
    }
}
