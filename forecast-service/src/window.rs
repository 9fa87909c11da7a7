//! Validation of the optional `at` query parameter.
//!
//! The upstream historical endpoint has no data before 1979 and its forecast
//! horizon is a few days, so out-of-range instants are rejected here before
//! any upstream round trip.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use common::errors::AppError;
use thiserror::Error;

/// 1979-01-01T00:00:00Z
pub const EARLIEST_TIMESTAMP: i64 = 283_996_800;
pub const EARLIEST_LABEL: &str = "1979-01-01T00:00:00Z";
pub const HORIZON_DAYS: i64 = 4;

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M%:z"];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("'{0}' is not an ISO 8601 date or datetime")]
    InvalidFormat(String),

    #[error("date is earlier than 1979-01-01T00:00:00Z")]
    TooFarPast,

    #[error("date is more than 4 days in the future")]
    TooFarFuture,
}

impl From<RejectionReason> for AppError {
    fn from(reason: RejectionReason) -> Self {
        match reason {
            RejectionReason::InvalidFormat(_) => AppError::InvalidDateFormat(reason.to_string()),
            RejectionReason::TooFarPast => AppError::DateTooFarPast {
                earliest: EARLIEST_LABEL.to_string(),
            },
            RejectionReason::TooFarFuture => AppError::DateTooFarFuture {
                horizon_days: HORIZON_DAYS,
            },
        }
    }
}

/// Validate `text` against the window around the current time.
pub fn validate(text: Option<&str>) -> Result<Option<DateTime<Utc>>, RejectionReason> {
    validate_at(text, Utc::now())
}

/// Validate `text` against the window around `now`.
///
/// `None` means "current conditions" and is always accepted. Spaces are
/// read as `+` because query strings arrive with `+` already decoded.
pub fn validate_at(
    text: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, RejectionReason> {
    let Some(text) = text else {
        return Ok(None);
    };

    let normalized = text.replace(' ', "+");
    let instant =
        parse_instant(&normalized).ok_or_else(|| RejectionReason::InvalidFormat(text.to_string()))?;

    if instant.timestamp() < EARLIEST_TIMESTAMP {
        return Err(RejectionReason::TooFarPast);
    }
    if instant > now + TimeDelta::days(HORIZON_DAYS) {
        return Err(RejectionReason::TooFarFuture);
    }

    Ok(Some(instant))
}

/// Timezone-naive inputs are taken as UTC.
fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(text, fmt).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }

    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(naive.and_utc());
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_absent_means_current() {
        assert_eq!(validate_at(None, now()), Ok(None));
    }

    #[test]
    fn test_before_earliest_is_rejected() {
        assert_eq!(
            validate_at(Some("1978-12-31T23:59:59Z"), now()),
            Err(RejectionReason::TooFarPast)
        );
    }

    #[test]
    fn test_earliest_itself_is_accepted() {
        let accepted = validate_at(Some("1979-01-01T00:00:00Z"), now()).unwrap();
        assert_eq!(accepted.map(|t| t.timestamp()), Some(EARLIEST_TIMESTAMP));
    }

    #[test]
    fn test_beyond_horizon_is_rejected() {
        let five_days = (now() + TimeDelta::days(5)).to_rfc3339();
        assert_eq!(
            validate_at(Some(five_days.as_str()), now()),
            Err(RejectionReason::TooFarFuture)
        );
    }

    #[test]
    fn test_within_horizon_is_accepted() {
        let tomorrow = now() + TimeDelta::days(1);
        let accepted = validate_at(Some(tomorrow.to_rfc3339().as_str()), now())
            .unwrap()
            .unwrap();
        assert!((accepted - tomorrow).num_seconds().abs() <= 1);
    }

    #[test]
    fn test_validate_uses_wall_clock() {
        let tomorrow = Utc::now() + TimeDelta::days(1);
        let accepted = validate(Some(tomorrow.to_rfc3339().as_str())).unwrap().unwrap();
        assert!((accepted - tomorrow).num_seconds().abs() <= 1);

        let later = (Utc::now() + TimeDelta::days(5)).to_rfc3339();
        assert_eq!(validate(Some(later.as_str())), Err(RejectionReason::TooFarFuture));
    }

    #[test]
    fn test_garbage_is_invalid_format() {
        assert_eq!(
            validate_at(Some("not-a-date"), now()),
            Err(RejectionReason::InvalidFormat("not-a-date".to_string()))
        );
    }

    #[test]
    fn test_space_is_read_as_plus() {
        let accepted = validate_at(Some("2024-05-01T12:00:00 02:00"), now())
            .unwrap()
            .unwrap();
        assert_eq!(accepted, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_compact_offset_is_accepted() {
        let accepted = validate_at(Some("2024-05-01T12:00:00-0130"), now())
            .unwrap()
            .unwrap();
        assert_eq!(accepted, Utc.with_ymd_and_hms(2024, 5, 1, 13, 30, 0).unwrap());
    }

    #[test]
    fn test_naive_datetime_is_utc() {
        let accepted = validate_at(Some("2024-05-01T08:30:15.250"), now())
            .unwrap()
            .unwrap();
        assert_eq!(accepted.timestamp(), Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 15).unwrap().timestamp());
        assert_eq!(accepted.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_bare_date_is_midnight_utc() {
        let accepted = validate_at(Some("2020-02-29"), now()).unwrap().unwrap();
        assert_eq!(accepted, Utc.with_ymd_and_hms(2020, 2, 29, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_rejections_map_to_app_errors() {
        assert!(matches!(
            AppError::from(RejectionReason::InvalidFormat("x".to_string())),
            AppError::InvalidDateFormat(_)
        ));
        assert!(matches!(
            AppError::from(RejectionReason::TooFarPast),
            AppError::DateTooFarPast { .. }
        ));
        assert!(matches!(
            AppError::from(RejectionReason::TooFarFuture),
            AppError::DateTooFarFuture { horizon_days: 4 }
        ));
    }
}
