use std::fmt;

use chrono::{Duration, NaiveDate};

pub const EXPIRING_WINDOW_DAYS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryStatus {
    Current,
    Expiring,
    Expired,
}

impl fmt::Display for ExpiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExpiryStatus::Current => "current",
            ExpiryStatus::Expiring => "expiring",
            ExpiryStatus::Expired => "expired",
        };
        f.write_str(label)
    }
}

/// Stateless: recomputed from the stored expiry date and the caller's notion
/// of today. An acknowledged record is never "expiring", but acknowledgement
/// does not rescue a date already in the past.
pub fn classify(expires_on: Option<NaiveDate>, acknowledged: bool, today: NaiveDate) -> ExpiryStatus {
    let Some(expires_on) = expires_on else {
        return ExpiryStatus::Current;
    };

    if expires_on < today {
        return ExpiryStatus::Expired;
    }

    if !acknowledged && expires_on <= today + Duration::days(EXPIRING_WINDOW_DAYS) {
        return ExpiryStatus::Expiring;
    }

    ExpiryStatus::Current
}

pub fn is_expiring(expires_on: Option<NaiveDate>, acknowledged: bool, today: NaiveDate) -> bool {
    classify(expires_on, acknowledged, today) == ExpiryStatus::Expiring
}

pub fn is_expired(expires_on: Option<NaiveDate>, today: NaiveDate) -> bool {
    matches!(
        classify(expires_on, false, today),
        ExpiryStatus::Expired
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn unacknowledged_date_inside_window_is_expiring() {
        let today = date(2024, 6, 10);
        assert!(is_expiring(Some(date(2024, 6, 11)), false, today));
        assert!(is_expiring(Some(date(2024, 6, 10)), false, today));
        assert!(is_expiring(Some(date(2024, 6, 12)), false, today));
    }

    #[test]
    fn acknowledged_date_is_not_flagged() {
        let today = date(2024, 6, 10);
        assert!(!is_expiring(Some(date(2024, 6, 11)), true, today));
        assert_eq!(
            classify(Some(date(2024, 6, 11)), true, today),
            ExpiryStatus::Current
        );
    }

    #[test]
    fn past_date_is_expired_regardless_of_acknowledgement() {
        let today = date(2024, 6, 10);
        assert!(is_expired(Some(date(2024, 6, 9)), today));
        assert_eq!(
            classify(Some(date(2024, 6, 9)), true, today),
            ExpiryStatus::Expired
        );
        assert_eq!(
            classify(Some(date(2024, 6, 9)), false, today),
            ExpiryStatus::Expired
        );
    }

    #[test]
    fn date_beyond_window_is_current() {
        let today = date(2024, 6, 10);
        assert_eq!(
            classify(Some(date(2024, 6, 13)), false, today),
            ExpiryStatus::Current
        );
    }

    #[test]
    fn missing_expiry_date_is_current() {
        let today = date(2024, 6, 10);
        assert_eq!(classify(None, false, today), ExpiryStatus::Current);
        assert!(!is_expired(None, today));
    }
}
