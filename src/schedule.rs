use chrono::{Duration, NaiveDate, NaiveTime};

use crate::models::RaterKind;

pub const EVALUATION_CATEGORY: &str = "performance_evaluation";
pub const FIRST_PERIOD_DAYS: i64 = 30;
pub const SECOND_PERIOD_DAYS: i64 = 70;
pub const PERIODIC_DAYS: i64 = 240;

pub fn request_time() -> NaiveTime {
    NaiveTime::from_hms_opt(14, 0, 0).expect("14:00 is a valid time")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationRequest {
    pub rater_kind: RaterKind,
    pub on: NaiveDate,
}

pub fn initial_milestones(hire_date: NaiveDate) -> [NaiveDate; 3] {
    [
        hire_date + Duration::days(FIRST_PERIOD_DAYS),
        hire_date + Duration::days(SECOND_PERIOD_DAYS),
        hire_date + Duration::days(PERIODIC_DAYS),
    ]
}

/// Milestones that should exist as of `as_of` but are absent from `existing`.
///
/// The three initial milestones are created up front at hire, so they are
/// always expected regardless of `as_of`. Later periodic milestones repeat
/// every 240 days after the last one and become expected once their date
/// arrives. Feeding the result back in yields nothing, which is what makes
/// the backfill sweep safe to re-run.
pub fn due_milestones(
    hire_date: NaiveDate,
    existing: &[NaiveDate],
    as_of: NaiveDate,
) -> Vec<NaiveDate> {
    let mut expected = initial_milestones(hire_date).to_vec();

    let mut periodic = hire_date + Duration::days(PERIODIC_DAYS);
    loop {
        let next = periodic + Duration::days(PERIODIC_DAYS);
        if next > as_of {
            break;
        }
        expected.push(next);
        periodic = next;
    }

    expected
        .into_iter()
        .filter(|milestone| !existing.contains(milestone))
        .collect()
}

/// One batch per milestone: peer on the milestone date, supervisor and
/// responsible-party on the two following days, same time of day.
pub fn milestone_requests(milestone: NaiveDate) -> [EvaluationRequest; 3] {
    [
        EvaluationRequest {
            rater_kind: RaterKind::Peer,
            on: milestone,
        },
        EvaluationRequest {
            rater_kind: RaterKind::Supervisor,
            on: milestone + Duration::days(1),
        },
        EvaluationRequest {
            rater_kind: RaterKind::Responsible,
            on: milestone + Duration::days(2),
        },
    ]
}

pub fn is_past_first_period(hire_date: NaiveDate, as_of: NaiveDate) -> bool {
    hire_date + Duration::days(FIRST_PERIOD_DAYS) <= as_of
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn initial_plan_hits_the_three_fixed_offsets() {
        let milestones = initial_milestones(date(2024, 1, 1));
        assert_eq!(
            milestones,
            [date(2024, 1, 31), date(2024, 3, 11), date(2024, 8, 28)]
        );
    }

    #[test]
    fn initial_plan_produces_nine_staggered_requests() {
        let hire = date(2024, 1, 1);
        let due = due_milestones(hire, &[], date(2024, 1, 1));
        assert_eq!(due.len(), 3);

        let requests: Vec<EvaluationRequest> = due
            .iter()
            .flat_map(|milestone| milestone_requests(*milestone))
            .collect();
        assert_eq!(requests.len(), 9);

        for milestone in &due {
            let batch = milestone_requests(*milestone);
            assert_eq!(batch[0].rater_kind, RaterKind::Peer);
            assert_eq!(batch[0].on, *milestone);
            assert_eq!(batch[1].rater_kind, RaterKind::Supervisor);
            assert_eq!(batch[1].on, *milestone + Duration::days(1));
            assert_eq!(batch[2].rater_kind, RaterKind::Responsible);
            assert_eq!(batch[2].on, *milestone + Duration::days(2));
        }
    }

    #[test]
    fn periodic_milestones_recur_every_240_days() {
        let hire = date(2024, 1, 1);

        let before_second_period = due_milestones(hire, &[], date(2025, 4, 24));
        assert_eq!(before_second_period.len(), 3);

        let at_second_period = due_milestones(hire, &[], date(2025, 4, 25));
        assert_eq!(at_second_period.len(), 4);
        assert_eq!(at_second_period[3], date(2025, 4, 25));

        let at_third_period = due_milestones(hire, &[], date(2025, 12, 21));
        assert_eq!(at_third_period.len(), 5);
        assert_eq!(at_third_period[4], date(2025, 12, 21));
    }

    #[test]
    fn existing_milestones_are_not_rescheduled() {
        let hire = date(2024, 1, 1);
        let first_pass = due_milestones(hire, &[], date(2024, 9, 1));
        assert_eq!(first_pass.len(), 3);

        let second_pass = due_milestones(hire, &first_pass, date(2024, 9, 1));
        assert!(second_pass.is_empty());
    }

    #[test]
    fn partial_existing_plan_is_completed() {
        let hire = date(2024, 1, 1);
        let existing = vec![date(2024, 1, 31)];
        let due = due_milestones(hire, &existing, date(2024, 9, 1));
        assert_eq!(due, vec![date(2024, 3, 11), date(2024, 8, 28)]);
    }

    #[test]
    fn first_period_gate() {
        let hire = date(2024, 1, 1);
        assert!(!is_past_first_period(hire, date(2024, 1, 30)));
        assert!(is_past_first_period(hire, date(2024, 1, 31)));
    }
}
