use std::collections::BTreeMap;

use crate::models::{AnswerLabel, HistoryEntry, Outcome, RaterKind};

pub const POSITIVE_POINTS: i64 = 50;
pub const NEGATIVE_POINTS: i64 = -10;

pub fn bucket(label: AnswerLabel) -> Outcome {
    match label {
        AnswerLabel::VeryGood | AnswerLabel::Excellent => Outcome::Positive,
        AnswerLabel::VeryBad | AnswerLabel::Bad => Outcome::Negative,
        AnswerLabel::Regular => Outcome::Neutral,
    }
}

/// Bucket with the strict unique maximum wins; any tie for the maximum is neutral.
/// Computed once when the evaluation is recorded and stored with it.
pub fn classify_answers(answers: &BTreeMap<String, AnswerLabel>) -> Outcome {
    let mut positive = 0usize;
    let mut negative = 0usize;
    let mut neutral = 0usize;

    for label in answers.values() {
        match bucket(*label) {
            Outcome::Positive => positive += 1,
            Outcome::Negative => negative += 1,
            Outcome::Neutral => neutral += 1,
        }
    }

    if positive > negative && positive > neutral {
        Outcome::Positive
    } else if negative > positive && negative > neutral {
        Outcome::Negative
    } else {
        Outcome::Neutral
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregate {
    pub outcome: Outcome,
    pub points: i64,
}

impl Aggregate {
    fn neutral() -> Self {
        Aggregate {
            outcome: Outcome::Neutral,
            points: 0,
        }
    }
}

/// Combines the most recent outcome of each rater kind. A missing kind is not
/// an error: the result is neutral until all three exist.
///
/// The rule table is applied in order, first match wins. Triples containing a
/// neutral fall to a majority vote; the remaining unmatched triples fall to
/// neutral.
pub fn aggregate(
    peer: Option<Outcome>,
    supervisor: Option<Outcome>,
    responsible: Option<Outcome>,
) -> Aggregate {
    use Outcome::{Negative, Neutral, Positive};

    let (Some(peer), Some(supervisor), Some(responsible)) = (peer, supervisor, responsible) else {
        return Aggregate::neutral();
    };

    match (peer, supervisor, responsible) {
        (Positive, Positive, Positive) => Aggregate {
            outcome: Positive,
            points: POSITIVE_POINTS,
        },
        (Positive, Negative, Negative) => Aggregate {
            outcome: Negative,
            points: NEGATIVE_POINTS,
        },
        (Positive, Positive, Negative) => Aggregate::neutral(),
        (Negative, Negative, Negative) => Aggregate {
            outcome: Negative,
            points: NEGATIVE_POINTS,
        },
        (Negative, Positive, Positive) => Aggregate {
            outcome: Positive,
            points: POSITIVE_POINTS,
        },
        (Negative, Positive, Negative) => Aggregate {
            outcome: Negative,
            points: NEGATIVE_POINTS,
        },
        (p, s, r) if p == Neutral || s == Neutral || r == Neutral => majority_vote([p, s, r]),
        _ => Aggregate::neutral(),
    }
}

fn majority_vote(outcomes: [Outcome; 3]) -> Aggregate {
    let positive = outcomes.iter().filter(|o| **o == Outcome::Positive).count();
    let negative = outcomes.iter().filter(|o| **o == Outcome::Negative).count();

    if positive > negative {
        Aggregate {
            outcome: Outcome::Positive,
            points: POSITIVE_POINTS,
        }
    } else if negative > positive {
        Aggregate {
            outcome: Outcome::Negative,
            points: NEGATIVE_POINTS,
        }
    } else {
        Aggregate::neutral()
    }
}

pub fn aggregate_latest(latest: &BTreeMap<RaterKind, Outcome>) -> Aggregate {
    aggregate(
        latest.get(&RaterKind::Peer).copied(),
        latest.get(&RaterKind::Supervisor).copied(),
        latest.get(&RaterKind::Responsible).copied(),
    )
}

/// +10 per positive entry, -3 per negative entry, +1 per every two neutral
/// entries.
pub fn history_contribution(entries: &[HistoryEntry]) -> i64 {
    let positive = entries.iter().filter(|e| e.kind == Outcome::Positive).count() as i64;
    let negative = entries.iter().filter(|e| e.kind == Outcome::Negative).count() as i64;
    let neutral = entries.iter().filter(|e| e.kind == Outcome::Neutral).count() as i64;

    positive * 10 - negative * 3 + neutral / 2
}

pub fn activity_score(aggregate: Aggregate, history: &[HistoryEntry]) -> i64 {
    aggregate.points + history_contribution(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn answers(labels: &[AnswerLabel]) -> BTreeMap<String, AnswerLabel> {
        labels
            .iter()
            .enumerate()
            .map(|(i, label)| (format!("q{i}"), *label))
            .collect()
    }

    fn history_entry(kind: Outcome) -> HistoryEntry {
        HistoryEntry {
            id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            kind,
            note: "annotation".to_string(),
            noted_on: NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date"),
        }
    }

    #[test]
    fn positive_majority_classifies_positive() {
        let answers = answers(&[
            AnswerLabel::Excellent,
            AnswerLabel::VeryGood,
            AnswerLabel::Bad,
        ]);
        assert_eq!(classify_answers(&answers), Outcome::Positive);
    }

    #[test]
    fn negative_majority_classifies_negative() {
        let answers = answers(&[
            AnswerLabel::VeryBad,
            AnswerLabel::Bad,
            AnswerLabel::Excellent,
        ]);
        assert_eq!(classify_answers(&answers), Outcome::Negative);
    }

    #[test]
    fn neutral_majority_classifies_neutral() {
        let answers = answers(&[
            AnswerLabel::Regular,
            AnswerLabel::Regular,
            AnswerLabel::Excellent,
        ]);
        assert_eq!(classify_answers(&answers), Outcome::Neutral);
    }

    #[test]
    fn bucket_tie_defaults_to_neutral() {
        let two_way = answers(&[AnswerLabel::Excellent, AnswerLabel::Bad]);
        assert_eq!(classify_answers(&two_way), Outcome::Neutral);

        let three_way = answers(&[
            AnswerLabel::Excellent,
            AnswerLabel::Bad,
            AnswerLabel::Regular,
        ]);
        assert_eq!(classify_answers(&three_way), Outcome::Neutral);
    }

    #[test]
    fn empty_answer_set_is_neutral() {
        assert_eq!(classify_answers(&BTreeMap::new()), Outcome::Neutral);
    }

    #[test]
    fn unanimous_triples_follow_the_table() {
        use Outcome::{Negative, Positive};

        let all_positive = aggregate(Some(Positive), Some(Positive), Some(Positive));
        assert_eq!(all_positive.outcome, Positive);
        assert_eq!(all_positive.points, 50);

        let all_negative = aggregate(Some(Negative), Some(Negative), Some(Negative));
        assert_eq!(all_negative.outcome, Negative);
        assert_eq!(all_negative.points, -10);
    }

    #[test]
    fn listed_mixed_triples_follow_the_table() {
        use Outcome::{Negative, Neutral, Positive};

        assert_eq!(
            aggregate(Some(Positive), Some(Negative), Some(Negative)),
            Aggregate {
                outcome: Negative,
                points: -10
            }
        );
        assert_eq!(
            aggregate(Some(Positive), Some(Positive), Some(Negative)),
            Aggregate {
                outcome: Neutral,
                points: 0
            }
        );
        assert_eq!(
            aggregate(Some(Negative), Some(Positive), Some(Positive)),
            Aggregate {
                outcome: Positive,
                points: 50
            }
        );
        assert_eq!(
            aggregate(Some(Negative), Some(Positive), Some(Negative)),
            Aggregate {
                outcome: Negative,
                points: -10
            }
        );
    }

    #[test]
    fn missing_rater_kind_yields_neutral_zero() {
        use Outcome::Positive;

        let result = aggregate(Some(Positive), Some(Positive), None);
        assert_eq!(result.outcome, Outcome::Neutral);
        assert_eq!(result.points, 0);

        let empty = aggregate(None, None, None);
        assert_eq!(empty.points, 0);
    }

    #[test]
    fn triples_with_neutral_use_majority_vote() {
        use Outcome::{Negative, Neutral, Positive};

        let positive_lean = aggregate(Some(Positive), Some(Neutral), Some(Positive));
        assert_eq!(positive_lean.outcome, Positive);
        assert_eq!(positive_lean.points, 50);

        let negative_lean = aggregate(Some(Neutral), Some(Negative), Some(Negative));
        assert_eq!(negative_lean.outcome, Negative);
        assert_eq!(negative_lean.points, -10);

        let split = aggregate(Some(Positive), Some(Neutral), Some(Negative));
        assert_eq!(split.outcome, Neutral);
        assert_eq!(split.points, 0);

        let all_neutral = aggregate(Some(Neutral), Some(Neutral), Some(Neutral));
        assert_eq!(all_neutral.outcome, Neutral);
        assert_eq!(all_neutral.points, 0);
    }

    #[test]
    fn unlisted_neutral_free_triples_fall_to_neutral() {
        use Outcome::{Negative, Positive};

        assert_eq!(
            aggregate(Some(Positive), Some(Negative), Some(Positive)),
            Aggregate::neutral()
        );
        assert_eq!(
            aggregate(Some(Negative), Some(Negative), Some(Positive)),
            Aggregate::neutral()
        );
    }

    #[test]
    fn history_contribution_sums_entry_kinds() {
        let entries = vec![
            history_entry(Outcome::Positive),
            history_entry(Outcome::Positive),
            history_entry(Outcome::Negative),
        ];
        assert_eq!(history_contribution(&entries), 17);
    }

    #[test]
    fn neutral_history_entries_floor_by_pairs() {
        let three: Vec<HistoryEntry> = (0..3).map(|_| history_entry(Outcome::Neutral)).collect();
        assert_eq!(history_contribution(&three), 1);

        let four: Vec<HistoryEntry> = (0..4).map(|_| history_entry(Outcome::Neutral)).collect();
        assert_eq!(history_contribution(&four), 2);
    }

    #[test]
    fn activity_score_adds_aggregate_and_history() {
        use Outcome::Positive;

        let aggregate = aggregate(Some(Positive), Some(Positive), Some(Positive));
        let history = vec![history_entry(Outcome::Negative)];
        assert_eq!(activity_score(aggregate, &history), 47);
    }
}
