use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaterKind {
    Peer,
    Supervisor,
    Responsible,
}

impl RaterKind {
    pub const ALL: [RaterKind; 3] = [RaterKind::Peer, RaterKind::Supervisor, RaterKind::Responsible];

    pub fn as_str(self) -> &'static str {
        match self {
            RaterKind::Peer => "peer",
            RaterKind::Supervisor => "supervisor",
            RaterKind::Responsible => "responsible",
        }
    }
}

impl fmt::Display for RaterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RaterKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "peer" => Ok(RaterKind::Peer),
            "supervisor" => Ok(RaterKind::Supervisor),
            "responsible" | "responsible-party" => Ok(RaterKind::Responsible),
            _ => Err(DomainError::UnknownRaterKind {
                value: s.to_string(),
            }),
        }
    }
}

/// Five-point ordinal answer scale, worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerLabel {
    VeryBad,
    Bad,
    Regular,
    VeryGood,
    Excellent,
}

impl AnswerLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            AnswerLabel::VeryBad => "very_bad",
            AnswerLabel::Bad => "bad",
            AnswerLabel::Regular => "regular",
            AnswerLabel::VeryGood => "very_good",
            AnswerLabel::Excellent => "excellent",
        }
    }
}

impl fmt::Display for AnswerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerLabel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "very_bad" => Ok(AnswerLabel::VeryBad),
            "bad" => Ok(AnswerLabel::Bad),
            "regular" => Ok(AnswerLabel::Regular),
            "very_good" => Ok(AnswerLabel::VeryGood),
            "excellent" => Ok(AnswerLabel::Excellent),
            _ => Err(DomainError::UnknownAnswerLabel {
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Positive,
    Negative,
    Neutral,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Positive => "positive",
            Outcome::Negative => "negative",
            Outcome::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "positive" => Ok(Outcome::Positive),
            "negative" => Ok(Outcome::Negative),
            "neutral" => Ok(Outcome::Neutral),
            _ => Err(DomainError::UnknownOutcome {
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmployeeRecord {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub department: String,
    pub role_title: String,
    pub hire_date: NaiveDate,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct EvaluationRecord {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub rater_kind: RaterKind,
    pub rater_name: String,
    pub evaluated_on: NaiveDate,
    pub choice_answers: BTreeMap<String, AnswerLabel>,
    pub text_answers: BTreeMap<String, String>,
    pub recommendations: BTreeMap<String, String>,
    pub feedback: Option<String>,
    pub outcome: Outcome,
}

#[derive(Debug, Clone)]
pub struct AgendaEntry {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub entry_date: NaiveDate,
    pub entry_time: NaiveTime,
    pub participants: Vec<String>,
    pub category: String,
    pub priority: String,
    pub completed: bool,
    pub created_by: String,
    pub entry_kind: String,
    pub employee_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub kind: Outcome,
    pub note: String,
    pub noted_on: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub title: String,
    pub employee_id: Option<Uuid>,
    pub expires_on: Option<NaiveDate>,
    pub acknowledged: bool,
}

#[derive(Debug, Clone)]
pub struct ContractRecord {
    pub id: Uuid,
    pub counterparty: String,
    pub subject: String,
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
    pub value_cents: i64,
    pub acknowledged: bool,
}

#[derive(Debug, Clone)]
pub struct ComplaintRecord {
    pub id: Uuid,
    pub category: String,
    pub body: String,
    pub submitted_at: DateTime<Utc>,
    pub reviewed: bool,
}
