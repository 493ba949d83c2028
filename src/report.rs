use std::fmt::Write;

use chrono::NaiveDate;

use crate::evaluation::Aggregate;
use crate::expiry::{self, ExpiryStatus};
use crate::models::{
    AgendaEntry, ComplaintRecord, ContractRecord, DocumentRecord, EmployeeRecord,
};

pub struct EmployeeScoreLine {
    pub full_name: String,
    pub email: String,
    pub aggregate: Aggregate,
    pub history_points: i64,
    pub activity_score: i64,
}

pub struct ReportData {
    pub today: NaiveDate,
    pub employees: Vec<EmployeeRecord>,
    pub pending_requests: Vec<AgendaEntry>,
    pub scores: Vec<EmployeeScoreLine>,
    pub documents: Vec<DocumentRecord>,
    pub contracts: Vec<ContractRecord>,
    pub open_complaints: Vec<ComplaintRecord>,
}

pub fn build_report(data: &ReportData) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Staffdesk Status Report");
    let _ = writeln!(output, "Generated for {} active employees on {}", data.employees.len(), data.today);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Pending Evaluation Requests");

    if data.pending_requests.is_empty() {
        let _ = writeln!(output, "No evaluation requests outstanding.");
    } else {
        for request in data.pending_requests.iter() {
            let _ = writeln!(
                output,
                "- {} on {} at {} ({})",
                request.title, request.entry_date, request.entry_time, request.entry_kind
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Activity Scores");

    if data.scores.is_empty() {
        let _ = writeln!(output, "No employees with evaluations or history entries.");
    } else {
        for line in data.scores.iter() {
            let _ = writeln!(
                output,
                "- {} ({}) aggregate {} ({:+}), history {:+}, activity score {}",
                line.full_name,
                line.email,
                line.aggregate.outcome,
                line.aggregate.points,
                line.history_points,
                line.activity_score
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Expiring & Expired");

    let mut flagged = 0usize;
    for document in data.documents.iter() {
        match expiry::classify(document.expires_on, document.acknowledged, data.today) {
            ExpiryStatus::Current => {}
            status => {
                flagged += 1;
                let _ = writeln!(
                    output,
                    "- document '{}' is {} ({})",
                    document.title,
                    status,
                    document
                        .expires_on
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "no date".to_string())
                );
            }
        }
    }
    for contract in data.contracts.iter() {
        match expiry::classify(contract.ends_on, contract.acknowledged, data.today) {
            ExpiryStatus::Current => {}
            status => {
                flagged += 1;
                let _ = writeln!(
                    output,
                    "- contract with {} is {} ({})",
                    contract.counterparty,
                    status,
                    contract
                        .ends_on
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "no date".to_string())
                );
            }
        }
    }
    if flagged == 0 {
        let _ = writeln!(output, "Nothing expiring or expired.");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Open Complaints");

    if data.open_complaints.is_empty() {
        let _ = writeln!(output, "No open complaints.");
    } else {
        for complaint in data.open_complaints.iter() {
            let _ = writeln!(
                output,
                "- [{}] {}: {}",
                complaint.submitted_at.format("%Y-%m-%d"),
                complaint.category,
                complaint.body
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation;
    use crate::models::Outcome;
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn empty_data() -> ReportData {
        ReportData {
            today: date(2024, 6, 10),
            employees: Vec::new(),
            pending_requests: Vec::new(),
            scores: Vec::new(),
            documents: Vec::new(),
            contracts: Vec::new(),
            open_complaints: Vec::new(),
        }
    }

    #[test]
    fn empty_report_keeps_all_sections() {
        let report = build_report(&empty_data());
        assert!(report.contains("# Staffdesk Status Report"));
        assert!(report.contains("No evaluation requests outstanding."));
        assert!(report.contains("No employees with evaluations or history entries."));
        assert!(report.contains("Nothing expiring or expired."));
        assert!(report.contains("No open complaints."));
    }

    #[test]
    fn flagged_documents_and_complaints_are_listed() {
        let mut data = empty_data();
        data.documents.push(DocumentRecord {
            id: Uuid::new_v4(),
            title: "Work permit".to_string(),
            employee_id: None,
            expires_on: Some(date(2024, 6, 11)),
            acknowledged: false,
        });
        data.contracts.push(ContractRecord {
            id: Uuid::new_v4(),
            counterparty: "Vetra Logistics".to_string(),
            subject: "Transport".to_string(),
            starts_on: date(2023, 6, 1),
            ends_on: Some(date(2024, 6, 1)),
            value_cents: 100_00,
            acknowledged: true,
        });
        data.open_complaints.push(ComplaintRecord {
            id: Uuid::new_v4(),
            category: "facilities".to_string(),
            body: "Broken lock on floor 2".to_string(),
            submitted_at: Utc
                .with_ymd_and_hms(2024, 6, 9, 16, 30, 0)
                .single()
                .expect("valid timestamp"),
            reviewed: false,
        });
        data.scores.push(EmployeeScoreLine {
            full_name: "Marina Duarte".to_string(),
            email: "marina@staffdesk.dev".to_string(),
            aggregate: evaluation::aggregate(
                Some(Outcome::Positive),
                Some(Outcome::Positive),
                Some(Outcome::Positive),
            ),
            history_points: -3,
            activity_score: 47,
        });

        let report = build_report(&data);
        assert!(report.contains("document 'Work permit' is expiring (2024-06-11)"));
        assert!(report.contains("contract with Vetra Logistics is expired (2024-06-01)"));
        assert!(report.contains("Broken lock on floor 2"));
        assert!(report.contains("aggregate positive (+50), history -3, activity score 47"));
    }
}
