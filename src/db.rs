use std::collections::BTreeMap;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    AgendaEntry, AnswerLabel, ComplaintRecord, ContractRecord, DocumentRecord, EmployeeRecord,
    EvaluationRecord, HistoryEntry, Outcome, RaterKind,
};
use crate::schedule;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let employees = vec![
        (
            Uuid::parse_str("7f3b2a1c-5d88-4a0e-9c2f-1b6a7d4e8f90")?,
            "Marina Duarte",
            "marina.duarte@staffdesk.dev",
            "Operations",
            "Operations Analyst",
            NaiveDate::from_ymd_opt(2024, 1, 1).context("invalid date")?,
        ),
        (
            Uuid::parse_str("2e9c4b7a-13f5-4d6e-8a21-9c0d5e3f7b42")?,
            "Tomas Rocha",
            "tomas.rocha@staffdesk.dev",
            "Commercial",
            "Account Manager",
            NaiveDate::from_ymd_opt(2023, 9, 18).context("invalid date")?,
        ),
        (
            Uuid::parse_str("c81d6f2e-7a94-4b35-b0c8-4f2e9a1d6c73")?,
            "Leticia Prado",
            "leticia.prado@staffdesk.dev",
            "People",
            "HR Coordinator",
            NaiveDate::from_ymd_opt(2024, 3, 4).context("invalid date")?,
        ),
    ];

    for (id, name, email, department, role_title, hire_date) in employees {
        sqlx::query(
            r#"
            INSERT INTO staffdesk.employees (id, full_name, email, department, role_title, hire_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                department = EXCLUDED.department,
                role_title = EXCLUDED.role_title,
                hire_date = EXCLUDED.hire_date,
                updated_at = now()
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(department)
        .bind(role_title)
        .bind(hire_date)
        .execute(pool)
        .await?;
    }

    let documents = vec![
        (
            Uuid::parse_str("a1f08c3d-6b27-49e5-9d14-2c7b8e5a0f61")?,
            "Work permit renewal",
            Some("marina.duarte@staffdesk.dev"),
            NaiveDate::from_ymd_opt(2026, 8, 9).context("invalid date")?,
        ),
        (
            Uuid::parse_str("b4d92e7f-0a5c-4871-bc36-8e1f4d9a2c05")?,
            "Forklift certification",
            Some("tomas.rocha@staffdesk.dev"),
            NaiveDate::from_ymd_opt(2026, 3, 1).context("invalid date")?,
        ),
    ];

    for (id, title, email, expires_on) in documents {
        let employee_id = match email {
            Some(email) => Some(employee_id_by_email(pool, email).await?),
            None => None,
        };
        sqlx::query(
            r#"
            INSERT INTO staffdesk.documents (id, title, employee_id, expires_on)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(employee_id)
        .bind(expires_on)
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO staffdesk.contracts (id, counterparty, subject, starts_on, ends_on, value_cents)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(Uuid::parse_str("d7c53a9e-4f18-4b6a-8d02-5e9c1b7f3a84")?)
    .bind("Vetra Logistics Ltda")
    .bind("Warehouse transport services")
    .bind(NaiveDate::from_ymd_opt(2025, 9, 1).context("invalid date")?)
    .bind(NaiveDate::from_ymd_opt(2026, 8, 31).context("invalid date")?)
    .bind(18_500_00i64)
    .execute(pool)
    .await?;

    let history = vec![
        (
            Uuid::parse_str("e2a84f1b-9c60-4d27-b53e-7f0a6d3c8e19")?,
            "marina.duarte@staffdesk.dev",
            Outcome::Positive,
            "Led the quarterly inventory closing without discrepancies",
            NaiveDate::from_ymd_opt(2026, 5, 12).context("invalid date")?,
        ),
        (
            Uuid::parse_str("f9b16d4a-3e75-42c8-a0d9-1c8e5f2b7a36")?,
            "tomas.rocha@staffdesk.dev",
            Outcome::Neutral,
            "Requested transfer to the afternoon shift",
            NaiveDate::from_ymd_opt(2026, 6, 2).context("invalid date")?,
        ),
    ];

    for (id, email, kind, note, noted_on) in history {
        let employee_id = employee_id_by_email(pool, email).await?;
        sqlx::query(
            r#"
            INSERT INTO staffdesk.history_entries (id, employee_id, kind, note, noted_on)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(employee_id)
        .bind(kind.as_str())
        .bind(note)
        .bind(noted_on)
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn employee_id_by_email(pool: &PgPool, email: &str) -> anyhow::Result<Uuid> {
    let row = sqlx::query("SELECT id FROM staffdesk.employees WHERE email = $1")
        .bind(email)
        .fetch_one(pool)
        .await
        .with_context(|| format!("no employee with email {email}"))?;
    Ok(row.get("id"))
}

pub async fn fetch_employee_by_email(
    pool: &PgPool,
    email: &str,
) -> anyhow::Result<Option<EmployeeRecord>> {
    let row = sqlx::query(
        "SELECT id, full_name, email, department, role_title, hire_date, active \
         FROM staffdesk.employees WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    row.map(|row| employee_from_row(&row)).transpose()
}

pub async fn fetch_active_employees(pool: &PgPool) -> anyhow::Result<Vec<EmployeeRecord>> {
    let rows = sqlx::query(
        "SELECT id, full_name, email, department, role_title, hire_date, active \
         FROM staffdesk.employees WHERE active ORDER BY full_name",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(employee_from_row).collect()
}

fn employee_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<EmployeeRecord> {
    Ok(EmployeeRecord {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        department: row.try_get("department")?,
        role_title: row.try_get("role_title")?,
        hire_date: row.try_get("hire_date")?,
        active: row.try_get("active")?,
    })
}

pub async fn import_employees_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        email: String,
        department: String,
        role_title: String,
        hire_date: NaiveDate,
        active: Option<bool>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut imported = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        sqlx::query(
            r#"
            INSERT INTO staffdesk.employees
            (id, full_name, email, department, role_title, hire_date, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                department = EXCLUDED.department,
                role_title = EXCLUDED.role_title,
                hire_date = EXCLUDED.hire_date,
                active = EXCLUDED.active,
                updated_at = now()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.full_name)
        .bind(&row.email)
        .bind(&row.department)
        .bind(&row.role_title)
        .bind(row.hire_date)
        .bind(row.active.unwrap_or(true))
        .execute(pool)
        .await?;

        imported += 1;
    }

    Ok(imported)
}

// Evaluations are insert-only; there is no update or delete path.
pub async fn insert_evaluation(pool: &PgPool, evaluation: &EvaluationRecord) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO staffdesk.evaluations
        (id, employee_id, rater_kind, rater_name, evaluated_on,
         choice_answers, text_answers, recommendations, feedback, outcome)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(evaluation.id)
    .bind(evaluation.employee_id)
    .bind(evaluation.rater_kind.as_str())
    .bind(&evaluation.rater_name)
    .bind(evaluation.evaluated_on)
    .bind(Json(&evaluation.choice_answers))
    .bind(Json(&evaluation.text_answers))
    .bind(Json(&evaluation.recommendations))
    .bind(evaluation.feedback.as_deref())
    .bind(evaluation.outcome.as_str())
    .execute(pool)
    .await
    .context("failed to insert evaluation")?;

    Ok(())
}

pub async fn fetch_latest_outcomes(
    pool: &PgPool,
    employee_id: Uuid,
) -> anyhow::Result<BTreeMap<RaterKind, Outcome>> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT ON (rater_kind) rater_kind, outcome
        FROM staffdesk.evaluations
        WHERE employee_id = $1
        ORDER BY rater_kind, evaluated_on DESC, created_at DESC
        "#,
    )
    .bind(employee_id)
    .fetch_all(pool)
    .await?;

    let mut latest = BTreeMap::new();
    for row in rows {
        let kind: RaterKind = row.try_get::<String, _>("rater_kind")?.parse()?;
        let outcome: Outcome = row.try_get::<String, _>("outcome")?.parse()?;
        latest.insert(kind, outcome);
    }

    Ok(latest)
}

pub async fn insert_history_entry(pool: &PgPool, entry: &HistoryEntry) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO staffdesk.history_entries (id, employee_id, kind, note, noted_on)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(entry.id)
    .bind(entry.employee_id)
    .bind(entry.kind.as_str())
    .bind(&entry.note)
    .bind(entry.noted_on)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn fetch_history(pool: &PgPool, employee_id: Uuid) -> anyhow::Result<Vec<HistoryEntry>> {
    let rows = sqlx::query(
        "SELECT id, employee_id, kind, note, noted_on \
         FROM staffdesk.history_entries WHERE employee_id = $1 ORDER BY noted_on",
    )
    .bind(employee_id)
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(HistoryEntry {
            id: row.try_get("id")?,
            employee_id: row.try_get("employee_id")?,
            kind: row.try_get::<String, _>("kind")?.parse()?,
            note: row.try_get("note")?,
            noted_on: row.try_get("noted_on")?,
        });
    }

    Ok(entries)
}

/// One milestone batch is one transaction: all three requests land or none do.
pub async fn insert_evaluation_batch(
    pool: &PgPool,
    employee: &EmployeeRecord,
    milestone: NaiveDate,
) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;

    for request in schedule::milestone_requests(milestone) {
        sqlx::query(
            r#"
            INSERT INTO staffdesk.agenda_entries
            (id, title, description, entry_date, entry_time, participants,
             category, priority, completed, created_by, entry_kind, employee_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, $9, $10, $11)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(format!(
            "Performance evaluation ({}) - {}",
            request.rater_kind, employee.full_name
        ))
        .bind(format!(
            "{} evaluation request for {} ({})",
            request.rater_kind, employee.full_name, employee.email
        ))
        .bind(request.on)
        .bind(schedule::request_time())
        .bind(vec![employee.full_name.clone()])
        .bind(schedule::EVALUATION_CATEGORY)
        .bind("high")
        .bind("staffdesk-scheduler")
        .bind(request.rater_kind.as_str())
        .bind(employee.id)
        .execute(&mut *tx)
        .await
        .with_context(|| {
            format!(
                "failed to schedule {} evaluation request for {}",
                request.rater_kind, employee.email
            )
        })?;
    }

    tx.commit().await?;
    Ok(())
}

/// The peer request carries the milestone date, so its dates enumerate the
/// batches already scheduled for an employee.
pub async fn fetch_evaluation_milestones(
    pool: &PgPool,
    employee_id: Uuid,
) -> anyhow::Result<Vec<NaiveDate>> {
    let rows = sqlx::query(
        r#"
        SELECT entry_date FROM staffdesk.agenda_entries
        WHERE employee_id = $1 AND category = $2 AND entry_kind = $3
        ORDER BY entry_date
        "#,
    )
    .bind(employee_id)
    .bind(schedule::EVALUATION_CATEGORY)
    .bind(RaterKind::Peer.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| row.try_get("entry_date").map_err(Into::into))
        .collect()
}

pub async fn fetch_agenda(
    pool: &PgPool,
    date: Option<NaiveDate>,
    category: Option<&str>,
) -> anyhow::Result<Vec<AgendaEntry>> {
    let mut query = String::from(
        "SELECT id, title, description, entry_date, entry_time, participants, \
         category, priority, completed, created_by, entry_kind, employee_id \
         FROM staffdesk.agenda_entries WHERE TRUE",
    );

    let mut bind_index = 0;
    if date.is_some() {
        bind_index += 1;
        query.push_str(&format!(" AND entry_date = ${bind_index}"));
    }
    if category.is_some() {
        bind_index += 1;
        query.push_str(&format!(" AND category = ${bind_index}"));
    }
    query.push_str(" ORDER BY entry_date, entry_time");

    let mut rows = sqlx::query(&query);
    if let Some(date) = date {
        rows = rows.bind(date);
    }
    if let Some(category) = category {
        rows = rows.bind(category);
    }

    let records = rows.fetch_all(pool).await?;
    let mut entries = Vec::new();

    for row in records {
        entries.push(agenda_from_row(&row)?);
    }

    Ok(entries)
}

pub async fn fetch_pending_evaluation_requests(pool: &PgPool) -> anyhow::Result<Vec<AgendaEntry>> {
    let rows = sqlx::query(
        "SELECT id, title, description, entry_date, entry_time, participants, \
         category, priority, completed, created_by, entry_kind, employee_id \
         FROM staffdesk.agenda_entries \
         WHERE category = $1 AND NOT completed ORDER BY entry_date",
    )
    .bind(schedule::EVALUATION_CATEGORY)
    .fetch_all(pool)
    .await?;

    rows.iter().map(agenda_from_row).collect()
}

fn agenda_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<AgendaEntry> {
    Ok(AgendaEntry {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        entry_date: row.try_get("entry_date")?,
        entry_time: row.try_get("entry_time")?,
        participants: row.try_get("participants")?,
        category: row.try_get("category")?,
        priority: row.try_get("priority")?,
        completed: row.try_get("completed")?,
        created_by: row.try_get("created_by")?,
        entry_kind: row.try_get("entry_kind")?,
        employee_id: row.try_get("employee_id")?,
    })
}

pub async fn insert_document(
    pool: &PgPool,
    title: &str,
    employee_id: Option<Uuid>,
    expires_on: Option<NaiveDate>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO staffdesk.documents (id, title, employee_id, expires_on) VALUES ($1, $2, $3, $4)",
    )
    .bind(id)
    .bind(title)
    .bind(employee_id)
    .bind(expires_on)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn acknowledge_document(pool: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("UPDATE staffdesk.documents SET acknowledged = TRUE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_documents(pool: &PgPool) -> anyhow::Result<Vec<DocumentRecord>> {
    let rows = sqlx::query(
        "SELECT id, title, employee_id, expires_on, acknowledged \
         FROM staffdesk.documents ORDER BY expires_on NULLS LAST, title",
    )
    .fetch_all(pool)
    .await?;

    let mut documents = Vec::new();
    for row in rows {
        documents.push(DocumentRecord {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            employee_id: row.try_get("employee_id")?,
            expires_on: row.try_get("expires_on")?,
            acknowledged: row.try_get("acknowledged")?,
        });
    }

    Ok(documents)
}

pub async fn insert_contract(
    pool: &PgPool,
    counterparty: &str,
    subject: &str,
    starts_on: NaiveDate,
    ends_on: Option<NaiveDate>,
    value_cents: i64,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO staffdesk.contracts (id, counterparty, subject, starts_on, ends_on, value_cents)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(counterparty)
    .bind(subject)
    .bind(starts_on)
    .bind(ends_on)
    .bind(value_cents)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn acknowledge_contract(pool: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("UPDATE staffdesk.contracts SET acknowledged = TRUE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_contracts(pool: &PgPool) -> anyhow::Result<Vec<ContractRecord>> {
    let rows = sqlx::query(
        "SELECT id, counterparty, subject, starts_on, ends_on, value_cents, acknowledged \
         FROM staffdesk.contracts ORDER BY ends_on NULLS LAST, counterparty",
    )
    .fetch_all(pool)
    .await?;

    let mut contracts = Vec::new();
    for row in rows {
        contracts.push(ContractRecord {
            id: row.try_get("id")?,
            counterparty: row.try_get("counterparty")?,
            subject: row.try_get("subject")?,
            starts_on: row.try_get("starts_on")?,
            ends_on: row.try_get("ends_on")?,
            value_cents: row.try_get("value_cents")?,
            acknowledged: row.try_get("acknowledged")?,
        });
    }

    Ok(contracts)
}

pub async fn insert_complaint(pool: &PgPool, category: &str, body: &str) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO staffdesk.complaints (id, category, body) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(category)
        .bind(body)
        .execute(pool)
        .await
        .context("failed to insert complaint")?;
    Ok(id)
}

pub async fn fetch_open_complaints(pool: &PgPool) -> anyhow::Result<Vec<ComplaintRecord>> {
    let rows = sqlx::query(
        "SELECT id, category, body, submitted_at, reviewed \
         FROM staffdesk.complaints WHERE NOT reviewed ORDER BY submitted_at",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(complaint_from_row).collect()
}

pub async fn fetch_complaints_since(
    pool: &PgPool,
    since: Option<DateTime<Utc>>,
) -> anyhow::Result<Vec<ComplaintRecord>> {
    let mut query = String::from(
        "SELECT id, category, body, submitted_at, reviewed FROM staffdesk.complaints",
    );
    if since.is_some() {
        query.push_str(" WHERE submitted_at > $1");
    }
    query.push_str(" ORDER BY submitted_at");

    let mut rows = sqlx::query(&query);
    if let Some(since) = since {
        rows = rows.bind(since);
    }

    let records = rows.fetch_all(pool).await?;
    records.iter().map(complaint_from_row).collect()
}

pub async fn mark_complaint_reviewed(pool: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("UPDATE staffdesk.complaints SET reviewed = TRUE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn complaint_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<ComplaintRecord> {
    Ok(ComplaintRecord {
        id: row.try_get("id")?,
        category: row.try_get("category")?,
        body: row.try_get("body")?,
        submitted_at: row.try_get("submitted_at")?,
        reviewed: row.try_get("reviewed")?,
    })
}

pub async fn fetch_evaluations(
    pool: &PgPool,
    employee_id: Uuid,
) -> anyhow::Result<Vec<EvaluationRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, employee_id, rater_kind, rater_name, evaluated_on,
               choice_answers, text_answers, recommendations, feedback, outcome
        FROM staffdesk.evaluations
        WHERE employee_id = $1
        ORDER BY evaluated_on DESC, created_at DESC
        "#,
    )
    .bind(employee_id)
    .fetch_all(pool)
    .await?;

    let mut evaluations = Vec::new();
    for row in rows {
        let choice_answers: Json<BTreeMap<String, AnswerLabel>> = row.try_get("choice_answers")?;
        let text_answers: Json<BTreeMap<String, String>> = row.try_get("text_answers")?;
        let recommendations: Json<BTreeMap<String, String>> = row.try_get("recommendations")?;

        evaluations.push(EvaluationRecord {
            id: row.try_get("id")?,
            employee_id: row.try_get("employee_id")?,
            rater_kind: row.try_get::<String, _>("rater_kind")?.parse()?,
            rater_name: row.try_get("rater_name")?,
            evaluated_on: row.try_get("evaluated_on")?,
            choice_answers: choice_answers.0,
            text_answers: text_answers.0,
            recommendations: recommendations.0,
            feedback: row.try_get("feedback")?,
            outcome: row.try_get::<String, _>("outcome")?.parse()?,
        });
    }

    Ok(evaluations)
}
