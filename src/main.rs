use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod complaints;
mod db;
mod error;
mod evaluation;
mod expiry;
mod models;
mod report;
mod schedule;
mod store;

use error::DomainError;
use models::{AnswerLabel, EmployeeRecord, EvaluationRecord, HistoryEntry, Outcome, RaterKind};
use store::PgStore;

#[derive(Parser)]
#[command(name = "staffdesk")]
#[command(about = "Back-office service for internal staff administration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import or update employees from a CSV file
    ImportEmployees {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Record one rater's evaluation of an employee
    Evaluate {
        #[arg(long)]
        employee_email: String,
        #[arg(long)]
        rater_kind: String,
        #[arg(long)]
        rater_name: String,
        #[arg(long)]
        evaluated_on: Option<NaiveDate>,
        #[arg(long = "answer", value_name = "KEY=LABEL")]
        answers: Vec<String>,
        #[arg(long = "note", value_name = "KEY=TEXT")]
        notes: Vec<String>,
        #[arg(long = "recommend", value_name = "KEY=TEXT")]
        recommendations: Vec<String>,
        #[arg(long)]
        feedback: Option<String>,
    },
    /// List an employee's recorded evaluations
    Evaluations {
        #[arg(long)]
        employee_email: String,
    },
    /// Show the scoring summary for one employee
    Score {
        #[arg(long)]
        employee_email: String,
    },
    /// Manage the free-text history log
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
    /// Plan or backfill evaluation request scheduling
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommands,
    },
    /// List agenda entries
    Agenda {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Manage tracked documents
    Documents {
        #[command(subcommand)]
        command: DocumentCommands,
    },
    /// Manage commercial contracts
    Contracts {
        #[command(subcommand)]
        command: ContractCommands,
    },
    /// Cross-module sweep for expiring and expired records
    Expiry {
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Anonymous complaint intake
    Complaints {
        #[command(subcommand)]
        command: ComplaintCommands,
    },
    /// Generate a markdown status report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// Add a history log entry
    Add {
        #[arg(long)]
        employee_email: String,
        #[arg(long)]
        kind: String,
        #[arg(long)]
        note: String,
        #[arg(long)]
        noted_on: Option<NaiveDate>,
    },
    /// List history log entries with their score contribution
    List {
        #[arg(long)]
        employee_email: String,
    },
}

#[derive(Subcommand)]
enum ScheduleCommands {
    /// Create any missing evaluation milestone batches for one employee
    Plan {
        #[arg(long)]
        employee_email: String,
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Backfill scheduling across all active employees
    Sweep {
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum DocumentCommands {
    /// Track a new document
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        employee_email: Option<String>,
        #[arg(long)]
        expires_on: Option<NaiveDate>,
    },
    /// Acknowledge a document's expiry
    Ack {
        #[arg(long)]
        id: Uuid,
    },
    /// List documents with expiry flags
    List {
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum ContractCommands {
    /// Register a commercial contract
    Add {
        #[arg(long)]
        counterparty: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        starts_on: NaiveDate,
        #[arg(long)]
        ends_on: Option<NaiveDate>,
        #[arg(long, default_value_t = 0)]
        value_cents: i64,
    },
    /// Acknowledge a contract's end date
    Ack {
        #[arg(long)]
        id: Uuid,
    },
    /// List contracts with expiry flags
    List {
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum ComplaintCommands {
    /// Submit an anonymous complaint
    Submit {
        #[arg(long)]
        category: String,
        #[arg(long)]
        body: String,
        #[arg(long, default_value = "cli")]
        source: String,
    },
    /// Tail the complaint feed (realtime channel plus polling fallback)
    Watch,
    /// List open complaints, or every complaint with --all
    List {
        #[arg(long)]
        all: bool,
    },
    /// Mark a complaint as reviewed
    Review {
        #[arg(long)]
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportEmployees { csv } => {
            let imported = db::import_employees_csv(&pool, &csv).await?;
            println!("Imported {imported} employees from {}.", csv.display());
        }
        Commands::Evaluate {
            employee_email,
            rater_kind,
            rater_name,
            evaluated_on,
            answers,
            notes,
            recommendations,
            feedback,
        } => {
            let employee = require_employee(&pool, &employee_email).await?;
            let rater_kind: RaterKind = rater_kind.parse()?;
            let choice_answers = parse_answers(&answers)?;
            let outcome = evaluation::classify_answers(&choice_answers);

            let record = EvaluationRecord {
                id: Uuid::new_v4(),
                employee_id: employee.id,
                rater_kind,
                rater_name,
                evaluated_on: evaluated_on.unwrap_or_else(|| Utc::now().date_naive()),
                choice_answers,
                text_answers: parse_pairs(&notes)?,
                recommendations: parse_pairs(&recommendations)?,
                feedback,
                outcome,
            };
            db::insert_evaluation(&pool, &record).await?;
            println!(
                "Recorded {} evaluation of {} by {}: {}.",
                record.rater_kind, employee.full_name, record.rater_name, record.outcome
            );
        }
        Commands::Evaluations { employee_email } => {
            let employee = require_employee(&pool, &employee_email).await?;
            let evaluations = db::fetch_evaluations(&pool, employee.id).await?;

            if evaluations.is_empty() {
                println!("No evaluations recorded for {}.", employee.full_name);
            } else {
                for evaluation in evaluations.iter() {
                    println!(
                        "- {} by {} on {}: {} ({} answers)",
                        evaluation.rater_kind,
                        evaluation.rater_name,
                        evaluation.evaluated_on,
                        evaluation.outcome,
                        evaluation.choice_answers.len()
                    );
                }
            }
        }
        Commands::Score { employee_email } => {
            let employee = require_employee(&pool, &employee_email).await?;
            let latest = db::fetch_latest_outcomes(&pool, employee.id).await?;
            let aggregate = evaluation::aggregate_latest(&latest);
            let history = db::fetch_history(&pool, employee.id).await?;
            let history_points = evaluation::history_contribution(&history);

            println!(
                "Scoring summary for {} ({}), {} in {}:",
                employee.full_name, employee.email, employee.role_title, employee.department
            );
            for kind in RaterKind::ALL {
                match latest.get(&kind) {
                    Some(outcome) => println!("- {kind}: {outcome}"),
                    None => println!("- {kind}: missing"),
                }
            }
            println!(
                "Aggregate: {} ({:+} points) across {} rater kinds.",
                aggregate.outcome,
                aggregate.points,
                latest.len()
            );
            println!("History log: {:+} points across {} entries.", history_points, history.len());
            println!(
                "Activity score: {}.",
                evaluation::activity_score(aggregate, &history)
            );
        }
        Commands::History { command } => match command {
            HistoryCommands::Add {
                employee_email,
                kind,
                note,
                noted_on,
            } => {
                let employee = require_employee(&pool, &employee_email).await?;
                let entry = HistoryEntry {
                    id: Uuid::new_v4(),
                    employee_id: employee.id,
                    kind: kind.parse::<Outcome>()?,
                    note,
                    noted_on: noted_on.unwrap_or_else(|| Utc::now().date_naive()),
                };
                db::insert_history_entry(&pool, &entry).await?;
                println!("History entry recorded for {}.", employee.full_name);
            }
            HistoryCommands::List { employee_email } => {
                let employee = require_employee(&pool, &employee_email).await?;
                let entries = db::fetch_history(&pool, employee.id).await?;

                if entries.is_empty() {
                    println!("No history entries for {}.", employee.full_name);
                } else {
                    for entry in entries.iter() {
                        println!("- {} ({}): {}", entry.noted_on, entry.kind, entry.note);
                    }
                    println!(
                        "Contribution: {:+} points.",
                        evaluation::history_contribution(&entries)
                    );
                }
            }
        },
        Commands::Schedule { command } => match command {
            ScheduleCommands::Plan {
                employee_email,
                as_of,
            } => {
                let employee = require_employee(&pool, &employee_email).await?;
                let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
                let scheduled = plan_for_employee(&pool, &employee, as_of).await?;
                println!(
                    "Scheduled {scheduled} evaluation batch(es) for {}.",
                    employee.full_name
                );
            }
            ScheduleCommands::Sweep { as_of } => {
                let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
                let employees = db::fetch_active_employees(&pool).await?;
                let mut batches = 0usize;
                let mut skipped = 0usize;

                for employee in employees.iter() {
                    if !schedule::is_past_first_period(employee.hire_date, as_of) {
                        skipped += 1;
                        continue;
                    }
                    batches += plan_for_employee(&pool, employee, as_of).await?;
                }

                println!(
                    "Sweep complete: {batches} batch(es) scheduled across {} employees ({skipped} within first period).",
                    employees.len()
                );
            }
        },
        Commands::Agenda { date, category } => {
            let entries = db::fetch_agenda(&pool, date, category.as_deref()).await?;

            if entries.is_empty() {
                println!("No agenda entries match.");
            } else {
                for entry in entries.iter() {
                    let done = if entry.completed { "x" } else { " " };
                    println!(
                        "- [{done}] {} {} {} ({}, {})",
                        entry.entry_date, entry.entry_time, entry.title, entry.category, entry.priority
                    );
                    if !entry.description.is_empty() {
                        println!("      {}", entry.description);
                    }
                    if !entry.participants.is_empty() {
                        println!("      participants: {}", entry.participants.join(", "));
                    }
                    match entry.employee_id {
                        Some(employee_id) => println!(
                            "      created by {} for employee {employee_id}",
                            entry.created_by
                        ),
                        None => println!("      created by {}", entry.created_by),
                    }
                }
            }
        }
        Commands::Documents { command } => match command {
            DocumentCommands::Add {
                title,
                employee_email,
                expires_on,
            } => {
                let employee_id = match employee_email {
                    Some(email) => Some(require_employee(&pool, &email).await?.id),
                    None => None,
                };
                let id = db::insert_document(&pool, &title, employee_id, expires_on).await?;
                println!("Document tracked with id {id}.");
            }
            DocumentCommands::Ack { id } => {
                if db::acknowledge_document(&pool, id).await? {
                    println!("Document {id} acknowledged.");
                } else {
                    println!("No document with id {id}.");
                }
            }
            DocumentCommands::List { as_of } => {
                let today = as_of.unwrap_or_else(|| Utc::now().date_naive());
                let documents = db::fetch_documents(&pool).await?;

                if documents.is_empty() {
                    println!("No documents tracked.");
                }
                for document in documents.iter() {
                    let status = expiry::classify(document.expires_on, document.acknowledged, today);
                    let holder = document
                        .employee_id
                        .map(|id| format!(", employee {id}"))
                        .unwrap_or_default();
                    println!(
                        "- {} [{}] expires {} (id {}{holder})",
                        document.title,
                        status,
                        document
                            .expires_on
                            .map(|d| d.to_string())
                            .unwrap_or_else(|| "never".to_string()),
                        document.id
                    );
                }
            }
        },
        Commands::Contracts { command } => match command {
            ContractCommands::Add {
                counterparty,
                subject,
                starts_on,
                ends_on,
                value_cents,
            } => {
                let id =
                    db::insert_contract(&pool, &counterparty, &subject, starts_on, ends_on, value_cents)
                        .await?;
                println!("Contract registered with id {id}.");
            }
            ContractCommands::Ack { id } => {
                if db::acknowledge_contract(&pool, id).await? {
                    println!("Contract {id} acknowledged.");
                } else {
                    println!("No contract with id {id}.");
                }
            }
            ContractCommands::List { as_of } => {
                let today = as_of.unwrap_or_else(|| Utc::now().date_naive());
                let contracts = db::fetch_contracts(&pool).await?;

                if contracts.is_empty() {
                    println!("No contracts registered.");
                }
                for contract in contracts.iter() {
                    let status = expiry::classify(contract.ends_on, contract.acknowledged, today);
                    println!(
                        "- {} ({}) [{}] {} to {}, {}.{:02} (id {})",
                        contract.counterparty,
                        contract.subject,
                        status,
                        contract.starts_on,
                        contract
                            .ends_on
                            .map(|d| d.to_string())
                            .unwrap_or_else(|| "open-ended".to_string()),
                        contract.value_cents / 100,
                        contract.value_cents % 100,
                        contract.id
                    );
                }
            }
        },
        Commands::Expiry { as_of } => {
            let today = as_of.unwrap_or_else(|| Utc::now().date_naive());
            let documents = db::fetch_documents(&pool).await?;
            let contracts = db::fetch_contracts(&pool).await?;
            let mut flagged = 0usize;

            for document in documents.iter() {
                match expiry::classify(document.expires_on, document.acknowledged, today) {
                    expiry::ExpiryStatus::Current => {}
                    status => {
                        flagged += 1;
                        println!("- document '{}' is {status}", document.title);
                    }
                }
            }
            for contract in contracts.iter() {
                match expiry::classify(contract.ends_on, contract.acknowledged, today) {
                    expiry::ExpiryStatus::Current => {}
                    status => {
                        flagged += 1;
                        println!("- contract with {} is {status}", contract.counterparty);
                    }
                }
            }

            if flagged == 0 {
                println!("Nothing expiring or expired as of {today}.");
            } else {
                let expiring = documents
                    .iter()
                    .filter(|d| expiry::is_expiring(d.expires_on, d.acknowledged, today))
                    .count()
                    + contracts
                        .iter()
                        .filter(|c| expiry::is_expiring(c.ends_on, c.acknowledged, today))
                        .count();
                let expired = documents
                    .iter()
                    .filter(|d| expiry::is_expired(d.expires_on, today))
                    .count()
                    + contracts
                        .iter()
                        .filter(|c| expiry::is_expired(c.ends_on, today))
                        .count();
                println!("{expiring} expiring, {expired} expired as of {today}.");
            }
        }
        Commands::Complaints { command } => match command {
            ComplaintCommands::Submit {
                category,
                body,
                source,
            } => {
                let store = PgStore::new(pool.clone());
                let id = complaints::submit(&pool, &store, &category, &body, &source).await?;
                println!("Complaint received ({id}).");
            }
            ComplaintCommands::Watch => {
                complaints::watch(&pool).await?;
            }
            ComplaintCommands::List { all } => {
                let listed = if all {
                    db::fetch_complaints_since(&pool, None).await?
                } else {
                    db::fetch_open_complaints(&pool).await?
                };

                if listed.is_empty() {
                    println!("No complaints to list.");
                }
                for complaint in listed.iter() {
                    let state = if complaint.reviewed { "reviewed" } else { "open" };
                    println!(
                        "- [{}] [{state}] {}: {} (id {})",
                        complaint.submitted_at.format("%Y-%m-%d %H:%M"),
                        complaint.category,
                        complaint.body,
                        complaint.id
                    );
                }
            }
            ComplaintCommands::Review { id } => {
                if db::mark_complaint_reviewed(&pool, id).await? {
                    println!("Complaint {id} reviewed.");
                } else {
                    println!("No complaint with id {id}.");
                }
            }
        },
        Commands::Report { out } => {
            let today = Utc::now().date_naive();
            let employees = db::fetch_active_employees(&pool).await?;

            let mut scores = Vec::new();
            for employee in employees.iter() {
                let latest = db::fetch_latest_outcomes(&pool, employee.id).await?;
                let history = db::fetch_history(&pool, employee.id).await?;
                if latest.is_empty() && history.is_empty() {
                    continue;
                }
                let aggregate = evaluation::aggregate_latest(&latest);
                let history_points = evaluation::history_contribution(&history);
                scores.push(report::EmployeeScoreLine {
                    full_name: employee.full_name.clone(),
                    email: employee.email.clone(),
                    aggregate,
                    history_points,
                    activity_score: evaluation::activity_score(aggregate, &history),
                });
            }

            let data = report::ReportData {
                today,
                pending_requests: db::fetch_pending_evaluation_requests(&pool).await?,
                documents: db::fetch_documents(&pool).await?,
                contracts: db::fetch_contracts(&pool).await?,
                open_complaints: db::fetch_open_complaints(&pool).await?,
                employees,
                scores,
            };
            std::fs::write(&out, report::build_report(&data))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn require_employee(pool: &PgPool, email: &str) -> anyhow::Result<EmployeeRecord> {
    let employee = db::fetch_employee_by_email(pool, email)
        .await?
        .ok_or_else(|| DomainError::EmployeeNotFound {
            email: email.to_string(),
        })?;

    if !employee.active {
        tracing::warn!(email, "operating on an inactive employee");
    }

    Ok(employee)
}

async fn plan_for_employee(
    pool: &PgPool,
    employee: &EmployeeRecord,
    as_of: NaiveDate,
) -> anyhow::Result<usize> {
    let existing = db::fetch_evaluation_milestones(pool, employee.id).await?;
    let due = schedule::due_milestones(employee.hire_date, &existing, as_of);

    for milestone in due.iter() {
        db::insert_evaluation_batch(pool, employee, *milestone).await?;
    }

    Ok(due.len())
}

fn parse_answers(raw: &[String]) -> anyhow::Result<BTreeMap<String, AnswerLabel>> {
    let mut answers = BTreeMap::new();
    for (key, value) in raw.iter().map(|raw| split_pair(raw)).collect::<Result<Vec<_>, _>>()? {
        answers.insert(key, value.parse::<AnswerLabel>()?);
    }
    Ok(answers)
}

fn parse_pairs(raw: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
    raw.iter()
        .map(|raw| split_pair(raw))
        .collect::<Result<BTreeMap<_, _>, _>>()
        .map_err(Into::into)
}

fn split_pair(raw: &str) -> Result<(String, String), DomainError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(DomainError::MalformedAnswer {
            raw: raw.to_string(),
        }),
    }
}
