use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use cred_core::records::{appointments_from_json, visits_from_json};
use cred_core::{
    checkup_definitions, reconcile, AppointmentRecord, CheckupStatus, CredSchedule, VisitRecord,
};

#[derive(Parser)]
#[command(name = "cred")]
#[command(about = "CRED well-child checkup scheduler CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the CRED checkup catalog
    Catalog,
    /// Classify a child's schedule against visit and appointment records
    Schedule {
        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        birth_date: NaiveDate,
        /// Reference date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
        /// JSON array of visits: [{"id": "...", "date": "YYYY-MM-DD"}]
        #[arg(long)]
        visits: Option<PathBuf>,
        /// JSON array of appointments: [{"id": "...", "date": "YYYY-MM-DD", "cancelled": false}]
        #[arg(long)]
        appointments: Option<PathBuf>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_visits(path: Option<&Path>) -> anyhow::Result<Vec<VisitRecord>> {
    match path {
        Some(path) => visits_from_json(&read_file(path)?)
            .with_context(|| format!("invalid visits in {}", path.display())),
        None => Ok(Vec::new()),
    }
}

fn load_appointments(path: Option<&Path>) -> anyhow::Result<Vec<AppointmentRecord>> {
    match path {
        Some(path) => appointments_from_json(&read_file(path)?)
            .with_context(|| format!("invalid appointments in {}", path.display())),
        None => Ok(Vec::new()),
    }
}

fn status_label(status: CheckupStatus) -> &'static str {
    match status {
        CheckupStatus::Completed => "completed",
        CheckupStatus::Scheduled => "scheduled",
        CheckupStatus::Overdue => "OVERDUE",
        CheckupStatus::Pending => "pending",
        CheckupStatus::Future => "future",
    }
}

fn print_schedule(schedule: &CredSchedule) {
    println!(
        "Birth date: {}  Today: {}",
        schedule.birth_date, schedule.today
    );
    println!("{:>3}  {:<14} {:<12} {:<10} Matched", "#", "Control", "Target", "Status");
    for item in &schedule.checkups {
        let matched = item
            .matched
            .as_ref()
            .map(|m| format!("{} ({})", m.id(), m.date()))
            .unwrap_or_default();
        println!(
            "{:>3}  {:<14} {:<12} {:<10} {}",
            item.control_number(),
            item.checkup.definition.label,
            item.checkup.target_date.to_string(),
            status_label(item.status),
            matched
        );
    }

    let summary = &schedule.summary;
    let next_due = summary
        .next_due_control()
        .map(|n| n.to_string())
        .unwrap_or_else(|| "none".into());
    println!(
        "Completed: {}/{}  Overdue: {}  Next due: {}",
        summary.completed_count,
        summary.total_count,
        summary.overdue.len(),
        next_due
    );
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Catalog) => {
            for def in checkup_definitions() {
                println!(
                    "{:>2}. {:<14} day {:>4}  {:<14} {:?}",
                    def.control_number, def.label, def.target_age_days, def.age_group, def.phase
                );
            }
        }
        Some(Commands::Schedule {
            birth_date,
            today,
            visits,
            appointments,
            json,
        }) => {
            let visits = load_visits(visits.as_deref())?;
            let appointments = load_appointments(appointments.as_deref())?;
            let today = today.unwrap_or_else(|| chrono::Local::now().date_naive());

            let schedule = reconcile(birth_date, &visits, &appointments, today);
            if json {
                let rendered = serde_json::to_string_pretty(&schedule)
                    .context("failed to serialize schedule")?;
                println!("{rendered}");
            } else {
                print_schedule(&schedule);
            }
        }
        None => {
            println!("Use 'cred --help' for commands");
        }
    }

    Ok(())
}
