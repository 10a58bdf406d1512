use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use ritualist_core::api::{HabitListing, ToggleEndpoint};
use ritualist_core::models::{DashboardSnapshot, SnapshotSource};
use ritualist_core::reconciler::{ReconcilerOptions, ToggleOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum EndpointArg {
    /// POST /habits/{id}/toggle
    Toggle,
    /// POST or DELETE /habits/{id}/complete
    Complete,
}

/// Options shared by every command that loads the dashboard.
#[derive(Debug, Clone, Args)]
pub(crate) struct SyncArgs {
    /// List habits from /habits/with-stats/ (includes streaks)
    #[arg(long)]
    pub with_stats: bool,
    /// Endpoint used to change completion
    #[arg(long, value_enum, default_value = "toggle")]
    pub endpoint: EndpointArg,
}

impl SyncArgs {
    pub(crate) fn options(&self) -> ReconcilerOptions {
        ReconcilerOptions {
            listing: if self.with_stats {
                HabitListing::WithStats
            } else {
                HabitListing::Plain
            },
            toggle_endpoint: match self.endpoint {
                EndpointArg::Toggle => ToggleEndpoint::Toggle,
                EndpointArg::Complete => ToggleEndpoint::Complete,
            },
        }
    }
}

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

pub(crate) fn prompt_line(label: &str) -> Result<String> {
    eprint!("{label}: ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    let line = line.trim().to_string();
    if line.is_empty() {
        bail!("{label} is required");
    }
    Ok(line)
}

pub(crate) fn print_dashboard(snapshot: &DashboardSnapshot) {
    #[derive(Tabled)]
    struct HabitRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Done")]
        done: &'static str,
        #[tabled(rename = "Habit")]
        name: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Every")]
        period: String,
        #[tabled(rename = "Streak")]
        streak: String,
    }

    let date = snapshot.date.format("%a %b %-d, %Y");
    println!("=== {date} ===\n");

    if let Some(error) = &snapshot.error {
        println!("  ! API connection issue: {error}");
        if snapshot.source == SnapshotSource::Fallback {
            println!("    Showing demo data. Please check your API configuration.");
        }
        println!();
    }

    if snapshot.habits.is_empty() {
        println!("  No habits found for this date.");
    } else {
        let rows: Vec<HabitRow> = snapshot
            .habits
            .iter()
            .enumerate()
            .map(|(i, h)| HabitRow {
                idx: i + 1,
                id: truncate(h.id.as_str(), 12),
                done: if snapshot.is_completed(&h.id) {
                    "[x]"
                } else {
                    "[ ]"
                },
                name: truncate(&h.name, 35),
                category: truncate(&h.category, 16),
                period: format!("{}x {}", h.target_frequency, h.periodicity),
                streak: h
                    .streak
                    .map_or_else(|| "-".to_string(), |s| format!("{s}d")),
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::single(6)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    let stats = snapshot.stats();
    let (done, total, pct) = (stats.completed, stats.total, stats.percentage);
    println!("\n  Completed: {done}/{total} ({pct}%)");
    if snapshot.is_stale() {
        let pending = snapshot.pending;
        println!("  STALE: {pending} change(s) not saved on the server. Refresh to resync.");
    }
}

pub(crate) fn describe_outcome(outcome: &ToggleOutcome) -> String {
    match outcome {
        ToggleOutcome::Confirmed(_) => "Saved.".to_string(),
        ToggleOutcome::Optimistic { completed, message } => {
            let state = if *completed { "done" } else { "not done" };
            format!("{message}. Marked {state} locally only.")
        }
        ToggleOutcome::Failed { message } => format!("Could not update habit: {message}"),
    }
}

#[derive(Serialize)]
pub(crate) struct ToggleReport<'a> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'a str>,
    pub snapshot: &'a DashboardSnapshot,
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_none() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
        assert_eq!(
            parse_date(Some("tomorrow".to_string())).unwrap(),
            today + chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2024-01-15".to_string())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope".to_string())).is_err());
    }

    #[test]
    fn test_sync_args_options() {
        let args = SyncArgs {
            with_stats: true,
            endpoint: EndpointArg::Complete,
        };
        let options = args.options();
        assert_eq!(options.listing, HabitListing::WithStats);
        assert_eq!(options.toggle_endpoint, ToggleEndpoint::Complete);
    }

    #[test]
    fn test_describe_outcome() {
        let outcome = ToggleOutcome::Optimistic {
            completed: true,
            message: "Cannot connect to server".into(),
        };
        assert_eq!(
            describe_outcome(&outcome),
            "Cannot connect to server. Marked done locally only."
        );
    }

    #[test]
    fn test_json_error() {
        assert_eq!(json_error("boom"), r#"{"error":"boom"}"#);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
    }
}
