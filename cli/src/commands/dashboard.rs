use anyhow::Result;
use std::process;

use ritualist_core::models::HabitId;
use ritualist_core::reconciler::{HabitReconciler, ToggleOutcome};

use super::helpers::{
    SyncArgs, ToggleReport, describe_outcome, json_error, parse_date, print_dashboard,
};
use crate::client::HttpHabitApi;

pub(crate) async fn cmd_dashboard(
    api: HttpHabitApi,
    date: Option<String>,
    sync: &SyncArgs,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let reconciler = HabitReconciler::new(api, sync.options(), date);
    let snapshot = reconciler.set_selected_date(date).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&*snapshot)?);
        return Ok(());
    }

    print_dashboard(&snapshot);
    if snapshot.habits.is_empty() {
        process::exit(2);
    }
    Ok(())
}

pub(crate) async fn cmd_toggle(
    api: HttpHabitApi,
    habit_id: &str,
    date: Option<String>,
    sync: &SyncArgs,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let habit_id = HabitId::new(habit_id);
    let reconciler = HabitReconciler::new(api, sync.options(), date);
    reconciler.set_selected_date(date).await;

    let outcome = reconciler.toggle_completion(&habit_id, date).await;
    let snapshot = reconciler.current();

    if json {
        let report = match &outcome {
            ToggleOutcome::Confirmed(_) => ToggleReport {
                status: "confirmed",
                completed: Some(snapshot.is_completed(&habit_id)),
                message: None,
                snapshot: &snapshot,
            },
            ToggleOutcome::Optimistic { completed, message } => ToggleReport {
                status: "local_only",
                completed: Some(*completed),
                message: Some(message.as_str()),
                snapshot: &snapshot,
            },
            ToggleOutcome::Failed { message } => {
                println!("{}", json_error(message));
                process::exit(2);
            }
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let message = describe_outcome(&outcome);
    if let ToggleOutcome::Failed { .. } = outcome {
        eprintln!("{message}");
        process::exit(2);
    }
    print_dashboard(&snapshot);
    println!("\n{message}");
    Ok(())
}
