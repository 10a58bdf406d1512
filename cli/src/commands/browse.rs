use anyhow::Result;
use chrono::NaiveDate;
use std::io::{self, BufRead, Write};

use ritualist_core::models::HabitId;
use ritualist_core::reconciler::HabitReconciler;

use super::helpers::{SyncArgs, describe_outcome, parse_date, print_dashboard};
use crate::client::HttpHabitApi;

const HELP: &str = "\
  n, next           next day
  p, prev           previous day
  d <date>          jump to a date (YYYY-MM-DD, today, yesterday)
  t <id|#>          toggle a habit by ID or row number
  r, refresh        reload from the server
  h, help           this help
  q, quit           exit";

#[derive(Debug, PartialEq, Eq)]
enum BrowseCommand {
    Next,
    Prev,
    Jump(String),
    Toggle(String),
    Refresh,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Option<BrowseCommand> {
    let mut parts = line.split_whitespace();
    let cmd = parts.next()?;
    let arg = parts.next().map(str::to_string);
    match (cmd, arg) {
        ("n" | "next", None) => Some(BrowseCommand::Next),
        ("p" | "prev", None) => Some(BrowseCommand::Prev),
        ("d" | "date", Some(date)) => Some(BrowseCommand::Jump(date)),
        ("t" | "toggle", Some(id)) => Some(BrowseCommand::Toggle(id)),
        ("r" | "refresh", None) => Some(BrowseCommand::Refresh),
        ("h" | "help" | "?", None) => Some(BrowseCommand::Help),
        ("q" | "quit" | "exit", None) => Some(BrowseCommand::Quit),
        _ => None,
    }
}

/// Row numbers shown in the table map back to habit IDs.
fn resolve_habit(reconciler: &HabitReconciler<HttpHabitApi>, target: &str) -> HabitId {
    let snapshot = reconciler.current();
    let id = HabitId::new(target);
    if snapshot.contains_habit(&id) {
        return id;
    }
    target
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| snapshot.habits.get(i))
        .map_or(id, |h| h.id.clone())
}

pub(crate) async fn cmd_browse(
    api: HttpHabitApi,
    date: Option<String>,
    sync: &SyncArgs,
) -> Result<()> {
    let date = parse_date(date)?;
    let reconciler = HabitReconciler::new(api, sync.options(), date);
    let snapshot = reconciler.set_selected_date(date).await;
    print_dashboard(&snapshot);
    println!("\nType 'h' for help.");

    let stdin = io::stdin();
    loop {
        eprint!("> ");
        io::stderr().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let Some(command) = parse_command(&line) else {
            eprintln!("Unknown command. Type 'h' for help.");
            continue;
        };

        let selected = reconciler.selected_date();
        match command {
            BrowseCommand::Next => show(&reconciler, selected + chrono::Duration::days(1)).await,
            BrowseCommand::Prev => show(&reconciler, selected - chrono::Duration::days(1)).await,
            BrowseCommand::Jump(raw) => match parse_date(Some(raw)) {
                Ok(date) => show(&reconciler, date).await,
                Err(e) => eprintln!("{e}"),
            },
            BrowseCommand::Toggle(target) => {
                let habit_id = resolve_habit(&reconciler, &target);
                let outcome = reconciler.toggle_completion(&habit_id, selected).await;
                print_dashboard(&reconciler.current());
                println!("\n{}", describe_outcome(&outcome));
            }
            BrowseCommand::Refresh => {
                let snapshot = reconciler.refresh().await;
                print_dashboard(&snapshot);
            }
            BrowseCommand::Help => println!("{HELP}"),
            BrowseCommand::Quit => break,
        }
    }
    Ok(())
}

async fn show(reconciler: &HabitReconciler<HttpHabitApi>, date: NaiveDate) {
    let snapshot = reconciler.set_selected_date(date).await;
    print_dashboard(&snapshot);
}
