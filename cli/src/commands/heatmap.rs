use anyhow::{Result, bail};
use chrono::{Datelike, NaiveDate};

use ritualist_core::heatmap::{CellState, Heatmap, MAX_HEATMAP_DAYS, load_heatmap};
use ritualist_core::models::HabitId;

use super::helpers::parse_date;
use crate::client::HttpHabitApi;

pub(crate) async fn cmd_heatmap(
    api: &HttpHabitApi,
    habit_id: &str,
    from: Option<String>,
    to: Option<String>,
    days: u32,
    json: bool,
) -> Result<()> {
    let (start, end) = resolve_range(from, to, days)?;
    let map = load_heatmap(api, &HabitId::new(habit_id), start, end).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    println!("=== Habit {habit_id}: {start} to {end} ===\n");
    print!("{}", render_grid(&map));
    let done = map.completed_days();
    let total = map.cells.len();
    let streak = map.current_streak();
    println!("\n  {done}/{total} days completed, current streak: {streak}");
    if map.cells.iter().any(|c| c.state == CellState::Unknown) {
        println!("  ? = could not be loaded");
    }
    Ok(())
}

/// `--from`/`--to` win; otherwise the last `days` days ending at `--to` or today.
fn resolve_range(
    from: Option<String>,
    to: Option<String>,
    days: u32,
) -> Result<(NaiveDate, NaiveDate)> {
    let end = parse_date(to)?;
    let start = match from {
        Some(s) => parse_date(Some(s))?,
        None => {
            if days == 0 || i64::from(days) > MAX_HEATMAP_DAYS {
                bail!("--days must be between 1 and {MAX_HEATMAP_DAYS}");
            }
            end - chrono::Duration::days(i64::from(days) - 1)
        }
    };
    Ok((start, end))
}

/// Weeks as rows, Monday first, like a calendar.
fn render_grid(map: &Heatmap) -> String {
    use std::fmt::Write;

    let mut out = String::from("  Mo  Tu  We  Th  Fr  Sa  Su\n");
    let Some(first) = map.cells.first() else {
        return out;
    };
    let offset = first.date.weekday().num_days_from_monday() as usize;
    let mut line = "    ".repeat(offset);
    for (i, cell) in map.cells.iter().enumerate() {
        let mark = match cell.state {
            CellState::Completed => '#',
            CellState::Missed => '.',
            CellState::Unknown => '?',
        };
        let _ = write!(line, " {mark}{:>2}", cell.date.day());
        if (offset + i + 1) % 7 == 0 {
            out.push_str(&line);
            out.push('\n');
            line.clear();
        }
    }
    if !line.is_empty() {
        out.push_str(&line);
        out.push('\n');
    }
    out
}
