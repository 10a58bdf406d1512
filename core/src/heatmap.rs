use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::api::HabitApi;
use crate::models::HabitId;

pub const MAX_HEATMAP_DAYS: i64 = 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellState {
    Completed,
    Missed,
    /// The logs for that day could not be fetched.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatmapCell {
    pub date: NaiveDate,
    pub state: CellState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heatmap {
    pub habit_id: HabitId,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub cells: Vec<HeatmapCell>,
}

impl Heatmap {
    /// Completed days counted back from `end`; stops at the first day that
    /// is not known to be completed.
    #[must_use]
    pub fn current_streak(&self) -> usize {
        self.cells
            .iter()
            .rev()
            .take_while(|c| c.state == CellState::Completed)
            .count()
    }

    #[must_use]
    pub fn completed_days(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| c.state == CellState::Completed)
            .count()
    }
}

pub fn validate_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        bail!("Start date {start} is after end date {end}");
    }
    let days = (end - start).num_days() + 1;
    if days > MAX_HEATMAP_DAYS {
        bail!("Date range covers {days} days; the maximum is {MAX_HEATMAP_DAYS}");
    }
    Ok(())
}

/// Fetch one habit's completion for every day in `[start, end]`.
///
/// A day whose request fails becomes [`CellState::Unknown`] rather than
/// failing the whole map.
pub async fn load_heatmap(
    api: &dyn HabitApi,
    habit_id: &HabitId,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Heatmap> {
    validate_range(start, end)?;

    let mut cells = Vec::new();
    for date in start.iter_days().take_while(|d| *d <= end) {
        let state = match api.logs_for_date(date).await {
            Ok(entries) => {
                let completed = entries
                    .iter()
                    .rev()
                    .find(|e| &e.habit_id == habit_id && e.date == date)
                    .is_some_and(|e| e.completed);
                if completed {
                    CellState::Completed
                } else {
                    CellState::Missed
                }
            }
            Err(err) => {
                warn!(%date, error = %err, "could not load logs for heatmap day");
                CellState::Unknown
            }
        };
        cells.push(HeatmapCell { date, state });
    }

    Ok(Heatmap {
        habit_id: habit_id.clone(),
        start,
        end,
        cells,
    })
}
