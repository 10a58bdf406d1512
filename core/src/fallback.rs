//! Static demo content shown when the API cannot be reached.

use std::num::NonZeroU32;

use chrono::NaiveDate;

use crate::models::{
    DashboardSnapshot, Habit, HabitId, HabitLogEntry, Periodicity, SnapshotSource,
};

const DEMO_HABITS: [(&str, &str, &str, &str, bool, u32); 3] = [
    (
        "1",
        "Drink 8 glasses of water",
        "Stay hydrated throughout the day",
        "Health",
        false,
        5,
    ),
    (
        "2",
        "30 minutes exercise",
        "Any form of physical activity",
        "Fitness",
        true,
        12,
    ),
    (
        "3",
        "Read for 20 minutes",
        "Reading books or articles",
        "Learning",
        false,
        3,
    ),
];

/// The demo data set for `date`. Always the same content, never merged with
/// anything fetched earlier.
#[must_use]
pub fn demo_snapshot(date: NaiveDate, reason: String) -> DashboardSnapshot {
    let habits = DEMO_HABITS
        .iter()
        .map(|&(id, name, description, category, _, streak)| Habit {
            id: HabitId::new(id),
            name: name.to_string(),
            description: Some(description.to_string()),
            category: category.to_string(),
            periodicity: Periodicity::Daily,
            target_frequency: NonZeroU32::MIN,
            reminder: None,
            streak: Some(streak),
        })
        .collect();
    let entries = DEMO_HABITS
        .iter()
        .map(|&(id, _, _, _, completed, _)| HabitLogEntry {
            habit_id: HabitId::new(id),
            date,
            completed,
            notes: None,
        })
        .collect();

    let mut snapshot = DashboardSnapshot::new(date, habits, entries, SnapshotSource::Fallback);
    snapshot.error = Some(reason);
    snapshot
}
