use std::fmt;
use std::num::NonZeroU32;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Opaque habit identifier. The API hands out integers, but nothing on the
/// client side depends on that, so both numbers and strings are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct HabitId(String);

impl HabitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for HabitId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Ok(Self(n.to_string())),
            Raw::Str(s) if s.is_empty() => Err(serde::de::Error::custom("empty habit id")),
            Raw::Str(s) => Ok(Self(s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Periodicity {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl fmt::Display for Periodicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    #[serde(alias = "title")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub periodicity: Periodicity,
    #[serde(
        default = "default_frequency",
        alias = "frequency",
        deserialize_with = "target_frequency"
    )]
    pub target_frequency: NonZeroU32,
    #[serde(default)]
    pub reminder: Option<bool>,
    // Only populated by the with-stats listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streak: Option<u32>,
}

fn default_frequency() -> NonZeroU32 {
    NonZeroU32::MIN
}

fn target_frequency<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NonZeroU32, D::Error> {
    match Option::<u32>::deserialize(deserializer)? {
        None => Ok(default_frequency()),
        Some(n) => NonZeroU32::new(n)
            .ok_or_else(|| serde::de::Error::custom("target frequency must be positive")),
    }
}

fn null_as_default<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: Deserialize<'de> + Default,
    D: Deserializer<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitLogEntry {
    pub habit_id: HabitId,
    #[serde(alias = "log_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Remote,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletionStats {
    pub completed: usize,
    pub total: usize,
    pub percentage: u32,
}

impl CompletionStats {
    #[must_use]
    pub fn new(completed: usize, total: usize) -> Self {
        Self {
            completed,
            total,
            percentage: completion_percentage(completed, total),
        }
    }
}

/// `round(100 * completed / total)`, or 0 when there is nothing to complete.
#[must_use]
pub fn completion_percentage(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    ((200 * completed + total) / (2 * total)) as u32
}

/// Everything the dashboard shows for one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub date: NaiveDate,
    pub habits: Vec<Habit>,
    pub entries: Vec<HabitLogEntry>,
    pub source: SnapshotSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Local optimistic edits the server has not confirmed.
    pub pending: usize,
}

impl DashboardSnapshot {
    /// Build a snapshot keeping at most one entry per habit: the last one the
    /// server sent for `date`. Entries for any other date are dropped.
    #[must_use]
    pub fn new(
        date: NaiveDate,
        habits: Vec<Habit>,
        entries: Vec<HabitLogEntry>,
        source: SnapshotSource,
    ) -> Self {
        let mut deduped: Vec<HabitLogEntry> = Vec::with_capacity(entries.len());
        for entry in entries.into_iter().filter(|e| e.date == date) {
            if let Some(existing) = deduped.iter_mut().find(|e| e.habit_id == entry.habit_id) {
                *existing = entry;
            } else {
                deduped.push(entry);
            }
        }
        Self {
            date,
            habits,
            entries: deduped,
            source,
            error: None,
            pending: 0,
        }
    }

    #[must_use]
    pub fn empty(date: NaiveDate) -> Self {
        Self::new(date, Vec::new(), Vec::new(), SnapshotSource::Remote)
    }

    #[must_use]
    pub fn entry(&self, habit_id: &HabitId) -> Option<&HabitLogEntry> {
        self.entries.iter().find(|e| &e.habit_id == habit_id)
    }

    #[must_use]
    pub fn is_completed(&self, habit_id: &HabitId) -> bool {
        self.entry(habit_id).is_some_and(|e| e.completed)
    }

    #[must_use]
    pub fn contains_habit(&self, habit_id: &HabitId) -> bool {
        self.habits.iter().any(|h| &h.id == habit_id)
    }

    /// Set the completion flag for a habit on this snapshot's date, creating
    /// the entry when the server had none.
    pub fn set_completed(&mut self, habit_id: &HabitId, completed: bool) {
        if let Some(entry) = self.entries.iter_mut().find(|e| &e.habit_id == habit_id) {
            entry.completed = completed;
        } else {
            self.entries.push(HabitLogEntry {
                habit_id: habit_id.clone(),
                date: self.date,
                completed,
                notes: None,
            });
        }
    }

    #[must_use]
    pub fn stats(&self) -> CompletionStats {
        let completed = self
            .habits
            .iter()
            .filter(|h| self.is_completed(&h.id))
            .count();
        CompletionStats::new(completed, self.habits.len())
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.pending > 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToggleRequest {
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthUser {
    #[serde(default)]
    pub id: Option<HabitId>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<AuthUser>,
}
