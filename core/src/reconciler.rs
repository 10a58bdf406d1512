use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{HabitApi, HabitListing, ToggleEndpoint};
use crate::error::ApiError;
use crate::fallback::demo_snapshot;
use crate::models::{
    DashboardSnapshot, Habit, HabitId, HabitLogEntry, SnapshotSource, ToggleRequest,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcilerOptions {
    pub listing: HabitListing,
    pub toggle_endpoint: ToggleEndpoint,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    /// The server accepted the change; carries the reloaded snapshot.
    Confirmed(Arc<DashboardSnapshot>),
    /// The server call failed and the flag was flipped locally only.
    Optimistic { completed: bool, message: String },
    /// The server call failed and the habit is not on screen for that date.
    Failed { message: String },
}

/// A local flip the server has not confirmed.
#[derive(Debug, Clone)]
struct PendingEdit {
    habit_id: HabitId,
    date: NaiveDate,
    completed: bool,
    /// Sequence number of the newest load issued when the edit was made.
    issued_at: u64,
}

struct State {
    selected: NaiveDate,
    issued: u64,
    applied: u64,
    pending: Vec<PendingEdit>,
    current: Arc<DashboardSnapshot>,
}

/// Keeps the dashboard for the selected date in line with the server.
///
/// Every load is numbered when issued. A result is only published if it is
/// for the date still selected and newer than what is on screen, so a slow
/// response for an old date can never replace a fresh one. Failed toggles
/// are applied locally and count as pending until a reload issued after them
/// lands.
pub struct HabitReconciler<A> {
    api: A,
    options: ReconcilerOptions,
    state: Mutex<State>,
    tx: watch::Sender<Arc<DashboardSnapshot>>,
}

impl<A: HabitApi> HabitReconciler<A> {
    pub fn new(api: A, options: ReconcilerOptions, date: NaiveDate) -> Self {
        let current = Arc::new(DashboardSnapshot::empty(date));
        let (tx, _rx) = watch::channel(Arc::clone(&current));
        Self {
            api,
            options,
            state: Mutex::new(State {
                selected: date,
                issued: 0,
                applied: 0,
                pending: Vec::new(),
                current,
            }),
            tx,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// The snapshot most recently published to the view.
    pub fn current(&self) -> Arc<DashboardSnapshot> {
        Arc::clone(&self.lock().current)
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<DashboardSnapshot>> {
        self.tx.subscribe()
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.lock().selected
    }

    /// Fetch habits and logs for `date`.
    ///
    /// Never fails: any API error yields the demo data set with the reason in
    /// `error`. The returned snapshot is what was loaded for `date`; it is
    /// published only if `date` is still selected and nothing newer is shown.
    pub async fn load_for_date(&self, date: NaiveDate) -> Arc<DashboardSnapshot> {
        let seq = {
            let mut state = self.lock();
            state.issued += 1;
            state.issued
        };
        debug!(%date, seq, "loading habits");

        let snapshot = match self.fetch(date).await {
            Ok((habits, entries)) => {
                DashboardSnapshot::new(date, habits, entries, SnapshotSource::Remote)
            }
            Err(err) => {
                warn!(%date, error = %err, "habit fetch failed, showing demo data");
                demo_snapshot(
                    date,
                    format!("Failed to fetch habits: {}", err.user_message()),
                )
            }
        };

        self.apply(seq, snapshot)
    }

    /// Select `date` and load it. Returns whatever is on screen afterwards.
    pub async fn set_selected_date(&self, date: NaiveDate) -> Arc<DashboardSnapshot> {
        self.lock().selected = date;
        self.load_for_date(date).await;
        self.current()
    }

    /// Reload the selected date. This is what ends the staleness window.
    pub async fn refresh(&self) -> Arc<DashboardSnapshot> {
        let date = self.selected_date();
        self.load_for_date(date).await;
        self.current()
    }

    pub async fn toggle_completion(&self, habit_id: &HabitId, date: NaiveDate) -> ToggleOutcome {
        let request = ToggleRequest { date, notes: None };
        let result = match self.options.toggle_endpoint {
            ToggleEndpoint::Toggle => self.api.toggle(habit_id, &request).await,
            ToggleEndpoint::Complete => {
                if self.shown_completion(habit_id, date).unwrap_or(false) {
                    self.api.uncomplete(habit_id, date).await
                } else {
                    self.api.complete(habit_id, &request).await
                }
            }
        };

        match result {
            Ok(()) => {
                info!(%habit_id, %date, "toggle confirmed, resyncing");
                ToggleOutcome::Confirmed(self.load_for_date(date).await)
            }
            Err(err) => self.flip_locally(habit_id, date, &err),
        }
    }

    async fn fetch(&self, date: NaiveDate) -> Result<(Vec<Habit>, Vec<HabitLogEntry>), ApiError> {
        tokio::try_join!(
            self.api.list_habits(self.options.listing),
            self.api.logs_for_date(date)
        )
    }

    fn apply(&self, seq: u64, mut snapshot: DashboardSnapshot) -> Arc<DashboardSnapshot> {
        let mut state = self.lock();
        if snapshot.date != state.selected || seq <= state.applied {
            debug!(
                date = %snapshot.date,
                selected = %state.selected,
                seq,
                applied = state.applied,
                "discarding out-of-date load"
            );
            return Arc::new(snapshot);
        }

        if snapshot.source == SnapshotSource::Fallback {
            // Demo data is shown as is; local flips of real habits do not carry over.
            state.pending.clear();
        } else {
            // Edits made before this load was issued are superseded by it.
            state.pending.retain(|e| e.issued_at >= seq);
            let date = snapshot.date;
            for edit in state.pending.iter().filter(|e| e.date == date) {
                if snapshot.contains_habit(&edit.habit_id) {
                    snapshot.set_completed(&edit.habit_id, edit.completed);
                    snapshot.pending += 1;
                }
            }
        }

        state.applied = seq;
        self.publish(&mut state, snapshot)
    }

    fn flip_locally(&self, habit_id: &HabitId, date: NaiveDate, err: &ApiError) -> ToggleOutcome {
        let message = err.user_message();
        let mut state = self.lock();

        if state.current.date != date || !state.current.contains_habit(habit_id) {
            warn!(%habit_id, %date, error = %err, "toggle failed for a habit not on screen");
            return ToggleOutcome::Failed { message };
        }

        let completed = !state.current.is_completed(habit_id);
        let issued_at = state.issued;
        state
            .pending
            .retain(|e| !(e.habit_id == *habit_id && e.date == date));
        state.pending.push(PendingEdit {
            habit_id: habit_id.clone(),
            date,
            completed,
            issued_at,
        });

        let mut snapshot = (*state.current).clone();
        snapshot.set_completed(habit_id, completed);
        snapshot.pending = state.pending.iter().filter(|e| e.date == date).count();
        warn!(%habit_id, %date, error = %err, "toggle failed, flipped locally");
        self.publish(&mut state, snapshot);

        ToggleOutcome::Optimistic { completed, message }
    }

    fn shown_completion(&self, habit_id: &HabitId, date: NaiveDate) -> Option<bool> {
        let state = self.lock();
        (state.current.date == date && state.current.contains_habit(habit_id))
            .then(|| state.current.is_completed(habit_id))
    }

    fn publish(&self, state: &mut State, snapshot: DashboardSnapshot) -> Arc<DashboardSnapshot> {
        let snapshot = Arc::new(snapshot);
        state.current = Arc::clone(&snapshot);
        self.tx.send_replace(Arc::clone(&snapshot));
        snapshot
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
