use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use lifetrack_core::{
    monthly_analytics, parse_day_stamp, weight_history, ActionType, FoodEntry, HealthEntry,
    HistoryRecord, JournalEntry, MonthlyAnalytics, Profile, Task, TaskId, TaskStatus, TrackerError,
    DAY_FORMAT, JOURNAL_STAMP_FORMAT,
};
use lifetrack_store::{Loaded, Store};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub height: f64,
    pub current_weight: f64,
    pub goal_weight: f64,
    pub calorie_limit: u32,
}

/// At-a-glance numbers for one day; a pure read, no entry is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailySummary {
    pub date: String,
    pub calories_consumed: u32,
    pub calorie_limit: u32,
    pub calories_remaining: i64,
    pub workout_completed: bool,
    pub weight_log: Option<f64>,
    pub pending_tasks: usize,
}

/// Domain operations over the five documents. Holds only the store; every
/// operation is one fresh load-mutate-save cycle, and no document state is
/// retained across calls.
pub struct LifeTracker {
    store: Store,
}

impl LifeTracker {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// # Errors
    /// Returns an error when the profile cannot be loaded.
    pub fn profile(&self) -> Result<Loaded<Profile>> {
        self.store.load()
    }

    /// Replace the stored profile, keeping the existing avatar configuration.
    ///
    /// # Errors
    /// Returns an error when validation fails or the profile cannot be saved.
    pub fn update_profile(&self, request: UpdateProfileRequest) -> Result<Profile> {
        let current = self.store.load::<Profile>()?.value;
        let profile = Profile {
            name: request.name,
            height: request.height,
            current_weight: request.current_weight,
            goal_weight: request.goal_weight,
            calorie_limit: request.calorie_limit,
            avatar_config: current.avatar_config,
        };
        profile.validate()?;
        self.store.save(&profile)?;
        self.log_action(
            ActionType::ProfileUpdate,
            format!("Updated details for {}", profile.name),
        )?;
        Ok(profile)
    }

    /// # Errors
    /// Returns an error when the task list cannot be loaded.
    pub fn tasks(&self) -> Result<Vec<Task>> {
        Ok(self.store.load::<Vec<Task>>()?.value)
    }

    /// Append a new pending task stamped with today's date.
    ///
    /// # Errors
    /// Returns an error when the name is empty or persistence fails.
    pub fn add_task(&self, name: &str, category: &str) -> Result<Task> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TrackerError::Validation("task name MUST be non-empty".to_string()).into());
        }

        let mut tasks = self.store.load::<Vec<Task>>()?.value;
        let task = Task {
            id: TaskId::new(),
            name: name.to_string(),
            category: category.to_string(),
            status: TaskStatus::Pending,
            created_date: today_stamp()?,
            completed_date: None,
        };
        tasks.push(task.clone());
        self.store.save(&tasks)?;
        self.log_action(ActionType::TaskAdd, format!("Added task: {name} ({category})"))?;
        Ok(task)
    }

    /// Update a task addressed by list position. An out-of-range index is a
    /// silent no-op returning `None`: nothing is written and no error is
    /// raised, matching the long-standing permissive contract of this
    /// operation. [`LifeTracker::update_task_status_by_id`] is the strict
    /// alternative.
    ///
    /// # Errors
    /// Returns an error when the task list cannot be loaded or saved.
    pub fn update_task_status(&self, index: usize, status: TaskStatus) -> Result<Option<Task>> {
        let mut tasks = self.store.load::<Vec<Task>>()?.value;
        let Some(task) = tasks.get_mut(index) else {
            return Ok(None);
        };
        apply_status(task, status)?;
        let updated = task.clone();
        self.store.save(&tasks)?;
        Ok(Some(updated))
    }

    /// Update a task addressed by its stable identifier.
    ///
    /// # Errors
    /// Returns an error when no task carries `id`, or persistence fails.
    pub fn update_task_status_by_id(&self, id: TaskId, status: TaskStatus) -> Result<Task> {
        let mut tasks = self.store.load::<Vec<Task>>()?.value;
        let Some(task) = tasks.iter_mut().find(|task| task.id == id) else {
            return Err(anyhow!("no task with id {id}"));
        };
        apply_status(task, status)?;
        let updated = task.clone();
        self.store.save(&tasks)?;
        Ok(updated)
    }

    /// Remove every `Done` task from the list, append one `TASK_COMPLETE`
    /// audit record per removed task, and return the count. When nothing is
    /// done, nothing is written.
    ///
    /// # Errors
    /// Returns an error when loading or persistence fails.
    pub fn archive_completed_tasks(&self) -> Result<usize> {
        let tasks = self.store.load::<Vec<Task>>()?.value;
        let (done, active): (Vec<Task>, Vec<Task>) =
            tasks.into_iter().partition(|task| task.status == TaskStatus::Done);
        if done.is_empty() {
            return Ok(0);
        }

        self.store.save(&active)?;
        for task in &done {
            self.log_action(ActionType::TaskComplete, format!("Finished: {}", task.name))?;
        }
        Ok(done.len())
    }

    /// Fetch the daily entry for `date`, creating and persisting a
    /// zero-valued one when absent. Calling twice for the same date yields
    /// exactly one stored entry.
    ///
    /// # Errors
    /// Returns an error for a malformed date or when persistence fails.
    pub fn daily_entry(&self, date: &str) -> Result<HealthEntry> {
        parse_day_stamp(date)?;
        let mut health = self.store.load::<Vec<HealthEntry>>()?.value;
        if let Some(entry) = health.iter().find(|entry| entry.date == date) {
            return Ok(entry.clone());
        }

        let entry = HealthEntry::empty(date);
        health.push(entry.clone());
        self.store.save(&health)?;
        Ok(entry)
    }

    /// Replace (or insert) the whole daily entry carried by `entry.date`.
    ///
    /// # Errors
    /// Returns an error for a malformed date or when persistence fails.
    pub fn update_daily_entry(&self, entry: HealthEntry) -> Result<()> {
        parse_day_stamp(&entry.date)?;
        let mut health = self.store.load::<Vec<HealthEntry>>()?.value;
        match health.iter_mut().find(|existing| existing.date == entry.date) {
            Some(existing) => *existing = entry,
            None => health.push(entry),
        }
        self.store.save(&health)
    }

    /// # Errors
    /// Returns an error for a malformed date, an empty food name, or when
    /// persistence fails.
    pub fn add_food_log(&self, date: &str, name: &str, calories: u32) -> Result<HealthEntry> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TrackerError::Validation("food name MUST be non-empty".to_string()).into());
        }

        let entry = self.mutate_daily_entry(date, |entry| {
            entry.food_entries.push(FoodEntry { name: name.to_string(), calories });
        })?;
        self.log_action(ActionType::FoodLog, format!("Ate {name} ({calories} kcal)"))?;
        Ok(entry)
    }

    /// # Errors
    /// Returns an error for a malformed date or when persistence fails.
    pub fn set_workout_status(&self, date: &str, completed: bool) -> Result<HealthEntry> {
        let entry = self.mutate_daily_entry(date, |entry| {
            entry.workout_completed = completed;
        })?;
        let details = if completed { "Completed workout" } else { "Undo workout" };
        self.log_action(ActionType::WorkoutLog, details.to_string())?;
        Ok(entry)
    }

    /// Record a weight sample for `date` and mirror it into the profile's
    /// current weight.
    ///
    /// # Errors
    /// Returns an error for a malformed date, a non-positive weight, or when
    /// persistence fails.
    pub fn log_weight(&self, date: &str, weight: f64) -> Result<HealthEntry> {
        if !weight.is_finite() || weight <= 0.0 {
            return Err(
                TrackerError::Validation(format!("weight MUST be positive, got {weight}")).into()
            );
        }

        let entry = self.mutate_daily_entry(date, |entry| {
            entry.weight_log = Some(weight);
        })?;

        let mut profile = self.store.load::<Profile>()?.value;
        profile.current_weight = weight;
        self.store.save(&profile)?;

        self.log_action(ActionType::WeightLog, format!("Logged weight: {weight}kg"))?;
        Ok(entry)
    }

    /// Ascending date -> weight map over every logged sample.
    ///
    /// # Errors
    /// Returns an error when the health list cannot be loaded.
    pub fn weight_history(&self) -> Result<BTreeMap<String, f64>> {
        let health = self.store.load::<Vec<HealthEntry>>()?.value;
        Ok(weight_history(&health))
    }

    /// # Errors
    /// Returns an error for an out-of-range month or when any of the source
    /// documents cannot be loaded.
    pub fn monthly_analytics(&self, year: i32, month: u8) -> Result<MonthlyAnalytics> {
        if !(1..=12).contains(&month) {
            return Err(
                TrackerError::Validation(format!("month MUST be 1-12, got {month}")).into()
            );
        }

        let health = self.store.load::<Vec<HealthEntry>>()?.value;
        let tasks = self.store.load::<Vec<Task>>()?.value;
        let history = self.store.load::<Vec<HistoryRecord>>()?.value;
        let profile = self.store.load::<Profile>()?.value;
        Ok(monthly_analytics(&health, &tasks, &history, profile.calorie_limit, year, month))
    }

    /// # Errors
    /// Returns an error for a malformed date or when loading fails.
    pub fn daily_summary(&self, date: &str) -> Result<DailySummary> {
        parse_day_stamp(date)?;
        let health = self.store.load::<Vec<HealthEntry>>()?.value;
        let tasks = self.store.load::<Vec<Task>>()?.value;
        let profile = self.store.load::<Profile>()?.value;

        let entry = health.iter().find(|entry| entry.date == date);
        let calories_consumed = entry.map_or(0, HealthEntry::total_calories);
        Ok(DailySummary {
            date: date.to_string(),
            calories_consumed,
            calorie_limit: profile.calorie_limit,
            calories_remaining: i64::from(profile.calorie_limit) - i64::from(calories_consumed),
            workout_completed: entry.is_some_and(|entry| entry.workout_completed),
            weight_log: entry.and_then(|entry| entry.weight_log),
            pending_tasks: tasks.iter().filter(|task| task.status == TaskStatus::Pending).count(),
        })
    }

    /// Append a journal entry stamped to the second.
    ///
    /// # Errors
    /// Returns an error for an empty title or content, or when persistence
    /// fails.
    pub fn add_journal_entry(&self, title: &str, content: &str) -> Result<JournalEntry> {
        let title = title.trim();
        if title.is_empty() {
            return Err(
                TrackerError::Validation("journal title MUST be non-empty".to_string()).into()
            );
        }
        if content.trim().is_empty() {
            return Err(
                TrackerError::Validation("journal content MUST be non-empty".to_string()).into()
            );
        }

        let mut journal = self.store.load::<Vec<JournalEntry>>()?.value;
        let entry = JournalEntry {
            date: journal_stamp()?,
            title: title.to_string(),
            content: content.to_string(),
        };
        journal.push(entry.clone());
        self.store.save(&journal)?;
        self.log_action(ActionType::JournalAdd, format!("Created entry: {title}"))?;
        Ok(entry)
    }

    /// Entries sorted by timestamp descending; the fixed-format stamp makes
    /// the lexicographic sort chronological.
    ///
    /// # Errors
    /// Returns an error when the journal cannot be loaded.
    pub fn journal_entries(&self) -> Result<Vec<JournalEntry>> {
        let mut journal = self.store.load::<Vec<JournalEntry>>()?.value;
        journal.sort_by(|lhs, rhs| rhs.date.cmp(&lhs.date));
        Ok(journal)
    }

    /// # Errors
    /// Returns an error when the history cannot be loaded.
    pub fn history(&self) -> Result<Vec<HistoryRecord>> {
        Ok(self.store.load::<Vec<HistoryRecord>>()?.value)
    }

    /// Every mutating operation appends its audit record through here; the
    /// history document is append-only by construction.
    fn log_action(&self, action_type: ActionType, details: String) -> Result<()> {
        let mut history = self.store.load::<Vec<HistoryRecord>>()?.value;
        history.push(HistoryRecord { timestamp: now_rfc3339()?, action_type, details });
        self.store.save(&history)
    }

    fn mutate_daily_entry(
        &self,
        date: &str,
        mutate: impl FnOnce(&mut HealthEntry),
    ) -> Result<HealthEntry> {
        parse_day_stamp(date)?;
        let mut health = self.store.load::<Vec<HealthEntry>>()?.value;
        if !health.iter().any(|entry| entry.date == date) {
            health.push(HealthEntry::empty(date));
        }
        let Some(entry) = health.iter_mut().find(|entry| entry.date == date) else {
            return Err(anyhow!("daily entry for {date} vanished during update"));
        };
        mutate(entry);
        let updated = entry.clone();
        self.store.save(&health)?;
        Ok(updated)
    }
}

fn apply_status(task: &mut Task, status: TaskStatus) -> Result<()> {
    task.status = status;
    if status == TaskStatus::Done {
        task.completed_date = Some(today_stamp()?);
    }
    Ok(())
}

fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn today_stamp() -> Result<String> {
    now_local().format(DAY_FORMAT).context("failed to format day stamp")
}

fn journal_stamp() -> Result<String> {
    now_local().format(JOURNAL_STAMP_FORMAT).context("failed to format journal stamp")
}

fn now_rfc3339() -> Result<String> {
    now_local().format(&Rfc3339).context("failed to format audit timestamp")
}
