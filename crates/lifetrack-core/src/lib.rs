use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::Date;
use ulid::Ulid;

/// Day stamps are stored as `YYYY-MM-DD` strings; lexicographic order on the
/// fixed format equals chronological order, which the read paths rely on.
pub const DAY_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// Journal entries carry a second-resolution stamp in the same sortable shape.
pub const JOURNAL_STAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum TrackerError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid document key: {0}")]
    InvalidKey(String),
}

/// The five persisted document kinds. Every stored value in the system is one
/// of these, addressed by its kind rather than by an arbitrary path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Profile,
    Tasks,
    Health,
    History,
    Journal,
}

impl DocumentKind {
    pub const ALL: [Self; 5] =
        [Self::Profile, Self::Tasks, Self::Health, Self::History, Self::Journal];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Tasks => "tasks",
            Self::Health => "health",
            Self::History => "history",
            Self::Journal => "journal",
        }
    }

    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Profile => "profile.json",
            Self::Tasks => "tasks.json",
            Self::Health => "health.json",
            Self::History => "history.json",
            Self::Journal => "journal.json",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "profile" => Some(Self::Profile),
            "tasks" => Some(Self::Tasks),
            "health" => Some(Self::Health),
            "history" => Some(Self::History),
            "journal" => Some(Self::Journal),
            _ => None,
        }
    }

    /// Parse a string key, failing with [`TrackerError::InvalidKey`] for
    /// anything outside the five recognized kinds.
    ///
    /// # Errors
    /// Returns [`TrackerError::InvalidKey`] for an unrecognized key.
    pub fn from_key(value: &str) -> Result<Self, TrackerError> {
        Self::parse(value).ok_or_else(|| TrackerError::InvalidKey(value.to_string()))
    }
}

impl Display for DocumentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Marker for types that serialize as exactly one document kind.
pub trait Document: Serialize + DeserializeOwned {
    const KIND: DocumentKind;

    /// The seed value used when the document has never been saved or cannot
    /// be read back.
    fn default_value() -> Self;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvatarConfig {
    #[serde(default = "default_avatar_style")]
    pub style: String,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self { style: default_avatar_style() }
    }
}

fn default_avatar_style() -> String {
    "default".to_string()
}

/// Per-field defaults keep a partially written profile readable: missing
/// fields fill in rather than failing the whole document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    #[serde(default = "default_profile_name")]
    pub name: String,
    #[serde(default = "default_height")]
    pub height: f64,
    #[serde(default = "default_current_weight")]
    pub current_weight: f64,
    #[serde(default = "default_goal_weight")]
    pub goal_weight: f64,
    #[serde(default = "default_calorie_limit")]
    pub calorie_limit: u32,
    #[serde(default)]
    pub avatar_config: AvatarConfig,
}

fn default_profile_name() -> String {
    "New User".to_string()
}

const fn default_height() -> f64 {
    170.0
}

const fn default_current_weight() -> f64 {
    70.0
}

const fn default_goal_weight() -> f64 {
    65.0
}

const fn default_calorie_limit() -> u32 {
    2000
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: default_profile_name(),
            height: default_height(),
            current_weight: default_current_weight(),
            goal_weight: default_goal_weight(),
            calorie_limit: default_calorie_limit(),
            avatar_config: AvatarConfig::default(),
        }
    }
}

impl Profile {
    /// # Errors
    /// Returns [`TrackerError::Validation`] when the calorie limit is zero;
    /// downstream analytics divide by it.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.calorie_limit == 0 {
            return Err(TrackerError::Validation(
                "calorie_limit MUST be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Document for Profile {
    const KIND: DocumentKind = DocumentKind::Profile;

    fn default_value() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TaskId(pub Ulid);

impl TaskId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub enum TaskStatus {
    Pending,
    Done,
}

impl TaskStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Done => "Done",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(Self::Pending),
            "Done" => Some(Self::Done),
            _ => None,
        }
    }
}

/// List position remains a valid address for updates, so list order is
/// load-bearing; the `id` assigned at creation is the stable address.
/// Documents written before ids existed pick up fresh ones on the next
/// load-mutate-save cycle via the serde default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    #[serde(default)]
    pub id: TaskId,
    pub name: String,
    pub category: String,
    pub status: TaskStatus,
    pub created_date: String,
    pub completed_date: Option<String>,
}

impl Document for Vec<Task> {
    const KIND: DocumentKind = DocumentKind::Tasks;

    fn default_value() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FoodEntry {
    pub name: String,
    pub calories: u32,
}

/// One per date; entries are located by linear scan on date equality and the
/// list is not kept sorted on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthEntry {
    pub date: String,
    #[serde(default)]
    pub food_entries: Vec<FoodEntry>,
    #[serde(default)]
    pub workout_completed: bool,
    #[serde(default)]
    pub weight_log: Option<f64>,
}

impl HealthEntry {
    #[must_use]
    pub fn empty(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            food_entries: Vec::new(),
            workout_completed: false,
            weight_log: None,
        }
    }

    #[must_use]
    pub fn total_calories(&self) -> u32 {
        self.food_entries.iter().map(|entry| entry.calories).sum()
    }
}

impl Document for Vec<HealthEntry> {
    const KIND: DocumentKind = DocumentKind::Health;

    fn default_value() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    TaskAdd,
    TaskComplete,
    FoodLog,
    WorkoutLog,
    WeightLog,
    JournalAdd,
    ProfileUpdate,
}

impl ActionType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskAdd => "TASK_ADD",
            Self::TaskComplete => "TASK_COMPLETE",
            Self::FoodLog => "FOOD_LOG",
            Self::WorkoutLog => "WORKOUT_LOG",
            Self::WeightLog => "WEIGHT_LOG",
            Self::JournalAdd => "JOURNAL_ADD",
            Self::ProfileUpdate => "PROFILE_UPDATE",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "TASK_ADD" => Some(Self::TaskAdd),
            "TASK_COMPLETE" => Some(Self::TaskComplete),
            "FOOD_LOG" => Some(Self::FoodLog),
            "WORKOUT_LOG" => Some(Self::WorkoutLog),
            "WEIGHT_LOG" => Some(Self::WeightLog),
            "JOURNAL_ADD" => Some(Self::JournalAdd),
            "PROFILE_UPDATE" => Some(Self::ProfileUpdate),
            _ => None,
        }
    }
}

impl Display for ActionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only audit record; never mutated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryRecord {
    pub timestamp: String,
    pub action_type: ActionType,
    pub details: String,
}

impl Document for Vec<HistoryRecord> {
    const KIND: DocumentKind = DocumentKind::History;

    fn default_value() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalEntry {
    pub date: String,
    pub title: String,
    pub content: String,
}

impl Document for Vec<JournalEntry> {
    const KIND: DocumentKind = DocumentKind::Journal;

    fn default_value() -> Self {
        Self::new()
    }
}

/// The built-in seed value for a document kind, as raw JSON.
#[must_use]
pub fn default_document(kind: DocumentKind) -> Value {
    match kind {
        DocumentKind::Profile => serde_json::to_value(Profile::default())
            .unwrap_or_else(|_| Value::Object(serde_json::Map::new())),
        DocumentKind::Tasks
        | DocumentKind::Health
        | DocumentKind::History
        | DocumentKind::Journal => Value::Array(Vec::new()),
    }
}

/// # Errors
/// Returns [`TrackerError::Validation`] unless `value` is a real calendar
/// date in `YYYY-MM-DD` form.
pub fn parse_day_stamp(value: &str) -> Result<Date, TrackerError> {
    Date::parse(value, DAY_FORMAT).map_err(|err| {
        TrackerError::Validation(format!("invalid day stamp `{value}`, expected YYYY-MM-DD: {err}"))
    })
}

/// Zero-padded `YYYY-MM` prefix used for month matching against day stamps
/// and audit timestamps.
#[must_use]
pub fn month_prefix(year: i32, month: u8) -> String {
    format!("{year:04}-{month:02}")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyAnalytics {
    pub completion_rate: f64,
    pub days_under_limit: u32,
    pub workouts_count: u32,
    pub weight_change: f64,
    pub daily_cals: BTreeMap<String, u32>,
    pub cal_limit: u32,
}

/// Scan one calendar month of health, task, and audit data into a summary.
///
/// A day counts toward `days_under_limit` only when it has logged calories
/// above zero and at or below the limit; an empty day is absence of data,
/// not evidence of discipline. Completed tasks are counted from both the
/// live task list (by `completed_date`) and `TASK_COMPLETE` audit records,
/// which can double-count an archived task whose audit record falls in the
/// same month; that behavior is kept for compatibility with existing data.
#[must_use]
pub fn monthly_analytics(
    health: &[HealthEntry],
    tasks: &[Task],
    history: &[HistoryRecord],
    calorie_limit: u32,
    year: i32,
    month: u8,
) -> MonthlyAnalytics {
    let prefix = month_prefix(year, month);

    let mut days_under_limit = 0_u32;
    let mut workouts_count = 0_u32;
    let mut daily_cals = BTreeMap::new();
    let mut weights: Vec<(String, f64)> = Vec::new();

    for entry in health {
        if !entry.date.starts_with(&prefix) {
            continue;
        }
        let cals = entry.total_calories();
        daily_cals.insert(entry.date.clone(), cals);
        if cals > 0 && cals <= calorie_limit {
            days_under_limit += 1;
        }
        if entry.workout_completed {
            workouts_count += 1;
        }
        if let Some(weight) = entry.weight_log {
            weights.push((entry.date.clone(), weight));
        }
    }

    weights.sort_by(|lhs, rhs| lhs.0.cmp(&rhs.0));
    let weight_change = match (weights.first(), weights.last()) {
        (Some(first), Some(last)) if weights.len() > 1 => last.1 - first.1,
        _ => 0.0,
    };

    let mut tasks_completed_month = 0_u32;
    for task in tasks {
        if task.status != TaskStatus::Done {
            continue;
        }
        if task.completed_date.as_deref().is_some_and(|date| date.starts_with(&prefix)) {
            tasks_completed_month += 1;
        }
    }
    for record in history {
        if record.action_type == ActionType::TaskComplete && record.timestamp.starts_with(&prefix) {
            tasks_completed_month += 1;
        }
    }

    let pending =
        u32::try_from(tasks.iter().filter(|task| task.status == TaskStatus::Pending).count())
            .unwrap_or(u32::MAX);
    let total_relevant = tasks_completed_month + pending;
    let completion_rate = if total_relevant > 0 {
        f64::from(tasks_completed_month) / f64::from(total_relevant) * 100.0
    } else {
        0.0
    };

    MonthlyAnalytics {
        completion_rate,
        days_under_limit,
        workouts_count,
        weight_change,
        daily_cals,
        cal_limit: calorie_limit,
    }
}

/// Ascending date -> weight map over every entry with a logged weight.
#[must_use]
pub fn weight_history(health: &[HealthEntry]) -> BTreeMap<String, f64> {
    let mut history = BTreeMap::new();
    for entry in health {
        if let Some(weight) = entry.weight_log {
            history.insert(entry.date.clone(), weight);
        }
    }
    history
}

/// Weighted 0-100 score over one month: tasks 30 points at 100% completion,
/// calorie discipline 40 points at 25 under-limit days, workouts 30 points
/// at 12 sessions. Truncated to an integer.
#[must_use]
pub fn life_score(stats: &MonthlyAnalytics) -> u8 {
    let task_points = stats.completion_rate / 100.0 * 30.0;
    let calorie_points = (f64::from(stats.days_under_limit) / 25.0 * 40.0).min(40.0);
    let workout_points = (f64::from(stats.workouts_count) / 12.0 * 30.0).min(30.0);
    let total = (task_points + calorie_points + workout_points).clamp(0.0, 100.0);
    total as u8
}
