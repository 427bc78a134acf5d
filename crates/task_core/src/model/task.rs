use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};

/// Length of the identifier prefix shown in listings and accepted as input.
pub const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub due_date: Option<Date>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Task {
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(SHORT_ID_LEN) {
            Some((index, _)) => &self.id[..index],
            None => &self.id,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} - {} ({})",
            self.short_id(),
            self.title,
            self.status,
            self.priority
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [Self::Pending, Self::InProgress, Self::Completed];

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }

    /// Position in workflow order, used for sorting.
    pub fn rank(self) -> i32 {
        match self {
            Self::Pending => 1,
            Self::InProgress => 2,
            Self::Completed => 3,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskStatus {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match canonical_key(raw).as_deref() {
            Some("pending") | Some("todo") => Ok(Self::Pending),
            Some("in_progress") | Some("inprogress") | Some("started") => Ok(Self::InProgress),
            Some("completed") | Some("done") => Ok(Self::Completed),
            _ => Err(AppError::validation(format!(
                "status must be one of Pending, In Progress, Completed (got '{}')",
                raw.trim()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    pub fn rank(self) -> i32 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Priority {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match canonical_key(raw).as_deref() {
            Some("low") => Ok(Self::Low),
            Some("medium") | Some("normal") => Ok(Self::Medium),
            Some("high") => Ok(Self::High),
            _ => Err(AppError::validation(format!(
                "priority must be one of Low, Medium, High (got '{}')",
                raw.trim()
            ))),
        }
    }
}

/// Input for creating a task. Identifier, status and timestamps are assigned
/// by the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_date: Option<Date>,
}

impl NewTask {
    pub fn new<T: Into<String>>(title: T) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description<T: Into<String>>(mut self, description: T) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due_date(mut self, due_date: Date) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Trims text fields and rejects a blank title.
    pub fn validated(self) -> Result<Self, AppError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(AppError::validation("title is required"));
        }

        Ok(Self {
            title: title.to_string(),
            description: normalize_optional_text(self.description),
            priority: self.priority,
            due_date: self.due_date,
        })
    }
}

/// Partial update. `None` leaves a field untouched; for optional fields
/// `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<Date>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
    }

    pub fn validated(self) -> Result<Self, AppError> {
        if self.is_empty() {
            return Err(AppError::validation("no changes to apply"));
        }

        let title = match self.title {
            Some(title) => {
                let trimmed = title.trim();
                if trimmed.is_empty() {
                    return Err(AppError::validation("title cannot be empty"));
                }
                Some(trimmed.to_string())
            }
            None => None,
        };

        Ok(Self {
            title,
            description: self.description.map(normalize_optional_text),
            status: self.status,
            priority: self.priority,
            due_date: self.due_date,
        })
    }

    /// Applies the patch in place. `now` only moves `updated_at` forward.
    pub fn apply_to(&self, task: &mut Task, now: OffsetDateTime) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        task.updated_at = task.updated_at.max(now);
    }
}

fn normalize_optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

pub fn parse_due_date(raw: &str) -> Result<Date, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("due date is required"));
    }

    Date::parse(trimmed, format_description!("[year]-[month]-[day]")).map_err(|_| {
        AppError::validation(format!("due date must be YYYY-MM-DD (got '{trimmed}')"))
    })
}

pub fn format_due_date(date: Date) -> Result<String, AppError> {
    date.format(format_description!("[year]-[month]-[day]"))
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

/// Current UTC time truncated to the millisecond resolution stores persist.
pub fn now_millis() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now - Duration::nanoseconds(i64::from(now.nanosecond() % 1_000_000))
}

/// Lowercases and collapses separators so `In Progress`, `in-progress` and
/// `in_progress` compare equal.
pub fn canonical_key(raw: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
