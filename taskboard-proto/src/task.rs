//! Task wire types.
//!
//! [`Task`] is the entity of record returned by the backend. [`NewTask`] and
//! [`TaskUpdate`] are the request bodies for creation and partial updates,
//! and [`StateChange`] is the body of the narrow status-only PATCH.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime;
pub use crate::id::{ListId, TaskId};

/// Maximum allowed task title length in characters.
pub const MAX_TASK_TITLE_LENGTH: usize = 256;

/// Board column a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Not started.
    Todo,
    /// Actively being worked on.
    InProgress,
    /// Finished.
    Done,
}

impl TaskStatus {
    /// All statuses in board column order.
    pub const ALL: [Self; 3] = [Self::Todo, Self::InProgress, Self::Done];

    /// Human-readable column heading.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Todo => "To Do",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
        }
    }

    /// Wire spelling (`TODO`, `IN_PROGRESS`, `DONE`).
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Error returned when a string does not name a [`TaskStatus`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status: {0} (expected todo, in-progress or done)")]
pub struct ParseStatusError(String);

impl FromStr for TaskStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "TODO" | "TO_DO" => Ok(Self::Todo),
            "IN_PROGRESS" | "DOING" => Ok(Self::InProgress),
            "DONE" => Ok(Self::Done),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// A task as held by the backend.
///
/// `status` may be absent on the wire; the board treats an absent status
/// as [`TaskStatus::Todo`] (see [`Task::effective_status`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Backend-assigned identifier.
    pub id: TaskId,
    /// Short title.
    pub title: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Board column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// Calendar due date.
    #[serde(default, with = "datetime::date_opt", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Owning list (weak reference, not enforced client-side).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_id: Option<ListId>,
    /// Whether the user pinned this task to "My Day".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved_to_my_day: Option<bool>,
    /// Day on which the task was pinned to "My Day".
    #[serde(default, with = "datetime::date_opt", skip_serializing_if = "Option::is_none")]
    pub moved_date: Option<NaiveDate>,
    /// Creation instant.
    #[serde(with = "datetime::timestamp")]
    pub created_at: DateTime<Utc>,
    /// Last modification instant.
    #[serde(default, with = "datetime::timestamp_opt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Status used for column assignment; absent means [`TaskStatus::Todo`].
    #[must_use]
    pub fn effective_status(&self) -> TaskStatus {
        self.status.unwrap_or(TaskStatus::Todo)
    }

    /// Whether this task belongs to the given list.
    #[must_use]
    pub fn in_list(&self, list: &ListId) -> bool {
        self.list_id.as_ref() == Some(list)
    }
}

/// Request body for `POST /tasks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    /// Short title.
    pub title: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Initial column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// Calendar due date.
    #[serde(default, with = "datetime::date_opt", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Owning list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_id: Option<ListId>,
    /// Pin to "My Day" on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved_to_my_day: Option<bool>,
}

impl NewTask {
    /// Starts a creation request with just a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the owning list.
    #[must_use]
    pub fn with_list(mut self, list: ListId) -> Self {
        self.list_id = Some(list);
        self
    }

    /// Sets the initial column.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the due date.
    #[must_use]
    pub const fn with_due_date(mut self, due: NaiveDate) -> Self {
        self.due_date = Some(due);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Request body for `PATCH /tasks/{id}`; only present fields are changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// New due date.
    #[serde(default, with = "datetime::date_opt", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// List to move the task into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_id: Option<ListId>,
    /// Whether the task is on the "My Day" view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved_to_my_day: Option<bool>,
    /// Day the task was added to "My Day".
    #[serde(default, with = "datetime::date_opt", skip_serializing_if = "Option::is_none")]
    pub moved_date: Option<NaiveDate>,
}

impl TaskUpdate {
    /// Whether the update carries no changes at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.due_date.is_none()
            && self.list_id.is_none()
            && self.moved_to_my_day.is_none()
            && self.moved_date.is_none()
    }

    /// Applies the present fields onto `task`.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(status) = self.status {
            task.status = Some(status);
        }
        if let Some(due) = self.due_date {
            task.due_date = Some(due);
        }
        if let Some(list) = &self.list_id {
            task.list_id = Some(list.clone());
        }
        if let Some(pinned) = self.moved_to_my_day {
            task.moved_to_my_day = Some(pinned);
        }
        if let Some(moved) = self.moved_date {
            task.moved_date = Some(moved);
        }
    }
}

/// Request body for `PATCH /tasks/{id}/state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    /// Target column.
    pub status: TaskStatus,
}

/// Server-side filter for `GET /tasks`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Only tasks of this list.
    pub list_id: Option<ListId>,
    /// Only tasks due on this day.
    pub due_date: Option<NaiveDate>,
    /// Only tasks in this column.
    pub status: Option<TaskStatus>,
}

impl TaskFilter {
    /// Filter for a single list.
    #[must_use]
    pub const fn for_list(list: ListId) -> Self {
        Self {
            list_id: Some(list),
            due_date: None,
            status: None,
        }
    }

    /// Query parameters for this filter, omitting unset criteria.
    #[must_use]
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(list) = &self.list_id {
            query.push(("listId", list.to_string()));
        }
        if let Some(due) = self.due_date {
            query.push(("dueDate", datetime::format_date(due)));
        }
        if let Some(status) = self.status {
            query.push(("status", status.as_wire().to_string()));
        }
        query
    }

    /// Whether `task` satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.list_id.as_ref().is_none_or(|list| task.in_list(list))
            && self.due_date.is_none_or(|due| task.due_date == Some(due))
            && self.status.is_none_or(|status| task.effective_status() == status)
    }
}

/// Time window for `GET /tasks/calendar`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarRange {
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Inclusive end.
    pub end: DateTime<Utc>,
}

impl CalendarRange {
    /// Creates a range, swapping the bounds if they are reversed.
    #[must_use]
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// Covers whole days, from midnight on `first` to the last millisecond
    /// of `last` (UTC).
    #[must_use]
    pub fn days(first: NaiveDate, last: NaiveDate) -> Self {
        let (first, last) = if first <= last { (first, last) } else { (last, first) };
        let start = first.and_time(NaiveTime::MIN).and_utc();
        let end = last.and_time(NaiveTime::MIN).and_utc() + TimeDelta::days(1) - TimeDelta::milliseconds(1);
        Self { start, end }
    }

    /// Query parameters (`startDate`, `endDate`) in ISO 8601.
    #[must_use]
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("startDate", self.start.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ("endDate", self.end.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ]
    }

    /// Whether the task's due date falls inside the range.
    #[must_use]
    pub fn contains(&self, task: &Task) -> bool {
        task.due_date
            .is_some_and(|due| due >= self.start.date_naive() && due <= self.end.date_naive())
    }
}
