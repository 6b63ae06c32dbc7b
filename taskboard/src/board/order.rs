//! Column grouping, sorting and manual reordering.

use std::cmp::Ordering;
use std::str::FromStr;

use taskboard_proto::list::ListId;
use taskboard_proto::task::{Task, TaskId, TaskStatus};

/// How tasks are ordered inside a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderMode {
    /// Cache order, rearranged by same-column drags.
    #[default]
    Manual,
    /// Dated tasks first, earliest first; undated tasks last.
    DueDate,
    /// Alphabetical by title.
    Title,
}

impl OrderMode {
    /// Short name used on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::DueDate => "due-date",
            Self::Title => "title",
        }
    }
}

impl std::fmt::Display for OrderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name an [`OrderMode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order mode: {0} (expected manual, due-date or title)")]
pub struct ParseOrderModeError(String);

impl FromStr for OrderMode {
    type Err = ParseOrderModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "manual" | "custom" => Ok(Self::Manual),
            "due-date" | "duedate" | "due" => Ok(Self::DueDate),
            "title" => Ok(Self::Title),
            _ => Err(ParseOrderModeError(s.to_string())),
        }
    }
}

/// Due-date ordering: dated before undated, then ascending.
#[must_use]
pub fn compare_due_date(a: &Task, b: &Task) -> Ordering {
    match (a.due_date, b.due_date) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Title ordering: ascending, ignoring case, with exact text as tie-break.
#[must_use]
pub fn compare_title(a: &Task, b: &Task) -> Ordering {
    a.title
        .to_lowercase()
        .cmp(&b.title.to_lowercase())
        .then_with(|| a.title.cmp(&b.title))
}

/// Tasks grouped into the three board columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Columns {
    todo: Vec<Task>,
    in_progress: Vec<Task>,
    done: Vec<Task>,
}

impl Columns {
    /// Tasks in the column for `status`.
    #[must_use]
    pub fn column(&self, status: TaskStatus) -> &[Task] {
        match status {
            TaskStatus::Todo => &self.todo,
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Done => &self.done,
        }
    }

    /// Columns in board order.
    pub fn iter(&self) -> impl Iterator<Item = (TaskStatus, &[Task])> {
        TaskStatus::ALL.into_iter().map(|status| (status, self.column(status)))
    }

    /// Total number of tasks on the board.
    #[must_use]
    pub fn len(&self) -> usize {
        self.todo.len() + self.in_progress.len() + self.done.len()
    }

    /// Whether the board has no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn column_mut(&mut self, status: TaskStatus) -> &mut Vec<Task> {
        match status {
            TaskStatus::Todo => &mut self.todo,
            TaskStatus::InProgress => &mut self.in_progress,
            TaskStatus::Done => &mut self.done,
        }
    }
}

/// Groups `tasks` by effective status and orders each column per `mode`.
///
/// Manual mode keeps input order; the sorted modes are stable.
#[must_use]
pub fn group_columns(tasks: impl IntoIterator<Item = Task>, mode: OrderMode) -> Columns {
    let mut columns = Columns::default();
    for task in tasks {
        columns.column_mut(task.effective_status()).push(task);
    }

    let compare: Option<fn(&Task, &Task) -> Ordering> = match mode {
        OrderMode::Manual => None,
        OrderMode::DueDate => Some(compare_due_date),
        OrderMode::Title => Some(compare_title),
    };
    if let Some(compare) = compare {
        for status in TaskStatus::ALL {
            columns.column_mut(status).sort_by(compare);
        }
    }
    columns
}

/// Moves `task_id` to position `to_index` within its column, in place.
///
/// The column is the tasks with effective status `status` (and, with a
/// filter, belonging to `list`). Tasks outside the column keep their exact
/// positions; the column's own positions in `tasks` are refilled in the new
/// order. An index past the end moves the task to the bottom.
///
/// Returns `false`, changing nothing, if the task is not in the column.
pub fn reorder_column(
    tasks: &mut [Task],
    status: TaskStatus,
    list: Option<&ListId>,
    task_id: &TaskId,
    to_index: usize,
) -> bool {
    let slots: Vec<usize> = tasks
        .iter()
        .enumerate()
        .filter(|(_, task)| {
            task.effective_status() == status && list.is_none_or(|list| task.in_list(list))
        })
        .map(|(slot, _)| slot)
        .collect();

    let mut column: Vec<Task> = slots.iter().map(|&slot| tasks[slot].clone()).collect();
    let Some(from) = column.iter().position(|task| &task.id == task_id) else {
        return false;
    };
    let moved = column.remove(from);
    column.insert(to_index.min(column.len()), moved);

    for (slot, task) in slots.into_iter().zip(column) {
        tasks[slot] = task;
    }
    true
}
