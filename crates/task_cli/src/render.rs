use tabled::settings::Style;
use tabled::{Table, Tabled};
use task_core::model::{Task, format_due_date};
use task_core::stats::Statistics;

const TITLE_WIDTH: usize = 25;
const NOT_SET: &str = "Not set";

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Priority")]
    priority: &'static str,
    #[tabled(rename = "Due Date")]
    due_date: String,
}

impl TaskRow {
    fn from_task(task: &Task) -> Self {
        Self {
            id: task.short_id().to_string(),
            title: truncate_title(&task.title),
            status: task.status.label(),
            priority: task.priority.label(),
            due_date: due_label(task),
        }
    }
}

/// Long titles keep their first 22 characters plus an ellipsis.
pub fn truncate_title(title: &str) -> String {
    if title.chars().count() > TITLE_WIDTH {
        let head: String = title.chars().take(TITLE_WIDTH - 3).collect();
        format!("{head}...")
    } else {
        title.to_string()
    }
}

fn due_label(task: &Task) -> String {
    task.due_date
        .and_then(|date| format_due_date(date).ok())
        .unwrap_or_else(|| NOT_SET.to_string())
}

pub fn task_table(tasks: &[Task]) -> String {
    let mut table = Table::new(tasks.iter().map(TaskRow::from_task));
    table.with(Style::psql());
    table.to_string()
}

pub fn task_details(task: &Task) -> String {
    let description = task.description.as_deref().unwrap_or(NOT_SET);
    [
        format!("  ID         : {}", task.id),
        format!("  Title      : {}", task.title),
        format!("  Description: {description}"),
        format!("  Due Date   : {}", due_label(task)),
        format!("  Priority   : {}", task.priority),
        format!("  Status     : {}", task.status),
    ]
    .join("\n")
}

pub fn statistics_block(stats: &Statistics) -> String {
    [
        format!("Total Tasks    : {}", stats.total()),
        format!("Completed      : {}", stats.counts.completed),
        format!("Pending        : {}", stats.counts.pending),
        format!("In Progress    : {}", stats.counts.in_progress),
        format!("Completion Rate: {:.2}%", stats.completion_percent()),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::{statistics_block, task_details, task_table, truncate_title};
    use task_core::model::{Priority, Task, TaskStatus};
    use task_core::stats::{Statistics, StatusCounts};
    use time::macros::{date, datetime};

    fn sample() -> Task {
        Task {
            id: "0123456789abcdef".to_string(),
            title: "Buy milk".to_string(),
            description: None,
            status: TaskStatus::InProgress,
            priority: Priority::Low,
            due_date: Some(date!(2026 - 03 - 01)),
            created_at: datetime!(2026-01-01 00:00:00 UTC),
            updated_at: datetime!(2026-01-01 00:00:00 UTC),
        }
    }

    #[test]
    fn truncate_title_limits_long_titles() {
        assert_eq!(truncate_title("short"), "short");
        assert_eq!(
            truncate_title("abcdefghijklmnopqrstuvwxyz"),
            "abcdefghijklmnopqrstuv..."
        );
        assert_eq!(truncate_title(&"x".repeat(25)), "x".repeat(25));
    }

    #[test]
    fn table_shows_short_id_and_labels() {
        let rendered = task_table(&[sample()]);

        assert!(rendered.contains("ID"));
        assert!(rendered.contains("01234567"));
        assert!(!rendered.contains("0123456789"));
        assert!(rendered.contains("In Progress"));
        assert!(rendered.contains("2026-03-01"));
    }

    #[test]
    fn details_mark_missing_values() {
        let mut task = sample();
        task.due_date = None;
        let rendered = task_details(&task);

        assert!(rendered.contains("Description: Not set"));
        assert!(rendered.contains("Due Date   : Not set"));
    }

    #[test]
    fn statistics_block_formats_rate() {
        let stats = Statistics::from_counts(StatusCounts {
            pending: 2,
            in_progress: 0,
            completed: 1,
        });

        let rendered = statistics_block(&stats);
        assert!(rendered.contains("Total Tasks    : 3"));
        assert!(rendered.contains("Completion Rate: 33.33%"));
    }
}
