pub mod config;
pub mod error;
pub mod model;
pub mod query;
pub mod repository;
pub mod stats;
pub mod storage;

pub use error::{AppError, AppResult};
pub use repository::TaskRepository;

#[cfg(test)]
mod tests {
    use crate::error::AppError;
    use crate::model::{NewTask, Priority, TaskStatus};
    use crate::repository::TaskRepository;
    use crate::storage::MemoryStore;

    #[test]
    fn new_task_starts_pending() {
        let repo = TaskRepository::new(MemoryStore::new());
        let task = repo
            .create(NewTask::new("demo").with_priority(Priority::High))
            .unwrap();

        assert_eq!(task.title, "demo");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.description, None);
        assert_eq!(task.due_date, None);
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn app_error_exposes_code() {
        let err = AppError::validation("missing title");
        assert_eq!(err.code(), "validation");
        assert_eq!(err.to_string(), "validation - missing title");
    }
}
