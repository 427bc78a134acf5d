use crate::error::AppError;
use crate::model::{Task, TaskPatch};
use crate::query::TaskQuery;
use crate::stats::StatusCounts;
use time::OffsetDateTime;

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::{MongoStore, StoreSettings};

pub type TaskCursor<'a> = Box<dyn Iterator<Item = Result<Task, AppError>> + 'a>;

pub trait TaskStore {
    /// Persists a new task. A duplicate identifier is a conflict.
    fn insert(&self, task: &Task) -> Result<(), AppError>;

    fn find(&self, id: &str) -> Result<Option<Task>, AppError>;

    fn find_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<Task>, AppError>;

    /// `None` when no task has `id`. `updated_at` never moves backwards.
    fn apply(
        &self,
        id: &str,
        patch: &TaskPatch,
        now: OffsetDateTime,
    ) -> Result<Option<Task>, AppError>;

    fn remove(&self, id: &str) -> Result<bool, AppError>;

    fn query(&self, query: &TaskQuery) -> Result<TaskCursor<'_>, AppError>;

    fn count_by_status(&self) -> Result<StatusCounts, AppError>;
}
