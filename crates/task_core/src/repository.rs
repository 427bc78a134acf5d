use crate::error::AppError;
use crate::model::{NewTask, Task, TaskPatch, TaskStatus, now_millis};
use crate::query::TaskQuery;
use crate::stats::Statistics;
use crate::storage::{TaskCursor, TaskStore};
use tracing::debug;
use uuid::Uuid;

/// Validated task operations over an explicitly supplied store.
pub struct TaskRepository<S> {
    store: S,
}

impl<S: TaskStore> TaskRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn create(&self, new_task: NewTask) -> Result<Task, AppError> {
        let new_task = new_task.validated()?;
        let now = now_millis();

        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: new_task.title,
            description: new_task.description,
            status: TaskStatus::Pending,
            priority: new_task.priority,
            due_date: new_task.due_date,
            created_at: now,
            updated_at: now,
        };

        self.store.insert(&task)?;
        debug!(id = %task.id, "created task");
        Ok(task)
    }

    pub fn get(&self, id: &str) -> Result<Task, AppError> {
        let id = required_id(id)?;
        self.store
            .find(id)?
            .ok_or_else(|| task_not_found(id))
    }

    /// Expands an identifier prefix, such as the short id shown in listings,
    /// to the full identifier.
    pub fn resolve_id(&self, prefix: &str) -> Result<String, AppError> {
        let prefix = required_id(prefix)?;
        let mut matches = self.store.find_by_prefix(prefix, 2)?;
        match matches.len() {
            0 => Err(task_not_found(prefix)),
            1 => Ok(matches.remove(0).id),
            _ => Err(AppError::validation(format!(
                "task id '{prefix}' is ambiguous; enter more characters"
            ))),
        }
    }

    pub fn update(&self, id: &str, patch: TaskPatch) -> Result<Task, AppError> {
        let id = required_id(id)?;
        let patch = patch.validated()?;

        let task = self
            .store
            .apply(id, &patch, now_millis())?
            .ok_or_else(|| task_not_found(id))?;
        debug!(id = %task.id, "updated task");
        Ok(task)
    }

    pub fn mark_completed(&self, id: &str) -> Result<Task, AppError> {
        self.update(id, TaskPatch::status(TaskStatus::Completed))
    }

    pub fn delete(&self, id: &str) -> Result<(), AppError> {
        let id = required_id(id)?;
        if !self.store.remove(id)? {
            return Err(task_not_found(id));
        }
        debug!(id, "deleted task");
        Ok(())
    }

    pub fn list(&self, query: &TaskQuery) -> Result<TaskCursor<'_>, AppError> {
        debug!(filters = query.filters().len(), sort = query.sort().field.name(), "listing tasks");
        self.store.query(query)
    }

    pub fn statistics(&self) -> Result<Statistics, AppError> {
        Ok(Statistics::from_counts(self.store.count_by_status()?))
    }
}

fn required_id(id: &str) -> Result<&str, AppError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("task id is required"));
    }
    Ok(trimmed)
}

fn task_not_found(id: &str) -> AppError {
    AppError::not_found(format!("task {id} not found"))
}
