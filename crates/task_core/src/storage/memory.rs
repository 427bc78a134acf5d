use crate::error::AppError;
use crate::model::{Task, TaskPatch};
use crate::query::TaskQuery;
use crate::stats::StatusCounts;
use crate::storage::{TaskCursor, TaskStore};
use std::cell::RefCell;
use std::collections::BTreeMap;
use time::OffsetDateTime;

#[derive(Debug, Default)]
pub struct MemoryStore {
    tasks: RefCell<BTreeMap<String, Task>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks<I: IntoIterator<Item = Task>>(tasks: I) -> Self {
        let store = Self::new();
        {
            let mut stored = store.tasks.borrow_mut();
            for task in tasks {
                stored.insert(task.id.clone(), task);
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }
}

impl TaskStore for MemoryStore {
    fn insert(&self, task: &Task) -> Result<(), AppError> {
        let mut tasks = self.tasks.borrow_mut();
        if tasks.contains_key(&task.id) {
            return Err(AppError::conflict(format!(
                "task with id {} already exists",
                task.id
            )));
        }
        tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    fn find(&self, id: &str) -> Result<Option<Task>, AppError> {
        Ok(self.tasks.borrow().get(id).cloned())
    }

    fn find_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<Task>, AppError> {
        Ok(self
            .tasks
            .borrow()
            .values()
            .filter(|task| task.id.starts_with(prefix))
            .take(limit)
            .cloned()
            .collect())
    }

    fn apply(
        &self,
        id: &str,
        patch: &TaskPatch,
        now: OffsetDateTime,
    ) -> Result<Option<Task>, AppError> {
        let mut tasks = self.tasks.borrow_mut();
        Ok(tasks.get_mut(id).map(|task| {
            patch.apply_to(task, now);
            task.clone()
        }))
    }

    fn remove(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.tasks.borrow_mut().remove(id).is_some())
    }

    fn query(&self, query: &TaskQuery) -> Result<TaskCursor<'_>, AppError> {
        let mut matched: Vec<Task> = self
            .tasks
            .borrow()
            .values()
            .filter(|task| query.matches(task))
            .cloned()
            .collect();
        matched.sort_by(|a, b| query.compare(a, b));
        Ok(Box::new(matched.into_iter().map(Ok)))
    }

    fn count_by_status(&self) -> Result<StatusCounts, AppError> {
        let mut counts = StatusCounts::default();
        for task in self.tasks.borrow().values() {
            counts.add(task.status, 1);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::model::{Priority, Task, TaskPatch, TaskStatus};
    use crate::query::TaskQuery;
    use crate::storage::TaskStore;
    use time::macros::datetime;

    fn task(id: &str, status: TaskStatus) -> Task {
        Task {
            id: id.to_string(),
            title: format!("task {id}"),
            description: None,
            status,
            priority: Priority::Medium,
            due_date: None,
            created_at: datetime!(2025-12-01 00:00:00 UTC),
            updated_at: datetime!(2025-12-01 00:00:00 UTC),
        }
    }

    #[test]
    fn insert_rejects_duplicate_id() {
        let store = MemoryStore::new();
        store.insert(&task("task-1", TaskStatus::Pending)).unwrap();

        let err = store
            .insert(&task("task-1", TaskStatus::Pending))
            .unwrap_err();

        assert_eq!(err.code(), "conflict");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn apply_returns_none_for_unknown_id() {
        let store = MemoryStore::new();
        let updated = store
            .apply(
                "missing",
                &TaskPatch::status(TaskStatus::Completed),
                datetime!(2025-12-02 00:00:00 UTC),
            )
            .unwrap();

        assert!(updated.is_none());
    }

    #[test]
    fn find_by_prefix_respects_limit() {
        let store = MemoryStore::with_tasks([
            task("abc-1", TaskStatus::Pending),
            task("abc-2", TaskStatus::Pending),
            task("abd-3", TaskStatus::Pending),
        ]);

        assert_eq!(store.find_by_prefix("ab", 2).unwrap().len(), 2);
        assert_eq!(store.find_by_prefix("abd", 2).unwrap()[0].id, "abd-3");
        assert!(store.find_by_prefix("zz", 2).unwrap().is_empty());
    }

    #[test]
    fn count_by_status_groups_tasks() {
        let store = MemoryStore::with_tasks([
            task("task-1", TaskStatus::Pending),
            task("task-2", TaskStatus::Completed),
            task("task-3", TaskStatus::Completed),
        ]);

        let counts = store.count_by_status().unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.in_progress, 0);
        assert_eq!(counts.completed, 2);
    }

    #[test]
    fn query_cursor_yields_matching_tasks() {
        let store = MemoryStore::with_tasks([
            task("task-1", TaskStatus::Pending),
            task("task-2", TaskStatus::Completed),
        ]);
        let query = TaskQuery::builder()
            .status(TaskStatus::Completed)
            .build()
            .unwrap();

        let ids: Vec<String> = store
            .query(&query)
            .unwrap()
            .map(|task| task.unwrap().id)
            .collect();

        assert_eq!(ids, vec!["task-2"]);
    }
}
