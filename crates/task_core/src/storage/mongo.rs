use crate::error::AppError;
use crate::model::{Priority, Task, TaskPatch, TaskStatus, format_due_date, parse_due_date};
use crate::query::{Filter, NO_DUE_DATE, Sort, SortDirection, SortField, TaskQuery};
use crate::stats::StatusCounts;
use crate::storage::{TaskCursor, TaskStore};
use mongodb::IndexModel;
use mongodb::bson::{Bson, DateTime, Document, doc};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument};
use mongodb::sync::{Client, Collection, Database};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

pub struct MongoStore {
    database: Database,
    collection: Collection<TaskDocument>,
}

impl MongoStore {
    /// Opens the client, pings the server and ensures the `task_id` index.
    pub fn connect(settings: &StoreSettings) -> Result<Self, AppError> {
        let client = Client::with_uri_str(&settings.uri).map_err(map_error)?;
        let database = client.database(&settings.database);
        database
            .run_command(doc! { "ping": 1 }, None)
            .map_err(map_error)?;

        let collection = database.collection::<TaskDocument>(&settings.collection);
        let store = Self {
            database,
            collection,
        };
        store.ensure_indexes()?;
        store.backfill_sort_keys()?;

        info!(
            database = %settings.database,
            collection = %settings.collection,
            "connected to MongoDB"
        );
        Ok(store)
    }

    pub fn ensure_indexes(&self) -> Result<(), AppError> {
        let index = IndexModel::builder()
            .keys(doc! { "task_id": 1 })
            .options(Some(IndexOptions::builder().unique(true).build()))
            .build();
        self.collection
            .create_index(index, None)
            .map_err(map_error)?;
        debug!(collection = %self.collection.name(), "task_id index ready");
        Ok(())
    }

    /// Fills rank and due keys on documents written without them, such as
    /// tasks created by older tools sharing the collection.
    pub fn backfill_sort_keys(&self) -> Result<(), AppError> {
        let result = self
            .collection
            .update_many(missing_sort_keys_filter(), sort_key_backfill()?, None)
            .map_err(map_error)?;
        if result.modified_count > 0 {
            info!(count = result.modified_count, "backfilled task sort keys");
        }
        Ok(())
    }

    pub fn database_name(&self) -> &str {
        self.database.name()
    }

    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }
}

impl TaskStore for MongoStore {
    fn insert(&self, task: &Task) -> Result<(), AppError> {
        let document = TaskDocument::from_task(task)?;
        self.collection
            .insert_one(&document, None)
            .map_err(map_error)?;
        Ok(())
    }

    fn find(&self, id: &str) -> Result<Option<Task>, AppError> {
        self.collection
            .find_one(doc! { "task_id": id }, None)
            .map_err(map_error)?
            .map(TaskDocument::into_task)
            .transpose()
    }

    fn find_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<Task>, AppError> {
        let filter = doc! {
            "task_id": { "$regex": format!("^{}", regex::escape(prefix)) }
        };
        let options = FindOptions::builder()
            .sort(doc! { "task_id": 1 })
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .build();

        self.collection
            .find(filter, options)
            .map_err(map_error)?
            .map(|result| result.map_err(map_error).and_then(TaskDocument::into_task))
            .collect()
    }

    fn apply(
        &self,
        id: &str,
        patch: &TaskPatch,
        now: OffsetDateTime,
    ) -> Result<Option<Task>, AppError> {
        let update = update_document(patch, now)?;
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.collection
            .find_one_and_update(doc! { "task_id": id }, update, options)
            .map_err(map_error)?
            .map(TaskDocument::into_task)
            .transpose()
    }

    fn remove(&self, id: &str) -> Result<bool, AppError> {
        let result = self
            .collection
            .delete_one(doc! { "task_id": id }, None)
            .map_err(map_error)?;
        Ok(result.deleted_count > 0)
    }

    fn query(&self, query: &TaskQuery) -> Result<TaskCursor<'_>, AppError> {
        let filter = filter_document(query)?;
        let options = FindOptions::builder()
            .sort(sort_document(query.sort()))
            .build();
        debug!(filter = %filter, "querying tasks");

        let cursor = self.collection.find(filter, options).map_err(map_error)?;
        Ok(Box::new(cursor.map(|result| {
            result.map_err(map_error).and_then(TaskDocument::into_task)
        })))
    }

    fn count_by_status(&self) -> Result<StatusCounts, AppError> {
        let pipeline = vec![doc! {
            "$group": { "_id": "$status", "count": { "$sum": 1 } }
        }];
        let cursor = self
            .collection
            .aggregate(pipeline, None)
            .map_err(map_error)?;

        let mut counts = StatusCounts::default();
        for result in cursor {
            let group = result.map_err(map_error)?;
            let label = group
                .get_str("_id")
                .map_err(|_| AppError::invalid_data("task document without a status"))?;
            let status: TaskStatus = label
                .parse()
                .map_err(|_| AppError::invalid_data(format!("unknown stored status '{label}'")))?;
            let count = match group.get("count") {
                Some(Bson::Int32(count)) => u64::try_from(*count).ok(),
                Some(Bson::Int64(count)) => u64::try_from(*count).ok(),
                _ => None,
            }
            .ok_or_else(|| AppError::invalid_data("status count is not a number"))?;
            counts.add(status, count);
        }
        Ok(counts)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TaskDocument {
    task_id: String,
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    status: TaskStatus,
    status_rank: i32,
    priority: Priority,
    priority_rank: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    due_date: Option<String>,
    due_key: String,
    created_at: DateTime,
    updated_at: DateTime,
}

impl TaskDocument {
    fn from_task(task: &Task) -> Result<Self, AppError> {
        let due_date = task.due_date.map(format_due_date).transpose()?;
        Ok(Self {
            task_id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            status_rank: task.status.rank(),
            priority: task.priority,
            priority_rank: task.priority.rank(),
            due_key: due_key(due_date.as_deref())?,
            due_date,
            created_at: to_bson_datetime(task.created_at),
            updated_at: to_bson_datetime(task.updated_at),
        })
    }

    fn into_task(self) -> Result<Task, AppError> {
        let due_date = match self.due_date.as_deref() {
            Some(raw) => Some(parse_due_date(raw).map_err(|err| {
                AppError::invalid_data(format!("task {}: {}", self.task_id, err.message()))
            })?),
            None => None,
        };

        Ok(Task {
            due_date,
            description: self.description,
            status: self.status,
            priority: self.priority,
            created_at: from_bson_datetime(self.created_at)?,
            updated_at: from_bson_datetime(self.updated_at)?,
            title: self.title,
            id: self.task_id,
        })
    }
}

fn due_key(due_date: Option<&str>) -> Result<String, AppError> {
    match due_date {
        Some(date) => Ok(date.to_string()),
        None => format_due_date(NO_DUE_DATE),
    }
}

fn missing_sort_keys_filter() -> Document {
    doc! {
        "$or": [
            { "status_rank": { "$exists": false } },
            { "priority_rank": { "$exists": false } },
            { "due_key": { "$exists": false } },
        ]
    }
}

fn sort_key_backfill() -> Result<Vec<Document>, AppError> {
    let status_branches: Vec<Document> = TaskStatus::ALL
        .iter()
        .map(|status| doc! { "case": { "$eq": ["$status", status.label()] }, "then": status.rank() })
        .collect();
    let priority_branches: Vec<Document> = Priority::ALL
        .iter()
        .map(|priority| {
            doc! { "case": { "$eq": ["$priority", priority.label()] }, "then": priority.rank() }
        })
        .collect();

    Ok(vec![doc! {
        "$set": {
            "status_rank": { "$switch": { "branches": status_branches, "default": 0 } },
            "priority_rank": { "$switch": { "branches": priority_branches, "default": 0 } },
            "due_key": { "$ifNull": ["$due_date", due_key(None)?] },
        }
    }])
}

fn to_bson_datetime(timestamp: OffsetDateTime) -> DateTime {
    let millis = timestamp.unix_timestamp_nanos() / 1_000_000;
    DateTime::from_millis(i64::try_from(millis).unwrap_or(i64::MAX))
}

fn from_bson_datetime(timestamp: DateTime) -> Result<OffsetDateTime, AppError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(timestamp.timestamp_millis()) * 1_000_000)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

fn filter_document(query: &TaskQuery) -> Result<Document, AppError> {
    let mut clauses = query
        .filters()
        .iter()
        .map(filter_clause)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(match clauses.len() {
        0 => Document::new(),
        1 => clauses.remove(0),
        _ => doc! { "$and": clauses },
    })
}

fn filter_clause(filter: &Filter) -> Result<Document, AppError> {
    Ok(match filter {
        Filter::Status(status) => doc! { "status": status.label() },
        Filter::Priority(priority) => doc! { "priority": priority.label() },
        Filter::DueOn(date) => doc! { "due_date": format_due_date(*date)? },
        Filter::DueBefore(date) => doc! { "due_date": { "$lt": format_due_date(*date)? } },
        Filter::DueAfter(date) => doc! { "due_date": { "$gt": format_due_date(*date)? } },
        Filter::TitleContains(text) => doc! { "title": contains_regex(text) },
        Filter::DescriptionContains(text) => doc! { "description": contains_regex(text) },
        Filter::Search(text) => doc! {
            "$or": [
                { "title": contains_regex(text) },
                { "description": contains_regex(text) },
            ]
        },
    })
}

fn contains_regex(text: &str) -> Document {
    doc! { "$regex": regex::escape(text), "$options": "i" }
}

fn sort_document(sort: Sort) -> Document {
    let field = match sort.field {
        SortField::Status => "status_rank",
        SortField::Priority => "priority_rank",
        SortField::DueDate => "due_key",
        SortField::CreatedAt => "created_at",
    };
    let direction = match sort.direction {
        SortDirection::Ascending => 1,
        SortDirection::Descending => -1,
    };

    let mut document = Document::new();
    document.insert(field, direction);
    document.insert("task_id", 1);
    document
}

fn update_document(patch: &TaskPatch, now: OffsetDateTime) -> Result<Document, AppError> {
    let mut set = Document::new();
    let mut unset = Document::new();

    if let Some(title) = &patch.title {
        set.insert("title", title.as_str());
    }
    match &patch.description {
        Some(Some(description)) => {
            set.insert("description", description.as_str());
        }
        Some(None) => {
            unset.insert("description", "");
        }
        None => {}
    }
    if let Some(status) = patch.status {
        set.insert("status", status.label());
        set.insert("status_rank", status.rank());
    }
    if let Some(priority) = patch.priority {
        set.insert("priority", priority.label());
        set.insert("priority_rank", priority.rank());
    }
    match patch.due_date {
        Some(Some(date)) => {
            let formatted = format_due_date(date)?;
            set.insert("due_date", formatted.as_str());
            set.insert("due_key", formatted);
        }
        Some(None) => {
            unset.insert("due_date", "");
            set.insert("due_key", due_key(None)?);
        }
        None => {}
    }

    // $max keeps updated_at monotonic even if the local clock steps back.
    let mut update = doc! { "$max": { "updated_at": to_bson_datetime(now) } };
    if !set.is_empty() {
        update.insert("$set", set);
    }
    if !unset.is_empty() {
        update.insert("$unset", unset);
    }
    Ok(update)
}

fn map_error(err: MongoError) -> AppError {
    let message = err.to_string();
    match err.kind.as_ref() {
        ErrorKind::InvalidArgument { .. } => AppError::validation(message),
        ErrorKind::BsonDeserialization(_) | ErrorKind::BsonSerialization(_) => {
            AppError::invalid_data(message)
        }
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            map_write_error(write_error.code, message)
        }
        _ => AppError::store_unavailable(message),
    }
}

fn map_write_error(code: i32, message: String) -> AppError {
    if code == DUPLICATE_KEY_CODE {
        AppError::conflict(message)
    } else {
        AppError::store_unavailable(message)
    }
}
