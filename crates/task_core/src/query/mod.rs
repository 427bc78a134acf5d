use crate::error::AppError;
use crate::model::{Priority, Task, TaskStatus, canonical_key, parse_due_date};
use std::cmp::Ordering;
use time::Date;
use time::macros::date;

/// Sort position of tasks without a due date; they follow every dated task.
pub const NO_DUE_DATE: Date = date!(9999 - 12 - 31);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Status(TaskStatus),
    Priority(Priority),
    DueOn(Date),
    DueBefore(Date),
    DueAfter(Date),
    TitleContains(String),
    DescriptionContains(String),
    Search(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Before,
    After,
    Contains,
}

impl Operator {
    fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        match trimmed {
            "=" | "==" => return Ok(Self::Eq),
            "<" => return Ok(Self::Before),
            ">" => return Ok(Self::After),
            "~" => return Ok(Self::Contains),
            _ => {}
        }

        match canonical_key(trimmed).as_deref() {
            Some("eq") | Some("is") | Some("equals") | Some("on") => Ok(Self::Eq),
            Some("before") | Some("lt") => Ok(Self::Before),
            Some("after") | Some("gt") => Ok(Self::After),
            Some("contains") | Some("like") => Ok(Self::Contains),
            _ => Err(AppError::validation(format!("unknown operator '{trimmed}'"))),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Before => "before",
            Self::After => "after",
            Self::Contains => "contains",
        }
    }
}

impl Filter {
    /// Builds a filter from user-entered field, operator and value.
    pub fn parse(field: &str, op: &str, value: &str) -> Result<Self, AppError> {
        let field_key = canonical_key(field)
            .ok_or_else(|| AppError::validation("filter field is required"))?;
        let operator = Operator::parse(op)?;

        match (field_key.as_str(), operator) {
            ("status", Operator::Eq) => Ok(Self::Status(value.parse()?)),
            ("priority", Operator::Eq) => Ok(Self::Priority(value.parse()?)),
            ("due_date" | "due", Operator::Eq) => Ok(Self::DueOn(parse_due_date(value)?)),
            ("due_date" | "due", Operator::Before) => Ok(Self::DueBefore(parse_due_date(value)?)),
            ("due_date" | "due", Operator::After) => Ok(Self::DueAfter(parse_due_date(value)?)),
            ("title", Operator::Contains) => Ok(Self::TitleContains(required_text(value)?)),
            ("description", Operator::Contains) => {
                Ok(Self::DescriptionContains(required_text(value)?))
            }
            (
                "status" | "priority" | "due_date" | "due" | "title" | "description" | "id"
                | "task_id" | "created_at" | "created" | "updated_at" | "updated",
                operator,
            ) => Err(AppError::validation(format!(
                "field '{field_key}' cannot be filtered with '{}'",
                operator.name()
            ))),
            (other, _) => Err(AppError::validation(format!("unknown field '{other}'"))),
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Self::Status(status) => task.status == *status,
            Self::Priority(priority) => task.priority == *priority,
            Self::DueOn(date) => task.due_date == Some(*date),
            Self::DueBefore(date) => task.due_date.is_some_and(|due| due < *date),
            Self::DueAfter(date) => task.due_date.is_some_and(|due| due > *date),
            Self::TitleContains(text) => contains_ignore_case(&task.title, text),
            Self::DescriptionContains(text) => task
                .description
                .as_deref()
                .is_some_and(|description| contains_ignore_case(description, text)),
            Self::Search(text) => {
                contains_ignore_case(&task.title, text)
                    || task
                        .description
                        .as_deref()
                        .is_some_and(|description| contains_ignore_case(description, text))
            }
        }
    }

    fn text(&self) -> Option<&str> {
        match self {
            Self::TitleContains(text) | Self::DescriptionContains(text) | Self::Search(text) => {
                Some(text)
            }
            _ => None,
        }
    }
}

fn required_text(value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("search text is required"));
    }
    Ok(trimmed.to_string())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Status,
    Priority,
    DueDate,
    CreatedAt,
}

impl SortField {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let key = canonical_key(raw).ok_or_else(|| AppError::validation("sort field is required"))?;
        match key.as_str() {
            "status" => Ok(Self::Status),
            "priority" => Ok(Self::Priority),
            "due_date" | "due" => Ok(Self::DueDate),
            "created_at" | "created" => Ok(Self::CreatedAt),
            "title" | "description" | "id" | "task_id" | "updated_at" | "updated" => Err(
                AppError::validation(format!(
                    "cannot sort by '{key}'; use status, priority, due_date or created_at"
                )),
            ),
            other => Err(AppError::validation(format!("unknown field '{other}'"))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Priority => "priority",
            Self::DueDate => "due_date",
            Self::CreatedAt => "created_at",
        }
    }

    pub fn default_direction(self) -> SortDirection {
        match self {
            Self::Priority | Self::CreatedAt => SortDirection::Descending,
            Self::Status | Self::DueDate => SortDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match canonical_key(raw).as_deref() {
            Some("asc") | Some("ascending") => Ok(Self::Ascending),
            Some("desc") | Some("descending") => Ok(Self::Descending),
            _ => Err(AppError::validation(format!(
                "sort direction must be asc or desc (got '{}')",
                raw.trim()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    pub fn by(field: SortField) -> Self {
        Self::new(field, field.default_direction())
    }

    pub fn parse(field: &str, direction: Option<&str>) -> Result<Self, AppError> {
        let field = SortField::parse(field)?;
        match direction.map(str::trim).filter(|value| !value.is_empty()) {
            Some(raw) => Ok(Self::new(field, SortDirection::parse(raw)?)),
            None => Ok(Self::by(field)),
        }
    }
}

impl Default for Sort {
    fn default() -> Self {
        Self::by(SortField::CreatedAt)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    filters: Vec<Filter>,
    sort: Sort,
}

impl TaskQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn sort(&self) -> Sort {
        self.sort
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.filters.iter().all(|filter| filter.matches(task))
    }

    /// Total order: the sort field, then identifier ascending.
    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let primary = match self.sort.field {
            SortField::Status => a.status.rank().cmp(&b.status.rank()),
            SortField::Priority => a.priority.rank().cmp(&b.priority.rank()),
            SortField::DueDate => due_key(a).cmp(&due_key(b)),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        let primary = match self.sort.direction {
            SortDirection::Ascending => primary,
            SortDirection::Descending => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

fn due_key(task: &Task) -> Date {
    task.due_date.unwrap_or(NO_DUE_DATE)
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    filters: Vec<Filter>,
    sorts: Vec<Sort>,
}

impl QueryBuilder {
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn status(self, status: TaskStatus) -> Self {
        self.filter(Filter::Status(status))
    }

    pub fn priority(self, priority: Priority) -> Self {
        self.filter(Filter::Priority(priority))
    }

    pub fn due_before(self, date: Date) -> Self {
        self.filter(Filter::DueBefore(date))
    }

    pub fn due_after(self, date: Date) -> Self {
        self.filter(Filter::DueAfter(date))
    }

    pub fn search<T: Into<String>>(self, text: T) -> Self {
        self.filter(Filter::Search(text.into().trim().to_string()))
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sorts.push(sort);
        self
    }

    pub fn sort_by(self, field: SortField) -> Self {
        self.sort(Sort::by(field))
    }

    pub fn build(self) -> Result<TaskQuery, AppError> {
        if self.sorts.len() > 1 {
            return Err(AppError::validation("only one sort field may be given"));
        }

        if self
            .filters
            .iter()
            .any(|filter| filter.text().is_some_and(str::is_empty))
        {
            return Err(AppError::validation("search text is required"));
        }

        Ok(TaskQuery {
            filters: self.filters,
            sort: self.sorts.into_iter().next().unwrap_or_default(),
        })
    }
}
