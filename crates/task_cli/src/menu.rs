use crate::render::{statistics_block, task_details, task_table};
use std::io::{BufRead, Write};
use task_core::config::Palette;
use task_core::error::AppError;
use task_core::model::{NewTask, Priority, Task, TaskPatch, parse_due_date};
use task_core::query::{Filter, Sort, SortField, TaskQuery};
use task_core::repository::TaskRepository;
use task_core::storage::TaskStore;
use tracing::debug;

const LISTED_CHOICES: usize = 10;
// Consecutive unreadable lines at the main prompt before giving up.
const MAX_READ_FAILURES: u32 = 3;
const CLEAR_MARKER: &str = "-";

const MENU_ITEMS: [&str; 9] = [
    "Add New Task",
    "List All Tasks",
    "Update Task",
    "Mark Task as Completed",
    "Delete Task",
    "Filter Tasks",
    "Search Tasks",
    "Statistics",
    "Exit",
];

const SORT_CHOICES: [(&str, SortField); 4] = [
    ("Created Date", SortField::CreatedAt),
    ("Priority", SortField::Priority),
    ("Due Date", SortField::DueDate),
    ("Status", SortField::Status),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

pub struct Menu<'a, S, R, W, E> {
    repo: &'a TaskRepository<S>,
    input: R,
    out: W,
    err: E,
    palette: Palette,
    input_closed: bool,
}

impl<'a, S, R, W, E> Menu<'a, S, R, W, E>
where
    S: TaskStore,
    R: BufRead,
    W: Write,
    E: Write,
{
    pub fn new(repo: &'a TaskRepository<S>, input: R, out: W, err: E) -> Self {
        Self {
            repo,
            input,
            out,
            err,
            palette: Palette::default(),
            input_closed: false,
        }
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Runs until the user exits or input ends. Only failures to write to
    /// the terminal escape the loop.
    pub fn run(&mut self) -> Result<(), AppError> {
        self.welcome()?;

        let mut read_failures = 0;
        loop {
            self.show_menu()?;
            self.prompt(&format!("\nEnter your choice (1-{}): ", MENU_ITEMS.len()))?;
            let outcome = match self.read_answer() {
                Ok(None) => break,
                Ok(Some(choice)) => {
                    read_failures = 0;
                    self.dispatch(&choice)
                }
                Err(err) => {
                    read_failures += 1;
                    Err(err)
                }
            };

            match outcome {
                Ok(Flow::Exit) => break,
                Ok(Flow::Continue) => {}
                Err(err) => {
                    debug!(code = err.code(), "menu action failed");
                    writeln!(self.err, "ERROR: {err}")?;
                }
            }

            if self.input_closed || read_failures >= MAX_READ_FAILURES {
                break;
            }
        }

        writeln!(self.out, "\nGoodbye!")?;
        self.out.flush()?;
        Ok(())
    }

    fn dispatch(&mut self, choice: &str) -> Result<Flow, AppError> {
        match choice.to_ascii_lowercase().as_str() {
            "" => {}
            "1" => self.add_task()?,
            "2" => self.list_tasks()?,
            "3" => self.update_task()?,
            "4" => self.mark_completed()?,
            "5" => self.delete_task()?,
            "6" => self.filter_tasks()?,
            "7" => self.search_tasks()?,
            "8" => self.show_statistics()?,
            "9" | "exit" | "quit" => return Ok(Flow::Exit),
            other => {
                return Err(AppError::validation(format!(
                    "invalid choice '{other}'; enter a number between 1-{}",
                    MENU_ITEMS.len()
                )));
            }
        }
        Ok(Flow::Continue)
    }

    fn welcome(&mut self) -> Result<(), AppError> {
        let rule = "=".repeat(50);
        writeln!(self.out, "{rule}")?;
        writeln!(self.out, "{}", self.palette.accentize("TASK MANAGER"))?;
        writeln!(self.out, "{rule}")?;
        writeln!(self.out, "Welcome! Manage your tasks efficiently.")?;
        Ok(())
    }

    fn show_menu(&mut self) -> Result<(), AppError> {
        self.heading("MAIN MENU")?;
        for (index, label) in MENU_ITEMS.iter().enumerate() {
            writeln!(self.out, "{}. {label}", index + 1)?;
        }
        Ok(())
    }

    fn heading(&mut self, title: &str) -> Result<(), AppError> {
        writeln!(self.out, "\n{}", self.palette.accentize(&format!("--- {title} ---")))?;
        Ok(())
    }

    fn add_task(&mut self) -> Result<(), AppError> {
        self.heading("ADD NEW TASK")?;

        let Some(title) = self.ask("Task Title: ")? else {
            return Ok(());
        };
        let Some(description) = self.ask("Description (optional): ")? else {
            return Ok(());
        };
        let Some(due) = self.ask("Due Date (YYYY-MM-DD, optional): ")? else {
            return Ok(());
        };
        writeln!(self.out, "Priority Levels: Low, Medium, High")?;
        let Some(priority) = self.ask("Priority (default: Medium): ")? else {
            return Ok(());
        };

        let mut new_task = NewTask::new(title);
        if !description.is_empty() {
            new_task = new_task.with_description(description);
        }
        if !due.is_empty() {
            new_task = new_task.with_due_date(parse_due_date(&due)?);
        }
        if !priority.is_empty() {
            new_task = new_task.with_priority(priority.parse::<Priority>()?);
        }

        let task = self.repo.create(new_task)?;
        writeln!(
            self.out,
            "\nTask added: {} ({})",
            task.title,
            self.palette.accentize(task.short_id())
        )?;
        Ok(())
    }

    fn list_tasks(&mut self) -> Result<(), AppError> {
        self.heading("ALL TASKS")?;

        writeln!(self.out, "\nSort by:")?;
        for (index, (label, _)) in SORT_CHOICES.iter().enumerate() {
            writeln!(self.out, "  {}) {label}", index + 1)?;
        }
        let Some(choice) = self.ask("Choose sorting (default: 1): ")? else {
            return Ok(());
        };
        let field = sort_choice(&choice)?;

        let query = TaskQuery::builder().sort(Sort::by(field)).build()?;
        let tasks = self.collect(&query)?;
        if tasks.is_empty() {
            writeln!(self.out, "No tasks found.")?;
            return Ok(());
        }

        writeln!(self.out, "{}", task_table(&tasks))?;
        self.show_statistics()
    }

    fn update_task(&mut self) -> Result<(), AppError> {
        self.heading("UPDATE TASK")?;

        let Some(id) = self.choose_task()? else {
            return Ok(());
        };
        let task = self.repo.get(&id)?;
        writeln!(self.out, "\nCurrent Task:\n{}", task_details(&task))?;
        writeln!(
            self.out,
            "{}",
            self.palette
                .mutedize("Leave a field blank to keep it; enter '-' to clear an optional field.")
        )?;

        let mut patch = TaskPatch::default();

        let Some(title) = self.ask(&format!("New Title (current: {}): ", task.title))? else {
            return Ok(());
        };
        if title == CLEAR_MARKER {
            return Err(AppError::validation("title is required and cannot be cleared"));
        }
        if !title.is_empty() {
            patch.title = Some(title);
        }

        let Some(description) = self.ask("New Description: ")? else {
            return Ok(());
        };
        patch.description = optional_change(&description, |text| Ok(text.to_string()))?;

        let Some(due) = self.ask("New Due Date (YYYY-MM-DD): ")? else {
            return Ok(());
        };
        patch.due_date = optional_change(&due, parse_due_date)?;

        writeln!(self.out, "Priority options: Low, Medium, High")?;
        let Some(priority) = self.ask(&format!("New Priority (current: {}): ", task.priority))?
        else {
            return Ok(());
        };
        if !priority.is_empty() {
            patch.priority = Some(priority.parse()?);
        }

        writeln!(self.out, "Status options: Pending, In Progress, Completed")?;
        let Some(status) = self.ask(&format!("New Status (current: {}): ", task.status))? else {
            return Ok(());
        };
        if !status.is_empty() {
            patch.status = Some(status.parse()?);
        }

        if patch.is_empty() {
            writeln!(self.out, "\nNo changes made.")?;
            return Ok(());
        }

        let updated = self.repo.update(&task.id, patch)?;
        writeln!(self.out, "\nTask updated: {updated}")?;
        Ok(())
    }

    fn mark_completed(&mut self) -> Result<(), AppError> {
        self.heading("MARK TASK AS COMPLETED")?;

        let Some(id) = self.choose_task()? else {
            return Ok(());
        };
        let task = self.repo.mark_completed(&id)?;
        writeln!(self.out, "\nTask marked as completed: {task}")?;
        Ok(())
    }

    fn delete_task(&mut self) -> Result<(), AppError> {
        self.heading("DELETE TASK")?;

        let Some(id) = self.choose_task()? else {
            return Ok(());
        };
        let task = self.repo.get(&id)?;
        writeln!(self.out, "Task to delete: {task}")?;

        let Some(confirm) = self.ask("Are you sure you want to delete this task? (y/N): ")? else {
            return Ok(());
        };
        if matches!(confirm.to_ascii_lowercase().as_str(), "y" | "yes") {
            self.repo.delete(&task.id)?;
            writeln!(self.out, "\nTask deleted.")?;
        } else {
            writeln!(self.out, "\nDelete cancelled.")?;
        }
        Ok(())
    }

    fn filter_tasks(&mut self) -> Result<(), AppError> {
        self.heading("FILTER TASKS")?;
        writeln!(self.out, "Filter options (leave empty to skip):")?;

        let prompts = [
            ("status", "eq", "Status (Pending/In Progress/Completed): "),
            ("priority", "eq", "Priority (Low/Medium/High): "),
            ("due_date", "eq", "Due Date (YYYY-MM-DD): "),
            ("due_date", "before", "Due Before (YYYY-MM-DD): "),
            ("due_date", "after", "Due After (YYYY-MM-DD): "),
        ];

        let mut builder = TaskQuery::builder();
        for (field, op, prompt) in prompts {
            let Some(value) = self.ask(prompt)? else {
                return Ok(());
            };
            if !value.is_empty() {
                builder = builder.filter(Filter::parse(field, op, &value)?);
            }
        }

        let query = builder.sort(Sort::by(SortField::DueDate)).build()?;
        let tasks = self.collect(&query)?;
        if tasks.is_empty() {
            writeln!(self.out, "No tasks match the filter criteria.")?;
            return Ok(());
        }

        self.heading(&format!("FILTERED RESULTS ({} tasks)", tasks.len()))?;
        writeln!(self.out, "{}", task_table(&tasks))?;
        Ok(())
    }

    fn search_tasks(&mut self) -> Result<(), AppError> {
        self.heading("SEARCH TASKS")?;

        let Some(text) = self.ask("Search title or description: ")? else {
            return Ok(());
        };
        let query = TaskQuery::builder().search(text.as_str()).build()?;
        let tasks = self.collect(&query)?;
        if tasks.is_empty() {
            writeln!(self.out, "No tasks match '{text}'.")?;
            return Ok(());
        }

        self.heading(&format!("SEARCH RESULTS ({} tasks)", tasks.len()))?;
        writeln!(self.out, "{}", task_table(&tasks))?;
        Ok(())
    }

    fn show_statistics(&mut self) -> Result<(), AppError> {
        let stats = self.repo.statistics()?;
        self.heading("STATISTICS")?;
        writeln!(self.out, "{}", statistics_block(&stats))?;
        Ok(())
    }

    fn choose_task(&mut self) -> Result<Option<String>, AppError> {
        let tasks = self.collect(&TaskQuery::all())?;
        if tasks.is_empty() {
            writeln!(self.out, "No tasks available.")?;
            return Ok(None);
        }

        writeln!(self.out, "\nAvailable tasks:")?;
        for task in tasks.iter().take(LISTED_CHOICES) {
            writeln!(
                self.out,
                "  {} - {}",
                self.palette.mutedize(task.short_id()),
                task.title
            )?;
        }
        if tasks.len() > LISTED_CHOICES {
            writeln!(self.out, "  ... and {} more tasks", tasks.len() - LISTED_CHOICES)?;
        }

        let Some(prefix) = self.ask("\nEnter Task ID (first 8 characters are enough): ")? else {
            return Ok(None);
        };
        self.repo.resolve_id(&prefix).map(Some)
    }

    fn collect(&self, query: &TaskQuery) -> Result<Vec<Task>, AppError> {
        self.repo.list(query)?.collect()
    }

    /// Prompts and reads one trimmed line. `None` once input is exhausted.
    fn ask(&mut self, prompt: &str) -> Result<Option<String>, AppError> {
        self.prompt(prompt)?;
        self.read_answer()
    }

    fn prompt(&mut self, prompt: &str) -> Result<(), AppError> {
        write!(self.out, "{prompt}")?;
        self.out.flush()?;
        Ok(())
    }

    fn read_answer(&mut self) -> Result<Option<String>, AppError> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            self.input_closed = true;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

fn sort_choice(raw: &str) -> Result<SortField, AppError> {
    if raw.is_empty() {
        return Ok(SORT_CHOICES[0].1);
    }

    if let Ok(index) = raw.parse::<usize>()
        && let Some((_, field)) = index.checked_sub(1).and_then(|i| SORT_CHOICES.get(i))
    {
        return Ok(*field);
    }

    SortField::parse(raw)
}

/// Blank keeps the value, `-` clears it, anything else is parsed.
fn optional_change<T, F>(raw: &str, parse: F) -> Result<Option<Option<T>>, AppError>
where
    F: FnOnce(&str) -> Result<T, AppError>,
{
    match raw {
        "" => Ok(None),
        CLEAR_MARKER => Ok(Some(None)),
        value => parse(value).map(|parsed| Some(Some(parsed))),
    }
}
