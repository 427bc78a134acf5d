mod task;

pub use task::{
    NewTask, Priority, SHORT_ID_LEN, Task, TaskPatch, TaskStatus, canonical_key, format_due_date,
    now_millis, parse_due_date,
};
