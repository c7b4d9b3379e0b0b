//! ddl complete / ddl reopen / ddl id

use serde::Serialize;

use crate::cli::Context;
use crate::error::Result;
use crate::identity;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::RegistryStore;
use crate::task::{parse_due, TaskRecord};

/// Options for `ddl complete` and `ddl reopen`
pub struct CompletedOptions {
    pub context: Context,
    pub id: String,
    pub completed: bool,
}

/// Options for `ddl id`
pub struct IdOptions {
    pub title: String,
    pub due: String,
    pub output: OutputOptions,
}

#[derive(Serialize)]
struct CompletedReport {
    task: TaskRecord,
    /// False when the flag already had the requested value.
    changed: bool,
}

#[derive(Serialize)]
struct IdReport {
    id: String,
    title: String,
    due: String,
}

pub fn run_set_completed(options: CompletedOptions) -> Result<()> {
    let Context { config, output, .. } = options.context;
    let id = options.id.trim().to_string();
    let completed = options.completed;

    let store = RegistryStore::new(&config.registry).with_lock_timeout(config.lock_timeout_ms);
    let report = store.update(|loaded| {
        let changed = loaded
            .registry
            .get(&id)
            .map(|record| record.completed != completed)
            .unwrap_or(false);
        let task = loaded.registry.set_completed(&id, completed)?.clone();
        Ok(CompletedReport { task, changed })
    })?;

    let (command, verb) = if completed {
        ("complete", "completed")
    } else {
        ("reopen", "reopened")
    };
    let header = if report.changed {
        format!("ddl {command}: {} {verb}", report.task.id)
    } else {
        format!("ddl {command}: {} already {verb}", report.task.id)
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("title", report.task.title.clone());
    human.push_summary("course", report.task.course.clone());
    human.push_summary("due", report.task.due.clone());

    emit_success(output, command, &report, Some(&human))
}

pub fn run_id(options: IdOptions) -> Result<()> {
    let due = parse_due(&options.due)?;
    let id = identity::derive(&options.title, &due);

    let report = IdReport {
        id: id.clone(),
        title: options.title,
        due: due.to_rfc3339(),
    };
    let mut human = HumanOutput::new(id);
    human.push_summary("title", report.title.clone());
    human.push_summary("due", report.due.clone());

    emit_success(options.output, "id", &report, Some(&human))
}
