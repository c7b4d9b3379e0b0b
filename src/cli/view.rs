//! ddl digest / ddl list
//!
//! Read-only views of the registry. Neither queries a source.

use serde::Serialize;

use crate::cli::Context;
use crate::digest::{partition, Digest};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::pipeline::render_options;
use crate::render::render;
use crate::storage::{LoadIssues, RegistryStore};
use crate::task::TaskRecord;
use crate::urgency::{classify, Urgency};

/// Options for `ddl digest`
pub struct DigestOptions {
    pub context: Context,
    pub html: bool,
}

/// Options for `ddl list`
pub struct ListOptions {
    pub context: Context,
}

#[derive(Serialize)]
struct DigestReport<'a> {
    subject: String,
    pending: usize,
    #[serde(flatten)]
    digest: &'a Digest,
    body: String,
    load: LoadIssues,
}

#[derive(Serialize)]
struct ListReport {
    total: usize,
    completed: usize,
    tasks: Vec<ListedTask>,
    load: LoadIssues,
}

#[derive(Serialize)]
struct ListedTask {
    #[serde(flatten)]
    record: TaskRecord,
    /// Absent once the task is past due or its due is unreadable.
    #[serde(skip_serializing_if = "Option::is_none")]
    urgency: Option<Urgency>,
}

pub fn run_digest(options: DigestOptions) -> Result<()> {
    let Context {
        config,
        now,
        output,
    } = options.context;

    let loaded = RegistryStore::new(&config.registry).load()?;
    let digest = partition(&loaded.registry, now);
    let rendered = render(&digest, now, &render_options(&config)?);
    let body = if options.html {
        rendered.html
    } else {
        rendered.text
    };

    if output.json {
        let report = DigestReport {
            subject: rendered.subject,
            pending: digest.pending(),
            digest: &digest,
            body,
            load: loaded.issues(),
        };
        return emit_success(output, "digest", &report, None);
    }

    if !output.quiet {
        println!("Subject: {}\n", rendered.subject);
        println!("{body}");
    }
    Ok(())
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let Context {
        config,
        now,
        output,
    } = options.context;

    let loaded = RegistryStore::new(&config.registry).load()?;
    let mut tasks: Vec<ListedTask> = loaded
        .registry
        .records()
        .map(|record| ListedTask {
            urgency: record
                .due_at()
                .filter(|due| *due > now)
                .map(|due| classify(due, now)),
            record: record.clone(),
        })
        .collect();
    tasks.sort_by(|a, b| {
        a.record
            .due_at()
            .cmp(&b.record.due_at())
            .then_with(|| a.record.id.cmp(&b.record.id))
    });

    let completed = tasks.iter().filter(|t| t.record.completed).count();
    let mut human = HumanOutput::new(format!(
        "ddl list: {} tasks ({completed} completed)",
        tasks.len()
    ));
    for task in &tasks {
        let mark = if task.record.completed { "x" } else { " " };
        let label = task
            .urgency
            .as_ref()
            .map(|u| u.label.clone())
            .unwrap_or_else(|| "past".to_string());
        human.push_detail(format!(
            "[{mark}] {}  {} ({}) · due {} · {label}",
            task.record.id, task.record.title, task.record.course, task.record.due
        ));
    }
    if loaded.degraded {
        human.push_warning("registry file is unreadable; showing nothing");
    }
    for key in loaded.quarantined.keys() {
        human.push_warning(format!("malformed registry entry {key} left untouched"));
    }
    if tasks.iter().any(|t| !t.record.completed) {
        human.set_hint("ddl complete <id>");
    }

    let report = ListReport {
        total: tasks.len(),
        completed,
        load: loaded.issues(),
        tasks,
    };
    emit_success(output, "list", &report, Some(&human))
}
