//! ddl run / ddl sync
//!
//! Both pull every configured source into the registry; `run` then builds
//! and mails the digest.

use crate::cli::Context;
use crate::config::Secrets;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::pipeline::{Delivery, Pipeline, SyncReport};

/// Options for `ddl run`
pub struct RunOptions {
    pub context: Context,
    pub secrets: Secrets,
    pub dry_run: bool,
}

/// Options for `ddl sync`
pub struct SyncOptions {
    pub context: Context,
    pub secrets: Secrets,
}

pub fn run_digest(options: RunOptions) -> Result<()> {
    let Context {
        config,
        now,
        output,
    } = options.context;

    let pipeline = Pipeline::from_config(&config, &options.secrets, !options.dry_run)?;
    let report = pipeline.run(now)?;

    let header = match report.delivery {
        Delivery::Sent => "ddl run: digest sent",
        Delivery::NothingPending => "ddl run: nothing pending, no digest sent",
        Delivery::Disabled => "ddl run: dry run, digest not sent",
    };
    let mut human = HumanOutput::new(header);
    push_sync_summary(&mut human, &report.sync);
    human.push_summary("pending", report.pending.to_string());
    human.push_summary("due this week", report.soon.to_string());
    human.push_summary("due within 24h", report.due_within_24h.to_string());
    if let Some(subject) = &report.subject {
        human.push_summary("subject", subject.clone());
    }
    push_sync_warnings(&mut human, &report.sync);
    if report.delivery == Delivery::Disabled {
        human.set_hint("ddl digest");
    }

    emit_success(output, "run", &report, Some(&human))
}

pub fn run_sync(options: SyncOptions) -> Result<()> {
    let Context {
        config,
        now,
        output,
    } = options.context;

    let pipeline = Pipeline::from_config(&config, &options.secrets, false)?;
    let report = pipeline.sync(now)?;

    let mut human = HumanOutput::new("ddl sync");
    push_sync_summary(&mut human, &report);
    for id in &report.reconcile.inserted {
        human.push_detail(format!("new: {id}"));
    }
    for id in &report.reconcile.pruned {
        human.push_detail(format!("pruned: {id}"));
    }
    push_sync_warnings(&mut human, &report);
    human.set_hint("ddl list");

    emit_success(output, "sync", &report, Some(&human))
}

fn push_sync_summary(human: &mut HumanOutput, report: &SyncReport) {
    let failed = report.sources.iter().filter(|s| s.failed()).count();
    human.push_summary(
        "sources",
        format!("{} ok, {failed} failed", report.sources.len() - failed),
    );
    human.push_summary("observed", report.observed.to_string());
    human.push_summary(
        "registry",
        format!(
            "{} tasks (+{} new, {} updated, -{} pruned)",
            report.tasks,
            report.reconcile.inserted.len(),
            report.reconcile.updated.len(),
            report.reconcile.pruned.len()
        ),
    );
}

fn push_sync_warnings(human: &mut HumanOutput, report: &SyncReport) {
    for source in &report.sources {
        if let Some(error) = &source.error {
            human.push_warning(format!("{}: {error}", source.source));
        }
    }
    if report.load.degraded {
        human.push_warning("registry file was unreadable; rebuilt from this run");
    }
    for key in &report.load.quarantined {
        human.push_warning(format!("malformed registry entry {key} left untouched"));
    }
    if !report.reconcile.unparseable.is_empty() {
        human.push_warning(format!(
            "{} task(s) with unparseable due dates kept as-is",
            report.reconcile.unparseable.len()
        ));
    }
}
