//! One digest run, end to end.
//!
//! gather observations -> locked load/reconcile/save -> partition -> render
//! -> deliver. Everything that can be missing (tokens, mail credentials) is
//! checked in [`Pipeline::from_config`], before any source is queried or the
//! registry is touched.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{Config, Secrets};
use crate::digest::{partition, Digest};
use crate::error::Result;
use crate::notify::{Notifier, SmtpNotifier};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::render::{render, RenderOptions, RenderedDigest};
use crate::source::{self, gather, ObservationSource, SourceReport};
use crate::storage::{LoadIssues, RegistryStore};
use crate::task::Registry;

pub struct Pipeline {
    pub store: RegistryStore,
    pub reconciler: Reconciler,
    pub sources: Vec<Box<dyn ObservationSource>>,
    pub render: RenderOptions,
    pub notifier: Option<Box<dyn Notifier>>,
}

/// What the sync half of a run did.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub sources: Vec<SourceReport>,
    pub observed: usize,
    pub load: LoadIssues,
    pub reconcile: ReconcileReport,
    pub tasks: usize,
    #[serde(skip)]
    pub registry: Registry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    Sent,
    NothingPending,
    Disabled,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub sync: SyncReport,
    pub pending: usize,
    pub soon: usize,
    pub later: usize,
    pub due_within_24h: usize,
    pub delivery: Delivery,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl Pipeline {
    /// Build a pipeline from configuration.
    ///
    /// With `deliver` set, missing mail credentials abort here.
    pub fn from_config(config: &Config, secrets: &Secrets, deliver: bool) -> Result<Self> {
        let notifier: Option<Box<dyn Notifier>> = if deliver {
            let credentials = secrets.require_mail()?;
            Some(Box::new(SmtpNotifier::new(&config.smtp, credentials)?))
        } else {
            None
        };
        let sources = source::from_config(config, secrets)?;

        Ok(Self {
            store: RegistryStore::new(config.registry.clone())
                .with_lock_timeout(config.lock_timeout_ms),
            reconciler: Reconciler {
                refresh_source: config.refresh_source,
            },
            sources,
            render: render_options(config)?,
            notifier,
        })
    }

    /// Gather, then reconcile into the registry under its lock.
    pub fn sync(&self, now: DateTime<FixedOffset>) -> Result<SyncReport> {
        let gathered = gather(&self.sources, now);
        let failed = gathered.reports.iter().filter(|r| r.failed()).count();
        info!(
            observed = gathered.observations.len(),
            sources = gathered.reports.len(),
            failed,
            "observations gathered"
        );

        let reconciler = self.reconciler;
        let observations = gathered.observations;
        let (registry, load, reconcile) = self.store.update(|loaded| {
            if loaded.degraded {
                warn!(path = %self.store.path().display(), "registry was unusable; rebuilding from this run");
            }
            let (merged, report) = reconciler.reconcile(&loaded.registry, &observations, now);
            loaded.registry = merged;
            Ok((loaded.registry.clone(), loaded.issues(), report))
        })?;

        info!(
            tasks = registry.len(),
            inserted = reconcile.inserted.len(),
            updated = reconcile.updated.len(),
            pruned = reconcile.pruned.len(),
            "registry updated"
        );

        Ok(SyncReport {
            sources: gathered.reports,
            observed: observations.len(),
            load,
            reconcile,
            tasks: registry.len(),
            registry,
        })
    }

    /// Full run: sync, build the digest and deliver it if anything is pending.
    pub fn run(&self, now: DateTime<FixedOffset>) -> Result<RunReport> {
        let sync = self.sync(now)?;
        let digest = partition(&sync.registry, now);
        info!(pending = digest.pending(), due_within_24h = digest.due_within_24h, "digest built");

        let (delivery, subject) = self.deliver(&digest, now)?;

        Ok(RunReport {
            pending: digest.pending(),
            soon: digest.soon.len(),
            later: digest.later.len(),
            due_within_24h: digest.due_within_24h,
            delivery,
            subject,
            sync,
        })
    }

    fn deliver(
        &self,
        digest: &Digest,
        now: DateTime<FixedOffset>,
    ) -> Result<(Delivery, Option<String>)> {
        if digest.is_empty() {
            info!("nothing pending; skipping delivery");
            return Ok((Delivery::NothingPending, None));
        }

        let rendered: RenderedDigest = render(digest, now, &self.render);
        match &self.notifier {
            Some(notifier) => {
                notifier.send(&rendered)?;
                Ok((Delivery::Sent, Some(rendered.subject)))
            }
            None => Ok((Delivery::Disabled, Some(rendered.subject))),
        }
    }
}

/// Presentation options from the `[digest]` section.
pub fn render_options(config: &Config) -> Result<RenderOptions> {
    Ok(RenderOptions {
        dashboard_url: config.digest.dashboard_url.clone(),
        banner_weekday: config.digest.banner_weekday()?,
        banner: config.digest.banner.clone(),
    })
}
