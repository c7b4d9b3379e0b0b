//! ddl-digest - daily deadline digest library
//!
//! Collects upcoming deadlines from several sources, keeps them in a local
//! registry where each task carries a user-owned `completed` flag, and builds
//! a daily digest of what is still pending.
//!
//! # Core Concepts
//!
//! - **Observation**: a deadline as a source reports it right now
//! - **Registry**: persisted task records keyed by a derived identity
//! - **Reconcile**: merge observations into the registry, keep completion
//!   flags, prune what is past due and no longer observed
//! - **Digest**: pending tasks split into "this week" and "later", each
//!   tagged with an urgency tier
//!
//! # Module Organization
//!
//! - `identity`: stable task ids from title and due date
//! - `zone`: the configured local time zone, DST-aware
//! - `task`: observation, record and registry types
//! - `reconcile`: the merge
//! - `urgency` / `digest`: classification and partitioning
//! - `source`: PrairieLearn and configured schedules
//! - `storage` / `lock`: registry file, locking and atomic writes
//! - `render` / `notify`: digest formatting and SMTP delivery
//! - `pipeline`: one run, end to end
//! - `config`, `error`, `output`, `cli`: the `ddl` binary's plumbing

pub mod cli;
pub mod config;
pub mod digest;
pub mod error;
pub mod identity;
pub mod lock;
pub mod notify;
pub mod output;
pub mod pipeline;
pub mod reconcile;
pub mod render;
pub mod source;
pub mod storage;
pub mod task;
pub mod urgency;
pub mod zone;

pub use error::{Error, Result};
