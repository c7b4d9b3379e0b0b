//! Configuration loading and management
//!
//! Handles parsing of `ddl.toml`. Secrets never live in the file; they are
//! read from the environment into [`Secrets`] and checked before a run
//! touches anything.

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;
use crate::storage::REGISTRY_FILE;
use crate::task::parse_due;
use crate::zone::Zone;

/// Default configuration file name
pub const CONFIG_FILE: &str = "ddl.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path of the persisted task registry
    #[serde(default = "default_registry")]
    pub registry: PathBuf,

    /// Zone used for "now", generated schedules, ids and displayed times:
    /// an IANA name such as "America/Chicago" or a fixed "-06:00"
    #[serde(default = "default_timezone", alias = "utc_offset")]
    pub timezone: String,

    /// How long to wait for the registry lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Let the latest observation overwrite a record's source tag
    #[serde(default = "default_true")]
    pub refresh_source: bool,

    /// PrairieLearn fetcher
    #[serde(default)]
    pub prairielearn: Option<PrairieLearnConfig>,

    /// Weekly recurring deadlines
    #[serde(default)]
    pub weekly: Vec<WeeklyConfig>,

    /// Hardcoded one-off deadlines
    #[serde(default)]
    pub deadlines: Vec<DeadlineConfig>,

    /// Mail delivery
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Digest presentation
    #[serde(default)]
    pub digest: DigestConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry: default_registry(),
            timezone: default_timezone(),
            lock_timeout_ms: default_lock_timeout_ms(),
            refresh_source: true,
            prairielearn: None,
            weekly: Vec::new(),
            deadlines: Vec::new(),
            smtp: SmtpConfig::default(),
            digest: DigestConfig::default(),
        }
    }
}

fn default_registry() -> PathBuf {
    PathBuf::from(REGISTRY_FILE)
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

/// PrairieLearn REST fetcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrairieLearnConfig {
    #[serde(default = "default_pl_base_url")]
    pub base_url: String,

    /// Course instance ids to poll, one request each
    #[serde(default)]
    pub course_instances: Vec<u64>,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_pl_base_url() -> String {
    "https://us.prairielearn.com".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

/// A deadline that repeats every week on the same weekday and time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyConfig {
    pub course: String,

    /// Display title; `{week}` is replaced with the week number
    pub title: String,

    /// Identity seed prefix; the week number is appended
    pub key_prefix: String,

    /// e.g. "mon"
    pub weekday: String,

    /// Local time of day, "HH:MM"
    #[serde(default = "default_weekly_time")]
    pub time: String,

    /// Date of week 1 (must fall on `weekday`)
    pub first_due: String,

    /// No occurrences after this date
    pub last_date: String,

    #[serde(default = "default_weekly_source")]
    pub source: String,

    #[serde(default)]
    pub url: Option<String>,
}

fn default_weekly_time() -> String {
    "23:59".to_string()
}

fn default_weekly_source() -> String {
    "Schedule".to_string()
}

/// Parsed form of [`WeeklyConfig`]'s calendar fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyRule {
    pub weekday: Weekday,
    pub time: NaiveTime,
    pub first_due: NaiveDate,
    pub last_date: NaiveDate,
}

impl WeeklyConfig {
    pub fn rule(&self) -> Result<WeeklyRule> {
        let field = |name: &str| format!("weekly[{}].{name}", self.key_prefix);

        let weekday: Weekday = self.weekday.trim().parse().map_err(|_| {
            Error::InvalidConfig(format!("{}: invalid weekday '{}'", field("weekday"), self.weekday))
        })?;
        let time = NaiveTime::parse_from_str(self.time.trim(), "%H:%M").map_err(|err| {
            Error::InvalidConfig(format!("{}: invalid time '{}': {err}", field("time"), self.time))
        })?;
        let first_due = parse_date(&self.first_due, &field("first_due"))?;
        let last_date = parse_date(&self.last_date, &field("last_date"))?;

        if first_due.weekday() != weekday {
            return Err(Error::InvalidConfig(format!(
                "{}: {first_due} is not a {weekday}",
                field("first_due")
            )));
        }
        if last_date < first_due {
            return Err(Error::InvalidConfig(format!(
                "{}: ends before first_due",
                field("last_date")
            )));
        }

        Ok(WeeklyRule {
            weekday,
            time,
            first_due,
            last_date,
        })
    }
}

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| Error::InvalidConfig(format!("{field}: invalid date '{raw}': {err}")))
}

/// A single hardcoded deadline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlineConfig {
    pub title: String,
    pub course: String,
    /// ISO-8601 with offset
    pub due: String,
    #[serde(default = "default_deadline_source")]
    pub source: String,
    #[serde(default)]
    pub url: Option<String>,
}

fn default_deadline_source() -> String {
    "Manual".to_string()
}

/// SMTP delivery settings (credentials come from the environment)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,

    /// Implicit TLS port
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Sender address; defaults to the SMTP username
    #[serde(default)]
    pub from: Option<String>,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    465
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            from: None,
        }
    }
}

/// Digest presentation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Where the recipient marks tasks complete
    #[serde(default)]
    pub dashboard_url: Option<String>,

    /// Weekday on which `banner` is shown and used as the subject
    #[serde(default)]
    pub banner_weekday: Option<String>,

    #[serde(default)]
    pub banner: Option<String>,
}

impl DigestConfig {
    pub fn banner_weekday(&self) -> Result<Option<Weekday>> {
        self.banner_weekday
            .as_deref()
            .map(|raw| {
                raw.trim().parse::<Weekday>().map_err(|_| {
                    Error::InvalidConfig(format!("digest.banner_weekday: invalid weekday '{raw}'"))
                })
            })
            .transpose()
    }
}

impl Config {
    /// Load configuration from a `ddl.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise return defaults.
    ///
    /// Unlike a missing file, an invalid one is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parsed `timezone`
    pub fn zone(&self) -> Result<Zone> {
        Zone::parse(&self.timezone)
    }

    /// Whether any configured source needs the PrairieLearn token
    pub fn needs_pl_token(&self) -> bool {
        self.prairielearn
            .as_ref()
            .map(|pl| !pl.course_instances.is_empty())
            .unwrap_or(false)
    }

    fn validate(&self) -> Result<()> {
        self.zone()?;

        if self.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "lock_timeout_ms must be > 0".to_string(),
            ));
        }

        if let Some(pl) = &self.prairielearn {
            let base = pl.base_url.trim();
            if !base.starts_with("http://") && !base.starts_with("https://") {
                return Err(Error::InvalidConfig(format!(
                    "prairielearn.base_url must be http(s): '{base}'"
                )));
            }
            if pl.timeout_secs == 0 {
                return Err(Error::InvalidConfig(
                    "prairielearn.timeout_secs must be > 0".to_string(),
                ));
            }
        }

        let mut prefixes = std::collections::HashSet::new();
        for weekly in &self.weekly {
            if weekly.key_prefix.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "weekly.key_prefix cannot be empty".to_string(),
                ));
            }
            if !prefixes.insert(weekly.key_prefix.trim().to_string()) {
                return Err(Error::InvalidConfig(format!(
                    "weekly.key_prefix '{}' is used twice",
                    weekly.key_prefix
                )));
            }
            weekly.rule()?;
        }

        for deadline in &self.deadlines {
            if deadline.title.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "deadlines.title cannot be empty".to_string(),
                ));
            }
            // Malformed dues are skipped at run time, but flag them early.
            if let Err(err) = parse_due(&deadline.due) {
                tracing::warn!(title = %deadline.title, error = %err, "deadline will be skipped");
            }
        }

        self.digest.banner_weekday()?;
        Ok(())
    }
}

/// Secrets supplied through the environment.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub pl_token: Option<String>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub recipient: Option<String>,
}

/// Secrets needed to deliver a digest.
#[derive(Debug, Clone)]
pub struct MailCredentials {
    pub username: String,
    pub password: String,
    pub recipient: String,
}

impl Secrets {
    /// Fail fast when a configured source needs a token that is missing.
    pub fn require_sources(&self, config: &Config) -> Result<()> {
        if config.needs_pl_token() && non_empty(&self.pl_token).is_none() {
            return Err(Error::ConfigurationMissing(
                "PL_TOKEN is required when prairielearn.course_instances is set".to_string(),
            ));
        }
        Ok(())
    }

    /// Fail fast when delivery credentials or the recipient are missing.
    pub fn require_mail(&self) -> Result<MailCredentials> {
        let missing: Vec<&str> = [
            ("SMTP_USERNAME", &self.smtp_username),
            ("SMTP_PASSWORD", &self.smtp_password),
            ("DIGEST_TO", &self.recipient),
        ]
        .into_iter()
        .filter(|(_, value)| non_empty(value).is_none())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(Error::ConfigurationMissing(missing.join(", ")));
        }

        Ok(MailCredentials {
            username: non_empty(&self.smtp_username).unwrap_or_default(),
            password: non_empty(&self.smtp_password).unwrap_or_default(),
            recipient: non_empty(&self.recipient).unwrap_or_default(),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
