//! Shared output formatting for ddl commands.
//!
//! `--json` wraps every result in a versioned envelope; otherwise a
//! [`HumanOutput`] is printed unless `--quiet` is set.

use serde::Serialize;

use crate::error::{Error, Result};

pub const SCHEMA_VERSION: &str = "ddl.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Text printed for a command when `--json` is off.
#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    fields: Vec<(String, String)>,
    lines: Vec<String>,
    warnings: Vec<String>,
    hint: Option<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            fields: Vec::new(),
            lines: Vec::new(),
            warnings: Vec::new(),
            hint: None,
        }
    }

    /// An aligned `name  value` row under the header.
    pub fn push_summary(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// A free-form row, printed after the summary rows.
    pub fn push_detail(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Also carried in the JSON envelope.
    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// The command worth running next. Human output only.
    pub fn set_hint(&mut self, command: impl Into<String>) {
        self.hint = Some(command.into());
    }
}

#[derive(Serialize)]
struct Envelope<'a, B: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    #[serde(flatten)]
    body: B,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Body<'a, T: Serialize> {
    Success {
        data: &'a T,
        #[serde(skip_serializing_if = "<[String]>::is_empty")]
        warnings: &'a [String],
    },
    Error {
        error: ErrorBody,
    },
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

fn print_envelope<T: Serialize>(command: &str, body: Body<'_, T>) -> Result<()> {
    let envelope = Envelope {
        schema_version: SCHEMA_VERSION,
        command,
        body,
    };
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let warnings = human.map(|h| h.warnings.as_slice()).unwrap_or_default();
        return print_envelope(command, Body::Success { data, warnings });
    }
    if let (false, Some(human)) = (options.quiet, human) {
        println!("{}", format_human(human));
    }
    Ok(())
}

/// Report `err` on stdout as an envelope, or on stderr with a hint.
pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    if json {
        let error = ErrorBody {
            message: err.to_string(),
            exit_code: err.exit_code(),
            details: err.details(),
        };
        return print_envelope::<()>(command, Body::Error { error });
    }

    eprintln!("error: {err}");
    if let Some(hint) = error_hint(err) {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut text = output.header.clone();

    let width = output.fields.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, value) in &output.fields {
        text.push_str(&format!("\n  {name:<width$}  {value}"));
    }
    for line in &output.lines {
        text.push_str(&format!("\n  {line}"));
    }
    for warning in &output.warnings {
        text.push_str(&format!("\nwarning: {warning}"));
    }
    if let Some(hint) = &output.hint {
        text.push_str(&format!("\nhint: {hint}"));
    }
    text
}

/// First positional argument, used to label error envelopes before clap has
/// parsed anything.
pub fn infer_command_name_from_args() -> String {
    command_name(std::env::args().skip(1))
}

fn command_name(mut args: impl Iterator<Item = String>) -> String {
    while let Some(arg) = args.next() {
        // Global options that take a value.
        if matches!(arg.as_str(), "--config" | "--registry" | "--now") {
            args.next();
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        return arg;
    }
    "ddl".to_string()
}

fn error_hint(err: &Error) -> Option<&'static str> {
    match err {
        Error::ConfigurationMissing(_) => {
            Some("export the missing variables, or use `ddl run --dry-run`")
        }
        Error::TaskNotFound(_) => Some("ddl list"),
        Error::InvalidConfig(_) | Error::TomlParse(_) => Some("fix ddl.toml then retry"),
        Error::LockFailed(_) => Some("another ddl run holds the registry; retry shortly"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> impl Iterator<Item = String> {
        raw.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn command_name_skips_global_options() {
        assert_eq!(command_name(args(&["--json", "list"])), "list");
        assert_eq!(
            command_name(args(&["--config", "x.toml", "--now", "2025-01-01T00:00:00Z", "run"])),
            "run"
        );
        assert_eq!(command_name(args(&["--quiet"])), "ddl");
    }

    #[test]
    fn human_output_aligns_fields() {
        let mut human = HumanOutput::new("ddl sync");
        human.push_summary("tasks", "3");
        human.push_summary("observed", "5");
        human.push_detail("new: hw_1__20250303");
        human.push_warning("PrairieLearn PL-1: unauthorized");
        human.set_hint("ddl list");

        assert_eq!(
            format_human(&human),
            "ddl sync\n  tasks     3\n  observed  5\n  new: hw_1__20250303\n\
             warning: PrairieLearn PL-1: unauthorized\nhint: ddl list"
        );
    }

    #[test]
    fn envelopes_carry_status_and_only_filled_fields() {
        let data = serde_json::json!({"id": "x"});
        let ok = Envelope {
            schema_version: SCHEMA_VERSION,
            command: "id",
            body: Body::Success { data: &data, warnings: &[] },
        };
        let ok = serde_json::to_value(&ok).unwrap();
        assert_eq!(ok["status"], "success");
        assert_eq!(ok["data"]["id"], "x");
        assert!(ok.get("warnings").is_none());

        let err = Error::TaskNotFound("hw_9".to_string());
        let body: Body<'_, ()> = Body::Error {
            error: ErrorBody {
                message: err.to_string(),
                exit_code: err.exit_code(),
                details: err.details(),
            },
        };
        let failed = Envelope {
            schema_version: SCHEMA_VERSION,
            command: "complete",
            body,
        };
        let failed = serde_json::to_value(&failed).unwrap();
        assert_eq!(failed["status"], "error");
        assert_eq!(failed["error"]["exit_code"], 2);
        assert_eq!(failed["error"]["details"]["id"], "hw_9");
        assert!(failed.get("data").is_none());
    }

    #[test]
    fn error_hints() {
        assert!(error_hint(&Error::ConfigurationMissing("PL_TOKEN".to_string())).is_some());
        assert_eq!(error_hint(&Error::TaskNotFound("x".to_string())), Some("ddl list"));
        assert!(error_hint(&Error::Delivery("refused".to_string())).is_none());
    }
}
