#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// Environment the binary would otherwise pick up from the developer's shell.
const AMBIENT_VARS: [&str; 6] = [
    "DDL_CONFIG",
    "PL_TOKEN",
    "SMTP_USERNAME",
    "SMTP_PASSWORD",
    "DIGEST_TO",
    "RUST_LOG",
];

/// A scratch directory holding a config and a registry.
pub struct TestHome {
    dir: TempDir,
}

impl TestHome {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn registry_path(&self) -> PathBuf {
        self.dir.path().join("tasks.json")
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("ddl.toml")
    }

    pub fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.config_path();
        fs::write(&path, contents).expect("write config");
        path
    }

    pub fn write_registry(&self, contents: &str) {
        fs::write(self.registry_path(), contents).expect("write registry");
    }

    pub fn read_registry(&self) -> Value {
        let raw = fs::read_to_string(self.registry_path()).expect("read registry");
        serde_json::from_str(&raw).expect("registry json")
    }

    /// `ddl` running inside this directory with a clean environment.
    pub fn ddl(&self) -> Command {
        let mut cmd = Command::cargo_bin("ddl").expect("binary");
        cmd.current_dir(self.path());
        for var in AMBIENT_VARS {
            cmd.env_remove(var);
        }
        cmd
    }
}

pub fn record(id: &str, title: &str, due: &str, completed: bool) -> Value {
    serde_json::json!({
        "id": id,
        "title": title,
        "course": "BioE 210",
        "due": due,
        "source": "Canvas",
        "url": "https://canvas.illinois.edu",
        "completed": completed,
    })
}

pub fn registry_json(records: &[Value]) -> String {
    let mut map = serde_json::Map::new();
    for record in records {
        let id = record["id"].as_str().expect("id").to_string();
        map.insert(id, record.clone());
    }
    serde_json::to_string_pretty(&Value::Object(map)).expect("serialize")
}

/// Parse a `--json` envelope from stdout.
pub fn envelope(stdout: &[u8]) -> Value {
    serde_json::from_slice(stdout).expect("json envelope")
}
