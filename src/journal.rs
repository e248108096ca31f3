//! Append-only JSONL activity journal, one file per client run.
//!
//! Records requests, responses and navigations. Credentials and request
//! bodies are never written.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct Journal {
    pub path: PathBuf,
    session_id: String,
    file: File,
}

#[derive(Serialize)]
struct Event<'a> {
    ts: DateTime<Utc>,
    session_id: &'a str,
    #[serde(rename = "type")]
    event_type: &'a str,
    #[serde(flatten)]
    data: serde_json::Value,
}

impl Journal {
    pub fn new(path: &Path, session_id: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open journal {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            session_id: session_id.to_string(),
            file,
        })
    }

    /// Open `<dir>/<session_id>.jsonl`, creating `dir` if needed.
    pub fn in_dir(dir: &Path, session_id: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create journal dir {}", dir.display()))?;
        Self::new(&dir.join(format!("{}.jsonl", session_id)), session_id)
    }

    pub fn log(&mut self, event_type: &str, data: serde_json::Value) -> Result<()> {
        let event = Event {
            ts: Utc::now(),
            session_id: &self.session_id,
            event_type,
            data,
        };
        let line = serde_json::to_string(&event)?;
        writeln!(self.file, "{}", line)?;
        self.file.flush()?;
        Ok(())
    }

    pub fn request(&mut self, method: &str, path: &str, authenticated: bool) -> Result<()> {
        self.log(
            "request",
            serde_json::json!({
                "method": method,
                "path": path,
                "authenticated": authenticated,
            }),
        )
    }

    pub fn response(&mut self, method: &str, path: &str, status: u16, duration_ms: u64) -> Result<()> {
        self.log(
            "response",
            serde_json::json!({
                "method": method,
                "path": path,
                "status": status,
                "duration_ms": duration_ms,
            }),
        )
    }

    pub fn network_error(&mut self, method: &str, path: &str, error: &str) -> Result<()> {
        self.log(
            "network_error",
            serde_json::json!({
                "method": method,
                "path": path,
                "error": error,
            }),
        )
    }

    pub fn navigation(&mut self, from: &str, to: &str) -> Result<()> {
        self.log("navigation", serde_json::json!({ "from": from, "to": to }))
    }

    pub fn login(&mut self, username: &str) -> Result<()> {
        self.log("login", serde_json::json!({ "username": username }))
    }

    pub fn logout(&mut self) -> Result<()> {
        self.log("logout", serde_json::json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn read_events(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_events_are_appended_as_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = Journal::in_dir(&dir.path().join("journal"), "abc").unwrap();
        journal.request("GET", "vuelos/api/vuelos/", true).unwrap();
        journal.response("GET", "vuelos/api/vuelos/", 200, 12).unwrap();
        journal.navigation("/vuelos", "/auth/login").unwrap();

        let events = read_events(&journal.path);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["type"], "request");
        assert_eq!(events[0]["session_id"], "abc");
        assert_eq!(events[0]["authenticated"], true);
        assert_eq!(events[1]["status"], 200);
        assert_eq!(events[2]["to"], "/auth/login");
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        Journal::new(&path, "s").unwrap().logout().unwrap();
        Journal::new(&path, "s").unwrap().login("ana").unwrap();
        let events = read_events(&path);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1]["username"], "ana");
    }
}
