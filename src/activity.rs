//! Append-only activity log (`~/.snowdash/activity.log`).
//!
//! One line per event: `<rfc3339 timestamp> <message>`. Requests, session
//! transitions and stop actions are recorded here. Writing is best-effort and
//! never fails the calling command.

use std::fs::{self, OpenOptions, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::config::schema::{LoggingConfig, expand_home};

#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    path: Option<PathBuf>,
}

impl ActivityLog {
    /// Build a log from the resolved `[logging]` section.
    pub fn from_config(config: &LoggingConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        expand_home(&config.path)
            .map(Self::at)
            .unwrap_or_default()
    }

    /// A log that writes to an explicit file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A log that drops every event.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one event line.
    pub fn record(&self, message: &str) {
        let Some(path) = &self.path else {
            return;
        };

        if let Some(parent) = path.parent()
            && create_dir_all(parent).is_err()
        {
            return;
        }

        let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) else {
            return;
        };

        let message = message.replace(['\r', '\n'], " ");
        let _ = writeln!(file, "{} {}", Utc::now().to_rfc3339(), message);
    }

    /// Return the last `lines` entries, oldest first.
    pub fn tail(&self, lines: usize) -> Vec<String> {
        let Some(path) = &self.path else {
            return Vec::new();
        };
        let Ok(content) = fs::read_to_string(path) else {
            return Vec::new();
        };

        let all: Vec<&str> = content.lines().collect();
        let start = all.len().saturating_sub(lines);
        all[start..].iter().map(|l| (*l).to_string()).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
