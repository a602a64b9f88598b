//! Activity log notified after each successful batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Encrypt,
    Decrypt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub user:      String,
    pub action:    Action,
    pub filename:  String,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn now(user: &str, action: Action, filename: &str) -> Self {
        Self { user: user.into(), action, filename: filename.into(), timestamp: Utc::now() }
    }
}

/// Default number of events returned by the `recent` views.
pub const DEFAULT_RECENT_LIMIT: usize = 50;

/// Newest first, optionally restricted to one user, at most `limit` events.
fn select_recent(events: Vec<ActivityEvent>, user: Option<&str>, limit: usize) -> Vec<ActivityEvent> {
    let mut selected: Vec<ActivityEvent> = events
        .into_iter()
        .filter(|e| user.map_or(true, |u| e.user == u))
        .collect();
    selected.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    selected.truncate(limit);
    selected
}

pub trait ActivityLog: Send + Sync {
    fn record(&self, event: &ActivityEvent) -> io::Result<()>;
}

/// Appends one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesActivityLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesActivityLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_owned(), lock: Mutex::new(()) }
    }

    /// All events recorded so far, oldest first.
    pub fn read_all(&self) -> io::Result<Vec<ActivityEvent>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(io::Error::from))
            .collect()
    }

    /// The `limit` most recent events, for `user` or for everyone.
    pub fn recent(&self, user: Option<&str>, limit: usize) -> io::Result<Vec<ActivityEvent>> {
        Ok(select_recent(self.read_all()?, user, limit))
    }
}

impl ActivityLog for JsonLinesActivityLog {
    fn record(&self, event: &ActivityEvent) -> io::Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        let _guard = self.lock.lock().map_err(|_| io::Error::new(io::ErrorKind::Other, "activity log lock poisoned"))?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(&line)
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryActivityLog {
    events: Mutex<Vec<ActivityEvent>>,
}

impl MemoryActivityLog {
    pub fn events(&self) -> Vec<ActivityEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn recent(&self, user: Option<&str>, limit: usize) -> Vec<ActivityEvent> {
        select_recent(self.events(), user, limit)
    }
}

impl ActivityLog for MemoryActivityLog {
    fn record(&self, event: &ActivityEvent) -> io::Result<()> {
        self.events
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "activity log lock poisoned"))?
            .push(event.clone());
        Ok(())
    }
}
