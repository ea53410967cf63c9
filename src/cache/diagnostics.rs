use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::gateway::Operation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// Served from a stored entry.
    Hit,
    /// Triggered the remote fetch.
    Miss,
    /// Waited on a fetch another caller had already started.
    Joined,
    Failed(String),
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStatus::Hit => f.write_str("hit"),
            CallStatus::Miss => f.write_str("miss"),
            CallStatus::Joined => f.write_str("joined"),
            CallStatus::Failed(e) => write!(f, "failed ({})", e),
        }
    }
}

/// The outcome of the most recent completed facade call.
#[derive(Debug, Clone, Serialize)]
pub struct LastCall {
    pub operation: Operation,
    pub args: String,
    pub status: CallStatus,
    pub timestamp: DateTime<Utc>,
}

impl LastCall {
    /// `"{operation} {args}: {status}"`
    pub fn log_line(&self) -> String {
        format!("{} {}: {}", self.operation, self.args, self.status)
    }
}

/// Bounded, newest-last buffer of diagnostic lines for the debug panel.
pub struct CallLog {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl CallLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            if lines.len() == self.capacity {
                lines.pop_front();
            }
            lines.push_back(line);
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }
}
