//! Per-run diagnostics log.
//!
//! One `RunLog` is created per pass and handed to every cluster task.
//! Entries are only ever appended.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    NoClusters,
    ClusterExcluded,
    NoActiveInstances,
    MetricUnavailable,
    GroupNotFound,
    ScaleCandidate,
    Decision,
    Drain,
    Terminate,
    WouldDrain,
    WouldTerminate,
    ActionFailed,
    ClusterFailed,
    RunFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Append-only log shared by the cluster tasks of one run.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    entries: Arc<Mutex<Vec<DiagnosticEntry>>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, cluster: &str, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(DiagnosticEntry {
            cluster: Some(cluster.to_string()),
            kind,
            message: message.into(),
        });
    }

    /// Record an entry not tied to a single cluster.
    pub fn record_run(&self, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(DiagnosticEntry {
            cluster: None,
            kind,
            message: message.into(),
        });
    }

    pub fn entries(&self) -> Vec<DiagnosticEntry> {
        self.lock().clone()
    }

    pub fn entries_for(&self, cluster: &str) -> Vec<DiagnosticEntry> {
        self.lock()
            .iter()
            .filter(|e| e.cluster.as_deref() == Some(cluster))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The whole log as a single JSON line.
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(&*self.lock())
            .unwrap_or_else(|e| format!("[\"unserializable run log: {e}\"]"))
    }

    fn push(&self, entry: DiagnosticEntry) {
        self.lock().push(entry);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DiagnosticEntry>> {
        // Entries are plain data; a panic mid-push cannot leave them torn.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
