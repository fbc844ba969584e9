//! Append-only log of per-resource failures collected during a run

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex};

/// One failed resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    pub url: String,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.recorded_at.format("%H:%M:%S"), self.url, self.reason)
    }
}

/// Shared handle to the error log
///
/// Clones point at the same entries, so concurrent download tasks can each
/// hold one. Entries keep insertion order, which is completion order and
/// therefore unspecified across concurrent tasks.
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    entries: Arc<Mutex<Vec<ErrorEntry>>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry
    pub fn record(&self, url: impl Into<String>, reason: impl Into<String>) {
        let entry = ErrorEntry {
            url: url.into(),
            reason: reason.into(),
            recorded_at: Utc::now(),
        };
        self.lock().push(entry);
    }

    /// Appends every entry of another log
    pub fn extend(&self, other: &ErrorLog) {
        if Arc::ptr_eq(&self.entries, &other.entries) {
            return;
        }
        let incoming = other.entries();
        self.lock().extend(incoming);
    }

    /// Snapshot of the current entries
    pub fn entries(&self) -> Vec<ErrorEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ErrorEntry>> {
        // A panic while holding the lock cannot leave a Vec half-pushed.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
