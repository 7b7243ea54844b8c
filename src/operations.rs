//! Per-invocation operation records and progress events.
//!
//! A record exists only while its tool call runs: `begin` creates it,
//! `progress` moves it forward, `complete`/`fail` delete it.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub id: OperationId,
    pub tool: String,
    pub started_at: DateTime<Utc>,
    pub progress: u8,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Started,
    Progress,
    Completed,
    Failed,
}

/// Emitted to every listener, in order, for each state change.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub id: OperationId,
    pub tool: String,
    pub phase: Phase,
    pub progress: u8,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressError {
    #[error("operation {0} is not active")]
    NotActive(OperationId),
    #[error("progress {value} is outside 0..=100")]
    OutOfRange { value: i64 },
    #[error("progress may not go backwards ({current} -> {value})")]
    Regressed { current: u8, value: u8 },
}

pub type ProgressListener = Box<dyn FnMut(&ProgressEvent)>;

#[derive(Default)]
pub struct OperationTracker {
    active: HashMap<OperationId, OperationRecord>,
    listeners: Vec<ProgressListener>,
}

impl fmt::Debug for OperationTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationTracker")
            .field("active", &self.active)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&ProgressEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&mut self, record: &OperationRecord, phase: Phase) {
        let event = ProgressEvent {
            id: record.id,
            tool: record.tool.clone(),
            phase,
            progress: record.progress,
            message: record.message.clone(),
        };
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    /// Allocate a fresh id and create its record at 0%.
    pub fn begin(&mut self, tool: &str) -> OperationId {
        let id = OperationId::new();
        let record = OperationRecord {
            id,
            tool: tool.to_string(),
            started_at: Utc::now(),
            progress: 0,
            message: format!("Starting {tool}"),
        };
        self.emit(&record, Phase::Started);
        self.active.insert(id, record);
        id
    }

    /// Advance progress. Values outside 0..=100 and decreases are rejected;
    /// repeating the current value is allowed.
    pub fn progress(&mut self, id: OperationId, value: i64, message: &str) -> Result<(), ProgressError> {
        let value = u8::try_from(value)
            .ok()
            .filter(|v| *v <= 100)
            .ok_or(ProgressError::OutOfRange { value })?;
        let record = self.active.get_mut(&id).ok_or(ProgressError::NotActive(id))?;
        if value < record.progress {
            return Err(ProgressError::Regressed {
                current: record.progress,
                value,
            });
        }
        record.progress = value;
        record.message = message.to_string();
        let snapshot = record.clone();
        self.emit(&snapshot, Phase::Progress);
        Ok(())
    }

    /// Remove the record after success.
    pub fn complete(&mut self, id: OperationId) -> Option<OperationRecord> {
        let record = self.active.remove(&id)?;
        self.emit(&record, Phase::Completed);
        Some(record)
    }

    /// Remove the record after failure.
    pub fn fail(&mut self, id: OperationId, message: &str) -> Option<OperationRecord> {
        let mut record = self.active.remove(&id)?;
        record.message = message.to_string();
        self.emit(&record, Phase::Failed);
        Some(record)
    }

    pub fn get(&self, id: OperationId) -> Option<&OperationRecord> {
        self.active.get(&id)
    }

    pub fn is_active(&self, id: OperationId) -> bool {
        self.active.contains_key(&id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn active_ids(&self) -> Vec<OperationId> {
        self.active.keys().copied().collect()
    }
}
