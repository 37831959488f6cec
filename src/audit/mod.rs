//! Append-only audit log.
//!
//! Every retrieval and every validation appends one JSON record. The sink is
//! an injected trait so tests can substitute an in-memory collector; the
//! file-backed sink guarantees atomic appends (one `writeln!` per record
//! under a mutex) so concurrent writers never interleave partial records.

use crate::fragment::FragmentId;
use crate::validate::{Mode, ValidationResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

/// Errors raised while appending audit records.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One scored result within a retrieval record.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredResultRecord {
    pub fragment_id: FragmentId,
    pub raw_score: f32,
    pub boosted_score: f32,
}

/// Audit record for one retrieval call.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalRecord {
    pub timestamp: DateTime<Utc>,
    pub query_text: String,
    pub top_k: usize,
    pub results: Vec<ScoredResultRecord>,
}

/// Audit record for one validation call.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationRecord {
    pub timestamp: DateTime<Utc>,
    pub mode: Mode,
    pub accepted: bool,
    pub total_steps: usize,
    pub supported_steps: usize,
    pub results: Vec<ValidationResult>,
}

/// A single auditable event.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AuditRecord {
    Retrieval(RetrievalRecord),
    Validation(ValidationRecord),
}

/// Trait for audit record sinks.
///
/// Implementations must append each record atomically; records from
/// concurrent queries may be interleaved with each other, but never
/// within one record.
pub trait AuditSink: Send + Sync {
    fn append(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// File-backed JSONL audit log, one JSON object per line.
pub struct JsonlAuditLog {
    file: Mutex<File>,
}

impl JsonlAuditLog {
    /// Open (or create) an append-only log at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for JsonlAuditLog {
    fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let line = serde_json::to_string(record)?;
        let mut file = self.file.lock().unwrap();
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// In-memory audit collector for tests.
#[derive(Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records appended so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
