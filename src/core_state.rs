//! Shared application state.
//!
//! `CoreState` is wrapped in `Arc` at startup and handed to the HTTP layer.
//! It owns the single SQLite connection, the clock every expiry decision
//! reads, the runtime config and the audit buffer.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::clock::{Clock, SystemClock};
use crate::config::{AppConfig, AUDIT_RETENTION_DAYS};
use crate::db;

/// Maximum audit buffer size before flush.
const AUDIT_BUFFER_CAPACITY: usize = 100;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    db: Mutex<Connection>,
    clock: Arc<dyn Clock>,
    config: AppConfig,
    audit: AuditLogger,
}

impl CoreState {
    /// Open the on-disk database named by `config` and run migrations.
    pub fn open(config: AppConfig) -> Result<Self, CoreError> {
        let conn = db::open_database(&config.database_path)?;
        Ok(Self::with_connection(conn, config, Arc::new(SystemClock)))
    }

    /// In-memory database, for tests and throwaway instances.
    pub fn in_memory(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self, CoreError> {
        let conn = db::open_memory_database()?;
        Ok(Self::with_connection(conn, config, clock))
    }

    pub fn with_connection(conn: Connection, config: AppConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            db: Mutex::new(conn),
            clock,
            config,
            audit: AuditLogger::new(),
        }
    }

    /// Lock the database connection.
    ///
    /// Drop the guard before any `.await` and before `log_access`.
    pub fn lock_db(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.db.lock().map_err(|_| CoreError::LockPoisoned)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // ── Audit logging ───────────────────────────────────────

    /// Record an access event. Auto-flushes to DB when the buffer is full.
    pub fn log_access(&self, source: AccessSource, action: &str, entity: &str) {
        let needs_flush = self.audit.log(self.now(), source, action, entity);
        if needs_flush {
            if let Err(e) = self.flush_audit() {
                tracing::warn!("Auto-flush audit failed: {e}");
            }
        }
    }

    /// Buffered entries not yet written.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries()
    }

    pub fn flush_audit(&self) -> Result<usize, CoreError> {
        let conn = self.lock_db()?;
        self.audit.flush_to_db(&conn)
    }

    /// Startup maintenance: drop expired sessions and old audit entries.
    pub fn housekeeping(&self) -> Result<(), CoreError> {
        let now = self.now();
        let conn = self.lock_db()?;
        let sessions = db::prune_expired_sessions(&conn, now)?;
        let cutoff = db::format_timestamp(&(now - Duration::days(AUDIT_RETENTION_DAYS)));
        let audit = db::prune_audit_log(&conn, &cutoff)?;
        tracing::info!(sessions, audit, "Pruned expired sessions and old audit entries");
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}

// ═══════════════════════════════════════════════════════════
// Access source tracking
// ═══════════════════════════════════════════════════════════

/// Who touched the data, for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessSource {
    /// A signed-in doctor.
    Doctor { uid: String },
    /// A patient holding a registration link. `doctor_uid` is the link's
    /// owner once the link has been resolved.
    PatientLink { doctor_uid: Option<String> },
    /// Unauthenticated caller on a public route.
    Anonymous,
}

impl std::fmt::Display for AccessSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Doctor { uid } => write!(f, "doctor:{uid}"),
            Self::PatientLink { .. } => write!(f, "patient_link"),
            Self::Anonymous => write!(f, "anonymous"),
        }
    }
}

impl AccessSource {
    /// Doctor whose data the access concerns, if known.
    pub fn doctor_uid(&self) -> Option<&str> {
        match self {
            Self::Doctor { uid } => Some(uid),
            Self::PatientLink { doctor_uid } => doctor_uid.as_deref(),
            Self::Anonymous => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Audit logger
// ═══════════════════════════════════════════════════════════

/// In-memory audit log buffer. Entries are flushed to SQLite
/// when the buffer reaches capacity or on explicit flush.
pub struct AuditLogger {
    buffer: Mutex<Vec<AuditEntry>>,
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub source: AccessSource,
    pub action: String,
    pub entity: String,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(AUDIT_BUFFER_CAPACITY)),
        }
    }

    /// Returns `true` once the buffer has reached the flush threshold.
    pub fn log(&self, at: DateTime<Utc>, source: AccessSource, action: &str, entity: &str) -> bool {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(AuditEntry {
                timestamp: at,
                source,
                action: action.to_string(),
                entity: entity.to_string(),
            });
            buf.len() >= AUDIT_BUFFER_CAPACITY
        } else {
            false
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    pub fn drain(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    /// Write buffered entries in one transaction.
    pub fn flush_to_db(&self, conn: &Connection) -> Result<usize, CoreError> {
        let entries = self.drain();
        if entries.is_empty() {
            return Ok(0);
        }

        let tx = conn.unchecked_transaction().map_err(db::DatabaseError::from)?;
        for e in &entries {
            db::insert_audit_entry(
                &tx,
                &db::format_timestamp(&e.timestamp),
                &e.source.to_string(),
                &e.action,
                &e.entity,
                e.source.doctor_uid(),
            )?;
        }
        tx.commit().map_err(db::DatabaseError::from)?;

        tracing::debug!(count = entries.len(), "Flushed audit entries to database");
        Ok(entries.len())
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
