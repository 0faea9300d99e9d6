// src/lock.rs
//! # RunLock
//! File-based mutual exclusion for collection runs launched as independent
//! processes. Acquisition is create-if-absent (`O_EXCL`), so two
//! near-simultaneous invocations cannot both win; a lock older than the
//! configured maximum run duration is treated as left behind by a crashed
//! run and reclaimed with a warning.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Why acquisition failed.
#[derive(Debug)]
pub enum LockError {
    /// A live holder exists. Non-fatal: the caller should exit cleanly.
    AlreadyRunning { holder: String, age_secs: i64 },
    /// Filesystem or serialization trouble.
    Storage(String),
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::AlreadyRunning { holder, age_secs } => write!(
                f,
                "another collection run is in progress (holder {holder}, {age_secs}s old)"
            ),
            LockError::Storage(msg) => write!(f, "lock storage error: {msg}"),
        }
    }
}

impl std::error::Error for LockError {}

/// Proof of acquisition; release succeeds only for the matching token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockRecord {
    holder_token: String,
    acquired_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    max_age: Duration,
}

impl RunLock {
    pub fn new(path: impl Into<PathBuf>, max_run_minutes: i64) -> Self {
        Self {
            path: path.into(),
            max_age: Duration::minutes(max_run_minutes),
        }
    }

    /// Try to become the sole collection run.
    pub fn acquire(&self) -> Result<LockToken, LockError> {
        let token = format!("{}-{}", std::process::id(), Utc::now().timestamp_millis());

        match self.try_create(&token) {
            Ok(()) => return Ok(LockToken(token)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(LockError::Storage(e.to_string())),
        }

        // Holder exists: stale (crashed run) or live?
        let record = self
            .read_record_settled()
            .map_err(|e| LockError::Storage(e.to_string()))?;
        let age = Utc::now() - record.acquired_at;
        if age <= self.max_age {
            return Err(LockError::AlreadyRunning {
                holder: record.holder_token,
                age_secs: age.num_seconds(),
            });
        }

        warn!(
            holder = %record.holder_token,
            age_secs = age.num_seconds(),
            "reclaiming stale lock from a previous run"
        );
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                return Err(LockError::Storage(e.to_string()));
            }
        }

        // One retry; losing the race again means a live holder took over.
        match self.try_create(&token) {
            Ok(()) => Ok(LockToken(token)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let record = self
                    .read_record_settled()
                    .map_err(|e| LockError::Storage(e.to_string()))?;
                let age = Utc::now() - record.acquired_at;
                Err(LockError::AlreadyRunning {
                    holder: record.holder_token,
                    age_secs: age.num_seconds(),
                })
            }
            Err(e) => Err(LockError::Storage(e.to_string())),
        }
    }

    /// Remove the lock, but only if `token` still owns it. Returns whether
    /// the lock was actually removed; a mismatch means a newer run
    /// reclaimed it and must not be disturbed.
    pub fn release(&self, token: &LockToken) -> Result<bool> {
        let record = match self.read_record() {
            Ok(r) => r,
            // Already gone: nothing to release.
            Err(e) if is_not_found(&e) => return Ok(false),
            Err(e) => return Err(e),
        };

        if record.holder_token != token.0 {
            warn!(
                held_by = %record.holder_token,
                releasing = %token.0,
                "refusing to release a lock held by a different run"
            );
            return Ok(false);
        }

        std::fs::remove_file(&self.path)
            .with_context(|| format!("removing lock file {}", self.path.display()))?;
        Ok(true)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_create(&self, token: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut f = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)?;
        let record = LockRecord {
            holder_token: token.to_string(),
            acquired_at: Utc::now(),
        };
        let body = serde_json::to_vec_pretty(&record)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
        f.write_all(&body)?;
        f.flush()
    }

    /// Read the lock record, retrying once: a loser of the creation race
    /// can observe the file before the winner finished writing it.
    fn read_record_settled(&self) -> Result<LockRecord> {
        match self.read_record() {
            Ok(r) => Ok(r),
            Err(_) => {
                std::thread::sleep(std::time::Duration::from_millis(25));
                self.read_record()
            }
        }
    }

    fn read_record(&self) -> Result<LockRecord> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading lock file {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing lock file {}", self.path.display()))
    }
}

fn is_not_found(e: &anyhow::Error) -> bool {
    e.downcast_ref::<std::io::Error>()
        .map(|io| io.kind() == ErrorKind::NotFound)
        .unwrap_or(false)
}
