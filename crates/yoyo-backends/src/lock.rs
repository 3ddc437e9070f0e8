//! Cross-process advisory locking (spec §4.5).
//!
//! At most one engine process may mutate bookkeeping against a given
//! database at a time. Backends that expose a native advisory lock
//! (`pg_advisory_lock`, `GET_LOCK`) should prefer it; this module provides
//! the portable fallback that works against any backend via the
//! `yoyo_lock` bookkeeping table.

use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use yoyo_core::YoyoError;

use crate::base::DatabaseBackend;
use crate::value::Value;

/// Creates `yoyo_lock` if it does not already exist. Vendor-specific DDL
/// lives behind each backend's `ensure_schema`; this is the portable
/// subset every vendor accepts.
pub async fn ensure_lock_table(backend: &dyn DatabaseBackend) -> Result<(), YoyoError> {
    let ident = backend.quote_identifier("yoyo_lock");
    backend
        .execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {ident} (\
                 locked INTEGER PRIMARY KEY, ctime TEXT NOT NULL, pid INTEGER NOT NULL)"
            ),
            &[],
        )
        .await?;
    Ok(())
}

/// A held lock. Dropping this guard does not release the lock — callers
/// must call [`release`] explicitly on every exit path (including
/// cancellation), since the release is itself a fallible database
/// operation.
#[derive(Debug, Clone)]
pub struct LockGuard {
    pid: i64,
}

/// Blocks until the insert-sentinel lock is acquired or `timeout` elapses.
///
/// Retries with bounded exponential backoff (50ms base, doubling, capped
/// at 2s) plus jitter, per spec §4.5.
///
/// # Errors
///
/// Returns [`YoyoError::LockTimeout`] reporting the current holder's pid
/// and ctime if the timeout elapses before the lock is acquired.
pub async fn acquire(
    backend: &dyn DatabaseBackend,
    pid: i64,
    timeout: Duration,
) -> Result<LockGuard, YoyoError> {
    ensure_lock_table(backend).await?;

    let deadline = std::time::Instant::now() + timeout;
    let mut backoff_ms: u64 = 50;
    const MAX_BACKOFF_MS: u64 = 2000;

    loop {
        let now = chrono::Utc::now();
        let inserted = backend
            .execute(
                "INSERT INTO yoyo_lock (locked, ctime, pid) VALUES (1, ?, ?)",
                &[Value::from(now.to_rfc3339()), Value::from(pid)],
            )
            .await;

        match inserted {
            Ok(_) => {
                info!(pid, "acquired migration lock");
                return Ok(LockGuard { pid });
            }
            Err(_) if std::time::Instant::now() >= deadline => {
                let (holder_pid, holder_ctime) = current_holder(backend).await?;
                return Err(YoyoError::LockTimeout {
                    holder_pid,
                    holder_ctime,
                });
            }
            Err(_) => {
                let jitter = rand::thread_rng().gen_range(0..=backoff_ms / 2);
                let sleep_ms = backoff_ms + jitter;
                warn!(pid, sleep_ms, "lock busy, retrying");
                tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
        }
    }
}

/// Returns the current lock holder's pid and ctime, for diagnostics and
/// `break-lock`.
async fn current_holder(backend: &dyn DatabaseBackend) -> Result<(i64, String), YoyoError> {
    let rows = backend
        .query("SELECT pid, ctime FROM yoyo_lock", &[])
        .await?;
    match rows.first() {
        Some(row) => {
            let pid = row.get_int("pid").unwrap_or(-1);
            let ctime = row.get_string("ctime").unwrap_or_default();
            Ok((pid, ctime))
        }
        None => Ok((-1, String::new())),
    }
}

/// Releases the lock held by `guard`'s pid.
pub async fn release(backend: &dyn DatabaseBackend, guard: &LockGuard) -> Result<(), YoyoError> {
    backend
        .execute(
            "DELETE FROM yoyo_lock WHERE pid = ?",
            &[Value::from(guard.pid)],
        )
        .await?;
    info!(pid = guard.pid, "released migration lock");
    Ok(())
}

/// Forcibly removes the lock row regardless of holder, for the
/// `break-lock` command (spec §4.5, §9 edge case: "lock held by dead
/// process").
pub async fn break_lock(backend: &dyn DatabaseBackend) -> Result<(), YoyoError> {
    backend.execute("DELETE FROM yoyo_lock", &[]).await?;
    Ok(())
}
