//! Connection setup and locking for the `SQLite` document collection.

use crate::{Error, Result};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

/// Busy timeout applied to every connection, in milliseconds.
pub const BUSY_TIMEOUT_MS: u32 = 5000;

/// Locks the connection, taking it over if a previous holder panicked.
///
/// A panic cannot leave a half-applied statement behind: every multi-row
/// write runs inside a transaction that rolls back on drop.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Collection connection lock was poisoned, recovering");
        metrics::counter!("collection_lock_poison_recovery_total").increment(1);
        poisoned.into_inner()
    })
}

/// Applies the collection pragmas: WAL journal, `NORMAL` synchronous and
/// the [`BUSY_TIMEOUT_MS`] busy timeout.
///
/// # Errors
///
/// Returns [`Error::Connection`] if the busy timeout cannot be applied, which
/// means the database file is not usable.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    // journal_mode returns a row ("wal" or "memory"), so pragma_update may
    // report an error on some builds even though the mode was applied.
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    conn.pragma_update(None, "busy_timeout", BUSY_TIMEOUT_MS)
        .map_err(|e| Error::Connection {
            target: conn.path().unwrap_or(":memory:").to_string(),
            cause: e.to_string(),
        })?;

    Ok(())
}
