use crate::error::{Result, StoreError};
use crate::schema::MIG_0001_INIT;
use rusqlite::Connection;
use parking_lot::{Mutex, MutexGuard};
use std::time::Duration;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(3);

/// SQLite-backed store. The connection is shared behind a mutex so one `Db`
/// can serve concurrently running checks. Waiting for the mutex is bounded by
/// the same timeout SQLite uses for busy locks.
pub struct Db {
    conn: Mutex<Connection>,
    lock_timeout: Duration,
}

impl Db {
    pub fn open_or_create(path: impl AsRef<std::path::Path>, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn, busy_timeout)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, DEFAULT_BUSY_TIMEOUT)
    }

    fn init(conn: Connection, busy_timeout: Duration) -> Result<Self> {
        apply_pragmas(&conn, busy_timeout)?;
        migrate(&conn)?;
        Ok(Db { conn: Mutex::new(conn), lock_timeout: busy_timeout })
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.try_lock_for(self.lock_timeout).ok_or(StoreError::Timeout(self.lock_timeout))
    }
}

fn apply_pragmas(conn: &Connection, busy_timeout: Duration) -> Result<()> {
    // in-memory databases answer "memory" here
    let _mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |r| r.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

fn migrate(conn: &Connection) -> Result<()> {
    let exists: i64 = conn.query_row(
        "SELECT COUNT(1) FROM sqlite_master WHERE type='table' AND name='host_services'",
        [],
        |r| r.get(0),
    )?;
    if exists == 0 {
        tracing::info!("applying initial schema");
        conn.execute_batch(MIG_0001_INIT)?;
    }
    Ok(())
}
