//! Ordered schema steps tracked through `PRAGMA user_version`.
//!
//! # Invariants
//! - Step versions start at 1 and increase by one.
//! - All pending steps and the version bump commit in a single transaction.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};

/// Schema steps, index `n` holds version `n + 1`.
const STEPS: &[&str] = &[include_str!("0001_participants.sql")];

/// Schema version this build migrates to.
pub fn latest_version() -> u32 {
    u32::try_from(STEPS.len()).unwrap_or(u32::MAX)
}

/// Brings `conn` up to [`latest_version`].
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the stored version is ahead of this build.
/// - `Sqlite` when a step fails; earlier steps in the same run are rolled back.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let found: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let target = latest_version();

    if found > target {
        return Err(DbError::UnsupportedSchemaVersion {
            found,
            supported: target,
        });
    }
    if found == target {
        return Ok(());
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for (index, sql) in STEPS.iter().enumerate().skip(found as usize) {
        tx.execute_batch(sql)?;
        info!(
            "event=db_migrate_step module=db status=ok version={}",
            index + 1
        );
    }
    tx.pragma_update(None, "user_version", target)?;
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={found} to_version={target}");
    Ok(())
}
