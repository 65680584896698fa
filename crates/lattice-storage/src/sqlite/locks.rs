//! Object-lock operations for [`SqliteRepository`].
//!
//! Acquisition is an INSERT racing on the unique
//! `(collection_id, document_name)` constraint. The loser inspects the
//! existing row: an expired lock is deleted and the insert retried once,
//! a live one surfaces as [`StorageError::Locked`].

use chrono::{Duration, Utc};
use rusqlite::{Connection, Row, params};
use tracing::debug;

use lattice_core::lock::ObjectLock;

use crate::error::{Result, StorageError, is_unique_violation};
use crate::sqlite::store::SqliteRepository;
use crate::sqlite::{format_datetime, parse_datetime};

pub(crate) const LOCK_COLUMNS: &str = "id, collection_id, document_name, hostname, created_utc";

fn scan_lock(row: &Row<'_>) -> rusqlite::Result<ObjectLock> {
    let created: String = row.get("created_utc")?;
    Ok(ObjectLock {
        id: row.get("id")?,
        collection_id: row.get("collection_id")?,
        document_name: row.get("document_name")?,
        hostname: row.get("hostname")?,
        created_utc: parse_datetime(&created),
    })
}

fn find_lock(
    conn: &Connection,
    collection_id: &str,
    document_name: &str,
) -> Result<Option<ObjectLock>> {
    let sql = format!(
        "SELECT {LOCK_COLUMNS} FROM objectlocks
         WHERE collection_id = ?1 AND document_name = ?2"
    );
    match conn.query_row(&sql, params![collection_id, document_name], scan_lock) {
        Ok(lock) => Ok(Some(lock)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StorageError::Query(e)),
    }
}

fn insert_lock(conn: &Connection, lock: &ObjectLock) -> std::result::Result<(), rusqlite::Error> {
    conn.execute(
        &format!("INSERT INTO objectlocks ({LOCK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
        params![
            lock.id,
            lock.collection_id,
            lock.document_name,
            lock.hostname,
            format_datetime(&lock.created_utc),
        ],
    )
    .map(|_| ())
}

impl SqliteRepository {
    pub fn try_acquire_lock_impl(
        &self,
        collection_id: &str,
        document_name: &str,
        hostname: &str,
        expiration_seconds: i64,
    ) -> Result<ObjectLock> {
        let conn = self.lock_conn()?;
        let lock = ObjectLock::new(collection_id, document_name, hostname);

        match insert_lock(&conn, &lock) {
            Ok(()) => return Ok(lock),
            Err(e) if is_unique_violation(&e) => {}
            Err(e) => return Err(StorageError::Query(e)),
        }

        // Someone holds the name. Reclaim if expired, otherwise report
        // the owner.
        let existing = find_lock(&conn, collection_id, document_name)?;
        if let Some(existing) = &existing {
            if !existing.is_expired(expiration_seconds, Utc::now()) {
                return Err(StorageError::Locked {
                    hostname: existing.hostname.clone(),
                    created_utc: existing.created_utc,
                });
            }
            debug!(
                collection_id,
                document_name,
                owner = %existing.hostname,
                "reclaiming expired lock"
            );
            conn.execute(
                "DELETE FROM objectlocks WHERE id = ?1",
                params![existing.id],
            )?;
        }

        // One retry: either we deleted an expired lock or the holder
        // released between our insert and read.
        let retry = ObjectLock::new(collection_id, document_name, hostname);
        match insert_lock(&conn, &retry) {
            Ok(()) => Ok(retry),
            Err(e) if is_unique_violation(&e) => {
                let winner = find_lock(&conn, collection_id, document_name)?.ok_or_else(|| {
                    StorageError::Internal("lock vanished after conflicting insert".into())
                })?;
                Err(StorageError::Locked {
                    hostname: winner.hostname,
                    created_utc: winner.created_utc,
                })
            }
            Err(e) => Err(StorageError::Query(e)),
        }
    }

    pub fn release_lock_impl(&self, lock_id: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM objectlocks WHERE id = ?1", params![lock_id])?;
        Ok(())
    }

    pub fn delete_expired_locks_impl(&self, expiration_seconds: i64) -> Result<u64> {
        let conn = self.lock_conn()?;
        let cutoff = Utc::now() - Duration::seconds(expiration_seconds);
        let affected = conn.execute(
            "DELETE FROM objectlocks WHERE created_utc < ?1",
            params![format_datetime(&cutoff)],
        )?;
        Ok(affected as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> SqliteRepository {
        SqliteRepository::open_in_memory().unwrap()
    }

    #[test]
    fn acquire_and_release() {
        let store = test_store();
        let lock = store
            .try_acquire_lock_impl("col_a", "report.json", "host-a", 30)
            .unwrap();
        assert_eq!(lock.hostname, "host-a");

        store.release_lock_impl(&lock.id).unwrap();
        // Re-acquire succeeds after release.
        store
            .try_acquire_lock_impl("col_a", "report.json", "host-b", 30)
            .unwrap();
    }

    #[test]
    fn second_acquire_reports_owner() {
        let store = test_store();
        store
            .try_acquire_lock_impl("col_a", "report.json", "host-a", 30)
            .unwrap();

        let err = store
            .try_acquire_lock_impl("col_a", "report.json", "host-b", 30)
            .unwrap_err();
        match err {
            StorageError::Locked { hostname, .. } => assert_eq!(hostname, "host-a"),
            other => panic!("expected Locked, got {other:?}"),
        }
    }

    #[test]
    fn different_names_do_not_contend() {
        let store = test_store();
        store
            .try_acquire_lock_impl("col_a", "a.json", "host-a", 30)
            .unwrap();
        store
            .try_acquire_lock_impl("col_a", "b.json", "host-b", 30)
            .unwrap();
        store
            .try_acquire_lock_impl("col_b", "a.json", "host-c", 30)
            .unwrap();
    }

    #[test]
    fn expired_lock_is_reclaimed() {
        let store = test_store();
        store
            .try_acquire_lock_impl("col_a", "report.json", "host-a", 30)
            .unwrap();

        // Backdate the lock past the expiration window.
        {
            let conn = store.lock_conn().unwrap();
            let old = Utc::now() - Duration::seconds(120);
            conn.execute(
                "UPDATE objectlocks SET created_utc = ?1",
                params![format_datetime(&old)],
            )
            .unwrap();
        }

        let lock = store
            .try_acquire_lock_impl("col_a", "report.json", "host-b", 30)
            .unwrap();
        assert_eq!(lock.hostname, "host-b");
    }

    #[test]
    fn delete_expired_sweeps_old_locks() {
        let store = test_store();
        store
            .try_acquire_lock_impl("col_a", "old.json", "host-a", 30)
            .unwrap();
        {
            let conn = store.lock_conn().unwrap();
            let old = Utc::now() - Duration::seconds(120);
            conn.execute(
                "UPDATE objectlocks SET created_utc = ?1",
                params![format_datetime(&old)],
            )
            .unwrap();
        }
        store
            .try_acquire_lock_impl("col_a", "fresh.json", "host-a", 30)
            .unwrap();

        let removed = store.delete_expired_locks_impl(30).unwrap();
        assert_eq!(removed, 1);
    }

    #[test]
    fn releasing_missing_lock_is_ok() {
        let store = test_store();
        store.release_lock_impl("lock_missing").unwrap();
    }
}
