use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use menza_sync::storage::TransactionWork;
use menza_sync::{
    Fingerprint, FingerprintKey, FingerprintStore, RecordSet, Storage, StorageError, StoredRecord,
    UnitTransaction, ValidityKey, ValidityStore,
};
use rusqlite::OptionalExtension;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::schema;

/// SQLite-backed storage for records, fingerprints, and validity windows.
///
/// Every committed write bumps a change counter that [`observe`] streams
/// listen to, so readers follow storage rather than sync calls.
///
/// [`observe`]: SqliteStore::observe
pub struct SqliteStore {
    conn: Mutex<rusqlite::Connection>,
    changes: watch::Sender<u64>,
}

impl SqliteStore {
    /// Open a store backed by a file on disk.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = rusqlite::Connection::open(path).map_err(db)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = rusqlite::Connection::open_in_memory().map_err(db)?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: rusqlite::Connection) -> Result<Self, StorageError> {
        schema::migrations()
            .to_latest(&mut conn)
            .map_err(|e| StorageError::Migration(e.to_string()))?;

        let (changes, _) = watch::channel(0);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, rusqlite::Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection lock poisoned".into()))
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version += 1);
    }

    /// Current records of `set`, in the order they were persisted.
    pub fn records(&self, set: &RecordSet) -> Result<Vec<StoredRecord>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT record_id, body FROM records
                 WHERE collection = ?1 AND scope = ?2
                 ORDER BY position",
            )
            .map_err(db)?;

        let records = stmt
            .query_map(rusqlite::params![&set.collection, &set.scope], |row| {
                Ok(StoredRecord::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                ))
            })
            .map_err(db)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db)?;

        Ok(records)
    }

    /// Live view of `set`: yields the current records immediately, then again
    /// whenever a commit changes them.
    pub fn observe(self: &Arc<Self>, set: RecordSet) -> BoxStream<'static, Vec<StoredRecord>> {
        let state = ObserveState {
            store: Arc::clone(self),
            changes: self.changes.subscribe(),
            set,
            last: None,
        };

        stream::unfold(state, |mut state| async move {
            loop {
                if state.last.is_some() && state.changes.changed().await.is_err() {
                    return None;
                }

                match state.store.records(&state.set) {
                    Ok(records) if state.last.as_ref() == Some(&records) => continue,
                    Ok(records) => {
                        state.last = Some(records.clone());
                        return Some((records, state));
                    }
                    Err(e) => {
                        warn!(set = %state.set, error = %e, "observe read failed, closing stream");
                        return None;
                    }
                }
            }
        })
        .boxed()
    }

    /// Every stored validity confirmation, sorted by dataset.
    pub fn validity_entries(&self) -> Result<Vec<(ValidityKey, DateTime<Utc>)>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT dataset, scope, last_fresh_at FROM validity
                 ORDER BY dataset, scope",
            )
            .map_err(db)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })
            .map_err(db)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db)?;

        rows.into_iter()
            .map(|(dataset, scope, millis)| {
                Ok((ValidityKey::new(dataset, scope), from_millis(millis)?))
            })
            .collect()
    }

    /// Delete all records, fingerprints, and validity windows.
    pub fn wipe(&self) -> Result<(), StorageError> {
        {
            let mut conn = self.conn()?;
            let tx = conn.transaction().map_err(db)?;
            tx.execute_batch(
                "DELETE FROM records;
                 DELETE FROM fingerprints;
                 DELETE FROM validity;",
            )
            .map_err(db)?;
            tx.commit().map_err(db)?;
        }

        info!("local cache wiped");
        self.notify();
        Ok(())
    }
}

struct ObserveState {
    store: Arc<SqliteStore>,
    changes: watch::Receiver<u64>,
    set: RecordSet,
    last: Option<Vec<StoredRecord>>,
}

impl FingerprintStore for SqliteStore {
    fn fingerprint(&self, key: &FingerprintKey) -> Result<Option<Fingerprint>, StorageError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT hash FROM fingerprints WHERE resource = ?1 AND scope = ?2",
            rusqlite::params![&key.resource, &key.scope],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map(|hash| hash.map(Fingerprint::new))
        .map_err(db)
    }

    fn set_fingerprint(
        &self,
        key: &FingerprintKey,
        fingerprint: &Fingerprint,
    ) -> Result<(), StorageError> {
        let conn = self.conn()?;
        write_fingerprint(&conn, key, fingerprint)
    }
}

impl Storage for SqliteStore {
    fn transact(&self, work: TransactionWork<'_>) -> Result<(), StorageError> {
        {
            let mut conn = self.conn()?;
            let tx = conn.transaction().map_err(db)?;

            // Dropping `tx` without committing rolls it back.
            work(&mut SqliteTransaction { tx: &tx })?;

            tx.commit().map_err(db)?;
        }

        self.notify();
        Ok(())
    }
}

impl ValidityStore for SqliteStore {
    fn last_confirmed(&self, key: &ValidityKey) -> Result<Option<DateTime<Utc>>, StorageError> {
        let conn = self.conn()?;
        let millis = conn
            .query_row(
                "SELECT last_fresh_at FROM validity WHERE dataset = ?1 AND scope = ?2",
                rusqlite::params![&key.dataset, &key.scope],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(db)?;

        millis.map(from_millis).transpose()
    }

    fn confirm(&self, key: &ValidityKey, at: DateTime<Utc>) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO validity (dataset, scope, last_fresh_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (dataset, scope)
             DO UPDATE SET last_fresh_at = MAX(last_fresh_at, excluded.last_fresh_at)",
            rusqlite::params![&key.dataset, &key.scope, at.timestamp_millis()],
        )
        .map_err(db)?;
        Ok(())
    }
}

struct SqliteTransaction<'t, 'c> {
    tx: &'t rusqlite::Transaction<'c>,
}

impl UnitTransaction for SqliteTransaction<'_, '_> {
    fn replace_records(
        &mut self,
        set: &RecordSet,
        records: &[StoredRecord],
    ) -> Result<(), StorageError> {
        self.tx
            .execute(
                "DELETE FROM records WHERE collection = ?1 AND scope = ?2",
                rusqlite::params![&set.collection, &set.scope],
            )
            .map_err(db)?;

        let mut stmt = self
            .tx
            .prepare_cached(
                "INSERT INTO records (collection, scope, position, record_id, body)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(db)?;

        for (position, record) in records.iter().enumerate() {
            stmt.execute(rusqlite::params![
                &set.collection,
                &set.scope,
                position as i64,
                &record.id,
                &record.body,
            ])
            .map_err(db)?;
        }

        debug!(set = %set, count = records.len(), "records replaced");
        Ok(())
    }

    fn set_fingerprint(
        &mut self,
        key: &FingerprintKey,
        fingerprint: &Fingerprint,
    ) -> Result<(), StorageError> {
        write_fingerprint(self.tx, key, fingerprint)
    }
}

fn write_fingerprint(
    conn: &rusqlite::Connection,
    key: &FingerprintKey,
    fingerprint: &Fingerprint,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR REPLACE INTO fingerprints (resource, scope, hash, updated_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            &key.resource,
            &key.scope,
            fingerprint.as_str(),
            Utc::now().timestamp_millis(),
        ],
    )
    .map_err(db)?;
    Ok(())
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StorageError::Database(format!("timestamp out of range: {millis}")))
}

fn db(e: rusqlite::Error) -> StorageError {
    StorageError::Database(e.to_string())
}
