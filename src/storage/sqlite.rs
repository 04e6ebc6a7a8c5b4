//! SQLite backend: the aggregate as one JSON document in a single-row table.

use std::path::PathBuf;

use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use super::schema;
use super::{Store, StoreBackend, StoreError};

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

pub struct SqliteBackend {
    path: PathBuf,
    pool: Pool,
}

impl SqliteBackend {
    /// Open an existing database file. A missing file is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if !path.is_file() {
            return Err(StoreError::unavailable(&path, "database file not found"));
        }
        Self::connect(path)
    }

    /// Open the database, creating it with an empty aggregate if missing.
    pub fn create(path: impl Into<PathBuf>) -> Result<(Self, bool), StoreError> {
        let path = path.into();
        let existed = path.is_file();
        if !existed {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::unavailable(parent, e))?;
            }
        }
        let backend = Self::connect(path)?;

        let conn = backend.pool.get()?;
        let has_document: bool = conn
            .query_row("SELECT 1 FROM store_document WHERE id = 1", [], |_| Ok(()))
            .optional()?
            .is_some();
        drop(conn);

        if !has_document {
            backend.save(&Store::default())?;
            info!(path = %backend.path.display(), "created empty incident store");
        }
        Ok((backend, !has_document))
    }

    fn connect(path: PathBuf) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(&path).with_init(|c| {
            c.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )
        });
        let pool = R2D2Pool::new(manager)?;

        // Run migrations on a single connection
        let conn = pool.get()?;
        schema::migrate(&conn)?;
        let version = schema::current_version(&conn)?;
        drop(conn);
        debug!(path = %path.display(), ?version, "sqlite store schema ready");

        Ok(Self { path, pool })
    }
}

impl StoreBackend for SqliteBackend {
    fn load(&self) -> Result<Store, StoreError> {
        let conn = self.pool.get()?;
        let document: Option<String> = conn
            .query_row("SELECT document FROM store_document WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        let store = match document {
            Some(json) => serde_json::from_str(&json)?,
            None => Store::default(),
        };
        debug!(path = %self.path.display(), incidents = store.incidents.len(), "loaded store");
        Ok(store)
    }

    fn save(&self, store: &Store) -> Result<(), StoreError> {
        let json = serde_json::to_string(store).map_err(StoreError::Encode)?;
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO store_document (id, document, updated_at)
             VALUES (1, ?1, datetime('now'))
             ON CONFLICT(id) DO UPDATE SET
                document = excluded.document,
                updated_at = excluded.updated_at",
            params![json],
        )?;
        tx.commit()?;
        debug!(path = %self.path.display(), incidents = store.incidents.len(), "saved store");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::{Incident, IncidentId, Severity};
    use crate::scenario::Scenario;

    #[test]
    fn test_open_missing_database_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = SqliteBackend::open(dir.path().join("missing.db")).err().unwrap();
        assert!(matches!(err, StoreError::Unavailable { .. }));
    }

    #[test]
    fn test_create_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        let (backend, created) = SqliteBackend::create(&path).unwrap();
        assert!(created);
        assert_eq!(backend.load().unwrap(), Store::default());

        let mut store = Store::default();
        store
            .merge(
                Incident {
                    id: IncidentId::from_number(1001),
                    service: "checkout-api".into(),
                    severity: Severity::Sev3,
                    status: "Open".into(),
                    scenario: Scenario::Auth,
                    engine: "fallback".into(),
                    created_at: chrono::Utc::now(),
                },
                vec![],
                vec![],
            )
            .unwrap();
        backend.save(&store).unwrap();
        drop(backend);

        let reopened = SqliteBackend::open(&path).unwrap();
        assert_eq!(reopened.load().unwrap(), store);

        let (_, created) = SqliteBackend::create(&path).unwrap();
        assert!(!created);
    }

    #[test]
    fn test_save_replaces_document() {
        let dir = tempfile::tempdir().unwrap();
        let (backend, _) = SqliteBackend::create(dir.path().join("store.db")).unwrap();

        let mut store = Store::default();
        store
            .merge(
                Incident {
                    id: IncidentId::from("INC-1001"),
                    service: "payments-api".into(),
                    severity: Severity::Sev2,
                    status: "Open".into(),
                    scenario: Scenario::Mixed,
                    engine: "sklearn".into(),
                    created_at: chrono::Utc::now(),
                },
                vec![],
                vec![],
            )
            .unwrap();
        backend.save(&store).unwrap();
        backend.save(&Store::default()).unwrap();

        assert_eq!(backend.load().unwrap(), Store::default());
        let rows: i64 = backend
            .pool
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM store_document", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }
}
