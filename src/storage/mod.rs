//! Incident store -- the aggregate document, its backends, and the write lock.
//!
//! The whole aggregate (incidents, trends, clusters) is loaded and saved as
//! one unit. Mutations go through [`IncidentStore::transact`], which holds a
//! mutex across load, mutate and save so identity allocation and the write
//! that follows it are atomic within the process.
//!
//! Stored entries are kept as raw JSON records. Only the new incident is
//! built from typed values; everything already in the document is written
//! back exactly as it was read.

pub mod json_file;
pub mod memory;
pub mod schema;
pub mod sqlite;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::{StorageBackendKind, StorageConfig};
use crate::incident::{Cluster, Incident, IncidentId, TrendPoint};

pub use self::json_file::JsonFileBackend;
pub use self::memory::MemoryBackend;
pub use self::sqlite::SqliteBackend;

/// Numeric floor for identity allocation; the first incident is `INC-1001`.
const ID_FLOOR: u64 = 1000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable at {path}: {message}")]
    Unavailable { path: String, message: String },

    #[error("store document is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("store document could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("incident {0} already exists in the store")]
    DuplicateId(IncidentId),

    #[error("no incident id left after INC-{0}")]
    IdsExhausted(u64),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StoreError {
    pub(crate) fn unavailable(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// The persisted aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Store {
    /// Incident records, newest first.
    #[serde(default)]
    pub incidents: Vec<Value>,
    /// Trend arrays keyed by incident id.
    #[serde(default)]
    pub trends: Map<String, Value>,
    /// Cluster arrays keyed by incident id.
    #[serde(default)]
    pub clusters: Map<String, Value>,
    /// Top-level keys this service does not use, carried through saves.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `id` of a stored incident record, if it has a string one.
pub fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

impl Store {
    /// Next free identity: one past the highest well-formed `INC-<n>`, never
    /// below `INC-1001`. Malformed ids are ignored.
    pub fn allocate_id(&self) -> Result<IncidentId, StoreError> {
        let max = self
            .incidents
            .iter()
            .filter_map(record_id)
            .filter_map(IncidentId::parse_number)
            .fold(ID_FLOOR, u64::max);
        let next = max.checked_add(1).ok_or(StoreError::IdsExhausted(max))?;
        Ok(IncidentId::from_number(next))
    }

    /// Record a new incident with its analysis data.
    ///
    /// The incident goes to the front of the list. Existing records are left
    /// untouched; an id that is already present is rejected.
    pub fn merge(
        &mut self,
        incident: Incident,
        trend: Vec<TrendPoint>,
        clusters: Vec<Cluster>,
    ) -> Result<(), StoreError> {
        let id = incident.id.as_str().to_string();
        if self.incidents.iter().any(|r| record_id(r) == Some(id.as_str()))
            || self.trends.contains_key(id.as_str())
            || self.clusters.contains_key(id.as_str())
        {
            return Err(StoreError::DuplicateId(incident.id));
        }
        let record = serde_json::to_value(&incident).map_err(StoreError::Encode)?;
        let trend = serde_json::to_value(&trend).map_err(StoreError::Encode)?;
        let clusters = serde_json::to_value(&clusters).map_err(StoreError::Encode)?;

        self.incidents.insert(0, record);
        self.trends.insert(id.clone(), trend);
        self.clusters.insert(id, clusters);
        Ok(())
    }

    /// Trend for an incident; empty for unknown ids.
    pub fn trend(&self, id: &str) -> &[Value] {
        entries(self.trends.get(id))
    }

    /// Clusters for an incident; empty for unknown ids.
    pub fn clusters_for(&self, id: &str) -> &[Value] {
        entries(self.clusters.get(id))
    }
}

fn entries(value: Option<&Value>) -> &[Value] {
    value
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Durable home of the [`Store`] aggregate. Implementations are blocking.
pub trait StoreBackend: Send + Sync {
    fn load(&self) -> Result<Store, StoreError>;

    /// Replace the persisted aggregate entirely.
    fn save(&self, store: &Store) -> Result<(), StoreError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Shared handle to the store, serializing all access through one mutex.
pub struct IncidentStore {
    backend: Arc<dyn StoreBackend>,
    lock: Mutex<()>,
}

impl IncidentStore {
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    pub fn from_arc(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            backend,
            lock: Mutex::new(()),
        }
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    /// Fresh read of the whole aggregate.
    pub async fn snapshot(&self) -> Result<Store, StoreError> {
        let _guard = self.lock.lock().await;
        let backend = self.backend.clone();
        tokio::task::spawn_blocking(move || backend.load()).await?
    }

    /// Load, apply `f`, save -- as one critical section.
    ///
    /// If `f` fails nothing is written and the store stays exactly as loaded.
    pub async fn transact<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Store) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let _guard = self.lock.lock().await;
        let backend = self.backend.clone();
        tokio::task::spawn_blocking(move || {
            let mut store = backend.load()?;
            let out = f(&mut store)?;
            backend.save(&store)?;
            Ok(out)
        })
        .await?
    }
}

/// Open the configured backend. The backing storage must already exist.
pub fn open_backend(config: &StorageConfig) -> Result<Arc<dyn StoreBackend>, StoreError> {
    let backend: Arc<dyn StoreBackend> = match config.backend {
        StorageBackendKind::Json => Arc::new(JsonFileBackend::open(&config.path)?),
        StorageBackendKind::Sqlite => Arc::new(SqliteBackend::open(&config.path)?),
    };
    Ok(backend)
}

/// Create the configured backend with an empty aggregate if it does not exist.
///
/// Returns `true` when new storage was created.
pub fn init_backend(config: &StorageConfig) -> Result<bool, StoreError> {
    match config.backend {
        StorageBackendKind::Json => JsonFileBackend::create(&config.path).map(|(_, created)| created),
        StorageBackendKind::Sqlite => SqliteBackend::create(&config.path).map(|(_, created)| created),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::Severity;
    use crate::scenario::Scenario;
    use chrono::Utc;
    use serde_json::json;

    fn incident(id: &str) -> Incident {
        Incident {
            id: IncidentId::from(id),
            service: "payments-api".into(),
            severity: Severity::Sev3,
            status: "Open".into(),
            scenario: Scenario::Timeout,
            engine: "fallback".into(),
            created_at: Utc::now(),
        }
    }

    fn cluster(id: &str) -> Cluster {
        Cluster {
            cluster_id: id.into(),
            category: "Dependency/DB Timeout".into(),
            count: 4,
            confidence: 0.78,
            signature: "timeout expired".into(),
            sample: "Timeout expired.".into(),
        }
    }

    fn with_ids(ids: &[&str]) -> Store {
        Store {
            incidents: ids.iter().map(|id| json!({ "id": id })).collect(),
            ..Store::default()
        }
    }

    #[test]
    fn test_allocate_id_empty_store() {
        assert_eq!(Store::default().allocate_id().unwrap().as_str(), "INC-1001");
    }

    #[test]
    fn test_allocate_id_skips_malformed() {
        let mut store = with_ids(&["INC-1000", "INC-1001", "INC-1002", "INC-1003", "INC-1004", "INC-1005"]);
        store.incidents.push(json!({ "id": "INC-99999x" }));
        store.incidents.push(json!({ "id": 2000 }));
        store.incidents.push(json!({ "service": "no-id" }));
        assert_eq!(store.allocate_id().unwrap().as_str(), "INC-1006");
    }

    #[test]
    fn test_allocate_id_respects_floor() {
        let mut store = with_ids(&["INC-7"]);
        assert_eq!(store.allocate_id().unwrap().as_str(), "INC-1001");

        store.incidents.push(json!({ "id": "INC-2500" }));
        assert_eq!(store.allocate_id().unwrap().as_str(), "INC-2501");
    }

    #[test]
    fn test_allocate_id_at_numeric_limit() {
        let store = with_ids(&["INC-1001", "INC-18446744073709551615"]);
        let err = store.allocate_id().unwrap_err();
        assert!(matches!(err, StoreError::IdsExhausted(u64::MAX)));

        let store = with_ids(&["INC-18446744073709551614"]);
        assert_eq!(
            store.allocate_id().unwrap().as_str(),
            "INC-18446744073709551615"
        );
    }

    #[test]
    fn test_merge_prepends_and_preserves() {
        let mut store = Store::default();
        store.merge(incident("INC-1001"), vec![], vec![cluster("CL-1")]).unwrap();
        let before = store.clone();

        store.merge(incident("INC-1002"), vec![], vec![cluster("CL-9")]).unwrap();

        assert_eq!(store.incidents[0]["id"], "INC-1002");
        assert_eq!(store.incidents[1], before.incidents[0]);
        assert_eq!(store.clusters_for("INC-1001"), before.clusters_for("INC-1001"));
        assert_eq!(store.clusters_for("INC-1002")[0]["clusterId"], "CL-9");
        assert!(store.trend("INC-1002").is_empty());
        assert!(store.trend("INC-4040").is_empty());
    }

    #[test]
    fn test_merge_rejects_duplicate_id() {
        let mut store = Store::default();
        store.merge(incident("INC-1001"), vec![], vec![]).unwrap();
        let before = store.clone();

        let err = store.merge(incident("INC-1001"), vec![], vec![]).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(_)));
        assert_eq!(store, before);
    }

    #[test]
    fn test_store_document_tolerates_missing_sections() {
        let store: Store = serde_json::from_str("{}").unwrap();
        assert_eq!(store, Store::default());
    }

    #[test]
    fn test_store_document_accepts_sparse_records() {
        let doc = r#"{"incidents":[{"id":"INC-1040","service":"legacy-api","severity":"Sev1"}],"owner":"sre"}"#;
        let mut store: Store = serde_json::from_str(doc).unwrap();
        assert_eq!(store.allocate_id().unwrap().as_str(), "INC-1041");

        store.merge(incident("INC-1041"), vec![], vec![]).unwrap();
        let saved = serde_json::to_value(&store).unwrap();
        assert_eq!(
            saved["incidents"][1],
            json!({ "id": "INC-1040", "service": "legacy-api", "severity": "Sev1" })
        );
        assert_eq!(saved["owner"], "sre");
    }

    #[test]
    fn test_encode_failure_is_not_reported_as_corruption() {
        let cause = serde_json::from_str::<Value>("{").unwrap_err();
        let err = StoreError::Encode(cause);
        assert!(err.to_string().starts_with("store document could not be encoded"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[tokio::test]
    async fn test_transact_discards_failed_mutation() {
        let store = IncidentStore::new(MemoryBackend::default());
        store
            .transact(|s| s.merge(incident("INC-1001"), vec![], vec![]))
            .await
            .unwrap();
        let before = store.snapshot().await.unwrap();

        let result: Result<(), _> = store
            .transact(|s| {
                s.incidents.clear();
                Err(StoreError::DuplicateId(IncidentId::from("INC-1001")))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(store.snapshot().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_concurrent_transactions_allocate_unique_ids() {
        let store = Arc::new(IncidentStore::new(MemoryBackend::default()));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .transact(|s| {
                        let id = s.allocate_id()?;
                        s.merge(incident(id.as_str()), vec![], vec![])?;
                        Ok(id)
                    })
                    .await
                    .unwrap()
            }));
        }
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 16);

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.incidents.len(), 16);
        assert_eq!(snapshot.incidents[0]["id"], "INC-1016");
    }
}
