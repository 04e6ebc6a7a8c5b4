//! Single JSON document backend.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use tracing::{debug, info};

use super::{Store, StoreBackend, StoreError};

/// Keeps the aggregate as one pretty-printed JSON file.
///
/// Saves go to a sibling temp file which is then renamed over the original,
/// so a reader never sees a half-written document.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Open an existing document. A missing or unreadable file is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let meta = fs::metadata(&path).map_err(|e| StoreError::unavailable(&path, e))?;
        if !meta.is_file() {
            return Err(StoreError::unavailable(&path, "not a regular file"));
        }
        fs::File::open(&path).map_err(|e| StoreError::unavailable(&path, e))?;
        Ok(Self { path })
    }

    /// Open the document, writing an empty aggregate first if it is missing.
    pub fn create(path: impl Into<PathBuf>) -> Result<(Self, bool), StoreError> {
        let path = path.into();
        if path.exists() {
            return Ok((Self::open(path)?, false));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::unavailable(parent, e))?;
        }
        let backend = Self { path };
        backend.save(&Store::default())?;
        info!(path = %backend.path.display(), "created empty incident store");
        Ok((backend, true))
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store.json".to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

impl StoreBackend for JsonFileBackend {
    fn load(&self) -> Result<Store, StoreError> {
        let content =
            fs::read_to_string(&self.path).map_err(|e| StoreError::unavailable(&self.path, e))?;
        let store: Store = serde_json::from_str(&content)?;
        debug!(path = %self.path.display(), incidents = store.incidents.len(), "loaded store");
        Ok(store)
    }

    fn save(&self, store: &Store) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(store).map_err(StoreError::Encode)?;
        let tmp = self.temp_path();

        let mut file = fs::File::create(&tmp).map_err(|e| StoreError::unavailable(&tmp, e))?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| StoreError::unavailable(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::unavailable(&self.path, e))?;

        debug!(path = %self.path.display(), incidents = store.incidents.len(), "saved store");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::{Cluster, Incident, IncidentId, Severity, TrendPoint};
    use crate::scenario::Scenario;

    fn sample_store() -> Store {
        let mut store = Store::default();
        store
            .merge(
                Incident {
                    id: IncidentId::from_number(1001),
                    service: "payments-api".into(),
                    severity: Severity::Sev2,
                    status: "Open".into(),
                    scenario: Scenario::Mixed,
                    engine: "sklearn".into(),
                    created_at: chrono::Utc::now(),
                },
                vec![TrendPoint {
                    ts: "2026-02-14T08:00:00Z".into(),
                    errors: serde_json::Number::from(2u64),
                }],
                vec![Cluster {
                    cluster_id: "CL-1".into(),
                    category: "Throttling/Quota".into(),
                    count: 9,
                    confidence: 0.7,
                    signature: "rate limit".into(),
                    sample: "429 Too Many Requests: rate limit exceeded".into(),
                }],
            )
            .unwrap();
        store
    }

    #[test]
    fn test_open_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonFileBackend::open(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));

        let err = JsonFileBackend::open(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));
    }

    #[test]
    fn test_create_then_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("sample.json");

        let (backend, created) = JsonFileBackend::create(&path).unwrap();
        assert!(created);
        assert_eq!(backend.load().unwrap(), Store::default());

        let store = sample_store();
        backend.save(&store).unwrap();
        assert_eq!(backend.load().unwrap(), store);
        assert!(!backend.temp_path().exists());

        let (_, created) = JsonFileBackend::create(&path).unwrap();
        assert!(!created);
    }

    #[test]
    fn test_save_overwrites_fully() {
        let dir = tempfile::tempdir().unwrap();
        let (backend, _) = JsonFileBackend::create(dir.path().join("s.json")).unwrap();

        backend.save(&sample_store()).unwrap();
        backend.save(&Store::default()).unwrap();
        assert_eq!(backend.load().unwrap(), Store::default());
    }

    #[test]
    fn test_corrupt_document_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(&path, "{\"incidents\": [ {").unwrap();

        let backend = JsonFileBackend::open(&path).unwrap();
        assert!(matches!(backend.load().unwrap_err(), StoreError::Corrupt(_)));
    }
}
