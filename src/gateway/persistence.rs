use super::{PersistenceGateway, SaveReceipt};
use crate::error::GatewayError;
use crate::graph::Workflow;
use ahash::AHashMap;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Keeps one `<flow_id>.json` file per flow in a directory.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    dir: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `flow_id`. Ids that would escape the directory are rejected.
    pub fn path_for(&self, flow_id: &str) -> Result<PathBuf, GatewayError> {
        let valid = !flow_id.is_empty()
            && flow_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(GatewayError::Rejected(format!("invalid flow id '{}'", flow_id)));
        }
        Ok(self.dir.join(format!("{}.json", flow_id)))
    }
}

fn io_error(path: &Path, e: std::io::Error) -> GatewayError {
    GatewayError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

impl PersistenceGateway for JsonFilePersistence {
    fn save(&mut self, flow_id: &str, workflow: &Workflow) -> Result<SaveReceipt, GatewayError> {
        let path = self.path_for(flow_id)?;
        let json = workflow
            .to_json_string()
            .map_err(|e| GatewayError::Serialization(e.to_string()))?;
        fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;
        fs::write(&path, json).map_err(|e| io_error(&path, e))?;
        debug!(flow_id, path = %path.display(), "Workflow written");
        Ok(SaveReceipt { saved_at: Utc::now() })
    }

    fn load(&self, flow_id: &str) -> Result<Option<Workflow>, GatewayError> {
        let path = self.path_for(flow_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
        Ok(Some(Workflow::from_json_str(&json)?))
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    flows: AHashMap<String, String>,
    pending_failures: Vec<String>,
    saves: usize,
}

/// In-process persistence. Clones share the same storage.
///
/// Workflows are stored as JSON, so a load goes through the same wire format as a file.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the next save fail with `reason`. Calls queue up.
    pub fn fail_next(&self, reason: &str) {
        self.lock().pending_failures.push(reason.to_string());
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    pub fn contains(&self, flow_id: &str) -> bool {
        self.lock().flows.contains_key(flow_id)
    }
}

impl PersistenceGateway for MemoryPersistence {
    fn save(&mut self, flow_id: &str, workflow: &Workflow) -> Result<SaveReceipt, GatewayError> {
        let mut inner = self.lock();
        if !inner.pending_failures.is_empty() {
            let reason = inner.pending_failures.remove(0);
            return Err(GatewayError::Rejected(reason));
        }
        let json = workflow
            .to_json_string()
            .map_err(|e| GatewayError::Serialization(e.to_string()))?;
        inner.flows.insert(flow_id.to_string(), json);
        inner.saves += 1;
        Ok(SaveReceipt { saved_at: Utc::now() })
    }

    fn load(&self, flow_id: &str) -> Result<Option<Workflow>, GatewayError> {
        match self.lock().flows.get(flow_id) {
            Some(json) => Ok(Some(Workflow::from_json_str(json)?)),
            None => Ok(None),
        }
    }
}
