//! Versioned model registry
//!
//! Every published bundle is written once under `{root}/{kind}/v{n}.bin`
//! and never overwritten. `index.json` records the versions of each model
//! kind and which one is active, so a bad retraining can be rolled back by
//! moving the pointer.

use super::bundle::{ModelBundle, ModelKind};
use super::serializer;
use crate::error::{EdumindError, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

const INDEX_FILE: &str = "index.json";

/// Registry entry (metadata only, without model data)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: u64,
    /// File path relative to registry root
    pub path: String,
    pub trained_at: DateTime<Utc>,
    pub metrics: BTreeMap<String, f64>,
}

/// Versions of one model kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelHistory {
    pub active: Option<u64>,
    pub versions: Vec<VersionEntry>,
}

impl ModelHistory {
    fn entry(&self, version: u64) -> Option<&VersionEntry> {
        self.versions.iter().find(|e| e.version == version)
    }

    fn latest(&self) -> u64 {
        self.versions.iter().map(|e| e.version).max().unwrap_or(0)
    }
}

/// Registry index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryIndex {
    /// Histories keyed by model kind name
    pub models: BTreeMap<String, ModelHistory>,
}

/// Listing row returned by [`ModelRegistry::list_versions`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: u64,
    pub trained_at: DateTime<Utc>,
    pub metrics: BTreeMap<String, f64>,
    pub active: bool,
}

/// Model registry for managing versioned bundles
pub struct ModelRegistry {
    /// Root directory
    root: PathBuf,
    /// Index, also serializing every write to the registry
    index: Mutex<RegistryIndex>,
}

impl ModelRegistry {
    /// Create or open registry at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let index_path = root.join(INDEX_FILE);
        let index = if index_path.exists() {
            let file = File::open(&index_path)?;
            serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                EdumindError::CorruptModelFile {
                    path: index_path.clone(),
                    reason: format!("unreadable registry index: {}", e),
                }
            })?
        } else {
            RegistryIndex::default()
        };

        Ok(Self {
            root,
            index: Mutex::new(index),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn save_index(&self, index: &RegistryIndex) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer_pretty(&mut tmp, index)?;
        tmp.flush()?;
        tmp.persist(self.root.join(INDEX_FILE))
            .map_err(|e| EdumindError::IoError(e.error))?;
        Ok(())
    }

    /// Store `bundle` as the next version of its kind and make it active.
    /// The bundle's header is stamped with the assigned version.
    pub fn publish<M: Serialize>(&self, bundle: &mut ModelBundle<M>) -> Result<u64> {
        let kind = bundle.kind();
        let mut index = self.index.lock();
        let history = index.models.get(kind.as_str()).cloned().unwrap_or_default();

        let version = history.latest() + 1;
        bundle.header.version = version;

        let relative_path = format!("{}/v{:06}.bin", kind.as_str(), version);
        serializer::save(bundle, self.root.join(&relative_path))?;

        let mut updated = history;
        updated.versions.push(VersionEntry {
            version,
            path: relative_path,
            trained_at: bundle.header.trained_at,
            metrics: bundle.header.metrics.clone(),
        });
        updated.active = Some(version);

        let mut next = index.clone();
        next.models.insert(kind.as_str().to_string(), updated);
        self.save_index(&next)?;
        *index = next;

        info!(kind = %kind, version, "Published model version");
        Ok(version)
    }

    /// Active version of a kind, if any has been published
    pub fn active_version(&self, kind: ModelKind) -> Option<u64> {
        self.index
            .lock()
            .models
            .get(kind.as_str())
            .and_then(|h| h.active)
    }

    /// Load the active bundle; `ModelNotTrained` when nothing is published
    pub fn load_active<M: DeserializeOwned>(&self, kind: ModelKind) -> Result<ModelBundle<M>> {
        let version = self
            .active_version(kind)
            .ok_or(EdumindError::ModelNotTrained)?;
        self.load_version(kind, version)
    }

    /// Load a specific version
    pub fn load_version<M: DeserializeOwned>(
        &self,
        kind: ModelKind,
        version: u64,
    ) -> Result<ModelBundle<M>> {
        let path = self.version_path(kind, version)?;
        serializer::load(path, kind)
    }

    fn version_path(&self, kind: ModelKind, version: u64) -> Result<PathBuf> {
        let index = self.index.lock();
        index
            .models
            .get(kind.as_str())
            .and_then(|h| h.entry(version))
            .map(|e| self.root.join(&e.path))
            .ok_or_else(|| EdumindError::VersionNotFound {
                model: kind.as_str().to_string(),
                version,
            })
    }

    /// List versions of a kind, oldest first
    pub fn list_versions(&self, kind: ModelKind) -> Vec<VersionInfo> {
        let index = self.index.lock();
        index
            .models
            .get(kind.as_str())
            .map(|h| {
                h.versions
                    .iter()
                    .map(|e| VersionInfo {
                        version: e.version,
                        trained_at: e.trained_at,
                        metrics: e.metrics.clone(),
                        active: h.active == Some(e.version),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Point the active pointer at `target`, or at the newest version older
    /// than the current one when `target` is `None`.
    pub fn rollback(&self, kind: ModelKind, target: Option<u64>) -> Result<u64> {
        let mut index = self.index.lock();
        let history = index
            .models
            .get(kind.as_str())
            .cloned()
            .ok_or(EdumindError::ModelNotTrained)?;

        let current = history.active.unwrap_or(history.latest() + 1);
        let version = match target {
            Some(v) => v,
            None => history
                .versions
                .iter()
                .map(|e| e.version)
                .filter(|&v| v < current)
                .max()
                .ok_or_else(|| EdumindError::VersionNotFound {
                    model: kind.as_str().to_string(),
                    version: current.saturating_sub(1),
                })?,
        };

        let entry = history
            .entry(version)
            .ok_or_else(|| EdumindError::VersionNotFound {
                model: kind.as_str().to_string(),
                version,
            })?;
        let artifact = self.root.join(&entry.path);
        if !artifact.exists() {
            return Err(EdumindError::ModelFileNotFound(artifact));
        }

        let mut next = index.clone();
        if let Some(h) = next.models.get_mut(kind.as_str()) {
            h.active = Some(version);
        }
        self.save_index(&next)?;
        *index = next;

        warn!(kind = %kind, from = current, to = version, "Rolled back active model version");
        Ok(version)
    }
}
