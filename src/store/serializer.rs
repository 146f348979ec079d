//! Bundle serialization
//!
//! A bundle is written as a bincode envelope: magic bytes, format version,
//! model kind, the bincode payload and an FNV-1a checksum of the payload.
//! Writes go to a temporary file in the target directory and are renamed
//! into place, so readers never observe a partial artifact.

use super::bundle::{ModelBundle, ModelKind};
use crate::error::{EdumindError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// On-disk wrapper around a serialized bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    magic: [u8; 4],
    format_version: u32,
    kind: ModelKind,
    payload: Vec<u8>,
    checksum: u64,
}

impl Envelope {
    /// Magic bytes for edumind bundle files
    const MAGIC: [u8; 4] = *b"EDMB";
    /// Current format version
    const VERSION: u32 = 1;

    fn new(kind: ModelKind, payload: Vec<u8>) -> Self {
        let checksum = fnv1a(&payload);
        Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            kind,
            payload,
            checksum,
        }
    }
}

/// Compute checksum using FNV-1a hash
fn fnv1a(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Encode a bundle into envelope bytes
pub fn to_bytes<M: Serialize>(bundle: &ModelBundle<M>) -> Result<Vec<u8>> {
    let payload = bincode::serialize(bundle)
        .map_err(|e| EdumindError::SerializationError(format!("Failed to serialize bundle: {}", e)))?;
    let envelope = Envelope::new(bundle.kind(), payload);
    bincode::serialize(&envelope)
        .map_err(|e| EdumindError::SerializationError(format!("Failed to serialize envelope: {}", e)))
}

/// Decode envelope bytes. `path` only labels errors.
pub fn from_bytes<M: DeserializeOwned>(
    bytes: &[u8],
    expected: ModelKind,
    path: &Path,
) -> Result<ModelBundle<M>> {
    let corrupt = |reason: String| EdumindError::CorruptModelFile {
        path: path.to_path_buf(),
        reason,
    };

    let envelope: Envelope =
        bincode::deserialize(bytes).map_err(|e| corrupt(format!("unreadable envelope: {}", e)))?;

    if envelope.magic != Envelope::MAGIC {
        return Err(corrupt("not an edumind model file".to_string()));
    }
    if envelope.format_version > Envelope::VERSION {
        return Err(corrupt(format!(
            "unsupported format version {}",
            envelope.format_version
        )));
    }
    if envelope.kind != expected {
        return Err(corrupt(format!(
            "holds a {} model, expected {}",
            envelope.kind, expected
        )));
    }
    if fnv1a(&envelope.payload) != envelope.checksum {
        return Err(corrupt("checksum mismatch".to_string()));
    }

    let bundle: ModelBundle<M> = bincode::deserialize(&envelope.payload)
        .map_err(|e| corrupt(format!("unreadable bundle: {}", e)))?;
    if bundle.kind() != expected {
        return Err(corrupt("bundle kind disagrees with envelope".to_string()));
    }
    Ok(bundle)
}

/// Write a bundle to `path`, replacing any existing artifact atomically
pub fn save<M: Serialize>(bundle: &ModelBundle<M>, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let bytes = to_bytes(bundle)?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let mut tmp = NamedTempFile::new_in(&parent)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| EdumindError::IoError(e.error))?;

    info!(
        kind = %bundle.kind(),
        version = bundle.version(),
        bytes = bytes.len(),
        path = %path.display(),
        "Model bundle saved"
    );
    Ok(())
}

/// Read a bundle written by [`save`]
pub fn load<M: DeserializeOwned>(path: impl AsRef<Path>, expected: ModelKind) -> Result<ModelBundle<M>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(EdumindError::ModelFileNotFound(path.to_path_buf()));
    }

    let bytes = fs::read(path)?;
    let bundle = from_bytes(&bytes, expected, path)?;
    debug!(kind = %expected, version = bundle.version(), path = %path.display(), "Model bundle loaded");
    Ok(bundle)
}
