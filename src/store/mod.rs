//! Model store
//!
//! Atomic persistence of model bundles, a versioned registry on top of it,
//! and the in-memory holder used by the prediction path.

pub mod bundle;
pub mod cache;
pub mod registry;
pub mod serializer;

pub use bundle::{BundleHeader, ModelBundle, ModelKind};
pub use cache::BundleCache;
pub use registry::{ModelHistory, ModelRegistry, RegistryIndex, VersionEntry, VersionInfo};
pub use serializer::{load, save};
