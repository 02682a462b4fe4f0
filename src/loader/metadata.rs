//! Companion metadata for metadata-bearing checks.

use crate::error::{LoaderError, LoaderResult};
use serde_json::Value;
use std::path::Path;

/// Looks up metadata by check name and the directory of the unit that
/// defines the check.
pub trait MetadataSource {
    fn receive(&self, name: &str, dir: &Path) -> LoaderResult<Value>;
}

/// Reads `<dir>/<name>.meta.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarMetadataSource;

impl MetadataSource for SidecarMetadataSource {
    fn receive(&self, name: &str, dir: &Path) -> LoaderResult<Value> {
        let path = dir.join(format!("{}.meta.json", name));
        let failed = |message: String| LoaderError::Metadata {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            message,
        };
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| failed(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&raw).map_err(|e| failed(format!("{}: {}", path.display(), e)))
    }
}
