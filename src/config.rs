//! Tool and staging configuration
//!
//! Defaults match a stock host; every value can be overridden through
//! `IMGCHECK_*` environment variables or the builder setters.

use std::env;
use std::path::PathBuf;

/// Environment variable naming the staging repository for the pull tool.
pub const REPOSITORY_ENV: &str = "ATOMIC_OSTREE_REPO";

/// Extension of loadable check units.
pub const CHECK_UNIT_EXTENSION: &str = "check";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    /// Pulls into, mounts from and unmounts the staging repository
    pub atomic: String,
    /// Copies an image into a portable docker archive
    pub skopeo: String,
    pub tar: String,
    pub staging_parent: PathBuf,
    pub staging_prefix: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            atomic: "atomic".to_string(),
            skopeo: "skopeo".to_string(),
            tar: "tar".to_string(),
            staging_parent: PathBuf::from("/var/tmp"),
            staging_prefix: "imgcheck-".to_string(),
        }
    }
}

impl ToolConfig {
    /// Defaults overlaid with whatever `IMGCHECK_*` variables are set.
    pub fn from_env() -> Self {
        Self::default().overlay(|key| env::var(key).ok())
    }

    fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(atomic) = lookup("IMGCHECK_ATOMIC") {
            self.atomic = atomic;
        }
        if let Some(skopeo) = lookup("IMGCHECK_SKOPEO") {
            self.skopeo = skopeo;
        }
        if let Some(tar) = lookup("IMGCHECK_TAR") {
            self.tar = tar;
        }
        if let Some(dir) = lookup("IMGCHECK_STAGING_DIR") {
            self.staging_parent = PathBuf::from(dir);
        }
        if let Some(prefix) = lookup("IMGCHECK_STAGING_PREFIX") {
            self.staging_prefix = prefix;
        }
        self
    }

    pub fn with_atomic(mut self, atomic: impl Into<String>) -> Self {
        self.atomic = atomic.into();
        self
    }

    pub fn with_skopeo(mut self, skopeo: impl Into<String>) -> Self {
        self.skopeo = skopeo.into();
        self
    }

    pub fn with_tar(mut self, tar: impl Into<String>) -> Self {
        self.tar = tar.into();
        self
    }

    pub fn with_staging_parent(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_parent = dir.into();
        self
    }

    pub fn with_staging_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.staging_prefix = prefix.into();
        self
    }
}
