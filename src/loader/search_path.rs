//! Module resolution context
//!
//! Plays the part of an import path plus a module table: search paths decide
//! which directory a unit's module id is relative to. Loaded units are kept by
//! file, so one file is only ever one unit, and two files that share a module
//! id under different roots stay two units. Imports bind to the file most
//! recently loaded under the id.

use crate::config::CHECK_UNIT_EXTENSION;
use crate::error::{LoaderError, LoaderResult};
use crate::loader::unit::CheckUnit;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
pub struct ResolutionContext {
    search_paths: Vec<PathBuf>,
    units: HashMap<PathBuf, Arc<CheckUnit>>,
    modules: HashMap<String, PathBuf>,
    loading: HashSet<PathBuf>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            search_paths: paths.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// The search path `root` lives under. Unknown roots become search
    /// paths themselves, ahead of the existing ones.
    pub fn resolution_base(&mut self, root: &Path) -> PathBuf {
        if let Some(base) = self
            .search_paths
            .iter()
            .find(|p| !p.as_os_str().is_empty() && root.starts_with(p))
        {
            return base.clone();
        }
        debug!("{} is not on the search path, added it", root.display());
        self.search_paths.insert(0, root.to_path_buf());
        root.to_path_buf()
    }

    /// Find the file for `module` under any search path.
    pub fn locate(&self, module: &str) -> Option<(PathBuf, PathBuf)> {
        let relative: PathBuf = module.split('.').collect();
        let relative = relative.with_extension(CHECK_UNIT_EXTENSION);
        self.search_paths
            .iter()
            .map(|base| (base.join(&relative), base.clone()))
            .find(|(path, _)| path.is_file())
    }

    /// Unit most recently loaded as `module`.
    pub fn module(&self, module: &str) -> Option<Arc<CheckUnit>> {
        self.modules.get(module).and_then(|path| self.unit(path))
    }

    /// Unit loaded from `path`.
    pub fn unit(&self, path: &Path) -> Option<Arc<CheckUnit>> {
        self.units.get(path).cloned()
    }

    pub(crate) fn begin_loading(&mut self, path: &Path) -> bool {
        self.loading.insert(path.to_path_buf())
    }

    pub(crate) fn finish_loading(&mut self, path: &Path, unit: Option<Arc<CheckUnit>>) {
        self.loading.remove(path);
        if let Some(unit) = unit {
            self.modules.insert(unit.module.clone(), path.to_path_buf());
            self.units.insert(path.to_path_buf(), unit);
        }
    }
}

/// Module id of `path` relative to `base`: `base/a/b/c.check` → `a.b.c`.
pub fn path_to_module(path: &Path, base: &Path) -> LoaderResult<String> {
    let outside = || LoaderError::OutsideSearchPath {
        path: path.to_path_buf(),
        base: base.to_path_buf(),
    };
    let relative = path.strip_prefix(base).map_err(|_| outside())?;
    let relative = relative.with_extension("");

    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        return Err(outside());
    }
    Ok(parts.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_id_strips_base_and_extension() {
        let module = path_to_module(
            Path::new("/srv/checks/labels/maintainer.check"),
            Path::new("/srv/checks"),
        )
        .unwrap();
        assert_eq!(module, "labels.maintainer");

        let module =
            path_to_module(Path::new("/srv/checks/top.check"), Path::new("/srv/checks/")).unwrap();
        assert_eq!(module, "top");
    }

    #[test]
    fn module_outside_base_is_a_configuration_error() {
        let err = path_to_module(Path::new("/elsewhere/x.check"), Path::new("/srv/checks"))
            .unwrap_err();
        assert!(matches!(err, LoaderError::OutsideSearchPath { .. }));
    }

    #[test]
    fn known_search_path_is_reused_as_base() {
        let mut context = ResolutionContext::with_search_paths(["/srv"]);
        let base = context.resolution_base(Path::new("/srv/checks/extra"));
        assert_eq!(base, PathBuf::from("/srv"));
        assert_eq!(context.search_paths(), &[PathBuf::from("/srv")]);
    }

    #[test]
    fn prefix_match_is_per_component() {
        let mut context = ResolutionContext::with_search_paths(["/srv/check"]);
        let base = context.resolution_base(Path::new("/srv/checks"));
        assert_eq!(base, PathBuf::from("/srv/checks"));
    }

    #[test]
    fn unknown_root_is_registered_first() {
        let mut context = ResolutionContext::with_search_paths(["/usr/share/checks"]);
        let base = context.resolution_base(Path::new("/home/me/checks"));
        assert_eq!(base, PathBuf::from("/home/me/checks"));
        assert_eq!(
            context.search_paths(),
            &[
                PathBuf::from("/home/me/checks"),
                PathBuf::from("/usr/share/checks")
            ]
        );
    }

    #[test]
    fn locate_maps_dots_to_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("labels")).unwrap();
        std::fs::write(dir.path().join("labels/base.check"), "{}").unwrap();

        let context = ResolutionContext::with_search_paths([dir.path()]);
        let (path, base) = context.locate("labels.base").unwrap();
        assert_eq!(path, dir.path().join("labels/base.check"));
        assert_eq!(base, dir.path());
        assert!(context.locate("labels.missing").is_none());
    }
}
