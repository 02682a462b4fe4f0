//! Check discovery
//!
//! Walks check directories, loads every `*.check` unit and indexes the
//! qualifying classes by their declared name. A class qualifies when its
//! name ends in `Check` but not in `AbstractCheck` and [`ABSTRACT_CHECK`]
//! appears somewhere in its ancestry.

pub mod bases;
pub mod metadata;
pub mod search_path;
pub mod unit;

pub use bases::{ABSTRACT_CHECK, BaseType, BaseTypes};
pub use metadata::{MetadataSource, SidecarMetadataSource};
pub use search_path::{ResolutionContext, path_to_module};
pub use unit::{CheckUnit, ClassDef, ClassFields, ClassId, load_unit};

use crate::config::CHECK_UNIT_EXTENSION;
use crate::error::{LoaderError, LoaderResult};
use bases::{ABSTRACT_SUFFIX, CHECK_SUFFIX};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

/// Registry entry: a discovered check under its declared name.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckClass {
    pub name: String,
    pub definition: Arc<ClassDef>,
    /// Only set for metadata-bearing checks
    pub metadata: Option<Value>,
}

impl CheckClass {
    pub fn id(&self) -> &ClassId {
        &self.definition.id
    }

    pub fn fields(&self) -> &ClassFields {
        &self.definition.fields
    }

    /// Directory of the unit defining the class.
    pub fn dir(&self) -> &Path {
        &self.definition.dir
    }
}

/// Registry of discovered checks, keyed by declared name.
pub type CheckMapping = BTreeMap<String, Arc<CheckClass>>;

pub fn is_qualifying(class: &ClassDef) -> bool {
    let name = class.class_name();
    !name.ends_with(ABSTRACT_SUFFIX) && name.ends_with(CHECK_SUFFIX) && class.derives_from(ABSTRACT_CHECK)
}

fn is_metadata_bearing(class: &ClassDef, bases: &BaseTypes) -> bool {
    class.ancestry.iter().any(|a| bases.is_metadata_bearing(a))
}

/// Reject roots that exist but are not directories.
fn validate_roots(roots: &[PathBuf]) -> LoaderResult<()> {
    match roots.iter().find(|root| root.exists() && !root.is_dir()) {
        Some(root) => Err(LoaderError::NotADirectory(root.clone())),
        None => Ok(()),
    }
}

/// Scan `roots` and build the name-indexed registry.
///
/// Any unit that fails to load aborts the whole scan. Roots that do not
/// exist are skipped.
pub fn discover(
    roots: &[PathBuf],
    context: &mut ResolutionContext,
    bases: &BaseTypes,
    metadata: &dyn MetadataSource,
) -> LoaderResult<CheckMapping> {
    validate_roots(roots)?;

    // Keyed by identity so classes imported into several units count once.
    let mut found: BTreeMap<ClassId, Arc<ClassDef>> = BTreeMap::new();
    for root in roots {
        if !root.exists() {
            debug!("Skipping nonexistent check directory {}", root.display());
            continue;
        }
        let base = context.resolution_base(root);
        for path in unit_files(root)? {
            let unit = load_unit(context, bases, &path, &base)?;
            for class in unit.members().filter(|c| is_qualifying(c)) {
                found
                    .entry(class.id.clone())
                    .or_insert_with(|| Arc::clone(class));
            }
        }
    }

    let mut mapping = CheckMapping::new();
    for (id, definition) in found {
        let name = definition
            .fields
            .name
            .clone()
            .ok_or_else(|| LoaderError::MissingName {
                module: id.module.clone(),
                class: id.class.clone(),
            })?;
        if let Some(existing) = mapping.get(&name) {
            return Err(LoaderError::DuplicateName {
                name,
                first: format!("{} ({})", existing.id(), existing.id().path.display()),
                second: format!("{} ({})", id, id.path.display()),
            });
        }

        let metadata = if is_metadata_bearing(&definition, bases) {
            Some(metadata.receive(&name, &definition.dir)?)
        } else {
            None
        };
        debug!("Registering check '{}' ({})", name, id);
        mapping.insert(
            name.clone(),
            Arc::new(CheckClass {
                name,
                definition,
                metadata,
            }),
        );
    }
    Ok(mapping)
}

fn unit_files(root: &Path) -> LoaderResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| LoaderError::Io {
            path: e.path().unwrap_or(root).to_path_buf(),
            source: e.into(),
        })?;
        if entry.file_type().is_file()
            && entry.path().extension() == Some(OsStr::new(CHECK_UNIT_EXTENSION))
        {
            files.push(entry.into_path());
        }
    }
    debug!("Found {} check units under {}", files.len(), root.display());
    Ok(files)
}

/// Lazily discovers checks under a fixed set of directories.
///
/// The registry is built on first access and kept for the loader's lifetime.
pub struct CheckLoader {
    paths: Vec<PathBuf>,
    context: ResolutionContext,
    bases: BaseTypes,
    metadata: Box<dyn MetadataSource>,
    mapping: Option<CheckMapping>,
}

impl std::fmt::Debug for CheckLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckLoader")
            .field("paths", &self.paths)
            .field("context", &self.context)
            .field("loaded", &self.mapping.is_some())
            .finish()
    }
}

impl CheckLoader {
    /// Fails right away if any path is a file.
    pub fn new<I, P>(paths: I) -> LoaderResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        validate_roots(&paths)?;
        Ok(Self {
            paths,
            context: ResolutionContext::new(),
            bases: BaseTypes::default(),
            metadata: Box::new(SidecarMetadataSource),
            mapping: None,
        })
    }

    pub fn with_context(mut self, context: ResolutionContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_base_types(mut self, bases: BaseTypes) -> Self {
        self.bases = bases;
        self
    }

    pub fn with_metadata_source(mut self, source: impl MetadataSource + 'static) -> Self {
        self.metadata = Box::new(source);
        self
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn context(&self) -> &ResolutionContext {
        &self.context
    }

    pub fn mapping(&mut self) -> LoaderResult<&CheckMapping> {
        let mapping = match self.mapping.take() {
            Some(mapping) => mapping,
            None => discover(
                &self.paths,
                &mut self.context,
                &self.bases,
                self.metadata.as_ref(),
            )?,
        };
        Ok(self.mapping.insert(mapping))
    }

    /// Discovered checks ordered by name.
    pub fn check_classes(&mut self) -> LoaderResult<Vec<Arc<CheckClass>>> {
        Ok(self.mapping()?.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, ancestry: &[&str]) -> ClassDef {
        ClassDef {
            id: ClassId {
                module: "m".to_string(),
                class: name.to_string(),
                path: PathBuf::from("m.check"),
            },
            dir: PathBuf::new(),
            ancestry: std::iter::once(name)
                .chain(ancestry.iter().copied())
                .map(str::to_string)
                .collect(),
            fields: ClassFields::default(),
        }
    }

    #[test]
    fn qualification_needs_suffix_and_root_ancestor() {
        assert!(is_qualifying(&class(
            "MaintainerLabelCheck",
            &["LabelAbstractCheck", "ImageAbstractCheck", "AbstractCheck"]
        )));
        assert!(!is_qualifying(&class("RequiredLabelAbstractCheck", &["AbstractCheck"])));
        assert!(!is_qualifying(&class("LabelHelper", &["AbstractCheck"])));
        assert!(!is_qualifying(&class("OrphanCheck", &["SomethingElse"])));
    }

    #[test]
    fn metadata_bearing_follows_ancestry() {
        let bases = BaseTypes::default();
        let bearing = class("HelpFileCheck", &["MetadataAbstractCheck", "AbstractCheck"]);
        let plain = class("FromCheck", &["ImageAbstractCheck", "AbstractCheck"]);
        assert!(is_metadata_bearing(&bearing, &bases));
        assert!(!is_metadata_bearing(&plain, &bases));
    }

    #[test]
    fn file_root_is_rejected_eagerly() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir.check");
        std::fs::write(&file, "{}").unwrap();

        let err = CheckLoader::new([dir.path().to_path_buf(), file.clone()]).unwrap_err();
        assert!(matches!(err, LoaderError::NotADirectory(path) if path == file));
    }

    #[test]
    fn missing_root_yields_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = CheckLoader::new([dir.path().join("absent")]).unwrap();
        assert!(loader.mapping().unwrap().is_empty());
    }
}
