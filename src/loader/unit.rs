//! Check units: the loadable files discovery scans.
//!
//! A unit is a JSON document declaring classes and the names it imports from
//! other units:
//!
//! ```json
//! {
//!   "imports": [{ "module": "labels.base", "names": ["RequiredLabelAbstractCheck"] }],
//!   "classes": [
//!     {
//!       "class": "MaintainerLabelCheck",
//!       "bases": ["RequiredLabelAbstractCheck"],
//!       "name": "maintainer_label",
//!       "message": "Label 'maintainer' has to be specified.",
//!       "attributes": { "labels": ["maintainer"] }
//!     }
//!   ]
//! }
//! ```
//!
//! Bases must name a class defined earlier in the unit, an imported class, or
//! a registered [`BaseTypes`] entry. Fields a class leaves out are inherited
//! from its class bases, first base first.

use crate::error::{LoaderError, LoaderResult};
use crate::loader::bases::BaseTypes;
use crate::loader::search_path::{ResolutionContext, path_to_module};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnitSource {
    #[serde(default)]
    imports: Vec<ImportDecl>,
    #[serde(default)]
    classes: Vec<ClassDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ImportDecl {
    module: String,
    /// Empty imports every class the module defines itself.
    #[serde(default)]
    names: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClassDecl {
    class: String,
    #[serde(default)]
    bases: Vec<String>,
    #[serde(flatten)]
    fields: ClassFields,
}

/// Descriptive fields of a class, after inheritance.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClassFields {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reference_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl ClassFields {
    fn inherit(mut self, parents: &[Arc<ClassDef>]) -> Self {
        let inherited = |get: fn(&ClassFields) -> &Option<String>| {
            parents.iter().find_map(|p| get(&p.fields).clone())
        };
        if self.name.is_none() {
            self.name = inherited(|f| &f.name);
        }
        if self.message.is_none() {
            self.message = inherited(|f| &f.message);
        }
        if self.description.is_none() {
            self.description = inherited(|f| &f.description);
        }
        if self.reference_url.is_none() {
            self.reference_url = inherited(|f| &f.reference_url);
        }
        if self.tags.is_empty() {
            if let Some(parent) = parents.iter().find(|p| !p.fields.tags.is_empty()) {
                self.tags = parent.fields.tags.clone();
            }
        }

        let mut attributes = Map::new();
        for parent in parents.iter().rev() {
            attributes.extend(parent.fields.attributes.clone());
        }
        attributes.extend(self.attributes);
        self.attributes = attributes;
        self
    }
}

/// Identity of a class: the unit file defining it plus its class name.
/// The module id is carried for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId {
    pub module: String,
    pub class: String,
    pub path: PathBuf,
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.class)
    }
}

/// A class as loaded from its unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub id: ClassId,
    /// Directory of the defining unit
    pub dir: PathBuf,
    /// Class name first, then every ancestor; class bases before built-ins.
    pub ancestry: Vec<String>,
    pub fields: ClassFields,
}

impl ClassDef {
    pub fn class_name(&self) -> &str {
        &self.id.class
    }

    pub fn derives_from(&self, base: &str) -> bool {
        self.ancestry.iter().any(|a| a == base)
    }
}

/// A loaded unit: its own classes and every class name bound in it.
#[derive(Debug)]
pub struct CheckUnit {
    pub module: String,
    pub path: PathBuf,
    pub classes: Vec<Arc<ClassDef>>,
    members: BTreeMap<String, Arc<ClassDef>>,
}

impl CheckUnit {
    /// Classes bound in the unit, own and imported, ordered by name.
    pub fn members(&self) -> impl Iterator<Item = &Arc<ClassDef>> {
        self.members.values()
    }

    pub fn member(&self, name: &str) -> Option<&Arc<ClassDef>> {
        self.members.get(name)
    }
}

/// Load the unit at `path`, its module id taken relative to `base`. A file
/// that was loaded before is returned as is.
pub fn load_unit(
    context: &mut ResolutionContext,
    bases: &BaseTypes,
    path: &Path,
    base: &Path,
) -> LoaderResult<Arc<CheckUnit>> {
    let module = path_to_module(path, base)?;
    load_module(context, bases, &module, path)
}

fn load_module(
    context: &mut ResolutionContext,
    bases: &BaseTypes,
    module: &str,
    path: &Path,
) -> LoaderResult<Arc<CheckUnit>> {
    if let Some(unit) = context.unit(path) {
        return Ok(unit);
    }
    if !context.begin_loading(path) {
        // Circular import: the module is still being loaded further up.
        return Err(LoaderError::UnresolvedImport {
            module: module.to_string(),
            import: module.to_string(),
        });
    }

    debug!("Will try to load '{}' as module '{}'", path.display(), module);
    let result = parse_unit(context, bases, module, path).map(Arc::new);
    let loaded = result.as_ref().ok().cloned();
    context.finish_loading(path, loaded);
    result
}

fn parse_unit(
    context: &mut ResolutionContext,
    bases: &BaseTypes,
    module: &str,
    path: &Path,
) -> LoaderResult<CheckUnit> {
    let raw = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let source: UnitSource = serde_json::from_str(&raw).map_err(|source| LoaderError::Syntax {
        module: module.to_string(),
        path: path.to_path_buf(),
        source,
    })?;
    let mut members: BTreeMap<String, Arc<ClassDef>> = BTreeMap::new();
    for import in &source.imports {
        for (name, class) in resolve_import(context, bases, module, import)? {
            members.insert(name, class);
        }
    }

    let mut classes = Vec::with_capacity(source.classes.len());
    for declared in source.classes {
        let class = Arc::new(define_class(bases, &members, module, path, declared)?);
        members.insert(class.id.class.clone(), Arc::clone(&class));
        classes.push(class);
    }

    Ok(CheckUnit {
        module: module.to_string(),
        path: path.to_path_buf(),
        classes,
        members,
    })
}

fn resolve_import(
    context: &mut ResolutionContext,
    bases: &BaseTypes,
    module: &str,
    import: &ImportDecl,
) -> LoaderResult<Vec<(String, Arc<ClassDef>)>> {
    let unresolved = |name: Option<&str>| LoaderError::UnresolvedImport {
        module: module.to_string(),
        import: match name {
            Some(name) => format!("{}.{}", import.module, name),
            None => import.module.clone(),
        },
    };

    let unit = match context.module(&import.module) {
        Some(unit) => unit,
        None => {
            let (path, _) = context.locate(&import.module).ok_or_else(|| unresolved(None))?;
            load_module(context, bases, &import.module, &path)?
        }
    };

    if import.names.is_empty() {
        return Ok(unit
            .classes
            .iter()
            .map(|class| (class.id.class.clone(), Arc::clone(class)))
            .collect());
    }
    import
        .names
        .iter()
        .map(|name| {
            unit.member(name)
                .map(|class| (name.clone(), Arc::clone(class)))
                .ok_or_else(|| unresolved(Some(name)))
        })
        .collect()
}

fn define_class(
    bases: &BaseTypes,
    scope: &BTreeMap<String, Arc<ClassDef>>,
    module: &str,
    path: &Path,
    declared: ClassDecl,
) -> LoaderResult<ClassDef> {
    let mut parents = Vec::new();
    let mut ancestry = vec![declared.class.clone()];

    for base in &declared.bases {
        let inherited = if let Some(parent) = scope.get(base) {
            parents.push(Arc::clone(parent));
            parent.ancestry.clone()
        } else if bases.contains(base) {
            bases.ancestry(base)
        } else {
            return Err(LoaderError::UnresolvedBase {
                module: module.to_string(),
                class: declared.class.clone(),
                base: base.clone(),
            });
        };
        for name in inherited {
            if !ancestry.contains(&name) {
                ancestry.push(name);
            }
        }
    }

    Ok(ClassDef {
        id: ClassId {
            module: module.to_string(),
            class: declared.class,
            path: path.to_path_buf(),
        },
        dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        ancestry,
        fields: declared.fields.inherit(&parents),
    })
}
