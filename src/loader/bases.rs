//! Built-in base types check classes derive from.

use crate::error::{LoaderError, LoaderResult};
use std::collections::HashMap;

/// Root of every check hierarchy.
pub const ABSTRACT_CHECK: &str = "AbstractCheck";
pub const IMAGE_ABSTRACT_CHECK: &str = "ImageAbstractCheck";
pub const FILE_ABSTRACT_CHECK: &str = "FileAbstractCheck";
pub const LABEL_ABSTRACT_CHECK: &str = "LabelAbstractCheck";
/// Checks whose descriptive metadata lives next to them, not in the unit.
pub const METADATA_ABSTRACT_CHECK: &str = "MetadataAbstractCheck";

/// Classes with this suffix are never registered.
pub const ABSTRACT_SUFFIX: &str = "AbstractCheck";
/// Only classes with this suffix are registered.
pub const CHECK_SUFFIX: &str = "Check";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseType {
    pub name: String,
    pub parent: Option<String>,
    pub metadata_bearing: bool,
}

#[derive(Debug, Clone)]
pub struct BaseTypes {
    types: HashMap<String, BaseType>,
}

impl Default for BaseTypes {
    fn default() -> Self {
        let mut bases = Self::empty();
        bases.insert(ABSTRACT_CHECK, None, false);
        bases.insert(IMAGE_ABSTRACT_CHECK, Some(ABSTRACT_CHECK), false);
        bases.insert(FILE_ABSTRACT_CHECK, Some(IMAGE_ABSTRACT_CHECK), false);
        bases.insert(LABEL_ABSTRACT_CHECK, Some(IMAGE_ABSTRACT_CHECK), false);
        bases.insert(METADATA_ABSTRACT_CHECK, Some(ABSTRACT_CHECK), true);
        bases
    }
}

impl BaseTypes {
    /// No types at all, not even [`ABSTRACT_CHECK`].
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Add a base type. The parent has to be registered already.
    pub fn register(
        &mut self,
        name: &str,
        parent: Option<&str>,
        metadata_bearing: bool,
    ) -> LoaderResult<()> {
        if let Some(parent) = parent {
            if !self.types.contains_key(parent) {
                return Err(LoaderError::UnresolvedBase {
                    module: "<builtin>".to_string(),
                    class: name.to_string(),
                    base: parent.to_string(),
                });
            }
        }
        self.insert(name, parent, metadata_bearing);
        Ok(())
    }

    fn insert(&mut self, name: &str, parent: Option<&str>, metadata_bearing: bool) {
        self.types.insert(
            name.to_string(),
            BaseType {
                name: name.to_string(),
                parent: parent.map(str::to_string),
                metadata_bearing,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&BaseType> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// `name` followed by its parents up to the root.
    pub fn ancestry(&self, name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self.types.get(name);
        while let Some(base) = current {
            // register() only accepts known parents, so this cannot loop
            // unless a name is re-registered under its own descendant.
            if chain.contains(&base.name) {
                break;
            }
            chain.push(base.name.clone());
            current = base.parent.as_deref().and_then(|p| self.types.get(p));
        }
        chain
    }

    pub fn is_metadata_bearing(&self, name: &str) -> bool {
        self.types.get(name).is_some_and(|b| b.metadata_bearing)
    }
}
