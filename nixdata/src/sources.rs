//! Provenance links from an entity to the Source entities its data came from.
//!
//! Sources themselves live elsewhere in the tree. An entity only records their identifiers, one
//! sub-group per linked source.
//!
use tracing::debug;

use crate::errors::{Error, Result};
use crate::storage::Group;

pub(crate) const SOURCES: &str = "sources";

pub struct SourceLinks {
    group: Box<dyn Group>,
}

impl SourceLinks {
    /// Links stored under the `sources` group of `entity_group`.
    ///
    pub(crate) fn new(entity_group: &dyn Group) -> Result<Self> {
        let group = entity_group.open_group(SOURCES)?;

        Ok(Self { group })
    }

    /// Link the source with identifier `id`. Linking a source twice is a no-op.
    ///
    pub fn add_source(&self, id: &str) -> Result<()> {
        if id.is_empty() || id.contains('/') {
            return Err(Error::InvalidArgument(format!(
                "{id:?} is not a valid source id"
            )));
        }
        if !self.group.has_group(id) {
            self.group.open_group(id)?;
            debug!(source = id, "linked source");
        }

        Ok(())
    }

    /// Remove the link to `id`. Returns whether there was a link to remove.
    ///
    pub fn remove_source(&self, id: &str) -> Result<bool> {
        if self.group.has_group(id) {
            self.group.delete(id)?;
            debug!(source = id, "unlinked source");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn has_source(&self, id: &str) -> bool {
        self.group.has_group(id)
    }

    pub fn source_count(&self) -> Result<usize> {
        Ok(self.group.group_names()?.len())
    }

    /// Identifiers of all linked sources, sorted.
    ///
    pub fn sources(&self) -> Result<Vec<String>> {
        self.group.group_names()
    }
}
