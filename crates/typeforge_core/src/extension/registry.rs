//! Ordered extension registry for one hierarchy level.

use crate::error::{FactoryError, FactoryResult};
use crate::extension::descriptor::{Extension, ExtensionKindTag};
use crate::model::value::{Mapping, Value};
use indexmap::IndexMap;

/// Name → descriptor table in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    entries: IndexMap<String, Extension>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from an `extensions` block, wrapping raw entries.
    pub fn from_block(block: Option<&Value>) -> FactoryResult<Self> {
        let mut registry = Self::new();
        let entries: &Mapping = match block {
            None | Some(Value::Null) => return Ok(registry),
            Some(Value::Map(entries)) => entries,
            Some(_) => return Err(FactoryError::shape("extensions", "a mapping")),
        };
        for (name, entry) in entries {
            registry.insert(Extension::wrap(name, entry)?);
        }
        Ok(registry)
    }

    /// Inserts a named descriptor, replacing any same-named entry in place.
    pub fn insert(&mut self, extension: Extension) {
        self.entries.insert(extension.name().to_string(), extension);
    }

    /// `self` overlaid by `local`; local entries win name collisions.
    pub fn overlaid_by(&self, local: &ExtensionRegistry) -> Self {
        let mut merged = self.clone();
        for extension in local.iter() {
            merged.insert(extension.clone());
        }
        merged
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Extension> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Extension> {
        self.entries.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Descriptors of one kind, in declaration order.
    pub fn list_by_kind(&self, kind: ExtensionKindTag) -> Vec<Extension> {
        self.iter()
            .filter(|extension| extension.tag() == kind)
            .cloned()
            .collect()
    }

    pub fn inheritable(&self) -> impl Iterator<Item = &Extension> {
        self.iter().filter(|extension| extension.is_inheritable())
    }
}
