//! Registry of declared resources for one synthesis pass

use crate::error::{Error, Result};
use crate::types::{ResourceDefinition, ResourceKind};
use std::collections::BTreeMap;

/// Holds every declared resource, keyed by identity.
///
/// Iteration is always in lexicographic identity order so that everything
/// derived from a registry (edges, batches, plans) is reproducible.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    resources: BTreeMap<String, ResourceDefinition>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition.
    ///
    /// Fails on an identity that is empty, contains characters other than
    /// ASCII alphanumerics, `-` and `_`, or is already registered.
    pub fn register(&mut self, definition: ResourceDefinition) -> Result<()> {
        if !is_valid_identity(&definition.identity) {
            return Err(Error::InvalidIdentity {
                identity: definition.identity,
            });
        }
        if self.resources.contains_key(&definition.identity) {
            return Err(Error::DuplicateIdentity {
                identity: definition.identity,
            });
        }
        self.resources
            .insert(definition.identity.clone(), definition);
        Ok(())
    }

    /// Build a registry from a list of definitions.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = ResourceDefinition>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition)?;
        }
        Ok(registry)
    }

    pub fn get(&self, identity: &str) -> Option<&ResourceDefinition> {
        self.resources.get(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.resources.contains_key(identity)
    }

    /// Type tag of a registered identity
    pub fn kind_of(&self, identity: &str) -> Option<ResourceKind> {
        self.resources.get(identity).map(|d| d.kind)
    }

    /// Definitions in identity order
    pub fn iter(&self) -> impl Iterator<Item = &ResourceDefinition> {
        self.resources.values()
    }

    /// Identities in lexicographic order
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Identities must be usable inside `${Identity.attribute}` expressions.
pub fn is_valid_identity(identity: &str) -> bool {
    !identity.is_empty()
        && identity
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
