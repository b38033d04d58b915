//! Provisioning backend capability interface
//!
//! Each resource kind is provisioned by one [`ResourceProvider`]. The
//! executor never branches on type tags; it looks the provider up in a
//! [`ProviderRegistry`] and calls the four backend operations.
//!
//! # Example
//!
//! ```ignore
//! use declarative::{Description, Outputs, Properties, Provisioned, ResourceKind, ResourceProvider};
//!
//! struct RoleProvider { /* client */ }
//!
//! impl ResourceProvider for RoleProvider {
//!     fn kind(&self) -> ResourceKind { ResourceKind::Role }
//!
//!     fn create(&self, identity: &str, properties: &Properties) -> declarative::Result<Provisioned> {
//!         let arn = format!("arn:aws:iam::000000000000:role/{identity}");
//!         Ok(Provisioned { identifier: arn.clone(), outputs: Outputs::from([("arn".into(), arn)]) })
//!     }
//!     // update, delete, describe ...
//! }
//! ```

use crate::error::{Error, Result};
use crate::types::{Outputs, Properties, ResourceKind};
use std::collections::HashMap;

/// What `create` hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    /// Backend-assigned identifier (ARN-equivalent)
    pub identifier: String,
    /// Outputs known at creation time
    pub outputs: Outputs,
}

/// What `describe` reports about an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {
    /// Whether the backend still knows the identifier
    pub exists: bool,
    /// Whether asynchronous work (e.g. DNS validation) has finished
    pub ready: bool,
    /// Current outputs
    pub outputs: Outputs,
}

impl Description {
    /// A resource that exists and is ready.
    pub fn ready(outputs: Outputs) -> Self {
        Self {
            exists: true,
            ready: true,
            outputs,
        }
    }

    /// A resource that exists but is still settling.
    pub fn pending(outputs: Outputs) -> Self {
        Self {
            exists: true,
            ready: false,
            outputs,
        }
    }

    /// The backend does not know the identifier.
    pub fn absent() -> Self {
        Self {
            exists: false,
            ready: false,
            outputs: Outputs::new(),
        }
    }
}

/// Backend operations for one resource kind.
///
/// Implementations report failures as [`Error::BackendTransient`] (retried
/// with backoff) or [`Error::BackendPermanent`] (surfaced immediately).
pub trait ResourceProvider: Send + Sync {
    /// The kind this provider handles
    fn kind(&self) -> ResourceKind;

    /// Create a resource from fully resolved properties.
    ///
    /// `identity` is the declared identity, available for naming.
    fn create(&self, identity: &str, properties: &Properties) -> Result<Provisioned>;

    /// Update an existing resource in place.
    fn update(&self, identifier: &str, properties: &Properties) -> Result<Outputs>;

    /// Delete a resource. Deleting an identifier the backend no longer
    /// knows should succeed.
    fn delete(&self, identifier: &str) -> Result<()>;

    /// Report existence, readiness and outputs.
    fn describe(&self, identifier: &str) -> Result<Description>;

    /// Whether moving from `previous` to `desired` needs a new resource
    /// rather than an in-place update.
    ///
    /// Default: properties listed by [`Self::replacement_properties`] force
    /// replacement when they change.
    fn requires_replacement(&self, previous: &Properties, desired: &Properties) -> bool {
        self.replacement_properties()
            .iter()
            .any(|name| previous.get(*name) != desired.get(*name))
    }

    /// Properties that cannot change in place.
    fn replacement_properties(&self) -> &'static [&'static str] {
        &[]
    }
}

/// Type tag to provider implementation.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<ResourceKind, Box<dyn ResourceProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under the kind it reports, replacing any previous one.
    pub fn register(&mut self, provider: Box<dyn ResourceProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    /// Builder-style registration
    pub fn with(mut self, provider: impl ResourceProvider + 'static) -> Self {
        self.register(Box::new(provider));
        self
    }

    /// Look up the provider for a kind.
    pub fn get(&self, kind: ResourceKind) -> Result<&dyn ResourceProvider> {
        match self.providers.get(&kind) {
            Some(provider) => Ok(&**provider),
            None => Err(Error::MissingProvider {
                kind: kind.to_string(),
            }),
        }
    }

    pub fn supports(&self, kind: ResourceKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// Fail unless every kind in `kinds` has a provider.
    pub fn ensure_supported(&self, kinds: impl IntoIterator<Item = ResourceKind>) -> Result<()> {
        for kind in kinds {
            self.get(kind)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.providers.keys().collect();
        kinds.sort();
        f.debug_struct("ProviderRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed;

    impl ResourceProvider for Fixed {
        fn kind(&self) -> ResourceKind {
            ResourceKind::Stage
        }

        fn create(&self, identity: &str, _properties: &Properties) -> Result<Provisioned> {
            Ok(Provisioned {
                identifier: identity.to_string(),
                outputs: Outputs::new(),
            })
        }

        fn update(&self, _identifier: &str, _properties: &Properties) -> Result<Outputs> {
            Ok(Outputs::new())
        }

        fn delete(&self, _identifier: &str) -> Result<()> {
            Ok(())
        }

        fn describe(&self, _identifier: &str) -> Result<Description> {
            Ok(Description::ready(Outputs::new()))
        }

        fn replacement_properties(&self) -> &'static [&'static str] {
            &["stage_name"]
        }
    }

    fn props(value: serde_json::Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_replacement_driven_by_listed_properties() {
        let provider = Fixed;
        let before = props(json!({"stage_name": "dev", "variables": {"a": "1"}}));
        let retuned = props(json!({"stage_name": "dev", "variables": {"a": "2"}}));
        let renamed = props(json!({"stage_name": "prod", "variables": {"a": "1"}}));
        assert!(!provider.requires_replacement(&before, &retuned));
        assert!(provider.requires_replacement(&before, &renamed));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ProviderRegistry::new().with(Fixed);
        assert!(registry.supports(ResourceKind::Stage));
        assert!(registry.get(ResourceKind::Stage).is_ok());
        let err = registry.get(ResourceKind::Record).err().unwrap();
        assert!(matches!(err, Error::MissingProvider { kind } if kind == "record"));
    }
}
