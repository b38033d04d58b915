//! Resource providers backed by the simulated cloud account
//!
//! One [`ResourceProvider`] per resource kind. Providers validate the
//! resolved properties they are handed (rejections are permanent backend
//! errors, exactly like a real API's 4xx), derive identifiers and outputs,
//! and record the result in the [`CloudAccount`].

mod certificate;
mod deployment;
mod domain_name;
mod function;
mod gateway_api;
mod gateway_method;
mod hosted_zone;
mod record;
mod role;
mod stage;

pub use certificate::CertificateProvider;
pub use deployment::DeploymentProvider;
pub use domain_name::DomainNameProvider;
pub use function::FunctionProvider;
pub use gateway_api::GatewayApiProvider;
pub use gateway_method::GatewayMethodProvider;
pub use hosted_zone::HostedZoneProvider;
pub use record::RecordProvider;
pub use role::RoleProvider;
pub use stage::StageProvider;

use declarative::{Error, ProviderRegistry, Properties, ResourceKind, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};

use crate::cloud::{CloudAccount, CloudResource};

static DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*\.)?([a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}$")
        .expect("valid domain regex")
});

/// A provider for every kind, all sharing one account.
pub fn providers(cloud: &Arc<CloudAccount>) -> ProviderRegistry {
    ProviderRegistry::new()
        .with(HostedZoneProvider::new(Arc::clone(cloud)))
        .with(CertificateProvider::new(Arc::clone(cloud)))
        .with(RoleProvider::new(Arc::clone(cloud)))
        .with(FunctionProvider::new(Arc::clone(cloud)))
        .with(GatewayApiProvider::new(Arc::clone(cloud)))
        .with(GatewayMethodProvider::new(Arc::clone(cloud)))
        .with(DeploymentProvider::new(Arc::clone(cloud)))
        .with(StageProvider::new(Arc::clone(cloud)))
        .with(DomainNameProvider::new(Arc::clone(cloud)))
        .with(RecordProvider::new(Arc::clone(cloud)))
}

/// Permanent rejection, prefixed with the kind like a service error.
fn reject(kind: ResourceKind, message: impl std::fmt::Display) -> Error {
    Error::permanent(format!("{kind}: {message}"))
}

fn required<'a>(kind: ResourceKind, properties: &'a Properties, name: &str) -> Result<&'a str> {
    match properties.get(name) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        Some(Value::String(_)) | None => Err(reject(kind, format!("'{name}' is required"))),
        Some(other) => Err(reject(kind, format!("'{name}' must be a string, got {other}"))),
    }
}

fn optional<'a>(properties: &'a Properties, name: &str) -> Option<&'a str> {
    properties.get(name).and_then(Value::as_str)
}

/// A list of strings; missing means empty.
fn strings(kind: ResourceKind, properties: &Properties, name: &str) -> Result<Vec<String>> {
    match properties.get(name) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| reject(kind, format!("'{name}' must be a list of strings")))
            })
            .collect(),
        Some(_) => Err(reject(kind, format!("'{name}' must be a list of strings"))),
    }
}

/// A non-negative integer with a default.
fn integer(kind: ResourceKind, properties: &Properties, name: &str, default: u64) -> Result<u64> {
    match properties.get(name) {
        None => Ok(default),
        Some(value) => value
            .as_u64()
            .ok_or_else(|| reject(kind, format!("'{name}' must be a non-negative integer"))),
    }
}

/// Lowercase DNS name, optionally starting with a `*.` wildcard label.
pub fn is_valid_domain(name: &str) -> bool {
    name.len() <= 253 && DOMAIN.is_match(name)
}

/// Whether `name` is `zone` or lives under it.
fn within_zone(name: &str, zone: &str) -> bool {
    let zone = zone.trim_end_matches('.');
    name == zone || name.ends_with(&format!(".{zone}"))
}

/// Whether a certificate for `names` covers `domain` (wildcards match one label).
fn covers(names: &[String], domain: &str) -> bool {
    names.iter().any(|name| match name.strip_prefix("*.") {
        Some(parent) => domain
            .split_once('.')
            .is_some_and(|(label, rest)| !label.is_empty() && rest == parent),
        None => name == domain,
    })
}

/// Fail unless a live `kind` resource exposes `attribute = value`.
fn ensure_exists(
    cloud: &CloudAccount,
    owner: ResourceKind,
    kind: ResourceKind,
    attribute: &str,
    value: &str,
) -> Result<CloudResource> {
    cloud
        .find(kind, attribute, value)
        .ok_or_else(|| reject(owner, format!("{kind} with {attribute} '{value}' does not exist")))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_validation() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("api.example.com"));
        assert!(is_valid_domain("*.example.com"));
        assert!(!is_valid_domain("Example.com"));
        assert!(!is_valid_domain("example"));
        assert!(!is_valid_domain("-bad.example.com"));
        assert!(!is_valid_domain("api.*.example.com"));
    }

    #[test]
    fn test_certificate_coverage() {
        let names = vec!["example.com".to_string(), "*.example.com".to_string()];
        assert!(covers(&names, "example.com"));
        assert!(covers(&names, "api.example.com"));
        assert!(!covers(&names, "v1.api.example.com"));
        assert!(!covers(&names, "example.org"));
    }

    #[test]
    fn test_within_zone() {
        assert!(within_zone("api.example.com", "example.com"));
        assert!(within_zone("example.com", "example.com."));
        assert!(!within_zone("badexample.com", "example.com"));
    }

    #[test]
    fn test_registry_covers_every_kind() {
        let cloud = Arc::new(CloudAccount::in_memory());
        let registry = providers(&cloud);
        assert!(registry.ensure_supported(ResourceKind::ALL).is_ok());
    }
}
