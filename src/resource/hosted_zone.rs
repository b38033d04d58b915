//! Hosted zone lookup
//!
//! Zones are not owned by a stack: "creating" one registers the lookup of an
//! existing zone for the domain, and deleting it only forgets the lookup.

use declarative::{
    Description, Outputs, Properties, Provisioned, ResourceKind, ResourceProvider, Result,
};
use std::sync::Arc;
use std::time::Duration;

use super::{is_valid_domain, reject, required};
use crate::cloud::{CloudAccount, NewResource};

const KIND: ResourceKind = ResourceKind::HostedZone;

pub struct HostedZoneProvider {
    cloud: Arc<CloudAccount>,
}

impl HostedZoneProvider {
    pub fn new(cloud: Arc<CloudAccount>) -> Self {
        Self { cloud }
    }
}

/// Zone ids are stable per domain, the way a lookup always finds the same zone.
pub fn zone_id(domain: &str) -> String {
    let hex = blake3::hash(domain.as_bytes()).to_hex();
    format!("Z{}", hex[..13].to_uppercase())
}

fn domain(properties: &Properties) -> Result<&str> {
    let domain = required(KIND, properties, "domain_name")?;
    if domain.starts_with("*.") || !is_valid_domain(domain) {
        return Err(reject(KIND, format!("'{domain}' is not a valid zone name")));
    }
    Ok(domain)
}

impl ResourceProvider for HostedZoneProvider {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    fn create(&self, identity: &str, properties: &Properties) -> Result<Provisioned> {
        let domain = domain(properties)?;
        let zone_id = zone_id(domain);
        let outputs = Outputs::from([
            ("zone_id".to_string(), zone_id.clone()),
            ("name".to_string(), domain.to_string()),
        ]);
        self.cloud.insert(
            KIND,
            identity,
            properties,
            NewResource {
                identifier: format!("hostedzone/{zone_id}"),
                outputs,
                settle: Duration::ZERO,
            },
        )
    }

    fn update(&self, identifier: &str, properties: &Properties) -> Result<Outputs> {
        domain(properties)?;
        self.cloud.update(identifier, properties, Outputs::clone)
    }

    fn delete(&self, identifier: &str) -> Result<()> {
        self.cloud.delete(identifier)
    }

    fn describe(&self, identifier: &str) -> Result<Description> {
        self.cloud.describe(identifier)
    }

    fn replacement_properties(&self) -> &'static [&'static str] {
        &["domain_name"]
    }
}
