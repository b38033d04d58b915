//! DNS alias records

use declarative::{
    Description, Outputs, Properties, Provisioned, ResourceKind, ResourceProvider, Result,
};
use std::sync::Arc;
use std::time::Duration;

use super::{ensure_exists, is_valid_domain, optional, reject, required, within_zone};
use crate::cloud::{CloudAccount, NewResource};

const KIND: ResourceKind = ResourceKind::Record;

const RECORD_TYPES: &[&str] = &["A", "AAAA", "CNAME"];

pub struct RecordProvider {
    cloud: Arc<CloudAccount>,
}

impl RecordProvider {
    pub fn new(cloud: Arc<CloudAccount>) -> Self {
        Self { cloud }
    }

    /// Fully qualified name of the record and its type.
    fn validate(&self, properties: &Properties) -> Result<(String, String)> {
        let zone_id = required(KIND, properties, "zone_id")?;
        let zone = ensure_exists(&self.cloud, KIND, ResourceKind::HostedZone, "zone_id", zone_id)?;
        let zone_name = zone.outputs.get("name").map_or("", String::as_str);

        let record_name = required(KIND, properties, "record_name")?.trim_end_matches('.');
        let fqdn = if within_zone(record_name, zone_name) {
            record_name.to_string()
        } else {
            format!("{record_name}.{zone_name}")
        };
        if !is_valid_domain(&fqdn) {
            return Err(reject(KIND, format!("'{fqdn}' is not a valid record name")));
        }

        let record_type = optional(properties, "record_type").unwrap_or("A");
        if !RECORD_TYPES.contains(&record_type) {
            return Err(reject(KIND, format!("unsupported record type '{record_type}'")));
        }

        let target = required(KIND, properties, "alias_target")?;
        if !is_valid_domain(target) {
            return Err(reject(KIND, format!("alias target '{target}' is not a domain name")));
        }
        required(KIND, properties, "alias_zone_id")?;
        Ok((fqdn, record_type.to_string()))
    }
}

impl ResourceProvider for RecordProvider {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    fn create(&self, identity: &str, properties: &Properties) -> Result<Provisioned> {
        let (fqdn, record_type) = self.validate(properties)?;
        let zone_id = required(KIND, properties, "zone_id")?;
        let identifier = format!("{zone_id}/{fqdn}/{record_type}");
        if self.cloud.get(&identifier).is_some() {
            return Err(reject(KIND, format!("{record_type} record {fqdn} already exists")));
        }

        self.cloud.insert(
            KIND,
            identity,
            properties,
            NewResource {
                identifier,
                outputs: Outputs::from([("fqdn".to_string(), fqdn)]),
                settle: Duration::ZERO,
            },
        )
    }

    /// Retargeting the alias happens in place.
    fn update(&self, identifier: &str, properties: &Properties) -> Result<Outputs> {
        self.validate(properties)?;
        self.cloud.update(identifier, properties, Outputs::clone)
    }

    fn delete(&self, identifier: &str) -> Result<()> {
        self.cloud.delete(identifier)
    }

    fn describe(&self, identifier: &str) -> Result<Description> {
        self.cloud.describe(identifier)
    }

    fn replacement_properties(&self) -> &'static [&'static str] {
        &["record_name", "zone_id", "record_type"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::test_support::{Fixture, props};
    use serde_json::json;

    fn record_props(zone_id: &str, name: &str) -> Properties {
        props(json!({
            "zone_id": zone_id,
            "record_name": name,
            "alias_target": "d1234567890abc.cloudfront.net",
            "alias_zone_id": "Z2FDTNDATAQYW2",
        }))
    }

    #[test]
    fn test_relative_and_absolute_names() {
        let fixture = Fixture::new();
        let provider = RecordProvider::new(Arc::clone(&fixture.cloud));
        let relative = provider
            .create("Relative", &record_props(&fixture.zone_id, "api"))
            .unwrap();
        assert_eq!(relative.outputs["fqdn"], "api.example.com");

        let absolute = provider
            .create("Absolute", &record_props(&fixture.zone_id, "www.example.com."))
            .unwrap();
        assert_eq!(absolute.outputs["fqdn"], "www.example.com");
    }

    #[test]
    fn test_duplicate_record_conflicts() {
        let fixture = Fixture::new();
        let provider = RecordProvider::new(Arc::clone(&fixture.cloud));
        provider
            .create("ApiRecord", &record_props(&fixture.zone_id, "api"))
            .unwrap();
        let err = provider
            .create("Other", &record_props(&fixture.zone_id, "api.example.com"))
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_rejects_unknown_zone() {
        let fixture = Fixture::new();
        let err = RecordProvider::new(fixture.cloud)
            .create("ApiRecord", &record_props("ZMISSING", "api"))
            .unwrap_err();
        assert!(!err.is_retryable());
    }
}
