//! TLS certificates validated through DNS
//!
//! A new certificate stays pending until its validation records propagate,
//! which the account models as a settle delay.

use declarative::{
    Description, Outputs, Properties, Provisioned, ResourceKind, ResourceProvider, Result,
};
use std::sync::Arc;

use super::{ensure_exists, is_valid_domain, reject, required, strings, within_zone};
use crate::cloud::{CloudAccount, NewResource};

const KIND: ResourceKind = ResourceKind::Certificate;

pub struct CertificateProvider {
    cloud: Arc<CloudAccount>,
}

impl CertificateProvider {
    pub fn new(cloud: Arc<CloudAccount>) -> Self {
        Self { cloud }
    }

    /// Primary name plus alternative names, all inside the validation zone.
    fn validate(&self, properties: &Properties) -> Result<Vec<String>> {
        let mut names = vec![required(KIND, properties, "domain_name")?.to_string()];
        names.extend(strings(KIND, properties, "subject_alternative_names")?);
        if let Some(bad) = names.iter().find(|n| !is_valid_domain(n)) {
            return Err(reject(KIND, format!("'{bad}' is not a valid domain name")));
        }

        let zone_id = required(KIND, properties, "validation_zone")?;
        let zone = ensure_exists(&self.cloud, KIND, ResourceKind::HostedZone, "zone_id", zone_id)?;
        let zone_name = zone.outputs.get("name").map_or("", String::as_str);
        for name in &names {
            let bare = name.strip_prefix("*.").unwrap_or(name);
            if !within_zone(bare, zone_name) {
                return Err(reject(
                    KIND,
                    format!("'{name}' cannot be validated through zone '{zone_name}'"),
                ));
            }
        }
        Ok(names)
    }
}

/// `8-4-4-4-12` grouping of a 32-character token.
fn certificate_id(token: &str) -> String {
    format!(
        "{}-{}-{}-{}-{}",
        &token[..8],
        &token[8..12],
        &token[12..16],
        &token[16..20],
        &token[20..32]
    )
}

impl ResourceProvider for CertificateProvider {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    fn create(&self, identity: &str, properties: &Properties) -> Result<Provisioned> {
        let names = self.validate(properties)?;
        let arn = format!(
            "arn:aws:acm:{}:{}:certificate/{}",
            self.cloud.region(),
            self.cloud.account_id(),
            certificate_id(&self.cloud.token(KIND, 32))
        );
        log::info!("{identity}: requesting certificate for {}", names.join(", "));
        let outputs = Outputs::from([
            ("arn".to_string(), arn.clone()),
            ("domain_name".to_string(), names[0].clone()),
        ]);
        self.cloud.insert(
            KIND,
            identity,
            properties,
            NewResource {
                identifier: arn,
                outputs,
                settle: self.cloud.validation_delay(),
            },
        )
    }

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
        &["domain_name", "subject_alternative_names", "validation_zone"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::HostedZoneProvider;
    use crate::resource::test_support::props;
    use serde_json::json;
    use std::time::Duration;

    fn setup(delay: Duration) -> (Arc<CloudAccount>, String) {
        let cloud = Arc::new(CloudAccount::in_memory().with_validation_delay(delay));
        let zone = HostedZoneProvider::new(Arc::clone(&cloud))
            .create("Zone", &props(json!({"domain_name": "example.com"})))
            .unwrap();
        (cloud, zone.outputs["zone_id"].clone())
    }

    #[test]
    fn test_pending_until_validated() {
        let (cloud, zone_id) = setup(Duration::from_secs(3600));
        let provider = CertificateProvider::new(cloud);
        let cert = provider
            .create(
                "Cert",
                &props(json!({
                    "domain_name": "example.com",
                    "subject_alternative_names": ["*.example.com"],
                    "validation_zone": zone_id,
                })),
            )
            .unwrap();
        assert!(cert.identifier.starts_with("arn:aws:acm:us-east-1:123456789012:certificate/"));
        assert_eq!(cert.outputs["domain_name"], "example.com");

        let description = provider.describe(&cert.identifier).unwrap();
        assert!(description.exists);
        assert!(!description.ready);
    }

    #[test]
    fn test_rejects_names_outside_zone() {
        let (cloud, zone_id) = setup(Duration::ZERO);
        let err = CertificateProvider::new(cloud)
            .create(
                "Cert",
                &props(json!({"domain_name": "example.org", "validation_zone": zone_id})),
            )
            .unwrap_err();
        assert!(err.to_string().contains("cannot be validated"));
    }

    #[test]
    fn test_rejects_unknown_zone() {
        let (cloud, _) = setup(Duration::ZERO);
        let err = CertificateProvider::new(cloud)
            .create(
                "Cert",
                &props(json!({"domain_name": "example.com", "validation_zone": "ZNOPE"})),
            )
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_san_change_forces_replacement() {
        let (cloud, _) = setup(Duration::ZERO);
        let provider = CertificateProvider::new(cloud);
        let before = props(json!({"domain_name": "example.com"}));
        let after = props(json!({
            "domain_name": "example.com",
            "subject_alternative_names": ["*.example.com"],
        }));
        assert!(provider.requires_replacement(&before, &after));
    }
}
