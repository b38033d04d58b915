//! Custom domains bound to a certificate and a stage
//!
//! Binding requires an issued certificate; while the certificate is still
//! pending validation the call fails transiently, as the real service does.

use declarative::{
    Description, Outputs, Properties, Provisioned, ResourceKind, ResourceProvider, Result,
};
use std::sync::Arc;
use std::time::Duration;

use super::{covers, ensure_exists, is_valid_domain, optional, reject, required, strings};
use crate::cloud::{CloudAccount, NewResource};

const KIND: ResourceKind = ResourceKind::DomainName;

/// Hosted zone every edge distribution alias lives in
pub const EDGE_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

pub struct DomainNameProvider {
    cloud: Arc<CloudAccount>,
}

impl DomainNameProvider {
    pub fn new(cloud: Arc<CloudAccount>) -> Self {
        Self { cloud }
    }

    fn validate<'a>(&self, properties: &'a Properties) -> Result<&'a str> {
        let domain = required(KIND, properties, "domain_name")?;
        if domain.starts_with("*.") || !is_valid_domain(domain) {
            return Err(reject(KIND, format!("'{domain}' is not a valid domain name")));
        }

        let certificate_arn = required(KIND, properties, "certificate_arn")?;
        let certificate =
            ensure_exists(&self.cloud, KIND, ResourceKind::Certificate, "arn", certificate_arn)?;
        if !self.cloud.describe(certificate_arn)?.ready {
            return Err(declarative::Error::transient(format!(
                "{KIND}: certificate {certificate_arn} is pending validation"
            )));
        }
        let mut names = strings(KIND, &certificate.properties, "subject_alternative_names")?;
        names.extend(optional(&certificate.properties, "domain_name").map(str::to_string));
        if !covers(&names, domain) {
            return Err(reject(
                KIND,
                format!("certificate {certificate_arn} does not cover '{domain}'"),
            ));
        }

        if let Some(rest_api_id) = optional(properties, "rest_api_id") {
            ensure_exists(&self.cloud, KIND, ResourceKind::GatewayApi, "rest_api_id", rest_api_id)?;
            if let Some(stage) = optional(properties, "stage") {
                let identifier = format!("{rest_api_id}/stages/{stage}");
                if self.cloud.get(&identifier).is_none() {
                    return Err(reject(KIND, format!("stage '{stage}' does not exist")));
                }
            }
        }
        Ok(domain)
    }
}

impl ResourceProvider for DomainNameProvider {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    fn create(&self, identity: &str, properties: &Properties) -> Result<Provisioned> {
        let domain = self.validate(properties)?;
        let identifier = format!("domainnames/{domain}");
        if self.cloud.get(&identifier).is_some() {
            return Err(reject(KIND, format!("'{domain}' is already bound")));
        }

        let target = format!("d{}.cloudfront.net", self.cloud.token(KIND, 13));
        self.cloud.insert(
            KIND,
            identity,
            properties,
            NewResource {
                identifier,
                outputs: Outputs::from([
                    ("domain_name".to_string(), domain.to_string()),
                    ("target_domain_name".to_string(), target),
                    ("hosted_zone_id".to_string(), EDGE_HOSTED_ZONE_ID.to_string()),
                ]),
                settle: Duration::ZERO,
            },
        )
    }

    /// Certificate rotation and base path mapping changes happen in place.
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
        &["domain_name"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::test_support::{Fixture, props};
    use crate::resource::{CertificateProvider, HostedZoneProvider};
    use serde_json::json;

    #[test]
    fn test_bind_covered_domain() {
        let fixture = Fixture::new();
        let provider = DomainNameProvider::new(Arc::clone(&fixture.cloud));
        let domain = provider
            .create(
                "ApiDomain",
                &props(json!({
                    "domain_name": "api.example.com",
                    "certificate_arn": fixture.certificate_arn,
                })),
            )
            .unwrap();
        assert_eq!(domain.outputs["domain_name"], "api.example.com");
        assert_eq!(domain.outputs["hosted_zone_id"], EDGE_HOSTED_ZONE_ID);
        assert!(domain.outputs["target_domain_name"].ends_with(".cloudfront.net"));
    }

    #[test]
    fn test_rejects_uncovered_domain() {
        let fixture = Fixture::new();
        let err = DomainNameProvider::new(Arc::clone(&fixture.cloud))
            .create(
                "ApiDomain",
                &props(json!({
                    "domain_name": "v1.api.example.com",
                    "certificate_arn": fixture.certificate_arn,
                })),
            )
            .unwrap_err();
        assert!(err.to_string().contains("does not cover"));
    }

    #[test]
    fn test_pending_certificate_is_transient() {
        let cloud = Arc::new(
            CloudAccount::in_memory().with_validation_delay(Duration::from_secs(3600)),
        );
        let zone = HostedZoneProvider::new(Arc::clone(&cloud))
            .create("Zone", &props(json!({"domain_name": "example.com"})))
            .unwrap();
        let certificate = CertificateProvider::new(Arc::clone(&cloud))
            .create(
                "Cert",
                &props(json!({
                    "domain_name": "api.example.com",
                    "validation_zone": zone.outputs["zone_id"],
                })),
            )
            .unwrap();
        let err = DomainNameProvider::new(cloud)
            .create(
                "ApiDomain",
                &props(json!({
                    "domain_name": "api.example.com",
                    "certificate_arn": certificate.outputs["arn"],
                })),
            )
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
