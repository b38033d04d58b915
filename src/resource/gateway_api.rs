//! REST API gateways

use declarative::{
    Description, Outputs, Properties, Provisioned, ResourceKind, ResourceProvider, Result,
};
use std::sync::Arc;
use std::time::Duration;

use super::{optional, reject, required};
use crate::cloud::{CloudAccount, NewResource};

const KIND: ResourceKind = ResourceKind::GatewayApi;

const ENDPOINT_TYPES: &[&str] = &["EDGE", "REGIONAL", "PRIVATE"];

pub struct GatewayApiProvider {
    cloud: Arc<CloudAccount>,
}

impl GatewayApiProvider {
    pub fn new(cloud: Arc<CloudAccount>) -> Self {
        Self { cloud }
    }
}

fn validate(properties: &Properties) -> Result<()> {
    required(KIND, properties, "name")?;
    let endpoint = optional(properties, "endpoint_type").unwrap_or("EDGE");
    if !ENDPOINT_TYPES.contains(&endpoint) {
        return Err(reject(KIND, format!("unknown endpoint type '{endpoint}'")));
    }
    Ok(())
}

impl ResourceProvider for GatewayApiProvider {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    fn create(&self, identity: &str, properties: &Properties) -> Result<Provisioned> {
        validate(properties)?;
        let rest_api_id = self.cloud.token(KIND, 10);
        let root_resource_id = self.cloud.token(KIND, 10);
        let arn = format!(
            "arn:aws:apigateway:{}::/restapis/{rest_api_id}",
            self.cloud.region()
        );
        let outputs = Outputs::from([
            ("rest_api_id".to_string(), rest_api_id.clone()),
            ("root_resource_id".to_string(), root_resource_id),
            ("arn".to_string(), arn),
        ]);
        self.cloud.insert(
            KIND,
            identity,
            properties,
            NewResource {
                identifier: rest_api_id,
                outputs,
                settle: Duration::ZERO,
            },
        )
    }

    fn update(&self, identifier: &str, properties: &Properties) -> Result<Outputs> {
        validate(properties)?;
        self.cloud.update(identifier, properties, Outputs::clone)
    }

    fn delete(&self, identifier: &str) -> Result<()> {
        self.cloud.delete(identifier)
    }

    fn describe(&self, identifier: &str) -> Result<Description> {
        self.cloud.describe(identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::test_support::{cloud, props};
    use serde_json::json;

    #[test]
    fn test_rename_updates_in_place() {
        let provider = GatewayApiProvider::new(cloud());
        let before = props(json!({"name": "DemoApi"}));
        let api = provider.create("ApiGateway", &before).unwrap();
        assert_eq!(api.identifier, api.outputs["rest_api_id"]);
        assert!(api.outputs["arn"].ends_with(&format!("/restapis/{}", api.identifier)));

        let after = props(json!({"name": "DemoApiV2"}));
        assert!(!provider.requires_replacement(&before, &after));
        assert_eq!(provider.update(&api.identifier, &after).unwrap(), api.outputs);
    }

    #[test]
    fn test_rejects_unknown_endpoint_type() {
        let provider = GatewayApiProvider::new(cloud());
        assert!(
            provider
                .create("Api", &props(json!({"name": "DemoApi", "endpoint_type": "GLOBAL"})))
                .is_err()
        );
    }
}
