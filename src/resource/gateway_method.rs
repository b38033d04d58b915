//! Methods on a gateway path, integrated with a function

use declarative::{
    Description, Outputs, Properties, Provisioned, ResourceKind, ResourceProvider, Result,
};
use std::sync::Arc;
use std::time::Duration;

use super::{ensure_exists, optional, reject, required};
use crate::cloud::{CloudAccount, NewResource};

const KIND: ResourceKind = ResourceKind::GatewayMethod;

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS", "ANY"];

pub struct GatewayMethodProvider {
    cloud: Arc<CloudAccount>,
}

impl GatewayMethodProvider {
    pub fn new(cloud: Arc<CloudAccount>) -> Self {
        Self { cloud }
    }

    fn validate(&self, properties: &Properties) -> Result<()> {
        let rest_api_id = required(KIND, properties, "rest_api_id")?;
        ensure_exists(&self.cloud, KIND, ResourceKind::GatewayApi, "rest_api_id", rest_api_id)?;

        let path = required(KIND, properties, "path")?;
        if !path.starts_with('/') || path.contains("//") {
            return Err(reject(KIND, format!("invalid resource path '{path}'")));
        }

        let method = required(KIND, properties, "http_method")?;
        if !HTTP_METHODS.contains(&method) {
            return Err(reject(KIND, format!("unknown HTTP method '{method}'")));
        }

        let function = required(KIND, properties, "integration_function")?;
        ensure_exists(&self.cloud, KIND, ResourceKind::Function, "arn", function)?;

        if let Some(role) = optional(properties, "credentials_role") {
            ensure_exists(&self.cloud, KIND, ResourceKind::Role, "arn", role)?;
        }
        Ok(())
    }
}

impl ResourceProvider for GatewayMethodProvider {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    fn create(&self, identity: &str, properties: &Properties) -> Result<Provisioned> {
        self.validate(properties)?;
        let rest_api_id = required(KIND, properties, "rest_api_id")?;
        let path = required(KIND, properties, "path")?;
        let method = required(KIND, properties, "http_method")?;

        let identifier = format!("{rest_api_id}/{method}{path}");
        if self.cloud.get(&identifier).is_some() {
            return Err(reject(KIND, format!("{method} {path} already exists")));
        }

        let outputs = Outputs::from([
            ("method_id".to_string(), self.cloud.token(KIND, 6)),
            ("path".to_string(), path.to_string()),
        ]);
        self.cloud.insert(
            KIND,
            identity,
            properties,
            NewResource {
                identifier,
                outputs,
                settle: Duration::ZERO,
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
        &["rest_api_id", "path", "http_method"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::test_support::{Fixture, props};
    use serde_json::json;

    fn method_props(fixture: &Fixture) -> Properties {
        props(json!({
            "rest_api_id": fixture.rest_api_id,
            "path": "/test1",
            "http_method": "GET",
            "integration_function": fixture.function_arn,
            "credentials_role": fixture.role_arn,
        }))
    }

    #[test]
    fn test_create_method() {
        let fixture = Fixture::new();
        let provider = GatewayMethodProvider::new(Arc::clone(&fixture.cloud));
        let method = provider.create("ApiTest1Get", &method_props(&fixture)).unwrap();
        assert_eq!(method.identifier, format!("{}/GET/test1", fixture.rest_api_id));
        assert_eq!(method.outputs["path"], "/test1");

        // same path and verb on the same API is a conflict
        assert!(provider.create("Again", &method_props(&fixture)).is_err());
    }

    #[test]
    fn test_rejects_missing_integration_target() {
        let fixture = Fixture::new();
        let mut properties = method_props(&fixture);
        properties.insert(
            "integration_function".to_string(),
            json!("arn:aws:lambda:us-east-1:123456789012:function:ghost"),
        );
        let err = GatewayMethodProvider::new(fixture.cloud)
            .create("ApiTest1Get", &properties)
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_path_change_forces_replacement() {
        let fixture = Fixture::new();
        let provider = GatewayMethodProvider::new(fixture.cloud.clone());
        let before = method_props(&fixture);
        let mut after = before.clone();
        after.insert("path".to_string(), json!("/test2"));
        assert!(provider.requires_replacement(&before, &after));
    }
}
