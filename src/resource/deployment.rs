//! Gateway deployments
//!
//! A deployment snapshots the API's methods at creation time and can never be
//! changed; any property change produces a new deployment.

use declarative::{
    Description, Outputs, Properties, Provisioned, ResourceKind, ResourceProvider, Result,
};
use std::sync::Arc;
use std::time::Duration;

use super::{ensure_exists, reject, required, strings};
use crate::cloud::{CloudAccount, NewResource};

const KIND: ResourceKind = ResourceKind::Deployment;

pub struct DeploymentProvider {
    cloud: Arc<CloudAccount>,
}

impl DeploymentProvider {
    pub fn new(cloud: Arc<CloudAccount>) -> Self {
        Self { cloud }
    }
}

impl ResourceProvider for DeploymentProvider {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    fn create(&self, identity: &str, properties: &Properties) -> Result<Provisioned> {
        let rest_api_id = required(KIND, properties, "rest_api_id")?;
        ensure_exists(&self.cloud, KIND, ResourceKind::GatewayApi, "rest_api_id", rest_api_id)?;
        strings(KIND, properties, "triggers")?;

        let methods = self
            .cloud
            .count_where(ResourceKind::GatewayMethod, "rest_api_id", rest_api_id);
        if methods == 0 {
            return Err(reject(
                KIND,
                format!("REST API {rest_api_id} doesn't contain any methods"),
            ));
        }

        let deployment_id = self.cloud.token(KIND, 6);
        self.cloud.insert(
            KIND,
            identity,
            properties,
            NewResource {
                identifier: format!("{rest_api_id}/deployments/{deployment_id}"),
                outputs: Outputs::from([("deployment_id".to_string(), deployment_id)]),
                settle: Duration::ZERO,
            },
        )
    }

    fn update(&self, identifier: &str, _properties: &Properties) -> Result<Outputs> {
        Err(reject(KIND, format!("{identifier} is immutable")))
    }

    fn delete(&self, identifier: &str) -> Result<()> {
        self.cloud.delete(identifier)
    }

    fn describe(&self, identifier: &str) -> Result<Description> {
        self.cloud.describe(identifier)
    }

    fn requires_replacement(&self, previous: &Properties, desired: &Properties) -> bool {
        previous != desired
    }
}
