//! Named stages pointing at a deployment

use declarative::{
    Description, Outputs, Properties, Provisioned, ResourceKind, ResourceProvider, Result,
};
use std::sync::Arc;
use std::time::Duration;

use super::{ensure_exists, reject, required};
use crate::cloud::{CloudAccount, NewResource};

const KIND: ResourceKind = ResourceKind::Stage;

pub struct StageProvider {
    cloud: Arc<CloudAccount>,
}

impl StageProvider {
    pub fn new(cloud: Arc<CloudAccount>) -> Self {
        Self { cloud }
    }

    fn validate<'a>(&self, properties: &'a Properties) -> Result<(&'a str, &'a str)> {
        let stage_name = required(KIND, properties, "stage_name")?;
        if !stage_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(reject(KIND, format!("invalid stage name '{stage_name}'")));
        }

        let rest_api_id = required(KIND, properties, "rest_api_id")?;
        ensure_exists(&self.cloud, KIND, ResourceKind::GatewayApi, "rest_api_id", rest_api_id)?;

        let deployment_id = required(KIND, properties, "deployment_id")?;
        ensure_exists(&self.cloud, KIND, ResourceKind::Deployment, "deployment_id", deployment_id)?;
        Ok((rest_api_id, stage_name))
    }
}

impl ResourceProvider for StageProvider {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    fn create(&self, identity: &str, properties: &Properties) -> Result<Provisioned> {
        let (rest_api_id, stage_name) = self.validate(properties)?;
        let identifier = format!("{rest_api_id}/stages/{stage_name}");
        if self.cloud.get(&identifier).is_some() {
            return Err(reject(KIND, format!("stage '{stage_name}' already exists")));
        }

        let invoke_url = format!(
            "https://{rest_api_id}.execute-api.{}.amazonaws.com/{stage_name}",
            self.cloud.region()
        );
        self.cloud.insert(
            KIND,
            identity,
            properties,
            NewResource {
                identifier,
                outputs: Outputs::from([
                    ("stage_name".to_string(), stage_name.to_string()),
                    ("invoke_url".to_string(), invoke_url),
                ]),
                settle: Duration::ZERO,
            },
        )
    }

    /// Pointing a stage at a new deployment happens in place.
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
        &["stage_name", "rest_api_id"]
    }
}
