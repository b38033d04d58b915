//! Roles assumed by the function and by the gateway

use declarative::{
    Description, Outputs, Properties, Provisioned, ResourceKind, ResourceProvider, Result,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::{reject, required};
use crate::cloud::{CloudAccount, NewResource};

const KIND: ResourceKind = ResourceKind::Role;

pub struct RoleProvider {
    cloud: Arc<CloudAccount>,
}

impl RoleProvider {
    pub fn new(cloud: Arc<CloudAccount>) -> Self {
        Self { cloud }
    }
}

fn validate(properties: &Properties) -> Result<()> {
    let principal = required(KIND, properties, "assumed_by")?;
    if !principal.ends_with(".amazonaws.com") {
        return Err(reject(KIND, format!("'{principal}' is not a service principal")));
    }

    let statements = match properties.get("policy") {
        None => return Ok(()),
        Some(Value::Array(statements)) => statements,
        Some(_) => return Err(reject(KIND, "'policy' must be a list of statements")),
    };
    for (index, statement) in statements.iter().enumerate() {
        for field in ["actions", "resources"] {
            let valid = statement
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| !items.is_empty() && items.iter().all(Value::is_string));
            if !valid {
                return Err(reject(
                    KIND,
                    format!("policy statement {index} needs a non-empty '{field}' list"),
                ));
            }
        }
    }
    Ok(())
}

impl ResourceProvider for RoleProvider {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    fn create(&self, identity: &str, properties: &Properties) -> Result<Provisioned> {
        validate(properties)?;
        let name = format!(
            "{identity}-{}",
            self.cloud.token(KIND, 12).to_uppercase()
        );
        let arn = format!("arn:aws:iam::{}:role/{name}", self.cloud.account_id());
        self.cloud.insert(
            KIND,
            identity,
            properties,
            NewResource {
                identifier: arn.clone(),
                outputs: Outputs::from([("arn".to_string(), arn), ("name".to_string(), name)]),
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

    fn replacement_properties(&self) -> &'static [&'static str] {
        &["assumed_by"]
    }
}
