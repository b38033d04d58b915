//! Serverless functions
//!
//! Every in-place update publishes a new version.

use declarative::{
    Description, Outputs, Properties, Provisioned, ResourceKind, ResourceProvider, Result,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::{ensure_exists, integer, optional, reject, required};
use crate::cloud::{CloudAccount, NewResource};

const KIND: ResourceKind = ResourceKind::Function;

const RUNTIMES: &[&str] = &[
    "nodejs16.x",
    "nodejs18.x",
    "nodejs20.x",
    "python3.11",
    "python3.12",
    "java17",
    "provided.al2",
    "provided.al2023",
];

const ARCHITECTURES: &[&str] = &["x86_64", "arm64"];

/// Longest timeout a function may run for, in seconds
const MAX_TIMEOUT_SECS: u64 = 900;

pub struct FunctionProvider {
    cloud: Arc<CloudAccount>,
}

impl FunctionProvider {
    pub fn new(cloud: Arc<CloudAccount>) -> Self {
        Self { cloud }
    }

    fn validate(&self, properties: &Properties) -> Result<()> {
        let handler = required(KIND, properties, "handler")?;
        if !handler.contains('.') {
            return Err(reject(KIND, format!("handler '{handler}' must be <file>.<export>")));
        }

        let runtime = required(KIND, properties, "runtime")?;
        if !RUNTIMES.contains(&runtime) {
            return Err(reject(KIND, format!("unsupported runtime '{runtime}'")));
        }

        let architecture = optional(properties, "architecture").unwrap_or("x86_64");
        if !ARCHITECTURES.contains(&architecture) {
            return Err(reject(KIND, format!("unsupported architecture '{architecture}'")));
        }

        let timeout = integer(KIND, properties, "timeout_seconds", 3)?;
        if !(1..=MAX_TIMEOUT_SECS).contains(&timeout) {
            return Err(reject(
                KIND,
                format!("timeout {timeout}s outside 1..={MAX_TIMEOUT_SECS}s"),
            ));
        }

        let memory = integer(KIND, properties, "memory_mb", 128)?;
        if !(128..=10240).contains(&memory) {
            return Err(reject(KIND, format!("memory {memory} MB outside 128..=10240 MB")));
        }

        integer(KIND, properties, "provisioned_concurrency", 0)?;

        if let Some(environment) = properties.get("environment") {
            let valid = environment
                .as_object()
                .is_some_and(|vars| vars.values().all(Value::is_string));
            if !valid {
                return Err(reject(KIND, "'environment' must be a table of strings"));
            }
        }

        let role = required(KIND, properties, "role")?;
        ensure_exists(&self.cloud, KIND, ResourceKind::Role, "arn", role)?;
        Ok(())
    }
}

fn next_version(outputs: &Outputs) -> Outputs {
    let mut outputs = outputs.clone();
    let version = outputs
        .get("version")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    outputs.insert("version".to_string(), (version + 1).to_string());
    outputs
}

impl ResourceProvider for FunctionProvider {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    fn create(&self, identity: &str, properties: &Properties) -> Result<Provisioned> {
        self.validate(properties)?;
        let name = match optional(properties, "function_name") {
            Some(name) => name.to_string(),
            None => format!("{identity}-{}", self.cloud.token(KIND, 12).to_uppercase()),
        };
        if self.cloud.find(KIND, "name", &name).is_some() {
            return Err(reject(KIND, format!("function '{name}' already exists")));
        }

        let arn = format!(
            "arn:aws:lambda:{}:{}:function:{name}",
            self.cloud.region(),
            self.cloud.account_id()
        );
        let outputs = Outputs::from([
            ("arn".to_string(), arn.clone()),
            ("name".to_string(), name),
            ("version".to_string(), "1".to_string()),
        ]);
        self.cloud.insert(
            KIND,
            identity,
            properties,
            NewResource {
                identifier: arn,
                outputs,
                settle: Duration::ZERO,
            },
        )
    }

    fn update(&self, identifier: &str, properties: &Properties) -> Result<Outputs> {
        self.validate(properties)?;
        self.cloud.update(identifier, properties, next_version)
    }

    fn delete(&self, identifier: &str) -> Result<()> {
        self.cloud.delete(identifier)
    }

    fn describe(&self, identifier: &str) -> Result<Description> {
        self.cloud.describe(identifier)
    }

    fn replacement_properties(&self) -> &'static [&'static str] {
        &["function_name"]
    }
}
