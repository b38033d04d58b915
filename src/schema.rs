use declarative::{
    DeploymentState, PropertyValue, Registry, ResourceDefinition, ResourceKind,
    collect_references, is_valid_identity, parse_properties, parse_value, resolve,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Problems with the stack file itself.
#[derive(Debug, Error)]
pub enum StackError {
    #[error("failed to read stack file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid stack file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid stack name '{0}': use ASCII letters, digits, '-' and '_'")]
    InvalidName(String),

    #[error("resource '{identity}': unknown type '{kind}'")]
    UnknownType { identity: String, kind: String },

    #[error("resource '{identity}': properties must be a table")]
    InvalidProperties { identity: String },

    #[error(transparent)]
    Engine(#[from] declarative::Error),
}

impl StackError {
    /// Every stack file problem is a validation failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            StackError::Engine(e) => e.exit_code(),
            _ => 1,
        }
    }
}

// ============================================================================
// Stack File Schema
// ============================================================================

/// A declared stack: metadata, resources and outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackFile {
    pub stack: StackMeta,

    /// Resources keyed by identity
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceDecl>,

    /// Stack outputs: name -> expression such as `${ApiCertificate.arn}`
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackMeta {
    /// Names the state file
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDecl {
    /// Type tag, e.g. `certificate`
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub properties: toml::Table,
}

impl StackFile {
    /// Load and parse a stack file.
    pub fn load(path: &Path) -> Result<Self, StackError> {
        let content = fs::read_to_string(path).map_err(|source| StackError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse stack file content; `path` is only used in messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self, StackError> {
        let stack: Self = toml::from_str(content).map_err(|source| StackError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if !is_valid_identity(&stack.stack.name) {
            return Err(StackError::InvalidName(stack.stack.name));
        }
        log::debug!(
            "Loaded stack '{}' with {} resources from {}",
            stack.stack.name,
            stack.resources.len(),
            path.display()
        );
        Ok(stack)
    }

    pub fn name(&self) -> &str {
        &self.stack.name
    }

    /// Convert the declarations into a registry, then check the outputs
    /// against it.
    pub fn registry(&self) -> Result<Registry, StackError> {
        let mut definitions = Vec::with_capacity(self.resources.len());
        for (identity, decl) in &self.resources {
            let kind: ResourceKind = decl.kind.parse().map_err(|_| StackError::UnknownType {
                identity: identity.clone(),
                kind: decl.kind.clone(),
            })?;
            let raw = serde_json::to_value(&decl.properties).map_err(declarative::Error::from)?;
            let serde_json::Value::Object(raw) = raw else {
                return Err(StackError::InvalidProperties {
                    identity: identity.clone(),
                });
            };
            definitions.push(ResourceDefinition {
                identity: identity.clone(),
                kind,
                properties: parse_properties(&raw, identity)?,
            });
        }
        let registry = Registry::from_definitions(definitions)?;
        self.check_outputs(&registry)?;
        Ok(registry)
    }

    /// Parsed output expressions, keyed by output name.
    pub fn output_values(&self) -> Result<BTreeMap<String, PropertyValue>, StackError> {
        self.outputs
            .iter()
            .map(|(name, expression)| {
                let owner = format!("outputs.{name}");
                parse_value(&serde_json::Value::String(expression.clone()), &owner)
                    .map(|value| (name.clone(), value))
                    .map_err(StackError::from)
            })
            .collect()
    }

    /// Outputs may only reference declared resources and attributes their kind exposes.
    fn check_outputs(&self, registry: &Registry) -> Result<(), StackError> {
        for (name, value) in self.output_values()? {
            let mut references = Vec::new();
            collect_references(&value, &mut references);
            for reference in references {
                let owner = format!("outputs.{name}");
                let Some(kind) = registry.kind_of(&reference.target) else {
                    return Err(declarative::Error::UnresolvedReference {
                        missing: reference.target.clone(),
                        referenced_by: owner,
                    }
                    .into());
                };
                let available = kind.output_attributes();
                if !available.contains(&reference.attribute.as_str()) {
                    return Err(declarative::Error::UnknownAttribute {
                        referenced_by: owner,
                        target: reference.target.clone(),
                        attribute: reference.attribute.clone(),
                        kind: kind.to_string(),
                        available: available.iter().map(ToString::to_string).collect(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Resolve outputs against recorded state; `None` until every
    /// referenced resource has been provisioned.
    pub fn resolve_outputs(
        &self,
        state: &DeploymentState,
    ) -> Result<Vec<(String, Option<String>)>, StackError> {
        Ok(self
            .output_values()?
            .into_iter()
            .map(|(name, value)| {
                let resolved = resolve(&value, |reference| state.output(reference))
                    .ok()
                    .map(|v| match v {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    });
                (name, resolved)
            })
            .collect())
    }
}

// ============================================================================
// Template
// ============================================================================

const TEMPLATE: &str = r#"# Serverless API served from {record}.{domain} over TLS.
#
# References use ${Identity.attribute}; apistack derives the provisioning
# order from them.

[stack]
name = "serverless-demo"
description = "Function behind a REST API on a custom domain with a DNS-validated certificate"

# Existing zone for the apex domain (looked up, not owned)
[resources.DemoHostedZone]
type = "hosted_zone"

[resources.DemoHostedZone.properties]
domain_name = "{domain}"

[resources.ApiCertificate]
type = "certificate"

[resources.ApiCertificate.properties]
domain_name = "{domain}"
subject_alternative_names = ["*.{domain}"]
validation_zone = "${DemoHostedZone.zone_id}"

[resources.LambdaExecutionRole]
type = "role"

[resources.LambdaExecutionRole.properties]
assumed_by = "lambda.amazonaws.com"
policy = [
    { actions = ["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"], resources = ["arn:aws:logs:*:*:*"] },
]

[resources.Function1]
type = "function"

[resources.Function1.properties]
handler = "hello.handler"
runtime = "nodejs16.x"
architecture = "arm64"
code = "lambda"
timeout_seconds = 780
provisioned_concurrency = 1
role = "${LambdaExecutionRole.arn}"
environment = { DYNAMO_DB_TABLE = "Example" }

[resources.ApiGatewayRole]
type = "role"

[resources.ApiGatewayRole.properties]
assumed_by = "apigateway.amazonaws.com"
policy = [{ actions = ["lambda:InvokeFunction"], resources = ["*"] }]

[resources.ApiGateway]
type = "gateway_api"

[resources.ApiGateway.properties]
name = "DemoApi"

[resources.ApiTest1Get]
type = "gateway_method"

[resources.ApiTest1Get.properties]
rest_api_id = "${ApiGateway.rest_api_id}"
path = "/test1"
http_method = "GET"
integration_function = "${Function1.arn}"
credentials_role = "${ApiGatewayRole.arn}"

# Redeployed whenever the method changes
[resources.Deployment]
type = "deployment"

[resources.Deployment.properties]
rest_api_id = "${ApiGateway.rest_api_id}"
triggers = ["${ApiTest1Get.method_id}"]

[resources.ApiStage]
type = "stage"

[resources.ApiStage.properties]
stage_name = "dev"
rest_api_id = "${ApiGateway.rest_api_id}"
deployment_id = "${Deployment.deployment_id}"

[resources.ApiDomain]
type = "domain_name"

[resources.ApiDomain.properties]
domain_name = "{record}.{domain}"
certificate_arn = "${ApiCertificate.arn}"
rest_api_id = "${ApiGateway.rest_api_id}"
stage = "${ApiStage.stage_name}"

[resources.ApiRecord]
type = "record"

[resources.ApiRecord.properties]
zone_id = "${DemoHostedZone.zone_id}"
record_name = "{record}"
record_type = "A"
alias_target = "${ApiDomain.target_domain_name}"
alias_zone_id = "${ApiDomain.hosted_zone_id}"

[outputs]
ApiCertificateArn = "${ApiCertificate.arn}"
ApiUrl = "https://${ApiRecord.fqdn}/test1"
"#;

/// Stack file text for a custom-domain serverless API.
pub fn template(domain: &str, record: &str) -> String {
    TEMPLATE
        .replace("{domain}", domain)
        .replace("{record}", record)
}

// ============================================================================
// Tests
// ============================================================================
