//! Reference extraction and property resolution
//!
//! Declared values are JSON-shaped. Any string may carry `${Identity.attribute}`
//! expressions: a string that is exactly one expression becomes a
//! [`PropertyValue::Reference`], a string mixing text and expressions becomes a
//! [`PropertyValue::Template`]. Resolution substitutes backend outputs back in.

use crate::error::{Error, Result};
use crate::types::{Properties, PropertyValue, Reference, ResourceDefinition, Segment};
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

static EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]*)\}").expect("valid expression regex"));

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_-]+)\.([A-Za-z0-9_]+)$").expect("valid reference regex")
});

/// Parse a raw declared value into a [`PropertyValue`].
///
/// `owner` is the identity of the resource the value belongs to, used only
/// for error messages.
pub fn parse_value(raw: &Value, owner: &str) -> Result<PropertyValue> {
    match raw {
        Value::String(s) => parse_string(s, owner),
        Value::Array(items) => items
            .iter()
            .map(|item| parse_value(item, owner))
            .collect::<Result<Vec<_>>>()
            .map(PropertyValue::List),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| parse_value(v, owner).map(|pv| (k.clone(), pv)))
            .collect::<Result<BTreeMap<_, _>>>()
            .map(PropertyValue::Map),
        other => Ok(PropertyValue::Literal(other.clone())),
    }
}

/// Parse every property of a raw table.
pub fn parse_properties(
    raw: &serde_json::Map<String, Value>,
    owner: &str,
) -> Result<BTreeMap<String, PropertyValue>> {
    raw.iter()
        .map(|(name, value)| parse_value(value, owner).map(|pv| (name.clone(), pv)))
        .collect()
}

fn parse_string(s: &str, owner: &str) -> Result<PropertyValue> {
    if !s.contains("${") {
        return Ok(PropertyValue::text(s));
    }

    let mut segments = Vec::new();
    let mut last = 0;
    for caps in EXPRESSION.captures_iter(s) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Text(s[last..whole.start()].to_string()));
        }
        segments.push(Segment::Reference(parse_reference(&caps[1], owner)?));
        last = whole.end();
    }
    if last < s.len() {
        segments.push(Segment::Text(s[last..].to_string()));
    }

    match segments.as_slice() {
        [] => Ok(PropertyValue::text(s)),
        [Segment::Reference(reference)] => Ok(PropertyValue::Reference(reference.clone())),
        _ => Ok(PropertyValue::Template(segments)),
    }
}

/// Parse `Identity.attribute`.
pub fn parse_reference(expression: &str, owner: &str) -> Result<Reference> {
    let expression = expression.trim();
    REFERENCE
        .captures(expression)
        .map(|caps| Reference::new(&caps[1], &caps[2]))
        .ok_or_else(|| Error::InvalidReference {
            expression: expression.to_string(),
            referenced_by: owner.to_string(),
        })
}

/// Collect every reference inside a value, depth first.
pub fn collect_references<'a>(value: &'a PropertyValue, out: &mut Vec<&'a Reference>) {
    match value {
        PropertyValue::Literal(_) => {}
        PropertyValue::Reference(reference) => out.push(reference),
        PropertyValue::Template(segments) => {
            for segment in segments {
                if let Segment::Reference(reference) = segment {
                    out.push(reference);
                }
            }
        }
        PropertyValue::List(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        PropertyValue::Map(map) => {
            for item in map.values() {
                collect_references(item, out);
            }
        }
    }
}

impl ResourceDefinition {
    /// Every distinct reference in this definition's properties, sorted.
    pub fn references(&self) -> Vec<Reference> {
        let mut found = Vec::new();
        for value in self.properties.values() {
            collect_references(value, &mut found);
        }
        found
            .into_iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Identities this definition depends on, sorted and deduplicated.
    pub fn dependencies(&self) -> Vec<String> {
        self.references()
            .into_iter()
            .map(|r| r.target)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Substitute outputs into a definition's properties.
///
/// `lookup` returns the output for a reference, or `None` when it is not
/// known yet. On failure, returns every reference that could not be
/// resolved.
pub fn resolve_properties<F>(
    definition: &ResourceDefinition,
    lookup: F,
) -> std::result::Result<Properties, Vec<Reference>>
where
    F: Fn(&Reference) -> Option<String>,
{
    let mut missing = Vec::new();
    let mut resolved = Properties::new();
    for (name, value) in &definition.properties {
        resolved.insert(name.clone(), resolve_value(value, &lookup, &mut missing));
    }
    if missing.is_empty() {
        Ok(resolved)
    } else {
        missing.sort();
        missing.dedup();
        Err(missing)
    }
}

/// Substitute outputs into a single value.
pub fn resolve<F>(value: &PropertyValue, lookup: F) -> std::result::Result<Value, Vec<Reference>>
where
    F: Fn(&Reference) -> Option<String>,
{
    let mut missing = Vec::new();
    let resolved = resolve_value(value, &lookup, &mut missing);
    if missing.is_empty() {
        Ok(resolved)
    } else {
        missing.sort();
        missing.dedup();
        Err(missing)
    }
}

fn resolve_value<F>(value: &PropertyValue, lookup: &F, missing: &mut Vec<Reference>) -> Value
where
    F: Fn(&Reference) -> Option<String>,
{
    match value {
        PropertyValue::Literal(v) => v.clone(),
        PropertyValue::Reference(reference) => match lookup(reference) {
            Some(output) => Value::String(output),
            None => {
                missing.push(reference.clone());
                Value::Null
            }
        },
        PropertyValue::Template(segments) => {
            let mut text = String::new();
            for segment in segments {
                match segment {
                    Segment::Text(t) => text.push_str(t),
                    Segment::Reference(reference) => match lookup(reference) {
                        Some(output) => text.push_str(&output),
                        None => missing.push(reference.clone()),
                    },
                }
            }
            Value::String(text)
        }
        PropertyValue::List(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_value(item, lookup, missing))
                .collect(),
        ),
        PropertyValue::Map(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, lookup, missing)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceKind;
    use serde_json::json;

    #[test]
    fn test_whole_string_is_reference() {
        let value = parse_value(&json!("${ApiCertificate.arn}"), "Domain").unwrap();
        assert_eq!(value, PropertyValue::reference("ApiCertificate", "arn"));
    }

    #[test]
    fn test_embedded_reference_is_template() {
        let value = parse_value(
            &json!("arn:aws:execute-api:${Gateway.rest_api_id}/*"),
            "Perm",
        )
        .unwrap();
        assert_eq!(
            value,
            PropertyValue::Template(vec![
                Segment::Text("arn:aws:execute-api:".into()),
                Segment::Reference(Reference::new("Gateway", "rest_api_id")),
                Segment::Text("/*".into()),
            ])
        );
    }

    #[test]
    fn test_plain_strings_and_scalars_are_literals() {
        assert_eq!(
            parse_value(&json!("hello.handler"), "Fn").unwrap(),
            PropertyValue::text("hello.handler")
        );
        assert_eq!(
            parse_value(&json!(780), "Fn").unwrap(),
            PropertyValue::Literal(json!(780))
        );
    }

    #[test]
    fn test_malformed_expression_rejected() {
        let err = parse_value(&json!("${NoAttribute}"), "Fn").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidReference { expression, referenced_by }
                if expression == "NoAttribute" && referenced_by == "Fn"
        ));
    }

    #[test]
    fn test_nested_references_collected_and_deduplicated() {
        let raw = json!({
            "role": "${Role.arn}",
            "environment": { "ROLE": "${Role.arn}", "ZONE": "${Zone.zone_id}" },
            "aliases": ["${Zone.name}"]
        });
        let properties = parse_properties(raw.as_object().unwrap(), "Fn").unwrap();
        let definition = ResourceDefinition {
            identity: "Fn".into(),
            kind: ResourceKind::Function,
            properties,
        };
        assert_eq!(
            definition.references(),
            vec![
                Reference::new("Role", "arn"),
                Reference::new("Zone", "name"),
                Reference::new("Zone", "zone_id"),
            ]
        );
        assert_eq!(definition.dependencies(), vec!["Role", "Zone"]);
    }

    #[test]
    fn test_resolve_substitutes_outputs() {
        let definition = ResourceDefinition::new("Stage", ResourceKind::Stage)
            .with_ref("deployment_id", "Deployment", "deployment_id")
            .with("stage_name", "dev");
        let resolved = resolve_properties(&definition, |r| {
            (r.target == "Deployment").then(|| "dep-123".to_string())
        })
        .unwrap();
        assert_eq!(resolved["deployment_id"], json!("dep-123"));
        assert_eq!(resolved["stage_name"], json!("dev"));
    }

    #[test]
    fn test_resolve_reports_missing() {
        let definition = ResourceDefinition::new("Stage", ResourceKind::Stage)
            .with_ref("deployment_id", "Deployment", "deployment_id");
        let missing = resolve_properties(&definition, |_| None).unwrap_err();
        assert_eq!(missing, vec![Reference::new("Deployment", "deployment_id")]);
    }

    #[test]
    fn test_resolve_single_template() {
        let value = parse_value(&json!("https://${Domain.domain_name}/test1"), "outputs").unwrap();
        let resolved = resolve(&value, |r| {
            (r.attribute == "domain_name").then(|| "api.example.com".to_string())
        })
        .unwrap();
        assert_eq!(resolved, json!("https://api.example.com/test1"));
        assert!(resolve(&value, |_| None).is_err());
    }
}
