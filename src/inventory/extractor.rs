//! Field Extractor
//!
//! Turns one raw API item into a canonical resource candidate. Extraction
//! never fails: items it cannot make sense of still come out, with
//! `resource_id = "unknown"` and a diagnostic.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use super::confidence::ConfidenceScorer;
use super::path::lookup;
use super::registry::{LocationLookup, ServicePattern};
use super::types::{CanonicalResource, IdentifierStrategy, GLOBAL_REGION};

/// Keys that carry tags, in lookup order
const TAG_KEYS: &[&str] = &["Tags", "TagList", "TagSet", "tags"];

/// Key suffixes the last-resort identifier heuristic accepts
const HEURISTIC_SUFFIXES: &[&str] = &["Id", "ID", "Identifier", "Name", "Arn", "ARN"];

/// Diagnostic attached to candidates whose identifier could not be resolved
pub const UNRESOLVED_DIAGNOSTIC: &str = "identifier unresolved";

/// Outcome of identifier resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentifier {
    pub id: String,
    pub arn: Option<String>,
    /// Top-level key the identifier came from
    pub field: String,
    pub strategy: IdentifierStrategy,
}

/// Raw item -> candidate, scored on the way out
#[derive(Debug, Clone, Default)]
pub struct FieldExtractor {
    scorer: ConfidenceScorer,
}

impl FieldExtractor {
    pub fn new(scorer: ConfidenceScorer) -> Self {
        Self { scorer }
    }

    /// Extract one candidate.
    ///
    /// `region` is the issuing client's region; global services ignore it.
    pub fn extract(
        &self,
        item: &Value,
        pattern: &ServicePattern,
        region: &str,
        operation: &str,
    ) -> CanonicalResource {
        let resource_type = pattern.resource_type_for(operation);
        let region = if pattern.is_global_service {
            GLOBAL_REGION
        } else {
            region
        };

        let mut candidate =
            CanonicalResource::new(&pattern.service_name, resource_type, region, operation);

        let Some(map) = item.as_object() else {
            candidate.diagnostic = Some("malformed item: not an object".to_string());
            candidate
                .raw_attributes
                .insert("value".to_string(), item.clone());
            self.scorer.apply(&mut candidate, pattern);
            return candidate;
        };

        let mut consumed: HashSet<&str> = HashSet::new();

        match resolve_identifier(map, pattern, &candidate.resource_type) {
            Some(resolved) => {
                candidate.resource_id = resolved.id;
                candidate.id_strategy = resolved.strategy;
                candidate.resource_arn = resolved.arn;
                if let Some((key, _)) = map.get_key_value(resolved.field.as_str()) {
                    consumed.insert(key.as_str());
                }
            }
            None => {
                debug!(
                    service = %pattern.service_name,
                    operation = %operation,
                    "Identifier unresolved"
                );
                candidate.diagnostic = Some(UNRESOLVED_DIAGNOSTIC.to_string());
            }
        }

        if candidate.resource_arn.is_none() && candidate.has_identifier() {
            candidate.resource_arn = pattern
                .arn_template
                .as_deref()
                .map(|t| render_arn(t, &candidate.resource_id, &candidate.region));
        }

        for field in &pattern.name_fields {
            if let Some(name) = lookup(item, field).and_then(scalar_string) {
                candidate.resource_name = name;
                if let Some((key, _)) = map.get_key_value(field.as_str()) {
                    consumed.insert(key.as_str());
                }
                break;
            }
        }

        if let Some((key, tags)) = TAG_KEYS
            .iter()
            .find_map(|k| map.get_key_value(*k))
        {
            candidate.tags = normalize_tags(tags);
            consumed.insert(key.as_str());
        }

        if let Some(location) = &pattern.location_lookup {
            if let Some((key, value)) = map.get_key_value(location.field.as_str()) {
                candidate.region = location_region(value, location);
                consumed.insert(key.as_str());
            }
        }

        candidate.raw_attributes = map
            .iter()
            .filter(|(k, _)| !consumed.contains(k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        self.scorer.apply(&mut candidate, pattern);
        candidate
    }
}

/// Try ARN, then identifier shapes, then the suffix heuristic.
pub fn resolve_identifier(
    item: &Map<String, Value>,
    pattern: &ServicePattern,
    resource_type: &str,
) -> Option<ResolvedIdentifier> {
    resolve_arn(item, pattern, resource_type)
        .or_else(|| resolve_shape(item, pattern, resource_type))
        .or_else(|| resolve_heuristic(item))
}

/// Top-level ARN fields, ranked by how surely they name the item itself.
///
/// `Arn`, `{Type}Arn` and `{Type}Id` (e.g. `DBInstanceArn`, `StackId`) win.
/// Any other field only counts when its ARN belongs to the pattern's own
/// service, so `MonitoringRoleArn` or `RoleARN` never become the identity.
fn resolve_arn(
    item: &Map<String, Value>,
    pattern: &ServicePattern,
    resource_type: &str,
) -> Option<ResolvedIdentifier> {
    let type_key = resource_type.to_ascii_lowercase();
    let own_keys = [
        "arn".to_string(),
        format!("{}arn", type_key),
        format!("{}id", type_key),
    ];

    let arn_fields = || {
        item.iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k, s)))
            .filter(|(_, s)| arn_resource_id(s).is_some())
    };
    let same_service = |arn: &str| arn_service(arn) == Some(pattern.service_name.as_str());

    let (key, arn) = arn_fields()
        .find(|(k, _)| own_keys.contains(&k.to_ascii_lowercase()))
        .or_else(|| {
            arn_fields().find(|(k, s)| k.to_ascii_lowercase().ends_with("arn") && same_service(s))
        })
        .or_else(|| arn_fields().find(|(_, s)| same_service(s)))?;

    Some(ResolvedIdentifier {
        id: arn_resource_id(arn)?,
        arn: Some(arn.to_string()),
        field: key.clone(),
        strategy: IdentifierStrategy::Arn,
    })
}

fn resolve_shape(
    item: &Map<String, Value>,
    pattern: &ServicePattern,
    resource_type: &str,
) -> Option<ResolvedIdentifier> {
    if pattern.identifier_shapes.is_empty() {
        return None;
    }

    let matches_shape =
        |value: &&str| pattern.identifier_shapes.iter().any(|re| re.is_match(value));
    let strings = || item.iter().filter_map(|(k, v)| v.as_str().map(|s| (k, s)));

    // The resource's own id field wins over ids of related resources
    let own_key = format!("{}Id", resource_type).to_ascii_lowercase();
    let is_own = |key: &str| {
        let key = key.to_ascii_lowercase();
        key.ends_with("id") && own_key.ends_with(&key)
    };

    let (key, id) = strings()
        .find(|(k, s)| is_own(k.as_str()) && matches_shape(s))
        .or_else(|| strings().find(|(_, s)| matches_shape(s)))?;

    Some(ResolvedIdentifier {
        id: id.to_string(),
        arn: None,
        field: key.clone(),
        strategy: IdentifierStrategy::Shape,
    })
}

/// ARN-shaped values were already judged by [`resolve_arn`] and are skipped
fn resolve_heuristic(item: &Map<String, Value>) -> Option<ResolvedIdentifier> {
    item.iter()
        .filter(|(k, _)| HEURISTIC_SUFFIXES.iter().any(|s| k.ends_with(s)))
        .filter(|(_, v)| v.as_str().map_or(true, |s| arn_resource_id(s).is_none()))
        .find_map(|(k, v)| {
            scalar_string(v).map(|id| ResolvedIdentifier {
                id,
                arn: None,
                field: k.clone(),
                strategy: IdentifierStrategy::Heuristic,
            })
        })
}

/// Resource id carried by an ARN, or `None` if `value` is not ARN-shaped.
///
/// The leading resource-type segment is dropped:
/// `arn:aws:iam::123:role/aws-service-role/x` -> `aws-service-role/x`.
pub fn arn_resource_id(value: &str) -> Option<String> {
    let parts: Vec<&str> = value.splitn(6, ':').collect();
    if parts.len() != 6 || parts[0] != "arn" || parts[2].is_empty() {
        return None;
    }

    let resource = parts[5];
    if resource.is_empty() {
        return None;
    }

    let id = match resource.find(|c: char| c == '/' || c == ':') {
        Some(i) if i + 1 < resource.len() => &resource[i + 1..],
        _ => resource,
    };
    Some(id.to_string())
}

/// Service segment of an ARN (`arn:aws:iam::1:role/x` -> `iam`)
fn arn_service(value: &str) -> Option<&str> {
    value.split(':').nth(2).filter(|s| !s.is_empty())
}

fn render_arn(template: &str, id: &str, region: &str) -> String {
    let region = if region == GLOBAL_REGION { "" } else { region };
    template.replace("{id}", id).replace("{region}", region)
}

/// Region reported by a location field; empty or null means the default
pub fn location_region(value: &Value, location: &LocationLookup) -> String {
    scalar_string(value)
        .or_else(|| location.default_region.clone())
        .unwrap_or_else(|| GLOBAL_REGION.to_string())
}

/// Non-empty string or number rendered as a string
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Normalize `[{Key, Value}]` lists and `{key: value}` maps into one map.
///
/// Later entries win on key collision.
pub fn normalize_tags(value: &Value) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();

    match value {
        Value::Array(entries) => {
            for entry in entries {
                let key = ["Key", "key", "TagKey"]
                    .iter()
                    .find_map(|k| entry.get(*k))
                    .and_then(tag_value);
                let val = ["Value", "value", "TagValue"]
                    .iter()
                    .find_map(|k| entry.get(*k))
                    .and_then(tag_value)
                    .unwrap_or_default();

                if let Some(key) = key.filter(|k| !k.is_empty()) {
                    tags.insert(key, val);
                }
            }
        }
        Value::Object(map) => {
            for (key, val) in map {
                tags.insert(key.clone(), tag_value(val).unwrap_or_default());
            }
        }
        _ => {}
    }

    tags
}

fn tag_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::ServiceRegistry;
    use serde_json::json;

    fn extract(service: &str, operation: &str, item: Value) -> CanonicalResource {
        let registry = ServiceRegistry::builtin().unwrap();
        let pattern = registry.lookup(service);
        FieldExtractor::default().extract(&item, &pattern, "us-east-1", operation)
    }

    #[test]
    fn test_ec2_instance_with_name_tag() {
        let c = extract(
            "ec2",
            "describe_instances",
            json!({ "InstanceId": "i-abc123", "Tags": [{ "Key": "Name", "Value": "web-1" }] }),
        );

        assert_eq!(c.resource_id, "i-abc123");
        assert_eq!(c.resource_type, "Instance");
        assert_eq!(c.id_strategy, IdentifierStrategy::Shape);
        assert_eq!(c.resource_name, "");
        assert_eq!(c.tags.get("Name").map(String::as_str), Some("web-1"));
        assert_eq!(c.tags.len(), 1);
        assert_eq!(c.region, "us-east-1");
        assert!(c.raw_attributes.is_empty());
    }

    #[test]
    fn test_own_id_field_beats_related_ids() {
        let c = extract(
            "ec2",
            "describe_subnets",
            json!({ "VpcId": "vpc-0aa", "SubnetId": "subnet-0bb", "State": "available" }),
        );

        assert_eq!(c.resource_type, "Subnet");
        assert_eq!(c.resource_id, "subnet-0bb");
        assert_eq!(c.raw_attributes.get("VpcId"), Some(&json!("vpc-0aa")));
        assert!(!c.raw_attributes.contains_key("SubnetId"));
    }

    #[test]
    fn test_arn_strategy_wins() {
        let c = extract(
            "iam",
            "list_roles",
            json!({
                "Path": "/aws-service-role/ecs.amazonaws.com/",
                "RoleName": "AWSServiceRoleForECS",
                "RoleId": "AROAEXAMPLE",
                "Arn": "arn:aws:iam::123456789012:role/aws-service-role/ecs.amazonaws.com/AWSServiceRoleForECS",
                "CreateDate": "2023-01-01T00:00:00Z"
            }),
        );

        assert_eq!(c.id_strategy, IdentifierStrategy::Arn);
        assert_eq!(
            c.resource_id,
            "aws-service-role/ecs.amazonaws.com/AWSServiceRoleForECS"
        );
        assert_eq!(c.resource_name, "AWSServiceRoleForECS");
        assert_eq!(c.region, GLOBAL_REGION);
        assert!(c.raw_attributes.contains_key("Path"));
        assert!(c.raw_attributes.contains_key("RoleId"));
        assert!(!c.raw_attributes.contains_key("Arn"));
        assert!(!c.raw_attributes.contains_key("RoleName"));
    }

    #[test]
    fn test_related_arns_do_not_become_identity() {
        let c = extract(
            "rds",
            "describe_db_instances",
            json!({
                "DBInstanceIdentifier": "orders-db",
                "MonitoringRoleArn": "arn:aws:iam::123456789012:role/rds-monitoring-role",
                "EnhancedMonitoringResourceArn": "arn:aws:logs:us-east-1:123456789012:log-group:RDSOSMetrics:log-stream:db-ABC",
                "DBInstanceArn": "arn:aws:rds:us-east-1:123456789012:db:orders-db",
                "DBInstanceStatus": "available"
            }),
        );

        assert_eq!(c.resource_type, "DBInstance");
        assert_eq!(c.id_strategy, IdentifierStrategy::Arn);
        assert_eq!(c.resource_id, "orders-db");
        assert_eq!(
            c.arn(),
            Some("arn:aws:rds:us-east-1:123456789012:db:orders-db")
        );
        assert!(c.raw_attributes.contains_key("MonitoringRoleArn"));
        assert!(!c.raw_attributes.contains_key("DBInstanceArn"));
    }

    #[test]
    fn test_stack_id_beats_role_arn() {
        let c = extract(
            "cloudformation",
            "describe_stacks",
            json!({
                "RoleARN": "arn:aws:iam::123456789012:role/cfn-deployer",
                "StackName": "network",
                "StackId": "arn:aws:cloudformation:us-east-1:123456789012:stack/network/1a2b3c",
                "StackStatus": "CREATE_COMPLETE"
            }),
        );

        assert_eq!(c.resource_id, "network/1a2b3c");
        assert_eq!(c.resource_name, "network");
        assert!(c.arn().unwrap().contains(":stack/network/"));
    }

    #[test]
    fn test_foreign_arn_alone_is_not_an_identity() {
        let c = extract(
            "rds",
            "describe_db_instances",
            json!({
                "DBInstanceIdentifier": "users-db",
                "MonitoringRoleArn": "arn:aws:iam::123456789012:role/rds-monitoring-role"
            }),
        );

        assert_eq!(c.id_strategy, IdentifierStrategy::Heuristic);
        assert_eq!(c.resource_id, "users-db");
        assert_eq!(c.arn(), None);
    }

    #[test]
    fn test_heuristic_fallback() {
        let c = extract(
            "widgets",
            "list_widgets",
            json!({ "Color": "blue", "WidgetName": "gizmo", "Size": 3 }),
        );

        assert_eq!(c.id_strategy, IdentifierStrategy::Heuristic);
        assert_eq!(c.resource_id, "gizmo");
        assert_eq!(c.resource_type, "Widget");
        assert_eq!(c.resource_name, "");
        assert_eq!(c.region, "us-east-1");
    }

    #[test]
    fn test_unresolved_identifier_is_degraded_not_dropped() {
        let c = extract("widgets", "list_widgets", json!({ "Color": "blue" }));

        assert!(c.is_unresolved());
        assert_eq!(c.id_strategy, IdentifierStrategy::Unresolved);
        assert_eq!(c.diagnostic.as_deref(), Some("identifier unresolved"));
        assert_eq!(c.raw_attributes.get("Color"), Some(&json!("blue")));
    }

    #[test]
    fn test_malformed_item() {
        let c = extract("widgets", "list_widgets", json!(42));

        assert!(c.is_unresolved());
        assert!(c.diagnostic.unwrap().starts_with("malformed"));
        assert_eq!(c.raw_attributes.get("value"), Some(&json!(42)));
    }

    #[test]
    fn test_s3_bucket_gets_templated_arn() {
        let c = extract(
            "s3",
            "list_buckets",
            json!({ "Name": "logs-bucket", "CreationDate": "2022-05-01T00:00:00Z" }),
        );

        assert_eq!(c.resource_id, "logs-bucket");
        assert_eq!(c.resource_name, "logs-bucket");
        assert_eq!(c.resource_arn.as_deref(), Some("arn:aws:s3:::logs-bucket"));
        assert_eq!(c.region, GLOBAL_REGION);
    }

    #[test]
    fn test_location_field_in_item_sets_region() {
        let c = extract(
            "s3",
            "list_buckets",
            json!({ "Name": "eu-bucket", "LocationConstraint": "eu-west-1" }),
        );
        assert_eq!(c.region, "eu-west-1");

        let c = extract(
            "s3",
            "list_buckets",
            json!({ "Name": "us-bucket", "LocationConstraint": null }),
        );
        assert_eq!(c.region, "us-east-1");
    }

    #[test]
    fn test_nested_name_path() {
        let registry = ServiceRegistry::from_json(
            r#"{ "services": { "demo": { "name_fields": ["Meta.Label", "Name"] } } }"#,
        )
        .unwrap();
        let pattern = registry.lookup("demo");

        let item = json!({ "ThingId": "t-1", "Meta": { "Label": "" }, "Name": "fallback" });
        let c = FieldExtractor::default().extract(&item, &pattern, "us-west-2", "list_things");
        assert_eq!(c.resource_name, "fallback");

        let item = json!({ "ThingId": "t-1", "Meta": { "Label": "primary" } });
        let c = FieldExtractor::default().extract(&item, &pattern, "us-west-2", "list_things");
        assert_eq!(c.resource_name, "primary");
        assert!(c.raw_attributes.contains_key("Meta"));
    }

    #[test]
    fn test_normalize_tags_both_shapes() {
        let list = json!([
            { "Key": "env", "Value": "dev" },
            { "Key": "team", "Value": "core" },
            { "Key": "env", "Value": "prod" }
        ]);
        let tags = normalize_tags(&list);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["env"], "prod");

        let map = json!({ "env": "prod", "count": 3 });
        let tags = normalize_tags(&map);
        assert_eq!(tags["env"], "prod");
        assert_eq!(tags["count"], "3");
    }

    #[test]
    fn test_arn_resource_id() {
        assert_eq!(arn_resource_id("arn:aws:s3:::bucket").as_deref(), Some("bucket"));
        assert_eq!(
            arn_resource_id("arn:aws:lambda:us-east-1:123456789012:function:handler").as_deref(),
            Some("handler")
        );
        assert_eq!(
            arn_resource_id("arn:aws:ec2:us-east-1:123456789012:instance/i-0abc").as_deref(),
            Some("i-0abc")
        );
        assert!(arn_resource_id("not-an-arn").is_none());
        assert!(arn_resource_id("arn:aws").is_none());
    }
}
