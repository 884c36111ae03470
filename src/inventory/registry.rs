//! Service Pattern Registry
//!
//! Static, data-driven description of how to query and interpret each
//! service. The table lives in `patterns.json`; adding a service is a data
//! change, not new control flow.

use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

use super::managed::ManagedPredicate;
use super::path::singularize;

const BUILTIN_PATTERNS: &str = include_str!("patterns.json");

/// Discovery verbs, in selection priority order
pub const OPERATION_VERBS: &[&str] = &["list", "describe", "get"];

/// Split an operation name into its discovery verb and the rest.
///
/// Accepts snake_case (`list_buckets`) and CamelCase (`ListBuckets`); the
/// verb must be followed by `_` or an uppercase letter, so `Listener...`
/// has no verb.
pub fn split_operation(operation: &str) -> Option<(&'static str, &str)> {
    OPERATION_VERBS.iter().find_map(|verb| {
        let head = operation.get(..verb.len())?;
        if !head.eq_ignore_ascii_case(verb) {
            return None;
        }
        let rest = &operation[verb.len()..];
        match rest.chars().next() {
            Some('_') => Some((*verb, &rest[1..])),
            Some(c) if c.is_ascii_uppercase() => Some((*verb, rest)),
            _ => None,
        }
    })
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to parse pattern table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid regex {pattern:?} for {scope}: {source}")]
    InvalidPattern {
        scope: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Secondary per-resource call that resolves a resource's true location
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LocationLookup {
    /// Operation to invoke (e.g., "get_bucket_location")
    pub operation: String,
    /// Request parameter that receives the resource id
    pub param: String,
    /// Field holding the location, both in the item and in the lookup response
    pub field: String,
    /// Region to use when the provider reports an empty location
    pub default_region: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PatternTable {
    #[serde(default)]
    global_managed_patterns: Vec<String>,
    services: BTreeMap<String, PatternSpec>,
}

#[derive(Debug, Deserialize)]
struct PatternSpec {
    #[serde(default)]
    resource_types: Vec<String>,
    #[serde(default)]
    operations: Vec<String>,
    #[serde(default)]
    name_fields: Vec<String>,
    #[serde(default)]
    identifier_patterns: Vec<String>,
    #[serde(default)]
    global: bool,
    #[serde(default)]
    filter_managed: bool,
    #[serde(default)]
    managed_patterns: Vec<String>,
    #[serde(default)]
    managed_predicate: Option<ManagedPredicate>,
    #[serde(default)]
    collections: BTreeMap<String, String>,
    #[serde(default)]
    arn_template: Option<String>,
    #[serde(default)]
    location: Option<LocationLookup>,
}

/// How one service is queried and interpreted
#[derive(Debug, Clone)]
pub struct ServicePattern {
    pub service_name: String,
    pub resource_types: Vec<String>,
    /// Empty means "derive from the client's operation list"
    pub preferred_operations: Vec<String>,
    /// Dotted paths tried in order for the resource name
    pub name_fields: Vec<String>,
    pub identifier_shapes: Vec<Regex>,
    pub is_global_service: bool,
    pub filter_managed: bool,
    pub managed_patterns: Vec<Regex>,
    pub managed_predicate: Option<ManagedPredicate>,
    /// Per-operation dotted path to the resource collection
    pub collection_paths: BTreeMap<String, String>,
    pub arn_template: Option<String>,
    pub location_lookup: Option<LocationLookup>,
}

impl ServicePattern {
    /// Fallback for services without a registry entry
    pub fn generic(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            resource_types: Vec::new(),
            preferred_operations: Vec::new(),
            name_fields: Vec::new(),
            identifier_shapes: Vec::new(),
            is_global_service: false,
            filter_managed: false,
            managed_patterns: Vec::new(),
            managed_predicate: None,
            collection_paths: BTreeMap::new(),
            arn_template: None,
            location_lookup: None,
        }
    }

    fn compile(service_name: &str, entry: PatternSpec) -> Result<Self, RegistryError> {
        Ok(Self {
            service_name: service_name.to_string(),
            resource_types: entry.resource_types,
            preferred_operations: entry.operations,
            name_fields: entry.name_fields,
            identifier_shapes: compile_all(service_name, &entry.identifier_patterns)?,
            is_global_service: entry.global,
            filter_managed: entry.filter_managed,
            managed_patterns: compile_all(service_name, &entry.managed_patterns)?,
            managed_predicate: entry.managed_predicate,
            collection_paths: entry.collections,
            arn_template: entry.arn_template,
            location_lookup: entry.location,
        })
    }

    pub fn collection_path(&self, operation: &str) -> Option<&str> {
        self.collection_paths.get(operation).map(String::as_str)
    }

    /// Whether `resource_type` is one of the declared types
    pub fn declares_type(&self, resource_type: &str) -> bool {
        self.resource_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(resource_type))
    }

    /// Resource type produced by an operation.
    ///
    /// `describe_db_instances` -> `DbInstance`, replaced by the declared
    /// spelling (`DBInstance`) when one matches.
    pub fn resource_type_for(&self, operation: &str) -> String {
        let derived = derive_resource_type(operation);
        self.resource_types
            .iter()
            .find(|t| t.eq_ignore_ascii_case(&derived))
            .cloned()
            .unwrap_or(derived)
    }
}

fn derive_resource_type(operation: &str) -> String {
    let stem = split_operation(operation)
        .map(|(_, rest)| rest)
        .unwrap_or(operation);

    let camel: String = stem
        .split('_')
        .filter(|s| !s.is_empty())
        .map(|s| {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();

    singularize(&camel)
}

fn compile_all(scope: &str, patterns: &[String]) -> Result<Vec<Regex>, RegistryError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|source| RegistryError::InvalidPattern {
                scope: scope.to_string(),
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

/// Immutable table of service patterns plus provider-wide managed patterns
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    patterns: HashMap<String, Arc<ServicePattern>>,
    global_managed: Arc<Vec<Regex>>,
}

impl ServiceRegistry {
    /// Registry built from the embedded pattern table
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_json(BUILTIN_PATTERNS)
    }

    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let table: PatternTable = serde_json::from_str(json)?;

        let global_managed = compile_all("global", &table.global_managed_patterns)?;
        let patterns = table
            .services
            .into_iter()
            .map(|(name, entry)| {
                let pattern = ServicePattern::compile(&name, entry)?;
                Ok((name, Arc::new(pattern)))
            })
            .collect::<Result<HashMap<_, _>, RegistryError>>()?;

        Ok(Self {
            patterns,
            global_managed: Arc::new(global_managed),
        })
    }

    /// Pattern for a service; unknown services get [`ServicePattern::generic`].
    pub fn lookup(&self, service_name: &str) -> Arc<ServicePattern> {
        self.patterns
            .get(service_name)
            .cloned()
            .unwrap_or_else(|| Arc::new(ServicePattern::generic(service_name)))
    }

    pub fn contains(&self, service_name: &str) -> bool {
        self.patterns.contains_key(service_name)
    }

    /// Registered service names, sorted
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.patterns.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn global_managed_patterns(&self) -> &[Regex] {
        &self.global_managed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_loads() {
        let registry = ServiceRegistry::builtin().unwrap();

        assert!(registry.contains("ec2"));
        assert!(registry.contains("iam"));
        assert!(!registry.global_managed_patterns().is_empty());

        let iam = registry.lookup("iam");
        assert!(iam.is_global_service);
        assert!(iam.filter_managed);
        assert_eq!(iam.managed_predicate, Some(ManagedPredicate::IamServiceLinked));
    }

    #[test]
    fn test_unknown_service_falls_back_to_generic() {
        let registry = ServiceRegistry::builtin().unwrap();
        let pattern = registry.lookup("quantum-ledger");

        assert_eq!(pattern.service_name, "quantum-ledger");
        assert!(pattern.resource_types.is_empty());
        assert!(pattern.preferred_operations.is_empty());
        assert!(pattern.identifier_shapes.is_empty());
        assert!(!pattern.is_global_service);
        assert!(!pattern.filter_managed);
    }

    #[test]
    fn test_invalid_regex_is_reported() {
        let json = r#"{ "services": { "broken": { "identifier_patterns": ["^i-(" ] } } }"#;
        let err = ServiceRegistry::from_json(json).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidPattern { .. }));
    }

    #[test]
    fn test_resource_type_derivation() {
        let registry = ServiceRegistry::builtin().unwrap();

        let rds = registry.lookup("rds");
        assert_eq!(rds.resource_type_for("describe_db_instances"), "DBInstance");

        let ec2 = registry.lookup("ec2");
        assert_eq!(ec2.resource_type_for("describe_security_groups"), "SecurityGroup");

        let s3 = registry.lookup("s3");
        assert_eq!(s3.resource_type_for("ListBuckets"), "Bucket");

        let generic = registry.lookup("widgets");
        assert_eq!(generic.resource_type_for("list_widget_policies"), "WidgetPolicy");
        assert_eq!(generic.resource_type_for("DescribeWidgetGroups"), "WidgetGroup");
        assert!(!generic.declares_type("WidgetPolicy"));
    }

    #[test]
    fn test_split_operation_accepts_both_casings() {
        assert_eq!(split_operation("list_buckets"), Some(("list", "buckets")));
        assert_eq!(split_operation("ListBuckets"), Some(("list", "Buckets")));
        assert_eq!(split_operation("GetWidget"), Some(("get", "Widget")));
        assert_eq!(split_operation("describe_vpcs"), Some(("describe", "vpcs")));
        assert_eq!(split_operation("ListenerRules"), None);
        assert_eq!(split_operation("getaway"), None);
        assert_eq!(split_operation("create_widget"), None);
        assert_eq!(split_operation("list"), None);
    }

    #[test]
    fn test_collection_paths() {
        let registry = ServiceRegistry::builtin().unwrap();
        let ec2 = registry.lookup("ec2");

        assert_eq!(
            ec2.collection_path("describe_instances"),
            Some("Reservations.Instances")
        );
        assert_eq!(ec2.collection_path("describe_vpcs"), None);
    }
}
