//! Managed-Resource Filter
//!
//! Flags resources the provider created on the account's behalf
//! (service-linked roles, default VPCs, reverse-DNS zones, AWS-managed keys)
//! so they never reach the final inventory.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::registry::{ServicePattern, ServiceRegistry};
use super::types::CanonicalResource;

/// Service-specific managed-resource check, referenced by name from the
/// pattern table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagedPredicate {
    /// IAM role under a service-linked or reserved path
    IamServiceLinked,
    /// The account's default VPC or a default security group
    DefaultVpc,
    /// Reverse-DNS hosted zone
    ReverseDnsZone,
    /// KMS key managed by AWS rather than the customer
    AwsManagedKey,
}

impl ManagedPredicate {
    pub fn matches(&self, candidate: &CanonicalResource) -> bool {
        let attr_str = |key: &str| candidate.raw_attributes.get(key).and_then(Value::as_str);

        match self {
            ManagedPredicate::IamServiceLinked => attr_str("Path")
                .map(|p| p.starts_with("/aws-service-role/") || p.starts_with("/aws-reserved/"))
                .unwrap_or(false),
            ManagedPredicate::DefaultVpc => {
                let is_default = candidate
                    .raw_attributes
                    .get("IsDefault")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let default_group = candidate.resource_type == "SecurityGroup"
                    && (candidate.resource_name == "default"
                        || attr_str("GroupName") == Some("default"));
                is_default || default_group
            }
            ManagedPredicate::ReverseDnsZone => {
                let zone = if candidate.resource_name.is_empty() {
                    attr_str("Name").unwrap_or_default()
                } else {
                    candidate.resource_name.as_str()
                };
                let zone = zone.trim_end_matches('.');
                zone.ends_with("in-addr.arpa") || zone.ends_with("ip6.arpa")
            }
            ManagedPredicate::AwsManagedKey => attr_str("KeyManager") == Some("AWS"),
        }
    }
}

impl std::fmt::Display for ManagedPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagedPredicate::IamServiceLinked => write!(f, "iam_service_linked"),
            ManagedPredicate::DefaultVpc => write!(f, "default_vpc"),
            ManagedPredicate::ReverseDnsZone => write!(f, "reverse_dns_zone"),
            ManagedPredicate::AwsManagedKey => write!(f, "aws_managed_key"),
        }
    }
}

/// Why a candidate was flagged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedMatch {
    ServicePattern(String),
    GlobalPattern(String),
    Predicate(ManagedPredicate),
}

impl std::fmt::Display for ManagedMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagedMatch::ServicePattern(p) => write!(f, "service pattern {}", p),
            ManagedMatch::GlobalPattern(p) => write!(f, "global pattern {}", p),
            ManagedMatch::Predicate(p) => write!(f, "predicate {}", p),
        }
    }
}

/// Short-circuit predicate pipeline: service regexes, global regexes, then
/// the service's custom predicate
#[derive(Debug, Clone)]
pub struct ManagedFilter {
    global_patterns: Vec<Regex>,
}

impl ManagedFilter {
    pub fn new(global_patterns: Vec<Regex>) -> Self {
        Self { global_patterns }
    }

    pub fn from_registry(registry: &ServiceRegistry) -> Self {
        Self::new(registry.global_managed_patterns().to_vec())
    }

    pub fn is_managed(&self, candidate: &CanonicalResource, pattern: &ServicePattern) -> bool {
        self.check(candidate, pattern).is_some()
    }

    /// First rule that flags the candidate, if any
    pub fn check(
        &self,
        candidate: &CanonicalResource,
        pattern: &ServicePattern,
    ) -> Option<ManagedMatch> {
        if !pattern.filter_managed {
            return None;
        }

        let id = candidate.resource_id.as_str();

        if let Some(re) = pattern.managed_patterns.iter().find(|re| re.is_match(id)) {
            return Some(ManagedMatch::ServicePattern(re.as_str().to_string()));
        }

        if let Some(re) = self.global_patterns.iter().find(|re| re.is_match(id)) {
            return Some(ManagedMatch::GlobalPattern(re.as_str().to_string()));
        }

        pattern
            .managed_predicate
            .filter(|predicate| predicate.matches(candidate))
            .map(ManagedMatch::Predicate)
    }
}
