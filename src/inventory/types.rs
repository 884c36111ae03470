//! Canonical Resource Types
//!
//! The normalized record every discovery path produces, and the keys used
//! to deduplicate it.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Region sentinel for account-wide services
pub const GLOBAL_REGION: &str = "global";

/// Identifier placeholder when extraction could not resolve one
pub const UNKNOWN_ID: &str = "unknown";

/// Which extraction strategy resolved a candidate's identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierStrategy {
    /// An ARN-shaped top-level field
    Arn,
    /// A value matching one of the pattern's identifier shapes
    Shape,
    /// Last resort: first scalar key ending in Id/Name/Arn
    Heuristic,
    /// Nothing usable; the id is [`UNKNOWN_ID`]
    Unresolved,
}

impl std::fmt::Display for IdentifierStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentifierStrategy::Arn => write!(f, "arn"),
            IdentifierStrategy::Shape => write!(f, "shape"),
            IdentifierStrategy::Heuristic => write!(f, "heuristic"),
            IdentifierStrategy::Unresolved => write!(f, "unresolved"),
        }
    }
}

/// One discovered cloud resource
///
/// The confidence score is private: it only changes through
/// [`ConfidenceScorer::apply`](super::ConfidenceScorer::apply), which scores
/// the record's current fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalResource {
    /// Owning service (e.g., "ec2", "s3")
    pub service_name: String,
    /// Resource type within the service (e.g., "Instance", "Bucket")
    pub resource_type: String,
    /// Best-effort identifier, unique within (service, region)
    pub resource_id: String,
    /// Fully-qualified global identifier, preferred dedup key
    pub resource_arn: Option<String>,
    /// Human label; empty when no name field matched
    pub resource_name: String,
    /// Region code or [`GLOBAL_REGION`]
    pub region: String,
    /// Normalized tags
    pub tags: BTreeMap<String, String>,
    /// Fields not consumed by identity, name or tag extraction
    pub raw_attributes: BTreeMap<String, Value>,
    confidence_score: f64,
    /// Query operation that produced this observation
    pub discovery_operation: String,
    /// Strategy that resolved `resource_id`
    pub id_strategy: IdentifierStrategy,
    /// Set when extraction degraded (unresolved id, malformed item)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl CanonicalResource {
    /// Create an empty candidate for a service/type observed by `operation`
    pub fn new(
        service_name: impl Into<String>,
        resource_type: impl Into<String>,
        region: impl Into<String>,
        discovery_operation: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            resource_type: resource_type.into(),
            resource_id: UNKNOWN_ID.to_string(),
            resource_arn: None,
            resource_name: String::new(),
            region: region.into(),
            tags: BTreeMap::new(),
            raw_attributes: BTreeMap::new(),
            confidence_score: 0.0,
            discovery_operation: discovery_operation.into(),
            id_strategy: IdentifierStrategy::Unresolved,
            diagnostic: None,
        }
    }

    pub fn confidence_score(&self) -> f64 {
        self.confidence_score
    }

    pub(crate) fn set_confidence_score(&mut self, score: f64) {
        self.confidence_score = score.clamp(0.0, 1.0);
    }

    /// ARN if present and non-empty
    pub fn arn(&self) -> Option<&str> {
        self.resource_arn.as_deref().filter(|a| !a.is_empty())
    }

    pub fn has_identifier(&self) -> bool {
        !self.resource_id.is_empty() && self.resource_id != UNKNOWN_ID
    }

    /// No id and no ARN: cannot be merged reliably
    pub fn is_unresolved(&self) -> bool {
        !self.has_identifier() && self.arn().is_none()
    }

    /// Dedup key, or `None` for unresolved candidates
    pub fn dedup_key(&self) -> Option<DedupKey> {
        if let Some(arn) = self.arn() {
            return Some(DedupKey::Arn(arn.to_string()));
        }
        if !self.has_identifier() {
            return None;
        }
        Some(DedupKey::Composite {
            service_name: self.service_name.clone(),
            resource_type: self.resource_type.clone(),
            region: self.region.clone(),
            resource_id: self.resource_id.clone(),
        })
    }
}

/// Identity used to group duplicate observations
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DedupKey {
    Arn(String),
    Composite {
        service_name: String,
        resource_type: String,
        region: String,
        resource_id: String,
    },
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DedupKey::Arn(arn) => write!(f, "{}", arn),
            DedupKey::Composite {
                service_name,
                resource_type,
                region,
                resource_id,
            } => write!(
                f,
                "{}/{}/{}/{}",
                service_name, resource_type, region, resource_id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_candidate_is_unresolved() {
        let r = CanonicalResource::new("ec2", "Instance", "us-east-1", "describe_instances");

        assert_eq!(r.resource_id, UNKNOWN_ID);
        assert!(r.is_unresolved());
        assert!(r.dedup_key().is_none());
        assert_eq!(r.confidence_score(), 0.0);
    }

    #[test]
    fn test_dedup_key_prefers_arn() {
        let mut r = CanonicalResource::new("s3", "Bucket", "global", "list_buckets");
        r.resource_id = "logs".to_string();
        assert!(matches!(r.dedup_key(), Some(DedupKey::Composite { .. })));

        r.resource_arn = Some("arn:aws:s3:::logs".to_string());
        assert_eq!(
            r.dedup_key(),
            Some(DedupKey::Arn("arn:aws:s3:::logs".to_string()))
        );
    }

    #[test]
    fn test_empty_arn_is_ignored() {
        let mut r = CanonicalResource::new("ec2", "Vpc", "eu-west-1", "describe_vpcs");
        r.resource_arn = Some(String::new());
        assert!(r.arn().is_none());
        assert!(r.is_unresolved());
    }

    #[test]
    fn test_confidence_is_clamped() {
        let mut r = CanonicalResource::new("ec2", "Instance", "us-east-1", "describe_instances");
        r.set_confidence_score(1.7);
        assert_eq!(r.confidence_score(), 1.0);
        r.set_confidence_score(-0.2);
        assert_eq!(r.confidence_score(), 0.0);
    }
}
