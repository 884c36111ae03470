//! Confidence Scorer
//!
//! Weighted presence checks over a canonical resource's fields. The score is
//! the satisfied weight over the total weight, so it always lands in [0, 1].

use super::registry::ServicePattern;
use super::types::CanonicalResource;

/// Records scoring at or above this are "high" confidence
pub const HIGH_CONFIDENCE: f64 = 0.7;

/// Records scoring below this are "low" confidence
pub const LOW_CONFIDENCE: f64 = 0.4;

/// One scored presence check
#[derive(Debug, Clone, Copy)]
pub struct Feature {
    pub name: &'static str,
    pub weight: f64,
    check: fn(&CanonicalResource, &ServicePattern) -> bool,
}

impl Feature {
    pub fn is_present(&self, resource: &CanonicalResource, pattern: &ServicePattern) -> bool {
        (self.check)(resource, pattern)
    }
}

const FEATURES: &[Feature] = &[
    Feature {
        name: "identifier",
        weight: 2.5,
        check: |r, _| r.has_identifier(),
    },
    Feature {
        name: "name",
        weight: 2.0,
        check: |r, _| !r.resource_name.is_empty(),
    },
    Feature {
        name: "arn",
        weight: 1.5,
        check: |r, _| r.arn().is_some(),
    },
    Feature {
        name: "declared_type",
        weight: 1.0,
        check: |r, p| p.declares_type(&r.resource_type),
    },
    Feature {
        name: "tags",
        weight: 1.0,
        check: |r, _| !r.tags.is_empty(),
    },
    Feature {
        name: "status",
        weight: 0.5,
        check: |r, _| has_attribute(r, &["state", "status"]),
    },
    Feature {
        name: "created",
        weight: 0.5,
        check: |r, _| has_attribute(r, &["creat", "launchtime"]),
    },
    Feature {
        name: "vpc",
        weight: 0.5,
        check: |r, _| has_attribute(r, &["vpc"]),
    },
    Feature {
        name: "security_groups",
        weight: 0.5,
        check: |r, _| has_attribute(r, &["securitygroup"]),
    },
    Feature {
        name: "account",
        weight: 0.5,
        check: |r, _| has_attribute(r, &["ownerid", "accountid", "account"]),
    },
];

/// Any non-null attribute whose lowercased key contains one of `needles`
fn has_attribute(resource: &CanonicalResource, needles: &[&str]) -> bool {
    resource.raw_attributes.iter().any(|(key, value)| {
        if value.is_null() {
            return false;
        }
        let key = key.to_ascii_lowercase();
        needles.iter().any(|n| key.contains(n))
    })
}

/// Deterministic weighted-sum scorer
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer;

impl ConfidenceScorer {
    pub fn features(&self) -> &'static [Feature] {
        FEATURES
    }

    pub fn score(&self, resource: &CanonicalResource, pattern: &ServicePattern) -> f64 {
        let total: f64 = FEATURES.iter().map(|f| f.weight).sum();
        let satisfied: f64 = FEATURES
            .iter()
            .filter(|f| f.is_present(resource, pattern))
            .map(|f| f.weight)
            .sum();

        (satisfied / total).clamp(0.0, 1.0)
    }

    /// Recompute and store the score from the resource's current fields
    pub fn apply(&self, resource: &mut CanonicalResource, pattern: &ServicePattern) {
        let score = self.score(resource, pattern);
        resource.set_confidence_score(score);
    }
}

/// Confidence band used by the run summary histogram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn of(score: f64) -> Self {
        if score >= HIGH_CONFIDENCE {
            ConfidenceBand::High
        } else if score >= LOW_CONFIDENCE {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}
