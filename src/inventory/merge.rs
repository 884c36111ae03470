//! Deduplicator / Merger
//!
//! Groups candidates by [`DedupKey`] and folds each group into one record.
//! The group's highest-confidence member is the base; gaps are filled from
//! the others in descending confidence order, tags are unioned, and the
//! result is rescored. Input order never affects the output.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::confidence::ConfidenceScorer;
use super::extractor::UNRESOLVED_DIAGNOSTIC;
use super::registry::ServiceRegistry;
use super::types::{CanonicalResource, DedupKey, GLOBAL_REGION};

/// Diagnostic attached to unresolved records that pass through unmerged
pub const LOW_CONFIDENCE_DIAGNOSTIC: &str = "low confidence: unresolved identifier";

pub struct ResourceMerger {
    registry: Arc<ServiceRegistry>,
    scorer: ConfidenceScorer,
}

impl ResourceMerger {
    pub fn new(registry: Arc<ServiceRegistry>, scorer: ConfidenceScorer) -> Self {
        Self { registry, scorer }
    }

    /// Merge candidates into the final record set.
    ///
    /// Output is sorted by dedup key, followed by the unresolved records.
    /// Running it on its own output is a no-op.
    pub fn merge(&self, candidates: Vec<CanonicalResource>) -> Vec<CanonicalResource> {
        let total = candidates.len();
        let mut groups: BTreeMap<DedupKey, Vec<CanonicalResource>> = BTreeMap::new();
        let mut unresolved = Vec::new();

        for candidate in candidates {
            match candidate.dedup_key() {
                Some(key) => groups.entry(key).or_default().push(candidate),
                None => unresolved.push(candidate),
            }
        }

        let mut merged: Vec<CanonicalResource> = Vec::with_capacity(groups.len() + unresolved.len());
        for (key, mut group) in groups {
            if group.len() == 1 {
                merged.append(&mut group);
                continue;
            }

            debug!(key = %key, members = group.len(), "Merging duplicate observations");
            group.sort_by_cached_key(|r| std::cmp::Reverse(SortKey::of(r)));
            let rest = group.split_off(1);
            merged.extend(group.pop().map(|best| self.fold(best, rest)));
        }

        if !unresolved.is_empty() {
            warn!(count = unresolved.len(), "Passing through records without an identifier");
        }
        for record in unresolved.iter_mut() {
            record
                .diagnostic
                .get_or_insert_with(|| LOW_CONFIDENCE_DIAGNOSTIC.to_string());
        }
        unresolved.sort_by_cached_key(canonical_json);
        merged.extend(unresolved);

        debug!(candidates = total, records = merged.len(), "Merge complete");
        merged
    }

    /// Fold `rest` (descending confidence) into `best`
    fn fold(&self, mut result: CanonicalResource, rest: Vec<CanonicalResource>) -> CanonicalResource {
        for other in &rest {
            fill_gaps(&mut result, other);
        }

        // Lowest confidence first so the strongest member has the last word
        let mut tags = BTreeMap::new();
        for member in rest.iter().rev() {
            tags.extend(member.tags.clone());
        }
        tags.extend(std::mem::take(&mut result.tags));
        result.tags = tags;

        if result.has_identifier() && result.diagnostic.as_deref() == Some(UNRESOLVED_DIAGNOSTIC) {
            result.diagnostic = None;
        }

        let pattern = self.registry.lookup(&result.service_name);
        self.scorer.apply(&mut result, &pattern);
        result
    }
}

/// Copy into `result` whatever it lacks and `other` has
fn fill_gaps(result: &mut CanonicalResource, other: &CanonicalResource) {
    if !result.has_identifier() && other.has_identifier() {
        result.resource_id = other.resource_id.clone();
        result.id_strategy = other.id_strategy;
    }
    if result.arn().is_none() {
        if let Some(arn) = other.arn() {
            result.resource_arn = Some(arn.to_string());
        }
    }
    if result.resource_name.is_empty() && !other.resource_name.is_empty() {
        result.resource_name = other.resource_name.clone();
    }
    let vague = |region: &str| region.is_empty() || region == GLOBAL_REGION;
    if vague(&result.region) && !vague(&other.region) {
        result.region = other.region.clone();
    }
    if result.resource_type.is_empty() {
        result.resource_type = other.resource_type.clone();
    }

    for (key, value) in &other.raw_attributes {
        if value.is_null() {
            continue;
        }
        let slot = result
            .raw_attributes
            .entry(key.clone())
            .or_insert(serde_json::Value::Null);
        if slot.is_null() {
            *slot = value.clone();
        }
    }
}

/// Confidence first, serialized form as the tie-break
#[derive(PartialEq)]
struct SortKey {
    score: f64,
    json: String,
}

impl SortKey {
    fn of(resource: &CanonicalResource) -> Self {
        Self {
            score: resource.confidence_score(),
            // Lower JSON sorts first among equal scores
            json: canonical_json(resource),
        }
    }
}

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.json.cmp(&self.json))
    }
}

fn canonical_json(resource: &CanonicalResource) -> String {
    serde_json::to_string(resource).unwrap_or_default()
}
