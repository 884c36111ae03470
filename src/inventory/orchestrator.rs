//! Discovery Orchestrator
//!
//! Runs one task per service on a bounded worker pool. Each task picks its
//! operations, calls them under a per-operation timeout, and pushes its
//! candidates into a shared append-only sink when it finishes. A failing or
//! slow service never aborts its siblings.

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::client::{ClientProvider, ServiceClient};
use super::confidence::ConfidenceScorer;
use super::extractor::{location_region, FieldExtractor};
use super::managed::ManagedFilter;
use super::merge::ResourceMerger;
use super::path::{collect_items, lookup};
use super::registry::{split_operation, ServicePattern, ServiceRegistry};
use super::summary::{RunSummary, TaskReport, TaskState};
use super::types::{CanonicalResource, GLOBAL_REGION};
use crate::config::DiscoveryConfig;

/// Generic selection bounds: (verb, max operations)
const GENERIC_SELECTION: &[(&str, usize)] = &[("list", 2), ("describe", 2), ("get", 1)];

/// Batch deadline used when the configured timeout overflows the clock
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Operation-name suffixes that never enumerate resources
const NON_DISCOVERY_SUFFIXES: &[&str] = &[
    "policy", "policies", "version", "versions", "status", "statuses", "health", "metrics",
    "metric",
];

/// Final output of [`DiscoveryOrchestrator::discover_all`]
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryRun {
    pub resources: Vec<CanonicalResource>,
    pub summary: RunSummary,
}

/// Append-only, concurrency-safe candidate collector
///
/// Each task appends its whole batch in one call, so an aborted task
/// contributes nothing.
#[derive(Debug, Clone, Default)]
pub struct ResultSink {
    inner: Arc<Mutex<Vec<CanonicalResource>>>,
}

impl ResultSink {
    pub fn append(&self, batch: Vec<CanonicalResource>) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.extend(batch);
    }

    pub fn take(&self) -> Vec<CanonicalResource> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *guard)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether an operation name can enumerate resources at all
pub fn is_discovery_operation(operation: &str) -> bool {
    let lower = operation.to_ascii_lowercase();
    !NON_DISCOVERY_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// Operations a task should call for this service.
///
/// Declared operations are used as-is (minus any the client does not
/// advertise). Otherwise up to two list, two describe and one get
/// operation are picked from the client's advertised names, in either
/// snake_case or CamelCase.
pub fn select_operations(pattern: &ServicePattern, available: &[String]) -> Vec<String> {
    if !pattern.preferred_operations.is_empty() {
        return pattern
            .preferred_operations
            .iter()
            .filter(|op| available.is_empty() || available.contains(op))
            .cloned()
            .collect();
    }

    let mut names: Vec<&String> = available
        .iter()
        .filter(|op| is_discovery_operation(op))
        .collect();
    names.sort();
    names.dedup();

    GENERIC_SELECTION
        .iter()
        .flat_map(|(verb, limit)| {
            names
                .iter()
                .filter(move |op| split_operation(op).map(|(v, _)| v) == Some(*verb))
                .take(*limit)
                .map(|op| op.to_string())
        })
        .collect()
}

/// Per-run pipeline stages shared by every task
struct Pipeline {
    extractor: FieldExtractor,
    filter: ManagedFilter,
    scorer: ConfidenceScorer,
}

/// Everything one task needs; owned so it can move into the spawned future
struct TaskContext {
    service: String,
    pattern: Arc<ServicePattern>,
    provider: Arc<dyn ClientProvider>,
    pipeline: Arc<Pipeline>,
    regions: Vec<String>,
    operation_timeout: Duration,
    sink: ResultSink,
    pool: Arc<Semaphore>,
}

/// Discovery Orchestrator
///
/// Holds no state between runs; every `discover_all` call builds its own
/// sink, pool and task set.
pub struct DiscoveryOrchestrator {
    provider: Arc<dyn ClientProvider>,
    registry: Arc<ServiceRegistry>,
    config: DiscoveryConfig,
    scorer: ConfidenceScorer,
}

impl DiscoveryOrchestrator {
    pub fn new(
        provider: Arc<dyn ClientProvider>,
        registry: Arc<ServiceRegistry>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            config,
            scorer: ConfidenceScorer,
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Discover, filter, merge and score every named service.
    ///
    /// Never fails: failed or timed-out services show up in the summary.
    pub async fn discover_all(&self, service_names: &[String]) -> DiscoveryRun {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();

        let mut reports: BTreeMap<String, TaskReport> = BTreeMap::new();
        for name in service_names {
            reports
                .entry(name.clone())
                .or_insert_with(|| TaskReport::new(name.as_str()));
        }

        info!(
            run_id = %run_id,
            services = reports.len(),
            concurrency = self.config.concurrency,
            "Starting discovery run"
        );

        let sink = ResultSink::default();
        let pool = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let pipeline = Arc::new(Pipeline {
            extractor: FieldExtractor::new(self.scorer),
            filter: ManagedFilter::from_registry(&self.registry),
            scorer: self.scorer,
        });

        let mut tasks = JoinSet::new();
        for service in reports.keys() {
            let pattern = self.registry.lookup(service);
            let regions = if pattern.is_global_service {
                vec![self.config.home_region().to_string()]
            } else {
                self.config.regions.clone()
            };

            let ctx = TaskContext {
                service: service.clone(),
                pattern,
                provider: Arc::clone(&self.provider),
                pipeline: Arc::clone(&pipeline),
                regions,
                operation_timeout: self.config.operation_timeout(),
                sink: sink.clone(),
                pool: Arc::clone(&pool),
            };
            tasks.spawn(run_task(ctx));
        }

        let now = tokio::time::Instant::now();
        let deadline = now
            .checked_add(self.config.batch_timeout())
            .unwrap_or_else(|| now + FAR_FUTURE);
        let mut batch_expired = false;

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok(report))) => {
                    reports.insert(report.service.clone(), report);
                }
                Ok(Some(Err(e))) => {
                    error!(error = %e, "Discovery task panicked");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        remaining = tasks.len(),
                        "Batch timeout reached, abandoning unfinished tasks"
                    );
                    batch_expired = true;
                    tasks.abort_all();
                    break;
                }
            }
        }

        // Collect anything that finished between the deadline and the abort
        if batch_expired {
            while let Some(joined) = tasks.join_next().await {
                if let Ok(report) = joined {
                    reports.insert(report.service.clone(), report);
                }
            }
        }

        for report in reports.values_mut().filter(|r| !r.state.is_terminal()) {
            if batch_expired {
                report.state = TaskState::TimedOut;
                report.error = Some("batch timeout exceeded".to_string());
            } else {
                report.state = TaskState::Failed;
                report.error = Some("task aborted".to_string());
            }
        }

        let candidates = sink.take();
        let candidates_before_merge = candidates.len();

        let merger = ResourceMerger::new(Arc::clone(&self.registry), self.scorer);
        let resources = merger.merge(candidates);

        let summary = RunSummary::build(
            run_id,
            started_at,
            reports.into_values().collect(),
            candidates_before_merge,
            &resources,
        );

        info!(
            run_id = %run_id,
            succeeded = summary.services_succeeded,
            timed_out = summary.services_timed_out,
            failed = summary.services_failed,
            candidates = candidates_before_merge,
            resources = resources.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Discovery run complete"
        );

        DiscoveryRun { resources, summary }
    }
}

async fn run_task(ctx: TaskContext) -> TaskReport {
    let mut report = TaskReport::new(ctx.service.as_str());

    let _permit = match Arc::clone(&ctx.pool).acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => return report.failed(e),
    };

    let started = Instant::now();
    report.state = TaskState::Running;
    debug!(service = %ctx.service, regions = ?ctx.regions, "Task running");

    let mut candidates = Vec::new();
    let no_params = Map::new();

    for region in &ctx.regions {
        let client = match ctx.provider.client(&ctx.service, region).await {
            Ok(client) => client,
            Err(e) => {
                warn!(service = %ctx.service, region = %region, error = %e, "Client unavailable");
                report.elapsed_ms = started.elapsed().as_millis() as u64;
                return report.failed(e);
            }
        };

        let operations = select_operations(&ctx.pattern, &client.operation_names());
        if operations.is_empty() {
            debug!(service = %ctx.service, region = %region, "No discovery operations");
        }

        for operation in &operations {
            report.operations_attempted += 1;

            let call = client.invoke(operation, &no_params);
            let response = match tokio::time::timeout(ctx.operation_timeout, call).await {
                Err(_) => {
                    warn!(
                        service = %ctx.service,
                        region = %region,
                        operation = %operation,
                        timeout_ms = ctx.operation_timeout.as_millis() as u64,
                        "Operation timed out"
                    );
                    report.operations_timed_out += 1;
                    continue;
                }
                Ok(Err(e)) if e.is_skippable() => {
                    debug!(service = %ctx.service, operation = %operation, error = %e, "Operation skipped");
                    report.operations_skipped += 1;
                    continue;
                }
                Ok(Err(e)) => {
                    warn!(
                        service = %ctx.service,
                        region = %region,
                        operation = %operation,
                        error = %e,
                        "Discovery task failed"
                    );
                    report.elapsed_ms = started.elapsed().as_millis() as u64;
                    return report.failed(e);
                }
                Ok(Ok(response)) => response,
            };

            let items = collect_items(&response, ctx.pattern.collection_path(operation));
            report.candidates_extracted += items.len();

            for item in &items {
                let pipeline = &ctx.pipeline;
                let mut candidate = pipeline
                    .extractor
                    .extract(item, &ctx.pattern, region, operation);

                if needs_location(&ctx.pattern, item, &candidate) {
                    resolve_location(&ctx, client.as_ref(), &mut candidate).await;
                }

                if let Some(reason) = pipeline.filter.check(&candidate, &ctx.pattern) {
                    debug!(
                        service = %ctx.service,
                        resource_id = %candidate.resource_id,
                        reason = %reason,
                        "Dropping managed resource"
                    );
                    report.managed_filtered += 1;
                    continue;
                }

                pipeline.scorer.apply(&mut candidate, &ctx.pattern);
                candidates.push(candidate);
            }
        }
    }

    report.candidates_kept = candidates.len();
    report.state = if report.operations_timed_out > 0 {
        TaskState::TimedOut
    } else {
        TaskState::Completed
    };
    report.elapsed_ms = started.elapsed().as_millis() as u64;

    info!(
        service = %ctx.service,
        state = %report.state,
        operations = report.operations_attempted,
        candidates = report.candidates_kept,
        managed = report.managed_filtered,
        "Task finished"
    );

    ctx.sink.append(candidates);
    report
}

/// The secondary location call only runs when the item had no location
fn needs_location(pattern: &ServicePattern, item: &Value, candidate: &CanonicalResource) -> bool {
    match &pattern.location_lookup {
        Some(location) => {
            candidate.region == GLOBAL_REGION
                && candidate.has_identifier()
                && item.get(&location.field).is_none()
        }
        None => false,
    }
}

/// Resolve a resource's true region; failures keep the global sentinel
async fn resolve_location(
    ctx: &TaskContext,
    client: &dyn ServiceClient,
    candidate: &mut CanonicalResource,
) {
    let Some(location) = &ctx.pattern.location_lookup else {
        return;
    };

    let mut params = Map::new();
    params.insert(
        location.param.clone(),
        Value::String(candidate.resource_id.clone()),
    );

    let call = client.invoke(&location.operation, &params);
    match tokio::time::timeout(ctx.operation_timeout, call).await {
        Ok(Ok(response)) => {
            let value = lookup(&response, &location.field).unwrap_or(&Value::Null);
            candidate.region = location_region(value, location);
            debug!(
                service = %ctx.service,
                resource_id = %candidate.resource_id,
                region = %candidate.region,
                "Resolved resource location"
            );
        }
        Ok(Err(e)) => {
            debug!(service = %ctx.service, resource_id = %candidate.resource_id, error = %e, "Location lookup failed");
        }
        Err(_) => {
            debug!(service = %ctx.service, resource_id = %candidate.resource_id, "Location lookup timed out");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{FixtureClientProvider, IdentifierStrategy};

    fn orchestrator(fixture: &str, config: DiscoveryConfig) -> DiscoveryOrchestrator {
        let provider = FixtureClientProvider::from_json(fixture).unwrap();
        let registry = ServiceRegistry::builtin().unwrap();
        DiscoveryOrchestrator::new(Arc::new(provider), Arc::new(registry), config)
    }

    fn services(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn ops(names: &[&str]) -> Vec<String> {
        services(names)
    }

    #[test]
    fn test_generic_operation_selection() {
        let pattern = ServicePattern::generic("widgets");
        let available = ops(&[
            "list_widgets",
            "list_widget_policies",
            "list_gadgets",
            "list_sprockets",
            "describe_widgets",
            "describe_widget_status",
            "get_widget",
            "get_widget_metrics",
            "get_gadget",
            "create_widget",
        ]);

        let selected = select_operations(&pattern, &available);
        assert_eq!(
            selected,
            ops(&["list_gadgets", "list_sprockets", "describe_widgets", "get_gadget"])
        );
    }

    #[test]
    fn test_generic_selection_reads_camel_case_names() {
        let pattern = ServicePattern::generic("storage");
        let available = ops(&[
            "ListBuckets",
            "ListBucketPolicies",
            "ListenerRules",
            "DescribeBucketStatus",
            "DescribeReplicas",
            "GetBucket",
            "PutBucket",
        ]);

        let selected = select_operations(&pattern, &available);
        assert_eq!(selected, ops(&["ListBuckets", "DescribeReplicas", "GetBucket"]));
    }

    #[test]
    fn test_declared_operations_respect_availability() {
        let registry = ServiceRegistry::builtin().unwrap();
        let ec2 = registry.lookup("ec2");

        let selected = select_operations(&ec2, &ops(&["describe_vpcs", "describe_instances"]));
        assert_eq!(selected, ops(&["describe_instances", "describe_vpcs"]));

        let selected = select_operations(&ec2, &[]);
        assert_eq!(selected.len(), ec2.preferred_operations.len());
    }

    #[test]
    fn test_non_discovery_operations() {
        assert!(is_discovery_operation("list_buckets"));
        assert!(!is_discovery_operation("get_bucket_policy"));
        assert!(!is_discovery_operation("list_policy_versions"));
        assert!(!is_discovery_operation("describe_instance_status"));
        assert!(!is_discovery_operation("GetClusterHealth"));
    }

    #[test]
    fn test_result_sink_appends_batches() {
        let sink = ResultSink::default();
        assert!(sink.is_empty());

        let writer = sink.clone();
        writer.append(vec![CanonicalResource::new("ec2", "Vpc", "us-east-1", "describe_vpcs")]);
        writer.append(Vec::new());
        assert_eq!(sink.len(), 1);

        assert_eq!(sink.take().len(), 1);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_end_to_end_discovery() {
        let fixture = r#"{
            "services": {
                "ec2": {
                    "responses": {
                        "describe_instances": {
                            "Reservations": [{
                                "Instances": [{
                                    "InstanceId": "i-abc123",
                                    "State": { "Name": "running" },
                                    "VpcId": "vpc-0aa",
                                    "Tags": [{ "Key": "Name", "Value": "web-1" }]
                                }]
                            }]
                        },
                        "describe_vpcs": {
                            "Vpcs": [
                                { "VpcId": "vpc-0aa", "IsDefault": false, "State": "available" },
                                { "VpcId": "vpc-0bb", "IsDefault": true, "State": "available" }
                            ]
                        }
                    }
                },
                "iam": {
                    "responses": {
                        "list_roles": {
                            "Roles": [
                                {
                                    "Path": "/",
                                    "RoleName": "deploy",
                                    "Arn": "arn:aws:iam::123456789012:role/deploy",
                                    "CreateDate": "2024-01-01T00:00:00Z"
                                },
                                {
                                    "Path": "/aws-service-role/ecs.amazonaws.com/",
                                    "RoleName": "AWSServiceRoleForECS",
                                    "Arn": "arn:aws:iam::123456789012:role/aws-service-role/ecs.amazonaws.com/AWSServiceRoleForECS"
                                }
                            ]
                        }
                    }
                }
            }
        }"#;

        let run = orchestrator(fixture, DiscoveryConfig::default())
            .discover_all(&services(&["ec2", "iam"]))
            .await;

        let ids: Vec<&str> = run.resources.iter().map(|r| r.resource_id.as_str()).collect();
        assert!(ids.contains(&"i-abc123"));
        assert!(ids.contains(&"vpc-0aa"));
        assert!(ids.contains(&"deploy"));
        assert!(!ids.contains(&"vpc-0bb"));
        assert!(!ids.iter().any(|id| id.starts_with("aws-service-role/")));

        let instance = run
            .resources
            .iter()
            .find(|r| r.resource_id == "i-abc123")
            .unwrap();
        assert_eq!(instance.resource_type, "Instance");
        assert_eq!(instance.region, "us-east-1");
        assert_eq!(instance.id_strategy, IdentifierStrategy::Shape);

        let role = run.resources.iter().find(|r| r.resource_id == "deploy").unwrap();
        assert_eq!(role.region, GLOBAL_REGION);

        for r in &run.resources {
            assert!((0.0..=1.0).contains(&r.confidence_score()));
        }

        let summary = &run.summary;
        assert_eq!(summary.services_attempted, 2);
        assert_eq!(summary.services_succeeded, 2);
        assert_eq!(summary.candidates_before_filter, 5);
        assert_eq!(summary.candidates_after_filter, 3);
        assert_eq!(summary.candidates_after_merge, 3);
    }

    #[tokio::test]
    async fn test_timed_out_service_contributes_nothing() {
        let fixture = r#"{
            "services": {
                "sns": {
                    "responses": {
                        "list_topics": {
                            "$delay_ms": 5000,
                            "$body": { "Topics": [{ "TopicArn": "arn:aws:sns:us-east-1:1:alerts" }] }
                        }
                    }
                },
                "lambda": {
                    "responses": {
                        "list_functions": {
                            "Functions": [{
                                "FunctionName": "handler",
                                "FunctionArn": "arn:aws:lambda:us-east-1:1:function:handler"
                            }]
                        }
                    }
                }
            }
        }"#;

        let config = DiscoveryConfig::default().with_operation_timeout(Duration::from_millis(50));
        let run = orchestrator(fixture, config)
            .discover_all(&services(&["sns", "lambda"]))
            .await;

        assert_eq!(run.summary.services_timed_out, 1);
        assert_eq!(run.summary.services_succeeded, 1);
        assert_eq!(run.resources.len(), 1);
        assert_eq!(run.resources[0].service_name, "lambda");

        let sns = run.summary.tasks.iter().find(|t| t.service == "sns").unwrap();
        assert_eq!(sns.state, TaskState::TimedOut);
        assert_eq!(sns.candidates_kept, 0);
    }

    #[tokio::test]
    async fn test_permission_denied_fails_only_that_service() {
        let fixture = r#"{
            "services": {
                "iam": {
                    "responses": {
                        "list_roles": { "Roles": [{ "RoleName": "deploy", "Arn": "arn:aws:iam::1:role/deploy" }] },
                        "list_users": { "$error": "permission_denied" }
                    }
                },
                "dynamodb": {
                    "responses": { "list_tables": { "TableNames": ["orders"] } }
                }
            }
        }"#;

        let run = orchestrator(fixture, DiscoveryConfig::default())
            .discover_all(&services(&["iam", "dynamodb"]))
            .await;

        assert_eq!(run.summary.services_failed, 1);
        assert_eq!(run.summary.services_succeeded, 1);
        assert_eq!(run.resources.len(), 1);
        assert_eq!(run.resources[0].resource_id, "orders");

        let iam = run.summary.tasks.iter().find(|t| t.service == "iam").unwrap();
        assert_eq!(iam.state, TaskState::Failed);
        assert!(iam.error.as_deref().unwrap().contains("Permission denied"));
    }

    #[tokio::test]
    async fn test_total_failure_returns_empty_run() {
        let run = orchestrator(r#"{ "services": {} }"#, DiscoveryConfig::default())
            .discover_all(&services(&["ec2", "s3"]))
            .await;

        assert!(run.resources.is_empty());
        assert_eq!(run.summary.services_attempted, 2);
        assert_eq!(run.summary.services_failed, 2);
        assert_eq!(run.summary.services_succeeded, 0);
    }

    #[tokio::test]
    async fn test_s3_location_lookup() {
        let fixture = r#"{
            "services": {
                "s3": {
                    "operations": ["list_buckets", "get_bucket_location"],
                    "responses": {
                        "list_buckets": { "Buckets": [{ "Name": "logs" }, { "Name": "assets" }] },
                        "get_bucket_location:logs": { "LocationConstraint": "eu-west-1" },
                        "get_bucket_location:assets": { "LocationConstraint": null }
                    }
                }
            }
        }"#;

        let run = orchestrator(fixture, DiscoveryConfig::default())
            .discover_all(&services(&["s3"]))
            .await;

        let region_of = |name: &str| {
            run.resources
                .iter()
                .find(|r| r.resource_name == name)
                .map(|r| r.region.clone())
        };
        assert_eq!(region_of("logs").as_deref(), Some("eu-west-1"));
        assert_eq!(region_of("assets").as_deref(), Some("us-east-1"));
    }

    #[tokio::test]
    async fn test_generic_service_and_skipped_operations() {
        let fixture = r#"{
            "services": {
                "widgets": {
                    "responses": {
                        "list_widgets": { "Widgets": [{ "WidgetId": "w-1", "Status": "ok" }] },
                        "get_widget": { "$error": "invalid_request" },
                        "get_widget_policy": { "Policy": "{}" }
                    }
                }
            }
        }"#;

        let run = orchestrator(fixture, DiscoveryConfig::default())
            .discover_all(&services(&["widgets"]))
            .await;

        let task = &run.summary.tasks[0];
        assert_eq!(task.state, TaskState::Completed);
        assert_eq!(task.operations_attempted, 2);
        assert_eq!(task.operations_skipped, 1);

        assert_eq!(run.resources.len(), 1);
        assert_eq!(run.resources[0].resource_id, "w-1");
        assert_eq!(run.resources[0].resource_type, "Widget");
        assert_eq!(run.resources[0].id_strategy, IdentifierStrategy::Heuristic);
    }

    #[tokio::test]
    async fn test_regional_service_queries_every_region() {
        let fixture = r#"{
            "services": {
                "dynamodb": {
                    "responses": { "list_tables": { "TableNames": ["orders"] } },
                    "regions": {
                        "eu-west-1": { "list_tables": { "TableNames": ["orders", "events"] } }
                    }
                }
            }
        }"#;

        let config = DiscoveryConfig::default()
            .with_regions(vec!["us-east-1".to_string(), "eu-west-1".to_string()]);
        let run = orchestrator(fixture, config)
            .discover_all(&services(&["dynamodb"]))
            .await;

        let mut keys: Vec<(String, String)> = run
            .resources
            .iter()
            .map(|r| (r.region.clone(), r.resource_id.clone()))
            .collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ("eu-west-1".to_string(), "events".to_string()),
                ("eu-west-1".to_string(), "orders".to_string()),
                ("us-east-1".to_string(), "orders".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_batch_timeout_abandons_slow_tasks() {
        let fixture = r#"{
            "services": {
                "sqs": {
                    "responses": { "list_queues": { "$delay_ms": 5000, "$body": { "QueueUrls": [] } } }
                },
                "dynamodb": {
                    "responses": { "list_tables": { "TableNames": ["orders"] } }
                }
            }
        }"#;

        let config = DiscoveryConfig::default().with_batch_timeout(Duration::from_millis(200));
        let run = orchestrator(fixture, config)
            .discover_all(&services(&["sqs", "dynamodb"]))
            .await;

        assert_eq!(run.summary.services_timed_out, 1);
        assert_eq!(run.summary.services_succeeded, 1);
        assert_eq!(run.resources.len(), 1);

        let sqs = run.summary.tasks.iter().find(|t| t.service == "sqs").unwrap();
        assert_eq!(sqs.error.as_deref(), Some("batch timeout exceeded"));
    }
}
