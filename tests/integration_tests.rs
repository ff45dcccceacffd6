use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use aws_usage_collector::collector::{MetricDataPage, MetricDataRequest};
use aws_usage_collector::resources::{
    CacheClusterRecord, CacheClusterSource, CacheNodeRecord, Page, TableRecord, TableSource,
};
use aws_usage_collector::{
    list_resources, BoxError, FetchWindow, Inventory, MetricSeries, MetricsSource, ReportWriter,
    ResourceType, RunSummary, Scheduler,
};

struct FakeElastiCache;

#[async_trait]
impl CacheClusterSource for FakeElastiCache {
    async fn list_cache_clusters(&self, marker: Option<String>) -> Result<Page<CacheClusterRecord>, BoxError> {
        let redis = |id: &str| CacheClusterRecord {
            cache_cluster_id: id.to_string(),
            engine: "redis".to_string(),
            cache_node_type: "cache.r6g.large".to_string(),
            preferred_az: Some("us-east-1a".to_string()),
            replication_group_id: Some("sessions".to_string()),
            nodes: vec![],
        };
        match marker.as_deref() {
            None => Ok(Page {
                items: vec![redis("sessions-0001-001"), redis("sessions-0001-002")],
                next: Some("second".to_string()),
            }),
            Some("second") => Ok(Page {
                items: vec![CacheClusterRecord {
                    cache_cluster_id: "memc".to_string(),
                    engine: "memcached".to_string(),
                    cache_node_type: "cache.m5.large".to_string(),
                    preferred_az: None,
                    replication_group_id: None,
                    nodes: vec![CacheNodeRecord {
                        cache_node_id: "0001".to_string(),
                        availability_zone: Some("us-east-1c".to_string()),
                    }],
                }],
                next: None,
            }),
            Some(other) => Err(format!("unexpected marker {}", other).into()),
        }
    }
}

struct FakeDynamoDb;

#[async_trait]
impl TableSource for FakeDynamoDb {
    async fn list_tables(&self, _exclusive_start: Option<String>) -> Result<Page<String>, BoxError> {
        Ok(Page {
            items: vec!["orders".to_string()],
            next: None,
        })
    }

    async fn describe_table(&self, name: &str) -> Result<TableRecord, BoxError> {
        Ok(TableRecord {
            name: name.to_string(),
            item_count: Some(1200),
            billing_mode: Some("PROVISIONED".to_string()),
            ..Default::default()
        })
    }

    async fn describe_ttl(&self, _name: &str) -> Result<String, BoxError> {
        Ok("DISABLED".to_string())
    }
}

/// Returns two pages per query; fails every request for `failing_dimension`.
struct FakeCloudWatch {
    failing_dimension: Option<String>,
    calls: AtomicUsize,
}

#[async_trait]
impl MetricsSource for FakeCloudWatch {
    async fn get_metric_data(&self, request: &MetricDataRequest) -> Result<MetricDataPage, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = &request.dimensions[0].value;
        if self.failing_dimension.as_ref() == Some(key) {
            return Err("Throttling: Rate exceeded".into());
        }
        let first_page = request.next_token.is_none();
        let results = request
            .queries
            .iter()
            .map(|q| MetricSeries {
                name: q.id.clone(),
                values: if first_page { vec![1.0, 2.0] } else { vec![3.0] },
            })
            .collect();
        Ok(MetricDataPage {
            results,
            next_token: first_page.then(|| "page-2".to_string()),
        })
    }
}

fn allowed_names(resource_type: ResourceType) -> HashSet<String> {
    let probe = match resource_type {
        ResourceType::DynamoGsi => aws_usage_collector::ResourceSummary::new("t/i", resource_type),
        _ => aws_usage_collector::ResourceSummary::new("probe", resource_type),
    };
    probe
        .descriptor
        .target_spec(&probe)
        .metric_names()
        .map(|n| n.to_lowercase())
        .collect()
}

#[tokio::test]
async fn test_end_to_end_report() {
    let caches = FakeElastiCache;
    let tables = FakeDynamoDb;
    let inventory = Inventory {
        caches: Some(&caches),
        tables: Some(&tables),
    };

    let resources = list_resources(&inventory).await.unwrap();
    assert_eq!(resources.len(), 4);

    let source = Arc::new(FakeCloudWatch {
        failing_dimension: None,
        calls: AtomicUsize::new(0),
    });
    let outcome = Scheduler::new(source.clone(), FetchWindow::trailing(Utc::now()))
        .run(resources)
        .await;
    assert!(outcome.failed.is_empty());
    // 3 cache nodes x 3 groups + 1 table x 1 group, two pages each
    assert_eq!(source.calls.load(Ordering::SeqCst), (3 * 3 + 1) * 2);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.csv");
    ReportWriter::new(&path).write(&outcome.resources).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 4);

    let types: Vec<&str> = rows.iter().map(|r| r.get(1).unwrap()).collect();
    assert_eq!(
        types,
        vec![
            "AWS::DynamoDB::Table",
            "AWS::Elasticache::RedisNode",
            "AWS::Elasticache::RedisNode",
            "AWS::Elasticache::MemcachedNode",
        ]
    );

    let type_by_tag: HashMap<&str, ResourceType> =
        ResourceType::ALL.iter().map(|t| (t.as_str(), *t)).collect();
    for row in &rows {
        let resource_type = type_by_tag[row.get(1).unwrap()];
        let allowed = allowed_names(resource_type);
        let metrics: serde_json::Value = serde_json::from_str(row.get(3).unwrap()).unwrap();
        let entries = metrics.as_array().unwrap();
        assert!(!entries.is_empty());
        for entry in entries {
            let name = entry["name"].as_str().unwrap();
            assert!(allowed.contains(name), "{} not requested for {}", name, resource_type);
            assert_eq!(entry["values"], serde_json::json!([1.0, 2.0, 3.0]));
        }
    }

    let table_data: serde_json::Value = serde_json::from_str(rows[0].get(2).unwrap()).unwrap();
    assert_eq!(table_data["ttl_enabled"], "false");
    let redis_data: serde_json::Value = serde_json::from_str(rows[1].get(2).unwrap()).unwrap();
    assert_eq!(redis_data["cluster_mode_enabled"], "true");
    assert_eq!(redis_data["cluster_id"], "sessions");
}

#[tokio::test]
async fn test_failed_resource_still_reported() {
    let caches = FakeElastiCache;
    let inventory = Inventory {
        caches: Some(&caches),
        tables: None,
    };
    let resources = list_resources(&inventory).await.unwrap();

    let source = Arc::new(FakeCloudWatch {
        failing_dimension: Some("sessions-0001-002".to_string()),
        calls: AtomicUsize::new(0),
    });
    let outcome = Scheduler::new(source, FetchWindow::trailing(Utc::now()))
        .with_max_concurrency(2)
        .run(resources)
        .await;

    assert_eq!(outcome.failed, vec!["sessions-0001-002".to_string()]);
    let summary = RunSummary::from_outcome(&outcome);
    assert_eq!(summary.total_resources(), 3);
    assert_eq!(summary.count(ResourceType::RedisNode), 2);
    assert!(summary.has_failures());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.csv");
    ReportWriter::new(&path).write(&outcome.resources).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    let ids: Vec<&str> = rows.iter().map(|r| r.get(0).unwrap()).collect();
    assert_eq!(ids, vec!["sessions-0001-001", "sessions-0001-002", "0001"]);
    assert_eq!(rows[1].get(3), Some("[]"));
    assert_ne!(rows[0].get(3), Some("[]"));
}

#[test]
fn test_redis_dimension_rule_holds_for_every_node() {
    for id in ["a-001", "a-0001-001", "standalone", "b-0003-002"] {
        let node = aws_usage_collector::ResourceSummary::new(id, ResourceType::RedisNode)
            .with_data("cluster_id", "a");
        let spec = node.descriptor.target_spec(&node);
        assert_eq!(spec.dimension("CacheClusterId"), Some(id));
        assert_eq!(spec.dimension("CacheNodeId"), Some("0001"));
    }
}
