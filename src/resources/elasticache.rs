use std::collections::BTreeMap;

use tracing::debug;

use super::{CacheClusterRecord, CacheClusterSource};
use crate::error::DiscoveryError;
use crate::parsing::detect_cluster_mode;
use crate::types::{Dimension, MetricTargetSpec, ResourceSummary, ResourceType, Statistic};

pub const NAMESPACE: &str = "AWS/ElastiCache";

/// CloudWatch publishes every redis node under node id 0001, whatever the
/// node's real position in its shard.
pub const REDIS_CACHE_NODE_ID: &str = "0001";

const SUM_METRICS: &[&str] = &[
    "NetworkBytesIn",
    "NetworkBytesOut",
    "GeoSpatialBasedCmds",
    "EvalBasedCmds",
    "GetTypeCmds",
    "HashBasedCmds",
    "JsonBasedCmds",
    "KeyBasedCmds",
    "ListBasedCmds",
    "SetBasedCmds",
    "SetTypeCmds",
    "StringBasedCmds",
    "PubSubBasedCmds",
    "SortedSetBasedCmds",
    "StreamBasedCmds",
];

const AVERAGE_METRICS: &[&str] = &["DB0AverageTTL"];

const MAXIMUM_METRICS: &[&str] = &[
    "CurrConnections",
    "NewConnections",
    "EngineCPUUtilization",
    "CPUUtilization",
    "FreeableMemory",
    "BytesUsedForCache",
    "DatabaseMemoryUsagePercentage",
    "CurrItems",
    "KeysTracked",
    "Evictions",
    "CacheHitRate",
];

pub fn metric_targets() -> BTreeMap<Statistic, Vec<&'static str>> {
    BTreeMap::from([
        (Statistic::Sum, SUM_METRICS.to_vec()),
        (Statistic::Average, AVERAGE_METRICS.to_vec()),
        (Statistic::Maximum, MAXIMUM_METRICS.to_vec()),
    ])
}

pub fn target_spec(resource: &ResourceSummary) -> MetricTargetSpec {
    let (cluster_id, node_id) = match resource.resource_type {
        // The node's own id is the cluster id CloudWatch expects for redis
        ResourceType::RedisNode => (resource.id.as_str(), REDIS_CACHE_NODE_ID),
        _ => (
            resource.data("cluster_id").unwrap_or(resource.id.as_str()),
            resource.id.as_str(),
        ),
    };

    MetricTargetSpec {
        namespace: NAMESPACE,
        dimensions: vec![
            Dimension::new("CacheClusterId", cluster_id),
            Dimension::new("CacheNodeId", node_id),
        ],
        targets: metric_targets(),
    }
}

pub async fn discover(source: &dyn CacheClusterSource) -> Result<Vec<ResourceSummary>, DiscoveryError> {
    let mut resources = Vec::new();
    let mut marker: Option<String> = None;

    loop {
        let page = source
            .list_cache_clusters(marker.take())
            .await
            .map_err(|source| DiscoveryError::List {
                what: "cache clusters",
                source,
            })?;

        for cluster in &page.items {
            resources.extend(summarize_cluster(cluster));
        }

        match page.next {
            Some(next) => marker = Some(next),
            None => break,
        }
    }

    Ok(resources)
}

/// Redis reports one cluster per node; memcached lists its nodes inside the cluster.
pub fn summarize_cluster(cluster: &CacheClusterRecord) -> Vec<ResourceSummary> {
    match cluster.engine.as_str() {
        "redis" => vec![summarize_redis_node(cluster)],
        "memcached" => cluster
            .nodes
            .iter()
            .map(|node| {
                ResourceSummary::new(node.cache_node_id.as_str(), ResourceType::MemcachedNode)
                    .with_data("cluster_id", cluster.cache_cluster_id.as_str())
                    .with_data("engine", cluster.engine.as_str())
                    .with_data("cache_node_type", cluster.cache_node_type.as_str())
                    .with_data("preferred_az", node.availability_zone.clone().unwrap_or_default())
                    .with_data("cluster_mode_enabled", "false")
            })
            .collect(),
        other => {
            debug!("skipping cache cluster {} with engine {}", cluster.cache_cluster_id, other);
            Vec::new()
        }
    }
}

fn summarize_redis_node(cluster: &CacheClusterRecord) -> ResourceSummary {
    let group = cluster.replication_group_id.as_deref();
    let cluster_mode = detect_cluster_mode(&cluster.cache_cluster_id, group);
    // ReplicationGroupId is not set consistently for non-replicated clusters
    let cluster_id = group.unwrap_or(cluster.cache_cluster_id.as_str());

    let mut summary = ResourceSummary::new(cluster.cache_cluster_id.as_str(), ResourceType::RedisNode)
        .with_data("cluster_id", cluster_id)
        .with_data("engine", cluster.engine.as_str())
        .with_data("cache_node_type", cluster.cache_node_type.as_str())
        .with_data("preferred_az", cluster.preferred_az.clone().unwrap_or_default())
        .with_data("cluster_mode_enabled", cluster_mode.to_string());
    if let Some(group) = group {
        summary = summary.with_data("replication_group_id", group);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::mock::MockCacheSource;
    use crate::resources::{CacheNodeRecord, Page};

    fn redis_cluster(id: &str, group: Option<&str>) -> CacheClusterRecord {
        CacheClusterRecord {
            cache_cluster_id: id.to_string(),
            engine: "redis".to_string(),
            cache_node_type: "cache.r6g.large".to_string(),
            preferred_az: Some("us-east-1a".to_string()),
            replication_group_id: group.map(|g| g.to_string()),
            nodes: vec![CacheNodeRecord {
                cache_node_id: "0001".to_string(),
                availability_zone: Some("us-east-1a".to_string()),
            }],
        }
    }

    fn memcached_cluster(id: &str, nodes: &[&str]) -> CacheClusterRecord {
        CacheClusterRecord {
            cache_cluster_id: id.to_string(),
            engine: "memcached".to_string(),
            cache_node_type: "cache.m5.large".to_string(),
            preferred_az: None,
            replication_group_id: None,
            nodes: nodes
                .iter()
                .map(|n| CacheNodeRecord {
                    cache_node_id: n.to_string(),
                    availability_zone: Some("us-east-1b".to_string()),
                })
                .collect(),
        }
    }

    #[test]
    fn test_redis_dimensions_use_node_id_and_fixed_node() {
        let node = summarize_cluster(&redis_cluster("sessions-0001-002", Some("sessions"))).remove(0);
        let spec = target_spec(&node);

        assert_eq!(spec.namespace, "AWS/ElastiCache");
        assert_eq!(
            spec.dimensions,
            vec![
                Dimension::new("CacheClusterId", "sessions-0001-002"),
                Dimension::new("CacheNodeId", "0001"),
            ]
        );
        assert_ne!(spec.dimension("CacheClusterId"), node.data("cluster_id"));
    }

    #[test]
    fn test_memcached_dimensions_use_cluster_and_node() {
        let nodes = summarize_cluster(&memcached_cluster("memc", &["0001", "0002"]));
        assert_eq!(nodes.len(), 2);

        let spec = target_spec(&nodes[1]);
        assert_eq!(
            spec.dimensions,
            vec![
                Dimension::new("CacheClusterId", "memc"),
                Dimension::new("CacheNodeId", "0002"),
            ]
        );
    }

    #[test]
    fn test_cache_metric_groups() {
        let targets = metric_targets();
        assert_eq!(targets.len(), 3);
        assert!(targets[&Statistic::Sum].contains(&"NetworkBytesIn"));
        assert_eq!(targets[&Statistic::Average], vec!["DB0AverageTTL"]);
        assert!(targets[&Statistic::Maximum].contains(&"CacheHitRate"));
        assert!(targets[&Statistic::Maximum].contains(&"EngineCPUUtilization"));
    }

    #[test]
    fn test_redis_summary_data() {
        let clustered = summarize_cluster(&redis_cluster("foo-001-002", Some("foo"))).remove(0);
        assert_eq!(clustered.id, "foo-001-002");
        assert_eq!(clustered.data("cluster_id"), Some("foo"));
        assert_eq!(clustered.data("cluster_mode_enabled"), Some("true"));
        assert_eq!(clustered.data("replication_group_id"), Some("foo"));

        let replicated = summarize_cluster(&redis_cluster("foo-001", Some("foo"))).remove(0);
        assert_eq!(replicated.data("cluster_mode_enabled"), Some("false"));

        let standalone = summarize_cluster(&redis_cluster("solo", None)).remove(0);
        assert_eq!(standalone.data("cluster_id"), Some("solo"));
        assert_eq!(standalone.data("cluster_mode_enabled"), Some("false"));
        assert_eq!(standalone.data("replication_group_id"), None);
    }

    #[test]
    fn test_unknown_engine_is_skipped() {
        let mut cluster = redis_cluster("valkey-001", None);
        cluster.engine = "valkey-unknown".to_string();
        assert!(summarize_cluster(&cluster).is_empty());
    }

    #[test]
    fn test_target_spec_is_deterministic() {
        let node = summarize_cluster(&redis_cluster("foo-001", Some("foo"))).remove(0);
        assert_eq!(target_spec(&node), target_spec(&node.clone()));
    }

    #[tokio::test]
    async fn test_discover_follows_markers() {
        let source = MockCacheSource {
            pages: vec![
                Page {
                    items: vec![redis_cluster("a-001", Some("a"))],
                    next: Some("page-1".to_string()),
                },
                Page {
                    items: vec![memcached_cluster("memc", &["0001", "0002"])],
                    next: Some("page-2".to_string()),
                },
                Page {
                    items: vec![redis_cluster("b-001-001", Some("b"))],
                    next: None,
                },
            ],
            ..Default::default()
        };

        let resources = discover(&source).await.unwrap();
        let ids: Vec<&str> = resources.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a-001", "0001", "0002", "b-001-001"]);
        assert_eq!(
            *source.markers_seen.lock().unwrap(),
            vec![None, Some("page-1".to_string()), Some("page-2".to_string())]
        );
    }
}
