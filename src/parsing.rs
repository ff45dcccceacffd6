/// Whether a redis cache cluster id belongs to a cluster-mode replication group.
///
/// Cluster-mode node ids carry a `<shard>-<node>` suffix after the replication
/// group id (`foo-0001-002`) while non-cluster-mode ids only carry the node
/// part (`foo-002`). The describe API exposes nothing better to go on.
pub fn detect_cluster_mode(cache_cluster_id: &str, replication_group_id: Option<&str>) -> bool {
    let Some(group) = replication_group_id else {
        return false;
    };
    let prefix = format!("{}-", group);
    let suffix = cache_cluster_id
        .strip_prefix(prefix.as_str())
        .unwrap_or(cache_cluster_id);
    suffix.split('-').count() == 2
}

/// Correlation id used for a metric in GetMetricData requests and results.
pub fn metric_query_id(metric_name: &str) -> String {
    metric_name.to_lowercase()
}

pub fn parse_bool_flag(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "True")
}
