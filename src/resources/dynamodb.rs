use std::collections::BTreeMap;

use super::{IndexRecord, TableRecord, TableSource};
use crate::error::DiscoveryError;
use crate::types::{Dimension, MetricTargetSpec, ResourceSummary, ResourceType, Statistic};

pub const NAMESPACE: &str = "AWS/DynamoDB";

pub const LIST_TABLES_PAGE_SIZE: i32 = 100;

const TABLE_SUM_METRICS: &[&str] = &[
    "ConsumedReadCapacityUnits",
    "ConsumedWriteCapacityUnits",
    "ProvisionedReadCapacityUnits",
    "ProvisionedWriteCapacityUnits",
    "TimeToLiveDeletedItemCount",
];

// TTL deletions are only reported per table
const INDEX_SUM_METRICS: &[&str] = &[
    "ConsumedReadCapacityUnits",
    "ConsumedWriteCapacityUnits",
    "ProvisionedReadCapacityUnits",
    "ProvisionedWriteCapacityUnits",
];

pub fn table_metric_targets() -> BTreeMap<Statistic, Vec<&'static str>> {
    BTreeMap::from([(Statistic::Sum, TABLE_SUM_METRICS.to_vec())])
}

pub fn index_metric_targets() -> BTreeMap<Statistic, Vec<&'static str>> {
    BTreeMap::from([(Statistic::Sum, INDEX_SUM_METRICS.to_vec())])
}

pub fn target_spec(resource: &ResourceSummary) -> MetricTargetSpec {
    match resource.resource_type {
        ResourceType::DynamoGsi => {
            let (fallback_table, fallback_index) = resource
                .id
                .split_once('/')
                .unwrap_or((resource.id.as_str(), resource.id.as_str()));
            MetricTargetSpec {
                namespace: NAMESPACE,
                dimensions: vec![
                    Dimension::new("TableName", resource.data("table_name").unwrap_or(fallback_table)),
                    Dimension::new(
                        "GlobalSecondaryIndexName",
                        resource.data("index_name").unwrap_or(fallback_index),
                    ),
                ],
                targets: index_metric_targets(),
            }
        }
        _ => MetricTargetSpec {
            namespace: NAMESPACE,
            dimensions: vec![Dimension::new("TableName", resource.id.as_str())],
            targets: table_metric_targets(),
        },
    }
}

pub async fn discover(source: &dyn TableSource) -> Result<Vec<ResourceSummary>, DiscoveryError> {
    let names = list_table_names(source).await?;

    let mut resources = Vec::with_capacity(names.len());
    for name in names {
        let table = source
            .describe_table(&name)
            .await
            .map_err(|source| DiscoveryError::DescribeTable {
                table: name.clone(),
                source,
            })?;
        // TODO: DescribeTimeToLive is slow; batch it behind its own concurrency gate
        let ttl_status = source
            .describe_ttl(&name)
            .await
            .map_err(|source| DiscoveryError::DescribeTtl {
                table: name.clone(),
                source,
            })?;

        resources.push(summarize_table(&name, &table, &ttl_status));
        for index in &table.global_secondary_indexes {
            resources.push(summarize_index(&name, &table, index));
        }
    }

    Ok(resources)
}

async fn list_table_names(source: &dyn TableSource) -> Result<Vec<String>, DiscoveryError> {
    let mut names = Vec::new();
    let mut start: Option<String> = None;
    loop {
        let page = source
            .list_tables(start.take())
            .await
            .map_err(|source| DiscoveryError::List { what: "tables", source })?;
        names.extend(page.items);
        match page.next {
            Some(last) => start = Some(last),
            None => break,
        }
    }
    Ok(names)
}

pub fn summarize_table(name: &str, table: &TableRecord, ttl_status: &str) -> ResourceSummary {
    let mut summary = ResourceSummary::new(name, ResourceType::DynamoTable)
        .with_data("ttl_enabled", (ttl_status == "ENABLED").to_string())
        .with_data("item_count", table.item_count.unwrap_or(0).to_string());
    if let Some(size) = table.table_size_bytes {
        summary = summary.with_data("table_size_bytes", size.to_string());
    }
    if let Some(mode) = &table.billing_mode {
        summary = summary.with_data("billing_mode", mode.as_str());
    }
    if let Some(status) = &table.status {
        summary = summary.with_data("table_status", status.as_str());
    }
    summary
}

pub fn summarize_index(table_name: &str, table: &TableRecord, index: &IndexRecord) -> ResourceSummary {
    let mut summary = ResourceSummary::new(format!("{}/{}", table_name, index.name), ResourceType::DynamoGsi)
        .with_data("table_name", table_name)
        .with_data("index_name", index.name.as_str())
        .with_data("item_count", index.item_count.unwrap_or(0).to_string());
    if let Some(mode) = &table.billing_mode {
        summary = summary.with_data("billing_mode", mode.as_str());
    }
    summary
}
