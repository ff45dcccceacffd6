//! Resource kinds the collector knows about.
//!
//! Each [`ResourceDescriptor`] knows how to enumerate its resources through a
//! collaborator trait and how to address them in CloudWatch.

pub mod dynamodb;
pub mod elasticache;

use async_trait::async_trait;
use tracing::info;

use crate::error::{BoxError, DiscoveryError};
use crate::types::{MetricTargetSpec, ResourceSummary};

/// One page of a paginated listing call.
#[derive(Debug, Clone, Default)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CacheClusterRecord {
    pub cache_cluster_id: String,
    pub engine: String,
    pub cache_node_type: String,
    pub preferred_az: Option<String>,
    pub replication_group_id: Option<String>,
    pub nodes: Vec<CacheNodeRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct CacheNodeRecord {
    pub cache_node_id: String,
    pub availability_zone: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TableRecord {
    pub name: String,
    pub item_count: Option<i64>,
    pub table_size_bytes: Option<i64>,
    pub billing_mode: Option<String>,
    pub status: Option<String>,
    pub global_secondary_indexes: Vec<IndexRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct IndexRecord {
    pub name: String,
    pub item_count: Option<i64>,
}

/// DescribeCacheClusters, one page per call.
#[async_trait]
pub trait CacheClusterSource: Send + Sync {
    async fn list_cache_clusters(&self, marker: Option<String>) -> Result<Page<CacheClusterRecord>, BoxError>;
}

/// ListTables / DescribeTable / DescribeTimeToLive.
#[async_trait]
pub trait TableSource: Send + Sync {
    async fn list_tables(&self, exclusive_start: Option<String>) -> Result<Page<String>, BoxError>;

    async fn describe_table(&self, name: &str) -> Result<TableRecord, BoxError>;

    /// Raw TimeToLiveStatus, e.g. `ENABLED` or `DISABLED`.
    async fn describe_ttl(&self, name: &str) -> Result<String, BoxError>;
}

/// Collaborators available for discovery. A `None` source is skipped.
#[derive(Clone, Copy, Default)]
pub struct Inventory<'a> {
    pub caches: Option<&'a dyn CacheClusterSource>,
    pub tables: Option<&'a dyn TableSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceDescriptor {
    Cache,
    Table,
}

impl ResourceDescriptor {
    /// Discovery order used for the report.
    pub const ALL: [ResourceDescriptor; 2] = [ResourceDescriptor::Table, ResourceDescriptor::Cache];

    pub fn name(&self) -> &'static str {
        match self {
            ResourceDescriptor::Cache => "ElastiCache nodes",
            ResourceDescriptor::Table => "DynamoDB tables",
        }
    }

    /// Namespace, dimensions and metrics to request for `resource`. No I/O.
    pub fn target_spec(&self, resource: &ResourceSummary) -> MetricTargetSpec {
        match self {
            ResourceDescriptor::Cache => elasticache::target_spec(resource),
            ResourceDescriptor::Table => dynamodb::target_spec(resource),
        }
    }

    pub async fn discover(&self, inventory: &Inventory<'_>) -> Result<Vec<ResourceSummary>, DiscoveryError> {
        match self {
            ResourceDescriptor::Cache => match inventory.caches {
                Some(source) => elasticache::discover(source).await,
                None => Ok(Vec::new()),
            },
            ResourceDescriptor::Table => match inventory.tables {
                Some(source) => dynamodb::discover(source).await,
                None => Ok(Vec::new()),
            },
        }
    }
}

/// Enumerate every resource kind. Any failure aborts the whole listing.
pub async fn list_resources(inventory: &Inventory<'_>) -> Result<Vec<ResourceSummary>, DiscoveryError> {
    let mut resources = Vec::new();
    for descriptor in ResourceDescriptor::ALL {
        let found = descriptor.discover(inventory).await?;
        info!("found {} {} to collect data on", found.len(), descriptor.name());
        resources.extend(found);
    }
    Ok(resources)
}
