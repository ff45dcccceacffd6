use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::resources::ResourceDescriptor;

#[derive(Debug, Clone)]
pub struct Config {
    pub aws_profile: Option<String>,
    pub aws_region: Option<String>,
    pub max_concurrency: usize,
    pub max_attempts: u32,
    pub output_path: PathBuf,
    pub collect_elasticache: bool,
    pub collect_dynamodb: bool,
}

/// Kind of resource discovered in the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    RedisNode,
    MemcachedNode,
    DynamoTable,
    DynamoGsi,
}

impl ResourceType {
    pub const ALL: [ResourceType; 4] = [
        ResourceType::RedisNode,
        ResourceType::MemcachedNode,
        ResourceType::DynamoTable,
        ResourceType::DynamoGsi,
    ];

    /// Type tag written to the report.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::RedisNode => "AWS::Elasticache::RedisNode",
            ResourceType::MemcachedNode => "AWS::Elasticache::MemcachedNode",
            ResourceType::DynamoTable => "AWS::DynamoDB::Table",
            ResourceType::DynamoGsi => "AWS::DynamoDB::GlobalSecondaryIndex",
        }
    }

    pub fn descriptor(&self) -> ResourceDescriptor {
        match self {
            ResourceType::RedisNode | ResourceType::MemcachedNode => ResourceDescriptor::Cache,
            ResourceType::DynamoTable | ResourceType::DynamoGsi => ResourceDescriptor::Table,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named time series, oldest bucket first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct ResourceSummary {
    pub id: String,
    pub resource_type: ResourceType,
    pub additional_data: BTreeMap<String, String>,
    /// Filled in by the metric fetcher only. Match entries by `name`.
    pub metrics: Vec<MetricSeries>,
    pub descriptor: ResourceDescriptor,
}

impl ResourceSummary {
    pub fn new(id: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            id: id.into(),
            resource_type,
            additional_data: BTreeMap::new(),
            metrics: Vec::new(),
            descriptor: resource_type.descriptor(),
        }
    }

    pub fn with_data<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.additional_data.insert(key.into(), value.into());
        self
    }

    pub fn data(&self, key: &str) -> Option<&str> {
        self.additional_data.get(key).map(|s| s.as_str())
    }

    pub fn series(&self, name: &str) -> Option<&MetricSeries> {
        self.metrics.iter().find(|m| m.name == name)
    }
}

/// Aggregation applied by CloudWatch over each period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Statistic {
    Sum,
    Average,
    Maximum,
}

impl Statistic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Sum => "Sum",
            Statistic::Average => "Average",
            Statistic::Maximum => "Maximum",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Where and what to query for one resource. Computed, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricTargetSpec {
    pub namespace: &'static str,
    pub dimensions: Vec<Dimension>,
    pub targets: BTreeMap<Statistic, Vec<&'static str>>,
}

impl MetricTargetSpec {
    pub fn dimension(&self, name: &str) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.value.as_str())
    }

    pub fn metric_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.targets.values().flat_map(|names| names.iter().copied())
    }
}
