//! AWS SDK adapters for the collaborator traits.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_cloudwatch::config::retry::{RetryPartition, TokenBucket};
use aws_sdk_cloudwatch::operation::get_metric_data::builders::GetMetricDataFluentBuilder;
use aws_sdk_cloudwatch::operation::get_metric_data::GetMetricDataOutput;
use aws_sdk_cloudwatch::primitives::DateTime as AwsDateTime;
use aws_sdk_cloudwatch::types::{Dimension as CwDimension, Metric, MetricDataQuery, MetricStat, ScanBy};
use aws_sdk_dynamodb::operation::describe_table::DescribeTableOutput;
use aws_sdk_dynamodb::operation::describe_time_to_live::DescribeTimeToLiveOutput;
use aws_sdk_dynamodb::operation::list_tables::builders::ListTablesFluentBuilder;
use aws_sdk_dynamodb::operation::list_tables::ListTablesOutput;
use aws_sdk_elasticache::operation::describe_cache_clusters::builders::DescribeCacheClustersFluentBuilder;
use aws_sdk_elasticache::operation::describe_cache_clusters::DescribeCacheClustersOutput;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::collector::{MetricDataPage, MetricDataRequest, MetricsSource};
use crate::error::{BoxError, DiscoveryError};
use crate::resources::dynamodb::LIST_TABLES_PAGE_SIZE;
use crate::resources::{
    CacheClusterRecord, CacheClusterSource, CacheNodeRecord, IndexRecord, Page, TableRecord, TableSource,
};
use crate::types::{Config, MetricSeries};

/// Retry partition name used by every client.
pub const RETRY_PARTITION: &str = "aws-usage-collector";

/// Resolve region and credentials up front so a broken setup fails before discovery.
///
/// Retries use standard mode with `AWS_MAX_ATTEMPTS` as the ceiling. Clients
/// also get [`retry_partition`] so the attempt ceiling is the only limit.
pub async fn load_aws_config(cfg: &Config) -> Result<SdkConfig> {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .retry_config(RetryConfig::standard().with_max_attempts(cfg.max_attempts));
    if let Some(profile) = &cfg.aws_profile {
        loader = loader.profile_name(profile);
    }
    if let Some(region) = &cfg.aws_region {
        loader = loader.region(Region::new(region.clone()));
    }
    let sdk_config = loader.load().await;

    let region = sdk_config
        .region()
        .ok_or_else(|| anyhow!("AWS region could not be resolved, set AWS_REGION or configure a profile"))?;
    let provider = sdk_config
        .credentials_provider()
        .ok_or_else(|| anyhow!("no AWS credentials provider configured"))?;
    provider
        .provide_credentials()
        .await
        .context("failed to resolve AWS credentials")?;

    info!("using AWS region {}", region);
    Ok(sdk_config)
}

/// Retry partition with an unlimited token bucket.
///
/// The default bucket holds 500 tokens and a throttled retry costs 5, so
/// after about 100 throttled retries every call would fail on its first
/// attempt. Retries here are free and never run out.
pub fn retry_partition() -> RetryPartition {
    RetryPartition::custom(RETRY_PARTITION)
        .token_bucket(TokenBucket::unlimited())
        .build()
}

fn to_aws_time(t: DateTime<Utc>) -> AwsDateTime {
    AwsDateTime::from_secs(t.timestamp())
}

fn boxed<E: std::error::Error + Send + Sync + 'static>(e: E) -> BoxError {
    Box::new(e)
}

pub struct CloudWatchSource {
    client: aws_sdk_cloudwatch::Client,
}

impl CloudWatchSource {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        let conf = aws_sdk_cloudwatch::config::Builder::from(sdk_config)
            .retry_partition(retry_partition())
            .build();
        Self::from_client(aws_sdk_cloudwatch::Client::from_conf(conf))
    }

    pub fn from_client(client: aws_sdk_cloudwatch::Client) -> Self {
        Self { client }
    }

    fn request(&self, request: &MetricDataRequest) -> GetMetricDataFluentBuilder {
        self.client
            .get_metric_data()
            .start_time(to_aws_time(request.window.start))
            .end_time(to_aws_time(request.window.end))
            .scan_by(ScanBy::TimestampAscending)
            .set_metric_data_queries(Some(metric_data_queries(request)))
            .set_next_token(request.next_token.clone())
    }
}

fn metric_data_queries(request: &MetricDataRequest) -> Vec<MetricDataQuery> {
    let dimensions: Vec<CwDimension> = request
        .dimensions
        .iter()
        .map(|d| CwDimension::builder().name(&d.name).value(&d.value).build())
        .collect();

    request
        .queries
        .iter()
        .map(|query| {
            let metric = Metric::builder()
                .namespace(&request.namespace)
                .metric_name(&query.metric_name)
                .set_dimensions(Some(dimensions.clone()))
                .build();
            let stat = MetricStat::builder()
                .metric(metric)
                .period(request.window.period_seconds)
                .stat(request.statistic.as_str())
                .build();
            MetricDataQuery::builder()
                .id(&query.id)
                .metric_stat(stat)
                .return_data(true)
                .build()
        })
        .collect()
}

/// Results come back keyed by query id, which doubles as the series name.
fn metric_data_page(output: &GetMetricDataOutput) -> MetricDataPage {
    let results = output
        .metric_data_results()
        .iter()
        .filter_map(|r| {
            r.id().map(|id| MetricSeries {
                name: id.to_string(),
                values: r.values().to_vec(),
            })
        })
        .collect();

    MetricDataPage {
        results,
        next_token: output.next_token().map(|t| t.to_string()),
    }
}

#[async_trait]
impl MetricsSource for CloudWatchSource {
    async fn get_metric_data(&self, request: &MetricDataRequest) -> Result<MetricDataPage, BoxError> {
        let output = self.request(request).send().await.map_err(boxed)?;
        Ok(metric_data_page(&output))
    }
}

pub struct ElastiCacheSource {
    client: aws_sdk_elasticache::Client,
}

impl ElastiCacheSource {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        let conf = aws_sdk_elasticache::config::Builder::from(sdk_config)
            .retry_partition(retry_partition())
            .build();
        Self::from_client(aws_sdk_elasticache::Client::from_conf(conf))
    }

    pub fn from_client(client: aws_sdk_elasticache::Client) -> Self {
        Self { client }
    }

    fn request(&self, marker: Option<String>) -> DescribeCacheClustersFluentBuilder {
        self.client
            .describe_cache_clusters()
            .show_cache_node_info(true)
            .set_marker(marker)
    }
}

fn cache_cluster_page(output: &DescribeCacheClustersOutput) -> Result<Page<CacheClusterRecord>, BoxError> {
    let mut items = Vec::with_capacity(output.cache_clusters().len());
    for cluster in output.cache_clusters() {
        let cache_cluster_id = cluster
            .cache_cluster_id()
            .ok_or(DiscoveryError::MissingField {
                what: "DescribeCacheClusters",
                field: "CacheClusterId",
            })?
            .to_string();
        let nodes = cluster
            .cache_nodes()
            .iter()
            .filter_map(|node| {
                node.cache_node_id().map(|id| CacheNodeRecord {
                    cache_node_id: id.to_string(),
                    availability_zone: node.customer_availability_zone().map(|s| s.to_string()),
                })
            })
            .collect();
        items.push(CacheClusterRecord {
            cache_cluster_id,
            engine: cluster.engine().unwrap_or_default().to_string(),
            cache_node_type: cluster.cache_node_type().unwrap_or_default().to_string(),
            preferred_az: cluster.preferred_availability_zone().map(|s| s.to_string()),
            replication_group_id: cluster.replication_group_id().map(|s| s.to_string()),
            nodes,
        });
    }

    // The last page may carry an empty marker instead of none
    Ok(Page {
        items,
        next: output.marker().filter(|m| !m.is_empty()).map(|m| m.to_string()),
    })
}

#[async_trait]
impl CacheClusterSource for ElastiCacheSource {
    async fn list_cache_clusters(&self, marker: Option<String>) -> Result<Page<CacheClusterRecord>, BoxError> {
        let output = self.request(marker).send().await.map_err(boxed)?;
        cache_cluster_page(&output)
    }
}

pub struct DynamoDbSource {
    client: aws_sdk_dynamodb::Client,
}

impl DynamoDbSource {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        let conf = aws_sdk_dynamodb::config::Builder::from(sdk_config)
            .retry_partition(retry_partition())
            .build();
        Self::from_client(aws_sdk_dynamodb::Client::from_conf(conf))
    }

    pub fn from_client(client: aws_sdk_dynamodb::Client) -> Self {
        Self { client }
    }

    fn list_request(&self, exclusive_start: Option<String>) -> ListTablesFluentBuilder {
        self.client
            .list_tables()
            .limit(LIST_TABLES_PAGE_SIZE)
            .set_exclusive_start_table_name(exclusive_start)
    }
}

fn table_page(output: &ListTablesOutput) -> Page<String> {
    Page {
        items: output.table_names().to_vec(),
        next: output.last_evaluated_table_name().map(|s| s.to_string()),
    }
}

fn table_record(name: &str, output: &DescribeTableOutput) -> Result<TableRecord, BoxError> {
    let table = output.table().ok_or(DiscoveryError::MissingField {
        what: "DescribeTable",
        field: "Table",
    })?;

    let global_secondary_indexes = table
        .global_secondary_indexes()
        .iter()
        .filter_map(|gsi| {
            gsi.index_name().map(|index_name| IndexRecord {
                name: index_name.to_string(),
                item_count: gsi.item_count(),
            })
        })
        .collect();

    Ok(TableRecord {
        name: name.to_string(),
        item_count: table.item_count(),
        table_size_bytes: table.table_size_bytes(),
        billing_mode: table
            .billing_mode_summary()
            .and_then(|s| s.billing_mode())
            .map(|m| m.as_str().to_string()),
        status: table.table_status().map(|s| s.as_str().to_string()),
        global_secondary_indexes,
    })
}

fn ttl_status(output: &DescribeTimeToLiveOutput) -> String {
    output
        .time_to_live_description()
        .and_then(|d| d.time_to_live_status())
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|| "DISABLED".to_string())
}

#[async_trait]
impl TableSource for DynamoDbSource {
    async fn list_tables(&self, exclusive_start: Option<String>) -> Result<Page<String>, BoxError> {
        let output = self.list_request(exclusive_start).send().await.map_err(boxed)?;
        Ok(table_page(&output))
    }

    async fn describe_table(&self, name: &str) -> Result<TableRecord, BoxError> {
        let output = self
            .client
            .describe_table()
            .table_name(name)
            .send()
            .await
            .map_err(boxed)?;
        table_record(name, &output)
    }

    async fn describe_ttl(&self, name: &str) -> Result<String, BoxError> {
        let output = self
            .client
            .describe_time_to_live()
            .table_name(name)
            .send()
            .await
            .map_err(boxed)?;
        Ok(ttl_status(&output))
    }
}
