//! CloudWatch metric collection for discovered resources.

pub mod scheduler;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::{BoxError, FetchError};
use crate::parsing::metric_query_id;
use crate::types::{Dimension, MetricSeries, ResourceSummary, Statistic};

pub use scheduler::{CollectionOutcome, LogProgress, ProgressObserver, Scheduler, DEFAULT_MAX_CONCURRENCY};

pub const LOOKBACK_DAYS: i64 = 30;
pub const PERIOD_SECONDS: i32 = 60 * 60 * 24;

/// Time range and bucket size shared by every query of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub period_seconds: i32,
}

impl FetchWindow {
    /// Trailing 30 days ending at `end`, one bucket per day.
    pub fn trailing(end: DateTime<Utc>) -> Self {
        Self {
            start: end - Duration::days(LOOKBACK_DAYS),
            end,
            period_seconds: PERIOD_SECONDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricQuery {
    /// Lower-cased metric name; echoed back on the matching result.
    pub id: String,
    pub metric_name: String,
}

/// One GetMetricData call: every query shares namespace, dimensions and statistic.
#[derive(Debug, Clone)]
pub struct MetricDataRequest {
    pub namespace: String,
    pub dimensions: Vec<Dimension>,
    pub statistic: Statistic,
    pub queries: Vec<MetricQuery>,
    pub window: FetchWindow,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MetricDataPage {
    /// Series keyed by query id, values oldest first.
    pub results: Vec<MetricSeries>,
    pub next_token: Option<String>,
}

#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn get_metric_data(&self, request: &MetricDataRequest) -> Result<MetricDataPage, BoxError>;
}

/// Fetch every statistic group for `resource` and append the series to it.
///
/// Groups run in order. All pages of a group are merged before the group's
/// series are appended, so a failing page leaves nothing behind for its
/// group and stops the remaining groups; earlier groups keep their series.
pub async fn fetch_resource_metrics(
    source: &dyn MetricsSource,
    resource: &mut ResourceSummary,
    window: &FetchWindow,
) -> Result<(), FetchError> {
    let spec = resource.descriptor.target_spec(resource);

    for (statistic, metric_names) in &spec.targets {
        let mut request = MetricDataRequest {
            namespace: spec.namespace.to_string(),
            dimensions: spec.dimensions.clone(),
            statistic: *statistic,
            queries: metric_names
                .iter()
                .map(|name| MetricQuery {
                    id: metric_query_id(name),
                    metric_name: name.to_string(),
                })
                .collect(),
            window: *window,
            next_token: None,
        };

        let series = fetch_statistic_group(source, &resource.id, &mut request).await?;
        resource.metrics.extend(series);
    }

    Ok(())
}

async fn fetch_statistic_group(
    source: &dyn MetricsSource,
    resource_id: &str,
    request: &mut MetricDataRequest,
) -> Result<Vec<MetricSeries>, FetchError> {
    let mut merged: Vec<MetricSeries> = request
        .queries
        .iter()
        .map(|q| MetricSeries {
            name: q.id.clone(),
            values: Vec::new(),
        })
        .collect();
    let mut seen = vec![false; merged.len()];
    let mut page_number = 0;

    loop {
        page_number += 1;
        let page = source
            .get_metric_data(request)
            .await
            .map_err(|source| FetchError {
                resource_id: resource_id.to_string(),
                statistic: request.statistic,
                page: page_number,
                source,
            })?;

        for result in page.results {
            match merged.iter().position(|s| s.name == result.name) {
                Some(index) => {
                    merged[index].values.extend(result.values);
                    seen[index] = true;
                }
                None => debug!("ignoring unrequested series {} for {}", result.name, resource_id),
            }
        }

        match page.next_token {
            Some(token) => request.next_token = Some(token),
            None => break,
        }
    }

    Ok(merged
        .into_iter()
        .zip(seen)
        .filter_map(|(series, seen)| seen.then_some(series))
        .collect())
}
