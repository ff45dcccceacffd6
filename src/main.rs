use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use aws_usage_collector::aws::{load_aws_config, CloudWatchSource, DynamoDbSource, ElastiCacheSource};
use aws_usage_collector::resources::{CacheClusterSource, TableSource};
use aws_usage_collector::{
    list_resources, load_config, FetchWindow, Inventory, ReportWriter, RunSummary, Scheduler,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cfg = load_config()?;
    info!("starting AWS usage collection, max concurrency = {}", cfg.max_concurrency);

    let sdk_config = load_aws_config(&cfg).await?;

    let caches = ElastiCacheSource::new(&sdk_config);
    let tables = DynamoDbSource::new(&sdk_config);
    let inventory = Inventory {
        caches: cfg.collect_elasticache.then_some(&caches as &dyn CacheClusterSource),
        tables: cfg.collect_dynamodb.then_some(&tables as &dyn TableSource),
    };

    // Any discovery failure leaves the inventory incomplete, so stop here
    let resources = list_resources(&inventory)
        .await
        .context("resource discovery failed")?;
    info!("collecting metrics on {} resources", resources.len());
    info!("speed is limited by cloudwatch:GetMetricData rate limits");

    let scheduler = Scheduler::new(
        Arc::new(CloudWatchSource::new(&sdk_config)),
        FetchWindow::trailing(Utc::now()),
    )
    .with_max_concurrency(cfg.max_concurrency);
    let outcome = scheduler.run(resources).await;

    let summary = RunSummary::from_outcome(&outcome);
    for (resource_type, count) in &summary.resources_by_type {
        info!("{}: {} resources", resource_type, count);
    }
    if summary.has_failures() {
        warn!(
            "{} resources have incomplete metrics: {}",
            summary.failed_count,
            outcome.failed.join(", ")
        );
    }

    let writer = ReportWriter::new(&cfg.output_path);
    writer
        .write(&outcome.resources)
        .with_context(|| format!("failed to write {}", writer.path().display()))?;

    info!(
        "finished collecting data, {} series for {} resources written to {}",
        summary.series_count,
        summary.total_resources(),
        writer.path().display()
    );
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
