use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::{fetch_resource_metrics, FetchWindow, MetricsSource};
use crate::types::ResourceSummary;

/// Default number of resources fetched at once. Keeps GetMetricData under
/// its account rate limit without per-account tuning.
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Notified once per resource, after its fetch has finished.
pub trait ProgressObserver: Send + Sync {
    fn on_resource_done(&self, completed: usize, total: usize, resource: &ResourceSummary, failed: bool);
}

/// Logs progress through `tracing`.
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_resource_done(&self, completed: usize, total: usize, resource: &ResourceSummary, failed: bool) {
        if failed {
            info!("collected metrics ({}/{}) {} (incomplete)", completed, total, resource.id);
        } else {
            info!("collected metrics ({}/{}) {}", completed, total, resource.id);
        }
    }
}

/// Resources after the fetch phase, in discovery order.
#[derive(Debug)]
pub struct CollectionOutcome {
    pub resources: Vec<ResourceSummary>,
    /// Ids of resources whose fetch stopped early.
    pub failed: Vec<String>,
}

/// Runs one fetch task per resource behind a counting admission gate.
pub struct Scheduler {
    source: Arc<dyn MetricsSource>,
    max_concurrency: usize,
    window: FetchWindow,
    observer: Arc<dyn ProgressObserver>,
}

impl Scheduler {
    pub fn new(source: Arc<dyn MetricsSource>, window: FetchWindow) -> Self {
        Self {
            source,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            window,
            observer: Arc::new(LogProgress),
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Fetch metrics for every resource and wait for all tasks to finish.
    ///
    /// A permit is taken before a task is spawned and dropped only when the
    /// task returns, so no more than `max_concurrency` fetches are in flight.
    /// Fetch errors stay local to their resource. A task that panics keeps
    /// its resource as discovered, without metrics, and is reported failed.
    pub async fn run(&self, resources: Vec<ResourceSummary>) -> CollectionOutcome {
        let total = resources.len();
        let gate = Arc::new(Semaphore::new(self.max_concurrency));
        let completed = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();
        let mut task_slots = HashMap::with_capacity(total);
        let mut slots: Vec<ResourceSummary> = Vec::with_capacity(total);

        for (index, mut resource) in resources.into_iter().enumerate() {
            slots.push(resource.clone());
            // The gate is owned by this call and never closed
            let permit = Arc::clone(&gate)
                .acquire_owned()
                .await
                .expect("admission gate closed");
            let source = Arc::clone(&self.source);
            let observer = Arc::clone(&self.observer);
            let completed = Arc::clone(&completed);
            let window = self.window;

            let handle = tasks.spawn(async move {
                let _permit = permit;
                let failed = match fetch_resource_metrics(source.as_ref(), &mut resource, &window).await {
                    Ok(()) => false,
                    Err(e) => {
                        warn!("error collecting metrics for {}: {:#}", resource.id, anyhow::Error::new(e));
                        true
                    }
                };
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                observer.on_resource_done(done, total, &resource, failed);
                (index, resource, failed)
            });
            task_slots.insert(handle.id(), index);
        }

        let mut failed_flags = vec![false; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, resource, failed)) => {
                    slots[index] = resource;
                    failed_flags[index] = failed;
                }
                Err(e) => {
                    let Some(&index) = task_slots.get(&e.id()) else {
                        error!("metric fetch task aborted: {}", e);
                        continue;
                    };
                    error!("metric fetch task for {} aborted: {}", slots[index].id, e);
                    failed_flags[index] = true;
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    self.observer.on_resource_done(done, total, &slots[index], true);
                }
            }
        }

        let failed = slots
            .iter()
            .zip(&failed_flags)
            .filter(|(_, failed)| **failed)
            .map(|(resource, _)| resource.id.clone())
            .collect();

        CollectionOutcome {
            resources: slots,
            failed,
        }
    }
}
