// Public modules
pub mod types;
pub mod error;
pub mod config;
pub mod parsing;
pub mod aws;
pub mod resources;
pub mod collector;
pub mod report;

// Re-export commonly used items
pub use types::*;
pub use error::{BoxError, DiscoveryError, FetchError, WriteError};
pub use config::{load_config, load_config_with_env, EnvironmentProvider, SystemEnvironment, MockEnvironment};
pub use parsing::{detect_cluster_mode, metric_query_id, parse_bool_flag};
pub use resources::{list_resources, Inventory, ResourceDescriptor};
pub use collector::{fetch_resource_metrics, FetchWindow, MetricsSource, Scheduler, ProgressObserver, LogProgress, CollectionOutcome};
pub use report::{ReportWriter, RunSummary};
