use std::path::PathBuf;

use thiserror::Error;

use crate::types::Statistic;

/// Error type returned by the AWS-facing collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Listing or describing resources failed; the inventory can't be trusted.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to list {what}")]
    List {
        what: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("failed to describe table {table}")]
    DescribeTable {
        table: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to describe time to live for table {table}")]
    DescribeTtl {
        table: String,
        #[source]
        source: BoxError,
    },
    #[error("{what} response is missing {field}")]
    MissingField {
        what: &'static str,
        field: &'static str,
    },
}

/// A metric query for one resource failed. Only that resource is affected.
#[derive(Debug, Error)]
#[error("{statistic} metric query for {resource_id} failed on page {page}")]
pub struct FetchError {
    pub resource_id: String,
    pub statistic: Statistic,
    pub page: usize,
    #[source]
    pub source: BoxError,
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to create report file {path}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write report row")]
    Csv(#[from] csv::Error),
    #[error("failed to serialize report column")]
    Json(#[from] serde_json::Error),
    #[error("failed to flush report file")]
    Flush(#[from] std::io::Error),
}
