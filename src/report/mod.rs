use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::collector::CollectionOutcome;
use crate::error::WriteError;
use crate::types::{ResourceSummary, ResourceType};

pub const REPORT_HEADER: [&str; 4] = ["ResourceId", "Type", "AdditionalData", "Metrics"];

/// Writes one CSV row per resource.
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, resources: &[ResourceSummary]) -> Result<(), WriteError> {
        let file = File::create(&self.path).map_err(|source| WriteError::Create {
            path: self.path.clone(),
            source,
        })?;
        let mut writer = csv::Writer::from_writer(file);

        writer.write_record(REPORT_HEADER)?;
        for resource in resources {
            let additional_data = serde_json::to_string(&resource.additional_data)?;
            let metrics = serde_json::to_string(&resource.metrics)?;
            writer.write_record([
                resource.id.as_str(),
                resource.resource_type.as_str(),
                additional_data.as_str(),
                metrics.as_str(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Counts describing a finished run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub resources_by_type: BTreeMap<ResourceType, usize>,
    pub failed_count: usize,
    pub series_count: usize,
}

impl RunSummary {
    pub fn from_outcome(outcome: &CollectionOutcome) -> Self {
        let mut summary = RunSummary {
            failed_count: outcome.failed.len(),
            ..Default::default()
        };
        for resource in &outcome.resources {
            *summary.resources_by_type.entry(resource.resource_type).or_insert(0) += 1;
            summary.series_count += resource.metrics.len();
        }
        summary
    }

    pub fn total_resources(&self) -> usize {
        self.resources_by_type.values().sum()
    }

    pub fn count(&self, resource_type: ResourceType) -> usize {
        self.resources_by_type.get(&resource_type).copied().unwrap_or(0)
    }

    pub fn has_failures(&self) -> bool {
        self.failed_count > 0
    }
}
