use crate::ids::DeploymentId;
use crate::stage::StageTag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageOutcome {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageMetric {
    pub outcome: StageOutcome,
    pub duration_ms: u64,
}

/// In-memory record of a single pipeline run (spec.md §3). Created at
/// pipeline start, sealed at pipeline terminus (success or failure).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployment_id: DeploymentId,
    pub service_name: String,
    pub project_id: String,
    pub region: String,
    pub image_tag: Option<String>,
    pub start_time: DateTime<Utc>,
    pub stage_metrics: HashMap<StageTag, StageMetric>,
    pub errors: Vec<String>,
    pub sealed: bool,
    pub succeeded: bool,
}

impl DeploymentRecord {
    pub fn new(service_name: impl Into<String>, project_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            deployment_id: DeploymentId::new(),
            service_name: service_name.into(),
            project_id: project_id.into(),
            region: region.into(),
            image_tag: None,
            start_time: Utc::now(),
            stage_metrics: HashMap::new(),
            errors: Vec::new(),
            sealed: false,
            succeeded: false,
        }
    }

    /// Record a stage's outcome. Metrics must not double-count a failed
    /// stage as success (spec.md §4.4, §8.5) — callers always pass the true
    /// outcome, never a default.
    pub fn record_stage(&mut self, stage: StageTag, outcome: StageOutcome, duration_ms: u64) {
        self.stage_metrics.insert(stage, StageMetric { outcome, duration_ms });
    }

    pub fn seal(&mut self, succeeded: bool) {
        self.sealed = true;
        self.succeeded = succeeded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_stage_never_marks_failure_as_success() {
        let mut record = DeploymentRecord::new("svc", "proj", "us-central1");
        record.record_stage(StageTag::ContainerBuild, StageOutcome::Failed, 1200);
        record.seal(false);
        let metric = &record.stage_metrics[&StageTag::ContainerBuild];
        assert!(matches!(metric.outcome, StageOutcome::Failed));
        assert!(record.sealed);
        assert!(!record.succeeded);
    }
}
