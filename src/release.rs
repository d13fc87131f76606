use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum size for step output kept in the report before truncation (64KB)
pub const MAX_OUTPUT_SIZE: usize = 64 * 1024;

/// The remote operations of a release notification, in execution order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStep {
    CreateRelease,
    UploadArtifacts,
    SetCommits,
    Finalize,
    RecordDeploy,
}

impl ReleaseStep {
    pub const ALL: [ReleaseStep; 5] = [
        ReleaseStep::CreateRelease,
        ReleaseStep::UploadArtifacts,
        ReleaseStep::SetCommits,
        ReleaseStep::Finalize,
        ReleaseStep::RecordDeploy,
    ];

    /// Returns true if a failure of this step is reported instead of aborting
    /// as an unexpected error.
    pub fn is_recoverable(self) -> bool {
        matches!(self, ReleaseStep::SetCommits)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReleaseStep::CreateRelease => "create release",
            ReleaseStep::UploadArtifacts => "upload source maps",
            ReleaseStep::SetCommits => "set commits",
            ReleaseStep::Finalize => "finalize release",
            ReleaseStep::RecordDeploy => "create deploy",
        }
    }
}

impl fmt::Display for ReleaseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Skipped,
    Failed,
}

/// Outcome of a single pipeline step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: ReleaseStep,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub output: Option<String>,
}

impl StepRecord {
    pub fn skipped(step: ReleaseStep, reason: &str) -> Self {
        Self {
            step,
            status: StepStatus::Skipped,
            started_at: Utc::now(),
            duration_ms: 0,
            output: Some(reason.to_string()),
        }
    }

    pub fn finished(
        step: ReleaseStep,
        status: StepStatus,
        started_at: DateTime<Utc>,
        mut output: String,
    ) -> Self {
        if output.len() > MAX_OUTPUT_SIZE {
            let mut cut = MAX_OUTPUT_SIZE;
            while !output.is_char_boundary(cut) {
                cut -= 1;
            }
            output.truncate(cut);
            output.push_str("\n... (output truncated)");
        }

        Self {
            step,
            status,
            started_at,
            duration_ms: (Utc::now() - started_at).num_milliseconds(),
            output: Some(output),
        }
    }
}

/// Summary of a notification run, returned on success
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseReport {
    pub id: String,
    pub version: String,
    pub environment: String,
    pub artifacts_uploaded: Option<usize>,
    pub dry_run: bool,
    pub steps: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ReleaseReport {
    pub fn new(version: String, environment: String) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            version,
            environment,
            artifacts_uploaded: None,
            dry_run: false,
            steps: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn record(&mut self, record: StepRecord) {
        self.steps.push(record);
    }

    /// Steps that actually ran against the remote service
    pub fn executed_steps(&self) -> Vec<ReleaseStep> {
        self.steps
            .iter()
            .filter(|r| r.status != StepStatus::Skipped)
            .map(|r| r.step)
            .collect()
    }

    pub fn mark_completed(&mut self) {
        self.completed_at = Some(Utc::now());
    }
}
