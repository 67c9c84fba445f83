// Execution models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    Idle,
    Preparing,
    Executing,
    Success,
    Error,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_running(self) -> bool {
        matches!(self, Self::Preparing | Self::Executing)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFailure {
    pub message: String,
    pub transient: bool,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
    pub status: ExecutionStatus,
    /// 0..=100
    pub progress: u8,
    pub message: String,
    pub result: Option<ProjectCreationResult>,
    pub error: Option<ExecutionFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOptions {
    /// Re-run validation of every visible required step before executing.
    pub validate_before_execution: bool,
    /// Extra attempts after a transient backend failure.
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            validate_before_execution: true,
            retry_attempts: 0,
            retry_delay_ms: 500,
        }
    }
}

/// Incremental progress reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload {
    pub correlation_id: String,
    pub step: String,
    pub percent: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u128>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Started,
    Completed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLogEntry {
    pub step: String,
    pub status: LogStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub flow: String,
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
    pub duration_ms: u128,
    pub attempts: u32,
    pub execution_log: Vec<ExecutionLogEntry>,
    /// Flow-specific summary of what was created.
    #[serde(default)]
    pub summary: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCreationResult {
    pub project_id: String,
    pub status: String,
    pub url: String,
    pub metadata: ResultMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_and_terminal_states_do_not_overlap() {
        use ExecutionStatus::*;
        for status in [Idle, Preparing, Executing, Success, Error, Cancelled] {
            assert!(!(status.is_running() && status.is_terminal()), "{:?}", status);
        }
        assert!(!Idle.is_running());
        assert!(!Idle.is_terminal());
    }

    #[test]
    fn default_options_validate_without_retries() {
        let opts = ExecutionOptions::default();
        assert!(opts.validate_before_execution);
        assert_eq!(opts.retry_attempts, 0);
    }
}
