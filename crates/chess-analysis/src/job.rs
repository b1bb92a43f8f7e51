//! Analysis jobs and their status lifecycle.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::metrics::AnalysisResult;

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Analyzing,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A status change that the lifecycle does not allow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot move job from {from} to {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// One submitted game and, once finished, its outcome.
///
/// Status only moves forward: `pending → analyzing → completed | failed`.
/// A completed job always carries a full result and a failed one always
/// carries a message; never both.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisJob {
    pub id: Uuid,
    #[serde(skip)]
    pub pgn: String,
    /// Tag pairs of the game, filled in once the PGN has been read.
    pub headers: BTreeMap<String, String>,
    status: JobStatus,
    error_message: Option<String>,
    result: Option<AnalysisResult>,
}

impl AnalysisJob {
    pub fn new(pgn: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pgn: pgn.into(),
            headers: BTreeMap::new(),
            status: JobStatus::Pending,
            error_message: None,
            result: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Option<AnalysisResult> {
        self.result
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Failed)
    }

    /// `pending → analyzing`
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Pending, JobStatus::Analyzing)
    }

    /// `analyzing → completed`, attaching the result.
    pub fn complete(&mut self, result: AnalysisResult) -> Result<(), TransitionError> {
        self.transition(JobStatus::Analyzing, JobStatus::Completed)?;
        self.result = Some(result);
        Ok(())
    }

    /// `analyzing → failed`, attaching a human-readable reason.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Analyzing, JobStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    fn transition(&mut self, from: JobStatus, to: JobStatus) -> Result<(), TransitionError> {
        if self.status != from {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsEngine;

    #[test]
    fn test_new_job_is_pending() {
        let job = AnalysisJob::new("1. e4");
        assert_eq!(job.status(), JobStatus::Pending);
        assert!(!job.is_finished());
        assert!(job.result().is_none());
        assert!(job.error_message().is_none());
        assert_ne!(job.id, AnalysisJob::new("1. e4").id);
    }

    #[test]
    fn test_successful_lifecycle() {
        let mut job = AnalysisJob::new("");
        job.start().unwrap();
        assert_eq!(job.status(), JobStatus::Analyzing);

        job.complete(MetricsEngine.compute(Vec::new())).unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
        assert!(job.is_finished());
        assert!(job.result().is_some());
        assert!(job.error_message().is_none());
    }

    #[test]
    fn test_failed_lifecycle() {
        let mut job = AnalysisJob::new("");
        job.start().unwrap();
        job.fail("Engine crashed: engine closed its output").unwrap();

        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(
            job.error_message(),
            Some("Engine crashed: engine closed its output")
        );
        assert!(job.result().is_none());
    }

    #[test]
    fn test_illegal_transitions() {
        let mut job = AnalysisJob::new("");
        assert_eq!(
            job.complete(MetricsEngine.compute(Vec::new())),
            Err(TransitionError {
                from: JobStatus::Pending,
                to: JobStatus::Completed
            })
        );

        job.start().unwrap();
        assert!(job.start().is_err());
        job.fail("boom").unwrap();
        assert!(job.fail("again").is_err());
        assert_eq!(job.error_message(), Some("boom"));
    }

    #[test]
    fn test_transition_error_display() {
        let err = TransitionError {
            from: JobStatus::Completed,
            to: JobStatus::Analyzing,
        };
        assert_eq!(err.to_string(), "Cannot move job from completed to analyzing");
    }

    #[test]
    fn test_serialize_status() {
        let mut job = AnalysisJob::new("1. e4");
        job.start().unwrap();
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "analyzing");
        assert!(json.get("pgn").is_none());
        assert_eq!(json["result"], serde_json::Value::Null);
    }
}
