//! In-memory log of the release workflow steps
//!
//! The log records the outcome of every step in order. It is consulted to
//! decide whether a rollback is required and to build the final report; it is
//! never written to disk.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Steps of the release workflow, in execution order
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum ReleaseStep {
    Preflight,
    Sync,
    Authenticate,
    Authorize,
    Test,
    Bump,
    Changelog,
    CommitAndTag,
    Publish,
    OrganizationGrant,
    Push,
    Docs,
    Migrate,
}

impl ReleaseStep {
    /// Steps that run once the package is already on the registry
    pub fn is_post_publish(&self) -> bool {
        *self > ReleaseStep::Publish
    }

    /// Steps that run before any file of the working tree is touched
    pub fn is_before_mutation(&self) -> bool {
        *self < ReleaseStep::Bump
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preflight => "preflight",
            Self::Sync => "sync",
            Self::Authenticate => "authenticate",
            Self::Authorize => "authorize",
            Self::Test => "test",
            Self::Bump => "bump",
            Self::Changelog => "changelog",
            Self::CommitAndTag => "commit-and-tag",
            Self::Publish => "publish",
            Self::OrganizationGrant => "organization-grant",
            Self::Push => "push",
            Self::Docs => "docs",
            Self::Migrate => "migrate",
        }
    }
}

impl fmt::Display for ReleaseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single step
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Ok,
    Failed,
    Skipped,
}

/// A recorded step
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StepRecord {
    pub step: ReleaseStep,
    pub outcome: StepOutcome,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Ordered log of release steps
#[derive(Debug, Clone, Default)]
pub struct StepLog {
    records: Vec<StepRecord>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a step
    pub fn record(&mut self, step: ReleaseStep, outcome: StepOutcome, detail: Option<String>) {
        self.records.push(StepRecord {
            step,
            outcome,
            timestamp: Utc::now(),
            detail,
        });
    }

    pub fn ok(&mut self, step: ReleaseStep) {
        self.record(step, StepOutcome::Ok, None);
    }

    pub fn skipped(&mut self, step: ReleaseStep, reason: impl Into<String>) {
        self.record(step, StepOutcome::Skipped, Some(reason.into()));
    }

    pub fn failed(&mut self, step: ReleaseStep, reason: impl Into<String>) {
        self.record(step, StepOutcome::Failed, Some(reason.into()));
    }

    /// Latest outcome recorded for a step
    pub fn outcome(&self, step: ReleaseStep) -> Option<StepOutcome> {
        self.records
            .iter()
            .rev()
            .find(|r| r.step == step)
            .map(|r| r.outcome)
    }

    /// The local commit and tag exist but publication failed
    pub fn needs_rollback(&self) -> bool {
        self.outcome(ReleaseStep::CommitAndTag) == Some(StepOutcome::Ok)
            && self.outcome(ReleaseStep::Publish) == Some(StepOutcome::Failed)
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Get the log as human-readable text
    pub fn history(&self) -> String {
        self.records
            .iter()
            .map(|r| {
                let outcome = match r.outcome {
                    StepOutcome::Ok => "ok",
                    StepOutcome::Failed => "failed",
                    StepOutcome::Skipped => "skipped",
                };
                match &r.detail {
                    Some(detail) => format!("{}: {} ({})", r.step, outcome, detail),
                    None => format!("{}: {}", r.step, outcome),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_log_is_empty() {
        let log = StepLog::new();

        assert!(log.records().is_empty());
        assert!(!log.needs_rollback());
    }

    #[test]
    fn test_record_keeps_order() {
        let mut log = StepLog::new();
        log.ok(ReleaseStep::Preflight);
        log.ok(ReleaseStep::Sync);
        log.skipped(ReleaseStep::Test, "--force");

        let steps: Vec<_> = log.records().iter().map(|r| r.step).collect();
        assert_eq!(
            steps,
            vec![ReleaseStep::Preflight, ReleaseStep::Sync, ReleaseStep::Test]
        );
        assert_eq!(log.outcome(ReleaseStep::Test), Some(StepOutcome::Skipped));
        assert_eq!(log.outcome(ReleaseStep::Bump), None);
    }

    #[test]
    fn test_needs_rollback_only_after_commit() {
        let mut log = StepLog::new();
        log.failed(ReleaseStep::Publish, "E403");
        assert!(!log.needs_rollback());

        let mut log = StepLog::new();
        log.ok(ReleaseStep::CommitAndTag);
        log.failed(ReleaseStep::Publish, "E403");
        assert!(log.needs_rollback());

        log.ok(ReleaseStep::Publish);
        assert!(!log.needs_rollback());
    }

    #[test]
    fn test_step_phases() {
        assert!(ReleaseStep::Authorize.is_before_mutation());
        assert!(!ReleaseStep::Bump.is_before_mutation());
        assert!(ReleaseStep::Push.is_post_publish());
        assert!(!ReleaseStep::Publish.is_post_publish());
    }

    #[test]
    fn test_history() {
        let mut log = StepLog::new();
        log.ok(ReleaseStep::Preflight);
        log.skipped(ReleaseStep::Docs, "--no-docs");

        let history = log.history();
        assert!(history.contains("preflight: ok"));
        assert!(history.contains("docs: skipped (--no-docs)"));
    }

    #[test]
    fn test_step_serialization() {
        let json = serde_json::to_string(&ReleaseStep::CommitAndTag).unwrap();
        assert_eq!(json, r#""commit-and-tag""#);
    }
}
