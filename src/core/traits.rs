//! Collaborator traits for the release workflow
//!
//! The orchestrator never spawns processes itself. Everything it needs from
//! git, npm, the test suite, the changelog tooling, the documentation
//! generator and the operator goes through the traits below.

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use super::version::BumpType;

// ============================================================================
// Version control
// ============================================================================

/// Version-control operations used by a release
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Name of the checked-out branch
    async fn current_branch(&self) -> anyhow::Result<String>;

    /// Whether the working tree has uncommitted changes
    async fn has_changes(&self) -> anyhow::Result<bool>;

    /// `git pull --rebase`
    async fn pull_rebase(&self) -> anyhow::Result<()>;

    /// Stage the given paths
    async fn add(&self, paths: &[PathBuf]) -> anyhow::Result<()>;

    /// Create a commit with the staged changes
    async fn commit(&self, message: &str) -> anyhow::Result<()>;

    /// Create an annotated tag on HEAD
    async fn tag_annotated(&self, name: &str, message: &str) -> anyhow::Result<()>;

    /// Delete a local tag
    async fn delete_tag(&self, name: &str) -> anyhow::Result<()>;

    /// Discard the latest commit and its changes (`git reset --hard HEAD~1`)
    async fn reset_last_commit(&self) -> anyhow::Result<()>;

    /// Push commits and annotated tags
    async fn push_follow_tags(&self) -> anyhow::Result<()>;

    /// Check out a branch, creating it first when `create` is set
    async fn checkout(&self, branch: &str, create: bool) -> anyhow::Result<()>;

    /// Push a branch and set its upstream
    async fn push_upstream(&self, branch: &str) -> anyhow::Result<()>;
}

// ============================================================================
// Registry
// ============================================================================

/// Two-factor authentication mode of the registry account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TwoFactorMode {
    Disabled,
    AuthOnly,
    AuthAndWrites,
}

impl TwoFactorMode {
    /// Parse the output of `npm profile get "two-factor auth"`
    pub fn from_profile_output(output: &str) -> Self {
        let output = output.trim();
        if output.starts_with("auth-and-writes") {
            Self::AuthAndWrites
        } else if output.starts_with("auth-only") {
            Self::AuthOnly
        } else {
            Self::Disabled
        }
    }

    /// Whether publishing needs a one-time password
    pub fn requires_otp_for_publish(&self) -> bool {
        matches!(self, Self::AuthAndWrites)
    }
}

/// Package registry operations used by a release
#[async_trait]
pub trait Registry: Send + Sync {
    /// Currently authenticated user
    async fn whoami(&self) -> anyhow::Result<String>;

    /// Members of a team (`org:team`)
    async fn team_members(&self, team: &str) -> anyhow::Result<Vec<String>>;

    /// Packages a team has access to, with their access level
    async fn team_packages(&self, team: &str) -> anyhow::Result<HashMap<String, String>>;

    /// Grant read-write access on a package to a team
    async fn grant_read_write(&self, team: &str, package: &str) -> anyhow::Result<()>;

    /// Two-factor mode of the authenticated account
    async fn two_factor_mode(&self) -> anyhow::Result<TwoFactorMode>;

    /// Publish the package in the project directory
    async fn publish(&self, otp: Option<&SecretString>) -> anyhow::Result<String>;

    /// Latest published version of a package
    async fn latest_version(&self, package: &str) -> anyhow::Result<String>;
}

// ============================================================================
// Tests
// ============================================================================

/// Runs the project's test suite
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Run the tests. `Ok` carries the output; a failing suite is an error.
    async fn run_tests(&self) -> anyhow::Result<String>;
}

// ============================================================================
// Changelog
// ============================================================================

/// How many releases a changelog should cover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseCount {
    /// The `n` newest releases
    Latest(usize),
    /// The whole history
    All,
}

impl ReleaseCount {
    /// conventional-changelog style count, `0` meaning unlimited
    pub fn from_count(count: usize) -> Self {
        if count == 0 { Self::All } else { Self::Latest(count) }
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            Self::Latest(n) => Some(*n),
            Self::All => None,
        }
    }
}

/// Input of a changelog generation
#[derive(Debug, Clone)]
pub struct ChangelogRequest {
    /// Commit convention preset (e.g. "conventionalcommits", "angular")
    pub preset: String,
    pub release_count: ReleaseCount,
    /// Version the unreleased commits will be published as
    pub next_version: String,
    /// `https://github.com/<owner>/<repo>`, used for links
    pub repository_url: Option<String>,
}

/// Recommended bump and its justification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpRecommendation {
    pub release_type: BumpType,
    pub reason: String,
}

/// Analyzes commit history
#[async_trait]
pub trait ChangelogGenerator: Send + Sync {
    /// Recommend a bump from the commits since the last tag
    async fn recommend_bump(&self, preset: &str) -> anyhow::Result<BumpRecommendation>;

    /// Render changelog text (Markdown) for the requested window
    async fn generate(&self, request: &ChangelogRequest) -> anyhow::Result<String>;
}

// ============================================================================
// Documentation
// ============================================================================

/// Result of a documentation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocsOutcome {
    Built,
    Published,
    /// The operator declined to create the docs folder
    Declined,
}

/// Builds (and optionally publishes) the project's documentation
#[async_trait]
pub trait DocsGenerator: Send + Sync {
    async fn generate(&self, publish: bool, branch: &str) -> anyhow::Result<DocsOutcome>;
}

// ============================================================================
// Workflow templates
// ============================================================================

/// Source of the CI release workflow used by `--migrate`
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn fetch(&self, url: &str) -> anyhow::Result<String>;
}

// ============================================================================
// Operator decisions
// ============================================================================

/// A selectable option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    /// Text shown to the operator
    pub label: String,
    /// Value returned when chosen
    pub value: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    /// A choice whose label is its value
    pub fn plain(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
        }
    }
}

/// Source of operator decisions
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Yes/no question
    async fn confirm(&self, message: &str, default: bool) -> anyhow::Result<bool>;

    /// Pick one of `choices`, returning its value
    async fn select(
        &self,
        message: &str,
        choices: &[Choice],
        default: Option<&str>,
    ) -> anyhow::Result<String>;

    /// Free text (one-time codes)
    async fn input(&self, message: &str) -> anyhow::Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_factor_mode_parsing() {
        assert_eq!(
            TwoFactorMode::from_profile_output("auth-and-writes\n"),
            TwoFactorMode::AuthAndWrites
        );
        assert_eq!(
            TwoFactorMode::from_profile_output("auth-only"),
            TwoFactorMode::AuthOnly
        );
        assert_eq!(
            TwoFactorMode::from_profile_output("disabled"),
            TwoFactorMode::Disabled
        );
        assert!(TwoFactorMode::AuthAndWrites.requires_otp_for_publish());
        assert!(!TwoFactorMode::AuthOnly.requires_otp_for_publish());
    }

    #[test]
    fn test_release_count() {
        assert_eq!(ReleaseCount::from_count(0), ReleaseCount::All);
        assert_eq!(ReleaseCount::from_count(1), ReleaseCount::Latest(1));
        assert_eq!(ReleaseCount::All.limit(), None);
        assert_eq!(ReleaseCount::Latest(3).limit(), Some(3));
    }

    #[test]
    fn test_choice_constructors() {
        let choice = Choice::plain("cheminfo");
        assert_eq!(choice.label, "cheminfo");
        assert_eq!(choice.value, "cheminfo");

        let choice = Choice::new("minor (1.3.0)", "minor");
        assert_eq!(choice.value, "minor");
    }
}
