//! Error handling for release operations
//!
//! Every failure of the release workflow is described by a [`ReleaseError`].
//! Errors carry the information needed to tell the operator what happened,
//! whether the repository was touched, and what to do next.

use thiserror::Error;

use super::step_log::ReleaseStep;

/// Coarse classification of release failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A guard failed before anything was mutated
    Precondition,
    /// The project's test suite failed
    Test,
    /// Publication failed (local commit/tag rolled back)
    Publish,
    /// Something failed after the package was already published
    PostPublish,
    /// Unexpected collaborator or I/O failure
    Internal,
}

/// Main error type for release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    // Preflight errors
    #[error("You must be on one of the release branches ({expected}). Current branch: {current}")]
    WrongBranch { current: String, expected: String },

    #[error("You have uncommitted changes.")]
    UncommittedChanges,

    #[error(
        "Your version of {tool} ({current}) is obsolete. Latest is {latest}."
    )]
    ToolOutdated {
        tool: String,
        current: String,
        latest: String,
    },

    #[error("This repository is released using GitHub actions.")]
    ReleasedByWorkflow,

    // Authentication / authorization errors
    #[error("Could not determine the npm organization")]
    OrganizationUnresolved,

    #[error("npm user {user} is not a member of {team}")]
    Unauthorized { user: String, team: String },

    // Manifest errors
    #[error("Invalid package manifest: {message}")]
    InvalidManifest { message: String },

    #[error("Invalid version {version}: {message}")]
    InvalidVersion { version: String, message: String },

    // Test errors
    #[error("Tests failed: {output}")]
    TestsFailed { output: String },

    // Publishing errors
    #[error("npm publish failed, commit and tag v{version} were rolled back: {message}")]
    PublishFailed { version: String, message: String },

    #[error("Rollback of v{version} failed: {message}")]
    RollbackFailed { version: String, message: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Command / collaborator errors
    #[error("[{step}] {message}")]
    StepFailed { step: ReleaseStep, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReleaseError {
    /// Wrap a collaborator failure with the step it happened in
    pub fn step(step: ReleaseStep, error: impl std::fmt::Display) -> Self {
        Self::StepFailed {
            step,
            message: error.to_string(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WrongBranch { .. }
            | Self::UncommittedChanges
            | Self::ToolOutdated { .. }
            | Self::ReleasedByWorkflow
            | Self::OrganizationUnresolved
            | Self::Unauthorized { .. }
            | Self::InvalidManifest { .. }
            | Self::InvalidVersion { .. } => ErrorKind::Precondition,
            Self::TestsFailed { .. } => ErrorKind::Test,
            Self::PublishFailed { .. } | Self::RollbackFailed { .. } => ErrorKind::Publish,
            Self::StepFailed { step, .. } if step.is_post_publish() => ErrorKind::PostPublish,
            Self::ConfigError(_) | Self::StepFailed { .. } | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// Whether the repository is known to be in its pre-release state, so the
    /// release can simply be started again.
    pub fn is_safe_to_retry(&self) -> bool {
        match self.kind() {
            ErrorKind::Precondition | ErrorKind::Test => true,
            ErrorKind::Publish => matches!(self, Self::PublishFailed { .. }),
            ErrorKind::PostPublish => false,
            ErrorKind::Internal => match self {
                Self::StepFailed { step, .. } => step.is_before_mutation(),
                Self::ConfigError(_) => true,
                _ => false,
            },
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<String> {
        match self {
            Self::WrongBranch { expected, .. } => {
                vec![format!("Check out one of: {}", expected)]
            }
            Self::UncommittedChanges => vec![
                "Commit or stash your changes".to_string(),
                "Run `git status` to see what changed".to_string(),
            ],
            Self::ToolOutdated { tool, .. } => {
                vec![format!("Please upgrade using the command: cargo install {}", tool)]
            }
            Self::ReleasedByWorkflow => vec![
                "Merge the release pull request created by the release workflow".to_string(),
            ],
            Self::OrganizationUnresolved => {
                vec!["Pass the organization explicitly with --org".to_string()]
            }
            Self::Unauthorized { team, .. } => vec![
                format!("Ask an owner of the organization to add you to {}", team),
                "Use --force to skip this check".to_string(),
            ],
            Self::InvalidManifest { .. } => {
                vec!["Check that package.json has a name and a version".to_string()]
            }
            Self::InvalidVersion { .. } => {
                vec!["Use a SemVer version in package.json (e.g. 1.0.0)".to_string()]
            }
            Self::TestsFailed { .. } => vec![
                "Fix the failing tests and run the release again".to_string(),
            ],
            Self::PublishFailed { .. } => vec![
                "Check the npm output above".to_string(),
                "Run `npm whoami` to verify you are logged in".to_string(),
            ],
            Self::RollbackFailed { version, .. } => vec![
                format!("Delete the tag manually: git tag -d v{}", version),
                "Undo the release commit manually: git reset --hard HEAD~1".to_string(),
            ],
            Self::ConfigError(_) => vec!["Check .cheminfo-publish.yaml".to_string()],
            Self::StepFailed { .. } | Self::Io(_) => {
                vec!["Check the command output above".to_string()]
            }
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::WrongBranch { .. } => "WRONG_BRANCH",
            Self::UncommittedChanges => "UNCOMMITTED_CHANGES",
            Self::ToolOutdated { .. } => "TOOL_OUTDATED",
            Self::ReleasedByWorkflow => "RELEASED_BY_WORKFLOW",
            Self::OrganizationUnresolved => "ORGANIZATION_UNRESOLVED",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::InvalidManifest { .. } => "INVALID_MANIFEST",
            Self::InvalidVersion { .. } => "INVALID_VERSION",
            Self::TestsFailed { .. } => "TESTS_FAILED",
            Self::PublishFailed { .. } => "PUBLISH_FAILED",
            Self::RollbackFailed { .. } => "ROLLBACK_FAILED",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::StepFailed { .. } => "STEP_FAILED",
            Self::Io(_) => "IO_ERROR",
        }
    }
}
