//! Orchestration layer of a release
//!
//! This module provides the release workflow itself, the migration to CI
//! releases and the operator-facing terminal components.

#[cfg(test)]
pub mod fakes;
pub mod migrate;
pub mod output;
pub mod prompt;
pub mod release_orchestrator;

// Re-export main types for convenience
pub use output::Reporter;
pub use prompt::TerminalPrompter;
pub use release_orchestrator::{
    Collaborators, ReleaseOptions, ReleaseOrchestrator, ReleaseOutcome, ReleaseReport,
};
