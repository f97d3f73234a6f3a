pub mod core;
pub mod orchestration;
pub mod plugins;
pub mod process;

pub use crate::core::*;
pub use orchestration::{
    Collaborators, ReleaseOptions, ReleaseOrchestrator, ReleaseOutcome, ReleaseReport, Reporter,
    TerminalPrompter,
};
pub use plugins::{ConventionalChangelog, DocsPlugin, GitPlugin, HttpTemplateSource, NpmPlugin};
pub use process::{CommandError, CommandExecutor};
