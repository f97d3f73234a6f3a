//! Docs plugin - builds the API documentation and publishes it to GitHub pages

use crate::core::traits::{DocsGenerator, DocsOutcome, Prompter};
use crate::process::CommandExecutor;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Files whose presence selects typedoc over documentation.js
const TYPEDOC_MARKERS: &[&str] = &["typedoc.config.js", "tsconfig.json"];

/// `npx` arguments building the docs of the project at `project_path`
pub fn build_args(project_path: &Path, output_dir: &str) -> Vec<String> {
    let uses_typedoc = TYPEDOC_MARKERS
        .iter()
        .any(|marker| project_path.join(marker).exists());

    let args: Vec<&str> = if uses_typedoc {
        vec!["typedoc", "--out", output_dir]
    } else {
        vec![
            "documentation",
            "build",
            "--github",
            "--output",
            output_dir,
            "--format",
            "html",
        ]
    };
    args.into_iter().map(str::to_string).collect()
}

/// Documentation generator driven by `npx`
pub struct DocsPlugin {
    executor: CommandExecutor,
    prompter: Arc<dyn Prompter>,
    output_dir: String,
    pages_branch: String,
}

impl DocsPlugin {
    pub fn new(
        executor: CommandExecutor,
        prompter: Arc<dyn Prompter>,
        output_dir: impl Into<String>,
        pages_branch: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            prompter,
            output_dir: output_dir.into(),
            pages_branch: pages_branch.into(),
        }
    }

    async fn git(&self, args: &[&str]) -> anyhow::Result<()> {
        self.executor.run_checked("git", args).await?;
        Ok(())
    }
}

#[async_trait]
impl DocsGenerator for DocsPlugin {
    async fn generate(&self, publish: bool, branch: &str) -> anyhow::Result<DocsOutcome> {
        let project_path = self.executor.working_dir().to_path_buf();

        if !project_path.join(&self.output_dir).exists() {
            println!("This project has no {} folder", self.output_dir);
            if !self
                .prompter
                .confirm("Do you want to create it", true)
                .await?
            {
                return Ok(DocsOutcome::Declined);
            }
        }

        println!("📚 Building documentation...");
        let args = build_args(&project_path, &self.output_dir);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.executor.run_checked("npx", &args).await?;

        if !publish {
            return Ok(DocsOutcome::Built);
        }

        println!("📤 Publishing documentation to {}...", self.pages_branch);
        self.git(&["add", &self.output_dir]).await?;
        self.git(&["commit", "-m", "doc: rebuild doc"]).await?;
        self.git(&["push", "origin", branch]).await?;
        self.git(&[
            "subtree",
            "push",
            "--prefix",
            &self.output_dir,
            "origin",
            &self.pages_branch,
        ])
        .await?;

        Ok(DocsOutcome::Published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::fakes::ScriptedPrompter;
    use tempfile::TempDir;

    #[test]
    fn test_build_args_documentation_js() {
        let temp_dir = TempDir::new().unwrap();

        assert_eq!(
            build_args(temp_dir.path(), "doc"),
            vec!["documentation", "build", "--github", "--output", "doc", "--format", "html"]
        );
    }

    #[test]
    fn test_build_args_typedoc() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("tsconfig.json"), "{}").unwrap();

        assert_eq!(
            build_args(temp_dir.path(), "docs"),
            vec!["typedoc", "--out", "docs"]
        );
    }

    #[tokio::test]
    async fn test_declining_folder_creation() {
        let temp_dir = TempDir::new().unwrap();
        let prompter = Arc::new(ScriptedPrompter::new().confirm_with(false));
        let plugin = DocsPlugin::new(
            CommandExecutor::new(temp_dir.path()).unwrap(),
            prompter.clone(),
            "doc",
            "gh-pages",
        );

        let outcome = plugin.generate(true, "main").await.unwrap();

        assert_eq!(outcome, DocsOutcome::Declined);
        assert_eq!(prompter.asked(), vec!["Do you want to create it"]);
        assert!(!temp_dir.path().join("doc").exists());
    }
}
