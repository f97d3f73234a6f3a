//! Git plugin - version control operations through the `git` binary

use crate::core::traits::VersionControl;
use crate::process::CommandExecutor;
use async_trait::async_trait;
use std::path::PathBuf;

/// Git working copy of the project being released
#[derive(Debug, Clone)]
pub struct GitPlugin {
    executor: CommandExecutor,
}

impl GitPlugin {
    pub fn new(executor: CommandExecutor) -> Self {
        Self { executor }
    }

    async fn git(&self, args: &[&str]) -> anyhow::Result<String> {
        Ok(self.executor.run_checked("git", args).await?)
    }
}

#[async_trait]
impl VersionControl for GitPlugin {
    async fn current_branch(&self) -> anyhow::Result<String> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    async fn has_changes(&self) -> anyhow::Result<bool> {
        let status = self.git(&["status", "--porcelain"]).await?;
        Ok(!status.is_empty())
    }

    async fn pull_rebase(&self) -> anyhow::Result<()> {
        self.git(&["pull", "--rebase"]).await?;
        Ok(())
    }

    async fn add(&self, paths: &[PathBuf]) -> anyhow::Result<()> {
        let paths: Vec<String> = paths.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        let mut args = vec!["add"];
        args.extend(paths.iter().map(String::as_str));
        self.git(&args).await?;
        Ok(())
    }

    async fn commit(&self, message: &str) -> anyhow::Result<()> {
        self.git(&["commit", "-m", message]).await?;
        Ok(())
    }

    async fn tag_annotated(&self, name: &str, message: &str) -> anyhow::Result<()> {
        self.git(&["tag", "-a", name, "-m", message]).await?;
        Ok(())
    }

    async fn delete_tag(&self, name: &str) -> anyhow::Result<()> {
        self.git(&["tag", "-d", name]).await?;
        Ok(())
    }

    async fn reset_last_commit(&self) -> anyhow::Result<()> {
        self.git(&["reset", "--hard", "HEAD~1"]).await?;
        Ok(())
    }

    async fn push_follow_tags(&self) -> anyhow::Result<()> {
        self.git(&["push", "--follow-tags"]).await?;
        Ok(())
    }

    async fn checkout(&self, branch: &str, create: bool) -> anyhow::Result<()> {
        if create {
            self.git(&["checkout", "-b", branch]).await?;
        } else {
            self.git(&["checkout", branch]).await?;
        }
        Ok(())
    }

    async fn push_upstream(&self, branch: &str) -> anyhow::Result<()> {
        self.git(&["push", "-u", "origin", branch]).await?;
        Ok(())
    }
}
