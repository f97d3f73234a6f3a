//! Migration of a repository to releases driven by GitHub actions

use crate::core::manifest::Manifest;
use crate::core::traits::{TemplateSource, VersionControl};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const OLD_CHANGELOG: &str = "History.md";
pub const NEW_CHANGELOG: &str = "CHANGELOG.md";
pub const WORKFLOW_PATH: &str = ".github/workflows/release.yml";
pub const MIGRATION_COMMIT: &str = "chore: migrate release to GitHub actions";

const CHANGELOG_TITLE: &str = "# Changelog";

/// Fill the workflow template placeholders
pub fn render_workflow(template: &str, default_branch: &str, package_name: &str) -> String {
    template
        .replacen("$default-branch", default_branch, 1)
        .replacen("PACKAGE-NAME", package_name, 1)
}

/// Rename History.md to CHANGELOG.md and make sure it starts with a title
pub async fn rename_history(project_path: &Path) -> anyhow::Result<()> {
    let old_path = project_path.join(OLD_CHANGELOG);
    let new_path = project_path.join(NEW_CHANGELOG);

    if fs::try_exists(&old_path).await? {
        fs::rename(&old_path, &new_path).await?;
    }

    let changelog = match fs::read_to_string(&new_path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    if !changelog.starts_with(CHANGELOG_TITLE) {
        fs::write(&new_path, format!("{}\n\n{}", CHANGELOG_TITLE, changelog)).await?;
    }

    Ok(())
}

/// Move the repository to CI releases on a `release-v<version>` branch, then
/// check `release_branch` out again. Returns the migration branch.
pub async fn migrate(
    vcs: &dyn VersionControl,
    templates: &dyn TemplateSource,
    project_path: &Path,
    template_url: &str,
    release_branch: &str,
) -> anyhow::Result<String> {
    let manifest = Manifest::load(project_path).await?;
    let name = manifest.name()?.to_string();
    let version = manifest.version()?.to_string();

    rename_history(project_path).await?;

    let template = templates.fetch(template_url).await?;
    let workflow_path = project_path.join(WORKFLOW_PATH);
    if let Some(parent) = workflow_path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&workflow_path, render_workflow(&template, release_branch, &name)).await?;

    let branch = format!("release-v{}", version);
    vcs.checkout(&branch, true).await?;
    vcs.add(&[PathBuf::from(".")]).await?;
    vcs.commit(MIGRATION_COMMIT).await?;
    vcs.push_upstream(&branch).await?;
    vcs.checkout(release_branch, false).await?;

    Ok(branch)
}
