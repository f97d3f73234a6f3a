//! Release Orchestrator - drives a release from preflight checks to docs
//!
//! The workflow is strictly linear:
//! preflight -> sync -> authenticate -> authorize -> test -> bump ->
//! changelog -> commit & tag -> publish -> organization grant -> push ->
//! docs -> migrate.
//!
//! Nothing is written before the bump. Between the bump and the commit the
//! touched files are restored on failure; once committed, a failed tag undoes
//! the commit and a failed publication deletes the tag and undoes the commit.
//! Everything after publication only produces warnings.

use crate::core::config::ReleaseSettings;
use crate::core::error::ReleaseError;
use crate::core::manifest::{LOCK_FILE, MANIFEST_FILE, Manifest, infer_organization};
use crate::core::step_log::{ReleaseStep, StepLog};
use crate::core::traits::*;
use crate::core::version::{BumpType, bump_choices, format_bump, parse_version};
use crate::orchestration::migrate;
use crate::orchestration::output::Reporter;
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

pub const HISTORY_FILE: &str = "History.md";
pub const CHANGELOG_FILE: &str = "CHANGELOG.md";
pub const RELEASE_WORKFLOW: &str = ".github/workflows/release.yml";

/// Everything the orchestrator talks to
#[derive(Clone)]
pub struct Collaborators {
    pub vcs: Arc<dyn VersionControl>,
    pub registry: Arc<dyn Registry>,
    pub tests: Arc<dyn TestRunner>,
    pub changelog: Arc<dyn ChangelogGenerator>,
    pub docs: Arc<dyn DocsGenerator>,
    pub templates: Arc<dyn TemplateSource>,
    pub prompter: Arc<dyn Prompter>,
}

/// Options of a single release, from the command line
#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    pub bump: Option<BumpType>,
    pub org: Option<String>,
    pub force: bool,
    pub docs: bool,
    pub otp: Option<SecretString>,
    pub migrate: bool,
}

impl Default for ReleaseOptions {
    fn default() -> Self {
        Self {
            bump: None,
            org: None,
            force: false,
            docs: true,
            otp: None,
            migrate: false,
        }
    }
}

/// How a release ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Published,
    /// The operator backed out; nothing was changed
    Cancelled { reason: String },
}

/// Result of a release
#[derive(Debug, Clone)]
pub struct ReleaseReport {
    pub outcome: ReleaseOutcome,
    pub package_name: Option<String>,
    pub previous_version: Option<String>,
    pub new_version: Option<String>,
    pub organization: Option<String>,
    /// Post-publication problems the operator must fix by hand
    pub warnings: Vec<String>,
    pub steps: StepLog,
}

impl ReleaseReport {
    fn new() -> Self {
        Self {
            outcome: ReleaseOutcome::Published,
            package_name: None,
            previous_version: None,
            new_version: None,
            organization: None,
            warnings: Vec::new(),
            steps: StepLog::new(),
        }
    }

    fn cancelled(mut self, reason: impl Into<String>) -> Self {
        self.outcome = ReleaseOutcome::Cancelled {
            reason: reason.into(),
        };
        self
    }

    pub fn is_published(&self) -> bool {
        self.outcome == ReleaseOutcome::Published
    }
}

/// Files touched between the bump and the commit, with their original content
struct FileBackup {
    files: Vec<(PathBuf, Option<Vec<u8>>)>,
}

impl FileBackup {
    async fn capture(paths: &[PathBuf]) -> Result<Self, ReleaseError> {
        let mut files = Vec::new();
        for path in paths {
            let content = match fs::read(path).await {
                Ok(content) => Some(content),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(e.into()),
            };
            files.push((path.clone(), content));
        }
        Ok(Self { files })
    }

    async fn restore(&self) {
        for (path, content) in &self.files {
            let result = match content {
                Some(content) => fs::write(path, content).await,
                None => match fs::remove_file(path).await {
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    other => other,
                },
            };
            if let Err(e) = result {
                log::warn!("could not restore {}: {}", path.display(), e);
            }
        }
    }
}

/// Wrap a collaborator failure with its step
fn step_error(step: ReleaseStep) -> impl FnOnce(anyhow::Error) -> ReleaseError {
    move |e| ReleaseError::step(step, format!("{:#}", e))
}

/// Compare the running tool with the latest published one. Registry problems
/// only produce a warning.
pub async fn check_tool_version(
    registry: &dyn Registry,
    settings: &ReleaseSettings,
) -> Result<Option<String>, ReleaseError> {
    log::debug!("getting latest version of {}", settings.tool.name);

    let latest = match registry.latest_version(&settings.tool.name).await {
        Ok(latest) => latest,
        Err(e) => {
            return Ok(Some(format!(
                "Could not check whether {} is up-to-date: {:#}",
                settings.tool.name, e
            )));
        }
    };

    let (Ok(latest_version), Ok(current_version)) = (
        semver::Version::parse(&latest),
        semver::Version::parse(&settings.tool.version),
    ) else {
        return Ok(Some(format!(
            "Could not compare versions of {} ({} / {})",
            settings.tool.name, settings.tool.version, latest
        )));
    };

    if latest_version > current_version {
        log::debug!("version is obsolete");
        return Err(ReleaseError::ToolOutdated {
            tool: settings.tool.name.clone(),
            current: settings.tool.version.clone(),
            latest,
        });
    }

    log::debug!("version is up-to-date");
    Ok(None)
}

/// Main release orchestrator
pub struct ReleaseOrchestrator {
    settings: ReleaseSettings,
    project_path: PathBuf,
    collaborators: Collaborators,
    reporter: Reporter,
}

impl ReleaseOrchestrator {
    pub fn new<P: AsRef<Path>>(
        settings: ReleaseSettings,
        project_path: P,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            settings,
            project_path: project_path.as_ref().to_path_buf(),
            collaborators,
            reporter: Reporter::default(),
        }
    }

    /// Run a release
    pub async fn run(&self, options: &ReleaseOptions) -> Result<ReleaseReport, ReleaseError> {
        log::debug!("start publish");
        let mut report = ReleaseReport::new();

        match self.execute(options, &mut report).await {
            Ok(Some(reason)) => {
                log::debug!("release cancelled: {}", reason);
                Ok(report.cancelled(reason))
            }
            Ok(None) => Ok(report),
            Err(e) => {
                log::debug!("release aborted after:\n{}", report.steps.history());
                Err(e)
            }
        }
    }

    /// Build (and publish) the documentation on its own
    pub async fn run_docs(&self, publish: bool, force: bool) -> Result<DocsOutcome, ReleaseError> {
        if force {
            log::debug!("skipping version check (--force)");
        } else if let Some(warning) =
            check_tool_version(self.collaborators.registry.as_ref(), &self.settings).await?
        {
            self.reporter.warn(&warning);
        }

        let branch = self
            .collaborators
            .vcs
            .current_branch()
            .await
            .map_err(step_error(ReleaseStep::Docs))?;

        self.collaborators
            .docs
            .generate(publish, &branch)
            .await
            .map_err(step_error(ReleaseStep::Docs))
    }

    /// `Ok(Some(reason))` when the operator cancelled
    async fn execute(
        &self,
        options: &ReleaseOptions,
        report: &mut ReleaseReport,
    ) -> Result<Option<String>, ReleaseError> {
        let c = &self.collaborators;

        // 1. Preflight
        if options.force {
            let message = format!(
                "Are you sure you want to force the publication?\n\
                 This will skip the following steps:\n\
                 - Check that {} is up-to-date\n\
                 - Run tests\n",
                self.settings.tool.name
            );
            let confirmed = c
                .prompter
                .confirm(&message, false)
                .await
                .map_err(step_error(ReleaseStep::Preflight))?;
            if !confirmed {
                return Ok(Some("--force was not confirmed".to_string()));
            }
        } else if let Some(warning) = check_tool_version(c.registry.as_ref(), &self.settings).await?
        {
            self.reporter.warn(&warning);
        }

        let branch = c
            .vcs
            .current_branch()
            .await
            .map_err(step_error(ReleaseStep::Preflight))?;
        log::debug!("current branch is {}", branch);
        if !self.settings.branches.contains(&branch) {
            return Err(ReleaseError::WrongBranch {
                current: branch,
                expected: self.settings.branches.join(", "),
            });
        }

        let has_changes = c
            .vcs
            .has_changes()
            .await
            .map_err(step_error(ReleaseStep::Preflight))?;
        log::debug!("git has changes: {}", has_changes);
        if has_changes {
            return Err(ReleaseError::UncommittedChanges);
        }

        report.steps.ok(ReleaseStep::Preflight);

        // 2. Sync
        c.vcs
            .pull_rebase()
            .await
            .map_err(step_error(ReleaseStep::Sync))?;

        // A workflow may have come with the pull
        if self.settings.check_release_workflow
            && fs::try_exists(self.project_path.join(RELEASE_WORKFLOW)).await?
        {
            return Err(ReleaseError::ReleasedByWorkflow);
        }
        report.steps.ok(ReleaseStep::Sync);

        // 3. Authenticate
        let user = c
            .registry
            .whoami()
            .await
            .map_err(step_error(ReleaseStep::Authenticate))?;
        log::debug!("npm user: {}", user);

        let manifest = Manifest::load(&self.project_path).await?;
        let package_name = manifest.name()?.to_string();
        let current_version = manifest.version()?.to_string();
        report.package_name = Some(package_name.clone());
        report.previous_version = Some(current_version.clone());

        let organization = self.resolve_organization(options, &manifest).await?;
        log::debug!("npm org: {}", organization);
        report.organization = Some(organization.clone());
        report.steps.ok(ReleaseStep::Authenticate);

        // 4. Authorize
        let team = self.settings.team_for(&organization);
        let is_member = match c.registry.team_members(&team).await {
            Ok(members) => members.contains(&user),
            Err(e) => {
                log::debug!("could not list {}: {:#}", team, e);
                false
            }
        };
        if is_member {
            report.steps.ok(ReleaseStep::Authorize);
        } else if options.force {
            let warning = format!("npm user {} is not a member of {}", user, team);
            self.reporter.warn(&warning);
            report.steps.skipped(ReleaseStep::Authorize, warning);
        } else {
            return Err(ReleaseError::Unauthorized { user, team });
        }

        // 5. Test
        if options.force {
            log::debug!("skipping tests (--force)");
            report.steps.skipped(ReleaseStep::Test, "--force");
        } else {
            println!("🧪 Running the tests");
            c.tests
                .run_tests()
                .await
                .map_err(|e| ReleaseError::TestsFailed {
                    output: format!("{:#}", e),
                })?;
            report.steps.ok(ReleaseStep::Test);
        }

        // 6. Bump
        let current = parse_version(&current_version)?;
        let Some(bump) = self.choose_bump(options, &current).await? else {
            return Ok(Some("bump was not confirmed".to_string()));
        };
        log::debug!("selected bump: {}", bump);
        let new_version = bump.apply(&current)?.to_string();

        let history_path = self.history_path().await?;
        let mut touched = vec![manifest.path.clone(), history_path.clone()];
        if let Some(lock_path) = &manifest.lock_path {
            touched.push(lock_path.clone());
        }
        let backup = FileBackup::capture(&touched).await?;

        println!("⬆️  Bumping version");
        if let Err(e) = manifest.write_version(&new_version).await {
            backup.restore().await;
            return Err(e);
        }
        report.steps.ok(ReleaseStep::Bump);

        // 7. Changelog
        if let Err(e) = self
            .update_history(&history_path, &new_version, &manifest, report)
            .await
        {
            backup.restore().await;
            return Err(e);
        }
        report.steps.ok(ReleaseStep::Changelog);

        // 8. Commit & Tag
        let mut files = vec![PathBuf::from(MANIFEST_FILE), relative_to(&history_path, &self.project_path)];
        if manifest.has_lock_file() {
            files.push(PathBuf::from(LOCK_FILE));
        }
        let tag = format!("v{}", new_version);

        let committed = async {
            c.vcs.add(&files).await?;
            c.vcs.commit(&new_version).await
        }
        .await;
        if let Err(e) = committed {
            backup.restore().await;
            return Err(step_error(ReleaseStep::CommitAndTag)(e));
        }

        if let Err(e) = c.vcs.tag_annotated(&tag, &tag).await {
            if let Err(reset) = c.vcs.reset_last_commit().await {
                log::warn!("could not undo the release commit: {:#}", reset);
            }
            return Err(step_error(ReleaseStep::CommitAndTag)(e));
        }
        report.steps.ok(ReleaseStep::CommitAndTag);

        // 9. Publish
        println!("📤 Publishing package");
        match self.publish(options).await {
            Ok(output) => {
                if !output.is_empty() {
                    println!("{}", output);
                }
                report.steps.ok(ReleaseStep::Publish);
                report.new_version = Some(new_version.clone());
            }
            Err(e) => {
                let message = format!("{:#}", e);
                report.steps.failed(ReleaseStep::Publish, message.clone());
                if !report.steps.needs_rollback() {
                    return Err(ReleaseError::step(ReleaseStep::Publish, message));
                }
                return Err(self.rollback(&new_version, &tag, message).await);
            }
        }

        // 10. Organization grant
        self.grant_organization(&organization, &package_name, report)
            .await;

        // 11. Push
        println!("🚀 Pushing to GitHub");
        match c.vcs.push_follow_tags().await {
            Ok(()) => report.steps.ok(ReleaseStep::Push),
            Err(e) => {
                self.warn(
                    report,
                    format!(
                        "Command \"git push --follow-tags\" failed ({:#}).\nYou need to resolve the problem manually.",
                        e
                    ),
                );
                report.steps.failed(ReleaseStep::Push, format!("{:#}", e));
            }
        }

        // 12. Docs
        if !options.docs || !self.settings.docs_enabled {
            report.steps.skipped(ReleaseStep::Docs, "--no-docs");
        } else {
            match c.docs.generate(true, &branch).await {
                Ok(DocsOutcome::Declined) => {
                    report.steps.skipped(ReleaseStep::Docs, "declined")
                }
                Ok(_) => report.steps.ok(ReleaseStep::Docs),
                Err(e) => {
                    self.warn(report, format!("Documentation was not published: {:#}", e));
                    report.steps.failed(ReleaseStep::Docs, format!("{:#}", e));
                }
            }
        }

        // 13. Migrate
        if options.migrate {
            match migrate::migrate(
                c.vcs.as_ref(),
                c.templates.as_ref(),
                &self.project_path,
                &self.settings.workflow_template_url,
                &branch,
            )
            .await
            {
                Ok(migration_branch) => {
                    self.reporter.warn(&format!(
                        "Migration branch {} created and pushed. Now create a pull request and merge it!",
                        migration_branch
                    ));
                    report.steps.ok(ReleaseStep::Migrate);
                }
                Err(e) => {
                    self.warn(report, format!("Migration failed: {:#}", e));
                    report.steps.failed(ReleaseStep::Migrate, format!("{:#}", e));
                }
            }
        }

        Ok(None)
    }

    fn warn(&self, report: &mut ReleaseReport, message: String) {
        self.reporter.warn(&message);
        report.warnings.push(message);
    }

    /// `--org`, else the GitHub owner of the package, else the operator's choice
    async fn resolve_organization(
        &self,
        options: &ReleaseOptions,
        manifest: &Manifest,
    ) -> Result<String, ReleaseError> {
        let organization = match options
            .org
            .clone()
            .or_else(|| infer_organization(&manifest.package))
        {
            Some(organization) => organization,
            None => {
                if self.settings.organizations.is_empty() {
                    return Err(ReleaseError::OrganizationUnresolved);
                }
                let choices: Vec<Choice> = self
                    .settings
                    .organizations
                    .iter()
                    .map(Choice::plain)
                    .collect();
                self.collaborators
                    .prompter
                    .select("Choose an organization", &choices, None)
                    .await
                    .map_err(step_error(ReleaseStep::Authenticate))?
            }
        };

        Ok(self.settings.resolve_alias(&organization))
    }

    /// `None` when the operator declines a bump that differs from the
    /// recommendation
    async fn choose_bump(
        &self,
        options: &ReleaseOptions,
        current: &semver::Version,
    ) -> Result<Option<BumpType>, ReleaseError> {
        let c = &self.collaborators;
        let recommendation = c
            .changelog
            .recommend_bump(&self.settings.changelog_preset)
            .await
            .map_err(step_error(ReleaseStep::Bump))?;
        let recommended = recommendation.release_type;
        log::debug!("recommended bump: {}", recommended);

        println!("Current version: {}", current);
        match options.bump {
            None => {
                println!("{}", recommendation.reason);
                println!("Recommended bump: {}", format_bump(recommended, current)?);
                let choices: Vec<Choice> = bump_choices(current)?
                    .into_iter()
                    .map(|(bump, version)| {
                        Choice::new(format!("{} ({})", bump, version), bump.as_str())
                    })
                    .collect();
                let selected = c
                    .prompter
                    .select("Confirm bump", &choices, Some(recommended.as_str()))
                    .await
                    .map_err(step_error(ReleaseStep::Bump))?;
                selected
                    .parse::<BumpType>()
                    .map(Some)
                    .map_err(|e| ReleaseError::step(ReleaseStep::Bump, e))
            }
            Some(bump) if bump != recommended => {
                log::debug!("bump forced to {}", bump);
                println!(
                    "Recommended bump is {}.\nYou chose {} instead.",
                    format_bump(recommended, current)?,
                    format_bump(bump, current)?
                );
                let confirmed = c
                    .prompter
                    .confirm("Are you sure", false)
                    .await
                    .map_err(step_error(ReleaseStep::Bump))?;
                Ok(confirmed.then_some(bump))
            }
            Some(bump) => Ok(Some(bump)),
        }
    }

    /// Configured history file, else History.md when present, else CHANGELOG.md
    async fn history_path(&self) -> Result<PathBuf, ReleaseError> {
        if let Some(file) = &self.settings.changelog_file {
            return Ok(self.project_path.join(file));
        }

        let history = self.project_path.join(HISTORY_FILE);
        if fs::try_exists(&history).await? {
            Ok(history)
        } else {
            Ok(self.project_path.join(CHANGELOG_FILE))
        }
    }

    /// Prepend the newest release to an existing history, or write the whole
    /// history to a new one
    async fn update_history(
        &self,
        history_path: &Path,
        new_version: &str,
        manifest: &Manifest,
        report: &mut ReleaseReport,
    ) -> Result<(), ReleaseError> {
        let exists = fs::try_exists(history_path).await?;
        let request = ChangelogRequest {
            preset: self.settings.changelog_preset.clone(),
            release_count: ReleaseCount::from_count(if exists { 1 } else { 0 }),
            next_version: new_version.to_string(),
            repository_url: manifest.package.github_url(),
        };

        let generated = self
            .collaborators
            .changelog
            .generate(&request)
            .await
            .map_err(step_error(ReleaseStep::Changelog))?;

        if exists {
            if generated.trim().is_empty() {
                self.warn(report, "No history to write. There must be a problem.".to_string());
                return Ok(());
            }
            let current = fs::read(history_path).await?;
            let mut content = generated.into_bytes();
            content.extend_from_slice(&current);
            fs::write(history_path, content).await?;
        } else {
            fs::write(history_path, generated).await?;
        }

        Ok(())
    }

    /// Ask for a one-time password when the account requires one, then publish
    async fn publish(&self, options: &ReleaseOptions) -> anyhow::Result<String> {
        let c = &self.collaborators;
        let mode = match c.registry.two_factor_mode().await {
            Ok(mode) => mode,
            Err(e) => {
                log::warn!("could not read the two-factor mode: {:#}", e);
                TwoFactorMode::Disabled
            }
        };

        let otp = if mode.requires_otp_for_publish() {
            match &options.otp {
                Some(otp) => Some(otp.clone()),
                None => {
                    let code = c
                        .prompter
                        .input("Enter your npm two-factor OTP code")
                        .await?;
                    Some(SecretString::from(code))
                }
            }
        } else {
            None
        };

        c.registry.publish(otp.as_ref()).await
    }

    /// Delete the tag and undo the release commit after a failed publication
    async fn rollback(&self, version: &str, tag: &str, message: String) -> ReleaseError {
        self.reporter
            .error("npm publish failed, rolling back commits and tags");

        let vcs = &self.collaborators.vcs;
        let result = async {
            vcs.delete_tag(tag).await?;
            vcs.reset_last_commit().await
        }
        .await;

        match result {
            Ok(()) => ReleaseError::PublishFailed {
                version: version.to_string(),
                message,
            },
            Err(e) => ReleaseError::RollbackFailed {
                version: version.to_string(),
                message: format!("{:#} (publish error: {})", e, message),
            },
        }
    }

    /// Give the organization's team access to the package
    async fn grant_organization(
        &self,
        organization: &str,
        package_name: &str,
        report: &mut ReleaseReport,
    ) {
        let registry = &self.collaborators.registry;
        let team = self.settings.team_for(organization);

        let packages = match registry.team_packages(&team).await {
            Ok(packages) => Some(packages),
            Err(e) => {
                log::debug!("npm access ls-packages failed: {:#}", e);
                self.warn(report, format!("This team may not exist ({})", team));
                None
            }
        };

        if packages.is_some_and(|p| p.contains_key(package_name)) {
            report.steps.ok(ReleaseStep::OrganizationGrant);
            return;
        }

        println!("👥 Adding to organization");
        match registry.grant_read_write(&team, package_name).await {
            Ok(()) => report.steps.ok(ReleaseStep::OrganizationGrant),
            Err(e) => {
                self.warn(
                    report,
                    format!(
                        "Could not add the package to npm organization. Please go to https://www.npmjs.com/settings/{}/teams/team/{}/access and add {} to the team.",
                        organization, self.settings.team, package_name
                    ),
                );
                report
                    .steps
                    .failed(ReleaseStep::OrganizationGrant, format!("{:#}", e));
            }
        }
    }
}

fn relative_to(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base).unwrap_or(path).to_path_buf()
}
