//! Changelog plugin - conventional-commit history rendered as Markdown
//!
//! Releases are derived from the semver tags of the repository. Commits are
//! read with `git log` and parsed with `git-conventional`; anything that is
//! not a conventional commit is left out of the changelog.

use crate::core::traits::{
    BumpRecommendation, ChangelogGenerator, ChangelogRequest, ReleaseCount,
};
use crate::core::version::BumpType;
use crate::process::CommandExecutor;
use async_trait::async_trait;
use chrono::NaiveDate;
use git_conventional::Commit as ConventionalCommit;
use semver::Version;

/// Field and record separators of the `git log` format
const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

/// Changelog sections, in rendering order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Section {
    Features,
    BugFixes,
    Performance,
    Reverts,
}

impl Section {
    const ALL: [Section; 4] = [
        Section::Features,
        Section::BugFixes,
        Section::Performance,
        Section::Reverts,
    ];

    fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "feat" => Some(Self::Features),
            "fix" => Some(Self::BugFixes),
            "perf" => Some(Self::Performance),
            "revert" => Some(Self::Reverts),
            _ => None,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::Features => "Features",
            Self::BugFixes => "Bug Fixes",
            Self::Performance => "Performance Improvements",
            Self::Reverts => "Reverts",
        }
    }
}

/// A conventional commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommit {
    pub sha: String,
    pub kind: String,
    pub scope: Option<String>,
    pub description: String,
    pub breaking: bool,
    pub breaking_description: Option<String>,
}

impl ParsedCommit {
    /// `None` when the message does not follow the conventional-commit grammar
    pub fn parse(sha: &str, message: &str) -> Option<Self> {
        let cc = ConventionalCommit::parse(message.trim()).ok()?;

        Some(Self {
            sha: sha.to_string(),
            kind: cc.type_().as_str().to_lowercase(),
            scope: cc.scope().map(|s| s.to_string()),
            description: cc.description().to_string(),
            breaking: cc.breaking(),
            breaking_description: cc
                .breaking_description()
                .filter(|d| *d != cc.description())
                .map(|d| d.to_string()),
        })
    }

    fn section(&self) -> Option<Section> {
        Section::from_type(&self.kind)
    }
}

/// One release block of the changelog
#[derive(Debug, Clone)]
pub struct ReleaseEntry {
    pub version: String,
    /// Tag of the release before this one, for the compare link
    pub previous_tag: Option<String>,
    pub tag: String,
    pub date: NaiveDate,
    pub commits: Vec<ParsedCommit>,
}

/// Recommend a bump: breaking change -> major, feature -> minor, else patch
pub fn recommend(commits: &[ParsedCommit]) -> BumpRecommendation {
    let breaking = commits.iter().filter(|c| c.breaking).count();
    let features = commits.iter().filter(|c| c.kind == "feat").count();

    let release_type = if breaking > 0 {
        BumpType::Major
    } else if features > 0 {
        BumpType::Minor
    } else {
        BumpType::Patch
    };

    BumpRecommendation {
        release_type,
        reason: format!(
            "There are {} BREAKING CHANGES and {} features",
            breaking, features
        ),
    }
}

fn render_commit(commit: &ParsedCommit, text: &str, repository_url: Option<&str>) -> String {
    let mut line = String::from("* ");
    if let Some(scope) = &commit.scope {
        line.push_str(&format!("**{}:** ", scope));
    }
    line.push_str(text);

    let short: String = commit.sha.chars().take(7).collect();
    match repository_url {
        Some(url) => line.push_str(&format!(" ([{}]({}/commit/{}))", short, url, commit.sha)),
        None => line.push_str(&format!(" ({})", short)),
    }
    line.push('\n');
    line
}

/// Render one release as Markdown
pub fn render_release(entry: &ReleaseEntry, repository_url: Option<&str>) -> String {
    let mut out = match (repository_url, &entry.previous_tag) {
        (Some(url), Some(previous)) => format!(
            "## [{}]({}/compare/{}...{}) ({})\n\n",
            entry.version, url, previous, entry.tag, entry.date
        ),
        _ => format!("## {} ({})\n\n", entry.version, entry.date),
    };

    let breaking: Vec<_> = entry.commits.iter().filter(|c| c.breaking).collect();
    if !breaking.is_empty() {
        out.push_str("\n### ⚠ BREAKING CHANGES\n\n");
        for commit in breaking {
            let text = commit
                .breaking_description
                .as_deref()
                .unwrap_or(&commit.description);
            out.push_str(&render_commit(commit, text, repository_url));
        }
    }

    for section in Section::ALL {
        let commits: Vec<_> = entry
            .commits
            .iter()
            .filter(|c| c.section() == Some(section))
            .collect();
        if commits.is_empty() {
            continue;
        }

        out.push_str(&format!("\n### {}\n\n", section.title()));
        for commit in commits {
            out.push_str(&render_commit(commit, &commit.description, repository_url));
        }
    }

    out.push('\n');
    out
}

/// Render the `count` newest releases (all of them for [`ReleaseCount::All`])
pub fn render_changelog(
    releases: &[ReleaseEntry],
    count: ReleaseCount,
    repository_url: Option<&str>,
) -> String {
    let limit = count.limit().unwrap_or(releases.len());
    releases
        .iter()
        .take(limit)
        .map(|entry| render_release(entry, repository_url))
        .collect()
}

/// Parse `git log --format=%H%x1f%B%x1e` output, keeping conventional commits
pub fn parse_log(output: &str) -> Vec<ParsedCommit> {
    output
        .split(RECORD_SEP)
        .filter_map(|record| {
            let (sha, message) = record.trim_start().split_once(FIELD_SEP)?;
            ParsedCommit::parse(sha.trim(), message)
        })
        .collect()
}

/// A semver tag and its creation date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTag {
    pub name: String,
    pub version: Version,
    pub date: Option<NaiveDate>,
}

/// Parse `git tag --format=%(refname:short)%09%(creatordate:short)` output,
/// keeping semver tags, newest version first
pub fn parse_tags(output: &str) -> Vec<VersionTag> {
    let mut tags: Vec<VersionTag> = output
        .lines()
        .filter_map(|line| {
            let (name, date) = match line.split_once('\t') {
                Some((name, date)) => (name.trim(), Some(date.trim())),
                None => (line.trim(), None),
            };
            let version = Version::parse(name.strip_prefix('v').unwrap_or(name)).ok()?;
            Some(VersionTag {
                name: name.to_string(),
                version,
                date: date.and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            })
        })
        .collect();

    tags.sort_by(|a, b| b.version.cmp(&a.version));
    tags
}

/// Conventional-commit changelog backed by the git history
#[derive(Debug, Clone)]
pub struct ConventionalChangelog {
    executor: CommandExecutor,
}

impl ConventionalChangelog {
    pub fn new(executor: CommandExecutor) -> Self {
        Self { executor }
    }

    async fn tags(&self) -> anyhow::Result<Vec<VersionTag>> {
        let output = self
            .executor
            .run_checked(
                "git",
                &[
                    "tag",
                    "--list",
                    "--format=%(refname:short)%09%(creatordate:short)",
                ],
            )
            .await?;
        Ok(parse_tags(&output))
    }

    /// Conventional commits in `range` (`a..b`, or a single ref)
    async fn commits(&self, range: &str) -> anyhow::Result<Vec<ParsedCommit>> {
        let output = self
            .executor
            .run_checked("git", &["log", "--format=%H%x1f%B%x1e", range])
            .await?;
        Ok(parse_log(&output))
    }

    /// Commits not yet part of a tagged release
    async fn unreleased(&self, tags: &[VersionTag]) -> anyhow::Result<Vec<ParsedCommit>> {
        match tags.first() {
            Some(last) => self.commits(&format!("{}..HEAD", last.name)).await,
            None => self.commits("HEAD").await,
        }
    }
}

#[async_trait]
impl ChangelogGenerator for ConventionalChangelog {
    async fn recommend_bump(&self, preset: &str) -> anyhow::Result<BumpRecommendation> {
        let tags = self.tags().await?;
        let commits = self.unreleased(&tags).await?;
        let recommendation = recommend(&commits);

        log::debug!(
            "{} preset: {} commits since {}, recommending {}",
            preset,
            commits.len(),
            tags.first().map(|t| t.name.as_str()).unwrap_or("the first commit"),
            recommendation.release_type
        );

        Ok(recommendation)
    }

    async fn generate(&self, request: &ChangelogRequest) -> anyhow::Result<String> {
        let tags = self.tags().await?;
        let mut releases = Vec::new();

        // The upcoming release gets a heading even without conventional commits
        let already_tagged = tags.iter().any(|t| t.version.to_string() == request.next_version);
        if !already_tagged {
            let unreleased = self.unreleased(&tags).await?;
            releases.push(ReleaseEntry {
                version: request.next_version.clone(),
                previous_tag: tags.first().map(|t| t.name.clone()),
                tag: format!("v{}", request.next_version),
                date: chrono::Local::now().date_naive(),
                commits: unreleased,
            });
        }

        let limit = request.release_count.limit().unwrap_or(usize::MAX);
        for (i, tag) in tags.iter().enumerate() {
            if releases.len() >= limit {
                break;
            }

            let previous = tags.get(i + 1);
            let range = match previous {
                Some(previous) => format!("{}..{}", previous.name, tag.name),
                None => tag.name.clone(),
            };

            releases.push(ReleaseEntry {
                version: tag.version.to_string(),
                previous_tag: previous.map(|p| p.name.clone()),
                tag: tag.name.clone(),
                date: tag.date.unwrap_or_else(|| chrono::Local::now().date_naive()),
                commits: self.commits(&range).await?,
            });
        }

        Ok(render_changelog(
            &releases,
            request.release_count,
            request.repository_url.as_deref(),
        ))
    }
}
