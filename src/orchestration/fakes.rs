//! Recording fakes of the collaborator traits

use crate::core::traits::*;
use crate::core::version::BumpType;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Top-level files of a directory and their contents
type Snapshot = HashMap<PathBuf, Vec<u8>>;

fn snapshot(dir: &Path) -> Snapshot {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .map(|entry| (entry.path(), std::fs::read(entry.path()).unwrap()))
        .collect()
}

fn restore(dir: &Path, snapshot: &Snapshot) {
    for (path, _) in self::snapshot(dir) {
        if !snapshot.contains_key(&path) {
            std::fs::remove_file(path).unwrap();
        }
    }
    for (path, content) in snapshot {
        std::fs::write(path, content).unwrap();
    }
}

fn check(fail_on: &HashSet<String>, op: &str) -> anyhow::Result<()> {
    if fail_on.contains(op) {
        anyhow::bail!("{} failed", op);
    }
    Ok(())
}

// ============================================================================
// Version control
// ============================================================================

struct VcsState {
    branch: String,
    dirty: bool,
    head: Snapshot,
    /// Snapshots of the parents of the commits created so far
    parents: Vec<Snapshot>,
    tags: Vec<String>,
    calls: Vec<String>,
}

/// Git working copy over a real directory: commits snapshot its top-level
/// files so a reset restores them.
pub struct FakeVcs {
    dir: PathBuf,
    fail_on: HashSet<String>,
    /// Files written into the working copy by `pull_rebase`
    upstream: Vec<(PathBuf, String)>,
    state: Mutex<VcsState>,
}

impl FakeVcs {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            fail_on: HashSet::new(),
            upstream: Vec::new(),
            state: Mutex::new(VcsState {
                branch: "main".to_string(),
                dirty: false,
                head: snapshot(dir),
                parents: Vec::new(),
                tags: Vec::new(),
                calls: Vec::new(),
            }),
        }
    }

    pub fn on_branch(self, branch: &str) -> Self {
        self.state.lock().unwrap().branch = branch.to_string();
        self
    }

    pub fn dirty(self) -> Self {
        self.state.lock().unwrap().dirty = true;
        self
    }

    /// Make an operation (e.g. "push_follow_tags") fail
    pub fn failing(mut self, op: &str) -> Self {
        self.fail_on.insert(op.to_string());
        self
    }

    /// Make `pull_rebase` bring in a file
    pub fn pulling(mut self, file: &str, content: &str) -> Self {
        self.upstream.push((PathBuf::from(file), content.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn commit_count(&self) -> usize {
        self.state.lock().unwrap().parents.len()
    }

    pub fn tags(&self) -> Vec<String> {
        self.state.lock().unwrap().tags.clone()
    }

    fn record(&self, call: String, op: &str) -> anyhow::Result<()> {
        self.state.lock().unwrap().calls.push(call);
        check(&self.fail_on, op)
    }
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn current_branch(&self) -> anyhow::Result<String> {
        check(&self.fail_on, "current_branch")?;
        Ok(self.state.lock().unwrap().branch.clone())
    }

    async fn has_changes(&self) -> anyhow::Result<bool> {
        check(&self.fail_on, "has_changes")?;
        Ok(self.state.lock().unwrap().dirty)
    }

    async fn pull_rebase(&self) -> anyhow::Result<()> {
        self.record("pull --rebase".to_string(), "pull_rebase")?;
        for (file, content) in &self.upstream {
            let path = self.dir.join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        Ok(())
    }

    async fn add(&self, paths: &[PathBuf]) -> anyhow::Result<()> {
        let paths: Vec<_> = paths.iter().map(|p| p.display().to_string()).collect();
        self.record(format!("add {}", paths.join(" ")), "add")
    }

    async fn commit(&self, message: &str) -> anyhow::Result<()> {
        self.record(format!("commit -m {}", message), "commit")?;
        let mut state = self.state.lock().unwrap();
        let current = snapshot(&self.dir);
        let parent = std::mem::replace(&mut state.head, current);
        state.parents.push(parent);
        Ok(())
    }

    async fn tag_annotated(&self, name: &str, message: &str) -> anyhow::Result<()> {
        self.record(format!("tag -a {} -m {}", name, message), "tag_annotated")?;
        self.state.lock().unwrap().tags.push(name.to_string());
        Ok(())
    }

    async fn delete_tag(&self, name: &str) -> anyhow::Result<()> {
        self.record(format!("tag -d {}", name), "delete_tag")?;
        self.state.lock().unwrap().tags.retain(|t| t != name);
        Ok(())
    }

    async fn reset_last_commit(&self) -> anyhow::Result<()> {
        self.record("reset --hard HEAD~1".to_string(), "reset_last_commit")?;
        let mut state = self.state.lock().unwrap();
        let parent = state
            .parents
            .pop()
            .ok_or_else(|| anyhow::anyhow!("no commit to reset"))?;
        restore(&self.dir, &parent);
        state.head = parent;
        Ok(())
    }

    async fn push_follow_tags(&self) -> anyhow::Result<()> {
        self.record("push --follow-tags".to_string(), "push_follow_tags")
    }

    async fn checkout(&self, branch: &str, create: bool) -> anyhow::Result<()> {
        let call = if create {
            format!("checkout -b {}", branch)
        } else {
            format!("checkout {}", branch)
        };
        self.record(call, "checkout")?;
        self.state.lock().unwrap().branch = branch.to_string();
        Ok(())
    }

    async fn push_upstream(&self, branch: &str) -> anyhow::Result<()> {
        self.record(format!("push -u origin {}", branch), "push_upstream")
    }
}

// ============================================================================
// Registry
// ============================================================================

pub struct FakeRegistry {
    pub user: String,
    pub members: HashMap<String, Vec<String>>,
    pub packages: HashMap<String, HashMap<String, String>>,
    pub two_factor: TwoFactorMode,
    pub latest: HashMap<String, String>,
    fail_on: HashSet<String>,
    calls: Mutex<Vec<String>>,
    otps: Mutex<Vec<Option<String>>>,
}

impl FakeRegistry {
    /// `user` is a member of `team`
    pub fn new(user: &str, team: &str) -> Self {
        let mut members = HashMap::new();
        members.insert(team.to_string(), vec![user.to_string()]);
        Self {
            user: user.to_string(),
            members,
            packages: HashMap::new(),
            two_factor: TwoFactorMode::Disabled,
            latest: HashMap::new(),
            fail_on: HashSet::new(),
            calls: Mutex::new(Vec::new()),
            otps: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, op: &str) -> Self {
        self.fail_on.insert(op.to_string());
        self
    }

    pub fn with_latest(mut self, package: &str, version: &str) -> Self {
        self.latest.insert(package.to_string(), version.to_string());
        self
    }

    pub fn with_team_package(mut self, team: &str, package: &str) -> Self {
        self.packages
            .entry(team.to_string())
            .or_default()
            .insert(package.to_string(), "read-write".to_string());
        self
    }

    pub fn with_two_factor(mut self, mode: TwoFactorMode) -> Self {
        self.two_factor = mode;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// OTPs passed to each publish call
    pub fn otps(&self) -> Vec<Option<String>> {
        self.otps.lock().unwrap().clone()
    }

    fn record(&self, call: String, op: &str) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(call);
        check(&self.fail_on, op)
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn whoami(&self) -> anyhow::Result<String> {
        self.record("whoami".to_string(), "whoami")?;
        Ok(self.user.clone())
    }

    async fn team_members(&self, team: &str) -> anyhow::Result<Vec<String>> {
        self.record(format!("team ls {}", team), "team_members")?;
        self.members
            .get(team)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("404 team {} not found", team))
    }

    async fn team_packages(&self, team: &str) -> anyhow::Result<HashMap<String, String>> {
        self.record(format!("access ls-packages {}", team), "team_packages")?;
        Ok(self.packages.get(team).cloned().unwrap_or_default())
    }

    async fn grant_read_write(&self, team: &str, package: &str) -> anyhow::Result<()> {
        self.record(
            format!("access grant read-write {} {}", team, package),
            "grant_read_write",
        )
    }

    async fn two_factor_mode(&self) -> anyhow::Result<TwoFactorMode> {
        check(&self.fail_on, "two_factor_mode")?;
        Ok(self.two_factor)
    }

    async fn publish(&self, otp: Option<&SecretString>) -> anyhow::Result<String> {
        self.otps
            .lock()
            .unwrap()
            .push(otp.map(|o| o.expose_secret().to_string()));
        self.record("publish".to_string(), "publish")?;
        Ok("+ pkg".to_string())
    }

    async fn latest_version(&self, package: &str) -> anyhow::Result<String> {
        check(&self.fail_on, "latest_version")?;
        self.latest
            .get(package)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("404 Not Found"))
    }
}

// ============================================================================
// Tests, changelog, docs, templates
// ============================================================================

#[derive(Default)]
pub struct FakeTestRunner {
    pub fail: bool,
    runs: Mutex<usize>,
}

impl FakeTestRunner {
    pub fn failing() -> Self {
        Self {
            fail: true,
            runs: Mutex::new(0),
        }
    }

    pub fn runs(&self) -> usize {
        *self.runs.lock().unwrap()
    }
}

#[async_trait]
impl TestRunner for FakeTestRunner {
    async fn run_tests(&self) -> anyhow::Result<String> {
        *self.runs.lock().unwrap() += 1;
        if self.fail {
            anyhow::bail!("1 failing");
        }
        Ok("all tests passed".to_string())
    }
}

pub struct FakeChangelog {
    pub recommendation: BumpType,
    /// Text generated for a window of one release
    pub latest: String,
    /// Text generated for the whole history
    pub full: String,
    requests: Mutex<Vec<ReleaseCount>>,
}

impl FakeChangelog {
    pub fn recommending(bump: BumpType) -> Self {
        Self {
            recommendation: bump,
            latest: "## 1.3.0 (2024-01-01)\n\n* new entry\n\n".to_string(),
            full: "## 1.3.0 (2024-01-01)\n\n## 1.2.3 (2023-01-01)\n\n".to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latest(mut self, text: &str) -> Self {
        self.latest = text.to_string();
        self
    }

    pub fn requests(&self) -> Vec<ReleaseCount> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChangelogGenerator for FakeChangelog {
    async fn recommend_bump(&self, _preset: &str) -> anyhow::Result<BumpRecommendation> {
        Ok(BumpRecommendation {
            release_type: self.recommendation,
            reason: "There are 0 BREAKING CHANGES and 1 features".to_string(),
        })
    }

    async fn generate(&self, request: &ChangelogRequest) -> anyhow::Result<String> {
        self.requests.lock().unwrap().push(request.release_count);
        Ok(match request.release_count {
            ReleaseCount::All => self.full.clone(),
            ReleaseCount::Latest(_) => self.latest.clone(),
        })
    }
}

pub struct FakeDocs {
    pub outcome: Option<DocsOutcome>,
    calls: Mutex<Vec<(bool, String)>>,
}

impl FakeDocs {
    pub fn new(outcome: DocsOutcome) -> Self {
        Self {
            outcome: Some(outcome),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            outcome: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(bool, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocsGenerator for FakeDocs {
    async fn generate(&self, publish: bool, branch: &str) -> anyhow::Result<DocsOutcome> {
        self.calls.lock().unwrap().push((publish, branch.to_string()));
        self.outcome
            .clone()
            .ok_or_else(|| anyhow::anyhow!("documentation build failed"))
    }
}

pub struct FakeTemplates {
    pub template: String,
    urls: Mutex<Vec<String>>,
}

impl FakeTemplates {
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TemplateSource for FakeTemplates {
    async fn fetch(&self, url: &str) -> anyhow::Result<String> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(self.template.clone())
    }
}

// ============================================================================
// Prompter
// ============================================================================

#[derive(Debug, Clone)]
enum Answer {
    Confirm(bool),
    Select(String),
    Input(String),
}

/// Answers prompts from a script, in order
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Answer>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn confirm_with(self, answer: bool) -> Self {
        self.answers.lock().unwrap().push_back(Answer::Confirm(answer));
        self
    }

    pub fn select_with(self, value: &str) -> Self {
        self.answers
            .lock()
            .unwrap()
            .push_back(Answer::Select(value.to_string()));
        self
    }

    pub fn input_with(self, value: &str) -> Self {
        self.answers
            .lock()
            .unwrap()
            .push_back(Answer::Input(value.to_string()));
        self
    }

    /// Messages of the prompts shown so far
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }

    fn next(&self, message: &str) -> anyhow::Result<Answer> {
        self.asked.lock().unwrap().push(message.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("unexpected prompt: {}", message))
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn confirm(&self, message: &str, _default: bool) -> anyhow::Result<bool> {
        match self.next(message)? {
            Answer::Confirm(answer) => Ok(answer),
            other => anyhow::bail!("expected a confirmation for {:?}, got {:?}", message, other),
        }
    }

    async fn select(
        &self,
        message: &str,
        choices: &[Choice],
        _default: Option<&str>,
    ) -> anyhow::Result<String> {
        match self.next(message)? {
            Answer::Select(value) if choices.iter().any(|c| c.value == value) => Ok(value),
            other => anyhow::bail!("invalid answer {:?} for {:?}", other, message),
        }
    }

    async fn input(&self, message: &str) -> anyhow::Result<String> {
        match self.next(message)? {
            Answer::Input(value) => Ok(value),
            other => anyhow::bail!("expected text for {:?}, got {:?}", message, other),
        }
    }
}
