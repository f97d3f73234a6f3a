//! package.json handling
//!
//! The manifest is only ever read into memory for inspection. Writes go
//! through [`rewrite_version`], which substitutes the version string in the
//! raw text so the rest of the file keeps its exact formatting.

use git_url_parse::GitUrl;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::error::ReleaseError;

pub const MANIFEST_FILE: &str = "package.json";
pub const LOCK_FILE: &str = "package-lock.json";

lazy_static! {
    static ref VERSION_FIELD: Regex =
        Regex::new(r#"("version"\s*:\s*")[^"]+(")"#).expect("valid version regex");
    static ref GITHUB_SHORTHAND: Regex =
        Regex::new(r"^(?:github:)?([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?$")
            .expect("valid shorthand regex");
}

/// `repository` field: either `"org/repo"`-style shorthand or `{ "url": ... }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Repository {
    Shorthand(String),
    Detailed {
        #[serde(default)]
        url: Option<String>,
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
    },
}

/// `bugs` field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Bugs {
    Url(String),
    Detailed {
        #[serde(default)]
        url: Option<String>,
    },
}

/// Package.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PackageJson {
    pub name: Option<String>,
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bugs: Option<Bugs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scripts: Option<HashMap<String, String>>,
}

impl PackageJson {
    /// First URL-like value that can identify the GitHub repository
    fn repository_hint(&self) -> Option<&str> {
        let from_repository = match &self.repository {
            Some(Repository::Shorthand(s)) => Some(s.as_str()),
            Some(Repository::Detailed { url, .. }) => url.as_deref(),
            None => None,
        };
        let from_bugs = match &self.bugs {
            Some(Bugs::Url(s)) => Some(s.as_str()),
            Some(Bugs::Detailed { url }) => url.as_deref(),
            None => None,
        };

        from_repository
            .or(from_bugs)
            .or(self.homepage.as_deref())
    }

    /// `(owner, repo)` of the GitHub repository this package lives in
    pub fn github_repository(&self) -> Option<(String, String)> {
        self.repository_hint().and_then(parse_github_url)
    }

    /// `https://github.com/<owner>/<repo>`
    pub fn github_url(&self) -> Option<String> {
        self.github_repository()
            .map(|(owner, repo)| format!("https://github.com/{}/{}", owner, repo))
    }
}

/// Extract `(owner, repo)` from the usual ways a GitHub repository is written
/// in package.json.
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    let url = url.trim();
    if let Some(captures) = GITHUB_SHORTHAND.captures(url) {
        return Some((captures[1].to_string(), captures[2].to_string()));
    }

    // npm writes `git+https://` and `git+ssh://`
    let parsed = GitUrl::parse(url.strip_prefix("git+").unwrap_or(url)).ok()?;
    let host = parsed.host.as_deref()?;
    if host != "github.com" && !host.ends_with(".github.com") {
        return None;
    }

    // Only the first two segments: `/org/repo/issues` is still `org/repo`
    let mut segments = parsed
        .path
        .trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let repo = segments.next()?.trim_end_matches(".git");
    Some((owner.to_string(), repo.to_string()))
}

/// Organization the package belongs to, inferred from its repository,
/// bugs or homepage URL.
pub fn infer_organization(pkg: &PackageJson) -> Option<String> {
    pkg.github_repository().map(|(owner, _)| owner)
}

/// Replace the first `"version": "..."` occurrence, leaving every other byte
/// untouched. Returns `None` when the text has no version field.
pub fn rewrite_version(content: &str, new_version: &str) -> Option<String> {
    if !VERSION_FIELD.is_match(content) {
        return None;
    }
    let replacement = format!("${{1}}{}${{2}}", new_version);
    Some(VERSION_FIELD.replacen(content, 1, replacement.as_str()).into_owned())
}

/// Package manifest loaded from a project directory
#[derive(Debug, Clone)]
pub struct Manifest {
    pub package: PackageJson,
    pub path: PathBuf,
    pub lock_path: Option<PathBuf>,
}

impl Manifest {
    /// Read package.json (and detect package-lock.json) from `project_path`
    pub async fn load(project_path: &Path) -> Result<Self, ReleaseError> {
        let path = project_path.join(MANIFEST_FILE);
        let content = fs::read_to_string(&path).await.map_err(|e| {
            ReleaseError::InvalidManifest {
                message: format!("cannot read {}: {}", path.display(), e),
            }
        })?;
        let package: PackageJson =
            serde_json::from_str(&content).map_err(|e| ReleaseError::InvalidManifest {
                message: e.to_string(),
            })?;

        let lock_path = project_path.join(LOCK_FILE);
        let lock_path = if fs::metadata(&lock_path).await.is_ok() {
            Some(lock_path)
        } else {
            None
        };

        Ok(Self {
            package,
            path,
            lock_path,
        })
    }

    pub fn has_lock_file(&self) -> bool {
        self.lock_path.is_some()
    }

    pub fn name(&self) -> Result<&str, ReleaseError> {
        self.package
            .name
            .as_deref()
            .ok_or_else(|| ReleaseError::InvalidManifest {
                message: "name is a required field".to_string(),
            })
    }

    pub fn version(&self) -> Result<&str, ReleaseError> {
        self.package
            .version
            .as_deref()
            .ok_or_else(|| ReleaseError::InvalidManifest {
                message: "version is a required field".to_string(),
            })
    }

    /// Rewrite the version in package.json and, if present, package-lock.json
    pub async fn write_version(&self, new_version: &str) -> Result<(), ReleaseError> {
        log::debug!("update version in {}", MANIFEST_FILE);
        rewrite_file_version(&self.path, new_version).await?;

        if let Some(lock_path) = &self.lock_path {
            log::debug!("update version in {}", LOCK_FILE);
            rewrite_file_version(lock_path, new_version).await?;
        }

        Ok(())
    }
}

async fn rewrite_file_version(path: &Path, new_version: &str) -> Result<(), ReleaseError> {
    let content = fs::read_to_string(path).await?;
    let updated = rewrite_version(&content, new_version).ok_or_else(|| {
        ReleaseError::InvalidManifest {
            message: format!("no version field in {}", path.display()),
        }
    })?;
    fs::write(path, updated).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pkg(json: &str) -> PackageJson {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_org_from_repository_full_url() {
        let p = pkg(r#"{"repository": "https://github.com/org/repo.git"}"#);
        assert_eq!(infer_organization(&p), Some("org".to_string()));
    }

    #[test]
    fn test_org_from_repository_shorthand() {
        let p = pkg(r#"{"repository": "org/repo"}"#);
        assert_eq!(infer_organization(&p), Some("org".to_string()));

        let p = pkg(r#"{"repository": "github:org/repo"}"#);
        assert_eq!(infer_organization(&p), Some("org".to_string()));
    }

    #[test]
    fn test_org_from_repository_ssh_url() {
        let p = pkg(r#"{"repository": "git@github.com:cheminfo/rest-on-couch-client.git"}"#);
        assert_eq!(infer_organization(&p), Some("cheminfo".to_string()));
    }

    #[test]
    fn test_org_from_repository_object() {
        let p = pkg(r#"{"repository": {"type": "git", "url": "git+https://github.com/mljs/matrix.git"}}"#);
        assert_eq!(infer_organization(&p), Some("mljs".to_string()));
    }

    #[test]
    fn test_org_from_bugs() {
        let p = pkg(r#"{"bugs": {"url": "https://github.com/org/repo/issues"}}"#);
        assert_eq!(infer_organization(&p), Some("org".to_string()));
    }

    #[test]
    fn test_org_from_homepage() {
        let p = pkg(r#"{"homepage": "https://github.com/org/repo#readme"}"#);
        assert_eq!(infer_organization(&p), Some("org".to_string()));
    }

    #[test]
    fn test_parse_github_url_forms() {
        let expected = Some(("cheminfo".to_string(), "mass-tools".to_string()));
        for url in [
            "https://github.com/cheminfo/mass-tools",
            "https://github.com/cheminfo/mass-tools.git",
            "git+https://github.com/cheminfo/mass-tools.git",
            "git+ssh://git@github.com/cheminfo/mass-tools.git",
            "git://github.com/cheminfo/mass-tools.git",
            "git@github.com:cheminfo/mass-tools.git",
            "https://github.com/cheminfo/mass-tools/issues",
            "https://github.com/cheminfo/mass-tools#readme",
            "github:cheminfo/mass-tools",
            "cheminfo/mass-tools",
        ] {
            assert_eq!(parse_github_url(url), expected, "{}", url);
        }

        assert_eq!(parse_github_url("https://gitlab.com/cheminfo/mass-tools"), None);
        assert_eq!(parse_github_url("git@gitlab.com:cheminfo/mass-tools.git"), None);
        assert_eq!(parse_github_url("https://github.com/cheminfo"), None);
    }

    #[test]
    fn test_org_unresolved() {
        assert_eq!(infer_organization(&pkg("{}")), None);

        let p = pkg(r#"{"homepage": "https://example.com/docs"}"#);
        assert_eq!(infer_organization(&p), None);
    }

    #[test]
    fn test_repository_takes_precedence_over_homepage() {
        let p = pkg(
            r#"{"repository": "first/repo", "homepage": "https://github.com/second/repo#readme"}"#,
        );
        assert_eq!(infer_organization(&p), Some("first".to_string()));
    }

    #[test]
    fn test_github_url() {
        let p = pkg(r#"{"repository": "git://github.com/cheminfo/openchemlib-js.git"}"#);
        assert_eq!(
            p.github_url(),
            Some("https://github.com/cheminfo/openchemlib-js".to_string())
        );
    }

    #[test]
    fn test_rewrite_version_preserves_formatting() {
        let content = "{\n  \"name\": \"pkg\",\n  \"version\": \"1.2.3\",\n  \"dependencies\": {\n    \"dep\": {\"version\": \"9.9.9\"}\n  }\n}\n";
        let updated = rewrite_version(content, "1.3.0").unwrap();

        assert_eq!(
            updated,
            "{\n  \"name\": \"pkg\",\n  \"version\": \"1.3.0\",\n  \"dependencies\": {\n    \"dep\": {\"version\": \"9.9.9\"}\n  }\n}\n"
        );
    }

    #[test]
    fn test_rewrite_version_without_field() {
        assert_eq!(rewrite_version("{\"name\": \"x\"}", "1.0.0"), None);
    }

    #[tokio::test]
    async fn test_load_and_write_version() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(MANIFEST_FILE),
            "{\n  \"name\": \"pkg\",\n  \"version\": \"0.1.0\"\n}\n",
        )
        .unwrap();
        std::fs::write(
            temp_dir.path().join(LOCK_FILE),
            "{\n  \"name\": \"pkg\",\n  \"version\": \"0.1.0\",\n  \"lockfileVersion\": 1\n}\n",
        )
        .unwrap();

        let manifest = Manifest::load(temp_dir.path()).await.unwrap();
        assert!(manifest.has_lock_file());
        assert_eq!(manifest.name().unwrap(), "pkg");
        assert_eq!(manifest.version().unwrap(), "0.1.0");

        manifest.write_version("0.2.0").await.unwrap();

        let reloaded = Manifest::load(temp_dir.path()).await.unwrap();
        assert_eq!(reloaded.version().unwrap(), "0.2.0");
        let lock = std::fs::read_to_string(temp_dir.path().join(LOCK_FILE)).unwrap();
        assert!(lock.contains("\"version\": \"0.2.0\""));
        assert!(lock.contains("\"lockfileVersion\": 1"));
    }

    #[tokio::test]
    async fn test_load_missing_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let result = Manifest::load(temp_dir.path()).await;
        assert!(matches!(result, Err(ReleaseError::InvalidManifest { .. })));
    }
}
