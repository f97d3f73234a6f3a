//! Configuration structures and types for cheminfo-tools
//!
//! The file format mirrors the settings of the release workflow. Every field
//! is optional; [`ReleaseSettings::from_config`] resolves the defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_BRANCHES: &[&str] = &["master", "main"];
pub const DEFAULT_ORGANIZATIONS: &[&str] = &["mljs", "cheminfo"];
pub const DEFAULT_TEAM: &str = "developers";
pub const DEFAULT_TEST_SCRIPT: &str = "test";
pub const DEFAULT_PRESET: &str = "conventionalcommits";
pub const DEFAULT_DOCS_DIR: &str = "doc";
pub const DEFAULT_PAGES_BRANCH: &str = "gh-pages";
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";
pub const DEFAULT_TOOL_NAME: &str = "cheminfo-tools";
pub const DEFAULT_WORKFLOW_TEMPLATE_URL: &str =
    "https://raw.githubusercontent.com/cheminfo/.github/master/workflow-templates/release.yml";

/// Root configuration object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishConfig {
    /// Schema version (required)
    pub version: String,

    /// Extend from base configuration file (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<ReleaseConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub changelog: Option<ChangelogConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs: Option<DocsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrate: Option<MigrateConfig>,
}

/// Release workflow settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReleaseConfig {
    /// Branches a release may start from (default: master, main)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branches: Option<Vec<String>>,

    /// Organizations offered when none can be inferred
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizations: Option<Vec<String>>,

    /// Organization renames applied after resolution (e.g. cheminfo-js -> cheminfo)
    #[serde(skip_serializing_if = "Option::is_none", rename = "organizationAliases")]
    pub organization_aliases: Option<HashMap<String, String>>,

    /// Team granted access to published packages (default: developers)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,

    /// npm script running the tests (default: test)
    #[serde(skip_serializing_if = "Option::is_none", rename = "testScript")]
    pub test_script: Option<String>,

    /// Refuse to release when a release workflow exists (default: true)
    #[serde(skip_serializing_if = "Option::is_none", rename = "checkReleaseWorkflow")]
    pub check_release_workflow: Option<bool>,
}

/// Changelog settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChangelogConfig {
    /// Commit convention preset (default: conventionalcommits)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,

    /// History file name (default: History.md if present, else CHANGELOG.md)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Documentation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocsConfig {
    /// Generate docs after a release (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none", rename = "outputDir")]
    pub output_dir: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", rename = "pagesBranch")]
    pub pages_branch: Option<String>,
}

/// Registry settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegistryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Package name this tool is published under, for the up-to-date check
    #[serde(skip_serializing_if = "Option::is_none", rename = "toolName")]
    pub tool_name: Option<String>,
}

/// Settings for the GitHub actions migration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MigrateConfig {
    #[serde(skip_serializing_if = "Option::is_none", rename = "workflowTemplateUrl")]
    pub workflow_template_url: Option<String>,
}

/// Default configuration values
impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            extends: None,
            release: None,
            changelog: None,
            docs: None,
            registry: None,
            migrate: None,
        }
    }
}

/// Name and version of the running tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

/// Fully resolved settings handed to the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseSettings {
    pub tool: ToolInfo,
    pub branches: Vec<String>,
    pub organizations: Vec<String>,
    pub organization_aliases: HashMap<String, String>,
    pub team: String,
    pub test_script: String,
    pub check_release_workflow: bool,
    pub changelog_preset: String,
    pub changelog_file: Option<String>,
    pub docs_enabled: bool,
    pub docs_dir: String,
    pub pages_branch: String,
    pub registry_url: String,
    pub workflow_template_url: String,
}

impl ReleaseSettings {
    /// Resolve defaults. `tool_version` is the version of the running binary.
    pub fn from_config(config: &PublishConfig, tool_version: &str) -> Self {
        let release = config.release.clone().unwrap_or_default();
        let changelog = config.changelog.clone().unwrap_or_default();
        let docs = config.docs.clone().unwrap_or_default();
        let registry = config.registry.clone().unwrap_or_default();
        let migrate = config.migrate.clone().unwrap_or_default();

        let mut organization_aliases = HashMap::new();
        organization_aliases.insert("cheminfo-js".to_string(), "cheminfo".to_string());
        if let Some(aliases) = release.organization_aliases {
            organization_aliases.extend(aliases);
        }

        Self {
            tool: ToolInfo {
                name: registry
                    .tool_name
                    .unwrap_or_else(|| DEFAULT_TOOL_NAME.to_string()),
                version: tool_version.to_string(),
            },
            branches: release
                .branches
                .unwrap_or_else(|| DEFAULT_BRANCHES.iter().map(|s| s.to_string()).collect()),
            organizations: release.organizations.unwrap_or_else(|| {
                DEFAULT_ORGANIZATIONS.iter().map(|s| s.to_string()).collect()
            }),
            organization_aliases,
            team: release.team.unwrap_or_else(|| DEFAULT_TEAM.to_string()),
            test_script: release
                .test_script
                .unwrap_or_else(|| DEFAULT_TEST_SCRIPT.to_string()),
            check_release_workflow: release.check_release_workflow.unwrap_or(true),
            changelog_preset: changelog
                .preset
                .unwrap_or_else(|| DEFAULT_PRESET.to_string()),
            changelog_file: changelog.file,
            docs_enabled: docs.enabled.unwrap_or(true),
            docs_dir: docs.output_dir.unwrap_or_else(|| DEFAULT_DOCS_DIR.to_string()),
            pages_branch: docs
                .pages_branch
                .unwrap_or_else(|| DEFAULT_PAGES_BRANCH.to_string()),
            registry_url: registry
                .url
                .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string()),
            workflow_template_url: migrate
                .workflow_template_url
                .unwrap_or_else(|| DEFAULT_WORKFLOW_TEMPLATE_URL.to_string()),
        }
    }

    /// `org:team`
    pub fn team_for(&self, organization: &str) -> String {
        format!("{}:{}", organization, self.team)
    }

    /// Apply configured organization renames
    pub fn resolve_alias(&self, organization: &str) -> String {
        self.organization_aliases
            .get(organization)
            .cloned()
            .unwrap_or_else(|| organization.to_string())
    }
}

impl Default for ReleaseSettings {
    fn default() -> Self {
        Self::from_config(&PublishConfig::default(), env!("CARGO_PKG_VERSION"))
    }
}
