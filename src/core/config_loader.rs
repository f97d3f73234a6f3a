//! Configuration file loader for cheminfo-tools
//!
//! This module provides configuration loading, validation, and merging capabilities.

use super::config::*;
use crate::core::error::ReleaseError;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Configuration file name
pub const CONFIG_FILENAME: &str = ".cheminfo-publish.yaml";

lazy_static! {
    /// Environment variable pattern (${VAR_NAME})
    static ref ENV_VAR_PATTERN: Regex =
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var regex");
}

/// Configuration load options
#[derive(Debug, Clone)]
pub struct ConfigLoadOptions {
    /// Project path to load config from
    pub project_path: PathBuf,

    /// Directory holding the global config (usually `$HOME`)
    pub home_dir: Option<PathBuf>,

    /// CLI arguments (highest priority)
    pub cli_args: Option<PublishConfig>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

impl ConfigLoadOptions {
    /// Options reading the real environment
    pub fn from_env(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            home_dir: env::var_os("HOME").map(PathBuf::from),
            cli_args: None,
            env: env::vars().collect(),
        }
    }
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    pub valid: bool,
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "release.branches")
    pub field: String,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. Project config (./.cheminfo-publish.yaml)
    /// 4. Global config (~/.cheminfo-publish.yaml)
    /// 5. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<PublishConfig, ReleaseError> {
        let mut configs: Vec<PublishConfig> = vec![PublishConfig::default()];

        if let Some(home_dir) = &options.home_dir {
            if let Some(global_config) =
                Self::load_config_file(&home_dir.join(CONFIG_FILENAME), HashSet::new()).await?
            {
                log::debug!("loaded global config from {}", home_dir.display());
                configs.push(global_config);
            }
        }

        let project_config_path = options.project_path.join(CONFIG_FILENAME);
        if let Some(project_config) = Self::load_config_file(&project_config_path, HashSet::new()).await? {
            log::debug!("loaded project config from {}", project_config_path.display());
            configs.push(project_config);
        }

        if let Some(env_config) = Self::load_env_config(&options.env) {
            configs.push(env_config);
        }

        if let Some(cli_config) = options.cli_args {
            configs.push(cli_config);
        }

        let merged_config = Self::merge_configs(configs);

        Ok(Self::expand_env_vars(merged_config, &options.env))
    }

    /// Load configuration from YAML file, following `extends`. `visited`
    /// holds the canonical paths of the files already on the chain.
    fn load_config_file(
        file_path: &Path,
        mut visited: HashSet<PathBuf>,
    ) -> std::pin::Pin<
        Box<
            dyn std::future::Future<Output = Result<Option<PublishConfig>, ReleaseError>>
                + Send
                + '_,
        >,
    > {
        Box::pin(async move {
            if !file_path.exists() {
                return Ok(None);
            }

            let canonical = fs::canonicalize(file_path).await.map_err(|e| {
                ReleaseError::ConfigError(format!("Failed to resolve config file: {}", e))
            })?;
            if !visited.insert(canonical) {
                return Err(ReleaseError::ConfigError(format!(
                    "circular extends: {}",
                    file_path.display()
                )));
            }

            let content = fs::read_to_string(file_path).await.map_err(|e| {
                ReleaseError::ConfigError(format!("Failed to read config file: {}", e))
            })?;

            let config: PublishConfig = serde_yaml::from_str(&content).map_err(|e| {
                ReleaseError::ConfigError(format!(
                    "Failed to parse YAML config {}: {}",
                    file_path.display(),
                    e
                ))
            })?;

            if let Some(extends_path) = &config.extends {
                let base_path = file_path
                    .parent()
                    .ok_or_else(|| {
                        ReleaseError::ConfigError("Invalid config file path".to_string())
                    })?
                    .join(extends_path);

                if let Some(base_config) = Self::load_config_file(&base_path, visited).await? {
                    return Ok(Some(Self::merge_configs(vec![base_config, config])));
                }
            }

            Ok(Some(config))
        })
    }

    /// Load configuration from environment variables
    fn load_env_config(env: &HashMap<String, String>) -> Option<PublishConfig> {
        let mut config = PublishConfig::default();
        let mut has_changes = false;

        // CHEMINFO_PUBLISH_BRANCHES -> release.branches (comma separated)
        if let Some(branches) = env.get("CHEMINFO_PUBLISH_BRANCHES") {
            let branches: Vec<String> = branches
                .split(',')
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())
                .collect();
            if !branches.is_empty() {
                config.release.get_or_insert_with(Default::default).branches = Some(branches);
                has_changes = true;
            }
        }

        // CHEMINFO_PUBLISH_TEAM -> release.team
        if let Some(team) = env.get("CHEMINFO_PUBLISH_TEAM") {
            config.release.get_or_insert_with(Default::default).team = Some(team.clone());
            has_changes = true;
        }

        // CHEMINFO_PUBLISH_REGISTRY_URL -> registry.url
        if let Some(url) = env.get("CHEMINFO_PUBLISH_REGISTRY_URL") {
            config.registry = Some(RegistryConfig {
                url: Some(url.clone()),
                tool_name: None,
            });
            has_changes = true;
        }

        if has_changes { Some(config) } else { None }
    }

    /// Merge multiple configurations with priority
    fn merge_configs(configs: Vec<PublishConfig>) -> PublishConfig {
        let mut result = PublishConfig::default();

        for config in configs {
            Self::merge_into(&mut result, config);
        }

        result
    }

    /// Merge source config into target, field by field
    fn merge_into(target: &mut PublishConfig, source: PublishConfig) {
        if !source.version.is_empty() {
            target.version = source.version;
        }

        if source.extends.is_some() {
            target.extends = source.extends;
        }

        if let Some(source_release) = source.release {
            let target_release = target.release.get_or_insert_with(Default::default);
            if source_release.branches.is_some() {
                target_release.branches = source_release.branches;
            }
            if source_release.organizations.is_some() {
                target_release.organizations = source_release.organizations;
            }
            if let Some(aliases) = source_release.organization_aliases {
                target_release
                    .organization_aliases
                    .get_or_insert_with(HashMap::new)
                    .extend(aliases);
            }
            if source_release.team.is_some() {
                target_release.team = source_release.team;
            }
            if source_release.test_script.is_some() {
                target_release.test_script = source_release.test_script;
            }
            if source_release.check_release_workflow.is_some() {
                target_release.check_release_workflow = source_release.check_release_workflow;
            }
        }

        if let Some(source_changelog) = source.changelog {
            let target_changelog = target.changelog.get_or_insert_with(Default::default);
            if source_changelog.preset.is_some() {
                target_changelog.preset = source_changelog.preset;
            }
            if source_changelog.file.is_some() {
                target_changelog.file = source_changelog.file;
            }
        }

        if let Some(source_docs) = source.docs {
            let target_docs = target.docs.get_or_insert_with(Default::default);
            if source_docs.enabled.is_some() {
                target_docs.enabled = source_docs.enabled;
            }
            if source_docs.output_dir.is_some() {
                target_docs.output_dir = source_docs.output_dir;
            }
            if source_docs.pages_branch.is_some() {
                target_docs.pages_branch = source_docs.pages_branch;
            }
        }

        if let Some(source_registry) = source.registry {
            let target_registry = target.registry.get_or_insert_with(Default::default);
            if source_registry.url.is_some() {
                target_registry.url = source_registry.url;
            }
            if source_registry.tool_name.is_some() {
                target_registry.tool_name = source_registry.tool_name;
            }
        }

        if let Some(source_migrate) = source.migrate
            && source_migrate.workflow_template_url.is_some()
        {
            target.migrate = Some(source_migrate);
        }
    }

    /// Expand `${VAR}` references in URL values
    fn expand_env_vars(mut config: PublishConfig, env: &HashMap<String, String>) -> PublishConfig {
        if let Some(registry) = &mut config.registry
            && let Some(url) = &registry.url
        {
            registry.url = Some(Self::expand_string(url, env));
        }

        if let Some(migrate) = &mut config.migrate
            && let Some(url) = &migrate.workflow_template_url
        {
            migrate.workflow_template_url = Some(Self::expand_string(url, env));
        }

        config
    }

    /// Expand environment variables in a single string. Unknown variables are
    /// left in place.
    fn expand_string(input: &str, env: &HashMap<String, String>) -> String {
        let mut result = input.to_string();
        for cap in ENV_VAR_PATTERN.captures_iter(input) {
            let var_name = &cap[1];

            if let Some(value) = env.get(var_name) {
                result = result.replace(&format!("${{{}}}", var_name), value);
            } else {
                log::warn!("Environment variable {} not found", var_name);
            }
        }

        result
    }

    /// Validate configuration
    pub fn validate(config: &PublishConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if config.version.is_empty() {
            errors.push(ConfigValidationError {
                field: "version".to_string(),
                message: "Version is required".to_string(),
                expected: Some("string (e.g., \"1.0\")".to_string()),
                actual: Some("empty".to_string()),
            });
        } else if config.version != "1.0" {
            warnings.push(ConfigValidationWarning {
                field: "version".to_string(),
                message: format!("Unknown version: {}", config.version),
                suggestion: Some("Currently supported version is \"1.0\" only".to_string()),
            });
        }

        if let Some(release) = &config.release {
            Self::validate_release(release, &mut errors, &mut warnings);
        }

        if let Some(registry) = &config.registry
            && let Some(url) = &registry.url
            && !url.starts_with("http://")
            && !url.starts_with("https://")
        {
            errors.push(ConfigValidationError {
                field: "registry.url".to_string(),
                message: "registry URL must be absolute".to_string(),
                expected: Some("http(s) URL".to_string()),
                actual: Some(url.clone()),
            });
        }

        if let Some(changelog) = &config.changelog
            && let Some(preset) = &changelog.preset
            && !matches!(preset.as_str(), "angular" | "conventionalcommits")
        {
            warnings.push(ConfigValidationWarning {
                field: "changelog.preset".to_string(),
                message: format!("Unknown preset: {}", preset),
                suggestion: Some("Use \"angular\" or \"conventionalcommits\"".to_string()),
            });
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Validate release settings
    fn validate_release(
        release: &ReleaseConfig,
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        if let Some(branches) = &release.branches
            && branches.is_empty()
        {
            errors.push(ConfigValidationError {
                field: "release.branches".to_string(),
                message: "at least one release branch is required".to_string(),
                expected: Some("non-empty array".to_string()),
                actual: Some("empty array".to_string()),
            });
        }

        if let Some(organizations) = &release.organizations
            && organizations.is_empty()
        {
            warnings.push(ConfigValidationWarning {
                field: "release.organizations".to_string(),
                message: "no organization to choose from".to_string(),
                suggestion: Some(
                    "Packages without a GitHub repository will need --org".to_string(),
                ),
            });
        }

        if let Some(team) = &release.team
            && (team.is_empty() || team.contains(':'))
        {
            errors.push(ConfigValidationError {
                field: "release.team".to_string(),
                message: "team must be a bare team name".to_string(),
                expected: Some("e.g. \"developers\"".to_string()),
                actual: Some(team.clone()),
            });
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("✅ Configuration validation succeeded".to_string());
        } else {
            lines.push("❌ Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("\n🔴 Errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
                if let (Some(expected), Some(actual)) = (&error.expected, &error.actual) {
                    lines.push(format!("    Expected: {}", expected));
                    lines.push(format!("    Actual: {}", actual));
                }
            }
        }

        if !result.warnings.is_empty() {
            lines.push("\n🟡 Warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    Suggestion: {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}
