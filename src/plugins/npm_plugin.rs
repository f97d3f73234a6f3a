//! NPM Plugin - npm registry integration
//!
//! This module drives the `npm` CLI for everything that needs the operator's
//! credentials (identity, teams, access grants, publishing) and queries the
//! registry over HTTP for the latest published version of a package.

use crate::core::retry::{RetryManager, RetryOptions};
use crate::core::traits::{Registry, TestRunner, TwoFactorMode};
use crate::process::CommandExecutor;
use anyhow::Context;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;

/// `<registry>/<package>/latest` response
#[derive(Debug, Deserialize)]
struct LatestManifest {
    version: String,
}

/// NPM registry plugin
pub struct NpmPlugin {
    executor: CommandExecutor,
    registry_url: String,
    test_script: String,
    http: reqwest::Client,
    retry: RetryManager,
}

impl NpmPlugin {
    pub fn new(executor: CommandExecutor, registry_url: impl Into<String>) -> Self {
        Self {
            executor,
            registry_url: registry_url.into(),
            test_script: "test".to_string(),
            http: reqwest::Client::new(),
            retry: RetryManager::new(RetryOptions::default()),
        }
    }

    /// npm script used by [`TestRunner::run_tests`]
    pub fn with_test_script(mut self, script: impl Into<String>) -> Self {
        self.test_script = script.into();
        self
    }

    async fn npm(&self, args: &[&str]) -> anyhow::Result<String> {
        Ok(self.executor.run_checked("npm", args).await?)
    }

    async fn fetch_latest(&self, url: &str) -> anyhow::Result<String> {
        let manifest: LatestManifest = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(manifest.version)
    }
}

/// Registry URL of the latest dist-tag of `package`
pub fn latest_url(registry_url: &str, package: &str) -> String {
    format!(
        "{}/{}/latest",
        registry_url.trim_end_matches('/'),
        package.replace('/', "%2F")
    )
}

/// Parse `npm team ls <team> --json`. Older npm versions print one user per line.
pub fn parse_team_members(output: &str) -> Vec<String> {
    if let Ok(members) = serde_json::from_str::<Vec<String>>(output) {
        return members;
    }

    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `npm access ls-packages <team>`: a JSON object of package -> access,
/// or `package: access` lines on newer npm versions.
pub fn parse_team_packages(output: &str) -> anyhow::Result<HashMap<String, String>> {
    let output = output.trim();
    if output.is_empty() {
        return Ok(HashMap::new());
    }

    if output.starts_with('{') {
        return serde_json::from_str(output).context("unexpected npm access output");
    }

    Ok(output
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, access)| (name.trim().to_string(), access.trim().to_string()))
        .collect())
}

#[async_trait]
impl Registry for NpmPlugin {
    async fn whoami(&self) -> anyhow::Result<String> {
        self.npm(&["whoami"]).await
    }

    async fn team_members(&self, team: &str) -> anyhow::Result<Vec<String>> {
        let output = self.npm(&["team", "ls", team, "--json"]).await?;
        Ok(parse_team_members(&output))
    }

    async fn team_packages(&self, team: &str) -> anyhow::Result<HashMap<String, String>> {
        let output = self.npm(&["access", "ls-packages", team]).await?;
        parse_team_packages(&output)
    }

    async fn grant_read_write(&self, team: &str, package: &str) -> anyhow::Result<()> {
        self.npm(&["access", "grant", "read-write", team, package])
            .await?;
        Ok(())
    }

    async fn two_factor_mode(&self) -> anyhow::Result<TwoFactorMode> {
        let output = self.npm(&["profile", "get", "two-factor auth"]).await?;
        Ok(TwoFactorMode::from_profile_output(&output))
    }

    async fn publish(&self, otp: Option<&SecretString>) -> anyhow::Result<String> {
        match otp {
            Some(otp) => {
                let otp_arg = format!("--otp={}", otp.expose_secret());
                self.npm(&["publish", &otp_arg]).await
            }
            None => self.npm(&["publish"]).await,
        }
    }

    async fn latest_version(&self, package: &str) -> anyhow::Result<String> {
        let url = latest_url(&self.registry_url, package);
        log::debug!("fetch {}", url);

        self.retry
            .retry(|| self.fetch_latest(&url))
            .await
            .with_context(|| format!("could not fetch the latest version of {}", package))
    }
}

#[async_trait]
impl TestRunner for NpmPlugin {
    async fn run_tests(&self) -> anyhow::Result<String> {
        self.npm(&["run", &self.test_script]).await
    }
}
