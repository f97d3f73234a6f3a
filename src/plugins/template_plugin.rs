//! Download of the release workflow template

use crate::core::retry::{RetryManager, RetryOptions};
use crate::core::traits::TemplateSource;
use anyhow::Context;
use async_trait::async_trait;

/// Fetches templates over HTTP, retrying transient failures
#[derive(Debug, Clone, Default)]
pub struct HttpTemplateSource {
    http: reqwest::Client,
    retry: RetryManager,
}

impl HttpTemplateSource {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            retry: RetryManager::new(RetryOptions::default()),
        }
    }

    async fn get(&self, url: &str) -> anyhow::Result<String> {
        Ok(self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?)
    }
}

#[async_trait]
impl TemplateSource for HttpTemplateSource {
    async fn fetch(&self, url: &str) -> anyhow::Result<String> {
        log::debug!("fetch {}", url);
        self.retry
            .retry(|| self.get(url))
            .await
            .with_context(|| format!("could not download {}", url))
    }
}
