//! Delivery of the per-run summary. The orchestrator renders the text; a
//! [`Notifier`] only moves it somewhere an operator will see it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::config::SyncConfig;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, summary: &str) -> Result<()>;
}

/// Default sink: the summary goes to the log and nowhere else.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, summary: &str) -> Result<()> {
        info!(target: "run_report", "{summary}");
        Ok(())
    }
}

/// POSTs the plain-text summary to a configured webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build webhook client")?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, summary: &str) -> Result<()> {
        self.client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(summary.to_string())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("POST run summary to {}", self.url))?;
        Ok(())
    }
}

/// Webhook when configured, otherwise the log.
pub fn notifier_from_config(config: &SyncConfig) -> Result<Arc<dyn Notifier>> {
    match &config.notify_webhook {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(
            url.clone(),
            config.fetch_timeout(),
        )?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}
