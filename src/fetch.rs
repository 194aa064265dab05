//! Outbound HTTP. Everything the pipeline fetches goes through
//! [`PageFetcher`], so tests can swap in canned documents and the stages stay
//! transport-free. The real client applies one fixed timeout to every
//! request; there is no retry here, a failed request surfaces to the stage.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::config::SyncConfig;

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_html(&self, url: &str) -> Result<String>;
    async fn fetch_json(&self, url: &str) -> Result<Value>;
}

pub struct HttpFetcher {
    client: Client,
    bearer_token: Option<String>,
}

impl HttpFetcher {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.fetch_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            bearer_token: config.platform_token.clone(),
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.get(url);
        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }
        req
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch_html(&self, url: &str) -> Result<String> {
        let resp = self
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("GET {url}"))?;
        let body = resp
            .text()
            .await
            .with_context(|| format!("read body of {url}"))?;
        debug!(url, bytes = body.len(), "fetched page");
        Ok(body)
    }

    #[instrument(skip(self))]
    async fn fetch_json(&self, url: &str) -> Result<Value> {
        self.get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("GET {url}"))?
            .json()
            .await
            .with_context(|| format!("decode json from {url}"))
    }
}

/// Resolve a (possibly relative) wiki href against the site origin.
pub fn absolutize(base: &str, href: &str) -> Result<String> {
    let base = Url::parse(base).with_context(|| format!("parse base url {base}"))?;
    Ok(base
        .join(href)
        .with_context(|| format!("resolve href {href}"))?
        .to_string())
}
