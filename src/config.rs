//! Runtime configuration, resolved once from the environment.

use std::time::Duration;

use crate::util::env::{env_opt, env_parse, env_parse_opt};

/// All knobs the sync pipeline reads. Build one with [`SyncConfig::from_env`]
/// at startup and pass it by reference; nothing below re-reads the environment.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Wiki origin, e.g. `https://liquipedia.net`.
    pub wiki_base: String,
    /// Game namespace segment of wiki paths, e.g. `fortnite`.
    pub wiki_namespace: String,
    /// Platform live-data API origin.
    pub platform_api_base: String,
    /// Optional bearer token for the platform API.
    pub platform_token: Option<String>,
    /// Timeout applied to every outbound request.
    pub fetch_timeout_secs: u64,
    /// Fixed delay between consecutive requests within a stage.
    pub request_delay_ms: u64,
    pub user_agent: String,
    /// When set, run summaries are POSTed here in addition to the log.
    pub notify_webhook: Option<String>,
    /// Cap on players visited by the earnings stage (None = all).
    pub earnings_player_limit: Option<usize>,
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self {
            wiki_base: env_opt("WIKI_BASE_URL")
                .unwrap_or_else(|| "https://liquipedia.net".to_string()),
            wiki_namespace: env_opt("WIKI_NAMESPACE").unwrap_or_else(|| "fortnite".to_string()),
            platform_api_base: env_opt("PLATFORM_API_BASE").unwrap_or_else(|| {
                "https://events-public-service-live.ol.epicgames.com".to_string()
            }),
            platform_token: env_opt("PLATFORM_API_TOKEN"),
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS", 30),
            request_delay_ms: env_parse("REQUEST_DELAY_MS", 1500),
            user_agent: env_opt("SYNC_USER_AGENT")
                .unwrap_or_else(|| concat!("circuit-sync/", env!("CARGO_PKG_VERSION")).to_string()),
            notify_webhook: env_opt("NOTIFY_WEBHOOK_URL"),
            earnings_player_limit: env_parse_opt("EARNINGS_PLAYER_LIMIT"),
        }
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Wiki page URL for a path inside the game namespace, e.g. `Portal:Tournaments`.
    pub fn wiki_page(&self, page: &str) -> String {
        format!(
            "{}/{}/{}",
            self.wiki_base.trim_end_matches('/'),
            self.wiki_namespace,
            page.trim_start_matches('/')
        )
    }

    /// Platform endpoint URL for a path relative to the API base.
    pub fn platform_endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.platform_api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wiki_page_joins_without_doubled_slashes() {
        let cfg = SyncConfig {
            wiki_base: "https://liquipedia.net/".into(),
            wiki_namespace: "fortnite".into(),
            platform_api_base: "https://api.example.com".into(),
            platform_token: None,
            fetch_timeout_secs: 30,
            request_delay_ms: 0,
            user_agent: "test".into(),
            notify_webhook: None,
            earnings_player_limit: None,
        };
        assert_eq!(
            cfg.wiki_page("/Portal:Tournaments"),
            "https://liquipedia.net/fortnite/Portal:Tournaments"
        );
        assert_eq!(
            cfg.platform_endpoint("api/v1/schedule"),
            "https://api.example.com/api/v1/schedule"
        );
    }
}
