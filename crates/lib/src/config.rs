//! Configuration types and loading.
//!
//! Config is loaded from a YAML file (e.g. `~/.quip-relay/config.yaml`) and environment.
//! Secrets can be supplied through env so the file can be checked in without them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_QUIP_BASE_URL: &str = "https://platform.quip.com";
const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";
const DEFAULT_BLOB_BASE_URL: &str = "https://platform.quip.com/1/blob";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Quip (document service) credentials.
    #[serde(default)]
    pub quip: QuipConfig,

    /// Slack (notification sink) credentials and channels.
    #[serde(default)]
    pub slack: SlackConfig,

    /// Relay timing and URL settings.
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Quip API access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuipConfig {
    /// Personal access token. Overridden by QUIP_ACCESS_TOKEN env.
    pub access_token: Option<String>,

    /// API base (default "https://platform.quip.com").
    #[serde(default = "default_quip_base_url")]
    pub base_url: String,
}

/// Slack Web API access and target channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackConfig {
    /// Bot OAuth token (xoxb-...). Overridden by SLACK_BOT_TOKEN env.
    pub oauth_access_token: Option<String>,

    /// Channel that receives forwarded chat messages.
    pub channel: Option<String>,

    /// Channel that receives connection lifecycle notices.
    pub status_channel: Option<String>,

    /// Web API base (default "https://slack.com/api").
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
}

/// Heartbeat period, reconnect delay and attachment URL base.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Base for file fetch URLs: `{blobBaseUrl}/{thread_id}/{hash}?name=...`.
    #[serde(default = "default_blob_base_url")]
    pub blob_base_url: String,
}

fn default_quip_base_url() -> String {
    DEFAULT_QUIP_BASE_URL.to_string()
}

fn default_slack_api_base() -> String {
    DEFAULT_SLACK_API_BASE.to_string()
}

fn default_blob_base_url() -> String {
    DEFAULT_BLOB_BASE_URL.to_string()
}

fn default_heartbeat_interval_secs() -> u64 {
    20
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

impl Default for QuipConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            base_url: default_quip_base_url(),
        }
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            oauth_access_token: None,
            channel: None,
            status_channel: None,
            api_base: default_slack_api_base(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            blob_base_url: default_blob_base_url(),
        }
    }
}

impl RelayConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl Config {
    /// Check everything the relay needs before it starts. All problems are reported together.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if resolve_quip_token(self).is_none() {
            problems.push("quip.accessToken (or QUIP_ACCESS_TOKEN) is not set");
        }
        if resolve_slack_token(self).is_none() {
            problems.push("slack.oauthAccessToken (or SLACK_BOT_TOKEN) is not set");
        }
        if non_blank(self.slack.channel.as_deref()).is_none() {
            problems.push("slack.channel is not set");
        }
        if non_blank(self.slack.status_channel.as_deref()).is_none() {
            problems.push("slack.statusChannel is not set");
        }
        if self.relay.heartbeat_interval_secs == 0 {
            problems.push("relay.heartbeatIntervalSecs must be greater than zero");
        }
        if self.relay.reconnect_delay_secs == 0 {
            problems.push("relay.reconnectDelaySecs must be greater than zero");
        }
        if problems.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("invalid configuration: {}", problems.join("; "))
        }
    }

    /// Primary channel for forwarded messages, normalized for chat.postMessage.
    pub fn primary_channel(&self) -> Option<String> {
        non_blank(self.slack.channel.as_deref()).map(normalize_channel)
    }

    /// Status channel for lifecycle notices, normalized for chat.postMessage.
    pub fn status_channel(&self) -> Option<String> {
        non_blank(self.slack.status_channel.as_deref()).map(normalize_channel)
    }
}

fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn env_non_blank(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| non_blank(Some(&s)))
}

/// Channel names get a leading `#`; Slack ids (C..., G..., D...) are passed through as-is.
pub fn normalize_channel(name: String) -> String {
    let looks_like_id = name.len() >= 9
        && name.starts_with(['C', 'G', 'D'])
        && name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if name.starts_with('#') || looks_like_id {
        name
    } else {
        format!("#{}", name)
    }
}

/// Resolve the Quip access token: env QUIP_ACCESS_TOKEN overrides config.
pub fn resolve_quip_token(config: &Config) -> Option<String> {
    env_non_blank("QUIP_ACCESS_TOKEN").or_else(|| non_blank(config.quip.access_token.as_deref()))
}

/// Resolve the Slack bot token: env SLACK_BOT_TOKEN overrides config.
pub fn resolve_slack_token(config: &Config) -> Option<String> {
    env_non_blank("SLACK_BOT_TOKEN")
        .or_else(|| non_blank(config.slack.oauth_access_token.as_deref()))
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("QUIP_RELAY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".quip-relay").join("config.yaml"))
                .unwrap_or_else(|| PathBuf::from("config.yaml"))
        })
}

/// Load config from the given path (or the default). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        parse_config(&s).with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Parse YAML config text. An empty document yields the default config.
pub fn parse_config(s: &str) -> Result<Config> {
    if s.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(s)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> Config {
        parse_config(
            r#"
quip:
  accessToken: quip-token
slack:
  oauthAccessToken: xoxb-1
  channel: general
  statusChannel: relay-status
"#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_match_relay_timing() {
        let r = RelayConfig::default();
        assert_eq!(r.heartbeat_interval(), Duration::from_secs(20));
        assert_eq!(r.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(r.blob_base_url, "https://platform.quip.com/1/blob");
    }

    #[test]
    fn empty_document_is_default() {
        let c = parse_config("  \n").unwrap();
        assert_eq!(c.quip.base_url, "https://platform.quip.com");
        assert_eq!(c.slack.api_base, "https://slack.com/api");
    }

    #[test]
    fn complete_config_validates() {
        let c = complete();
        assert!(c.validate().is_ok());
        assert_eq!(c.primary_channel().as_deref(), Some("#general"));
        assert_eq!(c.status_channel().as_deref(), Some("#relay-status"));
    }

    #[test]
    fn validate_reports_every_problem() {
        let mut c = Config::default();
        c.relay.heartbeat_interval_secs = 0;
        // Tokens may come from the environment of whoever runs the tests; only
        // assert on the problems that env cannot fix.
        let err = c.validate().unwrap_err().to_string();
        assert!(err.contains("slack.channel"));
        assert!(err.contains("slack.statusChannel"));
        assert!(err.contains("heartbeatIntervalSecs"));
    }

    #[test]
    fn normalize_channel_keeps_ids_and_hashes() {
        assert_eq!(normalize_channel("#ops".to_string()), "#ops");
        assert_eq!(normalize_channel("C0123ABCDE".to_string()), "C0123ABCDE");
        assert_eq!(normalize_channel("ops".to_string()), "#ops");
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let path = std::env::temp_dir()
            .join(format!("quip-relay-missing-{}", uuid::Uuid::new_v4()))
            .join("config.yaml");
        let (c, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(c.relay.heartbeat_interval_secs, 20);
    }
}
