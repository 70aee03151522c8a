//! Initialize the configuration directory: create it and write a template config.yaml.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

static DEFAULT_CONFIG: &str = r#"# Quip relay configuration.
# Secrets may instead be supplied via QUIP_ACCESS_TOKEN and SLACK_BOT_TOKEN.
quip:
  accessToken: ""
  # baseUrl: https://platform.quip.com
slack:
  oauthAccessToken: ""
  # Channel for forwarded chat messages.
  channel: ""
  # Channel for connection established/closed notices.
  statusChannel: ""
  # apiBase: https://slack.com/api
relay:
  heartbeatIntervalSecs: 20
  reconnectDelaySecs: 5
  # blobBaseUrl: https://platform.quip.com/1/blob
"#;

/// Create the config directory and a template config if they do not exist.
/// Returns the config directory. An existing config file is left untouched.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, DEFAULT_CONFIG)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    } else {
        log::debug!("config already exists at {}, skipping", config_path.display());
    }

    Ok(config_dir.to_path_buf())
}
