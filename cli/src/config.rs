// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, path::PathBuf, str::FromStr};

use tokio::fs;

use groupsync_core::{APP_NAME, Config as CoreConfig, get_config_dir};

const GROUPSYNC_CONFIG_ENV: &str = "GROUPSYNC_CONFIG";
const GROUPSYNC_DEV_ENV: &str = "GROUPSYNC_DEV";

const GROUPSYNC_DEV_VALID_TRUE: &[&str] = &["1", "true", "yes"];
const GROUPSYNC_DEV_VALID_FALSE: &[&str] = &["0", "false", "no"];

/// Loads the configuration from `--config`, then `$GROUPSYNC_CONFIG`, then
/// the user config directory.
#[tracing::instrument]
pub async fn parse_config(path: Option<PathBuf>) -> Result<(CoreConfig, Config), Box<dyn Error>> {
    let path = if let Some(path) = path {
        path
    } else if let Ok(env_path) = std::env::var(GROUPSYNC_CONFIG_ENV) {
        PathBuf::from(env_path)
    } else {
        if let Some(true) = is_dev_mode() {
            return Err(format!(
                "Development environment detected ({GROUPSYNC_DEV_ENV} is set): config must be explicitly specified via --config or {GROUPSYNC_CONFIG_ENV} environment variable",
            ).into());
        }
        let config = get_config_dir()?.join(format!("{APP_NAME}/config.toml"));
        if !config.exists() {
            return Err(format!("No config found at: {}", config.display()).into());
        }
        config
    };

    tracing::debug!(path = %path.display(), "reading configuration");
    fs::read_to_string(&path)
        .await
        .map_err(|e| format!("Failed to read config file at {}: {}", path.display(), e))?
        .parse::<ConfigRaw>()
        .map(|a| (a.core, Config {}))
}

/// Configuration of the command-line tool itself.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct Config;

#[derive(Debug, serde::Deserialize)]
struct ConfigRaw {
    core: CoreConfig,
}

impl FromStr for ConfigRaw {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

fn is_dev_mode() -> Option<bool> {
    let val = std::env::var(GROUPSYNC_DEV_ENV).ok()?;
    let lower = val.to_lowercase();
    if GROUPSYNC_DEV_VALID_TRUE.contains(&lower.as_str()) {
        Some(true)
    } else if GROUPSYNC_DEV_VALID_FALSE.contains(&lower.as_str()) {
        Some(false)
    } else {
        tracing::warn!(
            "Unrecognized value for {}: '{}'. Expected one of: true: {}, false: {}. Treating as unset.",
            GROUPSYNC_DEV_ENV,
            val,
            GROUPSYNC_DEV_VALID_TRUE.join(", "),
            GROUPSYNC_DEV_VALID_FALSE.join(", "),
        );
        None
    }
}
