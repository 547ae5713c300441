// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::path::{Path, PathBuf};

use jiff::{SignedDuration, Timestamp};
use serde::de;

use crate::error::SyncError;
use crate::range::Window;

/// The name of the application.
pub const APP_NAME: &str = "groupsync";

/// Configuration of the sync engine, the `[core]` table of the config file.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Account key scoping collections, the run guard and persisted state.
    pub account: String,

    /// Directory for storing application state. `None` keeps everything in memory.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// Time window fetched by the pull phase.
    #[serde(default)]
    pub window: WindowConfig,

    /// Change-loop suppression windows.
    #[serde(default)]
    pub suppression: SuppressionConfig,
}

impl Config {
    /// Configuration for `account` with default windows and in-memory state.
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            state_dir: None,
            window: WindowConfig::default(),
            suppression: SuppressionConfig::default(),
        }
    }

    /// Normalize the configuration.
    pub fn normalize(&mut self) -> Result<(), SyncError> {
        if self.account.trim().is_empty() {
            return Err(SyncError::Config("account must not be empty".to_string()));
        }

        // Normalize state directory
        match &self.state_dir {
            Some(a) => {
                self.state_dir = Some(expand_path(a).map_err(|e| {
                    SyncError::Config(format!("Failed to expand state directory path: {e}"))
                })?)
            }

            None => match get_state_dir() {
                Ok(a) => self.state_dir = Some(a.join(APP_NAME)),
                Err(e) => tracing::warn!(err = %e, "failed to get state directory"),
            },
        };

        for (name, d) in [
            ("window.past", self.window.past),
            ("window.future", self.window.future),
            ("suppression.pass", self.suppression.pass),
            ("suppression.settle", self.suppression.settle),
        ] {
            if d.0.is_negative() {
                return Err(SyncError::Config(format!("{name} must not be negative")));
            }
        }

        Ok(())
    }

    /// Pull window around `now`.
    pub fn window_at(&self, now: Timestamp) -> Result<Window, SyncError> {
        Window::around(now, self.window.past.0, self.window.future.0)
            .map_err(|e| SyncError::Config(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct WindowConfig {
    /// How far back the pull phase looks.
    #[serde(default = "WindowConfig::default_past")]
    pub past: ConfigDuration,

    /// How far ahead the pull phase looks.
    #[serde(default = "WindowConfig::default_future")]
    pub future: ConfigDuration,
}

impl WindowConfig {
    fn default_past() -> ConfigDuration {
        ConfigDuration(SignedDuration::from_hours(30 * 24))
    }

    fn default_future() -> ConfigDuration {
        ConfigDuration(SignedDuration::from_hours(365 * 24))
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            past: Self::default_past(),
            future: Self::default_future(),
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct SuppressionConfig {
    /// Wide window armed when a pass starts.
    #[serde(default = "SuppressionConfig::default_pass")]
    pub pass: ConfigDuration,

    /// Narrow window re-armed when a pass ends.
    #[serde(default = "SuppressionConfig::default_settle")]
    pub settle: ConfigDuration,
}

impl SuppressionConfig {
    fn default_pass() -> ConfigDuration {
        ConfigDuration(SignedDuration::from_mins(10))
    }

    fn default_settle() -> ConfigDuration {
        ConfigDuration(SignedDuration::from_secs(5))
    }
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self {
            pass: Self::default_pass(),
            settle: Self::default_settle(),
        }
    }
}

/// A duration read from a string like "HH:MM", "1d", "24h", "60m" or "1800s".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigDuration(pub SignedDuration);

impl ConfigDuration {
    pub fn get(self) -> SignedDuration {
        self.0
    }
}

impl From<SignedDuration> for ConfigDuration {
    fn from(d: SignedDuration) -> Self {
        Self(d)
    }
}

impl<'de> serde::Deserialize<'de> for ConfigDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct DurationVisitor;

        impl<'de> de::Visitor<'de> for DurationVisitor {
            type Value = ConfigDuration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter
                    .write_str(r#"a duration string like "HH:MM", "1d", "24h", "60m", or "1800s""#)
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                parse_duration(value)
                    .map(ConfigDuration)
                    .map_err(|e| de::Error::custom(e.to_string()))
            }
        }

        deserializer.deserialize_str(DurationVisitor)
    }
}

/// Handle tilde (~) and environment variables in the path
pub fn expand_path(path: &Path) -> Result<PathBuf, SyncError> {
    if path.is_absolute() {
        return Ok(path.to_owned());
    }

    let path = path
        .to_str()
        .ok_or_else(|| SyncError::Config("Invalid path".to_string()))?;

    // Handle tilde and home directory
    let home_prefixes: &[&str] = if cfg!(unix) {
        &["~/", "$HOME/", "${HOME}/"]
    } else {
        &[r"~\", "~/", r"%UserProfile%\", r"%UserProfile%/"]
    };
    for prefix in home_prefixes {
        if let Some(stripped) = path.strip_prefix(prefix) {
            return Ok(get_home_dir()?.join(stripped));
        }
    }

    // Handle config directories
    let config_prefixes: &[&str] = if cfg!(unix) {
        &["$XDG_CONFIG_HOME/", "${XDG_CONFIG_HOME}/"]
    } else {
        &[r"%LOCALAPPDATA%\", "%LOCALAPPDATA%/"]
    };
    for prefix in config_prefixes {
        if let Some(stripped) = path.strip_prefix(prefix) {
            return Ok(get_config_dir()?.join(stripped));
        }
    }

    Ok(path.into())
}

fn get_home_dir() -> Result<PathBuf, SyncError> {
    dirs::home_dir()
        .ok_or_else(|| SyncError::Config("User-specific home directory not found".to_string()))
}

/// User-specific configuration directory.
pub fn get_config_dir() -> Result<PathBuf, SyncError> {
    #[cfg(unix)]
    let config_dir = xdg::BaseDirectories::new().get_config_home();
    #[cfg(windows)]
    let config_dir = dirs::config_dir();
    config_dir
        .ok_or_else(|| SyncError::Config("User-specific config directory not found".to_string()))
}

fn get_state_dir() -> Result<PathBuf, SyncError> {
    #[cfg(unix)]
    let state_dir = xdg::BaseDirectories::new().get_state_home();
    #[cfg(windows)]
    let state_dir = dirs::data_dir();
    state_dir
        .ok_or_else(|| SyncError::Config("User-specific state directory not found".to_string()))
}

/// Parse a duration string in the format "HH:MM" / "1d" / "24h" / "60m" / "1800s".
pub fn parse_duration(s: &str) -> Result<SignedDuration, SyncError> {
    let invalid = || SyncError::Config(format!("Invalid duration format: {s}"));
    let int = |v: &str| v.trim().parse::<i64>().map_err(|_| invalid());

    let secs = if let Some((h, m)) = s.split_once(':') {
        // Try to parse "HH:MM" format
        int(h)?
            .checked_mul(3600)
            .zip(int(m)?.checked_mul(60))
            .and_then(|(h, m)| h.checked_add(m))
    }
    // Match suffix-based formats
    else if let Some(rest) = s.strip_suffix("d") {
        int(rest)?.checked_mul(86_400)
    } else if let Some(rest) = s.strip_suffix("h") {
        int(rest)?.checked_mul(3600)
    } else if let Some(rest) = s.strip_suffix("m") {
        int(rest)?.checked_mul(60)
    } else if let Some(rest) = s.strip_suffix("s") {
        Some(int(rest)?)
    } else {
        return Err(invalid());
    };

    secs.map(SignedDuration::from_secs).ok_or_else(invalid)
}
