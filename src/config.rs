//! Configuration loading for rportcli.
//!
//! Every component reads its inputs from a [`ParameterBag`], an immutable
//! string-keyed view assembled once per invocation from four layers (later
//! layers win):
//!
//! 1. **Compiled defaults**: `server_url = http://localhost:3000`
//! 2. **JSON file**: path from `--config`, else `CONFIG_PATH`, else
//!    `<config dir>/rportcli/config.json` (a missing file is not an error)
//! 3. **Environment variables**: `RPORT_SERVER_URL`, `RPORT_USER`,
//!    `RPORT_PASSWORD`, `RPORT_API_TOKEN`
//! 4. **Command-line flags**: empty values never override a lower layer
//!
//! The JSON file holds the connection settings only:
//!
//! ```json
//! {
//!   "server_url": "https://rport.example.com",
//!   "login": "admin",
//!   "password": "secret"
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

pub const SERVER_URL: &str = "server_url";
pub const LOGIN: &str = "login";
pub const PASSWORD: &str = "password";
pub const TOKEN: &str = "token";

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";
pub const SERVER_URL_ENV: &str = "RPORT_SERVER_URL";
pub const LOGIN_ENV: &str = "RPORT_USER";
pub const PASSWORD_ENV: &str = "RPORT_PASSWORD";
pub const TOKEN_ENV: &str = "RPORT_API_TOKEN";

/// Read-only key/value view over all configuration layers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterBag {
    values: HashMap<String, String>,
}

impl ParameterBag {
    /// Build a bag from key/value pairs.
    pub fn from_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Layer `self` over `lower`: non-empty values of `self` win.
    #[must_use]
    pub fn over(self, lower: ParameterBag) -> ParameterBag {
        let mut values = lower.values;
        for (k, v) in self.values {
            if !v.is_empty() || !values.contains_key(&k) {
                values.insert(k, v);
            }
        }
        ParameterBag { values }
    }

    pub fn read_string(&self, key: &str, default: &str) -> String {
        match self.values.get(key) {
            Some(v) if !v.is_empty() => v.clone(),
            _ => default.to_string(),
        }
    }

    /// Truthy values are `1`, `true`, `yes` and `on` (case-insensitive).
    pub fn read_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key).map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v.is_empty() => default,
            Some(v) => matches!(v.as_str(), "1" | "true" | "yes" | "on"),
            None => default,
        }
    }

    pub fn read_u64(&self, key: &str, default: u64) -> Result<u64> {
        match self.values.get(key).map(|v| v.trim()) {
            Some(v) if !v.is_empty() => v
                .parse()
                .map_err(|_| Error::InvalidInput(format!("invalid value '{v}' for option {key}"))),
            _ => Ok(default),
        }
    }

    /// Comma-separated list; blank entries are dropped.
    pub fn read_list(&self, key: &str) -> Vec<String> {
        self.read_string(key, "")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Connection settings stored in the JSON config file.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub server_url: Option<String>,
    pub login: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
}

impl ConfigFile {
    fn into_params(self) -> ParameterBag {
        ParameterBag::from_values(
            [
                (SERVER_URL, self.server_url),
                (LOGIN, self.login),
                (PASSWORD, self.password),
                (TOKEN, self.token),
            ]
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v))),
        )
    }
}

/// Load all layers using the real process environment.
pub fn load_params(config_path: Option<&Path>, flags: ParameterBag) -> Result<ParameterBag> {
    load_params_with(config_path, |name| std::env::var(name).ok(), flags)
}

/// Load all layers, reading environment variables through `env`.
pub fn load_params_with<F>(
    config_path: Option<&Path>,
    env: F,
    flags: ParameterBag,
) -> Result<ParameterBag>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = ParameterBag::from_values([(SERVER_URL, DEFAULT_SERVER_URL)]);

    let path = config_path
        .map(Path::to_path_buf)
        .or_else(|| env(CONFIG_PATH_ENV).map(PathBuf::from))
        .or_else(default_config_path);
    let file = match path {
        Some(p) => load_file(&expand_tilde(&p))?,
        None => ParameterBag::default(),
    };

    let env_layer = ParameterBag::from_values(
        [
            (SERVER_URL, SERVER_URL_ENV),
            (LOGIN, LOGIN_ENV),
            (PASSWORD, PASSWORD_ENV),
            (TOKEN, TOKEN_ENV),
        ]
        .into_iter()
        .filter_map(|(key, var)| env(var).map(|v| (key, v))),
    );

    Ok(flags.over(env_layer.over(file.over(defaults))))
}

/// `<config dir>/rportcli/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rportcli").join("config.json"))
}

fn load_file(path: &Path) -> Result<ParameterBag> {
    if !path.exists() {
        tracing::debug!("no config file at {}", path.display());
        return Ok(ParameterBag::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("failed to read config file {}: {e}", path.display()))
    })?;
    let file: ConfigFile = serde_json::from_str(&contents).map_err(|e| {
        Error::Config(format!("failed to parse config file {}: {e}", path.display()))
    })?;
    Ok(file.into_params())
}

/// Expand a leading `~` to `$HOME`.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

/// Parse `10s`, `5m`, `2h` or a bare number of seconds.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    let invalid = || {
        Error::InvalidInput(format!(
            "invalid duration '{value}', expected e.g. 10s, 1m or 2h"
        ))
    };
    let (digits, multiplier) = match value.char_indices().last() {
        Some((idx, 's')) => (&value[..idx], 1),
        Some((idx, 'm')) => (&value[..idx], 60),
        Some((idx, 'h')) => (&value[..idx], 3600),
        Some(_) => (value, 1),
        None => return Err(invalid()),
    };
    let amount: u64 = digits.parse().map_err(|_| invalid())?;
    let secs = amount.checked_mul(multiplier).ok_or_else(invalid)?;
    Ok(Duration::from_secs(secs))
}
