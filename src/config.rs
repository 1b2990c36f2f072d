#![forbid(unsafe_code)]

//! Poll-run configuration, resolved once at startup from an `.env`-style
//! file plus the process environment and handed around by reference.

use anyhow::{Context, Result, anyhow};
use log::warn;
use serde::Deserialize;
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_DATA_DIR: &str = ".";

/// One channel to poll, as configured in the `CHANNELS` JSON list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelTarget {
    pub name: String,
    pub url: String,
}

/// Everything a poll run needs.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub api_key: String,
    pub channels: Vec<ChannelTarget>,
    pub data_dir: PathBuf,
    pub notify: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub env_path: Option<PathBuf>,
}

pub fn load_config() -> Result<CheckConfig> {
    resolve_config(ConfigOverrides::default())
}

pub fn resolve_config(overrides: ConfigOverrides) -> Result<CheckConfig> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_config(&file_vars, env_var_string, overrides)
}

fn build_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: ConfigOverrides,
) -> Result<CheckConfig> {
    let api_key = lookup_value("YOUTUBE_API_KEY", file_vars, &env_lookup)
        .ok_or_else(|| anyhow!("YOUTUBE_API_KEY not set"))?;
    let channels = lookup_value("CHANNELS", file_vars, &env_lookup)
        .map(|raw| parse_channels(&raw))
        .unwrap_or_default();
    let data_dir = overrides
        .data_dir
        .or_else(|| lookup_value("DATA_DIR", file_vars, &env_lookup).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let notify = lookup_value("NOTIFY_ENABLED", file_vars, &env_lookup)
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    Ok(CheckConfig {
        api_key,
        channels,
        data_dir,
        notify,
    })
}

/// The channel list arrives as a JSON array of `{name, url}` objects. An
/// unparsable value degrades to an empty list instead of failing startup,
/// which the driver then reports as "nothing configured".
fn parse_channels(raw: &str) -> Vec<ChannelTarget> {
    match serde_json::from_str(raw) {
        Ok(channels) => channels,
        Err(err) => {
            warn!("ignoring unparsable CHANNELS value: {err}");
            Vec::new()
        }
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned())
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}
