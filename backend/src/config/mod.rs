//! Central module for application-wide configuration settings.
//!
//! Settings come from the process environment, optionally seeded from a
//! `.env` file: the event source URL, the dashboard listen address, and the
//! channel selector of every table.

use std::net::SocketAddr;

use procview_adapters::Channel;
use thiserror::Error;

pub const DEFAULT_SOURCE_URL: &str = "http://localhost:8000";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

const SOURCE_URL_VAR: &str = "PROCVIEW_SOURCE_URL";
const BIND_VAR: &str = "PROCVIEW_BIND";
const CHANNELS_VAR: &str = "PROCVIEW_CHANNELS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid PROCVIEW_BIND {value:?}: {reason}")]
    InvalidBind { value: String, reason: String },
    #[error("unknown channel {0:?} in PROCVIEW_CHANNELS")]
    UnknownChannel(String),
    #[error("channel {0} listed twice in PROCVIEW_CHANNELS")]
    DuplicateChannel(Channel),
    #[error("PROCVIEW_CHANNELS selects no channels")]
    NoChannels,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub source_url: String,
    pub bind: SocketAddr,
    /// One table per entry, in display order.
    pub channels: Vec<Channel>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is the normal case.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source_url = lookup(SOURCE_URL_VAR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string());

        let bind_value = lookup(BIND_VAR).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_value
            .trim()
            .parse()
            .map_err(|err: std::net::AddrParseError| ConfigError::InvalidBind {
                value: bind_value.clone(),
                reason: err.to_string(),
            })?;

        let channels = match lookup(CHANNELS_VAR) {
            Some(value) => parse_channels(&value)?,
            None => Channel::ALL.to_vec(),
        };

        Ok(Self {
            source_url,
            bind,
            channels,
        })
    }
}

fn parse_channels(value: &str) -> Result<Vec<Channel>, ConfigError> {
    let mut channels = Vec::new();
    for name in value.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        let channel: Channel = name
            .parse()
            .map_err(|_| ConfigError::UnknownChannel(name.to_string()))?;
        if channels.contains(&channel) {
            return Err(ConfigError::DuplicateChannel(channel));
        }
        channels.push(channel);
    }
    if channels.is_empty() {
        return Err(ConfigError::NoChannels);
    }
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_cover_both_channels() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.source_url, DEFAULT_SOURCE_URL);
        assert_eq!(config.bind, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(
            config.channels,
            vec![Channel::ProcessesStarted, Channel::ProcessesEnded]
        );
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("PROCVIEW_SOURCE_URL", " http://events:9000 "),
            ("PROCVIEW_BIND", "0.0.0.0:8080"),
            ("PROCVIEW_CHANNELS", "processesEnded"),
        ])
        .unwrap();
        assert_eq!(config.source_url, "http://events:9000");
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.channels, vec![Channel::ProcessesEnded]);
    }

    #[test]
    fn rejects_bad_channel_lists() {
        assert_eq!(
            config_from(&[("PROCVIEW_CHANNELS", "processesStarted, processesKilled")]),
            Err(ConfigError::UnknownChannel("processesKilled".to_string()))
        );
        assert_eq!(
            config_from(&[("PROCVIEW_CHANNELS", "processesEnded,processesEnded")]),
            Err(ConfigError::DuplicateChannel(Channel::ProcessesEnded))
        );
        assert_eq!(
            config_from(&[("PROCVIEW_CHANNELS", " , ")]),
            Err(ConfigError::NoChannels)
        );
    }

    #[test]
    fn rejects_bad_bind_address() {
        assert!(matches!(
            config_from(&[("PROCVIEW_BIND", "localhost")]),
            Err(ConfigError::InvalidBind { .. })
        ));
    }
}
