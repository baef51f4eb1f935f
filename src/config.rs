use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "urlshare")]
#[command(about = "Runs the urlshare service", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".urlshare")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct App {
    database: String,
    port: u16,
    #[serde(default)]
    pub turso_url: Option<String>,
    #[serde(default)]
    pub turso_auth_token: Option<String>,
    #[serde(default = "default_sync_interval")]
    pub sync_interval_seconds: u64,
    #[serde(default)]
    pub feed: FeedLimits,
}

fn default_sync_interval() -> u64 {
    60
}

/// Page sizes for feed reads.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct FeedLimits {
    #[serde(default = "default_feed_limit")]
    pub default_limit: u32,
    #[serde(default = "max_feed_limit")]
    pub max_limit: u32,
}

fn default_feed_limit() -> u32 {
    20
}

fn max_feed_limit() -> u32 {
    50
}

impl Default for FeedLimits {
    fn default() -> Self {
        Self {
            default_limit: default_feed_limit(),
            max_limit: max_feed_limit(),
        }
    }
}

impl App {
    pub fn get_db(&self) -> &str {
        &self.database
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub app: App,
}

impl Config {
    pub fn new(path: &str) -> Result<Self> {
        let yaml_str = fs::read_to_string(path)?;
        Config::from_yaml(&yaml_str)
    }

    pub fn from_yaml(yaml_str: &str) -> Result<Self> {
        let yaml_with_env = Config::substitute_env_vars(yaml_str);
        let config: Config = serde_yaml::from_str(&yaml_with_env)?;

        if config.app.feed.default_limit == 0 || config.app.feed.default_limit > config.app.feed.max_limit {
            anyhow::bail!(
                "feed.default_limit must be between 1 and feed.max_limit ({})",
                config.app.feed.max_limit
            );
        }

        Ok(config)
    }

    /// Replaces `${VAR}` and `${VAR:-default}` with values from the environment.
    fn substitute_env_vars(yaml_str: &str) -> String {
        let mut result = yaml_str.to_string();
        let mut offset = 0;

        while let Some(start) = result[offset..].find("${") {
            let actual_start = offset + start;
            let Some(end) = result[actual_start..].find('}') else {
                break;
            };
            let var_name = &result[actual_start + 2..actual_start + end];

            let env_value = match var_name.split_once(":-") {
                Some((actual_var, default_val)) => {
                    env::var(actual_var).unwrap_or_else(|_| default_val.to_string())
                }
                None => env::var(var_name).unwrap_or_else(|_| {
                    tracing::warn!(variable = var_name, "environment variable not found");
                    String::new()
                }),
            };

            result.replace_range(actual_start..actual_start + end + 1, &env_value);
            offset = actual_start + env_value.len();
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_variables_are_unset() {
        let yaml = "app:\n  database: ${URLSHARE_TEST_UNSET_DB:-urlshare.db}\n  port: ${URLSHARE_TEST_UNSET_PORT:-8080}\n";
        let cfg = Config::from_yaml(yaml).unwrap();

        assert_eq!(cfg.app.get_db(), "urlshare.db");
        assert_eq!(cfg.app.get_port(), 8080);
        assert_eq!(cfg.app.sync_interval_seconds, 60);
        assert_eq!(cfg.app.feed, FeedLimits::default());
        assert!(cfg.app.turso_url.is_none());
    }

    #[test]
    fn missing_variables_become_empty() {
        let out = Config::substitute_env_vars("a: ${URLSHARE_TEST_NEVER_SET}\nb: ${URLSHARE_TEST_NEVER_SET:-x}");
        assert_eq!(out, "a: \nb: x");
    }

    #[test]
    fn unterminated_placeholders_are_left_alone() {
        assert_eq!(Config::substitute_env_vars("a: ${OOPS"), "a: ${OOPS");
    }

    #[test]
    fn feed_limits_are_checked() {
        let yaml = "app:\n  database: a.db\n  port: 1\n  feed:\n    default_limit: 80\n    max_limit: 50\n";
        assert!(Config::from_yaml(yaml).is_err());

        let yaml = "app:\n  database: a.db\n  port: 1\n  feed:\n    max_limit: 100\n";
        let cfg = Config::from_yaml(yaml).unwrap();
        assert_eq!(cfg.app.feed.default_limit, 20);
        assert_eq!(cfg.app.feed.max_limit, 100);
    }
}
