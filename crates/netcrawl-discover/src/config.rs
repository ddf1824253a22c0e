//! Configuration for the netcrawl topology crawler.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Top-level crawl configuration.
///
/// Loaded from the `[crawl]` section of `netcrawl.toml` (or any other format
/// the `config` crate understands), `/etc/netcrawl.*`, and
/// `NETCRAWL__CRAWL__*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// SSH credentials, tried in order against every device.
    #[serde(default)]
    pub ssh: Vec<SshCredentials>,

    /// Command whose output lists a device's neighbors.
    #[serde(default = "default_command")]
    pub command: String,

    /// TCP port devices accept SSH on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum number of devices being discovered at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_discoveries: usize,
}

/// One principal/secret pair for logging into devices.
#[derive(Clone, Deserialize)]
pub struct SshCredentials {
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Connection + authentication timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl SshCredentials {
    pub fn new(user: &str, password: &str) -> Self {
        Self {
            user: user.to_string(),
            password: password.to_string(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for SshCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_command() -> String {
    "show cdp neighbors detail".to_string()
}

fn default_port() -> u16 {
    22
}

fn default_max_concurrent() -> usize {
    32
}

fn default_timeout_secs() -> u64 {
    5
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            ssh: Vec::new(),
            command: default_command(),
            port: default_port(),
            max_concurrent_discoveries: default_max_concurrent(),
        }
    }
}

/// Load the crawl configuration.
///
/// Sources, lowest priority first: `/etc/netcrawl.*`, `{file_prefix}.*`,
/// then `NETCRAWL__` environment variables. A missing `[crawl]` section
/// yields the defaults; a present but malformed one is an error.
pub fn load_crawl_config(file_prefix: &str) -> Result<CrawlConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name("/etc/netcrawl").required(false))
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("NETCRAWL")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<CrawlConfig>("crawl") {
        Ok(c) => Ok(c),
        Err(config::ConfigError::NotFound(_)) => {
            tracing::warn!(file_prefix, "No [crawl] section found, using defaults");
            Ok(CrawlConfig::default())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CrawlConfig::default();
        assert!(config.ssh.is_empty());
        assert_eq!(config.command, "show cdp neighbors detail");
        assert_eq!(config.port, 22);
        assert_eq!(config.max_concurrent_discoveries, 32);
    }

    #[test]
    fn test_password_is_redacted() {
        let creds = SshCredentials::new("admin", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
        assert_eq!(creds.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("netcrawl.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[crawl]
port = 2222
max_concurrent_discoveries = 4

[[crawl.ssh]]
user = "netops"
password = "first"

[[crawl.ssh]]
user = "backup"
password = "second"
timeout_secs = 10
"#
        )
        .unwrap();

        let prefix = dir.path().join("netcrawl");
        let config = load_crawl_config(prefix.to_str().unwrap()).unwrap();

        assert_eq!(config.port, 2222);
        assert_eq!(config.max_concurrent_discoveries, 4);
        assert_eq!(config.command, "show cdp neighbors detail");
        assert_eq!(config.ssh.len(), 2);
        assert_eq!(config.ssh[0].user, "netops");
        assert_eq!(config.ssh[0].timeout_secs, 5);
        assert_eq!(config.ssh[1].user, "backup");
        assert_eq!(config.ssh[1].timeout_secs, 10);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent");
        let config = load_crawl_config(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.port, 22);
    }
}
