//! # configs
//!
//! Typed application configuration. Sources, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. a TOML file (`$RUSTY_COMMENTS_CONFIG`, default `rusty-comments.toml`; optional)
//! 3. environment variables `RUSTY_COMMENTS__<SECTION>__<KEY>`, e.g.
//!    `RUSTY_COMMENTS__SERVER__HOSTS=https://a.example,https://b.example`
//!
//! A `.env` file in the working directory is loaded into the environment first.

use std::net::SocketAddr;
use std::path::Path;

use config::{Environment, File, FileFormat, Source};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "RUSTY_COMMENTS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "rusty-comments.toml";
pub const ENV_PREFIX: &str = "RUSTY_COMMENTS";

const DEFAULT_SALT: &str = "Eech7co8Ohloopo9Ol6baimi";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub moderation: ModerationConfig,
    pub guard: GuardConfig,
    pub hash: HashConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// Origins allowed to embed the comments, e.g. `https://blog.example`.
    pub hosts: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            hosts: Vec::new(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "comments.db".into(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, Copy)]
#[serde(default)]
pub struct ModerationConfig {
    pub enabled: bool,
    /// Publish comments from authors with an approved comment in the trust window.
    pub approve_acquaintance: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Lifetime of edit tokens and Max-Age of the cookies carrying them.
    pub edit_max_age_secs: i64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            edit_max_age_secs: 900,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HashConfig {
    pub salt: SecretString,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            salt: SecretString::from(DEFAULT_SALT.to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    /// Loads `.env`, the config file and the environment, then validates.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let file = File::from(Path::new(&path))
            .format(FileFormat::Toml)
            .required(false);
        Self::from_sources(file, environment())
    }

    fn from_sources<F>(file: F, env: Environment) -> Result<Self, ConfigError>
    where
        F: Source + Send + Sync + 'static,
    {
        let cfg: AppConfig = config::Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()?;
        cfg.validate()
    }

    fn validate(mut self) -> Result<Self, ConfigError> {
        self.server.hosts = self
            .server
            .hosts
            .iter()
            .map(|h| h.trim().trim_end_matches('/').to_string())
            .filter(|h| !h.is_empty())
            .collect();

        if self.server.hosts.is_empty() {
            return Err(ConfigError::Invalid(
                "server.hosts must name at least one origin".into(),
            ));
        }
        if let Some(bad) = self
            .server
            .hosts
            .iter()
            .find(|h| !(h.starts_with("http://") || h.starts_with("https://")))
        {
            return Err(ConfigError::Invalid(format!(
                "server.hosts entry {bad:?} is not an http(s) origin"
            )));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be positive".into(),
            ));
        }
        if self.guard.edit_max_age_secs <= 0 {
            return Err(ConfigError::Invalid(
                "guard.edit_max_age_secs must be positive".into(),
            ));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.request_timeout_secs must be positive".into(),
            ));
        }
        Ok(self)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("server.hosts")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn toml(src: &str) -> File<config::FileSourceString, FileFormat> {
        File::from_str(src, FileFormat::Toml)
    }

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    #[test]
    fn defaults_apply_when_only_hosts_given() {
        let cfg = AppConfig::from_sources(
            toml("[server]\nhosts = [\"https://blog.example/\"]\n"),
            env(&[]),
        )
        .unwrap();

        assert_eq!(cfg.server.hosts, vec!["https://blog.example".to_string()]);
        assert_eq!(cfg.server.listen, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(cfg.database.path, "comments.db");
        assert_eq!(cfg.guard.edit_max_age_secs, 900);
        assert!(!cfg.moderation.enabled);
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert_eq!(cfg.hash.salt.expose_secret(), DEFAULT_SALT);
    }

    #[test]
    fn environment_overrides_file() {
        let cfg = AppConfig::from_sources(
            toml("[server]\nhosts = [\"https://a.example\"]\n[moderation]\nenabled = false\n"),
            env(&[
                ("RUSTY_COMMENTS__SERVER__HOSTS", "https://b.example,https://c.example"),
                ("RUSTY_COMMENTS__MODERATION__ENABLED", "true"),
                ("RUSTY_COMMENTS__LOG__FORMAT", "pretty"),
            ]),
        )
        .unwrap();

        assert_eq!(
            cfg.server.hosts,
            vec!["https://b.example".to_string(), "https://c.example".to_string()]
        );
        assert!(cfg.moderation.enabled);
        assert_eq!(cfg.log.format, LogFormat::Pretty);
    }

    #[test]
    fn missing_hosts_is_fatal() {
        let err = AppConfig::from_sources(toml(""), env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn non_http_host_is_fatal() {
        let err = AppConfig::from_sources(
            toml("[server]\nhosts = [\"blog.example\"]\n"),
            env(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unparsable_listen_address_is_fatal() {
        let err = AppConfig::from_sources(
            toml("[server]\nlisten = \"not-an-addr\"\nhosts = [\"https://a.example\"]\n"),
            env(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
