use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(3);

const ENV_URL: &str = "FSMON_URL";
const ENV_TIMEOUT_MS: &str = "FSMON_TIMEOUT_MS";
const ENV_REFRESH_SECS: &str = "FSMON_REFRESH_SECS";
const ENV_STATE_DIR: &str = "FSMON_STATE_DIR";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    pub base_url: Url,
    pub timeout: Duration,
    /// Auto-refresh period while monitoring; `None` disables it.
    pub refresh_interval: Option<Duration>,
    pub state_dir: Option<PathBuf>,
}

/// Values given on the command line; they win over the environment.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub refresh_secs: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid monitor service URL {value}: {reason}")]
    InvalidUrl { value: String, reason: String },

    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

pub fn resolve_config(overrides: &ConfigOverrides) -> Result<Config, ConfigError> {
    resolve_config_with(overrides, |name| std::env::var(name).ok())
}

pub fn resolve_config_with(
    overrides: &ConfigOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let raw_url = overrides
        .base_url
        .clone()
        .or_else(|| non_empty(env(ENV_URL)))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let base_url = parse_base_url(&raw_url)?;

    let timeout_ms = match overrides.timeout_ms {
        Some(value) => Some(value),
        None => parse_env_u64(ENV_TIMEOUT_MS, &env)?,
    };
    let timeout = match timeout_ms {
        Some(0) => return Err(ConfigError::ZeroTimeout),
        Some(ms) => Duration::from_millis(ms),
        None => DEFAULT_TIMEOUT,
    };

    let refresh_secs = match overrides.refresh_secs {
        Some(value) => Some(value),
        None => parse_env_u64(ENV_REFRESH_SECS, &env)?,
    };
    let refresh_interval = match refresh_secs {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => Some(DEFAULT_REFRESH_INTERVAL),
    };

    let state_dir = non_empty(env(ENV_STATE_DIR))
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".fsmon")));

    Ok(Config {
        base_url,
        timeout,
        refresh_interval,
        state_dir,
    })
}

/// Parses an http(s) base URL and makes sure endpoint paths join beneath it.
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim()).map_err(|error| ConfigError::InvalidUrl {
        value: raw.to_string(),
        reason: error.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            value: raw.to_string(),
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_env_u64(
    name: &'static str,
    env: &impl Fn(&str) -> Option<String>,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = non_empty(env(name)) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidEnv { name, value: raw })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_flags_or_env() {
        let config = resolve_config_with(&ConfigOverrides::default(), env_from(&[]))
            .expect("config");
        assert_eq!(config.base_url.as_str(), DEFAULT_BASE_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.refresh_interval, Some(DEFAULT_REFRESH_INTERVAL));
    }

    #[test]
    fn env_overrides_defaults_and_flags_override_env() {
        let env = env_from(&[
            ("FSMON_URL", "http://monitor:8080"),
            ("FSMON_TIMEOUT_MS", "750"),
            ("FSMON_REFRESH_SECS", "10"),
            ("FSMON_STATE_DIR", "/var/lib/fsmon"),
        ]);
        let config = resolve_config_with(&ConfigOverrides::default(), &env).expect("config");
        assert_eq!(config.base_url.as_str(), "http://monitor:8080/");
        assert_eq!(config.timeout, Duration::from_millis(750));
        assert_eq!(config.refresh_interval, Some(Duration::from_secs(10)));
        assert_eq!(config.state_dir, Some(PathBuf::from("/var/lib/fsmon")));

        let overrides = ConfigOverrides {
            base_url: Some("https://other.example/api".to_string()),
            timeout_ms: Some(100),
            refresh_secs: Some(0),
        };
        let config = resolve_config_with(&overrides, &env).expect("config");
        assert_eq!(config.base_url.as_str(), "https://other.example/api/");
        assert_eq!(config.timeout, Duration::from_millis(100));
        assert_eq!(config.refresh_interval, None);
    }

    #[test]
    fn base_url_with_path_keeps_endpoints_beneath_it() {
        let url = parse_base_url("http://host:5000/monitor").expect("url");
        assert_eq!(
            url.join("logs").expect("join").as_str(),
            "http://host:5000/monitor/logs"
        );
    }

    #[test]
    fn rejects_bad_url_scheme_and_numbers() {
        assert!(matches!(
            parse_base_url("ftp://host"),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_base_url("not a url"),
            Err(ConfigError::InvalidUrl { .. })
        ));

        let result = resolve_config_with(
            &ConfigOverrides::default(),
            env_from(&[("FSMON_TIMEOUT_MS", "soon")]),
        );
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnv {
                name: "FSMON_TIMEOUT_MS",
                ..
            })
        ));

        let overrides = ConfigOverrides {
            timeout_ms: Some(0),
            ..ConfigOverrides::default()
        };
        assert!(matches!(
            resolve_config_with(&overrides, env_from(&[])),
            Err(ConfigError::ZeroTimeout)
        ));
    }
}
