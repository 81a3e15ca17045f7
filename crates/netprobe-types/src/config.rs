use std::{fs, path::Path, time::Duration};

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::{NetprobeError, Result};

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_FAST_MBPS: f64 = 10.0;
pub const DEFAULT_MEDIUM_MBPS: f64 = 2.0;

/// Classification boundaries in Mbps. `fast > medium > 0` is expected but not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub fast_mbps: f64,
    pub medium_mbps: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            fast_mbps: DEFAULT_FAST_MBPS,
            medium_mbps: DEFAULT_MEDIUM_MBPS,
        }
    }
}

/// How the probe resource is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStrategy {
    /// Passive load; any failure is reported generically.
    #[default]
    Tag,
    /// Active request with caching disabled; fails on non-2xx.
    Fetch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOptions {
    #[serde(default)]
    pub local_url: Option<String>,
    pub public_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_auto_detect")]
    pub auto_detect_fallback: bool,
    #[serde(default)]
    pub load_strategy: LoadStrategy,
    #[serde(default)]
    pub thresholds: Thresholds,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_auto_detect() -> bool {
    true
}

impl ProbeOptions {
    pub fn new(public_url: impl Into<String>) -> Self {
        Self {
            local_url: None,
            public_url: public_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            auto_detect_fallback: true,
            load_strategy: LoadStrategy::default(),
            thresholds: Thresholds::default(),
        }
    }

    pub fn with_local_url(mut self, url: impl Into<String>) -> Self {
        self.local_url = Some(url.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.auto_detect_fallback = enabled;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_strategy(mut self, strategy: LoadStrategy) -> Self {
        self.load_strategy = strategy;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.public_url.trim().is_empty() {
            return Err(NetprobeError::Configuration(
                "probe.public_url must not be empty".into(),
            ));
        }
        validate_http_url("probe.public_url", &self.public_url)?;
        if let Some(local) = &self.local_url {
            validate_http_url("probe.local_url", local)?;
        }
        if self.timeout_ms == 0 {
            return Err(NetprobeError::Configuration(
                "probe.timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn validate_http_url(field: &str, raw: &str) -> Result<()> {
    let url = Url::parse(raw)
        .map_err(|err| NetprobeError::Configuration(format!("{field} is not a valid URL ({raw}): {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(NetprobeError::Configuration(format!(
            "{field} must use http or https, got '{}'",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(NetprobeError::Configuration(format!(
            "{field} must include a host: {raw}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    pub log_level: String,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetprobeConfig {
    pub probe: ProbeOptions,
    #[serde(default)]
    pub ops: OpsConfig,
}

impl NetprobeConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            NetprobeError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            NetprobeError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.probe.validate()?;
        if self.ops.log_level.trim().is_empty() {
            return Err(NetprobeError::Configuration(
                "ops.log_level must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn load_netprobe_config_from_file() {
        let temp_path = std::env::temp_dir().join("netprobe-config-test.toml");
        let config = NetprobeConfig {
            probe: ProbeOptions::new("https://cdn.example.com/probe.jpg")
                .with_local_url("http://10.0.0.5/probe.jpg")
                .with_timeout_ms(2_500)
                .with_strategy(LoadStrategy::Fetch),
            ops: OpsConfig {
                log_level: "debug".into(),
            },
        };

        let doc = toml::to_string(&config).expect("serialize config");
        fs::write(&temp_path, doc).expect("write temp config");

        let loaded = NetprobeConfig::from_file(&temp_path).expect("load config");
        assert_eq!(loaded.probe, config.probe);
        assert_eq!(loaded.ops.log_level, "debug");
        fs::remove_file(&temp_path).expect("cleanup temp config");
    }

    #[test]
    fn omitted_fields_take_defaults() {
        let doc = r#"
            [probe]
            public_url = "https://cdn.example.com/probe.jpg"
        "#;
        let config: NetprobeConfig = toml::from_str(doc).expect("parse minimal config");
        assert_eq!(config.probe.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(config.probe.auto_detect_fallback);
        assert_eq!(config.probe.thresholds, Thresholds::default());
        assert_eq!(config.probe.load_strategy, LoadStrategy::Tag);
        assert_eq!(config.probe.local_url, None);
        assert_eq!(config.ops.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_strategy_parses_from_snake_case() {
        let doc = r#"
            [probe]
            public_url = "https://cdn.example.com/probe.bin"
            load_strategy = "fetch"
        "#;
        let config: NetprobeConfig = toml::from_str(doc).expect("parse config");
        assert_eq!(config.probe.load_strategy, LoadStrategy::Fetch);
    }

    #[test]
    fn validate_url_rules() {
        let mut options = ProbeOptions::new("");
        assert!(matches!(
            options.validate(),
            Err(NetprobeError::Configuration(_))
        ));
        options.public_url = "not a url".into();
        assert!(options.validate().is_err());
        options.public_url = "ftp://cdn.example.com/probe.jpg".into();
        assert!(options.validate().is_err());
        options.public_url = "/relative/probe.jpg".into();
        assert!(options.validate().is_err());
        options.public_url = "https://cdn.example.com/probe.jpg".into();
        assert!(options.validate().is_ok());
        options.local_url = Some("intranet/probe.jpg".into());
        assert!(options.validate().is_err());
        options.local_url = Some("http://10.0.0.5:8080/probe.jpg".into());
        assert!(options.validate().is_ok());
        options.timeout_ms = 0;
        assert!(options.validate().is_err());
    }
}
