//! Configuration for linkward.
//!
//! TOML file + `LINKWARD_` environment layering, switch credential
//! resolution (env + plaintext), and translation into the runtime types
//! of `linkward-core` and `linkward-switch`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use linkward_core::{EngineConfig, PoolRange, SwitchRegistry};
use linkward_switch::{
    Credentials, HttpSwitch, MockSwitch, Switch, SwitchKind, TlsMode, TransportConfig,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for switch '{switch}'")]
    NoCredentials { switch: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("switch '{switch}': {source}")]
    Switch {
        switch: String,
        #[source]
        source: linkward_switch::Error,
    },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub pool: PoolSection,

    #[serde(default)]
    pub engine: EngineSection,

    /// Named switch profiles.
    #[serde(default)]
    pub switches: BTreeMap<String, SwitchProfile>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreSection {
    /// Database file. Defaults to the platform data directory.
    pub path: Option<PathBuf>,
}

/// Half-open VLAN id range handed out by the allocator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolSection {
    #[serde(default = "default_pool_start")]
    pub start: u16,
    #[serde(default = "default_pool_end")]
    pub end: u16,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            start: default_pool_start(),
            end: default_pool_end(),
        }
    }
}

fn default_pool_start() -> u16 {
    100
}
fn default_pool_end() -> u16 {
    200
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSection {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_action_timeout_secs")]
    pub action_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            action_timeout_secs: default_action_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_workers() -> usize {
    4
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    250
}
fn default_action_timeout_secs() -> u64 {
    60
}
fn default_poll_interval_ms() -> u64 {
    1000
}

/// A named switch.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SwitchProfile {
    /// Driver kind: "http" or "mock".
    #[serde(default = "default_kind")]
    pub kind: String,

    /// Management API base URL (http kind).
    pub url: Option<String>,

    pub username: Option<String>,

    /// Password (plaintext -- prefer `password_env`).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout: Option<u64>,

    /// Skip TLS verification.
    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// HTTP statuses >= 400 this switch returns for benign conditions.
    #[serde(default)]
    pub acceptable_error_codes: Vec<u16>,
}

fn default_kind() -> String {
    SwitchKind::Http.as_str().into()
}

impl SwitchProfile {
    pub fn switch_kind(&self) -> Result<SwitchKind, ConfigError> {
        match self.kind.as_str() {
            "http" => Ok(SwitchKind::Http),
            "mock" => Ok(SwitchKind::Mock),
            other => Err(invalid(
                "kind",
                format!("expected 'http' or 'mock', got '{other}'"),
            )),
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "linkward", "linkward")
}

/// Default config file location (platform conventions).
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from("linkward.toml"),
        |dirs| dirs.config_dir().join("linkward.toml"),
    )
}

/// Default database location (platform conventions).
pub fn default_store_path() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from("linkward.redb"),
        |dirs| dirs.data_dir().join("linkward.redb"),
    )
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load configuration: defaults, then the TOML file at `path` (or the
/// default location), then `LINKWARD_*` environment variables. Nested
/// keys use `__`, e.g. `LINKWARD_ENGINE__WORKERS=8`.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("LINKWARD_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Render `config` as TOML.
pub fn render_config(config: &Config) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(config)?)
}

impl Config {
    /// Check everything that can be checked without touching the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pool_range()?;

        if self.engine.workers == 0 {
            return Err(invalid("engine.workers", "must be at least 1"));
        }
        if self.engine.max_attempts == 0 {
            return Err(invalid("engine.max_attempts", "must be at least 1"));
        }
        if self.engine.action_timeout_secs == 0 {
            return Err(invalid("engine.action_timeout_secs", "must be at least 1"));
        }

        for (name, profile) in &self.switches {
            if name.is_empty() || name.contains('/') {
                return Err(invalid(
                    format!("switches.{name}"),
                    "switch names must be non-empty and contain no '/'",
                ));
            }
            if profile.switch_kind()? == SwitchKind::Http {
                parse_url(name, profile)?;
            }
        }
        Ok(())
    }

    pub fn pool_range(&self) -> Result<PoolRange, ConfigError> {
        PoolRange::new(self.pool.start, self.pool.end).map_err(|e| invalid("pool", e.to_string()))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            workers: self.engine.workers,
            max_attempts: self.engine.max_attempts,
            backoff: Duration::from_millis(self.engine.backoff_ms),
            action_timeout: Duration::from_secs(self.engine.action_timeout_secs),
            poll_interval: Duration::from_millis(self.engine.poll_interval_ms),
        }
    }

    /// Configured database path, or the platform default.
    pub fn store_path(&self) -> PathBuf {
        self.store.path.clone().unwrap_or_else(default_store_path)
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve a switch password: `password_env` first, then plaintext.
pub fn resolve_password(profile: &SwitchProfile, switch: &str) -> Result<SecretString, ConfigError> {
    if let Some(env_name) = &profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    if let Some(pw) = &profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        switch: switch.into(),
    })
}

pub fn resolve_credentials(profile: &SwitchProfile, switch: &str) -> Result<Credentials, ConfigError> {
    let username = profile
        .username
        .clone()
        .ok_or_else(|| ConfigError::NoCredentials {
            switch: switch.into(),
        })?;
    Ok(Credentials::new(username, resolve_password(profile, switch)?))
}

// ── Runtime construction ────────────────────────────────────────────

fn parse_url(switch: &str, profile: &SwitchProfile) -> Result<url::Url, ConfigError> {
    let raw = profile
        .url
        .as_deref()
        .ok_or_else(|| invalid(format!("switches.{switch}.url"), "required for http switches"))?;
    raw.parse()
        .map_err(|_| invalid(format!("switches.{switch}.url"), format!("invalid URL: {raw}")))
}

pub fn transport_config(profile: &SwitchProfile) -> TransportConfig {
    let tls = if profile.insecure {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ca_path) = &profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };

    TransportConfig {
        tls,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(30)),
    }
}

/// Build the switch described by `profile`.
pub fn build_switch(name: &str, profile: &SwitchProfile) -> Result<Arc<dyn Switch>, ConfigError> {
    match profile.switch_kind()? {
        SwitchKind::Mock => Ok(Arc::new(MockSwitch::new(name))),
        SwitchKind::Http => {
            let url = parse_url(name, profile)?;
            let credentials = resolve_credentials(profile, name)?;
            let switch = HttpSwitch::new(name, url, credentials, &transport_config(profile))
                .map_err(|source| ConfigError::Switch {
                    switch: name.into(),
                    source,
                })?
                .with_acceptable_error_codes(profile.acceptable_error_codes.clone());
            Ok(Arc::new(switch))
        }
    }
}

/// Build a registry holding every configured switch.
pub fn build_registry(config: &Config) -> Result<SwitchRegistry, ConfigError> {
    let registry = SwitchRegistry::new();
    for (name, profile) in &config.switches {
        registry.insert(build_switch(name, profile)?);
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    fn load(jail: &Jail) -> Result<Config, figment::Error> {
        load_config(Some(&jail.directory().join("linkward.toml"))).map_err(|e| e.to_string().into())
    }

    #[test]
    fn defaults_without_file() {
        Jail::expect_with(|jail| {
            let config = load(jail)?;
            assert_eq!(config.pool.start, 100);
            assert_eq!(config.pool.end, 200);
            assert_eq!(config.engine_config(), EngineConfig::default());
            assert!(config.switches.is_empty());
            Ok(())
        });
    }

    #[test]
    fn file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "linkward.toml",
                r#"
                [pool]
                start = 300
                end = 310

                [engine]
                workers = 2

                [switches.sw0]
                kind = "http"
                url = "https://sw0.example:8443/api/"
                username = "admin"
                password_env = "SW0_PASSWORD"
                acceptable_error_codes = [409]

                [switches.lab]
                kind = "mock"
                "#,
            )?;
            jail.set_env("LINKWARD_ENGINE__WORKERS", "8");
            jail.set_env("SW0_PASSWORD", "hunter2");

            let config = load(jail)?;
            assert_eq!(config.pool_range().map_err(|e| e.to_string())?.len(), 10);
            assert_eq!(config.engine.workers, 8);

            let registry = build_registry(&config).map_err(|e| e.to_string())?;
            assert_eq!(registry.names(), vec!["lab".to_owned(), "sw0".to_owned()]);
            let sw0 = registry.get("sw0").map_err(|e| e.to_string())?;
            assert_eq!(sw0.kind(), SwitchKind::Http);
            Ok(())
        });
    }

    #[test]
    fn rejects_bad_values() {
        Jail::expect_with(|jail| {
            jail.create_file("linkward.toml", "[pool]\nstart = 200\nend = 100\n")?;
            assert!(load(jail).is_err());

            jail.create_file("linkward.toml", "[pool]\nstart = 4000\nend = 5000\n")?;
            assert!(load(jail).is_err());

            jail.create_file("linkward.toml", "[engine]\nworkers = 0\n")?;
            assert!(load(jail).is_err());

            jail.create_file("linkward.toml", "[switches.sw0]\nkind = \"telnet\"\n")?;
            assert!(load(jail).is_err());

            jail.create_file("linkward.toml", "[switches.sw0]\nurl = \"not a url\"\n")?;
            assert!(load(jail).is_err());
            Ok(())
        });
    }

    #[test]
    fn password_resolution_order() {
        Jail::expect_with(|jail| {
            let mut profile = SwitchProfile {
                kind: "http".into(),
                url: Some("https://sw0.example".into()),
                username: Some("admin".into()),
                password: Some("plain".into()),
                password_env: Some("LW_TEST_SW_PASSWORD".into()),
                timeout: None,
                insecure: false,
                ca_cert: None,
                acceptable_error_codes: Vec::new(),
            };

            jail.set_env("LW_TEST_SW_PASSWORD", "from-env");
            let secret = resolve_password(&profile, "sw0").map_err(|e| e.to_string())?;
            assert_eq!(secrecy::ExposeSecret::expose_secret(&secret), "from-env");

            profile.password_env = None;
            let secret = resolve_password(&profile, "sw0").map_err(|e| e.to_string())?;
            assert_eq!(secrecy::ExposeSecret::expose_secret(&secret), "plain");

            profile.password = None;
            assert!(matches!(
                resolve_password(&profile, "sw0"),
                Err(ConfigError::NoCredentials { .. })
            ));
            assert!(build_switch("sw0", &profile).is_err());
            Ok(())
        });
    }

    #[test]
    fn renders_back_to_toml() {
        let mut config = Config::default();
        config.store.path = Some(PathBuf::from("/var/lib/linkward/linkward.redb"));
        let rendered = render_config(&config).map_err(|e| e.to_string());
        assert!(rendered.is_ok_and(|s| s.contains("[pool]") && s.contains("linkward.redb")));
    }
}
