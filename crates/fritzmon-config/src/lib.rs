//! Shared configuration for the fritzmon CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `fritzmon_core::HubConfig`. The CLI adds
//! `GlobalOpts`-aware overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use fritzmon_core::{
    CoreError, CredentialStore, Credentials, DEFAULT_UNKNOWN_LABEL, HubConfig, StaticPhonebook,
    TlsVerification,
};

/// Service name for every keyring entry.
pub const KEYRING_SERVICE: &str = "fritzmon";

/// Env var checked for the password when the profile names none.
pub const PASSWORD_ENV: &str = "FRITZMON_PASSWORD";

/// Env var checked for the username when the profile has none.
pub const USERNAME_ENV: &str = "FRITZMON_USERNAME";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<keyring::Error> for ConfigError {
    fn from(err: keyring::Error) -> Self {
        Self::Keyring(err.to_string())
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named router profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    5
}
fn default_host() -> String {
    "fritz.box".into()
}

/// A named router profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Router host name or address; also the call-monitor host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Web interface URL. Defaults to `http://<host>`.
    pub url: Option<String>,

    /// Call-monitor port (1012 unless changed on the router).
    pub monitor_port: Option<u16>,

    /// Username for the home-automation login.
    pub username: Option<String>,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Accept self-signed TLS certificates.
    pub insecure: Option<bool>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// HTTP timeout override in seconds.
    pub timeout: Option<u64>,

    /// Device poll interval override in seconds.
    pub poll_interval_secs: Option<u64>,

    /// Name shown for callers not in the phonebook.
    pub unknown_caller_label: Option<String>,

    /// Connect to the call monitor (default on).
    pub call_monitor: Option<bool>,

    /// Poll smart-home devices (default on).
    pub devices: Option<bool>,

    /// Number → name table for caller resolution.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub phonebook: HashMap<String, String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            host: default_host(),
            url: None,
            monitor_port: None,
            username: None,
            password: None,
            password_env: None,
            insecure: None,
            ca_cert: None,
            timeout: None,
            poll_interval_secs: None,
            unknown_caller_label: None,
            call_monitor: None,
            devices: None,
            phonebook: HashMap::new(),
        }
    }
}

impl Profile {
    /// The web interface URL, derived from `host` when not set.
    pub fn router_url(&self) -> Result<url::Url, ConfigError> {
        let raw = self
            .url
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.host));
        raw.parse().map_err(|_| ConfigError::Validation {
            field: "url".into(),
            reason: format!("invalid URL: {raw}"),
        })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "fritzmon", "fritzmon").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("fritzmon");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FRITZMON_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str, field: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/{field}"),
    )?)
}

fn keyring_password(profile_name: &str) -> Option<String> {
    keyring_entry(profile_name, "password")
        .ok()
        .and_then(|entry| entry.get_password().ok())
}

/// Store `password` in the system keyring for `profile_name`.
pub fn store_password(profile_name: &str, password: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(profile_name, "password")?.set_password(password.expose_secret())?;
    Ok(())
}

/// Resolve the password: profile `password_env` → `FRITZMON_PASSWORD`
/// → keyring → plaintext.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    resolve_password_with(profile, profile_name, |name| std::env::var(name).ok())
}

/// [`resolve_password`] with a custom environment lookup.
pub fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Option<SecretString> {
    // 1. Profile's password_env → env var lookup
    if let Some(value) = profile.password_env.as_deref().and_then(&env) {
        return Some(SecretString::from(value));
    }

    // 2. Global env var
    if let Some(value) = env(PASSWORD_ENV) {
        return Some(SecretString::from(value));
    }

    // 3. System keyring
    if let Some(value) = keyring_password(profile_name) {
        debug!(profile = profile_name, "password taken from keyring");
        return Some(SecretString::from(value));
    }

    // 4. Plaintext in config
    profile.password.clone().map(SecretString::from)
}

/// Resolve username + password for a profile.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<Credentials, ConfigError> {
    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var(USERNAME_ENV).ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;
    let password =
        resolve_password(profile, profile_name).ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;
    Ok(Credentials::new(username, password))
}

/// Build a `HubConfig` from a profile and the global defaults.
///
/// Missing credentials are not an error here: the hub falls back to its
/// credential store and asks for registration.
pub fn profile_to_hub_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<HubConfig, ConfigError> {
    let mut config = HubConfig::new(profile.router_url()?);
    config.monitor_host.clone_from(&profile.host);
    if let Some(port) = profile.monitor_port {
        config.monitor_port = port;
    }

    config.credentials = match resolve_credentials(profile, profile_name) {
        Ok(credentials) => Some(credentials),
        Err(ConfigError::NoCredentials { .. }) => None,
        Err(e) => return Err(e),
    };

    config.tls = if profile.insecure.unwrap_or(false) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::DangerAcceptInvalid // routers ship self-signed certs
    };

    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    let poll = profile
        .poll_interval_secs
        .unwrap_or(defaults.poll_interval_secs)
        .max(1);
    config.poll_interval = Duration::from_secs(poll);
    config.unknown_caller_label = profile
        .unknown_caller_label
        .clone()
        .unwrap_or_else(|| DEFAULT_UNKNOWN_LABEL.into());
    config.call_monitor_enabled = profile.call_monitor.unwrap_or(true);
    config.device_polling_enabled = profile.devices.unwrap_or(true);
    Ok(config)
}

/// The profile's phonebook table.
pub fn phonebook(profile: &Profile) -> StaticPhonebook {
    profile.phonebook.iter().collect()
}

// ── Keyring credential store ────────────────────────────────────────

/// Persists registered credentials in the system keyring, under
/// `<profile>/username` and `<profile>/password`.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    profile: String,
}

impl KeyringCredentialStore {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }

    fn read(&self, field: &str) -> Result<Option<String>, CoreError> {
        let entry = keyring_entry(&self.profile, field).map_err(store_err)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(store_err(e)),
        }
    }

    fn remove(&self, field: &str) -> Result<(), CoreError> {
        let entry = keyring_entry(&self.profile, field).map_err(store_err)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(store_err(e)),
        }
    }
}

fn store_err(e: impl std::fmt::Display) -> CoreError {
    CoreError::Config {
        message: format!("credential store: {e}"),
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, CoreError> {
        let Some(username) = self.read("username")? else {
            return Ok(None);
        };
        Ok(self
            .read("password")?
            .map(|password| Credentials::new(username, SecretString::from(password))))
    }

    fn save(&self, credentials: &Credentials) -> Result<(), CoreError> {
        let entry = keyring_entry(&self.profile, "username").map_err(store_err)?;
        entry
            .set_password(&credentials.username)
            .map_err(store_err)?;
        store_password(&self.profile, &credentials.password).map_err(store_err)
    }

    fn clear(&self) -> Result<(), CoreError> {
        self.remove("username")?;
        self.remove("password")
    }
}
