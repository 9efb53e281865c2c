//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use fritzmon_config::ConfigError;
use fritzmon_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNAVAILABLE: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to {target}")]
    #[diagnostic(
        code(fritzmon::connection_failed),
        help(
            "Check that the router is reachable.\n\
             {reason}\n\
             Try: fritzmon devices list --host 192.168.178.1"
        )
    )]
    ConnectionFailed { target: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(fritzmon::auth_failed),
        help(
            "Verify the router user name and password.\n\
             The user needs the \"Smart Home\" permission.\n\
             Run: fritzmon config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(fritzmon::no_credentials),
        help(
            "Configure credentials with: fritzmon config init\n\
             Or set FRITZMON_USERNAME and FRITZMON_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Devices ──────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(fritzmon::not_found),
        help("Run: fritzmon {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Device '{identifier}' is unavailable: {reason}")]
    #[diagnostic(
        code(fritzmon::unavailable),
        help("Only sockets that are currently present can be switched.")
    )]
    Unavailable { identifier: String, reason: String },

    // ── API ──────────────────────────────────────────────────────────

    #[error("Router error ({code}): {message}")]
    #[diagnostic(code(fritzmon::api_error))]
    ApiError { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fritzmon::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(fritzmon::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: fritzmon config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(fritzmon::no_config),
        help(
            "Create one with: fritzmon config init\n\
             Or pass the router with --host.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(fritzmon::config))]
    Config(Box<ConfigError>),

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(fritzmon::timeout),
        help("Increase timeout with --timeout or check router responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    #[diagnostic(code(fritzmon::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization failed: {0}")]
    #[diagnostic(code(fritzmon::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Unavailable { .. } => exit_code::UNAVAILABLE,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the profile name to auth errors raised below the CLI.
    pub fn for_profile(self, name: &str) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                profile: name.into(),
                message,
            },
            Self::NoCredentials { .. } => Self::NoCredentials {
                profile: name.into(),
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { target, reason } => {
                CliError::ConnectionFailed { target, reason }
            }

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },

            CoreError::NoCredentials => CliError::NoCredentials {
                profile: "current".into(),
            },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::ListingFetch { reason } => CliError::ApiError {
                code: "listing".into(),
                message: reason,
            },

            CoreError::DeviceFetch { unique_id, reason } => CliError::ApiError {
                code: "device".into(),
                message: format!("{unique_id}: {reason}"),
            },

            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices list".into(),
            },

            CoreError::DeviceUnavailable { identifier, reason } => {
                CliError::Unavailable { identifier, reason }
            }

            CoreError::Api { message, status } => CliError::ApiError {
                code: status.map_or_else(|| "router".into(), |s| s.to_string()),
                message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::ApiError {
                code: "internal".into(),
                message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            other => CliError::Config(Box::new(other)),
        }
    }
}
