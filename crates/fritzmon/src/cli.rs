//! Clap derive structures for the `fritzmon` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fritzmon -- call monitor and smart-home client for FRITZ!Box routers
#[derive(Debug, Parser)]
#[command(
    name = "fritzmon",
    version,
    about = "Watch calls and smart-home devices on a FRITZ!Box",
    long_about = "Follows the router's call-monitor socket (port 1012) and polls the\n\
        home-automation interface for DECT sockets and radiator thermostats.\n\n\
        The call monitor must be enabled on the router first: dial #96*5*\n\
        from a connected telephone.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Router profile to use
    #[arg(long, short = 'p', env = "FRITZMON_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Router host name or address (overrides profile)
    #[arg(long, short = 'H', env = "FRITZMON_HOST", global = true)]
    pub host: Option<String>,

    /// Router user name (overrides profile)
    #[arg(long, short = 'u', env = "FRITZMON_USERNAME", global = true)]
    pub username: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FRITZMON_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "FRITZMON_INSECURE", global = true)]
    pub insecure: bool,

    /// HTTP request timeout in seconds (overrides profile)
    #[arg(long, env = "FRITZMON_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Follow calls and device readings until interrupted
    #[command(alias = "mon", alias = "m")]
    Monitor(MonitorArgs),

    /// List, inspect, and switch smart-home devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Parse call-monitor lines (from arguments or stdin)
    Parse(ParseArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Monitor ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Only follow the call monitor, skip device polling
    #[arg(long, conflicts_with = "no_calls")]
    pub no_devices: bool,

    /// Only poll devices, skip the call monitor
    #[arg(long)]
    pub no_calls: bool,

    /// Call-monitor port (overrides profile)
    #[arg(long)]
    pub port: Option<u16>,
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List sockets and thermostats
    #[command(alias = "ls")]
    List,

    /// Show one device
    Get {
        /// Device AIN (spaces optional, e.g. "08761 0000434")
        ain: String,
    },

    /// Turn a socket on or off
    Switch {
        /// Device AIN
        ain: String,

        /// Desired state
        state: SwitchState,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SwitchState {
    On,
    Off,
    /// Invert the last known state
    Toggle,
}

// ── Parse ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ParseArgs {
    /// Raw lines, e.g. "06.03.24 18:40:12;RING;0;0171123;555;SIP0;".
    /// Reads stdin when omitted.
    pub lines: Vec<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets masked)
    Show,

    /// Print the config file location
    Path,

    /// Set a configuration value on the active profile
    Set {
        /// Profile key, e.g. "host", "monitor_port", "username"
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store the router password in the system keyring
    SetPassword {
        /// Profile to store the password for (defaults to active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
