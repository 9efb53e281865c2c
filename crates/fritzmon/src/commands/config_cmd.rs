//! Config subcommand handlers.

use dialoguer::{Input, Select};
use secrecy::SecretString;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "poll_interval_secs = {}", cfg.defaults.poll_interval_secs);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let Some(p) = cfg.profiles.get(name) else {
            continue;
        };
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "host = \"{}\"", p.host);
        if let Some(ref url) = p.url {
            let _ = writeln!(out, "url = \"{url}\"");
        }
        if let Some(port) = p.monitor_port {
            let _ = writeln!(out, "monitor_port = {port}");
        }
        if let Some(ref u) = p.username {
            let _ = writeln!(out, "username = \"{u}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(poll) = p.poll_interval_secs {
            let _ = writeln!(out, "poll_interval_secs = {poll}");
        }
        if let Some(ref label) = p.unknown_caller_label {
            let _ = writeln!(out, "unknown_caller_label = \"{label}\"");
        }
        if let Some(enabled) = p.call_monitor {
            let _ = writeln!(out, "call_monitor = {enabled}");
        }
        if let Some(enabled) = p.devices {
            let _ = writeln!(out, "devices = {enabled}");
        }
        if !p.phonebook.is_empty() {
            let _ = writeln!(out, "phonebook = {} entries", p.phonebook.len());
        }
    }

    out
}

/// Replace plaintext secrets before the config leaves the process.
fn redact(mut cfg: Config) -> Config {
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some("****".into());
        }
    }
    cfg
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn parse_value<T: std::str::FromStr>(
    field: &str,
    value: &str,
    expected: &str,
) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("must be {expected}"),
    })
}

/// Offer to store the password in the system keyring.
///
/// Returns `Some(password)` if the user chose plaintext, `None` if stored in keyring.
fn prompt_password_storage(
    password: String,
    profile_name: &str,
) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the password?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        fritzmon_config::store_password(profile_name, &SecretString::from(password))?;
        eprintln!("   ✓ Password stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(password))
    }
}

fn profile_not_found(name: String, cfg: &Config) -> CliError {
    CliError::ProfileNotFound {
        name,
        available: config::available_profiles(cfg),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("fritzmon configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            let host: String = Input::new()
                .with_prompt("Router host")
                .default("fritz.box".into())
                .interact_text()
                .map_err(prompt_err)?;

            let username: String = Input::new()
                .with_prompt("Username (empty for password-only login)")
                .allow_empty(true)
                .interact_text()
                .map_err(prompt_err)?;

            let password = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
            let password = if password.is_empty() {
                None
            } else {
                prompt_password_storage(password, &profile_name)?
            };

            let profile = Profile {
                host,
                username: (!username.is_empty()).then_some(username),
                password,
                ..Profile::default()
            };

            let mut cfg = config::load_config_or_default();
            cfg.profiles.insert(profile_name.clone(), profile);
            cfg.default_profile = Some(profile_name.clone());
            config::save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", config_path.display());
            eprintln!("  Active profile: {profile_name}");
            eprintln!("\n  Test it: fritzmon devices list");
            eprintln!("  Calls need the call monitor enabled: dial #96*5* on a telephone");

            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redact(config::load_config()?);
            let out = output::render_single(&global.output, &cfg, format_config_redacted, |_| {
                "config".into()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config()?;
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_default();

            match key.as_str() {
                "host" => profile.host = value,
                "url" => {
                    url::Url::parse(&value).map_err(|e| CliError::Validation {
                        field: "url".into(),
                        reason: e.to_string(),
                    })?;
                    profile.url = Some(value);
                }
                "monitor_port" | "monitor-port" => {
                    profile.monitor_port = Some(parse_value(&key, &value, "a port number")?);
                }
                "username" => profile.username = Some(value),
                "password_env" | "password-env" => profile.password_env = Some(value),
                "insecure" => {
                    profile.insecure = Some(parse_value(&key, &value, "'true' or 'false'")?);
                }
                "ca_cert" | "ca-cert" => profile.ca_cert = Some(value.into()),
                "timeout" => {
                    profile.timeout = Some(parse_value(&key, &value, "a number (seconds)")?);
                }
                "poll_interval_secs" | "poll-interval" => {
                    profile.poll_interval_secs =
                        Some(parse_value(&key, &value, "a number (seconds)")?);
                }
                "unknown_caller_label" | "unknown-caller-label" => {
                    profile.unknown_caller_label = Some(value);
                }
                "call_monitor" | "call-monitor" => {
                    profile.call_monitor = Some(parse_value(&key, &value, "'true' or 'false'")?);
                }
                "devices" => {
                    profile.devices = Some(parse_value(&key, &value, "'true' or 'false'")?);
                }
                other => match other.strip_prefix("phonebook.") {
                    Some(number) if !number.is_empty() => {
                        profile.phonebook.insert(number.to_owned(), value);
                    }
                    _ => {
                        return Err(CliError::Validation {
                            field: other.into(),
                            reason: format!(
                                "unknown config key '{other}'. Valid keys: host, url, \
                                 monitor_port, username, password_env, insecure, ca_cert, \
                                 timeout, poll_interval_secs, unknown_caller_label, \
                                 call_monitor, devices, phonebook.<number>"
                            ),
                        });
                    }
                },
            }

            config::save_config(&cfg)?;
            eprintln!("✓ Set {key} on profile '{profile_name}'");
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: fritzmon config init");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config()?;
            if !cfg.profiles.contains_key(&name) {
                return Err(profile_not_found(name, &cfg));
            }

            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        // ── SetPassword ─────────────────────────────────────────────
        ConfigCommand::SetPassword { profile } => {
            let cfg = config::load_config()?;
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(profile_not_found(profile_name, &cfg));
            }

            let password = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "value cannot be empty".into(),
                });
            }
            fritzmon_config::store_password(&profile_name, &SecretString::from(password))?;

            eprintln!("✓ Password stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}
