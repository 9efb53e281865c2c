//! CLI configuration: thin wrapper around `fritzmon_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--host, --username, etc.).

use std::sync::Arc;

use fritzmon_config::KeyringCredentialStore;
use fritzmon_core::{Hub, HubConfig, StaticPhonebook};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use fritzmon_config::{
    Config, Profile, config_path, load_config, load_config_or_default, save_config,
};

/// A profile resolved into everything the hub needs.
pub struct ResolvedProfile {
    pub name: String,
    pub hub: HubConfig,
    pub phonebook: StaticPhonebook,
}

impl ResolvedProfile {
    /// Build a hub wired to the profile's phonebook and keyring entries.
    pub fn into_hub(self) -> Hub {
        Hub::builder(self.hub)
            .phonebook(Arc::new(self.phonebook))
            .credential_store(Arc::new(KeyringCredentialStore::new(self.name)))
            .build()
    }
}

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Comma-separated profile names for diagnostics.
pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().cloned().collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort();
    names.join(", ")
}

/// Load the config file and resolve the active profile with flag overrides.
///
/// Without a stored profile, `--host` alone is enough to build one.
pub fn resolve(global: &GlobalOpts) -> Result<ResolvedProfile, CliError> {
    let cfg = load_config()?;
    let name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&name) {
        Some(profile) => profile.clone(),
        None if global.host.is_some() => Profile::default(),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                available: available_profiles(&cfg),
                name,
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    apply_overrides(&mut profile, global);

    let hub = fritzmon_config::profile_to_hub_config(&profile, &name, &cfg.defaults)?;
    Ok(ResolvedProfile {
        phonebook: fritzmon_config::phonebook(&profile),
        hub,
        name,
    })
}

/// Flag values win over the profile.
fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
        profile.url = None;
    }
    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
}
