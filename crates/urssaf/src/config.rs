//! CLI configuration: thin wrapper around `urssaf_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` overrides and the interactive password prompt.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use urssaf_core::DeclarerConfig;

use crate::cli::{DeclareArgs, GlobalOpts};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use urssaf_config::{Config, Profile, config_path, load_config, save_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// The config file in use: `--config`, else the platform location.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Load the config file, falling back to defaults when it is absent.
///
/// A file that exists but does not parse is an error.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = config_file(global);
    if path.exists() {
        Ok(load_config(Some(&path))?)
    } else {
        Ok(Config::default())
    }
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// The active profile. A profile named with `--profile` must exist; the
/// default one may be absent, credentials then come from the environment.
pub fn active_profile(global: &GlobalOpts, config: &Config) -> Result<(String, Profile), CliError> {
    let name = active_profile_name(global, config);
    match config.profiles.get(&name) {
        Some(profile) => Ok((name, profile.clone())),
        None if global.profile.is_none() => Ok((name, Profile::default())),
        None => Err(profile_not_found(name, config)),
    }
}

pub fn profile_not_found(name: String, config: &Config) -> CliError {
    let mut available: Vec<_> = config.profiles.keys().cloned().collect();
    available.sort();
    CliError::ProfileNotFound {
        name,
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
    }
}

/// Translate a profile plus global flags into a `DeclarerConfig`.
///
/// The username is resolved first so a missing account fails before any
/// prompt. The password prompt only happens on a terminal.
pub fn resolve_declarer(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
) -> Result<DeclarerConfig, CliError> {
    let username = urssaf_config::resolve_username(profile, profile_name)?;
    let password = match urssaf_config::resolve_password(profile, profile_name) {
        Ok(password) => password,
        Err(urssaf_config::ConfigError::NoCredentials { .. }) if std::io::stdin().is_terminal() => {
            prompt_password(&username)?
        }
        Err(err) => return Err(err.into()),
    };

    let mut config = urssaf_config::declarer_config(profile, username, password)?;
    if let Some(secs) = global.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    Ok(config)
}

/// Apply the `declare` flags on top of the profile values.
pub fn apply_declare_args(config: &mut DeclarerConfig, args: &DeclareArgs) {
    if let Some(ref dir) = args.pdf_dir {
        config.pdf_dir.clone_from(dir);
    }
    if let Some(redo) = args.redo {
        config.redo = redo;
    }
    if let Some(ref rum) = args.mandate {
        config.mandate = Some(rum.clone());
    }
}

fn prompt_password(username: &str) -> Result<SecretString, CliError> {
    let password = rpassword::prompt_password(format!("Password for {username}: "))?;
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(SecretString::from(password))
}
