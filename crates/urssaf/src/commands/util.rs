//! Shared helpers for command handlers.

use tracing::info;

use urssaf_core::{DeclarerConfig, Session};

use crate::cli::GlobalOpts;
use crate::config::{self, Profile};
use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Resolve the active profile into a runtime configuration.
pub fn declarer(global: &GlobalOpts) -> Result<(DeclarerConfig, Profile), CliError> {
    let cfg = config::load(global)?;
    let (name, profile) = config::active_profile(global, &cfg)?;
    let declarer = config::resolve_declarer(&profile, &name, global)?;
    Ok((declarer, profile))
}

/// Open a session and log in.
pub async fn login(config: &DeclarerConfig) -> Result<Session, CliError> {
    let mut session = config.session()?;
    info!(username = %config.username, "logging in");
    session.login(&config.username, &config.password).await?;
    Ok(session)
}
