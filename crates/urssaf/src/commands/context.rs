//! `urssaf context`: the declaration context as the server holds it.

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let (config, _) = util::declarer(global)?;
    let mut session = util::login(&config).await?;
    let context = session.get_context().await?;

    let pretty = |v: &serde_json::Value| serde_json::to_string_pretty(v).unwrap_or_default();
    let out = output::render_single(&global.output, context, pretty, pretty)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
