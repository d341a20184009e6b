//! `urssaf mandates`: the SEPA mandates registered on the account.

use tabled::Tabled;

use urssaf_core::Mandate;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct MandateRow {
    #[tabled(rename = "RUM")]
    rum: String,
    #[tabled(rename = "Bank")]
    bank: String,
    #[tabled(rename = "IBAN")]
    iban: String,
    #[tabled(rename = "BIC")]
    bic: String,
    #[tabled(rename = "Creditor")]
    creditor: String,
}

fn row(m: &Mandate) -> MandateRow {
    MandateRow {
        rum: m.rum.clone(),
        bank: m.bank_name.clone(),
        iban: m.iban.clone(),
        bic: m.bic.clone(),
        creditor: m.creditor.name.clone(),
    }
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let (config, _) = util::declarer(global)?;
    let mut session = util::login(&config).await?;
    let mandates = session.mandates().await?;

    let out = output::render_list(&global.output, mandates, row, |m| m.rum.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
