// Declaration and mandate types
//
// Server payloads (`Raw*`) mirror the authority's French field names and
// use `#[serde(default)]` liberally: the site fills fields inconsistently.
// The normalized types are what callers see.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// ── OAuth configuration ──────────────────────────────────────────────

/// OAuth and service configuration recovered from the site's bundle.
///
/// Produced once per session by the extractor, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OAuthConfig {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub login_url: String,
    /// Only needed (and only present) for the authorization-code flow.
    pub token_endpoint: Option<String>,
    /// `baseURL` of every feature object in the bundle configuration.
    pub base_urls: BTreeMap<String, String>,
}

impl OAuthConfig {
    pub fn base_url(&self, feature: &str) -> Option<&str> {
        self.base_urls.get(feature).map(String::as_str)
    }
}

// ── Mandates ─────────────────────────────────────────────────────────

/// Envelope of the mandate listing: `{ "contexte": { "mandats": [...] } }`.
#[derive(Debug, Deserialize)]
pub struct RawMandateList {
    pub contexte: RawMandateContext,
}

#[derive(Debug, Deserialize)]
pub struct RawMandateContext {
    #[serde(default)]
    pub mandats: Vec<RawMandate>,
}

/// SEPA mandate record as returned by the server.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawMandate {
    pub banque_lib: String,
    pub debiteur_siret: String,
    pub debiteur_bic: String,
    pub debiteur_iban: String,
    #[serde(rename = "ICS")]
    pub ics: String,
    #[serde(rename = "RUM")]
    pub rum: String,
    pub creancier_lib: String,
    pub creancier_orga: String,
    pub creancier_ics: String,
}

/// Creditor side of a mandate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creditor {
    pub name: String,
    pub org: String,
    pub ics: String,
}

/// A SEPA direct-debit mandate usable for payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mandate {
    pub bank_name: String,
    pub siret: String,
    pub bic: String,
    pub iban: String,
    pub ics: String,
    /// Unique mandate reference; identifies the mandate's slot in the payment form.
    pub rum: String,
    pub creditor: Creditor,
}

impl From<RawMandate> for Mandate {
    fn from(raw: RawMandate) -> Self {
        Self {
            bank_name: raw.banque_lib,
            siret: raw.debiteur_siret,
            bic: raw.debiteur_bic,
            iban: raw.debiteur_iban,
            ics: raw.ics,
            rum: raw.rum,
            creditor: Creditor {
                name: raw.creancier_lib,
                org: raw.creancier_orga,
                ics: raw.creancier_ics,
            },
        }
    }
}

// ── Declaration ──────────────────────────────────────────────────────

/// Where a session stands in the declare → validate → pay sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeclarationState {
    #[default]
    Unstarted,
    Declared,
    Validated,
    /// The server reported a mode we can't drive. Terminal.
    ModeError,
}

/// What to do when the period already has a declaration.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum RedoPolicy {
    /// Never redeclare.
    #[default]
    Never,
    /// Redeclare only if the declared amount differs.
    IfChanged,
    /// Always redeclare.
    Always,
}

/// One contribution line computed by the server for a declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxLineItem {
    pub description: String,
    pub amount: f64,
    /// Percentage, e.g. `21.2` for `"21.2%"`.
    pub rate: f64,
}

/// What the server computed for a declared income.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeclarationSummary {
    /// The income as sent, rounded to whole euros.
    pub declared: String,
    pub tax_lines: Vec<TaxLineItem>,
    /// Total contributions due, to be paid by direct debit.
    pub total_due: f64,
}

/// Result of a successful payment.
#[derive(Debug, Clone)]
pub struct Payment {
    /// Final declaration context, worth archiving alongside the receipt.
    pub context: serde_json::Value,
    /// Receipt PDF; download it with `Session::fetch_authenticated`.
    pub receipt_url: String,
}
