// Declaration engine
//
// The server keeps the declaration in a JSON "context" that is echoed back
// and forth: each call sends the whole document and replaces it with the
// response. Only the few fields below are read or written; everything
// else passes through untouched.
//
// declare → validate_declaration → pay, in that order, each one a single
// non-retried submission.

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::models::{DeclarationState, DeclarationSummary, Mandate, Payment, RedoPolicy, TaxLineItem};
use crate::session::Session;
use crate::site::Endpoint;
use crate::transport::Retry;

// ── Context paths ────────────────────────────────────────────────────

const MODE: &str = "/contexte/mode";
const CERTIFICATIONS: &str = "/data/declaration/certif";
const PAYMENT_EXPECTED: &str = "/data/paiement/attendu";
const DECLARED_INCOME: &str = "/data/declaration/ass/ass_autres";
const TAX_LINES: &str = "/data/declaration/cts";
const TOTAL_DUE: &str = "/data/declaration/mts/mtapa";
const SEPA: &str = "/data/paiement/sepa";
const RECEIPT: &str = "/data/declaration_pdf";

/// Declaration modes this client can drive.
const SUPPORTED_MODES: [&str; 2] = ["nouvelle", "existante"];

/// More certifications than this means the period is already declared.
const MAX_PENDING_CERTIFICATIONS: usize = 2;

fn field<'a>(context: &'a Value, path: &str) -> Result<&'a Value, Error> {
    context
        .pointer(path)
        .ok_or_else(|| Error::ContextField { path: path.into() })
}

fn field_mut<'a>(context: &'a mut Value, path: &str) -> Result<&'a mut Value, Error> {
    context
        .pointer_mut(path)
        .ok_or_else(|| Error::ContextField { path: path.into() })
}

/// A number the server may send as a JSON number or a string (`"21.2%"`).
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

/// Canonical text of a declared amount, for comparison.
fn amount_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(match n.as_f64() {
            Some(f) if f.fract().abs() < f64::EPSILON => format!("{:.0}", f + 0.0),
            _ => n.to_string(),
        }),
        _ => None,
    }
}

/// Whole euros to declare: rounded half to even, never `-0`.
fn declared_amount(amount: f64) -> Result<String, Error> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidAmount(amount));
    }
    Ok(format!("{:.0}", amount.round_ties_even() + 0.0))
}

fn is_true(value: &Value) -> bool {
    matches!(value, Value::Bool(true)) || value.as_str() == Some("true")
}

fn entry_count(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(s) => s.chars().count(),
        _ => 0,
    }
}

/// Whether the context shows a period that is already declared and paid.
fn already_done(context: &Value) -> Result<bool, Error> {
    let declaration_expected =
        entry_count(field(context, CERTIFICATIONS)?) <= MAX_PENDING_CERTIFICATIONS;
    let payment_expected = is_true(field(context, PAYMENT_EXPECTED)?);
    Ok(!(declaration_expected || payment_expected))
}

fn tax_lines(context: &Value) -> Result<Vec<TaxLineItem>, Error> {
    let lines = field(context, TAX_LINES)?
        .as_array()
        .ok_or_else(|| Error::ContextField {
            path: TAX_LINES.into(),
        })?;

    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let bad = |key: &str| Error::ContextField {
                path: format!("{TAX_LINES}/{i}/{key}"),
            };
            Ok(TaxLineItem {
                description: line
                    .get("lib")
                    .and_then(Value::as_str)
                    .ok_or_else(|| bad("lib"))?
                    .to_owned(),
                amount: line.get("mt").and_then(number).ok_or_else(|| bad("mt"))?,
                rate: line.get("taux").and_then(number).ok_or_else(|| bad("taux"))?,
            })
        })
        .collect()
}

/// Find the index `n` of the first `<prefix>_<n>` key whose value matches.
///
/// The payment form numbers its slots in key names instead of using a list.
fn find_indexed_slot<'a>(
    map: &'a Map<String, Value>,
    prefix: &str,
    predicate: impl Fn(&Value) -> bool,
) -> Option<&'a str> {
    map.iter().find_map(|(key, value)| {
        key.strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('_'))
            .filter(|_| predicate(value))
    })
}

// ── Session operations ───────────────────────────────────────────────

impl Session {
    /// Fetch a fresh declaration context from the server.
    ///
    /// An unknown declaration mode is not an error here: it is logged and
    /// puts the session in `ModeError`, which later mutations refuse.
    /// A fresh context discards a declaration in progress: the session
    /// goes back to `Unstarted` and must declare again.
    pub async fn get_context(&mut self) -> Result<&Value, Error> {
        let body = self.profile_context().await?.clone();
        let endpoint = self.site.endpoints.declaration_context.clone();
        let url = self.endpoint_url(&endpoint).await?;
        let context: Value = self.transport.post_json(url, &body, Retry::Transient).await?;

        if matches!(
            self.declaration.state,
            DeclarationState::Declared | DeclarationState::Validated
        ) {
            warn!(state = %self.declaration.state, "fresh context replaces the declaration in progress");
            self.declaration.state = DeclarationState::Unstarted;
        }

        let mode = field(&context, MODE)?;
        if !mode.as_str().is_some_and(|m| SUPPORTED_MODES.contains(&m)) {
            warn!(%mode, "unknown declaration mode, won't declare anything with this context");
            self.declaration.state = DeclarationState::ModeError;
        }

        Ok(self.declaration.context.insert(context))
    }

    /// Declare `amount` euros of income for the open period.
    ///
    /// The amount is rounded to whole euros (ties to even). If the period
    /// is already declared and paid, `redo` decides whether to declare again.
    pub async fn declare(
        &mut self,
        amount: f64,
        redo: RedoPolicy,
    ) -> Result<DeclarationSummary, Error> {
        if self.declaration.state == DeclarationState::ModeError {
            return Err(self.mode_error());
        }

        let declared = declared_amount(amount)?;

        self.get_context().await?;
        if self.declaration.state == DeclarationState::ModeError {
            return Err(self.mode_error());
        }
        let context = self.context_mut()?;

        if already_done(context)? {
            match redo {
                RedoPolicy::Always => info!("declaration already done, redoing it as requested"),
                RedoPolicy::Never | RedoPolicy::IfChanged => {
                    let previous = field(context, DECLARED_INCOME)?;
                    let previous = amount_text(previous).ok_or_else(|| Error::ContextField {
                        path: DECLARED_INCOME.into(),
                    })?;
                    if previous == declared {
                        debug!("declaration already done with the same amount");
                        return Err(Error::AlreadyDeclared { amount: declared });
                    }
                    info!(%previous, requested = %declared, "declared amount differs");
                    if redo == RedoPolicy::Never {
                        return Err(Error::DeclaredDifferentAmount {
                            declared: previous,
                            requested: declared,
                        });
                    }
                    info!("redoing declaration");
                }
            }
        }

        *field_mut(context, DECLARED_INCOME)? = Value::String(declared.clone());

        info!(amount = %declared, "declaring income");
        let endpoint = self.site.endpoints.calculate.clone();
        self.submit(&endpoint).await?;

        let context = self.context_mut()?;
        let tax_lines = tax_lines(context)?;
        let total_due = number(field(context, TOTAL_DUE)?).ok_or_else(|| Error::ContextField {
            path: TOTAL_DUE.into(),
        })?;

        self.declaration.state = DeclarationState::Declared;
        Ok(DeclarationSummary {
            declared,
            tax_lines,
            total_due,
        })
    }

    /// Confirm the declaration made by [`declare`](Self::declare).
    pub async fn validate_declaration(&mut self) -> Result<(), Error> {
        self.require_state(DeclarationState::Declared, "must declare before validating")?;

        let context = self.context_mut()?;
        if let Some(amount) = context.pointer(DECLARED_INCOME) {
            info!(%amount, "validating declaration");
        }
        *field_mut(context, CERTIFICATIONS)? = Value::Null;

        let endpoint = self.site.endpoints.validate.clone();
        self.submit(&endpoint).await?;
        self.declaration.state = DeclarationState::Validated;
        Ok(())
    }

    /// Pay the validated declaration by SEPA direct debit.
    ///
    /// Without a mandate, the first registered one is used. The session
    /// goes back to `Unstarted`: another payment needs a new declaration.
    pub async fn pay(&mut self, mandate: Option<&Mandate>) -> Result<Payment, Error> {
        self.require_state(DeclarationState::Validated, "must validate before paying")?;

        let mandate = match mandate {
            Some(mandate) => mandate.clone(),
            None => self.mandates().await?.first().cloned().ok_or(Error::NoMandate)?,
        };

        let context = self.context_mut()?;
        let amount = field(context, TOTAL_DUE)?.clone();
        let sepa = field_mut(context, SEPA)?
            .as_object_mut()
            .ok_or_else(|| Error::ContextField { path: SEPA.into() })?;
        let slot = find_indexed_slot(sepa, "SepaRum", |v| v.as_str() == Some(mandate.rum.as_str()))
            .map(str::to_owned)
            .ok_or_else(|| Error::MandateNotInContext {
                rum: mandate.rum.clone(),
            })?;

        sepa.insert(format!("SepaMontant_{slot}"), amount.clone());
        sepa.insert(format!("SepaMontantVal_{slot}"), amount.clone());
        sepa.insert("SepaTotalMontant".into(), amount.clone());

        info!(%amount, iban = %mandate.iban, "paying");
        let endpoint = self.site.endpoints.pay.clone();
        self.submit(&endpoint).await?;
        self.declaration.state = DeclarationState::Unstarted;

        let context = self.context_mut()?.clone();
        let receipt_url = field(&context, RECEIPT)?
            .as_str()
            .ok_or_else(|| Error::ContextField {
                path: RECEIPT.into(),
            })?
            .to_owned();
        Ok(Payment {
            context,
            receipt_url,
        })
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn mode_error(&self) -> Error {
        let mode = self
            .declaration
            .context
            .as_ref()
            .and_then(|c| c.pointer(MODE))
            .map_or_else(|| "unknown".to_owned(), ToString::to_string);
        Error::UnsupportedMode { mode }
    }

    fn require_state(&self, expected: DeclarationState, message: &'static str) -> Result<(), Error> {
        let actual = self.declaration.state;
        if actual == expected {
            Ok(())
        } else {
            Err(Error::InvalidState { actual, message })
        }
    }

    fn context_mut(&mut self) -> Result<&mut Value, Error> {
        let actual = self.declaration.state;
        self.declaration.context.as_mut().ok_or(Error::InvalidState {
            actual,
            message: "no declaration context",
        })
    }

    /// POST the current context to a financial endpoint and keep the response.
    ///
    /// Sent once: a replayed submission could declare or pay twice.
    async fn submit(&mut self, endpoint: &Endpoint) -> Result<(), Error> {
        let url = self.endpoint_url(endpoint).await?;
        let actual = self.declaration.state;
        let body = self.declaration.context.as_ref().ok_or(Error::InvalidState {
            actual,
            message: "no declaration context",
        })?;
        let response: Value = self.transport.post_json(url, body, Retry::Never).await?;
        self.declaration.context = Some(response);
        Ok(())
    }
}
