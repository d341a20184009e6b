// ── Monthly declaration run ──
//
// One run declares the previous month's income and pays the resulting
// contributions:
//
//   ledger total → login → mandate → declare → validate → pay
//   → download receipt → save PDF → notify
//
// Re-running is safe: the server-side state decides whether anything is
// declared again, and an already-declared period with the same amount is
// a benign `Outcome::AlreadyDeclared`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info, warn};

use urssaf_api::{DeclarationSummary, Mandate, RedoPolicy, Session};

use crate::config::DeclarerConfig;
use crate::error::CoreError;
use crate::ledger::PaymentLedger;
use crate::notify::{Attachment, Notifier};
use crate::period::Period;
use crate::report::{payments_report, subject, tax_report};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Name of the declaration context attached to the report.
pub const CONTEXT_ATTACHMENT: &str = "declaration_context.json";

/// Asked before paying; `false` stops the run.
pub type Approval<'a> =
    Box<dyn Fn(&DeclarationSummary, &Mandate) -> Result<bool, CoreError> + Send + Sync + 'a>;

/// How a run ended, when it didn't fail.
#[derive(Debug)]
pub enum Outcome {
    /// Declared, validated and paid.
    Paid(Box<Completed>),
    /// The period is already declared and paid with this amount.
    AlreadyDeclared { amount: String },
    /// Stopped after the contributions were computed.
    DryRun {
        summary: DeclarationSummary,
        report: String,
    },
    /// Payment declined at the approval step. Nothing was validated.
    Declined { summary: DeclarationSummary },
}

#[derive(Debug)]
pub struct Completed {
    pub period: Period,
    pub total: Decimal,
    pub summary: DeclarationSummary,
    pub mandate: Mandate,
    pub receipt: PathBuf,
    pub subject: String,
    pub report: String,
}

pub struct MonthlyDeclaration<'a> {
    config: &'a DeclarerConfig,
    period: Period,
    dry_run: bool,
    approve: Option<Approval<'a>>,
}

impl<'a> MonthlyDeclaration<'a> {
    pub fn new(config: &'a DeclarerConfig, period: Period) -> Self {
        Self {
            config,
            period,
            dry_run: false,
            approve: None,
        }
    }

    /// Stop after `declare`: nothing is validated or paid.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn approve_with(
        mut self,
        approve: impl Fn(&DeclarationSummary, &Mandate) -> Result<bool, CoreError>
        + Send
        + Sync
        + 'a,
    ) -> Self {
        self.approve = Some(Box::new(approve));
        self
    }

    pub fn period(&self) -> &Period {
        &self.period
    }

    pub fn receipt_path(&self) -> PathBuf {
        self.config.pdf_dir.join(self.period.pdf_file_name())
    }

    pub async fn run(
        &self,
        ledger: &dyn PaymentLedger,
        notifier: &dyn Notifier,
    ) -> Result<Outcome, CoreError> {
        let receipt = self.receipt_path();
        let redo = if self.dry_run {
            self.config.redo
        } else {
            adjust_redo(self.config.redo, &receipt)?
        };

        let payments = ledger.payments_in_range(&self.period);
        let total = ledger.total_amount_for_period(&self.period);
        let mut report = payments_report(&self.period, &payments, total);
        debug!(%report, "declaration summary");
        let amount = total.to_f64().ok_or_else(|| CoreError::ValidationFailed {
            message: format!("amount {total} out of range"),
        })?;

        let mut session = self.config.session()?;
        session
            .login(&self.config.username, &self.config.password)
            .await?;
        let mandate = self.choose_mandate(&mut session).await?;

        info!(period = %self.period, %total, %redo, "declaring income");
        let summary = match session.declare(amount, redo).await {
            Err(urssaf_api::Error::AlreadyDeclared { amount }) => {
                info!(%amount, "already declared with the correct amount");
                return Ok(Outcome::AlreadyDeclared { amount });
            }
            result => result?,
        };
        report.push_str(&tax_report(&summary, &mandate));

        if self.dry_run {
            return Ok(Outcome::DryRun { summary, report });
        }
        if let Some(approve) = &self.approve {
            if !approve(&summary, &mandate)? {
                info!("payment declined");
                return Ok(Outcome::Declined { summary });
            }
        }

        session.validate_declaration().await?;
        let payment = session.pay(Some(&mandate)).await?;
        let pdf = session.fetch_authenticated(&payment.receipt_url).await?;

        info!(path = %receipt.display(), "saving receipt");
        write_receipt(&receipt, &pdf, redo)?;

        let context = serde_json::to_vec_pretty(&payment.context)
            .map_err(|e| CoreError::Internal(format!("cannot serialize context: {e}")))?;
        let attachments = [
            Attachment::new(CONTEXT_ATTACHMENT, context),
            Attachment::new(self.period.pdf_file_name(), pdf.to_vec()),
        ];
        let subject = subject(total, summary.total_due);
        notifier.send(
            self.config.recipient.as_deref(),
            &subject,
            &report,
            &attachments,
        )?;

        Ok(Outcome::Paid(Box::new(Completed {
            period: self.period,
            total,
            summary,
            mandate,
            receipt,
            subject,
            report,
        })))
    }

    async fn choose_mandate(&self, session: &mut Session) -> Result<Mandate, CoreError> {
        let mandates = session.mandates().await?;
        match &self.config.mandate {
            _ if mandates.is_empty() => Err(CoreError::NoMandate),
            Some(rum) => mandates
                .iter()
                .find(|m| &m.rum == rum)
                .cloned()
                .ok_or_else(|| CoreError::MandateNotFound { rum: rum.clone() }),
            None => mandates.first().cloned().ok_or(CoreError::NoMandate),
        }
    }
}

// ── Receipt file ─────────────────────────────────────────────────────

/// Decide the redo policy from the receipt left by previous runs.
///
/// A receipt that isn't a PDF means a previous run broke mid-way, and so
/// does a missing one: both force a full re-declaration.
pub fn adjust_redo(redo: RedoPolicy, receipt: &Path) -> Result<RedoPolicy, CoreError> {
    match std::fs::read(receipt) {
        Ok(bytes) if bytes.starts_with(PDF_MAGIC) => Ok(redo),
        Ok(_) => {
            warn!(path = %receipt.display(), "receipt does not look like a PDF, redoing declaration from scratch");
            Ok(RedoPolicy::Always)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if redo != RedoPolicy::Always {
                warn!(path = %receipt.display(), "no receipt, forcing the re-declaration to complete it");
            }
            Ok(RedoPolicy::Always)
        }
        Err(source) => Err(CoreError::File {
            action: "read",
            path: receipt.to_path_buf(),
            source,
        }),
    }
}

/// Save the receipt. With `RedoPolicy::Never` an existing file is an error.
pub fn write_receipt(path: &Path, bytes: &[u8], redo: RedoPolicy) -> Result<(), CoreError> {
    let file_error = |source| CoreError::File {
        action: "write",
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(file_error)?;
    }

    let mut options = OpenOptions::new();
    options.write(true);
    if redo == RedoPolicy::Never {
        options.create_new(true);
    } else {
        options.create(true).truncate(true);
    }
    options
        .open(path)
        .and_then(|mut file| file.write_all(bytes))
        .map_err(file_error)
}
