//! `urssaf declare`: the monthly declaration run.

use std::io::IsTerminal;
use std::path::PathBuf;

use chrono::Local;
use rust_decimal::Decimal;
use serde::Serialize;

use urssaf_core::{
    CoreError, DeclarationSummary, FixedAmount, Mandate, MonthlyDeclaration, Outcome, PaymentFile,
    PaymentLedger, Period, TaxLineItem,
};

use crate::cli::{DeclareArgs, GlobalOpts};
use crate::config::{self, Profile};
use crate::error::CliError;
use crate::notify::ConsoleNotifier;
use crate::output;

use super::util;

// ── Result shape ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum Status {
    Paid,
    AlreadyDeclared,
    DryRun,
    Declined,
}

/// What `declare` reports, in every output format.
#[derive(Debug, Serialize)]
struct DeclareResult {
    status: Status,
    period: Period,
    declared: Option<String>,
    taxes: Vec<TaxLineItem>,
    total_due: Option<f64>,
    mandate: Option<String>,
    receipt: Option<PathBuf>,
    #[serde(skip)]
    report: Option<String>,
}

impl DeclareResult {
    fn new(status: Status, period: Period) -> Self {
        Self {
            status,
            period,
            declared: None,
            taxes: Vec::new(),
            total_due: None,
            mandate: None,
            receipt: None,
            report: None,
        }
    }

    fn with_summary(mut self, summary: DeclarationSummary) -> Self {
        self.declared = Some(summary.declared);
        self.taxes = summary.tax_lines;
        self.total_due = Some(summary.total_due);
        self
    }

    fn from_outcome(outcome: Outcome, period: Period) -> Self {
        match outcome {
            Outcome::Paid(done) => {
                let done = *done;
                let mut result = Self::new(Status::Paid, done.period).with_summary(done.summary);
                result.mandate = Some(done.mandate.rum);
                result.receipt = Some(done.receipt);
                result
            }
            Outcome::AlreadyDeclared { amount } => {
                let mut result = Self::new(Status::AlreadyDeclared, period);
                result.declared = Some(amount);
                result
            }
            Outcome::DryRun { summary, report } => {
                let mut result = Self::new(Status::DryRun, period).with_summary(summary);
                result.report = Some(report);
                result
            }
            Outcome::Declined { summary } => {
                Self::new(Status::Declined, period).with_summary(summary)
            }
        }
    }

    fn detail(&self, color: bool) -> String {
        let declared = self.declared.as_deref().unwrap_or("?");
        match self.status {
            Status::Paid => {
                let receipt = self
                    .receipt
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                output::success(
                    &format!(
                        "Declared {declared}€ for {}, paid {}€. Receipt: {receipt}",
                        self.period,
                        self.total_due.unwrap_or_default()
                    ),
                    color,
                )
            }
            Status::AlreadyDeclared => output::success(
                &format!("{} already declared and paid ({declared}€), nothing to do", self.period),
                color,
            ),
            Status::DryRun => {
                let report = self.report.as_deref().unwrap_or_default();
                format!(
                    "{report}\n{}",
                    output::notice("Dry run: nothing was validated or paid.", color)
                )
            }
            Status::Declined => output::notice(
                &format!(
                    "Declaration of {declared}€ for {} not validated, nothing paid.",
                    self.period
                ),
                color,
            ),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: DeclareArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let confirm = !(global.yes || args.dry_run);
    if confirm && !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: "pay".into(),
        });
    }

    let (mut declarer, profile) = util::declarer(global)?;
    config::apply_declare_args(&mut declarer, &args);
    let ledger = open_ledger(&args, &profile)?;

    let period = Period::previous_month(Local::now().date_naive());
    let mut run = MonthlyDeclaration::new(&declarer, period).dry_run(args.dry_run);
    if confirm {
        run = run.approve_with(approve);
    }

    let notifier = ConsoleNotifier::new(global.quiet);
    let outcome = run.run(ledger.as_ref(), &notifier).await?;

    let result = DeclareResult::from_outcome(outcome, period);
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &result,
        |r| r.detail(color),
        |r| r.declared.clone().unwrap_or_default(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// `--amount`, else `--payments`, else the profile's payment file.
fn open_ledger(args: &DeclareArgs, profile: &Profile) -> Result<Box<dyn PaymentLedger>, CliError> {
    if let Some(amount) = args.amount {
        if amount < Decimal::ZERO {
            return Err(CliError::Validation {
                field: "amount".into(),
                reason: format!("must not be negative, got {amount}"),
            });
        }
        return Ok(Box::new(FixedAmount(amount)));
    }
    let path = args
        .payments
        .as_ref()
        .or(profile.payment_file.as_ref())
        .ok_or_else(|| CliError::Validation {
            field: "payments".into(),
            reason: "no payment file: pass --payments or --amount, or set payment_file in the profile"
                .into(),
        })?;
    Ok(Box::new(PaymentFile::open(path)?))
}

fn approve(summary: &DeclarationSummary, mandate: &Mandate) -> Result<bool, CoreError> {
    let prompt = format!(
        "Declare {}€ and pay {}€ from {} ({})?",
        summary.declared, summary.total_due, mandate.bank_name, mandate.iban
    );
    util::confirm(&prompt, false).map_err(|e| CoreError::Internal(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn may() -> Period {
        Period::previous_month(chrono::NaiveDate::from_ymd_opt(2024, 6, 3).unwrap())
    }

    fn summary() -> DeclarationSummary {
        DeclarationSummary {
            declared: "1234".into(),
            tax_lines: vec![],
            total_due: 262.0,
        }
    }

    #[test]
    fn already_declared_is_a_success_line() {
        let result = DeclareResult::from_outcome(
            Outcome::AlreadyDeclared {
                amount: "1234".into(),
            },
            may(),
        );
        assert_eq!(
            result.detail(false),
            "2024-05-01 to 2024-06-01 already declared and paid (1234€), nothing to do"
        );
    }

    #[test]
    fn dry_run_prints_the_report() {
        let result = DeclareResult::from_outcome(
            Outcome::DryRun {
                summary: summary(),
                report: "Taxes details: ...".into(),
            },
            may(),
        );
        let detail = result.detail(false);
        assert!(detail.starts_with("Taxes details: ..."));
        assert!(detail.ends_with("Dry run: nothing was validated or paid."));
    }

    #[test]
    fn json_shape() {
        let result = DeclareResult::from_outcome(Outcome::Declined { summary: summary() }, may());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "declined");
        assert_eq!(json["declared"], "1234");
        assert_eq!(json["total_due"], 262.0);
        assert_eq!(json["period"]["begin"], "2024-05-01");
        assert!(json.get("report").is_none());
    }

    #[test]
    fn amount_flag_wins() {
        let args = DeclareArgs {
            payments: None,
            amount: Some(Decimal::new(12_345, 1)),
            pdf_dir: None,
            redo: None,
            mandate: None,
            dry_run: true,
        };
        let ledger = open_ledger(&args, &Profile::default()).unwrap();
        assert_eq!(ledger.total_amount_for_period(&may()), Decimal::new(12_345, 1));
    }

    #[test]
    fn negative_amount_rejected() {
        let args = DeclareArgs {
            payments: None,
            amount: Some(Decimal::new(-1, 0)),
            pdf_dir: None,
            redo: None,
            mandate: None,
            dry_run: true,
        };
        assert!(matches!(
            open_ledger(&args, &Profile::default()),
            Err(CliError::Validation { .. })
        ));
    }

    #[test]
    fn no_ledger_source() {
        let args = DeclareArgs {
            payments: None,
            amount: None,
            pdf_dir: None,
            redo: None,
            mandate: None,
            dry_run: false,
        };
        let Err(CliError::Validation { field, .. }) = open_ledger(&args, &Profile::default()) else {
            panic!("expected a validation error");
        };
        assert_eq!(field, "payments");
    }
}
