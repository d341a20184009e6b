// ── Report text ──
//
// Plain-text summary of a declaration run, sent through the notifier.

use std::fmt::Write;

use rust_decimal::Decimal;
use urssaf_api::{DeclarationSummary, Mandate};

use crate::ledger::LedgerEntry;
use crate::period::Period;

/// Whole euros, truncated.
fn euros(amount: f64) -> String {
    format!("{:.0}", amount.trunc())
}

/// Which payments make up the declared income.
pub fn payments_report(period: &Period, payments: &[LedgerEntry], total: Decimal) -> String {
    let mut out = format!("For the period {period} ");
    if payments.is_empty() {
        out.push_str("no payment have been recorded.\n");
    } else {
        out.push_str("the following payments have been taken into account:\n");
    }
    for payment in payments {
        let _ = writeln!(out, "{payment}");
    }
    let _ = writeln!(out, "\nTotal: {}€", total.trunc());
    out
}

/// Contributions computed by the authority and who pays them.
pub fn tax_report(summary: &DeclarationSummary, mandate: &Mandate) -> String {
    let due: Vec<_> = summary.tax_lines.iter().filter(|t| t.amount > 0.0).collect();

    let mut out = if due.is_empty() {
        String::from("\nNo taxes.\n")
    } else {
        String::from("\nTaxes details:\n")
    };
    for line in due {
        let _ = writeln!(
            out,
            "{} ({:.2}%): {}€",
            line.description,
            line.rate,
            euros(line.amount)
        );
    }

    if summary.total_due > 0.0 {
        let _ = writeln!(out, "Total taxes to be paid: {}€", euros(summary.total_due));
        let _ = writeln!(out, "\nThis amount will be paid from :");
        let _ = writeln!(out, "Bank: {}", mandate.bank_name);
        let _ = writeln!(out, "IBAN: {}", mandate.iban);
    }
    out
}

pub fn subject(total: Decimal, taxes: f64) -> String {
    format!("Declared {}€, paid {}€", total.trunc(), euros(taxes))
}
