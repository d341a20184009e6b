// ── Payment ledger ──
//
// Where the income to declare comes from. The payment file is a plain
// text journal, one received payment per line:
//
//     2024-05-03 F2024-012 1250.00 Client X, May invoice
//
// `#` starts a comment, blank lines are ignored.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::period::Period;

static LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)\s+(\S+)\s+(\S+)(?:\s+(.*))?$").expect("valid regex"));

/// One payment received for an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub invoice: String,
    /// Rounded to cents.
    pub amount: Decimal,
    pub label: String,
}

impl fmt::Display for LedgerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.date, self.invoice, self.amount, self.label)
    }
}

/// Source of the income received over a period.
pub trait PaymentLedger: Send + Sync {
    /// Payments received in `period`, oldest first.
    fn payments_in_range(&self, period: &Period) -> Vec<LedgerEntry>;

    /// Income to declare for `period`.
    fn total_amount_for_period(&self, period: &Period) -> Decimal {
        self.payments_in_range(period)
            .iter()
            .map(|p| p.amount)
            .sum()
    }
}

// ── Payment file ─────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct PaymentFile {
    entries: Vec<LedgerEntry>,
}

impl PaymentFile {
    /// Read a payment file. A missing file is an empty ledger.
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text, &path.display().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "payment file doesn't exist yet");
                Ok(Self::default())
            }
            Err(source) => Err(CoreError::File {
                action: "read",
                path: PathBuf::from(path),
                source,
            }),
        }
    }

    /// Parse payment file contents; `origin` names the source in errors.
    pub fn parse(text: &str, origin: &str) -> Result<Self, CoreError> {
        let mut entries = Vec::new();

        for (number, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or_default().trim_end();
            if line.trim().is_empty() {
                continue;
            }

            let entry = parse_line(line).map_err(|message| CoreError::Ledger {
                path: origin.into(),
                line: number + 1,
                message,
            })?;
            debug!(%entry, "read payment");
            entries.push(entry);
        }

        entries.sort_by_key(|e| e.date);
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }
}

fn parse_line(line: &str) -> Result<LedgerEntry, String> {
    let caps = LINE_RE
        .captures(line.trim_start())
        .ok_or_else(|| format!("expected `<date> <invoice> <amount> <label>`, got {line:?}"))?;

    let date = caps[1]
        .parse::<NaiveDate>()
        .map_err(|e| format!("bad date {:?}: {e}", &caps[1]))?;
    let amount = caps[3]
        .parse::<Decimal>()
        .map_err(|e| format!("bad amount {:?}: {e}", &caps[3]))?;

    Ok(LedgerEntry {
        date,
        invoice: caps[2].to_owned(),
        amount: amount.round_dp(2),
        label: caps.get(4).map_or("", |m| m.as_str()).trim_end().to_owned(),
    })
}

impl PaymentLedger for PaymentFile {
    fn payments_in_range(&self, period: &Period) -> Vec<LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| period.contains(e.date))
            .cloned()
            .collect()
    }
}

// ── Fixed amount ─────────────────────────────────────────────────────

/// A ledger that declares a given amount, whatever the period.
#[derive(Debug, Clone, Copy)]
pub struct FixedAmount(pub Decimal);

impl PaymentLedger for FixedAmount {
    fn payments_in_range(&self, _period: &Period) -> Vec<LedgerEntry> {
        Vec::new()
    }

    fn total_amount_for_period(&self, _period: &Period) -> Decimal {
        self.0
    }
}
