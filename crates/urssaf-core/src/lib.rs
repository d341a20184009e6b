//! Monthly declaration workflow on top of `urssaf-api`.
//!
//! - **[`MonthlyDeclaration`]**: one run of the monthly routine, from the
//!   payment ledger to the saved receipt and the notification.
//!
//! - **[`PaymentLedger`]**: where the declared income comes from.
//!   [`PaymentFile`] reads a plain-text payment journal, [`FixedAmount`]
//!   declares a given amount.
//!
//! - **[`Notifier`]**: delivers the run report with its attachments (the
//!   final declaration context and the receipt PDF).
//!
//! - **[`DeclarerConfig`]**: runtime settings, built by the CLI from its
//!   profile. This crate never reads configuration files.

pub mod config;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod period;
pub mod report;
pub mod workflow;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::DeclarerConfig;
pub use error::CoreError;
pub use ledger::{FixedAmount, LedgerEntry, PaymentFile, PaymentLedger};
pub use notify::{Attachment, Notifier};
pub use period::Period;
pub use workflow::{Approval, Completed, MonthlyDeclaration, Outcome};

// The API types callers handle through this crate.
pub use urssaf_api::{
    DEFAULT_BASE_URL, DeclarationSummary, Error as ApiError, Mandate, RedoPolicy, RetryPolicy,
    Session, TaxLineItem, TlsMode,
};
