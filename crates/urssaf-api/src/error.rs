use thiserror::Error;

use crate::bundle::ExtractError;
use crate::models::DeclarationState;

/// Top-level error type for the `urssaf-api` crate.
///
/// Covers every failure mode of a session: transport, configuration
/// extraction, authentication and the declaration/payment business rules.
/// Business conditions get their own variants so callers can special-case
/// "already paid" without swallowing real failures.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The identification step was rejected or returned an unexpected shape.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The bundle advertises an OAuth response type we don't implement.
    #[error("OAuth authentication flow {response_type:?} not supported")]
    UnsupportedFlow { response_type: String },

    /// The identity token signature could not be verified against the JWKS.
    #[error("Identity token verification failed: {message}")]
    TokenVerification { message: String },

    /// An authenticated request was attempted before `login`.
    #[error("Must be logged in before sending authenticated requests")]
    NotAuthenticated,

    /// `login` was called on a session that already holds a token.
    #[error("Session is already authenticated")]
    AlreadyAuthenticated,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response, after retries were exhausted where allowed.
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Extraction ──────────────────────────────────────────────────
    /// The site's configuration could not be recovered from its bundle.
    #[error("Configuration extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A field the declaration flow relies on is missing from the context.
    #[error("Declaration context has no usable value at {path}")]
    ContextField { path: String },

    // ── Declaration ─────────────────────────────────────────────────
    /// The requested amount was already declared and paid.
    #[error("Already declared and paid {amount}€, nothing to redo")]
    AlreadyDeclared { amount: String },

    /// A declaration exists for the period, with another amount.
    #[error("Declared {declared}€ instead of {requested}€, the declaration should be redone")]
    DeclaredDifferentAmount { declared: String, requested: String },

    /// The server reported a declaration mode this client can't drive.
    #[error("Unsupported declaration mode {mode:?}")]
    UnsupportedMode { mode: String },

    /// An operation was called out of order.
    #[error("Invalid declaration state {actual}: {message}")]
    InvalidState {
        actual: DeclarationState,
        message: &'static str,
    },

    /// Amount is negative or not a number.
    #[error("Invalid amount {0}")]
    InvalidAmount(f64),

    /// No payment mandate is registered on the account.
    #[error("No registered mandate to pay with")]
    NoMandate,

    /// The chosen mandate has no slot in the payment form.
    #[error("Mandate {rum} is not offered by the payment form")]
    MandateNotInContext { rum: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => crate::transport::RETRY_STATUSES.contains(status),
            _ => false,
        }
    }

    /// Returns `true` for the benign "already declared with the right amount" case.
    pub fn is_already_declared(&self) -> bool {
        matches!(self, Self::AlreadyDeclared { .. })
    }

    /// Returns `true` when an operation was called in the wrong state.
    ///
    /// These are programming errors on the caller side, never retryable.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidState { .. } | Self::NotAuthenticated | Self::AlreadyAuthenticated
        )
    }
}
