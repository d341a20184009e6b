// ── Core error types ──
//
// User-facing errors for the declaration workflow. Wraps
// `urssaf_api::Error` without exposing transport internals, and keeps
// the declaration business conditions as distinct variants.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Could not read the site configuration: {message}")]
    Extraction { message: String },

    // ── Declaration errors ───────────────────────────────────────────
    #[error("Already declared and paid {amount}€")]
    AlreadyDeclared { amount: String },

    #[error("Declared {declared}€ instead of {requested}€")]
    DeclaredDifferentAmount { declared: String, requested: String },

    #[error("Unsupported declaration mode {mode}")]
    UnsupportedMode { mode: String },

    #[error("Declaration steps out of order: {message}")]
    InvalidState { message: String },

    #[error("No registered mandate to pay with")]
    NoMandate,

    #[error("No mandate with reference {rum}")]
    MandateNotFound { rum: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Local files ──────────────────────────────────────────────────
    #[error("{path}:{line}: {message}")]
    Ledger {
        path: String,
        line: usize,
        message: String,
    },

    #[error("Cannot {action} {}: {source}", path.display())]
    File {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Notification failed: {message}")]
    Notify { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<urssaf_api::Error> for CoreError {
    fn from(err: urssaf_api::Error) -> Self {
        use urssaf_api::Error as Api;

        match err {
            Api::Authentication { message } | Api::TokenVerification { message } => {
                CoreError::AuthenticationFailed { message }
            }
            Api::UnsupportedFlow { response_type } => CoreError::AuthenticationFailed {
                message: format!("unsupported OAuth flow {response_type:?}"),
            },
            Api::NotAuthenticated => CoreError::InvalidState {
                message: "not logged in".into(),
            },
            Api::AlreadyAuthenticated => CoreError::InvalidState {
                message: "already logged in".into(),
            },
            Api::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            Api::Http { status, url, body } => CoreError::Api {
                message: format!("{url} answered: {body}"),
                status: Some(status),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Tls(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {reason}"),
            },
            Api::Extraction(e) => CoreError::Extraction {
                message: e.to_string(),
            },
            Api::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            Api::ContextField { path } => CoreError::Api {
                message: format!("declaration context lacks {path}"),
                status: None,
            },
            Api::AlreadyDeclared { amount } => CoreError::AlreadyDeclared { amount },
            Api::DeclaredDifferentAmount {
                declared,
                requested,
            } => CoreError::DeclaredDifferentAmount {
                declared,
                requested,
            },
            Api::UnsupportedMode { mode } => CoreError::UnsupportedMode { mode },
            Api::InvalidState { actual, message } => CoreError::InvalidState {
                message: format!("{message} (state: {actual})"),
            },
            Api::InvalidAmount(amount) => CoreError::ValidationFailed {
                message: format!("invalid amount {amount}"),
            },
            Api::NoMandate => CoreError::NoMandate,
            Api::MandateNotInContext { rum } => CoreError::MandateNotFound { rum },
        }
    }
}
