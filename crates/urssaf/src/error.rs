//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use urssaf_config::ConfigError;
use urssaf_core::{ApiError, CoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const EXTRACTION: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {url}: {reason}")]
    #[diagnostic(
        code(urssaf::connection_failed),
        help(
            "Check your network connection and that the site is reachable.\n\
             Behind an intercepting proxy, set ca_cert in your profile."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(urssaf::timeout),
        help("Increase the timeout with --timeout or retry later.")
    )]
    Timeout,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(urssaf::auth_failed),
        help(
            "Verify your login and password.\n\
             Run: urssaf config set-password"
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(urssaf::no_credentials),
        help(
            "Configure a login with: urssaf config set username <login>\n\
             Then store the password with: urssaf config set-password\n\
             Or set URSSAF_USERNAME and URSSAF_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Site ─────────────────────────────────────────────────────────
    #[error("Could not read the site configuration: {message}")]
    #[diagnostic(
        code(urssaf::extraction),
        help(
            "The web site layout probably changed.\n\
             Rerun with -vv for details and report the issue."
        )
    )]
    Extraction { message: String },

    #[error("Site error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    #[diagnostic(code(urssaf::api_error))]
    ApiError { message: String, status: Option<u16> },

    // ── Declaration ──────────────────────────────────────────────────
    #[error("Already declared {declared}€ for this period, asked for {requested}€")]
    #[diagnostic(
        code(urssaf::conflict),
        help("Use --redo ifchanged to declare the new amount again.")
    )]
    DeclaredDifferentAmount { declared: String, requested: String },

    #[error("Unsupported declaration mode {mode}")]
    #[diagnostic(
        code(urssaf::unsupported_mode),
        help("Only the monthly declaration is handled. Declare this period on the web site.")
    )]
    UnsupportedMode { mode: String },

    #[error("No SEPA mandate registered on the account")]
    #[diagnostic(
        code(urssaf::no_mandate),
        help("Register a mandate on the web site before paying.")
    )]
    NoMandate,

    #[error("Mandate '{rum}' not found")]
    #[diagnostic(
        code(urssaf::not_found),
        help("Run: urssaf mandates to see the registered mandates")
    )]
    MandateNotFound { rum: String },

    #[error("{message}")]
    #[diagnostic(code(urssaf::invalid_state))]
    InvalidState { message: String },

    // ── Local files ──────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(urssaf::payment_file),
        help("Each line reads: <YYYY-MM-DD> <invoice> <amount> [label]")
    )]
    PaymentFile { message: String },

    #[error("{message}")]
    #[diagnostic(code(urssaf::file))]
    File { message: String },

    #[error("Notification failed: {message}")]
    #[diagnostic(code(urssaf::notify))]
    Notify { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(urssaf::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(urssaf::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(urssaf::config))]
    Config(Box<figment::Error>),

    #[error("Configuration error: {message}")]
    #[diagnostic(code(urssaf::config))]
    ConfigInvalid { message: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Operation '{action}' requires confirmation")]
    #[diagnostic(
        code(urssaf::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Cannot serialize output: {0}")]
    #[diagnostic(code(urssaf::output))]
    Output(String),

    #[error("{message}")]
    #[diagnostic(code(urssaf::internal))]
    Internal { message: String },
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Extraction { .. } => exit_code::EXTRACTION,
            Self::MandateNotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::DeclaredDifferentAmount { .. } | Self::UnsupportedMode { .. } => {
                exit_code::CONFLICT
            }
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::Timeout => Self::Timeout,
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::Extraction { message } => Self::Extraction { message },

            // Reported as an outcome by the workflow, an error only for direct callers.
            CoreError::AlreadyDeclared { amount } => Self::InvalidState {
                message: format!("Already declared and paid {amount}€"),
            },
            CoreError::DeclaredDifferentAmount {
                declared,
                requested,
            } => Self::DeclaredDifferentAmount {
                declared,
                requested,
            },
            CoreError::UnsupportedMode { mode } => Self::UnsupportedMode { mode },
            CoreError::InvalidState { message } => Self::InvalidState { message },
            CoreError::NoMandate => Self::NoMandate,
            CoreError::MandateNotFound { rum } => Self::MandateNotFound { rum },
            CoreError::ValidationFailed { message } => Self::Validation {
                field: "amount".into(),
                reason: message,
            },
            CoreError::Api { message, status } => Self::ApiError { message, status },

            err @ CoreError::Ledger { .. } => Self::PaymentFile {
                message: err.to_string(),
            },
            err @ CoreError::File { .. } => Self::File {
                message: err.to_string(),
            },
            CoreError::Notify { message } => Self::Notify { message },
            CoreError::Config { message } => Self::ConfigInvalid { message },
            CoreError::Internal(message) => Self::Internal { message },
        }
    }
}

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        CoreError::from(err).into()
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Figment(err) => Self::Config(err),
            ConfigError::Io(err) => Self::Io(err),
            err @ ConfigError::Serialization(_) => Self::ConfigInvalid {
                message: err.to_string(),
            },
        }
    }
}
