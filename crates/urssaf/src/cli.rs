//! Clap derive structures for the `urssaf` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use urssaf_core::RedoPolicy;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// urssaf -- declare and pay monthly auto-entrepreneur contributions
#[derive(Debug, Parser)]
#[command(
    name = "urssaf",
    version,
    about = "Declare monthly income and pay URSSAF contributions from the command line",
    long_about = "Drives the URSSAF auto-entrepreneur web site: logs in, declares the \
        previous month's income from a payment journal, validates the declaration \
        and pays it by SEPA direct debit.\n\n\
        Re-running is safe: a period already declared with the same amount is left alone.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "URSSAF_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, env = "URSSAF_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "URSSAF_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Request timeout in seconds (overrides the profile)
    #[arg(long, env = "URSSAF_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Declare last month's income and pay the contributions
    Declare(DeclareArgs),

    /// List the SEPA mandates registered on the account
    #[command(alias = "m")]
    Mandates,

    /// Print the current declaration context
    Context,

    /// Manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Declare ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DeclareArgs {
    /// Payment journal (`<date> <invoice> <amount> <label>` per line)
    #[arg(long, short = 'f', value_name = "FILE")]
    pub payments: Option<PathBuf>,

    /// Declare this amount instead of reading a payment journal
    #[arg(long, value_name = "EUR", conflicts_with = "payments")]
    pub amount: Option<Decimal>,

    /// Directory where the receipt PDF is saved
    #[arg(long, short = 'c', value_name = "DIR")]
    pub pdf_dir: Option<PathBuf>,

    /// Redo the declaration if the period is already declared
    #[arg(
        long,
        value_name = "POLICY",
        num_args = 0..=1,
        default_missing_value = "always",
        value_parser = parse_redo
    )]
    pub redo: Option<RedoPolicy>,

    /// Reference (RUM) of the mandate to pay with
    #[arg(long, value_name = "RUM")]
    pub mandate: Option<String>,

    /// Compute the contributions without validating or paying
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_redo(value: &str) -> Result<RedoPolicy, String> {
    value
        .parse()
        .map_err(|_| format!("expected never, ifchanged or always, got '{value}'"))
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the configuration file location
    Path,

    /// Show the resolved configuration (secrets redacted)
    Show,

    /// Set a profile value
    Set {
        /// Key (username, email, payment_file, pdf_dir, redo, mandate, ...)
        key: String,
        /// Value
        value: String,
    },

    /// Store the profile password in the system keyring
    SetPassword {
        /// Profile name (defaults to the active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
