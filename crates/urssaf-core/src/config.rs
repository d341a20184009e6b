// ── Runtime declaration configuration ──
//
// Everything a declaration run needs: where the site lives, how to reach
// it, who logs in and where the receipt goes. Never touches disk; the CLI
// builds a `DeclarerConfig` from its profile and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use urssaf_api::{RedoPolicy, RetryPolicy, Session, SiteConfig, TlsMode, TransportConfig};

use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct DeclarerConfig {
    /// Site root, normally `urssaf_api::DEFAULT_BASE_URL`.
    pub base_url: Url,
    pub username: String,
    pub password: SecretString,
    /// Report recipient.
    pub recipient: Option<String>,
    /// Directory receiving the `CA_<year>_<month>.pdf` receipts.
    pub pdf_dir: PathBuf,
    pub redo: RedoPolicy,
    /// RUM of the mandate to pay with; the first one otherwise.
    pub mandate: Option<String>,
    pub tls: TlsMode,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl DeclarerConfig {
    pub fn new(base_url: Url, username: String, password: SecretString) -> Self {
        Self {
            base_url,
            username,
            password,
            recipient: None,
            pdf_dir: PathBuf::from("."),
            redo: RedoPolicy::Never,
            mandate: None,
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    /// Open a fresh, unauthenticated session against the configured site.
    pub fn session(&self) -> Result<Session, CoreError> {
        let site = SiteConfig::from_base_url(self.base_url.clone())?;
        let transport = TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
            retry: self.retry.clone(),
            ..TransportConfig::default()
        };
        Ok(Session::new(site, &transport)?)
    }
}
