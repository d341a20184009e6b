// urssaf-api: Async client for the URSSAF auto-entrepreneur declaration site
//
// A `Session` discovers the site's configuration from its JavaScript
// bundle, logs in through the identity provider, and drives the monthly
// declare → validate → pay sequence over the site's JSON XHR endpoints.

pub mod bundle;
pub mod error;
pub mod models;
pub mod site;
pub mod transport;

mod auth;
mod declaration;
mod discovery;
mod mandates;
mod session;

pub use auth::{OAuthFlow, verify_id_token};
pub use error::Error;
pub use models::{
    Creditor, DeclarationState, DeclarationSummary, Mandate, OAuthConfig, Payment, RedoPolicy,
    TaxLineItem,
};
pub use session::Session;
pub use site::{DEFAULT_BASE_URL, Endpoint, Endpoints, SiteConfig};
pub use transport::{Retry, RetryPolicy, TlsMode, TransportConfig};
