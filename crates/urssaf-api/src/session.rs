// Declaration session
//
// One `Session` per run: it owns the transport (cookie jar and bearer
// token) and every piece of state the authority hands out along the way.
// Discovery, authentication, mandates and the declaration flow are
// implemented as inherent methods in separate files.
//
// Single-assignment fields (static config, OAuth config, token, profile
// context, mandates) are `Option`s filled on first use and never replaced.
// Mutating operations take `&mut self`: one caller drives a session.

use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::bundle::ExtractError;
use crate::error::Error;
use crate::models::{DeclarationState, Mandate, OAuthConfig};
use crate::site::{Endpoint, SiteConfig};
use crate::transport::{Retry, RetryPolicy, Transport, TransportConfig};

/// Declaration flow state plus the server-held context it operates on.
#[derive(Debug, Default)]
pub(crate) struct DeclarationFlow {
    pub(crate) state: DeclarationState,
    /// Last context returned by the server; replaced wholesale on each round trip.
    pub(crate) context: Option<Value>,
}

/// An authenticated conversation with the authority.
pub struct Session {
    pub(crate) transport: Transport,
    pub(crate) site: SiteConfig,
    pub(crate) static_config: Option<Map<String, Value>>,
    pub(crate) oauth: Option<OAuthConfig>,
    pub(crate) profile_context: Option<Value>,
    pub(crate) mandates: Option<Vec<Mandate>>,
    pub(crate) declaration: DeclarationFlow,
}

impl Session {
    /// Create a session with its own HTTP client and cookie jar.
    pub fn new(site: SiteConfig, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self::from_transport(site, Transport::new(transport)?))
    }

    /// Create a session around a pre-built `reqwest::Client`.
    ///
    /// The client must keep cookies; the login redirect chain relies on them.
    pub fn with_client(site: SiteConfig, http: reqwest::Client, retry: RetryPolicy) -> Self {
        Self::from_transport(site, Transport::with_client(http, retry))
    }

    fn from_transport(site: SiteConfig, transport: Transport) -> Self {
        Self {
            transport,
            site,
            static_config: None,
            oauth: None,
            profile_context: None,
            mandates: None,
            declaration: DeclarationFlow::default(),
        }
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    pub fn is_authenticated(&self) -> bool {
        self.transport.is_authenticated()
    }

    /// Current position in the declare → validate → pay sequence.
    pub fn state(&self) -> DeclarationState {
        self.declaration.state
    }

    /// Last declaration context received from the server, if any.
    pub fn context(&self) -> Option<&Value> {
        self.declaration.context.as_ref()
    }

    /// Download a resource with the session's bearer token (e.g. the receipt PDF).
    pub async fn fetch_authenticated(&self, url: &str) -> Result<Bytes, Error> {
        let url = self.site.base_url.join(url)?;
        debug!("downloading {}", url);
        let resp = self
            .transport
            .request_auth(self.transport.http().get(url), Retry::Transient)
            .await?;
        Ok(resp.bytes().await?)
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Full URL of an XHR endpoint: the feature's `baseURL` plus the path.
    pub(crate) async fn endpoint_url(&mut self, endpoint: &Endpoint) -> Result<Url, Error> {
        let oauth = self.oauth_config().await?;
        let base = oauth
            .base_url(&endpoint.feature)
            .ok_or_else(|| ExtractError::MissingFeature {
                feature: endpoint.feature.clone(),
            })?;
        let full = format!("{}{}", base.trim_end_matches('/'), endpoint.path);
        Ok(self.site.base_url.join(&full)?)
    }
}
