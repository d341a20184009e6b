// Shared HTTP transport for a declaration session.
//
// Builds the `reqwest::Client` (TLS, timeout, cookie jar), applies the
// retry policy on transient failures and injects the bearer token on
// authenticated calls. Every other module goes through `Transport`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;

/// Statuses the authority's front ends return under load or during deploys.
pub const RETRY_STATUSES: [u16; 20] = [
    403, 408, 413, 429, 499, 500, 501, 502, 503, 504, 509, 511, 520, 521, 522, 523, 524, 525, 526,
    527,
];

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the bundled web PKI roots.
    #[default]
    System,
    /// Additionally trust a CA certificate from the given PEM file
    /// (intercepting corporate proxies).
    CustomCa(PathBuf),
}

/// Bounded exponential backoff on transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Sleep before retry `n` is `backoff_factor * 2^n`.
    pub backoff_factor: Duration,
    /// HTTP statuses considered transient.
    pub statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: Duration::from_secs(1),
            statuses: RETRY_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff_factor: Duration::ZERO,
            statuses: Vec::new(),
        }
    }

    pub fn should_retry_status(&self, status: StatusCode) -> bool {
        self.statuses.contains(&status.as_u16())
    }

    pub fn backoff(&self, retry: u32) -> Duration {
        self.backoff_factor.saturating_mul(1_u32 << retry.min(16))
    }
}

/// Whether a single request may be replayed by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// Replay on transient statuses and connection failures.
    Transient,
    /// One attempt only. Used for the declare/validate/pay submissions,
    /// which are not idempotent on the server side.
    Never,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
    pub user_agent: String,
    pub retry: RetryPolicy,
    pub cookie_jar: Option<Arc<Jar>>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            user_agent: concat!("urssaf/", env!("CARGO_PKG_VERSION")).into(),
            retry: RetryPolicy::default(),
            cookie_jar: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str());

        if let TlsMode::CustomCa(path) = &self.tls {
            let cert_pem = std::fs::read(path)
                .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
            let cert = reqwest::Certificate::from_pem(&cert_pem)
                .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        if let Some(ref jar) = self.cookie_jar {
            builder = builder.cookie_provider(Arc::clone(jar));
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// Create a config with a fresh cookie jar (the login redirect chain needs one).
    pub fn with_cookie_jar(mut self) -> Self {
        self.cookie_jar = Some(Arc::new(Jar::default()));
        self
    }
}

/// HTTP client plus retry policy plus the session's bearer token.
pub struct Transport {
    http: reqwest::Client,
    retry: RetryPolicy,
    access_token: Option<SecretString>,
}

impl Transport {
    /// Build a transport from a `TransportConfig`, adding a cookie jar if missing.
    pub fn new(config: &TransportConfig) -> Result<Self, Error> {
        let config = if config.cookie_jar.is_some() {
            config.clone()
        } else {
            config.clone().with_cookie_jar()
        };
        let http = config.build_client()?;
        Ok(Self::with_client(http, config.retry))
    }

    /// Wrap a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, retry: RetryPolicy) -> Self {
        Self {
            http,
            retry,
            access_token: None,
        }
    }

    /// The underlying HTTP client, for building requests.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Store the verified access token. Set at most once per session.
    pub(crate) fn set_access_token(&mut self, token: SecretString) -> Result<(), Error> {
        if self.access_token.is_some() {
            return Err(Error::AlreadyAuthenticated);
        }
        debug!("storing access token");
        self.access_token = Some(token);
        Ok(())
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a request, retrying transient failures when `retry` allows it.
    ///
    /// Any non-2xx status left after retries becomes `Error::Http`.
    pub async fn request(&self, builder: RequestBuilder, retry: Retry) -> Result<Response, Error> {
        let request = builder.build()?;
        let max_retries = match retry {
            Retry::Transient => self.retry.max_retries,
            Retry::Never => 0,
        };
        debug!("{} {}", request.method(), request.url());

        let mut retries = 0_u32;
        loop {
            let can_retry = retries < max_retries;
            let outcome = match request.try_clone() {
                Some(attempt) => self.http.execute(attempt).await,
                // Streaming bodies can't be replayed.
                None => return error_for_status(self.http.execute(request).await?).await,
            };

            match outcome {
                Ok(resp) if can_retry && self.retry.should_retry_status(resp.status()) => {
                    warn!(
                        status = resp.status().as_u16(),
                        url = %request.url(),
                        attempt = retries + 1,
                        "transient HTTP status, retrying"
                    );
                }
                Ok(resp) => return error_for_status(resp).await,
                Err(e) if can_retry && (e.is_connect() || e.is_timeout()) => {
                    warn!(error = %e, url = %request.url(), attempt = retries + 1, "request failed, retrying");
                }
                Err(e) => return Err(Error::Transport(e)),
            }

            tokio::time::sleep(self.retry.backoff(retries)).await;
            retries += 1;
        }
    }

    /// Like [`request`](Self::request), with `Authorization: Bearer <token>`.
    pub async fn request_auth(
        &self,
        builder: RequestBuilder,
        retry: Retry,
    ) -> Result<Response, Error> {
        let token = self.access_token.as_ref().ok_or(Error::NotAuthenticated)?;
        let builder = builder.bearer_auth(token.expose_secret());
        self.request(builder, retry).await
    }

    /// Unauthenticated GET returning a decoded JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        let resp = self.request(self.http.get(url), Retry::Transient).await?;
        decode_json(resp).await
    }

    /// Authenticated JSON POST returning a decoded JSON body (the site's XHR contract).
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
        retry: Retry,
    ) -> Result<T, Error> {
        let resp = self.request_auth(self.http.post(url).json(body), retry).await?;
        decode_json(resp).await
    }
}

/// Turn a non-2xx response into `Error::Http`, keeping a body preview.
async fn error_for_status(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Http {
        status: status.as_u16(),
        url,
        body: preview(&body),
    })
}

/// Read a body as JSON, keeping the raw text on failure.
pub(crate) async fn decode_json<T: DeserializeOwned>(resp: Response) -> Result<T, Error> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(&body)),
        body,
    })
}

pub(crate) fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
