// OAuth login against the authority's identity provider
//
// The login page is an HTML form whose submission is a JSON XHR. The
// identity provider then redirects to the application with either an
// authorization code (PKCE, exchanged at the token endpoint) or the
// tokens themselves in the URL fragment. The identity token is checked
// against the published JWKS before the access token is kept.

use std::collections::HashSet;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use rand::Rng;
use rand::distr::Alphanumeric;
use regex::Regex;
use reqwest::Method;
use scraper::{Html, Selector};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use url::Url;

use crate::bundle::ExtractError;
use crate::error::Error;
use crate::models::OAuthConfig;
use crate::session::Session;
use crate::transport::{Retry, decode_json};

/// Length of the generated `state`, `nonce` and PKCE verifier.
const RANDOM_LEN: usize = 43;

static INNER_REDIRECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&redirect_uri=(.*?)&END=TRUE").expect("valid regex"));

// ── Flow selection ───────────────────────────────────────────────────

/// OAuth response types this client can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthFlow {
    /// Authorization code with PKCE.
    Code,
    /// Implicit: tokens in the redirect fragment.
    Token,
}

impl TryFrom<&str> for OAuthFlow {
    type Error = Error;

    fn try_from(response_type: &str) -> Result<Self, Self::Error> {
        match response_type {
            "code" => Ok(Self::Code),
            "token" => Ok(Self::Token),
            other => Err(Error::UnsupportedFlow {
                response_type: other.into(),
            }),
        }
    }
}

// ── PKCE ─────────────────────────────────────────────────────────────

pub(crate) fn random_string(len: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// PKCE verifier and its S256 challenge.
pub(crate) struct Pkce {
    pub(crate) verifier: SecretString,
    pub(crate) challenge: String,
}

impl Pkce {
    pub(crate) fn generate() -> Self {
        Self::from_verifier(random_string(RANDOM_LEN))
    }

    fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier: SecretString::from(verifier),
            challenge,
        }
    }
}

fn login_params(oauth: &OAuthConfig, pkce: Option<&Pkce>) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("response_type", oauth.response_type.clone()),
        ("client_id", oauth.client_id.clone()),
        ("state", random_string(RANDOM_LEN)),
        ("redirect_uri", oauth.redirect_uri.clone()),
        ("scope", oauth.scope.clone()),
        ("nonce", random_string(RANDOM_LEN)),
    ];
    if let Some(pkce) = pkce {
        params.push(("code_challenge", pkce.challenge.clone()));
        params.push(("code_challenge_method", "S256".into()));
    }
    params
}

// ── Login page ───────────────────────────────────────────────────────

/// Where and how the identification form submits.
#[derive(Debug)]
pub(crate) struct IdentificationForm {
    pub(crate) method: Method,
    pub(crate) action: Url,
}

/// Locate the unique `form#identification` on the login page.
pub(crate) fn identification_form(html: &str, page_url: &Url) -> Result<IdentificationForm, Error> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("form#identification").map_err(|e| ExtractError::Html {
        message: e.to_string(),
    })?;

    let forms: Vec<_> = document.select(&selector).collect();
    let [form] = forms.as_slice() else {
        return Err(Error::Authentication {
            message: format!("expected one identification form, found {}", forms.len()),
        });
    };

    let method = form
        .value()
        .attr("method")
        .map_or(Ok(Method::GET), |m| {
            Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
        })
        .map_err(|e| Error::Authentication {
            message: format!("identification form method: {e}"),
        })?;
    let action = match form.value().attr("action") {
        Some(action) => page_url.join(action)?,
        None => page_url.clone(),
    };

    Ok(IdentificationForm { method, action })
}

/// Re-encode the `requestOrigin` value taken from the login page URL.
///
/// The identity provider embeds a `redirect_uri` segment ending in
/// `&END=TRUE` without encoding it. That segment is percent-encoded (and
/// the `&END=TRUE` terminator dropped), then the whole value is encoded.
pub(crate) fn fix_request_origin(raw: &str) -> String {
    let fixed = match INNER_REDIRECT_RE.captures(raw) {
        Some(caps) => {
            let replacement = format!("&redirect_uri={}", urlencoding::encode(&caps[1]));
            INNER_REDIRECT_RE
                .replace(raw, regex::NoExpand(&replacement))
                .into_owned()
        }
        None => raw.to_owned(),
    };
    urlencoding::encode(&fixed).into_owned()
}

// ── Tokens ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    id_token: String,
}

struct TokenSet {
    access_token: SecretString,
    id_token: String,
}

fn query_value(mut pairs: url::form_urlencoded::Parse<'_>, key: &str) -> Option<String> {
    pairs.find(|(k, _)| k == key).map(|(_, v)| v.into_owned())
}

fn tokens_from_fragment(redirect: &Url) -> Result<TokenSet, Error> {
    let fragment = redirect.fragment().unwrap_or_default();
    let parse = || url::form_urlencoded::parse(fragment.as_bytes());
    let missing = |what: &str| Error::Authentication {
        message: format!("redirect fragment has no {what}"),
    };
    Ok(TokenSet {
        access_token: SecretString::from(
            query_value(parse(), "access_token").ok_or_else(|| missing("access_token"))?,
        ),
        id_token: query_value(parse(), "id_token").ok_or_else(|| missing("id_token"))?,
    })
}

/// Check an identity token's signature against a key set.
///
/// The key is selected by the token's `kid`. When the key publishes an
/// `alg`, the token header must declare the same one. Expiry is checked
/// when the token carries one; the audience is not.
pub fn verify_id_token(token: &str, jwks: &JwkSet) -> Result<(), Error> {
    let failed = |message: String| Error::TokenVerification { message };

    let header = jsonwebtoken::decode_header(token).map_err(|e| failed(e.to_string()))?;
    let kid = header
        .kid
        .ok_or_else(|| failed("token header has no key id".into()))?;
    let jwk = jwks
        .find(&kid)
        .ok_or_else(|| failed(format!("no key {kid:?} in the key set")))?;
    let key = DecodingKey::from_jwk(jwk).map_err(|e| failed(e.to_string()))?;

    if let Some(published) = jwk.common.key_algorithm {
        let alg: Algorithm = published
            .to_string()
            .parse()
            .map_err(|_| failed(format!("key {kid:?} is not a signing key ({published})")))?;
        if alg != header.alg {
            return Err(failed(format!(
                "token algorithm {:?} does not match key {kid:?} algorithm {alg:?}",
                header.alg
            )));
        }
    }

    let mut validation = Validation::new(header.alg);
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    jsonwebtoken::decode::<Value>(token, &key, &validation).map_err(|e| failed(e.to_string()))?;
    Ok(())
}

// ── Session login ────────────────────────────────────────────────────

impl Session {
    /// Authenticate with the authority.
    ///
    /// On success the verified access token is stored on the session and
    /// sent with every later XHR. A session logs in once.
    pub async fn login(&mut self, username: &str, password: &SecretString) -> Result<(), Error> {
        if self.transport.is_authenticated() {
            return Err(Error::AlreadyAuthenticated);
        }

        let oauth = self.oauth_config().await?.clone();
        let flow = OAuthFlow::try_from(oauth.response_type.as_str())?;
        let pkce = (flow == OAuthFlow::Code).then(Pkce::generate);

        let login_url = self.site.base_url.join(&oauth.login_url)?;
        debug!("opening login page {}", login_url);
        let resp = self
            .transport
            .request(
                self.transport
                    .http()
                    .get(login_url)
                    .query(&login_params(&oauth, pkce.as_ref())),
                Retry::Transient,
            )
            .await?;
        let page_url = resp.url().clone();
        let page = resp.text().await?;

        let form = identification_form(&page, &page_url)?;
        let request_origin = query_value(page_url.query_pairs(), "requestOrigin")
            .map(|raw| fix_request_origin(&raw))
            .ok_or_else(|| Error::Authentication {
                message: "login page URL has no requestOrigin".into(),
            })?;

        debug!("submitting identification to {}", form.action);
        let body = json!({
            "username": username,
            "password": password.expose_secret(),
            "requestOrigin": request_origin,
        });
        let resp = self
            .transport
            .request(
                self.transport.http().request(form.method, form.action).json(&body),
                Retry::Never,
            )
            .await?;
        let identification: Value = decode_json(resp).await?;

        let redirect = match (
            identification.get("status").and_then(Value::as_u64),
            identification.get("redirect").and_then(Value::as_str),
        ) {
            (Some(302), Some(redirect)) => page_url.join(redirect)?,
            _ => {
                return Err(Error::Authentication {
                    message: format!("identification rejected: {identification}"),
                });
            }
        };

        let tokens = match (flow, pkce) {
            (OAuthFlow::Code, Some(pkce)) => self.exchange_code(&oauth, &redirect, &pkce).await?,
            _ => tokens_from_fragment(&redirect)?,
        };

        let jwks_url = self.jwks_url().await?;
        let jwks: JwkSet = self.transport.get_json(jwks_url).await?;
        verify_id_token(&tokens.id_token, &jwks)?;

        self.transport.set_access_token(tokens.access_token)?;
        info!(user = %username, "authenticated");
        Ok(())
    }

    async fn exchange_code(
        &self,
        oauth: &OAuthConfig,
        redirect: &Url,
        pkce: &Pkce,
    ) -> Result<TokenSet, Error> {
        let code = query_value(redirect.query_pairs(), "code").ok_or_else(|| {
            Error::Authentication {
                message: "redirect has no authorization code".into(),
            }
        })?;
        let endpoint = oauth
            .token_endpoint
            .as_deref()
            .ok_or_else(|| ExtractError::OAuthSection {
                message: "code flow without tokenEndpoint".into(),
            })?;
        let endpoint = self.site.base_url.join(endpoint)?;

        debug!("exchanging authorization code at {}", endpoint);
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", oauth.redirect_uri.as_str()),
            ("code_verifier", pkce.verifier.expose_secret()),
            ("client_id", oauth.client_id.as_str()),
        ];
        let resp = self
            .transport
            .request(self.transport.http().post(endpoint).form(&form), Retry::Never)
            .await?;
        let tokens: TokenResponse = decode_json(resp).await?;

        Ok(TokenSet {
            access_token: SecretString::from(tokens.access_token),
            id_token: tokens.id_token,
        })
    }
}
